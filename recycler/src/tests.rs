use crate::*;

use std::cell::{Cell, RefCell};
use std::hash::{Hash, Hasher};
use std::rc::Rc;
use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::Duration;

#[derive(Clone, Copy, Debug)]
struct Lcg(u64);

impl Lcg {
    fn new(seed: u64) -> Self {
        Self(seed)
    }

    fn next_u64(&mut self) -> u64 {
        // Deterministic, dependency-free PRNG for tests.
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.0
    }

    fn gen_range_usize(&mut self, start: usize, end_exclusive: usize) -> usize {
        debug_assert!(start < end_exclusive);
        let span = (end_exclusive - start) as u64;
        start + (self.next_u64() % span) as usize
    }

    fn gen_bool(&mut self) -> bool {
        (self.next_u64() >> 33) & 1 == 1
    }
}

#[derive(Debug, Default)]
struct TextView {
    text: String,
    binds: usize,
}

#[derive(Debug, PartialEq, Eq, Hash)]
struct Label(String);

impl Item<TextView> for Label {
    fn slot_factory(&self) -> SlotFactory<TextView> {
        Arc::new(TextView::default)
    }

    fn bind(&self, view: &mut TextView) {
        view.text = self.0.clone();
        view.binds += 1;
    }

    fn unbind(&self, view: &mut TextView) {
        view.text.clear();
    }
}

#[derive(Debug, PartialEq, Eq, Hash)]
struct Header(u32);

impl Item<TextView> for Header {
    fn slot_factory(&self) -> SlotFactory<TextView> {
        Arc::new(TextView::default)
    }

    fn bind(&self, view: &mut TextView) {
        view.text = format!("# {}", self.0);
    }
}

/// Every instance hashes alike and comparing two of them panics.
#[derive(Debug)]
struct Explosive(u32);

impl PartialEq for Explosive {
    fn eq(&self, _other: &Self) -> bool {
        panic!("comparison exploded")
    }
}

impl Hash for Explosive {
    fn hash<H: Hasher>(&self, state: &mut H) {
        0u8.hash(state);
    }
}

impl Item<TextView> for Explosive {
    fn slot_factory(&self) -> SlotFactory<TextView> {
        Arc::new(TextView::default)
    }

    fn bind(&self, view: &mut TextView) {
        view.text = self.0.to_string();
    }
}

fn label(text: &str) -> ItemRef<TextView> {
    ItemRef::new(Label(text.to_owned()))
}

fn labels(texts: &[&str]) -> Vec<ItemRef<TextView>> {
    texts.iter().map(|t| label(t)).collect()
}

fn rows(n: usize, suffix: &str) -> Vec<ItemRef<TextView>> {
    (0..n).map(|i| label(&format!("row {i}{suffix}"))).collect()
}

fn text_of(item: &ItemRef<TextView>) -> String {
    if let Some(label) = item.downcast_ref::<Label>() {
        return label.0.clone();
    }
    match item.downcast_ref::<Header>() {
        Some(header) => format!("# {}", header.0),
        None => String::new(),
    }
}

fn texts(adapter: &Adapter<TextView>) -> Vec<String> {
    adapter.items().iter().map(text_of).collect()
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Note {
    Inserted(usize, usize),
    Removed(usize, usize),
    Moved(usize, usize),
    Changed(usize, Vec<String>),
    Invalidated,
}

/// Records notifications and mirrors the list structure they describe.
///
/// Inserted rows are `"?"` until resolved against the adapter.
#[derive(Default)]
struct RecordingHost {
    notes: Vec<Note>,
    mirror: Vec<String>,
    threads: Vec<ThreadId>,
}

impl RecordingHost {
    fn record(&mut self, note: Note) {
        self.threads.push(thread::current().id());
        self.notes.push(note);
    }

    fn resolve(&self, adapter: &Adapter<TextView>) -> Vec<String> {
        self.mirror
            .iter()
            .enumerate()
            .map(|(i, text)| match (text.as_str(), adapter.item(i)) {
                ("?", Some(item)) => text_of(item),
                _ => text.clone(),
            })
            .collect()
    }
}

impl RenderHost<TextView> for RecordingHost {
    fn notify_inserted(&mut self, position: usize, count: usize) {
        self.record(Note::Inserted(position, count));
        self.mirror
            .splice(position..position, (0..count).map(|_| "?".to_owned()));
    }

    fn notify_removed(&mut self, position: usize, count: usize) {
        self.record(Note::Removed(position, count));
        self.mirror.drain(position..position + count);
    }

    fn notify_moved(&mut self, from: usize, to: usize) {
        self.record(Note::Moved(from, to));
        let text = self.mirror.remove(from);
        self.mirror.insert(to, text);
    }

    fn notify_changed(&mut self, position: usize, payload: &[ItemRef<TextView>]) {
        let new: Vec<String> = payload.iter().map(text_of).collect();
        self.mirror[position..position + new.len()].clone_from_slice(&new);
        self.record(Note::Changed(position, new));
    }

    fn notify_data_set_changed(&mut self) {
        self.record(Note::Invalidated);
        self.mirror.clear();
    }
}

fn random_pairs(rng: &mut Lcg, max_len: usize) -> Vec<(u8, u8)> {
    let len = rng.gen_range_usize(0, max_len + 1);
    (0..len)
        .map(|_| {
            (
                rng.gen_range_usize(0, 6) as u8,
                rng.gen_range_usize(0, 3) as u8,
            )
        })
        .collect()
}

fn diff_pairs(old: &[(u8, u8)], new: &[(u8, u8)], detect_moves: bool) -> EditScript {
    diff_slices_by(old, new, detect_moves, |a, b| a.0 == b.0, |a, b| a.1 == b.1)
}

#[test]
fn edit_script_transforms_old_into_new() {
    let mut rng = Lcg::new(0x5eed);
    for round in 0..2_000 {
        let old = random_pairs(&mut rng, 24);
        let new = random_pairs(&mut rng, 24);
        let detect_moves = round % 2 == 0;

        let script = diff_pairs(&old, &new, detect_moves);
        let mut applied = old.clone();
        script.apply(&mut applied, &new);
        assert_eq!(applied, new, "old={old:?} new={new:?} script={script:?}");
    }
}

#[test]
fn edit_script_is_deterministic() {
    let mut rng = Lcg::new(42);
    for _ in 0..200 {
        let old = random_pairs(&mut rng, 30);
        let new = random_pairs(&mut rng, 30);
        let detect_moves = rng.gen_bool();
        assert_eq!(
            diff_pairs(&old, &new, detect_moves),
            diff_pairs(&old, &new, detect_moves)
        );
    }
}

#[test]
fn moves_are_only_reported_when_detected() {
    let mut rng = Lcg::new(7);
    for _ in 0..300 {
        let old = random_pairs(&mut rng, 16);
        let new = random_pairs(&mut rng, 16);
        let script = diff_pairs(&old, &new, false);
        assert!(
            script.iter().all(|op| !matches!(op, EditOp::Move { .. })),
            "{script:?}"
        );
    }
}

#[test]
fn rotation_is_a_single_move() {
    let old = ['a', 'b', 'c', 'd'];
    let new = ['d', 'a', 'b', 'c'];

    let script = diff_slices_by(&old, &new, true, |a, b| a == b, |a, b| a == b);
    assert_eq!(script.ops(), &[EditOp::Move { from: 3, to: 0 }]);

    let script = diff_slices_by(&old, &new, false, |a, b| a == b, |a, b| a == b);
    assert_eq!(
        script.ops(),
        &[
            EditOp::Remove {
                position: 3,
                count: 1
            },
            EditOp::Insert {
                position: 0,
                new_index: 0,
                count: 1
            },
        ]
    );
}

#[test]
fn adjacent_operations_are_batched() {
    let old = [1, 2, 3, 4, 5, 6];
    let new = [1, 6];
    let script = diff_slices_by(&old, &new, true, |a, b| a == b, |a, b| a == b);
    assert_eq!(
        script.ops(),
        &[EditOp::Remove {
            position: 1,
            count: 4
        }]
    );

    let old: [i32; 0] = [];
    let new = [1, 2, 3];
    let script = diff_slices_by(&old, &new, true, |a, b| a == b, |a, b| a == b);
    assert_eq!(
        script.ops(),
        &[EditOp::Insert {
            position: 0,
            new_index: 0,
            count: 3
        }]
    );
}

/// Pairs compared by key, counting every comparison the engine asks for.
struct CountingDiff {
    old: Vec<(u8, u8)>,
    new: Vec<(u8, u8)>,
    comparisons: Cell<usize>,
}

impl CountingDiff {
    fn new(old: Vec<(u8, u8)>, new: Vec<(u8, u8)>) -> Self {
        Self {
            old,
            new,
            comparisons: Cell::new(0),
        }
    }

    fn count(&self) {
        self.comparisons.set(self.comparisons.get() + 1);
    }
}

impl DiffCallback for CountingDiff {
    fn old_len(&self) -> usize {
        self.old.len()
    }

    fn new_len(&self) -> usize {
        self.new.len()
    }

    fn same_item(&self, old_index: usize, new_index: usize) -> bool {
        self.count();
        self.old[old_index].0 == self.new[new_index].0
    }

    fn same_content(&self, old_index: usize, new_index: usize) -> bool {
        self.count();
        self.old[old_index].1 == self.new[new_index].1
    }
}

#[test]
fn stopped_diff_compares_nothing_further() {
    let mut rng = Lcg::new(0xcafe);
    let old: Vec<_> = (0..200).map(|_| (rng.gen_range_usize(0, 20) as u8, 0)).collect();
    let new: Vec<_> = (0..200).map(|_| (rng.gen_range_usize(0, 20) as u8, 0)).collect();
    let cb = CountingDiff::new(old, new);

    let checks = Cell::new(0);
    let compared_at_stop = Cell::new(None);
    let should_stop = || {
        checks.set(checks.get() + 1);
        if checks.get() < 4 {
            return false;
        }
        if compared_at_stop.get().is_none() {
            compared_at_stop.set(Some(cb.comparisons.get()));
        }
        true
    };

    assert!(crate::diff::calculate_diff_until(&cb, true, &should_stop).is_none());
    assert_eq!(checks.get(), 4);
    assert!(cb.comparisons.get() > 0);
    assert_eq!(compared_at_stop.get(), Some(cb.comparisons.get()));
}

#[test]
fn stopping_after_the_search_skips_move_detection() {
    let old: Vec<(u8, u8)> = (0..50).map(|k| (k, 0)).collect();
    let mut new = old.clone();
    new.rotate_right(1);

    // Checks and comparisons made by the search alone.
    let cb = CountingDiff::new(old.clone(), new.clone());
    let checks = Cell::new(0);
    let never = || {
        checks.set(checks.get() + 1);
        false
    };
    assert!(crate::diff::calculate_diff_until(&cb, false, &never).is_some());
    let search_checks = checks.get();
    let search_comparisons = cb.comparisons.get();

    let cb = CountingDiff::new(old.clone(), new.clone());
    assert!(crate::diff::calculate_diff_until(&cb, true, &|| false).is_some());
    assert!(cb.comparisons.get() > search_comparisons);

    let cb = CountingDiff::new(old, new);
    let checks = Cell::new(0);
    let stop_after_search = || {
        checks.set(checks.get() + 1);
        checks.get() > search_checks
    };
    assert!(crate::diff::calculate_diff_until(&cb, true, &stop_after_search).is_none());
    assert_eq!(cb.comparisons.get(), search_comparisons);
}

#[test]
fn stable_ids_are_negative_and_strictly_decreasing() {
    let ids: Vec<i64> = (0..64)
        .map(|_| StableIdAllocator::allocate().get())
        .collect();
    assert!(ids.iter().all(|&id| id < 0));
    assert!(ids.windows(2).all(|w| w[1] < w[0]));

    let last = StableIdAllocator::last().unwrap();
    assert!(last.get() <= *ids.last().unwrap());

    let a = label("x");
    let b = a.clone();
    assert_eq!(a.stable_id(), b.stable_id());
    assert_ne!(a.stable_id(), label("x").stable_id());
}

#[test]
fn slot_bind_and_unbind_follow_the_contract() {
    let item = label("a");
    let mut slot = Slot::new(ViewType::of::<Label>(), TextView::default());

    slot.bind(item.clone()).unwrap();
    assert_eq!(item.holder(), Some(slot.id()));
    assert_eq!(slot.view().text, "a");
    assert_eq!(
        slot.bind(label("b")),
        Err(Error::SlotAlreadyBound(slot.id()))
    );

    let mut other = Slot::new(ViewType::of::<Label>(), TextView::default());
    assert_eq!(
        other.bind(item.clone()),
        Err(Error::ItemAlreadyBound(slot.id()))
    );
    assert!(!other.is_bound());

    let unbound = slot.unbind().unwrap();
    assert!(ItemRef::ptr_eq(&unbound, &item));
    assert_eq!(item.holder(), None);
    assert_eq!(slot.view().text, "");
    assert_eq!(slot.unbind().unwrap_err(), Error::SlotNotBound(slot.id()));

    // Back to a bindable state, in either slot.
    other.bind(item.clone()).unwrap();
    assert_eq!(item.holder(), Some(other.id()));
    other.unbind().unwrap();
    slot.bind(item).unwrap();
    assert_eq!(slot.view().binds, 2);
}

/// Host code generic over the surface type, the way a toolkit binding would be written.
fn show_and_release<V: 'static>(slot: &mut Slot<V>, item: ItemRef<V>) -> Option<SlotId> {
    slot.bind(item.clone()).ok()?;
    let holder = item.holder();
    slot.failed_to_recycle();
    slot.unbind().ok()?;
    holder
}

#[test]
fn slots_can_be_driven_from_generic_host_code() {
    let item = label("a");
    let mut slot = Slot::new(item.view_type(), TextView::default());
    assert_eq!(show_and_release(&mut slot, item.clone()), Some(slot.id()));
    assert!(!item.is_bound());
    assert!(format!("{item:?}").starts_with("ItemRef"));
}

#[test]
fn set_items_with_one_changed_item_emits_a_single_change() {
    let mut adapter = Adapter::new();
    let mut host = RecordingHost::default();
    let a = label("A");
    let b = label("B");
    adapter.replace_items(vec![a.clone(), b.clone(), label("C")], &mut host);
    assert_eq!(host.notes, vec![Note::Inserted(0, 3)]);
    host.notes.clear();

    assert!(
        adapter
            .replace_items(vec![a, b, label("D")], &mut host)
            .is_none()
    );
    assert_eq!(host.notes, vec![Note::Changed(2, vec!["D".to_owned()])]);
    assert_eq!(texts(&adapter), ["A", "B", "D"]);
}

#[test]
fn setting_the_same_sequence_is_a_no_op() {
    let mut adapter = Adapter::new();
    let mut host = RecordingHost::default();
    adapter.replace_items(labels(&["a", "b"]), &mut host);
    host.notes.clear();

    let same = Arc::clone(adapter.items());
    assert!(adapter.set_items(same, &mut host).is_none());
    assert!(host.notes.is_empty());
}

#[test]
fn host_mirror_converges_for_random_sequences() {
    let mut rng = Lcg::new(0xadab7e5);
    for seed in 0..300u64 {
        let gen_items = |rng: &mut Lcg| -> Vec<ItemRef<TextView>> {
            let len = rng.gen_range_usize(0, 14);
            (0..len)
                .map(|_| {
                    if rng.gen_range_usize(0, 4) == 0 {
                        ItemRef::new(Header(rng.gen_range_usize(0, 2) as u32))
                    } else {
                        let text = ["a", "b", "c", "d", "e"][rng.gen_range_usize(0, 5)];
                        label(text)
                    }
                })
                .collect()
        };
        let old = gen_items(&mut rng);
        let new = gen_items(&mut rng);

        let mut adapter = Adapter::new();
        adapter.set_detect_moves(seed % 2 == 0);
        let mut host = RecordingHost::default();
        adapter.replace_items(old, &mut host);
        adapter.replace_items(new, &mut host);

        assert!(!host.notes.contains(&Note::Invalidated));
        assert_eq!(host.resolve(&adapter), texts(&adapter), "seed {seed}");
    }
}

#[test]
fn large_sequences_are_diffed_off_the_calling_thread() {
    let mut adapter = Adapter::new();
    let mut host = RecordingHost::default();

    assert!(adapter.replace_items(rows(10_000, ""), &mut host).is_some());
    assert!(host.notes.is_empty());
    assert!(adapter.is_empty());
    assert!(adapter.wait_diff(&mut host));
    assert_eq!(host.notes, vec![Note::Inserted(0, 10_000)]);
    host.notes.clear();
    host.threads.clear();

    let handle = adapter
        .replace_items(rows(10_000, " v2"), &mut host)
        .expect("diffed on a worker");
    assert!(host.notes.is_empty());
    assert_eq!(text_of(adapter.item(0).unwrap()), "row 0");

    assert!(adapter.wait_diff(&mut host));
    assert!(!handle.is_cancelled());
    assert_eq!(host.notes.len(), 1);
    assert!(matches!(&host.notes[0], Note::Changed(0, payload) if payload.len() == 10_000));
    let caller = thread::current().id();
    assert!(host.threads.iter().all(|t| *t == caller));
    assert_eq!(text_of(adapter.item(9_999).unwrap()), "row 9999 v2");
    assert_eq!(host.resolve(&adapter), texts(&adapter));
}

#[test]
fn poll_diff_delivers_once_the_worker_is_done() {
    let mut adapter = Adapter::new();
    let mut host = RecordingHost::default();
    adapter.replace_items(rows(800, ""), &mut host);

    let mut delivered = false;
    for _ in 0..10_000 {
        if adapter.poll_diff(&mut host) {
            delivered = true;
            break;
        }
        thread::sleep(Duration::from_millis(1));
    }
    assert!(delivered);
    assert!(adapter.pending_diff().is_none());
    assert!(!adapter.poll_diff(&mut host));
    assert_eq!(adapter.len(), 800);
}

#[test]
fn a_newer_diff_supersedes_an_outstanding_one() {
    let mut adapter = Adapter::new();
    let mut host = RecordingHost::default();
    adapter.replace_items(rows(600, ""), &mut host);
    adapter.wait_diff(&mut host);

    let first = adapter.replace_items(rows(600, " a"), &mut host).unwrap();
    let second = adapter.replace_items(rows(600, " b"), &mut host).unwrap();
    assert!(first.is_cancelled());
    assert!(!second.is_cancelled());
    assert!(second.generation() > first.generation());
    assert_eq!(adapter.pending_diff().map(DiffHandle::generation), Some(second.generation()));

    assert!(adapter.wait_diff(&mut host));
    assert!(!adapter.poll_diff(&mut host));
    assert_eq!(text_of(adapter.item(599).unwrap()), "row 599 b");
    assert_eq!(host.resolve(&adapter), texts(&adapter));
}

#[test]
fn direct_edit_while_diffing_invalidates() {
    let mut adapter = Adapter::new();
    let mut host = RecordingHost::default();
    adapter.replace_items(rows(600, ""), &mut host);
    adapter.wait_diff(&mut host);

    let handle = adapter.replace_items(rows(600, " v2"), &mut host).unwrap();
    host.notes.clear();
    let removed = adapter.remove_at(0, &mut host).unwrap();

    assert!(handle.is_cancelled());
    assert_eq!(text_of(&removed), "row 0 v2");
    assert_eq!(host.notes, vec![Note::Invalidated]);
    assert_eq!(adapter.len(), 599);
    assert_eq!(text_of(adapter.item(0).unwrap()), "row 1 v2");
    assert!(!adapter.poll_diff(&mut host));
}

#[test]
fn detach_cancels_the_outstanding_diff() {
    let mut adapter = Adapter::new();
    let mut host = RecordingHost::default();
    let handle = adapter.replace_items(rows(1_000, ""), &mut host).unwrap();

    adapter.detach();
    assert!(handle.is_cancelled());
    assert!(adapter.pending_diff().is_none());
    assert!(!adapter.wait_diff(&mut host));
    assert!(host.notes.is_empty());
    assert_eq!(adapter.len(), 1_000);
}

#[test]
fn dropping_the_adapter_cancels_the_outstanding_diff() {
    let mut adapter = Adapter::new();
    let mut host = RecordingHost::default();
    let handle = adapter.replace_items(rows(1_000, ""), &mut host).unwrap();

    drop(adapter);
    assert!(handle.is_cancelled());
    assert!(host.notes.is_empty());
}

#[test]
fn oversized_sequences_skip_diffing() {
    let options = AdapterOptions::new().with_diff(DiffOptions::new().with_max_len(4));
    let mut adapter = Adapter::with_options(options);
    let mut host = RecordingHost::default();

    assert!(
        adapter
            .replace_items(labels(&["a", "b", "c", "d", "e"]), &mut host)
            .is_none()
    );
    assert_eq!(host.notes, vec![Note::Invalidated]);
    assert_eq!(adapter.len(), 5);
}

#[test]
fn failing_diff_falls_back_to_invalidate() {
    let mut adapter = Adapter::new();
    let mut host = RecordingHost::default();
    adapter.replace_items(vec![ItemRef::new(Explosive(1))], &mut host);
    host.notes.clear();

    adapter.replace_items(vec![ItemRef::new(Explosive(2))], &mut host);
    assert_eq!(host.notes, vec![Note::Invalidated]);
    assert_eq!(adapter.len(), 1);
    assert!(adapter.item(0).unwrap().downcast_ref::<Explosive>().is_some_and(|e| e.0 == 2));
}

#[test]
fn remove_range_notifies_once_without_diffing() {
    let mut adapter = Adapter::new();
    let mut host = RecordingHost::default();
    adapter.replace_items(
        labels(&["0", "1", "2", "3", "4", "5", "6", "7", "8", "9"]),
        &mut host,
    );
    host.notes.clear();

    adapter.remove_range(2, 4, &mut host).unwrap();
    assert_eq!(host.notes, vec![Note::Removed(2, 3)]);
    assert_eq!(texts(&adapter), ["0", "1", "5", "6", "7", "8", "9"]);

    assert_eq!(
        adapter.remove_range(4, 2, &mut host),
        Err(Error::RangeOutOfBounds {
            start: 4,
            end: 2,
            len: 7
        })
    );
    assert_eq!(
        adapter.remove_range(5, 7, &mut host),
        Err(Error::RangeOutOfBounds {
            start: 5,
            end: 7,
            len: 7
        })
    );
    assert_eq!(host.notes.len(), 1);
}

#[test]
fn direct_inserts_and_removals_notify_ranges() {
    let mut adapter = Adapter::new();
    let mut host = RecordingHost::default();
    adapter.replace_items(labels(&["a", "b"]), &mut host);
    host.notes.clear();

    adapter.insert_at(1, labels(&["x", "y"]), &mut host).unwrap();
    let z = label("z");
    adapter.add(z.clone(), &mut host);
    adapter.extend(labels(&["w"]), &mut host);
    assert_eq!(
        adapter.insert(9, label("nope"), &mut host),
        Err(Error::PositionOutOfRange {
            position: 9,
            len: 6
        })
    );
    assert_eq!(texts(&adapter), ["a", "x", "y", "b", "z", "w"]);

    assert_eq!(adapter.remove(&z, &mut host), Some(4));
    assert_eq!(adapter.remove(&z, &mut host), None);
    assert_eq!(text_of(&adapter.remove_at(0, &mut host).unwrap()), "a");
    assert!(matches!(
        adapter.remove_at(10, &mut host),
        Err(Error::PositionOutOfRange { position: 10, .. })
    ));

    assert_eq!(
        host.notes,
        vec![
            Note::Inserted(1, 2),
            Note::Inserted(4, 1),
            Note::Inserted(5, 1),
            Note::Removed(4, 1),
            Note::Removed(0, 1),
        ]
    );
    assert_eq!(host.resolve(&adapter), texts(&adapter));
}

#[test]
fn stable_id_lookup_is_range_checked() {
    let mut adapter = Adapter::new();
    let mut host = RecordingHost::default();
    let items = labels(&["a", "b"]);
    let expected = items[1].stable_id();
    adapter.replace_items(items, &mut host);

    assert_eq!(adapter.stable_id(1), Ok(expected));
    assert_eq!(
        adapter.stable_id(2),
        Err(Error::PositionOutOfRange {
            position: 2,
            len: 2
        })
    );
}

#[test]
fn slots_come_from_registered_factories() {
    let mut adapter = Adapter::new();
    let mut host = RecordingHost::default();
    adapter.replace_items(labels(&["a"]), &mut host);

    assert!(matches!(
        adapter.create_slot(ViewType::of::<Header>()),
        Err(Error::UnknownViewType(v)) if v == ViewType::of::<Header>()
    ));

    adapter.add(ItemRef::new(Header(3)), &mut host);
    let mut slot = adapter.create_slot(adapter.view_type(1).unwrap()).unwrap();
    assert_eq!(slot.view_type(), ViewType::of::<Header>());
    adapter.bind_slot(&mut slot, 1).unwrap();
    assert_eq!(slot.view().text, "# 3");
    assert_eq!(adapter.item(1).unwrap().holder(), Some(slot.id()));
}

#[test]
fn bind_hooks_run_after_binding() {
    let mut adapter = Adapter::new();
    let mut host = RecordingHost::default();
    adapter.replace_items(labels(&["a", "b"]), &mut host);

    let log = Rc::new(RefCell::new(Vec::new()));
    let bound = Rc::clone(&log);
    adapter.on_slot_bound(move |slot: &mut Slot<TextView>| {
        bound.borrow_mut().push(format!("bound {}", slot.view().text));
    });
    let unbound = Rc::clone(&log);
    adapter.on_slot_unbound(move |slot: &mut Slot<TextView>| {
        unbound
            .borrow_mut()
            .push(format!("unbound {}", slot.is_bound()));
    });

    let mut slot = adapter.create_slot(ViewType::of::<Label>()).unwrap();
    adapter.bind_slot(&mut slot, 0).unwrap();
    adapter.rebind_slot(&mut slot, 1).unwrap();
    adapter.unbind_slot(&mut slot).unwrap();
    assert_eq!(
        adapter.unbind_slot(&mut slot).unwrap_err(),
        Error::SlotNotBound(slot.id())
    );
    assert!(!adapter.failed_to_recycle(&mut slot));

    assert_eq!(
        *log.borrow(),
        ["bound a", "unbound false", "bound b", "unbound false"]
    );
}

#[test]
fn rebind_onto_an_item_shown_elsewhere_leaves_the_slot_bound() {
    let mut adapter = Adapter::new();
    let mut host = RecordingHost::default();
    adapter.replace_items(labels(&["a", "b"]), &mut host);

    let mut first = adapter.create_slot(ViewType::of::<Label>()).unwrap();
    let mut second = adapter.create_slot(ViewType::of::<Label>()).unwrap();
    adapter.bind_slot(&mut first, 0).unwrap();
    adapter.bind_slot(&mut second, 1).unwrap();

    assert_eq!(
        adapter.rebind_slot(&mut first, 1),
        Err(Error::ItemAlreadyBound(second.id()))
    );
    assert_eq!(first.view().text, "a");
    assert!(ItemRef::ptr_eq(first.item().unwrap(), adapter.item(0).unwrap()));
    assert_eq!(adapter.item(0).unwrap().holder(), Some(first.id()));
    assert_eq!(adapter.item(1).unwrap().holder(), Some(second.id()));

    // Rebinding the item the slot already shows is fine.
    adapter.rebind_slot(&mut first, 0).unwrap();
    assert_eq!(first.view().text, "a");
    assert_eq!(adapter.item(0).unwrap().holder(), Some(first.id()));
}

#[test]
fn clicks_reach_every_listener_with_the_current_item() {
    let mut adapter = Adapter::new();
    let mut host = RecordingHost::default();
    adapter.replace_items(labels(&["a", "b"]), &mut host);

    let seen = Rc::new(RefCell::new(Vec::new()));
    let first = {
        let seen = Rc::clone(&seen);
        adapter.add_click_listener(move |item| seen.borrow_mut().push(format!("1:{}", text_of(item))))
    };
    {
        let seen = Rc::clone(&seen);
        adapter.add_click_listener(move |item| seen.borrow_mut().push(format!("2:{}", text_of(item))));
    }

    let mut slot = adapter.create_slot(ViewType::of::<Label>()).unwrap();
    assert!(!slot.click());
    adapter.bind_slot(&mut slot, 0).unwrap();
    assert!(slot.click());
    adapter.rebind_slot(&mut slot, 1).unwrap();
    assert!(slot.click());
    assert!(adapter.remove_click_listener(first));
    assert!(!adapter.remove_click_listener(first));
    assert!(slot.click());

    assert_eq!(*seen.borrow(), ["1:a", "2:a", "1:b", "2:b", "2:b"]);

    adapter.unbind_slot(&mut slot).unwrap();
    assert!(!slot.click());
}

#[test]
fn long_click_runs_all_listeners_and_ors_their_results() {
    let mut adapter = Adapter::new();
    let mut host = RecordingHost::default();
    adapter.replace_items(labels(&["a"]), &mut host);

    let calls = Rc::new(Cell::new(0));
    let mut ids = Vec::new();
    for consume in [false, true, false] {
        let calls = Rc::clone(&calls);
        ids.push(adapter.add_long_click_listener(move |_| {
            calls.set(calls.get() + 1);
            consume
        }));
    }

    let mut slot = adapter.create_slot(ViewType::of::<Label>()).unwrap();
    adapter.bind_slot(&mut slot, 0).unwrap();
    assert!(slot.long_click());
    assert_eq!(calls.get(), 3);

    assert!(adapter.remove_long_click_listener(ids[1]));
    assert!(!slot.long_click());
    assert_eq!(calls.get(), 5);
}

// Change animator doubles.

#[derive(Default)]
struct ScriptState {
    started: bool,
    running: bool,
    ended: Option<AnimationEnd>,
    from: f32,
    fraction: f32,
    duration: Duration,
    delay: Duration,
    listeners: Vec<EndListener>,
}

/// An animation driven by the test: it only stops through `finish`, `cancel` or `end`.
#[derive(Clone, Default)]
struct ScriptedAnimation(Rc<RefCell<ScriptState>>);

impl ScriptedAnimation {
    fn new(from: f32, duration: Duration) -> Self {
        let animation = Self::default();
        {
            let mut s = animation.0.borrow_mut();
            s.from = from;
            s.fraction = from;
            s.duration = duration;
        }
        animation
    }

    fn from(&self) -> f32 {
        self.0.borrow().from
    }

    fn ended(&self) -> Option<AnimationEnd> {
        self.0.borrow().ended
    }

    fn delay(&self) -> Duration {
        self.0.borrow().delay
    }

    fn set_fraction(&self, fraction: f32) {
        self.0.borrow_mut().fraction = fraction;
    }

    fn finish(&self) {
        self.stop(AnimationEnd::Finished);
    }

    fn stop(&self, end: AnimationEnd) {
        let listeners = {
            let mut s = self.0.borrow_mut();
            if !s.started || s.ended.is_some() {
                return;
            }
            s.running = false;
            s.ended = Some(end);
            if end == AnimationEnd::Finished {
                s.fraction = 1.0;
            }
            std::mem::take(&mut s.listeners)
        };
        for listener in listeners {
            listener(end);
        }
    }
}

impl Animation for ScriptedAnimation {
    fn start(&mut self) {
        let mut s = self.0.borrow_mut();
        s.started = true;
        s.running = true;
    }

    fn cancel(&mut self) {
        self.stop(AnimationEnd::Cancelled);
    }

    fn end(&mut self) {
        self.0.borrow_mut().started = true;
        self.stop(AnimationEnd::Finished);
    }

    fn is_started(&self) -> bool {
        self.0.borrow().started
    }

    fn is_running(&self) -> bool {
        self.0.borrow().running
    }

    fn fraction(&self) -> f32 {
        self.0.borrow().fraction
    }

    fn duration(&self) -> Duration {
        self.0.borrow().duration
    }

    fn set_duration(&mut self, duration: Duration) {
        self.0.borrow_mut().duration = duration;
    }

    fn set_start_delay(&mut self, delay: Duration) {
        self.0.borrow_mut().delay = delay;
    }

    fn on_end(&mut self, listener: EndListener) {
        self.0.borrow_mut().listeners.push(listener);
    }
}

#[derive(Default)]
struct SpinView {
    text: String,
    animations: Vec<ScriptedAnimation>,
}

#[derive(Debug, PartialEq, Eq, Hash)]
struct Spinner {
    label: String,
    splice: bool,
}

impl Item<SpinView> for Spinner {
    fn slot_factory(&self) -> SlotFactory<SpinView> {
        Arc::new(SpinView::default)
    }

    fn bind(&self, view: &mut SpinView) {
        view.text = self.label.clone();
    }

    fn can_animate_change(&self, next: &dyn Item<SpinView>) -> bool {
        next.is::<Spinner>()
    }

    fn animate_change(
        &self,
        view: &mut SpinView,
        next: &dyn Item<SpinView>,
    ) -> Option<Box<dyn Animation>> {
        let next = next.downcast_ref::<Spinner>()?;
        view.text = next.label.clone();
        let animation = ScriptedAnimation::new(0.0, Duration::from_millis(5000));
        view.animations.push(animation.clone());
        Some(Box::new(animation))
    }

    fn continue_change(
        &self,
        view: &mut SpinView,
        next: &dyn Item<SpinView>,
        interrupted: &dyn Animation,
    ) -> Option<Box<dyn Animation>> {
        if !self.splice {
            return None;
        }
        let next = next.downcast_ref::<Spinner>()?;
        view.text = next.label.clone();
        let from = interrupted.fraction();
        let animation =
            ScriptedAnimation::new(from, Duration::from_millis(5000).mul_f32(1.0 - from));
        view.animations.push(animation.clone());
        Some(Box::new(animation))
    }
}

#[derive(Debug, PartialEq, Eq, Hash)]
struct Plain(u32);

impl Item<SpinView> for Plain {
    fn slot_factory(&self) -> SlotFactory<SpinView> {
        Arc::new(SpinView::default)
    }

    fn bind(&self, view: &mut SpinView) {
        view.text = self.0.to_string();
    }
}

#[derive(Default)]
struct RecordingAnimator {
    calls: Vec<&'static str>,
    pending: bool,
    running: bool,
    durations: Durations,
    listener: Option<Rc<dyn AnimatorListener>>,
}

impl RecordingAnimator {
    fn finish(&mut self, slot: SlotId) {
        if let Some(listener) = &self.listener {
            listener.on_animation_finished(slot);
        }
    }
}

impl AnimatorControl for RecordingAnimator {
    fn run_pending_animations(&mut self) {
        self.calls.push("run");
        self.running |= std::mem::take(&mut self.pending);
    }

    fn end_animation(&mut self, _slot: SlotId) {
        self.calls.push("end one");
    }

    fn end_animations(&mut self) {
        self.calls.push("end all");
    }

    fn is_running(&self) -> bool {
        self.running
    }

    fn durations(&self) -> Durations {
        self.durations
    }

    fn set_durations(&mut self, durations: Durations) {
        self.durations = durations;
    }

    fn set_listener(&mut self, listener: Option<Rc<dyn AnimatorListener>>) {
        self.listener = listener;
    }
}

impl ItemAnimator<SpinView> for RecordingAnimator {
    fn animate_appearance(
        &mut self,
        _slot: SlotId,
        _pre: Option<HolderInfo>,
        _post: HolderInfo,
    ) -> bool {
        self.calls.push("appear");
        self.pending = true;
        true
    }

    fn animate_disappearance(
        &mut self,
        _slot: SlotId,
        _pre: HolderInfo,
        _post: Option<HolderInfo>,
    ) -> bool {
        self.calls.push("disappear");
        self.pending = true;
        true
    }

    fn animate_persistence(&mut self, _slot: SlotId, _pre: HolderInfo, _post: HolderInfo) -> bool {
        self.calls.push("persist");
        self.pending = true;
        true
    }

    fn animate_change(
        &mut self,
        change: SlotChange<'_, SpinView>,
        _pre: HolderInfo,
        _post: HolderInfo,
    ) -> bool {
        self.calls.push(match change {
            SlotChange::InPlace { .. } => "change in place",
            SlotChange::Replaced { .. } => "change replaced",
        });
        self.pending = true;
        true
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum AnimEvent {
    Started(SlotId),
    Finished(SlotId),
    AllFinished,
}

#[derive(Default)]
struct RecordingListener {
    events: RefCell<Vec<AnimEvent>>,
}

impl RecordingListener {
    fn take(&self) -> Vec<AnimEvent> {
        std::mem::take(&mut *self.events.borrow_mut())
    }
}

impl AnimatorListener for RecordingListener {
    fn on_animation_started(&self, slot: SlotId) {
        self.events.borrow_mut().push(AnimEvent::Started(slot));
    }

    fn on_animation_finished(&self, slot: SlotId) {
        self.events.borrow_mut().push(AnimEvent::Finished(slot));
    }

    fn on_animations_finished(&self) {
        self.events.borrow_mut().push(AnimEvent::AllFinished);
    }
}

fn spinner(label: &str, splice: bool) -> ItemRef<SpinView> {
    ItemRef::new(Spinner {
        label: label.to_owned(),
        splice,
    })
}

fn change_setup(
    splice: bool,
) -> (
    ChangeAnimator<RecordingAnimator>,
    Rc<RecordingListener>,
    Slot<SpinView>,
) {
    let mut animator = ChangeAnimator::new(RecordingAnimator::default());
    let listener = Rc::new(RecordingListener::default());
    let upward: Rc<dyn AnimatorListener> = listener.clone();
    animator.set_listener(Some(upward));

    let mut slot = Slot::new(ViewType::of::<Spinner>(), SpinView::default());
    slot.bind(spinner("a", splice)).unwrap();
    (animator, listener, slot)
}

fn request(
    animator: &mut ChangeAnimator<RecordingAnimator>,
    slot: &mut Slot<SpinView>,
    next: &ItemRef<SpinView>,
) -> bool {
    animator.animate_change(
        SlotChange::InPlace { slot, next },
        HolderInfo::default(),
        HolderInfo::default(),
    )
}

/// What the host does once a change was handed to the animator.
fn rebind(slot: &mut Slot<SpinView>, item: ItemRef<SpinView>) {
    slot.unbind().unwrap();
    slot.bind(item).unwrap();
}

#[test]
fn change_animation_runs_and_finishes() {
    let (mut animator, listener, mut slot) = change_setup(true);
    let id = slot.id();

    assert!(request(&mut animator, &mut slot, &spinner("b", true)));
    assert!(animator.is_changing(id));
    assert_eq!(slot.view().text, "b");
    let animation = slot.view().animations[0].clone();
    assert!(!animation.is_started());
    assert!(!animator.is_running());

    animator.run_pending_animations();
    assert!(animation.is_running());
    assert!(animator.is_running());
    assert_eq!(listener.take(), vec![AnimEvent::Started(id)]);

    animation.finish();
    assert!(!animator.is_changing(id));
    assert!(!animator.is_running());
    assert_eq!(
        listener.take(),
        vec![AnimEvent::Finished(id), AnimEvent::AllFinished]
    );
}

#[test]
fn interrupted_change_is_spliced_from_its_current_fraction() {
    let (mut animator, listener, mut slot) = change_setup(true);
    let id = slot.id();
    let b = spinner("b", true);

    request(&mut animator, &mut slot, &b);
    animator.run_pending_animations();
    listener.take();
    rebind(&mut slot, b);

    let first = slot.view().animations[0].clone();
    first.set_fraction(0.4);
    request(&mut animator, &mut slot, &spinner("c", true));

    assert_eq!(first.ended(), Some(AnimationEnd::Cancelled));
    let second = slot.view().animations[1].clone();
    assert_eq!(second.from(), 0.4);
    assert!(!second.is_started());
    assert_eq!(animator.change_count(), 1);
    // The superseded animation does not finish the slot.
    assert!(listener.take().is_empty());

    animator.run_pending_animations();
    assert!(second.is_running());
    second.finish();
    assert_eq!(
        listener.take(),
        vec![
            AnimEvent::Started(id),
            AnimEvent::Finished(id),
            AnimEvent::AllFinished
        ]
    );
}

#[test]
fn change_without_splicing_is_chained_after_the_running_one() {
    let (mut animator, listener, mut slot) = change_setup(false);
    let id = slot.id();
    let b = spinner("b", false);

    request(&mut animator, &mut slot, &b);
    animator.run_pending_animations();
    listener.take();
    rebind(&mut slot, b);
    request(&mut animator, &mut slot, &spinner("c", false));

    let first = slot.view().animations[0].clone();
    let second = slot.view().animations[1].clone();
    assert!(first.is_running());
    assert!(!second.is_started());

    first.finish();
    assert!(second.is_running());
    assert!(animator.is_changing(id));
    assert!(listener.take().is_empty());

    second.finish();
    assert!(!animator.is_changing(id));
    assert_eq!(
        listener.take(),
        vec![AnimEvent::Finished(id), AnimEvent::AllFinished]
    );
}

#[test]
fn pending_change_is_replaced_without_splicing() {
    let (mut animator, listener, mut slot) = change_setup(true);
    let b = spinner("b", true);

    request(&mut animator, &mut slot, &b);
    rebind(&mut slot, b);
    request(&mut animator, &mut slot, &spinner("c", true));

    let first = slot.view().animations[0].clone();
    let second = slot.view().animations[1].clone();
    assert_eq!(second.from(), 0.0);
    assert_eq!(animator.change_count(), 1);

    animator.run_pending_animations();
    assert!(!first.is_started());
    assert_eq!(first.ended(), None);
    assert!(second.is_running());
    assert_eq!(listener.take(), vec![AnimEvent::Started(slot.id())]);
}

#[test]
fn changes_items_cannot_animate_go_to_the_wrapped_one() {
    let (mut animator, listener, mut slot) = change_setup(true);
    let id = slot.id();

    assert!(request(&mut animator, &mut slot, &ItemRef::new(Plain(1))));
    assert!(!animator.is_changing(id));
    assert!(animator.change_animations_scheduled());
    assert!(slot.view().animations.is_empty());
    assert_eq!(
        animator.with_wrapped(|a| a.calls.clone()),
        ["change in place"]
    );

    animator.with_wrapped_mut(|a| a.finish(id));
    assert!(!animator.change_animations_scheduled());
    assert_eq!(listener.take(), vec![AnimEvent::Finished(id)]);
}

#[test]
fn change_duration_tracks_in_flight_animations() {
    let (mut animator, _listener, mut slot) = change_setup(true);
    let wrapped_change = Durations::default().change;
    assert_eq!(animator.durations().change, wrapped_change);

    request(&mut animator, &mut slot, &spinner("b", true));
    assert_eq!(animator.durations().change, Duration::from_millis(5000));

    animator.set_change_duration(Duration::from_secs(1));
    let animation = slot.view().animations[0].clone();
    assert_eq!(animation.duration(), Duration::from_secs(1));
    assert_eq!(
        animator.with_wrapped(|a| a.durations.change),
        Duration::from_secs(1)
    );

    let mut durations = animator.durations();
    durations.add = Duration::from_millis(42);
    animator.set_durations(durations);
    assert_eq!(animation.duration(), Duration::from_secs(1));
    assert_eq!(
        animator.with_wrapped(|a| a.durations.add),
        Duration::from_millis(42)
    );
}

#[test]
fn running_state_combines_wrapped_and_tracked_animations() {
    let (mut animator, _listener, slot) = change_setup(true);
    assert!(!animator.is_running());

    ItemAnimator::<SpinView>::animate_appearance(
        &mut animator,
        slot.id(),
        None,
        HolderInfo::new(0, 0, 10, 10),
    );
    assert!(animator.appear_animations_scheduled());
    animator.run_pending_animations();
    assert!(animator.is_running());

    animator.with_wrapped_mut(|a| {
        a.running = false;
        a.finish(slot.id());
    });
    assert!(!animator.appear_animations_scheduled());
    assert!(!animator.is_running());
}

#[test]
fn change_waits_for_scheduled_disappearances() {
    let (mut animator, _listener, mut slot) = change_setup(true);
    let gone = Slot::new(ViewType::of::<Spinner>(), SpinView::default());

    ItemAnimator::<SpinView>::animate_disappearance(
        &mut animator,
        gone.id(),
        HolderInfo::default(),
        None,
    );
    assert!(animator.disappear_animations_scheduled());
    request(&mut animator, &mut slot, &spinner("b", true));
    animator.run_pending_animations();

    let animation = slot.view().animations[0].clone();
    assert_eq!(animation.delay(), Durations::default().remove);
    assert_eq!(
        animator.with_wrapped(|a| a.calls.clone()),
        ["disappear", "run"]
    );
}

#[test]
fn ending_animations_fast_forwards_chained_changes() {
    let (mut animator, listener, mut slot) = change_setup(false);
    let id = slot.id();
    let b = spinner("b", false);

    request(&mut animator, &mut slot, &b);
    animator.run_pending_animations();
    rebind(&mut slot, b);
    request(&mut animator, &mut slot, &spinner("c", false));
    listener.take();

    animator.end_animations();
    let first = slot.view().animations[0].clone();
    let second = slot.view().animations[1].clone();
    assert_eq!(first.ended(), Some(AnimationEnd::Finished));
    assert_eq!(second.ended(), Some(AnimationEnd::Finished));
    assert_eq!(animator.change_count(), 0);
    assert_eq!(
        listener.take(),
        vec![AnimEvent::Finished(id), AnimEvent::AllFinished]
    );
    assert!(animator.with_wrapped(|a| a.calls.contains(&"end all")));
}

#[test]
fn ending_one_slot_leaves_others_running() {
    let (mut animator, _listener, mut slot) = change_setup(true);
    let mut other = Slot::new(ViewType::of::<Spinner>(), SpinView::default());
    other.bind(spinner("x", true)).unwrap();

    request(&mut animator, &mut slot, &spinner("b", true));
    request(&mut animator, &mut other, &spinner("y", true));
    animator.run_pending_animations();

    animator.end_animation(slot.id());
    assert!(!animator.is_changing(slot.id()));
    assert!(animator.is_changing(other.id()));
    assert!(other.view().animations[0].is_running());
}

#[test]
fn updated_slots_are_reused_for_self_animating_items() {
    let (animator, _listener, slot) = change_setup(true);
    assert!(animator.can_reuse_updated_slot(&slot, &spinner("b", true)));
    assert!(!animator.can_reuse_updated_slot(&slot, &ItemRef::new(Plain(2))));
}
