use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

use recycler::{
    Adapter, Animation, AnimatorControl, ChangeAnimator, HolderInfo, Item, ItemAnimator, ItemRef,
    RenderHost, Slot, SlotChange, SlotFactory,
};
use recycler_tween::{Easing, Timeline, TweenAnimation, TweenItemAnimator};

const ROW_HEIGHT: i32 = 48;
const TURN_MS: u64 = 5000;

thread_local! {
    static CLOCK: Timeline = Timeline::new();
}

#[derive(Default)]
struct CounterView {
    text: String,
    spin: Option<TweenAnimation>,
}

impl CounterView {
    fn rotation(&self) -> f32 {
        self.spin.as_ref().map_or(0.0, TweenAnimation::value)
    }
}

/// A row showing a number. Clicking increments it, which spins the row once around.
#[derive(Debug, PartialEq, Eq, Hash)]
struct Counter(u32);

impl Item<CounterView> for Counter {
    fn slot_factory(&self) -> SlotFactory<CounterView> {
        Arc::new(CounterView::default)
    }

    fn bind(&self, view: &mut CounterView) {
        view.text = self.0.to_string();
    }

    fn can_animate_change(&self, next: &dyn Item<CounterView>) -> bool {
        next.is::<Counter>()
    }

    fn animate_change(
        &self,
        view: &mut CounterView,
        next: &dyn Item<CounterView>,
    ) -> Option<Box<dyn Animation>> {
        let next = next.downcast_ref::<Counter>()?;
        view.text = next.0.to_string();
        let spin = CLOCK.with(|clock| {
            TweenAnimation::new(
                clock,
                0.0,
                360.0,
                Duration::from_millis(TURN_MS),
                Easing::EaseInOutCubic,
            )
        });
        view.spin = Some(spin.clone());
        Some(Box::new(spin))
    }

    fn continue_change(
        &self,
        view: &mut CounterView,
        next: &dyn Item<CounterView>,
        _interrupted: &dyn Animation,
    ) -> Option<Box<dyn Animation>> {
        let next = next.downcast_ref::<Counter>()?;
        view.text = next.0.to_string();

        // Keep turning from the current angle, at constant speed.
        let from = view.rotation();
        let remaining = Duration::from_millis(TURN_MS).mul_f32((360.0 - from) / 360.0);
        let spin =
            CLOCK.with(|clock| TweenAnimation::new(clock, from, 360.0, remaining, Easing::Linear));
        view.spin = Some(spin.clone());
        Some(Box::new(spin))
    }
}

enum Note {
    Inserted(usize, usize),
    Removed(usize, usize),
    Moved(usize, usize),
    Changed(usize, usize),
    Reset,
}

/// Records notifications; `Screen::sync` applies them once the adapter call returned.
#[derive(Default)]
struct Notes(Vec<Note>);

impl RenderHost<CounterView> for Notes {
    fn notify_inserted(&mut self, position: usize, count: usize) {
        self.0.push(Note::Inserted(position, count));
    }

    fn notify_removed(&mut self, position: usize, count: usize) {
        self.0.push(Note::Removed(position, count));
    }

    fn notify_moved(&mut self, from: usize, to: usize) {
        self.0.push(Note::Moved(from, to));
    }

    fn notify_changed(&mut self, position: usize, payload: &[ItemRef<CounterView>]) {
        self.0.push(Note::Changed(position, payload.len()));
    }

    fn notify_data_set_changed(&mut self) {
        self.0.push(Note::Reset);
    }
}

type Animator = ChangeAnimator<TweenItemAnimator<CounterView>>;

/// Every row is on screen, so there is one slot per item and no recycling.
struct Screen {
    rows: Vec<Slot<CounterView>>,
    notes: Notes,
}

fn bounds(position: usize) -> HolderInfo {
    let top = position as i32 * ROW_HEIGHT;
    HolderInfo::new(0, top, 320, top + ROW_HEIGHT)
}

impl Screen {
    fn sync(
        &mut self,
        adapter: &mut Adapter<CounterView>,
        animator: &mut Animator,
    ) -> recycler::Result<()> {
        for note in std::mem::take(&mut self.notes.0) {
            match note {
                Note::Inserted(position, count) => {
                    for i in position..position + count {
                        let mut slot = adapter.create_slot(adapter.view_type(i)?)?;
                        adapter.bind_slot(&mut slot, i)?;
                        ItemAnimator::<CounterView>::animate_appearance(
                            animator,
                            slot.id(),
                            None,
                            bounds(i),
                        );
                        self.rows.insert(i, slot);
                    }
                }
                Note::Removed(position, count) => {
                    let removed: Vec<_> = self.rows.drain(position..position + count).collect();
                    for (i, mut slot) in removed.into_iter().enumerate() {
                        ItemAnimator::<CounterView>::animate_disappearance(
                            animator,
                            slot.id(),
                            bounds(position + i),
                            None,
                        );
                        adapter.unbind_slot(&mut slot)?;
                    }
                }
                Note::Moved(from, to) => {
                    let slot = self.rows.remove(from);
                    ItemAnimator::<CounterView>::animate_persistence(
                        animator,
                        slot.id(),
                        bounds(from),
                        bounds(to),
                    );
                    self.rows.insert(to, slot);
                }
                Note::Changed(position, count) => {
                    for i in position..position + count {
                        let Some(next) = adapter.item(i).cloned() else {
                            continue;
                        };
                        let slot = &mut self.rows[i];
                        animator.animate_change(
                            SlotChange::InPlace {
                                slot: &mut *slot,
                                next: &next,
                            },
                            bounds(i),
                            bounds(i),
                        );
                        adapter.rebind_slot(slot, i)?;
                    }
                }
                Note::Reset => {
                    animator.end_animations();
                    for mut slot in self.rows.drain(..) {
                        adapter.unbind_slot(&mut slot)?;
                    }
                    for i in 0..adapter.len() {
                        let mut slot = adapter.create_slot(adapter.view_type(i)?)?;
                        adapter.bind_slot(&mut slot, i)?;
                        self.rows.push(slot);
                    }
                }
            }
        }
        animator.run_pending_animations();
        Ok(())
    }

    fn describe(&self, position: usize) -> String {
        let view = self.rows[position].view();
        format!("row {position}: {:>3} at {:>5.1} deg", view.text, view.rotation())
    }
}

/// Replaces the item at `position` with the next count, the way an app with immutable items does.
fn increment(
    adapter: &mut Adapter<CounterView>,
    position: usize,
    host: &mut Notes,
) -> Option<()> {
    let current = adapter.item(position)?.downcast_ref::<Counter>()?.0;
    let mut items = adapter.items().to_vec();
    items[position] = ItemRef::new(Counter(current + 1));
    adapter.replace_items(items, host);
    Some(())
}

fn main() -> recycler::Result<()> {
    // Example: the adapter, the change animator and a tween engine driven by a manual clock.
    //
    // A host would:
    // - forward adapter notifications to its layout (here: `Screen::sync`)
    // - hand in-place changes to the change animator before rebinding the slot
    // - advance the timeline and poll pending diffs from its frame tick
    let clock = CLOCK.with(Timeline::clone);
    let mut adapter = Adapter::new();
    let mut animator = ChangeAnimator::new(TweenItemAnimator::new(&clock));
    let mut screen = Screen {
        rows: Vec::new(),
        notes: Notes::default(),
    };

    adapter.replace_items(
        (1..=20).map(|n| ItemRef::new(Counter(n))).collect(),
        &mut screen.notes,
    );
    screen.sync(&mut adapter, &mut animator)?;

    let clicked = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&clicked);
    adapter.add_click_listener(move |item| sink.borrow_mut().push(item.clone()));
    let long_clicked = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&long_clicked);
    adapter.add_long_click_listener(move |item| {
        sink.borrow_mut().push(item.clone());
        true
    });

    // Two clicks on the same row: the second one lands mid-spin and is spliced onto it.
    let script = [(0u64, "click", 2usize), (2_500, "click", 2), (3_000, "long click", 5)];
    let mut script = script.into_iter().peekable();

    let mut now_ms = 0u64;
    while now_ms <= 10_000 {
        clock.advance_to(now_ms);
        adapter.poll_diff(&mut screen.notes);

        while let Some((_, action, row)) = script.next_if(|(at, _, _)| *at <= now_ms) {
            println!("t={now_ms} {action} on row {row}");
            match action {
                "click" => screen.rows[row].click(),
                _ => screen.rows[row].long_click(),
            };
        }
        for item in clicked.borrow_mut().drain(..) {
            if let Some(position) = adapter.items().iter().position(|i| ItemRef::ptr_eq(i, &item)) {
                increment(&mut adapter, position, &mut screen.notes);
            }
        }
        for item in long_clicked.borrow_mut().drain(..) {
            adapter.remove(&item, &mut screen.notes);
        }
        screen.sync(&mut adapter, &mut animator)?;

        if now_ms % 500 == 0 {
            println!("t={now_ms} {} | {}", screen.describe(2), screen.describe(5));
        }
        if script.peek().is_none() && !animator.is_running() {
            break;
        }
        now_ms += 20;
    }

    println!(
        "done at t={now_ms}: {} rows, row 2 shows {}",
        adapter.len(),
        screen.rows[2].view().text
    );
    Ok(())
}
