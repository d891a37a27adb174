use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use crate::diff::{EditOp, EditScript};
use crate::dispatch::{DiffDispatcher, DiffOutcome};
use crate::{
    AdapterOptions, DiffHandle, DiffOptions, Error, ItemList, ItemRef, RenderHost, Result, Slot,
    SlotFactory, StableId, ViewType,
};

/// Identifies a registered click or long-click listener.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type ClickListener<V> = Rc<dyn Fn(&ItemRef<V>)>;
type LongClickListener<V> = Rc<dyn Fn(&ItemRef<V>) -> bool>;
type SlotHook<V> = Box<dyn FnMut(&mut Slot<V>)>;

/// Owner of an item sequence and the bridge between it and a [`RenderHost`].
///
/// The adapter is driven from the host's UI context:
/// - [`Adapter::set_items`] replaces the sequence through a diff (inline for short sequences, on a
///   worker otherwise),
/// - [`Adapter::poll_diff`] delivers worker results, typically once per frame,
/// - the direct mutators (`insert_at`, `remove_at`, `remove_range`, ...) bypass diffing and
///   notify the host with a single range notification.
///
/// The sequence reported by [`Adapter::items`] is always the one the host has been told about.
pub struct Adapter<V> {
    items: ItemList<V>,
    factories: HashMap<ViewType, SlotFactory<V>>,
    click_listeners: Rc<RefCell<Vec<(ListenerId, ClickListener<V>)>>>,
    long_click_listeners: Rc<RefCell<Vec<(ListenerId, LongClickListener<V>)>>>,
    next_listener: u64,
    on_slot_bound: Option<SlotHook<V>>,
    on_slot_unbound: Option<SlotHook<V>>,
    diff: DiffDispatcher<V>,
}

enum Notice {
    Inserted { position: usize, count: usize },
    Removed { position: usize, count: usize },
    Nothing,
}

impl<V: 'static> Adapter<V> {
    pub fn new() -> Self {
        Self::with_options(AdapterOptions::default())
    }

    pub fn with_options(options: AdapterOptions) -> Self {
        Self {
            items: Arc::new(Vec::new()),
            factories: HashMap::new(),
            click_listeners: Rc::new(RefCell::new(Vec::new())),
            long_click_listeners: Rc::new(RefCell::new(Vec::new())),
            next_listener: 0,
            on_slot_bound: None,
            on_slot_unbound: None,
            diff: DiffDispatcher::new(options.diff),
        }
    }

    pub fn diff_options(&self) -> &DiffOptions {
        self.diff.options()
    }

    pub fn set_detect_moves(&mut self, detect_moves: bool) {
        self.diff.set_detect_moves(detect_moves);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The current sequence. Cloning the returned `Arc` is the cheap way to derive a new one.
    pub fn items(&self) -> &ItemList<V> {
        &self.items
    }

    pub fn item(&self, position: usize) -> Option<&ItemRef<V>> {
        self.items.get(position)
    }

    pub fn stable_id(&self, position: usize) -> Result<StableId> {
        self.checked(position).map(ItemRef::stable_id)
    }

    pub fn view_type(&self, position: usize) -> Result<ViewType> {
        self.checked(position).map(ItemRef::view_type)
    }

    fn checked(&self, position: usize) -> Result<&ItemRef<V>> {
        self.items.get(position).ok_or(Error::PositionOutOfRange {
            position,
            len: self.items.len(),
        })
    }

    /// Replaces the sequence, notifying `host` with the minimal set of changes.
    ///
    /// Passing the current sequence back is a no-op. Long sequences are diffed on a worker: the
    /// returned handle identifies that computation and the host is notified by a later
    /// [`Adapter::poll_diff`]. Any diff still outstanding is superseded.
    pub fn set_items<H: RenderHost<V> + ?Sized>(
        &mut self,
        items: ItemList<V>,
        host: &mut H,
    ) -> Option<DiffHandle> {
        self.register_kinds(&items);
        let outcome = self.diff.submit(&self.items, items);
        self.apply(outcome, host)
    }

    pub fn replace_items<H: RenderHost<V> + ?Sized>(
        &mut self,
        items: Vec<ItemRef<V>>,
        host: &mut H,
    ) -> Option<DiffHandle> {
        self.set_items(Arc::new(items), host)
    }

    /// The outstanding worker diff, if any.
    pub fn pending_diff(&self) -> Option<&DiffHandle> {
        self.diff.pending_handle()
    }

    /// Applies the outstanding worker diff if it has completed.
    ///
    /// Returns whether the sequence changed.
    pub fn poll_diff<H: RenderHost<V> + ?Sized>(&mut self, host: &mut H) -> bool {
        match self.diff.poll() {
            Some(outcome) => {
                self.apply(outcome, host);
                true
            }
            None => false,
        }
    }

    /// Blocks until the outstanding worker diff completes, then applies it.
    pub fn wait_diff<H: RenderHost<V> + ?Sized>(&mut self, host: &mut H) -> bool {
        match self.diff.wait() {
            Some(outcome) => {
                self.apply(outcome, host);
                true
            }
            None => false,
        }
    }

    /// Detaches from the host: the outstanding diff is cancelled and its result never delivered.
    ///
    /// The sequence it was diffing towards is adopted silently.
    pub fn detach(&mut self) {
        if self.settle() {
            rdebug!(len = self.items.len(), "detached with a diff outstanding");
        }
    }

    fn apply<H: RenderHost<V> + ?Sized>(
        &mut self,
        outcome: DiffOutcome<V>,
        host: &mut H,
    ) -> Option<DiffHandle> {
        match outcome {
            DiffOutcome::Unchanged => None,
            DiffOutcome::Invalidate(items) => {
                self.items = items;
                host.notify_data_set_changed();
                None
            }
            DiffOutcome::Ready { script, items } => {
                self.items = items;
                dispatch_updates(&script, &self.items, host);
                None
            }
            DiffOutcome::Pending(handle) => Some(handle),
        }
    }

    /// Cancels an outstanding diff and adopts its target sequence.
    ///
    /// Returns `true` if the host no longer knows what the sequence looks like.
    fn settle(&mut self) -> bool {
        match self.diff.cancel() {
            Some(items) => {
                self.items = items;
                true
            }
            None => false,
        }
    }

    fn register_kinds(&mut self, items: &[ItemRef<V>]) {
        for item in items {
            self.factories
                .entry(item.view_type())
                .or_insert_with(|| item.get().slot_factory());
        }
    }

    /// Runs a direct edit and tells the host about it.
    ///
    /// With a diff outstanding the host's view of the sequence is unknown, so it gets a full
    /// invalidate instead of the range notification.
    fn edit<H: RenderHost<V> + ?Sized, T>(
        &mut self,
        host: &mut H,
        edit: impl FnOnce(&mut ItemList<V>) -> Result<(T, Notice)>,
    ) -> Result<T> {
        let stale = self.settle();
        let result = edit(&mut self.items);
        if stale {
            rdebug!("direct edit superseded an outstanding diff; invalidating");
            host.notify_data_set_changed();
        }
        let (value, notice) = result?;
        if !stale {
            match notice {
                Notice::Inserted { position, count } => host.notify_inserted(position, count),
                Notice::Removed { position, count } => host.notify_removed(position, count),
                Notice::Nothing => {}
            }
        }
        Ok(value)
    }

    /// Inserts `items` before `position` (`position == len` appends).
    pub fn insert_at<H: RenderHost<V> + ?Sized>(
        &mut self,
        position: usize,
        items: impl IntoIterator<Item = ItemRef<V>>,
        host: &mut H,
    ) -> Result<()> {
        self.splice_in(Some(position), items.into_iter().collect(), host)
    }

    pub fn insert<H: RenderHost<V> + ?Sized>(
        &mut self,
        position: usize,
        item: ItemRef<V>,
        host: &mut H,
    ) -> Result<()> {
        self.splice_in(Some(position), vec![item], host)
    }

    /// Appends one item.
    pub fn add<H: RenderHost<V> + ?Sized>(&mut self, item: ItemRef<V>, host: &mut H) {
        // Appending cannot be out of range.
        let _ = self.splice_in(None, vec![item], host);
    }

    pub fn extend<H: RenderHost<V> + ?Sized>(
        &mut self,
        items: impl IntoIterator<Item = ItemRef<V>>,
        host: &mut H,
    ) {
        // Appending cannot be out of range.
        let _ = self.splice_in(None, items.into_iter().collect(), host);
    }

    fn splice_in<H: RenderHost<V> + ?Sized>(
        &mut self,
        position: Option<usize>,
        items: Vec<ItemRef<V>>,
        host: &mut H,
    ) -> Result<()> {
        self.register_kinds(&items);
        self.edit(host, |list| {
            let len = list.len();
            let position = position.unwrap_or(len);
            if position > len {
                return Err(Error::PositionOutOfRange { position, len });
            }
            let count = items.len();
            if count == 0 {
                return Ok(((), Notice::Nothing));
            }
            Arc::make_mut(list).splice(position..position, items);
            Ok(((), Notice::Inserted { position, count }))
        })
    }

    /// Removes and returns the item at `position`.
    pub fn remove_at<H: RenderHost<V> + ?Sized>(
        &mut self,
        position: usize,
        host: &mut H,
    ) -> Result<ItemRef<V>> {
        self.edit(host, |list| {
            if position >= list.len() {
                return Err(Error::PositionOutOfRange {
                    position,
                    len: list.len(),
                });
            }
            let item = Arc::make_mut(list).remove(position);
            Ok((item, Notice::Removed { position, count: 1 }))
        })
    }

    /// Removes the first occurrence of `item` (by identity), returning where it was.
    pub fn remove<H: RenderHost<V> + ?Sized>(
        &mut self,
        item: &ItemRef<V>,
        host: &mut H,
    ) -> Option<usize> {
        let removed = self.edit(host, |list| {
            let Some(position) = list.iter().position(|i| ItemRef::ptr_eq(i, item)) else {
                return Ok((None, Notice::Nothing));
            };
            Arc::make_mut(list).remove(position);
            Ok((Some(position), Notice::Removed { position, count: 1 }))
        });
        removed.ok().flatten()
    }

    /// Removes the items at `start..=end` with a single notification.
    pub fn remove_range<H: RenderHost<V> + ?Sized>(
        &mut self,
        start: usize,
        end: usize,
        host: &mut H,
    ) -> Result<()> {
        self.edit(host, |list| {
            let len = list.len();
            if start > end || end >= len {
                return Err(Error::RangeOutOfBounds { start, end, len });
            }
            Arc::make_mut(list).drain(start..=end);
            Ok((
                (),
                Notice::Removed {
                    position: start,
                    count: end - start + 1,
                },
            ))
        })
    }

    /// Creates an empty slot able to show items of `view_type`.
    pub fn create_slot(&self, view_type: ViewType) -> Result<Slot<V>> {
        let factory = self
            .factories
            .get(&view_type)
            .ok_or(Error::UnknownViewType(view_type))?;
        Ok(Slot::new(view_type, factory()))
    }

    /// Binds the item at `position` into `slot` and wires click dispatch.
    ///
    /// Dispatch closures pass whichever item the slot shows when the event arrives.
    pub fn bind_slot(&mut self, slot: &mut Slot<V>, position: usize) -> Result<()> {
        let item = self.checked(position)?.clone();
        slot.bind(item)?;

        let listeners = Rc::clone(&self.click_listeners);
        slot.set_on_click(Some(Rc::new(move |item: &ItemRef<V>| {
            // Listeners may add or remove listeners while running.
            let snapshot: Vec<_> = listeners.borrow().iter().map(|(_, l)| Rc::clone(l)).collect();
            for listener in snapshot {
                listener(item);
            }
        })));
        let listeners = Rc::clone(&self.long_click_listeners);
        slot.set_on_long_click(Some(Rc::new(move |item: &ItemRef<V>| {
            let snapshot: Vec<_> = listeners.borrow().iter().map(|(_, l)| Rc::clone(l)).collect();
            let mut consumed = false;
            for listener in snapshot {
                consumed |= listener(item);
            }
            consumed
        })));

        if let Some(hook) = self.on_slot_bound.as_mut() {
            hook(slot);
        }
        Ok(())
    }

    /// Unbinds `slot`, returning the item it showed.
    pub fn unbind_slot(&mut self, slot: &mut Slot<V>) -> Result<ItemRef<V>> {
        let item = slot.unbind()?;
        if let Some(hook) = self.on_slot_unbound.as_mut() {
            hook(slot);
        }
        Ok(item)
    }

    /// Shows the item at `position` in `slot`, unbinding whatever it showed before.
    ///
    /// Fails without touching `slot` if the item is shown by another slot.
    pub fn rebind_slot(&mut self, slot: &mut Slot<V>, position: usize) -> Result<()> {
        let slot_id = slot.id();
        if let Some(other) = self.checked(position)?.holder().filter(|h| *h != slot_id) {
            return Err(Error::ItemAlreadyBound(other));
        }
        if slot.is_bound() {
            self.unbind_slot(slot)?;
        }
        self.bind_slot(slot, position)
    }

    pub fn failed_to_recycle(&self, slot: &mut Slot<V>) -> bool {
        slot.failed_to_recycle()
    }

    pub fn on_slot_bound(&mut self, hook: impl FnMut(&mut Slot<V>) + 'static) {
        self.on_slot_bound = Some(Box::new(hook));
    }

    pub fn on_slot_unbound(&mut self, hook: impl FnMut(&mut Slot<V>) + 'static) {
        self.on_slot_unbound = Some(Box::new(hook));
    }

    /// Registers a click listener. Listeners run in registration order.
    pub fn add_click_listener(&mut self, listener: impl Fn(&ItemRef<V>) + 'static) -> ListenerId {
        let id = self.next_listener_id();
        self.click_listeners
            .borrow_mut()
            .push((id, Rc::new(listener)));
        id
    }

    pub fn remove_click_listener(&mut self, id: ListenerId) -> bool {
        remove_listener(&self.click_listeners, id)
    }

    /// Registers a long-click listener.
    ///
    /// Every listener runs on each long click; the event counts as consumed if any of them
    /// returned `true`.
    pub fn add_long_click_listener(
        &mut self,
        listener: impl Fn(&ItemRef<V>) -> bool + 'static,
    ) -> ListenerId {
        let id = self.next_listener_id();
        self.long_click_listeners
            .borrow_mut()
            .push((id, Rc::new(listener)));
        id
    }

    pub fn remove_long_click_listener(&mut self, id: ListenerId) -> bool {
        remove_listener(&self.long_click_listeners, id)
    }

    fn next_listener_id(&mut self) -> ListenerId {
        self.next_listener += 1;
        ListenerId(self.next_listener)
    }
}

impl<V: 'static> Default for Adapter<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> fmt::Debug for Adapter<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Adapter")
            .field("len", &self.items.len())
            .field("view_types", &self.factories.len())
            .field("click_listeners", &self.click_listeners.borrow().len())
            .field("long_click_listeners", &self.long_click_listeners.borrow().len())
            .finish_non_exhaustive()
    }
}

fn remove_listener<L>(listeners: &RefCell<Vec<(ListenerId, L)>>, id: ListenerId) -> bool {
    let mut listeners = listeners.borrow_mut();
    let before = listeners.len();
    listeners.retain(|(other, _)| *other != id);
    listeners.len() != before
}

/// Forwards `script` to `host`; `items` is the sequence the script produces.
fn dispatch_updates<V, H: RenderHost<V> + ?Sized>(
    script: &EditScript,
    items: &[ItemRef<V>],
    host: &mut H,
) {
    for op in script {
        match *op {
            EditOp::Insert {
                position, count, ..
            } => host.notify_inserted(position, count),
            EditOp::Remove { position, count } => host.notify_removed(position, count),
            EditOp::Move { from, to } => host.notify_moved(from, to),
            EditOp::Change {
                position,
                new_index,
                count,
            } => host.notify_changed(position, &items[new_index..new_index + count]),
        }
    }
}
