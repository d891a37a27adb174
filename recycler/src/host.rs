use crate::ItemRef;

/// The rendering side of an [`crate::Adapter`].
///
/// Positions are always relative to the host's current view of the sequence, i.e. after every
/// previously delivered notification has been applied.
pub trait RenderHost<V> {
    fn notify_inserted(&mut self, position: usize, count: usize);

    fn notify_removed(&mut self, position: usize, count: usize);

    /// The item at `from` now lives at `to` (removed first, then inserted).
    fn notify_moved(&mut self, from: usize, to: usize);

    /// `payload.len()` items starting at `position` changed content; `payload` holds the new
    /// items.
    fn notify_changed(&mut self, position: usize, payload: &[ItemRef<V>]);

    /// Everything is stale: re-render the whole list without animations.
    fn notify_data_set_changed(&mut self);
}
