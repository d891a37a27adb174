use std::rc::Rc;
use std::time::Duration;

use crate::{ItemRef, Slot, SlotId};

/// Layout bounds of a slot before or after a layout pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HolderInfo {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl HolderInfo {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }
}

/// Per-kind animation durations of an item animator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Durations {
    pub add: Duration,
    pub change: Duration,
    pub move_: Duration,
    pub remove: Duration,
}

impl Default for Durations {
    fn default() -> Self {
        Self {
            add: Duration::from_millis(120),
            change: Duration::from_millis(250),
            move_: Duration::from_millis(250),
            remove: Duration::from_millis(120),
        }
    }
}

/// Observer of an item animator, typically the host's layout engine.
pub trait AnimatorListener {
    fn on_animation_started(&self, slot: SlotId) {
        let _ = slot;
    }

    /// The animation of `slot` ended; the slot may be recycled once nothing else animates it.
    fn on_animation_finished(&self, slot: SlotId);

    /// No animation of any kind is left running.
    fn on_animations_finished(&self) {}
}

/// The part of an item animator that does not depend on the surface type.
pub trait AnimatorControl {
    /// Starts everything requested since the previous call.
    fn run_pending_animations(&mut self);

    /// Fast-forwards every animation of `slot` to its final state.
    fn end_animation(&mut self, slot: SlotId);

    fn end_animations(&mut self);

    fn is_running(&self) -> bool;

    fn durations(&self) -> Durations;

    fn set_durations(&mut self, durations: Durations);

    fn set_change_duration(&mut self, change: Duration) {
        let mut durations = self.durations();
        durations.change = change;
        self.set_durations(durations);
    }

    fn set_listener(&mut self, listener: Option<Rc<dyn AnimatorListener>>);
}

/// The two shapes a change animation can take.
pub enum SlotChange<'a, V> {
    /// The slot keeps showing the item and animates towards `next` in place.
    InPlace {
        slot: &'a mut Slot<V>,
        next: &'a ItemRef<V>,
    },
    /// The host bound `next` into a fresh slot; `old` fades out while `new` fades in.
    Replaced { old: SlotId, new: SlotId },
}

impl<V: 'static> SlotChange<'_, V> {
    /// The slot whose animation the change belongs to.
    pub fn slot_id(&self) -> SlotId {
        match self {
            Self::InPlace { slot, .. } => slot.id(),
            Self::Replaced { old, .. } => *old,
        }
    }
}

/// A host item animator, driven by the host's layout engine.
///
/// The `animate_*` methods only record intent and return whether
/// [`AnimatorControl::run_pending_animations`] needs to be called.
pub trait ItemAnimator<V>: AnimatorControl {
    fn animate_appearance(
        &mut self,
        slot: SlotId,
        pre: Option<HolderInfo>,
        post: HolderInfo,
    ) -> bool;

    fn animate_disappearance(
        &mut self,
        slot: SlotId,
        pre: HolderInfo,
        post: Option<HolderInfo>,
    ) -> bool;

    fn animate_persistence(&mut self, slot: SlotId, pre: HolderInfo, post: HolderInfo) -> bool;

    fn animate_change(&mut self, change: SlotChange<'_, V>, pre: HolderInfo, post: HolderInfo)
    -> bool;

    /// Whether the host may keep `slot` for `next` instead of binding a fresh one.
    fn can_reuse_updated_slot(&self, slot: &Slot<V>, next: &ItemRef<V>) -> bool {
        let _ = (slot, next);
        false
    }
}
