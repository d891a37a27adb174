use thiserror::Error;

use crate::{SlotId, ViewType};

/// Contract violations between the adapter and its rendering host.
///
/// These indicate a defect in the surrounding application rather than a runtime condition, so
/// there is no recovery path: hosts usually `expect` them at the call site.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// No slot factory was registered for the requested view type.
    #[error("unknown view type {0:?}: no item of this kind was ever handed to the adapter")]
    UnknownViewType(ViewType),

    /// `bind` was called on a slot that already holds an item.
    #[error("slot {0:?} is already bound")]
    SlotAlreadyBound(SlotId),

    /// `unbind` was called on a slot that holds no item.
    #[error("slot {0:?} is not bound")]
    SlotNotBound(SlotId),

    /// The item is still bound to another slot.
    #[error("item is already bound to slot {0:?}")]
    ItemAlreadyBound(SlotId),

    #[error("position {position} out of range for {len} items")]
    PositionOutOfRange { position: usize, len: usize },

    /// `start..=end` does not describe a valid range of the item sequence.
    #[error("range {start}..={end} out of bounds for {len} items")]
    RangeOutOfBounds { start: usize, end: usize, len: usize },
}

pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Failures of a diff computation.
///
/// Never returned to callers: the engine logs them and falls back to a full invalidate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiffError {
    /// An item's equality implementation panicked while the diff was running.
    #[error("diff computation panicked: {0}")]
    Panicked(String),

    /// The worker computing a background diff went away without producing a result.
    #[error("diff worker exited without a result")]
    WorkerLost,
}
