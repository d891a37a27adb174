//! A headless list-adapter engine with diff-based updates and self-animating items.
//!
//! For a reference animation engine and a default host item animator, see the `recycler-tween`
//! crate.
//!
//! The crate sits between an item sequence and a rendering host:
//! - [`Item`] is the contract of a row: content equality, a slot factory, bind/unbind hooks and
//!   optional custom change animations.
//! - [`Adapter`] owns the sequence, creates and binds [`Slot`]s, fans out clicks and turns
//!   sequence replacements into minimal [`RenderHost`] notifications, diffing long sequences on a
//!   worker thread.
//! - [`ChangeAnimator`] decorates the host's [`ItemAnimator`] so that items can animate their own
//!   content changes, including splicing a new change onto one that is still running.
//!
//! It is UI-agnostic. A TUI/GUI layer is expected to provide:
//! - the slot surfaces (`V`) and a [`RenderHost`] receiving notifications
//! - an animation engine implementing [`Animation`]
//! - a frame tick calling [`Adapter::poll_diff`]
#![forbid(unsafe_code)]

#[macro_use]
mod macros;

mod adapter;
mod animation;
mod animator;
mod change;
mod diff;
mod dispatch;
mod error;
mod host;
mod id;
mod item;
mod options;
mod slot;

#[cfg(test)]
mod tests;

pub use adapter::{Adapter, ListenerId};
pub use animation::{Animation, AnimationEnd, EndListener};
pub use animator::{
    AnimatorControl, AnimatorListener, Durations, HolderInfo, ItemAnimator, SlotChange,
};
pub use change::ChangeAnimator;
pub use diff::{DiffCallback, EditOp, EditScript, calculate_diff, diff_slices_by};
pub use dispatch::{DiffHandle, ItemList};
pub use error::{DiffError, Error, Result};
pub use host::RenderHost;
pub use id::{SlotId, StableId, StableIdAllocator};
pub use item::{Item, ItemContent, ItemRef, SlotFactory, ViewType};
pub use options::{AdapterOptions, DiffOptions};
pub use slot::{ClickDispatch, LongClickDispatch, Slot};
