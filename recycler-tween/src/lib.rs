//! A reference animation engine for the `recycler` crate.
//!
//! `recycler` only defines the [`recycler::Animation`] contract and the animator traits. This
//! crate provides small, framework-neutral implementations a host can start from:
//!
//! - [`Tween`] / [`Easing`]: plain value interpolation
//! - [`Timeline`]: a manually advanced clock the host ticks from its frame loop
//! - [`TweenAnimation`]: an `f32` animation on a timeline, usable from
//!   [`recycler::Item::animate_change`]
//! - [`TweenItemAnimator`]: a default host item animator, ready to be wrapped in
//!   [`recycler::ChangeAnimator`]
#![forbid(unsafe_code)]

#[macro_use]
mod macros;

mod animation;
mod item_animator;
mod timeline;
mod tween;


pub use animation::TweenAnimation;
pub use item_animator::{Motion, MotionKind, TweenItemAnimator};
pub use timeline::Timeline;
pub use tween::{Easing, Tween};
