use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use recycler::AnimationEnd;

use crate::animation::Track;

/// A manually advanced clock shared by every [`crate::TweenAnimation`] created on it.
///
/// Nothing moves on its own: the host calls [`Timeline::advance_to`] from its frame tick, and
/// animations that reach their end during that call are finished and their end listeners run.
/// Cloning yields another handle to the same clock.
#[derive(Clone, Default)]
pub struct Timeline {
    clock: Rc<RefCell<Clock>>,
}

#[derive(Default)]
struct Clock {
    now_ms: u64,
    active: Vec<Weak<RefCell<Track>>>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now_ms(&self) -> u64 {
        self.clock.borrow().now_ms
    }

    /// Moves the clock to `now_ms` (never backwards) and finishes every animation that is done.
    ///
    /// Returns how many animations finished. End listeners run after the clock has moved and may
    /// start new animations on this timeline.
    pub fn advance_to(&self, now_ms: u64) -> usize {
        let (now, active) = {
            let mut clock = self.clock.borrow_mut();
            clock.now_ms = clock.now_ms.max(now_ms);
            (clock.now_ms, std::mem::take(&mut clock.active))
        };

        let mut kept = Vec::with_capacity(active.len());
        let mut finished = Vec::new();
        for weak in active {
            let Some(track) = weak.upgrade() else {
                continue;
            };
            let mut track = track.borrow_mut();
            if track.is_done(now) {
                finished.push(track.finish(AnimationEnd::Finished, 1.0));
            } else if track.is_active() {
                kept.push(weak);
            }
        }
        self.clock.borrow_mut().active.extend(kept);

        let count = finished.len();
        if count > 0 {
            ttrace!(now_ms = now, finished = count, "timeline advanced");
        }
        for listeners in finished {
            for listener in listeners {
                listener(AnimationEnd::Finished);
            }
        }
        count
    }

    pub fn advance_by(&self, delta_ms: u64) -> usize {
        self.advance_to(self.now_ms().saturating_add(delta_ms))
    }

    /// Number of started animations that have not stopped yet.
    pub fn active_count(&self) -> usize {
        self.clock
            .borrow()
            .active
            .iter()
            .filter_map(Weak::upgrade)
            .filter(|track| track.borrow().is_active())
            .count()
    }

    pub fn is_idle(&self) -> bool {
        self.active_count() == 0
    }

    pub(crate) fn register(&self, track: &Rc<RefCell<Track>>) {
        self.clock.borrow_mut().active.push(Rc::downgrade(track));
    }
}

impl fmt::Debug for Timeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let clock = self.clock.borrow();
        f.debug_struct("Timeline")
            .field("now_ms", &clock.now_ms)
            .field("tracked", &clock.active.len())
            .finish()
    }
}
