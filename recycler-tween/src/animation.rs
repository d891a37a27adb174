use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use recycler::{Animation, AnimationEnd, EndListener};

use crate::{Easing, Timeline, Tween};

#[derive(Clone, Copy, Debug, PartialEq)]
enum Phase {
    Idle,
    Running,
    Ended { end: AnimationEnd, fraction: f32 },
}

pub(crate) struct Track {
    // `start_ms` is set when the animation starts, delay included.
    tween: Tween,
    delay_ms: u64,
    phase: Phase,
    listeners: Vec<EndListener>,
}

impl Track {
    /// Started and not yet stopped, start delay included.
    pub(crate) fn is_active(&self) -> bool {
        self.phase == Phase::Running
    }

    pub(crate) fn is_done(&self, now_ms: u64) -> bool {
        self.is_active() && self.tween.is_done(now_ms)
    }

    fn fraction(&self, now_ms: u64) -> f32 {
        match self.phase {
            Phase::Idle => 0.0,
            Phase::Running => self.tween.fraction(now_ms),
            Phase::Ended { fraction, .. } => fraction,
        }
    }

    /// Stops a running track, returning the listeners to notify.
    pub(crate) fn finish(&mut self, end: AnimationEnd, fraction: f32) -> Vec<EndListener> {
        if !self.is_active() {
            return Vec::new();
        }
        self.phase = Phase::Ended { end, fraction };
        std::mem::take(&mut self.listeners)
    }
}

/// An [`Animation`] of one `f32` value, driven by a [`Timeline`].
///
/// Clones share the same animation, so a host can keep one to read [`TweenAnimation::value`]
/// while the animator owns another.
#[derive(Clone)]
pub struct TweenAnimation {
    timeline: Timeline,
    track: Rc<RefCell<Track>>,
}

impl TweenAnimation {
    pub fn new(timeline: &Timeline, from: f32, to: f32, duration: Duration, easing: Easing) -> Self {
        Self {
            timeline: timeline.clone(),
            track: Rc::new(RefCell::new(Track {
                tween: Tween::new(from, to, 0, millis(duration), easing),
                delay_ms: 0,
                phase: Phase::Idle,
                listeners: Vec::new(),
            })),
        }
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn from(&self) -> f32 {
        self.track.borrow().tween.from
    }

    pub fn to(&self) -> f32 {
        self.track.borrow().tween.to
    }

    /// The animated value at the timeline's current time.
    pub fn value(&self) -> f32 {
        let track = self.track.borrow();
        track.tween.value_at(track.fraction(self.timeline.now_ms()))
    }

    /// How the animation stopped, if it did.
    pub fn ended(&self) -> Option<AnimationEnd> {
        match self.track.borrow().phase {
            Phase::Ended { end, .. } => Some(end),
            _ => None,
        }
    }

    fn stop(&self, end: AnimationEnd, fraction: f32) {
        let listeners = self.track.borrow_mut().finish(end, fraction);
        for listener in listeners {
            listener(end);
        }
    }
}

impl Animation for TweenAnimation {
    fn start(&mut self) {
        {
            let mut track = self.track.borrow_mut();
            if track.phase != Phase::Idle {
                return;
            }
            track.tween.start_ms = self.timeline.now_ms().saturating_add(track.delay_ms);
            track.phase = Phase::Running;
        }
        self.timeline.register(&self.track);
    }

    fn cancel(&mut self) {
        let fraction = self.fraction();
        self.stop(AnimationEnd::Cancelled, fraction);
    }

    fn end(&mut self) {
        {
            let mut track = self.track.borrow_mut();
            if track.phase == Phase::Idle {
                track.phase = Phase::Running;
            }
        }
        self.stop(AnimationEnd::Finished, 1.0);
    }

    fn is_started(&self) -> bool {
        self.track.borrow().phase != Phase::Idle
    }

    /// `false` while still inside the start delay.
    fn is_running(&self) -> bool {
        let track = self.track.borrow();
        track.is_active() && self.timeline.now_ms() >= track.tween.start_ms
    }

    fn fraction(&self) -> f32 {
        self.track.borrow().fraction(self.timeline.now_ms())
    }

    fn duration(&self) -> Duration {
        Duration::from_millis(self.track.borrow().tween.duration_ms)
    }

    fn set_duration(&mut self, duration: Duration) {
        self.track.borrow_mut().tween.duration_ms = millis(duration).max(1);
    }

    /// Only takes effect before [`Animation::start`].
    fn set_start_delay(&mut self, delay: Duration) {
        self.track.borrow_mut().delay_ms = millis(delay);
    }

    fn on_end(&mut self, listener: EndListener) {
        self.track.borrow_mut().listeners.push(listener);
    }
}

impl fmt::Debug for TweenAnimation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let track = self.track.borrow();
        f.debug_struct("TweenAnimation")
            .field("tween", &track.tween)
            .field("delay_ms", &track.delay_ms)
            .field("phase", &track.phase)
            .finish_non_exhaustive()
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
