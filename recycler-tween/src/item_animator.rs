use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;
use std::rc::{Rc, Weak};
use std::time::Duration;

use recycler::{
    Animation, AnimationEnd, AnimatorControl, AnimatorListener, Durations, HolderInfo,
    ItemAnimator, SlotChange, SlotId,
};

use crate::{Easing, Timeline, TweenAnimation};

/// What a slot is being animated for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MotionKind {
    Appear,
    Disappear,
    /// The slot stays but its bounds change.
    Persist,
    /// The slot shows the updated item.
    Change,
    /// The slot showing the outdated item of a replaced change.
    ChangeOut,
}

/// A running slot animation as the host sees it.
///
/// `progress` goes from `0.0` to `1.0` (eased); hosts fade out [`MotionKind::Disappear`] and
/// [`MotionKind::ChangeOut`] slots with `1.0 - progress`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Motion {
    pub kind: MotionKind,
    pub pre: Option<HolderInfo>,
    pub post: Option<HolderInfo>,
    pub progress: f32,
}

#[derive(Clone, Copy, Debug)]
struct Request {
    slot: SlotId,
    kind: MotionKind,
    pre: Option<HolderInfo>,
    post: Option<HolderInfo>,
}

struct Running {
    token: u64,
    request: Request,
    animation: TweenAnimation,
}

#[derive(Default)]
struct Board {
    pending: Vec<Request>,
    running: BTreeMap<SlotId, Running>,
    next_token: u64,
    listener: Option<Rc<dyn AnimatorListener>>,
}

impl Board {
    fn is_running(&self) -> bool {
        !self.pending.is_empty() || !self.running.is_empty()
    }
}

/// A default host item animator: every request becomes one fixed-duration tween per slot.
///
/// Durations come from [`Durations`] (`add` for appearances, `remove` for disappearances,
/// `move_` for persistence, `change` for both sides of a change). A new request for a slot that
/// is still animating fast-forwards the running animation first.
pub struct TweenItemAnimator<V> {
    timeline: Timeline,
    durations: Durations,
    easing: Easing,
    board: Rc<RefCell<Board>>,
    _surface: PhantomData<fn(&mut V)>,
}

impl<V> TweenItemAnimator<V> {
    pub fn new(timeline: &Timeline) -> Self {
        Self {
            timeline: timeline.clone(),
            durations: Durations::default(),
            easing: Easing::SmoothStep,
            board: Rc::new(RefCell::new(Board::default())),
            _surface: PhantomData,
        }
    }

    pub fn with_easing(mut self, easing: Easing) -> Self {
        self.easing = easing;
        self
    }

    pub fn with_durations(mut self, durations: Durations) -> Self {
        self.durations = durations;
        self
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    /// The running animation of `slot`, if any.
    pub fn motion(&self, slot: SlotId) -> Option<Motion> {
        let board = self.board.borrow();
        let running = board.running.get(&slot)?;
        Some(Motion {
            kind: running.request.kind,
            pre: running.request.pre,
            post: running.request.post,
            progress: running.animation.value(),
        })
    }

    pub fn running_count(&self) -> usize {
        self.board.borrow().running.len()
    }

    fn request(
        &mut self,
        slot: SlotId,
        kind: MotionKind,
        pre: Option<HolderInfo>,
        post: Option<HolderInfo>,
    ) {
        self.board.borrow_mut().pending.push(Request {
            slot,
            kind,
            pre,
            post,
        });
    }

    fn duration_of(&self, kind: MotionKind) -> Duration {
        match kind {
            MotionKind::Appear => self.durations.add,
            MotionKind::Disappear => self.durations.remove,
            MotionKind::Persist => self.durations.move_,
            MotionKind::Change | MotionKind::ChangeOut => self.durations.change,
        }
    }

    fn launch(&mut self, request: Request) {
        // Removed before ending so that its end listener does not report an idle animator.
        let previous = self.board.borrow_mut().running.remove(&request.slot);
        if let Some(previous) = previous {
            tdebug!(
                slot = request.slot.get(),
                "fast-forwarding a running slot animation"
            );
            let mut animation = previous.animation;
            animation.end();
            let listener = self.board.borrow().listener.clone();
            if let Some(listener) = listener {
                listener.on_animation_finished(request.slot);
            }
        }

        let mut animation = TweenAnimation::new(
            &self.timeline,
            0.0,
            1.0,
            self.duration_of(request.kind),
            self.easing,
        );
        let listener = {
            let mut board = self.board.borrow_mut();
            board.next_token += 1;
            let token = board.next_token;
            let weak = Rc::downgrade(&self.board);
            let slot = request.slot;
            animation.on_end(Box::new(move |_end: AnimationEnd| {
                finished(&weak, slot, token)
            }));
            board.running.insert(
                request.slot,
                Running {
                    token,
                    request,
                    animation: animation.clone(),
                },
            );
            board.listener.clone()
        };
        if let Some(listener) = listener {
            listener.on_animation_started(request.slot);
        }
        animation.start();
    }

    /// Drops pending requests matching `filter`, reporting each as finished.
    fn discard_pending(&mut self, filter: impl Fn(&Request) -> bool) {
        let (discarded, listener, idle) = {
            let mut board = self.board.borrow_mut();
            let (discarded, kept): (Vec<_>, Vec<_>) =
                board.pending.drain(..).partition(|r| filter(r));
            board.pending = kept;
            (discarded, board.listener.clone(), !board.is_running())
        };
        let Some(listener) = listener else {
            return;
        };
        for request in &discarded {
            listener.on_animation_finished(request.slot);
        }
        if idle && !discarded.is_empty() {
            listener.on_animations_finished();
        }
    }
}

fn finished(board: &Weak<RefCell<Board>>, slot: SlotId, token: u64) {
    let Some(board) = board.upgrade() else {
        return;
    };
    let (listener, idle) = {
        let mut board = board.borrow_mut();
        if !board.running.get(&slot).is_some_and(|r| r.token == token) {
            return;
        }
        board.running.remove(&slot);
        (board.listener.clone(), !board.is_running())
    };
    if let Some(listener) = listener {
        listener.on_animation_finished(slot);
        if idle {
            listener.on_animations_finished();
        }
    }
}

impl<V> AnimatorControl for TweenItemAnimator<V> {
    fn run_pending_animations(&mut self) {
        let requests = std::mem::take(&mut self.board.borrow_mut().pending);
        ttrace!(
            count = requests.len(),
            now_ms = self.timeline.now_ms(),
            "running pending item animations"
        );
        for request in requests {
            self.launch(request);
        }
    }

    fn end_animation(&mut self, slot: SlotId) {
        self.discard_pending(|r| r.slot == slot);
        let running = self
            .board
            .borrow()
            .running
            .get(&slot)
            .map(|r| r.animation.clone());
        if let Some(mut animation) = running {
            animation.end();
        }
    }

    fn end_animations(&mut self) {
        self.discard_pending(|_| true);
        let running: Vec<TweenAnimation> = self
            .board
            .borrow()
            .running
            .values()
            .map(|r| r.animation.clone())
            .collect();
        for mut animation in running {
            animation.end();
        }
    }

    fn is_running(&self) -> bool {
        self.board.borrow().is_running()
    }

    fn durations(&self) -> Durations {
        self.durations
    }

    /// Applies to animations started from now on.
    fn set_durations(&mut self, durations: Durations) {
        self.durations = durations;
    }

    fn set_listener(&mut self, listener: Option<Rc<dyn AnimatorListener>>) {
        self.board.borrow_mut().listener = listener;
    }
}

impl<V: 'static> ItemAnimator<V> for TweenItemAnimator<V> {
    fn animate_appearance(
        &mut self,
        slot: SlotId,
        pre: Option<HolderInfo>,
        post: HolderInfo,
    ) -> bool {
        self.request(slot, MotionKind::Appear, pre, Some(post));
        true
    }

    fn animate_disappearance(
        &mut self,
        slot: SlotId,
        pre: HolderInfo,
        post: Option<HolderInfo>,
    ) -> bool {
        self.request(slot, MotionKind::Disappear, Some(pre), post);
        true
    }

    fn animate_persistence(&mut self, slot: SlotId, pre: HolderInfo, post: HolderInfo) -> bool {
        if pre == post {
            let listener = self.board.borrow().listener.clone();
            if let Some(listener) = listener {
                listener.on_animation_finished(slot);
            }
            return false;
        }
        self.request(slot, MotionKind::Persist, Some(pre), Some(post));
        true
    }

    fn animate_change(
        &mut self,
        change: SlotChange<'_, V>,
        pre: HolderInfo,
        post: HolderInfo,
    ) -> bool {
        match change {
            SlotChange::InPlace { slot, .. } => {
                self.request(slot.id(), MotionKind::Change, Some(pre), Some(post));
            }
            SlotChange::Replaced { old, new } => {
                self.request(old, MotionKind::ChangeOut, Some(pre), Some(post));
                if new != old {
                    self.request(new, MotionKind::Change, Some(pre), Some(post));
                }
            }
        }
        true
    }
}

impl<V> fmt::Debug for TweenItemAnimator<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let board = self.board.borrow();
        f.debug_struct("TweenItemAnimator")
            .field("timeline", &self.timeline)
            .field("durations", &self.durations)
            .field("easing", &self.easing)
            .field("pending", &board.pending.len())
            .field("running", &board.running.len())
            .finish_non_exhaustive()
    }
}
