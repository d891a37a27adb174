//! A decorator over a host item animator that lets items animate their own content changes.
//!
//! Adds, removes, moves and persistence animations pass straight through to the wrapped
//! animator. Change animations of items that opt in through [`crate::Item::can_animate_change`]
//! are built by the items themselves and tracked per slot here, so that a change arriving while
//! another one is still running can be spliced onto it (or chained after it).

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;
use std::rc::{Rc, Weak};
use std::time::Duration;

use crate::animation::{Animation, AnimationEnd};
use crate::animator::{AnimatorControl, AnimatorListener, Durations, HolderInfo, ItemAnimator};
use crate::{ItemRef, Slot, SlotChange, SlotId};

/// Wraps a host item animator `A`, taking over change animations of self-animating items.
///
/// Per slot there is at most one tracked change animation. A second change for the same slot:
/// - replaces the tracked animation if it has not started running yet,
/// - otherwise asks the slot's item for a continuation of the running animation
///   ([`crate::Item::continue_change`]) and swaps it in,
/// - or, if the item cannot splice, queues a fresh animation that starts when the running one
///   ends.
///
/// Lifecycle notifications of both the tracked animations and the wrapped animator are forwarded
/// to the listener installed with [`AnimatorControl::set_listener`].
pub struct ChangeAnimator<A> {
    shared: Rc<Shared<A>>,
}

struct Shared<A> {
    state: RefCell<State<A>>,
    // Events raised by animations and the wrapped animator, possibly while `state` is borrowed.
    mailbox: RefCell<VecDeque<Event>>,
    listener: RefCell<Option<Rc<dyn AnimatorListener>>>,
}

struct State<A> {
    wrapped: A,
    changes: BTreeMap<SlotId, ChangeEntry>,
    next_token: u64,
    appearing: BTreeSet<SlotId>,
    changing: BTreeSet<SlotId>,
    disappearing: BTreeSet<SlotId>,
    persisting: BTreeSet<SlotId>,
}

struct ChangeEntry {
    // Identifies `animation`; end events carrying another token are stale.
    token: u64,
    animation: Box<dyn Animation>,
    queued: Option<Box<dyn Animation>>,
    fast_forward: bool,
}

#[derive(Clone, Copy, Debug)]
enum Event {
    ChangeStarted(SlotId),
    ChangeEnded { slot: SlotId, token: u64 },
    WrappedStarted(SlotId),
    WrappedFinished(SlotId),
    WrappedAllFinished,
}

#[derive(Clone, Copy, Debug)]
enum Notice {
    Started(SlotId),
    Finished(SlotId),
    AllFinished,
}

impl<A: AnimatorControl + 'static> ChangeAnimator<A> {
    pub fn new(wrapped: A) -> Self {
        let shared = Rc::new(Shared {
            state: RefCell::new(State {
                wrapped,
                changes: BTreeMap::new(),
                next_token: 0,
                appearing: BTreeSet::new(),
                changing: BTreeSet::new(),
                disappearing: BTreeSet::new(),
                persisting: BTreeSet::new(),
            }),
            mailbox: RefCell::new(VecDeque::new()),
            listener: RefCell::new(None),
        });
        let forwarder: Rc<dyn AnimatorListener> = Rc::new(Forwarder {
            shared: Rc::downgrade(&shared),
        });
        shared
            .state
            .borrow_mut()
            .wrapped
            .set_listener(Some(forwarder));
        Self { shared }
    }

    pub fn with_wrapped<R>(&self, f: impl FnOnce(&A) -> R) -> R {
        f(&self.shared.state.borrow().wrapped)
    }

    pub fn with_wrapped_mut<R>(&mut self, f: impl FnOnce(&mut A) -> R) -> R {
        self.forward(|state| f(&mut state.wrapped))
    }

    /// Whether `slot` has a tracked change animation (running, pending or queued).
    pub fn is_changing(&self, slot: SlotId) -> bool {
        self.shared.state.borrow().changes.contains_key(&slot)
    }

    /// Number of slots with a tracked change animation.
    pub fn change_count(&self) -> usize {
        self.shared.state.borrow().changes.len()
    }

    pub fn appear_animations_scheduled(&self) -> bool {
        !self.shared.state.borrow().appearing.is_empty()
    }

    /// Whether the wrapped animator has change animations it is running on our behalf.
    pub fn change_animations_scheduled(&self) -> bool {
        !self.shared.state.borrow().changing.is_empty()
    }

    pub fn disappear_animations_scheduled(&self) -> bool {
        !self.shared.state.borrow().disappearing.is_empty()
    }

    pub fn persist_animations_scheduled(&self) -> bool {
        !self.shared.state.borrow().persisting.is_empty()
    }
}

impl<A: AnimatorControl + 'static> Shared<A> {
    fn post(self: &Rc<Self>, event: Event) {
        self.mailbox.borrow_mut().push_back(event);
        self.pump();
    }

    /// Processes queued events, one state borrow per event.
    ///
    /// A no-op while `state` is borrowed: whoever holds the borrow pumps once it is released.
    fn pump(self: &Rc<Self>) {
        loop {
            let Ok(mut state) = self.state.try_borrow_mut() else {
                return;
            };
            let Some(event) = self.mailbox.borrow_mut().pop_front() else {
                return;
            };
            let notices = state.handle(self, event);
            drop(state);
            self.deliver(&notices);
        }
    }

    fn deliver(&self, notices: &[Notice]) {
        let Some(listener) = self.listener.borrow().clone() else {
            return;
        };
        for notice in notices {
            match *notice {
                Notice::Started(slot) => listener.on_animation_started(slot),
                Notice::Finished(slot) => listener.on_animation_finished(slot),
                Notice::AllFinished => listener.on_animations_finished(),
            }
        }
    }

    fn watch(self: &Rc<Self>, animation: &mut dyn Animation, slot: SlotId, token: u64) {
        let shared = Rc::downgrade(self);
        animation.on_end(Box::new(move |_end: AnimationEnd| {
            if let Some(shared) = shared.upgrade() {
                shared.post(Event::ChangeEnded { slot, token });
            }
        }));
    }
}

impl<A: AnimatorControl + 'static> State<A> {
    fn token(&mut self) -> u64 {
        self.next_token += 1;
        self.next_token
    }

    fn handle(&mut self, shared: &Rc<Shared<A>>, event: Event) -> Vec<Notice> {
        match event {
            Event::ChangeStarted(slot) | Event::WrappedStarted(slot) => vec![Notice::Started(slot)],
            Event::ChangeEnded { slot, token } => self.change_ended(shared, slot, token),
            Event::WrappedFinished(slot) => {
                self.appearing.remove(&slot);
                self.changing.remove(&slot);
                self.disappearing.remove(&slot);
                self.persisting.remove(&slot);
                vec![Notice::Finished(slot)]
            }
            Event::WrappedAllFinished if self.changes.is_empty() => vec![Notice::AllFinished],
            Event::WrappedAllFinished => Vec::new(),
        }
    }

    fn change_ended(&mut self, shared: &Rc<Shared<A>>, slot: SlotId, token: u64) -> Vec<Notice> {
        let next_token = self.next_token + 1;
        let Some(entry) = self.changes.get_mut(&slot) else {
            return Vec::new();
        };
        if entry.token != token {
            return Vec::new();
        }

        if let Some(next) = entry.queued.take() {
            rtrace!(slot = slot.get(), "starting chained change animation");
            self.next_token = next_token;
            entry.token = next_token;
            entry.animation = next;
            shared.watch(entry.animation.as_mut(), slot, next_token);
            if entry.fast_forward {
                entry.animation.end();
            } else {
                entry.animation.start();
            }
            return Vec::new();
        }

        self.changes.remove(&slot);
        let mut notices = vec![Notice::Finished(slot)];
        if self.changes.is_empty() && !self.wrapped.is_running() {
            notices.push(Notice::AllFinished);
        }
        notices
    }
}

impl<A: AnimatorControl + 'static> ChangeAnimator<A> {
    fn install(
        &self,
        state: &mut State<A>,
        slot: SlotId,
        mut animation: Box<dyn Animation>,
    ) -> Option<Box<dyn Animation>> {
        let token = state.token();
        self.shared.watch(animation.as_mut(), slot, token);
        match state.changes.get_mut(&slot) {
            Some(entry) => {
                entry.token = token;
                entry.queued = None;
                entry.fast_forward = false;
                Some(std::mem::replace(&mut entry.animation, animation))
            }
            None => {
                state.changes.insert(
                    slot,
                    ChangeEntry {
                        token,
                        animation,
                        queued: None,
                        fast_forward: false,
                    },
                );
                None
            }
        }
    }
}

impl<A: AnimatorControl + 'static> AnimatorControl for ChangeAnimator<A> {
    fn run_pending_animations(&mut self) {
        {
            let mut guard = self.shared.state.borrow_mut();
            let state = &mut *guard;
            state.wrapped.run_pending_animations();
            let delay = if state.disappearing.is_empty() {
                Duration::ZERO
            } else {
                state.wrapped.durations().remove
            };
            for (slot, entry) in state.changes.iter_mut() {
                if entry.animation.is_started() {
                    continue;
                }
                if !delay.is_zero() {
                    entry.animation.set_start_delay(delay);
                }
                self.shared
                    .mailbox
                    .borrow_mut()
                    .push_back(Event::ChangeStarted(*slot));
                entry.animation.start();
            }
        }
        self.shared.pump();
    }

    fn end_animation(&mut self, slot: SlotId) {
        {
            let mut guard = self.shared.state.borrow_mut();
            let state = &mut *guard;
            state.wrapped.end_animation(slot);
            if let Some(entry) = state.changes.get_mut(&slot) {
                entry.fast_forward = true;
                entry.animation.end();
            }
        }
        self.shared.pump();
    }

    fn end_animations(&mut self) {
        {
            let mut guard = self.shared.state.borrow_mut();
            let state = &mut *guard;
            state.wrapped.end_animations();
            for entry in state.changes.values_mut() {
                entry.fast_forward = true;
                entry.animation.end();
            }
        }
        self.shared.pump();
    }

    fn is_running(&self) -> bool {
        let state = self.shared.state.borrow();
        state.wrapped.is_running() || state.changes.values().any(|e| e.animation.is_running())
    }

    /// The wrapped animator's durations, except `change`: the longest tracked change animation,
    /// or the wrapped animator's change duration when nothing is tracked.
    fn durations(&self) -> Durations {
        let state = self.shared.state.borrow();
        let mut durations = state.wrapped.durations();
        if let Some(longest) = state.changes.values().map(|e| e.animation.duration()).max() {
            durations.change = longest;
        }
        durations
    }

    /// Forwards to the wrapped animator. A new `change` duration also applies to every tracked
    /// change animation.
    fn set_durations(&mut self, durations: Durations) {
        let current = self.durations();
        self.forward(|state| {
            state.wrapped.set_durations(durations);
            if durations.change == current.change {
                return;
            }
            for entry in state.changes.values_mut() {
                entry.animation.set_duration(durations.change);
                if let Some(queued) = entry.queued.as_mut() {
                    queued.set_duration(durations.change);
                }
            }
        });
    }

    fn set_listener(&mut self, listener: Option<Rc<dyn AnimatorListener>>) {
        *self.shared.listener.borrow_mut() = listener;
    }
}

impl<V, A> ItemAnimator<V> for ChangeAnimator<A>
where
    V: 'static,
    A: ItemAnimator<V> + 'static,
{
    fn animate_appearance(
        &mut self,
        slot: SlotId,
        pre: Option<HolderInfo>,
        post: HolderInfo,
    ) -> bool {
        self.forward(|state| {
            state.appearing.insert(slot);
            state.wrapped.animate_appearance(slot, pre, post)
        })
    }

    fn animate_disappearance(
        &mut self,
        slot: SlotId,
        pre: HolderInfo,
        post: Option<HolderInfo>,
    ) -> bool {
        self.forward(|state| {
            state.disappearing.insert(slot);
            state.wrapped.animate_disappearance(slot, pre, post)
        })
    }

    fn animate_persistence(&mut self, slot: SlotId, pre: HolderInfo, post: HolderInfo) -> bool {
        self.forward(|state| {
            state.persisting.insert(slot);
            state.wrapped.animate_persistence(slot, pre, post)
        })
    }

    fn animate_change(
        &mut self,
        change: SlotChange<'_, V>,
        pre: HolderInfo,
        post: HolderInfo,
    ) -> bool {
        let (slot, next) = match change {
            SlotChange::InPlace { slot, next } => (slot, next),
            replaced @ SlotChange::Replaced { .. } => {
                return self.delegate_change(replaced, pre, post);
            }
        };
        let Some(current) = slot.item().cloned() else {
            rwarn!(slot = slot.id().get(), "change requested for an unbound slot");
            return self.delegate_change(SlotChange::InPlace { slot, next }, pre, post);
        };
        if !current.get().can_animate_change(next.get()) {
            return self.delegate_change(SlotChange::InPlace { slot, next }, pre, post);
        }

        let id = slot.id();
        let mut guard = self.shared.state.borrow_mut();
        let state = &mut *guard;
        let running = state
            .changes
            .get(&id)
            .is_some_and(|entry| entry.animation.is_running());

        if running {
            let Some(entry) = state.changes.get_mut(&id) else {
                return true;
            };
            let continuation =
                current
                    .get()
                    .continue_change(slot.view_mut(), next.get(), entry.animation.as_ref());
            match continuation {
                Some(continuation) => {
                    rtrace!(slot = id.get(), "splicing change animation");
                    if let Some(mut interrupted) = self.install(state, id, continuation) {
                        interrupted.cancel();
                    }
                }
                None => match current.get().animate_change(slot.view_mut(), next.get()) {
                    Some(fresh) => {
                        rtrace!(slot = id.get(), "chaining change animation");
                        entry.queued = Some(fresh);
                    }
                    None => {
                        rwarn!(
                            slot = id.get(),
                            kind = current.view_type().name(),
                            "item opted into change animations but built none"
                        );
                    }
                },
            }
            drop(guard);
            self.shared.pump();
            return true;
        }

        let Some(fresh) = current.get().animate_change(slot.view_mut(), next.get()) else {
            rwarn!(
                slot = id.get(),
                kind = current.view_type().name(),
                "item opted into change animations but built none; delegating"
            );
            drop(guard);
            return self.delegate_change(SlotChange::InPlace { slot, next }, pre, post);
        };
        if let Some(mut replaced) = self.install(state, id, fresh) {
            // Started but not yet running: still inside its start delay.
            if replaced.is_started() {
                replaced.cancel();
            }
        }
        drop(guard);
        self.shared.pump();
        true
    }

    fn can_reuse_updated_slot(&self, slot: &Slot<V>, next: &ItemRef<V>) -> bool {
        let animates = slot
            .item()
            .is_some_and(|item| item.get().can_animate_change(next.get()));
        animates
            || self
                .shared
                .state
                .borrow()
                .wrapped
                .can_reuse_updated_slot(slot, next)
    }
}

impl<A: AnimatorControl + 'static> ChangeAnimator<A> {
    fn delegate_change<V: 'static>(
        &mut self,
        change: SlotChange<'_, V>,
        pre: HolderInfo,
        post: HolderInfo,
    ) -> bool
    where
        A: ItemAnimator<V>,
    {
        self.forward(|state| {
            state.changing.insert(change.slot_id());
            state.wrapped.animate_change(change, pre, post)
        })
    }

    /// Runs `f` against the state, then handles whatever the wrapped animator raised meanwhile.
    fn forward<R>(&mut self, f: impl FnOnce(&mut State<A>) -> R) -> R {
        let result = f(&mut self.shared.state.borrow_mut());
        self.shared.pump();
        result
    }
}

impl<A> fmt::Debug for ChangeAnimator<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("ChangeAnimator");
        if let Ok(state) = self.shared.state.try_borrow() {
            s.field("changes", &state.changes.keys().collect::<Vec<_>>());
        }
        s.finish_non_exhaustive()
    }
}

/// Listener installed on the wrapped animator.
struct Forwarder<A> {
    shared: Weak<Shared<A>>,
}

impl<A: AnimatorControl + 'static> Forwarder<A> {
    fn post(&self, event: Event) {
        if let Some(shared) = self.shared.upgrade() {
            shared.post(event);
        }
    }
}

impl<A: AnimatorControl + 'static> AnimatorListener for Forwarder<A> {
    fn on_animation_started(&self, slot: SlotId) {
        self.post(Event::WrappedStarted(slot));
    }

    fn on_animation_finished(&self, slot: SlotId) {
        self.post(Event::WrappedFinished(slot));
    }

    fn on_animations_finished(&self) {
        self.post(Event::WrappedAllFinished);
    }
}
