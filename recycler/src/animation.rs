use std::time::Duration;

/// How an animation stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AnimationEnd {
    /// Ran to completion, or was fast-forwarded with [`Animation::end`].
    Finished,
    /// Stopped early with [`Animation::cancel`].
    Cancelled,
}

/// Callback run once when an animation stops.
pub type EndListener = Box<dyn FnOnce(AnimationEnd)>;

/// The contract a host animation engine exposes to the animator layer.
///
/// Lifecycle: created unstarted, [`Animation::start`]ed once, then stopped either by the engine
/// (natural completion) or by `cancel`/`end`. End listeners fire exactly once, when a started
/// animation stops, and may be invoked synchronously from inside `cancel`/`end`.
///
/// Implementations must tolerate end listeners that call back into whoever owns the animation.
pub trait Animation {
    fn start(&mut self);

    /// Stops a started animation where it is. No-op on an unstarted or already stopped one.
    fn cancel(&mut self);

    /// Jumps to the final state and stops. Starts the animation first if needed.
    fn end(&mut self);

    fn is_started(&self) -> bool;

    fn is_running(&self) -> bool;

    /// Linear progress in `0.0..=1.0`, before easing.
    fn fraction(&self) -> f32;

    fn duration(&self) -> Duration;

    fn set_duration(&mut self, duration: Duration);

    /// Delay between `start` and the first frame.
    fn set_start_delay(&mut self, delay: Duration);

    fn on_end(&mut self, listener: EndListener);
}
