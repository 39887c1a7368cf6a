//! Fade Scheduler
//!
//! Stepped linear interpolation on a fixed tick period. At most one
//! envelope is active; starting another silently replaces it.
//!
//! The scheduler does not call back into its owner. Each due tick is handed
//! out by [`FadeScheduler::fire`] as a [`FadeTick`] carrying the caller's tag,
//! and `completed` on the final tick stands in for the completion callback.
//! A cancelled fade never yields a completed tick.

use std::time::Duration;

use tracing::debug;

// ============================================================================
// FadeEnvelope
// ============================================================================

/// Numeric envelope from `start_value` to `target_value`
#[derive(Debug, Clone, PartialEq)]
pub struct FadeEnvelope {
    start_value: f32,
    target_value: f32,
    duration: Duration,
    elapsed_steps: u32,
    total_steps: u32,
    tick: Duration,
}

impl FadeEnvelope {
    /// Create an envelope
    ///
    /// # Arguments
    /// * `start_value` - Value before the first tick
    /// * `target_value` - Value reached on the last tick
    /// * `duration` - Total fade time
    /// * `tick` - Timer period; the step count is `round(duration / tick)`, at least 1
    ///
    /// # Example
    /// ```
    /// use std::time::Duration;
    /// use roomfade::engine::FadeEnvelope;
    ///
    /// let env = FadeEnvelope::new(0.0, 1.0, Duration::from_millis(300), Duration::from_millis(50));
    /// assert_eq!(env.total_steps(), 6);
    /// ```
    pub fn new(start_value: f32, target_value: f32, duration: Duration, tick: Duration) -> Self {
        let tick_ms = tick.as_millis().max(1) as f64;
        let steps = (duration.as_millis() as f64 / tick_ms).round() as u32;
        Self {
            start_value,
            target_value,
            duration,
            elapsed_steps: 0,
            total_steps: steps.max(1),
            tick,
        }
    }

    pub fn start_value(&self) -> f32 {
        self.start_value
    }

    pub fn target_value(&self) -> f32 {
        self.target_value
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn tick(&self) -> Duration {
        self.tick
    }

    pub fn elapsed_steps(&self) -> u32 {
        self.elapsed_steps
    }

    pub fn total_steps(&self) -> u32 {
        self.total_steps
    }

    /// Fraction of the envelope done, in `[0, 1]`
    pub fn progress(&self) -> f32 {
        (self.elapsed_steps as f32 / self.total_steps as f32).min(1.0)
    }

    /// Interpolated value at the current step
    pub fn value(&self) -> f32 {
        let t = self.progress();
        self.start_value + (self.target_value - self.start_value) * t
    }

    pub fn is_complete(&self) -> bool {
        self.elapsed_steps >= self.total_steps
    }

    /// Advance one step and return the new value
    fn step(&mut self) -> f32 {
        if !self.is_complete() {
            self.elapsed_steps += 1;
        }
        self.value()
    }
}

// ============================================================================
// FadeScheduler
// ============================================================================

/// One step of the active envelope
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FadeTick<K> {
    /// Tag given to [`FadeScheduler::start`]
    pub kind: K,
    /// Interpolated value after this step
    pub value: f32,
    /// Envelope progress `t` after this step
    pub progress: f32,
    /// Set on the final step; the schedule is already cleared
    pub completed: bool,
}

#[derive(Debug, Clone)]
struct ActiveFade<K> {
    envelope: FadeEnvelope,
    kind: K,
    next_due: Duration,
}

/// Single-slot fade timer driven by an external clock
#[derive(Debug, Clone)]
pub struct FadeScheduler<K> {
    active: Option<ActiveFade<K>>,
}

impl<K> Default for FadeScheduler<K> {
    fn default() -> Self {
        Self { active: None }
    }
}

impl<K: Copy + std::fmt::Debug> FadeScheduler<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin stepping `envelope`, first tick one period after `now`
    ///
    /// Returns the tag of the schedule this replaced, if any. The replaced
    /// schedule never completes.
    pub fn start(&mut self, envelope: FadeEnvelope, kind: K, now: Duration) -> Option<K> {
        let replaced = self.cancel();
        debug!(
            ?kind,
            from = envelope.start_value,
            to = envelope.target_value,
            steps = envelope.total_steps,
            "fade started"
        );
        self.active = Some(ActiveFade {
            next_due: now + envelope.tick,
            envelope,
            kind,
        });
        replaced
    }

    /// Stop the running schedule without completing it
    pub fn cancel(&mut self) -> Option<K> {
        let cancelled = self.active.take().map(|a| a.kind);
        if let Some(kind) = cancelled {
            debug!(?kind, "fade cancelled");
        }
        cancelled
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// Tag of the running schedule
    pub fn active_kind(&self) -> Option<K> {
        self.active.as_ref().map(|a| a.kind)
    }

    pub fn envelope(&self) -> Option<&FadeEnvelope> {
        self.active.as_ref().map(|a| &a.envelope)
    }

    /// When the next tick is due
    pub fn next_deadline(&self) -> Option<Duration> {
        self.active.as_ref().map(|a| a.next_due)
    }

    /// Run one tick if it is due at `now`
    ///
    /// Call repeatedly to catch up on several missed ticks.
    pub fn fire(&mut self, now: Duration) -> Option<FadeTick<K>> {
        let active = self.active.as_mut()?;
        if active.next_due > now {
            return None;
        }

        let value = active.envelope.step();
        let progress = active.envelope.progress();
        let kind = active.kind;
        let completed = active.envelope.is_complete();
        if completed {
            self.active = None;
        } else {
            active.next_due += active.envelope.tick;
        }

        Some(FadeTick {
            kind,
            value,
            progress,
            completed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const TICK: Duration = Duration::from_millis(50);

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    // ------------------------------------------------------------------------
    // Envelope
    // ------------------------------------------------------------------------

    #[test]
    fn test_step_count_rounds() {
        assert_eq!(FadeEnvelope::new(0.0, 1.0, ms(800), TICK).total_steps(), 16);
        assert_eq!(FadeEnvelope::new(0.0, 1.0, ms(150), TICK).total_steps(), 3);
        assert_eq!(FadeEnvelope::new(0.0, 1.0, ms(260), TICK).total_steps(), 5);
        assert_eq!(FadeEnvelope::new(0.0, 1.0, ms(0), TICK).total_steps(), 1);
    }

    #[test]
    fn test_envelope_starts_at_start_value() {
        let env = FadeEnvelope::new(0.25, 0.75, ms(200), TICK);
        assert_eq!(env.value(), 0.25);
        assert_eq!(env.progress(), 0.0);
        assert!(!env.is_complete());
    }

    // ------------------------------------------------------------------------
    // Scheduler
    // ------------------------------------------------------------------------

    #[test]
    fn test_linear_ticks_until_complete() {
        let mut sched = FadeScheduler::new();
        sched.start(FadeEnvelope::new(1.0, 0.0, ms(200), TICK), "mute", ms(0));

        assert!(sched.fire(ms(49)).is_none());

        let values: Vec<FadeTick<&str>> = [50, 100, 150, 200]
            .iter()
            .map(|t| sched.fire(ms(*t)).unwrap())
            .collect();

        assert_relative_eq!(values[0].value, 0.75);
        assert_relative_eq!(values[1].value, 0.5);
        assert_relative_eq!(values[2].value, 0.25);
        assert_relative_eq!(values[3].value, 0.0);
        assert!(values[..3].iter().all(|t| !t.completed));
        assert!(values[3].completed);
        assert!(!sched.is_active());
        assert!(sched.fire(ms(250)).is_none());
    }

    #[test]
    fn test_catch_up_after_late_clock() {
        let mut sched = FadeScheduler::new();
        sched.start(FadeEnvelope::new(0.0, 1.0, ms(150), TICK), (), ms(0));

        let mut ticks = 0;
        while let Some(tick) = sched.fire(ms(1000)) {
            ticks += 1;
            if tick.completed {
                assert_eq!(tick.value, 1.0);
            }
        }
        assert_eq!(ticks, 3);
    }

    #[test]
    fn test_cancel_never_completes() {
        let mut sched = FadeScheduler::new();
        sched.start(FadeEnvelope::new(0.0, 1.0, ms(100), TICK), 7u8, ms(0));
        sched.fire(ms(50)).unwrap();

        assert_eq!(sched.cancel(), Some(7));
        assert!(sched.fire(ms(100)).is_none());
        assert_eq!(sched.next_deadline(), None);
    }

    #[test]
    fn test_start_replaces_running_schedule() {
        let mut sched = FadeScheduler::new();
        sched.start(FadeEnvelope::new(0.0, 1.0, ms(800), TICK), 'a', ms(0));
        sched.fire(ms(50));

        let replaced = sched.start(FadeEnvelope::new(0.5, 0.0, ms(100), TICK), 'b', ms(60));
        assert_eq!(replaced, Some('a'));
        assert_eq!(sched.active_kind(), Some('b'));
        assert_eq!(sched.next_deadline(), Some(ms(110)));

        let tick = sched.fire(ms(110)).unwrap();
        assert_eq!(tick.kind, 'b');
        assert_relative_eq!(tick.value, 0.25);
    }
}
