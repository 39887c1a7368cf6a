//! Audio Crossfade Channel
//!
//! Owns at most two playback handles: the `current` track and, while a
//! crossfade runs, the `incoming` one. The pair is a state enum so an
//! incoming handle cannot exist without its crossfade envelope.
//!
//! Every fade goes through the channel's single [`FadeScheduler`] slot:
//! starting a volume fade or a crossfade cancels whatever was running.

use std::time::Duration;

use tracing::{debug, info};

use crate::catalog::Scene;
use crate::engine::fade::{FadeEnvelope, FadeScheduler, FadeTick};
use crate::media::AudioBackend;

/// Clamp a volume to `[0, 1]`, mapping NaN to silence
#[inline]
pub fn clamp_volume(volume: f32) -> f32 {
    if volume.is_nan() {
        0.0
    } else {
        volume.clamp(0.0, 1.0)
    }
}

// ============================================================================
// Types
// ============================================================================

/// What the active fade slot is doing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FadeKind {
    /// Outgoing to silence and incoming to target, driven by one envelope over `[0, 1]`
    Crossfade,
    /// Single handle ramping to a new volume
    Volume,
}

/// Whether playback may be started right now
///
/// Starts are skipped until the user has interacted and playback is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlaybackGate {
    pub has_user_interacted: bool,
    pub is_playing: bool,
}

impl PlaybackGate {
    pub fn allows_start(&self) -> bool {
        self.has_user_interacted && self.is_playing
    }
}

/// One playback handle plus the engine's view of it
#[derive(Debug, Clone)]
pub struct Voice<H> {
    pub handle: H,
    pub source: String,
    pub volume: f32,
    /// Last `play` succeeded and no pause since
    pub playing: bool,
}

#[derive(Debug, Clone)]
enum ChannelState<H> {
    Idle,
    Single(Voice<H>),
    Crossfading {
        current: Voice<H>,
        incoming: Voice<H>,
        /// Outgoing volume when the crossfade began
        current_start: f32,
        /// Volume the incoming track reaches at `t = 1`
        target: f32,
    },
}

/// Result of [`AudioCrossfadeChannel::play_scene`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayOutcome {
    /// No handle existed; one was created at the target volume
    Created,
    /// The requested track is already current (or already incoming)
    Unchanged,
    /// A crossfade to the requested track began
    CrossfadeStarted,
    /// The requested track was the outgoing side of a crossfade; the
    /// crossfade was abandoned and the track fades back to the target
    Reverted,
}

// ============================================================================
// AudioCrossfadeChannel
// ============================================================================

/// Dual-handle audio player with crossfading
#[derive(Debug)]
pub struct AudioCrossfadeChannel<A: AudioBackend> {
    backend: A,
    state: ChannelState<A::Handle>,
    fades: FadeScheduler<FadeKind>,
    tick: Duration,
    crossfade: Duration,
}

impl<A: AudioBackend> AudioCrossfadeChannel<A> {
    /// Create an empty channel
    ///
    /// # Arguments
    /// * `backend` - Platform audio
    /// * `tick` - Fade timer period
    /// * `crossfade` - Track-to-track crossfade duration
    pub fn new(backend: A, tick: Duration, crossfade: Duration) -> Self {
        Self {
            backend,
            state: ChannelState::Idle,
            fades: FadeScheduler::new(),
            tick,
            crossfade,
        }
    }

    // ========================================================================
    // Commands
    // ========================================================================

    /// Switch to `scene`'s track
    ///
    /// With no handle, creates one at `target_volume` and tries to start it.
    /// Otherwise crossfades from the current track unless it already is the
    /// requested one. Track identity is the exact source URL.
    pub fn play_scene(
        &mut self,
        scene: &Scene,
        target_volume: f32,
        gate: PlaybackGate,
        now: Duration,
    ) -> PlayOutcome {
        let target = clamp_volume(target_volume);
        let source = scene.audio_src.as_str();

        match std::mem::replace(&mut self.state, ChannelState::Idle) {
            ChannelState::Idle => {
                let mut voice = self.create_voice(source, target);
                self.try_start(&mut voice, gate);
                info!(source, volume = target, "audio handle created");
                self.state = ChannelState::Single(voice);
                PlayOutcome::Created
            }
            ChannelState::Single(current) if current.source == source => {
                debug!(source, "track already current");
                self.state = ChannelState::Single(current);
                PlayOutcome::Unchanged
            }
            ChannelState::Single(current) => {
                self.begin_crossfade(current, source, target, gate, now);
                PlayOutcome::CrossfadeStarted
            }
            state @ ChannelState::Crossfading { .. } if Self::incoming_source(&state) == Some(source) => {
                debug!(source, "track already incoming");
                self.state = state;
                PlayOutcome::Unchanged
            }
            ChannelState::Crossfading {
                current, incoming, ..
            } => {
                self.fades.cancel();
                self.dispose(&incoming);
                if current.source == source {
                    info!(source, "crossfade abandoned, fading back");
                    let envelope = FadeEnvelope::new(current.volume, target, self.crossfade, self.tick);
                    self.state = ChannelState::Single(current);
                    self.fades.start(envelope, FadeKind::Volume, now);
                    PlayOutcome::Reverted
                } else {
                    self.begin_crossfade(current, source, target, gate, now);
                    PlayOutcome::CrossfadeStarted
                }
            }
        }
    }

    /// Fade the live handle to `value` over `duration`
    ///
    /// A running crossfade is settled first. No-op without a handle.
    pub fn fade_volume_to(&mut self, value: f32, duration: Duration, now: Duration) {
        self.settle_crossfade();
        let ChannelState::Single(voice) = &self.state else {
            return;
        };
        let envelope = FadeEnvelope::new(voice.volume, clamp_volume(value), duration, self.tick);
        self.fades.start(envelope, FadeKind::Volume, now);
    }

    /// Apply `value` to the live handle immediately, cancelling any fade
    pub fn set_volume_now(&mut self, value: f32) {
        self.settle_crossfade();
        self.fades.cancel();
        let value = clamp_volume(value);
        if let ChannelState::Single(voice) = &mut self.state {
            voice.volume = value;
            self.backend.set_volume(&voice.handle, value);
        }
    }

    /// Resume playback of the live handle at `volume`
    pub fn resume(&mut self, volume: f32, gate: PlaybackGate) {
        self.set_volume_now(volume);
        if let ChannelState::Single(mut voice) = std::mem::replace(&mut self.state, ChannelState::Idle) {
            voice.playing = false;
            self.try_start(&mut voice, gate);
            self.state = ChannelState::Single(voice);
        }
    }

    /// Start any handle that is not playing yet, if the gate allows
    ///
    /// Used after a user gesture to retry a start that was skipped or
    /// rejected earlier.
    pub fn retry_start(&mut self, gate: PlaybackGate) {
        if !gate.allows_start() {
            return;
        }
        match std::mem::replace(&mut self.state, ChannelState::Idle) {
            ChannelState::Idle => {}
            ChannelState::Single(mut voice) => {
                if !voice.playing {
                    self.try_start(&mut voice, gate);
                }
                self.state = ChannelState::Single(voice);
            }
            ChannelState::Crossfading {
                mut current,
                mut incoming,
                current_start,
                target,
            } => {
                if !current.playing {
                    self.try_start(&mut current, gate);
                }
                if !incoming.playing {
                    self.try_start(&mut incoming, gate);
                }
                self.state = ChannelState::Crossfading {
                    current,
                    incoming,
                    current_start,
                    target,
                };
            }
        }
    }

    /// Pause every handle without releasing it
    pub fn pause(&mut self) {
        match &mut self.state {
            ChannelState::Idle => {}
            ChannelState::Single(voice) => {
                self.backend.pause(&voice.handle);
                voice.playing = false;
            }
            ChannelState::Crossfading {
                current, incoming, ..
            } => {
                self.backend.pause(&current.handle);
                current.playing = false;
                self.backend.pause(&incoming.handle);
                incoming.playing = false;
            }
        }
    }

    /// Cancel the active fade, then pause and release both handles
    pub fn stop(&mut self) {
        self.fades.cancel();
        match std::mem::replace(&mut self.state, ChannelState::Idle) {
            ChannelState::Idle => {}
            ChannelState::Single(voice) => self.dispose(&voice),
            ChannelState::Crossfading {
                current, incoming, ..
            } => {
                self.dispose(&current);
                self.dispose(&incoming);
            }
        }
    }

    // ========================================================================
    // Clock
    // ========================================================================

    /// When the next fade tick is due
    pub fn next_deadline(&self) -> Option<Duration> {
        self.fades.next_deadline()
    }

    /// Run one due fade tick and apply it to the handles
    pub fn fire(&mut self, now: Duration) -> Option<FadeTick<FadeKind>> {
        let tick = self.fades.fire(now)?;
        match (tick.kind, &mut self.state) {
            (
                FadeKind::Crossfade,
                ChannelState::Crossfading {
                    current,
                    incoming,
                    current_start,
                    target,
                },
            ) => {
                let t = tick.value;
                current.volume = clamp_volume(*current_start * (1.0 - t));
                incoming.volume = clamp_volume(*target * t);
                self.backend.set_volume(&current.handle, current.volume);
                self.backend.set_volume(&incoming.handle, incoming.volume);
            }
            (FadeKind::Volume, ChannelState::Single(voice)) => {
                voice.volume = clamp_volume(tick.value);
                self.backend.set_volume(&voice.handle, voice.volume);
            }
            (kind, _) => {
                debug!(?kind, "fade tick without matching handles");
                return Some(tick);
            }
        }

        if tick.completed && tick.kind == FadeKind::Crossfade {
            self.promote_incoming();
        }
        Some(tick)
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn is_idle(&self) -> bool {
        matches!(self.state, ChannelState::Idle)
    }

    pub fn is_crossfading(&self) -> bool {
        matches!(self.state, ChannelState::Crossfading { .. })
    }

    /// Whether a fade of any kind is running
    pub fn is_fading(&self) -> bool {
        self.fades.is_active()
    }

    pub fn active_fade(&self) -> Option<FadeKind> {
        self.fades.active_kind()
    }

    /// The current (outgoing during a crossfade) handle
    pub fn current(&self) -> Option<&Voice<A::Handle>> {
        match &self.state {
            ChannelState::Idle => None,
            ChannelState::Single(voice) => Some(voice),
            ChannelState::Crossfading { current, .. } => Some(current),
        }
    }

    /// The incoming handle, only during a crossfade
    pub fn incoming(&self) -> Option<&Voice<A::Handle>> {
        match &self.state {
            ChannelState::Crossfading { incoming, .. } => Some(incoming),
            _ => None,
        }
    }

    /// Louder of the two handles during a crossfade, else the single handle's volume
    pub fn audible_volume(&self) -> Option<f32> {
        match &self.state {
            ChannelState::Idle => None,
            ChannelState::Single(voice) => Some(voice.volume),
            ChannelState::Crossfading {
                current, incoming, ..
            } => Some(current.volume.max(incoming.volume)),
        }
    }

    /// Source the channel is heading towards
    pub fn target_source(&self) -> Option<&str> {
        match &self.state {
            ChannelState::Idle => None,
            ChannelState::Single(voice) => Some(&voice.source),
            ChannelState::Crossfading { incoming, .. } => Some(&incoming.source),
        }
    }

    pub fn backend(&self) -> &A {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut A {
        &mut self.backend
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn incoming_source(state: &ChannelState<A::Handle>) -> Option<&str> {
        match state {
            ChannelState::Crossfading { incoming, .. } => Some(&incoming.source),
            _ => None,
        }
    }

    fn create_voice(&mut self, source: &str, volume: f32) -> Voice<A::Handle> {
        Voice {
            handle: self.backend.create(source, volume),
            source: source.to_string(),
            volume,
            playing: false,
        }
    }

    /// Autoplay-gated start; failures are swallowed
    fn try_start(&mut self, voice: &mut Voice<A::Handle>, gate: PlaybackGate) {
        if !gate.allows_start() {
            debug!(source = %voice.source, ?gate, "start deferred");
            return;
        }
        match self.backend.play(&voice.handle) {
            Ok(()) => voice.playing = true,
            Err(e) => debug!(source = %voice.source, error = %e, "start suppressed"),
        }
    }

    fn begin_crossfade(
        &mut self,
        current: Voice<A::Handle>,
        source: &str,
        target: f32,
        gate: PlaybackGate,
        now: Duration,
    ) {
        let mut incoming = self.create_voice(source, 0.0);
        self.try_start(&mut incoming, gate);
        info!(from = %current.source, to = source, "crossfade started");

        let envelope = FadeEnvelope::new(0.0, 1.0, self.crossfade, self.tick);
        self.state = ChannelState::Crossfading {
            current_start: current.volume,
            current,
            incoming,
            target,
        };
        self.fades.start(envelope, FadeKind::Crossfade, now);
    }

    /// Finish a crossfade early: drop the outgoing handle and keep the
    /// incoming one at its live volume
    fn settle_crossfade(&mut self) {
        if self.is_crossfading() {
            self.fades.cancel();
            self.promote_incoming();
        }
    }

    fn promote_incoming(&mut self) {
        match std::mem::replace(&mut self.state, ChannelState::Idle) {
            ChannelState::Crossfading {
                current, incoming, ..
            } => {
                self.dispose(&current);
                debug!(source = %incoming.source, "incoming promoted");
                self.state = ChannelState::Single(incoming);
            }
            other => self.state = other,
        }
    }

    fn dispose(&mut self, voice: &Voice<A::Handle>) {
        self.backend.pause(&voice.handle);
        self.backend.release(&voice.handle);
    }
}
