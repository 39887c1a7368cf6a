//! Playback Controller
//!
//! State machine coordinating the scene index, play/pause, mute, volume and
//! auto-rotation. It issues commands to the image and audio buffers and
//! owns the engine clock that drives their timers.
//!
//! `select_scene` updates the index immediately. The image and audio
//! transitions settle 700-800 ms later, and in the meantime the index and
//! what is seen or heard can disagree. Callers that need to know what is
//! actually showing should read the layer sources and audio source from
//! [`PlaybackController::snapshot`].

use std::time::Duration;

use tracing::{debug, info};

use crate::catalog::{Scene, SceneCatalog};
use crate::config::EngineConfig;
use crate::engine::audio::{clamp_volume, AudioCrossfadeChannel, PlaybackGate};
use crate::engine::image::{ImageLayerBuffer, LayerSlot, LoadOutcome};
use crate::engine::session::{filled_bars, Command, EngineSnapshot, PlaybackSession, PlaybackState};
use crate::error::{Result, RoomError};
use crate::media::{AudioBackend, ImageLoader, LoadTicket};

/// Timers owned by the controller, in firing priority for equal deadlines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Timer {
    Fade,
    PauseSettle,
    Rotation,
}

/// Crossfade orchestration engine
#[derive(Debug)]
pub struct PlaybackController<A: AudioBackend, L: ImageLoader> {
    config: EngineConfig,
    catalog: SceneCatalog,
    session: PlaybackSession,
    audio: AudioCrossfadeChannel<A>,
    images: ImageLayerBuffer<L>,
    now: Duration,
    pause_deadline: Option<Duration>,
    rotation_deadline: Option<Duration>,
}

impl<A: AudioBackend, L: ImageLoader> PlaybackController<A, L> {
    /// Create an engine on scene 0, paused, waiting for the first gesture
    ///
    /// # Errors
    /// Returns error if the config fails validation or the catalog is empty.
    pub fn new(
        config: EngineConfig,
        catalog: SceneCatalog,
        audio_backend: A,
        image_loader: L,
    ) -> Result<Self> {
        config.validate()?;
        if catalog.is_empty() {
            return Err(RoomError::EmptyCatalog);
        }

        let first = catalog.wrapped(0).clone();
        let session = PlaybackSession::new(config.initial_volume);
        info!(session = %session.id, scenes = catalog.len(), "playback engine created");

        Ok(Self {
            audio: AudioCrossfadeChannel::new(audio_backend, config.tick(), config.audio_crossfade()),
            images: ImageLayerBuffer::new(image_loader, &first, config.image_fade()),
            config,
            catalog,
            session,
            now: Duration::ZERO,
            pause_deadline: None,
            rotation_deadline: None,
        })
    }

    // ========================================================================
    // Commands
    // ========================================================================

    /// Handle a user command, treating it as a gesture first
    pub fn dispatch(&mut self, command: Command) {
        self.interact();
        match command {
            Command::Gesture => {}
            Command::Previous => self.previous(),
            Command::Next => self.next(),
            Command::Select(index) => self.select_scene(index),
            Command::TogglePlayPause => self.toggle_play_pause(),
            Command::ToggleMute => self.toggle_mute(),
            Command::SetVolume(value) => self.set_volume(value),
            Command::SetVolumeLevel(level) => self.set_volume_level(level),
            Command::SetVolumeSlider(value) => self.set_volume_slider(value),
            Command::ToggleAutoRotate => self.toggle_auto_rotate(),
        }
    }

    /// Record a user gesture
    ///
    /// Unlocks autoplay, creates the current scene's audio handle if there is
    /// none, and retries any start that was skipped or rejected.
    pub fn interact(&mut self) {
        if !self.session.has_user_interacted {
            self.session.has_user_interacted = true;
            info!(session = %self.session.id, "first user interaction");
        }

        if self.audio.is_idle() {
            let scene = self.current_scene().clone();
            self.audio
                .play_scene(&scene, self.session.effective_volume(), self.gate(), self.now);
        } else {
            self.audio.retry_start(self.gate());
        }
        self.sync_displayed_volume();
    }

    /// Switch between playing and paused
    ///
    /// Pausing fades to silence and pauses the handles shortly after;
    /// resuming restores the effective volume at once.
    pub fn toggle_play_pause(&mut self) {
        if self.session.is_playing {
            self.session.is_playing = false;
            self.audio
                .fade_volume_to(0.0, self.config.pause_fade(), self.now);
            self.pause_deadline = Some(self.now + self.config.pause_settle());
            info!(session = %self.session.id, "playback paused");
        } else {
            self.session.is_playing = true;
            self.pause_deadline = None;
            let volume = self.session.effective_volume();
            if self.audio.is_idle() {
                let scene = self.current_scene().clone();
                self.audio.play_scene(&scene, volume, self.gate(), self.now);
            } else {
                self.audio.resume(volume, self.gate());
            }
            info!(session = %self.session.id, state = %self.state(), "playback resumed");
        }
        self.sync_displayed_volume();
    }

    /// Transition to scene `index mod N`
    ///
    /// The image preload and the audio crossfade run independently and may
    /// finish in either order. Selecting the scene already targeted is a
    /// no-op.
    pub fn select_scene(&mut self, index: usize) {
        let index = index % self.catalog.len();
        let scene = self.catalog.wrapped(index).clone();

        self.images.request_scene(&scene);
        // Handles are created lazily; the first gesture creates one for the current scene
        if !self.audio.is_idle() || self.session.has_user_interacted {
            let outcome = self.audio.play_scene(
                &scene,
                self.session.effective_volume(),
                self.gate(),
                self.now,
            );
            debug!(index, ?outcome, "scene requested");
        }

        if index != self.session.current_scene_index {
            self.session.current_scene_index = index;
            info!(
                session = %self.session.id,
                index,
                title = %self.catalog.display_title(index),
                "scene changed"
            );
            if self.session.is_auto_rotating {
                self.rotation_deadline = Some(self.now + self.config.auto_rotate_interval());
            }
        }
        self.sync_displayed_volume();
    }

    pub fn next(&mut self) {
        let index = self.catalog.next_index(self.session.current_scene_index);
        self.select_scene(index);
    }

    pub fn previous(&mut self) {
        let index = self.catalog.previous_index(self.session.current_scene_index);
        self.select_scene(index);
    }

    /// Flip mute and fade the live volume to match
    pub fn toggle_mute(&mut self) {
        self.session.is_muted = !self.session.is_muted;
        self.audio.fade_volume_to(
            self.session.effective_volume(),
            self.config.volume_fade(),
            self.now,
        );
        info!(session = %self.session.id, muted = self.session.is_muted, "mute toggled");
        self.sync_displayed_volume();
    }

    /// Set the user volume from the meter
    ///
    /// When muted, unmutes and fades in from silence; otherwise applies at
    /// once so dragging stays responsive.
    pub fn set_volume(&mut self, value: f32) {
        let value = clamp_volume(value);
        self.session.user_volume = value;

        if self.session.is_muted {
            self.session.is_muted = false;
            if !self.audio.is_idle() {
                self.audio.set_volume_now(0.0);
                self.audio
                    .fade_volume_to(value, self.config.volume_ramp(), self.now);
            }
        } else {
            self.audio.set_volume_now(value);
        }
        self.session.displayed_volume = self.audio.audible_volume().unwrap_or(value);
        debug!(volume = value, "volume set");
    }

    /// Set the user volume to meter segment `level` of `meter_segments`
    pub fn set_volume_level(&mut self, level: u32) {
        let segments = self.config.meter_segments;
        self.set_volume(level.min(segments) as f32 / segments as f32);
    }

    /// Set the user volume from the fine slider
    ///
    /// Keeps the mute state: while muted only the stored volume changes.
    pub fn set_volume_slider(&mut self, value: f32) {
        let value = clamp_volume(value);
        self.session.user_volume = value;

        if self.session.is_muted {
            self.session.displayed_volume = 0.0;
        } else {
            self.audio.set_volume_now(value);
            self.session.displayed_volume = self.audio.audible_volume().unwrap_or(value);
        }
    }

    pub fn toggle_auto_rotate(&mut self) {
        self.set_auto_rotate(!self.session.is_auto_rotating);
    }

    /// Enable or disable timed advancement to the next scene
    pub fn set_auto_rotate(&mut self, enabled: bool) {
        self.session.is_auto_rotating = enabled;
        self.rotation_deadline = enabled.then(|| self.now + self.config.auto_rotate_interval());
        info!(session = %self.session.id, enabled, "auto-rotation toggled");
    }

    /// Report the outcome of an image load started by the engine
    pub fn complete_image_load(&mut self, ticket: LoadTicket, result: Result<()>) -> LoadOutcome {
        self.images.complete_load(ticket, result)
    }

    /// Cancel every timer, stop and release all audio
    pub fn shutdown(&mut self) {
        self.audio.stop();
        self.pause_deadline = None;
        self.rotation_deadline = None;
        self.session.displayed_volume = 0.0;
        info!(session = %self.session.id, "playback engine shut down");
    }

    // ========================================================================
    // Clock
    // ========================================================================

    /// Advance the engine clock by `dt`
    ///
    /// Applies a staged layer swap first (this call is the frame), then fires
    /// every timer due within the window in deadline order.
    pub fn advance(&mut self, dt: Duration) {
        let target = self.now + dt;
        self.images.render(self.now);

        while let Some((deadline, timer)) = self.next_timer() {
            if deadline > target {
                break;
            }
            self.now = deadline;
            self.fire(timer);
        }
        self.now = target;
    }

    /// Advance the engine clock to an absolute time
    pub fn advance_to(&mut self, at: Duration) {
        self.advance(at.saturating_sub(self.now));
    }

    fn next_timer(&self) -> Option<(Duration, Timer)> {
        [
            (self.audio.next_deadline(), Timer::Fade),
            (self.pause_deadline, Timer::PauseSettle),
            (self.rotation_deadline, Timer::Rotation),
        ]
        .into_iter()
        .filter_map(|(deadline, timer)| deadline.map(|d| (d, timer)))
        .min_by_key(|(deadline, _)| *deadline)
    }

    fn fire(&mut self, timer: Timer) {
        match timer {
            Timer::Fade => {
                if let Some(tick) = self.audio.fire(self.now) {
                    self.sync_displayed_volume();
                    if tick.completed {
                        debug!(kind = ?tick.kind, "fade completed");
                    }
                }
            }
            Timer::PauseSettle => {
                self.pause_deadline = None;
                if !self.session.is_playing {
                    self.audio.pause();
                    debug!("audio handles paused");
                }
            }
            Timer::Rotation => {
                self.rotation_deadline = None;
                debug!("auto-rotation tick");
                self.next();
                if self.session.is_auto_rotating && self.rotation_deadline.is_none() {
                    self.rotation_deadline = Some(self.now + self.config.auto_rotate_interval());
                }
            }
        }
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn catalog(&self) -> &SceneCatalog {
        &self.catalog
    }

    pub fn catalog_mut(&mut self) -> &mut SceneCatalog {
        &mut self.catalog
    }

    pub fn session(&self) -> &PlaybackSession {
        &self.session
    }

    pub fn current_scene(&self) -> &Scene {
        self.catalog.wrapped(self.session.current_scene_index)
    }

    pub fn audio(&self) -> &AudioCrossfadeChannel<A> {
        &self.audio
    }

    pub fn images(&self) -> &ImageLayerBuffer<L> {
        &self.images
    }

    pub fn audio_backend(&self) -> &A {
        self.audio.backend()
    }

    pub fn audio_backend_mut(&mut self) -> &mut A {
        self.audio.backend_mut()
    }

    pub fn image_loader(&self) -> &L {
        self.images.loader()
    }

    pub fn image_loader_mut(&mut self) -> &mut L {
        self.images.loader_mut()
    }

    /// When auto-rotation will next advance
    pub fn rotation_deadline(&self) -> Option<Duration> {
        self.rotation_deadline
    }

    /// Coarse playback state
    pub fn state(&self) -> PlaybackState {
        let session = &self.session;
        if !session.has_user_interacted {
            if self.audio.is_idle() && !session.is_playing {
                PlaybackState::Idle
            } else {
                PlaybackState::AwaitingInteraction
            }
        } else if session.is_playing {
            PlaybackState::Playing
        } else {
            PlaybackState::Paused
        }
    }

    /// Filled segments of the volume meter
    pub fn filled_bars(&self) -> u32 {
        filled_bars(self.session.displayed_volume, self.config.meter_segments)
    }

    /// Every renderable output at the current instant
    pub fn snapshot(&self) -> EngineSnapshot {
        let [first, second] = self.images.layer_sources();
        EngineSnapshot {
            elapsed_ms: self.now.as_millis() as u64,
            state: self.state(),
            current_scene_index: self.session.current_scene_index,
            title: self.catalog.display_title(self.session.current_scene_index),
            is_playing: self.session.is_playing,
            is_muted: self.session.is_muted,
            user_volume: self.session.user_volume,
            displayed_volume: self.session.displayed_volume,
            filled_bars: self.filled_bars(),
            active_layer: self.images.active_layer().index(),
            layer_sources: [first.to_string(), second.to_string()],
            layer_opacity: [
                self.images.layer_opacity(LayerSlot::First, self.now),
                self.images.layer_opacity(LayerSlot::Second, self.now),
            ],
            is_auto_rotating: self.session.is_auto_rotating,
            audio_source: self.audio.target_source().map(str::to_string),
            is_crossfading: self.audio.is_crossfading(),
        }
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn gate(&self) -> PlaybackGate {
        PlaybackGate {
            has_user_interacted: self.session.has_user_interacted,
            is_playing: self.session.is_playing,
        }
    }

    fn sync_displayed_volume(&mut self) {
        if let Some(volume) = self.audio.audible_volume() {
            self.session.displayed_volume = volume;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::{MockAudioBackend, MockImageLoader};
    use approx::assert_relative_eq;

    type Engine = PlaybackController<MockAudioBackend, MockImageLoader>;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn engine() -> Engine {
        PlaybackController::new(
            EngineConfig::default(),
            SceneCatalog::builtin(),
            MockAudioBackend::new(),
            MockImageLoader::new(),
        )
        .unwrap()
    }

    /// Gesture plus play, so audio is running on scene 0
    fn playing_engine() -> Engine {
        let mut engine = engine();
        engine.dispatch(Command::TogglePlayPause);
        engine
    }

    // ------------------------------------------------------------------------
    // Construction and states
    // ------------------------------------------------------------------------

    #[test]
    fn test_new_engine_is_idle() {
        let engine = engine();
        assert_eq!(engine.state(), PlaybackState::Idle);
        assert_eq!(engine.session().current_scene_index, 0);
        assert!(engine.audio().is_idle());
        assert_eq!(engine.snapshot().layer_sources, ["/bg1.gif", "/bg1.gif"]);
    }

    #[test]
    fn test_empty_catalog_rejected() {
        let catalog: SceneCatalog = serde_json::from_str(r#"{ "scenes": [] }"#).unwrap();
        let err = PlaybackController::new(
            EngineConfig::default(),
            catalog,
            MockAudioBackend::new(),
            MockImageLoader::new(),
        )
        .unwrap_err();
        assert_eq!(err.error_code(), "EMPTY_CATALOG");
    }

    #[test]
    fn test_play_before_interaction_awaits() {
        let mut engine = engine();
        engine.toggle_play_pause();
        assert_eq!(engine.state(), PlaybackState::AwaitingInteraction);
        assert!(engine.audio_backend().playing_voices().is_empty());

        engine.interact();
        assert_eq!(engine.state(), PlaybackState::Playing);
        assert_eq!(engine.audio_backend().playing_voices().len(), 1);
    }

    #[test]
    fn test_gesture_without_play_creates_paused_handle() {
        let mut engine = engine();
        engine.dispatch(Command::Gesture);
        assert_eq!(engine.state(), PlaybackState::Paused);
        assert_eq!(engine.audio_backend().voices().len(), 1);
        assert!(engine.audio_backend().playing_voices().is_empty());
    }

    // ------------------------------------------------------------------------
    // Pause / resume
    // ------------------------------------------------------------------------

    #[test]
    fn test_pause_fades_then_pauses() {
        let mut engine = playing_engine();
        engine.dispatch(Command::TogglePlayPause);
        assert_eq!(engine.state(), PlaybackState::Paused);

        engine.advance(ms(250));
        assert_relative_eq!(engine.session().displayed_volume, 0.0);
        assert_eq!(engine.audio_backend().playing_voices().len(), 1);

        engine.advance(ms(10));
        assert!(engine.audio_backend().playing_voices().is_empty());
    }

    #[test]
    fn test_resume_within_settle_window_keeps_playing() {
        let mut engine = playing_engine();
        engine.dispatch(Command::TogglePlayPause);
        engine.advance(ms(100));
        engine.dispatch(Command::TogglePlayPause);
        engine.advance(ms(500));

        assert_eq!(engine.state(), PlaybackState::Playing);
        let playing = engine.audio_backend().playing_voices();
        assert_eq!(playing.len(), 1);
        assert_relative_eq!(playing[0].volume, 1.0);
    }

    #[test]
    fn test_resume_after_pause_restarts_handle() {
        let mut engine = playing_engine();
        engine.dispatch(Command::TogglePlayPause);
        engine.advance(ms(1000));
        engine.dispatch(Command::TogglePlayPause);

        let voice = &engine.audio_backend().voices()[0];
        assert!(voice.playing);
        assert_eq!(voice.play_attempts, 2);
        assert_relative_eq!(engine.session().displayed_volume, 1.0);
    }

    // ------------------------------------------------------------------------
    // Scene selection
    // ------------------------------------------------------------------------

    #[test]
    fn test_select_updates_index_before_transition_settles() {
        let mut engine = playing_engine();
        engine.dispatch(Command::Select(4));

        assert_eq!(engine.session().current_scene_index, 4);
        assert_eq!(engine.images().visible_source(), "/bg1.gif");
        assert!(engine.audio().is_crossfading());
    }

    #[test]
    fn test_select_wraps_index() {
        let mut engine = engine();
        engine.select_scene(13);
        assert_eq!(engine.session().current_scene_index, 3);
    }

    #[test]
    fn test_previous_from_first_wraps() {
        let mut engine = engine();
        engine.previous();
        assert_eq!(engine.session().current_scene_index, 9);
    }

    #[test]
    fn test_image_and_audio_complete_independently() {
        let mut engine = playing_engine();
        engine.next();

        // Audio finishes first, image still loading
        engine.advance(ms(800));
        assert!(!engine.audio().is_crossfading());
        assert_eq!(engine.images().visible_source(), "/bg1.gif");

        let (ticket, _) = engine.image_loader_mut().take_pending()[0].clone();
        assert_eq!(engine.complete_image_load(ticket, Ok(())), LoadOutcome::Staged);
        engine.advance(ms(16));
        let snapshot = engine.snapshot();
        assert_eq!(snapshot.active_layer, 1);
        assert_eq!(snapshot.layer_sources[1], "/bg2.gif");
    }

    // ------------------------------------------------------------------------
    // Mute and volume
    // ------------------------------------------------------------------------

    #[test]
    fn test_mute_fades_to_silence() {
        let mut engine = playing_engine();
        engine.dispatch(Command::ToggleMute);
        assert!(engine.session().is_muted);

        engine.advance(ms(150));
        assert_relative_eq!(engine.session().displayed_volume, 0.5, epsilon = 1e-6);
        engine.advance(ms(150));
        assert_relative_eq!(engine.session().displayed_volume, 0.0);
        assert_eq!(engine.filled_bars(), 0);
    }

    #[test]
    fn test_slider_while_muted_keeps_mute() {
        let mut engine = playing_engine();
        engine.dispatch(Command::ToggleMute);
        engine.advance(ms(300));

        engine.dispatch(Command::SetVolumeSlider(0.4));
        assert!(engine.session().is_muted);
        assert_relative_eq!(engine.session().user_volume, 0.4);
        assert_relative_eq!(engine.session().displayed_volume, 0.0);
        assert_relative_eq!(engine.audio().current().unwrap().volume, 0.0);
    }

    #[test]
    fn test_volume_level_maps_segments() {
        let mut engine = playing_engine();
        engine.dispatch(Command::SetVolumeLevel(6));
        assert_relative_eq!(engine.session().user_volume, 0.5);
        assert_eq!(engine.filled_bars(), 6);

        engine.dispatch(Command::SetVolumeLevel(40));
        assert_relative_eq!(engine.session().user_volume, 1.0);
    }

    #[test]
    fn test_volume_without_handle_updates_display() {
        let mut engine = engine();
        engine.set_volume(0.25);
        assert_relative_eq!(engine.session().displayed_volume, 0.25);
        assert_eq!(engine.filled_bars(), 3);
    }

    #[test]
    fn test_new_scene_starts_at_muted_volume() {
        let mut engine = playing_engine();
        engine.dispatch(Command::ToggleMute);
        engine.advance(ms(300));
        engine.dispatch(Command::Next);
        engine.advance(ms(800));

        let current = engine.audio().current().unwrap();
        assert_eq!(current.source, "/bgm/lofi-relax-music-lofium-2.mp3");
        assert_relative_eq!(current.volume, 0.0);
    }

    // ------------------------------------------------------------------------
    // Auto-rotation
    // ------------------------------------------------------------------------

    #[test]
    fn test_rotation_window_restarts_on_manual_change() {
        let mut engine = engine();
        engine.set_auto_rotate(true);
        engine.advance(ms(15_000));
        engine.next();
        assert_eq!(engine.rotation_deadline(), Some(ms(35_000)));

        engine.advance(ms(19_000));
        assert_eq!(engine.session().current_scene_index, 1);
        engine.advance(ms(1_000));
        assert_eq!(engine.session().current_scene_index, 2);
    }

    #[test]
    fn test_disabling_rotation_cancels_timer() {
        let mut engine = engine();
        engine.dispatch(Command::ToggleAutoRotate);
        engine.advance(ms(10_000));
        engine.dispatch(Command::ToggleAutoRotate);
        engine.advance(ms(60_000));
        assert_eq!(engine.session().current_scene_index, 0);
        assert_eq!(engine.rotation_deadline(), None);
    }

    #[test]
    fn test_rotation_with_single_scene_keeps_ticking() {
        let catalog = SceneCatalog::new(vec![Scene::new(0, "/only.gif", "/only.mp3", "Only")]).unwrap();
        let mut engine = PlaybackController::new(
            EngineConfig::default(),
            catalog,
            MockAudioBackend::new(),
            MockImageLoader::new(),
        )
        .unwrap();
        engine.set_auto_rotate(true);
        engine.advance(ms(20_000));
        assert_eq!(engine.rotation_deadline(), Some(ms(40_000)));
    }

    // ------------------------------------------------------------------------
    // Shutdown
    // ------------------------------------------------------------------------

    #[test]
    fn test_shutdown_releases_audio() {
        let mut engine = playing_engine();
        engine.dispatch(Command::Next);
        engine.set_auto_rotate(true);
        engine.shutdown();

        assert!(engine.audio_backend().live_voices().is_empty());
        assert_eq!(engine.rotation_deadline(), None);
        assert!(!engine.audio().is_fading());
    }
}
