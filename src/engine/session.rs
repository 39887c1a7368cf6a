//! Playback session state and the commands that mutate it

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::engine::image::LayerSlot;

/// Coarse playback state derived from the session flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlaybackState {
    /// No audio handle yet and no user gesture seen
    Idle,
    /// Audio is wanted or prepared, but starts wait for a gesture
    AwaitingInteraction,
    Playing,
    Paused,
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaybackState::Idle => write!(f, "Idle"),
            PlaybackState::AwaitingInteraction => write!(f, "AwaitingInteraction"),
            PlaybackState::Playing => write!(f, "Playing"),
            PlaybackState::Paused => write!(f, "Paused"),
        }
    }
}

/// Top-level session fields, mutated only by the controller's handlers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackSession {
    pub id: Uuid,
    pub current_scene_index: usize,
    pub is_playing: bool,
    pub is_muted: bool,
    pub user_volume: f32,
    /// Louder of the live handles; UI feedback only
    pub displayed_volume: f32,
    pub has_user_interacted: bool,
    pub is_auto_rotating: bool,
}

impl PlaybackSession {
    /// Fresh session on scene 0, not playing, no interaction yet
    pub fn new(user_volume: f32) -> Self {
        Self {
            id: Uuid::new_v4(),
            current_scene_index: 0,
            is_playing: false,
            is_muted: false,
            user_volume,
            displayed_volume: 0.0,
            has_user_interacted: false,
            is_auto_rotating: false,
        }
    }

    /// Volume audio should sit at: silent when muted
    pub fn effective_volume(&self) -> f32 {
        if self.is_muted {
            0.0
        } else {
            self.user_volume
        }
    }
}

/// User-originated command
///
/// Every command counts as a gesture when passed through
/// [`PlaybackController::dispatch`](crate::PlaybackController::dispatch).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Command {
    /// Any click or key press anywhere
    Gesture,
    Previous,
    Next,
    Select(usize),
    TogglePlayPause,
    ToggleMute,
    /// Meter click: unmutes with a short fade
    SetVolume(f32),
    /// Meter segment, `1..=segments`
    SetVolumeLevel(u32),
    /// Fine slider: keeps the mute state
    SetVolumeSlider(f32),
    ToggleAutoRotate,
}

/// Everything a renderer needs for one frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSnapshot {
    pub elapsed_ms: u64,
    pub state: PlaybackState,
    pub current_scene_index: usize,
    pub title: String,
    pub is_playing: bool,
    pub is_muted: bool,
    pub user_volume: f32,
    pub displayed_volume: f32,
    pub filled_bars: u32,
    pub active_layer: usize,
    pub layer_sources: [String; 2],
    pub layer_opacity: [f32; 2],
    pub is_auto_rotating: bool,
    pub audio_source: Option<String>,
    pub is_crossfading: bool,
}

impl EngineSnapshot {
    /// Slot index paired with its opacity, top layer first
    pub fn layers_top_first(&self) -> [(usize, f32); 2] {
        let top = LayerSlot::from_index(self.active_layer);
        [
            (top.index(), self.layer_opacity[top.index()]),
            (top.other().index(), self.layer_opacity[top.other().index()]),
        ]
    }
}

/// Filled segments of a volume meter
///
/// `round(volume * segments)`, clamped to `[0, segments]`.
pub fn filled_bars(volume: f32, segments: u32) -> u32 {
    let filled = (volume * segments as f32).round();
    if filled.is_nan() || filled <= 0.0 {
        0
    } else {
        (filled as u32).min(segments)
    }
}
