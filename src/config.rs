//! Engine configuration
//!
//! Timing constants for fades, transitions, and auto-rotation. Every field
//! has a default matching the reference room experience, so a config file
//! only needs to list what it overrides.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, RoomError};

// ============================================================================
// Defaults
// ============================================================================

/// Fade timer period in milliseconds
pub const DEFAULT_TICK_MS: u64 = 50;

/// Image layer opacity crossfade
pub const DEFAULT_IMAGE_FADE_MS: u64 = 700;

/// Audio crossfade between two tracks
pub const DEFAULT_AUDIO_CROSSFADE_MS: u64 = 800;

/// Mute / unmute fade
pub const DEFAULT_VOLUME_FADE_MS: u64 = 300;

/// Fade-out before pausing
pub const DEFAULT_PAUSE_FADE_MS: u64 = 250;

/// Delay after which handles are paused once a pause was requested
pub const DEFAULT_PAUSE_SETTLE_MS: u64 = 260;

/// Fade-in used when a volume change unmutes
pub const DEFAULT_VOLUME_RAMP_MS: u64 = 150;

/// Auto-rotation interval
pub const DEFAULT_AUTO_ROTATE_INTERVAL_MS: u64 = 20_000;

/// Segments in the volume meter
pub const DEFAULT_METER_SEGMENTS: u32 = 12;

// ============================================================================
// EngineConfig
// ============================================================================

/// Timing and volume configuration for the playback engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Fade timer period in milliseconds
    pub tick_ms: u64,
    /// Image layer crossfade duration in milliseconds
    pub image_fade_ms: u64,
    /// Audio crossfade duration in milliseconds
    pub audio_crossfade_ms: u64,
    /// Mute / unmute fade duration in milliseconds
    pub volume_fade_ms: u64,
    /// Pause fade-out duration in milliseconds
    pub pause_fade_ms: u64,
    /// Delay before handles are actually paused, in milliseconds
    pub pause_settle_ms: u64,
    /// Fade-in used when a volume change unmutes, in milliseconds
    pub volume_ramp_ms: u64,
    /// Auto-rotation interval in milliseconds
    pub auto_rotate_interval_ms: u64,
    /// Number of segments in the volume meter
    pub meter_segments: u32,
    /// User volume at engine start
    pub initial_volume: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_ms: DEFAULT_TICK_MS,
            image_fade_ms: DEFAULT_IMAGE_FADE_MS,
            audio_crossfade_ms: DEFAULT_AUDIO_CROSSFADE_MS,
            volume_fade_ms: DEFAULT_VOLUME_FADE_MS,
            pause_fade_ms: DEFAULT_PAUSE_FADE_MS,
            pause_settle_ms: DEFAULT_PAUSE_SETTLE_MS,
            volume_ramp_ms: DEFAULT_VOLUME_RAMP_MS,
            auto_rotate_interval_ms: DEFAULT_AUTO_ROTATE_INTERVAL_MS,
            meter_segments: DEFAULT_METER_SEGMENTS,
            initial_volume: 1.0,
        }
    }
}

impl EngineConfig {
    /// Parse a configuration from JSON and validate it
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file
    ///
    /// # Errors
    /// Returns error if the file cannot be read, is not valid JSON, or
    /// fails [`EngineConfig::validate`].
    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path).map_err(|e| RoomError::ConfigRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config = Self::from_json_str(&json)?;
        debug!(path = %path.display(), "loaded engine config");
        Ok(config)
    }

    /// Check that timers can make progress and the volume is in range
    pub fn validate(&self) -> Result<()> {
        if self.tick_ms == 0 {
            return Err(RoomError::InvalidConfig {
                reason: "tick_ms must be positive".to_string(),
            });
        }
        if self.auto_rotate_interval_ms == 0 {
            return Err(RoomError::InvalidConfig {
                reason: "auto_rotate_interval_ms must be positive".to_string(),
            });
        }
        if self.meter_segments == 0 {
            return Err(RoomError::InvalidConfig {
                reason: "meter_segments must be positive".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.initial_volume) {
            return Err(RoomError::InvalidConfig {
                reason: format!("initial_volume {} outside [0, 1]", self.initial_volume),
            });
        }
        Ok(())
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    pub fn image_fade(&self) -> Duration {
        Duration::from_millis(self.image_fade_ms)
    }

    pub fn audio_crossfade(&self) -> Duration {
        Duration::from_millis(self.audio_crossfade_ms)
    }

    pub fn volume_fade(&self) -> Duration {
        Duration::from_millis(self.volume_fade_ms)
    }

    pub fn pause_fade(&self) -> Duration {
        Duration::from_millis(self.pause_fade_ms)
    }

    pub fn pause_settle(&self) -> Duration {
        Duration::from_millis(self.pause_settle_ms)
    }

    pub fn volume_ramp(&self) -> Duration {
        Duration::from_millis(self.volume_ramp_ms)
    }

    pub fn auto_rotate_interval(&self) -> Duration {
        Duration::from_millis(self.auto_rotate_interval_ms)
    }
}
