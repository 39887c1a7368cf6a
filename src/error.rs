//! Error handling for Roomfade
//!
//! Engine commands never surface errors: media failures are swallowed where
//! they happen and only show up as a transition that did not advance. The
//! types here cover the media seams, configuration, and catalog loading.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for Roomfade operations
pub type Result<T> = std::result::Result<T, RoomError>;

/// Main error type for Roomfade operations
#[derive(Error, Debug)]
pub enum RoomError {
    // Media Errors
    #[error("Playback start rejected by autoplay policy: {source_url}")]
    AutoplayBlocked { source_url: String },

    #[error("Asset failed to load: {source_url}: {reason}")]
    AssetLoadFailed { source_url: String, reason: String },

    // Configuration Errors
    #[error("Failed to read config file: {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    // Catalog Errors
    #[error("Scene catalog is empty")]
    EmptyCatalog,

    #[error("Scene index {index} out of range (catalog has {len} scenes)")]
    SceneOutOfRange { index: usize, len: usize },

    #[error("Invalid title data: {reason}")]
    InvalidTitles { reason: String },

    // CLI Errors
    #[error("Invalid script step '{step}': {reason}")]
    InvalidScriptStep { step: String, reason: String },

    // I/O Errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization Errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl RoomError {
    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            RoomError::AutoplayBlocked { .. } => "AUTOPLAY_BLOCKED",
            RoomError::AssetLoadFailed { .. } => "ASSET_LOAD_FAILED",
            RoomError::ConfigRead { .. } => "CONFIG_READ",
            RoomError::InvalidConfig { .. } => "INVALID_CONFIG",
            RoomError::EmptyCatalog => "EMPTY_CATALOG",
            RoomError::SceneOutOfRange { .. } => "SCENE_OUT_OF_RANGE",
            RoomError::InvalidTitles { .. } => "INVALID_TITLES",
            RoomError::InvalidScriptStep { .. } => "INVALID_SCRIPT_STEP",
            RoomError::Io(_) => "IO_ERROR",
            RoomError::Serialization(_) => "SERIALIZATION_ERROR",
        }
    }

    /// Check if this error is recoverable without user action
    ///
    /// Media failures degrade to "keep the previous visual/audio"; a later
    /// gesture or scene change tries again.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            RoomError::AutoplayBlocked { .. }
                | RoomError::AssetLoadFailed { .. }
                | RoomError::InvalidTitles { .. }
        )
    }

    /// Returns a recovery suggestion for the operator, if there is one.
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            RoomError::AutoplayBlocked { .. } => {
                Some("Interact with the page once; playback retries on the next gesture.")
            }
            RoomError::AssetLoadFailed { .. } => {
                Some("Check the asset URL; the previous scene stays visible meanwhile.")
            }
            RoomError::ConfigRead { .. } => Some("Check the config path and permissions."),
            RoomError::InvalidConfig { .. } => {
                Some("Durations and meter segments must be positive.")
            }
            RoomError::InvalidTitles { .. } => {
                Some("Provide one title per scene, as strings or {\"title\": ...} objects.")
            }
            _ => None,
        }
    }
}
