//! In-memory media backends
//!
//! Record every call so tests and the CLI simulator can inspect what the
//! engine asked the platform to do. The audio backend can also refuse to
//! start (autoplay policy) or fail specific sources.

use std::collections::HashSet;

use crate::error::{Result, RoomError};
use crate::media::{AudioBackend, ImageLoader, LoadTicket};

// ============================================================================
// Audio
// ============================================================================

/// One handle created through [`MockAudioBackend`]
#[derive(Debug, Clone, PartialEq)]
pub struct MockVoice {
    pub id: u64,
    pub source: String,
    pub volume: f32,
    pub playing: bool,
    pub released: bool,
    /// Number of `play` calls, accepted or not
    pub play_attempts: u32,
    /// Every volume written, starting with the creation volume
    pub volume_history: Vec<f32>,
}

impl MockVoice {
    /// Playing, not released, and audible
    pub fn is_audible(&self) -> bool {
        self.playing && !self.released && self.volume > 0.0
    }
}

/// Recording audio backend
#[derive(Debug, Default)]
pub struct MockAudioBackend {
    voices: Vec<MockVoice>,
    autoplay_blocked: bool,
    failing_sources: HashSet<String>,
}

impl MockAudioBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject every `play` call with an autoplay error while set
    pub fn set_autoplay_blocked(&mut self, blocked: bool) {
        self.autoplay_blocked = blocked;
    }

    /// Make `play` fail with a load error for this source
    pub fn fail_source(&mut self, source: impl Into<String>) {
        self.failing_sources.insert(source.into());
    }

    /// All handles ever created, in creation order
    pub fn voices(&self) -> &[MockVoice] {
        &self.voices
    }

    pub fn voice(&self, id: u64) -> Option<&MockVoice> {
        self.voices.iter().find(|v| v.id == id)
    }

    /// Handles that are playing and not released
    pub fn playing_voices(&self) -> Vec<&MockVoice> {
        self.voices
            .iter()
            .filter(|v| v.playing && !v.released)
            .collect()
    }

    /// Handles not yet released
    pub fn live_voices(&self) -> Vec<&MockVoice> {
        self.voices.iter().filter(|v| !v.released).collect()
    }

    fn voice_mut(&mut self, id: u64) -> Option<&mut MockVoice> {
        self.voices.iter_mut().find(|v| v.id == id)
    }
}

impl AudioBackend for MockAudioBackend {
    type Handle = u64;

    fn create(&mut self, source: &str, volume: f32) -> u64 {
        let id = self.voices.len() as u64;
        self.voices.push(MockVoice {
            id,
            source: source.to_string(),
            volume,
            playing: false,
            released: false,
            play_attempts: 0,
            volume_history: vec![volume],
        });
        id
    }

    fn play(&mut self, handle: &u64) -> Result<()> {
        let blocked = self.autoplay_blocked;
        let failing = self
            .voice(*handle)
            .is_some_and(|v| self.failing_sources.contains(&v.source));
        let Some(voice) = self.voice_mut(*handle) else {
            return Err(RoomError::AssetLoadFailed {
                source_url: String::new(),
                reason: format!("unknown handle {}", handle),
            });
        };
        voice.play_attempts += 1;
        if voice.released {
            return Err(RoomError::AssetLoadFailed {
                source_url: voice.source.clone(),
                reason: "handle released".to_string(),
            });
        }
        if failing {
            return Err(RoomError::AssetLoadFailed {
                source_url: voice.source.clone(),
                reason: "source unavailable".to_string(),
            });
        }
        if blocked {
            return Err(RoomError::AutoplayBlocked {
                source_url: voice.source.clone(),
            });
        }
        voice.playing = true;
        Ok(())
    }

    fn pause(&mut self, handle: &u64) {
        if let Some(voice) = self.voice_mut(*handle) {
            voice.playing = false;
        }
    }

    fn set_volume(&mut self, handle: &u64, volume: f32) {
        if let Some(voice) = self.voice_mut(*handle) {
            voice.volume = volume;
            voice.volume_history.push(volume);
        }
    }

    fn release(&mut self, handle: &u64) {
        if let Some(voice) = self.voice_mut(*handle) {
            voice.playing = false;
            voice.released = true;
        }
    }
}

// ============================================================================
// Images
// ============================================================================

/// Recording image loader
///
/// Requests queue up until the owner takes them and reports completions.
#[derive(Debug, Default)]
pub struct MockImageLoader {
    pending: Vec<(LoadTicket, String)>,
    history: Vec<(LoadTicket, String)>,
}

impl MockImageLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drain requests not yet completed
    pub fn take_pending(&mut self) -> Vec<(LoadTicket, String)> {
        std::mem::take(&mut self.pending)
    }

    pub fn pending(&self) -> &[(LoadTicket, String)] {
        &self.pending
    }

    /// Every request ever made
    pub fn history(&self) -> &[(LoadTicket, String)] {
        &self.history
    }
}

impl ImageLoader for MockImageLoader {
    fn load(&mut self, ticket: LoadTicket, source: &str) {
        self.pending.push((ticket, source.to_string()));
        self.history.push((ticket, source.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_play_records_attempts() {
        let mut backend = MockAudioBackend::new();
        let id = backend.create("/a.mp3", 0.5);
        backend.play(&id).unwrap();
        let voice = backend.voice(id).unwrap();
        assert!(voice.playing);
        assert_eq!(voice.play_attempts, 1);
        assert!(voice.is_audible());
    }

    #[test]
    fn test_autoplay_block() {
        let mut backend = MockAudioBackend::new();
        backend.set_autoplay_blocked(true);
        let id = backend.create("/a.mp3", 1.0);
        let err = backend.play(&id).unwrap_err();
        assert_eq!(err.error_code(), "AUTOPLAY_BLOCKED");
        assert!(!backend.voice(id).unwrap().playing);
    }

    #[test]
    fn test_failing_source() {
        let mut backend = MockAudioBackend::new();
        backend.fail_source("/broken.mp3");
        let id = backend.create("/broken.mp3", 1.0);
        let err = backend.play(&id).unwrap_err();
        assert_eq!(err.error_code(), "ASSET_LOAD_FAILED");
    }

    #[test]
    fn test_release_stops_voice() {
        let mut backend = MockAudioBackend::new();
        let id = backend.create("/a.mp3", 1.0);
        backend.play(&id).unwrap();
        backend.release(&id);
        assert!(backend.playing_voices().is_empty());
        assert!(backend.live_voices().is_empty());
        assert!(backend.play(&id).is_err());
    }

    #[test]
    fn test_image_loader_queue() {
        let mut loader = MockImageLoader::new();
        loader.load(LoadTicket(1), "/bg1.gif");
        loader.load(LoadTicket(2), "/bg2.gif");
        assert_eq!(loader.pending().len(), 2);

        let taken = loader.take_pending();
        assert_eq!(taken[1], (LoadTicket(2), "/bg2.gif".to_string()));
        assert!(loader.pending().is_empty());
        assert_eq!(loader.history().len(), 2);
    }
}
