//! Roomfade - Crossfade Orchestration for an Ambient Virtual Room
//!
//! A room is a list of scenes, each pairing a looping background image with a
//! looping audio track. Switching scenes never cuts: the image is preloaded
//! off-screen and swapped under an opacity fade, and the audio crossfades
//! from the old track to the new one.
//!
//! # Architecture
//!
//! - [`engine::FadeScheduler`]: one active stepped fade at a time
//! - [`engine::AudioCrossfadeChannel`]: current/incoming handle pair
//! - [`engine::ImageLayerBuffer`]: two layers, written only after a load succeeds
//! - [`PlaybackController`]: scene index, play/pause, mute, volume, auto-rotation
//!
//! The engine runs on a virtual clock advanced by the host, and talks to the
//! platform only through the [`media`] traits.

pub mod catalog;
pub mod cli;
pub mod config;
#[cfg(feature = "realtime")]
pub mod driver;
pub mod engine;
pub mod error;
pub mod media;

pub use catalog::{Scene, SceneCatalog, TitleOverrides};
pub use config::EngineConfig;
pub use engine::{Command, EngineSnapshot, PlaybackController, PlaybackState};
pub use error::{Result, RoomError};
