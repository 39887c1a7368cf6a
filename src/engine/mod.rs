//! Crossfade Engine Module
//!
//! Core orchestration for the virtual room:
//! - Fade scheduling on a fixed tick
//! - Dual-handle audio crossfading
//! - Double-buffered image layers
//! - Playback session state and the controller that drives it all

pub mod audio;
pub mod controller;
pub mod fade;
pub mod image;
pub mod session;

pub use audio::{clamp_volume, AudioCrossfadeChannel, FadeKind, PlayOutcome, PlaybackGate, Voice};
pub use controller::PlaybackController;
pub use fade::{FadeEnvelope, FadeScheduler, FadeTick};
pub use image::{ImageLayerBuffer, ImageRequest, LayerSlot, LoadOutcome};
pub use session::{filled_bars, Command, EngineSnapshot, PlaybackSession, PlaybackState};
