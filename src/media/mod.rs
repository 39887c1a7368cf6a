//! Media Seams
//!
//! The engine never touches a platform audio element or image decoder
//! directly. Hosts implement these traits:
//! - [`AudioBackend`] creates looping playback handles and starts them
//! - [`ImageLoader`] fetches an image off-screen and reports back later

pub mod mock;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use mock::{MockAudioBackend, MockImageLoader, MockVoice};

/// Platform audio playback
///
/// Every handle loops forever; there is no seeking. Volumes passed in are
/// already clamped to `[0, 1]`.
pub trait AudioBackend {
    /// Opaque handle to one playing (or startable) track
    type Handle: Clone + fmt::Debug + PartialEq;

    /// Create a looping handle for `source` at `volume`. Nothing plays yet.
    fn create(&mut self, source: &str, volume: f32) -> Self::Handle;

    /// Start or resume playback
    ///
    /// # Errors
    /// [`RoomError::AutoplayBlocked`](crate::RoomError::AutoplayBlocked) when the
    /// platform refuses to start without a gesture,
    /// [`RoomError::AssetLoadFailed`](crate::RoomError::AssetLoadFailed) when the
    /// track cannot be loaded.
    fn play(&mut self, handle: &Self::Handle) -> Result<()>;

    fn pause(&mut self, handle: &Self::Handle);

    fn set_volume(&mut self, handle: &Self::Handle, volume: f32);

    /// Stop and drop the handle's source. The handle is not used again.
    fn release(&mut self, handle: &Self::Handle);
}

/// Off-screen image loading
///
/// `load` must not block. The host reports the outcome through
/// [`PlaybackController::complete_image_load`](crate::PlaybackController::complete_image_load)
/// with the same ticket.
pub trait ImageLoader {
    fn load(&mut self, ticket: LoadTicket, source: &str);
}

/// Identifies one image load request
///
/// Tickets increase monotonically; a completion carrying anything but the
/// latest ticket is stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LoadTicket(pub u64);

impl fmt::Display for LoadTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
