//! Image Layer Buffer
//!
//! Two stacked visual layers. A new scene image is loaded off-screen, written
//! into the hidden layer once fully loaded, and the layers swap on the next
//! frame. The renderer fades opacity between them over the image fade
//! duration.
//!
//! A layer only ever references an image that finished loading. A failed or
//! never-finishing load leaves the previous picture up.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::catalog::Scene;
use crate::error::Result;
use crate::media::{ImageLoader, LoadTicket};

/// One of the two layer slots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LayerSlot {
    #[default]
    First,
    Second,
}

impl LayerSlot {
    /// The other slot
    pub fn other(self) -> Self {
        match self {
            LayerSlot::First => LayerSlot::Second,
            LayerSlot::Second => LayerSlot::First,
        }
    }

    /// Slot for `0` or `1`; anything else maps to the second slot
    pub fn from_index(index: usize) -> Self {
        if index == 0 {
            LayerSlot::First
        } else {
            LayerSlot::Second
        }
    }

    /// `0` or `1`
    pub fn index(self) -> usize {
        match self {
            LayerSlot::First => 0,
            LayerSlot::Second => 1,
        }
    }
}

#[derive(Debug, Clone)]
struct PendingLoad {
    ticket: LoadTicket,
    source: String,
}

/// Result of [`ImageLayerBuffer::request_scene`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageRequest {
    /// A load was issued with this ticket
    Loading(LoadTicket),
    /// The image is already displayed or already loading
    Unchanged,
}

/// Result of [`ImageLayerBuffer::complete_load`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// Written into the hidden layer; layers swap on the next frame
    Staged,
    /// A newer request superseded this ticket
    Stale,
    /// The load failed; nothing changed
    Failed,
}

/// Double-buffered background layers
#[derive(Debug)]
pub struct ImageLayerBuffer<L: ImageLoader> {
    loader: L,
    layers: [String; 2],
    active: LayerSlot,
    pending: Option<PendingLoad>,
    flip_pending: bool,
    flipped_at: Option<Duration>,
    next_ticket: u64,
    fade: Duration,
}

impl<L: ImageLoader> ImageLayerBuffer<L> {
    /// Create a buffer showing `initial` in both layers
    pub fn new(loader: L, initial: &Scene, fade: Duration) -> Self {
        Self {
            loader,
            layers: [initial.image_src.clone(), initial.image_src.clone()],
            active: LayerSlot::First,
            pending: None,
            flip_pending: false,
            flipped_at: None,
            next_ticket: 0,
            fade,
        }
    }

    /// Begin loading `scene`'s image off-screen
    ///
    /// No-op when that image is already the buffer's target (loading, or
    /// visible with nothing newer in flight). Asking for the visible image
    /// while another loads drops that load. A new request supersedes any
    /// load still in flight.
    pub fn request_scene(&mut self, scene: &Scene) -> ImageRequest {
        let source = scene.image_src.as_str();
        if self.target_source() == source {
            debug!(source, "image already targeted");
            return ImageRequest::Unchanged;
        }
        if self.visible_source() == source {
            if let Some(dropped) = self.pending.take() {
                debug!(ticket = %dropped.ticket, "image load dropped, target already visible");
            }
            return ImageRequest::Unchanged;
        }

        self.next_ticket += 1;
        let ticket = LoadTicket(self.next_ticket);
        if let Some(previous) = self.pending.replace(PendingLoad {
            ticket,
            source: source.to_string(),
        }) {
            debug!(ticket = %previous.ticket, source = %previous.source, "image load superseded");
        }
        self.loader.load(ticket, source);
        ImageRequest::Loading(ticket)
    }

    /// Report the outcome of a load issued by [`request_scene`](Self::request_scene)
    pub fn complete_load(&mut self, ticket: LoadTicket, result: Result<()>) -> LoadOutcome {
        let is_current = self.pending.as_ref().is_some_and(|p| p.ticket == ticket);
        if !is_current {
            debug!(%ticket, "stale image load ignored");
            return LoadOutcome::Stale;
        }
        let Some(pending) = self.pending.take() else {
            return LoadOutcome::Stale;
        };

        if let Err(e) = result {
            debug!(%ticket, source = %pending.source, error = %e, "image load failed, keeping layers");
            return LoadOutcome::Failed;
        }

        let hidden = self.active.other();
        self.layers[hidden.index()] = pending.source;
        self.flip_pending = true;
        debug!(%ticket, slot = hidden.index(), "image staged");
        LoadOutcome::Staged
    }

    /// Frame hook: swap layers if an image was staged since the last frame
    ///
    /// Returns true when the swap happened on this frame.
    pub fn render(&mut self, now: Duration) -> bool {
        if !self.flip_pending {
            return false;
        }
        self.flip_pending = false;
        self.active = self.active.other();
        self.flipped_at = Some(now);
        info!(
            slot = self.active.index(),
            source = %self.layers[self.active.index()],
            "image layers swapped"
        );
        true
    }

    /// Opacity of `slot` at `now`, linear over the fade duration
    pub fn layer_opacity(&self, slot: LayerSlot, now: Duration) -> f32 {
        let shown = match self.flipped_at {
            None => 1.0,
            Some(_) if self.fade.is_zero() => 1.0,
            Some(at) => {
                let elapsed = now.saturating_sub(at).as_secs_f32();
                (elapsed / self.fade.as_secs_f32()).min(1.0)
            }
        };
        if slot == self.active {
            shown
        } else {
            1.0 - shown
        }
    }

    /// Whether the opacity crossfade is still running
    pub fn is_fading(&self, now: Duration) -> bool {
        self.flipped_at
            .is_some_and(|at| now.saturating_sub(at) < self.fade)
    }

    pub fn active_layer(&self) -> LayerSlot {
        self.active
    }

    /// Source URL held by `slot`
    pub fn layer_source(&self, slot: LayerSlot) -> &str {
        &self.layers[slot.index()]
    }

    pub fn layer_sources(&self) -> [&str; 2] {
        [&self.layers[0], &self.layers[1]]
    }

    /// Image currently on top (or about to be, if a swap is pending)
    pub fn visible_source(&self) -> &str {
        let slot = if self.flip_pending {
            self.active.other()
        } else {
            self.active
        };
        &self.layers[slot.index()]
    }

    /// Image the buffer is heading towards
    pub fn target_source(&self) -> &str {
        match &self.pending {
            Some(p) => &p.source,
            None => self.visible_source(),
        }
    }

    pub fn pending_ticket(&self) -> Option<LoadTicket> {
        self.pending.as_ref().map(|p| p.ticket)
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }

    pub fn loader_mut(&mut self) -> &mut L {
        &mut self.loader
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RoomError;
    use crate::media::MockImageLoader;
    use approx::assert_relative_eq;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn scene(i: usize) -> Scene {
        Scene::new(i, format!("/bg{}.gif", i + 1), format!("/t{}.mp3", i), "")
    }

    fn buffer() -> ImageLayerBuffer<MockImageLoader> {
        ImageLayerBuffer::new(MockImageLoader::new(), &scene(0), ms(700))
    }

    fn failed() -> Result<()> {
        Err(RoomError::AssetLoadFailed {
            source_url: "/bg2.gif".to_string(),
            reason: "404".to_string(),
        })
    }

    #[test]
    fn test_initial_layers_hold_first_scene() {
        let buf = buffer();
        assert_eq!(buf.layer_sources(), ["/bg1.gif", "/bg1.gif"]);
        assert_eq!(buf.active_layer(), LayerSlot::First);
        assert_eq!(buf.layer_opacity(LayerSlot::First, ms(0)), 1.0);
    }

    #[test]
    fn test_load_then_flip_on_next_frame() {
        let mut buf = buffer();
        let ImageRequest::Loading(ticket) = buf.request_scene(&scene(1)) else {
            panic!("expected a load");
        };
        // Nothing changes until the load completes
        assert_eq!(buf.layer_sources(), ["/bg1.gif", "/bg1.gif"]);
        assert!(!buf.render(ms(10)));

        assert_eq!(buf.complete_load(ticket, Ok(())), LoadOutcome::Staged);
        assert_eq!(buf.layer_source(LayerSlot::Second), "/bg2.gif");
        assert_eq!(buf.active_layer(), LayerSlot::First);

        assert!(buf.render(ms(100)));
        assert_eq!(buf.active_layer(), LayerSlot::Second);
        assert!(buf.is_fading(ms(100)));
        assert_relative_eq!(buf.layer_opacity(LayerSlot::Second, ms(450)), 0.5, epsilon = 1e-6);
        assert_relative_eq!(buf.layer_opacity(LayerSlot::First, ms(450)), 0.5, epsilon = 1e-6);
        assert!(!buf.is_fading(ms(800)));
        assert_eq!(buf.layer_opacity(LayerSlot::Second, ms(800)), 1.0);
    }

    #[test]
    fn test_failed_load_keeps_layers() {
        let mut buf = buffer();
        let ImageRequest::Loading(ticket) = buf.request_scene(&scene(1)) else {
            panic!("expected a load");
        };
        assert_eq!(buf.complete_load(ticket, failed()), LoadOutcome::Failed);
        assert!(!buf.render(ms(50)));
        assert_eq!(buf.layer_sources(), ["/bg1.gif", "/bg1.gif"]);

        // The target falls back to what is visible, so asking again reloads
        assert!(matches!(buf.request_scene(&scene(1)), ImageRequest::Loading(_)));
    }

    #[test]
    fn test_superseded_load_is_stale() {
        let mut buf = buffer();
        let ImageRequest::Loading(first) = buf.request_scene(&scene(1)) else {
            panic!("expected a load");
        };
        let ImageRequest::Loading(second) = buf.request_scene(&scene(2)) else {
            panic!("expected a load");
        };

        assert_eq!(buf.complete_load(first, Ok(())), LoadOutcome::Stale);
        assert_eq!(buf.layer_sources(), ["/bg1.gif", "/bg1.gif"]);

        assert_eq!(buf.complete_load(second, Ok(())), LoadOutcome::Staged);
        buf.render(ms(0));
        assert_eq!(buf.visible_source(), "/bg3.gif");
    }

    #[test]
    fn test_repeat_request_is_noop() {
        let mut buf = buffer();
        assert_eq!(buf.request_scene(&scene(0)), ImageRequest::Unchanged);

        buf.request_scene(&scene(1));
        assert_eq!(buf.request_scene(&scene(1)), ImageRequest::Unchanged);
        assert_eq!(buf.loader().history().len(), 1);
    }

    #[test]
    fn test_returning_to_visible_drops_pending_load() {
        let mut buf = buffer();
        let ImageRequest::Loading(ticket) = buf.request_scene(&scene(1)) else {
            panic!("expected a load");
        };
        assert_eq!(buf.request_scene(&scene(0)), ImageRequest::Unchanged);
        assert_eq!(buf.pending_ticket(), None);

        assert_eq!(buf.complete_load(ticket, Ok(())), LoadOutcome::Stale);
        assert!(!buf.render(ms(50)));
        assert_eq!(buf.visible_source(), "/bg1.gif");
    }

    #[test]
    fn test_two_transitions_alternate_slots() {
        let mut buf = buffer();
        for (i, now) in [(1, 0), (2, 1000)] {
            let ImageRequest::Loading(ticket) = buf.request_scene(&scene(i)) else {
                panic!("expected a load");
            };
            buf.complete_load(ticket, Ok(()));
            buf.render(ms(now));
        }
        assert_eq!(buf.active_layer(), LayerSlot::First);
        assert_eq!(buf.layer_sources(), ["/bg3.gif", "/bg2.gif"]);
    }
}
