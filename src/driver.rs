//! Realtime Driver
//!
//! Pumps a [`PlaybackController`] from a tokio interval so its virtual clock
//! follows wall time, and feeds it commands and image-load completions from a
//! channel. The controller stays single-threaded; the driver owns the only
//! `&mut` for as long as it runs.

use tokio::sync::mpsc::Receiver;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::engine::{Command, LoadOutcome, PlaybackController};
use crate::error::Result;
use crate::media::{AudioBackend, ImageLoader, LoadTicket};

/// Input delivered to the engine by the host
#[derive(Debug)]
pub enum EngineInput {
    /// A user command (counts as a gesture)
    Command(Command),
    /// An image load finished
    ImageLoaded {
        ticket: LoadTicket,
        result: Result<()>,
    },
    /// Stop driving and release all audio
    Shutdown,
}

/// Drive `controller` until the channel closes or [`EngineInput::Shutdown`] arrives
///
/// The clock advances by the wall time elapsed since the driver started, on
/// every tick of the configured period and before every input. Late ticks are
/// skipped; the fade timers catch up inside `advance`.
pub async fn drive<A, L>(controller: &mut PlaybackController<A, L>, mut inputs: Receiver<EngineInput>)
where
    A: AudioBackend,
    L: ImageLoader,
{
    let origin = Instant::now() - controller.now();
    let mut ticker = interval(controller.config().tick());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(session = %controller.session().id, "realtime driver started");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                controller.advance_to(origin.elapsed());
            }
            input = inputs.recv() => {
                controller.advance_to(origin.elapsed());
                match input {
                    Some(EngineInput::Command(cmd)) => controller.dispatch(cmd),
                    Some(EngineInput::ImageLoaded { ticket, result }) => {
                        let outcome = controller.complete_image_load(ticket, result);
                        if outcome != LoadOutcome::Staged {
                            debug!(%ticket, ?outcome, "image completion not applied");
                        }
                    }
                    Some(EngineInput::Shutdown) => break,
                    None => {
                        debug!("input channel closed");
                        break;
                    }
                }
            }
        }
    }

    controller.shutdown();
    info!(session = %controller.session().id, "realtime driver stopped");
}
