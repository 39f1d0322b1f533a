use std::time::Duration;

use anyhow::{anyhow, Result};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, Instrument};

use crate::{browser_api::EventSource, engine::TrackerEvent};

/// Consecutive failed reads after which the source is considered dead.
const MAX_CONSECUTIVE_ERRORS: u32 = 8;
const INITIAL_ERROR_BACKOFF: Duration = Duration::from_millis(100);
const MAX_ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// Delay before reading again after `errors` failures in a row.
fn error_backoff(errors: u32) -> Duration {
    INITIAL_ERROR_BACKOFF
        .saturating_mul(1 << errors.saturating_sub(1).min(16))
        .min(MAX_ERROR_BACKOFF)
}

/// Pulls messages from the browser, turns them into [TrackerEvent]s and hands them to the
/// processing module.
pub struct DataCollectionModule {
    next: mpsc::Sender<TrackerEvent>,
    producer: Box<dyn EventSource>,
    shutdown: CancellationToken,
}

impl DataCollectionModule {
    pub fn new(
        next: mpsc::Sender<TrackerEvent>,
        producer: Box<dyn EventSource>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            next,
            producer,
            shutdown,
        }
    }

    /// Executes the collector event loop.
    pub async fn run(mut self) -> Result<()> {
        let mut errors = 0;
        loop {
            let message = tokio::select! {
                // Cancelation means we stop execution of the event loop. Which means we also drop
                // the sender channel and consequently stop processing module.
                _ = self.shutdown.cancelled() => {
                    return Ok(())
                }
                message = self.producer.next_message() => message,
            };

            if message.is_ok() {
                errors = 0;
            }
            match message {
                Ok(Some(message)) => {
                    let Some(event) = message.into_event() else {
                        debug!("Ignoring message without effect on tracking");
                        continue;
                    };
                    let span = info_span!("Forwarding browser event");
                    debug!("Sending message {:?}", event);
                    self.next
                        .send(event)
                        .instrument(span)
                        .await
                        .inspect_err(|e| error!("Unexpected error during sending {e:?}"))?;
                }
                Ok(None) => {
                    // Without a browser there is nothing left to track.
                    info!("Event source closed, shutting down");
                    self.shutdown.cancel();
                    return Ok(());
                }
                Err(e) => {
                    errors += 1;
                    error!("Encountered an error during collection {:?}", e);
                    if errors >= MAX_CONSECUTIVE_ERRORS {
                        self.shutdown.cancel();
                        return Err(anyhow!("Event source failed {errors} times in a row"));
                    }
                    tokio::select! {
                        _ = self.shutdown.cancelled() => return Ok(()),
                        _ = tokio::time::sleep(error_backoff(errors)) => {}
                    }
                }
            }
        }
    }
}
