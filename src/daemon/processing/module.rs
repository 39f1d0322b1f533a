use anyhow::Result;

use crate::engine::TrackerEvent;

/// Represents an event processor. The processor is the only place tracker state is mutated,
/// events reach it one at a time.
pub trait EventProcessor {
    fn process_next(&mut self, message: TrackerEvent) -> impl std::future::Future<Output = Result<()>>;

    fn finalize(&mut self) -> impl std::future::Future<Output = Result<()>>;
}
