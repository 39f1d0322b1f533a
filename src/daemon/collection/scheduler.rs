use std::time::Duration;

use anyhow::Result;
use tokio::{sync::mpsc, time::Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::{
    engine::TrackerEvent,
    utils::{clock::Clock, time::duration_until},
};

/// Lower bound for re-arming the midnight wake-up. Keeps the loop from spinning when the wall
/// clock and the monotonic clock disagree by a little.
const MIN_REARM_DELAY: Duration = Duration::from_secs(1);

/// Produces the time driven events: a [TrackerEvent::FlushTick] every `flush_interval` and a
/// [TrackerEvent::DailyTick] at every local midnight.
pub struct Scheduler {
    next: mpsc::Sender<TrackerEvent>,
    shutdown: CancellationToken,
    flush_interval: Duration,
    clock: Box<dyn Clock>,
}

impl Scheduler {
    pub fn new(
        next: mpsc::Sender<TrackerEvent>,
        shutdown: CancellationToken,
        flush_interval: Duration,
        clock: Box<dyn Clock>,
    ) -> Self {
        Self {
            next,
            shutdown,
            flush_interval,
            clock,
        }
    }

    /// Instant of the next local midnight.
    fn arm_midnight(&self) -> Instant {
        let now = self.clock.time();
        let today = self.clock.local_date(now);
        let wake_up = today
            .succ_opt()
            .map(|tomorrow| self.clock.day_start(tomorrow))
            .unwrap_or(now);
        let delay = duration_until(now, wake_up).max(MIN_REARM_DELAY);
        info!("Midnight wake-up scheduled in {}s", delay.as_secs());
        self.clock.instant() + delay
    }

    async fn send(&self, event: TrackerEvent) -> Result<()> {
        debug!("Scheduling {event:?}");
        self.next
            .send(event)
            .await
            .inspect_err(|e| error!("Unexpected error during sending {e:?}"))?;
        Ok(())
    }

    pub async fn run(self) -> Result<()> {
        let mut flush_point = self.clock.instant() + self.flush_interval;
        let mut midnight = self.arm_midnight();
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    return Ok(())
                }
                _ = self.clock.sleep_until(flush_point) => {
                    flush_point += self.flush_interval;
                    self.send(TrackerEvent::FlushTick).await?;
                }
                _ = self.clock.sleep_until(midnight) => {
                    self.send(TrackerEvent::DailyTick).await?;
                    midnight = self.arm_midnight();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::{DateTime, NaiveDate, TimeZone, Utc};
    use tokio::{sync::mpsc, time::Instant};
    use tokio_util::sync::CancellationToken;

    use crate::{
        engine::TrackerEvent,
        utils::{clock::Clock, time::utc_day_start},
    };

    use super::Scheduler;

    /// Wall time follows tokio's paused clock.
    struct TestClock {
        start_time: DateTime<Utc>,
        reference: Instant,
    }

    #[async_trait]
    impl Clock for TestClock {
        fn time(&self) -> DateTime<Utc> {
            self.start_time + self.reference.elapsed()
        }

        fn instant(&self) -> Instant {
            Instant::now()
        }

        fn local_date(&self, time: DateTime<Utc>) -> NaiveDate {
            time.date_naive()
        }

        fn day_start(&self, date: NaiveDate) -> DateTime<Utc> {
            utc_day_start(date)
        }

        async fn sleep(&self, duration: Duration) {
            tokio::time::sleep(duration).await;
        }

        async fn sleep_until(&self, instant: Instant) {
            tokio::time::sleep_until(instant).await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_and_midnight_ticks() {
        let (sender, mut receiver) = mpsc::channel(100);
        let shutdown = CancellationToken::new();
        let clock = TestClock {
            start_time: Utc.with_ymd_and_hms(2018, 7, 4, 23, 59, 48).unwrap(),
            reference: Instant::now(),
        };
        let scheduler = Scheduler::new(
            sender,
            shutdown.clone(),
            Duration::from_secs(5),
            Box::new(clock),
        );

        let (result, events) = tokio::join!(scheduler.run(), async {
            let mut events = vec![];
            while events.len() < 5 {
                events.push(receiver.recv().await.unwrap());
            }
            shutdown.cancel();
            events
        });
        result.unwrap();

        // Flushes at 5s and 10s, midnight at 12s, flushes at 15s and 20s.
        assert_eq!(
            events,
            vec![
                TrackerEvent::FlushTick,
                TrackerEvent::FlushTick,
                TrackerEvent::DailyTick,
                TrackerEvent::FlushTick,
                TrackerEvent::FlushTick,
            ]
        );
    }
}
