use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDate, Utc};
use tokio::time::Instant;

use super::time::local_day_start;

/// Represents an entity responsible for providing dates across application. This can allow it to
/// be used for testing.
///
/// Calendar questions ("which day is it", "when did it start") go through the clock as well, so
/// tests aren't at the mercy of the machine's time zone.
#[async_trait]
pub trait Clock: Sync + Send + 'static {
    fn time(&self) -> DateTime<Utc>;

    fn instant(&self) -> Instant;

    /// Calendar date of `time` as seen by the user.
    fn local_date(&self, time: DateTime<Utc>) -> NaiveDate;

    /// Moment the given calendar date begins.
    fn day_start(&self, date: NaiveDate) -> DateTime<Utc>;

    async fn sleep(&self, duration: Duration);

    async fn sleep_until(&self, instant: tokio::time::Instant);
}

pub struct DefaultClock;

#[async_trait]
impl Clock for DefaultClock {
    fn time(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn instant(&self) -> Instant {
        Instant::now()
    }

    fn local_date(&self, time: DateTime<Utc>) -> NaiveDate {
        time.with_timezone(&Local).date_naive()
    }

    fn day_start(&self, date: NaiveDate) -> DateTime<Utc> {
        local_day_start(date)
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    async fn sleep_until(&self, instant: tokio::time::Instant) {
        tokio::time::sleep_until(instant).await;
    }
}
