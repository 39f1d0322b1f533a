use chrono::{DateTime, Local, NaiveDate, NaiveTime, TimeZone, Utc};

/// This is the standard way of converting a date to a string in focus-streak.
pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Returns the moment local midnight of `date` happens. On days where midnight is skipped by a
/// DST change the earliest existing time after it is used.
pub fn local_day_start(date: NaiveDate) -> DateTime<Utc> {
    let midnight = date.and_time(NaiveTime::MIN);
    match Local.from_local_datetime(&midnight).earliest() {
        Some(v) => v.with_timezone(&Utc),
        None => (1..=4)
            .find_map(|hours| {
                Local
                    .from_local_datetime(&(midnight + chrono::Duration::hours(hours)))
                    .earliest()
            })
            .map(|v| v.with_timezone(&Utc))
            .unwrap_or_else(|| midnight.and_utc()),
    }
}

/// Returns the start of `date` in UTC.
pub fn utc_day_start(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

/// Time left until `to`, zero if it already passed.
pub fn duration_until(from: DateTime<Utc>, to: DateTime<Utc>) -> std::time::Duration {
    (to - from).to_std().unwrap_or_default()
}
