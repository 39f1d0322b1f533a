use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use url::Url;

use super::ledger::Ledger;

/// Extracts the domain used as a ledger key from a page url. `https://www.github.com/x` becomes
/// `github.com`. Urls that can't be parsed or have no host produce `None`, time spent on them is
/// not attributed to anything.
pub fn normalize_domain(url: &str) -> Option<String> {
    let url = Url::parse(url).ok()?;
    let host = url.host_str()?;
    let host = host.strip_prefix("www.").unwrap_or(host);
    if host.is_empty() {
        None
    } else {
        Some(host.to_owned())
    }
}

/// Currently focused domain together with the moment the dwell started.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivitySession {
    domain: Option<Arc<str>>,
    tab_id: Option<i64>,
    started_at: DateTime<Utc>,
    tracking: bool,
}

impl ActivitySession {
    /// Session that doesn't track anything yet.
    pub fn paused(now: DateTime<Utc>) -> Self {
        Self {
            domain: None,
            tab_id: None,
            started_at: now,
            tracking: false,
        }
    }

    pub fn domain(&self) -> Option<&str> {
        self.domain.as_deref()
    }

    pub fn tab_id(&self) -> Option<i64> {
        self.tab_id
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn is_tracking(&self) -> bool {
        self.tracking
    }

    /// Closes the current dwell and starts a new one for `domain`. Returns the seconds flushed
    /// for the previous domain.
    pub fn switch_to(
        &mut self,
        ledger: &mut Ledger,
        tab_id: Option<i64>,
        domain: Option<String>,
        now: DateTime<Utc>,
    ) -> u64 {
        let flushed = self.flush_elapsed(ledger, now);
        self.tracking = domain.is_some();
        self.domain = domain.map(Into::into);
        self.tab_id = tab_id;
        self.started_at = now;
        flushed
    }

    /// Moves whole elapsed seconds into the ledger. The start is advanced by exactly the stored
    /// amount, so calling this repeatedly never counts the same second twice.
    pub fn flush_elapsed(&mut self, ledger: &mut Ledger, now: DateTime<Utc>) -> u64 {
        if now < self.started_at {
            // Clock went backwards, start counting from here.
            self.started_at = now;
            return 0;
        }
        self.flush_until(ledger, now)
    }

    /// Same as [Self::flush_elapsed] but never counts past `cutoff`. Used to close the previous
    /// day at midnight.
    pub fn flush_until(&mut self, ledger: &mut Ledger, cutoff: DateTime<Utc>) -> u64 {
        if !self.tracking {
            return 0;
        }
        let elapsed = (cutoff - self.started_at).num_seconds();
        if !ledger.increment(self.domain.as_deref(), elapsed) {
            return 0;
        }
        self.started_at += Duration::seconds(elapsed);
        elapsed as u64
    }
}
