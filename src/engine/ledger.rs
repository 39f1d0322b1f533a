use std::collections::BTreeMap;

use chrono::NaiveDate;

/// Accumulated seconds per domain for a single calendar day.
///
/// Values only grow within a day. Entries are cleared at rollover through [Ledger::reset] or on
/// an explicit user request through [Ledger::clear_entries].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ledger {
    date: Option<NaiveDate>,
    entries: BTreeMap<String, u64>,
}

impl Ledger {
    /// `date` is `None` only before the very first rollover check.
    pub fn new(date: Option<NaiveDate>) -> Self {
        Self {
            date,
            entries: BTreeMap::new(),
        }
    }

    pub fn from_parts(date: Option<NaiveDate>, entries: BTreeMap<String, u64>) -> Self {
        Self { date, entries }
    }

    pub fn date(&self) -> Option<NaiveDate> {
        self.date
    }

    pub fn get(&self, domain: &str) -> u64 {
        self.entries.get(domain).copied().unwrap_or(0)
    }

    /// Adds `seconds` to `domain`. Missing domains and non-positive amounts are ignored, the
    /// return value tells whether anything was stored.
    pub fn increment(&mut self, domain: Option<&str>, seconds: i64) -> bool {
        let Some(domain) = domain.filter(|d| !d.is_empty()) else {
            return false;
        };
        if seconds <= 0 {
            return false;
        }
        let total = self.entries.entry(domain.to_owned()).or_insert(0);
        *total = total.saturating_add(seconds as u64);
        true
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        LedgerSnapshot {
            date: self.date,
            entries: self.entries.clone(),
        }
    }

    /// Starts a fresh day.
    pub fn reset(&mut self, today: NaiveDate) {
        self.entries.clear();
        self.date = Some(today);
    }

    /// Takes over the current entries as belonging to `date`.
    pub fn adopt(&mut self, date: NaiveDate) {
        self.date = Some(date);
    }

    /// Drops today's entries without moving the date.
    pub fn clear_entries(&mut self) {
        self.entries.clear();
    }

    pub fn entries(&self) -> &BTreeMap<String, u64> {
        &self.entries
    }
}

/// Read-only copy of a [Ledger] used for evaluation and display.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerSnapshot {
    date: Option<NaiveDate>,
    entries: BTreeMap<String, u64>,
}

impl LedgerSnapshot {
    pub fn date(&self) -> Option<NaiveDate> {
        self.date
    }

    pub fn get(&self, domain: &str) -> u64 {
        self.entries.get(domain).copied().unwrap_or(0)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, u64)> {
        self.entries.iter().map(|(d, s)| (d.as_str(), *s))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_seconds(&self) -> u64 {
        self.entries.values().sum()
    }

    /// Domains ordered by descending time, ties broken by name.
    pub fn sorted_by_time(&self) -> Vec<(&str, u64)> {
        let mut entries = self.entries().collect::<Vec<_>>();
        entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        entries
    }
}
