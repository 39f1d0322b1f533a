use std::sync::Arc;

use super::ledger::LedgerSnapshot;

/// Sites counted towards the daily goal when no custom list is configured.
pub const DEFAULT_PRODUCTIVE_SITES: &[&str] = &[
    "coursera.org",
    "khanacademy.org",
    "edx.org",
    "udemy.com",
    "stackoverflow.com",
    "github.com",
    "docs.google.com",
    "drive.google.com",
    "classroom.google.com",
    "scholar.google",
    "research.google",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Productivity {
    Productive,
    Distracting,
}

/// Splits domains into productive and distracting ones by a substring match against a fixed
/// list of rules.
///
/// The match is intentionally coarse: `github.com.evil.io` is productive because it contains
/// `github.com`. Domains are compared exactly as normalized (see
/// [normalize_domain](super::session::normalize_domain)), no case folding happens here.
#[derive(Debug, Clone)]
pub struct DomainClassifier {
    rules: Arc<[Arc<str>]>,
}

impl Default for DomainClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_PRODUCTIVE_SITES.iter().copied())
    }
}

impl DomainClassifier {
    /// Empty rules are dropped, otherwise every domain would be productive.
    pub fn new<I, S>(rules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Arc<str>>,
    {
        let rules = rules
            .into_iter()
            .map(Into::into)
            .filter(|rule: &Arc<str>| !rule.is_empty())
            .collect::<Vec<_>>();
        Self {
            rules: rules.into(),
        }
    }

    pub fn rules(&self) -> &[Arc<str>] {
        &self.rules
    }

    pub fn classify(&self, domain: &str) -> Productivity {
        if self.rules.iter().any(|rule| domain.contains(rule.as_ref())) {
            Productivity::Productive
        } else {
            Productivity::Distracting
        }
    }

    pub fn is_productive(&self, domain: &str) -> bool {
        self.classify(domain) == Productivity::Productive
    }

    /// Sum of seconds spent on productive domains.
    pub fn productive_seconds(&self, snapshot: &LedgerSnapshot) -> u64 {
        snapshot
            .entries()
            .filter(|(domain, _)| self.is_productive(domain))
            .map(|(_, seconds)| seconds)
            .sum()
    }
}
