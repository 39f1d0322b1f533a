use std::collections::BTreeSet;

use super::{
    classifier::{DomainClassifier, Productivity},
    ledger::LedgerSnapshot,
    session::ActivitySession,
};

/// Time on a single distracting domain after which the user is warned.
pub const DEFAULT_ALERT_THRESHOLD_SECONDS: u64 = 5 * 60;

/// Advisory messages produced by the engine. Delivering them is up to the notification sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advisory {
    StreakReset {
        productive_minutes: u64,
        goal_minutes: u64,
        previous_streak: u32,
    },
    Distraction {
        domain: String,
        seconds: u64,
    },
    GoalReached {
        productive_minutes: u64,
        goal_minutes: u64,
    },
}

impl Advisory {
    pub fn title(&self) -> &'static str {
        match self {
            Advisory::StreakReset { .. } => "Streak reset",
            Advisory::Distraction { .. } => "Time to refocus",
            Advisory::GoalReached { .. } => "Daily goal reached",
        }
    }

    pub fn message(&self) -> String {
        match self {
            Advisory::StreakReset {
                productive_minutes,
                goal_minutes,
                previous_streak,
            } => format!(
                "Only {productive_minutes} of {goal_minutes} productive minutes yesterday. Your {previous_streak} day streak starts over."
            ),
            Advisory::Distraction { domain, seconds } => {
                format!("You've spent {} min on {domain} today.", seconds / 60)
            }
            Advisory::GoalReached {
                productive_minutes,
                goal_minutes,
            } => format!(
                "{productive_minutes} productive minutes today, goal of {goal_minutes} met. The streak grows at midnight."
            ),
        }
    }
}

/// Stateless checks over live ledger values.
pub struct AlertEvaluator<'a> {
    classifier: &'a DomainClassifier,
    threshold_seconds: u64,
    goal_minutes: u64,
}

impl<'a> AlertEvaluator<'a> {
    pub fn new(classifier: &'a DomainClassifier, threshold_seconds: u64, goal_minutes: u64) -> Self {
        Self {
            classifier,
            threshold_seconds,
            goal_minutes,
        }
    }

    /// Warns when the active domain is distracting and has been used longer than the threshold
    /// today.
    pub fn evaluate(&self, session: &ActivitySession, snapshot: &LedgerSnapshot) -> Option<Advisory> {
        let domain = session.domain().filter(|_| session.is_tracking())?;
        if self.classifier.classify(domain) != Productivity::Distracting {
            return None;
        }
        let seconds = snapshot.get(domain);
        (seconds > self.threshold_seconds).then(|| Advisory::Distraction {
            domain: domain.to_owned(),
            seconds,
        })
    }

    /// Tells that today's productive time already covers the goal. This is purely informative,
    /// the streak itself only moves at rollover.
    pub fn goal_progress(&self, snapshot: &LedgerSnapshot) -> Option<Advisory> {
        let productive_minutes = self.classifier.productive_seconds(snapshot) / 60;
        (self.goal_minutes > 0 && productive_minutes >= self.goal_minutes).then_some(
            Advisory::GoalReached {
                productive_minutes,
                goal_minutes: self.goal_minutes,
            },
        )
    }
}

/// Remembers which advisories were already raised today, so that every distracting domain is
/// reported once per threshold crossing and the goal once per day.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlertThrottle {
    alerted_domains: BTreeSet<String>,
    goal_announced: bool,
}

impl AlertThrottle {
    /// Returns `true` if the advisory should be delivered and marks it as delivered.
    pub fn admit(&mut self, advisory: &Advisory) -> bool {
        match advisory {
            Advisory::StreakReset { .. } => true,
            Advisory::Distraction { domain, .. } => self.alerted_domains.insert(domain.clone()),
            Advisory::GoalReached { .. } => !std::mem::replace(&mut self.goal_announced, true),
        }
    }

    pub fn clear(&mut self) {
        self.alerted_domains.clear();
        self.goal_announced = false;
    }

    /// Throttle as it was stored with the ledger of the same day.
    pub fn from_parts(alerted_domains: BTreeSet<String>, goal_announced: bool) -> Self {
        Self {
            alerted_domains,
            goal_announced,
        }
    }

    pub fn alerted_domains(&self) -> &BTreeSet<String> {
        &self.alerted_domains
    }

    pub fn goal_announced(&self) -> bool {
        self.goal_announced
    }

    /// Everything announced by either throttle stays announced.
    pub fn merge(&mut self, other: &AlertThrottle) {
        self.alerted_domains.extend(other.alerted_domains.iter().cloned());
        self.goal_announced |= other.goal_announced;
    }
}
