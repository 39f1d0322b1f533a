use chrono::NaiveDate;
use tracing::{debug, warn};

use super::{classifier::DomainClassifier, ledger::Ledger, streak::StreakState};

/// Judgement of a finished day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    pub evaluated_date: NaiveDate,
    pub productive_minutes: u64,
    pub met_goal: bool,
    /// Whole days between the evaluated date and today without any ledger. Informational only.
    pub skipped_days: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Decision {
    /// First run. There is no previous day to judge.
    Initialize,
    /// The ledger date was already judged, only the ledger moves.
    Realign,
    Judge(Verdict),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RolloverPhase {
    Idle,
    Evaluate { ledger_date: NaiveDate },
    Apply(Decision),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RolloverReport {
    pub verdict: Verdict,
    pub previous_streak: u32,
    pub new_streak: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RolloverOutcome {
    Unchanged,
    Initialized { today: NaiveDate },
    Realigned { today: NaiveDate },
    Rolled(RolloverReport),
}

/// Detects date boundary crossings, judges the finished day and starts a new one.
///
/// Running it again on the same date does nothing, the ledger date acts as the guard.
pub struct RolloverEngine<'a> {
    classifier: &'a DomainClassifier,
    goal_minutes: u64,
}

impl<'a> RolloverEngine<'a> {
    pub fn new(classifier: &'a DomainClassifier, goal_minutes: u64) -> Self {
        Self {
            classifier,
            goal_minutes,
        }
    }

    pub fn run(
        &self,
        ledger: &mut Ledger,
        streak: &mut StreakState,
        today: NaiveDate,
    ) -> RolloverOutcome {
        let mut phase = RolloverPhase::Idle;
        loop {
            debug!("Rollover phase {phase:?}");
            phase = match phase {
                RolloverPhase::Idle => match ledger.date() {
                    None => RolloverPhase::Apply(Decision::Initialize),
                    Some(date) if date == today => return RolloverOutcome::Unchanged,
                    Some(date) if date > today => {
                        warn!("Ledger date {date} is ahead of {today}, keeping it until the clock catches up");
                        return RolloverOutcome::Unchanged;
                    }
                    Some(ledger_date) => RolloverPhase::Evaluate { ledger_date },
                },
                RolloverPhase::Evaluate { ledger_date } => {
                    if streak.was_evaluated(ledger_date) {
                        RolloverPhase::Apply(Decision::Realign)
                    } else {
                        RolloverPhase::Apply(Decision::Judge(self.evaluate(
                            ledger,
                            ledger_date,
                            today,
                        )))
                    }
                }
                RolloverPhase::Apply(decision) => {
                    return self.apply(decision, ledger, streak, today);
                }
            }
        }
    }

    fn evaluate(&self, ledger: &Ledger, ledger_date: NaiveDate, today: NaiveDate) -> Verdict {
        let productive_seconds = self.classifier.productive_seconds(&ledger.snapshot());
        let productive_minutes = productive_seconds / 60;
        let skipped_days = (today - ledger_date).num_days().saturating_sub(1).max(0);
        Verdict {
            evaluated_date: ledger_date,
            productive_minutes,
            met_goal: productive_minutes >= self.goal_minutes,
            skipped_days: u32::try_from(skipped_days).unwrap_or(u32::MAX),
        }
    }

    fn apply(
        &self,
        decision: Decision,
        ledger: &mut Ledger,
        streak: &mut StreakState,
        today: NaiveDate,
    ) -> RolloverOutcome {
        match decision {
            Decision::Initialize => {
                // Whatever was recorded before the first check belongs to today.
                ledger.adopt(today);
                RolloverOutcome::Initialized { today }
            }
            Decision::Realign => {
                ledger.reset(today);
                RolloverOutcome::Realigned { today }
            }
            Decision::Judge(verdict) => {
                let previous_streak = streak.count;
                // Only the ledger day is judged, days without a ledger don't move the streak.
                streak.advance(verdict.evaluated_date, verdict.met_goal);
                ledger.reset(today);
                RolloverOutcome::Rolled(RolloverReport {
                    verdict,
                    previous_streak,
                    new_streak: streak.count,
                })
            }
        }
    }
}
