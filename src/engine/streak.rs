use chrono::NaiveDate;

/// Streak transition. Meeting the goal extends the streak, missing it starts over from zero.
pub fn next(count: u32, met_goal: bool) -> u32 {
    if met_goal {
        count.saturating_add(1)
    } else {
        0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreakState {
    pub count: u32,
    /// Ledger date judged by the last rollover. A date is never judged twice.
    pub last_evaluated_date: Option<NaiveDate>,
}

impl StreakState {
    pub fn new(count: u32, last_evaluated_date: Option<NaiveDate>) -> Self {
        Self {
            count,
            last_evaluated_date,
        }
    }

    pub fn was_evaluated(&self, date: NaiveDate) -> bool {
        self.last_evaluated_date == Some(date)
    }

    /// Records the verdict for `date` and returns the new count.
    pub fn advance(&mut self, date: NaiveDate, met_goal: bool) -> u32 {
        self.count = next(self.count, met_goal);
        self.last_evaluated_date = Some(date);
        self.count
    }
}
