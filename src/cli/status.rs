use std::{fmt::Write, path::Path};

use ansi_term::{Colour, Style};
use anyhow::Result;
use chrono::{Local, NaiveDate};

use crate::{
    daemon::{
        args::GoalArgs,
        storage::{
            entities::StateEntity,
            state_storage::{FileStateStorage, StateStorage},
        },
    },
    engine::{
        classifier::{DomainClassifier, Productivity},
        ledger::Ledger,
    },
    utils::{dir::STATE_FILE_NAME, time::format_date},
};

/// Command to process `status`. Shows the stored state without changing it, a day that has
/// ended is judged the next time the tracker runs.
pub async fn process_status_command(app_dir: &Path, goal: &GoalArgs) -> Result<()> {
    let storage = FileStateStorage::new(app_dir.join(STATE_FILE_NAME))?;
    let state = storage.load().await?.unwrap_or_default();
    let report = StatusReport {
        classifier: goal.classifier(),
        goal_minutes: goal.goal_minutes,
        today: Local::now().date_naive(),
        colored: true,
    };
    print!("{}", report.render(state)?);
    Ok(())
}

struct StatusReport {
    classifier: DomainClassifier,
    goal_minutes: u64,
    today: NaiveDate,
    colored: bool,
}

impl StatusReport {
    fn paint(&self, style: Style, text: &str) -> String {
        if self.colored {
            style.paint(text).to_string()
        } else {
            text.to_owned()
        }
    }

    fn render(&self, state: StateEntity) -> Result<String> {
        let (ledger, streak, _) = state.into_state();
        let mut out = String::new();

        let days = if streak.count == 1 { "day" } else { "days" };
        writeln!(
            out,
            "Focus streak: {} {days}",
            self.paint(Style::new().bold(), &streak.count.to_string())
        )?;

        let snapshot = ledger.snapshot();
        if snapshot.is_empty() {
            writeln!(out, "No activity yet")?;
            return Ok(out);
        }

        let productive_minutes = self.classifier.productive_seconds(&snapshot) / 60;
        let progress_style = if productive_minutes >= self.goal_minutes {
            Colour::Green.normal()
        } else {
            Colour::Yellow.normal()
        };
        writeln!(
            out,
            "{}: {} min tracked, {} of {} productive min",
            self.day_label(&ledger),
            snapshot.total_seconds() / 60,
            self.paint(progress_style, &productive_minutes.to_string()),
            self.goal_minutes
        )?;

        for (domain, seconds) in snapshot.sorted_by_time() {
            let (label, style) = match self.classifier.classify(domain) {
                Productivity::Productive => ("productive", Colour::Green.normal()),
                Productivity::Distracting => ("distracting", Colour::Red.normal()),
            };
            writeln!(
                out,
                "  {}\t{domain}\t{}",
                format_seconds(seconds),
                self.paint(style, label)
            )?;
        }
        Ok(out)
    }

    fn day_label(&self, ledger: &Ledger) -> String {
        match ledger.date() {
            Some(date) if date == self.today => "Today".to_owned(),
            Some(date) => format!("{} (not judged yet)", format_date(date)),
            None => "Today".to_owned(),
        }
    }
}

fn format_seconds(seconds: u64) -> String {
    let (hours, minutes, seconds) = (seconds / 3600, seconds / 60 % 60, seconds % 60);
    if hours > 0 {
        format!("{hours}h{minutes}m{seconds}s")
    } else if minutes > 0 {
        format!("{minutes}m{seconds}s")
    } else {
        format!("{seconds}s")
    }
}
