use std::{path::PathBuf, time::Duration};

use clap::{Args, Parser, ValueEnum};
use tracing::level_filters::LevelFilter;

use crate::engine::{
    alert::DEFAULT_ALERT_THRESHOLD_SECONDS, classifier::DomainClassifier, EngineConfig,
    DEFAULT_FLUSH_INTERVAL, DEFAULT_GOAL_MINUTES,
};

#[derive(Parser, Debug)]
pub struct DaemonArgs {
    #[arg(
        long,
        help = "Application directory. By default tries to save into $XDG_STATE_HOME or $HOME/.local/state"
    )]
    pub dir: Option<PathBuf>,
    /// This option is for debugging purposes only.
    #[arg(long = "log-console")]
    pub log_console: bool,
    #[arg(long = "log-filter")]
    pub log: Option<LevelFilter>,
    #[command(flatten)]
    pub engine: EngineArgs,
}

/// Where notifications end up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum NotifyTarget {
    /// Json lines on stdout, read by the browser side.
    #[default]
    Stdout,
    /// Only the log.
    Log,
}

/// What counts as a good day. Shared by the tracker and the `status` command.
#[derive(Args, Debug, Clone)]
pub struct GoalArgs {
    #[arg(long, default_value_t = DEFAULT_GOAL_MINUTES, help = "Productive minutes needed to keep the streak")]
    pub goal_minutes: u64,
    #[arg(
        long = "productive-site",
        help = "Domain fragment counted as productive. Replaces the default list when given"
    )]
    pub productive_sites: Vec<String>,
}

impl GoalArgs {
    pub fn classifier(&self) -> DomainClassifier {
        if self.productive_sites.is_empty() {
            DomainClassifier::default()
        } else {
            DomainClassifier::new(self.productive_sites.iter().map(String::as_str))
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct EngineArgs {
    #[command(flatten)]
    pub goal: GoalArgs,
    #[arg(
        long,
        default_value_t = DEFAULT_ALERT_THRESHOLD_SECONDS / 60,
        help = "Minutes on a distracting site before an alert"
    )]
    pub alert_minutes: u64,
    #[arg(
        long,
        default_value_t = DEFAULT_FLUSH_INTERVAL.as_secs(),
        value_parser = clap::value_parser!(u64).range(1..),
        help = "How often the time of the active page is saved"
    )]
    pub flush_seconds: u64,
    #[arg(long, value_enum, default_value_t = NotifyTarget::Stdout)]
    pub notify: NotifyTarget,
}

impl EngineArgs {
    pub fn to_config(&self) -> EngineConfig {
        EngineConfig {
            goal_minutes: self.goal.goal_minutes,
            alert_threshold_seconds: self.alert_minutes.saturating_mul(60),
            flush_interval: Duration::from_secs(self.flush_seconds),
            classifier: self.goal.classifier(),
        }
    }
}
