pub mod reset;
pub mod status;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use reset::process_reset_command;
use status::process_status_command;
use tracing::level_filters::LevelFilter;

use crate::{
    daemon::{
        args::{EngineArgs, GoalArgs},
        start_daemon,
    },
    engine::{classifier::Productivity, session::normalize_domain},
    utils::{
        dir::{create_application_default_path, ensure_dir},
        logging::{enable_logging, CLI_PREFIX, DAEMON_PREFIX},
    },
};

#[derive(Parser, Debug)]
#[command(name = "focus-streak", version, long_about = None)]
#[command(about = "Tracks time spent on websites and keeps a daily focus streak", long_about = None)]
struct Args {
    #[command(subcommand)]
    commands: Commands,
    #[arg(long, global = true, help = "Enable logging")]
    log: bool,
    #[arg(
        long,
        global = true,
        help = "Application directory. By default tries to save into $XDG_STATE_HOME or $HOME/.local/state"
    )]
    dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        about = "Run the tracker in the current console. Browser messages are read from stdin, notifications are written to stdout"
    )]
    Serve {
        #[command(flatten)]
        engine: EngineArgs,
    },
    #[command(about = "Show the streak and today's time per site")]
    Status {
        #[command(flatten)]
        goal: GoalArgs,
    },
    #[command(
        about = "Clear today's time per site. The streak is kept. A running tracker should be reset from the browser instead"
    )]
    Reset {
        #[arg(long, short, help = "Don't ask for confirmation")]
        yes: bool,
    },
    #[command(about = "Show whether sites count as productive")]
    Classify {
        #[command(flatten)]
        goal: GoalArgs,
        #[arg(required = true, help = "Urls or domains")]
        targets: Vec<String>,
    },
}

pub async fn run_cli() -> Result<()> {
    let args = Args::parse();

    let app_dir = args
        .dir
        .map_or_else(create_application_default_path, ensure_dir)?;

    let logging_level = if args.log {
        Some(LevelFilter::TRACE)
    } else {
        None
    };
    let prefix = match args.commands {
        Commands::Serve { .. } => DAEMON_PREFIX,
        _ => CLI_PREFIX,
    };
    enable_logging(prefix, &app_dir, logging_level, args.log)?;

    match args.commands {
        Commands::Serve { engine } => {
            start_daemon(app_dir, engine.to_config(), engine.notify).await
        }
        Commands::Status { goal } => process_status_command(&app_dir, &goal).await,
        Commands::Reset { yes } => process_reset_command(&app_dir, yes).await,
        Commands::Classify { goal, targets } => {
            let classifier = goal.classifier();
            for target in targets {
                let domain = to_domain(&target);
                let label = match classifier.classify(&domain) {
                    Productivity::Productive => "productive",
                    Productivity::Distracting => "distracting",
                };
                println!("{domain}\t{label}");
            }
            Ok(())
        }
    }
}

/// Accepts a full url as well as a bare domain.
fn to_domain(target: &str) -> String {
    normalize_domain(target)
        .or_else(|| normalize_domain(&format!("https://{target}")))
        .unwrap_or_else(|| target.to_owned())
}

#[cfg(test)]
mod tests {
    use super::to_domain;

    #[test]
    fn test_to_domain() {
        assert_eq!(to_domain("https://www.github.com/rust-lang"), "github.com");
        assert_eq!(to_domain("www.youtube.com"), "youtube.com");
        assert_eq!(to_domain("docs.rs"), "docs.rs");
    }
}
