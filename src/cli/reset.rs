use std::path::Path;

use anyhow::Result;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::info;

use crate::{daemon::storage::state_storage::FileStateStorage, utils::dir::STATE_FILE_NAME};

const RUNNING_TRACKER_NOTE: &str = "A running tracker keeps its own copy of today and writes it \
back on its next save. Reset from the browser while it runs.";

/// Command to process `reset`. Clears the time per site and keeps the streak and the date.
pub async fn process_reset_command(app_dir: &Path, yes: bool) -> Result<()> {
    if !yes {
        println!("Clear today's time per site? The streak is kept. [y/N]");
        if !confirmed(BufReader::new(tokio::io::stdin())).await? {
            println!("Nothing changed");
            return Ok(());
        }
    }
    let storage = FileStateStorage::new(app_dir.join(STATE_FILE_NAME))?;
    clear_time_data(&storage).await?;
    println!("Today's activity was cleared in the state file");
    println!("{RUNNING_TRACKER_NOTE}");
    Ok(())
}

async fn clear_time_data(storage: &FileStateStorage) -> Result<()> {
    let state = storage
        .update(|state| {
            state.time_data.clear();
            state.alerted_domains.clear();
            state.goal_announced = false;
        })
        .await?;
    info!("Cleared time data, streak stays at {}", state.focus_streak);
    Ok(())
}

async fn confirmed(input: impl AsyncBufRead + Unpin) -> Result<bool> {
    let answer = input.lines().next_line().await?.unwrap_or_default();
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}
