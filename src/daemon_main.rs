use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use focus_streak::{
    daemon::{args::DaemonArgs, start_daemon},
    utils::{
        dir::{create_application_default_path, ensure_dir},
        logging::{enable_logging, DAEMON_PREFIX},
        runtime::single_thread_runtime,
    },
};

/// Time given to blocking tasks after the daemon stopped. A read on stdin never finishes on its
/// own.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

fn main() -> Result<()> {
    run(DaemonArgs::parse())
}

fn run(args: DaemonArgs) -> Result<()> {
    let app_dir = args
        .dir
        .map_or_else(create_application_default_path, ensure_dir)?;
    enable_logging(DAEMON_PREFIX, &app_dir, args.log, args.log_console)?;
    let config = args.engine.to_config();
    let notify = args.engine.notify;
    let runtime = single_thread_runtime()?;
    let result = runtime.block_on(start_daemon(app_dir, config, notify));
    runtime.shutdown_timeout(SHUTDOWN_TIMEOUT);
    result
}
