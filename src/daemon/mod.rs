use std::{path::PathBuf, time::Duration};

use anyhow::Result;
use args::NotifyTarget;
use collection::{collector::DataCollectionModule, scheduler::Scheduler};
use notification::{LineNotificationSink, LogNotificationSink, NotificationSink};
use processing::{tracker_processor::TrackerProcessor, ProcessingModule};
use storage::state_storage::FileStateStorage;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::{
    browser_api::{lines::LineEventSource, EventSource},
    engine::{EngineConfig, Tracker, TrackerEvent},
    utils::{
        clock::{Clock, DefaultClock},
        dir::STATE_FILE_NAME,
    },
};

pub mod args;
pub mod collection;
pub mod notification;
pub mod processing;
pub mod shutdown;
pub mod storage;

const EVENT_CHANNEL_CAPACITY: usize = 32;

/// Represents the starting point for the daemon. Browser messages are read from stdin,
/// notifications go to `notify`.
pub async fn start_daemon(dir: PathBuf, config: EngineConfig, notify: NotifyTarget) -> Result<()> {
    let (sender, receiver) = mpsc::channel::<TrackerEvent>(EVENT_CHANNEL_CAPACITY);

    let shutdown_token = CancellationToken::new();

    let collector = create_collector(sender.clone(), LineEventSource::stdin(), &shutdown_token);

    let scheduler = create_scheduler(sender, &shutdown_token, config.flush_interval, DefaultClock);

    let sink: Box<dyn NotificationSink> = match notify {
        NotifyTarget::Stdout => Box::new(LineNotificationSink::stdout()),
        NotifyTarget::Log => Box::new(LogNotificationSink),
    };
    let processor =
        create_processor(dir.join(STATE_FILE_NAME), receiver, config, sink, DefaultClock).await?;

    info!("Tracker started in {dir:?}");
    let (_, collection_result, scheduler_result, processing_result) = tokio::join!(
        shutdown::detect_shutdown(shutdown_token.clone()),
        collector.run(),
        scheduler.run(),
        processor.run(),
    );

    if let Err(collection_result) = collection_result {
        error!("Collection module got an error {:?}", collection_result);
    }

    if let Err(scheduler_result) = scheduler_result {
        error!("Scheduler got an error {:?}", scheduler_result);
    }

    if let Err(processing_result) = processing_result {
        error!("Processing module got an error {:?}", processing_result);
    }

    info!("Tracker stopped");
    Ok(())
}

fn create_collector(
    sender: mpsc::Sender<TrackerEvent>,
    source: impl EventSource + 'static,
    shutdown_token: &CancellationToken,
) -> DataCollectionModule {
    DataCollectionModule::new(sender, Box::new(source), shutdown_token.clone())
}

fn create_scheduler(
    sender: mpsc::Sender<TrackerEvent>,
    shutdown_token: &CancellationToken,
    flush_interval: Duration,
    clock: impl Clock,
) -> Scheduler {
    Scheduler::new(sender, shutdown_token.clone(), flush_interval, Box::new(clock))
}

async fn create_processor(
    state_path: PathBuf,
    receiver: mpsc::Receiver<TrackerEvent>,
    config: EngineConfig,
    sink: Box<dyn NotificationSink>,
    clock: impl Clock,
) -> Result<ProcessingModule<TrackerProcessor<FileStateStorage>>> {
    let storage = FileStateStorage::new(state_path)?;
    let processor =
        TrackerProcessor::restore(Tracker::new(config), storage, sink, Box::new(clock)).await;
    Ok(ProcessingModule::new(receiver, processor))
}
