use anyhow::Result;
use tracing::{error, info, warn};

use crate::{
    daemon::{
        notification::{Notification, NotificationSink},
        storage::{entities::StateEntity, state_storage::StateStorage},
    },
    engine::{
        alert::AlertThrottle, ledger::Ledger, streak::StreakState, Effect, Now, Tracker,
        TrackerEvent, TrackerState,
    },
    utils::clock::Clock,
};

use super::module::EventProcessor;

/// Owns the authoritative tracker state. Bridges [ProcessingModule](super::ProcessingModule),
/// the engine and [StateStorage].
///
/// Storage is best-effort: a failed save leaves the state marked dirty and the next event tries
/// again. If the stored state can't be read, nothing is saved and the load is retried on every
/// event, so that a broken file is never overwritten with a fresh streak. Once the stored state
/// is readable it is merged with whatever was tracked in the meantime.
pub struct TrackerProcessor<S: StateStorage> {
    tracker: Tracker,
    state: TrackerState,
    storage: S,
    sink: Box<dyn NotificationSink>,
    clock: Box<dyn Clock>,
    dirty: bool,
    load_pending: bool,
}

impl<S: StateStorage> TrackerProcessor<S> {
    /// Restores the stored state and runs the startup rollover check.
    pub async fn restore(
        tracker: Tracker,
        storage: S,
        sink: Box<dyn NotificationSink>,
        clock: Box<dyn Clock>,
    ) -> Self {
        let config = tracker.config();
        info!(
            "Goal is {} productive minutes, alerts after {}s, productive sites {:?}",
            config.goal_minutes,
            config.alert_threshold_seconds,
            config.classifier.rules()
        );
        let (state, load_pending) = match storage.load().await {
            Ok(Some(entity)) => {
                let (ledger, streak, throttle) = entity.into_state();
                (
                    TrackerState::restore(ledger, streak, throttle, clock.time()),
                    false,
                )
            }
            Ok(None) => {
                info!("No stored state, starting from scratch");
                (Self::empty_state(clock.as_ref()), false)
            }
            Err(e) => {
                error!("Failed to load stored state, tracking in memory until it loads {e:?}");
                (Self::empty_state(clock.as_ref()), true)
            }
        };
        let mut processor = Self {
            tracker,
            state,
            storage,
            sink,
            clock,
            dirty: false,
            load_pending,
        };
        if let Err(e) = processor.apply(TrackerEvent::FlushTick).await {
            warn!("Startup check couldn't be saved {e:?}");
        }
        processor
    }

    fn empty_state(clock: &dyn Clock) -> TrackerState {
        TrackerState::restore(
            Ledger::new(None),
            StreakState::default(),
            AlertThrottle::default(),
            clock.time(),
        )
    }

    pub fn state(&self) -> &TrackerState {
        &self.state
    }

    async fn apply(&mut self, event: TrackerEvent) -> Result<()> {
        let now = Now::observe(self.clock.as_ref());
        let mut effects = if self.load_pending {
            self.retry_load(&now).await
        } else {
            vec![]
        };
        let state = std::mem::take(&mut self.state);
        let (state, step_effects) = self.tracker.step(state, event, &now);
        self.state = state;
        effects.extend(step_effects);

        let mut notifications = vec![];
        for effect in effects {
            match effect {
                Effect::Persist => self.dirty = true,
                Effect::Notify(advisory) => notifications.push(Notification::from(&advisory)),
            }
        }

        // State is saved before anything is announced.
        let persisted = self.persist().await;
        for notification in notifications {
            info!("Notifying {notification:?}");
            if let Err(e) = self.sink.notify(notification).await {
                error!("Failed to deliver notification {e:?}");
            }
        }
        persisted
    }

    async fn retry_load(&mut self, now: &Now) -> Vec<Effect> {
        match self.storage.load().await {
            Ok(stored) => {
                info!("Stored state loaded, saving is enabled again");
                self.load_pending = false;
                match stored {
                    Some(entity) => self.merge_stored(entity, now),
                    None => vec![Effect::Persist],
                }
            }
            Err(e) => {
                warn!("Stored state is still unreadable, keeping changes in memory {e:?}");
                vec![]
            }
        }
    }

    /// Replaces the in-memory state with the stored one and adds what was tracked without it.
    fn merge_stored(&mut self, entity: StateEntity, now: &Now) -> Vec<Effect> {
        let (ledger, streak, throttle) = entity.into_state();
        let stored = TrackerState::restore(ledger, streak, throttle, now.time);
        // Stored days are judged before anything is added, the session only saw today.
        let (mut merged, mut effects) = self.tracker.step(stored, TrackerEvent::FlushTick, now);
        let tracked = std::mem::take(&mut self.state);
        if tracked.ledger.date() == merged.ledger.date() {
            for (domain, seconds) in tracked.ledger.entries() {
                merged
                    .ledger
                    .increment(Some(domain.as_str()), i64::try_from(*seconds).unwrap_or(i64::MAX));
            }
            merged.throttle.merge(&tracked.throttle);
        }
        merged.session = tracked.session;
        self.state = merged;
        effects.push(Effect::Persist);
        effects
    }

    async fn persist(&mut self) -> Result<()> {
        if !self.dirty || self.load_pending {
            return Ok(());
        }
        let entity = StateEntity::from_state(&self.state);
        self.storage.save(&entity).await?;
        self.dirty = false;
        Ok(())
    }
}

impl<S: StateStorage> EventProcessor for TrackerProcessor<S> {
    async fn process_next(&mut self, message: TrackerEvent) -> Result<()> {
        self.apply(message).await
    }

    async fn finalize(&mut self) -> Result<()> {
        // Whatever the active page accumulated since the last tick.
        self.apply(TrackerEvent::FlushTick).await
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{Arc, Mutex},
        time::Duration,
    };

    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use chrono::{DateTime, NaiveDate, TimeZone, Utc};
    use tempfile::tempdir;
    use tokio::time::Instant;

    use crate::{
        daemon::{
            notification::{LogNotificationSink, MockNotificationSink},
            processing::module::EventProcessor,
            storage::{
                entities::{StateEntity, STATE_VERSION},
                state_storage::{FileStateStorage, StateStorage},
            },
        },
        engine::{EngineConfig, Tracker, TrackerEvent},
        utils::{clock::Clock, time::utc_day_start},
    };

    use super::TrackerProcessor;

    /// Clock that only moves when told to.
    #[derive(Clone)]
    struct ManualClock {
        now: Arc<Mutex<DateTime<Utc>>>,
    }

    impl ManualClock {
        fn new(now: DateTime<Utc>) -> Self {
            Self {
                now: Arc::new(Mutex::new(now)),
            }
        }

        fn advance(&self, seconds: i64) {
            *self.now.lock().unwrap() += chrono::Duration::seconds(seconds);
        }
    }

    #[async_trait]
    impl Clock for ManualClock {
        fn time(&self) -> DateTime<Utc> {
            *self.now.lock().unwrap()
        }

        fn instant(&self) -> Instant {
            Instant::now()
        }

        fn local_date(&self, time: DateTime<Utc>) -> NaiveDate {
            time.date_naive()
        }

        fn day_start(&self, date: NaiveDate) -> DateTime<Utc> {
            utc_day_start(date)
        }

        async fn sleep(&self, duration: Duration) {
            tokio::time::sleep(duration).await;
        }

        async fn sleep_until(&self, instant: Instant) {
            tokio::time::sleep_until(instant).await;
        }
    }

    struct BrokenStorage;

    impl StateStorage for BrokenStorage {
        async fn load(&self) -> Result<Option<StateEntity>> {
            Ok(None)
        }

        async fn save(&self, _: &StateEntity) -> Result<()> {
            Err(anyhow!("disk is gone"))
        }
    }

    /// Fails the first `failing_loads` loads, then serves `stored`. Counts saves.
    struct FlakyStorage {
        failing_loads: Mutex<usize>,
        stored: Mutex<Option<StateEntity>>,
        saves: Mutex<usize>,
    }

    impl FlakyStorage {
        fn new(failing_loads: usize, stored: Option<StateEntity>) -> Self {
            Self {
                failing_loads: Mutex::new(failing_loads),
                stored: Mutex::new(stored),
                saves: Mutex::new(0),
            }
        }

        fn saves(&self) -> usize {
            *self.saves.lock().unwrap()
        }
    }

    impl StateStorage for FlakyStorage {
        async fn load(&self) -> Result<Option<StateEntity>> {
            let mut failing = self.failing_loads.lock().unwrap();
            if *failing > 0 {
                *failing -= 1;
                return Err(anyhow!("state file is locked by someone else"));
            }
            Ok(self.stored.lock().unwrap().clone())
        }

        async fn save(&self, entity: &StateEntity) -> Result<()> {
            *self.stored.lock().unwrap() = Some(entity.clone());
            *self.saves.lock().unwrap() += 1;
            Ok(())
        }
    }

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2018, 7, 4, 10, 0, 0).unwrap()
    }

    fn focus(url: &str) -> TrackerEvent {
        TrackerEvent::FocusChanged {
            tab_id: 1,
            url: Some(url.into()),
        }
    }

    #[tokio::test]
    async fn test_first_start_saves_initialized_state() -> Result<()> {
        let dir = tempdir()?;
        let storage = FileStateStorage::new(dir.path().join("state.json"))?;
        let clock = ManualClock::new(start());

        TrackerProcessor::restore(
            Tracker::new(EngineConfig::default()),
            &storage,
            Box::new(LogNotificationSink),
            Box::new(clock),
        )
        .await;

        let stored = storage.load().await?.unwrap();
        assert_eq!(stored.last_date, Some(start().date_naive()));
        assert_eq!(stored.focus_streak, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_events_are_saved() -> Result<()> {
        let dir = tempdir()?;
        let storage = FileStateStorage::new(dir.path().join("state.json"))?;
        let clock = ManualClock::new(start());
        let mut processor = TrackerProcessor::restore(
            Tracker::new(EngineConfig::default()),
            &storage,
            Box::new(LogNotificationSink),
            Box::new(clock.clone()),
        )
        .await;

        processor.process_next(focus("https://www.github.com/x")).await?;
        clock.advance(100);
        processor.process_next(TrackerEvent::FlushTick).await?;
        clock.advance(20);
        processor.process_next(TrackerEvent::WindowFocusLost).await?;

        let stored = storage.load().await?.unwrap();
        assert_eq!(stored.time_data["github.com"], 120);
        Ok(())
    }

    #[tokio::test]
    async fn test_startup_rollover_extends_streak() -> Result<()> {
        let dir = tempdir()?;
        let storage = FileStateStorage::new(dir.path().join("state.json"))?;
        storage
            .save(&StateEntity {
                version: STATE_VERSION,
                time_data: [("coursera.org".to_string(), 2000)].into_iter().collect(),
                focus_streak: 6,
                last_date: NaiveDate::from_ymd_opt(2018, 7, 3),
                last_evaluated_date: None,
                ..Default::default()
            })
            .await?;

        let processor = TrackerProcessor::restore(
            Tracker::new(EngineConfig::default()),
            &storage,
            Box::new(LogNotificationSink),
            Box::new(ManualClock::new(start())),
        )
        .await;

        assert_eq!(processor.state().streak.count, 7);
        let stored = storage.load().await?.unwrap();
        assert_eq!(stored.focus_streak, 7);
        assert!(stored.time_data.is_empty());
        assert_eq!(stored.last_date, Some(start().date_naive()));
        Ok(())
    }

    #[tokio::test]
    async fn test_storage_failure_keeps_tracking() -> Result<()> {
        let clock = ManualClock::new(start());
        let mut processor = TrackerProcessor::restore(
            Tracker::new(EngineConfig::default()),
            BrokenStorage,
            Box::new(LogNotificationSink),
            Box::new(clock.clone()),
        )
        .await;

        processor.process_next(focus("https://github.com")).await.ok();
        clock.advance(30);
        assert!(processor.process_next(TrackerEvent::FlushTick).await.is_err());
        clock.advance(30);
        assert!(processor.process_next(TrackerEvent::FlushTick).await.is_err());

        assert_eq!(processor.state().ledger.get("github.com"), 60);
        Ok(())
    }

    #[tokio::test]
    async fn test_distraction_is_notified_once() -> Result<()> {
        let dir = tempdir()?;
        let storage = FileStateStorage::new(dir.path().join("state.json"))?;
        let clock = ManualClock::new(start());
        let mut sink = MockNotificationSink::new();
        sink.expect_notify()
            .withf(|n| n.message.contains("youtube.com"))
            .times(1)
            .returning(|_| Ok(()));

        let mut processor = TrackerProcessor::restore(
            Tracker::new(EngineConfig::default()),
            &storage,
            Box::new(sink),
            Box::new(clock.clone()),
        )
        .await;

        processor.process_next(focus("https://youtube.com/watch")).await?;
        for _ in 0..100 {
            clock.advance(5);
            processor.process_next(TrackerEvent::FlushTick).await?;
        }
        processor.finalize().await?;

        assert_eq!(processor.state().ledger.get("youtube.com"), 500);
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_load_is_retried_before_saving() -> Result<()> {
        // Startup load and the startup check both fail.
        let storage = FlakyStorage::new(2, None);
        let mut processor = TrackerProcessor::restore(
            Tracker::new(EngineConfig::default()),
            &storage,
            Box::new(LogNotificationSink),
            Box::new(ManualClock::new(start())),
        )
        .await;
        assert_eq!(storage.saves(), 0);

        for _ in 0..3 {
            processor.process_next(TrackerEvent::ResetLedger).await?;
        }

        assert_eq!(storage.saves(), 3);
        Ok(())
    }

    #[tokio::test]
    async fn test_late_load_is_merged() -> Result<()> {
        let storage = FlakyStorage::new(
            1,
            Some(StateEntity {
                version: STATE_VERSION,
                time_data: [("github.com".to_string(), 600)].into_iter().collect(),
                focus_streak: 4,
                last_date: Some(start().date_naive()),
                last_evaluated_date: NaiveDate::from_ymd_opt(2018, 7, 3),
                alerted_domains: ["youtube.com".to_string()].into_iter().collect(),
                ..Default::default()
            }),
        );
        let clock = ManualClock::new(start());
        let mut processor = TrackerProcessor::restore(
            Tracker::new(EngineConfig::default()),
            &storage,
            Box::new(LogNotificationSink),
            Box::new(clock.clone()),
        )
        .await;

        // The startup check already read the stored state.
        assert_eq!(processor.state().streak.count, 4);
        processor.process_next(focus("https://github.com")).await?;
        clock.advance(100);
        processor.process_next(TrackerEvent::FlushTick).await?;

        let stored = storage.load().await?.unwrap();
        assert_eq!(stored.time_data["github.com"], 700);
        assert_eq!(stored.focus_streak, 4);
        assert!(stored.alerted_domains.contains("youtube.com"));
        Ok(())
    }

    #[tokio::test]
    async fn test_unreadable_state_is_not_overwritten() -> Result<()> {
        let storage = FlakyStorage::new(usize::MAX, None);
        let clock = ManualClock::new(start());
        let mut processor = TrackerProcessor::restore(
            Tracker::new(EngineConfig::default()),
            &storage,
            Box::new(LogNotificationSink),
            Box::new(clock.clone()),
        )
        .await;

        processor.process_next(focus("https://github.com")).await?;
        clock.advance(30);
        processor.process_next(TrackerEvent::FlushTick).await?;

        assert_eq!(processor.state().ledger.get("github.com"), 30);
        assert_eq!(storage.saves(), 0);
        Ok(())
    }
}
