//! Activity ledger and streak engine.
//!
//! Everything in here is synchronous and free of I/O. [Tracker::step] is the only entry point
//! used by the daemon: it takes the previous [TrackerState] and an event and returns the next
//! state together with the [Effect]s the caller has to carry out.

pub mod alert;
pub mod classifier;
pub mod ledger;
pub mod rollover;
pub mod session;
pub mod streak;

use std::time::Duration;

use alert::{Advisory, AlertEvaluator, AlertThrottle, DEFAULT_ALERT_THRESHOLD_SECONDS};
use chrono::{DateTime, NaiveDate, Utc};
use classifier::DomainClassifier;
use ledger::Ledger;
use rollover::{RolloverEngine, RolloverOutcome};
use session::{normalize_domain, ActivitySession};
use streak::StreakState;
use tracing::{debug, info};

use crate::utils::clock::Clock;

pub const DEFAULT_GOAL_MINUTES: u64 = 30;
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub goal_minutes: u64,
    pub alert_threshold_seconds: u64,
    /// How often dwell time is moved into the ledger while the focus doesn't change. Bounds the
    /// amount of time lost on an abrupt shutdown.
    pub flush_interval: Duration,
    pub classifier: DomainClassifier,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            goal_minutes: DEFAULT_GOAL_MINUTES,
            alert_threshold_seconds: DEFAULT_ALERT_THRESHOLD_SECONDS,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            classifier: DomainClassifier::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackerEvent {
    /// Another tab became active.
    FocusChanged { tab_id: i64, url: Option<String> },
    /// The active tab finished loading a page.
    NavigationCompleted { tab_id: i64, url: Option<String> },
    WindowFocusLost,
    WindowFocusGained {
        tab_id: Option<i64>,
        url: Option<String>,
    },
    /// Periodic flush.
    FlushTick,
    /// Scheduled wake-up at local midnight.
    DailyTick,
    /// Manual "reset today" request from the display surface.
    ResetLedger,
}

/// Point in time an event is handled at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Now {
    pub time: DateTime<Utc>,
    /// Local calendar date of `time`.
    pub today: NaiveDate,
    /// Instant the local `today` started.
    pub day_start: DateTime<Utc>,
}

impl Now {
    pub fn observe(clock: &dyn Clock) -> Self {
        let time = clock.time();
        let today = clock.local_date(time);
        Self {
            time,
            today,
            day_start: clock.day_start(today),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Ledger or streak changed and has to be written to storage.
    Persist,
    Notify(Advisory),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackerState {
    pub session: ActivitySession,
    pub ledger: Ledger,
    pub streak: StreakState,
    pub throttle: AlertThrottle,
}

impl TrackerState {
    /// State restored from storage. Tracking is paused until the first focus event arrives.
    pub fn restore(
        ledger: Ledger,
        streak: StreakState,
        throttle: AlertThrottle,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            session: ActivitySession::paused(now),
            ledger,
            streak,
            throttle,
        }
    }
}

pub struct Tracker {
    config: EngineConfig,
}

impl Tracker {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Handles a single event. Every call checks for a day boundary first, so the rollover
    /// happens on whatever event comes first after midnight.
    pub fn step(
        &self,
        mut state: TrackerState,
        event: TrackerEvent,
        now: &Now,
    ) -> (TrackerState, Vec<Effect>) {
        let mut effects = Vec::new();
        let mut changed = false;

        if matches!(state.ledger.date(), Some(date) if date < now.today) {
            // Dwell before midnight belongs to the day being closed.
            changed |= state.session.flush_until(&mut state.ledger, now.day_start) > 0;
        }

        let outcome = RolloverEngine::new(&self.config.classifier, self.config.goal_minutes).run(
            &mut state.ledger,
            &mut state.streak,
            now.today,
        );
        match outcome {
            RolloverOutcome::Unchanged => {}
            RolloverOutcome::Initialized { today } => {
                info!("Initialized ledger for {today}");
                changed = true;
            }
            RolloverOutcome::Realigned { today } => {
                info!("Ledger moved to {today} without judging an already evaluated day");
                state.throttle.clear();
                changed = true;
            }
            RolloverOutcome::Rolled(report) => {
                let verdict = report.verdict;
                if verdict.met_goal {
                    info!(
                        "Earned streak for {}. productive_minutes={} new_streak={}",
                        verdict.evaluated_date, verdict.productive_minutes, report.new_streak
                    );
                } else {
                    info!(
                        "Missed goal for {}. productive_minutes={} streak reset",
                        verdict.evaluated_date, verdict.productive_minutes
                    );
                }
                if report.new_streak == 0 {
                    effects.push(Effect::Notify(Advisory::StreakReset {
                        productive_minutes: verdict.productive_minutes,
                        goal_minutes: self.config.goal_minutes,
                        previous_streak: report.previous_streak,
                    }));
                }
                state.throttle.clear();
                changed = true;
            }
        }

        debug!("Applying {event:?}");
        let ledger = &mut state.ledger;
        let flushed = match event {
            TrackerEvent::FocusChanged { tab_id, url }
            | TrackerEvent::NavigationCompleted { tab_id, url } => {
                let domain = url.as_deref().and_then(normalize_domain);
                state.session.switch_to(ledger, Some(tab_id), domain, now.time)
            }
            TrackerEvent::WindowFocusGained { tab_id, url } => {
                let domain = url.as_deref().and_then(normalize_domain);
                state.session.switch_to(ledger, tab_id, domain, now.time)
            }
            TrackerEvent::WindowFocusLost => state.session.switch_to(ledger, None, None, now.time),
            TrackerEvent::FlushTick | TrackerEvent::DailyTick => {
                state.session.flush_elapsed(ledger, now.time)
            }
            TrackerEvent::ResetLedger => {
                state.session.flush_elapsed(ledger, now.time);
                ledger.clear_entries();
                state.throttle.clear();
                changed = true;
                0
            }
        };
        changed |= flushed > 0;

        let evaluator = AlertEvaluator::new(
            &self.config.classifier,
            self.config.alert_threshold_seconds,
            self.config.goal_minutes,
        );
        let snapshot = state.ledger.snapshot();
        let advisories = evaluator
            .evaluate(&state.session, &snapshot)
            .into_iter()
            .chain(evaluator.goal_progress(&snapshot));
        for advisory in advisories {
            if state.throttle.admit(&advisory) {
                // The throttle is stored with the ledger.
                changed = true;
                effects.push(Effect::Notify(advisory));
            }
        }

        if changed {
            effects.insert(0, Effect::Persist);
        }
        (state, effects)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};

    use crate::engine::{
        alert::{Advisory, AlertThrottle},
        ledger::Ledger,
        streak::StreakState,
        Effect, EngineConfig, Now, Tracker, TrackerEvent, TrackerState,
    };

    fn at(day: u32, hour: u32, min: u32, sec: u32) -> Now {
        let time = Utc.with_ymd_and_hms(2018, 7, day, hour, min, sec).unwrap();
        Now {
            time,
            today: time.date_naive(),
            day_start: Utc.with_ymd_and_hms(2018, 7, day, 0, 0, 0).unwrap(),
        }
    }

    fn later(now: &Now, seconds: i64) -> Now {
        let time: DateTime<Utc> = now.time + Duration::seconds(seconds);
        Now {
            time,
            today: time.date_naive(),
            day_start: time
                .date_naive()
                .and_hms_opt(0, 0, 0)
                .unwrap()
                .and_utc(),
        }
    }

    fn focus(tab_id: i64, url: &str) -> TrackerEvent {
        TrackerEvent::FocusChanged {
            tab_id,
            url: Some(url.into()),
        }
    }

    fn fresh_state(now: &Now) -> TrackerState {
        TrackerState::restore(
            Ledger::new(Some(now.today)),
            StreakState::default(),
            AlertThrottle::default(),
            now.time,
        )
    }

    #[test]
    fn test_sum_matches_focused_intervals() {
        let tracker = Tracker::new(EngineConfig::default());
        let start = at(4, 10, 0, 0);
        let mut state = fresh_state(&start);

        let script = [
            (0, focus(1, "https://www.github.com/x")),
            (7, TrackerEvent::FlushTick),
            (12, TrackerEvent::FlushTick),
            (40, focus(2, "https://youtube.com/watch")),
            (45, TrackerEvent::FlushTick),
            (100, TrackerEvent::WindowFocusLost),
            (150, TrackerEvent::FlushTick),
            (
                200,
                TrackerEvent::WindowFocusGained {
                    tab_id: Some(2),
                    url: Some("https://youtube.com/watch".into()),
                },
            ),
            (230, focus(3, "not a url")),
            (260, focus(1, "https://github.com/y")),
            (300, TrackerEvent::FlushTick),
        ];

        for (offset, event) in script {
            (state, _) = tracker.step(state, event, &later(&start, offset));
        }

        assert_eq!(state.ledger.get("github.com"), 40 + 40);
        assert_eq!(state.ledger.get("youtube.com"), 60 + 30);
        assert_eq!(state.ledger.snapshot().total_seconds(), 170);
    }

    #[test]
    fn test_flush_without_change_does_not_persist() {
        let tracker = Tracker::new(EngineConfig::default());
        let start = at(4, 10, 0, 0);
        let state = fresh_state(&start);

        let (state, effects) = tracker.step(state, TrackerEvent::FlushTick, &start);
        assert!(effects.is_empty());

        let (_, effects) = tracker.step(state, focus(1, "https://github.com"), &start);
        assert!(effects.is_empty());
    }

    #[test]
    fn test_first_event_initializes_ledger() {
        let tracker = Tracker::new(EngineConfig::default());
        let start = at(4, 10, 0, 0);
        let state = TrackerState::restore(
            Ledger::new(None),
            StreakState::default(),
            AlertThrottle::default(),
            start.time,
        );

        let (state, effects) = tracker.step(state, TrackerEvent::FlushTick, &start);

        assert_eq!(effects, vec![Effect::Persist]);
        assert_eq!(state.ledger.date(), Some(start.today));
        assert_eq!(state.streak.count, 0);
    }

    #[test]
    fn test_midnight_splits_dwell_and_rolls_over() {
        let tracker = Tracker::new(EngineConfig::default());
        let evening = at(4, 23, 0, 0);
        let mut state = fresh_state(&evening);
        state.streak = StreakState::new(4, None);

        (state, _) = tracker.step(state, focus(1, "https://coursera.org/learn"), &evening);
        let (state, effects) =
            tracker.step(state, TrackerEvent::DailyTick, &at(5, 0, 10, 0));

        // 60 minutes before midnight were judged, the 10 after it start the new day.
        assert_eq!(state.streak.count, 5);
        assert_eq!(
            state.streak.last_evaluated_date,
            NaiveDate::from_ymd_opt(2018, 7, 4)
        );
        assert_eq!(state.ledger.date(), NaiveDate::from_ymd_opt(2018, 7, 5));
        assert_eq!(state.ledger.get("coursera.org"), 600);
        assert_eq!(effects[0], Effect::Persist);
    }

    #[test]
    fn test_missed_goal_notifies() {
        let tracker = Tracker::new(EngineConfig::default());
        let yesterday = at(4, 12, 0, 0);
        let mut state = fresh_state(&yesterday);
        state.streak = StreakState::new(3, None);
        state.ledger.increment(Some("github.com"), 1200);
        state.ledger.increment(Some("youtube.com"), 600);

        let (state, effects) = tracker.step(state, TrackerEvent::DailyTick, &at(5, 0, 0, 1));

        assert_eq!(state.streak.count, 0);
        assert!(state.ledger.entries().is_empty());
        assert_eq!(
            effects,
            vec![
                Effect::Persist,
                Effect::Notify(Advisory::StreakReset {
                    productive_minutes: 20,
                    goal_minutes: 30,
                    previous_streak: 3,
                })
            ]
        );

        let (_, effects) = tracker.step(state, TrackerEvent::DailyTick, &at(5, 0, 0, 2));
        assert!(effects.is_empty());
    }

    #[test]
    fn test_distraction_alert_fires_once() {
        let tracker = Tracker::new(EngineConfig::default());
        let start = at(4, 10, 0, 0);
        let mut state = fresh_state(&start);

        (state, _) = tracker.step(state, focus(1, "https://youtube.com"), &start);
        let (state, effects) = tracker.step(state, TrackerEvent::FlushTick, &later(&start, 301));
        assert_eq!(
            effects,
            vec![
                Effect::Persist,
                Effect::Notify(Advisory::Distraction {
                    domain: "youtube.com".into(),
                    seconds: 301
                })
            ]
        );

        let (_, effects) = tracker.step(state, TrackerEvent::FlushTick, &later(&start, 400));
        assert_eq!(effects, vec![Effect::Persist]);
    }

    #[test]
    fn test_goal_reached_does_not_touch_streak() {
        let tracker = Tracker::new(EngineConfig::default());
        let start = at(4, 10, 0, 0);
        let mut state = fresh_state(&start);
        state.streak = StreakState::new(2, None);

        (state, _) = tracker.step(state, focus(1, "https://github.com"), &start);
        let (state, effects) = tracker.step(state, TrackerEvent::FlushTick, &later(&start, 1800));

        assert!(effects.contains(&Effect::Notify(Advisory::GoalReached {
            productive_minutes: 30,
            goal_minutes: 30
        })));
        assert_eq!(state.streak.count, 2);
    }

    #[test]
    fn test_reset_ledger_keeps_streak_and_date() {
        let tracker = Tracker::new(EngineConfig::default());
        let start = at(4, 10, 0, 0);
        let mut state = fresh_state(&start);
        state.streak = StreakState::new(2, None);

        (state, _) = tracker.step(state, focus(1, "https://github.com"), &start);
        let (state, effects) =
            tracker.step(state, TrackerEvent::ResetLedger, &later(&start, 100));

        assert_eq!(effects, vec![Effect::Persist]);
        assert!(state.ledger.entries().is_empty());
        assert_eq!(state.ledger.date(), Some(start.today));
        assert_eq!(state.streak.count, 2);
        // Still tracking the same page after the reset.
        assert_eq!(state.session.domain(), Some("github.com"));
    }
}
