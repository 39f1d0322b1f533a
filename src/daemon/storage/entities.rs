use std::collections::{BTreeMap, BTreeSet};

use anyhow::{anyhow, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::engine::{
    alert::AlertThrottle, ledger::Ledger, streak::StreakState, TrackerState,
};

pub const STATE_VERSION: u32 = 2;

/// The struct used for storing the tracker state on disk.
///
/// Key names are kept from the browser extension storage (`timeData`, `focusStreak`,
/// `lastDate`) so that exported extension data can be dropped in directly.
#[derive(PartialEq, Eq, Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct StateEntity {
    pub version: u32,
    #[serde(default)]
    pub time_data: BTreeMap<String, u64>,
    #[serde(default)]
    pub focus_streak: u32,
    #[serde(default)]
    pub last_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_evaluated_date: Option<NaiveDate>,
    /// Distracting domains already announced for `last_date`.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub alerted_domains: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub goal_announced: bool,
}

impl Default for StateEntity {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            time_data: BTreeMap::new(),
            focus_streak: 0,
            last_date: None,
            last_evaluated_date: None,
            alerted_domains: BTreeSet::new(),
            goal_announced: false,
        }
    }
}

impl StateEntity {
    pub fn from_state(state: &TrackerState) -> Self {
        Self {
            version: STATE_VERSION,
            time_data: state.ledger.entries().clone(),
            focus_streak: state.streak.count,
            last_date: state.ledger.date(),
            last_evaluated_date: state.streak.last_evaluated_date,
            alerted_domains: state.throttle.alerted_domains().clone(),
            goal_announced: state.throttle.goal_announced(),
        }
    }

    pub fn into_state(self) -> (Ledger, StreakState, AlertThrottle) {
        (
            Ledger::from_parts(self.last_date, self.time_data),
            StreakState::new(self.focus_streak, self.last_evaluated_date),
            AlertThrottle::from_parts(self.alerted_domains, self.goal_announced),
        )
    }

    /// Reads any known shape of the stored document and upgrades it to [STATE_VERSION].
    pub fn migrate(value: Value) -> Result<Self> {
        let version = match value.get("version") {
            None => 1,
            Some(v) => v
                .as_u64()
                .ok_or_else(|| anyhow!("State version {v} is not a number"))?,
        };
        match version {
            1 => {
                info!("Migrating unversioned state to version {STATE_VERSION}");
                Ok(LegacyStateEntity::deserialize(value)?.into())
            }
            2 => Ok(serde_json::from_value(value)?),
            v => Err(anyhow!(
                "State version {v} is newer than supported version {STATE_VERSION}"
            )),
        }
    }
}

/// Flat, untyped layout written by the browser extension. Numbers may be floats or negative and
/// any key may be missing.
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
struct LegacyStateEntity {
    #[serde(default)]
    time_data: BTreeMap<String, Value>,
    #[serde(default)]
    focus_streak: Option<Value>,
    #[serde(default)]
    last_date: Option<String>,
}

fn whole_number(value: &Value) -> Option<u64> {
    let v = value.as_f64()?;
    (v.is_finite() && v > 0.).then(|| v.floor() as u64)
}

impl From<LegacyStateEntity> for StateEntity {
    fn from(legacy: LegacyStateEntity) -> Self {
        let time_data = legacy
            .time_data
            .into_iter()
            .filter(|(domain, _)| !domain.is_empty())
            .filter_map(|(domain, seconds)| match whole_number(&seconds) {
                Some(s) if s > 0 => Some((domain, s)),
                _ => {
                    warn!("Dropping legacy entry {domain}={seconds}");
                    None
                }
            })
            .collect();
        let focus_streak = legacy
            .focus_streak
            .as_ref()
            .and_then(whole_number)
            .map(|v| u32::try_from(v).unwrap_or(u32::MAX))
            .unwrap_or(0);
        let last_date = legacy.last_date.and_then(|v| {
            NaiveDate::parse_from_str(&v, "%Y-%m-%d")
                .inspect_err(|e| warn!("Ignoring legacy lastDate {v}: {e}"))
                .ok()
        });
        Self {
            version: STATE_VERSION,
            time_data,
            focus_streak,
            last_date,
            ..Default::default()
        }
    }
}
