//! Contains the contract between the tracker and the browser.
//! [EventSource] is the main artifact of this module, it abstracts where browser messages come
//! from. [lines::LineEventSource] reads them as json lines, which is how a native messaging host
//! or a test harness talks to the tracker.

pub mod lines;

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;

use crate::engine::TrackerEvent;

/// Window id the browser reports when none of its windows has focus.
pub const WINDOW_ID_NONE: i64 = -1;

/// Raw message as delivered by the browser extension.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum BrowserMessage {
    /// A tab became active.
    #[serde(rename_all = "camelCase")]
    Activated {
        tab_id: i64,
        #[serde(default)]
        url: Option<String>,
    },
    /// A tab changed. Only loads of the active tab matter.
    #[serde(rename_all = "camelCase")]
    Updated {
        tab_id: i64,
        #[serde(default)]
        url: Option<String>,
        #[serde(default)]
        active: bool,
        #[serde(default)]
        status: Option<String>,
    },
    /// Focus moved between windows. `window_id` is [WINDOW_ID_NONE] when the browser lost focus,
    /// otherwise the active tab of the focused window is attached.
    #[serde(rename_all = "camelCase")]
    WindowFocusChanged {
        window_id: i64,
        #[serde(default)]
        tab_id: Option<i64>,
        #[serde(default)]
        url: Option<String>,
    },
    /// The user asked to clear today's data.
    ResetLedger,
}

impl BrowserMessage {
    /// Converts a message into an engine event. Messages the engine doesn't care about produce
    /// `None`.
    pub fn into_event(self) -> Option<TrackerEvent> {
        match self {
            BrowserMessage::Activated { tab_id, url } => {
                Some(TrackerEvent::FocusChanged { tab_id, url })
            }
            BrowserMessage::Updated {
                tab_id,
                url,
                active,
                status,
            } => (active && status.as_deref() == Some("complete"))
                .then_some(TrackerEvent::NavigationCompleted { tab_id, url }),
            BrowserMessage::WindowFocusChanged { window_id, .. } if window_id == WINDOW_ID_NONE => {
                Some(TrackerEvent::WindowFocusLost)
            }
            BrowserMessage::WindowFocusChanged { tab_id, url, .. } => {
                Some(TrackerEvent::WindowFocusGained { tab_id, url })
            }
            BrowserMessage::ResetLedger => Some(TrackerEvent::ResetLedger),
        }
    }
}

/// Intended to serve as a contract every browser integration must implement.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EventSource: Send {
    /// Waits for the next message. `Ok(None)` means the browser went away and no more messages
    /// will come.
    async fn next_message(&mut self) -> Result<Option<BrowserMessage>>;
}
