use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use tokio::io::{AsyncWrite, AsyncWriteExt, Stdout};
use tracing::info;

use crate::engine::alert::Advisory;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub title: String,
    pub message: String,
}

impl From<&Advisory> for Notification {
    fn from(advisory: &Advisory) -> Self {
        Self {
            title: advisory.title().to_owned(),
            message: advisory.message(),
        }
    }
}

/// Delivers notifications to the user. Delivery is best-effort, failures are logged by the
/// caller and never retried.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationSink: Send {
    async fn notify(&mut self, notification: Notification) -> Result<()>;
}

/// Messages written back to the browser.
#[derive(Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum OutboundMessage<'a> {
    Notification(&'a Notification),
}

/// Writes notifications as json lines, the browser side is responsible for showing them.
pub struct LineNotificationSink<W> {
    writer: W,
}

impl LineNotificationSink<Stdout> {
    pub fn stdout() -> Self {
        Self::new(tokio::io::stdout())
    }
}

impl<W: AsyncWrite + Unpin> LineNotificationSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> NotificationSink for LineNotificationSink<W> {
    async fn notify(&mut self, notification: Notification) -> Result<()> {
        let mut buffer = serde_json::to_vec(&OutboundMessage::Notification(&notification))?;
        buffer.push(b'\n');
        self.writer.write_all(&buffer).await?;
        self.writer.flush().await?;
        Ok(())
    }
}

/// Only records notifications in the log. Used when nobody listens on stdout.
pub struct LogNotificationSink;

#[async_trait]
impl NotificationSink for LogNotificationSink {
    async fn notify(&mut self, notification: Notification) -> Result<()> {
        info!("{}: {}", notification.title, notification.message);
        Ok(())
    }
}
