use anyhow::Result;
use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader, Lines, Stdin};
use tracing::{debug, warn};

use super::{BrowserMessage, EventSource};

/// Reads one json encoded [BrowserMessage] per line. Lines that can't be parsed are skipped.
pub struct LineEventSource<R> {
    lines: Lines<BufReader<R>>,
}

impl LineEventSource<Stdin> {
    pub fn stdin() -> Self {
        Self::new(tokio::io::stdin())
    }
}

impl<R: AsyncRead + Unpin> LineEventSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: BufReader::new(reader).lines(),
        }
    }
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send> EventSource for LineEventSource<R> {
    async fn next_message(&mut self) -> Result<Option<BrowserMessage>> {
        while let Some(line) = self.lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<BrowserMessage>(line) {
                Ok(message) => {
                    debug!("Received {message:?}");
                    return Ok(Some(message));
                }
                // ignore illegal values, the browser might speak a newer protocol
                Err(e) => warn!("Skipping illegal message {line}: {e}"),
            }
        }
        Ok(None)
    }
}
