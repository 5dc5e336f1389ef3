//! Reconnecting supervisor over the filtered stream.
//!
//! One supervisor drives a single logical stream across as many connections as
//! its [`ReconnectPolicy`] allows:
//!
//! ```text
//! Connecting -> Streaming -> ReconnectWait -> Connecting ...
//!      |            |              |
//!      +------------+--------------+--> Terminated
//! ```
//!
//! A failed connect or a failed read terminates. Recoverable disconnects the
//! provider announces through inline errors, and the server closing the body,
//! go through `ReconnectWait`. The attempt counter is never reset, so the
//! budget covers the whole lifetime of the supervisor.

use std::time::Duration;

use futures::stream::{self, BoxStream, StreamExt};
use tracing::{debug, error, info, warn};

use super::StreamConnector;
use crate::error::{Error, Result};
use crate::twitter_message::{format_inline_errors, EnhancedTweet, InlineErrorKind};
use crate::twitter_parser::{decode_records, RecordStream};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(5 * 60),
            max_attempts: 10,
        }
    }
}

impl ReconnectPolicy {
    /// `min(base_delay * 2^attempt, max_delay)`
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

enum Phase {
    Connecting,
    Streaming(RecordStream),
    ReconnectWait,
    Terminated,
}

pub struct StreamSupervisor<C> {
    connector: C,
    policy: ReconnectPolicy,
    attempt: u32,
    phase: Phase,
}

impl<C> StreamSupervisor<C>
where
    C: StreamConnector + 'static,
{
    pub fn new(connector: C, policy: ReconnectPolicy) -> Self {
        Self {
            connector,
            policy,
            attempt: 0,
            phase: Phase::Connecting,
        }
    }

    /// Reconnects performed so far.
    pub fn attempts(&self) -> u32 {
        self.attempt
    }

    /// Advance the state machine until it has a tweet or a terminal error.
    ///
    /// Returns `None` once terminated; an `Err` is always the last item.
    pub async fn next_event(&mut self) -> Option<Result<EnhancedTweet>> {
        loop {
            match std::mem::replace(&mut self.phase, Phase::Terminated) {
                Phase::Terminated => return None,

                Phase::Connecting => match self.connector.connect().await {
                    Ok(bytes) => {
                        info!(reconnects = self.attempt, "Connected to filtered stream");
                        self.phase = Phase::Streaming(decode_records(bytes));
                    }
                    Err(err) => {
                        error!(error = %err.report(), "Failed to connect to filtered stream");
                        return Some(Err(err));
                    }
                },

                Phase::Streaming(mut records) => match records.next().await {
                    Some(Ok(record)) => {
                        if let Some(inline) = record.reconnectable_error() {
                            warn!(
                                problem = inline.kind().map(InlineErrorKind::title),
                                title = %inline.title,
                                error_type = %inline.error_type,
                                detail = ?inline.detail,
                                "Reconnectable inline stream error detected"
                            );
                            self.phase = Phase::ReconnectWait;
                            continue;
                        }

                        self.phase = Phase::Streaming(records);

                        if let Some(errors) = record.errors.as_deref().filter(|e| !e.is_empty()) {
                            warn!(
                                errors = %format_inline_errors(errors),
                                "Ignoring non-reconnectable inline stream error"
                            );
                        }

                        match record.into_enhanced() {
                            Some(tweet) => return Some(Ok(tweet)),
                            None => debug!("Dropping incomplete stream record"),
                        }
                    }
                    Some(Err(err)) if err.is_line_scoped() => {
                        warn!(error = %err.report(), "Skipping undecodable stream line");
                        self.phase = Phase::Streaming(records);
                    }
                    Some(Err(err)) => return Some(Err(err)),
                    None => {
                        warn!("Filtered stream ended by server");
                        self.phase = Phase::ReconnectWait;
                    }
                },

                Phase::ReconnectWait => {
                    if self.attempt >= self.policy.max_attempts {
                        error!(
                            attempts = self.attempt,
                            "Max filtered stream reconnect attempts reached"
                        );
                        return Some(Err(Error::ReconnectExhausted {
                            attempts: self.attempt,
                        }));
                    }

                    let delay = self.policy.delay_for_attempt(self.attempt);
                    self.attempt += 1;
                    warn!(
                        delay_ms = delay.as_millis() as u64,
                        attempt = self.attempt,
                        max_attempts = self.policy.max_attempts,
                        "Reconnecting to filtered stream after delay"
                    );
                    tokio::time::sleep(delay).await;
                    self.phase = Phase::Connecting;
                }
            }
        }
    }

    /// Turn the supervisor into a lazy sequence of tweets.
    pub fn into_stream(self) -> BoxStream<'static, Result<EnhancedTweet>> {
        stream::unfold(self, |mut supervisor| async move {
            let item = supervisor.next_event().await?;
            Some((item, supervisor))
        })
        .boxed()
    }
}
