pub mod filtered_stream;
pub mod reconnect;

use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures::stream::{BoxStream, Stream, StreamExt};

use crate::config::Config;
use crate::error::Result;
use crate::twitter_message::EnhancedTweet;
pub use crate::twitter_parser::ByteStream;

use filtered_stream::FilteredStreamConnector;
use reconnect::StreamSupervisor;

/// Opens one connection to a streaming endpoint and hands back its body.
#[async_trait]
pub trait StreamConnector: Send + Sync {
    async fn connect(&self) -> Result<ByteStream>;
}

/// The caller-facing sequence of enhanced tweets.
///
/// Items arrive in order. An `Err` item is always the last one; callers
/// should treat it as fatal. Dropping the stream closes the connection.
pub struct TweetStream {
    inner: BoxStream<'static, Result<EnhancedTweet>>,
}

impl TweetStream {
    pub fn new<C>(supervisor: StreamSupervisor<C>) -> Self
    where
        C: StreamConnector + 'static,
    {
        Self {
            inner: supervisor.into_stream(),
        }
    }

    /// Filtered stream against the configured API, with the configured
    /// retry and reconnect budgets.
    pub fn from_config(config: &Config) -> Self {
        let connector = FilteredStreamConnector::from_config(config);
        Self::new(StreamSupervisor::new(
            connector,
            config.stream.reconnect_policy(),
        ))
    }
}

impl Stream for TweetStream {
    type Item = Result<EnhancedTweet>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}
