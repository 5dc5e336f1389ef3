use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use tracing::info;

use super::{ByteStream, StreamConnector};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::http::{HttpRequest, RetryingClient};

/// Filtered stream path, expanding each tweet's author into `includes.users`.
pub const FILTERED_STREAM_PATH: &str = "2/tweets/search/stream?expansions=author_id";

/// Connects to the X filtered stream with bearer-token auth.
///
/// The request goes through [`RetryingClient`] without an overall timeout, since
/// a healthy stream stays open for hours; only connection setup is bounded.
pub struct FilteredStreamConnector {
    client: RetryingClient,
    url: String,
    bearer_token: String,
}

impl FilteredStreamConnector {
    pub fn new(client: RetryingClient, base_url: &str, bearer_token: impl Into<String>) -> Self {
        Self {
            client,
            url: format!("{}/{}", base_url.trim_end_matches('/'), FILTERED_STREAM_PATH),
            bearer_token: bearer_token.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            RetryingClient::new(&config.http),
            &config.api.base_url,
            config.api.bearer_token.clone(),
        )
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn open(&self) -> Result<ByteStream> {
        let request = HttpRequest::get(&self.url).bearer_auth(&self.bearer_token)?;
        let response = self.client.send(&request).await?;
        let status = response.status();

        // Chunked responses carry no length, so wait for the first byte.
        let mut body = response.bytes_stream();
        let first = loop {
            match body.next().await {
                Some(Ok(chunk)) if chunk.is_empty() => continue,
                Some(Ok(chunk)) => break chunk,
                Some(Err(source)) => return Err(Error::read(source)),
                None => return Err(Error::EmptyBody),
            }
        };

        info!(url = %self.url, status = %status, "Filtered stream response received");

        Ok(stream::once(async move { Ok(first) })
            .chain(body.map(|chunk| chunk.map_err(Error::read)))
            .boxed())
    }
}

#[async_trait]
impl StreamConnector for FilteredStreamConnector {
    async fn connect(&self) -> Result<ByteStream> {
        self.open().await.map_err(|source| Error::Connect {
            source: Box::new(source),
        })
    }
}
