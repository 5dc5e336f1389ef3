use thiserror::Error;

/// Errors produced anywhere along the stream pipeline.
#[derive(Error, Debug)]
pub enum Error {
    /// The request never produced a response (connect failure, timeout, reset).
    #[error("failed to fetch {url}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// A non-2xx response that was not retried, or the last one after retries ran out.
    #[error("failed to fetch {url}: HTTP error {status} {status_text}")]
    Status {
        url: String,
        status: u16,
        status_text: String,
    },

    /// A successful response that carried no stream body.
    #[error("no stream body found")]
    EmptyBody,

    #[error("error connecting to filtered stream")]
    Connect {
        #[source]
        source: Box<Error>,
    },

    /// The underlying byte stream failed mid-read.
    #[error("error reading filtered stream")]
    Read {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("error parsing filtered stream JSON data: {line}")]
    Parse {
        line: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("filtered stream line is not valid UTF-8")]
    InvalidUtf8 {
        #[source]
        source: std::string::FromUtf8Error,
    },

    #[error("invalid data: {reason}")]
    Invalid { line: String, reason: String },

    #[error("max filtered stream reconnect attempts reached ({attempts})")]
    ReconnectExhausted { attempts: u32 },

    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Whether the error only affects a single decoded line.
    ///
    /// Line-scoped errors leave the stream usable; everything else ends the
    /// current decode pass.
    #[must_use]
    pub const fn is_line_scoped(&self) -> bool {
        matches!(
            self,
            Self::Parse { .. } | Self::InvalidUtf8 { .. } | Self::Invalid { .. }
        )
    }

    /// The message followed by every underlying cause, joined by `: `.
    pub fn report(&self) -> String {
        anyhow::Chain::new(self)
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(": ")
    }

    pub(crate) fn read<E>(source: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::Read {
            source: source.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_line_scoped_classification() {
        let parse = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert!(Error::Parse {
            line: "{".into(),
            source: parse,
        }
        .is_line_scoped());
        assert!(Error::Invalid {
            line: "{}".into(),
            reason: "data.id: empty".into(),
        }
        .is_line_scoped());

        assert!(!Error::EmptyBody.is_line_scoped());
        assert!(!Error::read("connection reset").is_line_scoped());
        assert!(!Error::ReconnectExhausted { attempts: 10 }.is_line_scoped());
    }

    #[test]
    fn test_connect_error_keeps_cause() {
        let err = Error::Connect {
            source: Box::new(Error::EmptyBody),
        };
        assert_eq!(err.to_string(), "error connecting to filtered stream");
        assert_eq!(
            err.source().map(ToString::to_string),
            Some("no stream body found".to_string())
        );
    }

    #[test]
    fn test_report_includes_every_cause() {
        let err = Error::Connect {
            source: Box::new(Error::Status {
                url: "https://api.x.com/2/tweets/search/stream".into(),
                status: 401,
                status_text: "Unauthorized".into(),
            }),
        };
        assert_eq!(
            err.report(),
            "error connecting to filtered stream: failed to fetch \
             https://api.x.com/2/tweets/search/stream: HTTP error 401 Unauthorized"
        );

        let read = Error::read("connection reset by peer");
        assert_eq!(
            read.report(),
            "error reading filtered stream: connection reset by peer"
        );
    }

    #[test]
    fn test_status_error_message() {
        let err = Error::Status {
            url: "https://api.x.com/2/tweets/search/stream".into(),
            status: 401,
            status_text: "Unauthorized".into(),
        };
        assert_eq!(
            err.to_string(),
            "failed to fetch https://api.x.com/2/tweets/search/stream: HTTP error 401 Unauthorized"
        );
    }
}
