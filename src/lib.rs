//! Client for the X filtered stream.
//!
//! [`TweetStream`] connects with a bearer token, decodes the newline-delimited
//! JSON body, reconnects with capped exponential backoff when the provider
//! announces a recoverable disconnect, and yields each tweet joined with its
//! author and the rules it matched.

pub mod config;
pub mod error;
pub mod feeds;
pub mod http;
pub mod logging;
pub mod twitter_message;
pub mod twitter_parser;

pub use config::Config;
pub use error::{Error, Result};
pub use feeds::filtered_stream::FilteredStreamConnector;
pub use feeds::reconnect::{ReconnectPolicy, StreamSupervisor};
pub use feeds::{StreamConnector, TweetStream};
pub use twitter_message::{EnhancedTweet, MatchingRule, RuleTag, Tweet, User};
