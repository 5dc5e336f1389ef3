use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tweet {
    pub id: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub username: String,
}

/// Category a stream rule was registered under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleTag {
    Crypto,
    Influencer,
    Politics,
    Celeb,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchingRule {
    pub id: String,
    pub tag: RuleTag,
}

/// A filter rule stored upstream. Rules only ever select tweets by author.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamRule {
    pub id: String,
    pub value: String,
    pub tag: RuleTag,
}

impl StreamRule {
    /// Rule value selecting every tweet posted by `user_id`.
    pub fn value_for_user(user_id: &str) -> String {
        format!("from:{user_id}")
    }

    pub fn targets_user(&self, user_id: &str) -> bool {
        self.value.strip_prefix("from:") == Some(user_id)
    }

    pub fn validate(&self) -> Result<(), String> {
        non_empty("id", &self.id)?;
        if !is_user_rule_value(&self.value) {
            return Err(format!(
                "value: expected `from:<numeric id>`, got `{}`",
                self.value
            ));
        }
        Ok(())
    }
}

fn is_user_rule_value(value: &str) -> bool {
    value
        .strip_prefix("from:")
        .is_some_and(|id| !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit()))
}

/// An error object embedded in an otherwise successful streaming payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineError {
    pub title: String,
    #[serde(rename = "type")]
    pub error_type: String,
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default)]
    pub status: Option<u16>,
}

impl InlineError {
    pub fn kind(&self) -> Option<InlineErrorKind> {
        InlineErrorKind::from_type(&self.error_type)
    }

    /// Whether the provider documents this problem as an expected, recoverable disconnect.
    pub fn is_reconnectable(&self) -> bool {
        self.kind().is_some_and(InlineErrorKind::is_reconnectable)
    }
}

/// Problem types the X API reports through inline errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InlineErrorKind {
    InvalidRequest,
    ResourceNotFound,
    ResourceUnauthorized,
    ClientForbidden,
    DisallowedResource,
    UnsupportedAuthentication,
    UsageCapped,
    ConnectionException,
    ClientDisconnected,
    OperationalDisconnect,
    RuleCap,
    RuleLength,
    InvalidRules,
    DuplicateRules,
}

const PROBLEM_TYPE_PREFIX: &str = "https://api.x.com/2/problems/";

impl InlineErrorKind {
    pub const ALL: [Self; 14] = [
        Self::InvalidRequest,
        Self::ResourceNotFound,
        Self::ResourceUnauthorized,
        Self::ClientForbidden,
        Self::DisallowedResource,
        Self::UnsupportedAuthentication,
        Self::UsageCapped,
        Self::ConnectionException,
        Self::ClientDisconnected,
        Self::OperationalDisconnect,
        Self::RuleCap,
        Self::RuleLength,
        Self::InvalidRules,
        Self::DuplicateRules,
    ];

    pub const RECONNECTABLE: [Self; 4] = [
        Self::ClientDisconnected,
        Self::OperationalDisconnect,
        Self::UsageCapped,
        Self::ConnectionException,
    ];

    pub const fn title(self) -> &'static str {
        match self {
            Self::InvalidRequest => "Invalid Request Problem",
            Self::ResourceNotFound => "Resource Not Found Problem",
            Self::ResourceUnauthorized => "Resource Unauthorized Problem",
            Self::ClientForbidden => "Client Forbidden Problem",
            Self::DisallowedResource => "Disallowed Resource Problem",
            Self::UnsupportedAuthentication => "Unsupported Authentication Problem",
            Self::UsageCapped => "Usage Capped Problem",
            Self::ConnectionException => "Connection Exception Problem",
            Self::ClientDisconnected => "Client Disconnected Problem",
            Self::OperationalDisconnect => "Operational Disconnect Problem",
            Self::RuleCap => "Rule Cap Problem",
            Self::RuleLength => "Rule Length Problem",
            Self::InvalidRules => "Invalid Rules Problem",
            Self::DuplicateRules => "Duplicate Rules Problem",
        }
    }

    /// Last path segment of the problem type URI.
    pub const fn slug(self) -> &'static str {
        match self {
            Self::InvalidRequest => "invalid-request",
            Self::ResourceNotFound => "resource-not-found",
            Self::ResourceUnauthorized => "not-authorized-for-resource",
            Self::ClientForbidden => "client-forbidden",
            Self::DisallowedResource => "disallowed-resource",
            Self::UnsupportedAuthentication => "unsupported-authentication",
            Self::UsageCapped => "usage-capped",
            Self::ConnectionException => "streaming-connection",
            Self::ClientDisconnected => "client-disconnected",
            Self::OperationalDisconnect => "operational-disconnect",
            Self::RuleCap => "rule-cap",
            Self::RuleLength => "rule-length",
            Self::InvalidRules => "invalid-rules",
            Self::DuplicateRules => "duplicate-rules",
        }
    }

    pub fn type_uri(self) -> String {
        format!("{PROBLEM_TYPE_PREFIX}{}", self.slug())
    }

    /// Looks up a problem type URI. The host part is matched case-insensitively
    /// since the API has spelled it both `api.x.com` and `api.X.com`.
    pub fn from_type(error_type: &str) -> Option<Self> {
        let lowered = error_type.to_ascii_lowercase();
        let slug = lowered.strip_prefix(PROBLEM_TYPE_PREFIX)?;
        Self::ALL.into_iter().find(|kind| kind.slug() == slug)
    }

    pub fn is_reconnectable(self) -> bool {
        Self::RECONNECTABLE.contains(&self)
    }
}

/// Renders inline errors as `title: detail` lines.
pub fn format_inline_errors(errors: &[InlineError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.title, e.detail.as_deref().unwrap_or("-")))
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Includes {
    pub users: Vec<User>,
}

/// One decoded line of the filtered stream. Every field may be absent.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RawStreamRecord {
    #[serde(default)]
    pub data: Option<Tweet>,
    #[serde(default)]
    pub errors: Option<Vec<InlineError>>,
    #[serde(default)]
    pub includes: Option<Includes>,
    #[serde(default)]
    pub matching_rules: Option<Vec<MatchingRule>>,
}

impl RawStreamRecord {
    /// Checks the constraints serde cannot express, reporting the first
    /// violation as `path: message`.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(tweet) = &self.data {
            non_empty("data.id", &tweet.id)?;
            non_empty("data.text", &tweet.text)?;
        }
        for (i, error) in self.errors.iter().flatten().enumerate() {
            non_empty(&format!("errors.{i}.title"), &error.title)?;
            non_empty(&format!("errors.{i}.type"), &error.error_type)?;
        }
        for (i, user) in self.includes.iter().flat_map(|inc| &inc.users).enumerate() {
            non_empty(&format!("includes.users.{i}.id"), &user.id)?;
            non_empty(&format!("includes.users.{i}.name"), &user.name)?;
            non_empty(&format!("includes.users.{i}.username"), &user.username)?;
        }
        for (i, rule) in self.matching_rules.iter().flatten().enumerate() {
            non_empty(&format!("matching_rules.{i}.id"), &rule.id)?;
        }
        Ok(())
    }

    /// First inline error the provider documents as a recoverable disconnect.
    pub fn reconnectable_error(&self) -> Option<&InlineError> {
        self.errors
            .as_deref()?
            .iter()
            .find(|e| e.is_reconnectable())
    }

    /// Joins the tweet with its author and matching rules.
    ///
    /// Returns `None` unless `data`, `includes.users[0]` and `matching_rules`
    /// are all present.
    pub fn into_enhanced(self) -> Option<EnhancedTweet> {
        let tweet = self.data?;
        let author = self.includes?.users.into_iter().next()?;
        let matching_rules = self.matching_rules?;
        Some(EnhancedTweet {
            tweet,
            author,
            matching_rules,
        })
    }
}

/// A stream tweet joined with its author and the rules that selected it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnhancedTweet {
    #[serde(flatten)]
    pub tweet: Tweet,
    pub author: User,
    pub matching_rules: Vec<MatchingRule>,
}

fn non_empty(path: &str, value: &str) -> Result<(), String> {
    if value.is_empty() {
        Err(format!("{path}: must not be empty"))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        User {
            id: "44196397".into(),
            name: "Elon Musk".into(),
            username: "elonmusk".into(),
        }
    }

    fn rule() -> MatchingRule {
        MatchingRule {
            id: "1866".into(),
            tag: RuleTag::Celeb,
        }
    }

    #[test]
    fn test_full_record_becomes_enhanced_tweet() {
        let record = RawStreamRecord {
            data: Some(Tweet {
                id: "1".into(),
                text: "hi".into(),
            }),
            includes: Some(Includes {
                users: vec![user()],
            }),
            matching_rules: Some(vec![rule()]),
            errors: None,
        };

        let enhanced = record.into_enhanced().unwrap();
        assert_eq!(enhanced.tweet.id, "1");
        assert_eq!(enhanced.tweet.text, "hi");
        assert_eq!(enhanced.author, user());
        assert_eq!(enhanced.matching_rules, vec![rule()]);
    }

    #[test]
    fn test_incomplete_records_are_not_enhanced() {
        let data_only = RawStreamRecord {
            data: Some(Tweet {
                id: "1".into(),
                text: "hi".into(),
            }),
            ..Default::default()
        };
        assert!(data_only.clone().into_enhanced().is_none());

        let no_users = RawStreamRecord {
            includes: Some(Includes { users: vec![] }),
            matching_rules: Some(vec![rule()]),
            ..data_only
        };
        assert!(no_users.into_enhanced().is_none());
    }

    #[test]
    fn test_enhanced_tweet_serializes_flat() {
        let enhanced = EnhancedTweet {
            tweet: Tweet {
                id: "1".into(),
                text: "hi".into(),
            },
            author: user(),
            matching_rules: vec![rule()],
        };
        let value = serde_json::to_value(&enhanced).unwrap();
        assert_eq!(value["id"], "1");
        assert_eq!(value["text"], "hi");
        assert_eq!(value["author"]["username"], "elonmusk");
        assert_eq!(value["matching_rules"][0]["tag"], "celeb");
    }

    #[test]
    fn test_reconnectable_kinds() {
        let reconnectable: Vec<_> = InlineErrorKind::ALL
            .into_iter()
            .filter(|k| k.is_reconnectable())
            .collect();
        assert_eq!(
            reconnectable,
            vec![
                InlineErrorKind::UsageCapped,
                InlineErrorKind::ConnectionException,
                InlineErrorKind::ClientDisconnected,
                InlineErrorKind::OperationalDisconnect,
            ]
        );
    }

    #[test]
    fn test_problem_type_lookup_ignores_host_case() {
        assert_eq!(
            InlineErrorKind::from_type("https://api.X.com/2/problems/operational-disconnect"),
            Some(InlineErrorKind::OperationalDisconnect)
        );
        assert_eq!(
            InlineErrorKind::from_type("https://api.x.com/2/problems/streaming-connection"),
            Some(InlineErrorKind::ConnectionException)
        );
        assert_eq!(
            InlineErrorKind::from_type("https://api.x.com/2/problems/something-new"),
            None
        );
        assert_eq!(InlineErrorKind::from_type("client-disconnected"), None);
    }

    #[test]
    fn test_reconnectable_error_picks_first_match() {
        let record = RawStreamRecord {
            errors: Some(vec![
                InlineError {
                    title: "Rule Cap Problem".into(),
                    error_type: InlineErrorKind::RuleCap.type_uri(),
                    detail: None,
                    status: None,
                },
                InlineError {
                    title: "Usage Capped Problem".into(),
                    error_type: InlineErrorKind::UsageCapped.type_uri(),
                    detail: Some("monthly cap".into()),
                    status: Some(429),
                },
            ]),
            ..Default::default()
        };

        let found = record.reconnectable_error().unwrap();
        assert_eq!(found.kind(), Some(InlineErrorKind::UsageCapped));
        assert_eq!(found.kind().map(InlineErrorKind::title), Some(found.title.as_str()));
    }

    #[test]
    fn test_catalogue_titles_end_with_problem() {
        for kind in InlineErrorKind::ALL {
            assert!(kind.title().ends_with(" Problem"), "{kind:?}");
            assert_eq!(InlineErrorKind::from_type(&kind.type_uri()), Some(kind));
        }
    }

    #[test]
    fn test_validate_rejects_empty_fields() {
        let record = RawStreamRecord {
            data: Some(Tweet {
                id: "1".into(),
                text: String::new(),
            }),
            ..Default::default()
        };
        assert_eq!(
            record.validate().unwrap_err(),
            "data.text: must not be empty"
        );

        let record = RawStreamRecord {
            errors: Some(vec![InlineError {
                title: "t".into(),
                error_type: String::new(),
                detail: None,
                status: None,
            }]),
            ..Default::default()
        };
        assert_eq!(record.validate().unwrap_err(), "errors.0.type: must not be empty");

        assert!(RawStreamRecord::default().validate().is_ok());
    }

    #[test]
    fn test_stream_rule_value_shape() {
        let rule = StreamRule {
            id: "1".into(),
            value: StreamRule::value_for_user("44196397"),
            tag: RuleTag::Crypto,
        };
        assert_eq!(rule.value, "from:44196397");
        assert!(rule.validate().is_ok());
        assert!(rule.targets_user("44196397"));
        assert!(!rule.targets_user("4419639"));

        for bad in ["from:", "from:abc", "to:123", "from:12 3"] {
            let rule = StreamRule {
                value: bad.into(),
                ..rule.clone()
            };
            assert!(rule.validate().is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn test_unknown_rule_tag_is_rejected() {
        let result = serde_json::from_str::<MatchingRule>(r#"{"id":"1","tag":"sports"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_format_inline_errors() {
        let errors = vec![
            InlineError {
                title: "Duplicate Rules Problem".into(),
                error_type: InlineErrorKind::DuplicateRules.type_uri(),
                detail: Some("rule already exists".into()),
                status: None,
            },
            InlineError {
                title: "Rule Cap Problem".into(),
                error_type: InlineErrorKind::RuleCap.type_uri(),
                detail: None,
                status: None,
            },
        ];
        assert_eq!(
            format_inline_errors(&errors),
            "Duplicate Rules Problem: rule already exists\nRule Cap Problem: -"
        );
    }
}
