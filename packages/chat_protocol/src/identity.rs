//! Participant identities and the channel address convention.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ProtocolError;

/// An opaque participant name. Doubles as the routing key on the server and
/// as the final path segment of the channel address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identity(String);

impl Identity {
    pub fn new(value: impl Into<String>) -> Result<Self, ProtocolError> {
        let value = value.into();
        validate(&value)?;
        Ok(Self(value))
    }

    /// Read the identity from the final non-empty segment of a channel path,
    /// e.g. `/ws/chat/u1` → `u1`.
    pub fn from_path(path: &str) -> Option<Self> {
        let path = path.split(['?', '#']).next().unwrap_or_default();
        path.rsplit('/')
            .find(|segment| !segment.is_empty())
            .and_then(|segment| Self::new(segment).ok())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn validate(value: &str) -> Result<(), ProtocolError> {
    if value.is_empty() {
        return Err(ProtocolError::EmptyIdentity);
    }
    let reject = |reason: &str| ProtocolError::InvalidIdentity {
        identity: value.to_string(),
        reason: reason.to_string(),
    };
    if let Some(c) = value
        .chars()
        .find(|c| matches!(c, '/' | '?' | '#' | '%') || c.is_whitespace() || c.is_control())
    {
        return Err(reject(&format!("{c:?} is not allowed in a path segment")));
    }
    Ok(())
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Identity {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Identity {
    type Error = ProtocolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Identity> for String {
    fn from(identity: Identity) -> Self {
        identity.0
    }
}

impl AsRef<str> for Identity {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for Identity {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for Identity {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Address of the channel for `identity` under `base`
/// (`ws://host/ws/chat` + `u1` → `ws://host/ws/chat/u1`).
pub fn channel_url(base: &str, identity: &Identity) -> String {
    format!("{}/{}", base.trim_end_matches('/'), identity)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_names() {
        for name in ["u1", "student-42", "admin_7", "Zoë", "a.b@c"] {
            assert!(Identity::new(name).is_ok(), "{name} should be accepted");
        }
    }

    #[test]
    fn rejects_empty() {
        assert_eq!(Identity::new(""), Err(ProtocolError::EmptyIdentity));
    }

    #[test]
    fn rejects_path_breaking_characters() {
        for name in ["a/b", "a?b", "a#b", "100%", "two words", "tab\there", "nl\n"] {
            assert!(
                matches!(
                    Identity::new(name),
                    Err(ProtocolError::InvalidIdentity { .. })
                ),
                "{name:?} should be rejected"
            );
        }
    }

    #[test]
    fn from_path_takes_last_segment() {
        assert_eq!(Identity::from_path("/ws/chat/u1").unwrap(), "u1");
        assert_eq!(Identity::from_path("/ws/chat/u1/").unwrap(), "u1");
        assert_eq!(Identity::from_path("/ws/chat/u1?x=1").unwrap(), "u1");
        assert!(Identity::from_path("/").is_none());
        assert!(Identity::from_path("").is_none());
    }

    #[test]
    fn channel_url_joins_base_and_identity() {
        let id = Identity::new("u2").unwrap();
        assert_eq!(
            channel_url("ws://127.0.0.1:10000/ws/chat", &id),
            "ws://127.0.0.1:10000/ws/chat/u2"
        );
        assert_eq!(
            channel_url("ws://127.0.0.1:10000/ws/chat/", &id),
            "ws://127.0.0.1:10000/ws/chat/u2"
        );
    }

    #[test]
    fn serde_is_a_bare_string() {
        let id = Identity::new("u1").unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"u1\"");
        let back: Identity = serde_json::from_str("\"u1\"").unwrap();
        assert_eq!(back, id);
        assert!(serde_json::from_str::<Identity>("\"\"").is_err());
    }

    #[test]
    fn display_and_from_str() {
        let id: Identity = "u9".parse().unwrap();
        assert_eq!(id.to_string(), "u9");
        assert_eq!(id.as_str(), "u9");
    }
}
