use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use time::OffsetDateTime;

const PENDING_PREFIX: &str = "pending-";

/// Identifier of a comment or reply.
///
/// Only the server mints `Confirmed` ids. `Pending` ids are placeholders held
/// by the client until the server answers, rendered as `pending-<n>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntityId {
    Confirmed(String),
    Pending(u64),
}

impl EntityId {
    pub fn confirmed(id: impl Into<String>) -> Self {
        Self::Confirmed(id.into())
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending(_))
    }

    pub fn as_confirmed(&self) -> Option<&str> {
        match self {
            Self::Confirmed(id) => Some(id),
            Self::Pending(_) => None,
        }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Confirmed(id) => f.write_str(id),
            Self::Pending(seq) => write!(f, "{}{}", PENDING_PREFIX, seq),
        }
    }
}

impl From<&str> for EntityId {
    fn from(value: &str) -> Self {
        Self::Confirmed(value.to_string())
    }
}

impl From<String> for EntityId {
    fn from(value: String) -> Self {
        Self::Confirmed(value)
    }
}

impl PartialEq<str> for EntityId {
    fn eq(&self, other: &str) -> bool {
        match self {
            Self::Confirmed(id) => id == other,
            Self::Pending(seq) => other
                .strip_prefix(PENDING_PREFIX)
                .and_then(|rest| rest.parse::<u64>().ok())
                .is_some_and(|n| n == *seq),
        }
    }
}

impl PartialEq<&str> for EntityId {
    fn eq(&self, other: &&str) -> bool {
        self == *other
    }
}

impl Serialize for EntityId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

// Anything arriving over the wire was minted by the server.
impl<'de> Deserialize<'de> for EntityId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::Confirmed)
    }
}

/// Who is writing, passed explicitly with every mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorContext {
    pub name: String,
}

impl AuthorContext {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: EntityId,
    pub author: String,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(default)]
    pub replies: Vec<Reply>,
}

impl Comment {
    pub fn is_pending(&self) -> bool {
        self.id.is_pending()
    }

    pub fn find_reply(&self, reply_id: &EntityId) -> Option<&Reply> {
        self.replies.iter().find(|reply| &reply.id == reply_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    pub id: EntityId,
    pub author: String,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Reply {
    pub fn is_pending(&self) -> bool {
        self.id.is_pending()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_ids_render_with_prefix() {
        assert_eq!(EntityId::Pending(1).to_string(), "pending-1");
        assert_eq!(EntityId::Pending(7), "pending-7");
        assert_ne!(EntityId::Pending(7), "pending-8");
    }

    #[test]
    fn decoded_ids_are_always_confirmed() {
        let id: EntityId = serde_json::from_str("\"pending-3\"").unwrap();
        assert!(!id.is_pending());
        assert_eq!(id.as_confirmed(), Some("pending-3"));
        assert_ne!(id, EntityId::Pending(3));
    }
}
