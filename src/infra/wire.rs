//! JSON shapes spoken by the blog REST API.

use serde::{Deserialize, Serialize};
use time::format_description::well_known::{Iso8601, Rfc3339};
use time::{OffsetDateTime, PrimitiveDateTime};

use crate::domain::comment::{Comment, EntityId, Reply};
use crate::domain::post::{EngagementCounts, Post, PostSummary, PostThread};
use crate::infra::gateway::GatewayError;

const UNKNOWN_AUTHOR: &str = "Unknown";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WirePost {
    pub post_id: String,
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub image: Option<String>,
    pub timestamp: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub comments: Vec<WireComment>,
    #[serde(default)]
    pub likes: u64,
    #[serde(default)]
    pub dislikes: u64,
    #[serde(default)]
    pub views: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireComment {
    pub comment_id: String,
    pub commenter: String,
    pub content: String,
    pub timestamp: String,
    #[serde(default)]
    pub replies: Vec<WireReply>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WireReply {
    pub reply_id: String,
    pub reply_commenter: String,
    pub reply_content: String,
    pub timestamp: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CommentEnvelope {
    pub comment: WireComment,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ReplyEnvelope {
    pub reply: WireReply,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireCounts {
    #[serde(default)]
    pub likes: u64,
    #[serde(default)]
    pub dislikes: u64,
    #[serde(default)]
    pub views: u64,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct NewComment<'a> {
    pub commenter: &'a str,
    pub content: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct NewReply<'a> {
    pub comment_id: &'a str,
    pub reply_commenter: &'a str,
    pub reply_content: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ViewerBody<'a> {
    pub viewer_id: &'a str,
}

/// Accepts RFC 3339, or a naive ISO 8601 stamp which is taken to be UTC.
pub(crate) fn parse_timestamp(value: &str) -> Result<OffsetDateTime, GatewayError> {
    if let Ok(parsed) = OffsetDateTime::parse(value, &Rfc3339) {
        return Ok(parsed);
    }
    PrimitiveDateTime::parse(value, &Iso8601::DEFAULT)
        .map(PrimitiveDateTime::assume_utc)
        .map_err(|err| GatewayError::Decode(format!("invalid timestamp {:?}: {}", value, err)))
}

impl TryFrom<WireReply> for Reply {
    type Error = GatewayError;

    fn try_from(wire: WireReply) -> Result<Self, Self::Error> {
        Ok(Reply {
            id: EntityId::confirmed(wire.reply_id),
            author: wire.reply_commenter,
            content: wire.reply_content,
            created_at: parse_timestamp(&wire.timestamp)?,
        })
    }
}

impl TryFrom<WireComment> for Comment {
    type Error = GatewayError;

    fn try_from(wire: WireComment) -> Result<Self, Self::Error> {
        let replies = wire
            .replies
            .into_iter()
            .map(Reply::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Comment {
            id: EntityId::confirmed(wire.comment_id),
            author: wire.commenter,
            content: wire.content,
            created_at: parse_timestamp(&wire.timestamp)?,
            replies,
        })
    }
}

impl TryFrom<WirePost> for PostThread {
    type Error = GatewayError;

    fn try_from(wire: WirePost) -> Result<Self, Self::Error> {
        let comments = wire
            .comments
            .into_iter()
            .map(Comment::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(PostThread {
            post: Post {
                id: wire.post_id,
                title: wire.title,
                body: wire.content,
                author: wire.author.unwrap_or_else(|| UNKNOWN_AUTHOR.to_string()),
                image: wire.image,
                created_at: parse_timestamp(&wire.timestamp)?,
                likes: wire.likes,
                dislikes: wire.dislikes,
                views: wire.views,
            },
            comments,
        })
    }
}

impl TryFrom<WirePost> for PostSummary {
    type Error = GatewayError;

    fn try_from(wire: WirePost) -> Result<Self, Self::Error> {
        Ok(PostSummary {
            created_at: parse_timestamp(&wire.timestamp)?,
            id: wire.post_id,
            title: wire.title,
            author: wire.author.unwrap_or_else(|| UNKNOWN_AUTHOR.to_string()),
            image: wire.image,
        })
    }
}

impl From<WireCounts> for EngagementCounts {
    fn from(wire: WireCounts) -> Self {
        EngagementCounts {
            likes: wire.likes,
            dislikes: wire.dislikes,
            views: wire.views,
        }
    }
}
