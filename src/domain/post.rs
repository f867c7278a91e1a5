use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::domain::comment::Comment;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    pub title: String,
    /// Serialized rich-text markup, rendered by the caller.
    pub body: String,
    pub author: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub likes: u64,
    pub dislikes: u64,
    pub views: u64,
}

impl Post {
    pub fn counts(&self) -> EngagementCounts {
        EngagementCounts {
            likes: self.likes,
            dislikes: self.dislikes,
            views: self.views,
        }
    }

    /// Overwrites the counters with the last server-reported values.
    pub fn apply_counts(&mut self, counts: EngagementCounts) {
        self.likes = counts.likes;
        self.dislikes = counts.dislikes;
        self.views = counts.views;
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngagementCounts {
    pub likes: u64,
    pub dislikes: u64,
    pub views: u64,
}

/// A post together with its full comment forest, as returned by a fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostThread {
    pub post: Post,
    pub comments: Vec<Comment>,
}

/// Feed entry without the discussion attached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostSummary {
    pub id: String,
    pub title: String,
    pub author: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}
