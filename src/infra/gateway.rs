//! The remote side of a discussion, independent of transport.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::comment::{AuthorContext, Comment, Reply};
use crate::domain::engagement::EngagementKind;
use crate::domain::post::{EngagementCounts, PostThread};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("validation failed: {0}")]
    ValidationFailed(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("unreachable: {0}")]
    Unreachable(String),

    #[error("rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("malformed response: {0}")]
    Decode(String),
}

#[async_trait]
pub trait SyncGateway: Send + Sync {
    async fn fetch_post(&self, post_id: &str) -> Result<PostThread, GatewayError>;

    async fn create_comment(
        &self,
        post_id: &str,
        author: &AuthorContext,
        content: &str,
    ) -> Result<Comment, GatewayError>;

    async fn create_reply(
        &self,
        post_id: &str,
        comment_id: &str,
        author: &AuthorContext,
        content: &str,
    ) -> Result<Reply, GatewayError>;

    async fn toggle_like(&self, post_id: &str, viewer_id: &str)
        -> Result<EngagementCounts, GatewayError>;

    async fn toggle_dislike(
        &self,
        post_id: &str,
        viewer_id: &str,
    ) -> Result<EngagementCounts, GatewayError>;

    async fn record_view(&self, post_id: &str, viewer_id: &str)
        -> Result<EngagementCounts, GatewayError>;

    /// Dispatches one engagement call by kind.
    async fn engage(
        &self,
        kind: EngagementKind,
        post_id: &str,
        viewer_id: &str,
    ) -> Result<EngagementCounts, GatewayError> {
        match kind {
            EngagementKind::Like => self.toggle_like(post_id, viewer_id).await,
            EngagementKind::Dislike => self.toggle_dislike(post_id, viewer_id).await,
            EngagementKind::View => self.record_view(post_id, viewer_id).await,
        }
    }
}
