use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use url::Url;

use crate::config::ClientConfig;
use crate::domain::comment::{AuthorContext, Comment, Reply};
use crate::domain::post::{EngagementCounts, PostSummary, PostThread};
use crate::infra::gateway::{GatewayError, SyncGateway};
use crate::infra::wire::{
    CommentEnvelope, ErrorBody, NewComment, NewReply, ReplyEnvelope, ViewerBody, WireCounts,
    WirePost,
};

/// [`SyncGateway`] over the blog REST API.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: Client,
    base_url: Url,
}

impl HttpGateway {
    pub fn new(base_url: Url, timeout: Duration) -> Result<Self, GatewayError> {
        if base_url.cannot_be_a_base() {
            return Err(GatewayError::Unreachable(format!(
                "invalid base url: {}",
                base_url
            )));
        }
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| GatewayError::Unreachable(err.to_string()))?;
        Ok(Self { client, base_url })
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self, GatewayError> {
        Self::new(
            config.api_base_url.clone(),
            Duration::from_secs(config.request_timeout_seconds),
        )
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Feed of posts as served by `GET /api/posts`.
    pub async fn list_posts(&self) -> Result<Vec<PostSummary>, GatewayError> {
        let url = self.endpoint(&["api", "posts"])?;
        let posts: Vec<WirePost> = self.send(self.client.get(url)).await?;
        posts.into_iter().map(PostSummary::try_from).collect()
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, GatewayError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| GatewayError::Unreachable(format!("invalid base url: {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn post_endpoint(&self, post_id: &str, action: Option<&str>) -> Result<Url, GatewayError> {
        match action {
            Some(action) => self.endpoint(&["api", "post", post_id, action]),
            None => self.endpoint(&["api", "post", post_id]),
        }
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, GatewayError> {
        let response = request.send().await.map_err(|err| {
            tracing::debug!(error = ?err, "request failed before a response arrived");
            GatewayError::Unreachable(err.to_string())
        })?;

        let status = response.status();
        if status.is_success() {
            return response
                .json::<T>()
                .await
                .map_err(|err| GatewayError::Decode(err.to_string()));
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&body)
            .ok()
            .and_then(|body| body.message)
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());
        tracing::debug!(status = status.as_u16(), message = %message, "request rejected");
        Err(map_status(status, message))
    }

    async fn engagement(
        &self,
        post_id: &str,
        action: &str,
        viewer_id: &str,
    ) -> Result<EngagementCounts, GatewayError> {
        let url = self.post_endpoint(post_id, Some(action))?;
        let counts: WireCounts = self
            .send(self.client.post(url).json(&ViewerBody { viewer_id }))
            .await?;
        Ok(counts.into())
    }
}

fn map_status(status: StatusCode, message: String) -> GatewayError {
    match status {
        StatusCode::NOT_FOUND => GatewayError::NotFound(message),
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            GatewayError::ValidationFailed(message)
        }
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => GatewayError::Unauthorized(message),
        StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT => {
            GatewayError::Unreachable(message)
        }
        other => GatewayError::Rejected {
            status: other.as_u16(),
            message,
        },
    }
}

#[async_trait]
impl SyncGateway for HttpGateway {
    async fn fetch_post(&self, post_id: &str) -> Result<PostThread, GatewayError> {
        let url = self.post_endpoint(post_id, None)?;
        let post: WirePost = self.send(self.client.get(url)).await?;
        PostThread::try_from(post)
    }

    async fn create_comment(
        &self,
        post_id: &str,
        author: &AuthorContext,
        content: &str,
    ) -> Result<Comment, GatewayError> {
        let url = self.post_endpoint(post_id, Some("add-comment"))?;
        let envelope: CommentEnvelope = self
            .send(self.client.post(url).json(&NewComment {
                commenter: &author.name,
                content,
            }))
            .await?;
        Comment::try_from(envelope.comment)
    }

    async fn create_reply(
        &self,
        post_id: &str,
        comment_id: &str,
        author: &AuthorContext,
        content: &str,
    ) -> Result<Reply, GatewayError> {
        let url = self.post_endpoint(post_id, Some("add-reply"))?;
        let envelope: ReplyEnvelope = self
            .send(self.client.post(url).json(&NewReply {
                comment_id,
                reply_commenter: &author.name,
                reply_content: content,
            }))
            .await?;
        Reply::try_from(envelope.reply)
    }

    async fn toggle_like(
        &self,
        post_id: &str,
        viewer_id: &str,
    ) -> Result<EngagementCounts, GatewayError> {
        self.engagement(post_id, "like", viewer_id).await
    }

    async fn toggle_dislike(
        &self,
        post_id: &str,
        viewer_id: &str,
    ) -> Result<EngagementCounts, GatewayError> {
        self.engagement(post_id, "dislike", viewer_id).await
    }

    async fn record_view(
        &self,
        post_id: &str,
        viewer_id: &str,
    ) -> Result<EngagementCounts, GatewayError> {
        self.engagement(post_id, "view", viewer_id).await
    }
}
