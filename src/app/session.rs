//! One run of the command-line client against a single post.

use anyhow::{anyhow, Result};
use time::OffsetDateTime;

use crate::app::thread_store::ThreadStore;
use crate::config::{AppMode, ClientConfig};
use crate::domain::comment::AuthorContext;
use crate::domain::post::{Post, PostThread};
use crate::infra::memory::MemoryGateway;

pub const DEMO_POST_ID: &str = "demo";

/// In-process backend holding one empty post, used by `APP_MODE=demo`.
pub fn demo_gateway() -> MemoryGateway {
    let gateway = MemoryGateway::new();
    gateway.insert_thread(PostThread {
        post: Post {
            id: DEMO_POST_ID.to_string(),
            title: "Hello, world".to_string(),
            body: "<p>The first post on this blog.</p>".to_string(),
            author: "plume".to_string(),
            image: None,
            created_at: OffsetDateTime::now_utc(),
            likes: 0,
            dislikes: 0,
            views: 0,
        },
        comments: Vec::new(),
    });
    gateway
}

/// Opens `post_id`, records a view and performs the action for
/// `config.app_mode`. Returns the thread as it ends up and closes the store.
pub async fn run(store: &ThreadStore, post_id: &str, config: &ClientConfig) -> Result<PostThread> {
    store.load(post_id).await?;
    tracing::info!(post_id = %post_id, mode = ?config.app_mode, "post opened");

    let view = store.record_view(&config.viewer_id);

    match config.app_mode {
        AppMode::Comment => {
            let (author, body) = config.comment()?;
            store.add_comment(&AuthorContext::new(author), &body).await?;
        }
        AppMode::Like => {
            store.toggle_like(&config.viewer_id).await?;
        }
        AppMode::Dislike => {
            store.toggle_dislike(&config.viewer_id).await?;
        }
        AppMode::Demo => {
            let alice = AuthorContext::new("alice");
            let comment = store.add_comment(&alice, "First!").await?;
            store
                .add_reply(&comment.id, &AuthorContext::new("bob"), "Welcome aboard")
                .await?;
            store.toggle_like(&config.viewer_id).await?;
        }
        AppMode::Show | AppMode::Feed => {}
    }

    if let Err(err) = view.await {
        tracing::warn!(error = %err, "view task did not finish");
    }

    let thread = store
        .thread()
        .ok_or_else(|| anyhow!("post {} is no longer loaded", post_id));
    store.close();
    thread
}
