#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post as post_route};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use time::OffsetDateTime;
use tokio::sync::Semaphore;

use plume::domain::comment::{AuthorContext, Comment, Reply};
use plume::domain::post::{EngagementCounts, Post, PostThread};
use plume::infra::memory::MemoryGateway;
use plume::{GatewayError, StoreLimits, SyncGateway, ThreadStore};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub fn post(id: &str) -> Post {
    Post {
        id: id.to_string(),
        title: format!("Post {}", id),
        body: "<p>Hello</p>".to_string(),
        author: "carol".to_string(),
        image: None,
        created_at: OffsetDateTime::UNIX_EPOCH,
        likes: 0,
        dislikes: 0,
        views: 0,
    }
}

pub fn comment(id: &str, author: &str, content: &str, replies: Vec<Reply>) -> Comment {
    Comment {
        id: id.into(),
        author: author.to_string(),
        content: content.to_string(),
        created_at: OffsetDateTime::UNIX_EPOCH,
        replies,
    }
}

pub fn reply(id: &str, author: &str, content: &str) -> Reply {
    Reply {
        id: id.into(),
        author: author.to_string(),
        content: content.to_string(),
        created_at: OffsetDateTime::UNIX_EPOCH,
    }
}

/// A store over a fresh [`TestGateway`] holding one empty post `p1`.
pub fn store_with_empty_post() -> (ThreadStore, Arc<TestGateway>) {
    let gateway = Arc::new(TestGateway::new());
    gateway.memory.insert_post(post("p1"));
    let store = ThreadStore::new(gateway.clone(), StoreLimits::default());
    (store, gateway)
}

/// Yields to the runtime until `op` has been called `n` times.
pub async fn wait_for_calls(gateway: &TestGateway, op: &str, n: usize) {
    for _ in 0..1000 {
        if gateway.calls(op) >= n {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("{} was called {} times, expected {}", op, gateway.calls(op), n);
}

// ---------------------------------------------------------------------------
// TestGateway: MemoryGateway with call counting, holds and injected failures
// ---------------------------------------------------------------------------

pub struct TestGateway {
    pub memory: MemoryGateway,
    calls: Mutex<HashMap<String, usize>>,
    holds: Mutex<HashMap<String, Arc<Semaphore>>>,
    failures: Mutex<HashMap<String, GatewayError>>,
}

impl TestGateway {
    pub fn new() -> Self {
        Self {
            memory: MemoryGateway::new(),
            calls: Mutex::new(HashMap::new()),
            holds: Mutex::new(HashMap::new()),
            failures: Mutex::new(HashMap::new()),
        }
    }

    pub fn calls(&self, op: &str) -> usize {
        self.calls.lock().unwrap().get(op).copied().unwrap_or(0)
    }

    /// Calls to `op` block (after being counted) until [`release`](Self::release).
    pub fn hold(&self, op: &str) {
        self.holds
            .lock()
            .unwrap()
            .insert(op.to_string(), Arc::new(Semaphore::new(0)));
    }

    pub fn release(&self, op: &str) {
        if let Some(gate) = self.holds.lock().unwrap().remove(op) {
            gate.add_permits(1);
        }
    }

    /// The next call to `op` fails with `err` instead of reaching the memory copy.
    pub fn fail_next(&self, op: &str, err: GatewayError) {
        self.failures.lock().unwrap().insert(op.to_string(), err);
    }

    async fn enter(&self, op: &str) -> Result<(), GatewayError> {
        *self.calls.lock().unwrap().entry(op.to_string()).or_default() += 1;
        let gate = self.holds.lock().unwrap().get(op).cloned();
        if let Some(gate) = gate {
            let _permit = gate
                .acquire()
                .await
                .map_err(|_| GatewayError::Unreachable("gate closed".into()))?;
        }
        match self.failures.lock().unwrap().remove(op) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl SyncGateway for TestGateway {
    async fn fetch_post(&self, post_id: &str) -> Result<PostThread, GatewayError> {
        self.enter("fetch_post").await?;
        self.memory.fetch_post(post_id).await
    }

    async fn create_comment(
        &self,
        post_id: &str,
        author: &AuthorContext,
        content: &str,
    ) -> Result<Comment, GatewayError> {
        self.enter("create_comment").await?;
        self.memory.create_comment(post_id, author, content).await
    }

    async fn create_reply(
        &self,
        post_id: &str,
        comment_id: &str,
        author: &AuthorContext,
        content: &str,
    ) -> Result<Reply, GatewayError> {
        self.enter("create_reply").await?;
        self.memory
            .create_reply(post_id, comment_id, author, content)
            .await
    }

    async fn toggle_like(
        &self,
        post_id: &str,
        viewer_id: &str,
    ) -> Result<EngagementCounts, GatewayError> {
        self.enter("toggle_like").await?;
        self.memory.toggle_like(post_id, viewer_id).await
    }

    async fn toggle_dislike(
        &self,
        post_id: &str,
        viewer_id: &str,
    ) -> Result<EngagementCounts, GatewayError> {
        self.enter("toggle_dislike").await?;
        self.memory.toggle_dislike(post_id, viewer_id).await
    }

    async fn record_view(
        &self,
        post_id: &str,
        viewer_id: &str,
    ) -> Result<EngagementCounts, GatewayError> {
        self.enter("record_view").await?;
        self.memory.record_view(post_id, viewer_id).await
    }
}

// ---------------------------------------------------------------------------
// Blog API stub: the REST surface HttpGateway talks to
// ---------------------------------------------------------------------------

pub struct BlogApi {
    pub addr: SocketAddr,
    pub memory: Arc<MemoryGateway>,
}

impl BlogApi {
    pub fn base_url(&self) -> url::Url {
        url::Url::parse(&format!("http://{}", self.addr)).unwrap()
    }
}

/// Serves the blog API on an ephemeral port for the rest of the test.
pub async fn spawn_blog_api(memory: MemoryGateway) -> BlogApi {
    let memory = Arc::new(memory);
    let router = Router::new()
        .route("/api/posts", get(list_posts))
        .route("/api/post/:id", get(get_post))
        .route("/api/post/:id/add-comment", post_route(add_comment))
        .route("/api/post/:id/add-reply", post_route(add_reply))
        .route("/api/post/:id/like", post_route(like))
        .route("/api/post/:id/dislike", post_route(dislike))
        .route("/api/post/:id/view", post_route(view))
        .with_state(memory.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("cannot bind test listener");
    let addr = listener.local_addr().expect("listener has no address");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("test server failed");
    });

    BlogApi { addr, memory }
}

type ApiState = State<Arc<MemoryGateway>>;

fn naive(ts: OffsetDateTime) -> String {
    format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}.{:06}",
        ts.year(),
        u8::from(ts.month()),
        ts.day(),
        ts.hour(),
        ts.minute(),
        ts.second(),
        ts.microsecond()
    )
}

fn reply_json(reply: &Reply) -> Value {
    json!({
        "replyId": reply.id.to_string(),
        "replyCommenter": reply.author,
        "replyContent": reply.content,
        "timestamp": naive(reply.created_at),
    })
}

fn comment_json(comment: &Comment) -> Value {
    json!({
        "commentId": comment.id.to_string(),
        "commenter": comment.author,
        "content": comment.content,
        "timestamp": naive(comment.created_at),
        "replies": comment.replies.iter().map(reply_json).collect::<Vec<_>>(),
    })
}

fn post_json(thread: &PostThread) -> Value {
    json!({
        "postId": thread.post.id,
        "title": thread.post.title,
        "content": thread.post.body,
        "image": thread.post.image,
        "timestamp": naive(thread.post.created_at),
        "author": thread.post.author,
        "likes": thread.post.likes,
        "dislikes": thread.post.dislikes,
        "views": thread.post.views,
        "comments": thread.comments.iter().map(comment_json).collect::<Vec<_>>(),
    })
}

fn error_response(err: GatewayError) -> Response {
    let status = match err {
        GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
        GatewayError::ValidationFailed(_) => StatusCode::BAD_REQUEST,
        GatewayError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(json!({ "message": err.to_string() }))).into_response()
}

async fn list_posts(State(memory): ApiState) -> Response {
    let posts: Vec<Value> = memory
        .list_posts()
        .iter()
        .filter_map(|summary| memory.thread(&summary.id))
        .map(|thread| post_json(&thread))
        .collect();
    Json(posts).into_response()
}

async fn get_post(State(memory): ApiState, Path(id): Path<String>) -> Response {
    match memory.fetch_post(&id).await {
        Ok(thread) => Json(post_json(&thread)).into_response(),
        Err(_) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "message": "Post not found" })),
        )
            .into_response(),
    }
}

#[derive(Deserialize)]
struct NewComment {
    #[serde(default)]
    commenter: String,
    #[serde(default)]
    content: String,
}

async fn add_comment(
    State(memory): ApiState,
    Path(id): Path<String>,
    Json(body): Json<NewComment>,
) -> Response {
    match memory
        .create_comment(&id, &AuthorContext::new(body.commenter), &body.content)
        .await
    {
        Ok(comment) => (
            StatusCode::CREATED,
            Json(json!({
                "message": "Comment added successfully",
                "comment": comment_json(&comment),
            })),
        )
            .into_response(),
        Err(err) => error_response(err),
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewReply {
    #[serde(default)]
    comment_id: String,
    #[serde(default)]
    reply_commenter: String,
    #[serde(default)]
    reply_content: String,
}

async fn add_reply(
    State(memory): ApiState,
    Path(id): Path<String>,
    Json(body): Json<NewReply>,
) -> Response {
    match memory
        .create_reply(
            &id,
            &body.comment_id,
            &AuthorContext::new(body.reply_commenter),
            &body.reply_content,
        )
        .await
    {
        Ok(reply) => (
            StatusCode::CREATED,
            Json(json!({
                "message": "Reply added successfully",
                "reply": reply_json(&reply),
            })),
        )
            .into_response(),
        Err(err) => error_response(err),
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Viewer {
    viewer_id: String,
}

fn counts_response(result: Result<EngagementCounts, GatewayError>) -> Response {
    match result {
        Ok(counts) => Json(json!({
            "likes": counts.likes,
            "dislikes": counts.dislikes,
            "views": counts.views,
        }))
        .into_response(),
        Err(err) => error_response(err),
    }
}

fn check_viewer(viewer: &Viewer) -> Result<(), GatewayError> {
    if viewer.viewer_id == "banned" {
        return Err(GatewayError::Unauthorized("viewer is not allowed".into()));
    }
    Ok(())
}

async fn like(State(memory): ApiState, Path(id): Path<String>, Json(viewer): Json<Viewer>) -> Response {
    if let Err(err) = check_viewer(&viewer) {
        return error_response(err);
    }
    counts_response(memory.toggle_like(&id, &viewer.viewer_id).await)
}

async fn dislike(
    State(memory): ApiState,
    Path(id): Path<String>,
    Json(viewer): Json<Viewer>,
) -> Response {
    if let Err(err) = check_viewer(&viewer) {
        return error_response(err);
    }
    counts_response(memory.toggle_dislike(&id, &viewer.viewer_id).await)
}

async fn view(State(memory): ApiState, Path(id): Path<String>, Json(viewer): Json<Viewer>) -> Response {
    counts_response(memory.record_view(&id, &viewer.viewer_id).await)
}
