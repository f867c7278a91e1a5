//! Discussion state for one open post.
//!
//! All shared state lives behind one `std::sync::Mutex` that is only ever
//! taken inside [`ThreadStore::with_state`], so no guard is held across a
//! gateway call. Every remote call carries a session ticket; a response whose
//! ticket is no longer current (a newer `load` started, or the store was
//! closed) is dropped.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use time::OffsetDateTime;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::app::comment_tree::CommentTree;
use crate::app::engagement::EngagementToggle;
use crate::app::error::{ThreadError, ThreadResult};
use crate::config::StoreLimits;
use crate::domain::comment::{AuthorContext, Comment, EntityId, Reply};
use crate::domain::engagement::{EngagementKind, EngagementState};
use crate::domain::post::{EngagementCounts, Post, PostThread};
use crate::infra::gateway::{GatewayError, SyncGateway};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreState {
    Unloaded,
    Loading,
    Ready,
    Error,
}

/// Fired after every change to the store so views can re-render.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    Loading { post_id: String },
    Loaded { post_id: String },
    LoadFailed { post_id: String, reason: String },
    CommentPending { placeholder: EntityId },
    CommentConfirmed { placeholder: EntityId, id: EntityId },
    CommentRolledBack { placeholder: EntityId },
    ReplyPending { comment_id: EntityId, placeholder: EntityId },
    ReplyConfirmed { comment_id: EntityId, placeholder: EntityId, id: EntityId },
    ReplyRolledBack { comment_id: EntityId, placeholder: EntityId },
    CountsUpdated(EngagementCounts),
    Faulted { reason: String },
    Closed,
}

#[derive(Debug)]
struct Snapshot {
    status: StoreState,
    post_id: Option<String>,
    post: Option<Post>,
    tree: CommentTree,
    error: Option<String>,
    notice: Option<String>,
    /// Identity of the current load. Responses carrying another session are stale.
    session: Option<Uuid>,
    next_placeholder: u64,
    closed: bool,
}

impl Snapshot {
    fn is_current(&self, ticket: Uuid) -> bool {
        !self.closed && self.session == Some(ticket)
    }

    fn ready_ticket(&self) -> ThreadResult<(Uuid, String)> {
        if self.closed {
            return Err(ThreadError::Closed);
        }
        match (self.status, self.session, &self.post_id) {
            (StoreState::Ready, Some(session), Some(post_id)) => Ok((session, post_id.clone())),
            (status, _, _) => Err(ThreadError::NotReady(status)),
        }
    }

    fn next_placeholder(&mut self) -> EntityId {
        self.next_placeholder += 1;
        EntityId::Pending(self.next_placeholder)
    }

    /// Integrity violation: the store stops serving until it is reloaded.
    fn fault(&mut self, err: &ThreadError) -> String {
        let reason = format!("integrity violation: {}", err);
        self.status = StoreState::Error;
        self.session = None;
        self.post = None;
        self.tree.replace_all(Vec::new());
        self.error = Some(reason.clone());
        reason
    }
}

struct Inner {
    instance_id: Uuid,
    gateway: Arc<dyn SyncGateway>,
    limits: StoreLimits,
    toggles: EngagementToggle,
    events: broadcast::Sender<StoreEvent>,
    state: Mutex<Snapshot>,
}

/// Handle to the discussion state of one post. Clones share the same store.
#[derive(Clone)]
pub struct ThreadStore {
    inner: Arc<Inner>,
}

impl ThreadStore {
    pub fn new(gateway: Arc<dyn SyncGateway>, limits: StoreLimits) -> Self {
        let (events, _) = broadcast::channel(limits.event_buffer.max(1));
        Self {
            inner: Arc::new(Inner {
                instance_id: Uuid::new_v4(),
                gateway,
                limits,
                toggles: EngagementToggle::new(),
                events,
                state: Mutex::new(Snapshot {
                    status: StoreState::Unloaded,
                    post_id: None,
                    post: None,
                    tree: CommentTree::new(),
                    error: None,
                    notice: None,
                    session: None,
                    next_placeholder: 0,
                    closed: false,
                }),
            }),
        }
    }

    pub fn instance_id(&self) -> Uuid {
        self.inner.instance_id
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.inner.events.subscribe()
    }

    // ------------------------------------------------------------------
    // Read accessors
    // ------------------------------------------------------------------

    pub fn state(&self) -> StoreState {
        self.with_state(|s| s.status)
    }

    pub fn post_id(&self) -> Option<String> {
        self.with_state(|s| s.post_id.clone())
    }

    pub fn post(&self) -> Option<Post> {
        self.with_state(|s| s.post.clone())
    }

    pub fn comments(&self) -> Vec<Comment> {
        self.with_state(|s| s.tree.comments().to_vec())
    }

    pub fn find_comment(&self, comment_id: &EntityId) -> Option<Comment> {
        self.with_state(|s| s.tree.find_comment(comment_id).cloned())
    }

    pub fn find_reply(&self, comment_id: &EntityId, reply_id: &EntityId) -> Option<Reply> {
        self.with_state(|s| s.tree.find_reply(comment_id, reply_id).cloned())
    }

    /// Whole thread as currently displayed, pending entries included.
    pub fn thread(&self) -> Option<PostThread> {
        self.with_state(|s| {
            s.post.clone().map(|post| PostThread {
                post,
                comments: s.tree.comments().to_vec(),
            })
        })
    }

    /// Reason for the last failed load, kept for display until the next load.
    pub fn error(&self) -> Option<String> {
        self.with_state(|s| s.error.clone())
    }

    /// Message for the last failed write, shown until dismissed.
    pub fn notice(&self) -> Option<String> {
        self.with_state(|s| s.notice.clone())
    }

    pub fn dismiss_notice(&self) {
        self.with_state(|s| s.notice = None);
    }

    pub fn engagement(&self, viewer_id: &str) -> EngagementState {
        match self.post_id() {
            Some(post_id) => self.inner.toggles.state(&post_id, viewer_id),
            None => EngagementState::default(),
        }
    }

    // ------------------------------------------------------------------
    // Loading
    // ------------------------------------------------------------------

    /// Fetches the post and its forest, replacing everything held locally.
    /// Pending optimistic entries are discarded: the loaded copy wins.
    pub async fn load(&self, post_id: &str) -> ThreadResult<()> {
        let ticket = self.with_state(|s| {
            if s.closed {
                return Err(ThreadError::Closed);
            }
            let session = Uuid::new_v4();
            s.status = StoreState::Loading;
            s.session = Some(session);
            s.post_id = Some(post_id.to_string());
            s.error = None;
            s.notice = None;
            Ok(session)
        })?;
        self.emit(StoreEvent::Loading {
            post_id: post_id.to_string(),
        });
        tracing::debug!(store = %self.inner.instance_id, post_id = post_id, "loading post");

        let result = self.inner.gateway.fetch_post(post_id).await;

        match result {
            Ok(thread) => {
                let outcome = self.with_state(|s| {
                    if !s.is_current(ticket) {
                        return None;
                    }
                    if let Err(err) = check_unique_ids(&thread.comments) {
                        let reason = s.fault(&err);
                        return Some(Err((err, reason)));
                    }
                    s.post = Some(thread.post);
                    s.tree.replace_all(thread.comments);
                    s.status = StoreState::Ready;
                    Some(Ok(s.tree.len()))
                });

                match outcome {
                    None => {
                        tracing::debug!(post_id = post_id, "dropping superseded load result");
                        Ok(())
                    }
                    Some(Ok(comment_count)) => {
                        tracing::info!(post_id = post_id, comments = comment_count, "post loaded");
                        self.emit(StoreEvent::Loaded {
                            post_id: post_id.to_string(),
                        });
                        Ok(())
                    }
                    Some(Err((err, reason))) => {
                        tracing::error!(post_id = post_id, error = %err, "loaded thread failed integrity check");
                        self.emit(StoreEvent::Faulted { reason });
                        Err(err)
                    }
                }
            }
            Err(err) => {
                let reason = err.to_string();
                let current = self.with_state(|s| {
                    if !s.is_current(ticket) {
                        return false;
                    }
                    s.status = StoreState::Error;
                    s.post = None;
                    s.tree.replace_all(Vec::new());
                    s.error = Some(reason.clone());
                    true
                });
                if !current {
                    tracing::debug!(post_id = post_id, "dropping superseded load failure");
                    return Ok(());
                }

                tracing::warn!(post_id = post_id, error = %err, "failed to load post");
                self.emit(StoreEvent::LoadFailed {
                    post_id: post_id.to_string(),
                    reason,
                });
                Err(match err {
                    GatewayError::NotFound(_) => ThreadError::not_found("post", post_id),
                    other => ThreadError::Unreachable(other),
                })
            }
        }
    }

    /// Reloads the last requested post.
    pub async fn retry(&self) -> ThreadResult<()> {
        let post_id = self.with_state(|s| {
            if s.closed {
                return Err(ThreadError::Closed);
            }
            s.post_id.clone().ok_or(ThreadError::NotReady(s.status))
        })?;
        self.load(&post_id).await
    }

    /// Tears the store down. Responses still in flight are dropped.
    pub fn close(&self) {
        let was_open = self.with_state(|s| {
            let was_open = !s.closed;
            s.closed = true;
            s.session = None;
            was_open
        });
        if was_open {
            tracing::debug!(store = %self.inner.instance_id, "thread store closed");
            self.emit(StoreEvent::Closed);
        }
    }

    // ------------------------------------------------------------------
    // Comments and replies
    // ------------------------------------------------------------------

    /// Inserts a placeholder comment right away, then swaps it for the
    /// server copy, or removes it again if the server refuses.
    pub async fn add_comment(&self, author: &AuthorContext, content: &str) -> ThreadResult<Comment> {
        validate(&self.inner.limits, author, content)?;

        let (ticket, post_id, placeholder) = self.with_state(|s| {
            let (ticket, post_id) = s.ready_ticket()?;
            let placeholder = s.next_placeholder();
            s.tree.insert_comment(Comment {
                id: placeholder.clone(),
                author: author.name.clone(),
                content: content.to_string(),
                created_at: OffsetDateTime::now_utc(),
                replies: Vec::new(),
            })?;
            Ok::<_, ThreadError>((ticket, post_id, placeholder))
        })?;
        self.emit(StoreEvent::CommentPending {
            placeholder: placeholder.clone(),
        });

        let result = self
            .inner
            .gateway
            .create_comment(&post_id, author, content)
            .await;

        match result {
            Ok(confirmed) => {
                let outcome = self.with_state(|s| {
                    if !s.is_current(ticket) {
                        return None;
                    }
                    Some(
                        s.tree
                            .confirm_comment(&placeholder, confirmed.clone())
                            .map_err(|err| {
                                let reason = s.fault(&err);
                                (err, reason)
                            }),
                    )
                });

                match outcome {
                    None => {
                        tracing::debug!(post_id = %post_id, placeholder = %placeholder, "dropping stale comment confirmation");
                        Ok(confirmed)
                    }
                    Some(Ok(())) => {
                        tracing::info!(post_id = %post_id, comment_id = %confirmed.id, "comment confirmed");
                        self.emit(StoreEvent::CommentConfirmed {
                            placeholder,
                            id: confirmed.id.clone(),
                        });
                        Ok(confirmed)
                    }
                    Some(Err((err, reason))) => {
                        tracing::error!(post_id = %post_id, error = %err, "comment reconciliation failed");
                        self.emit(StoreEvent::Faulted { reason });
                        Err(err)
                    }
                }
            }
            Err(err) => {
                let rolled_back = self.with_state(|s| {
                    if !s.is_current(ticket) {
                        return false;
                    }
                    s.tree.discard_pending_comment(&placeholder);
                    s.notice = Some(format!("Failed to add comment: {}", err));
                    true
                });
                tracing::warn!(post_id = %post_id, error = %err, "failed to persist comment");
                if rolled_back {
                    self.emit(StoreEvent::CommentRolledBack { placeholder });
                }
                Err(ThreadError::CommentPersistFailed(err))
            }
        }
    }

    /// Same optimistic pattern as [`add_comment`](Self::add_comment), scoped
    /// to one confirmed comment.
    pub async fn add_reply(
        &self,
        comment_id: &EntityId,
        author: &AuthorContext,
        content: &str,
    ) -> ThreadResult<Reply> {
        validate(&self.inner.limits, author, content)?;

        let (ticket, post_id, remote_comment_id, placeholder) = self.with_state(|s| {
            let (ticket, post_id) = s.ready_ticket()?;
            if s.tree.find_comment(comment_id).is_none() {
                return Err(ThreadError::not_found("comment", comment_id));
            }
            let remote_comment_id = comment_id
                .as_confirmed()
                .ok_or_else(|| {
                    ThreadError::validation("cannot reply to a comment that is still pending")
                })?
                .to_string();
            let placeholder = s.next_placeholder();
            s.tree.insert_reply(
                comment_id,
                Reply {
                    id: placeholder.clone(),
                    author: author.name.clone(),
                    content: content.to_string(),
                    created_at: OffsetDateTime::now_utc(),
                },
            )?;
            Ok::<_, ThreadError>((ticket, post_id, remote_comment_id, placeholder))
        })?;
        self.emit(StoreEvent::ReplyPending {
            comment_id: comment_id.clone(),
            placeholder: placeholder.clone(),
        });

        let result = self
            .inner
            .gateway
            .create_reply(&post_id, &remote_comment_id, author, content)
            .await;

        match result {
            Ok(confirmed) => {
                let outcome = self.with_state(|s| {
                    if !s.is_current(ticket) {
                        return None;
                    }
                    Some(
                        s.tree
                            .confirm_reply(comment_id, &placeholder, confirmed.clone())
                            .map_err(|err| {
                                let reason = s.fault(&err);
                                (err, reason)
                            }),
                    )
                });

                match outcome {
                    None => {
                        tracing::debug!(post_id = %post_id, placeholder = %placeholder, "dropping stale reply confirmation");
                        Ok(confirmed)
                    }
                    Some(Ok(())) => {
                        tracing::info!(post_id = %post_id, comment_id = %comment_id, reply_id = %confirmed.id, "reply confirmed");
                        self.emit(StoreEvent::ReplyConfirmed {
                            comment_id: comment_id.clone(),
                            placeholder,
                            id: confirmed.id.clone(),
                        });
                        Ok(confirmed)
                    }
                    Some(Err((err, reason))) => {
                        tracing::error!(post_id = %post_id, error = %err, "reply reconciliation failed");
                        self.emit(StoreEvent::Faulted { reason });
                        Err(err)
                    }
                }
            }
            Err(err) => {
                let rolled_back = self.with_state(|s| {
                    if !s.is_current(ticket) {
                        return false;
                    }
                    s.tree.discard_pending_reply(comment_id, &placeholder);
                    s.notice = Some(format!("Failed to add reply: {}", err));
                    true
                });
                tracing::warn!(post_id = %post_id, comment_id = %comment_id, error = %err, "failed to persist reply");
                if rolled_back {
                    self.emit(StoreEvent::ReplyRolledBack {
                        comment_id: comment_id.clone(),
                        placeholder,
                    });
                }
                Err(ThreadError::PersistFailed {
                    action: "reply",
                    source: err,
                })
            }
        }
    }

    // ------------------------------------------------------------------
    // Engagement
    // ------------------------------------------------------------------

    pub async fn toggle_like(&self, viewer_id: &str) -> ThreadResult<EngagementCounts> {
        self.toggle(viewer_id, EngagementKind::Like).await
    }

    pub async fn toggle_dislike(&self, viewer_id: &str) -> ThreadResult<EngagementCounts> {
        self.toggle(viewer_id, EngagementKind::Dislike).await
    }

    async fn toggle(&self, viewer_id: &str, kind: EngagementKind) -> ThreadResult<EngagementCounts> {
        let (ticket, post_id) = self.with_state(|s| s.ready_ticket())?;

        let result = self
            .inner
            .toggles
            .toggle(self.inner.gateway.as_ref(), &post_id, viewer_id, kind)
            .await;

        match result {
            Ok(counts) => {
                self.apply_counts(ticket, counts);
                Ok(counts)
            }
            Err(err @ ThreadError::PersistFailed { .. }) => {
                tracing::warn!(post_id = %post_id, viewer_id = viewer_id, kind = kind.as_str(), error = %err, "engagement toggle failed");
                self.with_state(|s| {
                    if s.is_current(ticket) {
                        s.notice = Some(format!("Failed to {} post", kind.as_str()));
                    }
                });
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    /// Records a view in the background. Failures are logged and otherwise
    /// ignored. Must be called from within a tokio runtime.
    pub fn record_view(&self, viewer_id: &str) -> JoinHandle<()> {
        let store = self.clone();
        let viewer_id = viewer_id.to_string();
        tokio::spawn(async move {
            if let Err(err) = store.send_view(&viewer_id).await {
                tracing::warn!(viewer_id = %viewer_id, error = %err, "failed to record view");
            }
        })
    }

    async fn send_view(&self, viewer_id: &str) -> ThreadResult<()> {
        let (ticket, post_id) = self.with_state(|s| s.ready_ticket())?;
        let counts = self
            .inner
            .toggles
            .record_view(self.inner.gateway.as_ref(), &post_id, viewer_id)
            .await?;
        if let Some(counts) = counts {
            self.apply_counts(ticket, counts);
        }
        Ok(())
    }

    fn apply_counts(&self, ticket: Uuid, counts: EngagementCounts) {
        let applied = self.with_state(|s| {
            if !s.is_current(ticket) {
                return false;
            }
            match s.post.as_mut() {
                Some(post) => {
                    post.apply_counts(counts);
                    true
                }
                None => false,
            }
        });
        if applied {
            self.emit(StoreEvent::CountsUpdated(counts));
        } else {
            tracing::debug!(store = %self.inner.instance_id, "dropping stale engagement counts");
        }
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn with_state<R>(&self, f: impl FnOnce(&mut Snapshot) -> R) -> R {
        let mut guard = self
            .inner
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut guard)
    }

    fn emit(&self, event: StoreEvent) {
        // No subscribers is fine.
        let _ = self.inner.events.send(event);
    }
}

fn validate(limits: &StoreLimits, author: &AuthorContext, content: &str) -> ThreadResult<()> {
    if author.name.trim().is_empty() {
        return Err(ThreadError::validation("author name cannot be empty"));
    }
    if content.trim().is_empty() {
        return Err(ThreadError::validation("content cannot be empty"));
    }
    if content.chars().count() > limits.max_content_chars {
        return Err(ThreadError::validation(format!(
            "content exceeds {} characters",
            limits.max_content_chars
        )));
    }
    Ok(())
}

fn check_unique_ids(comments: &[Comment]) -> ThreadResult<()> {
    let mut seen = HashSet::with_capacity(comments.len());
    for comment in comments {
        if !seen.insert(&comment.id) {
            return Err(ThreadError::duplicate("comment", &comment.id));
        }
        let mut replies = HashSet::with_capacity(comment.replies.len());
        for reply in &comment.replies {
            if !replies.insert(&reply.id) {
                return Err(ThreadError::duplicate("reply", &reply.id));
            }
        }
    }
    Ok(())
}
