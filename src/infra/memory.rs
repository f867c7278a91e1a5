use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::domain::comment::{AuthorContext, Comment, EntityId, Reply};
use crate::domain::post::{EngagementCounts, Post, PostSummary, PostThread};
use crate::infra::gateway::{GatewayError, SyncGateway};

/// Authoritative copy of posts held in process. Assigns `c<n>` / `r<n>` ids
/// the way a server would, and tracks who liked, disliked and viewed what.
#[derive(Debug, Default)]
pub struct MemoryGateway {
    state: Mutex<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    posts: Vec<StoredPost>,
    next_comment: u64,
    next_reply: u64,
    offline: bool,
}

#[derive(Debug)]
struct StoredPost {
    thread: PostThread,
    base: EngagementCounts,
    liked_by: HashSet<String>,
    disliked_by: HashSet<String>,
    views: u64,
}

impl StoredPost {
    fn counts(&self) -> EngagementCounts {
        EngagementCounts {
            likes: self.base.likes + self.liked_by.len() as u64,
            dislikes: self.base.dislikes + self.disliked_by.len() as u64,
            views: self.base.views + self.views,
        }
    }

    fn snapshot(&self) -> PostThread {
        let mut thread = self.thread.clone();
        thread.post.apply_counts(self.counts());
        thread
    }
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) a post. Counters on the post become the baseline
    /// that toggles are applied on top of. Ids minted afterwards never reuse
    /// a `c<n>` / `r<n>` id already present in the thread.
    pub fn insert_thread(&self, thread: PostThread) {
        let mut state = self.lock();
        for comment in &thread.comments {
            if let Some(seq) = minted_seq(&comment.id, 'c') {
                state.next_comment = state.next_comment.max(seq);
            }
            for reply in &comment.replies {
                if let Some(seq) = minted_seq(&reply.id, 'r') {
                    state.next_reply = state.next_reply.max(seq);
                }
            }
        }
        state.posts.retain(|stored| stored.thread.post.id != thread.post.id);
        state.posts.push(StoredPost {
            base: thread.post.counts(),
            thread,
            liked_by: HashSet::new(),
            disliked_by: HashSet::new(),
            views: 0,
        });
    }

    pub fn insert_post(&self, post: Post) {
        self.insert_thread(PostThread {
            post,
            comments: Vec::new(),
        });
    }

    /// While offline every call fails with `Unreachable`.
    pub fn set_offline(&self, offline: bool) {
        self.lock().offline = offline;
    }

    pub fn thread(&self, post_id: &str) -> Option<PostThread> {
        let state = self.lock();
        state
            .posts
            .iter()
            .find(|stored| stored.thread.post.id == post_id)
            .map(StoredPost::snapshot)
    }

    pub fn list_posts(&self) -> Vec<PostSummary> {
        self.lock()
            .posts
            .iter()
            .map(|stored| {
                let post = &stored.thread.post;
                PostSummary {
                    id: post.id.clone(),
                    title: post.title.clone(),
                    author: post.author.clone(),
                    image: post.image.clone(),
                    created_at: post.created_at,
                }
            })
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn with_post<R>(
        &self,
        post_id: &str,
        f: impl FnOnce(&mut StoredPost, &mut u64, &mut u64) -> Result<R, GatewayError>,
    ) -> Result<R, GatewayError> {
        let mut guard = self.lock();
        let state = &mut *guard;
        if state.offline {
            return Err(GatewayError::Unreachable("memory gateway is offline".into()));
        }
        let stored = state
            .posts
            .iter_mut()
            .find(|stored| stored.thread.post.id == post_id)
            .ok_or_else(|| GatewayError::NotFound(format!("post {}", post_id)))?;
        f(stored, &mut state.next_comment, &mut state.next_reply)
    }
}

fn minted_seq(id: &EntityId, prefix: char) -> Option<u64> {
    id.as_confirmed()?.strip_prefix(prefix)?.parse().ok()
}

fn require_text(field: &str, value: &str) -> Result<(), GatewayError> {
    if value.trim().is_empty() {
        return Err(GatewayError::ValidationFailed(format!("{} is required", field)));
    }
    Ok(())
}

#[async_trait]
impl SyncGateway for MemoryGateway {
    async fn fetch_post(&self, post_id: &str) -> Result<PostThread, GatewayError> {
        self.with_post(post_id, |stored, _, _| Ok(stored.snapshot()))
    }

    async fn create_comment(
        &self,
        post_id: &str,
        author: &AuthorContext,
        content: &str,
    ) -> Result<Comment, GatewayError> {
        require_text("commenter", &author.name)?;
        require_text("content", content)?;
        self.with_post(post_id, |stored, next_comment, _| {
            *next_comment += 1;
            let comment = Comment {
                id: EntityId::confirmed(format!("c{}", next_comment)),
                author: author.name.clone(),
                content: content.to_string(),
                created_at: OffsetDateTime::now_utc(),
                replies: Vec::new(),
            };
            stored.thread.comments.push(comment.clone());
            Ok(comment)
        })
    }

    async fn create_reply(
        &self,
        post_id: &str,
        comment_id: &str,
        author: &AuthorContext,
        content: &str,
    ) -> Result<Reply, GatewayError> {
        require_text("replyCommenter", &author.name)?;
        require_text("replyContent", content)?;
        self.with_post(post_id, |stored, _, next_reply| {
            let comment = stored
                .thread
                .comments
                .iter_mut()
                .find(|comment| comment.id == comment_id)
                .ok_or_else(|| GatewayError::NotFound(format!("comment {}", comment_id)))?;
            *next_reply += 1;
            let reply = Reply {
                id: EntityId::confirmed(format!("r{}", next_reply)),
                author: author.name.clone(),
                content: content.to_string(),
                created_at: OffsetDateTime::now_utc(),
            };
            comment.replies.push(reply.clone());
            Ok(reply)
        })
    }

    async fn toggle_like(
        &self,
        post_id: &str,
        viewer_id: &str,
    ) -> Result<EngagementCounts, GatewayError> {
        self.with_post(post_id, |stored, _, _| {
            if !stored.liked_by.remove(viewer_id) {
                stored.liked_by.insert(viewer_id.to_string());
                stored.disliked_by.remove(viewer_id);
            }
            Ok(stored.counts())
        })
    }

    async fn toggle_dislike(
        &self,
        post_id: &str,
        viewer_id: &str,
    ) -> Result<EngagementCounts, GatewayError> {
        self.with_post(post_id, |stored, _, _| {
            if !stored.disliked_by.remove(viewer_id) {
                stored.disliked_by.insert(viewer_id.to_string());
                stored.liked_by.remove(viewer_id);
            }
            Ok(stored.counts())
        })
    }

    async fn record_view(
        &self,
        post_id: &str,
        _viewer_id: &str,
    ) -> Result<EngagementCounts, GatewayError> {
        self.with_post(post_id, |stored, _, _| {
            stored.views += 1;
            Ok(stored.counts())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(id: &str) -> Post {
        Post {
            id: id.to_string(),
            title: "Title".to_string(),
            body: "<p>Body</p>".to_string(),
            author: "carol".to_string(),
            image: None,
            created_at: OffsetDateTime::UNIX_EPOCH,
            likes: 2,
            dislikes: 0,
            views: 10,
        }
    }

    #[tokio::test]
    async fn likes_and_dislikes_are_exclusive_per_viewer() {
        let gateway = MemoryGateway::new();
        gateway.insert_post(post("p1"));

        let counts = gateway.toggle_like("p1", "u1").await.unwrap();
        assert_eq!((counts.likes, counts.dislikes), (3, 0));

        let counts = gateway.toggle_dislike("p1", "u1").await.unwrap();
        assert_eq!((counts.likes, counts.dislikes), (2, 1));

        let counts = gateway.toggle_dislike("p1", "u1").await.unwrap();
        assert_eq!((counts.likes, counts.dislikes), (2, 0));
    }

    #[tokio::test]
    async fn ids_are_assigned_by_the_gateway() {
        let gateway = MemoryGateway::new();
        gateway.insert_post(post("p1"));
        let alice = AuthorContext::new("alice");

        let first = gateway.create_comment("p1", &alice, "one").await.unwrap();
        let second = gateway.create_comment("p1", &alice, "two").await.unwrap();
        let reply = gateway.create_reply("p1", "c1", &alice, "three").await.unwrap();

        assert_eq!(first.id, "c1");
        assert_eq!(second.id, "c2");
        assert_eq!(reply.id, "r1");
        assert_eq!(gateway.thread("p1").unwrap().comments[0].replies.len(), 1);
    }

    #[tokio::test]
    async fn minted_ids_skip_past_seeded_ones() {
        let gateway = MemoryGateway::new();
        let seeded_at = OffsetDateTime::UNIX_EPOCH;
        gateway.insert_thread(PostThread {
            post: post("p1"),
            comments: vec![Comment {
                id: "c1".into(),
                author: "bob".to_string(),
                content: "seeded".to_string(),
                created_at: seeded_at,
                replies: vec![Reply {
                    id: "r1".into(),
                    author: "carol".to_string(),
                    content: "seeded".to_string(),
                    created_at: seeded_at,
                }],
            }],
        });
        let alice = AuthorContext::new("alice");

        let comment = gateway.create_comment("p1", &alice, "second").await.unwrap();
        let reply = gateway.create_reply("p1", "c1", &alice, "again").await.unwrap();

        assert_eq!(comment.id, "c2");
        assert_eq!(reply.id, "r2");
        let thread = gateway.thread("p1").unwrap();
        let ids: Vec<String> = thread.comments.iter().map(|c| c.id.to_string()).collect();
        assert_eq!(ids, vec!["c1", "c2"]);
    }

    #[tokio::test]
    async fn unknown_targets_and_empty_content_are_rejected() {
        let gateway = MemoryGateway::new();
        gateway.insert_post(post("p1"));
        let alice = AuthorContext::new("alice");

        assert!(matches!(
            gateway.fetch_post("missing").await,
            Err(GatewayError::NotFound(_))
        ));
        assert!(matches!(
            gateway.create_reply("p1", "c404", &alice, "hi").await,
            Err(GatewayError::NotFound(_))
        ));
        assert!(matches!(
            gateway.create_comment("p1", &alice, "  ").await,
            Err(GatewayError::ValidationFailed(_))
        ));

        gateway.set_offline(true);
        assert!(matches!(
            gateway.record_view("p1", "u1").await,
            Err(GatewayError::Unreachable(_))
        ));
    }
}
