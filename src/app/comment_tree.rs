//! In-memory comment forest for one post.
//!
//! Fixed depth: post → comment → reply. Comments and replies keep insertion
//! order. Confirmed entries are never removed or reordered; only pending
//! placeholders can be discarded (rollback) or swapped for their confirmed
//! server copy.

use crate::app::error::{ThreadError, ThreadResult};
use crate::domain::comment::{Comment, EntityId, Reply};

#[derive(Debug, Clone, Default)]
pub struct CommentTree {
    comments: Vec<Comment>,
}

impl CommentTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn comments(&self) -> &[Comment] {
        &self.comments
    }

    pub fn len(&self) -> usize {
        self.comments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.comments.is_empty()
    }

    /// Number of placeholders still waiting on the server, replies included.
    pub fn pending_count(&self) -> usize {
        self.comments
            .iter()
            .map(|comment| {
                usize::from(comment.is_pending())
                    + comment.replies.iter().filter(|r| r.is_pending()).count()
            })
            .sum()
    }

    pub fn insert_comment(&mut self, comment: Comment) -> ThreadResult<()> {
        if self.position(&comment.id).is_some() {
            return Err(ThreadError::duplicate("comment", &comment.id));
        }
        self.comments.push(comment);
        Ok(())
    }

    pub fn insert_reply(&mut self, comment_id: &EntityId, reply: Reply) -> ThreadResult<()> {
        let comment = self
            .comment_mut(comment_id)
            .ok_or_else(|| ThreadError::not_found("comment", comment_id))?;
        if comment.find_reply(&reply.id).is_some() {
            return Err(ThreadError::duplicate("reply", &reply.id));
        }
        comment.replies.push(reply);
        Ok(())
    }

    /// Authoritative refresh: nothing from the previous forest survives.
    pub fn replace_all(&mut self, comments: Vec<Comment>) {
        self.comments = comments;
    }

    pub fn find_comment(&self, comment_id: &EntityId) -> Option<&Comment> {
        self.comments.iter().find(|comment| &comment.id == comment_id)
    }

    pub fn find_reply(&self, comment_id: &EntityId, reply_id: &EntityId) -> Option<&Reply> {
        self.find_comment(comment_id)?.find_reply(reply_id)
    }

    /// Swaps a pending comment for the server copy, keeping its position.
    /// Replies already attached to the placeholder are carried over when
    /// the server copy has none of its own.
    pub fn confirm_comment(
        &mut self,
        placeholder: &EntityId,
        mut confirmed: Comment,
    ) -> ThreadResult<()> {
        let index = self
            .pending_position(placeholder)
            .ok_or_else(|| ThreadError::not_found("comment", placeholder))?;
        if self.position(&confirmed.id).is_some() {
            return Err(ThreadError::duplicate("comment", &confirmed.id));
        }
        let slot = &mut self.comments[index];
        if confirmed.replies.is_empty() {
            confirmed.replies = std::mem::take(&mut slot.replies);
        }
        *slot = confirmed;
        Ok(())
    }

    pub fn confirm_reply(
        &mut self,
        comment_id: &EntityId,
        placeholder: &EntityId,
        confirmed: Reply,
    ) -> ThreadResult<()> {
        let comment = self
            .comment_mut(comment_id)
            .ok_or_else(|| ThreadError::not_found("comment", comment_id))?;
        let index = comment
            .replies
            .iter()
            .position(|reply| reply.is_pending() && &reply.id == placeholder)
            .ok_or_else(|| ThreadError::not_found("reply", placeholder))?;
        if comment.find_reply(&confirmed.id).is_some() {
            return Err(ThreadError::duplicate("reply", &confirmed.id));
        }
        comment.replies[index] = confirmed;
        Ok(())
    }

    /// Rollback of an optimistic comment. Confirmed comments are left alone.
    pub fn discard_pending_comment(&mut self, placeholder: &EntityId) -> Option<Comment> {
        let index = self.pending_position(placeholder)?;
        Some(self.comments.remove(index))
    }

    pub fn discard_pending_reply(
        &mut self,
        comment_id: &EntityId,
        placeholder: &EntityId,
    ) -> Option<Reply> {
        let comment = self.comment_mut(comment_id)?;
        let index = comment
            .replies
            .iter()
            .position(|reply| reply.is_pending() && &reply.id == placeholder)?;
        Some(comment.replies.remove(index))
    }

    fn position(&self, id: &EntityId) -> Option<usize> {
        self.comments.iter().position(|comment| &comment.id == id)
    }

    fn pending_position(&self, id: &EntityId) -> Option<usize> {
        if !id.is_pending() {
            return None;
        }
        self.position(id)
    }

    fn comment_mut(&mut self, id: &EntityId) -> Option<&mut Comment> {
        self.comments.iter_mut().find(|comment| &comment.id == id)
    }
}
