//! Toggle-style engagement (like, dislike, view) with per-key exclusion.
//!
//! Counts are never computed here: every accepted call returns the
//! server's counters and the caller displays those. The local
//! [`EngagementState`] only decides whether a call is worth sending.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use crate::app::error::{ThreadError, ThreadResult};
use crate::domain::engagement::{EngagementKind, EngagementState};
use crate::domain::post::EngagementCounts;
use crate::infra::gateway::SyncGateway;

/// Like and dislike share a lane so one viewer never has both in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToggleLane {
    Reaction,
    View,
}

impl From<EngagementKind> for ToggleLane {
    fn from(kind: EngagementKind) -> Self {
        match kind {
            EngagementKind::Like | EngagementKind::Dislike => Self::Reaction,
            EngagementKind::View => Self::View,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ToggleKey {
    pub post_id: String,
    pub viewer_id: String,
    pub lane: ToggleLane,
}

#[derive(Debug, Default)]
pub struct EngagementToggle {
    in_flight: Mutex<HashSet<ToggleKey>>,
    states: Mutex<HashMap<(String, String), EngagementState>>,
}

/// Holds a lane for as long as it lives. Dropping it (including when the
/// owning future is cancelled) frees the lane.
#[derive(Debug)]
pub struct InFlightGuard<'a> {
    owner: &'a EngagementToggle,
    key: ToggleKey,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let mut in_flight = self
            .owner
            .in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        in_flight.remove(&self.key);
    }
}

impl EngagementToggle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims the lane for `kind`, failing fast if it is already taken.
    pub fn begin(
        &self,
        post_id: &str,
        viewer_id: &str,
        kind: EngagementKind,
    ) -> ThreadResult<InFlightGuard<'_>> {
        let key = ToggleKey {
            post_id: post_id.to_string(),
            viewer_id: viewer_id.to_string(),
            lane: kind.into(),
        };
        let mut in_flight = self
            .in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if !in_flight.insert(key.clone()) {
            return Err(ThreadError::ToggleInProgress(kind));
        }
        Ok(InFlightGuard { owner: self, key })
    }

    pub fn is_in_flight(&self, post_id: &str, viewer_id: &str, lane: ToggleLane) -> bool {
        let key = ToggleKey {
            post_id: post_id.to_string(),
            viewer_id: viewer_id.to_string(),
            lane,
        };
        self.in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains(&key)
    }

    pub fn state(&self, post_id: &str, viewer_id: &str) -> EngagementState {
        self.states
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&(post_id.to_string(), viewer_id.to_string()))
            .copied()
            .unwrap_or_default()
    }

    fn settle(&self, post_id: &str, viewer_id: &str, kind: EngagementKind) {
        let mut states = self
            .states
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        states
            .entry((post_id.to_string(), viewer_id.to_string()))
            .or_default()
            .apply_toggle(kind);
    }

    /// Sends one like or dislike toggle. The local state flips only once the
    /// server has accepted it.
    pub async fn toggle(
        &self,
        gateway: &dyn SyncGateway,
        post_id: &str,
        viewer_id: &str,
        kind: EngagementKind,
    ) -> ThreadResult<EngagementCounts> {
        let _guard = self.begin(post_id, viewer_id, kind)?;

        match gateway.engage(kind, post_id, viewer_id).await {
            Ok(counts) => {
                self.settle(post_id, viewer_id, kind);
                tracing::debug!(
                    post_id = post_id,
                    viewer_id = viewer_id,
                    kind = kind.as_str(),
                    likes = counts.likes,
                    dislikes = counts.dislikes,
                    "engagement toggle accepted"
                );
                Ok(counts)
            }
            Err(err) => Err(ThreadError::PersistFailed {
                action: kind.as_str(),
                source: err,
            }),
        }
    }

    /// Sends a view at most once per (post, viewer). Returns `Ok(None)` when
    /// the view was already recorded.
    pub async fn record_view(
        &self,
        gateway: &dyn SyncGateway,
        post_id: &str,
        viewer_id: &str,
    ) -> ThreadResult<Option<EngagementCounts>> {
        if self.state(post_id, viewer_id).viewed {
            return Ok(None);
        }
        let _guard = self.begin(post_id, viewer_id, EngagementKind::View)?;

        let counts = gateway
            .record_view(post_id, viewer_id)
            .await
            .map_err(|err| ThreadError::PersistFailed {
                action: EngagementKind::View.as_str(),
                source: err,
            })?;
        self.settle(post_id, viewer_id, EngagementKind::View);
        Ok(Some(counts))
    }
}
