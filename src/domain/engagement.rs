use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngagementKind {
    Like,
    Dislike,
    View,
}

impl EngagementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Like => "like",
            Self::Dislike => "dislike",
            Self::View => "view",
        }
    }
}

/// What one viewer has already done to one post during this session.
///
/// Only used to decide whether a call should be sent; counts always come
/// from the server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngagementState {
    pub liked: bool,
    pub disliked: bool,
    pub viewed: bool,
}

impl EngagementState {
    /// Records a toggle the server has accepted. Liking clears a dislike and
    /// the other way around.
    pub fn apply_toggle(&mut self, kind: EngagementKind) {
        match kind {
            EngagementKind::Like => {
                self.liked = !self.liked;
                if self.liked {
                    self.disliked = false;
                }
            }
            EngagementKind::Dislike => {
                self.disliked = !self.disliked;
                if self.disliked {
                    self.liked = false;
                }
            }
            EngagementKind::View => self.viewed = true,
        }
    }
}
