//! QueueKind - オフラインアクションのカテゴリ
//!
//! Enqueue 側と sync 側の両方がこの enum だけを参照します。
//! queue 名・store 名・tag の解釈はすべてここに集約されています。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Tag prefixes the sync processor recognizes.
pub const RECOGNIZED_PREFIXES: [&str; 4] = ["feedback-", "comment-", "upvote-", "report-"];

/// One category of offline user action. Each kind owns exactly one durable store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum QueueKind {
    FeedbackCreate,
    FeedbackUpdate,
    CommentCreate,
    UpvoteToggle,
    Report,
}

impl QueueKind {
    pub const ALL: [QueueKind; 5] = [
        QueueKind::FeedbackCreate,
        QueueKind::FeedbackUpdate,
        QueueKind::CommentCreate,
        QueueKind::UpvoteToggle,
        QueueKind::Report,
    ];

    /// Queue name, also used as the sync tag.
    pub fn queue_name(self) -> &'static str {
        match self {
            QueueKind::FeedbackCreate => "feedback-create-queue",
            QueueKind::FeedbackUpdate => "feedback-update-queue",
            QueueKind::CommentCreate => "comment-create-queue",
            QueueKind::UpvoteToggle => "upvote-toggle-queue",
            QueueKind::Report => "report-queue",
        }
    }

    /// Name of the durable store backing this queue (`offline-<queueName>`).
    pub fn store_name(self) -> String {
        format!("offline-{}", self.queue_name())
    }

    /// Resolve a sync tag.
    ///
    /// Tags outside the recognized prefixes are ignored (`None`), as are tags
    /// that carry a known prefix but name no queue.
    pub fn from_tag(tag: &str) -> Option<Self> {
        if !RECOGNIZED_PREFIXES.iter().any(|p| tag.starts_with(p)) {
            return None;
        }
        tag.parse().ok()
    }
}

impl fmt::Display for QueueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.queue_name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown queue name: {0}")]
pub struct UnknownQueue(pub String);

impl FromStr for QueueKind {
    type Err = UnknownQueue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        QueueKind::ALL
            .into_iter()
            .find(|kind| kind.queue_name() == s)
            .ok_or_else(|| UnknownQueue(s.to_string()))
    }
}

impl From<QueueKind> for String {
    fn from(kind: QueueKind) -> Self {
        kind.queue_name().to_string()
    }
}

impl TryFrom<String> for QueueKind {
    type Error = UnknownQueue;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
