//! Queue record: one pending user action awaiting delivery.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Store-assigned key (auto-increment, unique per store).
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(i64);

impl RecordId {
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    pub fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A record in a queue store.
///
/// Records are created on enqueue and deleted on successful replay.
/// They are never updated in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueRecord {
    pub id: RecordId,

    /// Opaque action payload. The queue does not validate its shape.
    pub data: serde_json::Value,

    /// Creation time in epoch milliseconds (diagnostics only).
    pub timestamp: i64,
}

impl QueueRecord {
    pub fn new(id: RecordId, data: serde_json::Value, timestamp: i64) -> Self {
        Self {
            id,
            data,
            timestamp,
        }
    }
}
