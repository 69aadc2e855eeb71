//! Bounded diagnostic log of the tool-call pipeline
//!
//! Gives an operator a live view of snapshot → vision → feedback exchanges.
//! Entries are kept in a fixed-capacity ring and broadcast to subscribers so
//! a debug panel can follow the newest entry.

use std::collections::VecDeque;

use chrono::{DateTime, Local};
use serde::Serialize;
use tokio::sync::broadcast;

/// Maximum entries retained; the oldest are evicted first
pub const DEBUG_LOG_CAPACITY: usize = 50;

/// Channel capacity for live entry updates
const CHANNEL_CAPACITY: usize = 64;

/// Stage of the pipeline an entry describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DebugKind {
    /// The voice agent invoked the visual question tool
    ToolCall,
    /// A camera frame was captured
    Snapshot,
    /// Request sent to the vision model
    VisionRequest,
    /// Response received from the vision model
    VisionResponse,
    /// Something in the pipeline failed
    Error,
}

impl DebugKind {
    /// Short marker shown next to the entry
    #[must_use]
    pub const fn marker(self) -> &'static str {
        match self {
            Self::ToolCall => ">>",
            Self::Snapshot => "[]",
            Self::VisionRequest => "->",
            Self::VisionResponse => "<-",
            Self::Error => "!!",
        }
    }
}

/// One row of the debug log
#[derive(Debug, Clone, Serialize)]
pub struct DebugEntry {
    /// Monotonic id, never reused
    pub id: u64,
    pub time: DateTime<Local>,
    pub kind: DebugKind,
    pub message: String,
    /// Snapshot thumbnail as a data URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
}

/// Ring buffer of debug entries
pub struct DebugRecorder {
    entries: VecDeque<DebugEntry>,
    capacity: usize,
    next_id: u64,
    tx: broadcast::Sender<DebugEntry>,
}

impl Default for DebugRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl DebugRecorder {
    /// Create an empty recorder with the default capacity
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEBUG_LOG_CAPACITY)
    }

    /// Create an empty recorder holding at most `capacity` entries
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
            next_id: 1,
            tx,
        }
    }

    /// Subscribe to newly appended entries
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<DebugEntry> {
        self.tx.subscribe()
    }

    /// Append an entry, evicting from the front past capacity
    ///
    /// Returns the id assigned to the entry
    pub fn append(&mut self, kind: DebugKind, message: impl Into<String>) -> u64 {
        self.append_with_thumbnail(kind, message, None)
    }

    /// Append an entry carrying a snapshot thumbnail
    pub fn append_with_thumbnail(
        &mut self,
        kind: DebugKind,
        message: impl Into<String>,
        thumbnail: Option<String>,
    ) -> u64 {
        let id = self.next_id;
        self.next_id += 1;

        let entry = DebugEntry {
            id,
            time: Local::now(),
            kind,
            message: message.into(),
            thumbnail,
        };

        match kind {
            DebugKind::Error => tracing::warn!(id, message = %entry.message, "debug: {}", kind.marker()),
            _ => tracing::debug!(id, message = %entry.message, "debug: {}", kind.marker()),
        }

        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry.clone());

        // No subscribers is fine
        let _ = self.tx.send(entry);

        id
    }

    /// Remove all entries; ids keep counting up
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Entries in insertion order
    pub fn entries(&self) -> impl Iterator<Item = &DebugEntry> {
        self.entries.iter()
    }

    /// Copy of the current entries
    #[must_use]
    pub fn snapshot(&self) -> Vec<DebugEntry> {
        self.entries.iter().cloned().collect()
    }

    /// Id of the newest entry, the scroll target for a follow-along view
    #[must_use]
    pub fn newest_id(&self) -> Option<u64> {
        self.entries.back().map(|e| e.id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
