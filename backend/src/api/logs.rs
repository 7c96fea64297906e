//! Activity feed streamed to clients via Server-Sent Events (SSE).
//!
//! Domain events (compositions added or removed, comments written, counters
//! repaired) are published on a broadcast channel and mirrored to `tracing`
//! at the matching level.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::models::CompositionId;

/// Capacity of the broadcast channel. Slow subscribers skip older entries.
const FEED_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// A single feed entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEntry {
    pub level: ActivityLevel,
    pub message: String,
    pub at: DateTime<Utc>,
    /// Composition the event concerns, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub composition_id: Option<CompositionId>,
}

impl ActivityEntry {
    pub fn new(level: ActivityLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            at: Utc::now(),
            composition_id: None,
        }
    }

    pub fn with_composition(mut self, id: Option<CompositionId>) -> Self {
        self.composition_id = id;
        self
    }
}

/// Global activity feed
pub static ACTIVITY: Lazy<ActivityFeed> = Lazy::new(ActivityFeed::new);

/// Broadcasts activity entries to every connected SSE client
pub struct ActivityFeed {
    sender: broadcast::Sender<ActivityEntry>,
}

impl ActivityFeed {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(FEED_CAPACITY);
        Self { sender }
    }

    pub fn publish(&self, entry: ActivityEntry) {
        let composition = entry.composition_id.map(|id| id.0);
        match entry.level {
            ActivityLevel::Info | ActivityLevel::Success => {
                tracing::info!(composition, "{}", entry.message)
            }
            ActivityLevel::Warning => tracing::warn!(composition, "{}", entry.message),
            ActivityLevel::Error => tracing::error!(composition, "{}", entry.message),
        }

        // no subscribers is fine
        let _ = self.sender.send(entry);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ActivityEntry> {
        self.sender.subscribe()
    }
}

impl Default for ActivityFeed {
    fn default() -> Self {
        Self::new()
    }
}

pub fn activity_info(msg: impl Into<String>, composition: Option<CompositionId>) {
    ACTIVITY.publish(ActivityEntry::new(ActivityLevel::Info, msg).with_composition(composition));
}

pub fn activity_success(msg: impl Into<String>, composition: Option<CompositionId>) {
    ACTIVITY.publish(ActivityEntry::new(ActivityLevel::Success, msg).with_composition(composition));
}

pub fn activity_warning(msg: impl Into<String>, composition: Option<CompositionId>) {
    ACTIVITY.publish(ActivityEntry::new(ActivityLevel::Warning, msg).with_composition(composition));
}

pub fn activity_error(msg: impl Into<String>, composition: Option<CompositionId>) {
    ACTIVITY.publish(ActivityEntry::new(ActivityLevel::Error, msg).with_composition(composition));
}
