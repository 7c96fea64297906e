//! Domain models for the Scorebook catalogue.
//!
//! - [`Composition`] - a catalogued piece with a denormalized comment count
//! - [`Comment`] - a user note attached to exactly one composition
//! - [`Difficulty`] - the three difficulty tiers
//! - [`CompositionDraft`] / [`NewComposition`] - raw and validated creation input
//! - [`CompositionId`], [`CommentId`], [`UserId`] - typed identifiers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Identifiers
// =============================================================================

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(value: u64) -> Self {
                Self(value)
            }
        }
    };
}

id_type!(
    /// Store-assigned composition id. Ids grow with insertion order.
    CompositionId
);
id_type!(
    /// Store-assigned comment id. Ids grow with insertion order.
    CommentId
);
id_type!(
    /// Caller identity, supplied by the identity collaborator.
    UserId
);

// =============================================================================
// Difficulty
// =============================================================================

/// Difficulty tier, stored and transmitted as `0`, `1` or `2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
}

impl Difficulty {
    pub fn level(self) -> u8 {
        match self {
            Self::Beginner => 0,
            Self::Intermediate => 1,
            Self::Advanced => 2,
        }
    }

    /// Parse a numeric tier.
    pub fn from_level(level: i64) -> Option<Self> {
        match level {
            0 => Some(Self::Beginner),
            1 => Some(Self::Intermediate),
            2 => Some(Self::Advanced),
            _ => None,
        }
    }
}

impl TryFrom<i64> for Difficulty {
    type Error = String;

    fn try_from(level: i64) -> Result<Self, Self::Error> {
        Self::from_level(level).ok_or_else(|| format!("unknown difficulty {level}"))
    }
}

impl From<Difficulty> for u8 {
    fn from(difficulty: Difficulty) -> Self {
        difficulty.level()
    }
}

// =============================================================================
// Composition
// =============================================================================

/// A catalogued composition.
///
/// `comment_count` is owned by the counter coordinator; nothing else
/// writes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Composition {
    pub id: CompositionId,
    pub title: String,
    pub author: String,
    pub length_seconds: u32,
    pub year: u16,
    pub difficulty: Difficulty,
    pub page_count: u8,
    pub video_url: String,
    pub sheet_url: String,
    pub added_at: DateTime<Utc>,
    pub adder_id: UserId,
    pub comment_count: u32,
}

impl Composition {
    /// Build the stored row for a validated composition.
    pub fn from_new(id: CompositionId, new: NewComposition, added_at: DateTime<Utc>) -> Self {
        Self {
            id,
            title: new.title,
            author: new.author,
            length_seconds: new.length_seconds,
            year: new.year,
            difficulty: new.difficulty,
            page_count: new.page_count,
            video_url: new.video_url,
            sheet_url: new.sheet_url,
            added_at,
            adder_id: new.adder_id,
            comment_count: 0,
        }
    }
}

/// Raw creation input as received from a client, before validation.
///
/// Field names follow the public form contract (`length`, `diff`, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompositionDraft {
    pub title: String,
    pub author: String,
    pub length: i64,
    pub year: i64,
    pub diff: i64,
    pub pages: i64,
    pub video: String,
    pub sheet: String,
}

/// A composition that passed every field validator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewComposition {
    pub title: String,
    pub author: String,
    pub length_seconds: u32,
    pub year: u16,
    pub difficulty: Difficulty,
    pub page_count: u8,
    pub video_url: String,
    pub sheet_url: String,
    pub adder_id: UserId,
}

// =============================================================================
// Comment
// =============================================================================

/// A comment attached to one composition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: CommentId,
    pub author_user_id: UserId,
    pub content: String,
    pub added_at: DateTime<Utc>,
    pub composition_id: CompositionId,
}

/// A validated comment waiting for its id. The owning composition is
/// implied by the unit of work it is inserted through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewComment {
    pub author_user_id: UserId,
    pub content: String,
    pub added_at: DateTime<Utc>,
}
