//! REST API request and response bodies.
//!
//! Every success body carries a `status` string naming the operation that
//! ran (`addedComp`, `gotCompById`, `removedComment`, ...), so clients built
//! against those names keep working.

use serde::{Deserialize, Serialize};

use crate::models::{Comment, Composition, CompositionId, Difficulty};
use crate::services::{CounterDrift, Removal};

pub mod status {
    pub const ADDED_COMMENT: &str = "addedComment";
    pub const EDITED_COMMENT: &str = "editedComment";
    pub const REMOVED_COMMENT: &str = "removedComment";
    pub const GOT_COMMENTS_BY_COMP: &str = "gotCommentsByComp";
    pub const GOT_COMMENTS_BY_USER: &str = "gotCommentsByUser";
    pub const ADDED_COMP: &str = "addedComp";
    pub const GOT_COMPS_BY_DIFF: &str = "gotCompsByDiff";
    pub const GOT_COMP_BY_ID: &str = "gotCompById";
    pub const GOT_COMPS_BY_ADDER_ID: &str = "gotCompsByAdderId";
    pub const GOT_COMPS: &str = "gotComps";
    pub const REMOVED_COMP: &str = "removedComp";
    pub const SEARCH_COMPLETED: &str = "searchCompleted";
    pub const RECONCILED: &str = "reconciled";
}

// =============================================================================
// Requests
// =============================================================================

/// Body of `POST /api/compositions/{id}/comments`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddCommentRequest {
    pub content: String,
}

/// Body of `PUT /api/comments/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditCommentRequest {
    pub content: String,
}

/// Body of `PATCH /api/compositions/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatchRequest {
    pub field: String,
    pub value: PatchValue,
}

/// A patch value as sent by the client.
///
/// Numbers are accepted alongside strings and handed to the field validator
/// as their decimal text.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PatchValue {
    Text(String),
    Number(serde_json::Number),
}

impl PatchValue {
    pub fn to_raw(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Number(number) => number.to_string(),
        }
    }
}

/// Query of `GET /api/compositions`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompositionQuery {
    pub diff: Option<i64>,
    pub adder: Option<u64>,
}

/// Query of `GET /api/compositions/search`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

// =============================================================================
// Responses
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositionResponse {
    pub status: String,
    pub composition: Composition,
}

impl CompositionResponse {
    pub fn new(status: &str, composition: Composition) -> Self {
        Self {
            status: status.to_string(),
            composition,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositionListResponse {
    pub status: String,
    pub count: usize,
    pub compositions: Vec<Composition>,
}

impl CompositionListResponse {
    pub fn new(status: &str, compositions: Vec<Composition>) -> Self {
        Self {
            status: status.to_string(),
            count: compositions.len(),
            compositions,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentResponse {
    pub status: String,
    pub comment: Comment,
}

impl CommentResponse {
    pub fn new(status: &str, comment: Comment) -> Self {
        Self {
            status: status.to_string(),
            comment,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentListResponse {
    pub status: String,
    pub count: usize,
    pub comments: Vec<Comment>,
}

impl CommentListResponse {
    pub fn new(status: &str, comments: Vec<Comment>) -> Self {
        Self {
            status: status.to_string(),
            count: comments.len(),
            comments,
        }
    }
}

/// Summary of a removed composition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemovalResponse {
    pub status: String,
    pub id: CompositionId,
    pub title: String,
    pub author: String,
    pub length: u32,
    pub year: u16,
    pub diff: Difficulty,
    pub removed_comments: usize,
}

impl From<Removal> for RemovalResponse {
    fn from(removal: Removal) -> Self {
        let composition = removal.composition;
        Self {
            status: status::REMOVED_COMP.to_string(),
            id: composition.id,
            title: composition.title,
            author: composition.author,
            length: composition.length_seconds,
            year: composition.year,
            diff: composition.difficulty,
            removed_comments: removal.removed_comments,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileResponse {
    pub status: String,
    #[serde(flatten)]
    pub drift: CounterDrift,
    pub repaired: bool,
}

impl From<CounterDrift> for ReconcileResponse {
    fn from(drift: CounterDrift) -> Self {
        Self {
            status: status::RECONCILED.to_string(),
            repaired: drift.is_drifted(),
            drift,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserId;
    use chrono::Utc;

    #[test]
    fn test_patch_value_accepts_strings_and_numbers() {
        let text: PatchRequest =
            serde_json::from_str(r#"{"field":"title","value":"Nocturne"}"#).unwrap();
        assert_eq!(text.value.to_raw(), "Nocturne");

        let number: PatchRequest = serde_json::from_str(r#"{"field":"pages","value":20}"#).unwrap();
        assert_eq!(number.value.to_raw(), "20");

        let fraction: PatchRequest = serde_json::from_str(r#"{"field":"year","value":1.5}"#).unwrap();
        assert_eq!(fraction.value.to_raw(), "1.5");

        assert!(serde_json::from_str::<PatchRequest>(r#"{"field":"title","value":null}"#).is_err());
    }

    #[test]
    fn test_removal_summary() {
        let composition = Composition {
            id: CompositionId(9),
            title: "Arabesque".into(),
            author: "Debussy".into(),
            length_seconds: 240,
            year: 1891,
            difficulty: Difficulty::Advanced,
            page_count: 5,
            video_url: "https://www.youtube.com/watch?v=x".into(),
            sheet_url: "sheet".into(),
            added_at: Utc::now(),
            adder_id: UserId(1),
            comment_count: 2,
        };
        let json = serde_json::to_value(RemovalResponse::from(Removal {
            composition,
            removed_comments: 2,
        }))
        .unwrap();

        assert_eq!(json["status"], "removedComp");
        assert_eq!(json["title"], "Arabesque");
        assert_eq!(json["length"], 240);
        assert_eq!(json["diff"], 2);
        assert_eq!(json["removedComments"], 2);
    }

    #[test]
    fn test_reconcile_response_flattens_drift() {
        let json = serde_json::to_value(ReconcileResponse::from(CounterDrift {
            composition_id: CompositionId(3),
            recorded: 1,
            actual: 4,
        }))
        .unwrap();
        assert_eq!(json["compositionId"], 3);
        assert_eq!(json["actual"], 4);
        assert_eq!(json["repaired"], true);
    }
}
