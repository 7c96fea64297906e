//! Single-field composition updates.
//!
//! A patch names one attribute and carries its raw string value. The name is
//! parsed into the closed [`PatchField`] set; each field owns exactly one
//! validator and one setter. Unknown names and rejected values are reported
//! as a [`PatchOutcome`] with `applied == false`, never as an error, and leave
//! the composition untouched. The comment counter is not patchable.

use serde::Serialize;
use std::fmt;
use std::sync::Arc;

use crate::api::logs::{activity_info, activity_warning};
use crate::error::{ServiceError, ServiceResult, ValidationError};
use crate::models::{Composition, CompositionId, Difficulty};
use crate::store::EntityStore;
use crate::validation::{self, AUTHOR_MAX_CHARS, LENGTH_RANGE, PAGES_RANGE, TITLE_MAX_CHARS, YEAR_RANGE};

// =============================================================================
// Field Table
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatchField {
    Title,
    Author,
    Length,
    Year,
    Difficulty,
    Pages,
    Video,
    Sheet,
}

impl PatchField {
    pub const ALL: [PatchField; 8] = [
        Self::Title,
        Self::Author,
        Self::Length,
        Self::Year,
        Self::Difficulty,
        Self::Pages,
        Self::Video,
        Self::Sheet,
    ];

    /// Exact, case-sensitive match on the public field name.
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Author => "author",
            Self::Length => "length",
            Self::Year => "year",
            Self::Difficulty => "diff",
            Self::Pages => "pages",
            Self::Video => "video",
            Self::Sheet => "sheet",
        }
    }

    /// Status string reported when a patch of this field is applied.
    pub fn changed_status(self) -> &'static str {
        match self {
            Self::Title => "changedTitle",
            Self::Author => "changedAuthor",
            Self::Length => "changedLength",
            Self::Year => "changedYear",
            Self::Difficulty => "changedDiff",
            Self::Pages => "changedPages",
            Self::Video => "changedVideo",
            Self::Sheet => "changedSheet",
        }
    }

    /// Run this field's validator on a raw value.
    pub fn validate(self, raw: &str) -> Result<FieldUpdate, ValidationError> {
        let field = self.name();
        let update = match self {
            Self::Title => FieldUpdate::Title(validation::bounded_text(field, raw, TITLE_MAX_CHARS)?),
            Self::Author => {
                FieldUpdate::Author(validation::bounded_text(field, raw, AUTHOR_MAX_CHARS)?)
            }
            Self::Length => {
                FieldUpdate::Length(validation::parse_ranged(field, raw, LENGTH_RANGE)? as u32)
            }
            Self::Year => FieldUpdate::Year(validation::parse_ranged(field, raw, YEAR_RANGE)? as u16),
            Self::Difficulty => {
                let level = raw
                    .parse::<i64>()
                    .map_err(|_| ValidationError::NotANumber { field })?;
                FieldUpdate::Difficulty(validation::difficulty(field, level)?)
            }
            Self::Pages => FieldUpdate::Pages(validation::parse_ranged(field, raw, PAGES_RANGE)? as u8),
            Self::Video => FieldUpdate::Video(validation::youtube_url(field, raw)?),
            Self::Sheet => FieldUpdate::Sheet(validation::required_text(field, raw)?),
        };
        Ok(update)
    }
}

impl fmt::Display for PatchField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A validated value for one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldUpdate {
    Title(String),
    Author(String),
    Length(u32),
    Year(u16),
    Difficulty(Difficulty),
    Pages(u8),
    Video(String),
    Sheet(String),
}

impl FieldUpdate {
    pub fn apply(self, composition: &mut Composition) {
        match self {
            Self::Title(title) => composition.title = title,
            Self::Author(author) => composition.author = author,
            Self::Length(seconds) => composition.length_seconds = seconds,
            Self::Year(year) => composition.year = year,
            Self::Difficulty(difficulty) => composition.difficulty = difficulty,
            Self::Pages(pages) => composition.page_count = pages,
            Self::Video(url) => composition.video_url = url,
            Self::Sheet(url) => composition.sheet_url = url,
        }
    }
}

// =============================================================================
// Outcome
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum NoOpReason {
    UnknownField,
    ValidationFailed,
}

/// Result of a patch request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatchOutcome {
    pub applied: bool,
    pub field: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<NoOpReason>,
    pub status: &'static str,
    /// Raw value echoed back when the patch was applied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_value: Option<String>,
}

impl PatchOutcome {
    pub const NO_CHANGE: &'static str = "noChange";

    fn applied(field: PatchField, raw: &str) -> Self {
        Self {
            applied: true,
            field: field.name().to_string(),
            reason: None,
            status: field.changed_status(),
            new_value: Some(raw.to_string()),
        }
    }

    fn no_op(field: &str, reason: NoOpReason) -> Self {
        Self {
            applied: false,
            field: field.to_string(),
            reason: Some(reason),
            status: Self::NO_CHANGE,
            new_value: None,
        }
    }
}

// =============================================================================
// Engine
// =============================================================================

#[derive(Clone)]
pub struct AttributePatchEngine {
    store: Arc<dyn EntityStore>,
}

impl AttributePatchEngine {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self { store }
    }

    /// Apply one named-field update to a composition.
    ///
    /// Fails only when the composition does not exist or the store does.
    pub fn apply_patch(
        &self,
        id: CompositionId,
        field_name: &str,
        raw: &str,
    ) -> ServiceResult<PatchOutcome> {
        let mut unit = self
            .store
            .lock_composition(id)?
            .ok_or(ServiceError::CompositionNotFound(id))?;

        let Some(field) = PatchField::parse(field_name) else {
            activity_warning(
                format!("Patch of composition {id} ignored: unknown field '{field_name}'"),
                Some(id),
            );
            return Ok(PatchOutcome::no_op(field_name, NoOpReason::UnknownField));
        };

        let update = match field.validate(raw) {
            Ok(update) => update,
            Err(err) => {
                activity_warning(format!("Patch of composition {id} ignored: {err}"), Some(id));
                return Ok(PatchOutcome::no_op(field.name(), NoOpReason::ValidationFailed));
            }
        };

        let composition = unit
            .composition_mut()
            .ok_or(ServiceError::CompositionNotFound(id))?;
        update.apply(composition);
        unit.commit()?;

        activity_info(format!("Composition {id}: {field} set to '{raw}'"), Some(id));
        Ok(PatchOutcome::applied(field, raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewComposition, UserId};
    use crate::store::MemoryStore;
    use chrono::Utc;
    use rstest::rstest;

    fn setup() -> (Arc<MemoryStore>, AttributePatchEngine, Composition) {
        let store = Arc::new(MemoryStore::new());
        let composition = store
            .insert_composition(
                NewComposition {
                    title: "Gymnopédie No. 1".into(),
                    author: "Satie".into(),
                    length_seconds: 200,
                    year: 1888,
                    difficulty: Difficulty::Beginner,
                    page_count: 3,
                    video_url: "https://www.youtube.com/watch?v=S-Xm7s9eGxU".into(),
                    sheet_url: "https://imslp.org/gymnopedie.pdf".into(),
                    adder_id: UserId(1),
                },
                Utc::now(),
            )
            .unwrap();
        let engine = AttributePatchEngine::new(store.clone());
        (store, engine, composition)
    }

    #[rstest]
    #[case("pages", "20", true)]
    #[case("pages", "21", false)]
    #[case("pages", "-1", false)]
    #[case("length", "0", false)]
    #[case("length", "36000", true)]
    #[case("length", "abc", false)]
    #[case("year", "9999", true)]
    #[case("year", "10000", false)]
    #[case("diff", "2", true)]
    #[case("diff", "3", false)]
    #[case("title", "", false)]
    #[case("title", "   ", false)]
    #[case("author", "Erik Satie", true)]
    #[case("video", "https://youtube.com/x", false)]
    #[case("video", "https://www.youtube.com/watch?v=1", true)]
    #[case("sheet", "", false)]
    fn test_field_rules(#[case] field: &str, #[case] raw: &str, #[case] applied: bool) {
        let (_store, engine, composition) = setup();
        let outcome = engine.apply_patch(composition.id, field, raw).unwrap();
        assert_eq!(outcome.applied, applied, "{field}={raw}");
        if !applied {
            assert_eq!(outcome.reason, Some(NoOpReason::ValidationFailed));
            assert_eq!(outcome.status, PatchOutcome::NO_CHANGE);
        }
    }

    #[test]
    fn test_applied_patch_is_stored() {
        let (store, engine, composition) = setup();
        let outcome = engine.apply_patch(composition.id, "pages", "20").unwrap();
        assert_eq!(outcome.status, "changedPages");
        assert_eq!(outcome.new_value.as_deref(), Some("20"));

        let stored = store.composition(composition.id).unwrap().unwrap();
        assert_eq!(stored.page_count, 20);
        assert_eq!(stored.title, composition.title);
        assert_eq!(stored.comment_count, composition.comment_count);
    }

    #[test]
    fn test_rejected_patch_leaves_composition_unchanged() {
        let (store, engine, composition) = setup();
        engine.apply_patch(composition.id, "length", "0").unwrap();
        assert_eq!(store.composition(composition.id).unwrap().unwrap(), composition);
    }

    #[test]
    fn test_unknown_field_is_no_op() {
        let (store, engine, composition) = setup();
        let outcome = engine.apply_patch(composition.id, "unknownField", "x").unwrap();
        assert!(!outcome.applied);
        assert_eq!(outcome.reason, Some(NoOpReason::UnknownField));
        assert_eq!(outcome.field, "unknownField");
        assert_eq!(store.composition(composition.id).unwrap().unwrap(), composition);
    }

    #[test]
    fn test_counter_is_not_a_patchable_field() {
        assert_eq!(PatchField::parse("commentCount"), None);
        assert_eq!(PatchField::parse("Title"), None);
        assert_eq!(PatchField::parse("diff"), Some(PatchField::Difficulty));
    }

    #[test]
    fn test_missing_composition_is_not_found() {
        let (_store, engine, _composition) = setup();
        assert!(matches!(
            engine.apply_patch(CompositionId(99), "title", "New"),
            Err(ServiceError::CompositionNotFound(CompositionId(99)))
        ));
    }

    #[test]
    fn test_outcome_serialization() {
        let outcome = PatchOutcome::no_op("foo", NoOpReason::UnknownField);
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["reason"], "unknown-field");
        assert_eq!(json["status"], "noChange");
        assert!(json.get("newValue").is_none());
    }
}
