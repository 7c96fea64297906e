//! Field validators for compositions and comments.
//!
//! Every composition attribute has exactly one rule:
//!
//! | field    | rule                                    |
//! |----------|-----------------------------------------|
//! | `title`  | non-empty, at most 50 characters        |
//! | `author` | non-empty, at most 50 characters        |
//! | `length` | integer in `1..=36000` (seconds)        |
//! | `year`   | integer in `1..=9999`                   |
//! | `diff`   | integer in `0..=2`                      |
//! | `pages`  | integer in `0..=20`                     |
//! | `video`  | matches `^https://www\.youtube\.com/\S+$` |
//! | `sheet`  | non-empty                               |
//!
//! "Empty" means empty or whitespace only. Lengths count characters, not
//! bytes. The same rules back composition creation ([`validate_composition`])
//! and single-field patches ([`crate::services::patch`]).

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{ValidationError, ValidationResult};
use crate::models::{CompositionDraft, Difficulty, NewComposition, UserId};

pub const TITLE_MAX_CHARS: usize = 50;
pub const AUTHOR_MAX_CHARS: usize = 50;
pub const LENGTH_RANGE: (i64, i64) = (1, 36_000);
pub const YEAR_RANGE: (i64, i64) = (1, 9_999);
pub const DIFFICULTY_RANGE: (i64, i64) = (0, 2);
pub const PAGES_RANGE: (i64, i64) = (0, 20);

/// Default upper bound for comment content, in characters.
pub const DEFAULT_COMMENT_MAX_CHARS: usize = 1_000;

static YOUTUBE_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^https://www\.youtube\.com/\S+$").expect("Invalid embedded video pattern")
});

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

/// Non-blank text of at most `max` characters.
pub fn bounded_text(field: &'static str, value: &str, max: usize) -> ValidationResult<String> {
    if is_blank(value) {
        return Err(ValidationError::Empty { field });
    }
    if value.chars().count() > max {
        return Err(ValidationError::TooLong { field, max });
    }
    Ok(value.to_string())
}

/// Non-blank text with no length bound.
pub fn required_text(field: &'static str, value: &str) -> ValidationResult<String> {
    if is_blank(value) {
        return Err(ValidationError::Empty { field });
    }
    Ok(value.to_string())
}

/// Integer inside the inclusive `(min, max)` range.
pub fn ranged(field: &'static str, value: i64, (min, max): (i64, i64)) -> ValidationResult<i64> {
    if value < min || value > max {
        return Err(ValidationError::OutOfRange { field, min, max });
    }
    Ok(value)
}

/// Parse `raw` as an integer, then check the range.
///
/// Surrounding whitespace is not accepted.
pub fn parse_ranged(field: &'static str, raw: &str, range: (i64, i64)) -> ValidationResult<i64> {
    let value = raw
        .parse::<i64>()
        .map_err(|_| ValidationError::NotANumber { field })?;
    ranged(field, value, range)
}

/// A `https://www.youtube.com/...` link.
pub fn youtube_url(field: &'static str, value: &str) -> ValidationResult<String> {
    if YOUTUBE_URL.is_match(value) {
        Ok(value.to_string())
    } else {
        Err(ValidationError::Pattern { field })
    }
}

pub fn difficulty(field: &'static str, value: i64) -> ValidationResult<Difficulty> {
    let level = ranged(field, value, DIFFICULTY_RANGE)?;
    Difficulty::from_level(level).ok_or(ValidationError::OutOfRange {
        field,
        min: DIFFICULTY_RANGE.0,
        max: DIFFICULTY_RANGE.1,
    })
}

/// Comment content: non-blank and at most `max_chars` characters.
pub fn comment_content(content: &str, max_chars: usize) -> ValidationResult<String> {
    bounded_text("content", content, max_chars)
}

/// Validate every field of a creation request.
///
/// All failing fields are reported together in
/// [`ValidationError::Fields`].
pub fn validate_composition(
    draft: &CompositionDraft,
    adder_id: UserId,
) -> ValidationResult<NewComposition> {
    let mut errors = Vec::new();

    let title = collect(bounded_text("title", &draft.title, TITLE_MAX_CHARS), &mut errors);
    let author = collect(bounded_text("author", &draft.author, AUTHOR_MAX_CHARS), &mut errors);
    let length = collect(ranged("length", draft.length, LENGTH_RANGE), &mut errors);
    let year = collect(ranged("year", draft.year, YEAR_RANGE), &mut errors);
    let diff = collect(difficulty("diff", draft.diff), &mut errors);
    let pages = collect(ranged("pages", draft.pages, PAGES_RANGE), &mut errors);
    let video = collect(youtube_url("video", &draft.video), &mut errors);
    let sheet = collect(required_text("sheet", &draft.sheet), &mut errors);

    match (title, author, length, year, diff, pages, video, sheet) {
        (
            Some(title),
            Some(author),
            Some(length),
            Some(year),
            Some(difficulty),
            Some(pages),
            Some(video_url),
            Some(sheet_url),
        ) if errors.is_empty() => Ok(NewComposition {
            title,
            author,
            // the ranges above keep these conversions lossless
            length_seconds: length as u32,
            year: year as u16,
            difficulty,
            page_count: pages as u8,
            video_url,
            sheet_url,
            adder_id,
        }),
        _ => Err(ValidationError::Fields(errors)),
    }
}

fn collect<T>(result: ValidationResult<T>, errors: &mut Vec<ValidationError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(err) => {
            errors.push(err);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn valid_draft() -> CompositionDraft {
        CompositionDraft {
            title: "Gymnopédie No. 1".into(),
            author: "Erik Satie".into(),
            length: 210,
            year: 1888,
            diff: 0,
            pages: 3,
            video: "https://www.youtube.com/watch?v=S-Xm7s9eGxU".into(),
            sheet: "https://imslp.org/gymnopedie.pdf".into(),
        }
    }

    #[test]
    fn test_valid_draft_passes() {
        let new = validate_composition(&valid_draft(), UserId(5)).unwrap();
        assert_eq!(new.title, "Gymnopédie No. 1");
        assert_eq!(new.length_seconds, 210);
        assert_eq!(new.difficulty, Difficulty::Beginner);
        assert_eq!(new.adder_id, UserId(5));
    }

    #[test]
    fn test_every_failing_field_is_reported() {
        let draft = CompositionDraft {
            title: "   ".into(),
            pages: 21,
            video: "http://youtube.com/x".into(),
            ..valid_draft()
        };
        let Err(ValidationError::Fields(errors)) = validate_composition(&draft, UserId(1)) else {
            panic!("expected a Fields error");
        };
        let fields: Vec<_> = errors.iter().filter_map(ValidationError::field).collect();
        assert_eq!(fields, vec!["title", "pages", "video"]);
    }

    #[test]
    fn test_title_length_counts_characters() {
        let fifty = "é".repeat(50);
        assert!(bounded_text("title", &fifty, TITLE_MAX_CHARS).is_ok());
        let fifty_one = "é".repeat(51);
        assert_eq!(
            bounded_text("title", &fifty_one, TITLE_MAX_CHARS),
            Err(ValidationError::TooLong { field: "title", max: 50 })
        );
    }

    #[rstest]
    #[case("0", false)]
    #[case("1", true)]
    #[case("36000", true)]
    #[case("36001", false)]
    #[case("abc", false)]
    #[case(" 5", false)]
    fn test_length_bounds(#[case] raw: &str, #[case] ok: bool) {
        assert_eq!(parse_ranged("length", raw, LENGTH_RANGE).is_ok(), ok);
    }

    #[test]
    fn test_non_numeric_is_not_a_number() {
        assert_eq!(
            parse_ranged("year", "nineteen", YEAR_RANGE),
            Err(ValidationError::NotANumber { field: "year" })
        );
    }

    #[rstest]
    #[case("https://www.youtube.com/watch?v=abc", true)]
    #[case("https://www.youtube.com/", false)]
    #[case("https://youtube.com/watch?v=abc", false)]
    #[case("http://www.youtube.com/watch?v=abc", false)]
    #[case("https://www.youtube.com/watch?v=a b", false)]
    fn test_video_pattern(#[case] url: &str, #[case] ok: bool) {
        assert_eq!(youtube_url("video", url).is_ok(), ok);
    }

    #[test]
    fn test_comment_content() {
        assert!(comment_content("Lovely piece", 20).is_ok());
        assert_eq!(
            comment_content("\n\t", 20),
            Err(ValidationError::Empty { field: "content" })
        );
        assert!(comment_content(&"x".repeat(21), 20).is_err());
    }
}
