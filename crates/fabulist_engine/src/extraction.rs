//! Result Parser: pulls JSON out of provider text and decodes it.
//!
//! Provider output often wraps the requested JSON in markdown code fences or
//! surrounds it with prose. [`clean`] strips that wrapping and [`parse`]
//! decodes the result into one of the documented shapes.

use fabulist_core::{ParsedContent, RoleDetail, StoryOutline, StoryboardDraft};
use fabulist_error::{FabulistResult, ParseError, ParseErrorKind};
use serde::de::DeserializeOwned;

/// Shape a cleaned payload is decoded into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum TargetShape {
    /// `{name_and_theme, chapters[]}`
    StoryOutline,
    /// `{chapter_summary, chapter_detail[]}`
    StoryboardDraft,
    /// `{name, background, personality, ...}`
    RoleDetail,
}

/// Strip provider wrapping from raw output.
///
/// Tries, repeatedly until nothing changes:
/// 1. Markdown code blocks: ```json ... ```
/// 2. The first balanced `{ ... }` or `[ ... ]`
///
/// A balanced structure wins over a fence that sits inside it.
/// Text with neither comes back trimmed. Every step keeps a substring of its
/// input, so `clean(clean(x)) == clean(x)`.
///
/// # Examples
///
/// ```
/// use fabulist_engine::extraction::clean;
///
/// let raw = "Here you go:\n```json\n{\"id\": 1}\n```\nEnjoy!";
/// assert_eq!(clean(raw), "{\"id\": 1}");
/// ```
pub fn clean(raw: &str) -> String {
    let mut current = raw.trim();
    loop {
        let next = clean_step(current);
        if next == current {
            return current.to_string();
        }
        current = next;
    }
}

fn clean_step(text: &str) -> &str {
    let text = text.trim();
    let structure = first_structure(text);
    let Some(fence) = text.find("```") else {
        return structure.map_or(text, |(_, found)| found);
    };

    // A structure that encloses the fence is JSON quoting backticks.
    if let Some((start, found)) = structure {
        if start < fence && start + found.len() > fence {
            return found;
        }
    }
    match fenced_block(text).map(str::trim) {
        Some(inner) if !inner.is_empty() => inner,
        _ => structure.map_or(text, |(_, found)| found),
    }
}

/// Content of the first markdown code block.
///
/// Looks for patterns like:
/// - ```language\n...\n```
/// - ``` ... ``` (no language specified)
///
/// An unclosed fence (truncated response) yields everything after it.
fn fenced_block(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let content_start = start + 3;
    let rest = &text[content_start..];

    // Skip the language tag, if the opening line carries one.
    let body_start = match rest.find('\n') {
        Some(newline) if is_language_tag(&rest[..newline]) => content_start + newline + 1,
        _ => content_start,
    };

    match text[body_start..].find("```") {
        Some(end) => Some(&text[body_start..body_start + end]),
        None => Some(&text[body_start..]),
    }
}

fn is_language_tag(line: &str) -> bool {
    line.trim()
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// The first balanced object or array, preferring whichever opens first.
fn first_structure(text: &str) -> Option<(usize, &str)> {
    let brace = text.find('{');
    let bracket = text.find('[');
    match (brace, bracket) {
        (Some(b), Some(k)) if k < b => {
            extract_balanced(text, '[', ']').or_else(|| extract_balanced(text, '{', '}'))
        }
        (None, Some(_)) => extract_balanced(text, '[', ']'),
        _ => extract_balanced(text, '{', '}').or_else(|| extract_balanced(text, '[', ']')),
    }
}

/// Start offset and content between balanced delimiters, from the first `open`.
///
/// Delimiters inside JSON strings are ignored.
fn extract_balanced(text: &str, open: char, close: char) -> Option<(usize, &str)> {
    let start = text.find(open)?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, ch) in text[start..].char_indices() {
        if in_string {
            if escape_next {
                escape_next = false;
            } else if ch == '\\' {
                escape_next = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            c if c == open => depth += 1,
            c if c == close => {
                depth -= 1;
                if depth == 0 {
                    return Some((start, &text[start..start + i + c.len_utf8()]));
                }
            }
            _ => {}
        }
    }

    None
}

/// Decode cleaned JSON into `shape`.
///
/// Missing keys decode to empty defaults. Text that is not JSON fails with
/// `ParseErrorKind::InvalidJson`; JSON of the wrong structure fails with
/// `ParseErrorKind::SchemaMismatch`.
///
/// # Examples
///
/// ```
/// use fabulist_engine::extraction::{TargetShape, clean, parse};
///
/// let raw = "```json\n{\"name_and_theme\": \"Tides: loss\"}\n```";
/// let parsed = parse(&clean(raw), TargetShape::StoryOutline).unwrap();
/// # let _ = parsed;
/// ```
#[tracing::instrument(skip(json_text, shape), fields(shape = %shape, len = json_text.len()))]
pub fn parse(json_text: &str, shape: TargetShape) -> FabulistResult<ParsedContent> {
    let value: serde_json::Value = serde_json::from_str(json_text).map_err(|e| {
        log_failure(json_text, &e.to_string());
        ParseError::new(ParseErrorKind::InvalidJson(e.to_string()))
    })?;

    if !value.is_object() {
        let message = format!("expected a JSON object, found {}", json_kind(&value));
        log_failure(json_text, &message);
        return Err(ParseError::new(ParseErrorKind::SchemaMismatch {
            shape: shape.to_string(),
            message,
        })
        .into());
    }

    Ok(match shape {
        TargetShape::StoryOutline => {
            ParsedContent::Story(decode::<StoryOutline>(value, shape, json_text)?)
        }
        TargetShape::StoryboardDraft => {
            ParsedContent::Storyboard(decode::<StoryboardDraft>(value, shape, json_text)?)
        }
        TargetShape::RoleDetail => {
            ParsedContent::Role(decode::<RoleDetail>(value, shape, json_text)?)
        }
    })
}

fn decode<T: DeserializeOwned>(
    value: serde_json::Value,
    shape: TargetShape,
    json_text: &str,
) -> Result<T, ParseError> {
    serde_json::from_value(value).map_err(|e| {
        log_failure(json_text, &e.to_string());
        ParseError::new(ParseErrorKind::SchemaMismatch {
            shape: shape.to_string(),
            message: e.to_string(),
        })
    })
}

fn log_failure(json_text: &str, error: &str) {
    let preview = json_text.chars().take(100).collect::<String>();
    tracing::error!(error, json_preview = %preview, "Provider output did not decode");
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_strips_fences() {
        let raw = "```json\n{\"chapter_summary\": \"x\"}\n```";
        assert_eq!(clean(raw), "{\"chapter_summary\": \"x\"}");
    }

    #[test]
    fn test_clean_strips_prose() {
        let raw = "Sure! Here it is: {\"id\": 456, \"nested\": {\"value\": \"}\"}} Hope it helps.";
        assert_eq!(clean(raw), "{\"id\": 456, \"nested\": {\"value\": \"}\"}}");
    }

    #[test]
    fn test_clean_fence_on_one_line() {
        let raw = "```json {\"a\": 1}```";
        assert_eq!(clean(raw), "{\"a\": 1}");
    }

    #[test]
    fn test_clean_unclosed_fence() {
        let raw = "```json\n{\"a\": [1, 2]}";
        assert_eq!(clean(raw), "{\"a\": [1, 2]}");
    }

    #[test]
    fn test_clean_prefers_first_opener() {
        assert_eq!(clean("list: [1, {\"a\": 2}]"), "[1, {\"a\": 2}]");
        assert_eq!(clean("obj: {\"a\": [1]} [2]"), "{\"a\": [1]}");
    }

    #[test]
    fn test_clean_plain_text_is_trimmed() {
        assert_eq!(clean("  no json here \n"), "no json here");
    }

    #[test]
    fn test_clean_is_idempotent() {
        let samples = [
            "```json\n{\"a\": 1}\n```",
            "prefix {\"a\": \"```\"} suffix",
            "```\n```json\n{}\n```\n```",
            "{ unbalanced",
            "   ",
            "text [1, 2",
            "```python\nprint('x')\n```",
            "{\"s\": \"escaped \\\" quote }\"}",
        ];
        for sample in samples {
            let once = clean(sample);
            assert_eq!(clean(&once), once, "not idempotent for {:?}", sample);
        }
    }

    #[test]
    fn test_parse_full_storyboard() {
        let json = r#"{
            "chapter_summary": {"title": "Storm", "summary": "A storm arrives"},
            "chapter_detail": [
                {"scene_id": "1", "content": "Rain.", "characters": ["Mira"], "image_prompt": "rain on glass"},
                {"scene_id": 2, "content": "Thunder.", "characters": "Mira, Tomas", "image_prompt": "lightning"}
            ]
        }"#;
        let parsed = parse(json, TargetShape::StoryboardDraft).unwrap();
        let draft = parsed.as_storyboard().unwrap();
        assert_eq!(draft.chapter_summary.title, "Storm");
        assert_eq!(draft.chapter_detail.scenes.len(), 2);
        assert_eq!(draft.chapter_detail.scenes[1].scene_id, "2");
        assert_eq!(draft.chapter_detail.scenes[1].characters, vec!["Mira", "Tomas"]);
        assert_eq!(draft.chapter_detail.scenes[0].image_prompt, "rain on glass");
    }

    #[test]
    fn test_parse_missing_keys_default() {
        let parsed = parse("{}", TargetShape::StoryboardDraft).unwrap();
        let draft = parsed.as_storyboard().unwrap();
        assert!(draft.chapter_detail.scenes.is_empty());
        assert!(draft.chapter_summary.summary.is_empty());

        let parsed = parse(r#"{"chapters": [{"title": "One"}]}"#, TargetShape::StoryOutline).unwrap();
        match parsed {
            ParsedContent::Story(outline) => {
                assert!(outline.name_and_theme.is_empty());
                assert_eq!(outline.chapters[0].title, "One");
                assert!(outline.chapters[0].summary.is_empty());
            }
            other => panic!("unexpected shape: {:?}", other),
        }
    }

    #[test]
    fn test_parse_explicit_nulls_default() {
        let raw = r#"```json
{"chapter_summary": null, "chapter_detail": null}
```"#;
        let parsed = parse(&clean(raw), TargetShape::StoryboardDraft).unwrap();
        let draft = parsed.as_storyboard().unwrap();
        assert!(draft.chapter_summary.summary.is_empty());
        assert!(draft.chapter_detail.scenes.is_empty());

        let json = r#"{"chapter_summary": "Fog", "chapter_detail": [
            {"scene_id": 1, "content": null, "characters": null, "image_prompt": null}
        ]}"#;
        let parsed = parse(json, TargetShape::StoryboardDraft).unwrap();
        let scene = &parsed.as_storyboard().unwrap().chapter_detail.scenes[0];
        assert_eq!(scene.scene_id, "1");
        assert!(scene.content.is_empty());
        assert!(scene.characters.is_empty());
        assert!(scene.image_prompt.is_empty());

        let parsed = parse(r#"{"name": "Mira", "goals": null}"#, TargetShape::RoleDetail).unwrap();
        match parsed {
            ParsedContent::Role(detail) => {
                assert_eq!(detail.name, "Mira");
                assert!(detail.goals.is_empty());
            }
            other => panic!("unexpected shape: {:?}", other),
        }
    }

    #[test]
    fn test_parse_rejects_non_json() {
        let err = parse("the provider apologised", TargetShape::StoryOutline).unwrap_err();
        assert_eq!(err.code(), "parse.invalid_json");
        assert!(err.is_generation_failure());
    }

    #[test]
    fn test_parse_rejects_wrong_structure() {
        let err = parse("[1, 2]", TargetShape::RoleDetail).unwrap_err();
        assert_eq!(err.code(), "parse.schema_mismatch");

        let err = parse(r#"{"chapter_detail": 7}"#, TargetShape::StoryboardDraft).unwrap_err();
        assert_eq!(err.code(), "parse.schema_mismatch");
    }

    #[test]
    fn test_parse_role_keeps_unknown_keys() {
        let parsed = parse(
            r#"{"name": "Mira", "personality": "wry", "catchphrase": "Down we go"}"#,
            TargetShape::RoleDetail,
        )
        .unwrap();
        match parsed {
            ParsedContent::Role(detail) => {
                assert_eq!(detail.personality, "wry");
                assert!(detail.background.is_empty());
                assert_eq!(
                    detail.extra.get("catchphrase"),
                    Some(&serde_json::json!("Down we go"))
                );
            }
            other => panic!("unexpected shape: {:?}", other),
        }
    }
}
