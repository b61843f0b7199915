//! Strict extraction and parsing of list-shaped backend replies
//!
//! Backend replies are data, never code. A reply is accepted only when its
//! payload is a YAML/JSON sequence whose entries are all non-blank strings.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ListParseError {
    #[error("reply is empty")]
    Empty,
    #[error("reply is not valid YAML/JSON: {0}")]
    Syntax(String),
    #[error("expected a list of strings, got {0}")]
    NotAList(&'static str),
    #[error("entry {index} is {kind}, expected a string")]
    NonStringEntry { index: usize, kind: &'static str },
    #[error("entry {0} is blank")]
    BlankEntry(usize),
}

/// Extract the payload from a fenced code block, or the whole reply if unfenced
///
/// Handles:
/// - ```yaml / ```json / ```python blocks (any language tag)
/// - Generic ``` blocks
/// - Raw text
/// - Removes leading document separator (---)
pub fn extract_block(text: &str) -> String {
    let block = match text.find("```") {
        Some(open) => {
            let after_fence = &text[open + 3..];
            // Skip the language tag line
            let body_start = after_fence.find('\n').map(|pos| pos + 1).unwrap_or(0);
            let body = &after_fence[body_start..];
            let body_end = body.find("```").unwrap_or(body.len());
            body[..body_end].trim().to_string()
        }
        None => text.trim().to_string(),
    };

    clean_block(&block)
}

/// Remove a leading `---` document separator and surrounding whitespace
pub fn clean_block(block: &str) -> String {
    block.trim_start_matches("---").trim().to_string()
}

fn kind_of(value: &serde_yaml::Value) -> &'static str {
    match value {
        serde_yaml::Value::Null => "null",
        serde_yaml::Value::Bool(_) => "a boolean",
        serde_yaml::Value::Number(_) => "a number",
        serde_yaml::Value::String(_) => "a string",
        serde_yaml::Value::Sequence(_) => "a list",
        serde_yaml::Value::Mapping(_) => "a mapping",
        serde_yaml::Value::Tagged(_) => "a tagged value",
    }
}

/// Parse a reply into an ordered list of trimmed strings
///
/// Accepts JSON arrays, YAML flow sequences (`["a", 'b']`) and YAML block
/// sequences (`- a`). Anything else is rejected.
pub fn parse_string_list(text: &str) -> Result<Vec<String>, ListParseError> {
    let payload = extract_block(text);
    if payload.is_empty() {
        return Err(ListParseError::Empty);
    }

    let value: serde_yaml::Value =
        serde_yaml::from_str(&payload).map_err(|e| ListParseError::Syntax(e.to_string()))?;

    let entries = match value {
        serde_yaml::Value::Sequence(entries) => entries,
        other => return Err(ListParseError::NotAList(kind_of(&other))),
    };

    entries
        .into_iter()
        .enumerate()
        .map(|(index, entry)| match entry {
            serde_yaml::Value::String(s) if s.trim().is_empty() => {
                Err(ListParseError::BlankEntry(index))
            }
            serde_yaml::Value::String(s) => Ok(s.trim().to_string()),
            other => Err(ListParseError::NonStringEntry {
                index,
                kind: kind_of(&other),
            }),
        })
        .collect()
}
