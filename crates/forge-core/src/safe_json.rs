//! Defensive JSON parsing for untrusted payloads
//!
//! Backend response bodies and any other external JSON pass through here
//! before typed decoding. Inputs are bounded in size and nesting depth, and
//! keys that a dynamic consumer could interpret as structural
//! (`__proto__`, `constructor`, `prototype`) are stripped from every object
//! at every depth of the result.
//!
//! Author: hephaex@gmail.com

use serde_json::Value;
use thiserror::Error;

/// Keys that must never survive into a sanitized value.
const STRUCTURAL_KEYS: [&str; 3] = ["__proto__", "constructor", "prototype"];

/// Size and depth bounds for one parse.
#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// Maximum input size in bytes, checked before parsing
    pub max_size_bytes: usize,

    /// Maximum nesting depth of the parsed tree
    pub max_depth: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            max_size_bytes: 1024 * 1024,
            // serde_json refuses to materialize trees deeper than 128
            // levels, so a larger default would never be reachable.
            max_depth: 128,
        }
    }
}

/// Classification of a rejected parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    EmptyInput,
    SizeExceeded,
    SyntaxError,
    DepthExceeded,
}

/// A rejected parse with its classification and a human-readable message.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub message: String,
}

impl ParseError {
    fn new(kind: ParseErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Parse untrusted JSON text under the default bounds.
pub fn safe_parse(text: &str) -> Result<Value, ParseError> {
    safe_parse_with(text, &ParseOptions::default())
}

/// Parse untrusted JSON text under caller-supplied bounds.
///
/// Validation order: empty check, size check, grammar, depth, key
/// stripping. Arrays and scalars are valid top-level documents.
pub fn safe_parse_with(text: &str, options: &ParseOptions) -> Result<Value, ParseError> {
    if text.trim().is_empty() {
        return Err(ParseError::new(
            ParseErrorKind::EmptyInput,
            "input is empty or whitespace-only",
        ));
    }

    if text.len() > options.max_size_bytes {
        return Err(ParseError::new(
            ParseErrorKind::SizeExceeded,
            format!(
                "input is {} bytes, limit is {} bytes",
                text.len(),
                options.max_size_bytes
            ),
        ));
    }

    let value: Value = serde_json::from_str(text).map_err(|e| {
        let message = e.to_string();
        // serde_json reports its own 128-level guard as a syntax error;
        // classify it as a depth rejection so callers see one kind.
        if message.contains("recursion limit") {
            ParseError::new(
                ParseErrorKind::DepthExceeded,
                "input nesting exceeds the maximum parseable depth",
            )
        } else {
            ParseError::new(
                ParseErrorKind::SyntaxError,
                format!("invalid JSON: {message}"),
            )
        }
    })?;

    let depth = depth_of(&value);
    if depth > options.max_depth {
        return Err(ParseError::new(
            ParseErrorKind::DepthExceeded,
            format!("nesting depth {depth} exceeds limit {}", options.max_depth),
        ));
    }

    Ok(sanitize(value))
}

/// Nesting depth of a parsed tree; scalars are depth 1.
fn depth_of(value: &Value) -> usize {
    match value {
        Value::Object(map) => 1 + map.values().map(depth_of).max().unwrap_or(0),
        Value::Array(items) => 1 + items.iter().map(depth_of).max().unwrap_or(0),
        _ => 1,
    }
}

/// Strip structural keys from every object at every depth.
fn sanitize(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(key, _)| !STRUCTURAL_KEYS.contains(&key.as_str()))
                .map(|(key, inner)| (key, sanitize(inner)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(sanitize).collect()),
        scalar => scalar,
    }
}

// ============================================================================
// Tests
// ============================================================================
