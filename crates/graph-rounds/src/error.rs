//! Error types shared by the codec, the round rules and the object store
//!
//! Driver and executor errors live in [`crate::rounds::error`].

use thiserror::Error;

use crate::graph::VertexId;

/// A line that does not match the expected record shape
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Malformed record {line:?}: {reason}")]
pub struct FormatError {
    /// The offending line (truncated for very long records)
    pub line: String,
    /// What was wrong with it
    pub reason: String,
}

impl FormatError {
    const MAX_LINE: usize = 120;

    /// Create a format error for a line
    pub fn new(line: &str, reason: impl Into<String>) -> Self {
        let line = if line.len() > Self::MAX_LINE {
            let mut end = Self::MAX_LINE;
            while !line.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}...", &line[..end])
        } else {
            line.to_string()
        };
        Self {
            line,
            reason: reason.into(),
        }
    }

    /// Create a segment-count error
    pub fn arity(line: &str, expected: &str, found: usize) -> Self {
        Self::new(
            line,
            format!("expected {} segments, found {}", expected, found),
        )
    }
}

/// Errors raised by a transform, combine or merge step
#[derive(Debug, Error)]
pub enum RuleError {
    /// Input or intermediate record could not be decoded
    #[error(transparent)]
    Format(#[from] FormatError),

    /// Tokens were addressed to a vertex that has no adjacency record
    #[error("Tokens addressed to vertex {0} which has no record")]
    MissingRecord(VertexId),

    /// More than one adjacency record arrived for the same vertex
    #[error("Duplicate record for vertex {0}")]
    DuplicateRecord(VertexId),

    /// A rule received a key it never emits
    #[error("Unexpected key {key} for rule {rule}")]
    UnexpectedKey { rule: &'static str, key: String },
}

impl RuleError {
    /// Check if the error comes from a malformed record
    pub fn is_format(&self) -> bool {
        matches!(self, RuleError::Format(_))
    }
}

/// Object store errors
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Object already exists: {0}")]
    AlreadyExists(String),
}

#[cfg(test)]
mod tests {
    static_assertions::assert_impl_all!(super::RuleError: Send, Sync);
    use super::*;

    #[test]
    fn test_format_error_display() {
        let err = FormatError::arity("1\t2", "3 or 4", 2);
        assert_eq!(
            err.to_string(),
            "Malformed record \"1\\t2\": expected 3 or 4 segments, found 2"
        );
    }

    #[test]
    fn test_format_error_truncates_long_lines() {
        let line = "9".repeat(500);
        let err = FormatError::new(&line, "too long");
        assert!(err.line.len() < 130);
        assert!(err.line.ends_with("..."));
    }

    #[test]
    fn test_rule_error_from_format() {
        let err: RuleError = FormatError::new("x", "bad").into();
        assert!(err.is_format());
        assert!(!RuleError::MissingRecord(VertexId(3)).is_format());
    }

    #[test]
    fn test_missing_record_display() {
        let err = RuleError::MissingRecord(VertexId(42));
        assert!(err.to_string().contains("42"));
    }
}
