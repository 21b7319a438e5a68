//! Error handling for EngraveKit.
//!
//! One taxonomy covers the whole engine:
//! - Parse errors from the import streams (recoverable, skip and count)
//! - Unsupported entities in SVG/DXF input (skip with a diagnostic)
//! - Command precondition failures (no-op, no checkpoint)
//! - Degenerate geometry handed to a derivation algorithm
//! - Stale focus ids after undo/redo (fall back to the root)
//!
//! All error types use `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Engine error type.
#[derive(Error, Debug)]
pub enum DesignError {
    /// Malformed token or number in an import stream.
    ///
    /// Importers recover by skipping the offending token or entity and
    /// continuing; the skip count is surfaced to the caller.
    #[error("parse error at line {line}: {reason}")]
    Parse {
        /// 1-based line number in the source stream.
        line: usize,
        /// What could not be parsed.
        reason: String,
    },

    /// SVG/DXF construct with no mapping into the document model.
    #[error("unsupported entity: {entity}")]
    UnsupportedEntity {
        /// The entity or tag name that was skipped.
        entity: String,
    },

    /// Command preconditions unmet (e.g. fewer than 2 selected items,
    /// or an open path passed to pocketing).
    #[error("invalid operation: {reason}")]
    InvalidOperation {
        /// Why the command was rejected.
        reason: String,
    },

    /// Input too small or collapsed for a derivation algorithm.
    #[error("degenerate geometry: {reason}")]
    DegenerateGeometry {
        /// Why the geometry cannot be processed.
        reason: String,
    },

    /// Undo/redo focus target no longer present in the document.
    #[error("stale focus id {id}")]
    StaleFocus {
        /// The element id that could not be re-located.
        id: u64,
    },

    /// Standard I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DesignError {
    /// Create an `InvalidOperation` error from a message.
    pub fn invalid(reason: impl Into<String>) -> Self {
        DesignError::InvalidOperation {
            reason: reason.into(),
        }
    }

    /// Create a `DegenerateGeometry` error from a message.
    pub fn degenerate(reason: impl Into<String>) -> Self {
        DesignError::DegenerateGeometry {
            reason: reason.into(),
        }
    }

    /// True for errors that importers recover from by skipping.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            DesignError::Parse { .. } | DesignError::UnsupportedEntity { .. }
        )
    }
}

/// Result type using `DesignError`.
pub type Result<T> = std::result::Result<T, DesignError>;
