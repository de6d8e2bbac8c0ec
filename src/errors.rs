//! Error types shared across the engine.

use crate::document::NodeId;

/// Result type defaulting to [`Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors surfaced by the document model, configuration and presentation setters.
///
/// Segmentation and correction-payload failures are recovered where they happen.
/// They only show up here through `Segmenter::try_segment` and
/// `CorrectionStore::parse_payload`.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("node {0:?} does not exist in this document")]
    UnknownNode(NodeId),

    #[error("node {0:?} is not an element")]
    NotAnElement(NodeId),

    #[error("node {0:?} is not a text node")]
    NotText(NodeId),

    #[error("inserting {child:?} under {parent:?} would create a cycle")]
    HierarchyCycle { parent: NodeId, child: NodeId },

    #[error("{reference:?} is not a child of {parent:?}")]
    NotAChild { parent: NodeId, reference: NodeId },

    #[error("invalid presentation value: {0}")]
    InvalidPresentation(String),

    #[error(transparent)]
    Segment(#[from] SegmentError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Failure reported by a word breaker.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SegmentError {
    #[error("{breaker}: boundaries do not tile the input (gap or overlap at byte {at})")]
    Discontiguous { breaker: &'static str, at: usize },

    #[error("{breaker}: byte {at} is not a char boundary")]
    NotCharBoundary { breaker: &'static str, at: usize },

    #[error("{breaker}: segmentation stopped at byte {at} of {len}")]
    Incomplete {
        breaker: &'static str,
        at: usize,
        len: usize,
    },

    #[error("{breaker}: {reason}")]
    Failed {
        breaker: &'static str,
        reason: String,
    },
}
