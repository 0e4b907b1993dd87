use thiserror::Error;

use crate::diagnostic::{
    E_BOUNDARY_TAG, E_HIGHLIGHT_CONTRACT, E_ID_RANGE, E_MARKER_MALFORMED, E_MARKER_UNBALANCED,
    E_NOT_IN_SECTION, E_SECTION_NESTED,
};
use crate::interval::{BalanceError, IdRangeError};
use crate::marker::MarkerError;
use crate::overlay::OverlayError;
use crate::token::ShapeError;

/// Everything that aborts an annotated section.
///
/// `section` is the minted section id, or a description of the block when no
/// section is open.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum AnnotationError {
    #[error("malformed annotation marker in {section}: {source}")]
    MalformedMarker {
        section: String,
        source: MarkerError,
    },
    #[error("unbalanced annotation markers in {section}: {source}")]
    UnbalancedMarkers {
        section: String,
        source: BalanceError,
    },
    #[error("mismatching annotation numbers in {section}: {source}")]
    IdRangeMismatch {
        section: String,
        source: IdRangeError,
    },
    #[error("annotation caption is not within an annotated section: {section}")]
    NotInSection { section: String },
    #[error("illegal annotation boundary in {section}: {source}")]
    IllegalBoundaryTag {
        section: String,
        source: OverlayError,
    },
    #[error("highlighter output rejected in {section}: {source}")]
    HighlighterContract {
        section: String,
        source: ShapeError,
    },
    #[error("annotated section cannot be nested inside {section}")]
    NestedSection { section: String },
}

impl AnnotationError {
    pub fn code(&self) -> &'static str {
        match self {
            AnnotationError::MalformedMarker { .. } => E_MARKER_MALFORMED,
            AnnotationError::UnbalancedMarkers { .. } => E_MARKER_UNBALANCED,
            AnnotationError::IdRangeMismatch { .. } => E_ID_RANGE,
            AnnotationError::NotInSection { .. } => E_NOT_IN_SECTION,
            AnnotationError::IllegalBoundaryTag { .. } => E_BOUNDARY_TAG,
            AnnotationError::HighlighterContract { .. } => E_HIGHLIGHT_CONTRACT,
            AnnotationError::NestedSection { .. } => E_SECTION_NESTED,
        }
    }

    pub fn section(&self) -> &str {
        match self {
            AnnotationError::MalformedMarker { section, .. }
            | AnnotationError::UnbalancedMarkers { section, .. }
            | AnnotationError::IdRangeMismatch { section, .. }
            | AnnotationError::NotInSection { section }
            | AnnotationError::IllegalBoundaryTag { section, .. }
            | AnnotationError::HighlighterContract { section, .. }
            | AnnotationError::NestedSection { section } => section,
        }
    }
}
