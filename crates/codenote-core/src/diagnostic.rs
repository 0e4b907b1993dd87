use serde::Serialize;

use crate::error::AnnotationError;
use crate::source_map::Range;

pub const E_MARKER_MALFORMED: &str = "E_MARKER_MALFORMED";
pub const E_MARKER_UNBALANCED: &str = "E_MARKER_UNBALANCED";
pub const E_ID_RANGE: &str = "E_ID_RANGE";
pub const E_NOT_IN_SECTION: &str = "E_NOT_IN_SECTION";
pub const E_BOUNDARY_TAG: &str = "E_BOUNDARY_TAG";
pub const E_HIGHLIGHT_CONTRACT: &str = "E_HIGHLIGHT_CONTRACT";
pub const E_SECTION_NESTED: &str = "E_SECTION_NESTED";

pub const W_DIRECTIVE_UNKNOWN: &str = "W_DIRECTIVE_UNKNOWN";
pub const W_DIRECTIVE_OPTION: &str = "W_DIRECTIVE_OPTION";

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Diagnostic {
    pub range: Range,
    pub severity: DiagnosticSeverity,
    pub code: &'static str,
    pub message: String,
    pub related: Vec<RelatedDiagnostic>,
}

impl Diagnostic {
    pub fn new(
        range: Range,
        severity: DiagnosticSeverity,
        code: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            range,
            severity,
            code,
            message: message.into(),
            related: Vec::new(),
        }
    }

    /// Error diagnostic for a section that failed to render.
    pub fn from_annotation_error(range: Range, error: &AnnotationError) -> Self {
        Self::new(
            range,
            DiagnosticSeverity::Error,
            error.code(),
            error.to_string(),
        )
    }

    pub fn with_related(mut self, related: RelatedDiagnostic) -> Self {
        self.related.push(related);
        self
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSeverity {
    Error,
    Warning,
}

impl DiagnosticSeverity {
    pub fn label(self) -> &'static str {
        match self {
            DiagnosticSeverity::Error => "error",
            DiagnosticSeverity::Warning => "warning",
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct RelatedDiagnostic {
    pub range: Range,
    pub message: Option<String>,
}

impl RelatedDiagnostic {
    pub fn new(range: Range, message: Option<String>) -> Self {
        Self { range, message }
    }
}
