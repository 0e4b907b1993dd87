mod ast;
mod diagnostic;
mod emit;
mod error;
mod highlight;
mod interval;
mod marker;
mod overlay;
mod parser;
mod section;
mod source_map;
mod span;
mod token;

use std::path::Path;

pub use ast::{Block, BlockKind, Caption, CodeBlock, Document};
pub use diagnostic::{
    Diagnostic, DiagnosticSeverity, E_BOUNDARY_TAG, E_HIGHLIGHT_CONTRACT, E_ID_RANGE,
    E_MARKER_MALFORMED, E_MARKER_UNBALANCED, E_NOT_IN_SECTION, E_SECTION_NESTED,
    RelatedDiagnostic, W_DIRECTIVE_OPTION, W_DIRECTIVE_UNKNOWN,
};
pub use emit::{
    EmitContext, EmitOptions, EmitResult, annotate_code, annotate_text, emit_html,
    emit_html_sanitized, escape_attr, sanitize_html,
};
pub use error::AnnotationError;
pub use highlight::{
    HighlightError, HighlightedBlock, Highlighter, PlainHighlighter, delegate, split_envelope,
};
pub use interval::{
    AnnotationInterval, BalanceError, IdRangeError, build_intervals, validate_id_range,
};
pub use marker::{
    CLOSE_GLYPH, MalformedReason, Marker, MarkerError, MarkerEvent, OPEN_GLYPH, ScannedLine,
    ScannedText, contains_marker_glyph, scan_line, scan_text,
};
pub use overlay::{AnnotationTags, OverlayError, overlay, overlay_plain};
pub use parser::{ParseResult, parse};
pub use section::{BuildContext, SectionContext, SectionRegistry, SectionState};
pub use source_map::{Position, Range, SourceMap};
pub use span::Span;
pub use token::{ShapeError, TokenStreamItem, check_nesting, text_units, tokenize};

/// Parses and renders one document in a single call.
///
/// Parser warnings come first in the returned diagnostics, followed by
/// everything the emitter reported.
pub fn render(
    source: &str,
    source_path: &Path,
    highlighter: &dyn Highlighter,
    options: &EmitOptions,
    registry: &mut SectionRegistry,
) -> EmitResult {
    let parsed = parse(source);
    let cx = EmitContext {
        source_map: &parsed.source_map,
        source_path,
        highlighter,
        options,
    };
    let mut result = emit_html(&parsed.document, &cx, registry);
    let mut diagnostics = parsed.diagnostics;
    diagnostics.append(&mut result.diagnostics);
    result.diagnostics = diagnostics;
    result
}
