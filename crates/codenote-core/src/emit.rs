use crate::ast::{Block, BlockKind, Caption, CodeBlock, Document};
use crate::diagnostic::{
    Diagnostic, DiagnosticSeverity, E_HIGHLIGHT_CONTRACT, RelatedDiagnostic,
};
use crate::error::AnnotationError;
use crate::highlight::{Highlighter, PlainHighlighter, delegate};
use crate::interval::{BalanceError, build_intervals, validate_id_range};
use crate::marker::{MalformedReason, MarkerError, scan_text};
use crate::overlay::{AnnotationTags, overlay, overlay_plain};
use crate::section::{BuildContext, SectionRegistry};
use crate::source_map::{Position, SourceMap};
use crate::span::Span;
use ammonia::Builder;
use serde::Deserialize;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::Path;

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EmitOptions {
    /// Run the final fragment through the sanitizer allow-list.
    pub sanitize: bool,
    /// Leave a visible error box where a failed section would have been.
    pub show_errors: bool,
}

/// Everything `emit_html` needs besides the document and the id registry.
#[derive(Clone, Copy)]
pub struct EmitContext<'a> {
    pub source_map: &'a SourceMap,
    pub source_path: &'a Path,
    pub highlighter: &'a dyn Highlighter,
    pub options: &'a EmitOptions,
}

#[derive(Clone, Debug, Default)]
pub struct EmitResult {
    pub html: String,
    pub diagnostics: Vec<Diagnostic>,
}

impl EmitResult {
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|diag| diag.severity == DiagnosticSeverity::Error)
    }
}

/// Renders a document. A failing annotated section produces no output and an
/// error diagnostic; its siblings still render.
pub fn emit_html(
    document: &Document,
    cx: &EmitContext<'_>,
    registry: &mut SectionRegistry,
) -> EmitResult {
    // Deterministic formatting: 2-space indentation and LF newlines.
    let mut writer = HtmlWriter::new();
    let mut diagnostics = Vec::new();
    let mut build = BuildContext::new(registry, cx.source_path);
    for block in &document.blocks {
        emit_block(&mut writer, block, cx, &mut build, &mut diagnostics);
    }
    let mut html = writer.finish();
    if cx.options.sanitize {
        html = sanitize_html(&html);
    }
    EmitResult { html, diagnostics }
}

/// Like [`emit_html`], always sanitized.
pub fn emit_html_sanitized(
    document: &Document,
    cx: &EmitContext<'_>,
    registry: &mut SectionRegistry,
) -> EmitResult {
    let options = EmitOptions {
        sanitize: true,
        ..cx.options.clone()
    };
    let cx = EmitContext {
        options: &options,
        ..*cx
    };
    emit_html(document, &cx, registry)
}

/// Cleans HTML against an allow-list covering what the emitter and the
/// highlighters produce.
pub fn sanitize_html(html: &str) -> String {
    let tags: HashSet<&'static str> = [
        "b", "code", "div", "em", "i", "p", "pre", "span", "strong", "u",
    ]
    .iter()
    .copied()
    .collect();

    let mut generic_attributes: HashSet<&'static str> = HashSet::new();
    generic_attributes.insert("class");

    // Inline styles come from the syntax highlighter.
    let mut tag_attributes = HashMap::new();
    tag_attributes.insert("span", ["style"].iter().copied().collect());
    tag_attributes.insert("pre", ["style"].iter().copied().collect());

    Builder::new()
        .tags(tags)
        .generic_attributes(generic_attributes)
        .tag_attributes(tag_attributes)
        .clean(html)
        .to_string()
}

struct HtmlWriter {
    out: String,
    indent: usize,
}

impl HtmlWriter {
    fn new() -> Self {
        Self {
            out: String::new(),
            indent: 0,
        }
    }

    fn line(&mut self, line: &str) {
        for _ in 0..self.indent {
            self.out.push_str("  ");
        }
        self.out.push_str(line);
        self.out.push('\n');
    }

    /// Writes a preformatted fragment without indenting it.
    fn raw(&mut self, html: &str) {
        self.out.push_str(html);
        if !html.ends_with('\n') {
            self.out.push('\n');
        }
    }

    fn finish(mut self) -> String {
        if self.out.ends_with('\n') {
            self.out.pop();
        }
        self.out
    }
}

struct SectionFailure {
    error: AnnotationError,
    span: Span,
    /// The offending marker, when the error points at one.
    marker: Option<Span>,
}

fn emit_block(
    writer: &mut HtmlWriter,
    block: &Block,
    cx: &EmitContext<'_>,
    build: &mut BuildContext<'_>,
    diagnostics: &mut Vec<Diagnostic>,
) {
    match &block.kind {
        BlockKind::Paragraph { text } => {
            writer.line(&format!("<p>{}</p>", escape_html(text)));
        }
        BlockKind::CodeBlock(CodeBlock { lang, text }) => {
            match cx.highlighter.highlight(text, lang) {
                Ok(html) => writer.raw(&html),
                Err(err) => {
                    diagnostics.push(Diagnostic::new(
                        cx.source_map.range(block.span),
                        DiagnosticSeverity::Error,
                        E_HIGHLIGHT_CONTRACT,
                        err.to_string(),
                    ));
                    if let Ok(html) = PlainHighlighter.highlight(text, lang) {
                        writer.raw(&html);
                    }
                }
            }
        }
        BlockKind::Annotation(_) => {
            let range = cx.source_map.range(block.span);
            let context = format!("annotation at line {}", range.start.line + 1);
            if let Err(err) = build.section.record_caption(&context) {
                diagnostics.push(Diagnostic::from_annotation_error(range, &err));
            }
        }
        BlockKind::Annotated { blocks } => match emit_section(block, blocks, cx, build) {
            Ok(html) => writer.raw(&html),
            Err(SectionFailure {
                error,
                span,
                marker,
            }) => {
                build.section.abort();
                // Reported through the diagnostics; logging it louder would
                // interleave with them on stderr.
                tracing::debug!(code = error.code(), "{}", error);
                let block = cx.source_map.range(span);
                diagnostics.push(match marker {
                    Some(marker) => {
                        Diagnostic::from_annotation_error(cx.source_map.range(marker), &error)
                            .with_related(RelatedDiagnostic::new(
                                block,
                                Some("in this block".to_string()),
                            ))
                    }
                    None => Diagnostic::from_annotation_error(block, &error),
                });
                if cx.options.show_errors {
                    writer.line(&format!(
                        "<div class=\"annotated-error\">{}</div>",
                        escape_html(&error.to_string())
                    ));
                }
            }
        },
    }
}

fn emit_section(
    section: &Block,
    children: &[Block],
    cx: &EmitContext<'_>,
    build: &mut BuildContext<'_>,
) -> Result<String, SectionFailure> {
    let whole = |error| SectionFailure {
        error,
        span: section.span,
        marker: None,
    };
    let section_id = build.begin_section().map_err(whole)?;
    let highest = section_highest(children, &section_id, cx.source_map)?;
    build.section.expect_highest(highest);

    let tags = AnnotationTags::new(&section_id);
    let mut writer = HtmlWriter::new();
    writer.line(&format!("<div class=\"annotated ex-{}\">", section_id));
    writer.indent += 1;
    for child in children {
        emit_section_child(&mut writer, child, cx, build, tags).map_err(|error| {
            tracing::debug!(block = child.describe(), section = %section_id, "section child failed");
            SectionFailure {
                error,
                span: child.span,
                marker: None,
            }
        })?;
    }
    build.section.finish().map_err(whole)?;
    writer.indent -= 1;
    writer.line("</div>");

    tracing::debug!(
        section = %section_id,
        captions = build.section.caption_count(),
        "annotated section rendered"
    );
    Ok(writer.finish())
}

/// Validates every marker in the section before anything renders and returns
/// the highest annotation number.
fn section_highest(
    children: &[Block],
    section_id: &str,
    source_map: &SourceMap,
) -> Result<u8, SectionFailure> {
    let mut ids = BTreeSet::new();
    for child in children {
        if let BlockKind::Annotated { .. } = child.kind {
            return Err(SectionFailure {
                error: AnnotationError::NestedSection {
                    section: section_id.to_string(),
                },
                span: child.span,
                marker: None,
            });
        }
        for (index, text) in child.marker_texts().into_iter().enumerate() {
            let locate = |line, column, width| {
                locate_marker(child, index, line, column, width, source_map)
            };
            let scanned = scan_text(text).map_err(|err| {
                let width = match err.reason {
                    MalformedReason::MissingId => 1,
                    MalformedReason::InvalidId(_) => 2,
                };
                let (at, marker) = locate(err.line, err.column, width);
                SectionFailure {
                    error: AnnotationError::MalformedMarker {
                        section: section_id.to_string(),
                        source: MarkerError {
                            line: at.line,
                            column: at.character,
                            ..err
                        },
                    },
                    span: child.span,
                    marker,
                }
            })?;
            build_intervals(&scanned.lines).map_err(|err| {
                let (source, marker) = match err {
                    BalanceError::UnmatchedClose(at) => {
                        let (at, marker) = locate(at.line, at.character, 1);
                        (BalanceError::UnmatchedClose(at), marker)
                    }
                    BalanceError::Unclosed { id, at } => {
                        let (at, marker) = locate(at.line, at.character, 2);
                        (BalanceError::Unclosed { id, at }, marker)
                    }
                };
                SectionFailure {
                    error: AnnotationError::UnbalancedMarkers {
                        section: section_id.to_string(),
                        source,
                    },
                    span: child.span,
                    marker,
                }
            })?;
            ids.extend(scanned.ids());
        }
    }
    validate_id_range(&ids).map_err(|source| SectionFailure {
        error: AnnotationError::IdRangeMismatch {
            section: section_id.to_string(),
            source,
        },
        span: children
            .iter()
            .map(|child| child.span)
            .reduce(Span::cover)
            .unwrap_or_default(),
        marker: None,
    })
}

/// Moves a marker position inside one of `block`'s texts into document
/// coordinates. Falls back to the text-relative position when the block has
/// no line offsets.
fn locate_marker(
    block: &Block,
    index: usize,
    line: usize,
    column: usize,
    width: usize,
    source_map: &SourceMap,
) -> (Position, Option<Span>) {
    let Some(start) = block.source_offset(index, line, column) else {
        return (Position::new(line, column), None);
    };
    let end = block
        .source_offset(index, line, column + width)
        .unwrap_or(start);
    (source_map.position(start), Some(Span { start, end }))
}

fn emit_section_child(
    writer: &mut HtmlWriter,
    child: &Block,
    cx: &EmitContext<'_>,
    build: &mut BuildContext<'_>,
    tags: AnnotationTags<'_>,
) -> Result<(), AnnotationError> {
    let section_id = tags.section_id();
    match &child.kind {
        BlockKind::Paragraph { text } => {
            writer.line(&format!("<p>{}</p>", annotate_text(text, tags)?));
        }
        BlockKind::CodeBlock(code) => {
            writer.raw(&annotate_code(code, cx.highlighter, tags)?);
        }
        BlockKind::Annotation(Caption { paragraphs }) => {
            let number = build.section.record_caption(section_id)?;
            writer.line(&format!(
                "<div class=\"container codecomment comment-{}-{}\">",
                section_id, number
            ));
            writer.indent += 1;
            for paragraph in paragraphs {
                writer.line(&format!("<p>{}</p>", annotate_text(paragraph, tags)?));
            }
            writer.indent -= 1;
            writer.line("</div>");
        }
        BlockKind::Annotated { .. } => {
            return Err(AnnotationError::NestedSection {
                section: section_id.to_string(),
            });
        }
    }
    Ok(())
}

/// Caption and paragraph text: markers become spans over escaped text.
pub fn annotate_text(text: &str, tags: AnnotationTags<'_>) -> Result<String, AnnotationError> {
    let section = tags.section_id();
    let scanned = scan_text(text).map_err(|source| AnnotationError::MalformedMarker {
        section: section.to_string(),
        source,
    })?;
    let intervals =
        build_intervals(&scanned.lines).map_err(|source| AnnotationError::UnbalancedMarkers {
            section: section.to_string(),
            source,
        })?;
    overlay_plain(&scanned.cleaned(), &intervals, tags).map_err(|source| {
        AnnotationError::IllegalBoundaryTag {
            section: section.to_string(),
            source,
        }
    })
}

/// A code listing: markers stripped, the rest highlighted, spans overlaid.
pub fn annotate_code(
    code: &CodeBlock,
    highlighter: &dyn Highlighter,
    tags: AnnotationTags<'_>,
) -> Result<String, AnnotationError> {
    let section = tags.section_id();
    let scanned = scan_text(&code.text).map_err(|source| AnnotationError::MalformedMarker {
        section: section.to_string(),
        source,
    })?;
    let intervals =
        build_intervals(&scanned.lines).map_err(|source| AnnotationError::UnbalancedMarkers {
            section: section.to_string(),
            source,
        })?;
    let block = delegate(highlighter, &scanned.cleaned(), &code.lang).map_err(|source| {
        AnnotationError::HighlighterContract {
            section: section.to_string(),
            source,
        }
    })?;
    let body = overlay(&block.body, &intervals, tags).map_err(|source| {
        AnnotationError::IllegalBoundaryTag {
            section: section.to_string(),
            source,
        }
    })?;

    let mut out = String::with_capacity(block.prefix.len() + body.len() + block.suffix.len());
    out.push_str(&block.prefix);
    out.push_str(&body);
    out.push_str(&block.suffix);
    Ok(out)
}

pub(crate) fn escape_html(text: &str) -> String {
    let mut out = String::new();
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Escapes text for a double-quoted attribute value.
pub fn escape_attr(text: &str) -> String {
    let mut out = String::new();
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}
