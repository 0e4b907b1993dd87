//! A small reStructuredText-flavoured directive reader.
//!
//! Only what annotated listings need is understood: `annotated`,
//! `annotation` and `code-block` directives, plus plain paragraphs. A
//! directive's body is every following line that is blank or indented deeper
//! than the directive itself.

use crate::ast::{Block, BlockKind, Caption, CodeBlock, Document};
use crate::diagnostic::{
    Diagnostic, DiagnosticSeverity, W_DIRECTIVE_OPTION, W_DIRECTIVE_UNKNOWN,
};
use crate::source_map::SourceMap;
use crate::span::Span;

const DEFAULT_LANGUAGE: &str = "text";

pub struct ParseResult {
    pub document: Document,
    pub diagnostics: Vec<Diagnostic>,
    pub source_map: SourceMap,
}

pub fn parse(source: &str) -> ParseResult {
    let mut parser = Parser::new(source);
    let document = parser.parse_document(source);
    ParseResult {
        document,
        diagnostics: parser.diagnostics,
        source_map: parser.source_map,
    }
}

struct Parser {
    diagnostics: Vec<Diagnostic>,
    source_map: SourceMap,
}

#[derive(Clone, Debug)]
struct Line {
    text: String,
    start: usize,
    end: usize,
}

impl Line {
    /// Offset of the first non-blank character.
    fn content_start(&self) -> usize {
        self.start + (self.text.len() - self.text.trim_start().len())
    }

    fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    fn indent(&self) -> usize {
        self.text
            .bytes()
            .take_while(|byte| *byte == b' ' || *byte == b'\t')
            .count()
    }

    fn dedent(&self, by: usize) -> Line {
        let by = by.min(self.indent());
        Line {
            text: self.text[by..].to_string(),
            start: self.start + by,
            end: self.end,
        }
    }
}

struct DirectiveHead<'a> {
    name: &'a str,
    argument: &'a str,
}

impl Parser {
    fn new(source: &str) -> Self {
        Self {
            diagnostics: Vec::new(),
            source_map: SourceMap::new(source),
        }
    }

    fn parse_document(&mut self, source: &str) -> Document {
        let lines = split_lines(source);
        let blocks = self.parse_blocks(&lines);
        Document {
            span: Span {
                start: 0,
                end: source.len(),
            },
            blocks,
        }
    }

    fn parse_blocks(&mut self, lines: &[Line]) -> Vec<Block> {
        let mut blocks = Vec::new();
        let mut i = 0;

        while i < lines.len() {
            let line = &lines[i];
            if line.is_blank() {
                i += 1;
                continue;
            }

            if let Some(head) = directive_head(&line.text) {
                let indent = line.indent();
                let mut end = i + 1;
                while end < lines.len() && (lines[end].is_blank() || lines[end].indent() > indent)
                {
                    end += 1;
                }
                let body = dedent_body(&lines[i + 1..end]);
                let span = Span {
                    start: line.start,
                    end: body.last().map_or(line.end, |last| last.end),
                };
                if let Some(block) = self.parse_directive(&head, &body, span) {
                    blocks.push(block);
                }
                i = end;
                continue;
            }

            let start = i;
            let mut text_lines = Vec::new();
            let mut starts = Vec::new();
            while i < lines.len()
                && !lines[i].is_blank()
                && directive_head(&lines[i].text).is_none()
            {
                text_lines.push(lines[i].text.trim_start());
                starts.push(lines[i].content_start());
                i += 1;
            }
            blocks.push(Block {
                span: Span {
                    start: lines[start].start,
                    end: lines[i - 1].end,
                },
                kind: BlockKind::Paragraph {
                    text: text_lines.join("\n"),
                },
                line_starts: vec![starts],
            });
        }

        blocks
    }

    fn parse_directive(&mut self, head: &DirectiveHead<'_>, body: &[Line], span: Span) -> Option<Block> {
        let mut line_starts = Vec::new();
        let kind = match head.name {
            "annotated" => BlockKind::Annotated {
                blocks: self.parse_blocks(body),
            },
            "annotation" => {
                let (paragraphs, starts): (Vec<_>, Vec<_>) = paragraphs(body).into_iter().unzip();
                line_starts = starts;
                BlockKind::Annotation(Caption { paragraphs })
            }
            "code-block" | "code" | "sourcecode" => {
                let lang = if head.argument.is_empty() {
                    DEFAULT_LANGUAGE
                } else {
                    head.argument
                };
                let body = self.skip_options(head.name, body);
                let text = body
                    .iter()
                    .map(|line| line.text.as_str())
                    .collect::<Vec<_>>()
                    .join("\n");
                line_starts.push(body.iter().map(|line| line.start).collect());
                BlockKind::CodeBlock(CodeBlock {
                    lang: lang.to_string(),
                    text,
                })
            }
            other => {
                self.diagnostics.push(Diagnostic::new(
                    self.source_map.range(span),
                    DiagnosticSeverity::Warning,
                    W_DIRECTIVE_UNKNOWN,
                    format!("unknown directive `{}` skipped", other),
                ));
                return None;
            }
        };
        Some(Block {
            span,
            kind,
            line_starts,
        })
    }

    /// Drops the leading `:name: value` option lines of a directive body,
    /// warning about each, along with the blank lines that follow them.
    fn skip_options<'b>(&mut self, directive: &str, body: &'b [Line]) -> &'b [Line] {
        let mut skipped = 0;
        while let Some(name) = body.get(skipped).and_then(|line| option_name(&line.text)) {
            let line = &body[skipped];
            self.diagnostics.push(Diagnostic::new(
                self.source_map.range(Span {
                    start: line.content_start(),
                    end: line.end,
                }),
                DiagnosticSeverity::Warning,
                W_DIRECTIVE_OPTION,
                format!("option `:{}:` of `{}` is ignored", name, directive),
            ));
            skipped += 1;
        }
        if skipped == 0 {
            return body;
        }
        while body.get(skipped).is_some_and(Line::is_blank) {
            skipped += 1;
        }
        &body[skipped..]
    }
}

/// The name of a field-list option line such as `:linenos:` or
/// `:emphasize-lines: 2,3`.
fn option_name(text: &str) -> Option<&str> {
    let rest = text.trim_start().strip_prefix(':')?;
    let (name, value) = rest.split_once(':')?;
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_');
    (valid && (value.is_empty() || value.starts_with(' '))).then_some(name)
}

fn directive_head(text: &str) -> Option<DirectiveHead<'_>> {
    let rest = text.trim_start().strip_prefix("..")?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let (name, argument) = rest.trim_start().split_once("::")?;
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || ch == '-' || ch == '_');
    valid.then(|| DirectiveHead {
        name,
        argument: argument.trim(),
    })
}

/// Strips surrounding blank lines and the common indentation.
fn dedent_body(lines: &[Line]) -> Vec<Line> {
    let Some(first) = lines.iter().position(|line| !line.is_blank()) else {
        return Vec::new();
    };
    let last = lines
        .iter()
        .rposition(|line| !line.is_blank())
        .unwrap_or(first);
    let lines = &lines[first..=last];
    let indent = lines
        .iter()
        .filter(|line| !line.is_blank())
        .map(Line::indent)
        .min()
        .unwrap_or(0);
    lines
        .iter()
        .map(|line| {
            if line.is_blank() {
                Line {
                    text: String::new(),
                    start: line.end,
                    end: line.end,
                }
            } else {
                line.dedent(indent)
            }
        })
        .collect()
}

/// Blank-line separated paragraphs, each with the offsets of its lines.
fn paragraphs(lines: &[Line]) -> Vec<(String, Vec<usize>)> {
    let mut out = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut starts = Vec::new();
    for line in lines {
        if line.is_blank() {
            if !current.is_empty() {
                out.push((current.join("\n"), std::mem::take(&mut starts)));
                current.clear();
            }
        } else {
            current.push(line.text.trim_start());
            starts.push(line.content_start());
        }
    }
    if !current.is_empty() {
        out.push((current.join("\n"), starts));
    }
    out
}

fn split_lines(source: &str) -> Vec<Line> {
    let mut lines = Vec::new();
    let mut start = 0;
    for (idx, byte) in source.bytes().enumerate() {
        if byte == b'\n' {
            lines.push(make_line(source, start, idx));
            start = idx + 1;
        }
    }
    if start < source.len() {
        lines.push(make_line(source, start, source.len()));
    }
    lines
}

fn make_line(source: &str, start: usize, end: usize) -> Line {
    let text = source[start..end].strip_suffix('\r').unwrap_or(&source[start..end]);
    Line {
        text: text.to_string(),
        start,
        end: start + text.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::parse;
    use crate::ast::{BlockKind, Caption, CodeBlock};
    use crate::diagnostic::{DiagnosticSeverity, W_DIRECTIVE_OPTION, W_DIRECTIVE_UNKNOWN};

    const SAMPLE: &str = "\
Intro text
spanning two lines.

.. annotated::

   .. code-block:: python

      1«def» f():
          2«» return 1

   .. annotation::

      First caption.

   .. annotation::

      Second 2«caption».

      Another paragraph.

Outro.
";

    #[test]
    fn parses_nested_directives() {
        let result = parse(SAMPLE);
        assert!(result.diagnostics.is_empty());
        let blocks = &result.document.blocks;
        assert_eq!(blocks.len(), 3);
        assert_eq!(
            blocks[0].kind,
            BlockKind::Paragraph {
                text: "Intro text\nspanning two lines.".to_string()
            }
        );
        let BlockKind::Annotated { blocks: inner } = &blocks[1].kind else {
            panic!("expected annotated section");
        };
        assert_eq!(inner.len(), 3);
        assert_eq!(
            inner[0].kind,
            BlockKind::CodeBlock(CodeBlock {
                lang: "python".to_string(),
                text: "1«def» f():\n    2«» return 1".to_string(),
            })
        );
        assert_eq!(
            inner[2].kind,
            BlockKind::Annotation(Caption {
                paragraphs: vec![
                    "Second 2«caption».".to_string(),
                    "Another paragraph.".to_string()
                ],
            })
        );
        assert_eq!(
            blocks[2].kind,
            BlockKind::Paragraph {
                text: "Outro.".to_string()
            }
        );
    }

    #[test]
    fn spans_cover_the_directive_body() {
        let result = parse(SAMPLE);
        let section = &result.document.blocks[1];
        let range = result.source_map.range(section.span);
        assert_eq!(range.start.line, 3);
        assert_eq!(range.end.line, 18);
        assert_eq!(section.marker_texts().len(), 4);
    }

    #[test]
    fn code_block_without_language_defaults_to_text() {
        let result = parse(".. code-block::\n\n   x = 1\n");
        let BlockKind::CodeBlock(code) = &result.document.blocks[0].kind else {
            panic!("expected code block");
        };
        assert_eq!(code.lang, "text");
        assert_eq!(code.text, "x = 1");
    }

    #[test]
    fn unknown_directive_is_skipped_with_a_warning() {
        let result = parse(".. figure:: a.png\n\n   caption\n\nAfter.\n");
        assert_eq!(result.document.blocks.len(), 1);
        assert_eq!(result.diagnostics.len(), 1);
        assert_eq!(result.diagnostics[0].code, W_DIRECTIVE_UNKNOWN);
        assert_eq!(result.diagnostics[0].severity, DiagnosticSeverity::Warning);
    }

    #[test]
    fn crlf_line_endings_are_normalized() {
        let result = parse(".. code-block:: c\r\n\r\n   a;\r\n   b;\r\n");
        let BlockKind::CodeBlock(code) = &result.document.blocks[0].kind else {
            panic!("expected code block");
        };
        assert_eq!(code.text, "a;\nb;");
    }

    #[test]
    fn comment_without_double_colon_is_text() {
        let result = parse(".. just a remark\n");
        assert!(matches!(
            result.document.blocks[0].kind,
            BlockKind::Paragraph { .. }
        ));
    }

    #[test]
    fn code_block_options_are_dropped_with_a_warning() {
        let result = parse(
            ".. code-block:: rust\n   :linenos:\n   :emphasize-lines: 2\n\n   let x = 1;\n",
        );
        let BlockKind::CodeBlock(code) = &result.document.blocks[0].kind else {
            panic!("expected code block");
        };
        assert_eq!(code.text, "let x = 1;");
        let codes: Vec<&str> = result.diagnostics.iter().map(|diag| diag.code).collect();
        assert_eq!(codes, vec![W_DIRECTIVE_OPTION, W_DIRECTIVE_OPTION]);
        assert_eq!(result.diagnostics[1].range.start.line, 2);
        assert_eq!(result.diagnostics[1].range.start.character, 3);
        assert_eq!(
            result.diagnostics[0].message,
            "option `:linenos:` of `code-block` is ignored"
        );
    }

    #[test]
    fn code_starting_with_a_colon_is_kept() {
        let result = parse(".. code-block:: text\n\n   :: not an option\n");
        let BlockKind::CodeBlock(code) = &result.document.blocks[0].kind else {
            panic!("expected code block");
        };
        assert_eq!(code.text, ":: not an option");
        assert!(result.diagnostics.is_empty());
    }

    #[test]
    fn line_starts_point_into_the_source() {
        let result = parse(SAMPLE);
        let BlockKind::Annotated { blocks: inner } = &result.document.blocks[1].kind else {
            panic!("expected annotated section");
        };
        let code = &inner[0];
        let offset = code.source_offset(0, 1, 4).expect("offset");
        assert_eq!(&SAMPLE[offset..offset + 3], "2«»");
        let caption = &inner[2];
        let offset = caption.source_offset(0, 0, 7).expect("offset");
        assert_eq!(&SAMPLE[offset..offset + 2], "2«");
        assert_eq!(caption.source_offset(2, 0, 0), None);
    }
}
