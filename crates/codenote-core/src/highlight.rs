use thiserror::Error;

use crate::emit::{escape_attr, escape_html};
use crate::token::{ShapeError, TokenStreamItem, check_nesting, tokenize};

#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum HighlightError {
    #[error("highlighter failed: {0}")]
    Backend(String),
}

/// A syntax highlighter.
///
/// Implementations return `<pre …>…</pre>` wrapping nested inline tags. A
/// newline in the body must be a line break of `text`, never part of a tag.
pub trait Highlighter {
    fn highlight(&self, text: &str, language: &str) -> Result<String, HighlightError>;
}

/// Escapes the text and wraps it in `<pre>`, nothing else.
#[derive(Clone, Copy, Debug, Default)]
pub struct PlainHighlighter;

impl Highlighter for PlainHighlighter {
    fn highlight(&self, text: &str, language: &str) -> Result<String, HighlightError> {
        Ok(format!(
            "<pre class=\"highlight language-{}\">{}</pre>",
            escape_attr(language),
            escape_html(text)
        ))
    }
}

/// Highlighter output split around its `<pre>` envelope.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct HighlightedBlock {
    pub prefix: String,
    pub body: Vec<TokenStreamItem>,
    pub suffix: String,
}

/// Highlights `text` and checks the result against the shape the overlay
/// depends on.
pub fn delegate(
    highlighter: &dyn Highlighter,
    text: &str,
    language: &str,
) -> Result<HighlightedBlock, ShapeError> {
    let html = highlighter.highlight(text, language)?;
    let block = split_envelope(&html)?;

    let expected = text.matches('\n').count();
    let found = block
        .body
        .iter()
        .filter(|token| matches!(token, TokenStreamItem::Newline))
        .count();
    // A single trailing line break is tolerated.
    if found != expected && found != expected + 1 {
        return Err(ShapeError::LineCount { expected, found });
    }
    Ok(block)
}

pub fn split_envelope(html: &str) -> Result<HighlightedBlock, ShapeError> {
    let open_start = find_pre_open(html).ok_or(ShapeError::MissingEnvelope)?;
    let open_end = html[open_start..]
        .find('>')
        .map(|index| open_start + index)
        .ok_or(ShapeError::UnterminatedTag { offset: open_start })?;
    let close_start = html.rfind("</pre>").ok_or(ShapeError::MissingEnvelope)?;
    if close_start <= open_end {
        return Err(ShapeError::MissingEnvelope);
    }
    if html[open_start..=open_end].contains('\n') {
        return Err(ShapeError::NewlineInTag { offset: open_start });
    }

    let body_html = &html[open_end + 1..close_start];
    if find_pre_open(body_html).is_some() {
        return Err(ShapeError::UnsupportedTag {
            raw: "<pre>".to_string(),
        });
    }
    let body = tokenize(body_html)?;
    check_nesting(&body)?;

    Ok(HighlightedBlock {
        prefix: html[..=open_end].to_string(),
        body,
        suffix: html[close_start..].to_string(),
    })
}

fn find_pre_open(html: &str) -> Option<usize> {
    let mut from = 0;
    while let Some(index) = html[from..].find("<pre") {
        let start = from + index;
        match html[start + 4..].chars().next() {
            Some('>') => return Some(start),
            Some(ch) if ch.is_whitespace() => return Some(start),
            _ => from = start + 4,
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::{HighlightError, Highlighter, PlainHighlighter, delegate, split_envelope};
    use crate::token::{ShapeError, TokenStreamItem};

    struct Fixed(&'static str);

    impl Highlighter for Fixed {
        fn highlight(&self, _text: &str, _language: &str) -> Result<String, HighlightError> {
            Ok(self.0.to_string())
        }
    }

    #[test]
    fn plain_highlighter_escapes_and_wraps() {
        let block = delegate(&PlainHighlighter, "a < b\nc", "rust").expect("block");
        assert_eq!(block.prefix, "<pre class=\"highlight language-rust\">");
        assert_eq!(block.suffix, "</pre>");
        assert_eq!(
            block.body,
            vec![
                TokenStreamItem::Text("a &lt; b".to_string()),
                TokenStreamItem::Newline,
                TokenStreamItem::Text("c".to_string()),
            ]
        );
    }

    #[test]
    fn wrapper_markup_around_the_envelope_is_kept() {
        let block = split_envelope("<div class=\"hl\"><pre>x</pre></div>").expect("block");
        assert_eq!(block.prefix, "<div class=\"hl\"><pre>");
        assert_eq!(block.suffix, "</pre></div>");
    }

    #[test]
    fn missing_envelope_is_rejected() {
        assert_eq!(
            delegate(&Fixed("<code>x</code>"), "x", "text"),
            Err(ShapeError::MissingEnvelope)
        );
        // `<preview>` is not a `<pre>` tag.
        assert_eq!(
            split_envelope("<preview>x</preview>"),
            Err(ShapeError::MissingEnvelope)
        );
    }

    #[test]
    fn lost_line_breaks_are_rejected() {
        assert_eq!(
            delegate(&Fixed("<pre>ab</pre>"), "a\nb", "text"),
            Err(ShapeError::LineCount {
                expected: 1,
                found: 0
            })
        );
    }

    #[test]
    fn trailing_line_break_is_tolerated() {
        assert!(delegate(&Fixed("<pre>a\nb\n</pre>"), "a\nb", "text").is_ok());
    }

    #[test]
    fn backend_failure_is_surfaced() {
        struct Failing;
        impl Highlighter for Failing {
            fn highlight(&self, _text: &str, _language: &str) -> Result<String, HighlightError> {
                Err(HighlightError::Backend("boom".to_string()))
            }
        }
        assert_eq!(
            delegate(&Failing, "x", "text"),
            Err(ShapeError::Backend(HighlightError::Backend(
                "boom".to_string()
            )))
        );
    }
}
