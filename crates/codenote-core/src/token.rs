//! Flat decomposition of highlighter markup.

use thiserror::Error;

use crate::highlight::HighlightError;

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum TokenStreamItem {
    OpenTag { raw: String, name: String },
    CloseTag { raw: String, name: String },
    Newline,
    Text(String),
}

#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum ShapeError {
    #[error("output has no <pre> envelope")]
    MissingEnvelope,
    #[error("unterminated tag at byte {offset}")]
    UnterminatedTag { offset: usize },
    #[error("tag at byte {offset} contains a newline")]
    NewlineInTag { offset: usize },
    #[error("unsupported markup `{raw}`")]
    UnsupportedTag { raw: String },
    #[error("closing tag `</{found}>` does not match open `{}`", .expected.as_deref().unwrap_or("(none)"))]
    MismatchedClose {
        expected: Option<String>,
        found: String,
    },
    #[error("tag `{name}` is never closed")]
    UnclosedTag { name: String },
    #[error("expected {expected} line break(s), found {found}")]
    LineCount { expected: usize, found: usize },
    #[error(transparent)]
    Backend(#[from] HighlightError),
}

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// Splits markup into tags, newlines and text runs.
pub fn tokenize(html: &str) -> Result<Vec<TokenStreamItem>, ShapeError> {
    let mut tokens = Vec::new();
    let mut text = String::new();
    let mut rest = html;
    let mut offset = 0usize;

    while let Some(ch) = rest.chars().next() {
        match ch {
            '<' => {
                flush_text(&mut tokens, &mut text);
                let end = rest
                    .find('>')
                    .ok_or(ShapeError::UnterminatedTag { offset })?;
                let raw = &rest[..=end];
                if raw.contains('\n') {
                    return Err(ShapeError::NewlineInTag { offset });
                }
                tokens.push(classify_tag(raw)?);
                rest = &rest[end + 1..];
                offset += end + 1;
            }
            '\n' => {
                flush_text(&mut tokens, &mut text);
                tokens.push(TokenStreamItem::Newline);
                rest = &rest[1..];
                offset += 1;
            }
            _ => {
                text.push(ch);
                rest = &rest[ch.len_utf8()..];
                offset += ch.len_utf8();
            }
        }
    }
    flush_text(&mut tokens, &mut text);
    Ok(tokens)
}

/// Verifies that every closing tag matches the innermost open one and that
/// nothing is left open.
pub fn check_nesting(tokens: &[TokenStreamItem]) -> Result<(), ShapeError> {
    let mut open: Vec<&str> = Vec::new();
    for token in tokens {
        match token {
            TokenStreamItem::OpenTag { name, .. } => open.push(name),
            TokenStreamItem::CloseTag { name, .. } => match open.pop() {
                Some(expected) if expected == name.as_str() => {}
                expected => {
                    return Err(ShapeError::MismatchedClose {
                        expected: expected.map(str::to_string),
                        found: name.clone(),
                    });
                }
            },
            TokenStreamItem::Newline | TokenStreamItem::Text(_) => {}
        }
    }
    match open.pop() {
        Some(name) => Err(ShapeError::UnclosedTag {
            name: name.to_string(),
        }),
        None => Ok(()),
    }
}

/// Splits a text run into logical characters. An entity reference such as
/// `&amp;` or `&#x27;` is a single unit.
pub fn text_units(text: &str) -> Vec<&str> {
    let mut units = Vec::new();
    let mut i = 0usize;
    while i < text.len() {
        let len = entity_len(&text[i..]).unwrap_or_else(|| {
            text[i..]
                .chars()
                .next()
                .map(char::len_utf8)
                .unwrap_or(1)
        });
        units.push(&text[i..i + len]);
        i += len;
    }
    units
}

fn entity_len(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    if bytes.first() != Some(&b'&') {
        return None;
    }
    let mut i = 1;
    if bytes.get(i) == Some(&b'#') {
        i += 1;
    }
    let name_start = i;
    while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
        i += 1;
    }
    if i == name_start {
        return None;
    }
    if bytes.get(i) == Some(&b';') {
        i += 1;
    }
    Some(i)
}

fn flush_text(tokens: &mut Vec<TokenStreamItem>, text: &mut String) {
    if !text.is_empty() {
        tokens.push(TokenStreamItem::Text(std::mem::take(text)));
    }
}

fn classify_tag(raw: &str) -> Result<TokenStreamItem, ShapeError> {
    let unsupported = || ShapeError::UnsupportedTag {
        raw: raw.to_string(),
    };
    let inner = &raw[1..raw.len() - 1];
    if inner.starts_with('!') || inner.starts_with('?') || inner.ends_with('/') {
        return Err(unsupported());
    }
    let (closing, body) = match inner.strip_prefix('/') {
        Some(body) => (true, body),
        None => (false, inner),
    };
    let name: String = body
        .chars()
        .take_while(|ch| ch.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase();
    if name.is_empty() || VOID_ELEMENTS.contains(&name.as_str()) {
        return Err(unsupported());
    }
    let raw = raw.to_string();
    Ok(if closing {
        TokenStreamItem::CloseTag { raw, name }
    } else {
        TokenStreamItem::OpenTag { raw, name }
    })
}
