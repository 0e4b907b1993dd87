//! Inline annotation markers.
//!
//! Three shapes are recognised, tried in this order at every character:
//!
//! * `N«» ` opens annotation `N` and closes it at the end of the line,
//! * `N«` opens annotation `N`,
//! * `»` closes the innermost open annotation.
//!
//! `N` is a single digit `1`-`9`. Any other use of `«` is an error.

use std::collections::BTreeSet;
use std::fmt;

use thiserror::Error;

pub const OPEN_GLYPH: char = '«';
pub const CLOSE_GLYPH: char = '»';

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Marker {
    Open(u8),
    Close,
    SelfClosing(u8),
}

impl Marker {
    pub fn id(self) -> Option<u8> {
        match self {
            Marker::Open(id) | Marker::SelfClosing(id) => Some(id),
            Marker::Close => None,
        }
    }
}

/// A marker and where it stood: `column` in the cleaned line, `raw_column` in
/// the line as written.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct MarkerEvent {
    pub marker: Marker,
    pub column: usize,
    pub raw_column: usize,
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ScannedLine {
    pub text: String,
    pub events: Vec<MarkerEvent>,
}

impl ScannedLine {
    /// Length of the cleaned line in scalar values.
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Every line of a block after scanning, in order.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ScannedText {
    pub lines: Vec<ScannedLine>,
}

impl ScannedText {
    /// The marker-free text, lines joined with `\n`.
    pub fn cleaned(&self) -> String {
        let mut out = String::new();
        for (idx, line) in self.lines.iter().enumerate() {
            if idx > 0 {
                out.push('\n');
            }
            out.push_str(&line.text);
        }
        out
    }

    pub fn ids(&self) -> BTreeSet<u8> {
        self.lines
            .iter()
            .flat_map(|line| line.events.iter())
            .filter_map(|event| event.marker.id())
            .collect()
    }

    pub fn has_markers(&self) -> bool {
        self.lines.iter().any(|line| !line.events.is_empty())
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Error)]
#[error("{reason} at line {}, column {}", .line + 1, .column + 1)]
pub struct MarkerError {
    /// Zero-based line within the scanned text.
    pub line: usize,
    /// Zero-based column in the raw (unscanned) line.
    pub column: usize,
    pub reason: MalformedReason,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MalformedReason {
    MissingId,
    InvalidId(char),
}

impl fmt::Display for MalformedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MalformedReason::MissingId => write!(f, "`{}` without an annotation number", OPEN_GLYPH),
            MalformedReason::InvalidId(digit) => {
                write!(f, "annotation number `{}` is outside 1-9", digit)
            }
        }
    }
}

pub fn contains_marker_glyph(text: &str) -> bool {
    text.contains(OPEN_GLYPH) || text.contains(CLOSE_GLYPH)
}

/// Strips the markers from one line.
pub fn scan_line(line: &str) -> Result<ScannedLine, MarkerError> {
    let chars: Vec<char> = line.chars().collect();
    let mut text = String::with_capacity(line.len());
    let mut events = Vec::new();
    let mut column = 0usize;
    let mut i = 0usize;

    while i < chars.len() {
        let ch = chars[i];
        if ch.is_ascii_digit() && chars.get(i + 1) == Some(&OPEN_GLYPH) {
            let id = marker_id(ch).ok_or(MarkerError {
                line: 0,
                column: i,
                reason: MalformedReason::InvalidId(ch),
            })?;
            if chars.get(i + 2) == Some(&CLOSE_GLYPH) && chars.get(i + 3) == Some(&' ') {
                events.push(MarkerEvent {
                    marker: Marker::SelfClosing(id),
                    column,
                    raw_column: i,
                });
                i += 4;
            } else {
                events.push(MarkerEvent {
                    marker: Marker::Open(id),
                    column,
                    raw_column: i,
                });
                i += 2;
            }
            continue;
        }
        if ch == CLOSE_GLYPH {
            events.push(MarkerEvent {
                marker: Marker::Close,
                column,
                raw_column: i,
            });
            i += 1;
            continue;
        }
        if ch == OPEN_GLYPH {
            return Err(MarkerError {
                line: 0,
                column: i,
                reason: MalformedReason::MissingId,
            });
        }
        text.push(ch);
        column += 1;
        i += 1;
    }

    Ok(ScannedLine { text, events })
}

/// Scans every `\n`-separated line of `text`.
pub fn scan_text(text: &str) -> Result<ScannedText, MarkerError> {
    let mut lines = Vec::new();
    for (line_no, line) in text.split('\n').enumerate() {
        let scanned = scan_line(line).map_err(|err| MarkerError {
            line: line_no,
            ..err
        })?;
        lines.push(scanned);
    }
    Ok(ScannedText { lines })
}

fn marker_id(ch: char) -> Option<u8> {
    match ch {
        '1'..='9' => Some(ch as u8 - b'0'),
        _ => None,
    }
}
