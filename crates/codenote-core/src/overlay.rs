//! Injects annotation spans into highlighted markup.
//!
//! Boundaries are flushed lazily: a closing highlighter tag is written as soon
//! as it is seen, and the annotation tags due at the current position are
//! written just before the next opening tag, text unit, newline or the end of
//! the stream. That keeps the highlighter stack as shallow as possible, so a
//! boundary on a token edge never needs a split. When highlighter tags are
//! still open at a boundary, they are closed, the annotation tags written, and
//! the highlighter tags reopened verbatim.

use std::cmp::Reverse;
use std::collections::BTreeMap;

use thiserror::Error;

use crate::emit::escape_html;
use crate::interval::AnnotationInterval;
use crate::marker::contains_marker_glyph;
use crate::source_map::Position;
use crate::token::{TokenStreamItem, text_units};

#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum OverlayError {
    #[error("raw marker `{unit}` left in text at line {}, column {}", .at.line + 1, .at.character + 1)]
    RawMarker { unit: String, at: Position },
    #[error("annotation {id} closes at line {}, column {} while another annotation is innermost", .at.line + 1, .at.character + 1)]
    CrossedClose { id: u8, at: Position },
    #[error("highlighter tag `</{name}>` has no open tag to close")]
    StrayHighlightClose { name: String },
    #[error("annotation boundary at line {}, column {} lies outside the highlighted text", .at.line + 1, .at.character + 1)]
    Unreached { at: Position },
}

/// Builds annotation open tags for one section.
#[derive(Clone, Copy, Debug)]
pub struct AnnotationTags<'a> {
    section_id: &'a str,
}

impl<'a> AnnotationTags<'a> {
    pub fn new(section_id: &'a str) -> Self {
        Self { section_id }
    }

    pub fn section_id(&self) -> &'a str {
        self.section_id
    }

    pub fn open(&self, id: u8) -> String {
        format!("<span class=\"ex-{} loc{}\">", self.section_id, id)
    }

    pub fn close(&self) -> &'static str {
        "</span>"
    }
}

/// Where each interval opens and closes, keyed by position.
#[derive(Debug, Default)]
struct Boundaries {
    /// Non-empty intervals ending here, innermost first.
    closes: BTreeMap<Position, Vec<usize>>,
    /// Intervals starting here, outermost first.
    opens: BTreeMap<Position, Vec<usize>>,
    /// Zero-length intervals here, in opening order.
    empties: BTreeMap<Position, Vec<usize>>,
}

impl Boundaries {
    fn plan(intervals: &[AnnotationInterval]) -> Self {
        let mut order: Vec<usize> = (0..intervals.len()).collect();
        // Stable: identical intervals keep their scan order.
        order.sort_by_key(|&index| (intervals[index].start, Reverse(intervals[index].end)));
        let mut rank = vec![0usize; intervals.len()];
        for (position, &index) in order.iter().enumerate() {
            rank[index] = position;
        }

        let mut boundaries = Boundaries::default();
        for &index in &order {
            let interval = &intervals[index];
            boundaries
                .opens
                .entry(interval.start)
                .or_default()
                .push(index);
            if interval.is_empty() {
                boundaries
                    .empties
                    .entry(interval.start)
                    .or_default()
                    .push(index);
            } else {
                boundaries
                    .closes
                    .entry(interval.end)
                    .or_default()
                    .push(index);
            }
        }
        for ids in boundaries.closes.values_mut() {
            ids.sort_by_key(|&index| Reverse(rank[index]));
        }
        boundaries
    }

    fn take(&mut self, at: Position) -> Option<(Vec<usize>, Vec<usize>, Vec<usize>)> {
        let closes = self.closes.remove(&at);
        let opens = self.opens.remove(&at);
        let empties = self.empties.remove(&at);
        if closes.is_none() && opens.is_none() && empties.is_none() {
            return None;
        }
        Some((
            closes.unwrap_or_default(),
            opens.unwrap_or_default(),
            empties.unwrap_or_default(),
        ))
    }

    fn first_pending(&self) -> Option<Position> {
        [
            self.closes.keys().next(),
            self.opens.keys().next(),
            self.empties.keys().next(),
        ]
        .into_iter()
        .flatten()
        .min()
        .copied()
    }
}

struct Walker<'a> {
    out: String,
    tags: AnnotationTags<'a>,
    intervals: &'a [AnnotationInterval],
    boundaries: Boundaries,
    position: Position,
    highlight_stack: Vec<(&'a str, &'a str)>,
    annotation_stack: Vec<usize>,
    splits: usize,
}

impl<'a> Walker<'a> {
    fn new(intervals: &'a [AnnotationInterval], tags: AnnotationTags<'a>) -> Self {
        Self {
            out: String::new(),
            tags,
            intervals,
            boundaries: Boundaries::plan(intervals),
            position: Position::default(),
            highlight_stack: Vec::new(),
            annotation_stack: Vec::new(),
            splits: 0,
        }
    }

    fn walk(&mut self, tokens: &'a [TokenStreamItem]) -> Result<(), OverlayError> {
        for token in tokens {
            match token {
                TokenStreamItem::OpenTag { raw, name } => {
                    self.flush()?;
                    self.out.push_str(raw);
                    self.highlight_stack.push((raw.as_str(), name.as_str()));
                }
                TokenStreamItem::CloseTag { raw, name } => match self.highlight_stack.pop() {
                    Some((_, open)) if open == name.as_str() => self.out.push_str(raw),
                    _ => {
                        return Err(OverlayError::StrayHighlightClose { name: name.clone() });
                    }
                },
                TokenStreamItem::Newline => {
                    self.flush()?;
                    self.out.push('\n');
                    self.position.line += 1;
                    self.position.character = 0;
                }
                TokenStreamItem::Text(text) => {
                    for unit in text_units(text) {
                        if contains_marker_glyph(unit) {
                            return Err(OverlayError::RawMarker {
                                unit: unit.to_string(),
                                at: self.position,
                            });
                        }
                        self.flush()?;
                        self.out.push_str(unit);
                        self.position.character += 1;
                    }
                }
            }
        }
        self.flush()?;

        if let Some(at) = self.boundaries.first_pending() {
            return Err(OverlayError::Unreached { at });
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), OverlayError> {
        let Some((closes, opens, empties)) = self.boundaries.take(self.position) else {
            return Ok(());
        };

        let split = !self.highlight_stack.is_empty();
        if split {
            for (_, name) in self.highlight_stack.iter().rev() {
                self.out.push_str("</");
                self.out.push_str(name);
                self.out.push('>');
            }
            self.splits += 1;
        }

        for index in closes {
            self.close_annotation(index)?;
        }
        for index in opens {
            self.out.push_str(&self.tags.open(self.intervals[index].id));
            self.annotation_stack.push(index);
        }
        for index in empties.into_iter().rev() {
            self.close_annotation(index)?;
        }

        if split {
            for (raw, _) in &self.highlight_stack {
                self.out.push_str(raw);
            }
        }
        Ok(())
    }

    fn close_annotation(&mut self, index: usize) -> Result<(), OverlayError> {
        if self.annotation_stack.last() != Some(&index) {
            return Err(OverlayError::CrossedClose {
                id: self.intervals[index].id,
                at: self.position,
            });
        }
        self.annotation_stack.pop();
        self.out.push_str(self.tags.close());
        Ok(())
    }
}

/// Overlays `intervals` onto a highlighted token stream.
pub fn overlay(
    tokens: &[TokenStreamItem],
    intervals: &[AnnotationInterval],
    tags: AnnotationTags<'_>,
) -> Result<String, OverlayError> {
    let mut walker = Walker::new(intervals, tags);
    walker.walk(tokens)?;
    tracing::trace!(
        intervals = intervals.len(),
        splits = walker.splits,
        "overlay finished"
    );
    Ok(walker.out)
}

/// Overlays `intervals` onto unhighlighted text, escaping it first.
pub fn overlay_plain(
    text: &str,
    intervals: &[AnnotationInterval],
    tags: AnnotationTags<'_>,
) -> Result<String, OverlayError> {
    let mut tokens = Vec::new();
    for (idx, line) in text.split('\n').enumerate() {
        if idx > 0 {
            tokens.push(TokenStreamItem::Newline);
        }
        if !line.is_empty() {
            tokens.push(TokenStreamItem::Text(escape_html(line)));
        }
    }
    overlay(&tokens, intervals, tags)
}
