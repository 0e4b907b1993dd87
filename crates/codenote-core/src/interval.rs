use std::collections::BTreeSet;

use thiserror::Error;

use crate::marker::{Marker, ScannedLine};
use crate::source_map::Position;

/// A resolved annotation in cleaned-text coordinates.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct AnnotationInterval {
    pub id: u8,
    pub start: Position,
    pub end: Position,
}

impl AnnotationInterval {
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Positions are in the text as written, markers included.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Error)]
pub enum BalanceError {
    #[error(
        "closing marker at line {}, column {} has no matching open",
        .0.line + 1,
        .0.character + 1
    )]
    UnmatchedClose(Position),
    #[error(
        "marker {id} opened at line {}, column {} is never closed",
        .at.line + 1,
        .at.character + 1
    )]
    Unclosed { id: u8, at: Position },
}

#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum IdRangeError {
    #[error("annotation numbers {present:?} do not form 1..={highest}")]
    Gap { present: Vec<u8>, highest: u8 },
    #[error("{captions} caption(s) for {highest} annotation marker(s)")]
    CaptionCount { captions: u32, highest: u8 },
}

struct OpenEntry {
    id: u8,
    start: Position,
    raw: Position,
    seq: usize,
    self_closing: bool,
}

/// Matches the markers of a whole block into intervals.
///
/// Matching is purely LIFO: a close pops whatever opened last, regardless of
/// its number. The result is in opening order.
pub fn build_intervals(lines: &[ScannedLine]) -> Result<Vec<AnnotationInterval>, BalanceError> {
    let mut stack: Vec<OpenEntry> = Vec::new();
    let mut done: Vec<(usize, AnnotationInterval)> = Vec::new();
    let mut seq = 0usize;

    for (line_no, line) in lines.iter().enumerate() {
        let mut self_closing_here = Vec::new();
        for event in &line.events {
            let at = Position::new(line_no, event.column);
            let raw = Position::new(line_no, event.raw_column);
            match event.marker {
                Marker::Open(id) | Marker::SelfClosing(id) => {
                    let self_closing = matches!(event.marker, Marker::SelfClosing(_));
                    if self_closing {
                        self_closing_here.push(seq);
                    }
                    stack.push(OpenEntry {
                        id,
                        start: at,
                        raw,
                        seq,
                        self_closing,
                    });
                    seq += 1;
                }
                Marker::Close => {
                    let entry = stack.pop().ok_or(BalanceError::UnmatchedClose(raw))?;
                    done.push((
                        entry.seq,
                        AnnotationInterval {
                            id: entry.id,
                            start: entry.start,
                            end: at,
                        },
                    ));
                }
            }
        }

        let line_end = Position::new(line_no, line.char_len());
        for pending in self_closing_here.into_iter().rev() {
            let Some(index) = stack.iter().position(|entry| entry.seq == pending) else {
                // Closed explicitly on this line.
                continue;
            };
            if index + 1 != stack.len() {
                let top = &stack[stack.len() - 1];
                return Err(BalanceError::Unclosed {
                    id: top.id,
                    at: top.raw,
                });
            }
            if let Some(entry) = stack.pop() {
                debug_assert!(entry.self_closing);
                done.push((
                    entry.seq,
                    AnnotationInterval {
                        id: entry.id,
                        start: entry.start,
                        end: line_end,
                    },
                ));
            }
        }
    }

    if let Some(entry) = stack.first() {
        return Err(BalanceError::Unclosed {
            id: entry.id,
            at: entry.raw,
        });
    }

    done.sort_by_key(|(seq, _)| *seq);
    Ok(done.into_iter().map(|(_, interval)| interval).collect())
}

/// Checks that `ids` is exactly `1..=max` and returns `max` (0 when empty).
pub fn validate_id_range(ids: &BTreeSet<u8>) -> Result<u8, IdRangeError> {
    let highest = ids.iter().next_back().copied().unwrap_or(0);
    if ids.len() != usize::from(highest) || ids.iter().any(|id| *id == 0) {
        return Err(IdRangeError::Gap {
            present: ids.iter().copied().collect(),
            highest,
        });
    }
    Ok(highest)
}
