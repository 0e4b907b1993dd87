use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::AnnotationError;
use crate::interval::IdRangeError;

/// Mints stable section ids from source paths.
///
/// Every path gets its own counter, so the n-th annotated section of
/// `docs/guide.rst` is `docsguide_n` no matter what else was processed in
/// between. Reset at the start of every build.
#[derive(Clone, Debug, Default)]
pub struct SectionRegistry {
    base_dir: Option<PathBuf>,
    counts: BTreeMap<String, u32>,
}

impl SectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ids are derived from paths relative to `base_dir` when possible.
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: Some(base_dir.into()),
            counts: BTreeMap::new(),
        }
    }

    pub fn reset(&mut self) {
        self.counts.clear();
    }

    pub fn mint(&mut self, source_path: &Path) -> String {
        let prefix = self.id_prefix(source_path);
        let count = self.counts.entry(prefix.clone()).or_insert(0);
        *count += 1;
        format!("{}_{}", prefix, count)
    }

    fn id_prefix(&self, source_path: &Path) -> String {
        let relative = self
            .base_dir
            .as_deref()
            .and_then(|base| source_path.strip_prefix(base).ok())
            .unwrap_or(source_path);
        clean_path(&relative.with_extension(""))
    }
}

/// Drops separators, drive colons and spaces from a path.
fn clean_path(path: &Path) -> String {
    path.to_string_lossy()
        .chars()
        .filter(|ch| !matches!(ch, '/' | '\\' | ' ' | ':'))
        .collect()
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SectionState {
    Idle,
    Open,
    Closed,
}

/// Accounting for the annotated section currently being built.
#[derive(Clone, Debug)]
pub struct SectionContext {
    state: SectionState,
    section_id: String,
    expected_highest: u8,
    caption_count: u32,
}

impl Default for SectionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl SectionContext {
    pub fn new() -> Self {
        Self {
            state: SectionState::Idle,
            section_id: String::new(),
            expected_highest: 0,
            caption_count: 0,
        }
    }

    pub fn state(&self) -> SectionState {
        self.state
    }

    pub fn section_id(&self) -> Option<&str> {
        match self.state {
            SectionState::Idle => None,
            SectionState::Open | SectionState::Closed => Some(&self.section_id),
        }
    }

    pub fn caption_count(&self) -> u32 {
        self.caption_count
    }

    pub fn begin(&mut self, section_id: String) -> Result<(), AnnotationError> {
        if self.state == SectionState::Open {
            return Err(AnnotationError::NestedSection {
                section: self.section_id.clone(),
            });
        }
        self.state = SectionState::Open;
        self.section_id = section_id;
        self.expected_highest = 0;
        self.caption_count = 0;
        Ok(())
    }

    pub fn expect_highest(&mut self, highest: u8) {
        self.expected_highest = highest;
    }

    /// Counts a caption and returns its 1-based number.
    pub fn record_caption(&mut self, context: &str) -> Result<u32, AnnotationError> {
        if self.state != SectionState::Open {
            return Err(AnnotationError::NotInSection {
                section: context.to_string(),
            });
        }
        self.caption_count += 1;
        Ok(self.caption_count)
    }

    /// Leaves `Open`, checking the caption count against the markers.
    pub fn finish(&mut self) -> Result<(), AnnotationError> {
        self.state = SectionState::Closed;
        if self.caption_count != u32::from(self.expected_highest) {
            return Err(AnnotationError::IdRangeMismatch {
                section: self.section_id.clone(),
                source: IdRangeError::CaptionCount {
                    captions: self.caption_count,
                    highest: self.expected_highest,
                },
            });
        }
        Ok(())
    }

    /// Leaves `Open` without any checks, after the section already failed.
    pub fn abort(&mut self) {
        self.state = SectionState::Closed;
    }
}

/// Per-document state threaded through every directive.
#[derive(Debug)]
pub struct BuildContext<'r> {
    registry: &'r mut SectionRegistry,
    source_path: PathBuf,
    pub section: SectionContext,
}

impl<'r> BuildContext<'r> {
    pub fn new(registry: &'r mut SectionRegistry, source_path: impl Into<PathBuf>) -> Self {
        Self {
            registry,
            source_path: source_path.into(),
            section: SectionContext::new(),
        }
    }

    /// Mints an id and opens a section under it.
    pub fn begin_section(&mut self) -> Result<String, AnnotationError> {
        if self.section.state() == SectionState::Open {
            return Err(AnnotationError::NestedSection {
                section: self.section.section_id.clone(),
            });
        }
        let section_id = self.registry.mint(&self.source_path);
        self.section.begin(section_id.clone())?;
        tracing::debug!(section = %section_id, "annotated section opened");
        Ok(section_id)
    }
}
