use crate::span::Span;

#[derive(Clone, Debug, PartialEq)]
pub struct Document {
    pub span: Span,
    pub blocks: Vec<Block>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Block {
    pub span: Span,
    pub kind: BlockKind,
    /// Source offset of every line of each [`Block::marker_texts`] entry, in
    /// the same order. Empty for sections.
    pub line_starts: Vec<Vec<usize>>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum BlockKind {
    /// Lines of running text, joined with `\n`.
    Paragraph { text: String },
    CodeBlock(CodeBlock),
    /// `.. annotated::` and everything nested in it.
    Annotated { blocks: Vec<Block> },
    /// `.. annotation::`, one caption.
    Annotation(Caption),
}

#[derive(Clone, Debug, PartialEq)]
pub struct CodeBlock {
    pub lang: String,
    pub text: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Caption {
    pub paragraphs: Vec<String>,
}

impl Block {
    /// Every piece of raw text in this block that may carry markers.
    pub fn marker_texts(&self) -> Vec<&str> {
        match &self.kind {
            BlockKind::Paragraph { text } => vec![text.as_str()],
            BlockKind::CodeBlock(code) => vec![code.text.as_str()],
            BlockKind::Annotated { blocks } => {
                blocks.iter().flat_map(|block| block.marker_texts()).collect()
            }
            BlockKind::Annotation(caption) => {
                caption.paragraphs.iter().map(String::as_str).collect()
            }
        }
    }

    /// Maps `column` (in scalar values) on `line` of marker text `index` back
    /// to a byte offset in the document.
    pub fn source_offset(&self, index: usize, line: usize, column: usize) -> Option<usize> {
        let text = *self.marker_texts().get(index)?;
        let line_text = text.split('\n').nth(line)?;
        let start = *self.line_starts.get(index)?.get(line)?;
        let byte = line_text
            .char_indices()
            .nth(column)
            .map_or(line_text.len(), |(idx, _)| idx);
        Some(start + byte)
    }

    pub fn describe(&self) -> &'static str {
        match &self.kind {
            BlockKind::Paragraph { .. } => "paragraph",
            BlockKind::CodeBlock(_) => "code-block",
            BlockKind::Annotated { .. } => "annotated",
            BlockKind::Annotation(_) => "annotation",
        }
    }
}
