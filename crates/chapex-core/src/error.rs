use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum ChapexError {
    #[error("cannot open document {path}: {reason}")]
    UnreadableDocument { path: PathBuf, reason: String },

    #[error("document has no table of contents. Select pages manually with --range START-END")]
    NoTableOfContents,

    #[error("selected items {indices:?} are not contiguous. Only adjacent items can be grouped")]
    NonContiguousSelection { indices: Vec<usize> },

    #[error("no items selected for grouping")]
    EmptySelection,

    #[error("TOC item {index} does not exist (document has {available} items)")]
    UnknownTocItem { index: usize, available: usize },

    #[error("invalid page range {start}-{end}: {reason}")]
    InvalidRange {
        start: usize,
        end: usize,
        reason: String,
    },

    #[error("failed to render figure on page {page_number}: {reason}")]
    FigureRender { page_number: usize, reason: String },

    #[error("failed to write chapter {chapter_index} to {path}: {reason}")]
    ChapterWrite {
        chapter_index: usize,
        path: PathBuf,
        reason: String,
    },

    #[error("failed to load chapter record from {path}: {reason}")]
    RecordLoad { path: PathBuf, reason: String },

    #[error("failed to load options from {path}: {reason}")]
    ConfigLoad { path: PathBuf, reason: String },

    #[error("invalid options: {0}")]
    ConfigInvalid(String),

    #[error("{tool} not found. Install poppler: brew install poppler (macOS) or apt install poppler-utils (Linux)")]
    ToolNotFound { tool: String },

    #[error("{tool} failed with exit code {code}: {stderr}")]
    ToolFailed {
        tool: String,
        code: i32,
        stderr: String,
    },

    #[error("extraction failed: {0}")]
    Extraction(String),

    #[error("malformed XML from document backend: {0}")]
    Xml(String),

    #[error("text generation failed: {0}")]
    Generation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
