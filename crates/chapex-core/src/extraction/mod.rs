pub mod bbox_layout;
pub mod fonts;
pub mod outline;
pub mod poppler;
pub mod svg;

use std::ops::{Deref, DerefMut};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ChapexError;
use crate::geometry::BBox;

/// One table-of-contents marker as exposed by the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TocEntry {
    /// Nesting depth, 1 for top-level entries.
    pub level: usize,
    pub title: String,
    /// 0-based page index.
    pub start_page: usize,
}

/// A single text line with its geometry and, when the backend knows it, its font.
#[derive(Debug, Clone, PartialEq)]
pub struct TextLine {
    pub text: String,
    pub bbox: BBox,
    pub font: Option<String>,
}

/// A text block as delivered by the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct TextBlock {
    /// Position within the page's raw block list.
    pub ordinal: usize,
    /// Trimmed, non-empty.
    pub text: String,
    pub bbox: BBox,
    pub lines: Vec<TextLine>,
}

/// Geometry of a single page: text blocks in raw order plus vector drawing boxes.
#[derive(Debug, Clone, Default)]
pub struct PageGeometry {
    /// 0-based page index.
    pub index: usize,
    pub text_blocks: Vec<TextBlock>,
    pub drawings: Vec<BBox>,
}

impl PageGeometry {
    /// 1-based page number used in filenames and records.
    pub fn page_number(&self) -> usize {
        self.index + 1
    }
}

/// Trait for document geometry backends.
pub trait GeometryProvider: Send + Sync {
    /// Open a document, failing with `UnreadableDocument` when it cannot be read.
    fn open(&self, path: &Path) -> Result<Box<dyn PdfDocument>, ChapexError>;

    /// Name of this backend (for diagnostics).
    fn backend_name(&self) -> &str;
}

/// An open document. Read-only during extraction.
pub trait PdfDocument {
    /// TOC entries in document order. An empty list is a valid answer.
    fn table_of_contents(&self) -> Result<Vec<TocEntry>, ChapexError>;

    fn page_count(&self) -> usize;

    /// Text blocks and drawing boxes of the page at `index` (0-based).
    fn load_page(&self, index: usize) -> Result<PageGeometry, ChapexError>;

    /// Rasterize `region` of page `index` at `scale` times the native resolution,
    /// returning PNG bytes.
    fn render_region(&self, index: usize, region: &BBox, scale: f32)
        -> Result<Vec<u8>, ChapexError>;

    /// Release backend resources. Called exactly once by [`DocumentGuard`].
    fn close(&mut self) -> Result<(), ChapexError> {
        Ok(())
    }
}

/// Owns an open document and closes it when dropped, error paths included.
pub struct DocumentGuard {
    inner: Box<dyn PdfDocument>,
}

impl DocumentGuard {
    pub fn new(inner: Box<dyn PdfDocument>) -> Self {
        DocumentGuard { inner }
    }

    pub fn open(provider: &dyn GeometryProvider, path: &Path) -> Result<Self, ChapexError> {
        Ok(Self::new(provider.open(path)?))
    }
}

impl Deref for DocumentGuard {
    type Target = dyn PdfDocument;

    fn deref(&self) -> &Self::Target {
        self.inner.as_ref()
    }
}

impl DerefMut for DocumentGuard {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.inner.as_mut()
    }
}

impl Drop for DocumentGuard {
    fn drop(&mut self) {
        if let Err(e) = self.inner.close() {
            warn!(error = %e, "failed to close document");
        }
    }
}
