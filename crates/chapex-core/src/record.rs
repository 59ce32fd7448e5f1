//! The persisted chapter record and its reader/writer.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::annotate::{Domain, PageMeta};
use crate::caption::FigureKind;
use crate::chapters::ChapterRange;
use crate::error::ChapexError;
use crate::geometry::BBox;

pub const RECORD_FILE: &str = "chapter.json";

/// A rendered figure or table with its caption context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FigureItem {
    /// Image filename, relative to the chapter directory.
    pub file: String,
    /// 1-based.
    pub page_number: usize,
    pub bounding_box: BBox,
    pub caption: String,
    pub local_text: Vec<String>,
    pub kind: FigureKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRecord {
    /// 1-based.
    pub page_number: usize,
    pub text_blocks: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMetaEntry {
    pub page_number: usize,
    pub meta: PageMeta,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterMeta {
    #[serde(default)]
    pub pages: Vec<PageMetaEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterRecord {
    pub chapter_index: usize,
    pub title: String,
    /// 1-based, inclusive.
    pub start_page: usize,
    /// 1-based, inclusive.
    pub end_page: usize,
    pub domain: Domain,
    pub pages: Vec<PageRecord>,
    pub images: Vec<FigureItem>,
    #[serde(default)]
    pub meta: ChapterMeta,
}

impl ChapterRecord {
    pub fn new(
        range: &ChapterRange,
        pages: Vec<PageRecord>,
        images: Vec<FigureItem>,
        meta: ChapterMeta,
        domain: Domain,
    ) -> Self {
        ChapterRecord {
            chapter_index: range.index,
            title: range.title.clone(),
            start_page: range.start_page + 1,
            end_page: range.end_page + 1,
            domain,
            pages,
            images,
            meta,
        }
    }

    /// All page text in reading order.
    pub fn text_blocks(&self) -> impl Iterator<Item = &str> {
        self.pages
            .iter()
            .flat_map(|p| p.text_blocks.iter().map(String::as_str))
    }
}

/// `<root>/chapter_NN`
pub fn chapter_dir(root: &Path, chapter_index: usize) -> PathBuf {
    root.join(format!("chapter_{chapter_index:02}"))
}

/// Persist `record` as `chapter.json` in `dir`, replacing any earlier record.
///
/// The JSON is written to a temporary sibling and renamed into place.
pub fn write_chapter(dir: &Path, record: &ChapterRecord) -> Result<PathBuf, ChapexError> {
    let path = dir.join(RECORD_FILE);
    let write_error = |reason: String| ChapexError::ChapterWrite {
        chapter_index: record.chapter_index,
        path: path.clone(),
        reason,
    };

    std::fs::create_dir_all(dir).map_err(|e| write_error(e.to_string()))?;
    let json = serde_json::to_string_pretty(record).map_err(|e| write_error(e.to_string()))?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| write_error(e.to_string()))?;
    tmp.write_all(json.as_bytes())
        .and_then(|_| tmp.write_all(b"\n"))
        .map_err(|e| write_error(e.to_string()))?;
    // Temp files are created owner-only; records are ordinary shared output.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tmp.as_file()
            .set_permissions(std::fs::Permissions::from_mode(0o644))
            .map_err(|e| write_error(e.to_string()))?;
    }
    tmp.persist(&path)
        .map_err(|e| write_error(e.error.to_string()))?;

    info!(
        chapter = record.chapter_index,
        pages = record.pages.len(),
        images = record.images.len(),
        path = %path.display(),
        "wrote chapter record"
    );
    Ok(path)
}

/// Read the chapter record stored in `dir`.
pub fn load_chapter(dir: &Path) -> Result<ChapterRecord, ChapexError> {
    let path = dir.join(RECORD_FILE);
    let content = std::fs::read_to_string(&path).map_err(|e| ChapexError::RecordLoad {
        path: path.clone(),
        reason: e.to_string(),
    })?;
    serde_json::from_str(&content).map_err(|e| ChapexError::RecordLoad {
        path,
        reason: e.to_string(),
    })
}
