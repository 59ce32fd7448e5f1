//! Chapter-by-chapter extraction driver.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::annotate::{Domain, PageMeta};
use crate::chapters::{ChapterPlan, ChapterRange};
use crate::config::{ExtractOptions, FigureOptions};
use crate::error::ChapexError;
use crate::extraction::{DocumentGuard, GeometryProvider, PdfDocument};
use crate::figures::clear_stale_figures;
use crate::page::extract_page;
use crate::record::{
    chapter_dir, write_chapter, ChapterMeta, ChapterRecord, PageMetaEntry, PageRecord,
};

/// Cooperative cancellation flag, checked between chapters.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WrittenChapter {
    pub chapter_index: usize,
    pub title: String,
    pub path: PathBuf,
    pub pages: usize,
    pub images: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterFailure {
    pub chapter_index: usize,
    pub title: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionReport {
    pub written: Vec<WrittenChapter>,
    pub failed: Vec<ChapterFailure>,
    pub cancelled: bool,
}

impl ExtractionReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && !self.cancelled
    }
}

/// Extract one chapter into `<out_root>/chapter_NN` and return the record path.
pub fn extract_chapter(
    doc: &dyn PdfDocument,
    range: &ChapterRange,
    out_root: &Path,
    domain: Domain,
    options: &FigureOptions,
) -> Result<PathBuf, ChapexError> {
    build_chapter(doc, range, out_root, domain, options).map(|(path, _)| path)
}

fn build_chapter(
    doc: &dyn PdfDocument,
    range: &ChapterRange,
    out_root: &Path,
    domain: Domain,
    options: &FigureOptions,
) -> Result<(PathBuf, ChapterRecord), ChapexError> {
    let dir = chapter_dir(out_root, range.index);
    let write_error = |reason: String| ChapexError::ChapterWrite {
        chapter_index: range.index,
        path: dir.clone(),
        reason,
    };
    std::fs::create_dir_all(&dir).map_err(|e| write_error(e.to_string()))?;
    clear_stale_figures(&dir, range.index).map_err(|e| write_error(e.to_string()))?;

    let mut pages = Vec::with_capacity(range.page_count());
    let mut images = Vec::new();
    let mut meta = ChapterMeta::default();

    for page_index in range.start_page..=range.end_page {
        let page_number = page_index + 1;
        let (page, page_meta) =
            match extract_page(doc, page_index, range.index, &dir, domain, options) {
                Ok(extracted) => {
                    debug!(
                        chapter = range.index,
                        page = page_number,
                        blocks = extracted.text_blocks.len(),
                        figures = extracted.images.len(),
                        "extracted page"
                    );
                    images.extend(extracted.images);
                    (
                        PageRecord {
                            page_number,
                            text_blocks: extracted.text_blocks,
                        },
                        extracted.meta,
                    )
                }
                Err(e) => {
                    warn!(chapter = range.index, page = page_number, error = %e, "page skipped");
                    (
                        PageRecord {
                            page_number,
                            text_blocks: Vec::new(),
                        },
                        PageMeta {
                            extraction_error: Some(e.to_string()),
                            ..Default::default()
                        },
                    )
                }
            };
        pages.push(page);
        if !page_meta.is_empty() {
            meta.pages.push(PageMetaEntry {
                page_number,
                meta: page_meta,
            });
        }
    }

    let record = ChapterRecord::new(range, pages, images, meta, domain);
    let path = write_chapter(&dir, &record)?;
    Ok((path, record))
}

/// Extract `ranges` in order. Chapter failures are collected, not propagated;
/// `cancel` is checked before each chapter starts.
pub fn run_extraction(
    doc: &dyn PdfDocument,
    ranges: &[ChapterRange],
    out_root: &Path,
    options: &ExtractOptions,
    cancel: &CancelToken,
    progress: &mut dyn FnMut(f32),
) -> ExtractionReport {
    let mut report = ExtractionReport::default();
    let total = ranges.len();
    progress(0.0);

    for (done, range) in ranges.iter().enumerate() {
        if cancel.is_cancelled() {
            info!(completed = done, total, "extraction cancelled");
            report.cancelled = true;
            return report;
        }

        info!(
            chapter = range.index,
            title = %range.title,
            start = range.start_page + 1,
            end = range.end_page + 1,
            "extracting chapter"
        );
        match build_chapter(doc, range, out_root, options.domain, &options.figures) {
            Ok((path, record)) => report.written.push(WrittenChapter {
                chapter_index: range.index,
                title: range.title.clone(),
                path,
                pages: record.pages.len(),
                images: record.images.len(),
            }),
            Err(e) => {
                warn!(chapter = range.index, error = %e, "chapter failed");
                report.failed.push(ChapterFailure {
                    chapter_index: range.index,
                    title: range.title.clone(),
                    error: e.to_string(),
                });
            }
        }
        progress((done + 1) as f32 / total as f32);
    }

    progress(1.0);
    report
}

/// Open `path`, resolve `plan` against its table of contents and extract
/// every chapter. The document is closed on every exit path.
pub fn extract_document(
    provider: &dyn GeometryProvider,
    path: &Path,
    plan: &ChapterPlan,
    out_root: &Path,
    options: &ExtractOptions,
    cancel: &CancelToken,
    progress: &mut dyn FnMut(f32),
) -> Result<ExtractionReport, ChapexError> {
    let doc = DocumentGuard::open(provider, path)?;
    let toc = match plan {
        ChapterPlan::Manual(_) => Vec::new(),
        _ => doc.table_of_contents()?,
    };
    let ranges = plan.resolve(&toc, doc.page_count())?;
    info!(
        path = %path.display(),
        backend = provider.backend_name(),
        chapters = ranges.len(),
        "starting extraction"
    );
    Ok(run_extraction(
        &*doc, &ranges, out_root, options, cancel, progress,
    ))
}
