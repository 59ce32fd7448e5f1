use std::path::Path;

use crate::annotate::{annotate, Domain, PageMeta};
use crate::config::FigureOptions;
use crate::error::ChapexError;
use crate::extraction::PdfDocument;
use crate::figures::{plan_figures, render_figures};
use crate::record::FigureItem;

/// Everything extracted from one page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageExtraction {
    pub page_number: usize,
    pub text_blocks: Vec<String>,
    pub images: Vec<FigureItem>,
    pub meta: PageMeta,
}

/// Load one page, render its captioned figures into `dir` and annotate it
/// for `domain`. Only a failure to load the page itself is returned as an
/// error; figure failures are skipped.
pub fn extract_page(
    doc: &dyn PdfDocument,
    page_index: usize,
    chapter_index: usize,
    dir: &Path,
    domain: Domain,
    options: &FigureOptions,
) -> Result<PageExtraction, ChapexError> {
    let page = doc.load_page(page_index)?;

    let text_blocks = page
        .text_blocks
        .iter()
        .map(|b| b.text.trim())
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect();

    let plans = plan_figures(&page, options);
    let images = render_figures(doc, &plans, dir, chapter_index, options.render_scale);

    Ok(PageExtraction {
        page_number: page.page_number(),
        text_blocks,
        images,
        meta: annotate(&page, domain),
    })
}
