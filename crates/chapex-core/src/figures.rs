//! Caption-anchored figure detection.
//!
//! Figures are found by working backward from captions: for every caption on
//! a page, the drawings sitting just above it are unioned into one region,
//! which is then rendered to a PNG next to the chapter record.

use std::path::Path;

use tracing::{debug, warn};

use crate::caption::{caption_kind, FigureKind};
use crate::config::FigureOptions;
use crate::error::ChapexError;
use crate::extraction::{PageGeometry, PdfDocument};
use crate::geometry::BBox;
use crate::record::FigureItem;

/// A caption matched to a drawing region, ready to render.
#[derive(Debug, Clone, PartialEq)]
pub struct FigurePlan {
    /// 1-based, per page, in caption order.
    pub ordinal: usize,
    /// 0-based page index.
    pub page_index: usize,
    pub region: BBox,
    pub caption: String,
    pub local_text: Vec<String>,
    pub kind: FigureKind,
}

impl FigurePlan {
    pub fn page_number(&self) -> usize {
        self.page_index + 1
    }
}

pub fn figure_filename(chapter_index: usize, page_number: usize, ordinal: usize) -> String {
    format!("chapter{chapter_index:02}_p{page_number:04}_diagram{ordinal:02}.png")
}

/// Drop drawings too small in either dimension to be a figure.
pub fn filter_drawings(drawings: &[BBox], min_size: f32) -> Vec<BBox> {
    drawings
        .iter()
        .filter(|r| r.width() >= min_size && r.height() >= min_size)
        .copied()
        .collect()
}

/// Drawings that plausibly belong to a caption: above it, close enough
/// vertically, and not entirely off to either side.
pub fn candidate_rects(caption: &BBox, drawings: &[BBox], options: &FigureOptions) -> Vec<BBox> {
    drawings
        .iter()
        .filter(|r| {
            let above = r.y1 <= caption.y0 + options.caption_top_tolerance;
            let near = caption.y0 - r.y1 <= options.max_caption_distance;
            let left_of = r.x1 < caption.x0 - options.horizontal_slack;
            let right_of = r.x0 > caption.x1 + options.horizontal_slack;
            above && near && !left_of && !right_of
        })
        .copied()
        .collect()
}

pub fn union_region(rects: &[BBox]) -> Option<BBox> {
    BBox::union_all(rects)
}

/// Match every caption on the page to its drawing region.
///
/// Captions without a candidate drawing produce nothing and do not consume
/// an ordinal.
pub fn plan_figures(page: &PageGeometry, options: &FigureOptions) -> Vec<FigurePlan> {
    let drawings = filter_drawings(&page.drawings, options.min_drawing_size);
    let mut plans = Vec::new();

    for block in &page.text_blocks {
        let Some(kind) = caption_kind(&block.text) else {
            continue;
        };
        let candidates = candidate_rects(&block.bbox, &drawings, options);
        let Some(region) = union_region(&candidates) else {
            debug!(
                page = page.page_number(),
                caption = %block.text,
                "caption has no drawing above it"
            );
            continue;
        };

        let local_text = page
            .text_blocks
            .iter()
            .filter(|b| b.ordinal > block.ordinal && !b.text.is_empty())
            .take(options.max_local_text)
            .map(|b| b.text.clone())
            .collect();

        plans.push(FigurePlan {
            ordinal: plans.len() + 1,
            page_index: page.index,
            region,
            caption: block.text.clone(),
            local_text,
            kind,
        });
    }

    plans
}

/// Render each plan into `dir`. A plan that fails to render is logged and
/// skipped; the rest of the page is unaffected.
pub fn render_figures(
    doc: &dyn PdfDocument,
    plans: &[FigurePlan],
    dir: &Path,
    chapter_index: usize,
    scale: f32,
) -> Vec<FigureItem> {
    let mut items = Vec::new();
    for plan in plans {
        match render_one(doc, plan, dir, chapter_index, scale) {
            Ok(item) => items.push(item),
            Err(e) => warn!(
                chapter = chapter_index,
                page = plan.page_number(),
                ordinal = plan.ordinal,
                error = %e,
                "skipping figure"
            ),
        }
    }
    items
}

fn render_one(
    doc: &dyn PdfDocument,
    plan: &FigurePlan,
    dir: &Path,
    chapter_index: usize,
    scale: f32,
) -> Result<FigureItem, ChapexError> {
    let page_number = plan.page_number();
    let render_error = |reason: String| ChapexError::FigureRender {
        page_number,
        reason,
    };

    if plan.region.is_degenerate() {
        return Err(render_error(format!(
            "degenerate region {:?}",
            plan.region
        )));
    }

    let bytes = doc
        .render_region(plan.page_index, &plan.region, scale)
        .map_err(|e| render_error(e.to_string()))?;
    if bytes.is_empty() {
        return Err(render_error("renderer returned no data".into()));
    }

    let file = figure_filename(chapter_index, page_number, plan.ordinal);
    std::fs::write(dir.join(&file), &bytes)
        .map_err(|e| render_error(format!("cannot write {file}: {e}")))?;

    Ok(FigureItem {
        file,
        page_number,
        bounding_box: plan.region,
        caption: plan.caption.clone(),
        local_text: plan.local_text.clone(),
        kind: plan.kind,
    })
}

/// Remove figure images left in `dir` by an earlier run of this chapter.
pub fn clear_stale_figures(dir: &Path, chapter_index: usize) -> Result<usize, ChapexError> {
    if !dir.is_dir() {
        return Ok(0);
    }
    let prefix = format!("chapter{chapter_index:02}_p");
    let mut removed = 0;
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if name.starts_with(&prefix) && name.contains("_diagram") && name.ends_with(".png") {
            std::fs::remove_file(entry.path())?;
            removed += 1;
        }
    }
    if removed > 0 {
        debug!(chapter = chapter_index, removed, "removed stale figure images");
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::{TextBlock, TocEntry};

    fn block(ordinal: usize, text: &str, bbox: BBox) -> TextBlock {
        TextBlock {
            ordinal,
            text: text.into(),
            bbox,
            lines: Vec::new(),
        }
    }

    fn page(text_blocks: Vec<TextBlock>, drawings: Vec<BBox>) -> PageGeometry {
        PageGeometry {
            index: 0,
            text_blocks,
            drawings,
        }
    }

    struct StubDocument {
        fail_pages: Vec<usize>,
    }

    impl PdfDocument for StubDocument {
        fn table_of_contents(&self) -> Result<Vec<TocEntry>, ChapexError> {
            Ok(Vec::new())
        }

        fn page_count(&self) -> usize {
            10
        }

        fn load_page(&self, index: usize) -> Result<PageGeometry, ChapexError> {
            Ok(PageGeometry {
                index,
                ..Default::default()
            })
        }

        fn render_region(&self, index: usize, _: &BBox, _: f32) -> Result<Vec<u8>, ChapexError> {
            if self.fail_pages.contains(&index) {
                return Err(ChapexError::Extraction("renderer crashed".into()));
            }
            Ok(b"\x89PNG fake".to_vec())
        }
    }

    #[test]
    fn test_filename_format() {
        assert_eq!(figure_filename(1, 1, 1), "chapter01_p0001_diagram01.png");
        assert_eq!(figure_filename(12, 345, 3), "chapter12_p0345_diagram03.png");
    }

    #[test]
    fn test_small_drawings_filtered() {
        let drawings = vec![
            BBox::new(0.0, 0.0, 49.0, 200.0),
            BBox::new(0.0, 0.0, 200.0, 10.0),
            BBox::new(0.0, 0.0, 50.0, 50.0),
        ];
        assert_eq!(
            filter_drawings(&drawings, 50.0),
            vec![BBox::new(0.0, 0.0, 50.0, 50.0)]
        );
    }

    #[test]
    fn test_two_rects_above_caption_are_unioned() {
        let p = page(
            vec![block(0, "그림 1-1 예시", BBox::new(10.0, 205.0, 200.0, 215.0))],
            vec![
                BBox::new(10.0, 10.0, 100.0, 100.0),
                BBox::new(90.0, 10.0, 200.0, 100.0),
            ],
        );
        let plans = plan_figures(&p, &FigureOptions::default());
        assert_eq!(plans.len(), 1);
        assert_eq!(plans[0].region, BBox::new(10.0, 10.0, 200.0, 100.0));
        assert_eq!(plans[0].ordinal, 1);
        assert_eq!(plans[0].kind, FigureKind::Figure);
    }

    #[test]
    fn test_candidate_filters() {
        let caption = BBox::new(100.0, 500.0, 300.0, 510.0);
        let options = FigureOptions::default();
        let drawings = vec![
            // below the caption
            BBox::new(100.0, 520.0, 300.0, 700.0),
            // overlaps the caption top within tolerance
            BBox::new(100.0, 300.0, 300.0, 504.0),
            // far left
            BBox::new(0.0, 300.0, 19.0, 400.0),
            // far right
            BBox::new(381.0, 300.0, 500.0, 400.0),
            // just inside the slack on the left
            BBox::new(0.0, 300.0, 21.0, 400.0),
        ];
        let picked = candidate_rects(&caption, &drawings, &options);
        assert_eq!(
            picked,
            vec![
                BBox::new(100.0, 300.0, 300.0, 504.0),
                BBox::new(0.0, 300.0, 21.0, 400.0),
            ]
        );
    }

    #[test]
    fn test_distant_drawing_ignored() {
        let caption = BBox::new(10.0, 800.0, 200.0, 810.0);
        let options = FigureOptions {
            max_caption_distance: 100.0,
            ..Default::default()
        };
        let drawings = vec![BBox::new(10.0, 10.0, 200.0, 100.0)];
        assert!(candidate_rects(&caption, &drawings, &options).is_empty());
    }

    #[test]
    fn test_caption_without_drawing_yields_nothing() {
        let p = page(
            vec![
                block(0, "표 2-1 요약", BBox::new(10.0, 100.0, 200.0, 110.0)),
                block(1, "본문", BBox::new(10.0, 120.0, 200.0, 130.0)),
            ],
            vec![BBox::new(10.0, 300.0, 200.0, 400.0)],
        );
        assert!(plan_figures(&p, &FigureOptions::default()).is_empty());
    }

    #[test]
    fn test_local_text_follows_caption_order() {
        let p = page(
            vec![
                block(0, "앞 문단", BBox::new(10.0, 0.0, 200.0, 5.0)),
                block(1, "Figure 2.1 Stack", BBox::new(10.0, 205.0, 200.0, 215.0)),
                block(2, "하나", BBox::new(10.0, 220.0, 200.0, 230.0)),
                block(4, "둘", BBox::new(10.0, 240.0, 200.0, 250.0)),
                block(5, "셋", BBox::new(10.0, 260.0, 200.0, 270.0)),
                block(6, "넷", BBox::new(10.0, 280.0, 200.0, 290.0)),
            ],
            vec![BBox::new(10.0, 10.0, 200.0, 200.0)],
        );
        let plans = plan_figures(&p, &FigureOptions::default());
        assert_eq!(plans[0].local_text, vec!["하나", "둘", "셋"]);
    }

    #[test]
    fn test_ordinals_skip_unmatched_captions() {
        let p = page(
            vec![
                block(0, "그림 1-1 위", BBox::new(10.0, 205.0, 200.0, 215.0)),
                block(1, "표 1-2 없음", BBox::new(400.0, 50.0, 500.0, 60.0)),
                block(2, "그림 1-3 아래", BBox::new(10.0, 505.0, 200.0, 515.0)),
            ],
            vec![
                BBox::new(10.0, 10.0, 200.0, 200.0),
                BBox::new(10.0, 300.0, 200.0, 500.0),
            ],
        );
        let plans = plan_figures(&p, &FigureOptions::default());
        assert_eq!(plans.len(), 2);
        assert_eq!(plans[1].ordinal, 2);
        assert_eq!(plans[1].caption, "그림 1-3 아래");
        assert_eq!(plans[1].region, BBox::new(10.0, 10.0, 200.0, 500.0));
    }

    #[test]
    fn test_render_failure_skips_only_that_figure() {
        let dir = tempfile::tempdir().unwrap();
        let doc = StubDocument { fail_pages: vec![1] };
        let plan = |page_index, ordinal| FigurePlan {
            ordinal,
            page_index,
            region: BBox::new(10.0, 10.0, 200.0, 100.0),
            caption: "그림 1-1".into(),
            local_text: Vec::new(),
            kind: FigureKind::Figure,
        };
        let mut degenerate = plan(0, 2);
        degenerate.region = BBox::new(10.0, 10.0, 10.0, 100.0);
        let plans = vec![plan(0, 1), degenerate, plan(1, 1)];

        let items = render_figures(&doc, &plans, dir.path(), 3, 3.0);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].file, "chapter03_p0001_diagram01.png");
        assert!(dir.path().join(&items[0].file).is_file());
        assert!(!dir.path().join("chapter03_p0001_diagram02.png").exists());
    }

    #[test]
    fn test_clear_stale_figures_only_touches_own_chapter() {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "chapter02_p0004_diagram01.png",
            "chapter02_p0009_diagram02.png",
            "chapter12_p0004_diagram01.png",
            "chapter.json",
        ] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        assert_eq!(clear_stale_figures(dir.path(), 2).unwrap(), 2);
        assert!(dir.path().join("chapter12_p0004_diagram01.png").exists());
        assert!(dir.path().join("chapter.json").exists());
    }
}
