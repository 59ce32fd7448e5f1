//! Chapter boundaries from a sparse table of contents.
//!
//! Every range derived here is 0-based and inclusive on both ends. The end of
//! an entry is always `next.start - 1`; the last entry runs to the last page.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ChapexError;
use crate::extraction::TocEntry;

/// A contiguous, inclusive page range that becomes one chapter record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterRange {
    /// 1-based, dense within one plan.
    pub index: usize,
    pub title: String,
    /// 0-based.
    pub start_page: usize,
    /// 0-based, inclusive.
    pub end_page: usize,
}

impl ChapterRange {
    pub fn page_count(&self) -> usize {
        self.end_page + 1 - self.start_page
    }
}

/// A TOC entry of any level with its derived page range (display variant).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TocItem {
    /// 1-based position in the full TOC.
    pub index: usize,
    pub level: usize,
    pub title: String,
    pub start_page: usize,
    pub end_page: usize,
}

/// Top-level chapters: level-1 entries in document order.
///
/// The ranges are disjoint. An entry pointing past the last page is dropped,
/// and an entry that does not start after the previous kept entry is folded
/// into that chapter.
pub fn resolve_top_level(
    toc: &[TocEntry],
    page_count: usize,
) -> Result<Vec<ChapterRange>, ChapexError> {
    if toc.is_empty() || page_count == 0 {
        return Err(ChapexError::NoTableOfContents);
    }
    let mut top: Vec<&TocEntry> = Vec::new();
    for entry in toc.iter().filter(|e| e.level == 1) {
        if entry.start_page >= page_count {
            warn!(
                title = %entry.title,
                page = entry.start_page + 1,
                "TOC entry points past the last page; dropped"
            );
            continue;
        }
        if let Some(prev) = top.last() {
            if entry.start_page <= prev.start_page {
                warn!(
                    title = %entry.title,
                    page = entry.start_page + 1,
                    merged_into = %prev.title,
                    "TOC entry does not start after the previous chapter; merged into it"
                );
                continue;
            }
        }
        top.push(entry);
    }
    if top.is_empty() {
        return Err(ChapexError::NoTableOfContents);
    }

    Ok(spans(&top, page_count)
        .into_iter()
        .zip(&top)
        .enumerate()
        .map(|(i, ((start, end), entry))| ChapterRange {
            index: i + 1,
            title: entry.title.clone(),
            start_page: start,
            end_page: end,
        })
        .collect())
}

/// Every TOC entry regardless of level, for manual curation.
///
/// Item indices must stay stable, so nothing is dropped here: entries sharing
/// a start page, or pointing past the last page, get one-page ranges that can
/// overlap their neighbours.
pub fn resolve_all_items(
    toc: &[TocEntry],
    page_count: usize,
) -> Result<Vec<TocItem>, ChapexError> {
    if toc.is_empty() || page_count == 0 {
        return Err(ChapexError::NoTableOfContents);
    }
    let all: Vec<&TocEntry> = toc.iter().collect();

    Ok(spans(&all, page_count)
        .into_iter()
        .zip(&all)
        .enumerate()
        .map(|(i, ((start, end), entry))| TocItem {
            index: i + 1,
            level: entry.level,
            title: entry.title.clone(),
            start_page: start,
            end_page: end,
        })
        .collect())
}

fn spans(entries: &[&TocEntry], page_count: usize) -> Vec<(usize, usize)> {
    let last_page = page_count - 1;
    let starts: Vec<usize> = entries
        .iter()
        .map(|e| {
            if e.start_page > last_page {
                warn!(title = %e.title, page = e.start_page + 1, "TOC entry points past the last page");
            }
            e.start_page.min(last_page)
        })
        .collect();

    starts
        .iter()
        .enumerate()
        .map(|(i, &start)| {
            let end = match starts.get(i + 1) {
                Some(&next) if next > start => next - 1,
                Some(_) => {
                    warn!(
                        title = %entries[i].title,
                        page = start + 1,
                        "next TOC entry does not start after this one; range clamped to one page and overlaps the next"
                    );
                    start
                }
                None => last_page,
            };
            (start, end)
        })
        .collect()
}

/// Merge a contiguous run of TOC items (1-based indices) into one chapter.
pub fn group_contiguous(
    selected: &[usize],
    items: &[TocItem],
    group_index: usize,
) -> Result<ChapterRange, ChapexError> {
    let first = *selected.first().ok_or(ChapexError::EmptySelection)?;
    if selected.windows(2).any(|w| w[1] != w[0] + 1) {
        return Err(ChapexError::NonContiguousSelection {
            indices: selected.to_vec(),
        });
    }

    let chosen = selected
        .iter()
        .map(|&i| lookup(items, i))
        .collect::<Result<Vec<_>, _>>()?;

    let title = match lookup(items, first)?.title.trim() {
        "" => format!("Group {group_index:02}"),
        t => t.to_string(),
    };

    Ok(ChapterRange {
        index: group_index,
        title,
        start_page: chosen.iter().map(|i| i.start_page).min().unwrap_or(0),
        end_page: chosen.iter().map(|i| i.end_page).max().unwrap_or(0),
    })
}

fn lookup(items: &[TocItem], index: usize) -> Result<&TocItem, ChapexError> {
    index
        .checked_sub(1)
        .and_then(|i| items.get(i))
        .ok_or(ChapexError::UnknownTocItem {
            index,
            available: items.len(),
        })
}

/// Which chapters to extract, as an immutable value chosen up front.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChapterPlan {
    /// One chapter per level-1 TOC entry.
    TopLevel,
    /// One chapter per selected TOC item (1-based, any level).
    Items(Vec<usize>),
    /// One chapter per contiguous group of TOC items.
    Groups(Vec<Vec<usize>>),
    /// Explicit ranges, for documents without a usable TOC.
    Manual(Vec<ChapterRange>),
}

impl ChapterPlan {
    /// Turn the plan into chapter ranges with dense 1-based indices in plan order.
    pub fn resolve(
        &self,
        toc: &[TocEntry],
        page_count: usize,
    ) -> Result<Vec<ChapterRange>, ChapexError> {
        match self {
            ChapterPlan::TopLevel => resolve_top_level(toc, page_count),
            ChapterPlan::Items(indices) => {
                let items = resolve_all_items(toc, page_count)?;
                indices
                    .iter()
                    .enumerate()
                    .map(|(n, &i)| {
                        let item = lookup(&items, i)?;
                        Ok(ChapterRange {
                            index: n + 1,
                            title: item.title.clone(),
                            start_page: item.start_page,
                            end_page: item.end_page,
                        })
                    })
                    .collect()
            }
            ChapterPlan::Groups(groups) => {
                let items = resolve_all_items(toc, page_count)?;
                groups
                    .iter()
                    .enumerate()
                    .map(|(n, g)| group_contiguous(g, &items, n + 1))
                    .collect()
            }
            ChapterPlan::Manual(ranges) => ranges
                .iter()
                .enumerate()
                .map(|(n, r)| {
                    validate_range(r.start_page, r.end_page, page_count)?;
                    Ok(ChapterRange {
                        index: n + 1,
                        ..r.clone()
                    })
                })
                .collect(),
        }
    }
}

fn validate_range(start: usize, end: usize, page_count: usize) -> Result<(), ChapexError> {
    let invalid = |reason: String| ChapexError::InvalidRange {
        start: start + 1,
        end: end + 1,
        reason,
    };
    if end < start {
        return Err(invalid("end page precedes start page".into()));
    }
    if end >= page_count {
        return Err(invalid(format!("document has {page_count} pages")));
    }
    Ok(())
}

/// Parse a 1-based inclusive `START-END` range (or a single page) into 0-based pages.
pub fn parse_page_range(s: &str) -> Result<(usize, usize), ChapexError> {
    let bad = |reason: &str| ChapexError::InvalidRange {
        start: 0,
        end: 0,
        reason: format!("'{s}': {reason}"),
    };
    let (a, b) = match s.split_once('-') {
        Some((a, b)) => (a.trim(), b.trim()),
        None => (s.trim(), s.trim()),
    };
    let start: usize = a.parse().map_err(|_| bad("start is not a page number"))?;
    let end: usize = b.parse().map_err(|_| bad("end is not a page number"))?;
    if start == 0 || end == 0 {
        return Err(bad("pages are numbered from 1"));
    }
    if end < start {
        return Err(bad("end page precedes start page"));
    }
    Ok((start - 1, end - 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(level: usize, title: &str, start_page: usize) -> TocEntry {
        TocEntry {
            level,
            title: title.into(),
            start_page,
        }
    }

    fn sample_toc() -> Vec<TocEntry> {
        vec![
            entry(1, "1장 개요", 0),
            entry(2, "1.1 배경", 2),
            entry(1, "2장 스택", 5),
            entry(2, "2.1 구현", 7),
            entry(2, "2.2 응용", 9),
            entry(1, "3장 큐", 12),
        ]
    }

    #[test]
    fn test_top_level_three_chapters() {
        let ranges = resolve_top_level(&sample_toc(), 20).unwrap();
        let spans: Vec<_> = ranges.iter().map(|r| (r.start_page, r.end_page)).collect();
        assert_eq!(spans, vec![(0, 4), (5, 11), (12, 19)]);
        assert_eq!(ranges[1].index, 2);
        assert_eq!(ranges[1].title, "2장 스택");
    }

    #[test]
    fn test_top_level_ranges_tile_document() {
        let toc: Vec<TocEntry> = [0, 1, 3, 8, 9, 15]
            .iter()
            .enumerate()
            .map(|(i, &p)| entry(1, &format!("c{i}"), p))
            .collect();
        let ranges = resolve_top_level(&toc, 30).unwrap();
        assert_eq!(ranges.len(), toc.len());
        assert_eq!(ranges[0].start_page, 0);
        assert_eq!(ranges.last().unwrap().end_page, 29);
        for pair in ranges.windows(2) {
            assert_eq!(pair[0].end_page + 1, pair[1].start_page);
        }
    }

    #[test]
    fn test_empty_toc_is_error() {
        assert!(matches!(
            resolve_top_level(&[], 10),
            Err(ChapexError::NoTableOfContents)
        ));
        assert!(matches!(
            resolve_all_items(&[], 10),
            Err(ChapexError::NoTableOfContents)
        ));
    }

    #[test]
    fn test_only_nested_entries_is_error() {
        let toc = vec![entry(2, "orphan", 3)];
        assert!(matches!(
            resolve_top_level(&toc, 10),
            Err(ChapexError::NoTableOfContents)
        ));
    }

    #[test]
    fn test_all_items_keep_levels_and_use_same_end_formula() {
        let items = resolve_all_items(&sample_toc(), 20).unwrap();
        assert_eq!(items.len(), 6);
        assert_eq!(items[1].level, 2);
        assert_eq!((items[0].start_page, items[0].end_page), (0, 1));
        assert_eq!((items[1].start_page, items[1].end_page), (2, 4));
        assert_eq!((items[5].start_page, items[5].end_page), (12, 19));
    }

    fn assert_disjoint(ranges: &[ChapterRange]) {
        for pair in ranges.windows(2) {
            assert!(pair[0].end_page < pair[1].start_page, "{pair:?} overlap");
        }
    }

    #[test]
    fn test_same_page_entries_merge_into_one_chapter() {
        let toc = vec![entry(1, "a", 4), entry(1, "b", 4), entry(1, "c", 6)];
        let ranges = resolve_top_level(&toc, 10).unwrap();
        let spans: Vec<_> = ranges
            .iter()
            .map(|r| (r.index, r.title.as_str(), r.start_page, r.end_page))
            .collect();
        assert_eq!(spans, vec![(1, "a", 4, 5), (2, "c", 6, 9)]);
        assert_disjoint(&ranges);
    }

    #[test]
    fn test_backward_entry_merges_into_previous() {
        let toc = vec![entry(1, "a", 0), entry(1, "b", 8), entry(1, "c", 5), entry(1, "d", 12)];
        let ranges = resolve_top_level(&toc, 20).unwrap();
        let spans: Vec<_> = ranges.iter().map(|r| (r.start_page, r.end_page)).collect();
        assert_eq!(spans, vec![(0, 7), (8, 11), (12, 19)]);
        assert_disjoint(&ranges);
    }

    #[test]
    fn test_entries_past_last_page_dropped() {
        let toc = vec![entry(1, "a", 0), entry(1, "b", 25), entry(1, "c", 30)];
        let ranges = resolve_top_level(&toc, 20).unwrap();
        assert_eq!(ranges.len(), 1);
        assert_eq!((ranges[0].start_page, ranges[0].end_page), (0, 19));

        let toc = vec![entry(1, "gone", 25)];
        assert!(matches!(
            resolve_top_level(&toc, 20),
            Err(ChapexError::NoTableOfContents)
        ));
    }

    #[test]
    fn test_all_items_keep_same_page_entries() {
        let toc = vec![entry(1, "a", 4), entry(2, "a.1", 4), entry(1, "c", 6)];
        let items = resolve_all_items(&toc, 10).unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!((items[0].start_page, items[0].end_page), (4, 4));
        assert_eq!((items[1].start_page, items[1].end_page), (4, 5));
    }

    #[test]
    fn test_group_contiguous_merges() {
        let items = resolve_all_items(&sample_toc(), 20).unwrap();
        let group = group_contiguous(&[3, 4, 5], &items, 1).unwrap();
        assert_eq!(group.title, "2장 스택");
        assert_eq!((group.start_page, group.end_page), (5, 11));
    }

    #[test]
    fn test_group_with_gap_rejected() {
        let items = resolve_all_items(&sample_toc(), 20).unwrap();
        let err = group_contiguous(&[3, 5], &items, 1).unwrap_err();
        assert!(matches!(
            err,
            ChapexError::NonContiguousSelection { ref indices } if indices == &vec![3, 5]
        ));
    }

    #[test]
    fn test_group_errors() {
        let items = resolve_all_items(&sample_toc(), 20).unwrap();
        assert!(matches!(
            group_contiguous(&[], &items, 1),
            Err(ChapexError::EmptySelection)
        ));
        assert!(matches!(
            group_contiguous(&[6, 7], &items, 1),
            Err(ChapexError::UnknownTocItem { index: 7, .. })
        ));
        assert!(matches!(
            group_contiguous(&[4, 3], &items, 1),
            Err(ChapexError::NonContiguousSelection { .. })
        ));
    }

    #[test]
    fn test_group_placeholder_title() {
        let toc = vec![entry(1, "  ", 0), entry(1, "next", 3)];
        let items = resolve_all_items(&toc, 5).unwrap();
        let group = group_contiguous(&[1], &items, 2).unwrap();
        assert_eq!(group.title, "Group 02");
        assert_eq!(group.index, 2);
    }

    #[test]
    fn test_plan_items_and_groups_reindex() {
        let toc = sample_toc();
        let ranges = ChapterPlan::Items(vec![2, 6]).resolve(&toc, 20).unwrap();
        assert_eq!(ranges[0].index, 1);
        assert_eq!(ranges[0].title, "1.1 배경");
        assert_eq!(ranges[1].index, 2);
        assert_eq!((ranges[1].start_page, ranges[1].end_page), (12, 19));

        let groups = ChapterPlan::Groups(vec![vec![1, 2], vec![3, 4, 5]])
            .resolve(&toc, 20)
            .unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!((groups[0].start_page, groups[0].end_page), (0, 4));
        assert_eq!(groups[1].index, 2);
    }

    #[test]
    fn test_plan_manual_needs_no_toc() {
        let plan = ChapterPlan::Manual(vec![ChapterRange {
            index: 9,
            title: "Appendix".into(),
            start_page: 2,
            end_page: 4,
        }]);
        let ranges = plan.resolve(&[], 10).unwrap();
        assert_eq!(ranges[0].index, 1);

        let past_end = ChapterPlan::Manual(vec![ChapterRange {
            index: 1,
            title: String::new(),
            start_page: 2,
            end_page: 10,
        }]);
        assert!(matches!(
            past_end.resolve(&[], 10),
            Err(ChapexError::InvalidRange { .. })
        ));
    }

    #[test]
    fn test_parse_page_range() {
        assert_eq!(parse_page_range("3-10").unwrap(), (2, 9));
        assert_eq!(parse_page_range("7").unwrap(), (6, 6));
        assert!(parse_page_range("0-3").is_err());
        assert!(parse_page_range("9-3").is_err());
        assert!(parse_page_range("a-b").is_err());
    }
}
