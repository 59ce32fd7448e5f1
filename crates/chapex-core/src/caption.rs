//! Figure/table caption detection.
//!
//! A caption starts with `그림`/`표` followed by whitespace and a
//! `N-M`/`N.M` number, or (case-insensitively) with `figure `, `fig `,
//! `fig.` or `table `. Matching is anchored at the start of the trimmed text.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static CAPTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:(?P<ko>그림|표)\s+\d+[-.]\d+|(?P<en>figure |fig |fig\.|table ))")
        .expect("valid caption regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FigureKind {
    Figure,
    Table,
}

impl fmt::Display for FigureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FigureKind::Figure => write!(f, "figure"),
            FigureKind::Table => write!(f, "table"),
        }
    }
}

/// Kind of the caption `text` opens with, or `None` when it is not a caption.
pub fn caption_kind(text: &str) -> Option<FigureKind> {
    let caps = CAPTION_RE.captures(text.trim())?;
    let token = caps
        .name("ko")
        .or_else(|| caps.name("en"))
        .map(|m| m.as_str())?;
    if token == "표" || token.to_lowercase().starts_with("table") {
        Some(FigureKind::Table)
    } else {
        Some(FigureKind::Figure)
    }
}

pub fn is_caption(text: &str) -> bool {
    caption_kind(text).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_korean_captions() {
        assert_eq!(caption_kind("그림 3-1 설명"), Some(FigureKind::Figure));
        assert_eq!(caption_kind("표 2-3"), Some(FigureKind::Table));
        assert_eq!(caption_kind("  그림\t12.4 트리 순회  "), Some(FigureKind::Figure));
    }

    #[test]
    fn test_english_captions() {
        assert_eq!(caption_kind("Figure 4.1"), Some(FigureKind::Figure));
        assert_eq!(caption_kind("table 5-2 notes"), Some(FigureKind::Table));
        assert_eq!(caption_kind("FIG. 7 Overview"), Some(FigureKind::Figure));
        assert_eq!(caption_kind("fig 2 layout"), Some(FigureKind::Figure));
        assert_eq!(caption_kind("TABLE 1: results"), Some(FigureKind::Table));
    }

    #[test]
    fn test_non_captions() {
        for text in [
            "단순 문단입니다",
            "",
            "   ",
            "Figure",
            "그림 설명",
            "그림3-1 붙여쓰기",
            "표 A-1",
            "As shown in Figure 4.1",
            "figures 3",
            "Tablet computing",
        ] {
            assert!(!is_caption(text), "{text:?} should not be a caption");
        }
    }
}
