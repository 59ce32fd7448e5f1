//! Domain-specific page annotations.
//!
//! These are side-channel hints for the study stage. They never change the
//! extracted text or figures.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::extraction::PageGeometry;
use crate::geometry::BBox;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    #[default]
    Default,
    Math,
    It,
    Biz,
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Domain::Default => write!(f, "default"),
            Domain::Math => write!(f, "math"),
            Domain::It => write!(f, "it"),
            Domain::Biz => write!(f, "biz"),
        }
    }
}

impl FromStr for Domain {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "default" => Ok(Domain::Default),
            "math" => Ok(Domain::Math),
            "it" => Ok(Domain::It),
            "biz" => Ok(Domain::Biz),
            other => Err(format!(
                "unknown domain '{other}'. Expected one of: default, math, it, biz"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextSpan {
    pub text: String,
    pub bbox: BBox,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeSpan {
    pub code: String,
    pub bbox: BBox,
}

/// Per-page auxiliary data stored under `meta` in the chapter record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub formulas: Vec<TextSpan>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub code_blocks: Vec<CodeSpan>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub table_like_blocks: Vec<TextSpan>,
    /// Set when the page could not be loaded from the document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extraction_error: Option<String>,
}

impl PageMeta {
    pub fn is_empty(&self) -> bool {
        self.formulas.is_empty()
            && self.code_blocks.is_empty()
            && self.table_like_blocks.is_empty()
            && self.extraction_error.is_none()
    }
}

const MATH_FONTS: &[&str] = &["CambriaMath", "STIX", "TimesNewRomanPS-Italic"];
const MATH_SYMBOLS: &[char] = &[
    '∑', '∫', '√', '≤', '≥', '≠', '±', '×', '÷', '∞', '∂', '∆', 'π', 'θ', 'λ', '∈', '⊂', '→',
];
const MONO_FONTS: &[&str] = &["Consolas", "Courier", "NotoMono", "JetBrainsMono"];
const CODE_PREFIXES: &[&str] = &["for ", "if ", "while ", "def ", "class "];

pub fn annotate(page: &PageGeometry, domain: Domain) -> PageMeta {
    match domain {
        Domain::Default => PageMeta::default(),
        Domain::Math => PageMeta {
            formulas: math_formulas(page),
            ..Default::default()
        },
        Domain::It => PageMeta {
            code_blocks: code_blocks(page),
            ..Default::default()
        },
        Domain::Biz => PageMeta {
            table_like_blocks: table_like_blocks(page),
            ..Default::default()
        },
    }
}

fn font_matches(font: Option<&str>, names: &[&str]) -> bool {
    font.is_some_and(|f| names.iter().any(|n| f.contains(n)))
}

fn distinct_math_symbols(text: &str) -> usize {
    MATH_SYMBOLS.iter().filter(|s| text.contains(**s)).count()
}

fn math_formulas(page: &PageGeometry) -> Vec<TextSpan> {
    page.text_blocks
        .iter()
        .flat_map(|b| &b.lines)
        .filter(|l| !l.text.trim().is_empty())
        .filter(|l| {
            font_matches(l.font.as_deref(), MATH_FONTS) || distinct_math_symbols(&l.text) >= 2
        })
        .map(|l| TextSpan {
            text: l.text.trim().to_string(),
            bbox: l.bbox,
        })
        .collect()
}

fn code_blocks(page: &PageGeometry) -> Vec<CodeSpan> {
    let mut spans = Vec::new();
    for block in &page.text_blocks {
        let code_lines: Vec<_> = block
            .lines
            .iter()
            .filter(|l| {
                let text = l.text.trim_start();
                !text.is_empty()
                    && (font_matches(l.font.as_deref(), MONO_FONTS)
                        || CODE_PREFIXES.iter().any(|p| text.starts_with(p)))
            })
            .collect();
        let Some(bbox) = BBox::union_all(code_lines.iter().map(|l| &l.bbox)) else {
            continue;
        };
        let code = code_lines
            .iter()
            .map(|l| l.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        spans.push(CodeSpan { code, bbox });
    }
    spans
}

fn table_like_blocks(page: &PageGeometry) -> Vec<TextSpan> {
    page.text_blocks
        .iter()
        .filter(|b| {
            let digits = b.text.chars().filter(|c| c.is_ascii_digit()).count();
            let pipes = b.text.matches('|').count();
            digits >= 6 || pipes >= 2
        })
        .map(|b| TextSpan {
            text: b.text.clone(),
            bbox: b.bbox,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extraction::{TextBlock, TextLine};

    fn line(text: &str, font: Option<&str>, y: f32) -> TextLine {
        TextLine {
            text: text.into(),
            bbox: BBox::new(10.0, y, 200.0, y + 10.0),
            font: font.map(String::from),
        }
    }

    fn block(ordinal: usize, lines: Vec<TextLine>) -> TextBlock {
        let text = lines
            .iter()
            .map(|l| l.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        let bbox = BBox::union_all(lines.iter().map(|l| &l.bbox)).unwrap();
        TextBlock {
            ordinal,
            text,
            bbox,
            lines,
        }
    }

    fn page(text_blocks: Vec<TextBlock>) -> PageGeometry {
        PageGeometry {
            index: 0,
            text_blocks,
            drawings: Vec::new(),
        }
    }

    #[test]
    fn test_default_domain_has_no_annotations() {
        let p = page(vec![block(0, vec![line("x ≤ y → z", None, 0.0)])]);
        assert!(annotate(&p, Domain::Default).is_empty());
    }

    #[test]
    fn test_math_by_font_or_symbols() {
        let p = page(vec![block(
            0,
            vec![
                line("평범한 문장", None, 0.0),
                line("f(x) = ax + b", Some("ABCDEF+CambriaMath"), 20.0),
                line("∑ a_i ≤ ∞", None, 40.0),
                line("x ≤ y", None, 60.0),
            ],
        )]);
        let meta = annotate(&p, Domain::Math);
        let texts: Vec<_> = meta.formulas.iter().map(|f| f.text.as_str()).collect();
        assert_eq!(texts, vec!["f(x) = ax + b", "∑ a_i ≤ ∞"]);
    }

    #[test]
    fn test_code_lines_grouped_per_block() {
        let p = page(vec![
            block(
                0,
                vec![
                    line("다음 코드를 보자", None, 0.0),
                    line("for i in range(3):", None, 20.0),
                    line("    print(i)", Some("Consolas"), 40.0),
                ],
            ),
            block(1, vec![line("설명 문단", None, 80.0)]),
        ]);
        let meta = annotate(&p, Domain::It);
        assert_eq!(meta.code_blocks.len(), 1);
        assert_eq!(meta.code_blocks[0].code, "for i in range(3):\n    print(i)");
        assert_eq!(meta.code_blocks[0].bbox, BBox::new(10.0, 20.0, 200.0, 50.0));
    }

    #[test]
    fn test_table_like_blocks() {
        let p = page(vec![
            block(0, vec![line("매출 2023 1,250,000", None, 0.0)]),
            block(1, vec![line("A | B | C", None, 20.0)]),
            block(2, vec![line("3분기 요약", None, 40.0)]),
        ]);
        let meta = annotate(&p, Domain::Biz);
        assert_eq!(meta.table_like_blocks.len(), 2);
    }

    #[test]
    fn test_domain_parse_and_json() {
        assert_eq!("MATH".parse::<Domain>().unwrap(), Domain::Math);
        assert!("law".parse::<Domain>().is_err());
        assert_eq!(serde_json::to_string(&Domain::Biz).unwrap(), "\"biz\"");
    }

    #[test]
    fn test_empty_meta_serializes_to_empty_object() {
        assert_eq!(serde_json::to_string(&PageMeta::default()).unwrap(), "{}");
    }
}
