//! Outline (bookmark) parsing for `pdftohtml -xml` output.
//!
//! The outline is emitted as nested `<outline>` elements holding
//! `<item page="N">Title</item>` children; nesting depth is the TOC level.

use quick_xml::events::{BytesStart, BytesText, Event};
use quick_xml::Reader;
use tracing::debug;

use crate::error::ChapexError;
use crate::extraction::TocEntry;

/// Parse every outline item with a resolvable page into a `TocEntry`.
pub fn parse_outline_xml(xml: &str) -> Result<Vec<TocEntry>, ChapexError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut depth = 0usize;
    let mut open_item: Option<(usize, Option<usize>)> = None;
    let mut title = String::new();
    let mut entries = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"outline" => depth += 1,
                b"item" if depth > 0 => {
                    open_item = Some((depth, page_attr(&e)));
                    title.clear();
                }
                _ => {}
            },
            Ok(Event::Text(t)) => {
                if open_item.is_some() {
                    if !title.is_empty() {
                        title.push(' ');
                    }
                    title.push_str(&text_content(&t));
                }
            }
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"outline" => depth = depth.saturating_sub(1),
                b"item" => {
                    if let Some((level, page)) = open_item.take() {
                        match page {
                            Some(start_page) => entries.push(TocEntry {
                                level,
                                title: title.trim().to_string(),
                                start_page,
                            }),
                            None => debug!(title = %title, "outline item without page skipped"),
                        }
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(ChapexError::Xml(e.to_string())),
            _ => {}
        }
    }

    Ok(entries)
}

/// 1-based `page` attribute converted to a 0-based index.
fn page_attr(e: &BytesStart<'_>) -> Option<usize> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == b"page")
        .and_then(|a| String::from_utf8_lossy(&a.value).trim().parse::<usize>().ok())
        .and_then(|p| p.checked_sub(1))
}

fn text_content(t: &BytesText<'_>) -> String {
    t.unescape()
        .map(|c| c.into_owned())
        .unwrap_or_else(|_| String::from_utf8_lossy(t).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_outline_levels() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE pdf2xml SYSTEM "pdf2xml.dtd">
<pdf2xml producer="poppler" version="23.02.0">
<page number="1" position="absolute" top="0" left="0" height="842" width="595">
<text top="80" left="72" width="200" height="18" font="0"><b>Cover</b></text>
</page>
<outline>
<item page="1">1장 자료 구조</item>
<outline>
<item page="3">1.1 배열</item>
<item>Broken link</item>
</outline>
<item page="9">2장 알고리즘 &amp; 분석</item>
</outline>
</pdf2xml>"#;
        let toc = parse_outline_xml(xml).unwrap();
        assert_eq!(toc.len(), 3);
        assert_eq!(toc[0], TocEntry { level: 1, title: "1장 자료 구조".into(), start_page: 0 });
        assert_eq!(toc[1].level, 2);
        assert_eq!(toc[1].start_page, 2);
        assert_eq!(toc[2].title, "2장 알고리즘 & 분석");
        assert_eq!(toc[2].start_page, 8);
    }

    #[test]
    fn test_no_outline_is_empty() {
        let xml = r#"<pdf2xml><page number="1"><text font="0">Body</text></page></pdf2xml>"#;
        assert!(parse_outline_xml(xml).unwrap().is_empty());
    }
}
