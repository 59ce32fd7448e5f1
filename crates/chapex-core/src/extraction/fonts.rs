//! Font names for text lines, taken from per-page `pdftohtml -xml` output.
//!
//! `pdftotext -bbox-layout` carries no font information, so each layout line
//! borrows the font of the `pdftohtml` text run it overlaps most. Run
//! geometry is only comparable at `-zoom 1`, where both tools report points.

use std::collections::HashMap;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::ChapexError;
use crate::extraction::TextBlock;
use crate::geometry::BBox;

/// A positioned text run and the family of the font it is set in.
#[derive(Debug, Clone, PartialEq)]
pub struct FontRun {
    pub family: String,
    pub bbox: BBox,
}

/// Collect every `<text>` run whose `font` id resolves to a `<fontspec>`.
pub fn parse_font_runs(xml: &str) -> Result<Vec<FontRun>, ChapexError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    reader.config_mut().check_end_names = false;

    let mut families: HashMap<String, String> = HashMap::new();
    let mut runs: Vec<(String, BBox)> = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => match e.name().as_ref() {
                b"fontspec" => {
                    if let (Some(id), Some(family)) = (attr(&e, b"id"), attr(&e, b"family")) {
                        families.insert(id, family);
                    }
                }
                b"text" => {
                    if let (Some(font), Some(bbox)) = (attr(&e, b"font"), run_bbox(&e)) {
                        runs.push((font, bbox));
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(ChapexError::Xml(e.to_string())),
            _ => {}
        }
    }

    // Font ids are document-global and a spec may follow its first use.
    Ok(runs
        .into_iter()
        .filter_map(|(font, bbox)| {
            families.get(&font).map(|family| FontRun {
                family: family.clone(),
                bbox,
            })
        })
        .collect())
}

/// Give every line without a font the family of its best-overlapping run.
pub fn assign_fonts(blocks: &mut [TextBlock], runs: &[FontRun]) {
    for line in blocks.iter_mut().flat_map(|b| b.lines.iter_mut()) {
        if line.font.is_some() {
            continue;
        }
        let best = runs
            .iter()
            .map(|r| (overlap_area(&line.bbox, &r.bbox), r))
            .filter(|(area, _)| *area > 0.0)
            .max_by(|a, b| a.0.total_cmp(&b.0));
        if let Some((_, run)) = best {
            line.font = Some(run.family.clone());
        }
    }
}

fn overlap_area(a: &BBox, b: &BBox) -> f32 {
    let w = a.x1.min(b.x1) - a.x0.max(b.x0);
    let h = a.y1.min(b.y1) - a.y0.max(b.y0);
    if w > 0.0 && h > 0.0 {
        w * h
    } else {
        0.0
    }
}

fn attr(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .map(|a| String::from_utf8_lossy(&a.value).trim().to_string())
}

fn run_bbox(e: &BytesStart<'_>) -> Option<BBox> {
    let num = |key: &[u8]| attr(e, key).and_then(|v| v.parse::<f32>().ok());
    let (top, left) = (num(b"top")?, num(b"left")?);
    let (width, height) = (num(b"width")?, num(b"height")?);
    Some(BBox::new(left, top, left + width, top + height))
}
