//! Parser for `pdftotext -bbox-layout` output (page / flow / block / line / word).

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::ChapexError;
use crate::extraction::{TextBlock, TextLine};
use crate::geometry::BBox;

#[derive(Default)]
struct BlockState {
    ordinal: usize,
    bbox: Option<BBox>,
    lines: Vec<TextLine>,
}

#[derive(Default)]
struct LineState {
    bbox: Option<BBox>,
    words: Vec<String>,
}

/// Parse the layout document into one block list per `<page>`, in page order.
///
/// Block ordinals count every `<block>` on the page, including blocks whose
/// text turned out empty and were dropped.
pub fn parse_bbox_layout(xml: &str) -> Result<Vec<Vec<TextBlock>>, ChapexError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    reader.config_mut().check_end_names = false;

    let mut pages: Vec<Vec<TextBlock>> = Vec::new();
    let mut blocks: Vec<TextBlock> = Vec::new();
    let mut block_counter = 0usize;
    let mut block: Option<BlockState> = None;
    let mut line: Option<LineState> = None;
    let mut in_word = false;
    let mut word = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"page" => {
                    blocks.clear();
                    block_counter = 0;
                }
                b"block" => {
                    block = Some(BlockState {
                        ordinal: block_counter,
                        bbox: parse_bbox(&e),
                        lines: Vec::new(),
                    });
                    block_counter += 1;
                }
                b"line" => {
                    line = Some(LineState {
                        bbox: parse_bbox(&e),
                        words: Vec::new(),
                    });
                }
                b"word" => {
                    in_word = true;
                    word.clear();
                }
                _ => {}
            },
            Ok(Event::Text(t)) => {
                if in_word {
                    let text = t
                        .unescape()
                        .map(|c| c.into_owned())
                        .unwrap_or_else(|_| String::from_utf8_lossy(&t).into_owned());
                    word.push_str(&text);
                }
            }
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"word" => {
                    in_word = false;
                    let w = word.trim();
                    if let (Some(l), false) = (line.as_mut(), w.is_empty()) {
                        l.words.push(w.to_string());
                    }
                }
                b"line" => {
                    if let Some(l) = line.take() {
                        finish_line(l, block.as_mut());
                    }
                }
                b"block" => {
                    if let Some(b) = block.take() {
                        if let Some(tb) = finish_block(b) {
                            blocks.push(tb);
                        }
                    }
                }
                b"page" => pages.push(std::mem::take(&mut blocks)),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(ChapexError::Xml(e.to_string())),
            _ => {}
        }
    }

    Ok(pages)
}

fn finish_line(l: LineState, block: Option<&mut BlockState>) {
    let text = l.words.join(" ");
    let Some(block) = block else { return };
    if text.trim().is_empty() {
        return;
    }
    let bbox = l
        .bbox
        .or(block.bbox)
        .unwrap_or(BBox::new(0.0, 0.0, 0.0, 0.0));
    block.lines.push(TextLine {
        text,
        bbox,
        font: None,
    });
}

fn finish_block(b: BlockState) -> Option<TextBlock> {
    let text = b
        .lines
        .iter()
        .map(|l| l.text.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    let bbox = b
        .bbox
        .or_else(|| BBox::union_all(b.lines.iter().map(|l| &l.bbox)))?;
    Some(TextBlock {
        ordinal: b.ordinal,
        text: text.to_string(),
        bbox,
        lines: b.lines,
    })
}

fn parse_attr_f32(e: &BytesStart<'_>, name: &[u8]) -> Option<f32> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == name)
        .and_then(|a| String::from_utf8_lossy(&a.value).trim().parse().ok())
}

fn parse_bbox(e: &BytesStart<'_>) -> Option<BBox> {
    Some(BBox::new(
        parse_attr_f32(e, b"xMin")?,
        parse_attr_f32(e, b"yMin")?,
        parse_attr_f32(e, b"xMax")?,
        parse_attr_f32(e, b"yMax")?,
    ))
}
