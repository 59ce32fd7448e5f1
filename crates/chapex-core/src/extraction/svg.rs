//! Drawing-box extraction from `pdftocairo -svg` output.
//!
//! Every `<path>` and `<rect>` painted outside `<defs>` contributes its bounding
//! box, as does every raster `<image>` placed through `<use>`. Glyphs are also
//! placed through `<use>` but reference `<symbol>`s, which are ignored.
//! Control points are included in curve bounds, so boxes of curved paths can be
//! slightly larger than the painted ink.

use std::collections::HashMap;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::ChapexError;
use crate::geometry::BBox;

/// Affine transform `[a b c d e f]` as used by SVG `matrix(...)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform([f32; 6]);

impl Transform {
    pub const IDENTITY: Transform = Transform([1.0, 0.0, 0.0, 1.0, 0.0, 0.0]);

    pub fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        let [a, b, c, d, e, f] = self.0;
        (a * x + c * y + e, b * x + d * y + f)
    }

    /// `self` followed by `inner`: points go through `inner` first.
    pub fn then(&self, inner: &Transform) -> Transform {
        let [a1, b1, c1, d1, e1, f1] = self.0;
        let [a2, b2, c2, d2, e2, f2] = inner.0;
        Transform([
            a1 * a2 + c1 * b2,
            b1 * a2 + d1 * b2,
            a1 * c2 + c1 * d2,
            b1 * c2 + d1 * d2,
            a1 * e2 + c1 * f2 + e1,
            b1 * e2 + d1 * f2 + f1,
        ])
    }

    fn apply_box(&self, b: &BBox) -> BBox {
        let corners = [(b.x0, b.y0), (b.x1, b.y0), (b.x0, b.y1), (b.x1, b.y1)];
        let (x, y) = self.apply(corners[0].0, corners[0].1);
        let mut out = BBox::new(x, y, x, y);
        for &(cx, cy) in &corners[1..] {
            let (x, y) = self.apply(cx, cy);
            out.include_point(x, y);
        }
        out
    }
}

struct Frame {
    name: Vec<u8>,
    transform: Transform,
}

/// Bounding boxes of everything painted on the page, in document order.
pub fn parse_svg_drawings(svg: &str) -> Result<Vec<BBox>, ChapexError> {
    let images = collect_image_sizes(svg)?;

    let mut reader = Reader::from_str(svg);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Frame> = Vec::new();
    let mut out = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let ctm = current(&stack).then(&element_transform(&e));
                if !in_defs(&stack) && e.name().as_ref() != b"defs" {
                    paint(&e, &ctm, &images, &mut out);
                }
                stack.push(Frame {
                    name: e.name().as_ref().to_vec(),
                    transform: ctm,
                });
            }
            Ok(Event::Empty(e)) => {
                if !in_defs(&stack) {
                    let ctm = current(&stack).then(&element_transform(&e));
                    paint(&e, &ctm, &images, &mut out);
                }
            }
            Ok(Event::End(_)) => {
                stack.pop();
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ChapexError::Xml(e.to_string())),
            _ => {}
        }
    }

    Ok(out)
}

fn current(stack: &[Frame]) -> Transform {
    stack
        .last()
        .map(|f| f.transform)
        .unwrap_or(Transform::IDENTITY)
}

fn in_defs(stack: &[Frame]) -> bool {
    stack.iter().any(|f| f.name == b"defs")
}

fn paint(e: &BytesStart<'_>, ctm: &Transform, images: &HashMap<String, BBox>, out: &mut Vec<BBox>) {
    let local = match e.name().as_ref() {
        b"path" => attr(e, b"d").and_then(|d| path_bounds(&d)),
        b"rect" => rect_bounds(e),
        b"image" => image_bounds(e),
        b"use" => attr(e, b"xlink:href")
            .or_else(|| attr(e, b"href"))
            .and_then(|href| images.get(href.trim_start_matches('#')).copied())
            .map(|b| {
                let dx = attr_f32(e, b"x").unwrap_or(0.0);
                let dy = attr_f32(e, b"y").unwrap_or(0.0);
                BBox::new(b.x0 + dx, b.y0 + dy, b.x1 + dx, b.y1 + dy)
            }),
        _ => None,
    };
    if let Some(b) = local {
        out.push(ctm.apply_box(&b));
    }
}

/// Sizes of `<image id=..>` elements, keyed by id, so `<use>` can place them.
fn collect_image_sizes(svg: &str) -> Result<HashMap<String, BBox>, ChapexError> {
    let mut reader = Reader::from_str(svg);
    let mut images = HashMap::new();
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) if e.name().as_ref() == b"image" => {
                if let (Some(id), Some(b)) = (attr(&e, b"id"), image_bounds(&e)) {
                    images.insert(id, b);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ChapexError::Xml(e.to_string())),
            _ => {}
        }
    }
    Ok(images)
}

fn attr(e: &BytesStart<'_>, name: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == name)
        .map(|a| String::from_utf8_lossy(&a.value).into_owned())
}

fn attr_f32(e: &BytesStart<'_>, name: &[u8]) -> Option<f32> {
    attr(e, name).and_then(|v| parse_length(&v))
}

/// Numeric SVG length; unit suffixes such as `pt` or `px` are dropped.
fn parse_length(v: &str) -> Option<f32> {
    let v = v.trim();
    let end = v
        .find(|c: char| !(c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E')))
        .unwrap_or(v.len());
    v[..end].parse().ok()
}

fn rect_bounds(e: &BytesStart<'_>) -> Option<BBox> {
    let x = attr_f32(e, b"x").unwrap_or(0.0);
    let y = attr_f32(e, b"y").unwrap_or(0.0);
    let w = attr_f32(e, b"width")?;
    let h = attr_f32(e, b"height")?;
    Some(BBox::from_corners(x, y, x + w, y + h))
}

fn image_bounds(e: &BytesStart<'_>) -> Option<BBox> {
    rect_bounds(e)
}

fn element_transform(e: &BytesStart<'_>) -> Transform {
    attr(e, b"transform")
        .map(|t| parse_transform(&t))
        .unwrap_or(Transform::IDENTITY)
}

/// Parse a transform list (`matrix`, `translate`, `scale`); unknown functions
/// are treated as identity.
pub fn parse_transform(s: &str) -> Transform {
    let mut result = Transform::IDENTITY;
    let mut rest = s.trim();
    while let Some(open) = rest.find('(') {
        let Some(close) = rest[open..].find(')').map(|i| open + i) else {
            break;
        };
        let name = rest[..open].trim().trim_start_matches(',').trim();
        let args = numbers(&rest[open + 1..close]);
        let t = match (name, args.as_slice()) {
            ("matrix", [a, b, c, d, e, f]) => Transform([*a, *b, *c, *d, *e, *f]),
            ("translate", [tx]) => Transform([1.0, 0.0, 0.0, 1.0, *tx, 0.0]),
            ("translate", [tx, ty]) => Transform([1.0, 0.0, 0.0, 1.0, *tx, *ty]),
            ("scale", [s]) => Transform([*s, 0.0, 0.0, *s, 0.0, 0.0]),
            ("scale", [sx, sy]) => Transform([*sx, 0.0, 0.0, *sy, 0.0, 0.0]),
            _ => Transform::IDENTITY,
        };
        result = result.then(&t);
        rest = &rest[close + 1..];
    }
    result
}

fn numbers(s: &str) -> Vec<f32> {
    s.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|t| !t.is_empty())
        .filter_map(|t| t.parse().ok())
        .collect()
}

#[derive(Debug, PartialEq)]
enum Token {
    Cmd(char),
    Num(f32),
}

fn tokenize_path(d: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut num = String::new();
    let flush = |num: &mut String, tokens: &mut Vec<Token>| {
        if !num.is_empty() {
            if let Ok(v) = num.parse() {
                tokens.push(Token::Num(v));
            }
            num.clear();
        }
    };
    for c in d.chars() {
        match c {
            'e' | 'E' if !num.is_empty() => num.push(c),
            c if c.is_ascii_alphabetic() => {
                flush(&mut num, &mut tokens);
                tokens.push(Token::Cmd(c));
            }
            '-' | '+' if !num.is_empty() && !num.ends_with(['e', 'E']) => {
                flush(&mut num, &mut tokens);
                num.push(c);
            }
            '.' if num.contains('.') && !num.contains(['e', 'E']) => {
                flush(&mut num, &mut tokens);
                num.push(c);
            }
            c if c.is_ascii_digit() || matches!(c, '.' | '-' | '+') => num.push(c),
            _ => flush(&mut num, &mut tokens),
        }
    }
    flush(&mut num, &mut tokens);
    tokens
}

/// Bounding box of an SVG path's vertices and control points.
pub fn path_bounds(d: &str) -> Option<BBox> {
    let tokens = tokenize_path(d);
    let mut bounds: Option<BBox> = None;
    let mut add = |x: f32, y: f32| match bounds.as_mut() {
        Some(b) => b.include_point(x, y),
        None => bounds = Some(BBox::new(x, y, x, y)),
    };

    let (mut cx, mut cy) = (0.0f32, 0.0f32);
    let (mut sx, mut sy) = (0.0f32, 0.0f32);
    let mut cmd = 'M';
    let mut i = 0;

    let take = |i: &mut usize, n: usize| -> Option<Vec<f32>> {
        let mut out = Vec::with_capacity(n);
        for k in 0..n {
            match tokens.get(*i + k) {
                Some(Token::Num(v)) => out.push(*v),
                _ => return None,
            }
        }
        *i += n;
        Some(out)
    };

    while i < tokens.len() {
        if let Token::Cmd(c) = tokens[i] {
            cmd = c;
            i += 1;
            if matches!(c, 'Z' | 'z') {
                cx = sx;
                cy = sy;
                continue;
            }
        }
        let rel = cmd.is_ascii_lowercase();
        let (ox, oy) = if rel { (cx, cy) } else { (0.0, 0.0) };
        match cmd.to_ascii_uppercase() {
            'M' | 'L' | 'T' => {
                let Some(v) = take(&mut i, 2) else { break };
                cx = ox + v[0];
                cy = oy + v[1];
                add(cx, cy);
                if cmd == 'M' || cmd == 'm' {
                    sx = cx;
                    sy = cy;
                    cmd = if rel { 'l' } else { 'L' };
                }
            }
            'H' => {
                let Some(v) = take(&mut i, 1) else { break };
                cx = ox + v[0];
                add(cx, cy);
            }
            'V' => {
                let Some(v) = take(&mut i, 1) else { break };
                cy = oy + v[0];
                add(cx, cy);
            }
            'C' => {
                let Some(v) = take(&mut i, 6) else { break };
                add(ox + v[0], oy + v[1]);
                add(ox + v[2], oy + v[3]);
                cx = ox + v[4];
                cy = oy + v[5];
                add(cx, cy);
            }
            'S' | 'Q' => {
                let Some(v) = take(&mut i, 4) else { break };
                add(ox + v[0], oy + v[1]);
                cx = ox + v[2];
                cy = oy + v[3];
                add(cx, cy);
            }
            'A' => {
                let Some(v) = take(&mut i, 7) else { break };
                cx = ox + v[5];
                cy = oy + v[6];
                add(cx, cy);
            }
            _ => break,
        }
    }

    bounds
}
