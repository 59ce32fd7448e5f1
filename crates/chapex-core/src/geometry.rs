use serde::{Deserialize, Serialize};

/// Axis-aligned box in page space: points, origin top-left, y grows downward.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl BBox {
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        BBox { x0, y0, x1, y1 }
    }

    /// Box spanning the given corners in any order.
    pub fn from_corners(ax: f32, ay: f32, bx: f32, by: f32) -> Self {
        BBox {
            x0: ax.min(bx),
            y0: ay.min(by),
            x1: ax.max(bx),
            y1: ay.max(by),
        }
    }

    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }

    /// True when the box has no drawable area (or holds NaN coordinates).
    pub fn is_degenerate(&self) -> bool {
        !(self.width() > 0.0 && self.height() > 0.0)
    }

    /// Smallest box containing both boxes.
    pub fn union(&self, other: &BBox) -> BBox {
        BBox {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }

    /// Union of every box in the iterator, `None` when it is empty.
    pub fn union_all<'a, I>(boxes: I) -> Option<BBox>
    where
        I: IntoIterator<Item = &'a BBox>,
    {
        boxes
            .into_iter()
            .fold(None, |acc: Option<BBox>, b| match acc {
                Some(u) => Some(u.union(b)),
                None => Some(*b),
            })
    }

    /// Grow the box to include a point.
    pub fn include_point(&mut self, x: f32, y: f32) {
        self.x0 = self.x0.min(x);
        self.y0 = self.y0.min(y);
        self.x1 = self.x1.max(x);
        self.y1 = self.y1.max(y);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_union_covers_both() {
        let a = BBox::new(10.0, 10.0, 100.0, 100.0);
        let b = BBox::new(90.0, 10.0, 200.0, 100.0);
        assert_eq!(a.union(&b), BBox::new(10.0, 10.0, 200.0, 100.0));
    }

    #[test]
    fn test_union_all_is_order_independent() {
        let boxes = [
            BBox::new(50.0, 60.0, 70.0, 80.0),
            BBox::new(0.0, 100.0, 10.0, 300.0),
            BBox::new(5.0, 5.0, 400.0, 20.0),
        ];
        let forward = BBox::union_all(boxes.iter()).unwrap();
        let backward = BBox::union_all(boxes.iter().rev()).unwrap();
        assert_eq!(forward, backward);
        assert_eq!(forward, BBox::new(0.0, 5.0, 400.0, 300.0));
    }

    #[test]
    fn test_union_all_empty() {
        let none: [BBox; 0] = [];
        assert!(BBox::union_all(none.iter()).is_none());
    }

    #[test]
    fn test_degenerate() {
        assert!(BBox::new(10.0, 10.0, 10.0, 50.0).is_degenerate());
        assert!(BBox::new(10.0, 10.0, 50.0, 5.0).is_degenerate());
        assert!(BBox::new(f32::NAN, 0.0, 1.0, 1.0).is_degenerate());
        assert!(!BBox::new(0.0, 0.0, 1.0, 1.0).is_degenerate());
    }

    #[test]
    fn test_from_corners_normalizes() {
        let b = BBox::from_corners(100.0, 20.0, 10.0, 200.0);
        assert_eq!(b, BBox::new(10.0, 20.0, 100.0, 200.0));
    }
}
