use serde::{Deserialize, Serialize};
use std::fmt;

/// An axis-aligned rectangle in page pixel coordinates.
///
/// Origin may go negative after dilation (a word box near the page edge),
/// so `x`/`y` are signed while extents stay unsigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Rect { x, y, width, height }
    }

    pub fn right(self) -> i32 {
        self.x + self.width as i32
    }

    pub fn bottom(self) -> i32 {
        self.y + self.height as i32
    }

    /// Grow the rectangle by `margin` pixels on every side.
    pub fn dilate(self, margin: u32) -> Self {
        Rect {
            x: self.x - margin as i32,
            y: self.y - margin as i32,
            width: self.width + 2 * margin,
            height: self.height + 2 * margin,
        }
    }

    /// Smallest rectangle covering both `self` and `other`.
    pub fn union(self, other: Rect) -> Self {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        Rect {
            x,
            y,
            width: (right - x) as u32,
            height: (bottom - y) as u32,
        }
    }

    /// Intersect with a raster of the given size, anchored at the origin.
    /// Used before cropping so a dilated rectangle never reaches outside
    /// the image. Returns a zero-sized rectangle when fully outside.
    pub fn clamp_to(self, raster_width: u32, raster_height: u32) -> Self {
        let x = self.x.clamp(0, raster_width as i32);
        let y = self.y.clamp(0, raster_height as i32);
        let right = self.right().clamp(x, raster_width as i32);
        let bottom = self.bottom().clamp(y, raster_height as i32);
        Rect {
            x,
            y,
            width: (right - x) as u32,
            height: (bottom - y) as u32,
        }
    }

    /// Shift the rectangle by an offset (crop coordinates back to page
    /// coordinates and vice versa).
    pub fn translate(self, dx: i32, dy: i32) -> Self {
        Rect { x: self.x + dx, y: self.y + dy, ..self }
    }

    pub fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}+{}+{}", self.width, self.height, self.x, self.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dilate_grows_uniformly() {
        let r = Rect::new(10, 20, 30, 40).dilate(2);
        assert_eq!(r, Rect::new(8, 18, 34, 44));
    }

    #[test]
    fn dilate_may_go_negative_at_page_edge() {
        let r = Rect::new(0, 1, 5, 5).dilate(2);
        assert_eq!(r.x, -2);
        assert_eq!(r.y, -1);
    }

    #[test]
    fn union_is_bounding_box() {
        let a = Rect::new(0, 0, 10, 10);
        let b = Rect::new(20, 5, 10, 10);
        let u = a.union(b);
        assert_eq!(u, Rect::new(0, 0, 30, 15));
        assert_eq!(u, b.union(a));
    }

    #[test]
    fn clamp_to_clips_overhang() {
        let r = Rect::new(-2, -2, 8, 8).clamp_to(10, 10);
        assert_eq!(r, Rect::new(0, 0, 6, 6));

        let r = Rect::new(8, 8, 5, 5).clamp_to(10, 10);
        assert_eq!(r, Rect::new(8, 8, 2, 2));
    }

    #[test]
    fn clamp_to_fully_outside_is_empty() {
        let r = Rect::new(50, 50, 5, 5).clamp_to(10, 10);
        assert!(r.is_empty());
    }

    #[test]
    fn translate_round_trips() {
        let r = Rect::new(5, 7, 3, 3);
        assert_eq!(r.translate(10, -2).translate(-10, 2), r);
    }
}
