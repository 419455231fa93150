//! Binary ink/no-ink raster used for template comparison.
//!
//! Upstream preprocessing binarizes the receipt scan, so "ink" here is an
//! exact test: a pixel is ink iff its RGB value is pure black (alpha
//! ignored). The matrix is immutable after construction.

use image::{DynamicImage, GenericImageView};

/// Slack tolerated around the geometric overlap when diffing two matrices.
/// Absorbs segmentation jitter from the character-cropping step while still
/// penalizing genuine content in the margin.
pub const COMPARE_MARGIN: i32 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelMatrix {
    width: u32,
    height: u32,
    grid: Vec<bool>,
}

impl PixelMatrix {
    /// Decode an image region into an ink grid.
    pub fn from_image(image: &DynamicImage) -> Self {
        let (width, height) = image.dimensions();
        let mut grid = Vec::with_capacity((width * height) as usize);
        for y in 0..height {
            for x in 0..width {
                let [r, g, b, _a] = image.get_pixel(x, y).0;
                grid.push(r == 0 && g == 0 && b == 0);
            }
        }
        PixelMatrix { width, height, grid }
    }

    /// Build directly from rows of booleans. Rows must be equal length.
    pub fn from_rows(rows: &[Vec<bool>]) -> Self {
        let height = rows.len() as u32;
        let width = rows.first().map_or(0, |r| r.len() as u32);
        debug_assert!(rows.iter().all(|r| r.len() as u32 == width));
        PixelMatrix {
            width,
            height,
            grid: rows.iter().flatten().copied().collect(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Whether the cell at (x, y) is ink. Out-of-bounds queries are white,
    /// never an error — callers probe freely around the edges.
    pub fn is_ink(&self, x: i32, y: i32) -> bool {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return false;
        }
        self.grid[(y as u32 * self.width + x as u32) as usize]
    }

    fn contains(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && x < self.width as i32 && y < self.height as i32
    }

    /// Copy out a sub-rectangle, clipping `w`/`h` down to what remains
    /// inside the source. Requests past the edge yield a smaller (possibly
    /// zero-sized) matrix rather than an error.
    pub fn subregion(&self, x: u32, y: u32, w: u32, h: u32) -> PixelMatrix {
        let x = x.min(self.width);
        let y = y.min(self.height);
        let w = w.min(self.width - x);
        let h = h.min(self.height - y);

        let mut grid = Vec::with_capacity((w * h) as usize);
        for row in y..y + h {
            let start = (row * self.width + x) as usize;
            grid.extend_from_slice(&self.grid[start..start + w as usize]);
        }
        PixelMatrix { width: w, height: h, grid }
    }

    /// Overlay `other` onto `self` shifted by `(dx, dy)` and collect every
    /// mismatching cell coordinate (in `self`'s coordinate space).
    ///
    /// The scan window is the union of both matrices' extents expanded by
    /// [`COMPARE_MARGIN`] on every side, so a few pixels of alignment slack
    /// cost nothing while stray ink in the slack zone still counts. Cells
    /// outside both matrices are skipped; a cell covered by exactly one
    /// matrix is compared against implicit white.
    pub fn compare_at(&self, other: &PixelMatrix, dx: i32, dy: i32) -> Vec<(i32, i32)> {
        let x_min = 0.min(dx) - COMPARE_MARGIN;
        let y_min = 0.min(dy) - COMPARE_MARGIN;
        let x_max = (self.width as i32).max(dx + other.width as i32) + COMPARE_MARGIN;
        let y_max = (self.height as i32).max(dy + other.height as i32) + COMPARE_MARGIN;

        let mut mismatches = Vec::new();
        for y in y_min..y_max {
            for x in x_min..x_max {
                let in_self = self.contains(x, y);
                let in_other = other.contains(x - dx, y - dy);
                if !in_self && !in_other {
                    continue;
                }
                if self.is_ink(x, y) != other.is_ink(x - dx, y - dy) {
                    mismatches.push((x, y));
                }
            }
        }
        mismatches
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Rgb, RgbImage};

    /// 10x10 image with an ink pixel at (3, 4).
    fn dotted_image() -> DynamicImage {
        let mut img = RgbImage::from_pixel(10, 10, Rgb([255, 255, 255]));
        img.put_pixel(3, 4, Rgb([0, 0, 0]));
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn from_image_pure_black_is_ink() {
        let m = PixelMatrix::from_image(&dotted_image());
        assert!(m.is_ink(3, 4));
        assert!(!m.is_ink(4, 4));
    }

    #[test]
    fn near_black_is_not_ink() {
        let mut img = RgbImage::from_pixel(2, 2, Rgb([255, 255, 255]));
        img.put_pixel(0, 0, Rgb([1, 0, 0]));
        let m = PixelMatrix::from_image(&DynamicImage::ImageRgb8(img));
        assert!(!m.is_ink(0, 0));
    }

    #[test]
    fn out_of_bounds_is_white() {
        let m = PixelMatrix::from_image(&dotted_image());
        assert!(!m.is_ink(-1, 0));
        assert!(!m.is_ink(0, -5));
        assert!(!m.is_ink(10, 0));
        assert!(!m.is_ink(0, 10));
    }

    #[test]
    fn subregion_clips_to_source_bounds() {
        let m = PixelMatrix::from_image(&dotted_image());
        let sub = m.subregion(8, 8, 5, 5);
        assert_eq!(sub.width(), 2);
        assert_eq!(sub.height(), 2);
    }

    #[test]
    fn subregion_past_the_edge_is_empty() {
        let m = PixelMatrix::from_image(&dotted_image());
        let sub = m.subregion(20, 20, 5, 5);
        assert_eq!(sub.width(), 0);
        assert_eq!(sub.height(), 0);
    }

    #[test]
    fn subregion_preserves_ink_positions() {
        let m = PixelMatrix::from_image(&dotted_image());
        let sub = m.subregion(2, 3, 4, 4);
        assert!(sub.is_ink(1, 1));
        assert!(!sub.is_ink(0, 0));
    }

    #[test]
    fn compare_against_self_is_empty() {
        let m = PixelMatrix::from_image(&dotted_image());
        assert!(m.compare_at(&m, 0, 0).is_empty());
    }

    #[test]
    fn compare_shifted_counts_both_cells() {
        let m = PixelMatrix::from_image(&dotted_image());
        // Shift by one: the dot no longer lines up, producing a mismatch
        // where self has ink and one where the overlay has ink.
        let diff = m.compare_at(&m, 1, 0);
        assert_eq!(diff.len(), 2);
        assert!(diff.contains(&(3, 4)));
        assert!(diff.contains(&(4, 4)));
    }

    #[test]
    fn size_mismatch_compares_remainder_against_white() {
        let big = PixelMatrix::from_rows(&[
            vec![true, true, true],
            vec![false, false, false],
        ]);
        let small = PixelMatrix::from_rows(&[vec![true]]);
        // Overlap cell (0,0) matches; (1,0) and (2,0) are ink against the
        // missing side's implicit white.
        let diff = big.compare_at(&small, 0, 0);
        assert_eq!(diff.len(), 2);
        assert!(diff.contains(&(1, 0)));
        assert!(diff.contains(&(2, 0)));
    }

    #[test]
    fn margin_zone_ink_is_penalized() {
        let blank = PixelMatrix::from_rows(&vec![vec![false; 8]; 8]);
        let mut rows = vec![vec![false; 8]; 8];
        rows[7][7] = true;
        let speck = PixelMatrix::from_rows(&rows);
        // Overlay anchored so the speck lands outside `blank` entirely,
        // in the scanned slack zone — it must still be counted.
        let diff = blank.compare_at(&speck, -10, -10);
        assert!(diff.contains(&(-3, -3)));
    }
}
