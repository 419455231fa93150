//! Fixed catalog of reference glyph rasters used as ground truth when the
//! engine's textual answer is too weak to trust.
//!
//! Receipts print numeric fields in a small set of monospaced sizes, so the
//! catalog carries each glyph at three size classes rendered from one
//! embedded 5x7 bitmap font. Matching is a brute-force best-fit slide of
//! the template over the candidate crop — quadratic in the crop's pixel
//! count, which is fine because crops are single characters.

use std::collections::HashMap;

use crate::matrix::PixelMatrix;

/// Glyphs that appear in receipt numeric fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Glyph {
    Zero,
    One,
    Two,
    Three,
    Four,
    Five,
    Six,
    Seven,
    Eight,
    Nine,
    Comma,
    Dash,
}

impl Glyph {
    pub const ALL: [Glyph; 12] = [
        Glyph::Zero,
        Glyph::One,
        Glyph::Two,
        Glyph::Three,
        Glyph::Four,
        Glyph::Five,
        Glyph::Six,
        Glyph::Seven,
        Glyph::Eight,
        Glyph::Nine,
        Glyph::Comma,
        Glyph::Dash,
    ];

    pub fn from_char(c: char) -> Option<Glyph> {
        match c {
            '0' => Some(Glyph::Zero),
            '1' => Some(Glyph::One),
            '2' => Some(Glyph::Two),
            '3' => Some(Glyph::Three),
            '4' => Some(Glyph::Four),
            '5' => Some(Glyph::Five),
            '6' => Some(Glyph::Six),
            '7' => Some(Glyph::Seven),
            '8' => Some(Glyph::Eight),
            '9' => Some(Glyph::Nine),
            ',' => Some(Glyph::Comma),
            '-' => Some(Glyph::Dash),
            _ => None,
        }
    }
}

/// Receipt font size classes, smallest to largest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SizeClass {
    Small,
    Medium,
    Large,
}

impl SizeClass {
    pub const ALL: [SizeClass; 3] = [SizeClass::Small, SizeClass::Medium, SizeClass::Large];

    /// Integer upscale factor applied to the base 5x7 font.
    fn scale(self) -> u32 {
        match self {
            SizeClass::Small => 2,
            SizeClass::Medium => 3,
            SizeClass::Large => 4,
        }
    }
}

/// Acceptance threshold: best diff divided by the padded template area.
/// The +20 padding matches the 10-px margin `compare_at` scans on each
/// side, so the ratio is computed over the area actually searched.
const SIMILARITY_THRESHOLD: f64 = 0.05;
const AREA_PADDING: u32 = 20;

pub struct TemplateLibrary {
    templates: HashMap<(Glyph, SizeClass), PixelMatrix>,
}

impl TemplateLibrary {
    pub fn new() -> Self {
        let mut templates = HashMap::new();
        for glyph in Glyph::ALL {
            for size in SizeClass::ALL {
                templates.insert((glyph, size), render(glyph, size.scale()));
            }
        }
        TemplateLibrary { templates }
    }

    pub fn template(&self, glyph: Glyph, size: SizeClass) -> &PixelMatrix {
        // The catalog is exhaustively populated in `new`.
        &self.templates[&(glyph, size)]
    }

    /// Whether `candidate` (a single-character crop) matches the reference
    /// raster for `glyph` at `size`.
    pub fn is_similar(&self, candidate: &PixelMatrix, glyph: Glyph, size: SizeClass) -> bool {
        let template = self.template(glyph, size);
        let total =
            (template.height() + AREA_PADDING) as f64 * (template.width() + AREA_PADDING) as f64;
        (best_difference(candidate, template) as f64) / total < SIMILARITY_THRESHOLD
    }

    /// Best-fit glyph for the crop at the given size, if any template
    /// clears the similarity threshold.
    pub fn identify(&self, candidate: &PixelMatrix, size: SizeClass) -> Option<Glyph> {
        Glyph::ALL
            .into_iter()
            .map(|g| (g, best_difference(candidate, self.template(g, size))))
            .filter(|&(g, diff)| {
                let t = self.template(g, size);
                let total =
                    (t.height() + AREA_PADDING) as f64 * (t.width() + AREA_PADDING) as f64;
                (diff as f64) / total < SIMILARITY_THRESHOLD
            })
            .min_by_key(|&(_, diff)| diff)
            .map(|(g, _)| g)
    }
}

impl Default for TemplateLibrary {
    fn default() -> Self {
        Self::new()
    }
}

/// Minimum mismatch count over every top-left anchor position of the
/// template within the candidate crop.
pub fn best_difference(candidate: &PixelMatrix, template: &PixelMatrix) -> usize {
    let max_dx = candidate.width().saturating_sub(template.width());
    let max_dy = candidate.height().saturating_sub(template.height());
    let mut best = usize::MAX;
    for dy in 0..=max_dy {
        for dx in 0..=max_dx {
            let diff = candidate.compare_at(template, dx as i32, dy as i32).len();
            best = best.min(diff);
            if best == 0 {
                return 0;
            }
        }
    }
    best
}

// ── Embedded 5x7 font ────────────────────────────────────────────────────────

const GLYPH_WIDTH: u32 = 5;
const GLYPH_HEIGHT: u32 = 7;

fn pattern(glyph: Glyph) -> [&'static str; 7] {
    match glyph {
        Glyph::Zero => [".###.", "#...#", "#..##", "#.#.#", "##..#", "#...#", ".###."],
        Glyph::One => ["..#..", ".##..", "..#..", "..#..", "..#..", "..#..", ".###."],
        Glyph::Two => [".###.", "#...#", "....#", "...#.", "..#..", ".#...", "#####"],
        Glyph::Three => [".###.", "#...#", "....#", "..##.", "....#", "#...#", ".###."],
        Glyph::Four => ["...#.", "..##.", ".#.#.", "#..#.", "#####", "...#.", "...#."],
        Glyph::Five => ["#####", "#....", "####.", "....#", "....#", "#...#", ".###."],
        Glyph::Six => ["..##.", ".#...", "#....", "####.", "#...#", "#...#", ".###."],
        Glyph::Seven => ["#####", "....#", "...#.", "..#..", ".#...", ".#...", ".#..."],
        Glyph::Eight => [".###.", "#...#", "#...#", ".###.", "#...#", "#...#", ".###."],
        Glyph::Nine => [".###.", "#...#", "#...#", ".####", "....#", "...#.", ".##.."],
        Glyph::Comma => [".....", ".....", ".....", ".....", "..##.", "..#..", ".#..."],
        Glyph::Dash => [".....", ".....", ".....", "#####", ".....", ".....", "....."],
    }
}

fn render(glyph: Glyph, scale: u32) -> PixelMatrix {
    let base = pattern(glyph);
    let rows: Vec<Vec<bool>> = (0..GLYPH_HEIGHT * scale)
        .map(|y| {
            let base_row = base[(y / scale) as usize].as_bytes();
            (0..GLYPH_WIDTH * scale)
                .map(|x| base_row[(x / scale) as usize] == b'#')
                .collect()
        })
        .collect();
    PixelMatrix::from_rows(&rows)
}
