//! Staged recovery of a numeric field from a weak OCR word.
//!
//! Cheapest fix first: parse the text as-is, then merge a wrongly split
//! neighbour, then re-run the engine on the narrowed word box in digit-only
//! mode, and finally re-read the whole line as a token stream. Line-level
//! re-OCR goes last because it costs the most and is the most likely to
//! pull in unrelated neighbouring text.

use std::path::Path;

use beleg_core::{parse_comma_decimal, Rect};
use image::DynamicImage;
use regex::Regex;
use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::cache::ImageCache;
use crate::engine::{OcrEngine, OcrError, RecognizeOptions};
use crate::hierarchy::{Document, Line, Word};
use crate::token::parse_tsv;

/// Everything a recovery attempt needs beyond the word itself: the page
/// image (for narrowed re-OCR) and the engine handle to run it with.
pub struct ExtractContext<'a> {
    pub image_path: &'a Path,
    pub cache: &'a ImageCache,
    pub engine: &'a mut dyn OcrEngine,
}

/// A successfully recovered numeric value.
///
/// `word_offset` is how many extra words beyond the target were consumed
/// (1 when the value was stitched from the next word); callers scanning a
/// line advance past them. Immutable once returned.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NumericRead {
    pub value: Decimal,
    pub source_rect: Rect,
    /// Raw strings attempted by earlier, failed stages, in stage order.
    pub tried: Vec<String>,
    pub word_offset: usize,
}

/// All four stages failed. Carries the ordered attempt history — one entry
/// per stage, engine error messages standing in for unavailable text.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("numeric recovery exhausted after {} attempts: {tried:?}", .tried.len())]
pub struct Exhausted {
    pub tried: Vec<String>,
}

pub struct NumericChain;

impl NumericChain {
    /// Recover a decimal value for `line.words[word_idx]`, escalating
    /// through the four stages until one produces text that fully matches
    /// `pattern` and parses under the comma-decimal rule.
    ///
    /// Engine failures (including timeouts) are recorded and escalate;
    /// they never abort the caller's batch.
    pub fn extract(
        line: &Line,
        word_idx: usize,
        pattern: &Regex,
        ctx: &mut ExtractContext<'_>,
    ) -> Result<NumericRead, Exhausted> {
        let word = &line.words[word_idx];
        let mut tried = Vec::new();

        // Stage 1: the engine's own answer.
        if let Some(value) = accept(pattern, &word.text) {
            return Ok(NumericRead {
                value,
                source_rect: word.word_rect(),
                tried,
                word_offset: 0,
            });
        }
        tried.push(word.text.clone());
        debug!(text = %word.text, "direct parse failed; trying merge");

        // Stage 2: the engine sometimes splits a number around a phantom
        // space ("-0," + "36"); stitch the next word on and retry.
        let next = line.words.get(word_idx + 1);
        let merged = match next {
            Some(next) => format!("{}{}", word.text, next.text),
            None => word.text.clone(),
        };
        if let (Some(next), Some(value)) = (next, accept(pattern, &merged)) {
            return Ok(NumericRead {
                value,
                source_rect: word.word_rect().union(next.word_rect()),
                tried,
                word_offset: 1,
            });
        }
        tried.push(merged);
        debug!(word = %word.text, "merge failed; re-reading word region");

        // Stage 3: digit-only re-OCR of the dilated word box.
        match reocr_word(word, ctx) {
            Ok(text) => {
                if let Some(value) = accept(pattern, &text) {
                    return Ok(NumericRead {
                        value,
                        source_rect: word.word_rect(),
                        tried,
                        word_offset: 0,
                    });
                }
                tried.push(text);
            }
            Err(e) => tried.push(e.to_string()),
        }
        debug!(word = %word.text, "word re-read failed; re-reading full line");

        // Stage 4: tabular re-OCR of the dilated line box.
        match reocr_line(line, word_idx, pattern, ctx) {
            Ok(Some((value, source_rect))) => {
                return Ok(NumericRead { value, source_rect, tried, word_offset: 0 });
            }
            Ok(None) => tried.push(String::new()),
            Err(attempt) => tried.push(attempt),
        }

        Err(Exhausted { tried })
    }
}

/// Full-match check plus comma-decimal parse; `None` on either failure.
fn accept(pattern: &Regex, text: &str) -> Option<Decimal> {
    let text = text.trim();
    let matched = pattern.find(text)?;
    if matched.start() != 0 || matched.end() != text.len() {
        return None;
    }
    parse_comma_decimal(text).ok()
}

fn crop(image: &DynamicImage, rect: Rect) -> Result<(DynamicImage, Rect), OcrError> {
    let clamped = rect.clamp_to(image.width(), image.height());
    if clamped.is_empty() {
        return Err(OcrError::ImageDecode(format!(
            "region {rect} lies outside the {}x{} page image",
            image.width(),
            image.height()
        )));
    }
    let region = image.crop_imm(
        clamped.x as u32,
        clamped.y as u32,
        clamped.width,
        clamped.height,
    );
    Ok((region, clamped))
}

fn reocr_word(word: &Word, ctx: &mut ExtractContext<'_>) -> Result<String, OcrError> {
    let image = ctx.cache.load(ctx.image_path)?;
    let (region, _) = crop(&image, word.word_rect())?;
    let text = ctx.engine.recognize(&region, &RecognizeOptions::digits())?;
    Ok(text.trim().to_string())
}

/// Re-read the whole line as a token stream and pick the word at the same
/// index-from-end as the original target.
///
/// The dilated line box can bleed content from the line directly above, so
/// the *last* reconstructed line is used and any earlier ones discarded.
/// This is a heuristic, not an invariant: it degenerates harmlessly when
/// the narrow region yields a single line.
///
/// `Ok(Some(_))` carries the value and its rectangle translated back to
/// page coordinates; `Ok(None)` means no candidate word;
/// `Err` carries the attempt string to record (a mismatching candidate's
/// text, or the engine/rebuild error message).
fn reocr_line(
    line: &Line,
    word_idx: usize,
    pattern: &Regex,
    ctx: &mut ExtractContext<'_>,
) -> Result<Option<(Decimal, Rect)>, String> {
    let image = ctx.cache.load(ctx.image_path).map_err(|e| e.to_string())?;
    let (region, crop_rect) = crop(&image, line.rect.dilate(2)).map_err(|e| e.to_string())?;

    let tsv = ctx
        .engine
        .recognize(&region, &RecognizeOptions::line_tsv())
        .map_err(|e| e.to_string())?;
    let tokens = parse_tsv(&tsv).map_err(|e| e.to_string())?;
    let document = Document::parse(&tokens).map_err(|e| e.to_string())?;

    let Some(reread) = document.lines().last() else {
        return Ok(None);
    };
    let from_end = line.words.len() - 1 - word_idx;
    let Some(candidate_idx) = reread.words.len().checked_sub(1 + from_end) else {
        return Ok(None);
    };
    let candidate = &reread.words[candidate_idx];

    match accept(pattern, &candidate.text) {
        Some(value) => {
            let rect = candidate
                .word_rect()
                .translate(crop_rect.x, crop_rect.y);
            Ok(Some((value, rect)))
        }
        None => Err(candidate.text.clone()),
    }
}
