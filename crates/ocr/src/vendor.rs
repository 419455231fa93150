use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use crate::chain::{ExtractContext, NumericChain, NumericRead};
use crate::hierarchy::{Document, Line};

// ── Compiled regex cache ─────────────────────────────────────────────────────

macro_rules! re {
    ($name:ident, $pat:expr) => {
        fn $name() -> &'static Regex {
            static R: OnceLock<Regex> = OnceLock::new();
            R.get_or_init(|| Regex::new($pat).expect("invalid regex"))
        }
    };
}

re!(re_money, r"-?\d+[.,]\d\d");
re!(re_money_signed_only, r"-\d+[.,]\d\d");
re!(re_quantity, r"\d+");

/// Receipt layouts differ per chain, but only in their patterns and
/// keywords — one tagged variant per vendor selecting a configuration
/// record, consumed by the same extraction driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VendorKind {
    Rewe,
    Lidl,
    Edeka,
    /// Fallback profile for unrecognized layouts.
    Generic,
}

/// Per-vendor extraction configuration.
pub struct VendorProfile {
    pub kind: VendorKind,
    /// Matches an item or total amount (full word).
    pub money_pattern: &'static Regex,
    /// Matches a discount/deposit amount (always signed).
    pub discount_pattern: &'static Regex,
    /// Matches an item count column.
    pub quantity_pattern: &'static Regex,
    /// Keyword introducing the grand-total line.
    pub total_keyword: &'static str,
    /// Header keywords that identify the vendor on the first page.
    detect_keywords: &'static [&'static str],
}

impl VendorKind {
    pub const ALL: [VendorKind; 4] =
        [VendorKind::Rewe, VendorKind::Lidl, VendorKind::Edeka, VendorKind::Generic];

    pub fn profile(self) -> VendorProfile {
        match self {
            VendorKind::Rewe => VendorProfile {
                kind: self,
                money_pattern: re_money(),
                discount_pattern: re_money_signed_only(),
                quantity_pattern: re_quantity(),
                total_keyword: "SUMME",
                detect_keywords: &["REWE"],
            },
            VendorKind::Lidl => VendorProfile {
                kind: self,
                money_pattern: re_money(),
                discount_pattern: re_money_signed_only(),
                quantity_pattern: re_quantity(),
                total_keyword: "zu zahlen",
                detect_keywords: &["LIDL", "Lidl"],
            },
            VendorKind::Edeka => VendorProfile {
                kind: self,
                money_pattern: re_money(),
                discount_pattern: re_money_signed_only(),
                quantity_pattern: re_quantity(),
                total_keyword: "SUMME",
                detect_keywords: &["EDEKA", "E center"],
            },
            VendorKind::Generic => VendorProfile {
                kind: self,
                money_pattern: re_money(),
                discount_pattern: re_money_signed_only(),
                quantity_pattern: re_quantity(),
                total_keyword: "SUMME",
                detect_keywords: &[],
            },
        }
    }

    /// Identify the vendor from header keywords on the first page.
    pub fn detect(document: &Document) -> VendorKind {
        let Some(first_page) = document.pages.first() else {
            return VendorKind::Generic;
        };
        let header: Vec<String> = first_page
            .blocks
            .iter()
            .flat_map(|b| &b.paragraphs)
            .flat_map(|p| &p.lines)
            .take(8)
            .map(|l| l.text())
            .collect();

        for kind in VendorKind::ALL {
            let profile = kind.profile();
            if profile
                .detect_keywords
                .iter()
                .any(|kw| header.iter().any(|line| line.contains(kw)))
            {
                debug!(?kind, "vendor identified from header");
                return kind;
            }
        }
        VendorKind::Generic
    }
}

impl VendorProfile {
    /// Whether this line carries the grand total.
    pub fn is_total_line(&self, line: &Line) -> bool {
        line.text().contains(self.total_keyword)
    }
}

/// Walk a line left to right and recover every amount matching `profile`'s
/// money pattern, running the chain on each digit-bearing word.
///
/// A read that consumed its right-hand neighbour (a merged split number)
/// reports `word_offset = 1`; the scan advances past the consumed word so
/// it is not read twice.
pub fn scan_line_amounts(
    line: &Line,
    profile: &VendorProfile,
    ctx: &mut ExtractContext<'_>,
) -> Vec<NumericRead> {
    let mut reads = Vec::new();
    let mut idx = 0;
    while idx < line.words.len() {
        let word = &line.words[idx];
        if !word.text.chars().any(|c| c.is_ascii_digit()) {
            idx += 1;
            continue;
        }
        match NumericChain::extract(line, idx, profile.money_pattern, ctx) {
            Ok(read) => {
                idx += 1 + read.word_offset;
                reads.push(read);
            }
            Err(exhausted) => {
                debug!(word = %word.text, ?exhausted, "no amount recovered for word");
                idx += 1;
            }
        }
    }
    reads
}
