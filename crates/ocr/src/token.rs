use beleg_core::Rect;
use serde::{Deserialize, Serialize};

use crate::hierarchy::HierarchyError;

/// Which hierarchy tier a tabular OCR row describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum TokenLevel {
    Page = 1,
    Block = 2,
    Paragraph = 3,
    Line = 4,
    Word = 5,
}

impl TokenLevel {
    pub fn from_u8(n: u8) -> Option<Self> {
        match n {
            1 => Some(TokenLevel::Page),
            2 => Some(TokenLevel::Block),
            3 => Some(TokenLevel::Paragraph),
            4 => Some(TokenLevel::Line),
            5 => Some(TokenLevel::Word),
            _ => None,
        }
    }
}

/// One row of the engine's tabular output: either a container descriptor
/// (levels 1–4, empty text, confidence -1) or a recognized word (level 5).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub level: TokenLevel,
    pub page: u32,
    pub block: u32,
    pub paragraph: u32,
    pub line: u32,
    pub word: u32,
    pub rect: Rect,
    pub confidence: f32,
    pub text: String,
}

impl Token {
    pub fn is_word(&self) -> bool {
        self.level == TokenLevel::Word
    }

    /// Serialize back to one tabular row (inverse of `parse_tsv` for a
    /// single row). Used to regenerate a cached token stream.
    pub fn to_tsv_row(&self) -> String {
        format!(
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            self.level as u8,
            self.page,
            self.block,
            self.paragraph,
            self.line,
            self.word,
            self.rect.x,
            self.rect.y,
            self.rect.width,
            self.rect.height,
            self.confidence,
            self.text,
        )
    }
}

const TSV_FIELDS: usize = 12;

/// Parse the engine's tab-separated token stream.
///
/// Row shape: `level page block par line word left top width height conf text`.
/// A header row (first field `level`) is skipped; blank lines are skipped.
/// The text field may be empty (container rows) but a row with fewer than
/// eleven fields is malformed input.
pub fn parse_tsv(input: &str) -> Result<Vec<Token>, HierarchyError> {
    let mut tokens = Vec::new();

    for (row_no, raw) in input.lines().enumerate() {
        let row = raw.trim_end_matches(['\r', '\n']);
        if row.trim().is_empty() {
            continue;
        }

        let fields: Vec<&str> = row.split('\t').collect();
        if row_no == 0 && fields.first() == Some(&"level") {
            continue;
        }
        // The text field of a container row is empty, so Tesseract emits
        // eleven tabs but some writers drop the trailing one.
        if fields.len() < TSV_FIELDS - 1 || fields.len() > TSV_FIELDS {
            return Err(HierarchyError::MalformedRow { row: row_no + 1 });
        }

        let malformed = || HierarchyError::MalformedRow { row: row_no + 1 };
        let level_num: u8 = fields[0].parse().map_err(|_| malformed())?;
        let level = TokenLevel::from_u8(level_num).ok_or_else(|| malformed())?;

        let num = |i: usize| -> Result<u32, HierarchyError> {
            fields[i].parse().map_err(|_| malformed())
        };
        let coord = |i: usize| -> Result<i32, HierarchyError> {
            fields[i].parse().map_err(|_| malformed())
        };

        tokens.push(Token {
            level,
            page: num(1)?,
            block: num(2)?,
            paragraph: num(3)?,
            line: num(4)?,
            word: num(5)?,
            rect: Rect::new(coord(6)?, coord(7)?, num(8)?, num(9)?),
            confidence: fields[10].parse().map_err(|_| malformed())?,
            text: fields.get(11).map(|s| s.to_string()).unwrap_or_default(),
        });
    }

    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext\n\
        1\t1\t0\t0\t0\t0\t0\t0\t600\t800\t-1\t\n\
        5\t1\t1\t1\t1\t1\t100\t50\t80\t30\t95.5\tGESAMT\n\
        5\t1\t1\t1\t1\t2\t190\t50\t70\t30\t92.3\t37,19\n";

    #[test]
    fn parses_header_container_and_words() {
        let tokens = parse_tsv(SAMPLE).unwrap();
        assert_eq!(tokens.len(), 3);

        assert_eq!(tokens[0].level, TokenLevel::Page);
        assert_eq!(tokens[0].confidence, -1.0);
        assert_eq!(tokens[0].text, "");

        assert_eq!(tokens[1].text, "GESAMT");
        assert_eq!(tokens[1].rect, beleg_core::Rect::new(100, 50, 80, 30));
        assert!(tokens[1].is_word());

        assert_eq!(tokens[2].text, "37,19");
        assert_eq!(tokens[2].word, 2);
    }

    #[test]
    fn container_row_without_trailing_tab_is_accepted() {
        let tokens = parse_tsv("4\t1\t1\t1\t2\t0\t10\t10\t200\t20\t-1").unwrap();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].level, TokenLevel::Line);
        assert_eq!(tokens[0].text, "");
    }

    #[test]
    fn short_row_is_malformed() {
        let err = parse_tsv("5\t1\t1\n").unwrap_err();
        assert!(matches!(err, HierarchyError::MalformedRow { row: 1 }));
    }

    #[test]
    fn unknown_level_is_malformed() {
        let row = "7\t1\t0\t0\t0\t0\t0\t0\t10\t10\t-1\t";
        assert!(parse_tsv(row).is_err());
    }

    #[test]
    fn tsv_row_round_trips() {
        let tokens = parse_tsv(SAMPLE).unwrap();
        let reemitted: String = tokens
            .iter()
            .map(|t| t.to_tsv_row())
            .collect::<Vec<_>>()
            .join("\n");
        assert_eq!(parse_tsv(&reemitted).unwrap(), tokens);
    }
}
