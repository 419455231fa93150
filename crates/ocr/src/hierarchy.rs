//! Rebuilds the page → block → paragraph → line → word tree from the flat
//! token stream the OCR engine emits.
//!
//! Ownership is strictly tree-shaped: every node is owned by its parent's
//! child list and never points back up. Upward context (a word's parent
//! line, a line's page image) travels as explicit arguments instead.

use std::collections::BTreeMap;

use beleg_core::Rect;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::token::{Token, TokenLevel};

#[derive(Debug, Error)]
pub enum HierarchyError {
    #[error("Malformed token row {row}")]
    MalformedRow { row: usize },
    #[error("Duplicate {level:?} descriptor in group (page {page}, block {block}, paragraph {paragraph})")]
    DuplicateContainer {
        level: TokenLevel,
        page: u32,
        block: u32,
        paragraph: u32,
    },
    #[error("Missing line descriptor for line {line} in group (page {page}, block {block}, paragraph {paragraph})")]
    MissingContainer {
        page: u32,
        block: u32,
        paragraph: u32,
        line: u32,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Word {
    pub number: u32,
    pub rect: Rect,
    pub confidence: f32,
    pub text: String,
}

impl Word {
    /// The box the engine reports hugs the glyphs too tightly for reliable
    /// re-recognition; region re-OCR always uses this 2-px dilation.
    pub fn word_rect(&self) -> Rect {
        self.rect.dilate(2)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Line {
    pub number: u32,
    pub rect: Rect,
    pub words: Vec<Word>,
}

impl Line {
    /// Word texts joined by single spaces in word-number order.
    /// Empty for a blank OCR region.
    pub fn text(&self) -> String {
        self.words
            .iter()
            .map(|w| w.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paragraph {
    pub number: u32,
    pub rect: Rect,
    pub lines: Vec<Line>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub number: u32,
    pub rect: Rect,
    pub paragraphs: Vec<Paragraph>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub number: u32,
    pub rect: Rect,
    pub blocks: Vec<Block>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Document {
    pub pages: Vec<Page>,
}

// Accumulators used while grouping the flat stream. Descriptor slots hold
// the unique container row for their tier; a second arrival is fatal.
#[derive(Default)]
struct LineGroup {
    descriptor: Option<Token>,
    words: Vec<Token>,
}

#[derive(Default)]
struct ParagraphGroup {
    descriptor: Option<Token>,
    lines: BTreeMap<u32, LineGroup>,
}

#[derive(Default)]
struct BlockGroup {
    descriptor: Option<Token>,
    paragraphs: BTreeMap<u32, ParagraphGroup>,
}

#[derive(Default)]
struct PageGroup {
    descriptor: Option<Token>,
    blocks: BTreeMap<u32, BlockGroup>,
}

impl Document {
    /// Group an ordered token stream into the containment tree.
    ///
    /// A duplicate container descriptor within its grouping key means the
    /// input is malformed (or the engine's row shape changed) and aborts
    /// the parse. A missing page/block/paragraph descriptor is tolerated —
    /// the node's geometry falls back to the union of its children — but a
    /// word row without its line descriptor is the same class of defect as
    /// a duplicate.
    pub fn parse(tokens: &[Token]) -> Result<Document, HierarchyError> {
        let mut pages: BTreeMap<u32, PageGroup> = BTreeMap::new();

        for token in tokens {
            let page = pages.entry(token.page).or_default();
            match token.level {
                TokenLevel::Page => {
                    set_descriptor(&mut page.descriptor, token)?;
                }
                TokenLevel::Block => {
                    let block = page.blocks.entry(token.block).or_default();
                    set_descriptor(&mut block.descriptor, token)?;
                }
                TokenLevel::Paragraph => {
                    let para = page
                        .blocks
                        .entry(token.block)
                        .or_default()
                        .paragraphs
                        .entry(token.paragraph)
                        .or_default();
                    set_descriptor(&mut para.descriptor, token)?;
                }
                TokenLevel::Line => {
                    let line = line_group(page, token);
                    if line.descriptor.is_some() {
                        return Err(HierarchyError::DuplicateContainer {
                            level: TokenLevel::Line,
                            page: token.page,
                            block: token.block,
                            paragraph: token.paragraph,
                        });
                    }
                    line.descriptor = Some(token.clone());
                }
                TokenLevel::Word => {
                    line_group(page, token).words.push(token.clone());
                }
            }
        }

        let mut document = Document::default();
        for (page_no, page_group) in pages {
            let mut blocks = Vec::new();
            for (block_no, block_group) in page_group.blocks {
                let mut paragraphs = Vec::new();
                for (para_no, para_group) in block_group.paragraphs {
                    paragraphs.push(build_paragraph(page_no, block_no, para_no, para_group)?);
                }
                blocks.push(Block {
                    number: block_no,
                    rect: container_rect(
                        &block_group.descriptor,
                        paragraphs.iter().map(|p| p.rect),
                    ),
                    paragraphs,
                });
            }
            document.pages.push(Page {
                number: page_no,
                rect: container_rect(&page_group.descriptor, blocks.iter().map(|b| b.rect)),
                blocks,
            });
        }
        Ok(document)
    }

    /// Re-emit the tree as tabular rows, suitable for `Token::to_tsv_row`
    /// serialization. Parsing the emitted rows reproduces the document.
    pub fn to_rows(&self) -> Vec<Token> {
        let mut rows = Vec::new();
        for page in &self.pages {
            rows.push(container_token(TokenLevel::Page, page.number, 0, 0, 0, page.rect));
            for block in &page.blocks {
                rows.push(container_token(
                    TokenLevel::Block,
                    page.number,
                    block.number,
                    0,
                    0,
                    block.rect,
                ));
                for para in &block.paragraphs {
                    rows.push(container_token(
                        TokenLevel::Paragraph,
                        page.number,
                        block.number,
                        para.number,
                        0,
                        para.rect,
                    ));
                    for line in &para.lines {
                        rows.push(container_token(
                            TokenLevel::Line,
                            page.number,
                            block.number,
                            para.number,
                            line.number,
                            line.rect,
                        ));
                        for word in &line.words {
                            rows.push(Token {
                                level: TokenLevel::Word,
                                page: page.number,
                                block: block.number,
                                paragraph: para.number,
                                line: line.number,
                                word: word.number,
                                rect: word.rect,
                                confidence: word.confidence,
                                text: word.text.clone(),
                            });
                        }
                    }
                }
            }
        }
        rows
    }

    /// Total number of recognized words across all pages.
    pub fn word_count(&self) -> usize {
        self.pages
            .iter()
            .flat_map(|p| &p.blocks)
            .flat_map(|b| &b.paragraphs)
            .flat_map(|pa| &pa.lines)
            .map(|l| l.words.len())
            .sum()
    }

    /// All lines in reading order (page, block, paragraph, line).
    pub fn lines(&self) -> impl Iterator<Item = &Line> + '_ {
        self.pages
            .iter()
            .flat_map(|p| &p.blocks)
            .flat_map(|b| &b.paragraphs)
            .flat_map(|pa| &pa.lines)
    }
}

fn set_descriptor(slot: &mut Option<Token>, token: &Token) -> Result<(), HierarchyError> {
    if slot.is_some() {
        return Err(HierarchyError::DuplicateContainer {
            level: token.level,
            page: token.page,
            block: token.block,
            paragraph: token.paragraph,
        });
    }
    *slot = Some(token.clone());
    Ok(())
}

fn line_group<'a>(page: &'a mut PageGroup, token: &Token) -> &'a mut LineGroup {
    page.blocks
        .entry(token.block)
        .or_default()
        .paragraphs
        .entry(token.paragraph)
        .or_default()
        .lines
        .entry(token.line)
        .or_default()
}

fn build_paragraph(
    page: u32,
    block: u32,
    paragraph: u32,
    group: ParagraphGroup,
) -> Result<Paragraph, HierarchyError> {
    let mut lines = Vec::new();
    for (line_no, mut line_group) in group.lines {
        let descriptor =
            line_group
                .descriptor
                .ok_or(HierarchyError::MissingContainer {
                    page,
                    block,
                    paragraph,
                    line: line_no,
                })?;
        line_group.words.sort_by_key(|w| w.word);
        lines.push(Line {
            number: line_no,
            rect: descriptor.rect,
            words: line_group
                .words
                .into_iter()
                .map(|t| Word {
                    number: t.word,
                    rect: t.rect,
                    confidence: t.confidence,
                    text: t.text,
                })
                .collect(),
        });
    }
    Ok(Paragraph {
        number: paragraph,
        rect: container_rect(&group.descriptor, lines.iter().map(|l| l.rect)),
        lines,
    })
}

fn container_rect(
    descriptor: &Option<Token>,
    children: impl Iterator<Item = Rect>,
) -> Rect {
    if let Some(token) = descriptor {
        return token.rect;
    }
    children
        .reduce(Rect::union)
        .unwrap_or(Rect::new(0, 0, 0, 0))
}

fn container_token(
    level: TokenLevel,
    page: u32,
    block: u32,
    paragraph: u32,
    line: u32,
    rect: Rect,
) -> Token {
    Token {
        level,
        page,
        block,
        paragraph,
        line,
        word: 0,
        rect,
        confidence: -1.0,
        text: String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::parse_tsv;

    fn row(
        level: u8,
        page: u32,
        block: u32,
        par: u32,
        line: u32,
        word: u32,
        rect: (i32, i32, u32, u32),
        text: &str,
    ) -> String {
        let conf = if level == 5 { "91.0" } else { "-1" };
        format!(
            "{level}\t{page}\t{block}\t{par}\t{line}\t{word}\t{}\t{}\t{}\t{}\t{conf}\t{text}",
            rect.0, rect.1, rect.2, rect.3
        )
    }

    fn receipt_rows() -> Vec<String> {
        vec![
            row(1, 1, 0, 0, 0, 0, (0, 0, 600, 800), ""),
            row(2, 1, 1, 0, 0, 0, (20, 30, 560, 700), ""),
            row(3, 1, 1, 1, 0, 0, (20, 30, 560, 340), ""),
            row(4, 1, 1, 1, 1, 0, (20, 30, 560, 24), ""),
            row(5, 1, 1, 1, 1, 1, (20, 30, 90, 24), "MILCH"),
            row(5, 1, 1, 1, 1, 2, (400, 30, 60, 24), "1,09"),
            row(4, 1, 1, 1, 2, 0, (20, 60, 560, 24), ""),
            row(5, 1, 1, 1, 2, 1, (20, 60, 90, 24), "BUTTER"),
            row(5, 1, 1, 1, 2, 2, (400, 60, 60, 24), "2,49"),
        ]
    }

    fn parse(rows: &[String]) -> Result<Document, HierarchyError> {
        Document::parse(&parse_tsv(&rows.join("\n")).unwrap())
    }

    #[test]
    fn word_count_matches_level5_rows() {
        let doc = parse(&receipt_rows()).unwrap();
        assert_eq!(doc.word_count(), 4);
    }

    #[test]
    fn line_text_joins_words_in_word_order() {
        let mut rows = receipt_rows();
        // Out-of-order word numbers must still join in numeric order.
        rows.swap(4, 5);
        let doc = parse(&rows).unwrap();
        let texts: Vec<String> = doc.lines().map(|l| l.text()).collect();
        assert_eq!(texts, vec!["MILCH 1,09", "BUTTER 2,49"]);
    }

    #[test]
    fn container_geometry_comes_from_descriptor_rows() {
        let doc = parse(&receipt_rows()).unwrap();
        assert_eq!(doc.pages[0].rect, Rect::new(0, 0, 600, 800));
        assert_eq!(doc.pages[0].blocks[0].rect, Rect::new(20, 30, 560, 700));
        let line = &doc.pages[0].blocks[0].paragraphs[0].lines[0];
        assert_eq!(line.rect, Rect::new(20, 30, 560, 24));
    }

    #[test]
    fn duplicate_block_descriptor_is_fatal() {
        let mut rows = receipt_rows();
        rows.push(row(2, 1, 1, 0, 0, 0, (0, 0, 1, 1), ""));
        let err = parse(&rows).unwrap_err();
        assert!(matches!(
            err,
            HierarchyError::DuplicateContainer { level: TokenLevel::Block, page: 1, block: 1, .. }
        ));
    }

    #[test]
    fn duplicate_line_descriptor_is_fatal() {
        let mut rows = receipt_rows();
        rows.push(row(4, 1, 1, 1, 2, 0, (0, 0, 1, 1), ""));
        assert!(parse(&rows).is_err());
    }

    #[test]
    fn word_without_line_descriptor_is_fatal() {
        let rows = vec![row(5, 1, 1, 1, 9, 1, (0, 0, 10, 10), "lost")];
        let err = parse(&rows).unwrap_err();
        assert!(matches!(err, HierarchyError::MissingContainer { line: 9, .. }));
    }

    #[test]
    fn empty_line_is_a_valid_node_with_empty_text() {
        let rows = vec![
            row(1, 1, 0, 0, 0, 0, (0, 0, 100, 100), ""),
            row(4, 1, 1, 1, 1, 0, (0, 0, 100, 10), ""),
        ];
        let doc = parse(&rows).unwrap();
        let line = &doc.pages[0].blocks[0].paragraphs[0].lines[0];
        assert!(line.words.is_empty());
        assert_eq!(line.text(), "");
    }

    #[test]
    fn empty_page_is_a_valid_node() {
        let rows = vec![row(1, 3, 0, 0, 0, 0, (0, 0, 100, 100), "")];
        let doc = parse(&rows).unwrap();
        assert_eq!(doc.pages.len(), 1);
        assert_eq!(doc.pages[0].number, 3);
        assert!(doc.pages[0].blocks.is_empty());
    }

    #[test]
    fn lines_sort_by_line_number() {
        let mut rows = receipt_rows();
        // Emit line 2 before line 1.
        rows[3..].rotate_left(3);
        let doc = parse(&rows).unwrap();
        let numbers: Vec<u32> = doc.lines().map(|l| l.number).collect();
        assert_eq!(numbers, vec![1, 2]);
    }

    #[test]
    fn missing_container_descriptors_fall_back_to_child_union() {
        // No block/paragraph descriptor rows at all.
        let rows = vec![
            row(4, 1, 1, 1, 1, 0, (10, 10, 100, 20), ""),
            row(5, 1, 1, 1, 1, 1, (10, 10, 40, 20), "A"),
        ];
        let doc = parse(&rows).unwrap();
        assert_eq!(doc.pages[0].blocks[0].rect, Rect::new(10, 10, 100, 20));
    }

    #[test]
    fn reparse_of_emitted_rows_is_identity() {
        let doc = parse(&receipt_rows()).unwrap();
        let reparsed = Document::parse(&doc.to_rows()).unwrap();
        assert_eq!(reparsed, doc);
    }

    #[test]
    fn emitted_rows_survive_tsv_serialization() {
        let doc = parse(&receipt_rows()).unwrap();
        let tsv: String = doc
            .to_rows()
            .iter()
            .map(|t| t.to_tsv_row())
            .collect::<Vec<_>>()
            .join("\n");
        let reparsed = Document::parse(&parse_tsv(&tsv).unwrap()).unwrap();
        assert_eq!(reparsed, doc);
    }
}
