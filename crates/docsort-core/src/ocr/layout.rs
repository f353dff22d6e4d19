//! Word-level OCR layout and line assembly.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A single recognized word with its bounding box and grouping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrWord {
    pub text: String,
    pub left: i32,
    pub top: i32,
    pub width: i32,
    pub height: i32,
    /// Recognition confidence (0-100).
    pub confidence: f32,
    pub block: u32,
    pub paragraph: u32,
    pub line: u32,
}

impl OcrWord {
    /// Horizontal center of the bounding box.
    pub fn center_x(&self) -> f32 {
        self.left as f32 + self.width as f32 / 2.0
    }
}

/// Words sharing a (block, paragraph, line) key, ordered left to right.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrLine {
    pub block: u32,
    pub paragraph: u32,
    pub line: u32,
    pub words: Vec<OcrWord>,
}

impl OcrLine {
    pub fn text(&self) -> String {
        self.words
            .iter()
            .map(|w| w.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn top(&self) -> i32 {
        self.words.iter().map(|w| w.top).min().unwrap_or(0)
    }

    pub fn bottom(&self) -> i32 {
        self.words.iter().map(|w| w.top + w.height).max().unwrap_or(0)
    }

    /// False for lines synthesized from plain text.
    pub fn has_geometry(&self) -> bool {
        self.words.iter().any(|w| w.width > 0 && w.height > 0)
    }

    /// Median of the word centers.
    pub fn median_center(&self) -> Option<f32> {
        if !self.has_geometry() {
            return None;
        }
        let mut centers: Vec<f32> = self.words.iter().map(OcrWord::center_x).collect();
        centers.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let mid = centers.len() / 2;
        if centers.len() % 2 == 0 {
            Some((centers[mid - 1] + centers[mid]) / 2.0)
        } else {
            Some(centers[mid])
        }
    }

    /// Text of the words whose center is at or left of `limit`.
    ///
    /// Lines without geometry are returned whole.
    pub fn text_left_of(&self, limit: f32) -> String {
        if !self.has_geometry() {
            return self.text();
        }
        self.words
            .iter()
            .filter(|w| w.center_x() <= limit)
            .map(|w| w.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn same_paragraph(&self, other: &OcrLine) -> bool {
        self.block == other.block && self.paragraph == other.paragraph
    }
}

/// Lines of one page plus the page dimensions in pixels.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageLayout {
    pub width: u32,
    pub height: u32,
    pub lines: Vec<OcrLine>,
}

impl PageLayout {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Layout built from recognized words.
    pub fn from_words(width: u32, height: u32, words: Vec<OcrWord>, min_confidence: f32) -> Self {
        Self {
            width,
            height,
            lines: assemble_lines(words, min_confidence),
        }
    }

    /// Geometry-free layout from plain text, one line per text line.
    pub fn from_text(text: &str) -> Self {
        Self {
            width: 0,
            height: 0,
            lines: lines_from_text(text),
        }
    }
}

/// Group words into lines, dropping low-confidence and empty words first.
pub fn assemble_lines(words: Vec<OcrWord>, min_confidence: f32) -> Vec<OcrLine> {
    let mut grouped: BTreeMap<(u32, u32, u32), Vec<OcrWord>> = BTreeMap::new();

    for word in words {
        if word.confidence < min_confidence || word.text.trim().is_empty() {
            continue;
        }
        grouped
            .entry((word.block, word.paragraph, word.line))
            .or_default()
            .push(word);
    }

    grouped
        .into_iter()
        .map(|((block, paragraph, line), mut words)| {
            words.sort_by_key(|w| w.left);
            OcrLine {
                block,
                paragraph,
                line,
                words,
            }
        })
        .collect()
}

/// Synthetic lines from plain text, all in block 0 / paragraph 0.
pub fn lines_from_text(text: &str) -> Vec<OcrLine> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .enumerate()
        .map(|(idx, l)| OcrLine {
            block: 0,
            paragraph: 0,
            line: idx as u32,
            words: l
                .split_whitespace()
                .map(|w| OcrWord {
                    text: w.to_string(),
                    left: 0,
                    top: idx as i32,
                    width: 0,
                    height: 0,
                    confidence: 100.0,
                    block: 0,
                    paragraph: 0,
                    line: idx as u32,
                })
                .collect(),
        })
        .collect()
}

/// Parse tesseract TSV output into word records.
///
/// Only level-5 (word) rows with text and a non-negative confidence are kept.
pub fn parse_tsv(tsv: &str) -> Vec<OcrWord> {
    let mut words = Vec::new();

    for row in tsv.lines().skip(1) {
        let cols: Vec<&str> = row.split('\t').collect();
        if cols.len() < 12 || cols[0] != "5" {
            continue;
        }

        let int = |idx: usize| cols[idx].trim().parse::<i32>().ok();
        let (Some(block), Some(paragraph), Some(line)) = (int(2), int(3), int(4)) else {
            continue;
        };
        let (Some(left), Some(top), Some(width), Some(height)) = (int(6), int(7), int(8), int(9))
        else {
            continue;
        };
        let Ok(confidence) = cols[10].trim().parse::<f32>() else {
            continue;
        };

        let text = cols[11..].join("\t").trim().to_string();
        if text.is_empty() || confidence < 0.0 {
            continue;
        }

        words.push(OcrWord {
            text,
            left,
            top,
            width,
            height,
            confidence,
            block: block.max(0) as u32,
            paragraph: paragraph.max(0) as u32,
            line: line.max(0) as u32,
        });
    }

    words
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn word(text: &str, left: i32, top: i32, conf: f32, key: (u32, u32, u32)) -> OcrWord {
        OcrWord {
            text: text.to_string(),
            left,
            top,
            width: 40,
            height: 20,
            confidence: conf,
            block: key.0,
            paragraph: key.1,
            line: key.2,
        }
    }

    #[test]
    fn test_assemble_lines_groups_and_orders() {
        let words = vec![
            word("LTDA", 200, 10, 90.0, (1, 1, 1)),
            word("ACME", 100, 10, 90.0, (1, 1, 1)),
            word("ruido", 300, 10, 10.0, (1, 1, 1)),
            word("CNPJ", 100, 40, 95.0, (1, 1, 2)),
        ];
        let lines = assemble_lines(words, 40.0);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text(), "ACME LTDA");
        assert_eq!(lines[1].text(), "CNPJ");
        assert_eq!(lines[0].top(), 10);
        assert_eq!(lines[0].bottom(), 30);
    }

    #[test]
    fn test_median_center_and_left_filter() {
        let line = OcrLine {
            block: 1,
            paragraph: 1,
            line: 1,
            words: vec![
                word("A", 0, 0, 90.0, (1, 1, 1)),
                word("B", 100, 0, 90.0, (1, 1, 1)),
                word("C", 900, 0, 90.0, (1, 1, 1)),
            ],
        };
        assert_eq!(line.median_center(), Some(120.0));
        assert_eq!(line.text_left_of(150.0), "A B");
    }

    #[test]
    fn test_lines_from_text_have_no_geometry() {
        let lines = lines_from_text("ACME LTDA\n\n  CNPJ 1  \n");
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1].text(), "CNPJ 1");
        assert!(!lines[0].has_geometry());
        assert_eq!(lines[0].median_center(), None);
        assert!(lines[0].same_paragraph(&lines[1]));
    }

    #[test]
    fn test_parse_tsv() {
        let tsv = "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext\n\
                   1\t1\t0\t0\t0\t0\t0\t0\t2480\t3508\t-1\t\n\
                   5\t1\t1\t1\t1\t1\t120\t80\t200\t30\t96.5\tACME\n\
                   5\t1\t1\t1\t1\t2\t330\t80\t150\t30\t-1\t\n\
                   5\t1\t1\t1\t1\t3\t500\t80\t150\t30\t91\tLTDA\n";
        let words = parse_tsv(tsv);
        assert_eq!(words.len(), 2);
        assert_eq!(words[0].text, "ACME");
        assert_eq!(words[0].left, 120);
        assert_eq!(words[1].confidence, 91.0);
        assert_eq!((words[1].block, words[1].paragraph, words[1].line), (1, 1, 1));
    }
}
