/*! Layout signals: line lengths, unreadable text and tokens that should own their line.
 *
 * Packed droppers put kilobytes on one line, use far more punctuation than ordinary code, and
 * glue the opening tag to the payload. None of these is conclusive alone; the orchestrator weighs
 * them.
 */

use heurist_core::{CodeStyleConfig, KindGroup, TokenStream};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::debug;

const LINE_BREAK: &str = r"\r\n|\n|\r";
const SPECIAL_SYMBOL: &str = r"[^a-zA-Z0-9\s:]";
const WORD: &str = r"[A-Za-z0-9_+\-]+";
const DIGITS_INSIDE_WORD: &str = r"[^0-9][0-9]+\w";

static LINE_BREAK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(LINE_BREAK).expect("line break pattern compiles"));
static SPECIAL_SYMBOL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(SPECIAL_SYMBOL).expect("special symbol pattern compiles"));
static WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(WORD).expect("word pattern compiles"));
static DIGITS_INSIDE_WORD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(DIGITS_INSIDE_WORD).expect("digits inside word pattern compiles"));

/// Proportion reported for content without any special symbol.
const NO_SPECIAL_SYMBOLS: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BadLine {
    #[serde(rename = "long line")]
    LongLine,
    #[serde(rename = "unreadable")]
    Unreadable,
}

impl fmt::Display for BadLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BadLine::LongLine => f.write_str("long line"),
            BadLine::Unreadable => f.write_str("unreadable"),
        }
    }
}

/// How much of the file is markup, comments and code, by length and by line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TokenComposition {
    pub html_length: usize,
    pub comments_length: usize,
    pub code_length: usize,
    pub html_lines: BTreeSet<usize>,
    pub comment_lines: BTreeSet<usize>,
    pub code_lines: BTreeSet<usize>,
}

pub struct CodeStyle<'a> {
    config: &'a CodeStyleConfig,
    line_lengths: Vec<usize>,
    long_lines: Vec<usize>,
    critical_long_lines: Vec<usize>,
    unreadable: bool,
    greedy_lines: BTreeSet<usize>,
    composition: TokenComposition,
}

impl<'a> CodeStyle<'a> {
    pub fn new(config: &'a CodeStyleConfig) -> Self {
        Self {
            config,
            line_lengths: Vec::new(),
            long_lines: Vec::new(),
            critical_long_lines: Vec::new(),
            unreadable: false,
            greedy_lines: BTreeSet::new(),
            composition: TokenComposition::default(),
        }
    }

    /// Runs every check over the raw content and the unresolved stream.
    pub fn analyse(&mut self, content: &str, stream: &TokenStream) {
        self.analyse_line_lengths(content);
        self.analyse_unreadable_code(content);
        self.search_greedy_tokens(content, stream);
        self.sort_tokens(stream);
        debug!(
            long = self.long_lines.len(),
            critical = self.critical_long_lines.len(),
            unreadable = self.unreadable,
            greedy = self.greedy_lines.len(),
            "code style"
        );
    }

    pub fn analyse_line_lengths(&mut self, content: &str) {
        self.line_lengths = LINE_BREAK_RE.split(content).map(str::len).collect();
        for (index, &length) in self.line_lengths.iter().enumerate() {
            if length > self.config.normal_line_length {
                self.long_lines.push(index + 1);
            }
            if length > self.config.critical_line_length {
                self.critical_long_lines.push(index + 1);
            }
        }
    }

    pub fn analyse_unreadable_code(&mut self, content: &str) {
        let proportion = self.proportion_of_special_symbols(content);
        let weight = self.weight_of_random(content);
        self.unreadable = proportion <= self.config.special_symbols_proportion
            || weight > self.config.random_weight_threshold;
    }

    /// Lines where a token that must stand alone (full open tag, doc comment, heredoc start)
    /// shares its line with other text.
    pub fn search_greedy_tokens(&mut self, content: &str, stream: &TokenStream) {
        let lines: Vec<&str> = content.lines().collect();
        for token in stream.iter().filter(|t| t.is_in(KindGroup::OneLine)) {
            let Some(line) = token.line.checked_sub(1).and_then(|i| lines.get(i)) else {
                continue;
            };
            let own = token.text.lines().next().unwrap_or("").trim();
            if line.trim() != own {
                self.greedy_lines.insert(token.line);
            }
        }
    }

    pub fn sort_tokens(&mut self, stream: &TokenStream) {
        let composition = &mut self.composition;
        for token in stream.iter() {
            if token.is_in(KindGroup::Html) {
                composition.html_length += token.len();
                composition.html_lines.insert(token.line);
            } else if token.is_in(KindGroup::Comments) {
                composition.comments_length += token.len();
                composition.comment_lines.insert(token.line);
            } else {
                composition.code_length += token.len();
                composition.code_lines.insert(token.line);
            }
        }
    }

    /// Critical long lines, plus line 1 marked unreadable when the whole content is.
    pub fn bad_lines(&self) -> BTreeMap<usize, BadLine> {
        let mut bad: BTreeMap<usize, BadLine> = self
            .critical_long_lines
            .iter()
            .map(|&line| (line, BadLine::LongLine))
            .collect();
        if self.unreadable {
            bad.insert(1, BadLine::Unreadable);
        }
        bad
    }

    /// Content length per special symbol; low means dense punctuation.
    pub fn proportion_of_special_symbols(&self, content: &str) -> f64 {
        let count = SPECIAL_SYMBOL_RE.find_iter(content).count();
        if count == 0 {
            return NO_SPECIAL_SYMBOLS;
        }
        content.len() as f64 / count as f64
    }

    /// Average irregularity of the distinct long words of `content`.
    pub fn weight_of_random(&self, content: &str) -> f64 {
        let words: BTreeSet<&str> = WORD_RE
            .find_iter(content)
            .map(|m| m.as_str())
            .filter(|w| w.len() >= self.config.random_word_min_length)
            .collect();
        if words.is_empty() {
            return 0.0;
        }

        let total: usize = words.iter().map(|w| self.word_weight(w)).sum();
        total as f64 / words.len() as f64
    }

    fn word_weight(&self, word: &str) -> usize {
        let mut weight = 0;
        if word.contains('+') {
            weight += 1;
        }
        if word.chars().filter(|c| c.is_ascii_uppercase()).count() > 3 {
            weight += 1;
        }
        if DIGITS_INSIDE_WORD_RE.is_match(word) {
            weight += 1;
        }
        weight
    }

    pub fn line_length(&self, line: usize) -> Option<usize> {
        line.checked_sub(1).and_then(|i| self.line_lengths.get(i)).copied()
    }

    pub fn long_lines(&self) -> &[usize] {
        &self.long_lines
    }

    pub fn critical_long_lines(&self) -> &[usize] {
        &self.critical_long_lines
    }

    pub fn is_unreadable(&self) -> bool {
        self.unreadable
    }

    pub fn greedy_lines(&self) -> &BTreeSet<usize> {
        &self.greedy_lines
    }

    pub fn composition(&self) -> &TokenComposition {
        &self.composition
    }
}
