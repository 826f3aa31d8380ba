/*! Entropy of identifier names and array keys.
 *
 * Generated droppers name things randomly. A sub-word [`Encoder`] splits a readable name into a
 * few pieces and a random one into many, so `length / pieces` separates the two. The file is
 * judged as a whole first (average ratio over distinct names), and only then are the individual
 * offenders reported by line.
 *
 * Variable names are checked first; array keys only when variable names look fine. Word-like keys
 * are checked before long integer keys.
 */

mod encoder;
mod verdict;

pub use encoder::{Encoder, TiktokenEncoder};
pub use verdict::reduce_verdict;

use crate::simplifier::Simplifier;
use crate::variables::Variables;
use heurist_core::{EntropyConfig, TokenKind, TokenStream};
use indexmap::IndexSet;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

const VARIABLE_NAME: &str = r"\$([a-zA-Z_\x{7f}-\x{10FFFF}][a-zA-Z0-9_\x{7f}-\x{10FFFF}]*)";
const WORD_KEY: &str = r"\['([a-zA-Z_\x{7f}-\x{10FFFF}][a-zA-Z0-9_\x{7f}-\x{10FFFF}]*)'\]";
const INT_KEY: &str = r"\[([0-9]+)\]";

static VARIABLE_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(VARIABLE_NAME).expect("variable name pattern compiles"));
static WORD_KEY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(WORD_KEY).expect("word key pattern compiles"));
static INT_KEY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(INT_KEY).expect("int key pattern compiles"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EntropyFinding {
    #[serde(rename = "High entropy in variable name")]
    VariableName,
    #[serde(rename = "High entropy in array key")]
    ArrayKey,
    #[serde(rename = "Long integer in array key")]
    LongIntKey,
}

impl EntropyFinding {
    pub fn label(self) -> &'static str {
        match self {
            EntropyFinding::VariableName => "High entropy in variable name",
            EntropyFinding::ArrayKey => "High entropy in array key",
            EntropyFinding::LongIntKey => "Long integer in array key",
        }
    }

    pub fn is_array_key(self) -> bool {
        matches!(self, EntropyFinding::ArrayKey | EntropyFinding::LongIntKey)
    }
}

impl fmt::Display for EntropyFinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Line number to finding.
pub type Verdict = BTreeMap<usize, EntropyFinding>;

pub struct EntropyAnalyser<'a> {
    config: &'a EntropyConfig,
    encoder: &'a dyn Encoder,
}

impl<'a> EntropyAnalyser<'a> {
    pub fn new(config: &'a EntropyConfig, encoder: &'a dyn Encoder) -> Self {
        Self { config, encoder }
    }

    /// Full entropy verdict for a file. `stream` is the unresolved stream, `content` the raw text
    /// used to locate array keys by line.
    pub fn analyse(&self, stream: &TokenStream, content: &str, variables: &Variables) -> Verdict {
        let filtered = Simplifier::simplified(stream).glue();

        if self.analyse_variable_calls(&filtered) {
            debug!("variable names look generated");
            return self.extract_suspicious_variables(stream, variables);
        }

        let verdict = self.analyze_array_keys_entropy(&filtered, content);
        if !verdict.is_empty() {
            return verdict;
        }
        self.analyze_array_keys_long_int(&filtered, content)
    }

    /// Whether the distinct variable names of `filtered` average below the ratio threshold.
    pub fn analyse_variable_calls(&self, filtered: &str) -> bool {
        let names: IndexSet<String> = captures(&VARIABLE_NAME_RE, filtered)
            .into_iter()
            .filter(|name| !name.starts_with('_') && name.len() >= self.config.variables_min_length)
            .collect();
        if names.len() <= self.config.variables_min_count {
            return false;
        }
        self.average_ratio(&names) < self.config.variables_threshold
    }

    /// Per-variable findings at the line where each offending variable first appears.
    pub fn extract_suspicious_variables(&self, stream: &TokenStream, variables: &Variables) -> Verdict {
        let mut verdict = Verdict::new();
        for (name, value) in variables.variables() {
            if value.is_empty() {
                continue;
            }
            let bare = name.trim_start_matches('$');
            if bare.starts_with('_') || bare.len() < self.config.single_variable_min_length {
                continue;
            }
            let Some(ratio) = self.ratio(bare) else {
                continue;
            };
            if ratio >= self.config.variables_threshold {
                continue;
            }
            let first_use = stream
                .iter()
                .find(|t| t.kind == TokenKind::Variable && t.text == *name)
                .map(|t| t.line);
            if let Some(line) = first_use {
                verdict.insert(line, EntropyFinding::VariableName);
            }
        }
        verdict
    }

    pub fn analyze_array_keys_entropy(&self, filtered: &str, content: &str) -> Verdict {
        let keys: IndexSet<String> = captures(&WORD_KEY_RE, filtered)
            .into_iter()
            .filter(|key| key.len() >= self.config.array_keys_min_length)
            .collect();
        if keys.len() <= self.config.array_keys_min_count {
            return Verdict::new();
        }
        if self.average_ratio(&keys) >= self.config.array_keys_threshold {
            return Verdict::new();
        }

        let shown_below = self.config.array_keys_threshold * self.config.array_keys_verdict_multiplier;
        let mut verdict = Verdict::new();
        for key in &keys {
            if self.ratio(key).map_or(true, |ratio| ratio >= shown_below) {
                continue;
            }
            for line in lines_containing(content, &format!("['{}']", key)) {
                verdict.insert(line, EntropyFinding::ArrayKey);
            }
        }
        debug!(keys = keys.len(), findings = verdict.len(), "array key entropy");
        verdict
    }

    pub fn analyze_array_keys_long_int(&self, filtered: &str, content: &str) -> Verdict {
        let keys = captures(&INT_KEY_RE, filtered);
        let total = keys.len();

        let mut long_keys = Verdict::new();
        for key in keys.iter().filter(|key| key.len() >= self.config.long_int_min_digits) {
            for line in lines_containing(content, &format!("[{}]", key)) {
                long_keys.insert(line, EntropyFinding::LongIntKey);
            }
        }

        if long_keys.len() >= self.config.long_int_min_count
            && total as f64 / long_keys.len() as f64 > self.config.long_int_threshold
        {
            debug!(total, lines = long_keys.len(), "long integer array keys");
            return long_keys;
        }
        Verdict::new()
    }

    fn ratio(&self, text: &str) -> Option<f64> {
        match self.encoder.count(text) {
            0 => None,
            count => Some(text.len() as f64 / count as f64),
        }
    }

    fn average_ratio(&self, names: &IndexSet<String>) -> f64 {
        if names.is_empty() {
            return f64::INFINITY;
        }
        let sum: f64 = names.iter().filter_map(|name| self.ratio(name)).sum();
        sum / names.len() as f64
    }
}

fn captures(pattern: &Regex, text: &str) -> Vec<String> {
    pattern
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .collect()
}

/// 1-based numbers of the lines of `content` containing `needle`.
fn lines_containing(content: &str, needle: &str) -> Vec<usize> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| line.contains(needle))
        .map(|(index, _)| index + 1)
        .collect()
}
