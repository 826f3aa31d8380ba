use heurist_core::{TokenKind, TokenStream};
use serde::Serialize;
use std::fmt;
use tracing::debug;

/// A named reason for rejecting a file as structurally valid PHP.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "check", content = "detail", rename_all = "snake_case")]
pub enum StructuralFailure {
    UnbalancedBraces,
    OddQuotes,
    DigitStartedVariable(String),
    OpenTags,
}

impl StructuralFailure {
    pub fn name(&self) -> &'static str {
        match self {
            StructuralFailure::UnbalancedBraces => "check_braces",
            StructuralFailure::OddQuotes => "check_quotes",
            StructuralFailure::DigitStartedVariable(_) => "check_digit_started_variables",
            StructuralFailure::OpenTags => "has_correct_open_tags",
        }
    }
}

impl fmt::Display for StructuralFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StructuralFailure::UnbalancedBraces => {
                write!(f, "Braces or brackets count is not equal")
            }
            StructuralFailure::OddQuotes => write!(f, "Quotes count is not even"),
            StructuralFailure::DigitStartedVariable(name) => {
                write!(f, "Variable starts with digits [{}]", name)
            }
            StructuralFailure::OpenTags => write!(f, "PHP open tags are not valid"),
        }
    }
}

/// What the opening markers of a file look like.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OpenTagStatus {
    /// At least one full `<?php` marker, wherever it appears.
    Valid,
    /// Only short markers, each followed by whitespace (or `<?=`).
    ShortOnly,
    /// No full marker, and a short one glued to the following text, as in `<?xml`.
    Malformed,
    Missing,
}

impl OpenTagStatus {
    /// Whether the file should be analysed as code at all.
    pub fn has_code(self) -> bool {
        matches!(self, OpenTagStatus::Valid | OpenTagStatus::ShortOnly)
    }
}

/// Single-pass structural checks over a raw token stream.
pub struct StructuralValidator<'a> {
    stream: &'a TokenStream,
    failures: Vec<StructuralFailure>,
}

impl<'a> StructuralValidator<'a> {
    pub fn new(stream: &'a TokenStream) -> Self {
        Self {
            stream,
            failures: Vec::new(),
        }
    }

    /// Runs every check, recording the failures. True when all pass.
    pub fn is_valid_code(&mut self) -> bool {
        let open_tags = self.has_correct_open_tags();
        let braces = self.check_braces();
        let quotes = self.check_quotes();
        let variables = self.check_digit_started_variables();
        open_tags && braces && quotes && variables
    }

    pub fn failures(&self) -> &[StructuralFailure] {
        &self.failures
    }

    pub fn into_failures(self) -> Vec<StructuralFailure> {
        self.failures
    }

    pub fn check_braces(&mut self) -> bool {
        let mut balance = [0i64; 3];
        for token in self.punctuation() {
            match token {
                "(" => balance[0] += 1,
                ")" => balance[0] -= 1,
                "[" => balance[1] += 1,
                "]" => balance[1] -= 1,
                "{" => balance[2] += 1,
                "}" => balance[2] -= 1,
                _ => {}
            }
        }

        if balance.iter().any(|&b| b != 0) {
            debug!(?balance, "unbalanced delimiters");
            self.record(StructuralFailure::UnbalancedBraces);
            return false;
        }
        true
    }

    pub fn check_quotes(&mut self) -> bool {
        let double = self.punctuation().filter(|t| *t == "\"").count();
        let single = self.punctuation().filter(|t| *t == "'").count();

        if double % 2 != 0 || single % 2 != 0 {
            self.record(StructuralFailure::OddQuotes);
            return false;
        }
        true
    }

    pub fn check_digit_started_variables(&mut self) -> bool {
        let offender = self
            .stream
            .iter()
            .filter(|t| t.kind == TokenKind::Variable)
            .find(|t| {
                let mut chars = t.text.chars().skip(1);
                chars.next().map_or(false, |c| c.is_ascii_digit()) && chars.next().is_some()
            });

        match offender {
            Some(token) => {
                let name = token.text.clone();
                self.record(StructuralFailure::DigitStartedVariable(name));
                false
            }
            None => true,
        }
    }

    /// True when a full `<?php` marker exists and no short marker is glued to its text. A glued
    /// marker is recorded even next to a full one, since `<?xml` headers are a common disguise.
    pub fn has_correct_open_tags(&mut self) -> bool {
        let malformed = self.has_malformed_short_tag();
        if malformed {
            self.record(StructuralFailure::OpenTags);
        }
        !malformed && self.open_tag_status() == OpenTagStatus::Valid
    }

    pub fn open_tag_status(&self) -> OpenTagStatus {
        let mut seen_short = false;
        let mut seen_malformed = false;
        for token in self.stream.iter() {
            match token.kind {
                TokenKind::OpenTag if token.text.len() > 2 => return OpenTagStatus::Valid,
                TokenKind::OpenTag if self.is_glued(token.index) => seen_malformed = true,
                TokenKind::OpenTag | TokenKind::OpenTagWithEcho => seen_short = true,
                _ => {}
            }
        }

        if seen_malformed {
            OpenTagStatus::Malformed
        } else if seen_short {
            OpenTagStatus::ShortOnly
        } else {
            OpenTagStatus::Missing
        }
    }

    /// Whether any short `<?` marker runs straight into the following text.
    pub fn has_malformed_short_tag(&self) -> bool {
        self.stream
            .iter()
            .filter(|t| t.kind == TokenKind::OpenTag && t.text.len() <= 2)
            .any(|t| self.is_glued(t.index))
    }

    fn is_glued(&self, index: usize) -> bool {
        !self
            .stream
            .next_live(index)
            .and_then(|p| self.stream.get(p))
            .map_or(false, |next| next.kind == TokenKind::Whitespace)
    }

    fn punctuation(&self) -> impl Iterator<Item = &'a str> {
        self.stream
            .iter()
            .filter(|t| t.kind == TokenKind::Punct)
            .map(|t| t.text.as_str())
    }

    fn record(&mut self, failure: StructuralFailure) {
        if !self.failures.contains(&failure) {
            self.failures.push(failure);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use heurist_lexer::tokenize;
    use pretty_assertions::assert_eq;

    fn validate(source: &str) -> (bool, Vec<StructuralFailure>) {
        let stream = tokenize(source).unwrap();
        let mut validator = StructuralValidator::new(&stream);
        let valid = validator.is_valid_code();
        (valid, validator.into_failures())
    }

    #[test]
    fn test_valid_file() {
        let (valid, failures) = validate("<?php\nif ($a) { echo $b[0]; }\n");
        assert!(valid);
        assert!(failures.is_empty());
    }

    #[test]
    fn test_unbalanced_braces() {
        let (valid, failures) = validate("<?php\nif ($a) { echo 1;\n");
        assert!(!valid);
        assert_eq!(failures, vec![StructuralFailure::UnbalancedBraces]);
    }

    #[test]
    fn test_odd_quotes() {
        let (_, failures) = validate("<?php $a = \"abc;");
        assert!(failures.contains(&StructuralFailure::OddQuotes));
    }

    #[test]
    fn test_digit_started_variable() {
        let (_, failures) = validate("<?php $1abc = 1;");
        assert_eq!(
            failures,
            vec![StructuralFailure::DigitStartedVariable("$1abc".to_string())]
        );
        assert_eq!(failures[0].to_string(), "Variable starts with digits [$1abc]");
    }

    #[test]
    fn test_open_tag_status() {
        let status = |source: &str| {
            let stream = tokenize(source).unwrap();
            StructuralValidator::new(&stream).open_tag_status()
        };
        assert_eq!(status("<?php echo 1;"), OpenTagStatus::Valid);
        assert_eq!(status("<? echo 1;"), OpenTagStatus::ShortOnly);
        assert_eq!(status("<?= $a ?>"), OpenTagStatus::ShortOnly);
        assert_eq!(status("<?xml version=\"1.0\"?>"), OpenTagStatus::Malformed);
        assert_eq!(status("plain text"), OpenTagStatus::Missing);
        assert_eq!(status("<?xml x?><?php echo 1;"), OpenTagStatus::Valid);
        assert_eq!(status("<? echo 1; ?><?xml x?>"), OpenTagStatus::Malformed);
    }

    #[test]
    fn test_xml_header_before_php_is_recorded() {
        let (valid, failures) = validate("<?xml version=\"1.0\"?>\n<?php echo 1;\n");
        assert!(!valid);
        assert_eq!(failures, vec![StructuralFailure::OpenTags]);

        let stream = tokenize("<?xml x?>\n<?php echo 1;").unwrap();
        let validator = StructuralValidator::new(&stream);
        assert!(validator.has_malformed_short_tag());
        assert!(validator.open_tag_status().has_code());
    }

    #[test]
    fn test_short_tags_are_not_correct_open_tags() {
        let stream = tokenize("<? echo 1;").unwrap();
        let mut validator = StructuralValidator::new(&stream);
        assert!(!validator.has_correct_open_tags());
        assert!(validator.failures().is_empty());
    }
}
