use crate::token::{Token, TokenKind};

/// One step of a token sequence: an optional set of accepted kinds and an optional set of
/// accepted lexemes. Empty sets accept anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Expect {
    kinds: Vec<TokenKind>,
    values: Vec<String>,
}

impl Expect {
    pub fn any() -> Self {
        Self::default()
    }

    pub fn kind(kind: TokenKind) -> Self {
        Self {
            kinds: vec![kind],
            values: Vec::new(),
        }
    }

    pub fn kinds(kinds: &[TokenKind]) -> Self {
        Self {
            kinds: kinds.to_vec(),
            values: Vec::new(),
        }
    }

    pub fn value(value: &str) -> Self {
        Self {
            kinds: Vec::new(),
            values: vec![value.to_string()],
        }
    }

    pub fn values(values: &[&str]) -> Self {
        Self {
            kinds: Vec::new(),
            values: values.iter().map(|v| v.to_string()).collect(),
        }
    }

    pub fn punct(value: &str) -> Self {
        Self::kind(TokenKind::Punct).with_value(value)
    }

    pub fn with_value(mut self, value: &str) -> Self {
        self.values.push(value.to_string());
        self
    }

    pub fn matches(&self, token: &Token) -> bool {
        (self.kinds.is_empty() || self.kinds.contains(&token.kind))
            && (self.values.is_empty() || self.values.iter().any(|v| *v == token.text))
    }
}

/// Ordered list of expectations matched against consecutive live tokens.
pub type Sequence = Vec<Expect>;

pub struct SequenceBuilder {
    steps: Sequence,
}

impl SequenceBuilder {
    pub fn new() -> Self {
        Self { steps: Vec::new() }
    }

    pub fn then(mut self, step: Expect) -> Self {
        self.steps.push(step);
        self
    }

    pub fn kind(self, kind: TokenKind) -> Self {
        self.then(Expect::kind(kind))
    }

    pub fn punct(self, value: &str) -> Self {
        self.then(Expect::punct(value))
    }

    pub fn build(self) -> Sequence {
        self.steps
    }
}

impl Default for SequenceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Matches `sequence` against `tokens`, stopping at the first mismatch.
pub fn matches_sequence<'a>(
    sequence: &[Expect],
    tokens: impl IntoIterator<Item = &'a Token>,
) -> bool {
    let mut tokens = tokens.into_iter();
    sequence
        .iter()
        .all(|step| tokens.next().map_or(false, |token| step.matches(token)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tok(kind: TokenKind, text: &str) -> Token {
        Token::new(kind, text, 1, 0)
    }

    #[test]
    fn test_expect_kind_and_value() {
        let step = Expect::kind(TokenKind::Identifier).with_value("define");
        assert!(step.matches(&tok(TokenKind::Identifier, "define")));
        assert!(!step.matches(&tok(TokenKind::Identifier, "defined")));
        assert!(!step.matches(&tok(TokenKind::Keyword, "define")));
    }

    #[test]
    fn test_expect_kind_set() {
        let step = Expect::kinds(&[TokenKind::ConstantString, TokenKind::Integer]);
        assert!(step.matches(&tok(TokenKind::Integer, "5")));
        assert!(!step.matches(&tok(TokenKind::Float, "5.0")));
    }

    #[test]
    fn test_sequence_short_circuits() {
        let sequence = SequenceBuilder::new()
            .kind(TokenKind::Variable)
            .punct("=")
            .kind(TokenKind::Array)
            .build();

        let good = [
            tok(TokenKind::Variable, "$a"),
            tok(TokenKind::Punct, "="),
            tok(TokenKind::Array, "array"),
        ];
        let short = [tok(TokenKind::Variable, "$a"), tok(TokenKind::Punct, "=")];
        let bad = [
            tok(TokenKind::Variable, "$a"),
            tok(TokenKind::ConcatEqual, ".="),
            tok(TokenKind::Array, "array"),
        ];

        assert!(matches_sequence(&sequence, good.iter()));
        assert!(!matches_sequence(&sequence, short.iter()));
        assert!(!matches_sequence(&sequence, bad.iter()));
    }
}
