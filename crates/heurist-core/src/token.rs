use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenKind {
    InlineHtml,
    OpenTag,
    OpenTagWithEcho,
    CloseTag,
    Whitespace,
    Comment,
    DocComment,
    Variable,
    Identifier,
    Keyword,
    Array,
    ConstantString,
    EncapsedString,
    Integer,
    Float,
    DoubleArrow,
    ObjectOperator,
    DoubleColon,
    ConcatEqual,
    Operator,
    Punct,
    StartHeredoc,
    EndHeredoc,
}

/// Named families of kinds that recognizers test against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KindGroup {
    Literal,
    ArrayKey,
    ArrayValue,
    NonCode,
    Comments,
    Html,
    OneLine,
}

impl TokenKind {
    pub fn is_in(self, group: KindGroup) -> bool {
        use TokenKind::*;
        match group {
            KindGroup::Literal | KindGroup::ArrayValue => {
                matches!(self, ConstantString | Integer | Float)
            }
            KindGroup::ArrayKey => matches!(self, ConstantString | Integer),
            KindGroup::NonCode => matches!(self, Comment | DocComment | Whitespace),
            KindGroup::Comments => matches!(self, Comment | DocComment),
            KindGroup::Html => matches!(self, InlineHtml),
            KindGroup::OneLine => matches!(self, OpenTag | DocComment | StartHeredoc),
        }
    }

    pub fn name(self) -> &'static str {
        use TokenKind::*;
        match self {
            InlineHtml => "T_INLINE_HTML",
            OpenTag => "T_OPEN_TAG",
            OpenTagWithEcho => "T_OPEN_TAG_WITH_ECHO",
            CloseTag => "T_CLOSE_TAG",
            Whitespace => "T_WHITESPACE",
            Comment => "T_COMMENT",
            DocComment => "T_DOC_COMMENT",
            Variable => "T_VARIABLE",
            Identifier => "T_STRING",
            Keyword => "T_KEYWORD",
            Array => "T_ARRAY",
            ConstantString => "T_CONSTANT_ENCAPSED_STRING",
            EncapsedString => "T_ENCAPSED_AND_WHITESPACE",
            Integer => "T_LNUMBER",
            Float => "T_DNUMBER",
            DoubleArrow => "T_DOUBLE_ARROW",
            ObjectOperator => "T_OBJECT_OPERATOR",
            DoubleColon => "T_DOUBLE_COLON",
            ConcatEqual => "T_CONCAT_EQUAL",
            Operator => "T_OPERATOR",
            Punct => "PUNCT",
            StartHeredoc => "T_START_HEREDOC",
            EndHeredoc => "T_END_HEREDOC",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Operators after which a variable occurrence is a write, not a read.
pub const EQUATION_OPERATORS: &[&str] = &[
    "=", ".=", "+=", "-=", "*=", "/=", "%=", "**=", "??=", "&=", "|=", "^=", "<<=", ">>=", "++",
    "--",
];

/// One classified lexeme. Tokens are never edited in place; rewrites build a new token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub line: usize,
    pub index: usize,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>, line: usize, index: usize) -> Self {
        Self {
            kind,
            text: text.into(),
            line,
            index,
        }
    }

    /// Same position and line, different classification and lexeme.
    pub fn rewritten(&self, kind: TokenKind, text: impl Into<String>) -> Self {
        Self::new(kind, text, self.line, self.index)
    }

    pub fn is(&self, value: &str) -> bool {
        self.text == value
    }

    pub fn is_any(&self, values: &[&str]) -> bool {
        values.iter().any(|v| self.text == *v)
    }

    pub fn is_kind(&self, kind: TokenKind) -> bool {
        self.kind == kind
    }

    /// Group membership; a short `<?` open tag is not a one-line token.
    pub fn is_in(&self, group: KindGroup) -> bool {
        match (group, self.kind) {
            (KindGroup::OneLine, TokenKind::OpenTag) => self
                .text
                .get(..5)
                .map_or(false, |tag| tag.eq_ignore_ascii_case("<?php")),
            _ => self.kind.is_in(group),
        }
    }

    pub fn is_equation(&self) -> bool {
        matches!(
            self.kind,
            TokenKind::Operator | TokenKind::ConcatEqual | TokenKind::Punct
        ) && self.is_any(EQUATION_OPERATORS)
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Number of source lines the lexeme spans beyond its first one.
    pub fn extra_lines(&self) -> usize {
        self.text.matches('\n').count()
    }

    /// Lexeme with surrounding quote characters removed.
    pub fn unquoted(&self) -> &str {
        trim_quotes(&self.text)
    }
}

pub fn trim_quotes(text: &str) -> &str {
    text.trim_matches(|c| c == '\'' || c == '"')
}

pub fn single_quoted(text: &str) -> String {
    format!("'{}'", text)
}
