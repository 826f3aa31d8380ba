/*! Lex PHP source into a heurist token stream.
 *
 * The heuristics never need a syntax tree, only a faithful sequence of classified lexemes with
 * their lines. The grammar in `php.pest` accepts any input: text outside of `<?` sections becomes
 * inline HTML, and characters the code rules do not recognise become single punctuation tokens, so
 * broken or hostile files still produce a stream to analyse.
 */

use heurist_core::{Token, TokenKind, TokenStream};
use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;
use thiserror::Error;
use tracing::trace;

#[derive(Parser)]
#[grammar = "php.pest"]
pub struct PhpLexer;

#[derive(Error, Debug)]
pub enum LexError {
    #[error("Lexing failed: {0}")]
    Grammar(#[from] Box<pest::error::Error<Rule>>),
}

/// Reserved words lexed as `Keyword`; `array` has its own kind.
pub const KEYWORDS: &[&str] = &[
    "abstract", "and", "as", "break", "callable", "case", "catch", "class", "clone", "const",
    "continue", "declare", "default", "die", "do", "echo", "else", "elseif", "empty", "enddeclare",
    "endfor", "endforeach", "endif", "endswitch", "endwhile", "exit", "extends", "final", "finally",
    "fn", "for", "foreach", "function", "global", "goto", "if", "implements", "include",
    "include_once", "instanceof", "insteadof", "interface", "isset", "list", "match", "namespace",
    "new", "or", "print", "private", "protected", "public", "readonly", "require", "require_once",
    "return", "static", "switch", "throw", "trait", "try", "unset", "use", "var", "while", "xor",
    "yield",
];

pub fn tokenize(source: &str) -> Result<TokenStream, LexError> {
    let mut pairs = PhpLexer::parse(Rule::file, source).map_err(Box::new)?;
    let mut tokens = Vec::new();
    if let Some(file) = pairs.next() {
        for pair in file.into_inner() {
            collect(pair, &mut tokens);
        }
    }
    trace!(count = tokens.len(), "lexed tokens");
    Ok(TokenStream::new(tokens))
}

/// Whether the lexer can read the input. Always true for valid UTF-8 text.
pub fn check(source: &str) -> bool {
    PhpLexer::parse(Rule::file, source).is_ok()
}

fn collect(pair: Pair<'_, Rule>, tokens: &mut Vec<Token>) {
    let kind = match pair.as_rule() {
        Rule::interpolated_string | Rule::curly_interpolation | Rule::heredoc => {
            for inner in pair.into_inner() {
                collect(inner, tokens);
            }
            return;
        }
        Rule::EOI => return,
        Rule::name => classify_name(pair.as_str()),
        rule => match kind_of(rule) {
            Some(kind) => kind,
            None => return,
        },
    };

    let (line, _) = pair.as_span().start_pos().line_col();
    let index = tokens.len();
    tokens.push(Token::new(kind, pair.as_str(), line, index));
}

fn kind_of(rule: Rule) -> Option<TokenKind> {
    let kind = match rule {
        Rule::inline_html => TokenKind::InlineHtml,
        Rule::open_tag | Rule::short_open_tag => TokenKind::OpenTag,
        Rule::open_tag_with_echo => TokenKind::OpenTagWithEcho,
        Rule::close_tag => TokenKind::CloseTag,
        Rule::whitespace => TokenKind::Whitespace,
        Rule::doc_comment => TokenKind::DocComment,
        Rule::block_comment | Rule::line_comment => TokenKind::Comment,
        Rule::variable | Rule::encaps_variable => TokenKind::Variable,
        Rule::constant_string => TokenKind::ConstantString,
        Rule::encaps_text | Rule::encaps_stray | Rule::heredoc_body => TokenKind::EncapsedString,
        Rule::heredoc_start => TokenKind::StartHeredoc,
        Rule::heredoc_end => TokenKind::EndHeredoc,
        Rule::integer => TokenKind::Integer,
        Rule::float => TokenKind::Float,
        Rule::double_arrow => TokenKind::DoubleArrow,
        Rule::object_operator => TokenKind::ObjectOperator,
        Rule::double_colon => TokenKind::DoubleColon,
        Rule::concat_equal => TokenKind::ConcatEqual,
        Rule::operator => TokenKind::Operator,
        Rule::quote | Rule::curly_open | Rule::curly_close | Rule::punct => TokenKind::Punct,
        _ => return None,
    };
    Some(kind)
}

fn classify_name(text: &str) -> TokenKind {
    let lower = text.to_ascii_lowercase();
    if lower == "array" {
        TokenKind::Array
    } else if KEYWORDS.contains(&lower.as_str()) {
        TokenKind::Keyword
    } else {
        TokenKind::Identifier
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kinds(source: &str) -> Vec<(TokenKind, String)> {
        tokenize(source)
            .unwrap()
            .iter()
            .map(|t| (t.kind, t.text.clone()))
            .collect()
    }

    #[test]
    fn test_empty_input() {
        assert!(tokenize("").unwrap().is_empty());
        assert!(check(""));
    }

    #[test]
    fn test_name_classification() {
        assert_eq!(classify_name("ARRAY"), TokenKind::Array);
        assert_eq!(classify_name("Function"), TokenKind::Keyword);
        assert_eq!(classify_name("base64_decode"), TokenKind::Identifier);
        assert_eq!(classify_name("\\Foo\\Bar"), TokenKind::Identifier);
    }

    #[test]
    fn test_simple_assignment() {
        assert_eq!(
            kinds("<?php\n$a = 'x';"),
            vec![
                (TokenKind::OpenTag, "<?php\n".to_string()),
                (TokenKind::Variable, "$a".to_string()),
                (TokenKind::Whitespace, " ".to_string()),
                (TokenKind::Punct, "=".to_string()),
                (TokenKind::Whitespace, " ".to_string()),
                (TokenKind::ConstantString, "'x'".to_string()),
                (TokenKind::Punct, ";".to_string()),
            ]
        );
    }

    #[test]
    fn test_indices_are_sequential() {
        let stream = tokenize("<?php $a=1; $b=2;").unwrap();
        let indices: Vec<usize> = stream.iter().map(|t| t.index).collect();
        let expected: Vec<usize> = (0..stream.len()).collect();
        assert_eq!(indices, expected);
    }
}
