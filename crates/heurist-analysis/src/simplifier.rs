use heurist_core::{KindGroup, Token, TokenKind, TokenStream};

/// Strips comments and whitespace from a stream, keeping one space where two words would
/// otherwise fuse (`return $a`, `echo foo`).
pub struct Simplifier;

impl Simplifier {
    /// Rewrites `stream` in place and compacts it.
    pub fn simplify(stream: &mut TokenStream) {
        let simplified = Self::simplified(stream);
        *stream = simplified;
    }

    /// Simplified copy; the input is left untouched.
    pub fn simplified(stream: &TokenStream) -> TokenStream {
        let tokens: Vec<&Token> = stream.iter().collect();
        let mut output: Vec<Token> = Vec::with_capacity(tokens.len());
        let mut pending_gap: Option<&Token> = None;

        for token in tokens {
            if token.is_in(KindGroup::NonCode) {
                pending_gap.get_or_insert(token);
                continue;
            }

            if let Some(gap) = pending_gap.take() {
                let fuses = output.last().map_or(false, is_word_like) && is_word_like(token);
                if fuses {
                    output.push(gap.rewritten(TokenKind::Whitespace, " "));
                }
            }
            output.push(token.clone());
        }

        TokenStream::new(output)
    }
}

fn is_word_like(token: &Token) -> bool {
    match token.kind {
        TokenKind::Identifier
        | TokenKind::Keyword
        | TokenKind::Variable
        | TokenKind::Integer
        | TokenKind::Float
        | TokenKind::Array => true,
        TokenKind::OpenTag | TokenKind::OpenTagWithEcho => {
            !token.text.ends_with(|c: char| c.is_whitespace())
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use heurist_lexer::tokenize;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_strips_comments_and_whitespace() {
        let stream = tokenize("<?php\n/* c */ $a = 'x' ; // tail\n$b=1;").unwrap();
        let simplified = Simplifier::simplified(&stream);
        assert_eq!(simplified.glue(), "<?php\n$a='x';$b=1;");
    }

    #[test]
    fn test_keeps_single_space_between_words() {
        let stream = tokenize("<?php function  /* x */ foo() { return\n\t$a; }").unwrap();
        assert_eq!(
            Simplifier::simplified(&stream).glue(),
            "<?php function foo(){return $a;}"
        );
    }

    #[test]
    fn test_short_tag_keeps_separator() {
        let stream = tokenize("<? echo 1;").unwrap();
        assert_eq!(Simplifier::simplified(&stream).glue(), "<? echo 1;");
    }

    #[test]
    fn test_simplify_in_place_renumbers() {
        let mut stream = tokenize("<?php $a = 1;").unwrap();
        Simplifier::simplify(&mut stream);
        let indices: Vec<usize> = stream.iter().map(|t| t.index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3, 4]);
        assert_eq!(stream.len(), 5);
    }
}
