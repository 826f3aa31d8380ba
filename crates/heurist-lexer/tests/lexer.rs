use heurist_core::TokenKind;
use heurist_lexer::tokenize;
use pretty_assertions::assert_eq;

fn lex(source: &str) -> Vec<(TokenKind, String)> {
    tokenize(source)
        .unwrap_or_else(|e| panic!("lexing failed: {}", e))
        .iter()
        .map(|t| (t.kind, t.text.clone()))
        .collect()
}

fn dump(source: &str) -> String {
    tokenize(source)
        .unwrap()
        .iter()
        .map(|t| format!("{} {} {:?}", t.line, t.kind, t.text))
        .collect::<Vec<_>>()
        .join("\n")
}

#[test]
fn test_plain_text_is_inline_html() {
    assert_eq!(
        lex("just some text\nno code"),
        vec![(TokenKind::InlineHtml, "just some text\nno code".to_string())]
    );
}

#[test]
fn test_html_around_code_section() {
    insta::assert_snapshot!(dump("<b><?php echo 1; ?>\n<i>"), @r#"
    1 T_INLINE_HTML "<b>"
    1 T_OPEN_TAG "<?php "
    1 T_KEYWORD "echo"
    1 T_WHITESPACE " "
    1 T_LNUMBER "1"
    1 PUNCT ";"
    1 T_WHITESPACE " "
    1 T_CLOSE_TAG "?>\n"
    2 T_INLINE_HTML "<i>"
    "#);
}

#[test]
fn test_open_tag_variants() {
    assert_eq!(lex("<?php")[0], (TokenKind::OpenTag, "<?php".to_string()));
    assert_eq!(lex("<?PHP\n$a;")[0], (TokenKind::OpenTag, "<?PHP\n".to_string()));
    assert_eq!(lex("<?= $a ?>")[0], (TokenKind::OpenTagWithEcho, "<?=".to_string()));
    assert_eq!(lex("<? echo 1;")[0], (TokenKind::OpenTag, "<?".to_string()));
}

#[test]
fn test_short_tag_glued_to_code() {
    let tokens = lex("<?echo 1;");
    assert_eq!(tokens[0], (TokenKind::OpenTag, "<?".to_string()));
    assert_eq!(tokens[1], (TokenKind::Keyword, "echo".to_string()));
}

#[test]
fn test_comments() {
    let tokens = lex("<?php // note ?>x");
    assert_eq!(tokens[1], (TokenKind::Comment, "// note ".to_string()));
    assert_eq!(tokens[2], (TokenKind::CloseTag, "?>".to_string()));
    assert_eq!(tokens[3], (TokenKind::InlineHtml, "x".to_string()));

    let tokens = lex("<?php /** doc */ /* block */ # hash\n$a");
    let kinds: Vec<TokenKind> = tokens.iter().map(|(k, _)| *k).collect();
    assert_eq!(
        kinds,
        vec![
            TokenKind::OpenTag,
            TokenKind::DocComment,
            TokenKind::Whitespace,
            TokenKind::Comment,
            TokenKind::Whitespace,
            TokenKind::Comment,
            TokenKind::Variable,
        ]
    );
}

#[test]
fn test_unterminated_block_comment_runs_to_end() {
    let tokens = lex("<?php $a; /* open");
    assert_eq!(tokens.last(), Some(&(TokenKind::Comment, "/* open".to_string())));
}

#[test]
fn test_strings() {
    let tokens = lex(r#"<?php 'a\'b' "plain" "a $b c";"#);
    assert_eq!(
        tokens[1..].to_vec(),
        vec![
            (TokenKind::ConstantString, r"'a\'b'".to_string()),
            (TokenKind::Whitespace, " ".to_string()),
            (TokenKind::ConstantString, "\"plain\"".to_string()),
            (TokenKind::Whitespace, " ".to_string()),
            (TokenKind::Punct, "\"".to_string()),
            (TokenKind::EncapsedString, "a ".to_string()),
            (TokenKind::Variable, "$b".to_string()),
            (TokenKind::EncapsedString, " c".to_string()),
            (TokenKind::Punct, "\"".to_string()),
            (TokenKind::Punct, ";".to_string()),
        ]
    );
}

#[test]
fn test_curly_interpolation() {
    let tokens = lex(r#"<?php "x{$a['k']}y";"#);
    let texts: Vec<&str> = tokens.iter().map(|(_, t)| t.as_str()).collect();
    assert_eq!(
        texts,
        vec!["<?php ", "\"", "x", "{", "$a", "[", "'k'", "]", "}", "y", "\"", ";"]
    );
    assert_eq!(tokens[3].0, TokenKind::Punct);
    assert_eq!(tokens[6].0, TokenKind::ConstantString);
}

#[test]
fn test_unterminated_quote_becomes_punct() {
    let tokens = lex("<?php $a = \"abc;");
    assert_eq!(tokens[5], (TokenKind::Punct, "\"".to_string()));
    assert_eq!(tokens[6], (TokenKind::Identifier, "abc".to_string()));
    assert_eq!(tokens[7], (TokenKind::Punct, ";".to_string()));
}

#[test]
fn test_digit_variable_is_still_a_variable() {
    assert_eq!(lex("<?php $1abc;")[1], (TokenKind::Variable, "$1abc".to_string()));
}

#[test]
fn test_heredoc() {
    let tokens = lex("<?php $a = <<<EOT\nline one\nline two\nEOT;\n");
    assert_eq!(tokens[5], (TokenKind::StartHeredoc, "<<<EOT\n".to_string()));
    assert_eq!(
        tokens[6],
        (TokenKind::EncapsedString, "line one\nline two\n".to_string())
    );
    assert_eq!(tokens[7], (TokenKind::EndHeredoc, "EOT".to_string()));
    assert_eq!(tokens[8], (TokenKind::Punct, ";".to_string()));
}

#[test]
fn test_numbers_and_operators() {
    let tokens = lex("<?php $a=>0x1F.=1.5::$b->c?->d===2;");
    let kinds: Vec<TokenKind> = tokens.iter().map(|(k, _)| *k).collect();
    assert_eq!(
        kinds,
        vec![
            TokenKind::OpenTag,
            TokenKind::Variable,
            TokenKind::DoubleArrow,
            TokenKind::Integer,
            TokenKind::ConcatEqual,
            TokenKind::Float,
            TokenKind::DoubleColon,
            TokenKind::Variable,
            TokenKind::ObjectOperator,
            TokenKind::Identifier,
            TokenKind::ObjectOperator,
            TokenKind::Identifier,
            TokenKind::Operator,
            TokenKind::Integer,
            TokenKind::Punct,
        ]
    );
}

#[test]
fn test_array_keyword_and_lines() {
    let stream = tokenize("<?php\n$a = array(\n  'k' => 1,\n);").unwrap();
    let array = stream.iter().find(|t| t.kind == TokenKind::Array).unwrap();
    assert_eq!(array.line, 2);
    let key = stream.iter().find(|t| t.text == "'k'").unwrap();
    assert_eq!(key.line, 3);
}

#[test]
fn test_glue_reproduces_source() {
    let source = "<html>\n<?php\n/* c */ $x = \"a{$b}c\" . 'd'; // e\n?>\ntail <?= $x ?>";
    assert_eq!(tokenize(source).unwrap().glue(), source);
}
