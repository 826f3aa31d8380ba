/*! SQL query sites and whether they carry untrusted input.
 *
 * Two recognizers feed the same record list. Call shapes (`$db->query(`, `mysqli::query(`,
 * `PDO::exec(`, `mysql_query(`) take their arguments up to the end of the statement. A string
 * literal holding an SQL keyword takes the right-hand side of the assignment it belongs to.
 */

use crate::variables::Variables;
use heurist_core::pattern::{Expect, Sequence, SequenceBuilder};
use heurist_core::{Needle, Offset, SqlConfig, Token, TokenKind, TokenStream};
use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, trace};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SqlRequest {
    pub tokens: Vec<Token>,
    pub is_safe: bool,
    /// Line of the token that triggered the match.
    pub line: usize,
    pub first_line: usize,
    pub last_line: usize,
}

impl SqlRequest {
    pub fn text(&self) -> String {
        self.tokens.iter().map(|t| t.text.as_str()).collect()
    }
}

pub struct SqlExtractor<'a> {
    config: &'a SqlConfig,
    object_call: Option<Sequence>,
    mysqli_call: Option<Sequence>,
    pdo_call: Option<Sequence>,
    requests: Vec<SqlRequest>,
    seen: HashSet<(usize, String)>,
}

/// `kind` restricted to one of `names`; `None` when there are no names to match.
fn named(kind: TokenKind, names: &[String]) -> Option<Expect> {
    if names.is_empty() {
        return None;
    }
    Some(names.iter().fold(Expect::kind(kind), |expect, name| expect.with_value(name)))
}

fn static_call(classes: &[String], methods: &[String]) -> Option<Sequence> {
    Some(
        SequenceBuilder::new()
            .then(named(TokenKind::Identifier, classes)?)
            .kind(TokenKind::DoubleColon)
            .then(named(TokenKind::Identifier, methods)?)
            .punct("(")
            .build(),
    )
}

impl<'a> SqlExtractor<'a> {
    pub fn new(config: &'a SqlConfig) -> Self {
        let object_call = named(TokenKind::Identifier, &config.object_methods).map(|method| {
            SequenceBuilder::new()
                .kind(TokenKind::Variable)
                .kind(TokenKind::ObjectOperator)
                .then(method)
                .punct("(")
                .build()
        });
        Self {
            config,
            object_call,
            mysqli_call: static_call(&config.mysqli_classes, &config.mysqli_methods),
            pdo_call: static_call(&config.pdo_classes, &config.pdo_methods),
            requests: Vec::new(),
            seen: HashSet::new(),
        }
    }

    pub fn requests(&self) -> &[SqlRequest] {
        &self.requests
    }

    pub fn into_requests(self) -> Vec<SqlRequest> {
        self.requests
    }

    /// Records every query site of `stream`. Sites already recorded by an earlier scan are skipped.
    pub fn scan(&mut self, stream: &mut TokenStream, variables: &Variables) -> &[SqlRequest] {
        stream.rewind();
        while stream.has_current() {
            if let Some((first, last)) = self.via_functions(stream) {
                self.process_request(stream, variables, first, last);
            }
            if let Some((first, last)) = self.via_keywords(stream) {
                self.process_request(stream, variables, first, last);
            }
            if !stream.advance() {
                break;
            }
        }
        debug!(requests = self.requests.len(), "sql sites");
        &self.requests
    }

    /// Argument range of a query call starting at the cursor.
    pub fn via_functions(&self, stream: &TokenStream) -> Option<(usize, usize)> {
        let open = if self.matches(stream, &self.object_call)
            || self.matches(stream, &self.mysqli_call)
            || self.matches(stream, &self.pdo_call)
        {
            stream.position(Offset::Next3)?
        } else if stream.kind_is(Offset::Current, TokenKind::Identifier)
            && stream.current()?.is_any(&as_strs(&self.config.functions))
            && stream.value_is(Offset::Next1, "(")
        {
            stream.position(Offset::Next1)?
        } else {
            return None;
        };

        let end = stream.search_forward(open, ";", None)?;
        let first = stream.next_live(open)?;
        let last = stream.prev_live(end)?;
        (first <= last).then_some((first, last))
    }

    /// Right-hand side of the assignment holding an SQL keyword literal at the cursor.
    pub fn via_keywords(&self, stream: &TokenStream) -> Option<(usize, usize)> {
        let cursor = stream.cursor()?;
        let literal = stream.current()?;
        if literal.kind != TokenKind::ConstantString {
            return None;
        }
        if !self.config.keywords.iter().any(|k| literal.text.contains(k.as_str())) {
            return None;
        }

        let boundary = stream.search_backward(cursor, Needle::OneOf(&["=", ";"]), None)?;
        if !stream.get(boundary)?.is("=") {
            return None;
        }
        let end = stream.search_forward(cursor, ";", None)?;
        let first = stream.next_live(boundary)?;
        let last = stream.prev_live(end)?;
        (first <= last).then_some((first, last))
    }

    fn matches(&self, stream: &TokenStream, sequence: &Option<Sequence>) -> bool {
        sequence.as_ref().map_or(false, |s| stream.check_sequence(s))
    }

    fn process_request(&mut self, stream: &TokenStream, variables: &Variables, first: usize, last: usize) {
        let Some(tokens) = stream.range(first, last) else {
            return;
        };
        let (Some(head), Some(tail)) = (tokens.first(), tokens.last()) else {
            return;
        };
        if !self.seen.insert((head.index, head.text.clone())) {
            return;
        }

        let request = SqlRequest {
            is_safe: !variables.has_bad_variables(stream, &tokens, true),
            line: stream.current().map_or(head.line, |t| t.line),
            first_line: head.line,
            last_line: tail.line + tail.extra_lines(),
            tokens,
        };
        trace!(line = request.line, safe = request.is_safe, "sql request");
        self.requests.push(request);
    }
}

fn as_strs(values: &[String]) -> Vec<&str> {
    values.iter().map(String::as_str).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simplifier::Simplifier;
    use heurist_core::TaintConfig;
    use heurist_lexer::tokenize;
    use pretty_assertions::assert_eq;

    fn extract(source: &str) -> Vec<SqlRequest> {
        let mut stream = tokenize(source).unwrap();
        Simplifier::simplify(&mut stream);
        let mut variables = Variables::new(TaintConfig::default());
        variables.collect(&mut stream);
        variables.concatenate();
        variables.replace_all(&mut stream);
        variables.detect_bad(&stream);

        let config = SqlConfig::default();
        let mut extractor = SqlExtractor::new(&config);
        extractor.scan(&mut stream, &variables);
        extractor.into_requests()
    }

    #[test]
    fn test_object_call_with_raw_input() {
        let requests = extract("<?php $wpdb->query(\"SELECT * FROM t WHERE id=\" . $_GET['id']);");
        assert_eq!(requests.len(), 1);
        assert!(!requests[0].is_safe);
        assert_eq!(requests[0].text(), "\"SELECT * FROM t WHERE id=\".$_GET['id'])");
    }

    #[test]
    fn test_prepared_query_is_safe() {
        let requests = extract(
            "<?php $wpdb->query($wpdb->prepare(\"SELECT * FROM t WHERE id=%d\", $_GET['id']));",
        );
        assert_eq!(requests.len(), 1);
        assert!(requests[0].is_safe);
    }

    #[test]
    fn test_static_and_function_calls() {
        let requests = extract("<?php mysqli::query('DELETE FROM t');PDO::exec('x');mysql_query($q);");
        let texts: Vec<String> = requests.iter().map(SqlRequest::text).collect();
        assert_eq!(texts, vec!["'DELETE FROM t')", "'x')", "$q)"]);
        assert!(requests.iter().all(|r| r.is_safe));
    }

    #[test]
    fn test_keyword_assignment_and_tainted_variable() {
        let requests = extract(
            "<?php $id=$_POST['id'];$sql='SELECT name FROM users WHERE id='.$id;mysql_query($sql);",
        );
        let texts: Vec<String> = requests.iter().map(SqlRequest::text).collect();
        assert_eq!(texts, vec!["'SELECT name FROM users WHERE id='.$id", "$sql)"]);
        assert!(requests.iter().all(|r| !r.is_safe));
    }

    #[test]
    fn test_keyword_outside_assignment_is_ignored() {
        let requests = extract("<?php echo 'SELECT';");
        assert!(requests.is_empty());
    }

    #[test]
    fn test_lines_span_the_request() {
        let requests = extract("<?php\n$wpdb->get_results(\n  'SELECT 1'\n);");
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].line, 2);
        assert_eq!(requests[0].first_line, 3);
        assert_eq!(requests[0].last_line, 4);
    }

    #[test]
    fn test_rescan_does_not_duplicate() {
        let mut stream = tokenize("<?php mysql_query('SELECT 1');").unwrap();
        let variables = Variables::new(TaintConfig::default());
        let config = SqlConfig::default();
        let mut extractor = SqlExtractor::new(&config);
        extractor.scan(&mut stream, &variables);
        extractor.scan(&mut stream, &variables);
        assert_eq!(extractor.requests().len(), 1);
    }
}
