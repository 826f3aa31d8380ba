/*! Static resolution of variables, arrays and constants.
 *
 * Droppers rarely call `eval` by name. They assemble the name from fragments spread over
 * assignments, arrays and `define` calls, then call through a variable. This module records what
 * each simple assignment stores, merges literal fragments, and writes the known values back over
 * their uses so later passes (and a human reader) see the real call.
 *
 * Recording is one cursor sweep with several recognizers per position; any shape mismatch is a
 * silent no-op. The same tables feed the taint check: a variable is bad when its recorded value
 * mentions raw request input or another bad variable.
 */

use heurist_core::pattern::{Expect, Sequence, SequenceBuilder};
use heurist_core::token::single_quoted;
use heurist_core::{KindGroup, Needle, Offset, TaintConfig, Token, TokenKind, TokenStream};
use indexmap::{IndexMap, IndexSet};
use serde::Serialize;
use std::fmt;
use tracing::{debug, trace};

/// Keywords after which a variable names a declaration rather than a value.
const DECLARING_KEYWORDS: &[&str] = &["global", "static", "as"];

/// Keywords after which an identifier is a declaration rather than a constant use.
const CONSTANT_DECLARING_KEYWORDS: &[&str] =
    &["function", "const", "class", "new", "namespace", "use", "interface", "trait"];

/// Key of a recorded array element.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum ArrayKey {
    Int(i64),
    Str(String),
}

impl ArrayKey {
    /// Key spelled by a literal token; numeric strings become integer keys as in PHP.
    pub fn from_token(token: &Token) -> Option<Self> {
        if !token.is_in(KindGroup::ArrayKey) {
            return None;
        }
        let raw = token.unquoted();
        Some(match raw.parse::<i64>() {
            Ok(number) if number.to_string() == raw => ArrayKey::Int(number),
            _ => ArrayKey::Str(raw.to_string()),
        })
    }
}

impl fmt::Display for ArrayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArrayKey::Int(number) => write!(f, "{}", number),
            ArrayKey::Str(text) => write!(f, "'{}'", text),
        }
    }
}

pub type ArrayEntries = IndexMap<ArrayKey, Token>;

pub struct Variables {
    config: TaintConfig,
    variables: IndexMap<String, Vec<Token>>,
    arrays: IndexMap<String, ArrayEntries>,
    constants: IndexMap<String, String>,
    bad: IndexSet<String>,
    define_constant: Sequence,
    array_literal: Sequence,
    array_brackets: Sequence,
}

impl Variables {
    pub fn new(config: TaintConfig) -> Self {
        let bad = config.raw_input_variables.iter().cloned().collect();
        Self {
            config,
            variables: IndexMap::new(),
            arrays: IndexMap::new(),
            constants: IndexMap::new(),
            bad,
            define_constant: SequenceBuilder::new()
                .then(Expect::kind(TokenKind::Identifier).with_value("define"))
                .punct("(")
                .kind(TokenKind::ConstantString)
                .punct(",")
                .then(Expect::kinds(&[TokenKind::ConstantString, TokenKind::Integer]))
                .build(),
            array_literal: SequenceBuilder::new()
                .kind(TokenKind::Variable)
                .punct("=")
                .kind(TokenKind::Array)
                .punct("(")
                .build(),
            array_brackets: SequenceBuilder::new()
                .kind(TokenKind::Variable)
                .punct("=")
                .punct("[")
                .build(),
        }
    }

    pub fn variables(&self) -> &IndexMap<String, Vec<Token>> {
        &self.variables
    }

    pub fn arrays(&self) -> &IndexMap<String, ArrayEntries> {
        &self.arrays
    }

    pub fn constants(&self) -> &IndexMap<String, String> {
        &self.constants
    }

    /// Every name known to carry untrusted input, raw request variables included.
    pub fn bad_variables(&self) -> &IndexSet<String> {
        &self.bad
    }

    /// Bad variables assigned in the file itself.
    pub fn tainted_variables(&self) -> Vec<&str> {
        self.bad
            .iter()
            .filter(|name| !self.config.raw_input_variables.contains(*name))
            .map(String::as_str)
            .collect()
    }

    pub fn value_of(&self, name: &str) -> Option<&[Token]> {
        self.variables.get(name).map(Vec::as_slice)
    }

    pub fn is_token_in_variables(&self, token: &Token) -> bool {
        token.kind == TokenKind::Variable && self.variables.contains_key(&token.text)
    }

    pub fn is_token_in_arrays(&self, token: &Token) -> bool {
        token.kind == TokenKind::Variable && self.arrays.contains_key(&token.text)
    }

    pub fn is_token_in_constants(&self, token: &Token) -> bool {
        token.kind == TokenKind::Identifier && self.constants.contains_key(&token.text)
    }

    // Recording

    /// Runs every recognizer at each position of the stream.
    pub fn collect(&mut self, stream: &mut TokenStream) {
        stream.rewind();
        while stream.has_current() {
            self.normalize_dynamic_name(stream);
            self.capture_constant(stream);
            self.capture_array_literal(stream);
            self.capture_array_brackets(stream);
            self.capture_array_append(stream);
            self.capture_assignment(stream);
            self.capture_concat_assignment(stream);
            self.capture_substr_identity(stream);
            if !stream.advance() {
                break;
            }
        }
        debug!(
            variables = self.variables.len(),
            arrays = self.arrays.len(),
            constants = self.constants.len(),
            "recorded static values"
        );
    }

    /// `${'name'}` becomes the plain variable `$name`.
    pub fn normalize_dynamic_name(&mut self, stream: &mut TokenStream) -> bool {
        let matches = stream.value_is(Offset::Current, "$")
            && stream.value_is(Offset::Next1, "{")
            && stream.kind_is(Offset::Next2, TokenKind::ConstantString)
            && stream.value_is(Offset::Next3, "}");
        if !matches {
            return false;
        }

        let Some(name) = stream.next2().map(|t| format!("${}", t.unquoted())) else {
            return false;
        };
        stream.replace_at(Offset::Current, TokenKind::Variable, name);
        stream.unset(&[Offset::Next1, Offset::Next2, Offset::Next3]);
        true
    }

    /// `define('NAME', 'value')`; the first definition of a name wins.
    pub fn capture_constant(&mut self, stream: &mut TokenStream) -> bool {
        let Some(cursor) = stream.cursor() else {
            return false;
        };
        if !stream.value_is(Offset::Current, "define") || !stream.check_sequence(&self.define_constant)
        {
            return false;
        }

        let positions = stream.live_positions_from(cursor, 5);
        let name = positions.get(2).and_then(|&p| stream.get(p));
        let value = positions.get(4).and_then(|&p| stream.get(p));
        let (Some(name), Some(value)) = (name, value) else {
            return false;
        };

        self.constants
            .entry(name.unquoted().to_string())
            .or_insert_with(|| value.unquoted().to_string());
        true
    }

    /// `$a = array(...)`.
    pub fn capture_array_literal(&mut self, stream: &mut TokenStream) -> bool {
        if !stream.check_sequence(&self.array_literal) {
            return false;
        }
        match stream.position(Offset::Next3) {
            Some(open) => self.capture_array(stream, open, "(", ")"),
            None => false,
        }
    }

    /// `$a = [...]`.
    pub fn capture_array_brackets(&mut self, stream: &mut TokenStream) -> bool {
        if !stream.check_sequence(&self.array_brackets) {
            return false;
        }
        match stream.position(Offset::Next2) {
            Some(open) => self.capture_array(stream, open, "[", "]"),
            None => false,
        }
    }

    fn capture_array(&mut self, stream: &TokenStream, open: usize, open_text: &str, close_text: &str) -> bool {
        let Some(name) = stream.current().map(|t| t.text.clone()) else {
            return false;
        };
        if self.arrays.contains_key(&name) {
            return false;
        }

        let Some(tokens) = inner_tokens(stream, open, open_text, close_text) else {
            return false;
        };
        let entries = parse_array_entries(&tokens);
        if entries.is_empty() {
            return false;
        }

        trace!(%name, entries = entries.len(), "array literal");
        self.arrays.insert(name, entries);
        true
    }

    /// `$a[] = 'value';` adds the next integer key.
    pub fn capture_array_append(&mut self, stream: &mut TokenStream) -> bool {
        let matches = stream.kind_is(Offset::Current, TokenKind::Variable)
            && stream.value_is(Offset::Next1, "[")
            && stream.value_is(Offset::Next2, "]")
            && stream.value_is(Offset::Next3, "=");
        if !matches {
            return false;
        }

        let (Some(name), Some(equals)) = (
            stream.current().map(|t| t.text.clone()),
            stream.position(Offset::Next3),
        ) else {
            return false;
        };
        let Some(value) = statement_value(stream, equals) else {
            return false;
        };
        let [value] = value.as_slice() else {
            return false;
        };
        if !value.is_in(KindGroup::ArrayValue) {
            return false;
        }

        let entries = self.arrays.entry(name).or_default();
        let key = ArrayKey::Int(next_index(entries));
        entries.insert(key, value.clone());
        true
    }

    /// `$a = value;` appends the value to whatever `$a` already holds.
    pub fn capture_assignment(&mut self, stream: &mut TokenStream) -> bool {
        let matches = stream.kind_is(Offset::Current, TokenKind::Variable)
            && stream.kind_is(Offset::Next1, TokenKind::Punct)
            && stream.value_is(Offset::Next1, "=");
        if !matches {
            return false;
        }
        self.append_statement_value(stream)
    }

    /// `$a .= value;`
    pub fn capture_concat_assignment(&mut self, stream: &mut TokenStream) -> bool {
        let matches = stream.kind_is(Offset::Current, TokenKind::Variable)
            && stream.kind_is(Offset::Next1, TokenKind::ConcatEqual);
        if !matches {
            return false;
        }
        self.append_statement_value(stream)
    }

    fn append_statement_value(&mut self, stream: &TokenStream) -> bool {
        let (Some(name), Some(operator)) = (
            stream.current().map(|t| t.text.clone()),
            stream.position(Offset::Next1),
        ) else {
            return false;
        };
        let Some(value) = statement_value(stream, operator) else {
            return false;
        };

        trace!(%name, tokens = value.len(), "assignment");
        self.variables.entry(name).or_default().extend(value);
        true
    }

    /// `$a = substr($b, 0);` is `$a = $b;`. Overwrites the value of `$a`.
    pub fn capture_substr_identity(&mut self, stream: &mut TokenStream) -> bool {
        let matches = stream.kind_is(Offset::Current, TokenKind::Variable)
            && stream.value_is(Offset::Next1, "=");
        if !matches {
            return false;
        }
        let (Some(name), Some(equals)) = (
            stream.current().map(|t| t.text.clone()),
            stream.position(Offset::Next1),
        ) else {
            return false;
        };
        let Some(value) = statement_value(stream, equals) else {
            return false;
        };

        let [call, open, source, comma, offset, close] = value.as_slice() else {
            return false;
        };
        let shape = call.is("substr")
            && open.is("(")
            && source.kind == TokenKind::Variable
            && comma.is(",")
            && offset.kind == TokenKind::Integer
            && offset.is("0")
            && close.is(")");
        if !shape {
            return false;
        }

        let Some(source_value) = self.variables.get(&source.text) else {
            return false;
        };
        if source_value.is_empty() || !source_value.iter().all(|t| t.is_in(KindGroup::Literal)) {
            return false;
        }
        let text: String = source_value.iter().map(Token::unquoted).collect();
        let literal = open.rewritten(TokenKind::ConstantString, single_quoted(&text));

        self.variables.insert(name, vec![literal]);
        true
    }

    /// Merges adjacent literal fragments of every recorded value, also across a `.` between two
    /// literals, into single-quoted strings.
    pub fn concatenate(&mut self) {
        for value in self.variables.values_mut() {
            concatenate_value(value);
        }
    }

    // Substitution

    /// Writes the known value of the variable or constant under the cursor over it.
    pub fn replace(&self, stream: &mut TokenStream) -> bool {
        let Some(current) = stream.current().cloned() else {
            return false;
        };
        let replaced = match current.kind {
            TokenKind::Variable => self.replace_variable(stream, &current),
            TokenKind::Identifier => self.replace_constant(stream, &current),
            _ => false,
        };
        if replaced {
            trace!(name = %current.text, line = current.line, "substituted");
        }
        replaced
    }

    /// Sweeps the stream with [`Variables::replace`]; returns the number of substitutions.
    pub fn replace_all(&self, stream: &mut TokenStream) -> usize {
        let mut count = 0;
        stream.rewind();
        while stream.has_current() {
            if self.replace(stream) {
                count += 1;
            }
            if !stream.advance() {
                break;
            }
        }
        debug!(count, "values substituted");
        count
    }

    fn replace_variable(&self, stream: &mut TokenStream, current: &Token) -> bool {
        let declares = previous_code(stream).map_or(false, |prev| {
            (prev.kind == TokenKind::Keyword && prev.is_any(DECLARING_KEYWORDS))
                || matches!(prev.kind, TokenKind::ObjectOperator | TokenKind::DoubleColon)
                || (prev.kind == TokenKind::Punct && prev.is("$"))
        });
        if declares {
            return false;
        }

        if let Some(entries) = self.arrays.get(&current.text) {
            return replace_array_element(stream, entries);
        }

        let Some(value) = self.single_literal(&current.text) else {
            return false;
        };
        if replace_string_offset(stream, value) {
            return true;
        }

        if stream.value_is(Offset::Next1, "(") {
            if value.kind != TokenKind::ConstantString {
                return false;
            }
            return stream.replace_at(Offset::Current, TokenKind::Identifier, value.unquoted());
        }

        let written = stream.next1().map_or(false, |next| {
            next.is_equation()
                || next.is_any(&["[", "{"])
                || matches!(next.kind, TokenKind::ObjectOperator | TokenKind::DoubleColon)
        });
        if written {
            return false;
        }

        if in_interpolation(stream) {
            stream.replace_at(Offset::Current, TokenKind::EncapsedString, value.unquoted())
        } else {
            stream.replace_at(Offset::Current, value.kind, value.text.clone())
        }
    }

    fn replace_constant(&self, stream: &mut TokenStream, current: &Token) -> bool {
        let Some(value) = self.constants.get(&current.text) else {
            return false;
        };
        if stream.value_is(Offset::Next1, "(") {
            return false;
        }
        let declares = previous_code(stream).map_or(false, |prev| {
            matches!(prev.kind, TokenKind::ObjectOperator | TokenKind::DoubleColon)
                || (prev.kind == TokenKind::Keyword && prev.is_any(CONSTANT_DECLARING_KEYWORDS))
        });
        if declares {
            return false;
        }
        stream.replace_at(Offset::Current, TokenKind::ConstantString, single_quoted(value))
    }

    fn single_literal(&self, name: &str) -> Option<&Token> {
        match self.variables.get(name)?.as_slice() {
            [token] if token.is_in(KindGroup::Literal) => Some(token),
            _ => None,
        }
    }

    // Taint

    /// Grows the bad-variable set until it stops changing. Each round either adds a name or
    /// ends the loop, so it runs at most once per recorded variable plus one.
    pub fn detect_bad(&mut self, stream: &TokenStream) {
        let bound = self.variables.len() + 1;
        for _ in 0..bound {
            let found: Vec<String> = self
                .variables
                .iter()
                .filter(|(name, _)| !self.bad.contains(*name))
                .filter(|(_, value)| self.has_bad_variables(stream, value, false))
                .map(|(name, _)| name.clone())
                .collect();
            if found.is_empty() {
                break;
            }
            trace!(?found, "tainted");
            self.bad.extend(found);
        }
        debug!(bad = self.bad.len(), "taint fixed point reached");
    }

    /// Whether `tokens` reference a bad variable. With `skip_sanitized`, a reference preceded
    /// (within the set) by a sanitizer call or followed shortly by a `?` does not count.
    pub fn has_bad_variables(&self, stream: &TokenStream, tokens: &[Token], skip_sanitized: bool) -> bool {
        let sanitizers: Vec<&str> = self.config.sanitizers.iter().map(String::as_str).collect();

        for (counter, token) in tokens.iter().enumerate() {
            if token.kind != TokenKind::Variable || !self.bad.contains(&token.text) {
                continue;
            }
            if skip_sanitized {
                let sanitized = stream
                    .search_backward(token.index, Needle::OneOf(&sanitizers), Some(counter + 1))
                    .is_some();
                let conditional = stream
                    .search_forward(token.index, "?", Some(self.config.short_conditional_window))
                    .is_some();
                if sanitized || conditional {
                    continue;
                }
            }
            return true;
        }
        false
    }
}

/// Non-code-free tokens of the statement whose operator sits at `operator`, up to the next `;`.
fn statement_value(stream: &TokenStream, operator: usize) -> Option<Vec<Token>> {
    let end = stream.search_forward(operator, ";", None)?;
    let first = stream.next_live(operator)?;
    let last = stream.prev_live(end)?;
    let tokens: Vec<Token> = stream
        .range(first, last)?
        .into_iter()
        .filter(|t| !t.is_in(KindGroup::NonCode))
        .collect();
    if tokens.is_empty() {
        return None;
    }
    Some(unwrap_double_quoted(tokens))
}

/// `"`, text, `"` collapses into one single-quoted string.
fn unwrap_double_quoted(tokens: Vec<Token>) -> Vec<Token> {
    match tokens.as_slice() {
        [open, text, close]
            if open.kind == TokenKind::Punct
                && open.is("\"")
                && text.kind == TokenKind::EncapsedString
                && close.kind == TokenKind::Punct
                && close.is("\"") =>
        {
            vec![text.rewritten(TokenKind::ConstantString, single_quoted(&text.text))]
        }
        _ => tokens,
    }
}

fn inner_tokens(stream: &TokenStream, open: usize, open_text: &str, close_text: &str) -> Option<Vec<Token>> {
    let close = stream.find_closing(open, open_text, close_text)?;
    let first = stream.next_live(open)?;
    if first >= close {
        return None;
    }
    let last = stream.prev_live(close)?;
    Some(
        stream
            .range(first, last)?
            .into_iter()
            .filter(|t| !t.is_in(KindGroup::NonCode))
            .collect(),
    )
}

/// Top-level `key => value` and positional entries of an array literal body. Entries whose key or
/// value is not a plain literal are skipped.
fn parse_array_entries(tokens: &[Token]) -> ArrayEntries {
    let mut elements: Vec<Vec<&Token>> = Vec::new();
    let mut element: Vec<&Token> = Vec::new();
    let mut depth = 0i32;

    for token in tokens {
        if token.kind == TokenKind::Punct {
            match token.text.as_str() {
                "(" | "[" | "{" => depth += 1,
                ")" | "]" | "}" => depth -= 1,
                "," if depth == 0 => {
                    elements.push(std::mem::take(&mut element));
                    continue;
                }
                _ => {}
            }
        }
        element.push(token);
    }
    if !element.is_empty() {
        elements.push(element);
    }

    let mut entries = ArrayEntries::new();
    for element in elements {
        match element.as_slice() {
            [key, arrow, value] if arrow.kind == TokenKind::DoubleArrow => {
                if let Some(key) = ArrayKey::from_token(key) {
                    if value.is_in(KindGroup::ArrayValue) {
                        entries.insert(key, (*value).clone());
                    }
                }
            }
            [value] if value.is_in(KindGroup::ArrayValue) => {
                let key = ArrayKey::Int(next_index(&entries));
                entries.insert(key, (*value).clone());
            }
            _ => {}
        }
    }
    entries
}

fn next_index(entries: &ArrayEntries) -> i64 {
    entries
        .keys()
        .filter_map(|key| match key {
            ArrayKey::Int(number) => Some(*number),
            ArrayKey::Str(_) => None,
        })
        .max()
        .map_or(0, |max| max.saturating_add(1).max(0))
}

fn concatenate_value(value: &mut Vec<Token>) {
    let mut i = 0;
    while i + 1 < value.len() {
        let literal = |t: Option<&Token>| t.map_or(false, |t| t.is_in(KindGroup::Literal));
        let partner = if !literal(value.get(i)) {
            None
        } else if literal(value.get(i + 1)) {
            Some(i + 1)
        } else if value[i + 1].kind == TokenKind::Punct
            && value[i + 1].is(".")
            && literal(value.get(i + 2))
        {
            Some(i + 2)
        } else {
            None
        };

        match partner {
            Some(j) => {
                let text = format!("{}{}", value[i].unquoted(), value[j].unquoted());
                value[i] = value[i].rewritten(TokenKind::ConstantString, single_quoted(&text));
                value.drain(i + 1..=j);
            }
            None => i += 1,
        }
    }
}

/// `$a[key]` followed by `.`, `(` or `;`, with `$a` a recorded array holding that key.
fn replace_array_element(stream: &mut TokenStream, entries: &ArrayEntries) -> bool {
    let Some(cursor) = stream.cursor() else {
        return false;
    };
    let positions = stream.live_positions_from(cursor, 5);
    let &[_, open, key, close, follow] = positions.as_slice() else {
        return false;
    };

    let token_at = |p: usize| stream.get(p);
    let (Some(open_token), Some(key_token), Some(close_token), Some(follow_token)) =
        (token_at(open), token_at(key), token_at(close), token_at(follow))
    else {
        return false;
    };
    if !open_token.is("[") || !close_token.is("]") || !follow_token.is_any(&[".", "(", ";"]) {
        return false;
    }
    let Some(value) = ArrayKey::from_token(key_token).and_then(|k| entries.get(&k)) else {
        return false;
    };
    let Some(current) = stream.get(cursor) else {
        return false;
    };

    let replacement = match follow_token.text.as_str() {
        "(" if value.kind == TokenKind::ConstantString => {
            current.rewritten(TokenKind::Identifier, value.unquoted())
        }
        "(" => return false,
        _ if value.kind == TokenKind::ConstantString || follow_token.is(".") => {
            current.rewritten(TokenKind::ConstantString, single_quoted(value.unquoted()))
        }
        _ => current.rewritten(value.kind, value.text.clone()),
    };

    stream.replace(cursor, replacement);
    stream.delete(open..=close);
    true
}

/// `$s[n]` or `$s{n}` on a recorded string becomes the n-th character.
fn replace_string_offset(stream: &mut TokenStream, value: &Token) -> bool {
    let closer = match stream.next1() {
        Some(open) if open.kind == TokenKind::Punct && open.is("[") => "]",
        Some(open) if open.kind == TokenKind::Punct && open.is("{") => "}",
        _ => return false,
    };
    if !stream.kind_is(Offset::Next2, TokenKind::Integer) || !stream.value_is(Offset::Next3, closer) {
        return false;
    }
    let Some(index) = stream.next2().and_then(|t| t.text.parse::<usize>().ok()) else {
        return false;
    };
    let Some(character) = value.unquoted().chars().nth(index) else {
        return false;
    };

    let text = match character {
        '\'' | '\\' => format!("'\\{}'", character),
        other => format!("'{}'", other),
    };
    stream.replace_at(Offset::Current, TokenKind::ConstantString, text);
    stream.unset(&[Offset::Next1, Offset::Next2, Offset::Next3]);
    true
}

/// Nearest live token before the cursor that is not whitespace or a comment.
fn previous_code(stream: &TokenStream) -> Option<&Token> {
    let mut position = stream.cursor()?;
    while let Some(prev) = stream.prev_live(position) {
        let token = stream.get(prev)?;
        if !token.is_in(KindGroup::NonCode) {
            return Some(token);
        }
        position = prev;
    }
    None
}

fn in_interpolation(stream: &TokenStream) -> bool {
    let quoted = |token: Option<&Token>| {
        token.map_or(false, |t| {
            (t.kind == TokenKind::Punct && t.is("\"")) || t.kind == TokenKind::EncapsedString
        })
    };
    quoted(stream.prev1()) || quoted(stream.next1())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simplifier::Simplifier;
    use heurist_lexer::tokenize;
    use pretty_assertions::assert_eq;

    fn resolve(source: &str) -> (Variables, TokenStream) {
        let mut stream = tokenize(source).unwrap();
        Simplifier::simplify(&mut stream);
        let mut variables = Variables::new(TaintConfig::default());
        variables.collect(&mut stream);
        variables.concatenate();
        variables.replace_all(&mut stream);
        variables.detect_bad(&stream);
        (variables, stream)
    }

    fn texts(tokens: &[Token]) -> Vec<&str> {
        tokens.iter().map(|t| t.text.as_str()).collect()
    }

    #[test]
    fn test_dynamic_name_normalized() {
        let (variables, stream) = resolve("<?php ${'abc'}='x';echo $abc;");
        assert_eq!(texts(variables.value_of("$abc").unwrap()), vec!["'x'"]);
        assert_eq!(stream.glue(), "<?php $abc='x';echo 'x';");
    }

    #[test]
    fn test_constant_substitution() {
        let (variables, stream) = resolve("<?php define('NAME','val');define('NAME','other');echo NAME;");
        assert_eq!(variables.constants().get("NAME").map(String::as_str), Some("val"));
        assert_eq!(stream.glue(), "<?php define('NAME','val');define('NAME','other');echo 'val';");
    }

    #[test]
    fn test_array_literal_keys() {
        let (variables, stream) = resolve("<?php $a=array('x','k'=>'y','z');echo $a[1].$a['k'];");
        let entries = variables.arrays().get("$a").unwrap();
        let keys: Vec<ArrayKey> = entries.keys().cloned().collect();
        assert_eq!(
            keys,
            vec![ArrayKey::Int(0), ArrayKey::Str("k".to_string()), ArrayKey::Int(1)]
        );
        assert_eq!(stream.glue(), "<?php $a=array('x','k'=>'y','z');echo 'z'.'y';");
    }

    #[test]
    fn test_first_array_literal_wins() {
        let (variables, _) = resolve("<?php $a=['p'];$a=['q','r'];");
        let entries = variables.arrays().get("$a").unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries.get(&ArrayKey::Int(0)).map(|t| t.text.as_str()), Some("'p'"));
    }

    #[test]
    fn test_array_append_and_element_substitution() {
        let (variables, stream) = resolve("<?php $b=['p'];$b[]='q';$f=$b[1];echo $f;");
        assert_eq!(variables.arrays().get("$b").map(|e| e.len()), Some(2));
        assert_eq!(stream.glue(), "<?php $b=['p'];$b[]='q';$f='q';echo $f;");
    }

    #[test]
    fn test_array_element_call() {
        let (_, stream) = resolve("<?php $f=array('str_rot13');$f[0]('uryyb');");
        assert_eq!(stream.glue(), "<?php $f=array('str_rot13');str_rot13('uryyb');");
    }

    #[test]
    fn test_assignment_appends_and_concatenates() {
        let (variables, stream) = resolve("<?php $a='BAse64';$a.='_dEcode';$a($x);");
        assert_eq!(texts(variables.value_of("$a").unwrap()), vec!["'BAse64_dEcode'"]);
        assert_eq!(stream.glue(), "<?php $a='BAse64';$a.='_dEcode';BAse64_dEcode($x);");
    }

    #[test]
    fn test_plain_assignment_also_appends() {
        let (variables, _) = resolve("<?php $a=1;$a=2;");
        assert_eq!(texts(variables.value_of("$a").unwrap()), vec!["'12'"]);
    }

    #[test]
    fn test_concatenation_across_dot() {
        let (variables, _) = resolve("<?php $f='str'.'_rot'.\"13\";$g='a'.$x;");
        assert_eq!(texts(variables.value_of("$f").unwrap()), vec!["'str_rot13'"]);
        assert_eq!(texts(variables.value_of("$g").unwrap()), vec!["'a'", ".", "$x"]);
    }

    #[test]
    fn test_double_quoted_value_unwrapped() {
        let tokens = vec![
            Token::new(TokenKind::Punct, "\"", 1, 5),
            Token::new(TokenKind::EncapsedString, "abc", 1, 6),
            Token::new(TokenKind::Punct, "\"", 1, 7),
        ];
        let unwrapped = unwrap_double_quoted(tokens);
        assert_eq!(texts(&unwrapped), vec!["'abc'"]);
        assert_eq!(unwrapped[0].index, 6);
    }

    #[test]
    fn test_substr_identity_overwrites() {
        let (variables, stream) = resolve("<?php $a='abc';$b=substr($a,0);echo $b;");
        assert_eq!(texts(variables.value_of("$b").unwrap()), vec!["'abc'"]);
        assert_eq!(stream.glue(), "<?php $a='abc';$b=substr('abc',0);echo 'abc';");
    }

    #[test]
    fn test_string_offset() {
        let (_, stream) = resolve("<?php $s='abc';echo $s[1];");
        assert_eq!(stream.glue(), "<?php $s='abc';echo 'b';");
    }

    #[test]
    fn test_interpolated_use() {
        let (_, stream) = resolve("<?php $n='bob';echo \"hi $n!\";");
        assert_eq!(stream.glue(), "<?php $n='bob';echo\"hi bob!\";");
    }

    #[test]
    fn test_declarations_are_not_substituted() {
        let source = "<?php $a='x';global $a;$a.='y';$o->$a;";
        let (_, stream) = resolve(source);
        assert_eq!(stream.glue(), source);
    }

    #[test]
    fn test_taint_propagates_to_fixed_point() {
        let (variables, _) = resolve("<?php $c=$b;$b='p'.$a;$a=$_GET['x'];$d='safe';");
        let tainted = variables.tainted_variables();
        assert_eq!(tainted, vec!["$a", "$b", "$c"]);
        assert!(!variables.bad_variables().contains("$d"));
        assert!(variables.bad_variables().contains("$_POST"));
    }

    #[test]
    fn test_sanitized_references_are_skipped() {
        let mut stream = tokenize("<?php $q=sanitize_text_field($_POST['x']);").unwrap();
        Simplifier::simplify(&mut stream);
        let variables = Variables::new(TaintConfig::default());
        let equals = stream.find_first("=").unwrap();
        let value = statement_value(&stream, equals).unwrap();
        assert!(variables.has_bad_variables(&stream, &value, false));
        assert!(!variables.has_bad_variables(&stream, &value, true));
    }

    #[test]
    fn test_short_conditional_is_skipped() {
        let mut stream = tokenize("<?php $q=isset($_GET['a'])?1:0;").unwrap();
        Simplifier::simplify(&mut stream);
        let variables = Variables::new(TaintConfig::default());
        let equals = stream.find_first("=").unwrap();
        let value = statement_value(&stream, equals).unwrap();
        assert!(!variables.has_bad_variables(&stream, &value, true));
    }
}
