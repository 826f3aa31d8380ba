/*! Folding of literal arithmetic.
 *
 * Obfuscators hide constants behind expressions such as `$a[(2*3)-5]` or `chr((60+5))`. The folder
 * validates the text between a bracket pair against a grammar of signed integer arithmetic and
 * evaluates it with checked `i64` operations; anything else is left untouched. Nothing here ever
 * hands source text to an interpreter.
 *
 * Groups nested deeper than [`MAX_NESTING`] are skipped whole, and ranges longer than
 * [`MAX_RANGE_TOKENS`] are not evaluated, so hostile input costs a linear walk per sweep.
 */

use heurist_core::{Token, TokenKind, TokenStream};
use pest::iterators::Pairs;
use pest::pratt_parser::{Assoc, Op, PrattParser};
use pest::Parser;
use pest_derive::Parser;
use tracing::{debug, trace};

#[derive(Parser)]
#[grammar = "arith.pest"]
struct ArithmeticParser;

const BRACKETS: [(&str, &str); 2] = [("[", "]"), ("(", ")")];

/// Deepest bracket nesting a foldable range may contain.
pub const MAX_NESTING: usize = 32;
/// Most tokens a foldable range may span.
pub const MAX_RANGE_TOKENS: usize = 256;

/// Outcome of trying to fold the group opened at the cursor.
enum Fold {
    Folded(String),
    /// Nested too deep; nothing up to this position is folded.
    SkipTo(usize),
    Untouched,
}

/// Shape of a bracket group, measured without walking past the limits more than once.
enum Group {
    Fits { close: usize, tokens: usize },
    Unclosed,
    TooLarge,
    /// Closing bracket, or the last token when the group never closes.
    TooDeep(usize),
}

pub struct MathFolder {
    pratt: PrattParser<Rule>,
}

impl MathFolder {
    pub fn new() -> Self {
        let pratt = PrattParser::new()
            .op(Op::infix(Rule::add, Assoc::Left) | Op::infix(Rule::subtract, Assoc::Left))
            .op(Op::infix(Rule::multiply, Assoc::Left) | Op::infix(Rule::divide, Assoc::Left))
            .op(Op::prefix(Rule::neg) | Op::prefix(Rule::pos));
        Self { pratt }
    }

    pub fn is_valid_math_syntax(&self, text: &str) -> bool {
        nesting_depth(text) <= MAX_NESTING
            && ArithmeticParser::parse(Rule::calculation, text).is_ok()
    }

    /// Value of `text`, or `None` when it is not plain integer arithmetic or its evaluation
    /// overflows, divides by zero or leaves a remainder.
    pub fn evaluate(&self, text: &str) -> Option<i64> {
        if nesting_depth(text) > MAX_NESTING {
            return None;
        }
        let mut pairs = ArithmeticParser::parse(Rule::calculation, text).ok()?;
        let expr = pairs.next()?.into_inner().next()?;
        self.eval(expr.into_inner())
    }

    fn eval(&self, pairs: Pairs<'_, Rule>) -> Option<i64> {
        self.pratt
            .map_primary(|primary| match primary.as_rule() {
                Rule::integer => primary.as_str().parse::<i64>().ok(),
                Rule::expr => self.eval(primary.into_inner()),
                _ => None,
            })
            .map_prefix(|op, rhs| match op.as_rule() {
                Rule::neg => rhs?.checked_neg(),
                _ => rhs,
            })
            .map_infix(|lhs, op, rhs| {
                let (lhs, rhs) = (lhs?, rhs?);
                match op.as_rule() {
                    Rule::add => lhs.checked_add(rhs),
                    Rule::subtract => lhs.checked_sub(rhs),
                    Rule::multiply => lhs.checked_mul(rhs),
                    Rule::divide if lhs.checked_rem(rhs) == Some(0) => lhs.checked_div(rhs),
                    _ => None,
                }
            })
            .parse(pairs)
    }

    /// Folds the bracketed expression opened by the cursor token, returning its source text.
    ///
    /// `[` keeps its brackets. `(` keeps its parentheses when it belongs to a call or follows an
    /// expression (`f(1+2)`, `$a(1+2)`), otherwise the whole group becomes the literal.
    /// A negative result that would replace a whole group keeps its parentheses, so `10-(0-3)`
    /// becomes `10-(-3)` rather than `10--3`.
    pub fn evaluate_at_cursor(&self, stream: &mut TokenStream) -> Option<String> {
        match self.fold_at_cursor(stream) {
            Fold::Folded(expression) => Some(expression),
            Fold::SkipTo(_) | Fold::Untouched => None,
        }
    }

    fn fold_at_cursor(&self, stream: &mut TokenStream) -> Fold {
        let Some(open) = stream.cursor() else {
            return Fold::Untouched;
        };
        let Some((open_text, close_text)) = BRACKETS.iter().copied().find(|(open_text, _)| {
            stream
                .get(open)
                .map_or(false, |t| t.kind == TokenKind::Punct && t.is(open_text))
        }) else {
            return Fold::Untouched;
        };

        match Self::measure_group(stream, open, open_text, close_text) {
            Group::Fits { close, tokens } if tokens >= 2 => {
                match self.fold_group(stream, open, close, open_text) {
                    Some(expression) => Fold::Folded(expression),
                    None => Fold::Untouched,
                }
            }
            Group::Fits { .. } | Group::Unclosed | Group::TooLarge => Fold::Untouched,
            Group::TooDeep(end) => {
                debug!(open, end, "bracket group nested too deep, skipped");
                Fold::SkipTo(end)
            }
        }
    }

    /// Walks from `open` to its closing bracket, counting the tokens strictly inside. Stops early
    /// once the range grows past [`MAX_RANGE_TOKENS`] at an acceptable depth.
    fn measure_group(
        stream: &TokenStream,
        open: usize,
        open_text: &str,
        close_text: &str,
    ) -> Group {
        let mut depth = 0usize;
        let mut deepest = 0usize;
        let mut tokens = 0usize;
        let mut cursor = open;
        while let Some(next) = stream.next_live(cursor) {
            cursor = next;
            let Some(token) = stream.get(next) else {
                break;
            };
            if token.kind == TokenKind::Punct && token.is(open_text) {
                depth += 1;
                deepest = deepest.max(depth);
            } else if token.kind == TokenKind::Punct && token.is(close_text) {
                if depth == 0 {
                    return if deepest > MAX_NESTING {
                        Group::TooDeep(next)
                    } else {
                        Group::Fits { close: next, tokens }
                    };
                }
                depth -= 1;
            }
            tokens += 1;
            if tokens > MAX_RANGE_TOKENS && deepest <= MAX_NESTING {
                return Group::TooLarge;
            }
        }
        if deepest > MAX_NESTING {
            Group::TooDeep(cursor)
        } else {
            Group::Unclosed
        }
    }

    fn fold_group(
        &self,
        stream: &mut TokenStream,
        open: usize,
        close: usize,
        open_text: &str,
    ) -> Option<String> {
        let first = stream.next_live(open)?;
        let last = stream.prev_live(close)?;

        let inside = stream.range(first, last)?;
        let expression: String = inside.iter().map(|t| t.text.as_str()).collect();
        let value = self.evaluate(&expression)?;
        if value.to_string() == expression {
            return None;
        }

        let keep_delimiters =
            open_text == "[" || value < 0 || Self::is_call_context(stream.prev1());
        let anchor = if keep_delimiters { first } else { open };
        let literal = stream
            .get(anchor)?
            .rewritten(TokenKind::Integer, value.to_string());

        let (delete_from, delete_to) = if keep_delimiters {
            (stream.next_live(first), last)
        } else {
            (stream.next_live(open), close)
        };
        if let Some(from) = delete_from.filter(|&from| from <= delete_to) {
            stream.delete(from..=delete_to);
        }
        stream.replace(anchor, literal);

        trace!(%expression, value, "folded arithmetic");
        Some(expression)
    }

    /// One sweep over the stream; returns the folded expressions.
    pub fn fold_all(&self, stream: &mut TokenStream) -> Vec<String> {
        let mut folded = Vec::new();
        stream.rewind();
        while stream.has_current() {
            match self.fold_at_cursor(stream) {
                Fold::Folded(expression) => folded.push(expression),
                Fold::SkipTo(close) => stream.seek(close),
                Fold::Untouched => {}
            }
            if !stream.advance() {
                break;
            }
        }
        folded
    }

    /// Repeats sweeps until one folds nothing. Every fold removes at least one token, which
    /// bounds the number of sweeps by the stream size.
    pub fn fold_to_fixed_point(&self, stream: &mut TokenStream) -> Vec<String> {
        let mut folded = Vec::new();
        for _ in 0..=stream.live_count() {
            let sweep = self.fold_all(stream);
            if sweep.is_empty() {
                break;
            }
            folded.extend(sweep);
        }
        if !folded.is_empty() {
            debug!(count = folded.len(), "arithmetic folded");
        }
        folded
    }

    fn is_call_context(previous: Option<&Token>) -> bool {
        previous.map_or(false, |token| {
            matches!(
                token.kind,
                TokenKind::Identifier | TokenKind::Keyword | TokenKind::Variable | TokenKind::Array
            ) || (token.kind == TokenKind::Punct && token.is_any(&[")", "]"]))
        })
    }
}

/// Deepest parenthesis nesting in `text`.
fn nesting_depth(text: &str) -> usize {
    let mut depth = 0usize;
    let mut deepest = 0usize;
    for c in text.chars() {
        match c {
            '(' => {
                depth += 1;
                deepest = deepest.max(depth);
            }
            ')' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    deepest
}

impl Default for MathFolder {
    fn default() -> Self {
        Self::new()
    }
}
