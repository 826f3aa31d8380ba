/*! Windowed, mutable token stream.
 *
 * Passes rewrite the lexed file while walking it, so positions must stay meaningful across edits.
 * The stream keeps every token in an arena slot; deleting leaves a tombstone and positions of the
 * surviving tokens do not move until `reindex` is called. A cursor plus five fixed-offset
 * accessors give recognizers bounded look-behind and look-ahead over live tokens only.
 */

use crate::pattern::{matches_sequence, Expect};
use crate::token::{Token, TokenKind};
use std::ops::RangeInclusive;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Offset {
    Prev2,
    Prev1,
    Current,
    Next1,
    Next2,
    Next3,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Window {
    pub prev2: Option<usize>,
    pub prev1: Option<usize>,
    pub current: Option<usize>,
    pub next1: Option<usize>,
    pub next2: Option<usize>,
    pub next3: Option<usize>,
}

impl Window {
    pub fn get(&self, offset: Offset) -> Option<usize> {
        match offset {
            Offset::Prev2 => self.prev2,
            Offset::Prev1 => self.prev1,
            Offset::Current => self.current,
            Offset::Next1 => self.next1,
            Offset::Next2 => self.next2,
            Offset::Next3 => self.next3,
        }
    }
}

/// What a bounded search looks for.
#[derive(Debug, Clone, Copy)]
pub enum Needle<'a> {
    Value(&'a str),
    OneOf(&'a [&'a str]),
}

impl<'a> Needle<'a> {
    pub fn matches(&self, token: &Token) -> bool {
        match self {
            Needle::Value(value) => token.text == *value,
            Needle::OneOf(values) => token.is_any(values),
        }
    }
}

impl<'a> From<&'a str> for Needle<'a> {
    fn from(value: &'a str) -> Self {
        Needle::Value(value)
    }
}

impl<'a> From<&'a [&'a str]> for Needle<'a> {
    fn from(values: &'a [&'a str]) -> Self {
        Needle::OneOf(values)
    }
}

#[derive(Debug, Clone, Default)]
pub struct TokenStream {
    slots: Vec<Option<Token>>,
    cursor: Option<usize>,
    window: Window,
}

impl TokenStream {
    pub fn new(tokens: Vec<Token>) -> Self {
        let slots = tokens
            .into_iter()
            .enumerate()
            .map(|(index, mut token)| {
                token.index = index;
                Some(token)
            })
            .collect();

        let mut stream = Self {
            slots,
            cursor: None,
            window: Window::default(),
        };
        stream.rewind();
        stream
    }

    /// Size of the arena, tombstones included.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live_count() == 0
    }

    pub fn live_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn get(&self, position: usize) -> Option<&Token> {
        self.slots.get(position).and_then(|slot| slot.as_ref())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Token> {
        self.slots.iter().flatten()
    }

    pub fn to_vec(&self) -> Vec<Token> {
        self.iter().cloned().collect()
    }

    pub fn glue(&self) -> String {
        self.iter().map(|token| token.text.as_str()).collect()
    }

    pub fn first_live(&self) -> Option<usize> {
        self.slots.iter().position(|slot| slot.is_some())
    }

    pub fn next_live(&self, position: usize) -> Option<usize> {
        (position + 1..self.slots.len()).find(|&p| self.slots[p].is_some())
    }

    pub fn prev_live(&self, position: usize) -> Option<usize> {
        (0..position.min(self.slots.len()))
            .rev()
            .find(|&p| self.slots[p].is_some())
    }

    // Cursor

    pub fn rewind(&mut self) {
        self.cursor = self.first_live();
        self.refresh();
    }

    /// Puts the cursor on `position`, or on the next live token if that slot is a tombstone.
    pub fn seek(&mut self, position: usize) {
        self.cursor = match self.get(position) {
            Some(_) => Some(position),
            None => self.next_live(position),
        };
        self.refresh();
    }

    pub fn advance(&mut self) -> bool {
        self.cursor = self.cursor.and_then(|c| self.next_live(c));
        self.refresh();
        self.cursor.is_some()
    }

    pub fn has_current(&self) -> bool {
        self.cursor.is_some()
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn window(&self) -> Window {
        self.window
    }

    pub fn position(&self, offset: Offset) -> Option<usize> {
        self.window.get(offset)
    }

    pub fn at(&self, offset: Offset) -> Option<&Token> {
        self.position(offset).and_then(|p| self.get(p))
    }

    pub fn prev2(&self) -> Option<&Token> {
        self.at(Offset::Prev2)
    }

    pub fn prev1(&self) -> Option<&Token> {
        self.at(Offset::Prev1)
    }

    pub fn current(&self) -> Option<&Token> {
        self.at(Offset::Current)
    }

    pub fn next1(&self) -> Option<&Token> {
        self.at(Offset::Next1)
    }

    pub fn next2(&self) -> Option<&Token> {
        self.at(Offset::Next2)
    }

    pub fn next3(&self) -> Option<&Token> {
        self.at(Offset::Next3)
    }

    pub fn value_is(&self, offset: Offset, value: &str) -> bool {
        self.at(offset).map_or(false, |t| t.is(value))
    }

    pub fn value_in(&self, offset: Offset, values: &[&str]) -> bool {
        self.at(offset).map_or(false, |t| t.is_any(values))
    }

    pub fn kind_is(&self, offset: Offset, kind: TokenKind) -> bool {
        self.at(offset).map_or(false, |t| t.kind == kind)
    }

    fn refresh(&mut self) {
        let Some(cursor) = self.cursor else {
            self.window = Window::default();
            return;
        };

        let current = self.get(cursor).map(|_| cursor);
        let next1 = self.next_live(cursor);
        let next2 = next1.and_then(|p| self.next_live(p));
        let next3 = next2.and_then(|p| self.next_live(p));
        let prev1 = self.prev_live(cursor);
        let prev2 = prev1.and_then(|p| self.prev_live(p));

        self.window = Window {
            prev2,
            prev1,
            current,
            next1,
            next2,
            next3,
        };
    }

    // Search

    /// First live token strictly after `from` matching `needle`, inspecting at most `limit` tokens.
    pub fn search_forward<'n>(
        &self,
        from: usize,
        needle: impl Into<Needle<'n>>,
        limit: Option<usize>,
    ) -> Option<usize> {
        let needle = needle.into();
        let mut steps = 0;
        let mut position = from;
        while let Some(next) = self.next_live(position) {
            if limit.map_or(false, |limit| steps >= limit) {
                return None;
            }
            steps += 1;
            if self.slots[next].as_ref().map_or(false, |t| needle.matches(t)) {
                return Some(next);
            }
            position = next;
        }
        None
    }

    /// Last live token strictly before `from` matching `needle`, inspecting at most `limit` tokens.
    pub fn search_backward<'n>(
        &self,
        from: usize,
        needle: impl Into<Needle<'n>>,
        limit: Option<usize>,
    ) -> Option<usize> {
        let needle = needle.into();
        let mut steps = 0;
        let mut position = from;
        while let Some(prev) = self.prev_live(position) {
            if limit.map_or(false, |limit| steps >= limit) {
                return None;
            }
            steps += 1;
            if self.slots[prev].as_ref().map_or(false, |t| needle.matches(t)) {
                return Some(prev);
            }
            position = prev;
        }
        None
    }

    /// First live token anywhere in the stream matching `needle`.
    pub fn find_first<'n>(&self, needle: impl Into<Needle<'n>>) -> Option<usize> {
        let needle = needle.into();
        self.iter().find(|t| needle.matches(t)).map(|t| t.index)
    }

    /// Live tokens in `start..=end`; `None` when the bounds are inverted or outside the arena.
    pub fn range(&self, start: usize, end: usize) -> Option<Vec<Token>> {
        if start > end || end >= self.slots.len() {
            return None;
        }
        Some(self.slots[start..=end].iter().flatten().cloned().collect())
    }

    /// Position of the `close` token balancing the `open` token at `position`, counting nested
    /// pairs of the same kind.
    pub fn find_closing(&self, position: usize, open: &str, close: &str) -> Option<usize> {
        if !self.get(position).map_or(false, |t| t.is(open)) {
            return None;
        }
        let mut depth = 0usize;
        let mut cursor = position;
        while let Some(next) = self.next_live(cursor) {
            let token = self.slots[next].as_ref()?;
            if token.kind == TokenKind::Punct && token.is(open) {
                depth += 1;
            } else if token.kind == TokenKind::Punct && token.is(close) {
                if depth == 0 {
                    return Some(next);
                }
                depth -= 1;
            }
            cursor = next;
        }
        None
    }

    pub fn check_sequence(&self, sequence: &[Expect]) -> bool {
        match self.cursor {
            Some(cursor) if self.get(cursor).is_some() => self.check_sequence_at(cursor, sequence),
            _ => false,
        }
    }

    pub fn check_sequence_at(&self, position: usize, sequence: &[Expect]) -> bool {
        if position >= self.slots.len() {
            return false;
        }
        matches_sequence(sequence, self.slots[position..].iter().flatten())
    }

    /// Live positions of the first `count` tokens starting at `position` (inclusive).
    pub fn live_positions_from(&self, position: usize, count: usize) -> Vec<usize> {
        (position..self.slots.len())
            .filter(|&p| self.slots[p].is_some())
            .take(count)
            .collect()
    }

    // Mutation

    pub fn replace(&mut self, position: usize, mut token: Token) -> bool {
        if position >= self.slots.len() {
            return false;
        }
        token.index = position;
        self.slots[position] = Some(token);
        self.refresh();
        true
    }

    pub fn replace_at(&mut self, offset: Offset, kind: TokenKind, text: impl Into<String>) -> bool {
        let Some(position) = self.position(offset) else {
            return false;
        };
        let Some(token) = self.get(position).map(|t| t.rewritten(kind, text)) else {
            return false;
        };
        self.replace(position, token)
    }

    pub fn delete(&mut self, range: RangeInclusive<usize>) {
        let end = (*range.end()).min(self.slots.len().saturating_sub(1));
        if self.slots.is_empty() || *range.start() > end {
            return;
        }
        for slot in &mut self.slots[*range.start()..=end] {
            *slot = None;
        }
        self.refresh();
    }

    /// Deletes the tokens currently under the given window offsets.
    pub fn unset(&mut self, offsets: &[Offset]) {
        let positions: Vec<usize> = offsets.iter().filter_map(|o| self.position(*o)).collect();
        for position in positions {
            self.slots[position] = None;
        }
        self.refresh();
    }

    /// Drops tombstones at and after `from`, renumbering the survivors.
    pub fn reindex(&mut self, from: usize) {
        if from >= self.slots.len() {
            return;
        }

        let cursor = self.cursor.map(|c| {
            if c < from {
                c
            } else {
                from + self.slots[from..c].iter().flatten().count()
            }
        });

        let tail: Vec<Token> = self.slots.drain(from..).flatten().collect();
        for (offset, mut token) in tail.into_iter().enumerate() {
            token.index = from + offset;
            self.slots.push(Some(token));
        }

        self.cursor = cursor.filter(|&c| c < self.slots.len());
        self.refresh();
    }

    /// Removes every live token for which `predicate` holds.
    pub fn retain(&mut self, mut predicate: impl FnMut(&Token) -> bool) {
        for slot in &mut self.slots {
            if slot.as_ref().map_or(false, |t| !predicate(t)) {
                *slot = None;
            }
        }
        self.refresh();
    }
}

impl FromIterator<Token> for TokenStream {
    fn from_iter<I: IntoIterator<Item = Token>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn stream(parts: &[(TokenKind, &str)]) -> TokenStream {
        parts
            .iter()
            .map(|(kind, text)| Token::new(*kind, *text, 1, 0))
            .collect()
    }

    fn sample() -> TokenStream {
        stream(&[
            (TokenKind::OpenTag, "<?php "),
            (TokenKind::Variable, "$a"),
            (TokenKind::Punct, "="),
            (TokenKind::ConstantString, "'x'"),
            (TokenKind::Punct, ";"),
            (TokenKind::Identifier, "echo"),
            (TokenKind::Variable, "$a"),
            (TokenKind::Punct, ";"),
        ])
    }

    #[test]
    fn test_window_at_start() {
        let tokens = sample();
        assert_eq!(tokens.prev1(), None);
        assert_eq!(tokens.prev2(), None);
        assert_eq!(tokens.current().map(|t| t.text.as_str()), Some("<?php "));
        assert_eq!(tokens.next3().map(|t| t.text.as_str()), Some("'x'"));
    }

    #[test]
    fn test_window_at_end_is_absent() {
        let mut tokens = sample();
        while tokens.advance() {}
        assert!(!tokens.has_current());
        assert_eq!(tokens.current(), None);
        assert_eq!(tokens.next1(), None);
        assert_eq!(tokens.window(), Window::default());
    }

    #[test]
    fn test_window_skips_tombstones() {
        let mut tokens = sample();
        tokens.seek(1);
        tokens.delete(2..=3);
        assert_eq!(tokens.current().map(|t| t.text.as_str()), Some("$a"));
        assert_eq!(tokens.next1().map(|t| t.text.as_str()), Some(";"));
        assert_eq!(tokens.position(Offset::Next1), Some(4));
        assert_eq!(tokens.position(Offset::Prev1), Some(0));
    }

    #[test]
    fn test_search_forward_and_backward() {
        let tokens = sample();
        assert_eq!(tokens.search_forward(1, ";", None), Some(4));
        assert_eq!(tokens.search_forward(4, ";", None), Some(7));
        assert_eq!(tokens.search_forward(1, ";", Some(2)), None);
        assert_eq!(tokens.search_backward(6, "=", None), Some(2));
        assert_eq!(tokens.search_backward(6, "=", Some(3)), None);
        let needles: &[&str] = &["echo", "print"];
        assert_eq!(tokens.search_forward(0, needles, None), Some(5));
        assert_eq!(tokens.find_first("$a"), Some(1));
    }

    #[test]
    fn test_range_bounds() {
        let tokens = sample();
        assert_eq!(tokens.range(3, 2), None);
        assert_eq!(tokens.range(0, 8), None);
        assert_eq!(tokens.range(1, 3).map(|r| r.len()), Some(3));
        assert_eq!(tokens.range(7, 7).map(|r| r.len()), Some(1));
    }

    #[test]
    fn test_range_skips_tombstones() {
        let mut tokens = sample();
        tokens.delete(2..=2);
        let range = tokens.range(1, 3).unwrap();
        let texts: Vec<&str> = range.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["$a", "'x'"]);
    }

    #[test]
    fn test_delete_keeps_outside_positions() {
        let mut tokens = sample();
        tokens.delete(1..=4);
        assert_eq!(tokens.get(5).map(|t| t.index), Some(5));
        assert_eq!(tokens.len(), 8);
        assert_eq!(tokens.live_count(), 4);
    }

    #[test]
    fn test_reindex_compacts_tail() {
        let mut tokens = sample();
        tokens.seek(6);
        tokens.delete(2..=3);
        tokens.reindex(2);
        assert_eq!(tokens.len(), 6);
        let indices: Vec<usize> = tokens.iter().map(|t| t.index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(tokens.cursor(), Some(4));
        assert_eq!(tokens.current().map(|t| t.text.as_str()), Some("$a"));
        assert_eq!(tokens.glue(), "<?php $a;echo$a;");
    }

    #[test]
    fn test_replace_and_unset() {
        let mut tokens = sample();
        tokens.seek(1);
        assert!(tokens.replace_at(Offset::Current, TokenKind::Identifier, "strrev"));
        tokens.unset(&[Offset::Next1, Offset::Next2]);
        assert_eq!(tokens.current().map(|t| t.kind), Some(TokenKind::Identifier));
        assert_eq!(tokens.next1().map(|t| t.text.as_str()), Some(";"));
        assert!(!tokens.replace(100, Token::new(TokenKind::Punct, ";", 1, 0)));
    }

    #[test]
    fn test_find_closing_is_nesting_aware() {
        let tokens = stream(&[
            (TokenKind::Identifier, "f"),
            (TokenKind::Punct, "("),
            (TokenKind::Punct, "("),
            (TokenKind::Integer, "1"),
            (TokenKind::Punct, ")"),
            (TokenKind::Punct, ")"),
            (TokenKind::Punct, ";"),
        ]);
        assert_eq!(tokens.find_closing(1, "(", ")"), Some(5));
        assert_eq!(tokens.find_closing(2, "(", ")"), Some(4));
        assert_eq!(tokens.find_closing(0, "(", ")"), None);
        assert_eq!(tokens.find_closing(1, "[", "]"), None);
    }

    #[test]
    fn test_check_sequence_from_cursor() {
        let mut tokens = sample();
        tokens.seek(1);
        let sequence = vec![
            Expect::kind(TokenKind::Variable),
            Expect::punct("="),
            Expect::kinds(&[TokenKind::ConstantString, TokenKind::Integer]),
        ];
        assert!(tokens.check_sequence(&sequence));
        tokens.advance();
        assert!(!tokens.check_sequence(&sequence));
    }
}
