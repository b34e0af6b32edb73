//! Delimiter-based tokenizer for hand-written SQL fragments.

use std::str::CharIndices;

/// Characters that always end a token. Each delimiter is itself returned
/// as a one-character token.
const SYMBOLS: &str = "=><!+-*/()',|&`";
const WHITESPACE: &str = " \n\r\x0c\t";

/// Splits a fragment into words and single-character delimiter tokens.
///
/// Nothing is dropped: concatenating every token reproduces the input.
pub struct Lexer<'a> {
    input: &'a str,
    chars: std::iter::Peekable<CharIndices<'a>>,
    extra: [char; 2],
}

impl<'a> Lexer<'a> {
    /// `open_quote` and `close_quote` are the dialect's identifier quotes;
    /// they delimit tokens alongside the fixed symbol set.
    pub fn new(input: &'a str, open_quote: char, close_quote: char) -> Self {
        Self {
            input,
            chars: input.char_indices().peekable(),
            extra: [open_quote, close_quote],
        }
    }

    fn is_delimiter(&self, c: char) -> bool {
        SYMBOLS.contains(c) || WHITESPACE.contains(c) || self.extra.contains(&c)
    }

    /// Collect all tokens.
    pub fn tokenize(self) -> Vec<&'a str> {
        self.collect()
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        let (start, c) = self.chars.next()?;
        if self.is_delimiter(c) {
            return Some(&self.input[start..start + c.len_utf8()]);
        }
        let mut end = start + c.len_utf8();
        while let Some(&(i, next)) = self.chars.peek() {
            if self.is_delimiter(next) {
                break;
            }
            end = i + next.len_utf8();
            self.chars.next();
        }
        Some(&self.input[start..end])
    }
}

pub(crate) fn is_whitespace_token(token: &str) -> bool {
    token.chars().next().is_some_and(|c| c.is_whitespace())
}
