//! Whitespace-delimited token stream used by the array and rhythm records

use std::io::Read;

use crate::error::{JazzError, Result};

/// Reads integers and quoted strings from a whitespace-delimited record.
#[derive(Debug)]
pub struct TokenReader {
    text: String,
    pos: usize,
}

impl TokenReader {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into(), pos: 0 }
    }

    /// Slurp a whole reader into a token stream
    pub fn from_reader(mut reader: impl Read) -> Result<Self> {
        let mut text = String::new();
        reader.read_to_string(&mut text)?;
        Ok(Self::new(text))
    }

    fn skip_whitespace(&mut self) {
        let rest = &self.text[self.pos..];
        let trimmed = rest.trim_start();
        self.pos += rest.len() - trimmed.len();
    }

    /// True when only whitespace remains
    pub fn is_at_end(&mut self) -> bool {
        self.skip_whitespace();
        self.pos >= self.text.len()
    }

    /// Next raw token, or `None` at end of input
    pub fn next_token(&mut self) -> Option<&str> {
        self.skip_whitespace();
        if self.pos >= self.text.len() {
            return None;
        }
        let rest = &self.text[self.pos..];
        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        let start = self.pos;
        self.pos += end;
        Some(&self.text[start..start + end])
    }

    pub fn next_i32(&mut self, expected: &'static str) -> Result<i32> {
        let token = self.next_token().ok_or(JazzError::UnexpectedEof(expected))?;
        token.parse().map_err(|_| JazzError::Parse {
            expected,
            found: token.to_string(),
        })
    }

    pub fn next_usize(&mut self, expected: &'static str) -> Result<usize> {
        let token = self.next_token().ok_or(JazzError::UnexpectedEof(expected))?;
        token.parse().map_err(|_| JazzError::Parse {
            expected,
            found: token.to_string(),
        })
    }

    /// Read a double-quoted string with `\"` and `\\` escapes
    pub fn next_quoted(&mut self, expected: &'static str) -> Result<String> {
        self.skip_whitespace();
        let rest = &self.text[self.pos..];
        let mut chars = rest.char_indices();
        match chars.next() {
            Some((_, '"')) => {}
            Some(_) => {
                let found = rest.split_whitespace().next().unwrap_or_default().to_string();
                return Err(JazzError::Parse { expected, found });
            }
            None => return Err(JazzError::UnexpectedEof(expected)),
        }

        let mut out = String::new();
        let mut escaped = false;
        for (idx, c) in chars {
            if escaped {
                out.push(c);
                escaped = false;
                continue;
            }
            match c {
                '\\' => escaped = true,
                '"' => {
                    self.pos += idx + 1;
                    return Ok(out);
                }
                _ => out.push(c),
            }
        }
        Err(JazzError::UnexpectedEof(expected))
    }
}

/// Quote a string for [`TokenReader::next_quoted`]
pub fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}
