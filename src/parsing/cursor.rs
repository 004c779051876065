//! Line cursor
//!
//! Owns the split source lines and the position inside the current line. The current
//! line is never copied: consumption only moves a byte offset forward, so the original
//! line stays available for error messages.

use once_cell::sync::Lazy;
use regex::Regex;

static LINE_BREAK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\r?\n").unwrap());

pub(crate) struct Cursor<'s> {
    lines: Vec<&'s str>,
    next: usize,
    lineno: usize,
    current: Option<&'s str>,
    offset: usize,
}

impl<'s> Cursor<'s> {
    pub fn new(source: &'s str) -> Self {
        let mut lines: Vec<&str> = LINE_BREAK.split(source).collect();
        // Trailing empty lines carry no content.
        while lines.last().is_some_and(|l| l.is_empty()) {
            lines.pop();
        }
        Cursor {
            lines,
            next: 0,
            lineno: 0,
            current: None,
            offset: 0,
        }
    }

    /// Advance to the next line. Returns false once the input is exhausted.
    pub fn next_line(&mut self) -> bool {
        match self.lines.get(self.next).copied() {
            Some(line) => {
                self.current = Some(line);
                self.next += 1;
                self.lineno += 1;
                self.offset = 0;
                true
            }
            None => {
                self.current = None;
                self.offset = 0;
                false
            }
        }
    }

    /// The line after the current one, without consuming it.
    pub fn peek(&self) -> Option<&'s str> {
        self.lines.get(self.next).copied()
    }

    pub fn lineno(&self) -> usize {
        self.lineno
    }

    /// The full current line.
    pub fn line(&self) -> &'s str {
        self.current.unwrap_or("")
    }

    /// The unconsumed remainder of the current line.
    pub fn rest(&self) -> &'s str {
        &self.line()[self.offset..]
    }

    /// Characters consumed from the current line.
    pub fn column(&self) -> usize {
        self.line()[..self.offset].chars().count()
    }

    /// Consume `len` bytes of the remainder.
    pub fn advance(&mut self, len: usize) {
        self.offset = (self.offset + len).min(self.line().len());
    }

    /// Consume everything that is left on the line.
    pub fn finish_line(&mut self) {
        self.offset = self.line().len();
    }

    /// Consume leading spaces and tabs of the remainder.
    pub fn skip_whitespace(&mut self) {
        let rest = self.rest();
        let trimmed = rest.trim_start_matches([' ', '\t']);
        self.advance(rest.len() - trimmed.len());
    }

    /// Consume `prefix` if the remainder starts with it.
    pub fn eat(&mut self, prefix: &str) -> bool {
        if self.rest().starts_with(prefix) {
            self.advance(prefix.len());
            true
        } else {
            false
        }
    }
}

/// Indent width of a line, with tabs advancing to the next multiple of `tab_size`.
pub(crate) fn indent_width(line: &str, tab_size: usize) -> usize {
    let mut width = 0;
    for ch in line.chars() {
        match ch {
            ' ' => width += 1,
            '\t' if tab_size > 1 => width = (width / tab_size + 1) * tab_size,
            '\t' => width += 1,
            _ => break,
        }
    }
    width
}

pub(crate) fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}
