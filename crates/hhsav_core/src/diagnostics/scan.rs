//! Neighborhood scans over the text buffer.
//!
//! Bracket matching runs as an explicit character loop with three states so
//! that brackets inside string literals, `\"` and `\\` are handled correctly.
//! JSON strings cannot contain raw newlines, so the state is reset at every
//! line break; an unclosed quote therefore only affects its own line.

use std::ops::ControlFlow;

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ScanError {
    #[error("line {0} is outside the buffer")]
    LineOutOfRange(usize),
}

/// A character at a buffer position (1-based line, 0-based column).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Located {
    pub line: usize,
    pub col: usize,
    pub ch: char,
}

impl Located {
    pub fn is_before(&self, line: usize, col: usize) -> bool {
        (self.line, self.col) < (line, col)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsertionPoint {
    pub line: usize,
    pub col: usize,
    pub opener: Located,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    Outside,
    InString,
    InEscape,
}

pub fn closer_for(open: char) -> Option<char> {
    match open {
        '{' => Some('}'),
        '[' => Some(']'),
        _ => None,
    }
}

pub fn opener_for(close: char) -> Option<char> {
    match close {
        '}' => Some('{'),
        ']' => Some('['),
        _ => None,
    }
}

#[derive(Debug, Clone)]
pub struct BufferScan<'a> {
    lines: Vec<&'a str>,
}

impl<'a> BufferScan<'a> {
    pub fn new(text: &'a str) -> Self {
        let lines = text
            .split('\n')
            .map(|line| line.strip_suffix('\r').unwrap_or(line))
            .collect();
        Self { lines }
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Line `n` (1-based) without its newline.
    pub fn line_text(&self, n: usize) -> Result<&'a str, ScanError> {
        n.checked_sub(1)
            .and_then(|index| self.lines.get(index).copied())
            .ok_or(ScanError::LineOutOfRange(n))
    }

    pub fn line_len(&self, n: usize) -> usize {
        self.line_text(n).map(|l| l.chars().count()).unwrap_or(0)
    }

    pub fn is_blank(&self, n: usize) -> bool {
        self.line_text(n).map(|l| l.trim().is_empty()).unwrap_or(true)
    }

    pub fn indent_of(&self, n: usize) -> usize {
        self.line_text(n)
            .map(|l| l.chars().take_while(|c| c.is_whitespace()).count())
            .unwrap_or(0)
    }

    pub fn char_at(&self, line: usize, col: usize) -> Option<char> {
        self.line_text(line).ok()?.chars().nth(col)
    }

    pub fn previous_non_empty_line(&self, n: usize) -> Option<usize> {
        (1..n.min(self.lines.len() + 1))
            .rev()
            .find(|&candidate| !self.is_blank(candidate))
    }

    pub fn next_non_empty_line(&self, n: usize) -> Option<usize> {
        (n + 1..=self.lines.len()).find(|&candidate| !self.is_blank(candidate))
    }

    pub fn first_non_empty_line(&self) -> Option<usize> {
        self.next_non_empty_line(0)
    }

    pub fn last_non_empty_line(&self) -> Option<usize> {
        self.previous_non_empty_line(self.lines.len() + 1)
    }

    /// Nearest non-whitespace character strictly before `(line, col)`.
    pub fn prev_significant(&self, line: usize, col: usize) -> Option<Located> {
        let mut current = line.min(self.lines.len());
        let mut limit = if current == line { Some(col) } else { None };
        while current >= 1 {
            let chars: Vec<char> = self.line_text(current).ok()?.chars().collect();
            let end = limit.unwrap_or(chars.len()).min(chars.len());
            if let Some(index) = (0..end).rev().find(|&i| !chars[i].is_whitespace()) {
                return Some(Located {
                    line: current,
                    col: index,
                    ch: chars[index],
                });
            }
            current -= 1;
            limit = None;
        }
        None
    }

    /// Nearest non-whitespace character strictly after `(line, col)`.
    pub fn next_significant(&self, line: usize, col: usize) -> Option<Located> {
        let mut current = line;
        let mut start = col + 1;
        while current <= self.lines.len() {
            let chars: Vec<char> = self.line_text(current).ok()?.chars().collect();
            if let Some(index) = (start..chars.len()).find(|&i| !chars[i].is_whitespace()) {
                return Some(Located {
                    line: current,
                    col: index,
                    ch: chars[index],
                });
            }
            current += 1;
            start = 0;
        }
        None
    }

    /// Visits every character outside string literals, quotes excluded.
    fn walk_structural<F>(&self, mut visit: F)
    where
        F: FnMut(Located) -> ControlFlow<()>,
    {
        for (index, line) in self.lines.iter().enumerate() {
            let mut state = ScanState::Outside;
            for (col, ch) in line.chars().enumerate() {
                state = match (state, ch) {
                    (ScanState::Outside, '"') => ScanState::InString,
                    (ScanState::Outside, _) => {
                        let located = Located {
                            line: index + 1,
                            col,
                            ch,
                        };
                        if visit(located).is_break() {
                            return;
                        }
                        ScanState::Outside
                    }
                    (ScanState::InString, '\\') => ScanState::InEscape,
                    (ScanState::InString, '"') => ScanState::Outside,
                    (ScanState::InString, _) => ScanState::InString,
                    (ScanState::InEscape, _) => ScanState::InString,
                };
            }
        }
    }

    /// Line numbers of `open` tokens that never see a matching `close`.
    pub fn unmatched_open_bracket_lines(&self, open: char, close: char) -> Vec<usize> {
        self.unmatched_of(open, close)
            .into_iter()
            .map(|located| located.line)
            .collect()
    }

    fn unmatched_of(&self, open: char, close: char) -> Vec<Located> {
        let mut stack = Vec::new();
        self.walk_structural(|located| {
            if located.ch == open {
                stack.push(located);
            } else if located.ch == close {
                stack.pop();
            }
            ControlFlow::Continue(())
        });
        stack
    }

    /// Mixed `{`/`[` stack of openers still open just before `(line, col)`.
    pub fn open_stack_before(&self, line: usize, col: usize) -> Vec<Located> {
        let mut stack: Vec<Located> = Vec::new();
        self.walk_structural(|located| {
            if !located.is_before(line, col) {
                return ControlFlow::Break(());
            }
            match located.ch {
                '{' | '[' => stack.push(located),
                '}' | ']' => {
                    stack.pop();
                }
                _ => {}
            }
            ControlFlow::Continue(())
        });
        stack
    }

    /// Openers left unclosed at the end of the buffer, outermost first.
    pub fn unclosed_openers(&self) -> Vec<Located> {
        self.open_stack_before(usize::MAX, 0)
    }

    /// The closer that should appear at `(line, col)` given the open stack.
    pub fn expected_closer_before_position(&self, line: usize, col: usize) -> Option<char> {
        self.open_stack_before(line, col)
            .last()
            .and_then(|opener| closer_for(opener.ch))
    }

    /// Openers minus closers, ignoring bracket types.
    pub fn bracket_balance(&self) -> isize {
        let mut balance = 0isize;
        self.walk_structural(|located| {
            match located.ch {
                '{' | '[' => balance += 1,
                '}' | ']' => balance -= 1,
                _ => {}
            }
            ControlFlow::Continue(())
        });
        balance
    }

    /// The closer paired with `opener` by depth, whatever its type.
    pub fn matching_closer(&self, opener: Located) -> Option<Located> {
        let mut depth = 0usize;
        let mut found = None;
        self.walk_structural(|located| {
            if located.is_before(opener.line, opener.col) {
                return ControlFlow::Continue(());
            }
            match located.ch {
                '{' | '[' => depth += 1,
                '}' | ']' => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        found = Some(located);
                        return ControlFlow::Break(());
                    }
                }
                _ => {}
            }
            ControlFlow::Continue(())
        });
        found
    }

    /// Where a missing `close` for the innermost unmatched `open` belongs.
    ///
    /// Looks for the first line after the opener whose indent is not deeper
    /// than the opener's line; the closer goes on a blank line directly above
    /// it when there is one, otherwise at the end of the last non-empty line
    /// before it.
    pub fn missing_close_insertion_point(
        &self,
        open: char,
        close: char,
        failure_line: usize,
        failure_col: usize,
    ) -> Option<InsertionPoint> {
        let unmatched = self.unmatched_of(open, close);
        let opener = unmatched
            .iter()
            .rev()
            .find(|located| located.is_before(failure_line, failure_col + 1))
            .or_else(|| unmatched.last())
            .copied()?;
        let opener_indent = self.indent_of(opener.line);
        let sibling = (opener.line + 1..=self.lines.len())
            .find(|&n| !self.is_blank(n) && self.indent_of(n) <= opener_indent)?;
        if sibling > opener.line + 1 && self.is_blank(sibling - 1) {
            return Some(InsertionPoint {
                line: sibling - 1,
                col: 0,
                opener,
            });
        }
        let anchor = self.previous_non_empty_line(sibling)?;
        Some(InsertionPoint {
            line: anchor,
            col: self.line_len(anchor),
            opener,
        })
    }
}
