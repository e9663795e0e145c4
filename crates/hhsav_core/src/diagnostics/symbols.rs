//! Symbol-level recovery: misplaced brackets, commas and stray punctuation.
//!
//! Every sub-rule is tried; when several match, the one whose span sits on
//! the failure line nearest the reported column wins.

use super::rules::{
    LITERALS, RuleContext, RuleResult, is_property_line, splice, starts_value, trimmed_len,
};
use super::scan::{closer_for, opener_for};
use super::{Diagnostic, Note, ParseErrorKind, ParseFailure};

type SymbolRule = fn(&RuleContext<'_>) -> RuleResult;

const SYMBOL_RULES: &[SymbolRule] = &[
    wrong_closing_bracket,
    wrong_opening_bracket,
    comma_near_colon,
    comma_after_colon,
    comma_before_closer,
    duplicate_comma,
    after_top_level_close,
    invalid_after_open,
    invalid_after_close,
    missing_comma,
];

pub(crate) fn symbol_rules(ctx: &RuleContext<'_>) -> RuleResult {
    let mut candidates = Vec::new();
    for rule in SYMBOL_RULES {
        if let Some(diagnostic) = rule(ctx)? {
            candidates.push(diagnostic);
        }
    }
    Ok(candidates
        .into_iter()
        .min_by_key(|diagnostic| distance(diagnostic, ctx.failure)))
}

fn distance(diagnostic: &Diagnostic, failure: &ParseFailure) -> (bool, usize) {
    (
        diagnostic.line != failure.line,
        diagnostic.start_col.abs_diff(failure.col),
    )
}

fn is_stray_symbol(ch: char) -> bool {
    !(ch.is_alphanumeric()
        || ch.is_whitespace()
        || matches!(ch, '"' | '{' | '[' | '}' | ']' | '-'))
}

/// Whether a JSON value starts at `col`, literals included.
fn begins_value(chars: &[char], col: usize) -> bool {
    let Some(&ch) = chars.get(col) else {
        return false;
    };
    if ch.is_alphabetic() {
        let word: String = chars[col..]
            .iter()
            .take_while(|c| c.is_alphanumeric())
            .collect();
        return LITERALS.contains(&word.as_str());
    }
    starts_value(ch)
}

fn wrong_closing_bracket(ctx: &RuleContext<'_>) -> RuleResult {
    let kind = ctx.failure.kind;
    if !(kind.expects_comma() || kind == ParseErrorKind::ExpectedValue) {
        return Ok(None);
    }
    let Some(found) = ctx.char_at_failure().filter(|c| matches!(c, '}' | ']')) else {
        return Ok(None);
    };
    if ctx.scan.bracket_balance() != 0 {
        return Ok(None);
    }
    let (line, col) = (ctx.failure.line, ctx.failure.col);
    let Some(expected) = ctx.scan.expected_closer_before_position(line, col) else {
        return Ok(None);
    };
    if expected == found {
        return Ok(None);
    }
    let chars = ctx.line_chars()?;
    Ok(Some(Diagnostic::new(
        Note::SymbolWrongClosingBracket,
        format!("Invalid Entry: use {expected} to close this block."),
        line,
        ctx.line_text()?,
        col,
        col + 1,
        splice(&chars, col, col + 1, &expected.to_string()),
    )))
}

fn wrong_opening_bracket(ctx: &RuleContext<'_>) -> RuleResult {
    let kind = ctx.failure.kind;
    let applies = matches!(
        kind,
        ParseErrorKind::KeyMustBeString | ParseErrorKind::ExpectedColon
    ) || (kind == ParseErrorKind::ExpectedListCommaOrEnd
        && ctx.char_at_failure() == Some(':'));
    if !applies || ctx.scan.bracket_balance() != 0 {
        return Ok(None);
    }
    let stack = ctx
        .scan
        .open_stack_before(ctx.failure.line, ctx.failure.col);
    let Some(opener) = stack.last().copied() else {
        return Ok(None);
    };
    let Some(closer) = ctx.scan.matching_closer(opener) else {
        return Ok(None);
    };
    if closer_for(opener.ch) == Some(closer.ch) {
        return Ok(None);
    }
    let Some(replacement) = opener_for(closer.ch) else {
        return Ok(None);
    };
    let text = ctx.scan.line_text(opener.line)?;
    let chars: Vec<char> = text.chars().collect();
    Ok(Some(Diagnostic::new(
        Note::SymbolWrongOpeningBracket,
        format!("Invalid Entry: open this block with {replacement}."),
        opener.line,
        text,
        opener.col,
        opener.col + 1,
        splice(&chars, opener.col, opener.col + 1, &replacement.to_string()),
    )))
}

/// `"key",: value` or `"key", value`.
fn comma_near_colon(ctx: &RuleContext<'_>) -> RuleResult {
    if ctx.failure.kind != ParseErrorKind::ExpectedColon || ctx.char_at_failure() != Some(',') {
        return Ok(None);
    }
    let (line, col) = (ctx.failure.line, ctx.failure.col);
    let chars = ctx.line_chars()?;
    let next = ctx.scan.next_significant(line, col);
    if next.is_some_and(|n| n.ch == ':' && n.line == line) {
        return Ok(Some(Diagnostic::new(
            Note::SymbolCommaBeforeColon,
            "Invalid Entry: remove the comma before the colon.",
            line,
            ctx.line_text()?,
            col,
            col + 1,
            splice(&chars, col, col + 1, ""),
        )));
    }
    let spaced = chars.get(col + 1).is_some_and(|c| c.is_whitespace());
    let colon = if spaced { ":" } else { ": " };
    Ok(Some(Diagnostic::new(
        Note::SymbolCommaInsteadOfColon,
        "Invalid Entry: use a colon between the key and its value.",
        line,
        ctx.line_text()?,
        col,
        col + 1,
        splice(&chars, col, col + 1, colon),
    )))
}

/// `"key":, value` with a value still following on the line.
fn comma_after_colon(ctx: &RuleContext<'_>) -> RuleResult {
    if ctx.failure.kind != ParseErrorKind::ExpectedValue || ctx.char_at_failure() != Some(',') {
        return Ok(None);
    }
    let (line, col) = (ctx.failure.line, ctx.failure.col);
    let Some(prev) = ctx.scan.prev_significant(line, col) else {
        return Ok(None);
    };
    if prev.ch != ':' || prev.line != line {
        return Ok(None);
    }
    let chars = ctx.line_chars()?;
    let mut rest = col + 1;
    while rest < chars.len() && chars[rest].is_whitespace() {
        rest += 1;
    }
    if rest >= chars.len() {
        return Ok(None);
    }
    Ok(Some(Diagnostic::new(
        Note::SymbolCommaAfterColon,
        "Invalid Entry: remove the comma after the colon.",
        line,
        ctx.line_text()?,
        col,
        col + 1,
        splice(&chars, prev.col + 1, rest, " "),
    )))
}

/// `[1, 2,]`, or a comma ending the line before a closer.
fn comma_before_closer(ctx: &RuleContext<'_>) -> RuleResult {
    if ctx.failure.kind != ParseErrorKind::TrailingComma {
        return Ok(None);
    }
    let (line, col) = (ctx.failure.line, ctx.failure.col);
    let Some(comma) = ctx
        .scan
        .prev_significant(line, col)
        .filter(|located| located.ch == ',')
    else {
        return Ok(None);
    };
    let text = ctx.scan.line_text(comma.line)?;
    let chars: Vec<char> = text.chars().collect();
    let (note, header) = if comma.line == line {
        (
            Note::SymbolCommaBeforeCloser,
            "Invalid Entry: remove the comma before the closing bracket.",
        )
    } else {
        (
            Note::StrayTrailingComma,
            "Invalid Entry: remove the trailing comma.",
        )
    };
    Ok(Some(Diagnostic::new(
        note,
        header,
        comma.line,
        text,
        comma.col,
        comma.col + 1,
        splice(&chars, comma.col, comma.col + 1, ""),
    )))
}

fn duplicate_comma(ctx: &RuleContext<'_>) -> RuleResult {
    if !matches!(
        ctx.failure.kind,
        ParseErrorKind::ExpectedValue | ParseErrorKind::KeyMustBeString
    ) || ctx.char_at_failure() != Some(',')
    {
        return Ok(None);
    }
    let (line, col) = (ctx.failure.line, ctx.failure.col);
    let Some(prev) = ctx
        .scan
        .prev_significant(line, col)
        .filter(|located| located.ch == ',')
    else {
        return Ok(None);
    };
    let chars = ctx.line_chars()?;
    let mut last_comma = col;
    let mut index = col;
    while index < chars.len() && (chars[index] == ',' || chars[index].is_whitespace()) {
        if chars[index] == ',' {
            last_comma = index;
        }
        index += 1;
    }
    let cut_from = if prev.line == line { prev.col + 1 } else { col };
    let keep_space = if prev.line == line && chars.get(cut_from).is_some_and(|c| c.is_whitespace()) {
        " "
    } else {
        ""
    };
    let mut resume = last_comma + 1;
    while !keep_space.is_empty() && resume < chars.len() && chars[resume].is_whitespace() {
        resume += 1;
    }
    Ok(Some(Diagnostic::new(
        Note::SymbolDuplicateComma,
        "Invalid Entry: remove the extra comma.",
        line,
        ctx.line_text()?,
        col,
        last_comma + 1,
        splice(&chars, cut_from, resume, keep_space),
    )))
}

/// Junk (or a comma) after the top-level container has closed.
fn after_top_level_close(ctx: &RuleContext<'_>) -> RuleResult {
    if ctx.failure.kind != ParseErrorKind::TrailingCharacters {
        return Ok(None);
    }
    let Some(first) = ctx.scan.first_non_empty_line() else {
        return Ok(None);
    };
    let container_top = ctx
        .scan
        .line_text(first)?
        .trim_start()
        .starts_with(['{', '[']);
    let Some(ch) = ctx.char_at_failure() else {
        return Ok(None);
    };
    if !container_top {
        return Ok(None);
    }
    let (line, col) = (ctx.failure.line, ctx.failure.col);
    let chars = ctx.line_chars()?;
    let end = trimmed_len(&chars).max(col + 1);

    if ch == ',' {
        let more_values = ctx
            .scan
            .next_significant(line, col)
            .and_then(|next| {
                let text: Vec<char> = ctx.scan.line_text(next.line).ok()?.chars().collect();
                Some(begins_value(&text, next.col))
            })
            .unwrap_or(false);
        if more_values {
            return Ok(None);
        }
        return Ok(Some(Diagnostic::new(
            Note::SymbolCommaAfterTopLevelClose,
            "Invalid Entry: remove the comma after the closing bracket.",
            line,
            ctx.line_text()?,
            col,
            end,
            splice(&chars, col, end, ""),
        )));
    }
    if begins_value(&chars, col) {
        return Ok(None);
    }
    Ok(Some(Diagnostic::new(
        Note::SymbolTrailingJunk,
        "Invalid Entry: remove the characters after the closing bracket.",
        line,
        ctx.line_text()?,
        col,
        end,
        splice(&chars, col, end, ""),
    )))
}

/// `[;1]`, `{,"a": 1}`.
fn invalid_after_open(ctx: &RuleContext<'_>) -> RuleResult {
    if !matches!(
        ctx.failure.kind,
        ParseErrorKind::ExpectedValue | ParseErrorKind::KeyMustBeString
    ) {
        return Ok(None);
    }
    if !ctx.char_at_failure().is_some_and(is_stray_symbol) {
        return Ok(None);
    }
    let (line, col) = (ctx.failure.line, ctx.failure.col);
    if !ctx
        .scan
        .prev_significant(line, col)
        .is_some_and(|prev| matches!(prev.ch, '{' | '['))
    {
        return Ok(None);
    }
    let chars = ctx.line_chars()?;
    let mut end = col;
    while end < chars.len() && is_stray_symbol(chars[end]) {
        end += 1;
    }
    let mut resume = end;
    while resume < chars.len() && chars[resume].is_whitespace() {
        resume += 1;
    }
    Ok(Some(Diagnostic::new(
        Note::SymbolInvalidAfterOpen,
        "Invalid Entry: remove the stray symbol after the opening bracket.",
        line,
        ctx.line_text()?,
        col,
        end,
        splice(&chars, col, resume, ""),
    )))
}

/// `{"a": 1};{"b": 2}` inside a list.
fn invalid_after_close(ctx: &RuleContext<'_>) -> RuleResult {
    if !ctx.failure.kind.expects_comma() {
        return Ok(None);
    }
    let Some(ch) = ctx.char_at_failure() else {
        return Ok(None);
    };
    if ch == ',' || !is_stray_symbol(ch) {
        return Ok(None);
    }
    let (line, col) = (ctx.failure.line, ctx.failure.col);
    if !ctx
        .scan
        .prev_significant(line, col)
        .is_some_and(|prev| matches!(prev.ch, '}' | ']'))
    {
        return Ok(None);
    }
    let chars = ctx.line_chars()?;
    let closes_next = ctx
        .scan
        .next_significant(line, col)
        .is_some_and(|next| matches!(next.ch, '}' | ']'));
    let (after, header) = if closes_next {
        (
            splice(&chars, col, col + 1, ""),
            "Invalid Entry: remove the stray symbol after the closing bracket.",
        )
    } else {
        (
            splice(&chars, col, col + 1, ","),
            "Invalid Entry: replace the stray symbol with a comma.",
        )
    };
    Ok(Some(Diagnostic::new(
        Note::SymbolInvalidAfterClose,
        header,
        line,
        ctx.line_text()?,
        col,
        col + 1,
        after,
    )))
}

fn missing_comma(ctx: &RuleContext<'_>) -> RuleResult {
    if !ctx.failure.kind.expects_comma() {
        return Ok(None);
    }
    let (line, col) = (ctx.failure.line, ctx.failure.col);
    let chars = ctx.line_chars()?;
    if !begins_value(&chars, col) {
        return Ok(None);
    }
    let Some(prev) = ctx.scan.prev_significant(line, col) else {
        return Ok(None);
    };
    if !(matches!(prev.ch, '"' | '}' | ']' | 'e' | 'l') || prev.ch.is_ascii_digit()) {
        return Ok(None);
    }
    // A property inside a list means the list was never closed.
    let in_list = ctx
        .scan
        .open_stack_before(line, col)
        .last()
        .is_some_and(|opener| opener.ch == '[');
    if in_list && is_property_line(ctx.line_text()?) {
        return Ok(None);
    }
    let text = ctx.scan.line_text(prev.line)?;
    let prev_chars: Vec<char> = text.chars().collect();
    let note = if matches!(prev.ch, '}' | ']') {
        Note::MissingCommaBetweenBlocks
    } else {
        Note::MissingComma
    };
    Ok(Some(Diagnostic::insertion(
        note,
        "Invalid Entry: add a comma near the highlighted line.",
        prev.line,
        text,
        prev.col + 1,
        splice(&prev_chars, prev.col + 1, prev.col + 1, ","),
    )))
}
