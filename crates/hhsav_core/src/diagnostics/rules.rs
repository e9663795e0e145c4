//! Ordered repair rules. The first rule that recognizes the failure wins.

use std::sync::LazyLock;

use regex::Regex;

use super::scan::{BufferScan, ScanError, closer_for};
use super::symbols;
use super::{Diagnostic, Note, ParseErrorKind, ParseFailure};

/// Lets the rule set ask whether a key is protected at the edited path.
pub trait LockedKeyLookup {
    fn is_locked_key(&self, key: &str) -> bool;
}

impl<F> LockedKeyLookup for F
where
    F: Fn(&str) -> bool,
{
    fn is_locked_key(&self, key: &str) -> bool {
        self(key)
    }
}

/// Lookup for buffers that carry no protected keys.
pub struct NoLockedKeys;

impl LockedKeyLookup for NoLockedKeys {
    fn is_locked_key(&self, _key: &str) -> bool {
        false
    }
}

pub(crate) struct RuleContext<'a> {
    pub scan: BufferScan<'a>,
    pub failure: &'a ParseFailure,
    pub locks: &'a dyn LockedKeyLookup,
}

impl<'a> RuleContext<'a> {
    pub fn line_text(&self) -> Result<&'a str, ScanError> {
        self.scan.line_text(self.failure.line)
    }

    pub fn line_chars(&self) -> Result<Vec<char>, ScanError> {
        Ok(self.line_text()?.chars().collect())
    }

    pub fn char_at_failure(&self) -> Option<char> {
        self.scan.char_at(self.failure.line, self.failure.col)
    }
}

pub(crate) type RuleResult = Result<Option<Diagnostic>, ScanError>;
type Rule = fn(&RuleContext<'_>) -> RuleResult;

const RULES: &[Rule] = &[
    locked_key_handoff,
    typed_comma_list_open,
    unclosed_value_quote,
    missing_key_quote,
    invalid_escape,
    symbols::symbol_rules,
    missing_container_open,
    missing_list_close,
    missing_close_at_eof,
    literal_typo,
    unquoted_scalar,
    extra_top_level_data,
];

static TYPED_COMMA: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^(\s*)"((?:[^"\\]|\\.)*)"\s*:\s*,\s*$"#).expect("typed comma pattern")
});
static KEY_MISSING_CLOSE_QUOTE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^(\s*)"([^":\\]+):"#).expect("key close quote pattern"));
static KEY_MISSING_OPEN_QUOTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^(\s*)([A-Za-z_][^"\s:,{}\[\]]*)"\s*:"#).expect("key open quote pattern")
});
static BARE_KEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^(\s*)([A-Za-z_][A-Za-z0-9_\-\. ]*?)\s*:"#).expect("bare key pattern")
});
static PROPERTY_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*(?:"(?:[^"\\]|\\.)*"|[A-Za-z_][A-Za-z0-9_\-]*)\s*:"#)
        .expect("property line pattern")
});
static LIST_ELEMENT_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*(?:"(?:[^"\\]|\\.)*"|-?\d[\d.eE+\-]*|true|false|null|[A-Za-z_][\w\-.@ ]*)\s*,?\s*$"#)
        .expect("list element pattern")
});

/// Runs the rule set against a parse failure.
///
/// Returns `None` when no rule applies; callers then fall back to
/// [`generic_diagnostic`]. A failure that points outside the buffer yields a
/// `highlight_failed` diagnostic.
pub fn diagnose(
    text: &str,
    failure: &ParseFailure,
    locks: &dyn LockedKeyLookup,
) -> Option<Diagnostic> {
    let ctx = RuleContext {
        scan: BufferScan::new(text),
        failure,
        locks,
    };
    match run_rules(&ctx) {
        Ok(found) => found,
        Err(err) => {
            tracing::debug!(error = %err, note = "highlight_failed", "neighborhood scan failed");
            Some(highlight_failed(&ctx.scan, failure))
        }
    }
}

fn run_rules(ctx: &RuleContext<'_>) -> RuleResult {
    // Surface out-of-range positions before any rule reads the line.
    ctx.line_text()?;
    for rule in RULES {
        if let Some(diagnostic) = rule(ctx)? {
            return Ok(Some(diagnostic));
        }
    }
    Ok(None)
}

/// Fallback when no rule recognizes the failure.
pub fn generic_diagnostic(text: &str, failure: &ParseFailure) -> Diagnostic {
    let scan = BufferScan::new(text);
    let line_text = scan.line_text(failure.line).unwrap_or("");
    Diagnostic::new(
        Note::GenericParseError,
        "Invalid Entry: check the highlighted line.",
        failure.line,
        line_text,
        failure.col,
        failure.col + 1,
        line_text.trim_end(),
    )
}

fn highlight_failed(scan: &BufferScan<'_>, failure: &ParseFailure) -> Diagnostic {
    let line_text = scan.line_text(failure.line).unwrap_or("");
    Diagnostic::new(
        Note::HighlightFailed,
        "Invalid Entry: check the highlighted line.",
        failure.line,
        line_text,
        failure.col.saturating_sub(1),
        failure.col + 1,
        line_text.trim_end(),
    )
}

// ---------------------------------------------------------------------------
// Shared line helpers
// ---------------------------------------------------------------------------

/// Index of the quote closing the string opened at `open`, honoring escapes.
pub(crate) fn closing_quote(chars: &[char], open: usize) -> Option<usize> {
    let mut escaped = false;
    for (index, &ch) in chars.iter().enumerate().skip(open + 1) {
        if escaped {
            escaped = false;
        } else if ch == '\\' {
            escaped = true;
        } else if ch == '"' {
            return Some(index);
        }
    }
    None
}

/// First `:` that sits outside string literals.
pub(crate) fn colon_outside_strings(chars: &[char]) -> Option<usize> {
    let mut index = 0;
    while index < chars.len() {
        match chars[index] {
            '"' => index = closing_quote(chars, index)? + 1,
            ':' => return Some(index),
            _ => index += 1,
        }
    }
    None
}

pub(crate) fn first_non_ws(chars: &[char]) -> usize {
    chars
        .iter()
        .position(|c| !c.is_whitespace())
        .unwrap_or(chars.len())
}

/// Column where the value of a member (or a bare list element) starts.
pub(crate) fn value_start(chars: &[char]) -> usize {
    let from = colon_outside_strings(chars).map_or(0, |colon| colon + 1);
    chars
        .iter()
        .enumerate()
        .skip(from)
        .find(|(_, c)| !c.is_whitespace())
        .map_or(chars.len(), |(index, _)| index)
}

/// `chars[..start] + insert + chars[end..]`, trailing whitespace removed.
pub(crate) fn splice(chars: &[char], start: usize, end: usize, insert: &str) -> String {
    let start = start.min(chars.len());
    let end = end.clamp(start, chars.len());
    let mut out: String = chars[..start].iter().collect();
    out.push_str(insert);
    out.extend(&chars[end..]);
    out.trim_end().to_string()
}

pub(crate) fn trimmed_len(chars: &[char]) -> usize {
    chars
        .iter()
        .rposition(|c| !c.is_whitespace())
        .map_or(0, |index| index + 1)
}

pub(crate) fn is_property_line(line: &str) -> bool {
    PROPERTY_LINE.is_match(line)
}

pub(crate) fn starts_value(ch: char) -> bool {
    matches!(ch, '"' | '{' | '[' | '-' | '0'..='9' | 't' | 'f' | 'n')
}

fn is_value_tail_junk(ch: char) -> bool {
    !(ch.is_alphanumeric() || ch.is_whitespace() || "._-/:+()'&".contains(ch))
}

fn innermost_open(ctx: &RuleContext<'_>, line: usize, col: usize) -> Option<char> {
    ctx.scan.open_stack_before(line, col).last().map(|o| o.ch)
}

fn loose_key(chars: &[char]) -> String {
    let start = first_non_ws(chars);
    let end = chars
        .iter()
        .enumerate()
        .skip(start)
        .find(|(_, c)| **c == ':')
        .map_or(chars.len(), |(index, _)| index);
    chars[start..end]
        .iter()
        .filter(|c| !matches!(c, '"' | '\\' | ','))
        .collect::<String>()
        .trim()
        .to_string()
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

/// 1. A broken quote on a protected key is restored, not repaired.
fn locked_key_handoff(ctx: &RuleContext<'_>) -> RuleResult {
    let kind = ctx.failure.kind;
    let chars = ctx.line_chars()?;
    // An unclosed key swallows its colon; an unclosed value does not.
    let key_error = kind.is_key_quote_error()
        || (matches!(
            kind,
            ParseErrorKind::ControlCharacter | ParseErrorKind::EofWhileParsingString
        ) && colon_outside_strings(&chars).is_none()
            && innermost_open(ctx, ctx.failure.line, 0) == Some('{'));
    if !key_error {
        return Ok(None);
    }
    let key = loose_key(&chars);
    if key.is_empty() || !ctx.locks.is_locked_key(&key) {
        return Ok(None);
    }
    let indent: String = chars[..first_non_ws(&chars)].iter().collect();
    let start = first_non_ws(&chars);
    let end = colon_outside_strings(&chars)
        .or_else(|| chars.iter().position(|c| *c == ':'))
        .unwrap_or(trimmed_len(&chars));
    Ok(Some(Diagnostic::new(
        Note::LockedKeyRestore,
        format!("Protected Field: \"{key}\" cannot be changed; the original key will be restored."),
        ctx.failure.line,
        ctx.line_text()?,
        start,
        end.max(start),
        format!("{indent}\"{key}\":"),
    )))
}

/// 2. `"key":,` where a list was meant.
fn typed_comma_list_open(ctx: &RuleContext<'_>) -> RuleResult {
    let line = ctx.line_text()?;
    let Some(caps) = TYPED_COMMA.captures(line) else {
        return Ok(None);
    };
    let chars: Vec<char> = line.chars().collect();
    let Some(comma) = chars.iter().rposition(|c| *c == ',') else {
        return Ok(None);
    };
    let indent = caps.get(1).map_or("", |m| m.as_str());
    let key = caps.get(2).map_or("", |m| m.as_str());
    Ok(Some(Diagnostic::new(
        Note::MissingListOpenTypedComma,
        "Invalid Entry: start the list with [ after the colon.",
        ctx.failure.line,
        line,
        comma,
        comma + 1,
        format!("{indent}\"{key}\": ["),
    )))
}

/// 3 and 4. A value whose opening quote never closes on its line.
fn unclosed_value_quote(ctx: &RuleContext<'_>) -> RuleResult {
    if !matches!(
        ctx.failure.kind,
        ParseErrorKind::ControlCharacter | ParseErrorKind::EofWhileParsingString
    ) {
        return Ok(None);
    }
    let chars = ctx.line_chars()?;
    let has_colon = colon_outside_strings(&chars).is_some();
    let start = value_start(&chars);
    if chars.get(start) != Some(&'"') || closing_quote(&chars, start).is_some() {
        return Ok(None);
    }
    // A lone unclosed string inside an object is a key problem (rule 5).
    if !has_colon && innermost_open(ctx, ctx.failure.line, start) == Some('{') {
        return Ok(None);
    }

    let content_end = trimmed_len(&chars);
    let tail_end = if content_end > start + 1 && chars[content_end - 1] == ',' {
        content_end - 1
    } else {
        content_end
    };
    let mut junk_start = tail_end;
    while junk_start > start + 1 && is_value_tail_junk(chars[junk_start - 1]) {
        junk_start -= 1;
    }
    let follows = chars.get(tail_end).copied();
    let follows_is_gap = follows.is_none_or(char::is_whitespace);

    if junk_start < tail_end && !follows_is_gap {
        return Ok(Some(Diagnostic::new(
            Note::InvalidValueTail,
            "Invalid Entry: remove the stray characters and close the quote.",
            ctx.failure.line,
            ctx.line_text()?,
            junk_start,
            tail_end,
            splice(&chars, junk_start, tail_end, "\""),
        )));
    }
    Ok(Some(Diagnostic::insertion(
        Note::MissingValueCloseQuote,
        "Invalid Entry: close the quoted value near the highlighted line.",
        ctx.failure.line,
        ctx.line_text()?,
        tail_end,
        splice(&chars, tail_end, tail_end, "\""),
    )))
}

/// 5. Object keys with a missing quote (or no quotes at all).
fn missing_key_quote(ctx: &RuleContext<'_>) -> RuleResult {
    let kind = ctx.failure.kind;
    if !matches!(
        kind,
        ParseErrorKind::KeyMustBeString
            | ParseErrorKind::ExpectedColon
            | ParseErrorKind::ControlCharacter
            | ParseErrorKind::EofWhileParsingString
    ) {
        return Ok(None);
    }
    let line = ctx.line_text()?;
    let chars: Vec<char> = line.chars().collect();
    let indent = first_non_ws(&chars);
    if innermost_open(ctx, ctx.failure.line, indent) != Some('{') {
        return Ok(None);
    }

    if let Some(caps) = KEY_MISSING_CLOSE_QUOTE.captures(line) {
        let key = caps.get(2).map_or("", |m| m.as_str());
        let colon = indent + 1 + key.chars().count();
        return Ok(Some(Diagnostic::insertion(
            Note::MissingKeyCloseQuote,
            "Invalid Entry: close the key with a quote before the colon.",
            ctx.failure.line,
            line,
            colon,
            splice(&chars, colon, colon, "\""),
        )));
    }
    if kind != ParseErrorKind::KeyMustBeString {
        return Ok(None);
    }
    if KEY_MISSING_OPEN_QUOTE.is_match(line) {
        return Ok(Some(Diagnostic::insertion(
            Note::MissingKeyOpenQuote,
            "Invalid Entry: add the opening quote to the key.",
            ctx.failure.line,
            line,
            indent,
            splice(&chars, indent, indent, "\""),
        )));
    }
    if let Some(caps) = BARE_KEY.captures(line) {
        let Some(key) = caps.get(2) else {
            return Ok(None);
        };
        let key_len = key.as_str().chars().count();
        let quoted = format!("\"{}\"", key.as_str());
        return Ok(Some(Diagnostic::new(
            Note::MissingKeyQuotes,
            "Invalid Entry: wrap the key in double quotes.",
            ctx.failure.line,
            line,
            indent,
            indent + key_len,
            splice(&chars, indent, indent + key_len, &quoted),
        )));
    }
    Ok(None)
}

/// 6. Bad backslash escapes, in keys or values.
fn invalid_escape(ctx: &RuleContext<'_>) -> RuleResult {
    if ctx.failure.kind != ParseErrorKind::InvalidEscape {
        return Ok(None);
    }
    let line = ctx.line_text()?;
    let chars: Vec<char> = line.chars().collect();
    let col = ctx.failure.col.min(chars.len());
    let Some(slash) = (col.saturating_sub(2)..=col)
        .rev()
        .find(|&index| chars.get(index) == Some(&'\\'))
    else {
        return Ok(None);
    };
    let first_colon = chars.iter().position(|c| *c == ':');
    let in_key = first_colon.is_none_or(|colon| slash < colon);

    if in_key {
        let next = chars.get(slash + 1).copied();
        let after = if next.is_none_or(|c| c == ':' || c.is_whitespace()) {
            splice(&chars, slash, slash + 1, "\"")
        } else {
            splice(&chars, slash, slash + 1, "")
        };
        return Ok(Some(Diagnostic::new(
            Note::InvalidKeyEscape,
            "Invalid Entry: remove the backslash from the key.",
            ctx.failure.line,
            line,
            slash,
            slash + 1,
            after,
        )));
    }
    Ok(Some(Diagnostic::new(
        Note::InvalidValueEscape,
        "Invalid Entry: escape the backslash as \\\\ or remove it.",
        ctx.failure.line,
        line,
        slash,
        slash + 2,
        splice(&chars, slash, slash + 1, "\\\\"),
    )))
}

/// 8. `"key":` followed by content that was meant to sit in a container.
fn missing_container_open(ctx: &RuleContext<'_>) -> RuleResult {
    if ctx.failure.kind == ParseErrorKind::EofWhileParsingString {
        return Ok(None);
    }
    let scan = &ctx.scan;
    let ends_with_colon = |n: usize| {
        scan.line_text(n)
            .map(|l| l.trim_end().ends_with(':') && PROPERTY_LINE.is_match(l))
            .unwrap_or(false)
    };

    let key_line = if ends_with_colon(ctx.failure.line) {
        Some(ctx.failure.line)
    } else {
        let mut cursor = scan.previous_non_empty_line(ctx.failure.line);
        let mut found = None;
        while let Some(n) = cursor {
            if ends_with_colon(n) {
                found = Some(n);
                break;
            }
            if !LIST_ELEMENT_LINE.is_match(scan.line_text(n)?) {
                break;
            }
            cursor = scan.previous_non_empty_line(n);
        }
        found
    };
    let Some(key_line) = key_line else {
        return Ok(None);
    };
    let Some(next) = scan.next_non_empty_line(key_line) else {
        return Ok(None);
    };
    let next_text = scan.line_text(next)?;
    if next_text.trim_start().starts_with(['{', '[', '}', ']']) {
        return Ok(None);
    }

    let (note, opener, header) = if PROPERTY_LINE.is_match(next_text) {
        (
            Note::MissingObjectOpen,
            "{",
            "Invalid Entry: add { after the key to open the block.",
        )
    } else {
        (
            Note::MissingListOpen,
            "[",
            "Invalid Entry: add [ after the key to open the list.",
        )
    };
    let text = scan.line_text(key_line)?;
    let chars: Vec<char> = text.chars().collect();
    let end = trimmed_len(&chars);
    Ok(Some(Diagnostic::insertion(
        note,
        header,
        key_line,
        text,
        end,
        format!("{} {opener}", text.trim_end()),
    )))
}

/// 9. A list left open when its enclosing block continues or closes.
fn missing_list_close(ctx: &RuleContext<'_>) -> RuleResult {
    let kind = ctx.failure.kind;
    if !(kind.expects_comma()
        || matches!(
            kind,
            ParseErrorKind::ExpectedValue | ParseErrorKind::KeyMustBeString
        ))
    {
        return Ok(None);
    }
    let (line, col) = (ctx.failure.line, ctx.failure.col);
    let stack = ctx.scan.open_stack_before(line, col);
    let Some(innermost) = stack.last().copied() else {
        return Ok(None);
    };
    if innermost.ch != '[' {
        return Ok(None);
    }
    let at_failure = ctx.char_at_failure();
    let line_text = ctx.line_text()?;
    if at_failure != Some('}') && !PROPERTY_LINE.is_match(line_text) {
        return Ok(None);
    }
    if ctx.scan.unmatched_open_bracket_lines('[', ']').is_empty() {
        return Ok(None);
    }
    let Some(point) = ctx.scan.missing_close_insertion_point('[', ']', line, col) else {
        return Ok(None);
    };

    if kind.expects_comma() {
        let list_depth = stack
            .iter()
            .position(|o| *o == point.opener)
            .unwrap_or(stack.len() - 1);
        let eof_depth = ctx.scan.unclosed_openers().len().checked_sub(1);
        if eof_depth.is_some_and(|depth| depth > list_depth) {
            return Ok(None);
        }
    }

    let indent = " ".repeat(ctx.scan.indent_of(point.opener.line));
    let sibling_is_closer = ctx
        .scan
        .next_non_empty_line(point.line)
        .and_then(|n| ctx.scan.line_text(n).ok())
        .is_some_and(|l| l.trim_start().starts_with(['}', ']']));
    let closer = if sibling_is_closer { "]" } else { "]," };
    let anchor = ctx.scan.line_text(point.line)?;
    let after = if anchor.trim().is_empty() {
        format!("{indent}{closer}")
    } else {
        format!("{}\n{indent}{closer}", anchor.trim_end())
    };
    Ok(Some(Diagnostic::insertion(
        Note::MissingListClose,
        "Invalid Entry: close the list with ] before the block ends.",
        point.line,
        anchor,
        point.col,
        after,
    )))
}

/// 10. Unclosed block or list at the end of the buffer.
fn missing_close_at_eof(ctx: &RuleContext<'_>) -> RuleResult {
    let kind = ctx.failure.kind;
    if !(kind.is_eof() || kind.expects_comma()) || ctx.scan.bracket_balance() <= 0 {
        return Ok(None);
    }
    let Some(opener) = ctx.scan.unclosed_openers().last().copied() else {
        return Ok(None);
    };
    let Some(closer) = closer_for(opener.ch) else {
        return Ok(None);
    };
    let Some(last) = ctx.scan.last_non_empty_line() else {
        return Ok(None);
    };
    let text = ctx.scan.line_text(last)?;
    let indent = " ".repeat(ctx.scan.indent_of(opener.line));
    let (note, header) = if closer == '}' {
        (
            Note::MissingObjectCloseEof,
            "Invalid Entry: add } at the end to close the block.",
        )
    } else {
        (
            Note::MissingListCloseEof,
            "Invalid Entry: add ] at the end to close the list.",
        )
    };
    Ok(Some(Diagnostic::insertion(
        note,
        header,
        last,
        text,
        text.chars().count(),
        format!("{}\n{indent}{closer}", text.trim_end()),
    )))
}

pub(crate) const LITERALS: [&str; 3] = ["true", "false", "null"];

/// Bare words on the line that sit outside string literals, as char ranges.
fn barewords(chars: &[char]) -> Vec<(usize, usize)> {
    let mut out = Vec::new();
    let mut index = 0;
    while index < chars.len() {
        let ch = chars[index];
        if ch == '"' {
            match closing_quote(chars, index) {
                Some(close) => index = close + 1,
                None => break,
            }
        } else if ch.is_alphabetic() {
            let start = index;
            while index < chars.len() && (chars[index].is_alphanumeric() || chars[index] == '_') {
                index += 1;
            }
            out.push((start, index));
        } else {
            index += 1;
        }
    }
    out
}

/// 11. `tru`, `flase`, `nul`, `True` and friends.
fn literal_typo(ctx: &RuleContext<'_>) -> RuleResult {
    if !matches!(
        ctx.failure.kind,
        ParseErrorKind::ExpectedIdent | ParseErrorKind::ExpectedValue
    ) {
        return Ok(None);
    }
    let chars = ctx.line_chars()?;
    let col = ctx.failure.col;
    let nearest = barewords(&chars).into_iter().min_by_key(|&(start, end)| {
        if (start..=end).contains(&col) {
            0
        } else {
            start.abs_diff(col).min(end.abs_diff(col))
        }
    });
    let Some((start, end)) = nearest else {
        return Ok(None);
    };
    let word: String = chars[start..end].iter().collect();
    let lower = word.to_lowercase();
    let Some(literal) = LITERALS.iter().find(|lit| {
        lower == **lit || (lower.len() >= 3 && strsim::damerau_levenshtein(&lower, lit) <= 1)
    }) else {
        return Ok(None);
    };
    Ok(Some(Diagnostic::new(
        Note::LiteralTypo,
        format!("Invalid Entry: did you mean {literal}?"),
        ctx.failure.line,
        ctx.line_text()?,
        start,
        end,
        splice(&chars, start, end, literal),
    )))
}

fn is_separator(ch: char) -> bool {
    ch.is_whitespace() || matches!(ch, ',' | ':' | '[' | '{' | '}' | ']')
}

/// 12. A text value typed without quotes.
fn unquoted_scalar(ctx: &RuleContext<'_>) -> RuleResult {
    if !matches!(
        ctx.failure.kind,
        ParseErrorKind::ExpectedValue | ParseErrorKind::ExpectedIdent
    ) {
        return Ok(None);
    }
    let chars = ctx.line_chars()?;
    let mut start = ctx.failure.col.min(chars.len());
    while start > 0 && !is_separator(chars[start - 1]) {
        start -= 1;
    }
    while start < chars.len() && chars[start].is_whitespace() {
        start += 1;
    }
    if start >= chars.len() || matches!(chars[start], '"' | '{' | '[' | ',' | '}' | ']') {
        return Ok(None);
    }
    let mut end = start;
    while end < chars.len() && !matches!(chars[end], ',' | '}' | ']') {
        end += 1;
    }
    while end > start && chars[end - 1].is_whitespace() {
        end -= 1;
    }
    let token: String = chars[start..end].iter().collect();
    if token.is_empty()
        || LITERALS.contains(&token.as_str())
        || token.parse::<f64>().is_ok()
    {
        return Ok(None);
    }
    if let Some(stripped) = token.strip_suffix('"') {
        if !stripped.contains('"') {
            return Ok(Some(Diagnostic::insertion(
                Note::MissingValueOpenQuote,
                "Invalid Entry: add the opening quote to the value.",
                ctx.failure.line,
                ctx.line_text()?,
                start,
                splice(&chars, start, start, "\""),
            )));
        }
        return Ok(None);
    }
    let quoted = format!("\"{}\"", token.replace('"', "\\\""));
    Ok(Some(Diagnostic::new(
        Note::MissingValueOpenQuote,
        "Invalid Entry: wrap the text value in double quotes.",
        ctx.failure.line,
        ctx.line_text()?,
        start,
        end,
        splice(&chars, start, end, &quoted),
    )))
}

/// 13. More than one top-level value.
fn extra_top_level_data(ctx: &RuleContext<'_>) -> RuleResult {
    if ctx.failure.kind != ParseErrorKind::TrailingCharacters {
        return Ok(None);
    }
    let Some(first) = ctx.scan.first_non_empty_line() else {
        return Ok(None);
    };
    let text = ctx.scan.line_text(first)?;
    let chars: Vec<char> = text.chars().collect();
    let indent = first_non_ws(&chars);
    let container_top = matches!(chars.get(indent), Some('{') | Some('['));
    let (note, opener, header) = if !container_top && PROPERTY_LINE.is_match(text) {
        (
            Note::ExtraDataMissingObjectOpen,
            "{",
            "Invalid Entry: wrap the entries in { } to form one block.",
        )
    } else {
        (
            Note::ExtraDataMissingListOpen,
            "[",
            "Invalid Entry: wrap the entries in [ ] to form one list.",
        )
    };
    Ok(Some(Diagnostic::insertion(
        note,
        header,
        first,
        text,
        indent,
        splice(&chars, indent, indent, opener),
    )))
}

#[cfg(test)]
mod tests {
    use super::{NoLockedKeys, diagnose, generic_diagnostic};
    use crate::diagnostics::{Diagnostic, Note, ParseFailure};

    fn run(text: &str) -> Option<Diagnostic> {
        let failure = ParseFailure::parse(text).expect_err("text should be invalid");
        diagnose(text, &failure, &NoLockedKeys)
    }

    fn expect_note(text: &str, note: Note) -> Diagnostic {
        let diag = run(text).unwrap_or_else(|| panic!("no diagnostic for {text:?}"));
        assert_eq!(diag.note, note, "unexpected diagnostic {diag:?}");
        diag
    }

    #[test]
    fn valid_close_produces_no_failure() {
        let text = "{\n  \"user\": {\n    \"name\": \"alice\"\n  }\n}";
        assert!(ParseFailure::parse(text).is_ok());
    }

    #[test]
    fn unclosed_value_quote_inserts_before_comma() {
        let text = "{\n\"name\": \"x\",\n\"url\": \"hackhub.net,\n\"port\": 80\n}";
        let diag = expect_note(text, Note::MissingValueCloseQuote);
        assert_eq!(diag.line, 3);
        assert!(diag.insertion_only());
        assert_eq!(diag.start_col, "\"url\": \"hackhub.net".chars().count());
        assert_eq!(diag.before, "\"url\": \"hackhub.net,");
        assert_eq!(diag.after, "\"url\": \"hackhub.net\",");
    }

    #[test]
    fn unclosed_value_with_junk_tail_marks_the_junk() {
        let text = "{\n  \"mail\": \"value@,\n  \"x\": 1\n}";
        let diag = expect_note(text, Note::InvalidValueTail);
        assert_eq!((diag.start_col, diag.end_col), (16, 17));
        assert_eq!(diag.after, "  \"mail\": \"value\",");
    }

    #[test]
    fn unclosed_value_at_end_of_line_prefers_insertion() {
        let text = "{\n  \"x\": 1,\n  \"mail\": \"value@\n}";
        let diag = expect_note(text, Note::MissingValueCloseQuote);
        assert_eq!(diag.after, "  \"mail\": \"value@\"");
    }

    #[test]
    fn typed_comma_suggests_list_open() {
        let text = "{\n  \"items\":,\n    1\n  ]\n}";
        let diag = expect_note(text, Note::MissingListOpenTypedComma);
        assert_eq!(diag.after, "  \"items\": [");
        assert_eq!((diag.start_col, diag.end_col), (10, 11));
    }

    #[test]
    fn key_missing_close_quote() {
        let text = "{\n  \"name: \"alice\"\n}";
        let diag = expect_note(text, Note::MissingKeyCloseQuote);
        assert_eq!(diag.after, "  \"name\": \"alice\"");
        assert!(diag.insertion_only());
    }

    #[test]
    fn key_missing_open_quote_pins_first_column() {
        let text = "{\n  name\": \"alice\"\n}";
        let diag = expect_note(text, Note::MissingKeyOpenQuote);
        assert_eq!(diag.start_col, 2);
        assert_eq!(diag.after, "  \"name\": \"alice\"");
    }

    #[test]
    fn bare_key_is_quoted() {
        let text = "{\n  name: \"alice\"\n}";
        let diag = expect_note(text, Note::MissingKeyQuotes);
        assert_eq!(diag.after, "  \"name\": \"alice\"");
    }

    #[test]
    fn backslash_typed_for_key_quote() {
        let text = "{\n  \"name\\: \"alice\"\n}";
        let diag = expect_note(text, Note::InvalidKeyEscape);
        assert_eq!(diag.after, "  \"name\": \"alice\"");
    }

    #[test]
    fn missing_object_open_after_key() {
        let text = "{\n  \"Bank\":\n    \"owner\": \"x\"\n  }\n}";
        let diag = expect_note(text, Note::MissingObjectOpen);
        assert_eq!(diag.line, 2);
        assert_eq!(diag.after, "  \"Bank\": {");
    }

    #[test]
    fn missing_list_open_after_key() {
        let text = "{\n  \"items\":\n    1,\n    2\n  ],\n  \"x\": 1\n}";
        let diag = expect_note(text, Note::MissingListOpen);
        assert_eq!(diag.line, 2);
        assert_eq!(diag.after, "  \"items\": [");
    }

    #[test]
    fn list_left_open_before_object_close() {
        let text = "{\n  \"a\": [\n    1,\n    2\n}";
        let diag = expect_note(text, Note::MissingListClose);
        assert_eq!(diag.line, 4);
        assert!(diag.insertion_only());
        assert_eq!(diag.after, "    2\n  ]");
    }

    #[test]
    fn missing_object_close_at_eof() {
        let text = "{\n  \"a\": 1,\n  \"b\": 2\n";
        let diag = expect_note(text, Note::MissingObjectCloseEof);
        assert_eq!(diag.line, 3);
        assert_eq!(diag.start_col, 8);
        assert_eq!(diag.after, "  \"b\": 2\n}");
    }

    #[test]
    fn boolean_typo_is_corrected() {
        let diag = expect_note("{\n  \"on\": flase\n}", Note::LiteralTypo);
        assert_eq!(diag.after, "  \"on\": false");
        let diag = expect_note("{\n  \"on\": tru,\n  \"x\": 1\n}", Note::LiteralTypo);
        assert_eq!(diag.after, "  \"on\": true,");
    }

    #[test]
    fn unquoted_scalar_in_array() {
        let text = "{\n  \"hosts\": [\n    \"a\",\n  hackhub,\n    \"b\"\n  ]\n}";
        let diag = expect_note(text, Note::MissingValueOpenQuote);
        assert_eq!(diag.line, 4);
        assert_eq!(diag.after, "  \"hackhub\",");
        assert_eq!((diag.start_col, diag.end_col), (2, 9));
    }

    #[test]
    fn extra_top_level_members_want_object_open() {
        let text = "\"a\": 1,\n\"b\": 2";
        let diag = expect_note(text, Note::ExtraDataMissingObjectOpen);
        assert_eq!(diag.after, "{\"a\": 1,");
    }

    #[test]
    fn extra_top_level_scalars_want_list_open() {
        let diag = expect_note("1, 2, 3", Note::ExtraDataMissingListOpen);
        assert_eq!(diag.after, "[1, 2, 3");
    }

    #[test]
    fn diagnostics_are_deterministic() {
        let text = "{\n  \"a\": [1, 2}\n";
        assert_eq!(run(text), run(text));
    }

    #[test]
    fn locked_key_quote_error_hands_off_to_restore() {
        let text = "{\n  accounts: []\n}";
        let failure = ParseFailure::parse(text).expect_err("bare key");
        let is_locked = |key: &str| key == "accounts";
        let diag = diagnose(text, &failure, &is_locked).expect("diagnostic");
        assert_eq!(diag.note, Note::LockedKeyRestore);
    }

    #[test]
    fn out_of_range_failure_reports_highlight_failed() {
        let failure = ParseFailure {
            kind: crate::diagnostics::ParseErrorKind::Other,
            message: "truncated".to_string(),
            line: 9,
            col: 3,
        };
        let diag = diagnose("{", &failure, &NoLockedKeys).expect("diagnostic");
        assert_eq!(diag.note, Note::HighlightFailed);
        assert_eq!((diag.start_col, diag.end_col), (0, 0));
    }

    #[test]
    fn generic_fallback_spans_reported_column() {
        let text = "{\"a\": 1e}";
        let failure = ParseFailure::parse(text).expect_err("bad number");
        let diag = generic_diagnostic(text, &failure);
        assert_eq!(diag.note, Note::GenericParseError);
        assert!(diag.end_col <= text.chars().count());
    }
}
