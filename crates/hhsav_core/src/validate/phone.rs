use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use super::ValidationInput;
use crate::diagnostics::rules::splice;
use crate::diagnostics::{Diagnostic, Note};
use crate::document::nearest_key;

const PHONE_KEYS: [&str; 6] = ["phone", "phone_number", "mobile", "cell", "tel", "telephone"];

static PHONE_MEMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)^\s*"(?:phone|phone_number|mobile|cell|tel|telephone)"\s*:\s*("(?:[^"\\]|\\.)*"|[0-9][0-9.\-\s()+]*[0-9]|[0-9])"#,
    )
    .expect("phone member pattern")
});

pub(super) fn check(input: &ValidationInput<'_>) -> Option<Diagnostic> {
    for (index, line) in input.text.split('\n').enumerate() {
        let Some(value) = PHONE_MEMBER.captures(line).and_then(|caps| caps.get(1)) else {
            continue;
        };
        let col = line[..value.start()].chars().count();
        if let Some(diagnostic) = check_value(index + 1, line, col, value.as_str()) {
            return Some(diagnostic);
        }
    }

    // A phone scalar selected on its own renders without its key.
    let key = nearest_key(input.path)?;
    if !PHONE_KEYS.iter().any(|k| k.eq_ignore_ascii_case(key)) {
        return None;
    }
    if !matches!(input.value, Value::String(_) | Value::Number(_)) {
        return None;
    }
    let line = input.text.split('\n').find(|l| !l.trim().is_empty())?;
    let line_no = input.text.split('\n').position(|l| !l.trim().is_empty())? + 1;
    let col = line.chars().take_while(|c| c.is_whitespace()).count();
    check_value(line_no, line, col, line.trim())
}

fn check_value(line_no: usize, line: &str, col: usize, raw: &str) -> Option<Diagnostic> {
    let inner = raw
        .strip_prefix('"')
        .and_then(|r| r.strip_suffix('"'))
        .unwrap_or(raw);
    if inner.trim().is_empty() {
        return None;
    }
    let digits: String = inner.chars().filter(char::is_ascii_digit).collect();
    let width = raw.chars().count();
    if digits.len() != 10 {
        return Some(Diagnostic::new(
            Note::InvalidPhoneLength,
            "Invalid Entry: a phone number needs exactly 10 digits.",
            line_no,
            line,
            col,
            col + width,
            line.trim_end(),
        ));
    }
    let formatted = format!("{}-{}-{}", &digits[..3], &digits[3..6], &digits[6..]);
    if inner == formatted {
        return None;
    }
    let chars: Vec<char> = line.chars().collect();
    Some(Diagnostic::new(
        Note::InvalidPhoneFormat,
        "Invalid Entry: write the phone number as DDD-DDD-DDDD.",
        line_no,
        line,
        col,
        col + width,
        splice(&chars, col, col + width, &format!("\"{formatted}\"")),
    ))
}
