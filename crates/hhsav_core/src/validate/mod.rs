//! Semantic checks that run once the buffer parses.
//!
//! Validators are tried in order and the first violation wins, so a spacing
//! problem always shadows email and phone findings for the same commit.

mod email;
mod phone;
mod spacing;

use serde_json::Value;

use crate::diagnostics::{Diagnostic, DiagnosticAction};
use crate::document::path::DocPath;

pub use email::KNOWN_EMAIL_DOMAINS;

/// What a validator sees: the edited path, the raw buffer and its parsed value.
#[derive(Debug, Clone, Copy)]
pub struct ValidationInput<'a> {
    pub path: &'a DocPath,
    pub text: &'a str,
    pub value: &'a Value,
}

type Validator = fn(&ValidationInput<'_>) -> Option<Diagnostic>;

const VALIDATORS: &[(&str, Validator)] = &[
    ("spacing", spacing::check),
    ("email", email::check),
    ("phone", phone::check),
];

/// Returns the first semantic violation, with popover actions attached.
pub fn validate(input: &ValidationInput<'_>) -> Option<Diagnostic> {
    for (name, validator) in VALIDATORS {
        if let Some(diagnostic) = validator(input) {
            tracing::debug!(
                validator = name,
                note = %diagnostic.note,
                line = diagnostic.line,
                "semantic violation"
            );
            let actions = if diagnostic.after != diagnostic.before {
                vec![DiagnosticAction::AutoFix, DiagnosticAction::Continue]
            } else {
                vec![DiagnosticAction::Continue]
            };
            return Some(diagnostic.with_actions(actions));
        }
    }
    None
}

/// Finds the line holding `encoded` (a JSON-encoded scalar), preferring a
/// line where it follows the member `key`. Returns `(line, char column)`.
pub(crate) fn locate_member_line(
    text: &str,
    key: Option<&str>,
    encoded: &str,
) -> Option<(usize, usize)> {
    let encoded_key = key.and_then(|k| serde_json::to_string(k).ok());
    let mut fallback = None;
    for (index, line) in text.split('\n').enumerate() {
        let Some(byte) = line.find(encoded) else {
            continue;
        };
        let col = line[..byte].chars().count();
        let keyed = encoded_key
            .as_deref()
            .is_none_or(|k| line[..byte].contains(k));
        if keyed {
            return Some((index + 1, col));
        }
        fallback.get_or_insert((index + 1, col));
    }
    fallback
}
