use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use super::{ValidationInput, locate_member_line};
use crate::diagnostics::rules::splice;
use crate::diagnostics::scan::BufferScan;
use crate::diagnostics::{Diagnostic, Note};
use crate::document::path::{DocPath, PathSegment};

/// Mail providers the game knows about.
pub const KNOWN_EMAIL_DOMAINS: [&str; 10] = [
    "gmail.com",
    "outlook.com",
    "hotmail.com",
    "yahoo.com",
    "icloud.com",
    "proton.me",
    "protonmail.com",
    "aol.com",
    "live.com",
    "hackhub.net",
];

const COMMON_TLDS: [&str; 10] = [
    "com", "net", "org", "io", "me", "co", "uk", "de", "edu", "gov",
];

/// Largest edit distance still treated as a misspelled known domain.
const DOMAIN_NEAR_MISS: usize = 2;

static LOCAL_PART: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9._%+\-]+$").expect("local part pattern"));
static DOMAIN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?\.)+[A-Za-z]{2,}$")
        .expect("domain pattern")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum EmailProblem {
    MissingAt { suggestion: Option<String> },
    InvalidFormat { suggestion: Option<String> },
    UnknownDomain { suggestion: String },
}

pub(super) fn check(input: &ValidationInput<'_>) -> Option<Diagnostic> {
    let mut strings = Vec::new();
    collect_strings(input.value, input.path.clone(), &mut strings);
    strings.into_iter().find_map(|(path, raw)| {
        if !is_email_field(&path, raw) {
            return None;
        }
        let problem = check_address(raw)?;
        let key = path.segments().iter().rev().find_map(PathSegment::as_key);
        Some(diagnostic_for(input.text, key, raw, problem))
    })
}

fn collect_strings<'v>(value: &'v Value, path: DocPath, out: &mut Vec<(DocPath, &'v str)>) {
    match value {
        Value::String(s) => out.push((path, s.as_str())),
        Value::Array(items) => {
            for (index, item) in items.iter().enumerate() {
                collect_strings(item, path.child(index), out);
            }
        }
        Value::Object(map) => {
            for (key, item) in map {
                collect_strings(item, path.child(key.as_str()), out);
            }
        }
        _ => {}
    }
}

fn is_email_field(path: &DocPath, raw: &str) -> bool {
    let mut keys = path
        .segments()
        .iter()
        .rev()
        .filter_map(PathSegment::as_key)
        .map(str::to_ascii_lowercase);
    let (Some(last), parent) = (keys.next(), keys.next()) else {
        return false;
    };
    match last.as_str() {
        "email" => true,
        "address" | "value" => parent.as_deref() == Some("email"),
        "from" | "to" => looks_like_address(raw),
        _ => false,
    }
}

fn looks_like_address(raw: &str) -> bool {
    let lower = raw.trim().to_ascii_lowercase();
    !lower.contains(char::is_whitespace)
        && (lower.contains('@') || KNOWN_EMAIL_DOMAINS.iter().any(|d| lower.ends_with(d)))
}

/// Classifies a single address. Empty values are left alone.
pub(crate) fn check_address(raw: &str) -> Option<EmailProblem> {
    let address = raw.trim();
    if address.is_empty() {
        return None;
    }
    let at_count = address.matches('@').count();
    if at_count == 0 {
        return Some(EmailProblem::MissingAt {
            suggestion: suggest_missing_at(address),
        });
    }
    let at = address.rfind('@')?;
    let mut local = address[..at].to_string();
    let domain = &address[at + 1..];
    let mut malformed = at_count > 1;
    if at_count > 1 {
        local = local.replace('@', "");
    }
    if !LOCAL_PART.is_match(&local) {
        malformed = true;
        local.retain(|c| c.is_ascii_alphanumeric() || "._%+-".contains(c));
    }
    if !DOMAIN.is_match(domain) {
        let suggestion = if local.is_empty() {
            None
        } else {
            repair_domain(&local, domain)
        };
        return Some(EmailProblem::InvalidFormat { suggestion });
    }
    if malformed {
        let suggestion = (!local.is_empty()).then(|| format!("{local}@{domain}"));
        return Some(EmailProblem::InvalidFormat { suggestion });
    }
    let lower = domain.to_ascii_lowercase();
    if KNOWN_EMAIL_DOMAINS.contains(&lower.as_str()) {
        return None;
    }
    nearest_known_domain(&lower).map(|known| EmailProblem::UnknownDomain {
        suggestion: format!("{local}@{known}"),
    })
}

/// `alicegmail.com` → `alice@gmail.com`; `foo.bar.com` → `foo@bar.com`.
fn suggest_missing_at(address: &str) -> Option<String> {
    let lower = address.to_ascii_lowercase();
    for (index, _) in address.char_indices().skip(1) {
        if !KNOWN_EMAIL_DOMAINS.contains(&&lower[index..]) {
            continue;
        }
        let head = &address[..index];
        let head = head.strip_suffix('.').unwrap_or(head);
        if !head.is_empty() {
            return Some(format!("{head}@{}", &address[index..]));
        }
    }
    let dot = address.find('.')?;
    let (head, rest) = (&address[..dot], &address[dot + 1..]);
    (!head.is_empty() && DOMAIN.is_match(rest)).then(|| format!("{head}@{rest}"))
}

fn repair_domain(local: &str, domain: &str) -> Option<String> {
    let lower = domain.to_ascii_lowercase();
    if lower.contains('.') {
        return nearest_known_domain(&lower).map(|known| format!("{local}@{known}"));
    }
    if COMMON_TLDS.contains(&lower.as_str()) {
        return split_local_and_sld(local, &lower);
    }
    split_sld_and_tld(&lower).map(|fixed| format!("{local}@{fixed}"))
}

/// The second-level domain slipped into the local part: `alicegmail@com`.
fn split_local_and_sld(local: &str, tld: &str) -> Option<String> {
    local.char_indices().skip(1).find_map(|(index, _)| {
        let candidate = format!("{}.{tld}", local[index..].to_ascii_lowercase());
        KNOWN_EMAIL_DOMAINS
            .contains(&candidate.as_str())
            .then(|| format!("{}@{candidate}", &local[..index]))
    })
}

/// A dot went missing in the domain: `gmailcom` → `gmail.com`.
fn split_sld_and_tld(domain: &str) -> Option<String> {
    let mut best: Option<(u8, String)> = None;
    for (index, _) in domain.char_indices().skip(1) {
        let (sld, tld) = domain.split_at(index);
        let candidate = format!("{sld}.{tld}");
        let score = if KNOWN_EMAIL_DOMAINS.contains(&candidate.as_str()) {
            3
        } else if COMMON_TLDS.contains(&tld) {
            2
        } else {
            0
        };
        if score > best.as_ref().map_or(0, |(s, _)| *s) {
            best = Some((score, candidate));
        }
    }
    best.map(|(_, candidate)| candidate)
}

fn nearest_known_domain(domain: &str) -> Option<&'static str> {
    KNOWN_EMAIL_DOMAINS
        .iter()
        .map(|known| (strsim::damerau_levenshtein(domain, known), *known))
        .filter(|(distance, _)| (1..=DOMAIN_NEAR_MISS).contains(distance))
        .min_by_key(|(distance, _)| *distance)
        .map(|(_, known)| known)
}

fn diagnostic_for(text: &str, key: Option<&str>, raw: &str, problem: EmailProblem) -> Diagnostic {
    let encoded = serde_json::to_string(raw).unwrap_or_else(|_| format!("\"{raw}\""));
    let (line, col) = locate_member_line(text, key, &encoded).unwrap_or((1, 0));
    let scan = BufferScan::new(text);
    let line_text = scan.line_text(line).unwrap_or("");
    let chars: Vec<char> = line_text.chars().collect();
    let width = encoded.chars().count();

    let (note, header, suggestion) = match problem {
        EmailProblem::MissingAt { suggestion } => (
            Note::MissingEmailAt,
            "Invalid Entry: add @ to the email address.".to_string(),
            suggestion,
        ),
        EmailProblem::InvalidFormat { suggestion } => (
            Note::InvalidEmailFormat,
            "Invalid Entry: fix the email address format.".to_string(),
            suggestion,
        ),
        EmailProblem::UnknownDomain { suggestion } => {
            let domain = suggestion.rsplit('@').next().unwrap_or_default().to_string();
            (
                Note::UnknownEmailDomain,
                format!("Invalid Entry: did you mean {domain}?"),
                Some(suggestion),
            )
        }
    };
    let after = match suggestion.and_then(|s| serde_json::to_string(&s).ok()) {
        Some(fixed) => splice(&chars, col, col + width, &fixed),
        None => line_text.trim_end().to_string(),
    };
    Diagnostic::new(
        note,
        header,
        line,
        line_text,
        col + 1,
        (col + width).saturating_sub(1),
        after,
    )
}
