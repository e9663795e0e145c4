use std::sync::LazyLock;

use regex::Regex;

use super::ValidationInput;
use crate::diagnostics::rules::splice;
use crate::diagnostics::{Diagnostic, Note};

static STRING_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""(?:[^"\\]|\\.)*""#).expect("string pattern"));

/// Byte offset of the first character glued to a member colon on `line`.
///
/// Strings are consumed whole, so colons inside keys or values never match.
fn glued_member_value(line: &str) -> Option<usize> {
    STRING_TOKEN.find_iter(line).find_map(|token| {
        let rest = line[token.end()..].strip_prefix(':')?;
        let follower = rest.chars().next()?;
        (!follower.is_whitespace()).then_some(token.end() + 1)
    })
}

/// Every member needs one space after its colon.
pub(super) fn check(input: &ValidationInput<'_>) -> Option<Diagnostic> {
    for (index, line) in input.text.split('\n').enumerate() {
        let Some(follower) = glued_member_value(line) else {
            continue;
        };
        let col = line[..follower].chars().count();
        let chars: Vec<char> = line.chars().collect();
        return Some(Diagnostic::insertion(
            Note::SpacingAfterColon,
            "Invalid Entry: add one space after the colon.",
            index + 1,
            line,
            col,
            splice(&chars, col, col, " "),
        ));
    }
    None
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::check;
    use crate::diagnostics::Note;
    use crate::document::path::DocPath;
    use crate::validate::ValidationInput;

    #[test]
    fn reports_first_member_missing_a_space() {
        let text = "{\n  \"a\": 1,\n  \"b\":2,\n  \"c\":3\n}";
        let value = json!({"a": 1, "b": 2, "c": 3});
        let path = DocPath::root();
        let diag = check(&ValidationInput {
            path: &path,
            text,
            value: &value,
        })
        .expect("violation");
        assert_eq!(diag.note, Note::SpacingAfterColon);
        assert_eq!(diag.line, 3);
        assert_eq!(diag.start_col, 6);
        assert!(diag.insertion_only());
        assert_eq!(diag.after, "  \"b\": 2,");
    }

    fn run(text: &str) -> Option<crate::diagnostics::Diagnostic> {
        let path = DocPath::root();
        check(&ValidationInput {
            path: &path,
            text,
            value: &json!(null),
        })
    }

    #[test]
    fn later_members_on_a_line_are_checked() {
        let diag = run("{\"name\": \"Bob\",\"email\":\"bob@gmail.com\"}").expect("violation");
        assert_eq!(diag.line, 1);
        assert_eq!(diag.start_col, 23);
        assert_eq!(diag.after, "{\"name\": \"Bob\",\"email\": \"bob@gmail.com\"}");

        let diag = run("{\"name\":\"Bob\",\"email\":\"bob@gmail.com\"}").expect("violation");
        assert_eq!(diag.start_col, 8);
        assert_eq!(diag.after, "{\"name\": \"Bob\",\"email\":\"bob@gmail.com\"}");
    }

    #[test]
    fn members_nested_inline_are_checked() {
        let diag = run("{\n  \"a\": {\"b\":1}\n}").expect("violation");
        assert_eq!(diag.line, 2);
        assert_eq!(diag.start_col, 12);
        assert_eq!(diag.after, "  \"a\": {\"b\": 1}");
    }

    #[test]
    fn quoted_colons_and_escapes_are_skipped() {
        assert!(run("{\"a\": \"x\\\":y\", \"b\": \"k:v\"}").is_none());
        assert!(run("{\n  \"a\":\n    1\n}").is_none());
    }

    #[test]
    fn colons_inside_values_are_ignored() {
        let text = "{\n  \"url\": \"http://x\"\n}";
        let value = json!({"url": "http://x"});
        let path = DocPath::root();
        assert!(
            check(&ValidationInput {
                path: &path,
                text,
                value: &value,
            })
            .is_none()
        );
    }
}
