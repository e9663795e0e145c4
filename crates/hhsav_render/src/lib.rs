use std::fmt::Write as _;

use hhsav_core::diagnostics::Diagnostic;
use hhsav_core::document::{group_members, group_names};
use hhsav_core::search::{MatchKind, SearchHit};
use hhsav_core::{
    CoreError, DocPath, EditOutcome, LockPolicyEngine, LockViolation, SaveDocument, TreePath,
};
use serde_json::{Map as JsonMap, Value as JsonValue};

const SCALAR_SUMMARY_WIDTH: usize = 48;
const PROTECTED_MARKER: &str = "  (protected)";
const TREE_INDENT: &str = "  ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowKind {
    Map,
    Sequence,
    Scalar,
    /// Virtual row bucketing sequence items by their `type` field.
    Group,
}

impl RowKind {
    pub fn as_str(&self) -> &'static str {
        match *self {
            Self::Map => "map",
            Self::Sequence => "sequence",
            Self::Scalar => "scalar",
            Self::Group => "group",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeRow {
    pub path: TreePath,
    pub depth: usize,
    pub label: String,
    pub kind: RowKind,
    pub summary: String,
    /// The row's key is one a lock policy tags for its parent.
    pub protected: bool,
}

impl TreeRow {
    pub fn is_editable(&self) -> bool {
        self.path.is_editable()
    }
}

/// Flattens the document into display rows, depth first in document order.
///
/// Sequences whose items all carry a string `type` get one virtual group row
/// per distinct type; their members hang under the group row.
pub fn tree_rows(root: &JsonValue, engine: &LockPolicyEngine) -> Vec<TreeRow> {
    let mut rows = Vec::new();
    push_children(&mut rows, root, &DocPath::root(), 0, engine);
    rows
}

fn push_children(
    rows: &mut Vec<TreeRow>,
    value: &JsonValue,
    path: &DocPath,
    depth: usize,
    engine: &LockPolicyEngine,
) {
    match value {
        JsonValue::Object(map) => {
            let protected_keys = engine.highlight_keys_for(path);
            for (key, child) in map {
                let protected = protected_keys.iter().any(|k| k.eq_ignore_ascii_case(key));
                push_node(rows, child, path.child(key.as_str()), key.clone(), depth, protected, engine);
            }
        }
        JsonValue::Array(items) => {
            let groups = group_names(value);
            if groups.is_empty() {
                for (index, child) in items.iter().enumerate() {
                    push_node(rows, child, path.child(index), index.to_string(), depth, false, engine);
                }
                return;
            }
            for name in groups {
                let members = group_members(value, &name);
                rows.push(TreeRow {
                    path: TreePath::Group {
                        parent: path.clone(),
                        name: name.clone(),
                    },
                    depth,
                    label: format!("<{name}>"),
                    kind: RowKind::Group,
                    summary: plural(members.len(), "item"),
                    protected: false,
                });
                for (index, member) in members {
                    push_node(rows, member, path.child(index), index.to_string(), depth + 1, false, engine);
                }
            }
        }
        _ => {}
    }
}

fn push_node(
    rows: &mut Vec<TreeRow>,
    value: &JsonValue,
    path: DocPath,
    label: String,
    depth: usize,
    protected: bool,
    engine: &LockPolicyEngine,
) {
    let (kind, summary) = match value {
        JsonValue::Object(map) => (RowKind::Map, format!("{{{}}}", map.len())),
        JsonValue::Array(items) => (RowKind::Sequence, format!("[{}]", items.len())),
        scalar => (RowKind::Scalar, fit_column(&scalar.to_string(), SCALAR_SUMMARY_WIDTH)),
    };
    rows.push(TreeRow {
        path: TreePath::Node(path.clone()),
        depth,
        label,
        kind,
        summary,
        protected,
    });
    push_children(rows, value, &path, depth + 1, engine);
}

pub fn render_tree_text(rows: &[TreeRow]) -> String {
    let mut out = String::new();
    for row in rows {
        let marker = if row.protected { PROTECTED_MARKER } else { "" };
        writeln!(
            out,
            "{}{}: {}{}",
            TREE_INDENT.repeat(row.depth),
            row.label,
            row.summary,
            marker
        )
        .expect("writing to String cannot fail");
    }
    out
}

pub fn render_tree_json(rows: &[TreeRow]) -> JsonValue {
    JsonValue::Array(
        rows.iter()
            .map(|row| {
                let mut out = JsonMap::new();
                out.insert("path".to_string(), JsonValue::String(row.path.label()));
                out.insert("depth".to_string(), JsonValue::from(row.depth));
                out.insert("label".to_string(), JsonValue::String(row.label.clone()));
                out.insert("kind".to_string(), JsonValue::String(row.kind.as_str().to_string()));
                out.insert("summary".to_string(), JsonValue::String(row.summary.clone()));
                out.insert("protected".to_string(), JsonValue::Bool(row.protected));
                out.insert("editable".to_string(), JsonValue::Bool(row.is_editable()));
                JsonValue::Object(out)
            })
            .collect(),
    )
}

/// Header plus the text buffer a selection would show. Protected keys are
/// listed so a headless user knows which fields will be restored.
pub fn render_selection_view(
    document: &SaveDocument,
    path: &TreePath,
    engine: &LockPolicyEngine,
) -> Result<String, CoreError> {
    let buffer = document.render_selection(path)?;
    let mut out = String::new();
    let title = match path {
        TreePath::Node(node) => node.label(),
        TreePath::Group { parent, name } => format!("{} <{name}> (read-only)", parent.label()),
    };
    writeln!(out, "== {title} ==").expect("writing to String cannot fail");
    if let Some(node) = path.as_node() {
        if let Some(policy_id) = engine.policy_id_for(node) {
            let keys = engine.highlight_keys_for(node);
            if keys.is_empty() {
                writeln!(out, "policy: {policy_id}").expect("writing to String cannot fail");
            } else {
                writeln!(out, "policy: {policy_id} (protected: {})", keys.join(", "))
                    .expect("writing to String cannot fail");
            }
        }
    }
    out.push_str(&buffer);
    out.push('\n');
    Ok(out)
}

pub fn render_diagnostic_text(diagnostic: &Diagnostic) -> String {
    let mut out = String::new();
    writeln!(out, "{}", diagnostic.header).expect("writing to String cannot fail");
    let span = if diagnostic.insertion_only() {
        format!("col {}", diagnostic.start_col + 1)
    } else {
        format!("cols {}-{}", diagnostic.start_col + 1, diagnostic.end_col)
    };
    writeln!(out, "  --> line {}, {span} [{}]", diagnostic.line, diagnostic.note)
        .expect("writing to String cannot fail");
    writeln!(out, "  Before: {}", diagnostic.before).expect("writing to String cannot fail");
    writeln!(out, "  After:  {}", diagnostic.after).expect("writing to String cannot fail");
    if !diagnostic.actions.is_empty() {
        let labels: Vec<&str> = diagnostic.actions.iter().map(|a| a.label()).collect();
        writeln!(out, "  Actions: {}", labels.join(" | ")).expect("writing to String cannot fail");
    }
    out
}

pub fn render_violation_text(violation: &LockViolation) -> String {
    format!(
        "{} [{}]\n  field: {} at {}\n",
        violation.detail, violation.policy_id, violation.field, violation.path_label
    )
}

pub fn render_outcome_text(outcome: &EditOutcome) -> String {
    match outcome {
        EditOutcome::Committed { path } => format!("committed: {}\n", path.label()),
        EditOutcome::Valid => "valid\n".to_string(),
        EditOutcome::Unchanged => "unchanged\n".to_string(),
        EditOutcome::ParseError { diagnostic } => {
            format!("parse error: {}", render_diagnostic_text(diagnostic))
        }
        EditOutcome::SemanticViolation { diagnostic } => {
            format!("semantic violation: {}", render_diagnostic_text(diagnostic))
        }
        EditOutcome::LockWarning {
            violation,
            diagnostic,
        } => format!(
            "protected field: {}{}",
            render_violation_text(violation),
            render_diagnostic_text(diagnostic)
        ),
        EditOutcome::LockRestored { violation, note } => {
            let mut out = format!("restored pre-edit rendering [{note}]\n");
            if let Some(violation) = violation {
                out.push_str(&render_violation_text(violation));
            }
            out
        }
        EditOutcome::Dismissed => "dismissed\n".to_string(),
        EditOutcome::NotEditable { reason } => format!("not editable: {reason}\n"),
    }
}

pub fn render_outcome_json(outcome: &EditOutcome) -> JsonValue {
    let mut out = JsonMap::new();
    out.insert(
        "outcome".to_string(),
        JsonValue::String(outcome.kind().to_string()),
    );
    match outcome {
        EditOutcome::Committed { path } => {
            out.insert("path".to_string(), JsonValue::String(path.label()));
        }
        EditOutcome::ParseError { diagnostic } | EditOutcome::SemanticViolation { diagnostic } => {
            out.insert("diagnostic".to_string(), diagnostic_to_json(diagnostic));
        }
        EditOutcome::LockWarning {
            violation,
            diagnostic,
        } => {
            out.insert("violation".to_string(), violation_to_json(violation));
            out.insert("diagnostic".to_string(), diagnostic_to_json(diagnostic));
        }
        EditOutcome::LockRestored { violation, note } => {
            out.insert("note".to_string(), JsonValue::String(note.as_str().to_string()));
            out.insert(
                "violation".to_string(),
                violation.as_ref().map_or(JsonValue::Null, violation_to_json),
            );
        }
        EditOutcome::NotEditable { reason } => {
            out.insert("reason".to_string(), JsonValue::String(reason.clone()));
        }
        EditOutcome::Valid | EditOutcome::Unchanged | EditOutcome::Dismissed => {}
    }
    JsonValue::Object(out)
}

pub fn diagnostic_to_json(diagnostic: &Diagnostic) -> JsonValue {
    let mut out = JsonMap::new();
    out.insert(
        "note".to_string(),
        JsonValue::String(diagnostic.note.as_str().to_string()),
    );
    out.insert("header".to_string(), JsonValue::String(diagnostic.header.clone()));
    out.insert("line".to_string(), JsonValue::from(diagnostic.line));
    out.insert("start_col".to_string(), JsonValue::from(diagnostic.start_col));
    out.insert("end_col".to_string(), JsonValue::from(diagnostic.end_col));
    out.insert("before".to_string(), JsonValue::String(diagnostic.before.clone()));
    out.insert("after".to_string(), JsonValue::String(diagnostic.after.clone()));
    out.insert(
        "actions".to_string(),
        JsonValue::Array(
            diagnostic
                .actions
                .iter()
                .map(|a| JsonValue::String(a.label().to_string()))
                .collect(),
        ),
    );
    JsonValue::Object(out)
}

pub fn violation_to_json(violation: &LockViolation) -> JsonValue {
    let mut out = JsonMap::new();
    out.insert("policy".to_string(), JsonValue::String(violation.policy_id.clone()));
    out.insert("path".to_string(), JsonValue::String(violation.path_label.clone()));
    out.insert("field".to_string(), JsonValue::String(violation.field.clone()));
    out.insert("detail".to_string(), JsonValue::String(violation.detail.clone()));
    JsonValue::Object(out)
}

pub fn render_search_text(hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return "no matches\n".to_string();
    }
    let mut out = String::new();
    for hit in hits {
        writeln!(
            out,
            "{} [{}] {}",
            hit.path.label(),
            match_kind_str(hit.kind),
            fit_column(&hit.text, SCALAR_SUMMARY_WIDTH)
        )
        .expect("writing to String cannot fail");
    }
    out
}

pub fn render_search_json(hits: &[SearchHit]) -> JsonValue {
    JsonValue::Array(
        hits.iter()
            .map(|hit| {
                let mut out = JsonMap::new();
                out.insert("path".to_string(), JsonValue::String(hit.path.label()));
                out.insert(
                    "kind".to_string(),
                    JsonValue::String(match_kind_str(hit.kind).to_string()),
                );
                out.insert("text".to_string(), JsonValue::String(hit.text.clone()));
                JsonValue::Object(out)
            })
            .collect(),
    )
}

fn match_kind_str(kind: MatchKind) -> &'static str {
    match kind {
        MatchKind::Key => "key",
        MatchKind::Value => "value",
    }
}

fn plural(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("1 {noun}")
    } else {
        format!("{count} {noun}s")
    }
}

fn fit_column(value: &str, width: usize) -> String {
    if value.chars().count() <= width {
        return value.to_string();
    }
    if width <= 3 {
        return value.chars().take(width).collect();
    }

    let mut out = String::with_capacity(width);
    for ch in value.chars().take(width - 3) {
        out.push(ch);
    }
    out.push_str("...");
    out
}
