use std::path::PathBuf;

use hhsav_core::diagnostics::{Diagnostic, DiagnosticAction, Note};
use hhsav_core::log::DiagnosticLog;
use hhsav_core::search::SearchIndex;
use hhsav_core::{
    DocPath, EditOutcome, EditorSession, EditorSurface, LockPolicyEngine, MemorySurface,
    SaveDocument, TreePath,
};
use hhsav_render::{
    RowKind, render_diagnostic_text, render_outcome_json, render_outcome_text,
    render_search_json, render_search_text, render_selection_view, render_tree_json,
    render_tree_text, tree_rows,
};

fn workspace_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../..")
}

fn fixture_document() -> SaveDocument {
    SaveDocument::open(&workspace_root().join("tests/fixtures/sample_save.hhsav"))
        .expect("fixture should load")
}

fn spacing_diagnostic() -> Diagnostic {
    Diagnostic::new(
        Note::SpacingAfterColon,
        "Add a space after ':'",
        2,
        "  \"name\":\"Dana\",",
        9,
        10,
        "  \"name\": \"Dana\",",
    )
    .with_actions(vec![DiagnosticAction::AutoFix, DiagnosticAction::Continue])
}

#[test]
fn tree_rows_follow_document_order_with_group_rows() {
    let doc = fixture_document();
    let rows = tree_rows(doc.root(), &LockPolicyEngine::default());

    let top: Vec<&str> = rows
        .iter()
        .filter(|row| row.depth == 0)
        .map(|row| row.label.as_str())
        .collect();
    assert_eq!(top, vec!["Meta", "Player", "Bank", "Network", "Mail", "User"]);

    let groups: Vec<&str> = rows
        .iter()
        .filter(|row| row.kind == RowKind::Group)
        .map(|row| row.label.as_str())
        .collect();
    assert_eq!(groups, vec!["<router>", "<server>"]);

    let router = rows
        .iter()
        .position(|row| row.label == "<router>")
        .expect("router group row");
    assert!(!rows[router].is_editable());
    assert_eq!(rows[router].summary, "2 items");
    assert_eq!(rows[router + 1].label, "0");
    assert_eq!(rows[router + 1].depth, rows[router].depth + 1);
    assert_eq!(
        rows[router + 1].path,
        TreePath::Node(DocPath::root().child("Network").child("hosts").child(0usize))
    );
}

#[test]
fn protected_keys_are_tagged_per_policy() {
    let doc = fixture_document();
    let rows = tree_rows(doc.root(), &LockPolicyEngine::default());
    let protected = |label: &str, depth: usize| {
        rows.iter()
            .find(|row| row.label == label && row.depth == depth)
            .map(|row| row.protected)
            .expect("row should exist")
    };

    assert!(protected("owner", 1));
    assert!(protected("bankName", 1));
    assert!(protected("accountNumber", 3));
    assert!(protected("handle", 1));
    assert!(!protected("credits", 1));
    assert!(!protected("Bank", 0));

    let unlocked = tree_rows(doc.root(), &LockPolicyEngine::unlocked());
    assert!(unlocked.iter().all(|row| !row.protected));
}

#[test]
fn tree_text_indents_and_marks_protected_rows() {
    let doc = fixture_document();
    let text = render_tree_text(&tree_rows(doc.root(), &LockPolicyEngine::default()));
    assert!(text.starts_with("Meta: {3}\n  saveVersion: 7  (protected)\n"));
    assert!(text.contains("\n  bankName: \"Hack Savings\"  (protected)\n"));
    assert!(text.contains("\n    <server>: 1 item\n"));
    assert!(text.contains("\n  notes: \"ünïcode ok\"\n"));

    let json = render_tree_json(&tree_rows(doc.root(), &LockPolicyEngine::default()));
    let first = json[0].as_object().expect("row object");
    let keys: Vec<&str> = first.keys().map(String::as_str).collect();
    assert_eq!(
        keys,
        vec!["path", "depth", "label", "kind", "summary", "protected", "editable"]
    );
    assert_eq!(first["kind"], "map");
}

#[test]
fn selection_view_lists_policy_and_buffer() {
    let doc = fixture_document();
    let engine = LockPolicyEngine::default();
    let bank = render_selection_view(&doc, &TreePath::Node(DocPath::root().child("Bank")), &engine)
        .expect("bank view");
    assert!(bank.starts_with(
        "== Bank ==\npolicy: bank_financial_core (protected: accounts, accountNumber, routingNumber, owner, bankName)\n{\n"
    ));

    let group = TreePath::Group {
        parent: DocPath::root().child("Network").child("hosts"),
        name: "router".to_string(),
    };
    let view = render_selection_view(&doc, &group, &engine).expect("group view");
    assert!(view.starts_with("== Network > hosts <router> (read-only) ==\n[\n"));
    assert!(view.contains("lab-gw"));
    assert!(!view.contains("files"));
}

#[test]
fn diagnostic_text_shows_span_and_actions() {
    let text = render_diagnostic_text(&spacing_diagnostic());
    assert_eq!(
        text,
        "Add a space after ':'\n  --> line 2, cols 10-10 [spacing_after_colon]\n  Before:   \"name\":\"Dana\",\n  After:    \"name\": \"Dana\",\n  Actions: Auto-Fix | Continue\n"
    );
}

#[test]
fn outcome_json_uses_stable_tags() {
    let outcome = EditOutcome::SemanticViolation {
        diagnostic: spacing_diagnostic(),
    };
    let json = render_outcome_json(&outcome);
    assert_eq!(json["outcome"], "semantic_violation");
    assert_eq!(json["diagnostic"]["note"], "spacing_after_colon");
    assert_eq!(json["diagnostic"]["actions"][0], "Auto-Fix");

    let committed = render_outcome_json(&EditOutcome::Committed {
        path: DocPath::root().child("User"),
    });
    assert_eq!(committed["path"], "User");
    assert_eq!(render_outcome_text(&EditOutcome::Unchanged), "unchanged\n");
}

#[test]
fn restored_bank_edit_reports_the_policy() {
    let mut session = EditorSession::new(
        fixture_document(),
        LockPolicyEngine::default(),
        DiagnosticLog::disabled(),
    );
    let mut surface = MemorySurface::default();
    session
        .select(TreePath::Node(DocPath::root().child("Bank")), &mut surface)
        .expect("select bank");
    let edited = surface
        .text_buffer()
        .replace("\"routingNumber\": \"021000021\"", "\"routingNumber\": \"1\"");
    surface.set_text_buffer(&edited);

    let outcome = session.apply_edit(&mut surface);
    let json = render_outcome_json(&outcome);
    assert_eq!(json["outcome"], "lock_restored");
    assert_eq!(json["violation"]["policy"], "bank_financial_core");
    assert_eq!(json["violation"]["field"], "routingNumber");
    assert!(render_outcome_text(&outcome).starts_with("restored pre-edit rendering [protected_field_change]\n"));
}

#[test]
fn search_hits_render_with_labels() {
    let doc = fixture_document();
    let mut index = SearchIndex::new();
    let hits = index.find(doc.root(), "-gw");
    assert_eq!(
        render_search_text(&hits),
        "Network > hosts > 0 > hostname [value] edge-gw\nNetwork > hosts > 2 > hostname [value] lab-gw\n"
    );
    assert_eq!(render_search_json(&hits)[1]["text"], "lab-gw");
    assert_eq!(render_search_text(&[]), "no matches\n");
}
