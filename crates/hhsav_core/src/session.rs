//! Edit intake: everything between the text buffer and the document.
//!
//! `apply_edit` and `live_validate` never fail. Every result, including
//! parse errors and blocked edits, is an [`EditOutcome`].

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, trace};

use crate::diagnostics::{
    Diagnostic, DiagnosticAction, Note, ParseFailure, diagnose, rules::generic_diagnostic,
};
use crate::document::path::{DocPath, TreePath};
use crate::document::{SaveDocument, render_pretty};
use crate::error::CoreError;
use crate::lock::{LockDecision, LockPolicyEngine, LockViolation, RENAMED_KEY_SIMILARITY, key_similarity};
use crate::log::{ActionId, DiagnosticLog, LogEntry, LogSystem};
use crate::overlay::{ApplyMode, EditorSurface, FocusEvent, FocusOutcome, HighlightController, TextPos};
use crate::search::{SearchHit, SearchIndex};
use crate::validate::{ValidationInput, validate};

pub const STATUS_EDITED: &str = "Edited";

static MEMBER_KEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^(\s*)"((?:[^"\\]|\\.)*)"\s*:"#).expect("member key pattern")
});

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum EditOutcome {
    Committed { path: DocPath },
    /// Live validation found nothing to report.
    Valid,
    Unchanged,
    ParseError { diagnostic: Diagnostic },
    SemanticViolation { diagnostic: Diagnostic },
    /// Live validation hit a protected field; Auto-Fix restores it.
    LockWarning { violation: LockViolation, diagnostic: Diagnostic },
    /// The buffer was put back to the pre-edit rendering.
    LockRestored { violation: Option<LockViolation>, note: Note },
    Dismissed,
    NotEditable { reason: String },
}

impl EditOutcome {
    /// Stable tag for logs and command-line output.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Committed { .. } => "committed",
            Self::Valid => "valid",
            Self::Unchanged => "unchanged",
            Self::ParseError { .. } => "parse_error",
            Self::SemanticViolation { .. } => "semantic_violation",
            Self::LockWarning { .. } => "lock_violation",
            Self::LockRestored { .. } => "lock_restored",
            Self::Dismissed => "dismissed",
            Self::NotEditable { .. } => "not_editable",
        }
    }

    pub fn diagnostic(&self) -> Option<&Diagnostic> {
        match self {
            Self::ParseError { diagnostic }
            | Self::SemanticViolation { diagnostic }
            | Self::LockWarning { diagnostic, .. } => Some(diagnostic),
            _ => None,
        }
    }
}

/// Repair waiting behind the popover's Auto-Fix button.
#[derive(Debug, Clone, PartialEq)]
enum PendingFix {
    Text(String),
    Lock { path: DocPath, repaired: Value },
    RestoreRendering { path: DocPath },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Intake {
    Apply,
    Live,
}

pub struct EditorSession {
    document: SaveDocument,
    engine: LockPolicyEngine,
    highlight: HighlightController,
    log: DiagnosticLog,
    search: SearchIndex,
    /// Buffer text last rendered into or committed from the surface.
    last_applied: Option<String>,
    /// Buffer whose semantic warning the user chose to ignore.
    accepted: Option<String>,
    pending: Option<PendingFix>,
    tree_generation: u64,
}

impl EditorSession {
    pub fn new(document: SaveDocument, engine: LockPolicyEngine, log: DiagnosticLog) -> Self {
        Self {
            document,
            engine,
            highlight: HighlightController::new(),
            log,
            search: SearchIndex::new(),
            last_applied: None,
            accepted: None,
            pending: None,
            tree_generation: 0,
        }
    }

    pub fn document(&self) -> &SaveDocument {
        &self.document
    }

    pub fn engine(&self) -> &LockPolicyEngine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut LockPolicyEngine {
        &mut self.engine
    }

    pub fn highlight(&self) -> &HighlightController {
        &self.highlight
    }

    pub fn log(&self) -> &DiagnosticLog {
        &self.log
    }

    /// Bumped on every document mutation; tree caches compare against it.
    pub fn tree_generation(&self) -> u64 {
        self.tree_generation
    }

    /// Routes caret and edit events through the active highlight.
    pub fn enforce_focus(&mut self, event: FocusEvent, surface: &mut dyn EditorSurface) -> FocusOutcome {
        self.highlight.enforce_focus(event, surface)
    }

    pub fn has_pending_fix(&self) -> bool {
        self.pending.is_some()
    }

    /// Replaces the document with the save at `path`.
    pub fn open(&mut self, path: &Path) -> Result<(), CoreError> {
        let document = SaveDocument::open(path)?;
        info!(path = %path.display(), "save opened");
        self.document = document;
        self.document_changed();
        self.last_applied = None;
        self.accepted = None;
        self.pending = None;
        Ok(())
    }

    pub fn find(&mut self, query: &str) -> Vec<SearchHit> {
        self.search.find(self.document.root(), query)
    }

    /// Renders `path` into the buffer. Group rows render their members and
    /// stay read-only.
    pub fn select(&mut self, path: TreePath, surface: &mut dyn EditorSurface) -> Result<(), CoreError> {
        let rendered = self.document.render_selection(&path)?;
        self.highlight.clear(surface);
        surface.set_selected_path(path);
        surface.set_text_buffer(&rendered);
        surface.set_caret(TextPos::new(1, 0));
        self.last_applied = Some(rendered);
        self.accepted = None;
        self.pending = None;
        Ok(())
    }

    pub fn apply_edit(&mut self, surface: &mut dyn EditorSurface) -> EditOutcome {
        let text = surface.text_buffer();
        if !self.highlight.is_active() && self.last_applied.as_deref() == Some(text.as_str()) {
            trace!("unchanged apply");
            return EditOutcome::Unchanged;
        }
        let action = self.log.begin("apply_edit");
        self.intake(action, Intake::Apply, &text, surface)
    }

    /// Validates the buffer without committing. Scheduled after keystrokes.
    pub fn live_validate(&mut self, surface: &mut dyn EditorSurface) -> EditOutcome {
        let text = surface.text_buffer();
        if !self.highlight.is_active() && self.last_applied.as_deref() == Some(text.as_str()) {
            return EditOutcome::Valid;
        }
        let action = self.log.begin("live_validate");
        self.intake(action, Intake::Live, &text, surface)
    }

    /// Applies the repair behind the active popover, then commits it.
    pub fn auto_fix(&mut self, surface: &mut dyn EditorSurface) -> EditOutcome {
        let Some(fix) = self.pending.take() else {
            surface.set_status("Nothing to fix.");
            return EditOutcome::Unchanged;
        };
        let action = self.log.begin("auto_apply");
        self.highlight.clear(surface);
        let outcome = match fix {
            PendingFix::Text(fixed) => {
                surface.set_text_buffer(&fixed);
                self.intake(action, Intake::Apply, &fixed, surface)
            }
            PendingFix::Lock { path, repaired } => match render_pretty(&repaired) {
                Ok(rendered) => {
                    surface.set_text_buffer(&rendered);
                    let outcome = self.intake(action, Intake::Apply, &rendered, surface);
                    if let (EditOutcome::Committed { .. }, Some(policy)) =
                        (&outcome, self.engine.policy_for_path(&path))
                    {
                        surface.set_status(policy.status_restored);
                    }
                    outcome
                }
                Err(err) => EditOutcome::NotEditable {
                    reason: err.to_string(),
                },
            },
            PendingFix::RestoreRendering { path } => {
                self.restore_rendering(action, &path, None, Note::LockedKeyRestore, surface)
            }
        };
        self.log.record(
            action,
            &LogEntry::new(LogSystem::HighlightRestore, "auto-fix applied").with_note(outcome.kind()),
        );
        outcome
    }

    /// Dismisses the popover. A protected-field warning arms the one-shot
    /// override; a semantic warning is not raised again for the same buffer.
    pub fn continue_anyway(&mut self, surface: &mut dyn EditorSurface) -> EditOutcome {
        match self.pending.take() {
            Some(PendingFix::Lock { .. }) => self.engine.allow_highlight_key_change_once(),
            Some(PendingFix::Text(_)) => self.accepted = Some(surface.text_buffer()),
            Some(PendingFix::RestoreRendering { .. }) | None => {
                if self
                    .highlight
                    .active_diagnostic()
                    .is_some_and(|d| d.note.is_semantic())
                {
                    self.accepted = Some(surface.text_buffer());
                }
            }
        }
        self.highlight.clear(surface);
        EditOutcome::Dismissed
    }

    fn intake(
        &mut self,
        action: ActionId,
        mode: Intake,
        text: &str,
        surface: &mut dyn EditorSurface,
    ) -> EditOutcome {
        let selected = surface.selected_path();
        let Some(path) = selected.as_node().cloned() else {
            surface.set_status("Group rows are read-only.");
            return EditOutcome::NotEditable {
                reason: format!("{} is a group row", selected.label()),
            };
        };
        let apply_mode = match mode {
            Intake::Apply => ApplyMode::Apply,
            Intake::Live => ApplyMode::Live,
        };

        let value = match ParseFailure::parse(text) {
            Ok(value) => value,
            Err(failure) => return self.parse_failed(action, mode, &path, text, &failure, surface),
        };

        let skip_semantic = self.accepted.as_deref() == Some(text);
        if !skip_semantic {
            let input = ValidationInput {
                path: &path,
                text,
                value: &value,
            };
            if let Some(diagnostic) = validate(&input) {
                self.log.record(
                    action,
                    &LogEntry::for_diagnostic(LogSystem::InputValidation, &diagnostic, text),
                );
                self.pending = diagnostic
                    .actions
                    .contains(&DiagnosticAction::AutoFix)
                    .then(|| PendingFix::Text(replace_line(text, diagnostic.line, &diagnostic.after)));
                self.highlight.apply(&diagnostic, surface, apply_mode);
                return EditOutcome::SemanticViolation { diagnostic };
            }
        }

        let Some(current) = self.document.get(&path).cloned() else {
            surface.set_status("Selected node no longer exists.");
            return EditOutcome::NotEditable {
                reason: format!("path {} does not exist in the document", path.label()),
            };
        };

        let decision = if mode == Intake::Live && self.engine.override_pending() {
            LockDecision::Allowed
        } else {
            self.engine.evaluate(&path, &current, &value)
        };

        if let LockDecision::Blocked(violation) = decision {
            return match mode {
                Intake::Live => {
                    let (_, repaired) = self.engine.restore(&path, &current, &value);
                    let diagnostic = protected_field_diagnostic(text, &violation);
                    self.log.record(
                        action,
                        &LogEntry::for_diagnostic(LogSystem::InputValidation, &diagnostic, text),
                    );
                    self.pending = Some(PendingFix::Lock {
                        path,
                        repaired,
                    });
                    self.highlight.apply(&diagnostic, surface, apply_mode);
                    surface.set_status(&violation.status_blocked);
                    EditOutcome::LockWarning {
                        violation,
                        diagnostic,
                    }
                }
                Intake::Apply => {
                    surface.set_status(&violation.status_blocked);
                    self.restore_rendering(action, &path, Some(violation), Note::ProtectedFieldChange, surface)
                }
            };
        }

        if self.highlight.is_active() {
            self.highlight.clear(surface);
        }
        self.pending = None;
        if mode == Intake::Live {
            return EditOutcome::Valid;
        }

        if let Err(err) = self.document.set(&path, value) {
            surface.set_status(&err.message);
            return EditOutcome::NotEditable {
                reason: err.to_string(),
            };
        }
        self.document_changed();
        self.last_applied = Some(text.to_string());
        self.accepted = None;
        surface.set_status(STATUS_EDITED);
        debug!(path = %path.label(), "edit committed");
        EditOutcome::Committed { path }
    }

    fn parse_failed(
        &mut self,
        action: ActionId,
        mode: Intake,
        path: &DocPath,
        text: &str,
        failure: &ParseFailure,
        surface: &mut dyn EditorSurface,
    ) -> EditOutcome {
        self.log.record(
            action,
            &LogEntry::new(LogSystem::OverlayParse, &failure.message)
                .at(failure.line, failure.col)
                .with_note(failure.kind.as_str())
                .with_text(text),
        );
        let diagnosed = {
            let is_locked = self.engine.locked_key_lookup(path);
            diagnose(text, failure, &is_locked)
        };
        let diagnostic = diagnosed.unwrap_or_else(|| generic_diagnostic(text, failure));

        if diagnostic.note == Note::LockedKeyRestore {
            self.log.record(
                action,
                &LogEntry::for_diagnostic(LogSystem::SymbolRecovery, &diagnostic, text),
            );
            if mode == Intake::Apply {
                return self.restore_rendering(action, path, None, Note::LockedKeyRestore, surface);
            }
            let diagnostic = diagnostic.with_actions(vec![DiagnosticAction::AutoFix, DiagnosticAction::Continue]);
            self.pending = Some(PendingFix::RestoreRendering { path: path.clone() });
            self.highlight.apply(&diagnostic, surface, ApplyMode::Live);
            return EditOutcome::ParseError { diagnostic };
        }

        let system = if diagnostic.note.is_symbol_rule() {
            LogSystem::SymbolRecovery
        } else {
            LogSystem::JsonHighlight
        };
        self.log.record(action, &LogEntry::for_diagnostic(system, &diagnostic, text));
        self.pending = None;
        let apply_mode = match mode {
            Intake::Apply => ApplyMode::Apply,
            Intake::Live => ApplyMode::Live,
        };
        self.highlight.apply(&diagnostic, surface, apply_mode);
        EditOutcome::ParseError { diagnostic }
    }

    /// Puts the pre-edit rendering of `path` back into the buffer and parks
    /// the caret on the protected key.
    fn restore_rendering(
        &mut self,
        action: ActionId,
        path: &DocPath,
        violation: Option<LockViolation>,
        note: Note,
        surface: &mut dyn EditorSurface,
    ) -> EditOutcome {
        let rendered = match self.document.get(path).map(render_pretty) {
            Some(Ok(rendered)) => rendered,
            Some(Err(err)) => {
                self.log.record(
                    action,
                    &LogEntry::new(LogSystem::HighlightInternal, &err.message),
                );
                return EditOutcome::NotEditable {
                    reason: err.to_string(),
                };
            }
            None => {
                return EditOutcome::NotEditable {
                    reason: format!("path {} does not exist in the document", path.label()),
                };
            }
        };
        self.highlight.clear(surface);
        surface.set_text_buffer(&rendered);
        self.pending = None;
        self.last_applied = Some(rendered.clone());

        let message = violation
            .as_ref()
            .map(|v| v.detail.clone())
            .unwrap_or_else(|| "protected key restored".to_string());
        self.log.record(
            action,
            &LogEntry::new(LogSystem::HighlightRestore, &message)
                .with_note(note.as_str())
                .with_text(&rendered),
        );

        let caret = violation
            .as_ref()
            .and_then(|v| find_key_line(&rendered, &v.field))
            .map(|(line, col)| TextPos::new(line, col))
            .unwrap_or(TextPos::new(1, 0));
        surface.set_caret(caret);
        self.log.record(
            action,
            &LogEntry::new(LogSystem::CursorRestore, "caret moved to restored key")
                .at(caret.line, caret.col)
                .with_text(&rendered),
        );

        if let Some(policy) = self.engine.policy_for_path(path) {
            if violation.is_none() {
                surface.set_status(policy.status_restored);
            }
        }
        info!(path = %path.label(), note = note.as_str(), "pre-edit rendering restored");
        EditOutcome::LockRestored { violation, note }
    }

    fn document_changed(&mut self) {
        self.search.invalidate();
        self.tree_generation += 1;
    }
}

fn replace_line(text: &str, line: usize, replacement: &str) -> String {
    text.split('\n')
        .enumerate()
        .map(|(index, original)| if index + 1 == line { replacement } else { original })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Line and key column of member `field`, or of the closest renamed key.
fn find_key_line(text: &str, field: &str) -> Option<(usize, usize)> {
    let mut renamed: Option<(f64, usize, usize)> = None;
    for (index, line) in text.split('\n').enumerate() {
        let Some(caps) = MEMBER_KEY.captures(line) else {
            continue;
        };
        let (Some(indent), Some(key)) = (caps.get(1), caps.get(2)) else {
            continue;
        };
        let col = indent.as_str().chars().count();
        if key.as_str() == field {
            return Some((index + 1, col));
        }
        let score = key_similarity(key.as_str(), field);
        if score >= RENAMED_KEY_SIMILARITY && renamed.is_none_or(|(best, _, _)| score > best) {
            renamed = Some((score, index + 1, col));
        }
    }
    renamed.map(|(_, line, col)| (line, col))
}

fn protected_field_diagnostic(text: &str, violation: &LockViolation) -> Diagnostic {
    let actions = vec![DiagnosticAction::AutoFix, DiagnosticAction::Continue];
    let header = format!("Protected Field: {}", violation.detail);
    let Some((line_no, col)) = find_key_line(text, &violation.field) else {
        let first = text.split('\n').next().unwrap_or("");
        return Diagnostic::new(Note::ProtectedFieldChange, header, 1, first, 0, first.chars().count(), first)
            .with_actions(actions);
    };
    let line = text.split('\n').nth(line_no - 1).unwrap_or("");
    let chars: Vec<char> = line.chars().collect();
    let key_end = chars[col..]
        .iter()
        .skip(1)
        .position(|c| *c == '"')
        .map_or(chars.len(), |p| col + p + 2);
    let after: String = format!(
        "{}\"{}\"{}",
        chars[..col].iter().collect::<String>(),
        violation.field,
        chars[key_end..].iter().collect::<String>()
    );
    Diagnostic::new(
        Note::ProtectedFieldChange,
        header,
        line_no,
        line,
        col,
        key_end,
        after.trim_end(),
    )
    .with_actions(actions)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{EditOutcome, EditorSession, find_key_line, replace_line};
    use crate::diagnostics::Note;
    use crate::document::SaveDocument;
    use crate::document::path::{DocPath, TreePath};
    use crate::lock::LockPolicyEngine;
    use crate::log::DiagnosticLog;
    use crate::overlay::{EditorSurface, MemorySurface, TAG_ERROR};

    fn session() -> EditorSession {
        let doc = SaveDocument::new(json!({
            "Bank": {"accounts": [{"balance": 10}], "bankName": "HB"},
            "User": {"name": "Bob", "email": "bob@gmail.com"}
        }));
        EditorSession::new(doc, LockPolicyEngine::default(), DiagnosticLog::disabled())
    }

    fn selected(session: &mut EditorSession, path: DocPath) -> MemorySurface {
        let mut surface = MemorySurface::default();
        session
            .select(TreePath::Node(path), &mut surface)
            .expect("select");
        surface
    }

    #[test]
    fn select_renders_subtree_and_apply_is_noop() {
        let mut session = session();
        let mut surface = selected(&mut session, DocPath::root().child("User"));
        assert_eq!(
            surface.text_buffer(),
            "{\n  \"name\": \"Bob\",\n  \"email\": \"bob@gmail.com\"\n}"
        );
        assert_eq!(session.apply_edit(&mut surface), EditOutcome::Unchanged);
        assert_eq!(session.tree_generation(), 0);
    }

    #[test]
    fn valid_edit_commits_in_place() {
        let mut session = session();
        let mut surface = selected(&mut session, DocPath::root().child("User"));
        surface.set_text_buffer("{\"name\": \"Alice\", \"email\": \"alice@gmail.com\"}");
        let outcome = session.apply_edit(&mut surface);
        assert_eq!(
            outcome,
            EditOutcome::Committed {
                path: DocPath::root().child("User")
            }
        );
        assert_eq!(session.document().root()["User"]["name"], "Alice");
        let keys: Vec<&String> = session.document().root().as_object().expect("map").keys().collect();
        assert_eq!(keys, ["Bank", "User"]);
        assert_eq!(surface.status(), Some("Edited"));
        assert_eq!(session.tree_generation(), 1);
        assert_eq!(session.apply_edit(&mut surface), EditOutcome::Unchanged);
    }

    #[test]
    fn parse_error_highlights_and_keeps_document() {
        let mut session = session();
        let mut surface = selected(&mut session, DocPath::root().child("User"));
        surface.set_text_buffer("{\n  \"name\": \"Bob\"\n  \"email\": \"bob@gmail.com\"\n}");
        let outcome = session.apply_edit(&mut surface);
        let diagnostic = outcome.diagnostic().expect("diagnostic");
        assert_eq!(outcome.kind(), "parse_error");
        assert_eq!(diagnostic.line, 2);
        assert!(!surface.tags(TAG_ERROR).is_empty());
        assert_eq!(session.document().root()["User"]["name"], "Bob");
    }

    #[test]
    fn semantic_auto_fix_commits_repaired_line() {
        let mut session = session();
        let mut surface = selected(&mut session, DocPath::root().child("User"));
        surface.set_text_buffer("{\n  \"name\": \"Bob\",\n  \"email\": \"foo.bar.com\"\n}");
        let outcome = session.apply_edit(&mut surface);
        assert_eq!(outcome.diagnostic().map(|d| d.note), Some(Note::MissingEmailAt));
        assert!(session.has_pending_fix());

        let fixed = session.auto_fix(&mut surface);
        assert_eq!(fixed.kind(), "committed");
        assert_eq!(session.document().root()["User"]["email"], "foo@bar.com");
    }

    #[test]
    fn continue_accepts_semantic_warning_for_same_buffer() {
        let mut session = session();
        let mut surface = selected(&mut session, DocPath::root().child("User"));
        surface.set_text_buffer("{\n  \"name\": \"Bob\",\n  \"email\": \"foo.bar.com\"\n}");
        assert_eq!(session.apply_edit(&mut surface).kind(), "semantic_violation");
        assert_eq!(session.continue_anyway(&mut surface), EditOutcome::Dismissed);
        assert!(surface.popover().is_none());
        assert_eq!(session.apply_edit(&mut surface).kind(), "committed");
        assert_eq!(session.document().root()["User"]["email"], "foo.bar.com");
    }

    #[test]
    fn blocked_apply_restores_pre_edit_rendering() {
        let mut session = session();
        let mut surface = selected(&mut session, DocPath::root().child("Bank"));
        let original = surface.text_buffer();
        surface.set_text_buffer("{\"acconts\": [{\"balance\": 99}], \"bankName\": \"HB\"}");
        let outcome = session.apply_edit(&mut surface);
        let EditOutcome::LockRestored { violation: Some(violation), .. } = &outcome else {
            panic!("expected restore, got {outcome:?}");
        };
        assert_eq!(violation.field, "accounts");
        assert_eq!(surface.text_buffer(), original);
        assert_eq!(surface.caret().line, 2);
        assert_eq!(session.document().root()["Bank"]["accounts"][0]["balance"], 10);
    }

    #[test]
    fn live_lock_warning_auto_fix_recovers_renamed_key() {
        let mut session = session();
        let mut surface = selected(&mut session, DocPath::root().child("Bank"));
        surface.set_text_buffer("{\n  \"acconts\": [{\"balance\": 10}],\n  \"bankName\": \"Big\"\n}");
        let outcome = session.live_validate(&mut surface);
        let EditOutcome::LockWarning { diagnostic, .. } = &outcome else {
            panic!("expected warning, got {outcome:?}");
        };
        assert_eq!(diagnostic.line, 2);
        assert_eq!(diagnostic.after, "  \"accounts\": [{\"balance\": 10}],");

        assert_eq!(session.auto_fix(&mut surface).kind(), "committed");
        let bank = &session.document().root()["Bank"];
        let keys: Vec<&String> = bank.as_object().expect("map").keys().collect();
        assert_eq!(keys, ["accounts", "bankName"]);
        assert_eq!(bank["bankName"], "Big");
    }

    #[test]
    fn continue_on_lock_warning_arms_override() {
        let mut session = session();
        let mut surface = selected(&mut session, DocPath::root().child("Bank"));
        surface.set_text_buffer("{\"accounts\": [], \"bankName\": \"HB\"}");
        assert_eq!(session.live_validate(&mut surface).kind(), "lock_violation");
        session.continue_anyway(&mut surface);
        assert!(session.engine().override_pending());
        assert_eq!(session.apply_edit(&mut surface).kind(), "committed");
        assert!(!session.engine().override_pending());
    }

    #[test]
    fn group_rows_are_read_only() {
        let doc = SaveDocument::new(json!({"Network": {"hosts": [
            {"type": "router", "ip": "10.0.0.1"},
            {"type": "server", "ip": "10.0.0.2"}
        ]}}));
        let mut session = EditorSession::new(doc, LockPolicyEngine::default(), DiagnosticLog::disabled());
        let mut surface = MemorySurface::default();
        let group = TreePath::Group {
            parent: DocPath::root().child("Network").child("hosts"),
            name: "router".to_string(),
        };
        session.select(group, &mut surface).expect("select group");
        assert!(surface.text_buffer().contains("10.0.0.1"));
        assert!(!surface.text_buffer().contains("10.0.0.2"));
        surface.set_text_buffer("[]");
        assert_eq!(session.apply_edit(&mut surface).kind(), "not_editable");
    }

    #[test]
    fn find_uses_fresh_index_after_commit() {
        let mut session = session();
        assert_eq!(session.find("alice").len(), 0);
        let mut surface = selected(&mut session, DocPath::root().child("User"));
        surface.set_text_buffer("{\"name\": \"Alice\", \"email\": \"bob@gmail.com\"}");
        session.apply_edit(&mut surface);
        assert_eq!(session.find("alice").len(), 1);
    }

    #[test]
    fn helpers_locate_and_replace_lines() {
        assert_eq!(replace_line("a\nb\nc", 2, "B"), "a\nB\nc");
        let text = "{\n  \"acconts\": [],\n  \"bankName\": \"HB\"\n}";
        assert_eq!(find_key_line(text, "accounts"), Some((2, 2)));
        assert_eq!(find_key_line(text, "bankName"), Some((3, 2)));
        assert_eq!(find_key_line(text, "routingNumber"), None);
    }
}
