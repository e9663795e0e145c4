//! Editing core for HackHub `.hhsav` saves.
//!
//! A save is gzipped JSON. The editor shows one subtree at a time as pretty
//! JSON in a text buffer; [`session::EditorSession`] takes that buffer back,
//! explains parse errors with concrete repairs, runs semantic checks, keeps
//! protected fields intact and only then commits into the document.

pub mod config;
pub mod crash;
pub mod diagnostics;
pub mod document;
pub mod error;
pub mod lock;
pub mod log;
pub mod overlay;
pub mod search;
pub mod session;
pub mod ui_queue;
pub mod validate;

pub use config::EditorConfig;
pub use diagnostics::{Diagnostic, DiagnosticAction, Note, ParseFailure};
pub use document::SaveDocument;
pub use document::path::{DocPath, PathSegment, TreePath};
pub use error::{CoreError, CoreErrorCode};
pub use lock::{LockDecision, LockPolicyEngine, LockViolation};
pub use overlay::{EditorSurface, HighlightController, MemorySurface};
pub use session::{EditOutcome, EditorSession};
