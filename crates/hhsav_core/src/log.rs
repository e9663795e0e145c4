//! Rotating plain-text log of parse errors, repairs and lock events.
//!
//! Every write is best effort: I/O failures are reported through `tracing`
//! at debug level and otherwise ignored.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use crate::diagnostics::Diagnostic;

pub const LOG_FILE_NAME: &str = "diagnostics.log";
pub const MAX_LOG_BYTES: u64 = 1024 * 1024;
pub const KEEP_LOG_BYTES: u64 = 256 * 1024;
pub const BLOCK_SEPARATOR: &str = "\n---\n";
const EXCERPT_RADIUS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogSystem {
    OverlayParse,
    JsonHighlight,
    SymbolRecovery,
    InputValidation,
    HighlightRestore,
    CursorRestore,
    HighlightInternal,
}

impl LogSystem {
    pub fn as_str(&self) -> &'static str {
        match *self {
            Self::OverlayParse => "overlay_parse",
            Self::JsonHighlight => "json_highlight",
            Self::SymbolRecovery => "symbol_recovery",
            Self::InputValidation => "input_validation",
            Self::HighlightRestore => "highlight_restore",
            Self::CursorRestore => "cursor_restore",
            Self::HighlightInternal => "highlight_internal",
        }
    }
}

/// One record. `text` is the buffer the excerpt is cut from.
#[derive(Debug, Clone, Copy)]
pub struct LogEntry<'a> {
    pub system: LogSystem,
    pub message: &'a str,
    pub line: Option<usize>,
    pub col: Option<usize>,
    pub note: Option<&'a str>,
    pub text: Option<&'a str>,
}

impl<'a> LogEntry<'a> {
    pub fn new(system: LogSystem, message: &'a str) -> Self {
        Self {
            system,
            message,
            line: None,
            col: None,
            note: None,
            text: None,
        }
    }

    pub fn for_diagnostic(system: LogSystem, diagnostic: &'a Diagnostic, text: &'a str) -> Self {
        Self {
            system,
            message: &diagnostic.header,
            line: Some(diagnostic.line),
            col: Some(diagnostic.start_col),
            note: Some(diagnostic.note.as_str()),
            text: Some(text),
        }
    }

    pub fn at(mut self, line: usize, col: usize) -> Self {
        self.line = Some(line);
        self.col = Some(col);
        self
    }

    pub fn with_note(mut self, note: &'a str) -> Self {
        self.note = Some(note);
        self
    }

    pub fn with_text(mut self, text: &'a str) -> Self {
        self.text = Some(text);
        self
    }
}

/// Action name plus the sequence number shared by all records of one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActionId {
    pub name: &'static str,
    pub seq: u64,
}

#[derive(Debug)]
pub struct DiagnosticLog {
    path: Option<PathBuf>,
    max_bytes: u64,
    keep_bytes: u64,
    seq: u64,
}

impl DiagnosticLog {
    pub fn new(dir: &Path) -> Self {
        Self {
            path: Some(dir.join(LOG_FILE_NAME)),
            max_bytes: MAX_LOG_BYTES,
            keep_bytes: KEEP_LOG_BYTES,
            seq: 0,
        }
    }

    /// A log that records nothing.
    pub fn disabled() -> Self {
        Self {
            path: None,
            max_bytes: MAX_LOG_BYTES,
            keep_bytes: KEEP_LOG_BYTES,
            seq: 0,
        }
    }

    pub fn with_limits(mut self, max_bytes: u64, keep_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self.keep_bytes = keep_bytes.min(max_bytes);
        self
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Starts a new edit cycle.
    pub fn begin(&mut self, name: &'static str) -> ActionId {
        self.seq += 1;
        ActionId {
            name,
            seq: self.seq,
        }
    }

    pub fn record(&self, action: ActionId, entry: &LogEntry<'_>) {
        let Some(path) = self.path.as_deref() else {
            return;
        };
        let time = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        let block = render_block(&time, action, entry);
        if let Err(err) = self.append(path, &block) {
            debug!(path = %path.display(), error = %err, "diagnostic log write failed");
        }
    }

    fn append(&self, path: &Path, block: &str) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        rotate(path, self.max_bytes, self.keep_bytes)?;
        let needs_separator = fs::metadata(path).map(|m| m.len() > 0).unwrap_or(false);
        let mut record = String::with_capacity(block.len() + BLOCK_SEPARATOR.len());
        if needs_separator {
            record.push_str(BLOCK_SEPARATOR);
        }
        record.push_str(block);
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        file.write_all(record.as_bytes())
    }
}

pub fn render_block(time: &str, action: ActionId, entry: &LogEntry<'_>) -> String {
    let mut out = format!(
        "time={time}\naction={}:{}\nmsg={}\nlineno={}\ncol={}\n",
        action.name,
        action.seq,
        single_line(entry.message),
        entry.line.map(|l| l.to_string()).unwrap_or_default(),
        entry.col.map(|c| c.to_string()).unwrap_or_default(),
    );
    let target = match (entry.text, entry.line) {
        (Some(text), Some(line)) => text.split('\n').nth(line.saturating_sub(1)).unwrap_or(""),
        _ => "",
    };
    out.push_str(&format!(
        "target={}\nnote={}\nsystem={}\n",
        target.trim_end(),
        entry.note.unwrap_or(""),
        entry.system.as_str()
    ));
    if let (Some(text), Some(line)) = (entry.text, entry.line) {
        out.push_str(&excerpt(text, line));
    }
    out
}

/// Up to five numbered lines centered on `line`.
pub fn excerpt(text: &str, line: usize) -> String {
    let lines: Vec<&str> = text.split('\n').collect();
    let first = line.saturating_sub(EXCERPT_RADIUS).max(1);
    let last = (line + EXCERPT_RADIUS).min(lines.len());
    let mut out = String::new();
    for n in first..=last {
        out.push_str(&format!("{n}: {}\n", lines[n - 1].trim_end()));
    }
    out
}

fn single_line(message: &str) -> String {
    message.replace('\n', " ")
}

/// Truncates `path` to its last `keep` bytes once it exceeds `max`,
/// discarding the partial block at the cut.
pub(crate) fn rotate(path: &Path, max: u64, keep: u64) -> io::Result<()> {
    let len = match fs::metadata(path) {
        Ok(meta) => meta.len(),
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(err) => return Err(err),
    };
    if len <= max {
        return Ok(());
    }
    let bytes = fs::read(path)?;
    let cut = bytes.len().saturating_sub(usize::try_from(keep).unwrap_or(usize::MAX));
    let tail = &bytes[cut..];
    let sep = BLOCK_SEPARATOR.as_bytes();
    let kept = match tail.windows(sep.len()).position(|w| w == sep) {
        Some(pos) => &tail[pos + sep.len()..],
        None => &[][..],
    };
    fs::write(path, kept)
}
