//! Panic hook that appends to `crash.log`, plus the state that keeps a crash
//! from being prompted about more than once.

use std::backtrace::Backtrace;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::panic::{self, PanicHookInfo};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::log::{BLOCK_SEPARATOR, KEEP_LOG_BYTES, MAX_LOG_BYTES, rotate};

pub const CRASH_LOG_FILE_NAME: &str = "crash.log";
pub const CRASH_STATE_FILE_NAME: &str = "crash_prompt_state.json";
pub const DISABLE_PROMPT_ENV: &str = "HACKHUB_DISABLE_CRASH_REPORT_PROMPT";

const SIGNATURE_PREFIX: &str = "signature=";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrashReport {
    pub time: String,
    pub version: &'static str,
    pub message: String,
    pub location: Option<String>,
    pub platform: String,
    pub pid: u32,
    pub backtrace: String,
}

impl CrashReport {
    pub fn capture(info: &PanicHookInfo<'_>) -> Self {
        let payload = info.payload();
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };
        Self {
            time: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            version: env!("CARGO_PKG_VERSION"),
            message,
            location: info
                .location()
                .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column())),
            platform: format!("{}-{}", std::env::consts::OS, std::env::consts::ARCH),
            pid: std::process::id(),
            backtrace: Backtrace::force_capture().to_string(),
        }
    }

    /// Stable across runs: depends only on the message and location.
    pub fn signature(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.message.as_bytes());
        hasher.update([0]);
        hasher.update(self.location.as_deref().unwrap_or("").as_bytes());
        format!("{:x}", hasher.finalize())
    }

    pub fn render(&self) -> String {
        format!(
            "time={}\nversion={}\nmessage={}\nlocation={}\nplatform={}\npid={}\n{SIGNATURE_PREFIX}{}\nbacktrace:\n{}\n",
            self.time,
            self.version,
            self.message.replace('\n', " "),
            self.location.as_deref().unwrap_or("unknown"),
            self.platform,
            self.pid,
            self.signature(),
            self.backtrace.trim_end(),
        )
    }
}

/// Chains a crash-logging hook in front of the current panic hook.
pub fn install_panic_hook(dir: PathBuf) {
    let previous = panic::take_hook();
    panic::set_hook(Box::new(move |info| {
        let report = CrashReport::capture(info);
        if let Err(err) = append_crash(&dir, &report) {
            debug!(error = %err, "crash log write failed");
        }
        previous(info);
    }));
}

pub fn append_crash(dir: &Path, report: &CrashReport) -> io::Result<()> {
    fs::create_dir_all(dir)?;
    let path = dir.join(CRASH_LOG_FILE_NAME);
    rotate(&path, MAX_LOG_BYTES, KEEP_LOG_BYTES)?;
    let mut record = String::new();
    if fs::metadata(&path).map(|m| m.len() > 0).unwrap_or(false) {
        record.push_str(BLOCK_SEPARATOR);
    }
    record.push_str(&report.render());
    let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
    file.write_all(record.as_bytes())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrashPromptState {
    pub last_seen_hash: String,
    pub updated_at: String,
}

/// Accepts `1`, `true`, `yes` and `on` in any case.
pub fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Signature of the newest logged crash when the user has not seen it yet.
pub fn pending_crash_prompt(dir: &Path, prompt_disabled: bool) -> Option<String> {
    if prompt_disabled {
        return None;
    }
    let log = fs::read_to_string(dir.join(CRASH_LOG_FILE_NAME)).ok()?;
    let last_block = log.rsplit(BLOCK_SEPARATOR).next()?;
    let signature = last_block
        .lines()
        .find_map(|line| line.strip_prefix(SIGNATURE_PREFIX))?
        .to_string();
    let seen = load_prompt_state(dir).map(|state| state.last_seen_hash);
    if seen.as_deref() == Some(signature.as_str()) {
        return None;
    }
    Some(signature)
}

pub fn load_prompt_state(dir: &Path) -> Option<CrashPromptState> {
    let raw = fs::read_to_string(dir.join(CRASH_STATE_FILE_NAME)).ok()?;
    serde_json::from_str(&raw).ok()
}

pub fn mark_crash_seen(dir: &Path, signature: &str) -> io::Result<()> {
    fs::create_dir_all(dir)?;
    let state = CrashPromptState {
        last_seen_hash: signature.to_string(),
        updated_at: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
    };
    let json = serde_json::to_string_pretty(&state).map_err(io::Error::other)?;
    fs::write(dir.join(CRASH_STATE_FILE_NAME), json)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::{
        CRASH_LOG_FILE_NAME, CrashReport, append_crash, is_truthy, load_prompt_state,
        mark_crash_seen, pending_crash_prompt,
    };

    fn report(message: &str) -> CrashReport {
        CrashReport {
            time: "2026-03-01 10:00:00".to_string(),
            version: "0.1.3",
            message: message.to_string(),
            location: Some("src/session.rs:10:5".to_string()),
            platform: "linux-x86_64".to_string(),
            pid: 42,
            backtrace: "disabled backtrace".to_string(),
        }
    }

    #[test]
    fn truthy_values() {
        for value in ["1", "true", "YES", " on "] {
            assert!(is_truthy(value), "{value}");
        }
        for value in ["0", "false", "", "nope"] {
            assert!(!is_truthy(value), "{value}");
        }
    }

    #[test]
    fn signature_ignores_time_and_pid() {
        let a = report("boom");
        let mut b = report("boom");
        b.time = "2026-04-01 00:00:00".to_string();
        b.pid = 7;
        assert_eq!(a.signature(), b.signature());
        assert_ne!(a.signature(), report("other").signature());
        assert_eq!(a.signature().len(), 64);
    }

    #[test]
    fn crash_is_prompted_once() {
        let dir = tempfile::tempdir().expect("tempdir");
        append_crash(dir.path(), &report("first")).expect("append");
        append_crash(dir.path(), &report("second")).expect("append");

        let log = fs::read_to_string(dir.path().join(CRASH_LOG_FILE_NAME)).expect("read");
        assert!(log.contains("message=first"));
        assert!(log.contains("pid=42"));

        let pending = pending_crash_prompt(dir.path(), false).expect("pending crash");
        assert_eq!(pending, report("second").signature());
        assert!(pending_crash_prompt(dir.path(), true).is_none());

        mark_crash_seen(dir.path(), &pending).expect("mark");
        assert_eq!(
            load_prompt_state(dir.path()).map(|s| s.last_seen_hash),
            Some(pending)
        );
        assert!(pending_crash_prompt(dir.path(), false).is_none());
    }

    #[test]
    fn no_crash_log_means_no_prompt() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(pending_crash_prompt(dir.path(), false).is_none());
    }
}
