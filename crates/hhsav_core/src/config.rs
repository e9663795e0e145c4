use std::path::PathBuf;

use crate::crash::{DISABLE_PROMPT_ENV, is_truthy};
use crate::lock::LockPolicyEngine;
use crate::log::DiagnosticLog;

pub const LOG_DIR_ENV: &str = "HHSAV_LOG_DIR";
const DEFAULT_LOG_DIR_NAME: &str = "hackhub-save-editor";

/// Session settings resolved from the environment, then command-line overrides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorConfig {
    pub log_dir: PathBuf,
    pub crash_prompt_disabled: bool,
    /// Run with an empty lock registry.
    pub unlocked: bool,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            log_dir: std::env::temp_dir().join(DEFAULT_LOG_DIR_NAME),
            crash_prompt_disabled: false,
            unlocked: false,
        }
    }
}

impl EditorConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(dir) = lookup(LOG_DIR_ENV).filter(|d| !d.trim().is_empty()) {
            config.log_dir = PathBuf::from(dir);
        }
        config.crash_prompt_disabled = lookup(DISABLE_PROMPT_ENV).is_some_and(|v| is_truthy(&v));
        config
    }

    pub fn with_log_dir(mut self, dir: Option<PathBuf>) -> Self {
        if let Some(dir) = dir {
            self.log_dir = dir;
        }
        self
    }

    pub fn with_unlocked(mut self, unlocked: bool) -> Self {
        self.unlocked = self.unlocked || unlocked;
        self
    }

    pub fn diagnostic_log(&self) -> DiagnosticLog {
        DiagnosticLog::new(&self.log_dir)
    }

    pub fn lock_engine(&self) -> LockPolicyEngine {
        if self.unlocked {
            LockPolicyEngine::unlocked()
        } else {
            LockPolicyEngine::default()
        }
    }
}
