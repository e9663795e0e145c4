use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreErrorCode {
    Io,
    Decompress,
    Parse,
    Path,
    NotEditable,
}

impl CoreErrorCode {
    /// Stable tag used in log records and CLI output.
    pub fn as_str(&self) -> &'static str {
        match *self {
            Self::Io => "io_error",
            Self::Decompress => "decompression_error",
            Self::Parse => "parse_error",
            Self::Path => "path_error",
            Self::NotEditable => "not_editable",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}: {message}", .code.as_str())]
pub struct CoreError {
    pub code: CoreErrorCode,
    pub message: String,
}

impl CoreError {
    pub fn new(code: CoreErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}
