//! Parse-error diagnostics for the JSON text buffer.
//!
//! A failed `serde_json` parse is normalized into a [`ParseFailure`] and handed
//! to the rule set in [`rules`], which inspects the neighborhood of the
//! reported position and produces a single [`Diagnostic`] with a concrete
//! before/after suggestion.

pub mod rules;
pub mod scan;
mod symbols;

use std::fmt;

use serde::Serialize;

pub use rules::{LockedKeyLookup, diagnose};
pub use scan::BufferScan;

/// Stable tag attached to every diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Note {
    LockedKeyRestore,
    MissingListOpenTypedComma,
    MissingValueCloseQuote,
    InvalidValueTail,
    MissingKeyCloseQuote,
    MissingKeyOpenQuote,
    MissingKeyQuotes,
    InvalidKeyEscape,
    InvalidValueEscape,
    SymbolWrongClosingBracket,
    SymbolWrongOpeningBracket,
    SymbolCommaBeforeColon,
    SymbolCommaInsteadOfColon,
    SymbolCommaAfterColon,
    SymbolCommaBeforeCloser,
    SymbolDuplicateComma,
    StrayTrailingComma,
    SymbolTrailingJunk,
    SymbolCommaAfterTopLevelClose,
    SymbolInvalidAfterOpen,
    SymbolInvalidAfterClose,
    MissingComma,
    MissingCommaBetweenBlocks,
    MissingObjectOpen,
    MissingListOpen,
    MissingListClose,
    MissingObjectCloseEof,
    MissingListCloseEof,
    LiteralTypo,
    MissingValueOpenQuote,
    ExtraDataMissingObjectOpen,
    ExtraDataMissingListOpen,
    GenericParseError,
    HighlightFailed,
    SpacingAfterColon,
    MissingEmailAt,
    InvalidEmailFormat,
    UnknownEmailDomain,
    InvalidPhoneFormat,
    InvalidPhoneLength,
    ProtectedFieldChange,
}

impl Note {
    pub fn as_str(&self) -> &'static str {
        match *self {
            Self::LockedKeyRestore => "locked_key_restore",
            Self::MissingListOpenTypedComma => "missing_list_open_typed_comma",
            Self::MissingValueCloseQuote => "missing_value_close_quote",
            Self::InvalidValueTail => "invalid_value_tail",
            Self::MissingKeyCloseQuote => "missing_key_close_quote",
            Self::MissingKeyOpenQuote => "missing_key_open_quote",
            Self::MissingKeyQuotes => "missing_key_quotes",
            Self::InvalidKeyEscape => "invalid_key_escape",
            Self::InvalidValueEscape => "invalid_value_escape",
            Self::SymbolWrongClosingBracket => "symbol_wrong_closing_bracket",
            Self::SymbolWrongOpeningBracket => "symbol_wrong_opening_bracket",
            Self::SymbolCommaBeforeColon => "symbol_comma_before_colon",
            Self::SymbolCommaInsteadOfColon => "symbol_comma_instead_of_colon",
            Self::SymbolCommaAfterColon => "symbol_comma_after_colon",
            Self::SymbolCommaBeforeCloser => "symbol_comma_before_closer",
            Self::SymbolDuplicateComma => "symbol_duplicate_comma",
            Self::StrayTrailingComma => "stray_trailing_comma",
            Self::SymbolTrailingJunk => "symbol_trailing_junk",
            Self::SymbolCommaAfterTopLevelClose => "symbol_comma_after_top_level_close",
            Self::SymbolInvalidAfterOpen => "symbol_invalid_after_open",
            Self::SymbolInvalidAfterClose => "symbol_invalid_after_close",
            Self::MissingComma => "missing_comma",
            Self::MissingCommaBetweenBlocks => "missing_comma_between_blocks",
            Self::MissingObjectOpen => "missing_object_open",
            Self::MissingListOpen => "missing_list_open",
            Self::MissingListClose => "missing_list_close",
            Self::MissingObjectCloseEof => "missing_object_close_eof",
            Self::MissingListCloseEof => "missing_list_close_eof",
            Self::LiteralTypo => "literal_typo",
            Self::MissingValueOpenQuote => "missing_value_open_quote",
            Self::ExtraDataMissingObjectOpen => "extra_data_missing_object_open",
            Self::ExtraDataMissingListOpen => "extra_data_missing_list_open",
            Self::GenericParseError => "generic_parse_error",
            Self::HighlightFailed => "highlight_failed",
            Self::SpacingAfterColon => "spacing_after_colon",
            Self::MissingEmailAt => "missing_email_at",
            Self::InvalidEmailFormat => "invalid_email_format",
            Self::UnknownEmailDomain => "unknown_email_domain",
            Self::InvalidPhoneFormat => "invalid_phone_format",
            Self::InvalidPhoneLength => "invalid_phone_length",
            Self::ProtectedFieldChange => "protected_field_change",
        }
    }

    /// Notes produced by the symbol-level rules; logged as `symbol_recovery`.
    pub fn is_symbol_rule(&self) -> bool {
        matches!(
            *self,
            Self::SymbolWrongClosingBracket
                | Self::SymbolWrongOpeningBracket
                | Self::SymbolCommaBeforeColon
                | Self::SymbolCommaInsteadOfColon
                | Self::SymbolCommaAfterColon
                | Self::SymbolCommaBeforeCloser
                | Self::SymbolDuplicateComma
                | Self::StrayTrailingComma
                | Self::SymbolTrailingJunk
                | Self::SymbolCommaAfterTopLevelClose
                | Self::SymbolInvalidAfterOpen
                | Self::SymbolInvalidAfterClose
                | Self::MissingComma
                | Self::MissingCommaBetweenBlocks
        )
    }

    /// Notes whose caret should sit before the span so a comma is not selected.
    pub fn caret_before_span(&self) -> bool {
        matches!(
            *self,
            Self::SymbolCommaBeforeColon
                | Self::SymbolCommaBeforeCloser
                | Self::StrayTrailingComma
                | Self::SymbolDuplicateComma
                | Self::SymbolCommaAfterTopLevelClose
        )
    }

    /// Notes that describe a closer missing at the very end of the buffer.
    pub fn is_eof_insertion(&self) -> bool {
        matches!(*self, Self::MissingObjectCloseEof | Self::MissingListCloseEof)
    }

    pub fn is_semantic(&self) -> bool {
        matches!(
            *self,
            Self::SpacingAfterColon
                | Self::MissingEmailAt
                | Self::InvalidEmailFormat
                | Self::UnknownEmailDomain
                | Self::InvalidPhoneFormat
                | Self::InvalidPhoneLength
        )
    }
}

impl fmt::Display for Note {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticAction {
    AutoFix,
    Continue,
}

impl DiagnosticAction {
    pub fn label(&self) -> &'static str {
        match *self {
            Self::AutoFix => "Auto-Fix",
            Self::Continue => "Continue",
        }
    }
}

/// One explained problem in the text buffer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub header: String,
    pub before: String,
    pub after: String,
    /// 1-based line of the span.
    pub line: usize,
    pub start_col: usize,
    pub end_col: usize,
    pub note: Note,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<DiagnosticAction>,
}

impl Diagnostic {
    /// Builds a diagnostic whose span is clamped to the characters of `line_text`.
    pub fn new(
        note: Note,
        header: impl Into<String>,
        line: usize,
        line_text: &str,
        start_col: usize,
        end_col: usize,
        after: impl Into<String>,
    ) -> Self {
        let len = line_text.chars().count();
        let end_col = end_col.min(len);
        let start_col = start_col.min(end_col);
        Self {
            header: header.into(),
            before: line_text.trim_end().to_string(),
            after: after.into(),
            line: line.max(1),
            start_col,
            end_col,
            note,
            actions: Vec::new(),
        }
    }

    pub fn insertion(
        note: Note,
        header: impl Into<String>,
        line: usize,
        line_text: &str,
        col: usize,
        after: impl Into<String>,
    ) -> Self {
        Self::new(note, header, line, line_text, col, col, after)
    }

    pub fn with_actions(mut self, actions: Vec<DiagnosticAction>) -> Self {
        self.actions = actions;
        self
    }

    pub fn insertion_only(&self) -> bool {
        self.start_col == self.end_col
    }
}

/// Classified `serde_json` failure message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseErrorKind {
    ExpectedObjectCommaOrEnd,
    ExpectedListCommaOrEnd,
    ExpectedColon,
    KeyMustBeString,
    TrailingComma,
    TrailingCharacters,
    EofWhileParsingObject,
    EofWhileParsingList,
    EofWhileParsingString,
    EofWhileParsingValue,
    ExpectedValue,
    ExpectedIdent,
    InvalidEscape,
    InvalidNumber,
    ControlCharacter,
    Other,
}

impl ParseErrorKind {
    fn classify(message: &str) -> Self {
        match message {
            "expected `,` or `}`" => Self::ExpectedObjectCommaOrEnd,
            "expected `,` or `]`" => Self::ExpectedListCommaOrEnd,
            "expected `:`" => Self::ExpectedColon,
            "key must be a string" => Self::KeyMustBeString,
            "trailing comma" => Self::TrailingComma,
            "trailing characters" => Self::TrailingCharacters,
            "EOF while parsing an object" => Self::EofWhileParsingObject,
            "EOF while parsing a list" => Self::EofWhileParsingList,
            "EOF while parsing a string" => Self::EofWhileParsingString,
            "EOF while parsing a value" => Self::EofWhileParsingValue,
            "expected value" => Self::ExpectedValue,
            "expected ident" => Self::ExpectedIdent,
            "invalid escape" => Self::InvalidEscape,
            "invalid number" | "number out of range" => Self::InvalidNumber,
            m if m.starts_with("control character") => Self::ControlCharacter,
            _ => Self::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match *self {
            Self::ExpectedObjectCommaOrEnd => "expected_object_comma_or_end",
            Self::ExpectedListCommaOrEnd => "expected_list_comma_or_end",
            Self::ExpectedColon => "expected_colon",
            Self::KeyMustBeString => "key_must_be_string",
            Self::TrailingComma => "trailing_comma",
            Self::TrailingCharacters => "trailing_characters",
            Self::EofWhileParsingObject => "eof_while_parsing_object",
            Self::EofWhileParsingList => "eof_while_parsing_list",
            Self::EofWhileParsingString => "eof_while_parsing_string",
            Self::EofWhileParsingValue => "eof_while_parsing_value",
            Self::ExpectedValue => "expected_value",
            Self::ExpectedIdent => "expected_ident",
            Self::InvalidEscape => "invalid_escape",
            Self::InvalidNumber => "invalid_number",
            Self::ControlCharacter => "control_character",
            Self::Other => "other",
        }
    }

    /// The "Expecting ',' delimiter" family.
    pub fn expects_comma(&self) -> bool {
        matches!(
            *self,
            Self::ExpectedObjectCommaOrEnd | Self::ExpectedListCommaOrEnd
        )
    }

    pub fn is_eof(&self) -> bool {
        matches!(
            *self,
            Self::EofWhileParsingObject
                | Self::EofWhileParsingList
                | Self::EofWhileParsingString
                | Self::EofWhileParsingValue
        )
    }

    /// Failures raised while reading an object key.
    pub fn is_key_quote_error(&self) -> bool {
        matches!(
            *self,
            Self::KeyMustBeString | Self::ExpectedColon | Self::InvalidEscape
        )
    }
}

/// Parser failure normalized to the buffer's line/column model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParseFailure {
    pub kind: ParseErrorKind,
    pub message: String,
    /// 1-based line of the offending character.
    pub line: usize,
    /// 0-based character column of the offending character (may equal the
    /// line length when the failure sits at end of line).
    pub col: usize,
}

impl ParseFailure {
    pub fn from_serde(err: &serde_json::Error, text: &str) -> Self {
        let rendered = err.to_string();
        let message = match rendered.rfind(" at line ") {
            Some(index) => rendered[..index].to_string(),
            None => rendered,
        };
        let kind = ParseErrorKind::classify(&message);
        let (line, mut col) = normalize_position(text, err.line(), err.column());
        if kind.is_eof() {
            col = text
                .split('\n')
                .nth(line - 1)
                .map(|l| l.trim_end_matches('\r').chars().count())
                .unwrap_or(0);
        }
        Self {
            kind,
            message,
            line,
            col,
        }
    }

    /// Attempts a parse and normalizes any failure against `text`.
    pub fn parse(text: &str) -> Result<serde_json::Value, ParseFailure> {
        serde_json::from_str(text).map_err(|err| Self::from_serde(&err, text))
    }
}

/// Converts serde_json's 1-based byte column into a 0-based character column.
///
/// A column of zero means the parser stopped right after a newline; the
/// position is moved to the end of the previous line.
fn normalize_position(text: &str, line: usize, byte_col: usize) -> (usize, usize) {
    let lines: Vec<&str> = text.split('\n').collect();
    let mut line = line.max(1);
    if byte_col == 0 && line > 1 {
        line -= 1;
        let prev = lines.get(line - 1).copied().unwrap_or("");
        return (line, prev.trim_end_matches('\r').chars().count());
    }
    let Some(line_text) = lines.get(line - 1) else {
        return (line, 0);
    };
    let byte_index = byte_col.saturating_sub(1).min(line_text.len());
    let col = line_text
        .char_indices()
        .take_while(|(index, _)| *index < byte_index)
        .count();
    (line, col)
}
