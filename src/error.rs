//! Crate-wide error types.
//!
//! Each subsystem gets its own small enum with a hand-written `Display` and
//! `std::error::Error` impl (`#[derive(Debug, Clone, Copy, PartialEq, Eq)]`
//! plus a manual `Display`) rather than pulling in `thiserror`. `anyhow` is
//! reserved for the CLI boundary and for `cook`'s sidecar-file I/O.

use std::fmt;

/// Failures from the mutation API. Every mutation that can fail this way
/// leaves the store unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShapeError {
    /// A by-reference `DataNode` pointed at a freed or out-of-range handle.
    InvalidHandle,
    /// The target of an array/table operation was not that kind of container.
    NotAContainer,
    /// An index was out of bounds for a read, or would grow an array past
    /// [`crate::store::config::MAX_ARRAY_LEN`].
    IndexOutOfRange,
    /// A table lookup found no entry for the given symbol.
    KeyNotFound,
}

impl fmt::Display for ShapeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShapeError::InvalidHandle => write!(f, "handle is stale or out of range"),
            ShapeError::NotAContainer => write!(f, "value is not the expected container kind"),
            ShapeError::IndexOutOfRange => write!(f, "index out of range"),
            ShapeError::KeyNotFound => write!(f, "key not found"),
        }
    }
}

impl std::error::Error for ShapeError {}

/// A `(line, column)` source position, 1-based, used by [`ParseError`] and
/// schema-validation failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourcePos {
    pub line: u32,
    pub column: u32,
}

impl fmt::Display for SourcePos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Failures from the JSON parser and its optional schema layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub pos: SourcePos,
    pub message: String,
    /// Present only for schema-validation failures: the failing rule's
    /// location within the schema document.
    pub schema_rule: Option<String>,
}

impl ParseError {
    pub fn new(pos: SourcePos, message: impl Into<String>) -> ParseError {
        ParseError {
            pos,
            message: message.into(),
            schema_rule: None,
        }
    }

    pub fn with_schema_rule(mut self, rule: impl Into<String>) -> ParseError {
        self.schema_rule = Some(rule.into());
        self
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.pos, self.message)?;
        if let Some(rule) = &self.schema_rule {
            write!(f, " (schema rule: {rule})")?;
        }
        Ok(())
    }
}

impl std::error::Error for ParseError {}

/// Failures from binary load. Any variant here means the load aborted and
/// the target store was left untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    SignatureMismatch,
    UnsupportedVersion(u32),
    Truncated,
    CorruptContainerHeader,
    IndexOutOfRange,
    OversizeCount,
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::SignatureMismatch => write!(f, "unrecognised file signature"),
            LoadError::UnsupportedVersion(v) => write!(f, "unsupported format version {v}"),
            LoadError::Truncated => write!(f, "buffer ended before expected payload did"),
            LoadError::CorruptContainerHeader => write!(f, "container header failed validation"),
            LoadError::IndexOutOfRange => write!(f, "on-disk index out of range"),
            LoadError::OversizeCount => write!(f, "on-disk count exceeds the size limit"),
        }
    }
}

impl std::error::Error for LoadError {}

/// Failures from the command evaluator. Carries the index of the command
/// that failed, so callers can report which step in a command list broke.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandError {
    pub command_index: usize,
    pub message: String,
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "command #{}: {}", self.command_index, self.message)
    }
}

impl std::error::Error for CommandError {}

/// Failures from the cook database.
#[derive(Debug)]
pub enum CookError {
    Io(std::io::Error),
    Parse(ParseError),
    Metadata(String),
}

impl fmt::Display for CookError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CookError::Io(e) => write!(f, "io error: {e}"),
            CookError::Parse(e) => write!(f, "metadata parse error: {e}"),
            CookError::Metadata(m) => write!(f, "metadata error: {m}"),
        }
    }
}

impl std::error::Error for CookError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CookError::Io(e) => Some(e),
            CookError::Parse(e) => Some(e),
            CookError::Metadata(_) => None,
        }
    }
}

impl From<std::io::Error> for CookError {
    fn from(e: std::io::Error) -> Self {
        CookError::Io(e)
    }
}

impl From<ParseError> for CookError {
    fn from(e: ParseError) -> Self {
        CookError::Parse(e)
    }
}

/// Failures from reading or writing a compression framing header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressError {
    UnrecognisedFourCc,
    Truncated,
    OversizeInput,
}

impl fmt::Display for CompressError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompressError::UnrecognisedFourCc => write!(f, "unrecognised compression FourCC"),
            CompressError::Truncated => write!(f, "buffer ended before the framing header did"),
            CompressError::OversizeInput => write!(f, "uncompressed length exceeds the size limit"),
        }
    }
}

impl std::error::Error for CompressError {}
