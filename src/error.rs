use std::error::Error;
use std::fmt::{self, Display};

/// Distinguishes the kind of fault a [`FmtError`] reports. Every variant is
/// emitted alongside a byte `index` into whatever content was being scanned
/// or evaluated at the time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    UnterminatedTag,
    InvalidChar,
    UnexpectedToken,
    UnknownVariable,
    TypeMismatch,
    OutOfBounds,
    BadExpression,
    FileLoad,
}

impl ErrorKind {
    fn label(&self) -> &'static str {
        match self {
            ErrorKind::UnterminatedTag => "unterminated tag",
            ErrorKind::InvalidChar => "invalid character",
            ErrorKind::UnexpectedToken => "unexpected token",
            ErrorKind::UnknownVariable => "unknown variable",
            ErrorKind::TypeMismatch => "type mismatch",
            ErrorKind::OutOfBounds => "out of bounds",
            ErrorKind::BadExpression => "bad expression",
            ErrorKind::FileLoad => "file load failed",
        }
    }
}

/// A single diagnostic raised while lexing or evaluating a template.
///
/// `index` is a byte offset into the content that was active when the fault
/// was detected, used on debug builds to compute a `(line, column)` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FmtError {
    pub kind: ErrorKind,
    pub index: usize,
    pub message: String,
}

impl FmtError {
    pub fn new(kind: ErrorKind, index: usize, message: impl Into<String>) -> Self {
        Self {
            kind,
            index,
            message: message.into(),
        }
    }

    /// Counts newlines up to `index` in `content` to recover a 1-based
    /// `(line, column)` pair for diagnostics.
    pub fn line_col(&self, content: &str) -> (usize, usize) {
        let mut line = 1;
        let mut col = 1;

        for ch in content[..self.index.min(content.len())].chars() {
            if ch == '\n' {
                line += 1;
                col = 1;
            } else {
                col += 1;
            }
        }

        (line, col)
    }

    /// Logs this error via the `log` facade. On debug builds the message is
    /// prefixed with a `(line, column)` computed against `content`; on
    /// release builds the byte-accounting walk is skipped but the error is
    /// still logged.
    pub fn report(&self, content: &str) {
        #[cfg(debug_assertions)]
        {
            let (line, col) = self.line_col(content);
            log::error!("Fmt error[{line}:{col}]: {} ({})", self.message, self.kind.label());
        }
        #[cfg(not(debug_assertions))]
        {
            let _ = content;
            log::error!("Fmt error: {} ({})", self.message, self.kind.label());
        }
    }
}

impl Display for FmtError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at byte {}: {}", self.kind.label(), self.index, self.message)
    }
}

impl Error for FmtError {}

pub type Result<T> = std::result::Result<T, FmtError>;
