//! Centralised error hierarchy for the static stages of **slox**.
//!
//! The scanner, parser and resolver convert their failure modes into one of
//! the variants defined here. Runtime failures live next to the evaluator in
//! [`crate::interpreter::InterpretError`] because they carry runtime values.
//!
//! The module **does not** print diagnostics itself; the
//! [`Session`](crate::session::Session) decides where they go.

use std::io;
use thiserror::Error;

use log::info;

/// Canonical static-diagnostic type.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SloxError {
    /// Lexical (scanner) error with source line information.
    #[error("[line {line}] ScannerError: {message}")]
    Lex {
        /// Human‑readable description.
        message: String,

        /// 1‑based line where the error occurred.
        line: usize,
    },

    /// Syntactic (parser) error. `location` is `"N at 'lexeme'"` or
    /// `"N at end"`.
    #[error("[line {location}] ParserError: {message}")]
    Parse {
        message: String,
        location: String,
        line: usize,
    },

    /// Static‑analysis failure (scope misuse, self‑inheritance, ...).
    #[error("[line {line}] ResolverError: {message}")]
    Resolve { message: String, line: usize },

    /// Wrapper around `std::io::Error` (transparent).  Enables `?` on I/O ops.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// UTF‑8 decoding failure when ingesting external text.
    #[error(transparent)]
    Utf8(#[from] std::string::FromUtf8Error),
}

impl SloxError {
    /// Helper constructor for the **scanner**.
    pub fn lex<S: Into<String>>(line: usize, msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating Lex error: line={}, msg={}", line, message);

        SloxError::Lex { message, line }
    }

    /// Helper constructor for the **parser**.
    pub fn parse<L: Into<String>, S: Into<String>>(line: usize, location: L, msg: S) -> Self {
        let message: String = msg.into();
        let location: String = location.into();

        info!("Creating Parse error: at={}, msg={}", location, message);

        SloxError::Parse {
            message,
            location,
            line,
        }
    }

    /// Helper constructor for the **resolver**.
    pub fn resolve<S: Into<String>>(line: usize, msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating Resolve error: line={}, msg={}", line, message);

        SloxError::Resolve { message, line }
    }

    /// Source line the diagnostic points at, when it has one.
    pub fn line(&self) -> Option<usize> {
        match self {
            SloxError::Lex { line, .. }
            | SloxError::Parse { line, .. }
            | SloxError::Resolve { line, .. } => Some(*line),
            SloxError::Io(_) | SloxError::Utf8(_) => None,
        }
    }

    /// The bare message without the location prefix.
    pub fn message(&self) -> String {
        match self {
            SloxError::Lex { message, .. }
            | SloxError::Parse { message, .. }
            | SloxError::Resolve { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

/// Crate‑wide `Result` alias.
pub type Result<T> = std::result::Result<T, SloxError>;
