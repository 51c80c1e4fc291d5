use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;
use crate::rules::RuleError;

/// Location of a syntax error inside the decoded document text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextPosition {
    /// Byte offset into the decoded (UTF-8) text
    pub offset: usize,
    /// 1-based line number
    pub line: usize,
    /// 1-based column, counted in characters
    pub column: usize,
}

impl TextPosition {
    /// Resolve a byte offset to line and column
    pub fn locate(text: &str, offset: usize) -> Self {
        let offset = offset.min(text.len());
        let before = text.get(..offset).unwrap_or(text);
        let line_start = memchr::memrchr(b'\n', before.as_bytes()).map_or(0, |i| i + 1);

        Self {
            offset,
            line: memchr::memchr_iter(b'\n', before.as_bytes()).count() + 1,
            column: before[line_start..].chars().count() + 1,
        }
    }
}

impl fmt::Display for TextPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

/// Failure to turn document bytes into a configuration tree
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("Syntax error at {position}: {message}")]
    Syntax {
        position: TextPosition,
        message: String,
    },

    #[error("Document is empty")]
    Empty,

    #[error("Unsupported encoding: {0}")]
    Encoding(String),
}

/// Errors of the ingestion layer wrapped around the core
#[derive(Error, Debug)]
pub enum AppError {
    #[error("IO error: {path} - {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {file}: {source}")]
    Parse {
        file: PathBuf,
        #[source]
        source: ParseError,
    },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid rule set: {0}")]
    Rule(#[from] RuleError),
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;

/// Tree builder result type alias
pub type ParseResult<T> = std::result::Result<T, ParseError>;
