use thiserror::Error;

use crate::parsers::Format;
use crate::threshold::ExpressionError;

#[derive(Error, Debug)]
pub enum CovgateError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("XML parse error at position {position}: {source}")]
    Xml {
        source: quick_xml::Error,
        position: usize,
    },

    #[error("Invalid path pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    /// The input does not carry this decoder's signature. The sniffer
    /// treats this as "try the next format".
    #[error("Input is not {format}: {reason}")]
    FormatMismatch { format: Format, reason: String },

    #[error("Unrecognized coverage report format")]
    UnrecognizedFormat,

    #[error("Malformed {format} record at line {line}: {reason}")]
    MalformedRecord {
        format: Format,
        line: usize,
        reason: String,
    },

    #[error("Unknown format: '{0}'. Supported: lcov, gocover, simplecov, cobertura, clover, jacoco")]
    UnknownFormat(String),

    #[error("Invalid expression: {0}")]
    Expression(#[from] ExpressionError),

    #[error("Metric not measured: {0}")]
    Unmeasured(String),
}

impl CovgateError {
    pub(crate) fn mismatch(format: Format, reason: impl Into<String>) -> Self {
        CovgateError::FormatMismatch {
            format,
            reason: reason.into(),
        }
    }

    pub(crate) fn malformed(format: Format, line: usize, reason: impl Into<String>) -> Self {
        CovgateError::MalformedRecord {
            format,
            line,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CovgateError>;
