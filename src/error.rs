//! Error types for the virtual machine

use std::fmt;

use thiserror::Error;

use crate::value::JsValue;

/// Source location information for error messages
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SourceLocation {
    pub source_url: Option<String>,
    pub line: u32,
    pub column: u32,
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source_url {
            Some(url) => write!(f, "{}:{}:{}", url, self.line, self.column),
            None => write!(f, "{}:{}", self.line, self.column),
        }
    }
}

/// Main error type for the interpreter
///
/// The first four variants are raised by builtins and the dispatch loop and
/// become ordinary catchable script values once unwinding reaches a frame.
/// `Exception` is what the host sees for an uncaught script throw.
/// `Timeout` and `Internal` are never visible to script `catch`.
#[derive(Debug, Error)]
pub enum JsError {
    #[error("SyntaxError: {message} at {location}")]
    SyntaxError {
        message: String,
        location: SourceLocation,
    },

    #[error("TypeError: {message}")]
    TypeError { message: String },

    #[error("ReferenceError: {name} is not defined")]
    ReferenceError { name: String },

    #[error("RangeError: {message}")]
    RangeError { message: String },

    #[error("Uncaught {message}{}", format_location(.location))]
    Exception {
        value: JsValue,
        message: String,
        location: Option<SourceLocation>,
    },

    /// Script was interrupted by the watchdog
    #[error("Execution timeout: script ran for {elapsed_ms}ms (limit {timeout_ms}ms)")]
    Timeout { timeout_ms: u64, elapsed_ms: u64 },

    /// Broken invariant in the compiler, heap or register file
    #[error("Internal error: {0}")]
    Internal(String),
}

fn format_location(location: &Option<SourceLocation>) -> String {
    match location {
        Some(loc) => format!(" at {}", loc),
        None => String::new(),
    }
}

impl JsError {
    pub fn syntax_error(message: impl Into<String>, line: u32, column: u32) -> Self {
        JsError::SyntaxError {
            message: message.into(),
            location: SourceLocation {
                source_url: None,
                line,
                column,
            },
        }
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        JsError::TypeError {
            message: message.into(),
        }
    }

    pub fn reference_error(name: impl Into<String>) -> Self {
        JsError::ReferenceError { name: name.into() }
    }

    pub fn range_error(message: impl Into<String>) -> Self {
        JsError::RangeError {
            message: message.into(),
        }
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        JsError::Internal(message.into())
    }

    pub fn stack_overflow() -> Self {
        JsError::range_error("Maximum call stack size exceeded")
    }

    /// Whether a script-level `catch` may observe this error
    pub fn is_catchable(&self) -> bool {
        !matches!(self, JsError::Timeout { .. } | JsError::Internal(_))
    }

    /// Constructor name of the Error object this error becomes when caught
    pub fn error_name(&self) -> Option<&'static str> {
        match self {
            JsError::SyntaxError { .. } => Some("SyntaxError"),
            JsError::TypeError { .. } => Some("TypeError"),
            JsError::ReferenceError { .. } => Some("ReferenceError"),
            JsError::RangeError { .. } => Some("RangeError"),
            JsError::Exception { .. } | JsError::Timeout { .. } | JsError::Internal(_) => None,
        }
    }

    /// Message text for the Error object this error becomes when caught
    pub fn script_message(&self) -> String {
        match self {
            JsError::SyntaxError { message, .. }
            | JsError::TypeError { message }
            | JsError::RangeError { message } => message.clone(),
            JsError::ReferenceError { name } => format!("{} is not defined", name),
            JsError::Exception { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }

    /// The thrown script value, if this is an uncaught script exception
    pub fn thrown_value(&self) -> Option<&JsValue> {
        match self {
            JsError::Exception { value, .. } => Some(value),
            _ => None,
        }
    }
}
