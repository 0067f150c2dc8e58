use thiserror::Error;

use crate::ir::MethodRef;

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

macro_rules! invalid_code {
    ($fmt:expr $(, $arg:expr)* $(,)?) => {
        crate::Error::InvalidCode(format!($fmt $(, $arg)*))
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// # Error Categories
///
/// ## Input Errors
/// - [`Error::Malformed`] - Textual input (s-expressions, descriptors, assembly) could not be parsed
/// - [`Error::UnknownOpcode`] - An opcode mnemonic is not part of the instruction set
/// - [`Error::CorruptSummaryCache`] - A serialized side-effect summary is malformed
///
/// ## Code Errors
/// - [`Error::InvalidCode`] - A control-flow graph failed validation
/// - [`Error::MethodFailed`] - A per-method failure, annotated with the method identity
///
/// ## I/O Errors
/// - [`Error::FileError`] - Filesystem I/O errors
///
/// # Examples
///
/// ```rust
/// use optscope::{ir::assembler, Error};
///
/// match assembler::code_from_str("((frobnicate v0))") {
///     Err(Error::UnknownOpcode(name)) => assert_eq!(name, "frobnicate"),
///     other => panic!("unexpected: {other:?}"),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The input is damaged and could not be parsed.
    ///
    /// The error includes the source location where the malformation was detected
    /// for debugging purposes.
    ///
    /// # Fields
    ///
    /// * `message` - Detailed description of what was malformed
    /// * `file` - Source file where the error was detected
    /// * `line` - Source line where the error was detected
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// An opcode mnemonic was not recognized.
    #[error("Unknown opcode - {0}")]
    UnknownOpcode(String),

    /// A serialized side-effect summary could not be decoded.
    ///
    /// Callers treat this as a cache miss and recompute the summary.
    #[error("Corrupt side-effect summary cache - {0}")]
    CorruptSummaryCache(String),

    /// Code failed control-flow graph construction or validation.
    ///
    /// Raised when a transform leaves a method in a state that cannot be
    /// rebuilt, e.g. a `move-result-pseudo` separated from its producer.
    #[error("Invalid code - {0}")]
    InvalidCode(String),

    /// A per-method operation failed.
    ///
    /// Wraps the underlying error with the identity of the offending method so
    /// that pass-level failures can be traced back.
    #[error("{method}: {source}")]
    MethodFailed {
        /// The method being processed when the failure occurred
        method: MethodRef,
        /// The underlying failure
        source: Box<Error>,
    },

    /// File I/O error.
    #[error("{0}")]
    FileError(#[from] std::io::Error),

    /// Generic error for miscellaneous failures.
    #[error("{0}")]
    Error(String),
}

impl Error {
    /// Annotates this error with the identity of the method being processed.
    ///
    /// Errors that already carry a method identity are returned unchanged.
    #[must_use]
    pub fn in_method(self, method: &MethodRef) -> Self {
        match self {
            Self::MethodFailed { .. } => self,
            other => Self::MethodFailed {
                method: method.clone(),
                source: Box::new(other),
            },
        }
    }
}
