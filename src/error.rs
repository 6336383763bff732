use thiserror::Error;

use crate::metadata::token::Token;

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

macro_rules! invariant_error {
    ($msg:expr) => {
        crate::Error::Invariant {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Invariant {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which covers every failure this library can return.
///
/// Delta emission distinguishes two kinds of failure. Conditions caused by the user's
/// edit or by stale debug information are reported as
/// [`crate::metadata::diagnostics::Diagnostic`] entries and never surface as an `Error`.
/// Everything in this enum is fatal: the emission is abandoned and no delta or baseline
/// is published.
///
/// # Error Categories
///
/// ## Consistency Errors
/// - [`Error::Invariant`] - An internal bookkeeping rule was violated (duplicate `EncMap`
///   token, table size desynchronization, duplicate edit)
/// - [`Error::Malformed`] - Inputs handed to the engine contradict each other
///
/// ## Lookup Errors
/// - [`Error::SymbolNotFound`] - A symbol handle does not belong to the compilation
/// - [`Error::RowNotFound`] - A definition that must already have a row has none
///
/// ## Encoding Errors
/// - [`Error::Signature`] - A signature could not be encoded or decoded
/// - [`Error::OutOfBounds`] - A read went past the end of a blob
///
/// ## Control Flow
/// - [`Error::Cancelled`] - Cooperative cancellation was requested
/// - [`Error::Provider`] - A debug information or local signature provider failed
///
/// # Examples
///
/// ```rust
/// use dotdelta::Error;
///
/// fn describe(error: &Error) -> &'static str {
///     match error {
///         Error::Cancelled => "emission cancelled",
///         Error::Invariant { .. } => "internal invariant violated",
///         _ => "other failure",
///     }
/// }
///
/// assert_eq!(describe(&Error::Cancelled), "emission cancelled");
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The inputs are inconsistent and could not be processed.
    ///
    /// # Fields
    ///
    /// * `message` - Detailed description of the inconsistency
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

    /// An internal invariant of the delta engine was violated.
    ///
    /// Publishing a delta after such a failure would corrupt the metadata of a
    /// running process, so the emission always aborts.
    #[error("Invariant violated - {file}:{line}: {message}")]
    Invariant {
        /// Description of the violated invariant
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// An out of bound access was attempted while reading a blob.
    #[error("Out of Bound read would have occurred!")]
    OutOfBounds,

    /// A symbol handle could not be resolved against its compilation.
    #[error("Symbol not found - {0}")]
    SymbolNotFound(String),

    /// A definition that is expected to already exist in a previous generation has no row.
    #[error("No row for {0}")]
    RowNotFound(String),

    /// A signature could not be encoded or decoded.
    #[error("Signature - {0}")]
    Signature(String),

    /// A debug information or local signature provider failed for the given method.
    #[error("Provider failed for method {token}: {message}")]
    Provider {
        /// Method token the provider was queried for
        token: Token,
        /// Message reported by the provider
        message: String,
    },

    /// The emission was cancelled through its [`crate::emit::CancellationToken`].
    #[error("Operation was cancelled")]
    Cancelled,

    /// Generic error for miscellaneous failures.
    #[error("{0}")]
    Error(String),
}
