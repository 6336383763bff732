//! Diagnostics collection for delta emission.
//!
//! Some conditions that prevent a delta from being emitted are caused by the user's edit
//! or by stale debug information rather than by a bug in the engine. They are collected
//! as [`Diagnostic`] entries tied to the offending symbol and its metadata token, and the
//! emission is reported as unsuccessful instead of failing with a [`crate::Error`].
//!
//! The [`Diagnostics`] container uses `boxcar::Vec` for thread-safe, lock-free append
//! operations, so a shared container can collect entries from a host that drives
//! several emissions at once.
//!
//! # Key Components
//!
//! - [`Diagnostics`] - Thread-safe container for diagnostic entries
//! - [`Diagnostic`] - Individual diagnostic entry with severity and context
//! - [`DiagnosticSeverity`] - Severity level (Info, Warning, Error)
//! - [`DiagnosticCategory`] - Category of the diagnostic source
//! - [`DiagnosticCode`] - Well-known conditions reported by the engine
//!
//! # Usage Examples
//!
//! ```rust
//! use dotdelta::metadata::diagnostics::{
//!     Diagnostic, DiagnosticCategory, DiagnosticCode, Diagnostics,
//! };
//! use dotdelta::metadata::token::Token;
//!
//! let diagnostics = Diagnostics::new();
//!
//! diagnostics.push(
//!     Diagnostic::from_code(
//!         DiagnosticCode::InvalidDebugInfo,
//!         "Unable to read debug information of 'C.M'",
//!     )
//!     .with_token(Token::new(0x0600_0001)),
//! );
//!
//! assert!(diagnostics.has_errors());
//! assert_eq!(diagnostics.by_category(DiagnosticCategory::DebugInfo).len(), 1);
//! ```
//!
//! # Thread Safety
//!
//! All types in this module are [`Send`] and [`Sync`].

use std::fmt::{self, Write};

use crate::{metadata::token::Token, symbols::SymbolId};

/// Severity level of a diagnostic entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticSeverity {
    /// Informational message, not indicating a problem.
    Info,

    /// Something unusual that did not prevent the delta from being emitted.
    Warning,

    /// A condition that makes the emission unsuccessful.
    Error,
}

impl fmt::Display for DiagnosticSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticSeverity::Info => write!(f, "INFO"),
            DiagnosticSeverity::Warning => write!(f, "WARN"),
            DiagnosticSeverity::Error => write!(f, "ERROR"),
        }
    }
}

/// Category indicating the source of a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticCategory {
    /// Debug information or local signatures of the previous generation.
    DebugInfo,

    /// State machine lowering of async and iterator methods.
    StateMachine,

    /// Token references emitted into method bodies.
    Reference,

    /// Row allocation and table emission.
    Emit,

    /// Anything else.
    General,
}

impl fmt::Display for DiagnosticCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticCategory::DebugInfo => write!(f, "DebugInfo"),
            DiagnosticCategory::StateMachine => write!(f, "StateMachine"),
            DiagnosticCategory::Reference => write!(f, "Reference"),
            DiagnosticCategory::Emit => write!(f, "Emit"),
            DiagnosticCategory::General => write!(f, "General"),
        }
    }
}

/// Well-known conditions reported by the delta engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagnosticCode {
    /// The debug information or local signature of a method in a previous generation is
    /// missing or cannot be decoded, so its variable slots cannot be preserved.
    InvalidDebugInfo,

    /// A method became an async or iterator method but the runtime attribute that marks
    /// such methods is not available to the compilation.
    MissingStateMachineAttribute,

    /// A method body references a member added in the same generation through a
    /// member reference, which the runtime cannot resolve.
    EncReferenceToAddedMember,
}

impl DiagnosticCode {
    /// Returns the category the code belongs to.
    #[must_use]
    pub fn category(&self) -> DiagnosticCategory {
        match self {
            DiagnosticCode::InvalidDebugInfo => DiagnosticCategory::DebugInfo,
            DiagnosticCode::MissingStateMachineAttribute => DiagnosticCategory::StateMachine,
            DiagnosticCode::EncReferenceToAddedMember => DiagnosticCategory::Reference,
        }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiagnosticCode::InvalidDebugInfo => write!(f, "ENC0001"),
            DiagnosticCode::MissingStateMachineAttribute => write!(f, "ENC0002"),
            DiagnosticCode::EncReferenceToAddedMember => write!(f, "ENC0003"),
        }
    }
}

/// A single diagnostic entry with context information.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    /// Severity level of this diagnostic.
    pub severity: DiagnosticSeverity,

    /// Category indicating the source of this diagnostic.
    pub category: DiagnosticCategory,

    /// Well-known condition, if any.
    pub code: Option<DiagnosticCode>,

    /// Human-readable description of the issue.
    pub message: String,

    /// Symbol of the current compilation the issue is attached to.
    pub symbol: Option<SymbolId>,

    /// Metadata token of the symbol in the previous generation.
    pub token: Option<Token>,
}

impl Diagnostic {
    /// Creates a new diagnostic entry.
    ///
    /// # Arguments
    ///
    /// * `severity` - Severity level of the diagnostic
    /// * `category` - Category of the diagnostic source
    /// * `message` - Human-readable description
    pub fn new(
        severity: DiagnosticSeverity,
        category: DiagnosticCategory,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            category,
            code: None,
            message: message.into(),
            symbol: None,
            token: None,
        }
    }

    /// Creates an error diagnostic for a well-known condition.
    pub fn from_code(code: DiagnosticCode, message: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            ..Self::new(DiagnosticSeverity::Error, code.category(), message)
        }
    }

    /// Attaches the symbol the diagnostic is about.
    #[must_use]
    pub fn with_symbol(mut self, symbol: SymbolId) -> Self {
        self.symbol = Some(symbol);
        self
    }

    /// Attaches a metadata token.
    #[must_use]
    pub fn with_token(mut self, token: Token) -> Self {
        self.token = Some(token);
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.severity, self.category)?;
        if let Some(code) = self.code {
            write!(f, " {}", code)?;
        }
        write!(f, ": {}", self.message)?;

        if let Some(symbol) = self.symbol {
            write!(f, " (symbol: {})", symbol)?;
        }

        if let Some(token) = self.token {
            write!(f, " (token: {})", token)?;
        }

        Ok(())
    }
}

/// Thread-safe container for collecting diagnostic entries.
///
/// Uses `boxcar::Vec` internally for lock-free concurrent append operations.
#[derive(Debug)]
pub struct Diagnostics {
    entries: boxcar::Vec<Diagnostic>,
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self::new()
    }
}

impl Diagnostics {
    /// Creates a new empty diagnostics container.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: boxcar::Vec::new(),
        }
    }

    /// Adds an informational diagnostic.
    pub fn info(&self, category: DiagnosticCategory, message: impl Into<String>) {
        self.push(Diagnostic::new(DiagnosticSeverity::Info, category, message));
    }

    /// Adds a warning diagnostic.
    pub fn warning(&self, category: DiagnosticCategory, message: impl Into<String>) {
        self.push(Diagnostic::new(
            DiagnosticSeverity::Warning,
            category,
            message,
        ));
    }

    /// Adds a diagnostic entry directly.
    pub fn push(&self, diagnostic: Diagnostic) {
        self.entries.push(diagnostic);
    }

    /// Returns true if any diagnostics have been collected.
    pub fn has_any(&self) -> bool {
        self.entries.count() > 0
    }

    /// Returns true if any error-level diagnostics have been collected.
    pub fn has_errors(&self) -> bool {
        self.entries
            .iter()
            .any(|(_, d)| d.severity == DiagnosticSeverity::Error)
    }

    /// Returns true if a diagnostic with the given code has been collected.
    pub fn has_code(&self, code: DiagnosticCode) -> bool {
        self.entries.iter().any(|(_, d)| d.code == Some(code))
    }

    /// Returns the total number of diagnostics.
    pub fn count(&self) -> usize {
        self.entries.count()
    }

    /// Returns the number of error-level diagnostics.
    pub fn error_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|(_, d)| d.severity == DiagnosticSeverity::Error)
            .count()
    }

    /// Returns the number of warning-level diagnostics.
    pub fn warning_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|(_, d)| d.severity == DiagnosticSeverity::Warning)
            .count()
    }

    /// Returns an iterator over all diagnostics.
    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter().map(|(_, d)| d)
    }

    /// Returns diagnostics filtered by category.
    pub fn by_category(&self, category: DiagnosticCategory) -> Vec<&Diagnostic> {
        self.entries
            .iter()
            .filter(|(_, d)| d.category == category)
            .map(|(_, d)| d)
            .collect()
    }

    /// Formats a summary of all diagnostics for display.
    pub fn summary(&self) -> String {
        let mut output = String::new();

        let _ = writeln!(
            output,
            "Diagnostics: {} error(s), {} warning(s)",
            self.error_count(),
            self.warning_count()
        );

        for diag in self.iter() {
            let _ = writeln!(output, "  {diag}");
        }

        output
    }
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.summary())
    }
}
