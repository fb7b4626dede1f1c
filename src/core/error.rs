//! Error handling for solkit
//!
//! The error system follows two principles:
//! 1. **Strongly-typed errors** ([`SolkitError`]) so the engine can decide what is
//!    fatal to a single item and what is fatal to a whole run
//! 2. **User-friendly messages** ([`ErrorContext`]) with suggestions for CLI users
//!
//! # Error Categories
//!
//! - **Extraction**: [`SolkitError::ExtractionFault`] (recovered locally, never aborts)
//! - **Ordering**: [`SolkitError::CyclicalDependency`] (aborts the whole run)
//! - **Per-item deployment**: [`SolkitError::UnresolvedReference`],
//!   [`SolkitError::CreateFailure`], [`SolkitError::PostProcessFailure`],
//!   [`SolkitError::DependencyFailed`], [`SolkitError::Cancelled`]
//! - **Projection**: [`SolkitError::LookupFailure`]
//! - **Ambient**: portal transport, configuration, solution files, I/O
//!
//! # Examples
//!
//! ```rust,no_run
//! use solkit_cli::core::{SolkitError, user_friendly_error};
//!
//! let err = SolkitError::CyclicalDependency {
//!     ids: vec!["a".into(), "b".into()],
//!     chain: "a → b → a".into(),
//! };
//! let ctx = user_friendly_error(anyhow::Error::from(err));
//! ctx.display();
//! ```

use colored::Colorize;
use std::fmt;
use thiserror::Error;

/// The main error type for solkit operations.
///
/// Per-item variants carry the *original* item identifier so that a
/// deployment report can attribute every failure to the item that was
/// captured, not to whatever identifier it might have received remotely.
#[derive(Error, Debug)]
pub enum SolkitError {
    /// A segment of an item body had the wrong shape for its kind's
    /// extraction rule. Extraction continues with partial results.
    #[error("Malformed segment '{path}' in item '{item}': {reason}")]
    ExtractionFault {
        /// Item whose body was being scanned
        item: String,
        /// JSON-pointer style location of the malformed segment
        path: String,
        /// What was expected at that location
        reason: String,
    },

    /// No valid build order exists.
    ///
    /// `ids` lists every item left unordered when the sort stalled; `chain`
    /// shows one concrete cycle through them.
    #[error("Circular dependency detected: {chain}")]
    CyclicalDependency {
        /// Items that could not be ordered
        ids: Vec<String>,
        /// Human readable cycle, e.g. `a → b → a`
        chain: String,
    },

    /// A placeholder referenced an item that has not been created yet.
    #[error("Unresolved reference '{reference}' in item '{item}'")]
    UnresolvedReference {
        /// Item being resolved
        item: String,
        /// The placeholder token that could not be resolved
        reference: String,
    },

    /// The remote create call failed.
    #[error("Failed to create item '{item}': {reason}")]
    CreateFailure {
        /// Original item identifier
        item: String,
        /// Reason reported by the remote service
        reason: String,
    },

    /// A follow-up call after creation failed. The created resource is kept.
    #[error("Post-processing failed for item '{item}': {reason}")]
    PostProcessFailure {
        /// Original item identifier
        item: String,
        /// Reason reported by the remote service
        reason: String,
    },

    /// The item was skipped because something it depends on failed.
    #[error("Item '{item}' skipped because dependency '{dependency}' failed: {reason}")]
    DependencyFailed {
        /// Item that was skipped
        item: String,
        /// First failed dependency
        dependency: String,
        /// The dependency's own failure reason
        reason: String,
    },

    /// Hierarchy projection referenced an item that is not in the collection.
    #[error("Item '{id}' not found")]
    LookupFailure {
        /// Identifier that could not be found
        id: String,
    },

    /// The run was cancelled before this item finished.
    #[error("Deployment cancelled before item '{item}' completed")]
    Cancelled {
        /// Item that did not complete
        item: String,
    },

    /// A second mapping was recorded for the same original identifier.
    #[error("Identifier '{id}' already has a recorded mapping")]
    DuplicateMapping {
        /// Original identifier
        id: String,
    },

    /// The remote portal returned an error or could not be reached.
    #[error("Portal request failed: {operation}: {reason}")]
    Portal {
        /// The request that failed, e.g. `fetch item abc`
        operation: String,
        /// Reason for the failure
        reason: String,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    ConfigError {
        /// Description of the configuration error
        message: String,
    },

    /// Solution file could not be parsed
    #[error("Invalid solution file {file}")]
    SolutionParse {
        /// Path of the solution file
        file: String,
        /// Specific reason for the parsing failure
        reason: String,
    },

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// Other error
    #[error("{message}")]
    Other {
        /// Generic error message
        message: String,
    },
}

impl SolkitError {
    /// Short machine-friendly label for reports and progress output.
    #[must_use]
    pub fn kind_label(&self) -> &'static str {
        match self {
            Self::ExtractionFault { .. } => "extraction-fault",
            Self::CyclicalDependency { .. } => "cyclical-dependency",
            Self::UnresolvedReference { .. } => "unresolved-reference",
            Self::CreateFailure { .. } => "create-failure",
            Self::PostProcessFailure { .. } => "post-process-failure",
            Self::DependencyFailed { .. } => "dependency-failed",
            Self::LookupFailure { .. } => "lookup-failure",
            Self::Cancelled { .. } => "cancelled",
            Self::DuplicateMapping { .. } => "duplicate-mapping",
            Self::Portal { .. } => "portal",
            Self::ConfigError { .. } => "config",
            Self::SolutionParse { .. } => "solution-parse",
            Self::IoError(_) => "io",
            Self::JsonError(_) => "json",
            Self::TomlError(_) => "toml",
            Self::Other { .. } => "other",
        }
    }
}

impl Clone for SolkitError {
    fn clone(&self) -> Self {
        match self {
            Self::ExtractionFault {
                item,
                path,
                reason,
            } => Self::ExtractionFault {
                item: item.clone(),
                path: path.clone(),
                reason: reason.clone(),
            },
            Self::CyclicalDependency {
                ids,
                chain,
            } => Self::CyclicalDependency {
                ids: ids.clone(),
                chain: chain.clone(),
            },
            Self::UnresolvedReference {
                item,
                reference,
            } => Self::UnresolvedReference {
                item: item.clone(),
                reference: reference.clone(),
            },
            Self::CreateFailure {
                item,
                reason,
            } => Self::CreateFailure {
                item: item.clone(),
                reason: reason.clone(),
            },
            Self::PostProcessFailure {
                item,
                reason,
            } => Self::PostProcessFailure {
                item: item.clone(),
                reason: reason.clone(),
            },
            Self::DependencyFailed {
                item,
                dependency,
                reason,
            } => Self::DependencyFailed {
                item: item.clone(),
                dependency: dependency.clone(),
                reason: reason.clone(),
            },
            Self::LookupFailure {
                id,
            } => Self::LookupFailure {
                id: id.clone(),
            },
            Self::Cancelled {
                item,
            } => Self::Cancelled {
                item: item.clone(),
            },
            Self::DuplicateMapping {
                id,
            } => Self::DuplicateMapping {
                id: id.clone(),
            },
            Self::Portal {
                operation,
                reason,
            } => Self::Portal {
                operation: operation.clone(),
                reason: reason.clone(),
            },
            Self::ConfigError {
                message,
            } => Self::ConfigError {
                message: message.clone(),
            },
            Self::SolutionParse {
                file,
                reason,
            } => Self::SolutionParse {
                file: file.clone(),
                reason: reason.clone(),
            },
            // For errors that don't implement Clone, convert to Other
            Self::IoError(e) => Self::Other {
                message: format!("IO error: {e}"),
            },
            Self::JsonError(e) => Self::Other {
                message: format!("JSON error: {e}"),
            },
            Self::TomlError(e) => Self::Other {
                message: format!("TOML parsing error: {e}"),
            },
            Self::Other {
                message,
            } => Self::Other {
                message: message.clone(),
            },
        }
    }
}

/// Error context wrapper that provides user-friendly error information.
///
/// Displayed as:
/// 1. **error**: the main message in red
/// 2. **details**: extra context in yellow (optional)
/// 3. **suggestion**: actionable next step in green (optional)
#[derive(Debug)]
pub struct ErrorContext {
    /// The underlying error
    pub error: SolkitError,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a new error context with no suggestion or details.
    #[must_use]
    pub const fn new(error: SolkitError) -> Self {
        Self {
            error,
            suggestion: None,
            details: None,
        }
    }

    /// Add a suggestion for resolving the error.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add additional details explaining the error.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Print the error to stderr with terminal colors.
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.error);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error into an [`ErrorContext`] with suggestions where possible.
///
/// Known [`SolkitError`] variants get tailored suggestions; I/O and TOML
/// errors are mapped to their closest variant; anything else keeps its full
/// cause chain so nothing is lost in the CLI output.
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    if let Some(solkit_error) = error.downcast_ref::<SolkitError>() {
        let context = create_error_context(solkit_error.clone());
        // Outer context usually names the file or command involved
        let outer = error.to_string();
        if context.details.is_none() && outer != solkit_error.to_string() {
            return context.with_details(outer);
        }
        return context;
    }

    if let Some(io_error) = error.downcast_ref::<std::io::Error>()
        && io_error.kind() == std::io::ErrorKind::NotFound
    {
        return ErrorContext::new(SolkitError::Other {
            message: error.to_string(),
        })
        .with_suggestion("Check that the file exists and the path is correct");
    }

    if let Some(toml_error) = error.downcast_ref::<toml::de::Error>() {
        return ErrorContext::new(SolkitError::ConfigError {
            message: toml_error.to_string(),
        })
        .with_suggestion("Check the TOML syntax in your solkit config file");
    }

    // Generic error - include the full error chain for better diagnostics
    let mut message = error.to_string();
    let chain: Vec<String> = error.chain().skip(1).map(std::string::ToString::to_string).collect();

    if !chain.is_empty() {
        message.push_str("\n\nCaused by:");
        for (i, cause) in chain.iter().enumerate() {
            message.push_str(&format!("\n  {}: {}", i + 1, cause));
        }
    }

    ErrorContext::new(SolkitError::Other {
        message,
    })
}

fn create_error_context(error: SolkitError) -> ErrorContext {
    match &error {
        SolkitError::CyclicalDependency {
            ids,
            ..
        } => {
            let count = ids.len();
            ErrorContext::new(error)
                .with_suggestion("Remove one of the references in the cycle and capture the solution again")
                .with_details(format!(
                    "{count} item(s) could not be ordered; no deployment order exists while the cycle remains"
                ))
        }
        SolkitError::UnresolvedReference {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Run 'solkit validate' to list placeholders that point outside the solution")
            .with_details("Every {{id.param}} placeholder must name an item created earlier in the run"),
        SolkitError::LookupFailure {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Use 'solkit tree' without --strict to skip references to missing items"),
        SolkitError::Portal {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Check the portal URL and token with 'solkit config show'"),
        SolkitError::ConfigError {
            ..
        } => ErrorContext::new(error)
            .with_suggestion("Run 'solkit config init' to create a config file with example values"),
        SolkitError::SolutionParse {
            reason,
            ..
        } => {
            let details = reason.clone();
            ErrorContext::new(error)
                .with_suggestion("Re-capture the solution or fix the JSON by hand")
                .with_details(details)
        }
        _ => ErrorContext::new(error),
    }
}
