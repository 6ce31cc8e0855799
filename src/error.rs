//! Error types for the fallible construction paths.
//!
//! Evaluating and combining interned specs is total; only leaves that carry
//! user-supplied patterns can be rejected.

/// Error when constructing an exclude spec.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExcludeError {
    /// No pattern matcher is registered under this name.
    #[error("Unknown pattern matcher: {0}")]
    UnknownMatcher(String),
    /// The matcher could not compile one of the patterns.
    #[error("Invalid {matcher} pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// Name of the matcher that rejected the pattern.
        matcher: String,
        /// The offending pattern.
        pattern: String,
        /// Why compilation failed.
        reason: String,
    },
}
