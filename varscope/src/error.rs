//! Error types for scoped variable handling.
//!
//! Structural errors ([`ScopeError`]) mean the frame stack no longer matches
//! the control-flow nesting that drives it. They are never retried: the actor
//! that hits one stops executing. Configuration errors ([`ConfigError`]) are
//! raised while reading a scope controller's persisted settings.

use thiserror::Error;

/// Frame stack consistency violations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScopeError {
    /// A pop was requested while only the base frame remained.
    #[error("variable scope underflow: cannot pop the base frame")]
    ScopeUnderflow,

    /// A scope finished with a different number of frames than it started with.
    #[error("variable scope depth mismatch: expected {expected} frames, found {found}")]
    DepthMismatch { expected: usize, found: usize },

    /// An exhaustion event arrived without a matching iteration start.
    #[error("scope exhausted without a matching iteration start")]
    UnbalancedExit,
}

/// Invalid scope controller configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("unrecognized scoped variable policy `{0}`")]
    UnknownPolicy(String),

    #[error("missing property `{0}`")]
    MissingProperty(String),

    #[error("invalid property definition `{0}`, expected name=value")]
    InvalidProperty(String),
}
