//! Severity classification shared by the crate's error types.
//!
//! Each module defines its own `thiserror` enum next to the operations that
//! raise it (`RuleError`, `CommandError`, `ChainError`, `ValidationError`).
//! All of them implement [`EngineError`], so a caller holding any of those
//! errors can decide what to do next without matching every concrete type.
//!
//! Severity is about what happens after the failure, not about how loud it
//! was. The engine already guarantees nothing escapes a dispatch as a panic
//! or raw error; by the time a caller sees one of these values the command
//! has failed, and the open question is whose fault that is.

/// Whose fault a failure is, and therefore what fixes it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorSeverity {
    /// The input is wrong: malformed parameters, or an identifier with no
    /// entity behind it. Retrying the same command cannot succeed; the
    /// caller has to change what it sends.
    Validation,

    /// A contract between rules is broken, such as a scratch key the chain
    /// was supposed to stage turning up missing. Points at a bug in rule
    /// code, not at the command.
    Internal,

    /// The assembly is wrong: duplicate rule names in a chain, a pipeline
    /// that cannot be materialized. Fixed at startup, not per command.
    Config,
}

impl ErrorSeverity {
    /// Lowercase label for log fields and error reports.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Internal => "internal",
            Self::Config => "config",
        }
    }

    /// Returns true when the failure points at code or wiring rather than at
    /// the command that was dispatched.
    pub const fn is_bug(&self) -> bool {
        matches!(self, Self::Internal | Self::Config)
    }
}

/// Classification interface implemented by every error enum in the crate.
pub trait EngineError: core::fmt::Display + core::fmt::Debug {
    /// Whose fault this error is; see [`ErrorSeverity`].
    fn severity(&self) -> ErrorSeverity;

    /// Stable identifier for the variant, for metrics and test assertions.
    fn error_code(&self) -> &'static str {
        core::any::type_name::<Self>()
    }
}
