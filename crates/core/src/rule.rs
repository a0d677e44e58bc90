//! Rule abstraction: a named, prioritized unit of business logic.
//!
//! A rule is stateless between invocations. It carries only configuration
//! (name, priority) and exposes a guard plus an effect:
//!
//! - [`Rule::can_apply`] answers "does this rule apply to this command and
//!   context right now?" without mutating anything;
//! - [`Rule::apply`] performs the effect. It may mutate the context's entity
//!   store and scratch channel, and it may suspend (for example to await a
//!   randomness source). No other rule in the same chain runs while it is
//!   suspended.
//!
//! Rules communicate with later rules only through the context: the scratch
//! channel for intermediate data, the entity store for durable state.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::command::Command;
use crate::context::ExecutionContext;
use crate::entity::EntityRef;
use crate::error::{EngineError, ErrorSeverity};

/// Outcome of one rule application.
///
/// Results are collected into a per-dispatch trace and folded into a single
/// command result; they are not persisted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum RuleResult {
    /// The rule applied.
    Success {
        /// Human-readable synopsis of what the rule did.
        message: String,
        /// Optional structured payload for the caller.
        data: Option<JsonValue>,
        /// Optional log of side effects, for narration or auditing.
        effects: Vec<String>,
    },

    /// The rule could not fulfill its part of the command.
    Failure {
        /// Human-readable reason, preserved verbatim in the command result
        /// when the failure is fatal.
        message: String,
        /// A fatal failure halts the chain immediately; a soft failure is
        /// recorded and later rules still run.
        fatal: bool,
    },
}

impl RuleResult {
    /// Successful application with a message only.
    pub fn success(message: impl Into<String>) -> Self {
        Self::Success {
            message: message.into(),
            data: None,
            effects: Vec::new(),
        }
    }

    /// Successful application carrying a structured payload.
    pub fn success_with_data(message: impl Into<String>, data: JsonValue) -> Self {
        Self::Success {
            message: message.into(),
            data: Some(data),
            effects: Vec::new(),
        }
    }

    /// Appends a side-effect log entry. No-op on failures.
    pub fn with_effect(mut self, effect: impl Into<String>) -> Self {
        if let Self::Success { effects, .. } = &mut self {
            effects.push(effect.into());
        }
        self
    }

    /// Soft failure: recorded in the trace, later rules still run.
    pub fn failure(message: impl Into<String>) -> Self {
        Self::Failure {
            message: message.into(),
            fatal: false,
        }
    }

    /// Fatal failure: halts the chain and fails the whole command.
    pub fn fatal(message: impl Into<String>) -> Self {
        Self::Failure {
            message: message.into(),
            fatal: true,
        }
    }

    /// Fatal failure for a referenced entity missing from the store.
    ///
    /// Missing entities are surfaced as failing command results with the id
    /// in the message, never as a crash.
    pub fn missing_entity(entity: &EntityRef) -> Self {
        Self::fatal(format!("entity {entity} not found"))
    }

    /// Returns true for `Success`.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Returns true for a failure marked fatal.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Failure { fatal: true, .. })
    }

    /// The result's message, success or failure.
    pub fn message(&self) -> &str {
        match self {
            Self::Success { message, .. } | Self::Failure { message, .. } => message,
        }
    }

    /// The structured payload, if the rule produced one.
    pub fn data(&self) -> Option<&JsonValue> {
        match self {
            Self::Success { data, .. } => data.as_ref(),
            Self::Failure { .. } => None,
        }
    }
}

/// Error escaping a rule's `apply`.
///
/// Returning `Err` is the analogue of an uncaught throw: the engine treats it
/// as fatal to the whole chain and wraps it into a failing command result.
/// Prefer returning a [`RuleResult::failure`] for ordinary business
/// rejections; reserve errors for conditions the rule cannot express as an
/// outcome.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RuleError {
    /// A referenced entity was expected in the store but is absent.
    #[error("entity {entity} not found")]
    EntityNotFound { entity: EntityRef },

    /// An earlier rule was expected to have written a scratch key.
    #[error("scratch key '{key}' missing or carrying an unexpected payload type")]
    ScratchMissing { key: &'static str },

    /// Anything else the rule could not recover from.
    #[error("{message}")]
    Internal { message: String },
}

impl RuleError {
    /// Shorthand for [`RuleError::Internal`].
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

impl EngineError for RuleError {
    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::EntityNotFound { .. } => ErrorSeverity::Validation,
            Self::ScratchMissing { .. } => ErrorSeverity::Internal,
            Self::Internal { .. } => ErrorSeverity::Internal,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::EntityNotFound { .. } => "RULE_ENTITY_NOT_FOUND",
            Self::ScratchMissing { .. } => "RULE_SCRATCH_MISSING",
            Self::Internal { .. } => "RULE_INTERNAL",
        }
    }
}

/// One unit of business logic in a rule chain.
///
/// # Execution Order
///
/// Rules are sorted by ascending priority when their chain is registered;
/// lower values run first and registration order breaks ties. Typical ranges:
/// - `i32::MIN..0`: validation and gating rules that must run early
/// - `0`: default priority for most rules
/// - `1..`: bookkeeping and emission rules that run late
#[async_trait]
pub trait Rule: Send + Sync {
    /// Name of this rule, unique within its chain (used in logging and in
    /// command `required_rules` contracts).
    fn name(&self) -> &str;

    /// Execution priority; ascending runs first, default 0.
    fn priority(&self) -> i32 {
        0
    }

    /// Pure guard: may this rule apply to the command in the current context?
    ///
    /// Must not mutate. A false guard skips the rule; it is not an error.
    fn can_apply(&self, ctx: &ExecutionContext, command: &dyn Command) -> bool;

    /// Applies the rule's effect.
    ///
    /// Runs strictly after every earlier applicable rule in the chain has
    /// completed, and observes their context mutations.
    async fn apply(
        &self,
        ctx: &mut ExecutionContext,
        command: &dyn Command,
    ) -> Result<RuleResult, RuleError>;
}
