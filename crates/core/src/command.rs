//! Command contract: a validated, immutable request to perform one action.
//!
//! Commands are authored as plain types implementing [`Command`], composed
//! into the engine rather than inheriting from a base class. A command's
//! constructor is expected to validate its parameters with a
//! [`crate::validation::Validator`] and fail construction on bad input, so
//! every live command instance carries well-formed parameters.
//!
//! At runtime the provided [`Command::execute`] drives the whole flow: probe
//! the cheap precondition, reinitialize the scratch area, stage
//! command-specific data, then hand the heavy lifting to the rule engine.
//! Nothing prevents executing one instance twice; each execution is
//! independent and re-reads the context.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::context::ExecutionContext;
use crate::engine::RuleEngine;
use crate::entity::EntityRef;
use crate::error::{EngineError, ErrorSeverity};
use crate::validation::ValidationError;

static NULL_PARAMS: JsonValue = JsonValue::Null;

/// The single outcome returned to a command's caller.
///
/// Always produced, even under internal failure; only construction-time
/// parameter validation may fail before a result exists.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CommandResult {
    /// Whether the command's intent was fulfilled.
    pub success: bool,
    /// Human-readable synopsis of what happened.
    pub message: String,
    /// Optional structured payload for the caller.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<JsonValue>,
}

impl CommandResult {
    /// Successful outcome with a message only.
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: None,
        }
    }

    /// Successful outcome carrying a structured payload.
    pub fn success_with_data(message: impl Into<String>, data: JsonValue) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
        }
    }

    /// Failed outcome.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
        }
    }
}

/// Errors raised while constructing or staging a command.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    /// Parameters failed validation; construction must not produce a command.
    #[error("invalid parameters: {0}")]
    InvalidParameters(#[from] ValidationError),

    /// A referenced entity has no value in the store.
    #[error("entity {entity} not found")]
    EntityNotFound { entity: EntityRef },

    /// Staging command data into the transient context failed.
    #[error("staging failed: {message}")]
    StagingFailed { message: String },
}

impl CommandError {
    /// Shorthand for [`CommandError::StagingFailed`].
    pub fn staging(message: impl Into<String>) -> Self {
        Self::StagingFailed {
            message: message.into(),
        }
    }
}

impl EngineError for CommandError {
    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::InvalidParameters(_) => ErrorSeverity::Validation,
            Self::EntityNotFound { .. } => ErrorSeverity::Validation,
            Self::StagingFailed { .. } => ErrorSeverity::Internal,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidParameters(_) => "COMMAND_INVALID_PARAMETERS",
            Self::EntityNotFound { .. } => "COMMAND_ENTITY_NOT_FOUND",
            Self::StagingFailed { .. } => "COMMAND_STAGING_FAILED",
        }
    }
}

/// A validated, immutable request to perform one game action.
#[async_trait]
pub trait Command: Send + Sync {
    /// The command type tag; the engine resolves the rule chain by this
    /// exact string. Command types are a closed set of constants, one per
    /// supported action.
    fn kind(&self) -> &str;

    /// The entity performing the action.
    fn actor(&self) -> &EntityRef;

    /// Targets of the action, in order. May be empty.
    fn targets(&self) -> &[EntityRef] {
        &[]
    }

    /// The command's validated parameter object.
    fn params(&self) -> &JsonValue {
        &NULL_PARAMS
    }

    /// Cheap local precondition, callers may probe it before paying for a
    /// full dispatch. Default: always executable.
    fn can_execute(&self, _ctx: &ExecutionContext) -> bool {
        true
    }

    /// Names of rules this command expects in its registered chain.
    ///
    /// A machine-checkable contract between command authors and chain
    /// authors; the engine verifies it at dispatch according to its
    /// configuration.
    fn required_rules(&self) -> &[&'static str] {
        &[]
    }

    /// Writes command-specific data into the scratch channel before the
    /// chain runs. Default: nothing to stage.
    fn stage(&self, _ctx: &mut ExecutionContext) -> Result<(), CommandError> {
        Ok(())
    }

    /// Runs the command against the context, delegating to the engine.
    ///
    /// The scratch area is reinitialized here, so staged data survives into
    /// the chain run and nothing from a previous dispatch leaks in. A staging
    /// error becomes a failing result rather than propagating.
    async fn execute(&self, engine: &RuleEngine, ctx: &mut ExecutionContext) -> CommandResult
    where
        Self: Sized,
    {
        if !self.can_execute(ctx) {
            return CommandResult::failure(format!(
                "command '{}' cannot execute in the current context",
                self.kind()
            ));
        }

        ctx.begin_dispatch();
        if let Err(error) = self.stage(ctx) {
            return CommandResult::failure(format!(
                "failed to stage command '{}': {error}",
                self.kind()
            ));
        }

        engine.execute(ctx, self).await
    }
}
