//! Generic rule-pipeline execution engine for discrete game actions.
//!
//! `verdict-core` resolves commands by running them through an ordered chain
//! of independently authored rules, each of which may read and mutate shared
//! state and may succeed, fail, or decline to apply. The crate is
//! domain-agnostic: it knows nothing about dice, armor class, or spell
//! levels, and is reused unchanged by every game subsystem (combat,
//! spellcasting, exploration, NPC behavior).
//!
//! # Architecture
//!
//! ```text
//! caller ── Command::execute ──► RuleEngine ── chain lookup ──► RuleChain
//!               │                    │
//!               │ stage()            │ guard → apply → fold
//!               ▼                    ▼
//!        ExecutionContext   (entity store + per-dispatch scratch)
//! ```
//!
//! A caller constructs a command (parameters validated at construction) and
//! executes it against an [`ExecutionContext`]. The [`RuleEngine`] looks up
//! the [`RuleChain`] registered for the command's type and runs it as a
//! strict sequential fold: evaluate each rule's guard, apply the applicable
//! ones one at a time, and reduce the per-rule outcomes to one
//! [`CommandResult`]. Rules within a chain observe a total order, so the same
//! command, state, and randomness stream always produce the same result.
//!
//! Pipelines can be declared directly as [`RuleChain`]s of [`Rule`] values,
//! or through the staged authoring [`command`] builder, which accumulates
//! validate/load/calc/mutate/emit functions into a registered
//! [`CommandDescriptor`].

pub mod chain;
pub mod command;
pub mod context;
pub mod dsl;
pub mod entity;
pub mod engine;
pub mod error;
pub mod rule;
pub mod validation;

pub use chain::{ChainError, RuleChain};
pub use command::{Command, CommandError, CommandResult};
pub use context::{ExecutionContext, ScratchKey};
pub use dsl::{CommandBuilder, CommandDescriptor, CommandRegistry, Stage, StageFn, command};
pub use entity::{Entity, EntityId, EntityRef};
pub use engine::{EngineConfig, RuleEngine};
pub use error::{EngineError, ErrorSeverity};
pub use rule::{Rule, RuleError, RuleResult};
pub use validation::{
    FieldError, FieldRule, ValidationError, ValidationReport, Validator, custom,
    non_negative_integer, one_of, pattern, positive_integer, required, string_length,
    validate_object,
};
