//! Rule engine: chain registry and command dispatch.
//!
//! The engine maps command type identifiers to sealed rule chains and drives
//! dispatch with a guard-then-apply sequential fold:
//!
//! 1. Look up the chain for the command's type; absence is a failing result.
//! 2. Walk the chain in order. Evaluate each rule's guard; skip on false.
//! 3. Run applicable rules strictly one after another, awaiting each `apply`,
//!    so later rules deterministically observe earlier rules' mutations.
//! 4. Collect per-rule outcomes, stopping early on a fatal failure or error.
//! 5. Fold the trace into one [`CommandResult`].
//!
//! Errors internal to a rule never escape this boundary as panics or raw
//! errors; the engine converts them into structured failure results. Given
//! the same command, initial state, and randomness stream, a dispatch always
//! yields the same result.

use std::collections::HashMap;

use tracing::{debug, error, warn};

use crate::chain::{ChainError, RuleChain};
use crate::command::{Command, CommandResult};
use crate::context::ExecutionContext;
use crate::dsl::CommandDescriptor;
use crate::rule::RuleResult;

const LOG_TARGET: &str = "verdict::engine";

/// Engine-wide dispatch configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    /// When true, a dispatch fails if the command's `required_rules` name a
    /// rule missing from the registered chain. When false (the default) the
    /// gap is only logged, matching lenient startup orders where chains and
    /// commands are wired by different modules.
    pub enforce_required_rules: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            enforce_required_rules: false,
        }
    }
}

/// One entry of the per-dispatch trace.
struct RuleOutcome {
    rule: String,
    result: RuleResult,
}

/// Registry of rule chains, keyed by command type, plus the dispatcher.
#[derive(Default)]
pub struct RuleEngine {
    chains: HashMap<String, RuleChain>,
    config: EngineConfig,
}

impl RuleEngine {
    /// Creates an engine with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an engine with the given configuration.
    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            chains: HashMap::new(),
            config,
        }
    }

    /// Registers the chain for a command type, sealing it into execution
    /// order. One chain per type; re-registration replaces the previous
    /// chain (last write wins) and is logged so it cannot happen silently.
    pub fn register_chain(&mut self, command_type: impl Into<String>, mut chain: RuleChain) {
        let command_type = command_type.into();
        chain.seal();
        if self.chains.insert(command_type.clone(), chain).is_some() {
            warn!(
                target: LOG_TARGET,
                command_type = %command_type,
                "replacing previously registered rule chain"
            );
        }
    }

    /// Registers a DSL descriptor by materializing its stages as a chain.
    pub fn register_command(&mut self, descriptor: &CommandDescriptor) -> Result<(), ChainError> {
        let chain = descriptor.to_rule_chain()?;
        self.register_chain(descriptor.name(), chain);
        Ok(())
    }

    /// Returns the sealed chain for a command type, if registered.
    pub fn chain(&self, command_type: &str) -> Option<&RuleChain> {
        self.chains.get(command_type)
    }

    /// Returns true if a chain is registered for the command type.
    pub fn has_chain(&self, command_type: &str) -> bool {
        self.chains.contains_key(command_type)
    }

    /// Dispatches a command through its registered chain.
    ///
    /// Always returns a result; configuration gaps and rule errors become
    /// failing results, never panics or propagated errors. The transient
    /// scratch area is owned by the caller: `Command::execute` reinitializes
    /// it before staging, and direct callers should use
    /// [`ExecutionContext::begin_dispatch`] themselves.
    pub async fn execute(&self, ctx: &mut ExecutionContext, command: &dyn Command) -> CommandResult {
        let kind = command.kind();

        let Some(chain) = self.chains.get(kind) else {
            debug!(target: LOG_TARGET, command_type = %kind, "dispatch with no registered chain");
            return CommandResult::failure(format!(
                "no rules registered for command type '{kind}'"
            ));
        };

        if let Some(result) = self.check_required_rules(chain, command) {
            return result;
        }

        debug!(
            target: LOG_TARGET,
            command_type = %kind,
            actor = %command.actor(),
            rules = chain.len(),
            "dispatching command"
        );

        let mut trace: Vec<RuleOutcome> = Vec::with_capacity(chain.len());

        for rule in chain.rules() {
            if !rule.can_apply(ctx, command) {
                debug!(
                    target: LOG_TARGET,
                    command_type = %kind,
                    rule = rule.name(),
                    "guard declined, skipping rule"
                );
                continue;
            }

            match rule.apply(ctx, command).await {
                Ok(result) => {
                    let halt = result.is_fatal();
                    if halt {
                        error!(
                            target: LOG_TARGET,
                            command_type = %kind,
                            rule = rule.name(),
                            message = result.message(),
                            "fatal rule failure, halting chain"
                        );
                    }
                    trace.push(RuleOutcome {
                        rule: rule.name().to_owned(),
                        result,
                    });
                    if halt {
                        break;
                    }
                }
                Err(rule_error) => {
                    let message = format!("rule '{}' failed: {rule_error}", rule.name());
                    error!(
                        target: LOG_TARGET,
                        command_type = %kind,
                        rule = rule.name(),
                        error = %rule_error,
                        "rule error, halting chain"
                    );
                    trace.push(RuleOutcome {
                        rule: rule.name().to_owned(),
                        result: RuleResult::fatal(message),
                    });
                    break;
                }
            }
        }

        reduce_trace(kind, trace)
    }

    /// Verifies the command's required-rules contract against the chain.
    fn check_required_rules(
        &self,
        chain: &RuleChain,
        command: &dyn Command,
    ) -> Option<CommandResult> {
        for required in command.required_rules() {
            if chain.contains(required) {
                continue;
            }
            if self.config.enforce_required_rules {
                return Some(CommandResult::failure(format!(
                    "command '{}' requires rule '{required}' which is not registered in its chain",
                    command.kind()
                )));
            }
            warn!(
                target: LOG_TARGET,
                command_type = %command.kind(),
                rule = required,
                "required rule missing from registered chain"
            );
        }
        None
    }
}

/// Folds the dispatch trace into the single result returned to the caller.
fn reduce_trace(kind: &str, trace: Vec<RuleOutcome>) -> CommandResult {
    if let Some(fatal) = trace.iter().find(|outcome| outcome.result.is_fatal()) {
        return CommandResult::failure(fatal.result.message().to_owned());
    }

    if trace.is_empty() {
        return CommandResult::failure(format!(
            "no applicable rules for command type '{kind}'"
        ));
    }

    let data = trace
        .iter()
        .rev()
        .find_map(|outcome| outcome.result.data().cloned());

    let message = trace
        .iter()
        .map(|outcome| outcome.result.message())
        .collect::<Vec<_>>()
        .join("; ");

    debug!(
        target: LOG_TARGET,
        command_type = %kind,
        rules_applied = trace.len(),
        "dispatch complete"
    );

    CommandResult {
        success: true,
        message,
        data,
    }
}
