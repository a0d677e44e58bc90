//! Staged authoring DSL for declaring command pipelines.
//!
//! [`command`] returns a chainable builder that accumulates stage functions
//! into the five fixed buckets of a command's lifecycle:
//!
//! - `validate`: reject malformed or inapplicable input
//! - `load`: fetch or derive the entities and lookups the pipeline needs
//! - `calc`: pure computation against loaded data, no mutation
//! - `mutate`: commit state changes
//! - `emit`: produce externally observable output (narration, events)
//!
//! The stage order is enforced by the authoring surface rather than by the
//! engine: [`CommandDescriptor::to_rule_chain`] materializes each stage into
//! a priority band, so a `mutate` function can never run before a `validate`
//! function regardless of declaration order.
//!
//! The first stage call for a name registers the descriptor in the
//! [`CommandRegistry`]; repeated builders for the same name share the same
//! descriptor until the registry is cleared. [`CommandBuilder::build`]
//! freezes the descriptor; altering a frozen descriptor is a programming
//! error and panics.

mod registry;

pub use registry::{CommandRegistry, command};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use strum::{Display, EnumIter, IntoEnumIterator};

use crate::chain::{ChainError, RuleChain};
use crate::command::Command;
use crate::context::ExecutionContext;
use crate::rule::{Rule, RuleError, RuleResult};

/// The fixed stages of a command pipeline, in execution order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Display, EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum Stage {
    Validate,
    Load,
    Calc,
    Mutate,
    Emit,
}

impl Stage {
    pub(crate) const COUNT: usize = 5;

    const fn index(self) -> usize {
        self as usize
    }

    /// Base priority of this stage's band when materialized as rules.
    /// Leaves room for up to 100 functions per stage.
    pub const fn priority_base(self) -> i32 {
        (self as i32) * 100
    }
}

/// A stage function: same shape as a rule's effect, declared inline.
pub type StageFn = Arc<
    dyn Fn(&mut ExecutionContext, &dyn Command) -> Result<RuleResult, RuleError> + Send + Sync,
>;

/// Frozen snapshot of a command pipeline: five ordered stage buckets.
///
/// Created by the builder on its first stage call and shared through the
/// registry; frozen by [`CommandBuilder::build`], after which the stage lists
/// are immutable.
pub struct CommandDescriptor {
    name: String,
    stages: RwLock<[Vec<StageFn>; Stage::COUNT]>,
    frozen: AtomicBool,
}

impl CommandDescriptor {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stages: RwLock::new(core::array::from_fn(|_| Vec::new())),
            frozen: AtomicBool::new(false),
        }
    }

    /// The command name this descriptor is registered under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns true once the descriptor has been frozen by `build()`.
    pub fn is_frozen(&self) -> bool {
        self.frozen.load(Ordering::Acquire)
    }

    /// Number of functions accumulated in one stage bucket.
    pub fn stage_count(&self, stage: Stage) -> usize {
        self.read_stages()[stage.index()].len()
    }

    /// Total number of stage functions across all buckets.
    pub fn total_stage_count(&self) -> usize {
        self.read_stages().iter().map(Vec::len).sum()
    }

    /// Materializes the pipeline as a rule chain, one rule per stage
    /// function, named `<command>.<stage>[<index>]` and prioritized so the
    /// stage order holds by construction.
    pub fn to_rule_chain(&self) -> Result<RuleChain, ChainError> {
        let stages = self.read_stages();
        let mut chain = RuleChain::new();
        for stage in Stage::iter() {
            for (index, func) in stages[stage.index()].iter().enumerate() {
                chain.add_rule(StageRule {
                    name: format!("{}.{stage}[{index}]", self.name),
                    priority: stage.priority_base() + index as i32,
                    func: Arc::clone(func),
                })?;
            }
        }
        Ok(chain)
    }

    /// Appends a stage function. Panics if the descriptor is frozen: stage
    /// lists are structurally immutable after `build()`.
    pub(crate) fn push(&self, stage: Stage, func: StageFn) {
        if self.is_frozen() {
            panic!(
                "command descriptor '{}' is frozen; stage functions cannot be added after build()",
                self.name
            );
        }
        self.write_stages()[stage.index()].push(func);
    }

    pub(crate) fn freeze(&self) {
        self.frozen.store(true, Ordering::Release);
    }

    fn read_stages(&self) -> RwLockReadGuard<'_, [Vec<StageFn>; Stage::COUNT]> {
        self.stages
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_stages(&self) -> RwLockWriteGuard<'_, [Vec<StageFn>; Stage::COUNT]> {
        self.stages
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl core::fmt::Debug for CommandDescriptor {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let stages = self.read_stages();
        let mut out = f.debug_struct("CommandDescriptor");
        out.field("name", &self.name).field("frozen", &self.is_frozen());
        for stage in Stage::iter() {
            out.field(&stage.to_string(), &stages[stage.index()].len());
        }
        out.finish()
    }
}

/// Adapter exposing one stage function as an ordinary rule.
struct StageRule {
    name: String,
    priority: i32,
    func: StageFn,
}

#[async_trait]
impl Rule for StageRule {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn can_apply(&self, _ctx: &ExecutionContext, _command: &dyn Command) -> bool {
        true
    }

    async fn apply(
        &self,
        ctx: &mut ExecutionContext,
        command: &dyn Command,
    ) -> Result<RuleResult, RuleError> {
        (self.func)(ctx, command)
    }
}

/// Chainable builder for one command's pipeline.
///
/// Obtained from [`command`] (global registry) or
/// [`CommandRegistry::command`] (an explicit registry, typically in tests).
#[derive(Debug)]
pub struct CommandBuilder<'r> {
    registry: &'r CommandRegistry,
    name: String,
    descriptor: Option<Arc<CommandDescriptor>>,
}

impl<'r> CommandBuilder<'r> {
    pub(crate) fn new(registry: &'r CommandRegistry, name: String) -> Self {
        Self {
            registry,
            name,
            descriptor: None,
        }
    }

    /// Get-or-register the shared descriptor. Registration happens here, on
    /// the first stage call, not when the builder is created.
    fn descriptor(&mut self) -> Arc<CommandDescriptor> {
        let registry = self.registry;
        let name = &self.name;
        Arc::clone(
            self.descriptor
                .get_or_insert_with(|| registry.obtain(name)),
        )
    }

    fn push<F>(mut self, stage: Stage, func: F) -> Self
    where
        F: Fn(&mut ExecutionContext, &dyn Command) -> Result<RuleResult, RuleError>
            + Send
            + Sync
            + 'static,
    {
        self.descriptor().push(stage, Arc::new(func));
        self
    }

    /// Appends an input-rejection function to the `validate` stage.
    pub fn validate<F>(self, func: F) -> Self
    where
        F: Fn(&mut ExecutionContext, &dyn Command) -> Result<RuleResult, RuleError>
            + Send
            + Sync
            + 'static,
    {
        self.push(Stage::Validate, func)
    }

    /// Appends an entity/lookup-fetching function to the `load` stage.
    pub fn load<F>(self, func: F) -> Self
    where
        F: Fn(&mut ExecutionContext, &dyn Command) -> Result<RuleResult, RuleError>
            + Send
            + Sync
            + 'static,
    {
        self.push(Stage::Load, func)
    }

    /// Appends a pure-computation function to the `calc` stage.
    pub fn calc<F>(self, func: F) -> Self
    where
        F: Fn(&mut ExecutionContext, &dyn Command) -> Result<RuleResult, RuleError>
            + Send
            + Sync
            + 'static,
    {
        self.push(Stage::Calc, func)
    }

    /// Appends a state-committing function to the `mutate` stage.
    pub fn mutate<F>(self, func: F) -> Self
    where
        F: Fn(&mut ExecutionContext, &dyn Command) -> Result<RuleResult, RuleError>
            + Send
            + Sync
            + 'static,
    {
        self.push(Stage::Mutate, func)
    }

    /// Appends an output-producing function to the `emit` stage.
    pub fn emit<F>(self, func: F) -> Self
    where
        F: Fn(&mut ExecutionContext, &dyn Command) -> Result<RuleResult, RuleError>
            + Send
            + Sync
            + 'static,
    {
        self.push(Stage::Emit, func)
    }

    /// Freezes the descriptor and returns it. Registers the descriptor if no
    /// stage call has done so yet, so freeze and registration are atomic from
    /// the perspective of other registry readers.
    pub fn build(mut self) -> Arc<CommandDescriptor> {
        let descriptor = self.descriptor();
        descriptor.freeze();
        descriptor
    }
}
