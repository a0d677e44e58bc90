//! Ordered rule collections, one per command type.

use std::sync::Arc;

use crate::error::{EngineError, ErrorSeverity};
use crate::rule::Rule;

/// Chain configuration errors, detected at registration time.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ChainError {
    /// Two rules in one chain share a name.
    #[error("duplicate rule name '{name}' in chain")]
    DuplicateRule { name: String },
}

impl EngineError for ChainError {
    fn severity(&self) -> ErrorSeverity {
        ErrorSeverity::Config
    }

    fn error_code(&self) -> &'static str {
        "CHAIN_DUPLICATE_RULE"
    }
}

/// The ordered rules for exactly one command type.
///
/// Chains are assembled once at startup and sealed when registered with the
/// engine: a stable sort by ascending priority, so append order breaks ties.
/// Rule names must be unique within a chain; a collision is a configuration
/// error reported at `add` time rather than silently tolerated.
#[derive(Default)]
pub struct RuleChain {
    rules: Vec<Arc<dyn Rule>>,
}

impl RuleChain {
    /// Creates an empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a rule.
    pub fn add_rule(&mut self, rule: impl Rule + 'static) -> Result<(), ChainError> {
        self.add_shared(Arc::new(rule))
    }

    /// Appends an already shared rule.
    pub fn add_shared(&mut self, rule: Arc<dyn Rule>) -> Result<(), ChainError> {
        if self.contains(rule.name()) {
            return Err(ChainError::DuplicateRule {
                name: rule.name().to_owned(),
            });
        }
        self.rules.push(rule);
        Ok(())
    }

    /// Appends several rules, stopping at the first configuration error.
    pub fn add_rules<I>(&mut self, rules: I) -> Result<(), ChainError>
    where
        I: IntoIterator<Item = Arc<dyn Rule>>,
    {
        for rule in rules {
            self.add_shared(rule)?;
        }
        Ok(())
    }

    /// Returns true if a rule with the name is present.
    pub fn contains(&self, name: &str) -> bool {
        self.rules.iter().any(|rule| rule.name() == name)
    }

    /// Number of rules in the chain.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns true if the chain holds no rules.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// The chain's rule sequence, in execution order once sealed.
    pub fn rules(&self) -> &[Arc<dyn Rule>] {
        &self.rules
    }

    /// Sorts the chain into execution order. Called once, when the engine
    /// registers the chain; stable, so equal priorities keep append order.
    pub(crate) fn seal(&mut self) {
        self.rules.sort_by_key(|rule| rule.priority());
    }
}

impl core::fmt::Debug for RuleChain {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_list()
            .entries(self.rules.iter().map(|rule| (rule.name(), rule.priority())))
            .finish()
    }
}
