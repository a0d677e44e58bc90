//! End-to-end dispatch scenarios: a small combat domain wired through the
//! generic engine, with a seeded dice oracle standing in for the randomness
//! collaborator.

use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{Value as JsonValue, json};

use verdict_core::{
    Command, CommandResult, Entity, EntityId, EntityRef, ExecutionContext, Rule, RuleChain,
    RuleEngine, RuleError, RuleResult, ScratchKey, ValidationError, Validator, one_of, required,
};
use verdict_dice::{DiceExpression, DiceRoller, SeededDice};

/// Routes engine tracing through the test harness when `RUST_LOG` asks for
/// it, e.g. `RUST_LOG=verdict::engine=debug` to watch the dispatch fold.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ============================================================================
// Test domain
// ============================================================================

#[derive(Clone, Debug, PartialEq)]
struct Character {
    hp: i64,
    stamina: u32,
}

impl Entity for Character {
    const KIND: &'static str = "character";
}

const ATTACK_ROLL: ScratchKey<i64> = ScratchKey::new("combat.attack_roll");

fn strike_validator() -> Validator {
    Validator::new(vec![
        required("style"),
        one_of("style", [json!("melee"), json!("ranged")]),
    ])
}

#[derive(Debug)]
struct StrikeCommand {
    actor: EntityRef,
    targets: Vec<EntityRef>,
    params: JsonValue,
}

impl StrikeCommand {
    fn new(
        actor: &EntityId<Character>,
        target: &EntityId<Character>,
        params: JsonValue,
    ) -> Result<Self, ValidationError> {
        strike_validator().ensure_valid(&params)?;
        Ok(Self {
            actor: actor.to_ref(),
            targets: vec![target.to_ref()],
            params,
        })
    }
}

impl Command for StrikeCommand {
    fn kind(&self) -> &str {
        "strike"
    }

    fn actor(&self) -> &EntityRef {
        &self.actor
    }

    fn targets(&self) -> &[EntityRef] {
        &self.targets
    }

    fn params(&self) -> &JsonValue {
        &self.params
    }

    fn required_rules(&self) -> &[&'static str] {
        &["check-stamina", "roll-attack", "resolve-damage"]
    }
}

// ============================================================================
// Rules
// ============================================================================

/// Gate: the actor must exist and have stamina for a strike.
struct CheckStamina {
    cost: u32,
}

#[async_trait]
impl Rule for CheckStamina {
    fn name(&self) -> &str {
        "check-stamina"
    }

    fn priority(&self) -> i32 {
        -10
    }

    fn can_apply(&self, _ctx: &ExecutionContext, _command: &dyn Command) -> bool {
        true
    }

    async fn apply(
        &self,
        ctx: &mut ExecutionContext,
        command: &dyn Command,
    ) -> Result<RuleResult, RuleError> {
        let Some(actor_id) = command.actor().typed::<Character>() else {
            return Ok(RuleResult::missing_entity(command.actor()));
        };
        let Some(actor) = ctx.entity(&actor_id) else {
            return Ok(RuleResult::missing_entity(command.actor()));
        };
        if actor.stamina < self.cost {
            return Ok(RuleResult::fatal("insufficient stamina for a strike"));
        }

        let spent = Character {
            stamina: actor.stamina - self.cost,
            ..actor.clone()
        };
        ctx.set_entity(&actor_id, spent);
        Ok(RuleResult::success("stamina spent"))
    }
}

/// Rolls the attack die and hands the result to later rules via scratch.
struct RollAttack {
    dice: Mutex<SeededDice>,
}

#[async_trait]
impl Rule for RollAttack {
    fn name(&self) -> &str {
        "roll-attack"
    }

    fn priority(&self) -> i32 {
        0
    }

    fn can_apply(&self, _ctx: &ExecutionContext, _command: &dyn Command) -> bool {
        true
    }

    async fn apply(
        &self,
        ctx: &mut ExecutionContext,
        _command: &dyn Command,
    ) -> Result<RuleResult, RuleError> {
        let expression: DiceExpression = "1d20+2"
            .parse()
            .map_err(|error| RuleError::internal(format!("bad dice expression: {error}")))?;
        let outcome = {
            let mut dice = self
                .dice
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            dice.roll(&expression)
        };
        ctx.set_scratch(&ATTACK_ROLL, outcome.total);
        Ok(RuleResult::success(format!("attack roll {}", outcome.total)))
    }
}

/// Applies damage scaled by the staged attack roll.
struct ResolveDamage;

#[async_trait]
impl Rule for ResolveDamage {
    fn name(&self) -> &str {
        "resolve-damage"
    }

    fn priority(&self) -> i32 {
        10
    }

    fn can_apply(&self, _ctx: &ExecutionContext, command: &dyn Command) -> bool {
        !command.targets().is_empty()
    }

    async fn apply(
        &self,
        ctx: &mut ExecutionContext,
        command: &dyn Command,
    ) -> Result<RuleResult, RuleError> {
        let roll = *ctx
            .scratch(&ATTACK_ROLL)
            .ok_or(RuleError::ScratchMissing {
                key: ATTACK_ROLL.name(),
            })?;

        let target_ref = &command.targets()[0];
        let Some(target_id) = target_ref.typed::<Character>() else {
            return Ok(RuleResult::missing_entity(target_ref));
        };
        let Some(target) = ctx.entity(&target_id) else {
            return Ok(RuleResult::missing_entity(target_ref));
        };

        let damage = roll / 2;
        let struck = Character {
            hp: target.hp - damage,
            ..target.clone()
        };
        ctx.set_entity(&target_id, struck);

        Ok(RuleResult::success_with_data(
            format!("dealt {damage} damage"),
            json!({ "damage": damage, "roll": roll }),
        ))
    }
}

fn strike_chain(seed: u64, stamina_cost: u32) -> RuleChain {
    let mut chain = RuleChain::new();
    chain
        .add_rule(CheckStamina { cost: stamina_cost })
        .expect("unique rule name");
    chain
        .add_rule(RollAttack {
            dice: Mutex::new(SeededDice::new(seed)),
        })
        .expect("unique rule name");
    chain.add_rule(ResolveDamage).expect("unique rule name");
    chain
}

fn context_with(actor: &EntityId<Character>, target: &EntityId<Character>) -> ExecutionContext {
    let mut ctx = ExecutionContext::new();
    ctx.set_entity(
        actor,
        Character {
            hp: 30,
            stamina: 10,
        },
    );
    ctx.set_entity(
        target,
        Character {
            hp: 20,
            stamina: 10,
        },
    );
    ctx
}

async fn run_strike(seed: u64, stamina_cost: u32) -> (CommandResult, ExecutionContext) {
    init_tracing();
    let aria = EntityId::<Character>::new("aria");
    let gnoll = EntityId::<Character>::new("gnoll");

    let mut engine = RuleEngine::new();
    engine.register_chain("strike", strike_chain(seed, stamina_cost));

    let mut ctx = context_with(&aria, &gnoll);
    let command =
        StrikeCommand::new(&aria, &gnoll, json!({ "style": "melee" })).expect("valid params");
    let result = command.execute(&engine, &mut ctx).await;
    (result, ctx)
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn full_strike_pipeline_mutates_target_and_reports_damage() {
    let (result, ctx) = run_strike(42, 3).await;

    assert!(result.success, "unexpected failure: {}", result.message);
    let data = result.data.expect("damage payload");
    let damage = data["damage"].as_i64().expect("numeric damage");
    let roll = data["roll"].as_i64().expect("numeric roll");
    assert_eq!(damage, roll / 2);

    let gnoll = ctx
        .entity(&EntityId::<Character>::new("gnoll"))
        .expect("target still stored");
    assert_eq!(gnoll.hp, 20 - damage);

    let aria = ctx
        .entity(&EntityId::<Character>::new("aria"))
        .expect("actor still stored");
    assert_eq!(aria.stamina, 7, "stamina cost applied once");
}

#[tokio::test]
async fn fatal_gate_leaves_later_mutations_unapplied() {
    // Stamina cost above the actor's pool: the gate fails fatally.
    let (result, ctx) = run_strike(42, 99).await;

    assert!(!result.success);
    assert!(result.message.contains("insufficient stamina"));

    let gnoll = ctx
        .entity(&EntityId::<Character>::new("gnoll"))
        .expect("target still stored");
    assert_eq!(gnoll.hp, 20, "damage rule never ran");
    assert!(
        !ctx.has_scratch(&ATTACK_ROLL),
        "roll rule never ran either"
    );
}

#[tokio::test]
async fn same_seed_and_state_reproduce_the_same_result() {
    let (first, first_ctx) = run_strike(1234, 3).await;
    let (second, second_ctx) = run_strike(1234, 3).await;

    assert_eq!(first, second);
    assert_eq!(
        first_ctx.entity(&EntityId::<Character>::new("gnoll")),
        second_ctx.entity(&EntityId::<Character>::new("gnoll")),
    );
}

#[tokio::test]
async fn scratch_handoff_doubles_into_entity_store() {
    init_tracing();
    // Minimal two-rule chain: A stages a value, B doubles it into an entity.
    #[derive(Clone, Debug, PartialEq)]
    struct Tally {
        value: i64,
    }

    impl Entity for Tally {
        const KIND: &'static str = "tally";
    }

    const SEED_VALUE: ScratchKey<i64> = ScratchKey::new("test.seed_value");

    struct WriteSeed;

    #[async_trait]
    impl Rule for WriteSeed {
        fn name(&self) -> &str {
            "write-seed"
        }

        fn priority(&self) -> i32 {
            1
        }

        fn can_apply(&self, _ctx: &ExecutionContext, _command: &dyn Command) -> bool {
            true
        }

        async fn apply(
            &self,
            ctx: &mut ExecutionContext,
            _command: &dyn Command,
        ) -> Result<RuleResult, RuleError> {
            ctx.set_scratch(&SEED_VALUE, 1);
            Ok(RuleResult::success("seeded"))
        }
    }

    struct DoubleIntoStore;

    #[async_trait]
    impl Rule for DoubleIntoStore {
        fn name(&self) -> &str {
            "double-into-store"
        }

        fn priority(&self) -> i32 {
            2
        }

        fn can_apply(&self, _ctx: &ExecutionContext, _command: &dyn Command) -> bool {
            true
        }

        async fn apply(
            &self,
            ctx: &mut ExecutionContext,
            _command: &dyn Command,
        ) -> Result<RuleResult, RuleError> {
            let staged = *ctx.scratch(&SEED_VALUE).ok_or(RuleError::ScratchMissing {
                key: SEED_VALUE.name(),
            })?;
            ctx.set_entity(&EntityId::<Tally>::new("e1"), Tally { value: staged * 2 });
            Ok(RuleResult::success("doubled"))
        }
    }

    struct TallyCommand {
        actor: EntityRef,
    }

    impl Command for TallyCommand {
        fn kind(&self) -> &str {
            "tally"
        }

        fn actor(&self) -> &EntityRef {
            &self.actor
        }
    }

    let mut chain = RuleChain::new();
    chain.add_rule(WriteSeed).expect("unique rule name");
    chain.add_rule(DoubleIntoStore).expect("unique rule name");

    let mut engine = RuleEngine::new();
    engine.register_chain("tally", chain);

    let mut ctx = ExecutionContext::new();
    let command = TallyCommand {
        actor: EntityRef::new("system", "scheduler"),
    };
    let result = command.execute(&engine, &mut ctx).await;

    assert!(result.success);
    assert_eq!(
        ctx.entity(&EntityId::<Tally>::new("e1")),
        Some(&Tally { value: 2 })
    );
}

#[tokio::test]
async fn invalid_parameters_fail_before_any_rule_runs() {
    let aria = EntityId::<Character>::new("aria");
    let gnoll = EntityId::<Character>::new("gnoll");

    let error = StrikeCommand::new(&aria, &gnoll, json!({ "style": "psychic" }))
        .expect_err("style outside the allowed set");
    assert!(error.to_string().contains("style"));

    // Construction failed, so there is no command to dispatch and the
    // context never saw a mutation.
    let ctx = context_with(&aria, &gnoll);
    assert_eq!(ctx.entity(&gnoll).map(|c| c.hp), Some(20));
}

#[tokio::test]
async fn scratch_does_not_leak_between_dispatches() {
    init_tracing();
    let aria = EntityId::<Character>::new("aria");
    let gnoll = EntityId::<Character>::new("gnoll");

    let mut engine = RuleEngine::new();
    engine.register_chain("strike", strike_chain(7, 1));

    let mut ctx = context_with(&aria, &gnoll);
    let command =
        StrikeCommand::new(&aria, &gnoll, json!({ "style": "ranged" })).expect("valid params");

    let first = command.execute(&engine, &mut ctx).await;
    assert!(first.success);
    assert!(ctx.has_scratch(&ATTACK_ROLL), "left over from dispatch one");

    // The second dispatch reinitializes scratch before its own roll, and the
    // entity store carries the accumulated damage forward.
    let second = command.execute(&engine, &mut ctx).await;
    assert!(second.success);

    let gnoll_state = ctx.entity(&gnoll).expect("target still stored");
    assert!(gnoll_state.hp < 20, "both dispatches landed damage");
}
