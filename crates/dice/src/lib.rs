//! Deterministic dice oracle for game mechanics.
//!
//! Provides the randomness contract consumed by rule pipelines: roll a single
//! N-sided die, or roll a parsed dice expression (`2d6+3`) and get back the
//! individual dice alongside the total.
//!
//! # Determinism
//!
//! All rollers must be deterministic: given the same seed they must produce
//! the same sequence of rolls. This is what makes a command dispatch
//! reproducible end to end, and it is what replay and tests rely on. The
//! provided [`SeededDice`] is ChaCha-backed; [`derive_seed`] mixes a base
//! seed with per-event entropy so each random event in a session gets its own
//! stream.

use core::fmt;
use core::str::FromStr;

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Upper bound on dice per expression, to keep adversarial input cheap.
pub const MAX_DICE: u32 = 100;

/// Errors from parsing or constructing a dice expression.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum DiceExpressionError {
    /// Empty input.
    #[error("empty dice expression")]
    Empty,

    /// Input that does not match the `NdS`, `NdS+M`, or `NdS-M` shapes.
    #[error("malformed dice expression '{0}'")]
    Malformed(String),

    /// Zero dice requested.
    #[error("dice expression rolls zero dice")]
    ZeroCount,

    /// Zero-sided dice requested.
    #[error("dice expression uses zero-sided dice")]
    ZeroSides,

    /// More dice than [`MAX_DICE`].
    #[error("dice expression rolls {0} dice (limit {MAX_DICE})")]
    TooManyDice(u32),
}

/// A parsed dice expression: `count` dice of `sides` sides plus a modifier.
///
/// Parses from the conventional notation: `d20`, `2d6`, `3d8+2`, `1d4-1`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceExpression {
    count: u32,
    sides: u32,
    modifier: i32,
}

impl DiceExpression {
    /// Builds an expression, validating the dice bounds.
    pub fn new(count: u32, sides: u32, modifier: i32) -> Result<Self, DiceExpressionError> {
        if count == 0 {
            return Err(DiceExpressionError::ZeroCount);
        }
        if sides == 0 {
            return Err(DiceExpressionError::ZeroSides);
        }
        if count > MAX_DICE {
            return Err(DiceExpressionError::TooManyDice(count));
        }
        Ok(Self {
            count,
            sides,
            modifier,
        })
    }

    /// Number of dice rolled.
    pub const fn count(&self) -> u32 {
        self.count
    }

    /// Sides per die.
    pub const fn sides(&self) -> u32 {
        self.sides
    }

    /// Flat modifier added to the dice total.
    pub const fn modifier(&self) -> i32 {
        self.modifier
    }

    /// Smallest total this expression can produce.
    pub const fn minimum(&self) -> i64 {
        self.count as i64 + self.modifier as i64
    }

    /// Largest total this expression can produce.
    pub const fn maximum(&self) -> i64 {
        (self.count as i64) * (self.sides as i64) + self.modifier as i64
    }
}

impl FromStr for DiceExpression {
    type Err = DiceExpressionError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(DiceExpressionError::Empty);
        }

        let malformed = || DiceExpressionError::Malformed(trimmed.to_owned());

        let (count_part, rest) = trimmed
            .split_once(['d', 'D'])
            .ok_or_else(malformed)?;

        let count: u32 = if count_part.is_empty() {
            // Bare "d20" means one die.
            1
        } else {
            count_part.parse().map_err(|_| malformed())?
        };

        let (sides_part, modifier) = if let Some(idx) = rest.find(['+', '-']) {
            let (sides_part, modifier_part) = rest.split_at(idx);
            let modifier: i32 = modifier_part.parse().map_err(|_| malformed())?;
            (sides_part, modifier)
        } else {
            (rest, 0)
        };

        let sides: u32 = sides_part.parse().map_err(|_| malformed())?;
        Self::new(count, sides, modifier)
    }
}

impl fmt::Display for DiceExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}d{}", self.count, self.sides)?;
        match self.modifier {
            0 => Ok(()),
            m if m > 0 => write!(f, "+{m}"),
            m => write!(f, "{m}"),
        }
    }
}

/// Structured result of rolling a dice expression.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollOutcome {
    /// Each individual die, in roll order.
    pub rolls: Vec<u32>,
    /// The flat modifier applied after the dice.
    pub modifier: i32,
    /// Dice sum plus modifier.
    pub total: i64,
}

/// A source of dice rolls.
///
/// Implementations must be deterministic under a fixed seed; consumers roll
/// through a trait object or generic so tests can substitute fixed streams.
pub trait DiceRoller: Send {
    /// Rolls one die with `sides` sides, returning a value in `1..=sides`.
    fn roll_die(&mut self, sides: u32) -> u32;

    /// Rolls a full expression, returning the individual dice and the total.
    fn roll(&mut self, expression: &DiceExpression) -> RollOutcome {
        let rolls: Vec<u32> = (0..expression.count())
            .map(|_| self.roll_die(expression.sides()))
            .collect();
        let total = rolls.iter().map(|&die| i64::from(die)).sum::<i64>()
            + i64::from(expression.modifier());
        RollOutcome {
            rolls,
            modifier: expression.modifier(),
            total,
        }
    }
}

/// ChaCha-backed deterministic roller.
///
/// Same seed, same sequence, on every platform.
#[derive(Clone, Debug)]
pub struct SeededDice {
    rng: ChaCha8Rng,
}

impl SeededDice {
    /// Creates a roller from a raw seed.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Creates a roller for one specific random event, mixing the session
    /// seed with the action sequence number and an event salt. Use distinct
    /// salts when one action needs several independent rolls (hit check,
    /// damage variance, critical confirmation).
    pub fn for_event(session_seed: u64, nonce: u64, salt: u64) -> Self {
        Self::new(derive_seed(session_seed, nonce, salt))
    }
}

impl DiceRoller for SeededDice {
    fn roll_die(&mut self, sides: u32) -> u32 {
        if sides == 0 {
            return 0;
        }
        self.rng.gen_range(1..=sides)
    }
}

/// Mixes a session seed with per-event entropy into one derived seed.
///
/// SplitMix64-style finalizer; the multiplier constants are the standard
/// avalanche constants.
pub fn derive_seed(session_seed: u64, nonce: u64, salt: u64) -> u64 {
    let mut hash = session_seed;
    hash ^= nonce.wrapping_mul(0x9e3779b97f4a7c15);
    hash ^= salt.wrapping_mul(0x517cc1b727220a95);
    hash ^= hash >> 33;
    hash = hash.wrapping_mul(0xff51afd7ed558ccd);
    hash ^= hash >> 33;
    hash
}
