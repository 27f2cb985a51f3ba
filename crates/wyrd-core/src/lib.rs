//! Core engine for the Wyrd generative weaving draft.
//!
//! A turmite-style automaton ([`AutomatonGrid`]) produces per-tick signals that
//! a [`WeaveDraft`] folds into its threading and treadling, from which the
//! drawdown (the woven pattern) is recomputed every tick.

use rand::{SeedableRng, rngs::SmallRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod automaton;
pub mod draft;
pub mod wave;
pub mod window;

pub use automaton::{
    Agent, AutomatonConfig, AutomatonGrid, Cell, Direction, Primitive, Side, TransitionTable,
    WipeKind,
};
pub use draft::{
    DraftConfig, DraftSnapshot, DraftTick, ThreadingAuthority, TieUpStrategy, UpdateBranch,
    WeaveDraft,
};
pub use wave::{Perlin1D, WaveChannel, WaveSettings};
pub use window::SlidingWindow;

/// Errors raised by the draft engine and the automaton.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WyrdError {
    /// A count that sizes a matrix, window or grid was zero.
    #[error("invalid dimension: {name} must be positive (got {value})")]
    InvalidDimension { name: &'static str, value: usize },
    /// Any other unusable configuration value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
    /// An index addressed a treadle, agent or slot that does not exist.
    #[error("{kind} {index} out of range (len {len})")]
    IndexOutOfRange {
        kind: &'static str,
        index: usize,
        len: usize,
    },
    /// A pattern used as a modulo base was empty.
    #[error("pattern length mismatch: expected at least {expected} element(s)")]
    WindowLengthMismatch { expected: usize },
}

/// Number of draft updates performed so far.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct Tick(pub u64);

impl Tick {
    /// Returns the next sequential tick.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// The zero tick.
    #[must_use]
    pub const fn zero() -> Self {
        Self(0)
    }
}

/// Combined configuration for a draft and the automaton feeding it.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WyrdConfig {
    pub draft: DraftConfig,
    pub automaton: AutomatonConfig,
}

impl WyrdConfig {
    /// Validate both halves of the configuration.
    pub fn validate(&self) -> Result<(), WyrdError> {
        self.draft.validate()?;
        self.automaton.validate()
    }

    /// Seed both engines from one value so a whole run is reproducible.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.draft.rng_seed = Some(seed);
        self.automaton.rng_seed = Some(seed.rotate_left(17) ^ 0x9E37_79B9_7F4A_7C15);
        self
    }
}

/// Build an RNG from an optional seed, falling back to entropy.
pub(crate) fn seeded_rng(seed: Option<u64>) -> SmallRng {
    match seed {
        Some(seed) => SmallRng::seed_from_u64(seed),
        None => {
            let seed: u64 = rand::random();
            SmallRng::seed_from_u64(seed)
        }
    }
}
