//! Headless session driver for the wyrd weaving draft.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use wyrd_core::{WyrdConfig, WyrdError};

pub mod cursor;
pub mod session;

pub use cursor::{CursorSample, CursorSource, IdleCursor, ScriptedCursor, SweepCursor};
pub use session::{Session, SessionConfig, SessionKind, SessionTick, UpdateMode};

/// Everything a session needs: both engines plus pacing.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    #[serde(flatten)]
    pub engine: WyrdConfig,
    pub session: SessionConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), WyrdError> {
        self.engine.validate()?;
        self.session.validate()
    }

    /// Seed the draft, the automaton and the session from one value.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.engine = self.engine.with_seed(seed);
        self.session.rng_seed = Some(seed.wrapping_mul(0x2545_F491_4F6C_DD1D));
        self
    }
}

/// Read and validate a JSON configuration file.
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let config: AppConfig = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse config {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(config)
}
