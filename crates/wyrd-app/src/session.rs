//! Frame-driven orchestration of the automaton and the draft.

use rand::{Rng, SeedableRng, rngs::SmallRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use wyrd_core::{AutomatonGrid, DraftTick, WeaveDraft, WyrdError};

use crate::AppConfig;
use crate::cursor::{CursorSample, CursorSource};

/// How automaton signals are folded into the threading on a quiet tick.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum UpdateMode {
    /// Push the clamped state total onto the threading.
    #[default]
    Push,
    Repeat,
    Mirror,
    Recursive,
}

impl UpdateMode {
    #[must_use]
    pub const fn next(self) -> Self {
        match self {
            Self::Push => Self::Repeat,
            Self::Repeat => Self::Mirror,
            Self::Mirror => Self::Recursive,
            Self::Recursive => Self::Push,
        }
    }
}

/// Which installation session drives the draft.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum SessionKind {
    /// Visitors steer the treadling; quiet rooms let the automaton thread.
    #[default]
    Flow,
    /// Treadling follows the automaton; threading changes only occasionally.
    Print,
}

/// Pacing and perturbation settings for a [`Session`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SessionConfig {
    pub kind: SessionKind,
    /// Frames between draft ticks while the room is quiet.
    pub idle_rate: u64,
    /// Frames between draft ticks while motion is detected.
    pub active_rate: u64,
    /// Movement-field level past which a slot fires and resets.
    pub field_max: f32,
    /// Field growth per frame of motion over a slot.
    pub field_increment: f32,
    /// Chance per print-session tick that the threading is rewritten.
    pub print_chance: f64,
    /// Draft ticks between environment wipes; 0 disables them.
    pub morph_interval: u64,
    pub initial_mode: UpdateMode,
    pub rng_seed: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            kind: SessionKind::Flow,
            idle_rate: 28,
            active_rate: 4,
            field_max: 20.0,
            field_increment: 0.1,
            print_chance: 0.02,
            morph_interval: 270_000,
            initial_mode: UpdateMode::Push,
            rng_seed: None,
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<(), WyrdError> {
        if self.idle_rate == 0 || self.active_rate == 0 {
            return Err(WyrdError::InvalidConfig("update rates must be at least 1"));
        }
        if !(self.field_max.is_finite() && self.field_increment.is_finite()) {
            return Err(WyrdError::InvalidConfig("movement field values must be finite"));
        }
        if self.field_increment <= 0.0 {
            return Err(WyrdError::InvalidConfig("field_increment must be positive"));
        }
        if !(0.0..=1.0).contains(&self.print_chance) {
            return Err(WyrdError::InvalidConfig("print_chance must lie within [0, 1]"));
        }
        Ok(())
    }
}

/// Emitted for every frame on which the draft advanced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionTick {
    pub frame: u64,
    pub draft: DraftTick,
    pub mode: UpdateMode,
    pub motion: bool,
    pub state_total: usize,
    pub shed: String,
}

/// Owns the automaton and the draft and advances them frame by frame.
#[derive(Debug)]
pub struct Session {
    config: SessionConfig,
    grid: AutomatonGrid,
    draft: WeaveDraft,
    mode: UpdateMode,
    field: Vec<f32>,
    frame: u64,
    draft_ticks: u64,
    rng: SmallRng,
}

impl Session {
    pub fn new(config: AppConfig) -> Result<Self, WyrdError> {
        config.validate()?;
        let AppConfig { engine, session } = config;
        let grid = AutomatonGrid::new(engine.automaton)?;
        let draft = WeaveDraft::new(engine.draft)?;
        let rng = SmallRng::seed_from_u64(session.rng_seed.unwrap_or_else(rand::random));
        info!(
            kind = ?session.kind,
            shafts = draft.num_shafts(),
            agents = grid.agents().len(),
            "session ready"
        );
        Ok(Self {
            field: vec![0.0; draft.num_shafts()],
            mode: session.initial_mode,
            config: session,
            grid,
            draft,
            frame: 0,
            draft_ticks: 0,
            rng,
        })
    }

    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    #[must_use]
    pub fn grid(&self) -> &AutomatonGrid {
        &self.grid
    }

    pub fn grid_mut(&mut self) -> &mut AutomatonGrid {
        &mut self.grid
    }

    #[must_use]
    pub fn draft(&self) -> &WeaveDraft {
        &self.draft
    }

    pub fn draft_mut(&mut self) -> &mut WeaveDraft {
        &mut self.draft
    }

    #[must_use]
    pub const fn mode(&self) -> UpdateMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: UpdateMode) {
        self.mode = mode;
    }

    /// Movement-field accumulators, one per shaft.
    #[must_use]
    pub fn field(&self) -> &[f32] {
        &self.field
    }

    /// Frames sampled so far.
    #[must_use]
    pub const fn frame(&self) -> u64 {
        self.frame
    }

    #[must_use]
    pub const fn draft_ticks(&self) -> u64 {
        self.draft_ticks
    }

    /// Sample the source once, advance the draft if this frame is due, then
    /// feed the movement field.
    pub fn tick<S: CursorSource>(
        &mut self,
        source: &mut S,
    ) -> Result<Option<SessionTick>, WyrdError> {
        let sample = CursorSample::read(&*source);
        source.advance();

        let frame = self.frame;
        self.frame += 1;
        let rate = if sample.motion {
            self.config.active_rate
        } else {
            self.config.idle_rate
        };

        let emitted = if frame % rate == 0 {
            let draft = match self.config.kind {
                SessionKind::Flow => self.flow_step(&sample)?,
                SessionKind::Print => self.print_step(&sample)?,
            };
            self.after_draft_tick();
            Some(SessionTick {
                frame,
                draft,
                mode: self.mode,
                motion: sample.motion,
                state_total: self.grid.state_total(),
                shed: self.draft.shed_string(),
            })
        } else {
            None
        };

        self.apply_movement_field(&sample);
        Ok(emitted)
    }

    fn flow_step(&mut self, sample: &CursorSample) -> Result<DraftTick, WyrdError> {
        self.grid.update();
        self.draft.set_update_flags(false, false);
        if sample.motion {
            self.push_treadle(sample.cursor);
        } else {
            self.apply_mode()?;
        }
        let tick = self.draft.update();
        if sample.mode_reset {
            self.mode = self.mode.next();
            debug!(mode = ?self.mode, "update mode advanced");
        }
        Ok(tick)
    }

    fn print_step(&mut self, sample: &CursorSample) -> Result<DraftTick, WyrdError> {
        self.grid.update();
        self.draft.set_update_flags(false, false);
        let total = self.grid.state_total();
        if self.rng.random_bool(self.config.print_chance) {
            self.apply_mode()?;
            self.push_treadle(total);
            self.push_treadle(sample.cursor);
            self.draft.update();
        } else {
            self.push_treadle(total);
        }
        Ok(self.draft.update())
    }

    fn apply_mode(&mut self) -> Result<(), WyrdError> {
        let states = self.grid.states();
        match self.mode {
            UpdateMode::Push => {
                let total = i32::try_from(self.grid.state_total()).unwrap_or(i32::MAX);
                self.draft.push_threading(total);
            }
            UpdateMode::Repeat => self.draft.update_threading_repeat(states)?,
            UpdateMode::Mirror => self.draft.update_threading_mirror(states)?,
            UpdateMode::Recursive => self.draft.update_threading_recursive(states)?,
        }
        Ok(())
    }

    fn push_treadle(&mut self, treadle: usize) {
        if let Err(err) = self.draft.push_treadling(treadle) {
            warn!(%err, treadle, "treadle push rejected");
        }
    }

    fn after_draft_tick(&mut self) {
        self.draft_ticks += 1;
        let interval = self.config.morph_interval;
        if interval > 0 && self.draft_ticks % interval == 0 {
            self.grid.start_morph();
            debug!(draft_ticks = self.draft_ticks, "environment wipe started");
        }
    }

    fn apply_movement_field(&mut self, sample: &CursorSample) {
        if !sample.motion {
            return;
        }
        let cursor = sample.cursor;
        let Some(slot) = self.field.get_mut(cursor) else {
            return;
        };
        if *slot <= self.config.field_max {
            *slot += self.config.field_increment;
            return;
        }

        *slot = 0.0;
        match self.grid.randomize_agent_rule(cursor) {
            Ok(rule) => debug!(agent = cursor, rule, "movement field fired"),
            Err(err) => warn!(%err, "movement field skipped agent"),
        }
        if let Err(err) = self.draft.randomize_tie_up_row(cursor) {
            warn!(%err, "movement field skipped tie-up row");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modes_cycle() {
        let mut mode = UpdateMode::Push;
        let mut seen = Vec::new();
        for _ in 0..5 {
            seen.push(mode);
            mode = mode.next();
        }
        assert_eq!(
            seen,
            vec![
                UpdateMode::Push,
                UpdateMode::Repeat,
                UpdateMode::Mirror,
                UpdateMode::Recursive,
                UpdateMode::Push
            ]
        );
    }

    #[test]
    fn session_config_validation() {
        assert!(SessionConfig::default().validate().is_ok());
        let zero_rate = SessionConfig {
            active_rate: 0,
            ..SessionConfig::default()
        };
        assert_eq!(
            zero_rate.validate(),
            Err(WyrdError::InvalidConfig("update rates must be at least 1"))
        );
        let bad_chance = SessionConfig {
            print_chance: 1.5,
            ..SessionConfig::default()
        };
        assert!(bad_chance.validate().is_err());
    }
}
