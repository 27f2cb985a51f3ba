//! Weaving draft: threading, tie-up, treadling and the drawdown derived from them.

use rand::{Rng, rngs::SmallRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::wave::{WaveChannel, WaveSettings};
use crate::window::SlidingWindow;
use crate::{Tick, WyrdError, seeded_rng};

/// Upper bound (exclusive) of the per-channel noise offset drawn at construction.
const NOISE_SEED_RANGE: f32 = 7777.0;

/// Probability that a cell is raised by [`WeaveDraft::randomize_tie_up_row`].
const TIE_UP_ROW_DENSITY: f64 = 0.6;

/// How the tie-up matrix is laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
#[serde(rename_all = "snake_case")]
pub enum TieUpStrategy {
    /// Diagonal with period `n - n/2`.
    #[default]
    Balanced,
    /// Straight draw: one anti-diagonal, period `n`.
    Simple,
    /// Two offset anti-diagonals summed without clamping.
    Twill,
    /// Checkerboard, period 2.
    Plain,
    /// Each cell raised with probability one half.
    Random,
}

/// Which threading representation currently holds the truth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreadingAuthority {
    /// The full boolean matrix; set after construction and direct matrix writes.
    Matrix,
    /// The compact per-warp shaft window; set by every write to it and by
    /// every rebuild of the matrix from it.
    Compact,
}

/// Branch taken by [`WeaveDraft::update`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateBranch {
    /// Threading wave, then full drawdown.
    Warp,
    /// Treadling wave, then simple drawdown.
    Weft,
    /// Both waves, then full drawdown.
    Both,
    /// Simple drawdown only.
    Hold,
}

impl UpdateBranch {
    #[must_use]
    pub const fn from_flags(update_warp: bool, update_weft: bool) -> Self {
        match (update_warp, update_weft) {
            (true, false) => Self::Warp,
            (false, true) => Self::Weft,
            (true, true) => Self::Both,
            (false, false) => Self::Hold,
        }
    }
}

/// Summary of one [`WeaveDraft::update`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftTick {
    pub tick: Tick,
    pub branch: UpdateBranch,
}

/// Construction parameters for a [`WeaveDraft`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DraftConfig {
    /// Number of shafts (and treadles).
    pub num_shafts: usize,
    /// Number of warp threads.
    pub num_warps: usize,
    /// Number of woven rows kept in the drawdown history.
    pub num_weft: usize,
    /// Tie-up applied at construction.
    pub tie_up: TieUpStrategy,
    /// Advance the threading wave on each update.
    pub update_warp: bool,
    /// Advance the treadling wave on each update.
    pub update_weft: bool,
    /// Increment of the wave clock per update.
    pub time_step: f32,
    pub threading_wave: WaveSettings,
    pub treadling_wave: WaveSettings,
    /// Chance that the recursive mode substitutes an earlier pattern index.
    pub recursion_chance: f64,
    /// Optional RNG seed for reproducible drafts.
    pub rng_seed: Option<u64>,
}

impl Default for DraftConfig {
    fn default() -> Self {
        Self {
            num_shafts: 5,
            num_warps: 50,
            num_weft: 27,
            tie_up: TieUpStrategy::Balanced,
            update_warp: true,
            update_weft: true,
            time_step: 0.1,
            threading_wave: WaveSettings::THREADING,
            treadling_wave: WaveSettings::TREADLING,
            recursion_chance: 0.2,
            rng_seed: None,
        }
    }
}

impl DraftConfig {
    /// Reject degenerate draft dimensions and out-of-range tuning values.
    pub fn validate(&self) -> Result<(), WyrdError> {
        for (name, value) in [
            ("num_shafts", self.num_shafts),
            ("num_warps", self.num_warps),
            ("num_weft", self.num_weft),
        ] {
            if value == 0 {
                return Err(WyrdError::InvalidDimension { name, value });
            }
        }
        if self.num_shafts > i32::MAX as usize {
            return Err(WyrdError::InvalidConfig("num_shafts exceeds shaft index range"));
        }
        if !(self.time_step.is_finite() && self.time_step > 0.0) {
            return Err(WyrdError::InvalidConfig("time_step must be positive"));
        }
        if !(self.threading_wave.is_finite() && self.treadling_wave.is_finite()) {
            return Err(WyrdError::InvalidConfig("wave frequencies must be finite"));
        }
        if !(0.0..=1.0).contains(&self.recursion_chance) {
            return Err(WyrdError::InvalidConfig(
                "recursion_chance must lie within [0, 1]",
            ));
        }
        Ok(())
    }
}

/// Serializable copy of every draft matrix, for printers and renderers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftSnapshot {
    pub tick: u64,
    pub num_shafts: usize,
    pub num_warps: usize,
    pub num_weft: usize,
    pub authority: ThreadingAuthority,
    pub threading: Vec<Vec<bool>>,
    pub threading_simple: Vec<i32>,
    pub tie_up: Vec<Vec<u8>>,
    pub treadling: Vec<usize>,
    pub drawdown: Vec<Vec<bool>>,
    pub shed: Vec<bool>,
}

/// The draft engine.
#[derive(Debug, Clone)]
pub struct WeaveDraft {
    config: DraftConfig,
    /// `threading[shaft][warp]`
    threading: Vec<Vec<bool>>,
    threading_simple: SlidingWindow<i32>,
    authority: ThreadingAuthority,
    /// `tie_up[treadle][shaft]`
    tie_up: Vec<Vec<u8>>,
    tie_up_strategy: TieUpStrategy,
    treadling: SlidingWindow<usize>,
    drawdown: SlidingWindow<Vec<bool>>,
    shed: Vec<bool>,
    threading_wave: WaveChannel,
    treadling_wave: WaveChannel,
    update_warp: bool,
    update_weft: bool,
    t: f32,
    tick: Tick,
    rng: SmallRng,
}

impl WeaveDraft {
    /// Allocate a draft with random threading and treadling and the configured tie-up.
    pub fn new(config: DraftConfig) -> Result<Self, WyrdError> {
        config.validate()?;
        let mut rng = seeded_rng(config.rng_seed);
        let n = config.num_shafts;

        let threading = (0..n)
            .map(|_| (0..config.num_warps).map(|_| rng.random_bool(0.5)).collect())
            .collect();
        let threading_simple = SlidingWindow::new(config.num_warps, 0)?;
        let mut treadling = SlidingWindow::new(config.num_weft, 0)?;
        treadling.fill_with(|_| rng.random_range(0..n));
        let drawdown = SlidingWindow::new(config.num_weft, vec![false; config.num_warps])?;

        let threading_wave = WaveChannel::new(
            config.threading_wave,
            rng.random_range(0.0..NOISE_SEED_RANGE),
        );
        let treadling_wave = WaveChannel::new(
            config.treadling_wave,
            rng.random_range(0.0..NOISE_SEED_RANGE),
        );

        let mut draft = Self {
            threading,
            threading_simple,
            authority: ThreadingAuthority::Matrix,
            tie_up: vec![vec![0; n]; n],
            tie_up_strategy: config.tie_up,
            treadling,
            drawdown,
            shed: vec![false; config.num_warps],
            threading_wave,
            treadling_wave,
            update_warp: config.update_warp,
            update_weft: config.update_weft,
            t: 0.0,
            tick: Tick::zero(),
            rng,
            config,
        };
        draft.apply_tie_up(draft.tie_up_strategy);

        debug!(
            shafts = draft.config.num_shafts,
            warps = draft.config.num_warps,
            weft = draft.config.num_weft,
            tie_up = ?draft.tie_up_strategy,
            "weave draft initialised"
        );
        Ok(draft)
    }

    #[must_use]
    pub fn config(&self) -> &DraftConfig {
        &self.config
    }

    #[must_use]
    pub const fn num_shafts(&self) -> usize {
        self.config.num_shafts
    }

    #[must_use]
    pub const fn num_warps(&self) -> usize {
        self.config.num_warps
    }

    #[must_use]
    pub const fn num_weft(&self) -> usize {
        self.config.num_weft
    }

    /// Rebuild the whole tie-up with `strategy`.
    pub fn apply_tie_up(&mut self, strategy: TieUpStrategy) {
        let n = self.config.num_shafts;
        let hit = |condition: bool| u8::from(condition);
        for i in 0..n {
            for j in 0..n {
                self.tie_up[i][j] = match strategy {
                    TieUpStrategy::Balanced => hit((i + j) % (n - n / 2) == 0),
                    TieUpStrategy::Simple => hit((i + j + 1) % n == 0),
                    TieUpStrategy::Twill => hit((i + j + 1) % n == 0) + hit((i + j) % n == 0),
                    TieUpStrategy::Plain => hit((i + j) % 2 == 0),
                    TieUpStrategy::Random => hit(self.rng.random_bool(0.5)),
                };
            }
        }
        self.tie_up_strategy = strategy;
        debug!(?strategy, "tie-up rebuilt");
    }

    /// Redraw one treadle's row of the tie-up.
    pub fn randomize_tie_up_row(&mut self, treadle: usize) -> Result<(), WyrdError> {
        self.check_treadle(treadle)?;
        for cell in &mut self.tie_up[treadle] {
            *cell = u8::from(self.rng.random_bool(TIE_UP_ROW_DENSITY));
        }
        debug!(treadle, row = ?self.tie_up[treadle], "tie-up row randomised");
        Ok(())
    }

    #[must_use]
    pub const fn tie_up_strategy(&self) -> TieUpStrategy {
        self.tie_up_strategy
    }

    fn check_treadle(&self, treadle: usize) -> Result<(), WyrdError> {
        if treadle >= self.config.num_shafts {
            return Err(WyrdError::IndexOutOfRange {
                kind: "treadle",
                index: treadle,
                len: self.config.num_shafts,
            });
        }
        Ok(())
    }

    /// Lifted warps for `treadle`, using the full threading matrix.
    ///
    /// Warp `i` is lifted when any shaft tied to the treadle carries it.
    pub fn calc_shed(&self, treadle: usize) -> Result<Vec<bool>, WyrdError> {
        self.check_treadle(treadle)?;
        Ok(self.shed_row(treadle))
    }

    /// Like [`WeaveDraft::calc_shed`], after rebuilding the matrix from the compact threading.
    pub fn calc_shed_simple(&mut self, treadle: usize) -> Result<Vec<bool>, WyrdError> {
        self.check_treadle(treadle)?;
        self.sync_threading_from_compact();
        Ok(self.shed_row(treadle))
    }

    fn shed_row(&self, treadle: usize) -> Vec<bool> {
        let ties = &self.tie_up[treadle];
        (0..self.config.num_warps)
            .map(|warp| {
                ties.iter()
                    .zip(&self.threading)
                    .any(|(&tie, shaft)| tie > 0 && shaft[warp])
            })
            .collect()
    }

    /// `threading[r][c] = (threading_simple[c] == r)`; the compact window becomes authoritative.
    fn sync_threading_from_compact(&mut self) {
        self.authority = ThreadingAuthority::Compact;
        for (shaft, row) in self.threading.iter_mut().enumerate() {
            for (cell, &value) in row.iter_mut().zip(&self.threading_simple) {
                *cell = usize::try_from(value).is_ok_and(|v| v == shaft);
            }
        }
    }

    /// Write one cell of the full threading matrix directly.
    pub fn set_threading(
        &mut self,
        shaft: usize,
        warp: usize,
        lifted: bool,
    ) -> Result<(), WyrdError> {
        let len = self.config.num_warps;
        let row = self.threading.get_mut(shaft).ok_or(WyrdError::IndexOutOfRange {
            kind: "shaft",
            index: shaft,
            len: self.config.num_shafts,
        })?;
        let cell = row.get_mut(warp).ok_or(WyrdError::IndexOutOfRange {
            kind: "warp",
            index: warp,
            len,
        })?;
        *cell = lifted;
        self.authority = ThreadingAuthority::Matrix;
        Ok(())
    }

    /// Append a shaft index to the compact threading, dropping the oldest warp.
    pub fn push_threading(&mut self, value: i32) {
        self.threading_simple.push_back(value);
        self.authority = ThreadingAuthority::Compact;
    }

    /// Insert a treadle at the front of the treadling, dropping the oldest row.
    pub fn push_treadling(&mut self, treadle: usize) -> Result<(), WyrdError> {
        self.check_treadle(treadle)?;
        self.treadling.push_front(treadle);
        Ok(())
    }

    /// `out[i] = p[i % n] * (i % n)`
    pub fn update_threading_repeat(&mut self, pattern: &[u8]) -> Result<(), WyrdError> {
        let n = non_empty(pattern)?;
        self.threading_simple.fill_with(|i| {
            let k = i % n;
            weighted(pattern[k], k)
        });
        self.authority = ThreadingAuthority::Compact;
        trace!(?pattern, "threading repeated");
        Ok(())
    }

    /// Alternate forward blocks with blocks reversed in both value and weight.
    pub fn update_threading_mirror(&mut self, pattern: &[u8]) -> Result<(), WyrdError> {
        let n = non_empty(pattern)?;
        self.threading_simple.fill_with(|i| {
            let k = i % n;
            if (i / n) % 2 == 0 {
                weighted(pattern[k], k)
            } else {
                let rev = n - 1 - k;
                weighted(pattern[rev], rev)
            }
        });
        self.authority = ThreadingAuthority::Compact;
        trace!(?pattern, "threading mirrored");
        Ok(())
    }

    /// Repeat, but past the first block occasionally weight by an earlier position.
    pub fn update_threading_recursive(&mut self, pattern: &[u8]) -> Result<(), WyrdError> {
        let n = non_empty(pattern)?;
        let chance = self.config.recursion_chance;
        let values: Vec<i32> = (0..self.threading_simple.len())
            .map(|i| {
                let k = i % n;
                if i > n && self.rng.random_bool(chance) {
                    let earlier = self.rng.random_range(0..i);
                    weighted(pattern[k], earlier % n)
                } else {
                    weighted(pattern[k], k)
                }
            })
            .collect();
        self.threading_simple.fill_with(|i| values[i]);
        self.authority = ThreadingAuthority::Compact;
        trace!(?pattern, "threading recursed");
        Ok(())
    }

    /// Advance the threading wave into the compact threading and rebuild the matrix.
    pub fn update_threading(&mut self) {
        let shaft = self
            .threading_wave
            .shaft_index(self.t, self.config.num_shafts);
        self.threading_simple.push_back(shaft_value(shaft));
        self.authority = ThreadingAuthority::Compact;
        self.sync_threading_from_compact();
    }

    /// Advance the treadling wave into the front of the treadling.
    pub fn update_treadling(&mut self) {
        let treadle = self
            .treadling_wave
            .shaft_index(self.t, self.config.num_shafts);
        self.treadling.push_front(treadle);
    }

    /// Weave the front treadle with the full threading.
    pub fn update_drawdown(&mut self) {
        let row = self.shed_row(*self.treadling.front());
        self.push_drawdown_row(row);
    }

    /// Weave the front treadle with the threading rebuilt from its compact form.
    pub fn update_drawdown_simple(&mut self) {
        self.sync_threading_from_compact();
        self.update_drawdown();
    }

    fn push_drawdown_row(&mut self, row: Vec<bool>) {
        self.shed.clone_from(&row);
        self.drawdown.push_front(row);
    }

    /// Recompute every drawdown row from its treadle with the current threading.
    ///
    /// The stored shed is left as it was.
    pub fn recompute_drawdown(&mut self) {
        let rows: Vec<Vec<bool>> = self.treadling.iter().map(|&t| self.shed_row(t)).collect();
        self.drawdown.fill_with(|i| rows[i].clone());
    }

    /// One draft step, selected by the warp/weft flags.
    pub fn update(&mut self) -> DraftTick {
        let branch = UpdateBranch::from_flags(self.update_warp, self.update_weft);
        match branch {
            UpdateBranch::Warp => {
                self.update_threading();
                self.update_drawdown();
            }
            UpdateBranch::Weft => {
                self.update_treadling();
                self.update_drawdown_simple();
            }
            UpdateBranch::Both => {
                self.update_threading();
                self.update_treadling();
                self.update_drawdown();
            }
            UpdateBranch::Hold => self.update_drawdown_simple(),
        }
        self.t += self.config.time_step;
        self.tick = self.tick.next();
        trace!(tick = self.tick.0, ?branch, "draft updated");
        DraftTick {
            tick: self.tick,
            branch,
        }
    }

    pub fn set_update_flags(&mut self, update_warp: bool, update_weft: bool) {
        self.update_warp = update_warp;
        self.update_weft = update_weft;
    }

    #[must_use]
    pub const fn update_warp(&self) -> bool {
        self.update_warp
    }

    #[must_use]
    pub const fn update_weft(&self) -> bool {
        self.update_weft
    }

    #[must_use]
    pub const fn tick(&self) -> Tick {
        self.tick
    }

    /// Wave clock.
    #[must_use]
    pub const fn time(&self) -> f32 {
        self.t
    }

    #[must_use]
    pub const fn authority(&self) -> ThreadingAuthority {
        self.authority
    }

    /// Most recently woven row.
    #[must_use]
    pub fn shed(&self) -> &[bool] {
        &self.shed
    }

    /// The shed as a printer line of `0`/`1` characters.
    #[must_use]
    pub fn shed_string(&self) -> String {
        self.shed.iter().map(|&up| if up { '1' } else { '0' }).collect()
    }

    #[must_use]
    pub fn drawdown(&self) -> &SlidingWindow<Vec<bool>> {
        &self.drawdown
    }

    #[must_use]
    pub fn treadling(&self) -> &SlidingWindow<usize> {
        &self.treadling
    }

    #[must_use]
    pub fn threading(&self) -> &[Vec<bool>] {
        &self.threading
    }

    #[must_use]
    pub fn threading_simple(&self) -> &SlidingWindow<i32> {
        &self.threading_simple
    }

    #[must_use]
    pub fn tie_up(&self) -> &[Vec<u8>] {
        &self.tie_up
    }

    #[must_use]
    pub fn snapshot(&self) -> DraftSnapshot {
        DraftSnapshot {
            tick: self.tick.0,
            num_shafts: self.config.num_shafts,
            num_warps: self.config.num_warps,
            num_weft: self.config.num_weft,
            authority: self.authority,
            threading: self.threading.clone(),
            threading_simple: self.threading_simple.to_vec(),
            tie_up: self.tie_up.clone(),
            treadling: self.treadling.to_vec(),
            drawdown: self.drawdown.to_vec(),
            shed: self.shed.clone(),
        }
    }
}

fn non_empty(pattern: &[u8]) -> Result<usize, WyrdError> {
    if pattern.is_empty() {
        return Err(WyrdError::WindowLengthMismatch { expected: 1 });
    }
    Ok(pattern.len())
}

fn weighted(value: u8, weight: usize) -> i32 {
    i32::from(value).saturating_mul(shaft_value(weight))
}

fn shaft_value(index: usize) -> i32 {
    i32::try_from(index).unwrap_or(i32::MAX)
}
