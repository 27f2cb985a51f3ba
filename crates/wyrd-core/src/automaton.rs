//! Turmite automaton whose agents read, flip and move across a toroidal grid.
//!
//! Each tick every agent inspects the cell under its midpoint. An "on" cell
//! triggers the agent's right-hand transition and is switched off; an "off"
//! cell triggers the left-hand transition and is switched on. The per-agent
//! outcomes are the signals consumed by the draft.

use rand::{Rng, rngs::SmallRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::{WyrdError, seeded_rng};

/// Number of distinct rule rows an agent can sample at random.
pub const RULE_COUNT: usize = 4;

/// Cap applied to the summed outcomes returned by [`AutomatonGrid::state_total`].
pub const STATE_TOTAL_MAX: usize = 4;

/// Facing direction of an agent, encoded 0..=3 clockwise from north.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Direction {
    #[default]
    North,
    East,
    South,
    West,
}

impl Direction {
    #[must_use]
    pub const fn index(self) -> u8 {
        match self {
            Self::North => 0,
            Self::East => 1,
            Self::South => 2,
            Self::West => 3,
        }
    }

    /// Decode an index, wrapping modulo 4.
    #[must_use]
    pub const fn from_index(index: u8) -> Self {
        match index % 4 {
            0 => Self::North,
            1 => Self::East,
            2 => Self::South,
            _ => Self::West,
        }
    }

    /// Grid offset of one advance (`y` grows southwards).
    #[must_use]
    pub const fn offset(self) -> (i64, i64) {
        match self {
            Self::North => (0, -1),
            Self::East => (1, 0),
            Self::South => (0, 1),
            Self::West => (-1, 0),
        }
    }
}

/// Elementary move an agent transition is composed of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Primitive {
    /// `d = (d + 1) mod 4`
    TurnCw,
    /// `d = (d + 3) mod 4`
    TurnCcw,
    /// `d = (d + 1) mod 2`; only reachable from the rule-1 left transition.
    TurnCwHalf,
    /// `d = (d + 3) mod 2`; mirrored counterpart of [`Primitive::TurnCwHalf`].
    TurnCcwHalf,
    /// Move one cell forward, wrapping at the grid edges.
    Advance,
}

impl Primitive {
    /// Swap turn handedness; advances are unchanged.
    #[must_use]
    pub const fn mirrored(self) -> Self {
        match self {
            Self::TurnCw => Self::TurnCcw,
            Self::TurnCcw => Self::TurnCw,
            Self::TurnCwHalf => Self::TurnCcwHalf,
            Self::TurnCcwHalf => Self::TurnCwHalf,
            Self::Advance => Self::Advance,
        }
    }

    /// Apply a turn to a direction. Advances leave the direction untouched.
    #[must_use]
    pub const fn turn(self, direction: Direction) -> Direction {
        let d = direction.index();
        match self {
            Self::TurnCw => Direction::from_index((d + 1) % 4),
            Self::TurnCcw => Direction::from_index((d + 3) % 4),
            Self::TurnCwHalf => Direction::from_index((d + 1) % 2),
            Self::TurnCcwHalf => Direction::from_index((d + 3) % 2),
            Self::Advance => direction,
        }
    }
}

/// Which transition an agent takes after reading its cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    /// Taken on an "off" cell.
    Left,
    /// Taken on an "on" cell.
    Right,
}

/// Right-hand rows for non-inverted agents, indexed by rule; the last row is the default.
const RIGHT_ROWS: [&[Primitive]; RULE_COUNT + 1] = [
    &[Primitive::TurnCcw, Primitive::Advance],
    &[
        Primitive::TurnCcw,
        Primitive::Advance,
        Primitive::TurnCw,
        Primitive::Advance,
    ],
    &[Primitive::TurnCcw, Primitive::Advance],
    &[Primitive::Advance],
    &[Primitive::TurnCcw, Primitive::Advance],
];

/// Left-hand rows for non-inverted agents.
const LEFT_ROWS: [&[Primitive]; RULE_COUNT + 1] = [
    &[Primitive::TurnCw, Primitive::Advance],
    &[
        Primitive::TurnCw,
        Primitive::Advance,
        Primitive::TurnCwHalf,
        Primitive::Advance,
    ],
    &[Primitive::Advance, Primitive::Advance],
    &[Primitive::Advance],
    &[Primitive::TurnCw, Primitive::Advance],
];

/// Lookup of `(rule, inverted, side)` to an ordered primitive list.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransitionTable;

impl TransitionTable {
    /// Row used for any rule outside `0..RULE_COUNT`.
    pub const DEFAULT_ROW: usize = RULE_COUNT;

    #[must_use]
    pub const fn row_for(rule: usize) -> usize {
        if rule < RULE_COUNT {
            rule
        } else {
            Self::DEFAULT_ROW
        }
    }

    /// Primitives for one transition; inverted agents turn the opposite way.
    pub fn lookup(rule: usize, inverted: bool, side: Side) -> impl Iterator<Item = Primitive> {
        let rows = match side {
            Side::Left => &LEFT_ROWS,
            Side::Right => &RIGHT_ROWS,
        };
        rows[Self::row_for(rule)].iter().map(move |primitive| {
            if inverted {
                primitive.mirrored()
            } else {
                *primitive
            }
        })
    }
}

/// One square of the automaton environment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub x: f32,
    pub y: f32,
    pub size: f32,
    state: bool,
}

impl Cell {
    #[must_use]
    pub const fn new(x: f32, y: f32, size: f32, state: bool) -> Self {
        Self { x, y, size, state }
    }

    #[must_use]
    pub const fn is_on(&self) -> bool {
        self.state
    }

    /// Whether the point lies inside the closed bounding box.
    #[must_use]
    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.x && x <= self.x + self.size && y >= self.y && y <= self.y + self.size
    }

    pub fn flip(&mut self) {
        self.state = !self.state;
    }

    pub fn set_on(&mut self) {
        self.state = true;
    }

    pub fn set_off(&mut self) {
        self.state = false;
    }
}

/// Turmite-like walker living on the grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    col: usize,
    row: usize,
    cols: usize,
    rows: usize,
    size: f32,
    origin: (f32, f32),
    direction: Direction,
    inverted: bool,
    rule: usize,
}

impl Agent {
    fn new(
        col: usize,
        row: usize,
        config: &AutomatonConfig,
        inverted: bool,
        rule: usize,
    ) -> Self {
        Self {
            col,
            row,
            cols: config.cols,
            rows: config.rows,
            size: config.cell_size,
            origin: (config.origin_x, config.origin_y),
            direction: Direction::North,
            inverted,
            rule,
        }
    }

    /// Top-left corner in world units.
    #[must_use]
    pub fn position(&self) -> (f32, f32) {
        (
            self.origin.0 + self.col as f32 * self.size,
            self.origin.1 + self.row as f32 * self.size,
        )
    }

    /// Centre point in world units; this is what the automaton reads.
    #[must_use]
    pub fn midpoint(&self) -> (f32, f32) {
        let (x, y) = self.position();
        (x + self.size * 0.5, y + self.size * 0.5)
    }

    /// `(min_x, min_y, max_x, max_y)` the agent wraps within.
    #[must_use]
    pub fn bounds(&self) -> (f32, f32, f32, f32) {
        (
            self.origin.0,
            self.origin.1,
            self.origin.0 + self.cols as f32 * self.size,
            self.origin.1 + self.rows as f32 * self.size,
        )
    }

    #[must_use]
    pub const fn grid_position(&self) -> (usize, usize) {
        (self.col, self.row)
    }

    /// Move to a grid position, wrapping out-of-range coordinates.
    pub fn set_grid_position(&mut self, col: usize, row: usize) {
        self.col = col % self.cols;
        self.row = row % self.rows;
    }

    #[must_use]
    pub const fn direction(&self) -> Direction {
        self.direction
    }

    pub fn set_direction(&mut self, direction: Direction) {
        self.direction = direction;
    }

    #[must_use]
    pub const fn is_inverted(&self) -> bool {
        self.inverted
    }

    #[must_use]
    pub const fn rule(&self) -> usize {
        self.rule
    }

    pub fn set_rule(&mut self, rule: usize) {
        self.rule = rule;
    }

    #[must_use]
    pub const fn size(&self) -> f32 {
        self.size
    }

    /// Step one cell forward and wrap toroidally.
    fn advance(&mut self) {
        let (dx, dy) = self.direction.offset();
        self.col = (self.col as i64 + dx).rem_euclid(self.cols as i64) as usize;
        self.row = (self.row as i64 + dy).rem_euclid(self.rows as i64) as usize;
    }

    fn apply(&mut self, primitive: Primitive) {
        match primitive {
            Primitive::Advance => self.advance(),
            turn => self.direction = turn.turn(self.direction),
        }
    }

    /// Run the transition for `side` according to the current rule.
    pub fn transition(&mut self, side: Side) {
        for primitive in TransitionTable::lookup(self.rule, self.inverted, side) {
            self.apply(primitive);
        }
    }

    pub fn left(&mut self) {
        self.transition(Side::Left);
    }

    pub fn right(&mut self) {
        self.transition(Side::Right);
    }
}

/// Environment reset pattern applied while the grid is morphing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WipeKind {
    /// One column per tick is switched off, left to right.
    #[default]
    Side,
    /// One diagonal cell per tick is switched on.
    Diagonal,
}

/// Static configuration for an [`AutomatonGrid`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AutomatonConfig {
    /// Number of grid columns.
    pub cols: usize,
    /// Number of grid rows.
    pub rows: usize,
    /// Edge length of one cell in world units.
    pub cell_size: f32,
    /// Number of agents.
    pub num_ents: usize,
    /// World-space x of the grid's top-left corner.
    pub origin_x: f32,
    /// World-space y of the grid's top-left corner.
    pub origin_y: f32,
    /// Sweep applied while morphing.
    pub wipe: WipeKind,
    /// Optional RNG seed for reproducible placement and rule sampling.
    pub rng_seed: Option<u64>,
}

impl Default for AutomatonConfig {
    fn default() -> Self {
        Self {
            cols: 100,
            rows: 60,
            cell_size: 8.0,
            num_ents: 5,
            origin_x: 0.0,
            origin_y: 0.0,
            wipe: WipeKind::Side,
            rng_seed: None,
        }
    }
}

impl AutomatonConfig {
    /// Reject configurations that cannot back a grid.
    pub fn validate(&self) -> Result<(), WyrdError> {
        if self.cols == 0 {
            return Err(WyrdError::InvalidDimension {
                name: "cols",
                value: self.cols,
            });
        }
        if self.rows == 0 {
            return Err(WyrdError::InvalidDimension {
                name: "rows",
                value: self.rows,
            });
        }
        if self.num_ents == 0 {
            return Err(WyrdError::InvalidDimension {
                name: "num_ents",
                value: self.num_ents,
            });
        }
        if !(self.cell_size.is_finite() && self.cell_size > 0.0) {
            return Err(WyrdError::InvalidConfig("cell_size must be positive"));
        }
        if !(self.origin_x.is_finite() && self.origin_y.is_finite()) {
            return Err(WyrdError::InvalidConfig("grid origin must be finite"));
        }
        Ok(())
    }
}

/// Grid of cells plus the agents walking it.
#[derive(Debug, Clone)]
pub struct AutomatonGrid {
    config: AutomatonConfig,
    /// Row-major: `cells[row * cols + col]`.
    cells: Vec<Cell>,
    agents: Vec<Agent>,
    states: Vec<u8>,
    morph: bool,
    morph_t: usize,
    steps: u64,
    rng: SmallRng,
}

impl AutomatonGrid {
    /// Build an all-off grid and scatter agents over random cells.
    pub fn new(config: AutomatonConfig) -> Result<Self, WyrdError> {
        config.validate()?;
        let mut rng = seeded_rng(config.rng_seed);

        let mut cells = Vec::with_capacity(config.cols * config.rows);
        for row in 0..config.rows {
            for col in 0..config.cols {
                cells.push(Cell::new(
                    config.origin_x + col as f32 * config.cell_size,
                    config.origin_y + row as f32 * config.cell_size,
                    config.cell_size,
                    false,
                ));
            }
        }

        let agents: Vec<Agent> = (0..config.num_ents)
            .map(|_| {
                let col = rng.random_range(0..config.cols);
                let row = rng.random_range(0..config.rows);
                let inverted = rng.random_bool(0.5);
                let rule = rng.random_range(0..RULE_COUNT);
                Agent::new(col, row, &config, inverted, rule)
            })
            .collect();

        debug!(
            cols = config.cols,
            rows = config.rows,
            agents = agents.len(),
            "automaton grid initialised"
        );

        Ok(Self {
            states: vec![0; agents.len()],
            agents,
            cells,
            morph: true,
            morph_t: 0,
            steps: 0,
            rng,
            config,
        })
    }

    #[must_use]
    pub fn config(&self) -> &AutomatonConfig {
        &self.config
    }

    #[must_use]
    pub const fn cols(&self) -> usize {
        self.config.cols
    }

    #[must_use]
    pub const fn rows(&self) -> usize {
        self.config.rows
    }

    /// Number of completed [`AutomatonGrid::update`] calls.
    #[must_use]
    pub const fn steps(&self) -> u64 {
        self.steps
    }

    #[must_use]
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    #[must_use]
    pub fn cell(&self, col: usize, row: usize) -> Option<&Cell> {
        self.offset(col, row).map(|idx| &self.cells[idx])
    }

    #[must_use]
    pub fn cell_mut(&mut self, col: usize, row: usize) -> Option<&mut Cell> {
        self.offset(col, row).map(|idx| &mut self.cells[idx])
    }

    fn offset(&self, col: usize, row: usize) -> Option<usize> {
        (col < self.config.cols && row < self.config.rows).then(|| row * self.config.cols + col)
    }

    /// Index of the cell whose rectangle contains the point.
    fn cell_index_at(&self, x: f32, y: f32) -> Option<usize> {
        let size = self.config.cell_size;
        let col = ((x - self.config.origin_x) / size).floor();
        let row = ((y - self.config.origin_y) / size).floor();
        if col < 0.0 || row < 0.0 {
            return None;
        }
        let idx = self.offset(col as usize, row as usize)?;
        self.cells[idx].contains(x, y).then_some(idx)
    }

    #[must_use]
    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    #[must_use]
    pub fn agent(&self, idx: usize) -> Option<&Agent> {
        self.agents.get(idx)
    }

    /// Mutable access to one agent, e.g. to place it deliberately.
    pub fn agent_mut(&mut self, idx: usize) -> Result<&mut Agent, WyrdError> {
        let len = self.agents.len();
        self.agents.get_mut(idx).ok_or(WyrdError::IndexOutOfRange {
            kind: "agent",
            index: idx,
            len,
        })
    }

    /// Current rule of every agent.
    #[must_use]
    pub fn rules(&self) -> Vec<usize> {
        self.agents.iter().map(Agent::rule).collect()
    }

    /// Advance every agent once and run one wipe step while morphing.
    pub fn update(&mut self) {
        for idx in 0..self.agents.len() {
            let (x, y) = self.agents[idx].midpoint();
            let Some(cell_idx) = self.cell_index_at(x, y) else {
                continue;
            };
            let cell = &mut self.cells[cell_idx];
            if cell.is_on() {
                self.agents[idx].right();
                cell.set_off();
                self.states[idx] = 1;
            } else {
                self.agents[idx].left();
                cell.set_on();
                self.states[idx] = 0;
            }
        }

        if self.morph {
            self.wipe_step();
        }
        self.steps += 1;
        trace!(steps = self.steps, states = ?self.states, "automaton stepped");
    }

    /// Sum of the per-agent outcomes, clamped to `0..=4`.
    #[must_use]
    pub fn state_total(&self) -> usize {
        let total: usize = self.states.iter().map(|&s| usize::from(s)).sum();
        total.min(STATE_TOTAL_MAX)
    }

    /// Last outcome recorded for each agent (1 = read an "on" cell).
    #[must_use]
    pub fn states(&self) -> &[u8] {
        &self.states
    }

    /// Give every agent the same randomly drawn rule.
    pub fn mass_random_rules(&mut self) {
        let rule = self.rng.random_range(0..RULE_COUNT);
        for agent in &mut self.agents {
            agent.set_rule(rule);
        }
        debug!(rule, "assigned shared random rule");
    }

    /// Give every agent an independently drawn rule.
    pub fn random_rules(&mut self) {
        for agent in &mut self.agents {
            agent.set_rule(self.rng.random_range(0..RULE_COUNT));
        }
        debug!(rules = ?self.rules(), "assigned individual random rules");
    }

    /// Agent `i` receives rule `i`; indices past the table use the default row.
    pub fn index_rules(&mut self) {
        for (idx, agent) in self.agents.iter_mut().enumerate() {
            agent.set_rule(idx);
        }
    }

    /// Redraw a single agent's rule.
    pub fn randomize_agent_rule(&mut self, idx: usize) -> Result<usize, WyrdError> {
        let len = self.agents.len();
        let Some(agent) = self.agents.get_mut(idx) else {
            return Err(WyrdError::IndexOutOfRange {
                kind: "agent",
                index: idx,
                len,
            });
        };
        let rule = self.rng.random_range(0..RULE_COUNT);
        agent.set_rule(rule);
        debug!(agent = idx, rule, "agent rule perturbed");
        Ok(rule)
    }

    /// Set a single agent's rule explicitly.
    pub fn set_agent_rule(&mut self, idx: usize, rule: usize) -> Result<(), WyrdError> {
        self.agent_mut(idx)?.set_rule(rule);
        Ok(())
    }

    #[must_use]
    pub const fn is_morphing(&self) -> bool {
        self.morph
    }

    #[must_use]
    pub const fn morph_t(&self) -> usize {
        self.morph_t
    }

    #[must_use]
    pub const fn wipe_kind(&self) -> WipeKind {
        self.config.wipe
    }

    pub fn set_wipe_kind(&mut self, wipe: WipeKind) {
        self.config.wipe = wipe;
    }

    /// Restart the environment sweep from the first column.
    pub fn start_morph(&mut self) {
        self.morph = true;
        self.morph_t = 0;
    }

    /// Advance the configured wipe by one step.
    pub fn wipe_step(&mut self) {
        if !self.morph || self.morph_t >= self.config.cols {
            if self.morph {
                debug!(kind = ?self.config.wipe, "wipe finished");
            }
            self.morph = false;
            self.morph_t = 0;
            return;
        }

        match self.config.wipe {
            WipeKind::Side => {
                let col = self.morph_t;
                for row in 0..self.config.rows {
                    self.cells[row * self.config.cols + col].set_off();
                }
            }
            WipeKind::Diagonal => {
                let i = self.morph_t.min(self.config.rows - 1);
                self.cells[i * self.config.cols + i].set_on();
            }
        }
        self.morph_t += 1;
    }

    /// Invert every cell.
    pub fn flip_all(&mut self) {
        self.cells.iter_mut().for_each(Cell::flip);
    }

    /// Set every cell to `state`.
    pub fn fill(&mut self, state: bool) {
        for cell in &mut self.cells {
            if state {
                cell.set_on();
            } else {
                cell.set_off();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config(num_ents: usize) -> AutomatonConfig {
        AutomatonConfig {
            cols: 6,
            rows: 4,
            cell_size: 10.0,
            num_ents,
            rng_seed: Some(0xC0FFEE),
            ..AutomatonConfig::default()
        }
    }

    fn settled_grid(num_ents: usize) -> AutomatonGrid {
        let mut grid = AutomatonGrid::new(small_config(num_ents)).expect("grid");
        grid.morph = false;
        grid
    }

    #[test]
    fn rejects_zero_dimensions() {
        for config in [
            AutomatonConfig {
                cols: 0,
                ..small_config(1)
            },
            AutomatonConfig {
                rows: 0,
                ..small_config(1)
            },
            small_config(0),
        ] {
            assert!(matches!(
                AutomatonGrid::new(config),
                Err(WyrdError::InvalidDimension { .. })
            ));
        }
        assert_eq!(
            AutomatonGrid::new(AutomatonConfig {
                cell_size: 0.0,
                ..small_config(1)
            })
            .err(),
            Some(WyrdError::InvalidConfig("cell_size must be positive"))
        );
    }

    #[test]
    fn setup_places_agents_on_grid() {
        let grid = AutomatonGrid::new(small_config(8)).expect("grid");
        assert_eq!(grid.cells().len(), 24);
        assert!(grid.cells().iter().all(|cell| !cell.is_on()));
        assert_eq!(grid.agents().len(), 8);
        assert_eq!(grid.states().len(), 8);
        for agent in grid.agents() {
            let (col, row) = agent.grid_position();
            assert!(col < 6 && row < 4);
            assert!(agent.rule() < RULE_COUNT);
            assert_eq!(agent.direction(), Direction::North);
        }
        assert!(grid.is_morphing());
    }

    #[test]
    fn midpoint_is_inside_own_cell() {
        let grid = AutomatonGrid::new(small_config(3)).expect("grid");
        for agent in grid.agents() {
            let (col, row) = agent.grid_position();
            let (x, y) = agent.midpoint();
            assert!(grid.cell(col, row).expect("cell").contains(x, y));
        }
    }

    #[test]
    fn primitive_turns_follow_modular_rules() {
        assert_eq!(Primitive::TurnCw.turn(Direction::West), Direction::North);
        assert_eq!(Primitive::TurnCcw.turn(Direction::North), Direction::West);
        assert_eq!(Primitive::TurnCwHalf.turn(Direction::East), Direction::North);
        assert_eq!(Primitive::TurnCwHalf.turn(Direction::South), Direction::East);
        assert_eq!(Primitive::TurnCcwHalf.turn(Direction::North), Direction::East);
        assert_eq!(Primitive::TurnCcwHalf.turn(Direction::West), Direction::North);
        assert_eq!(Primitive::Advance.turn(Direction::South), Direction::South);
    }

    #[test]
    fn inverted_lookup_mirrors_turns() {
        use Primitive::{Advance, TurnCcw, TurnCw};

        let plain: Vec<_> = TransitionTable::lookup(1, false, Side::Right).collect();
        let inverted: Vec<_> = TransitionTable::lookup(1, true, Side::Right).collect();
        assert_eq!(plain, vec![TurnCcw, Advance, TurnCw, Advance]);
        assert_eq!(
            inverted,
            vec![TurnCw, Advance, TurnCcw, Advance]
        );
        let default_row: Vec<_> = TransitionTable::lookup(9, false, Side::Left).collect();
        assert_eq!(default_row, vec![TurnCw, Advance]);
    }

    #[test]
    fn rule_three_only_advances() {
        let mut grid = settled_grid(1);
        let agent = grid.agent_mut(0).expect("agent");
        agent.set_rule(3);
        agent.set_grid_position(2, 2);
        agent.set_direction(Direction::East);
        agent.left();
        assert_eq!(agent.grid_position(), (3, 2));
        assert_eq!(agent.direction(), Direction::East);
    }

    #[test]
    fn advance_wraps_toroidally() {
        let mut grid = settled_grid(1);
        let agent = grid.agent_mut(0).expect("agent");
        agent.set_rule(3);
        agent.set_grid_position(0, 0);
        agent.set_direction(Direction::North);
        agent.right();
        assert_eq!(agent.grid_position(), (0, 3));
        agent.set_direction(Direction::West);
        agent.right();
        assert_eq!(agent.grid_position(), (5, 3));
        let (min_x, min_y, max_x, max_y) = agent.bounds();
        let (x, y) = agent.position();
        assert!(x >= min_x && x < max_x && y >= min_y && y < max_y);
    }

    #[test]
    fn off_cell_is_flipped_on_and_agent_turns_left() {
        let mut grid = settled_grid(1);
        {
            let agent = grid.agent_mut(0).expect("agent");
            agent.set_grid_position(2, 1);
            agent.set_direction(Direction::North);
            agent.set_rule(0);
        }
        let inverted = grid.agent(0).expect("agent").is_inverted();

        grid.update();

        assert!(grid.cell(2, 1).expect("cell").is_on());
        let agent = grid.agent(0).expect("agent");
        let expected_dir = if inverted {
            Direction::West
        } else {
            Direction::East
        };
        assert_eq!(agent.direction(), expected_dir);
        let expected_pos = if inverted { (1, 1) } else { (3, 1) };
        assert_eq!(agent.grid_position(), expected_pos);
        assert_eq!(grid.states(), &[0]);
    }

    #[test]
    fn on_cell_is_flipped_off_and_recorded() {
        let mut grid = settled_grid(1);
        {
            let agent = grid.agent_mut(0).expect("agent");
            agent.set_grid_position(4, 3);
            agent.set_rule(3);
        }
        grid.cell_mut(4, 3).expect("cell").set_on();

        grid.update();

        assert!(!grid.cell(4, 3).expect("cell").is_on());
        assert_eq!(grid.states(), &[1]);
        assert_eq!(grid.state_total(), 1);
        assert_eq!(grid.agent(0).expect("agent").grid_position(), (4, 2));
    }

    #[test]
    fn rule_one_left_uses_half_turn() {
        let mut grid = settled_grid(1);
        let agent = grid.agent_mut(0).expect("agent");
        let inverted = agent.is_inverted();
        agent.set_rule(1);
        agent.set_grid_position(3, 2);
        agent.set_direction(Direction::West);
        agent.left();
        // Full turn West -> North (or South), then the half turn collapses to {N, E}.
        if inverted {
            // Ccw: West -> South, advance; CcwHalf: (2 + 3) % 2 = 1 -> East.
            assert_eq!(agent.direction(), Direction::East);
            assert_eq!(agent.grid_position(), (4, 3));
        } else {
            // Cw: West -> North, advance; CwHalf: (0 + 1) % 2 = 1 -> East.
            assert_eq!(agent.direction(), Direction::East);
            assert_eq!(agent.grid_position(), (4, 1));
        }
    }

    #[test]
    fn state_total_is_clamped() {
        let mut grid = settled_grid(6);
        for cell in 0..grid.cells.len() {
            grid.cells[cell].set_on();
        }
        for idx in 0..6 {
            grid.agent_mut(idx)
                .expect("agent")
                .set_grid_position(idx, idx % 4);
        }
        grid.update();
        assert_eq!(grid.states(), &[1, 1, 1, 1, 1, 1]);
        assert_eq!(grid.state_total(), STATE_TOTAL_MAX);
    }

    #[test]
    fn side_wipe_clears_one_column_per_step() {
        let mut grid = AutomatonGrid::new(small_config(1)).expect("grid");
        grid.fill(true);
        grid.start_morph();
        for step in 0..6 {
            grid.wipe_step();
            assert_eq!(grid.morph_t(), step + 1);
            for row in 0..4 {
                assert!(!grid.cell(step, row).expect("cell").is_on());
                if step + 1 < 6 {
                    assert!(grid.cell(step + 1, row).expect("cell").is_on());
                }
            }
        }
        assert!(grid.is_morphing());
        grid.wipe_step();
        assert!(!grid.is_morphing());
        assert_eq!(grid.morph_t(), 0);
    }

    #[test]
    fn diagonal_wipe_turns_cells_on() {
        let mut grid = AutomatonGrid::new(AutomatonConfig {
            wipe: WipeKind::Diagonal,
            ..small_config(1)
        })
        .expect("grid");
        for _ in 0..6 {
            grid.wipe_step();
        }
        for i in 0..4 {
            assert!(grid.cell(i, i).expect("cell").is_on());
        }
        let lit = grid.cells().iter().filter(|cell| cell.is_on()).count();
        assert_eq!(lit, 4);
    }

    #[test]
    fn rule_reassignment() {
        let mut grid = settled_grid(5);
        grid.index_rules();
        assert_eq!(grid.rules(), vec![0, 1, 2, 3, 4]);

        grid.mass_random_rules();
        let rules = grid.rules();
        assert!(rules.iter().all(|&rule| rule == rules[0] && rule < RULE_COUNT));

        grid.random_rules();
        assert!(grid.rules().iter().all(|&rule| rule < RULE_COUNT));

        assert!(grid.set_agent_rule(2, 3).is_ok());
        assert_eq!(grid.agent(2).expect("agent").rule(), 3);
    }

    #[test]
    fn single_agent_reassignment_is_bounds_checked() {
        let mut grid = settled_grid(2);
        let before = grid.rules();
        assert_eq!(
            grid.randomize_agent_rule(2),
            Err(WyrdError::IndexOutOfRange {
                kind: "agent",
                index: 2,
                len: 2
            })
        );
        assert!(grid.set_agent_rule(5, 1).is_err());
        assert_eq!(grid.rules(), before);
        assert!(grid.randomize_agent_rule(1).expect("in range") < RULE_COUNT);
    }

    #[test]
    fn rejected_reassignment_does_not_consume_randomness() {
        let mut touched = settled_grid(3);
        let mut untouched = settled_grid(3);
        for _ in 0..16 {
            assert!(touched.randomize_agent_rule(99).is_err());
            touched.random_rules();
            untouched.random_rules();
            assert_eq!(touched.rules(), untouched.rules());
        }
    }

    #[test]
    fn seeded_grids_evolve_identically() {
        let mut a = AutomatonGrid::new(small_config(4)).expect("a");
        let mut b = AutomatonGrid::new(small_config(4)).expect("b");
        for _ in 0..64 {
            a.update();
            b.update();
            assert_eq!(a.states(), b.states());
        }
        assert_eq!(a.cells(), b.cells());
        assert_eq!(a.agents(), b.agents());
        assert_eq!(a.steps(), 64);
    }
}
