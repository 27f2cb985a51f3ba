use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use wyrd_app::{AppConfig, Session, SessionKind, SweepCursor, UpdateMode, load_config};
use wyrd_core::TieUpStrategy;

/// Upper bound on frames per requested draft tick before the run is abandoned.
const FRAME_BUDGET_PER_TICK: u64 = 1_024;

#[derive(Parser, Debug)]
#[command(
    name = "wyrd",
    version,
    about = "Weave a draft from a turmite automaton without any camera or printer"
)]
struct Cli {
    /// Number of draft ticks to produce.
    #[arg(long, default_value_t = 64)]
    ticks: u64,

    /// Seed every random source for a reproducible run.
    #[arg(long, env = "WYRD_SEED")]
    seed: Option<u64>,

    /// JSON configuration file; defaults are used for anything it omits.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Initial threading update mode.
    #[arg(long, value_enum)]
    mode: Option<UpdateMode>,

    /// Tie-up layout applied at start.
    #[arg(long, value_enum)]
    tie_up: Option<TieUpStrategy>,

    /// Session variant.
    #[arg(long, value_enum)]
    session: Option<SessionKind>,

    /// Print one JSON draft snapshot per tick instead of printer lines.
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = build_config(&cli)?;
    run(&cli, config)
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .try_init();
}

fn build_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => AppConfig::default(),
    };
    if let Some(seed) = cli.seed {
        config = config.with_seed(seed);
    }
    if let Some(mode) = cli.mode {
        config.session.initial_mode = mode;
    }
    if let Some(tie_up) = cli.tie_up {
        config.engine.draft.tie_up = tie_up;
    }
    if let Some(kind) = cli.session {
        config.session.kind = kind;
    }
    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn run(cli: &Cli, config: AppConfig) -> Result<()> {
    let shafts = config.engine.draft.num_shafts;
    let mut session = Session::new(config).context("failed to start session")?;
    let mut source = SweepCursor::new(shafts, 96, 160);

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let frame_budget = cli.ticks.saturating_mul(FRAME_BUDGET_PER_TICK);
    let mut emitted = 0;

    while emitted < cli.ticks {
        if session.frame() >= frame_budget {
            warn!(frames = session.frame(), emitted, "frame budget exhausted");
            break;
        }
        let Some(tick) = session.tick(&mut source)? else {
            continue;
        };
        emitted += 1;
        if cli.json {
            serde_json::to_writer(&mut out, &session.draft().snapshot())
                .context("failed to encode snapshot")?;
            writeln!(out)?;
        } else {
            writeln!(out, "{}", tick.shed)?;
        }
    }
    out.flush().context("failed to flush output")?;

    info!(
        frames = session.frame(),
        draft_ticks = session.draft_ticks(),
        mode = ?session.mode(),
        rules = ?session.grid().rules(),
        "session finished"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tie_up_flag_parses_strategy_names() {
        let cli = Cli::try_parse_from(["wyrd", "--tie-up", "plain", "--seed", "3"]).expect("cli");
        assert_eq!(cli.tie_up, Some(TieUpStrategy::Plain));
        let config = build_config(&cli).expect("config");
        assert_eq!(config.engine.draft.tie_up, TieUpStrategy::Plain);
        assert_eq!(config.engine.draft.rng_seed, Some(3));

        assert!(Cli::try_parse_from(["wyrd", "--tie-up", "satin"]).is_err());
    }
}
