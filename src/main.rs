use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use gridworld_qlearning::render::{render_path, render_policy, render_values, render_world};
use gridworld_qlearning::{Config, DetPolicy};

/// Upper bound on the greedy walk printed after training.
const ROLLOUT_STEPS: usize = 100;
/// Convergence threshold of the value-iteration baseline.
const PLAN_MAX_DELTA: f64 = 1e-6;

#[derive(Parser)]
#[command(name = "gridworld-qlearning")]
#[command(version, about = "Tabular Q-learning on a stochastic grid world", long_about = None)]
struct Cli {
    /// Path to the JSON run configuration
    #[arg(long, visible_alias = "json_path", default_value = "./main.json")]
    json_path: PathBuf,

    /// Seed for the learner's random stream (overrides the config)
    #[arg(long)]
    seed: Option<u64>,

    /// Write the fit trace to this CSV file
    #[arg(long)]
    trace: Option<PathBuf>,

    /// Also print the value-iteration baseline
    #[arg(long)]
    plan: bool,
}

fn init_logging() {
    let mut filter = EnvFilter::from_default_env();
    if let Ok(d) = "gridworld_qlearning=info".parse() {
        filter = filter.add_directive(d);
    }
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    let mut config = Config::from_path(&cli.json_path)
        .with_context(|| format!("loading {}", cli.json_path.display()))?;
    if cli.seed.is_some() {
        config.val_fn.seed = cli.seed;
    }
    let gamma = config.val_fn.gamma;
    let (world, mut learner) = config.into_parts().context("building the run")?;

    println!("World (noise {}): ", world.noise());
    print!("{}", render_world(&world, world.init_state()));
    println!();

    let q = learner.fit(&world).context("fitting")?;

    println!("Final V Values: ");
    print!("{}", render_values(&world, q)?);
    println!("\n");
    println!("Final Policy Values: ");
    print!("{}", render_policy(&world, q)?);

    if let Some(start) = world.init_state() {
        let path = DetPolicy::from_q_table(q)?.rollout(&world, start, ROLLOUT_STEPS)?;
        println!();
        println!("Greedy path: {}", render_path(&path));
    }

    if let Some(path) = &cli.trace {
        learner
            .trace()
            .to_path(path)
            .with_context(|| format!("writing trace to {}", path.display()))?;
        info!(path = %path.display(), "trace written");
    }

    if cli.plan {
        let values = world.value_iteration(gamma, PLAN_MAX_DELTA)?;
        let planned = world.q_from_values(&values, gamma)?;
        println!();
        println!("Value iteration ({} sweeps): ", values.sweeps());
        print!("{}", render_values(&world, &planned)?);
        println!();
        print!("{}", render_policy(&world, &planned)?);
    }

    Ok(())
}
