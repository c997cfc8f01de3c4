//! Loadout Simulation
//!
//! Runs a seeded colony with the loadout engine deciding who carries what,
//! and writes every decision to a JSONL log.

use clap::Parser;
use std::fs;
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;

use loadout_sim::{DecisionLogger, SimConfig, SimError, Simulation};

/// Command line arguments for the simulation
#[derive(Parser, Debug)]
#[command(name = "loadout_sim")]
#[command(about = "Colony simulation driven by the loadout decision engine")]
struct Args {
    /// Random seed for reproducibility
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Number of ticks to simulate
    #[arg(long, default_value_t = 2000)]
    ticks: u64,

    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the number of colonists
    #[arg(long)]
    agents: Option<usize>,

    /// Override the amount of starting loose gear
    #[arg(long)]
    items: Option<usize>,

    /// Where to write the decision log
    #[arg(long, default_value = "output/decisions.jsonl")]
    events: PathBuf,

    /// Write the engine's ground truth here when the run ends
    #[arg(long)]
    ground_truth: Option<PathBuf>,

    /// Restore engine state from a ground truth file before the first tick
    #[arg(long)]
    restore: Option<PathBuf>,

    /// Ticks between progress lines
    #[arg(long, default_value_t = 500)]
    report_interval: u64,

    /// Print the default configuration as TOML and exit
    #[arg(long)]
    print_config: bool,
}

fn main() {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(args) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run(args: Args) -> Result<(), SimError> {
    if args.print_config {
        print!("{}", SimConfig::default().to_toml()?);
        return Ok(());
    }

    let mut config = match &args.config {
        Some(path) => SimConfig::from_file(path)?,
        None => SimConfig::default(),
    };
    if let Some(agents) = args.agents {
        config.world.agents = agents;
    }
    if let Some(items) = args.items {
        config.world.items = items;
    }

    println!("Loadout Simulation");
    println!("==================");
    println!("Seed: {}", args.seed);
    println!("Ticks: {}", args.ticks);
    println!("Colonists: {}", config.world.agents);
    println!("Loose gear: {}", config.world.items);
    println!("Decision log: {}", args.events.display());
    println!();

    let logger = DecisionLogger::new(&args.events).map_err(|source| SimError::Io {
        path: args.events.clone(),
        source,
    })?;
    let mut sim = Simulation::new(config, args.seed, logger)?;

    if let Some(path) = &args.restore {
        let json = fs::read_to_string(path).map_err(|source| SimError::Io {
            path: path.clone(),
            source,
        })?;
        sim.import_ground_truth(&json)?;
        println!("Restored engine state from {}", path.display());
    }

    for tick in 1..=args.ticks {
        sim.step();

        if args.report_interval > 0 && tick % args.report_interval == 0 {
            let stats = sim.engine().stats();
            println!(
                "Tick {}: {} swaps, {} holds, {} deferrals, {} pending events",
                tick,
                stats.swaps,
                stats.holds,
                stats.deferrals,
                sim.engine().scheduler().len()
            );
        }
    }

    let consistent = sim.audit();
    sim.flush().map_err(|source| SimError::Io {
        path: args.events.clone(),
        source,
    })?;

    if let Some(path) = &args.ground_truth {
        let json = sim.export_ground_truth().to_json()?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| SimError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(path, json).map_err(|source| SimError::Io {
            path: path.clone(),
            source,
        })?;
        println!("Ground truth written to {}", path.display());
    }

    let stats = sim.engine().stats();
    let counters = sim.counters();
    println!();
    println!("Simulation complete at tick {}", sim.tick());
    println!(
        "Engine: {} evaluations, {} swaps, {} holds, {} deferrals, {} skips",
        stats.evaluations, stats.swaps, stats.holds, stats.deferrals, stats.skips
    );
    println!(
        "Score cache: {} hits, {} misses; {} drift corrections",
        stats.cache_hits, stats.cache_misses, stats.drift_corrections
    );
    println!(
        "World: {} fumbles, {} recoveries, {} fires, {} destroyed, {} loot drops",
        counters.fumbles, counters.recoveries, counters.fires, counters.destroyed, counters.loot_spawned
    );
    println!("Decisions logged: {}", counters.decisions_logged);
    println!("Final audit: {}", if consistent { "consistent" } else { "corrected" });

    Ok(())
}
