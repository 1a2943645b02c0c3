use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use glam::Vec3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;

use lootcamp::anchor::Anchor;
use lootcamp::clock::SystemClock;
use lootcamp::config::Config;
use lootcamp::engine::Host;
use lootcamp::entity::EntityId;
use lootcamp::persistence::JsonFileStore;
use lootcamp::runtime::Runtime;
use lootcamp::sandbox::Sandbox;

#[derive(Parser, Debug)]
#[command(name = "lootcamp")]
#[command(about = "Spawns temporary lootable camps around players in a sandbox world")]
struct Args {
    /// Path to the configuration file, written with defaults if missing
    #[arg(short, long, default_value = "lootcamp.toml")]
    config: PathBuf,

    /// Directory for persisted camp records
    #[arg(short, long, default_value = "data")]
    data_dir: PathBuf,

    /// Number of players placed in the sandbox
    #[arg(short, long, default_value = "8")]
    anchors: usize,

    /// Random seed for reproducibility
    #[arg(short, long)]
    seed: Option<u64>,

    /// Seconds to run before unloading
    #[arg(short, long, default_value = "3600")]
    run_secs: u64,

    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = match args.verbose {
        0 => "lootcamp=info",
        1 => "lootcamp=debug",
        _ => "lootcamp=trace",
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Lootcamp v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::load_or_init(&args.config)?;
    let persistence = Arc::new(JsonFileStore::new(&args.data_dir)?);

    let seed = args.seed.unwrap_or_else(rand::random);
    let mut rng = StdRng::seed_from_u64(seed);
    let sandbox = Arc::new(Sandbox::generated(&mut rng, 128, 128));
    let extent = 128.0 * 4.0;
    for i in 0..args.anchors {
        let mut position = Vec3::new(rng.gen_range(0.0..extent), 0.0, rng.gen_range(0.0..extent));
        position.y = sandbox.terrain().height_at(position);
        sandbox.add_anchor(Anchor::standing(EntityId(i as u64 + 1), position));
    }
    info!("Sandbox ready with {} anchors, seed {}", args.anchors, seed);

    let runtime = Runtime::start(
        config,
        Host::uniform(sandbox.clone()),
        persistence,
        Arc::new(SystemClock),
        rng,
    )?;
    let resumed = runtime.resumed();
    info!(
        "Resumed saved camps: {} scheduled, {} removed, {} stale",
        resumed.scheduled, resumed.forced, resumed.stale
    );

    tokio::select! {
        _ = tokio::time::sleep(Duration::from_secs(args.run_secs)) => {}
        _ = tokio::signal::ctrl_c() => info!("Interrupted"),
    }

    let spawned = sandbox.with_template(&runtime.config().structure.template).len();
    let removed = runtime.unload().await;
    info!("Unloaded: {} camps alive at shutdown, {} removed", spawned, removed);
    Ok(())
}
