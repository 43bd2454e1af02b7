use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use trellis_common::{
    EntityHandle, TAG_AWAKE, TAG_DETACHED, TAG_DISPOSABLE, TAG_ENTITY, TAG_PRIVATE, Vec2,
};
use trellis_kernel::{Object, TypeCatalog, TypeDescriptor};
use trellis_level::{ActivationConfig, EntityManager};
use trellis_persist::{LevelSnapshot, SnapshotStore};
use trellis_render::TextRenderQueue;
use trellis_stream::FrameTimer;
use trellis_tools::ActivationInspector;

#[derive(Parser)]
#[command(name = "trellis-cli", about = "Drive a simulated level through the activation subsystem")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Activation config file (.yaml, .yml or .json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print version and crate info
    Info,
    /// Spawn a mixed population and sweep a camera across the world
    Simulate {
        /// Number of entities to spawn
        #[arg(short, long, default_value = "1000")]
        entities: usize,
        /// Number of frames to run
        #[arg(short, long, default_value = "240")]
        frames: usize,
        /// Seed for positions and entity ids
        #[arg(short, long, default_value = "42")]
        seed: u64,
    },
    /// Save persistent entities, then restore them into a fresh level
    Snapshot {
        /// Number of entities to spawn
        #[arg(short, long, default_value = "16")]
        entities: usize,
        /// Also write the snapshot to this store directory
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

/// Camera size in world units.
const VIEW: (f32, f32) = (1280.0, 720.0);

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match cli.command {
        Commands::Info => {
            println!("trellis-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("common: {}", trellis_common::crate_info());
            println!("kernel: {}", trellis_kernel::crate_info());
            println!("registry: {}", trellis_registry::crate_info());
            println!("container: {}", trellis_container::crate_info());
            println!("stream: {}", trellis_stream::crate_info());
            println!("render: {}", trellis_render::crate_info());
            println!("level: {}", trellis_level::crate_info());
            println!("persist: {}", trellis_persist::crate_info());
            println!("tools: {}", trellis_tools::crate_info());
        }
        Commands::Simulate {
            entities,
            frames,
            seed,
        } => {
            let mut config = load_config(cli.config.as_deref())?;
            config.id_seed.get_or_insert(seed);
            simulate(config, entities, frames, seed)?;
        }
        Commands::Snapshot { entities, out } => {
            let config = load_config(cli.config.as_deref())?;
            snapshot(config, entities, out.as_deref())?;
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> anyhow::Result<ActivationConfig> {
    match path {
        Some(path) => ActivationConfig::load(path)
            .with_context(|| format!("loading config {}", path.display())),
        None => Ok(ActivationConfig::default()),
    }
}

/// Types of the demo level.
fn demo_catalog() -> TypeCatalog {
    let mut catalog = TypeCatalog::new();
    catalog.register(
        TypeDescriptor::new("Walker")
            .tagged(&[TAG_ENTITY])
            .renderable()
            .with_late_update()
            .with_companions(&["Shadow", "PathMarker"]),
    );
    catalog.register(TypeDescriptor::new("Shadow").renderable());
    catalog.register(TypeDescriptor::new("PathMarker").gizmo());
    catalog.register(
        TypeDescriptor::new("Pickup")
            .tagged(&[TAG_ENTITY, TAG_DISPOSABLE])
            .renderable(),
    );
    catalog.register(
        TypeDescriptor::new("Sentinel")
            .tagged(&[TAG_ENTITY, TAG_AWAKE])
            .with_late_update(),
    );
    catalog.register(
        TypeDescriptor::new("Overlay")
            .tagged(&[TAG_ENTITY, TAG_DETACHED, TAG_PRIVATE])
            .renderable(),
    );
    catalog
}

/// xorshift64 stream for demo positions.
struct Scatter(u64);

impl Scatter {
    fn next_u64(&mut self) -> u64 {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 7;
        self.0 ^= self.0 << 17;
        self.0
    }

    fn point(&mut self, width: i32, height: i32) -> Vec2 {
        let x = self.next_u64() % width.max(1) as u64;
        let y = self.next_u64() % height.max(1) as u64;
        Vec2::new(x as f32, y as f32)
    }
}

fn simulate(
    config: ActivationConfig,
    entities: usize,
    frames: usize,
    seed: u64,
) -> anyhow::Result<()> {
    println!("Simulating {entities} entities over {frames} frames (seed={seed})");
    let mut level = EntityManager::with_config(config, demo_catalog())?;
    let (width, height) = level.tree().world_size();
    let mut scatter = Scatter(seed | 1);

    let mut walkers = Vec::new();
    for i in 0..entities {
        let position = scatter.point(width, height);
        let type_name = match i % 20 {
            0 => "Sentinel",
            1..=4 => "Pickup",
            _ => "Walker",
        };
        let handle = level.spawn_entity(type_name, position)?;
        if type_name == "Walker" {
            walkers.push(handle);
        }
    }
    level.spawn("Overlay")?;

    let mut timer = FrameTimer::default();
    let mut messages = 0usize;
    let mut messenger = |_: EntityHandle, _: &Object, _: &str| messages += 1;
    let mut queue = TextRenderQueue::new();

    for frame in 0..frames {
        let start = Instant::now();

        // camera sweeps left to right along the middle band
        let span = (width as f32 - VIEW.0).max(1.0);
        let x = (frame as f32 * 64.0) % span;
        let y = (height as f32 - VIEW.1).max(0.0) / 2.0;
        level.set_region_of_interest(x, y, VIEW.0, VIEW.1);

        level.begin_frame();
        level.update(&mut messenger);

        // walkers on screen drift to the right
        for &walker in &walkers {
            if let Some(p) = level.position(walker)
                && level.is_inside_roi(p)
            {
                level.set_position(walker, p + Vec2::new(8.0, 0.0));
            }
        }

        level.late_update(&mut messenger);
        queue.clear();
        level.render(false, &mut queue);
        timer.record(start.elapsed());

        if frame % 60 == 0 {
            let active = level.active_entities(level.skip_inactive_policy()).len();
            println!(
                "frame {frame:>5}: active={active:>5} draws={:>5} roi={}",
                queue.len(),
                level.roi()
            );
        }
    }

    let reclaimed = level.collect_garbage();
    println!("{}", ActivationInspector::summary(&level));
    println!(
        "Frame time: avg={:?} min={:?} max={:?} over {} frames",
        timer.average(),
        timer.min(),
        timer.max(),
        timer.count()
    );
    println!("Messages delivered: {messages}, objects reclaimed: {reclaimed}");
    Ok(())
}

fn snapshot(config: ActivationConfig, entities: usize, out: Option<&Path>) -> anyhow::Result<()> {
    println!("Snapshot demo: spawning {entities} entities");
    let mut level = EntityManager::with_config(config.clone(), demo_catalog())?;
    let mut scatter = Scatter(0x5eed);
    let (width, height) = level.tree().world_size();
    for _ in 0..entities {
        level.spawn_entity("Walker", scatter.point(width, height))?;
    }
    level.spawn("Overlay")?;

    let snap = LevelSnapshot::capture(&level)?;
    let bytes = trellis_persist::encode(&snap)?;
    println!(
        "Snapshot: entities={} hash={} encoded={} bytes",
        snap.len(),
        snap.hash,
        bytes.len()
    );

    if let Some(dir) = out {
        let mut store = SnapshotStore::open(dir)?;
        let filename = store.save(&snap)?;
        store.verify_integrity()?;
        println!("Saved {} to {}", filename, store.root().display());
    }

    let decoded = trellis_persist::decode(&bytes)?;
    let mut restored = EntityManager::with_config(config, demo_catalog())?;
    decoded.restore(&mut restored)?;

    let mut matched = 0;
    for saved in &decoded.entities {
        let original = level.entity_with_id(saved.id);
        let copy = restored.entity_with_id(saved.id);
        if let (Some(a), Some(b)) = (original, copy)
            && level.position(a) == restored.position(b)
        {
            matched += 1;
        }
    }
    println!(
        "Restored: {matched}/{} entities matched by id and position",
        decoded.len()
    );
    if matched != decoded.len() {
        anyhow::bail!("snapshot round-trip lost entities");
    }
    Ok(())
}
