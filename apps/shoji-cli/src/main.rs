use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};
use rand::SeedableRng;
use rand::rngs::StdRng;
use shoji_assets::{FsImageLoader, ImageLoader, ImageSource, MemoryImageLoader};
use shoji_input::{Action, Session};
use shoji_render::{DebugTextRenderer, RenderView, Renderer};
use shoji_scene::SceneGraph;
use shoji_stream::{EvictionPolicy, FlyThroughCamera, ImageSequencer, PanelStream, StreamConfig};
use shoji_tools::{FrameTimer, StreamInspector};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "shoji-cli", about = "Headless panel stream driver")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print version and default configuration
    Info,
    /// Fly the camera for a number of frames and report the stream state
    Run {
        /// Number of frames to simulate
        #[arg(short, long, default_value = "5000")]
        frames: u64,
        /// RNG seed for image order and shape layout (entropy when absent)
        #[arg(short, long)]
        seed: Option<u64>,
        /// Asset root containing `images/img-<n>.jpg`; synthetic images when absent
        #[arg(short, long)]
        images: Option<PathBuf>,
        /// YAML stream configuration
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Eviction policy: creation_lag or oldest_live
        #[arg(short, long)]
        policy: Option<EvictionPolicy>,
        /// Print the final report as JSON
        #[arg(long)]
        json: bool,
        /// Dump the final scene tree
        #[arg(long)]
        dump: bool,
    },
    /// Print the image order for a number of cycles
    Sequence {
        /// Number of distinct images
        #[arg(short = 'n', long, default_value = "12")]
        count: u32,
        /// Number of full cycles to print
        #[arg(short, long, default_value = "2")]
        cycles: usize,
        #[arg(short, long, default_value = "42")]
        seed: u64,
    },
}

struct RunOptions {
    frames: u64,
    seed: Option<u64>,
    json: bool,
    dump: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    match cli.command {
        Commands::Info => {
            let config = StreamConfig::default();
            println!("shoji-cli v{}", env!("CARGO_PKG_VERSION"));
            println!(
                "stream: window={} pitch={} advance={} images={} shapes={} eviction={:?}",
                config.window_size,
                config.pitch,
                config.anchor_advance,
                config.image_count,
                config.shape_count,
                config.eviction
            );
            let camera = FlyThroughCamera::default();
            println!(
                "camera: eye={} step={} fov={} near={} far={}",
                camera.eye(),
                camera.step,
                camera.fov_degrees,
                camera.near,
                camera.far
            );
        }
        Commands::Run {
            frames,
            seed,
            images,
            config,
            policy,
            json,
            dump,
        } => {
            let mut stream_config = match &config {
                Some(path) => StreamConfig::load(path)
                    .with_context(|| format!("loading config {}", path.display()))?,
                None => StreamConfig::default(),
            };
            if let Some(policy) = policy {
                stream_config.eviction = policy;
            }
            let options = RunOptions {
                frames,
                seed,
                json,
                dump,
            };
            match images {
                Some(root) => {
                    stream_config.base_url = root.to_string_lossy().into_owned();
                    stream_config.validate()?;
                    run(stream_config, FsImageLoader::new(), &options)?;
                }
                None => {
                    stream_config.validate()?;
                    let source = ImageSource::new(stream_config.base_url.clone());
                    let loader = MemoryImageLoader::synthetic(&source, stream_config.image_count);
                    run(stream_config, loader, &options)?;
                }
            }
        }
        Commands::Sequence {
            count,
            cycles,
            seed,
        } => {
            anyhow::ensure!(count > 0, "image count must be positive");
            let mut sequencer = ImageSequencer::new(count, StdRng::seed_from_u64(seed));
            for cycle in 0..cycles {
                let order: Vec<String> = (0..count)
                    .map(|_| sequencer.next().to_string())
                    .collect();
                println!("cycle {cycle}: {}", order.join(" "));
            }
        }
    }

    Ok(())
}

fn run<L: ImageLoader>(
    config: StreamConfig,
    loader: L,
    options: &RunOptions,
) -> anyhow::Result<()> {
    let mut session = Session::new();
    for effect in session.handle(Action::Start) {
        tracing::debug!(?effect, "session effect");
    }

    let mut camera = FlyThroughCamera::with_step(config.camera_step);
    let mut stream = match options.seed {
        Some(seed) => PanelStream::seeded(config, loader, seed),
        None => PanelStream::new(config, loader),
    };
    let mut scene = SceneGraph::new();
    let mut timer = FrameTimer::new(120);

    for _ in 0..options.frames {
        let start = Instant::now();
        let report = stream.advance(&mut camera, &mut scene);
        timer.record(start.elapsed());
        if let Some(index) = report.issued {
            tracing::info!(index, x = report.camera_x, "panel issued");
        }
        for failure in &report.failed {
            tracing::warn!(index = failure.creation_index, error = %failure.error, "panel failed");
        }
    }

    let summary = StreamInspector::summary(&stream, &scene);
    let panels = StreamInspector::list_panels(&stream, &scene);

    if options.json {
        let report = serde_json::json!({
            "camera_x": camera.x,
            "fps": timer.fps(),
            "summary": summary,
            "panels": panels,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{summary}");
        for panel in &panels {
            println!("  {panel}");
        }
        println!(
            "camera x={:.1}, frame avg={:?} max={:?} ({:.0} fps)",
            camera.x,
            timer.average(),
            timer.max(),
            timer.fps()
        );
    }

    if options.dump {
        let view = RenderView {
            eye: camera.eye(),
            target: camera.target(),
            fov_degrees: camera.fov_degrees,
        };
        print!("{}", DebugTextRenderer::new().render(&scene, &view));
    }

    let retired = stream.shutdown(&mut scene)?;
    tracing::debug!(retired, nodes = scene.node_count(), "scene cleared");
    Ok(())
}
