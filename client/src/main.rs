mod synthetic;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use common::{CacheSelection, FrameIndex};
use framecache::{Config, VideoHandler, log_and_continue};
use rayon::prelude::*;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::{Duration, Instant};

use synthetic::{LoggingObserver, SyntheticDecoder};

#[derive(Parser)]
#[command(name = "fcachectl")]
#[command(about = "Frame cache playback simulator", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file (defaults to the user config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a synthetic sequence while background workers cache ahead
    Simulate {
        /// Number of frames in the sequence
        #[arg(short, long, default_value = "120")]
        frames: FrameIndex,

        /// Frame width in pixels
        #[arg(long, default_value = "640")]
        width: u32,

        /// Frame height in pixels
        #[arg(long, default_value = "360")]
        height: u32,

        /// Time one decode takes, in milliseconds
        #[arg(short, long, default_value = "15")]
        decode_ms: u64,

        /// Playback rate of the render loop
        #[arg(long, default_value = "30")]
        fps: u32,

        /// Background caching threads (overrides the config)
        #[arg(short, long)]
        workers: Option<usize>,

        /// Let every n-th frame fail to decode
        #[arg(long)]
        fail_every: Option<u32>,

        /// Drop this frame from the cache halfway through playback
        #[arg(long)]
        evict: Option<FrameIndex>,
    },

    /// Print the effective configuration
    Config {
        /// Only print where the config file is looked up
        #[arg(long)]
        path: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.general.log_level.as_str()),
    )
    .init();

    match cli.command {
        Commands::Simulate {
            frames,
            width,
            height,
            decode_ms,
            fps,
            workers,
            fail_every,
            evict,
        } => {
            let options = SimulationOptions {
                frames,
                width,
                height,
                decode_time: Duration::from_millis(decode_ms),
                fps: fps.max(1),
                workers: workers.unwrap_or(config.cache.background_workers).max(1),
                fail_every,
                evict,
            };
            simulate(&config, options).await
        }
        Commands::Config { path } => {
            if path {
                println!("{}", Config::default_config_path()?.display());
            } else {
                println!("{}", serde_json::to_string_pretty(&config)?);
            }
            Ok(())
        }
    }
}

struct SimulationOptions {
    frames: FrameIndex,
    width: u32,
    height: u32,
    decode_time: Duration,
    fps: u32,
    workers: usize,
    fail_every: Option<u32>,
    evict: Option<FrameIndex>,
}

async fn simulate(config: &Config, options: SimulationOptions) -> Result<()> {
    let decoder = Arc::new(SyntheticDecoder::new(
        options.width,
        options.height,
        options.decode_time,
        options.fail_every,
    ));
    let observer = Arc::new(LoggingObserver::default());
    let handler = Arc::new(VideoHandler::new(
        decoder.clone(),
        observer.clone(),
        &config.cache,
    ));
    handler.set_frame_size(options.width, options.height);

    log::info!(
        "Simulating {} frames of {}x{} at {} fps with {} caching worker(s)",
        options.frames,
        options.width,
        options.height,
        options.fps,
        options.workers
    );

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(options.workers)
        .thread_name(|i| format!("cache-worker-{}", i))
        .build()
        .context("Failed to create caching thread pool")?;

    let position = Arc::new(AtomicU32::new(0));
    let done = Arc::new(AtomicBool::new(false));
    let background = {
        let handler = Arc::clone(&handler);
        let position = Arc::clone(&position);
        let done = Arc::clone(&done);
        let frames = options.frames;
        let preload_ahead = config.cache.preload_ahead.max(1);

        tokio::task::spawn_blocking(move || {
            while !done.load(Ordering::Acquire) {
                let start = position.load(Ordering::Acquire);
                let end = start.saturating_add(preload_ahead).min(frames);
                let pending: Vec<FrameIndex> = (start..end)
                    .filter(|index| !handler.is_cached(*index))
                    .collect();

                if pending.is_empty() {
                    std::thread::sleep(Duration::from_millis(5));
                    continue;
                }

                pool.install(|| {
                    pending.par_iter().for_each(|index| {
                        handler.cache_frame(*index);
                    });
                });
            }
        })
    };

    let started = Instant::now();
    let mut ticker = tokio::time::interval(Duration::from_secs(1) / options.fps);
    let mut placeholders = 0u64;

    for index in 0..options.frames {
        ticker.tick().await;
        position.store(index, Ordering::Release);

        let staged = {
            let handler = Arc::clone(&handler);
            tokio::task::spawn_blocking(move || handler.display_frame(index))
                .await
                .context("Render task panicked")?
        };
        if !staged {
            placeholders += 1;
            log::debug!("Frame {} not ready, showing placeholder", index);
        }

        if let Some(frame) = options.evict
            && index == options.frames / 2
        {
            handler.remove_from_cache(CacheSelection::Frame(frame));
        }

        handler.fetch_stats().maybe_log_stats(Duration::from_secs(1));
    }

    done.store(true, Ordering::Release);
    log_and_continue!(background.await, "join background caching");

    log::info!(
        "Played {} frames in {:.2}s ({} placeholders, {} decodes, {} notifications)",
        options.frames,
        started.elapsed().as_secs_f64(),
        placeholders,
        decoder.decoded(),
        observer.state_changes()
    );
    log::debug!(
        "Frame limit notifications: {}",
        observer.frame_limit_changes()
    );

    println!("{}", serde_json::to_string_pretty(&handler.stats())?);
    Ok(())
}
