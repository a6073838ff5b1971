//! Quinteq CLI application

use anyhow::Context;
use clap::{Parser, Subcommand};
use quinteq_core::domain::audio::{AudioEnumerator, SampleRate, StreamConfig};
use quinteq_core::domain::chain::ChainBypass;
use quinteq_core::domain::filter::ChainCoefficients;
use quinteq_core::domain::params::{EqSnapshot, ParameterStore};
use quinteq_core::domain::preset::{AppConfig, EqPreset, PresetManager, PresetWatcher};
use quinteq_core::domain::response::{FrequencyAxis, ResponseEvaluator};
use quinteq_infra::audio::{CpalEnumerator, DuplexEqStream};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "quinteq")]
#[command(about = "A five-band stereo parametric equalizer", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List available audio devices
    Devices,

    /// Run the equalizer between an input and an output device
    Run {
        /// Application config file; flags below override its values
        #[arg(long)]
        config: Option<PathBuf>,

        /// Capture device name (default input when omitted)
        #[arg(long)]
        input: Option<String>,

        /// Playback device name (default output when omitted)
        #[arg(long)]
        output: Option<String>,

        /// Preset file to load at startup
        #[arg(long)]
        preset: Option<PathBuf>,

        #[arg(long)]
        sample_rate: Option<u32>,

        #[arg(long)]
        block_size: Option<u32>,

        /// Reload the preset file whenever it changes on disk
        #[arg(long)]
        watch: bool,
    },

    /// Print the magnitude response of a preset (or the flat defaults)
    Response {
        /// Preset file to evaluate
        #[arg(long)]
        preset: Option<PathBuf>,

        #[arg(long, default_value_t = 48_000)]
        sample_rate: u32,

        /// Number of log-spaced points between 20 Hz and 20 kHz
        #[arg(long, default_value_t = 96)]
        points: usize,

        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// List presets in a directory, seeding a flat one if empty
    Presets {
        #[arg(long, default_value = "presets")]
        dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .init();
    }

    match cli.command {
        Command::Devices => list_devices(),
        Command::Run {
            config,
            input,
            output,
            preset,
            sample_rate,
            block_size,
            watch,
        } => run(config, input, output, preset, sample_rate, block_size, watch).await,
        Command::Response {
            preset,
            sample_rate,
            points,
            json,
        } => response(preset, sample_rate, points, json).await,
        Command::Presets { dir } => presets(dir).await,
    }
}

fn list_devices() -> anyhow::Result<()> {
    let enumerator = CpalEnumerator::new();

    println!("Capture devices:");
    for info in enumerator.input_devices()? {
        let rate = info
            .default_sample_rate
            .map(|sr| format!("{} Hz", sr.hz()))
            .unwrap_or_else(|| "unknown rate".to_string());
        println!("  {} ({} ch, {})", info.name, info.max_channels, rate);
    }

    println!("Playback devices:");
    for info in enumerator.output_devices()? {
        let rate = info
            .default_sample_rate
            .map(|sr| format!("{} Hz", sr.hz()))
            .unwrap_or_else(|| "unknown rate".to_string());
        println!("  {} ({} ch, {})", info.name, info.max_channels, rate);
    }

    Ok(())
}

async fn load_snapshot(preset: Option<&PathBuf>) -> anyhow::Result<EqSnapshot> {
    match preset {
        Some(path) => {
            let preset = EqPreset::load_from_file(path)
                .await
                .with_context(|| format!("loading preset {}", path.display()))?;
            tracing::info!(name = %preset.name, "Preset loaded");
            Ok(preset.eq)
        }
        None => Ok(EqSnapshot::default()),
    }
}

#[allow(clippy::too_many_arguments)]
async fn run(
    config: Option<PathBuf>,
    input: Option<String>,
    output: Option<String>,
    preset: Option<PathBuf>,
    sample_rate: Option<u32>,
    block_size: Option<u32>,
    watch: bool,
) -> anyhow::Result<()> {
    let app_config = match config {
        Some(path) => AppConfig::load_from_file(&path)
            .await
            .with_context(|| format!("loading config {}", path.display()))?,
        None => AppConfig::default(),
    };
    let input = input.or(app_config.input_device);
    let output = output.or(app_config.output_device);
    let sample_rate = sample_rate.unwrap_or(app_config.sample_rate);
    let block_size = block_size.unwrap_or(app_config.block_size);

    let params = Arc::new(ParameterStore::new());
    params.apply_snapshot(&load_snapshot(preset.as_ref()).await?);

    let enumerator = CpalEnumerator::new();
    let config = StreamConfig {
        sample_rate: SampleRate::from_hz(sample_rate),
        buffer_size: block_size,
    };
    let stream = DuplexEqStream::open(
        &enumerator,
        input.as_deref(),
        output.as_deref(),
        &config,
        Arc::clone(&params),
    )?;

    // Free retired coefficient sets off the audio thread.
    let reclaimer = stream.reclaimer();
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(Duration::from_millis(250));
        loop {
            tick.tick().await;
            reclaimer.drain();
        }
    });

    let _watcher;
    if watch {
        if let Some(path) = preset.clone() {
            let dir = path
                .parent()
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("."));
            let watcher = PresetWatcher::new(dir).await?;
            let mut changes = watcher.subscribe();
            _watcher = watcher;

            let params = Arc::clone(&params);
            tokio::spawn(async move {
                while let Ok(changed) = changes.recv().await {
                    if changed.file_name() != path.file_name() {
                        continue;
                    }
                    match EqPreset::load_from_file(&path).await {
                        Ok(preset) => {
                            tracing::info!(name = %preset.name, "Preset reloaded");
                            params.apply_snapshot(&preset.eq);
                        }
                        Err(e) => tracing::warn!("Preset reload failed: {}", e),
                    }
                }
            });
        } else {
            tracing::warn!("--watch has no effect without --preset");
        }
    }

    tracing::info!("Equalizer running, press ctrl-c to stop");
    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");
    drop(stream);

    Ok(())
}

async fn response(
    preset: Option<PathBuf>,
    sample_rate: u32,
    points: usize,
    json: bool,
) -> anyhow::Result<()> {
    let snapshot = load_snapshot(preset.as_ref()).await?;
    let evaluator = ResponseEvaluator::new(
        ChainCoefficients::design(&snapshot, sample_rate as f32),
        ChainBypass::default(),
        sample_rate as f32,
    );
    let axis = FrequencyAxis::log_spaced(20.0, 20_000.0, points);

    if json {
        let curve: Vec<serde_json::Value> = evaluator
            .sweep(&axis)
            .map(|(freq_hz, db)| {
                serde_json::json!({ "freq_hz": freq_hz, "magnitude_db": db })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&curve)?);
    } else {
        println!("{:>12}  {:>10}", "freq (Hz)", "gain (dB)");
        for (freq_hz, db) in evaluator.sweep(&axis) {
            println!("{freq_hz:>12.1}  {db:>10.2}");
        }
    }

    Ok(())
}

async fn presets(dir: PathBuf) -> anyhow::Result<()> {
    let manager = PresetManager::new(dir.clone());

    let names = match manager.list_presets().await {
        Ok(names) if !names.is_empty() => names,
        _ => {
            manager.save_preset("flat", &EqPreset::flat()).await?;
            tracing::info!(dir = %dir.display(), "Seeded flat preset");
            manager.list_presets().await?
        }
    };

    for name in names {
        println!("{name}");
    }

    Ok(())
}
