//! mechcam CLI: classify mechanical component frames and explain the result.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use burn::prelude::*;
use mechcam::{Demo, DemoConfig, Samples};
use mechcam_core::backend::NdArray;
use mechcam_core::{RgbFrame, Seed};
use mechcam_models::{
    save_checkpoint, CamClassifier, CheckpointMetadata, CheckpointPaths, ResNetConfig,
    ShapeRecorder,
};

/// Backend for checkpoint creation and shape inspection.
type InitBackend = NdArray;

#[derive(Parser)]
#[command(name = "mechcam")]
#[command(author, version)]
#[command(about = "Classify mechanical components and explain predictions with Grad-CAM")]
#[command(long_about = "mechcam: Grad-CAM explanations for a bolt / locatingpin / nut / washer classifier.

Frames are JSON files: {\"width\": W, \"height\": H, \"pixels\": [r, g, b, ...]}.

EXAMPLES:
  # Create demo weights (random, untrained)
  mechcam init-checkpoint --output checkpoints/resnet50_gradcam

  # List sample frames
  mechcam samples --dir sample_dir

  # Classify and explain a frame
  mechcam explain --input sample_dir/bolt_01.json --output report.json

  # Explain a specific class on an earlier stage
  mechcam explain --input sample_dir/nut_02.json --class 2 --layer layer3")]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Demo configuration file (JSON)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List class labels
    Classes,
    /// Write a randomly initialised checkpoint for trying the demo
    InitCheckpoint {
        /// Output checkpoint directory
        #[arg(long, value_name = "DIR")]
        output: PathBuf,

        /// Random seed for the weights
        #[arg(long, default_value = "42", value_name = "SEED")]
        seed: u64,

        /// Use a small network (one narrow block per stage, 64x64 input)
        #[arg(long, default_value = "false")]
        small: bool,
    },
    /// List sample frames
    Samples {
        /// Sample directory
        #[arg(long, value_name = "DIR")]
        dir: Option<PathBuf>,
    },
    /// Show the observable layers and their output shapes
    Layers {
        /// Checkpoint directory (architecture is read from its metadata)
        #[arg(long, value_name = "DIR")]
        checkpoint: Option<PathBuf>,
    },
    /// Classify a frame
    Predict {
        /// Frame file (JSON), or a sample name
        #[arg(long, value_name = "FRAME")]
        input: Option<String>,

        /// Checkpoint directory
        #[arg(long, value_name = "DIR")]
        checkpoint: Option<PathBuf>,
    },
    /// Classify a frame and compute its Grad-CAM heatmap
    Explain {
        /// Frame file (JSON), or a sample name
        #[arg(long, value_name = "FRAME")]
        input: Option<String>,

        /// Class to explain instead of the predicted one
        #[arg(long, value_name = "K")]
        class: Option<usize>,

        /// Target layer
        #[arg(long, value_name = "LAYER")]
        layer: Option<String>,

        /// Checkpoint directory
        #[arg(long, value_name = "DIR")]
        checkpoint: Option<PathBuf>,

        /// Write the JSON report here
        #[arg(long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = match cli.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::filter::LevelFilter::from_level(log_level))
        .init();

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Classes => handle_classes(&config),
        Commands::InitCheckpoint {
            output,
            seed,
            small,
        } => handle_init_checkpoint(config, output, seed, small),
        Commands::Samples { dir } => handle_samples(config, dir),
        Commands::Layers { checkpoint } => handle_layers(config, checkpoint),
        Commands::Predict { input, checkpoint } => handle_predict(config, input, checkpoint),
        Commands::Explain {
            input,
            class,
            layer,
            checkpoint,
            output,
        } => handle_explain(config, input, class, layer, checkpoint, output),
    }
}

fn load_config(path: Option<&Path>) -> Result<DemoConfig> {
    match path {
        Some(path) => DemoConfig::load(path)
            .with_context(|| format!("Failed to read config {}", path.display())),
        None => Ok(DemoConfig::default()),
    }
}

fn handle_classes(config: &DemoConfig) -> Result<()> {
    println!("Classes ({}):", config.class_names.len());
    for (index, name) in config.class_names.iter().enumerate() {
        println!("  {:>2}  {}", index, name);
    }
    Ok(())
}

fn handle_init_checkpoint(config: DemoConfig, output: PathBuf, seed: u64, small: bool) -> Result<()> {
    let n_classes = config.class_names.len();
    if n_classes == 0 {
        bail!("No class names configured");
    }
    let model_config = if small {
        ResNetConfig::tiny(n_classes, 64)
    } else {
        ResNetConfig {
            n_classes,
            ..config.model.clone()
        }
    };

    InitBackend::seed(Seed::new(seed).value());
    let device = Default::default();
    let model = model_config.init::<InitBackend>(&device);

    println!("Initialising checkpoint (untrained weights)");
    println!("  Layers: {:?}", model_config.layers);
    println!("  Width: {}", model_config.base_width);
    println!("  Input: {}", model_config.input_shape());
    println!("  Parameters: {}", model.num_params());

    let paths = save_checkpoint(&model, &model_config, &config.class_names, &output)
        .with_context(|| format!("Failed to write checkpoint to {}", output.display()))?;

    println!("\nWeights: {}", paths.weights().display());
    println!("Metadata: {}", paths.metadata().display());
    Ok(())
}

fn handle_samples(config: DemoConfig, dir: Option<PathBuf>) -> Result<()> {
    let dir = dir.unwrap_or(config.sample_dir);
    let samples = Samples::scan(&dir);

    if let Some(message) = &samples.message {
        println!("{}", message);
    }
    for name in &samples.names {
        println!("  {}", name);
    }
    Ok(())
}

fn handle_layers(config: DemoConfig, checkpoint: Option<PathBuf>) -> Result<()> {
    let dir = checkpoint.unwrap_or_else(|| config.checkpoint.clone());
    let metadata_path = CheckpointPaths::new(&dir).metadata();
    let model_config = if metadata_path.is_file() {
        CheckpointMetadata::load(&metadata_path)
            .and_then(|meta| meta.resnet_config())
            .with_context(|| format!("Failed to read {}", metadata_path.display()))?
    } else {
        config.model.clone()
    };

    let device = Default::default();
    let model = model_config.init::<InitBackend>(&device);
    let shape = model.input_shape();
    let input = Tensor::<InitBackend, 4>::zeros(shape.batched(), &device);

    let mut recorder = ShapeRecorder::new();
    let _ = model.forward_observed(input, &mut recorder);

    println!("Input: {}", shape);
    println!("{:<8} {:>10} {:>10}", "Layer", "Channels", "Spatial");
    println!("{}", "-".repeat(30));
    for (layer, [_, channels, height, width]) in recorder.shapes() {
        println!("{:<8} {:>10} {:>10}", layer, channels, format!("{}x{}", height, width));
    }
    Ok(())
}

fn demo_with(config: DemoConfig, checkpoint: Option<PathBuf>) -> Result<Demo> {
    let config = match checkpoint {
        Some(checkpoint) => config.with_checkpoint(checkpoint),
        None => config,
    };
    Ok(Demo::load(config)?)
}

fn resolve_input(demo: &Demo, input: Option<String>) -> Result<(String, RgbFrame)> {
    if let Some(input) = &input {
        let path = Path::new(input);
        if path.is_file() {
            let frame = RgbFrame::load(path)
                .with_context(|| format!("Failed to read frame {}", path.display()))?;
            return Ok((input.clone(), frame));
        }
    }

    match demo.select_sample(input.as_deref())? {
        Some(found) => Ok(found),
        None => bail!(
            "No input frame: pass --input or add frames to {}",
            demo.config().sample_dir.display()
        ),
    }
}

fn require_model(demo: &Demo) -> Result<()> {
    if !demo.has_model() {
        bail!(
            "Model unavailable: {}\nHint: run `mechcam init-checkpoint --output {}`",
            demo.status().unwrap_or("no model loaded"),
            demo.config().checkpoint.display()
        );
    }
    Ok(())
}

fn handle_predict(config: DemoConfig, input: Option<String>, checkpoint: Option<PathBuf>) -> Result<()> {
    let demo = demo_with(config, checkpoint)?;
    let (name, frame) = resolve_input(&demo, input)?;
    require_model(&demo)?;

    let prediction = demo.predict(&frame)?;
    println!("{}: {} (class {})", name, prediction.label, prediction.class_index);
    for (index, score) in prediction.scores.iter().enumerate() {
        println!("  {:<12} {:>10.4}", demo.class_label(index), score);
    }
    Ok(())
}

fn handle_explain(
    config: DemoConfig,
    input: Option<String>,
    class: Option<usize>,
    layer: Option<String>,
    checkpoint: Option<PathBuf>,
    output: Option<PathBuf>,
) -> Result<()> {
    let config = match layer {
        Some(layer) => config.with_target_layer(layer),
        None => config,
    };
    let demo = demo_with(config, checkpoint)?;
    let (name, frame) = resolve_input(&demo, input)?;
    require_model(&demo)?;

    let analysis = demo.analyze_class(&frame, class);
    let (Some(prediction), Some(heatmap)) = (&analysis.prediction, &analysis.heatmap) else {
        bail!(
            "Analysis failed: {}",
            analysis.message.as_deref().unwrap_or("unknown error")
        );
    };

    println!(
        "{}: {} (class {}) on '{}'",
        name,
        prediction.label,
        prediction.class_index,
        demo.config().grad_cam.target_layer
    );
    let (x, y) = heatmap.peak();
    println!("Peak attention at ({}, {})\n", x, y);
    print!("{}", heatmap.to_ascii(48, 24));

    if let Some(output) = output {
        let report = serde_json::to_string(&analysis.report())?;
        std::fs::write(&output, report)
            .with_context(|| format!("Failed to write report {}", output.display()))?;
        println!("\nReport: {}", output.display());
    }
    Ok(())
}
