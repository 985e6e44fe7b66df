//! dfd CLI: classify document images and explain the decision.

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use burn::module::Module;
use burn_autodiff::Autodiff;
use burn_ndarray::NdArray;
use dfd_core::Seed;
use dfd_infer::{load_config, ForgeryService, ServiceConfig, Upload, Visualization};
use dfd_models::{record_path, save_forgery_net};

/// Backend for inference and attribution.
type InferBackend = Autodiff<NdArray>;

#[derive(Parser)]
#[command(name = "dfd")]
#[command(author, version)]
#[command(about = "Document forgery detection with Grad-CAM explanations")]
#[command(long_about = "dfd: classify document images into forgery types and render a \
Grad-CAM heatmap.

EXAMPLES:
  # Write a seeded, untrained checkpoint for smoke tests
  dfd init-weights --output models/forgery_net --seed 42

  # Check that the model loads
  dfd health --weights models/forgery_net

  # Classify an image and save the heatmap overlay
  dfd predict --image scan.png --weights models/forgery_net --overlay scan_gradcam.png

CLASSES:
  0 positive        - authentic document
  1 copy_move       2 face_morph      3 face_replace
  4 combined        5 inpaint_rewrite 6 crop_replace")]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify an image and print the JSON response
    Predict {
        /// Image to classify
        #[arg(long, value_name = "PATH")]
        image: PathBuf,

        /// Declared MIME type (guessed from the extension by default)
        #[arg(long, value_name = "MIME")]
        content_type: Option<String>,

        /// Service configuration (YAML)
        #[arg(long, value_name = "YAML")]
        config: Option<PathBuf>,

        /// Checkpoint stem, overriding the config's model_path
        #[arg(long, value_name = "PATH")]
        weights: Option<PathBuf>,

        /// Also write the visualization PNG here
        #[arg(long, value_name = "PNG")]
        overlay: Option<PathBuf>,
    },
    /// Print the service health report
    Health {
        /// Service configuration (YAML)
        #[arg(long, value_name = "YAML")]
        config: Option<PathBuf>,

        /// Checkpoint stem, overriding the config's model_path
        #[arg(long, value_name = "PATH")]
        weights: Option<PathBuf>,
    },
    /// Write a randomly initialized checkpoint
    InitWeights {
        /// Checkpoint stem (writes <PATH>.mpk and <PATH>.json)
        #[arg(long, value_name = "PATH")]
        output: PathBuf,

        /// Random seed for reproducibility
        #[arg(long, default_value = "42", value_name = "SEED")]
        seed: u64,

        /// Service configuration (YAML) providing the architecture
        #[arg(long, value_name = "YAML")]
        config: Option<PathBuf>,
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
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::filter::LevelFilter::from_level(log_level))
        .init();

    match cli.command {
        Commands::Predict {
            image,
            content_type,
            config,
            weights,
            overlay,
        } => handle_predict(image, content_type, config, weights, overlay),
        Commands::Health { config, weights } => handle_health(config, weights),
        Commands::InitWeights {
            output,
            seed,
            config,
        } => handle_init_weights(output, seed, config),
    }
}

fn resolve_config(config: Option<PathBuf>, weights: Option<PathBuf>) -> Result<ServiceConfig> {
    let config = match config {
        Some(path) => load_config(&path)
            .with_context(|| format!("Failed to load config '{}'", path.display()))?,
        None => ServiceConfig::default(),
    };
    Ok(match weights {
        Some(path) => config.with_model_path(path),
        None => config,
    })
}

fn handle_predict(
    image: PathBuf,
    content_type: Option<String>,
    config: Option<PathBuf>,
    weights: Option<PathBuf>,
    overlay: Option<PathBuf>,
) -> Result<()> {
    let config = resolve_config(config, weights)?;
    let upload = Upload::from_path(&image, content_type.as_deref())
        .with_context(|| format!("Failed to read image '{}'", image.display()))?;

    let service = ForgeryService::<InferBackend>::load(config, Default::default());
    let response = match service.predict(&upload) {
        Ok(response) => response,
        Err(err) => bail!("[{}] {}", err.status_code(), err),
    };

    if let Some(path) = overlay {
        write_overlay(&path, &response.gradcam)?;
        if response.visualization == Visualization::Placeholder {
            eprintln!("Grad-CAM unavailable; wrote placeholder to {}", path.display());
        }
    }

    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

fn write_overlay(path: &Path, encoded: &str) -> Result<()> {
    let bytes = STANDARD
        .decode(encoded)
        .context("Visualization is not valid base64")?;
    std::fs::write(path, bytes)
        .with_context(|| format!("Failed to write overlay '{}'", path.display()))?;
    Ok(())
}

fn handle_health(config: Option<PathBuf>, weights: Option<PathBuf>) -> Result<()> {
    let config = resolve_config(config, weights)?;
    let service = ForgeryService::<InferBackend>::load(config, Default::default());
    println!("{}", serde_json::to_string_pretty(&service.health())?);
    Ok(())
}

fn handle_init_weights(output: PathBuf, seed: u64, config: Option<PathBuf>) -> Result<()> {
    let config = resolve_config(config, None)?;
    let seed = Seed::from(seed);
    let model_config = config.model;
    model_config
        .validate()
        .context("Invalid model configuration")?;

    println!("=== dfd init-weights ===\n");
    println!("  Image size: {}", model_config.img_size);
    println!("  Backbone: {:?}", model_config.backbone_channels);
    println!("  Classes: {}", model_config.num_classes);
    println!("  Seed: {}", seed.value());

    let device = Default::default();
    seed.seed_backend::<NdArray>();
    let model = model_config.init::<NdArray>(&device);
    println!("  Parameters: {}", model.num_params());

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create '{}'", parent.display()))?;
    }
    save_forgery_net(&model, &model_config, &output)
        .with_context(|| format!("Failed to save checkpoint '{}'", output.display()))?;

    println!("\nCheckpoint written to {}", record_path(&output).display());
    Ok(())
}
