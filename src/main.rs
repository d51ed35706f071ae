//! Mask Classifier CLI
//!
//! Entry point for the evaluation harness and the inference demo.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::{info, warn};
use walkdir::WalkDir;

use mask_classifier::backend::{backend_name, default_device, DefaultBackend, TrainingBackend};
use mask_classifier::config::AppConfig;
use mask_classifier::evaluation::ModelEvaluator;
use mask_classifier::inference::{is_image_file, load_classifier, Predictor, WeightSource};
use mask_classifier::model::{MaskClassifier, MaskClassifierConfig};
use mask_classifier::utils::logging::{init_logging, LogConfig, LogLevel};

/// Face-mask classifier evaluation and inference
///
/// Reports model size and speed, and classifies images or a live camera feed
/// with a trained classifier built on the Burn framework.
#[derive(Parser, Debug)]
#[command(name = "mask_classifier")]
#[command(version)]
#[command(about = "Evaluate and run a face-mask image classifier with Burn", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, default_value = "false")]
    verbose: bool,

    /// Only log errors
    #[arg(short, long, default_value = "false")]
    quiet: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Report parameters, FLOPs, latency and a layer summary
    Evaluate {
        /// Trained weights (uses a freshly initialized model if not specified)
        #[arg(short, long)]
        weights: Option<PathBuf>,

        /// Number of forward passes to time
        #[arg(short, long)]
        iterations: Option<usize>,

        /// Input channels
        #[arg(long)]
        channels: Option<usize>,

        /// Input height
        #[arg(long)]
        height: Option<usize>,

        /// Input width
        #[arg(long)]
        width: Option<usize>,

        /// Output JSON file for the evaluation report
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Classify a single image or every image in a directory
    Infer {
        /// Path to input image or directory
        #[arg(short, long)]
        input: PathBuf,

        /// Trained weights
        #[arg(short, long)]
        weights: Option<PathBuf>,

        /// Dataset root whose sub-directories name the classes
        #[arg(short, long)]
        data_dir: Option<PathBuf>,

        /// Label file (JSON array or one name per line)
        #[arg(short, long)]
        labels: Option<PathBuf>,
    },

    /// Classify frames from a camera and show them with the predicted label
    Webcam {
        /// Trained weights
        #[arg(short, long)]
        weights: Option<PathBuf>,

        /// Camera device index
        #[arg(long)]
        device: Option<u32>,

        /// Dataset root whose sub-directories name the classes
        #[arg(short, long)]
        data_dir: Option<PathBuf>,

        /// Label file (JSON array or one name per line)
        #[arg(short, long)]
        labels: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut log_config = if cli.verbose {
        LogConfig::verbose()
    } else if cli.quiet {
        LogConfig::quiet()
    } else {
        LogConfig::default()
    };
    if let Some(level) = &cli.log_level {
        log_config.level = LogLevel::parse(level);
    }

    let _ = init_logging(&log_config);

    print_banner();

    let mut config = AppConfig::load_or_default(cli.config.as_deref())?;

    match cli.command {
        Commands::Evaluate {
            weights,
            iterations,
            channels,
            height,
            width,
            output,
        } => {
            let eval = &mut config.evaluation;
            if weights.is_some() {
                eval.weights = weights;
            }
            if let Some(iterations) = iterations {
                eval.iterations = iterations;
            }
            let shape = &mut eval.input_shape;
            shape.channels = channels.unwrap_or(shape.channels);
            shape.height = height.unwrap_or(shape.height);
            shape.width = width.unwrap_or(shape.width);
            if output.is_some() {
                eval.report_path = output;
            }

            cmd_evaluate(&config)?;
        }

        Commands::Infer {
            input,
            weights,
            data_dir,
            labels,
        } => {
            apply_inference_overrides(&mut config, weights, data_dir, labels);
            cmd_infer(&config, &input)?;
        }

        Commands::Webcam {
            weights,
            device,
            data_dir,
            labels,
        } => {
            apply_inference_overrides(&mut config, weights, data_dir, labels);
            if let Some(device) = device {
                config.webcam.device_index = device;
            }
            cmd_webcam(&config)?;
        }
    }

    Ok(())
}

fn print_banner() {
    println!(
        "{}",
        r#"
 +------------------------------------------------------------+
 |   Mask Classifier                                          |
 |   Model evaluation and inference with Burn + Rust          |
 +------------------------------------------------------------+
  "#
        .green()
    );
    println!("{}\n", version_line());
}

fn version_line() -> String {
    format!("  Version {} ({})", mask_classifier::VERSION, backend_name())
}

/// Command-line label and weight options take precedence over the config file
fn apply_inference_overrides(
    config: &mut AppConfig,
    weights: Option<PathBuf>,
    data_dir: Option<PathBuf>,
    labels: Option<PathBuf>,
) {
    let inference = &mut config.inference;
    if let Some(weights) = weights {
        inference.weights_path = weights;
    }
    if data_dir.is_some() || labels.is_some() {
        inference.labels = None;
        inference.labels_file = labels;
        inference.data_dir = data_dir;
    }
}

fn cmd_evaluate(config: &AppConfig) -> Result<()> {
    let eval = &config.evaluation;
    let device = default_device();

    println!("{}", "Initializing Evaluation...".green().bold());
    println!("  Backend: {}", backend_name());
    println!("  Device: {:?}", device);
    println!("  Input shape: {}", eval.input_shape);
    println!("  Iterations: {}", eval.iterations);

    let model_config = MaskClassifierConfig {
        in_channels: eval.input_shape.channels,
        ..config.model.clone()
    };

    let model: MaskClassifier<TrainingBackend> = match &eval.weights {
        Some(path) => {
            println!("{}", format!("Loading model from {:?}...", path).cyan());
            let source = WeightSource::new(path.clone())
                .with_key_remaps(config.inference.key_remaps.clone());
            load_classifier(&model_config, &source, &device)?
        }
        None => {
            println!("{}", "Creating model (no weights specified)...".cyan());
            MaskClassifier::new(&model_config, &device)
        }
    };

    let evaluator = ModelEvaluator::new(model, device);
    let report = evaluator.evaluate_all(eval.input_shape, eval.iterations)?;

    println!();
    println!("{}", report.summary_line().green());

    if let Some(path) = &eval.report_path {
        report.save(path)?;
        println!("{} {:?}", "Report saved to".green(), path);
    }

    Ok(())
}

fn cmd_infer(config: &AppConfig, input: &Path) -> Result<()> {
    let device = default_device();
    let labels = config.inference.label_set()?;
    info!("Classes: {:?}", labels.names());

    let model = load_classifier::<DefaultBackend>(
        &config.model,
        &config.inference.weight_source(),
        &device,
    )?;
    let predictor = Predictor::new(model, labels, device)
        .with_preprocessor(config.inference.preprocess.clone());

    if input.is_file() {
        let label = predictor.infer_image(input)?;
        info!("{:?} classified as {}", input, label);
        return Ok(());
    }

    if !input.is_dir() {
        anyhow::bail!("Input not found: {:?}", input);
    }

    let mut paths: Vec<PathBuf> = WalkDir::new(input)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file() && is_image_file(entry.path()))
        .map(|entry| entry.into_path())
        .collect();
    paths.sort();

    if paths.is_empty() {
        println!("{} No images found in {:?}", "Warning:".yellow(), input);
        return Ok(());
    }

    println!("{}", format!("Classifying {} images...", paths.len()).cyan());

    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut failures = 0;

    for path in &paths {
        match predictor.predict_file(path) {
            Ok(result) => {
                println!(
                    "  {:<50} {:<20} {:>6.2}%  ({:.2} ms)",
                    path.display(),
                    result.label,
                    result.confidence * 100.0,
                    result.inference_time_ms
                );
                *counts.entry(result.label).or_default() += 1;
            }
            Err(e) => {
                warn!("Skipping {:?}: {}", path, e);
                failures += 1;
            }
        }
    }

    println!();
    println!("{}", "Prediction counts:".cyan().bold());
    for (label, count) in &counts {
        println!("  {:20} {:>5}", label, count);
    }
    if failures > 0 {
        println!("  {} {} images could not be read", "Failed:".red(), failures);
    }

    Ok(())
}

#[cfg(feature = "webcam")]
fn cmd_webcam(config: &AppConfig) -> Result<()> {
    use std::time::{Duration, Instant};

    use mask_classifier::inference::{run_webcam, GstCamera, GstWindow, LabelOverlay};

    let device = default_device();
    let labels = config.inference.label_set()?;
    let model = load_classifier::<DefaultBackend>(
        &config.model,
        &config.inference.weight_source(),
        &device,
    )?;
    let predictor = Predictor::new(model, labels, device)
        .with_preprocessor(config.inference.preprocess.clone());

    let webcam = &config.webcam;
    let camera = GstCamera::open(
        webcam.device_index,
        Duration::from_millis(webcam.read_timeout_ms),
    )?;
    let window = GstWindow::open(&webcam.window_title)?;

    let start = Instant::now();
    let outcome = run_webcam(&predictor, camera, window, &LabelOverlay::with_system_font())?;

    println!(
        "{} {} frames in {} ({})",
        "Webcam closed:".green(),
        outcome.frames_processed,
        mask_classifier::utils::format_duration(start.elapsed().as_secs_f64()),
        outcome.stop_reason
    );

    Ok(())
}

#[cfg(not(feature = "webcam"))]
fn cmd_webcam(_config: &AppConfig) -> Result<()> {
    anyhow::bail!("Webcam support is not compiled in; rebuild with `--features webcam`")
}

#[cfg(test)]
mod tests {
    use super::*;
    use mask_classifier::evaluation::InputShape;

    #[test]
    fn test_cli_parses_evaluate() {
        let cli = Cli::try_parse_from([
            "mask_classifier",
            "evaluate",
            "--iterations",
            "10",
            "--height",
            "64",
            "--output",
            "report.json",
        ])
        .unwrap();

        match cli.command {
            Commands::Evaluate {
                iterations,
                height,
                width,
                output,
                ..
            } => {
                assert_eq!(iterations, Some(10));
                assert_eq!(height, Some(64));
                assert_eq!(width, None);
                assert_eq!(output, Some(PathBuf::from("report.json")));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_label_overrides_replace_config_labels() {
        let mut config = AppConfig::default();
        config.inference.labels = Some(vec!["a".to_string()]);

        apply_inference_overrides(
            &mut config,
            Some(PathBuf::from("weights.mpk")),
            Some(PathBuf::from("data")),
            None,
        );

        assert_eq!(config.inference.weights_path, PathBuf::from("weights.mpk"));
        assert!(config.inference.labels.is_none());
        assert_eq!(config.inference.data_dir, Some(PathBuf::from("data")));
    }

    #[test]
    fn test_banner_version_line() {
        let line = version_line();
        assert!(line.contains(env!("CARGO_PKG_VERSION")));
        assert!(line.contains(backend_name()));
    }

    #[test]
    fn test_input_shape_default_matches_config() {
        assert_eq!(AppConfig::default().evaluation.input_shape, InputShape::default());
    }
}
