use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use lse_sign_recognizer::capture::{CaptureSession, JsonLinesSource, RecognitionSink, SampleFolderSink};
use lse_sign_recognizer::classifier::CentroidTrainer;
use lse_sign_recognizer::config::Config;
use lse_sign_recognizer::dataset::{DatasetBuilder, SequenceStore};
use lse_sign_recognizer::evaluation::evaluate;
use lse_sign_recognizer::inference::{handle_request, FailureKind, InferenceRequest};
use lse_sign_recognizer::router::BucketedClassifierRouter;
use lse_sign_recognizer::training::train_buckets;
use lse_sign_recognizer::vocabulary::Vocabulary;
use lse_sign_recognizer::FrameSource;

#[derive(Parser)]
#[command(name = "lse-recognizer")]
#[command(version, about = "Sign-language gesture capture, training and recognition")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to lse-recognizer.toml, then LSE_* variables)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Record gestures of one word as sample folders
    Capture {
        /// Word id the captured samples belong to
        #[arg(long)]
        word: String,
        /// JSON-lines detection stream (stdin when omitted)
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// Convert sample folders into per-word keypoint datasets
    BuildDataset {
        /// Words to build (every word folder when omitted)
        #[arg(long = "word")]
        words: Vec<String>,
    },
    /// Train one classifier per bucket
    Train,
    /// Print the confusion matrix of the trained buckets over the stored dataset
    Evaluate,
    /// Recognize gestures live from a detection stream
    Predict {
        /// JSON-lines detection stream (stdin when omitted)
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// Classify one flattened keypoint request
    Classify {
        /// JSON file holding {"keypoints": [...]}
        #[arg(long)]
        request: PathBuf,
    },
    /// Write the default configuration to a file
    InitConfig {
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::load()?.unwrap_or_else(|| {
            eprintln!("No configuration file found, using defaults");
            Config::default()
        }),
    };

    // Initialize logging
    let level = if cli.verbose { "debug" } else { config.logging.level.as_str() };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(format!("lse_sign_recognizer={},lse_recognizer={},warn", level, level))),
        )
        .init();

    if cli.verbose {
        info!("Verbose logging enabled");
    }

    config.validate()?;
    debug!("{}", config.summary());

    match cli.command {
        Commands::Capture { word, input } => capture(&config, &word, input.as_deref()).await,
        Commands::BuildDataset { words } => build_dataset(&config, words).await,
        Commands::Train => train(&config).await,
        Commands::Evaluate => run_evaluation(&config).await,
        Commands::Predict { input } => predict(&config, input.as_deref()).await,
        Commands::Classify { request } => classify(&config, &request).await,
        Commands::InitConfig { path } => {
            Config::default().save(&path)?;
            Ok(())
        }
    }
}

/// Cancellation flag flipped by Ctrl-C
fn cancel_on_ctrl_c() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("🛑 Interrupt received, stopping capture...");
            let _ = tx.send(true);
        }
    });
    rx
}

async fn open_source(input: Option<&Path>) -> Result<Box<dyn FrameSource>> {
    let source: Box<dyn FrameSource> = match input {
        Some(path) => Box::new(JsonLinesSource::open(path).await?),
        None => Box::new(JsonLinesSource::stdin()),
    };
    Ok(source)
}

fn capture_session(config: &Config) -> CaptureSession {
    CaptureSession::new(
        config.segmentation,
        config.capture.max_gesture_frames,
        config.capture.queue_capacity,
    )
}

async fn load_vocabulary(config: &Config) -> Result<Vocabulary> {
    let vocabulary = Vocabulary::load(&config.paths.words_file, &config.vocabulary.name)
        .await?
        .with_display(config.vocabulary.display.clone());
    Ok(vocabulary)
}

async fn capture(config: &Config, word: &str, input: Option<&Path>) -> Result<()> {
    let word_dir = config.paths.frame_actions_dir.join(word);
    info!("🚀 Capturing samples for '{}' into {}", word, word_dir.display());

    let mut source = open_source(input).await?;
    let mut sink = SampleFolderSink::new(word_dir);
    let report = capture_session(config)
        .run(source.as_mut(), &mut sink, cancel_on_ctrl_c())
        .await?;

    info!("✅ Saved {} samples from {} frames", sink.saved().len(), report.frames);
    Ok(())
}

async fn build_dataset(config: &Config, words: Vec<String>) -> Result<()> {
    let mut builder = DatasetBuilder::new(
        config.paths.frame_actions_dir.clone(),
        config.paths.keypoints_dir.clone(),
        config.performance.max_workers,
    );
    match load_vocabulary(config).await {
        Ok(vocabulary) => builder = builder.with_vocabulary(vocabulary),
        Err(e) => warn!("Vocabulary unavailable, building every word folder: {}", e),
    }

    let words = if words.is_empty() { builder.discover_words()? } else { words };
    if words.is_empty() {
        warn!("📭 No word folders found in {}", config.paths.frame_actions_dir.display());
        return Ok(());
    }

    let summary = builder.build_all(words).await;
    info!("🎉 Dataset build completed in {:.2}s", summary.total_time.as_secs_f64());
    for report in &summary.built {
        info!(
            "  {} - {} samples, {} frames ({} skipped) -> {}",
            report.word,
            report.samples,
            report.frames,
            report.skipped_frames,
            report.dataset_path.display()
        );
    }
    if !summary.skipped_words.is_empty() {
        warn!("⚠️ Skipped words without samples: {}", summary.skipped_words.join(", "));
    }
    for (word, reason) in &summary.failed_words {
        error!("❌ {}: {}", word, reason);
    }

    if summary.failed_words.is_empty() {
        Ok(())
    } else {
        Err(anyhow!("{} words failed to build", summary.failed_words.len()))
    }
}

async fn train(config: &Config) -> Result<()> {
    let vocabulary = load_vocabulary(config).await?;
    let store = SequenceStore::load_vocabulary(&config.paths.keypoints_dir, &vocabulary).await?;

    let trained = train_buckets(&store, &vocabulary, &config.buckets, &CentroidTrainer).await?;
    for bucket in &trained {
        info!(
            "  bucket {} - {} examples -> {}",
            bucket.max_length,
            bucket.examples,
            bucket.artifact.display()
        );
    }
    Ok(())
}

async fn run_evaluation(config: &Config) -> Result<()> {
    let vocabulary = load_vocabulary(config).await?;
    let store = SequenceStore::load_vocabulary(&config.paths.keypoints_dir, &vocabulary).await?;
    let router = BucketedClassifierRouter::from_bindings(&config.buckets).await?;

    let matrix = evaluate(&store, &vocabulary, &router)?;
    println!("{}", matrix);
    println!("row sums:    {:?}", matrix.row_sums());
    println!("column sums: {:?}", matrix.column_sums());
    println!(
        "accuracy:    {:.1}% ({}/{})",
        matrix.accuracy() * 100.0,
        matrix.correct(),
        matrix.total()
    );
    Ok(())
}

async fn predict(config: &Config, input: Option<&Path>) -> Result<()> {
    let vocabulary = load_vocabulary(config).await?;
    let router = BucketedClassifierRouter::from_bindings(&config.buckets).await?;

    let source = open_source(input).await?;
    let mut sink = RecognitionSink::new(&router, &vocabulary);
    capture_session(config)
        .run_pipelined(source, &mut sink, cancel_on_ctrl_c())
        .await?;

    for gesture in sink.recognized() {
        println!("{}", serde_json::to_string(gesture)?);
    }
    Ok(())
}

async fn classify(config: &Config, request_path: &Path) -> Result<()> {
    let content = tokio::fs::read_to_string(request_path)
        .await
        .with_context(|| format!("Cannot read request {}", request_path.display()))?;
    let request: InferenceRequest = serde_json::from_str(&content)
        .with_context(|| format!("Request {} is not valid JSON", request_path.display()))?;

    let router = BucketedClassifierRouter::from_bindings(&config.buckets).await?;
    let vocabulary = match load_vocabulary(config).await {
        Ok(vocabulary) => Some(vocabulary),
        Err(e) => {
            warn!("Vocabulary unavailable, answering with label indices only: {}", e);
            None
        }
    };

    match handle_request(&request, &router, vocabulary.as_ref()) {
        Ok(response) => {
            println!("{}", serde_json::to_string_pretty(&response)?);
            Ok(())
        }
        Err(e) => match FailureKind::of(&e) {
            FailureKind::Client => Err(anyhow!("bad request: {}", e)),
            FailureKind::Server => Err(anyhow!("classification failed: {}", e)),
        },
    }
}
