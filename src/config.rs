use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

use crate::router::{validate_bucket_lengths, BucketBinding};
use crate::segmentation::SegmentationConfig;

/// Configuration for the sign recognizer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Gesture segmentation parameters
    pub segmentation: SegmentationConfig,

    /// File and directory locations
    pub paths: PathsConfig,

    /// Vocabulary selection and display text
    pub vocabulary: VocabularyConfig,

    /// Ordered bucket length to classifier artifact bindings
    pub buckets: Vec<BucketBinding>,

    /// Capture loop settings
    pub capture: CaptureConfig,

    /// Performance and resource settings
    pub performance: PerformanceConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Root of captured sample folders, one subfolder per word
    pub frame_actions_dir: PathBuf,

    /// Directory of per-word keypoint dataset files
    pub keypoints_dir: PathBuf,

    /// Vocabulary file
    pub words_file: PathBuf,

    /// Directory for trained classifier artifacts
    pub models_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VocabularyConfig {
    /// Name of the word list inside the vocabulary file
    pub name: String,

    /// Display text overrides by word id
    #[serde(default)]
    pub display: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Capacity of the frame queue between capture and inference
    pub queue_capacity: usize,

    /// Gestures buffering more frames than this are discarded (0 = no limit)
    pub max_gesture_frames: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceConfig {
    /// Maximum number of words processed concurrently when building datasets
    pub max_workers: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,
}

impl Config {
    /// Load configuration from the default file locations, then from `LSE_*` variables.
    ///
    /// Returns `None` when neither is present.
    pub fn load() -> Result<Option<Self>> {
        let config_paths = ["lse-recognizer.toml", "config/lse-recognizer.toml"];

        for path in &config_paths {
            if let Ok(config_str) = std::fs::read_to_string(path) {
                match toml::from_str(&config_str) {
                    Ok(config) => {
                        tracing::info!("📄 Loaded configuration from: {}", path);
                        return Ok(Some(config));
                    }
                    Err(e) => {
                        tracing::warn!("Failed to parse config file {}: {}", path, e);
                    }
                }
            }
        }

        Self::from_env()
    }

    /// Load a specific file
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)
            .map_err(|e| anyhow!("Cannot read config {}: {}", path.display(), e))?;
        let config = toml::from_str(&config_str)?;
        tracing::info!("📄 Loaded configuration from: {}", path.display());
        Ok(config)
    }

    /// Load configuration from environment variables.
    ///
    /// Returns `None` when no `LSE_*` variable is set; a set but unparsable value is an error.
    pub fn from_env() -> Result<Option<Self>> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Result<Option<Self>> {
        let mut config = Self::default();
        let mut found = false;

        if let Some(value) = lookup("LSE_MARGIN_FRAMES") {
            config.segmentation.margin_frames = parse_var("LSE_MARGIN_FRAMES", &value)?;
            found = true;
        }

        if let Some(value) = lookup("LSE_MIN_FRAMES") {
            config.segmentation.min_frames = parse_var("LSE_MIN_FRAMES", &value)?;
            found = true;
        }

        if let Some(value) = lookup("LSE_DELAY_FRAMES") {
            config.segmentation.delay_frames = parse_var("LSE_DELAY_FRAMES", &value)?;
            found = true;
        }

        if let Some(dir) = lookup("LSE_KEYPOINTS_DIR") {
            config.paths.keypoints_dir = PathBuf::from(dir);
            found = true;
        }

        if let Some(dir) = lookup("LSE_MODELS_DIR") {
            config.paths.models_dir = PathBuf::from(dir);
            found = true;
        }

        if let Some(workers) = lookup("LSE_WORKERS") {
            config.performance.max_workers = parse_var("LSE_WORKERS", &workers)?;
            found = true;
        }

        if let Some(level) = lookup("LSE_LOG_LEVEL") {
            config.logging.level = level;
            found = true;
        }

        Ok(found.then_some(config))
    }

    /// Save configuration to file
    pub fn save(&self, path: &std::path::Path) -> Result<()> {
        let config_str = toml::to_string_pretty(self)?;
        std::fs::write(path, config_str)?;
        tracing::info!("💾 Configuration saved to: {}", path.display());
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.segmentation.validate()?;

        let lengths: Vec<usize> = self.buckets.iter().map(|b| b.max_length).collect();
        validate_bucket_lengths(&lengths)?;

        if self.performance.max_workers == 0 {
            return Err(anyhow!("max_workers must be greater than 0"));
        }

        if self.capture.queue_capacity == 0 {
            return Err(anyhow!("queue_capacity must be greater than 0"));
        }

        if self.vocabulary.name.is_empty() {
            return Err(anyhow!("vocabulary name must not be empty"));
        }

        tracing::debug!("✅ Configuration validation passed");
        Ok(())
    }

    /// Get runtime configuration summary
    pub fn summary(&self) -> String {
        format!(
            "LSE Recognizer Configuration:\n\
            - Segmentation: margin={} min={} delay={}\n\
            - Buckets: {}\n\
            - Keypoints Directory: {}\n\
            - Models Directory: {}\n\
            - Vocabulary: {} ({})\n\
            - Workers: {}",
            self.segmentation.margin_frames,
            self.segmentation.min_frames,
            self.segmentation.delay_frames,
            self.buckets
                .iter()
                .map(|b| b.max_length.to_string())
                .collect::<Vec<_>>()
                .join(", "),
            self.paths.keypoints_dir.display(),
            self.paths.models_dir.display(),
            self.vocabulary.name,
            self.paths.words_file.display(),
            self.performance.max_workers
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        let models_dir = PathBuf::from("models");
        let buckets = [7, 12, 18]
            .into_iter()
            .map(|max_length| BucketBinding {
                max_length,
                artifact: models_dir.join(format!("actions_{}.json", max_length)),
            })
            .collect();

        Self {
            segmentation: SegmentationConfig::default(),
            paths: PathsConfig {
                frame_actions_dir: PathBuf::from("frame_actions"),
                keypoints_dir: PathBuf::from("data/keypoints"),
                words_file: models_dir.join("words.json"),
                models_dir,
            },
            vocabulary: VocabularyConfig {
                name: "word_ids".to_string(),
                display: HashMap::new(),
            },
            buckets,
            capture: CaptureConfig {
                queue_capacity: 32,
                max_gesture_frames: 300,
            },
            performance: PerformanceConfig {
                max_workers: num_cpus::get().min(8),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
            },
        }
    }
}

fn parse_var(key: &str, value: &str) -> Result<usize> {
    value
        .trim()
        .parse()
        .map_err(|e| anyhow!("Invalid {}={:?}: {}", key, value, e))
}

/// Configuration builder for programmatic config creation
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_segmentation(mut self, margin_frames: usize, min_frames: usize, delay_frames: usize) -> Self {
        self.config.segmentation = SegmentationConfig::new(margin_frames, min_frames, delay_frames);
        self
    }

    pub fn with_buckets(mut self, buckets: Vec<BucketBinding>) -> Self {
        self.config.buckets = buckets;
        self
    }

    pub fn with_keypoints_dir(mut self, dir: PathBuf) -> Self {
        self.config.paths.keypoints_dir = dir;
        self
    }

    pub fn with_frame_actions_dir(mut self, dir: PathBuf) -> Self {
        self.config.paths.frame_actions_dir = dir;
        self
    }

    pub fn with_words_file(mut self, path: PathBuf) -> Self {
        self.config.paths.words_file = path;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.config.performance.max_workers = workers;
        self
    }

    pub fn with_max_gesture_frames(mut self, frames: usize) -> Self {
        self.config.capture.max_gesture_frames = frames;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
