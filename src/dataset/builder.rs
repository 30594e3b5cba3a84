/// Dataset building from captured sample folders
///
/// Captured gestures live under `<frame_actions_dir>/<word>/sample_<timestamp>/<n>.json`,
/// one detection per frame. Building turns each word folder into a keypoint dataset file.
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::store::SequenceStore;
use crate::error::Result;
use crate::keypoints::{extract_keypoints, KeypointVector};
use crate::landmarks::FrameDetection;
use crate::vocabulary::Vocabulary;

/// Result of building one word's dataset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WordBuildReport {
    pub word: String,
    pub samples: usize,
    pub frames: usize,
    pub skipped_frames: usize,
    pub dataset_path: PathBuf,
}

/// Overall dataset build results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetBuildSummary {
    pub built: Vec<WordBuildReport>,
    pub skipped_words: Vec<String>,
    pub failed_words: Vec<(String, String)>,
    pub total_time: Duration,
}

/// Builds per-word keypoint datasets from sample folders
#[derive(Debug, Clone)]
pub struct DatasetBuilder {
    frame_actions_dir: PathBuf,
    keypoints_dir: PathBuf,
    workers: usize,
    vocabulary: Option<Vocabulary>,
}

impl DatasetBuilder {
    pub fn new(frame_actions_dir: PathBuf, keypoints_dir: PathBuf, workers: usize) -> Self {
        Self {
            frame_actions_dir,
            keypoints_dir,
            workers: workers.max(1),
            vocabulary: None,
        }
    }

    /// Only build words listed in `vocabulary`; other word folders are skipped
    pub fn with_vocabulary(mut self, vocabulary: Vocabulary) -> Self {
        self.vocabulary = Some(vocabulary);
        self
    }

    /// Word ids that have a sample folder, sorted by name
    pub fn discover_words(&self) -> Result<Vec<String>> {
        Ok(subdirectories(&self.frame_actions_dir)?
            .into_iter()
            .filter_map(|path| path.file_name().map(|n| n.to_string_lossy().to_string()))
            .collect())
    }

    /// Build datasets for several words, a bounded number at a time.
    ///
    /// Missing word folders are skipped and individual word failures are collected, so one
    /// bad word never stops the rest.
    pub async fn build_all(&self, words: Vec<String>) -> DatasetBuildSummary {
        let start_time = Instant::now();
        info!("🚀 Building keypoint datasets for {} words...", words.len());

        let results: Vec<(String, Result<Option<WordBuildReport>>)> = stream::iter(words)
            .map(|word| async move {
                let result = self.build_word(&word).await;
                (word, result)
            })
            .buffer_unordered(self.workers)
            .collect()
            .await;

        let mut summary = DatasetBuildSummary {
            built: Vec::new(),
            skipped_words: Vec::new(),
            failed_words: Vec::new(),
            total_time: Duration::from_secs(0),
        };

        for (word, result) in results {
            match result {
                Ok(Some(report)) => summary.built.push(report),
                Ok(None) => summary.skipped_words.push(word),
                Err(e) => {
                    warn!("❌ Failed to build dataset for '{}': {}", word, e);
                    summary.failed_words.push((word, e.to_string()));
                }
            }
        }

        summary.built.sort_by(|a, b| a.word.cmp(&b.word));
        summary.skipped_words.sort();
        summary.total_time = start_time.elapsed();
        summary
    }

    /// Build the dataset of one word. Returns `None` when the word has no sample folder or is
    /// outside the configured vocabulary.
    pub async fn build_word(&self, word: &str) -> Result<Option<WordBuildReport>> {
        if let Some(vocabulary) = &self.vocabulary {
            if vocabulary.label_of(word).is_none() {
                warn!(
                    "'{}' is not in vocabulary '{}', skipping",
                    word,
                    vocabulary.name()
                );
                return Ok(None);
            }
        }

        let word_dir = self.frame_actions_dir.join(word);
        if !word_dir.is_dir() {
            warn!(
                "Sample folder for '{}' does not exist: {}",
                word,
                word_dir.display()
            );
            return Ok(None);
        }

        info!("✋ Creating keypoints for '{}'...", word);
        let sample_dirs = subdirectories(&word_dir)?;
        let sample_total = sample_dirs.len();

        let mut store = SequenceStore::new();
        let mut frames = 0;
        let mut skipped_frames = 0;

        for (index, sample_dir) in sample_dirs.iter().enumerate() {
            let (sequence, skipped) = load_sample_keypoints(sample_dir).await?;
            skipped_frames += skipped;

            if sequence.is_empty() {
                warn!("Sample {} has no readable frames, skipping", sample_dir.display());
                continue;
            }

            frames += sequence.len();
            store.append_sample(word, &sequence)?;
            debug!("{}/{} samples of '{}'", index + 1, sample_total, word);
        }

        let dataset_path = store.save_word(&self.keypoints_dir, word).await?;
        let samples = store.sample_count(word);
        info!(
            "✅ Keypoints created for '{}' ({} samples, {} frames)",
            word, samples, frames
        );

        Ok(Some(WordBuildReport {
            word: word.to_string(),
            samples,
            frames,
            skipped_frames,
            dataset_path,
        }))
    }
}

/// Extract the keypoint sequence of one sample folder, skipping unreadable frames.
///
/// Returns the sequence and the number of skipped frames.
pub async fn load_sample_keypoints(sample_dir: &Path) -> Result<(Vec<KeypointVector>, usize)> {
    let mut sequence = Vec::new();
    let mut skipped = 0;

    for frame_path in frame_files(sample_dir)? {
        let keypoints = match FrameDetection::from_file(&frame_path).await {
            Ok(detection) => extract_keypoints(&detection),
            Err(e) => Err(e),
        };

        match keypoints {
            Ok(keypoints) => sequence.push(keypoints),
            Err(e) => {
                warn!("Error reading frame {}: {}", frame_path.display(), e);
                skipped += 1;
            }
        }
    }

    Ok((sequence, skipped))
}

/// Immediate subdirectories sorted by name
fn subdirectories(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(std::io::Error::from)?;
        if entry.file_type().is_dir() {
            dirs.push(entry.into_path());
        }
    }
    Ok(dirs)
}

/// Frame files of a sample folder ordered by their numeric stem
fn frame_files(sample_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<(u64, String, PathBuf)> = Vec::new();
    for entry in WalkDir::new(sample_dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(std::io::Error::from)?;
        let path = entry.into_path();
        if !path.is_file() || path.extension().map_or(true, |ext| ext != "json") {
            continue;
        }
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let number = stem.parse::<u64>().unwrap_or(u64::MAX);
        files.push((number, stem, path));
    }

    files.sort();
    Ok(files.into_iter().map(|(_, _, path)| path).collect())
}

/// Persist one captured sample as a `sample_<timestamp>` folder of per-frame detections
pub async fn write_sample_folder(word_dir: &Path, frames: &[FrameDetection]) -> Result<PathBuf> {
    tokio::fs::create_dir_all(word_dir).await?;

    let stamp = chrono::Local::now().format("%y%m%d%H%M%S%6f").to_string();
    let mut sample_dir = word_dir.join(format!("sample_{}", stamp));
    let mut suffix = 1;
    while tokio::fs::try_exists(&sample_dir).await? {
        sample_dir = word_dir.join(format!("sample_{}_{}", stamp, suffix));
        suffix += 1;
    }
    tokio::fs::create_dir_all(&sample_dir).await?;

    for (index, frame) in frames.iter().enumerate() {
        frame.save(&sample_dir.join(format!("{}.json", index + 1))).await?;
    }

    debug!("💾 Saved {} frames to {}", frames.len(), sample_dir.display());
    Ok(sample_dir)
}
