/// Per-word keypoint datasets
///
/// Datasets are stored as one file per word holding frame-level records tagged with their
/// sample and frame index. The store regroups them into ordered per-sample sequences.
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{GestureError, Result};
use crate::keypoints::KeypointVector;
use crate::segmentation::GestureSample;
use crate::vocabulary::Vocabulary;

/// One row of a dataset file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeypointRecord {
    pub sample: u32,

    /// 1-based frame index within the sample
    pub frame: u32,

    pub keypoints: KeypointVector,
}

type SampleFrames = BTreeMap<u32, KeypointVector>;

/// In-memory aggregation of keypoint records, keyed word -> sample -> frame
#[derive(Debug, Clone, Default)]
pub struct SequenceStore {
    words: BTreeMap<String, BTreeMap<u32, SampleFrames>>,
}

impl SequenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Path of the dataset file for a word
    pub fn dataset_path(dir: &Path, word: &str) -> PathBuf {
        dir.join(format!("{}.json", word))
    }

    /// Insert a single frame record; a repeated (sample, frame) pair replaces the earlier one
    pub fn insert_record(&mut self, word: &str, record: KeypointRecord) {
        self.words
            .entry(word.to_string())
            .or_default()
            .entry(record.sample)
            .or_default()
            .insert(record.frame, record.keypoints);
    }

    /// Append a whole sample under the next free sample id and return that id
    pub fn append_sample(&mut self, word: &str, sequence: &[KeypointVector]) -> Result<u32> {
        if sequence.is_empty() {
            return Err(GestureError::EmptySequence);
        }

        let samples = self.words.entry(word.to_string()).or_default();
        let sample_id = samples.keys().next_back().map_or(1, |last| last + 1);
        let frames = sequence
            .iter()
            .enumerate()
            .map(|(i, keypoints)| (i as u32 + 1, keypoints.clone()))
            .collect();
        samples.insert(sample_id, frames);

        debug!("Stored sample {} for '{}' ({} frames)", sample_id, word, sequence.len());
        Ok(sample_id)
    }

    pub fn contains_word(&self, word: &str) -> bool {
        self.words.contains_key(word)
    }

    pub fn words(&self) -> impl Iterator<Item = &str> {
        self.words.keys().map(String::as_str)
    }

    pub fn sample_count(&self, word: &str) -> usize {
        self.words.get(word).map_or(0, BTreeMap::len)
    }

    /// All samples of a word, sample id ascending, frames ordered by frame index
    pub fn read_all(&self, word: &str) -> Vec<GestureSample> {
        let Some(samples) = self.words.get(word) else {
            return Vec::new();
        };

        samples
            .iter()
            .filter(|(_, frames)| !frames.is_empty())
            .filter_map(|(sample_id, frames)| {
                GestureSample::new(
                    *sample_id,
                    Some(word.to_string()),
                    frames.values().cloned().collect(),
                )
                .ok()
            })
            .collect()
    }

    /// Flattened records of a word in (sample, frame) order
    pub fn records(&self, word: &str) -> Vec<KeypointRecord> {
        self.words
            .get(word)
            .into_iter()
            .flat_map(|samples| samples.iter())
            .flat_map(|(sample, frames)| {
                frames.iter().map(move |(frame, keypoints)| KeypointRecord {
                    sample: *sample,
                    frame: *frame,
                    keypoints: keypoints.clone(),
                })
            })
            .collect()
    }

    /// Labeled sequences for every vocabulary word, in vocabulary then sample order.
    ///
    /// A vocabulary word without data is an error: there is nothing meaningful to train or
    /// evaluate on.
    pub fn labeled_sequences(&self, vocabulary: &Vocabulary) -> Result<Vec<(Vec<KeypointVector>, usize)>> {
        let mut sequences = Vec::new();
        for (label, word) in vocabulary.words().iter().enumerate() {
            if !self.contains_word(word) {
                return Err(GestureError::DatasetMissing(word.clone()));
            }
            sequences.extend(
                self.read_all(word)
                    .into_iter()
                    .map(|sample| (sample.into_frames(), label)),
            );
        }
        Ok(sequences)
    }

    /// Load a word's dataset file into the store
    pub async fn load_word(&mut self, dir: &Path, word: &str) -> Result<usize> {
        let path = Self::dataset_path(dir, word);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(GestureError::DatasetMissing(path.display().to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        let records: Vec<KeypointRecord> = serde_json::from_str(&content)?;
        let count = records.len();
        self.words.entry(word.to_string()).or_default();
        for record in records {
            self.insert_record(word, record);
        }

        debug!("📂 Loaded {} records for '{}' from {}", count, word, path.display());
        Ok(count)
    }

    /// Load the dataset files of every vocabulary word
    pub async fn load_vocabulary(dir: &Path, vocabulary: &Vocabulary) -> Result<Self> {
        let mut store = Self::new();
        for word in vocabulary.words() {
            store.load_word(dir, word).await?;
        }
        info!(
            "📚 Loaded datasets for {} words from {}",
            vocabulary.len(),
            dir.display()
        );
        Ok(store)
    }

    /// Write a word's dataset file, replacing any previous one
    pub async fn save_word(&self, dir: &Path, word: &str) -> Result<PathBuf> {
        tokio::fs::create_dir_all(dir).await?;
        let path = Self::dataset_path(dir, word);
        let records = self.records(word);
        tokio::fs::write(&path, serde_json::to_string(&records)?).await?;
        debug!("💾 Saved {} records for '{}' to {}", records.len(), word, path.display());
        Ok(path)
    }
}
