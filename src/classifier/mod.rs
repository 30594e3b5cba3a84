/// Classifier capability
///
/// The router treats classifiers as opaque predictors over fixed-length, fixed-width
/// sequences. Training is a separate capability that produces a serializable artifact.
pub mod centroid;

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::error::{GestureError, Result};

pub use centroid::{CentroidModel, CentroidTrainer};

/// Fixed-shape classifier input, row-major `frames x features`
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceTensor {
    frames: usize,
    features: usize,
    data: Vec<f32>,
}

impl SequenceTensor {
    pub fn new(frames: usize, features: usize, data: Vec<f32>) -> Result<Self> {
        if data.len() != frames * features {
            return Err(GestureError::MalformedInput(format!(
                "tensor data has {} values, shape {}x{} needs {}",
                data.len(),
                frames,
                features,
                frames * features
            )));
        }
        Ok(Self {
            frames,
            features,
            data,
        })
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn features(&self) -> usize {
        self.features
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn frame(&self, index: usize) -> &[f32] {
        &self.data[index * self.features..(index + 1) * self.features]
    }
}

/// A tensor with its vocabulary label index
#[derive(Debug, Clone)]
pub struct LabeledTensor {
    pub tensor: SequenceTensor,
    pub label: usize,
}

/// Trait for trained sequence classifiers
pub trait Classifier: Send + Sync {
    /// Sequence length the classifier was trained on
    fn input_frames(&self) -> usize;

    /// Output dimensionality (vocabulary size)
    fn num_classes(&self) -> usize;

    /// Score every vocabulary word for one sequence
    fn predict(&self, input: &SequenceTensor) -> Result<Vec<f32>>;
}

/// Trait for offline training of classifiers
pub trait Trainer: Send + Sync {
    fn train(
        &self,
        frames: usize,
        num_classes: usize,
        examples: &[LabeledTensor],
    ) -> Result<ClassifierArtifact>;
}

/// Serialized trained classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClassifierArtifact {
    Centroid(CentroidModel),
}

impl ClassifierArtifact {
    pub async fn load(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            GestureError::Configuration(format!(
                "Failed to load classifier artifact {}: {}",
                path.display(),
                e
            ))
        })?;
        let artifact: ClassifierArtifact = serde_json::from_str(&content)?;
        info!("🧠 Loaded classifier artifact from: {}", path.display());
        Ok(artifact)
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, serde_json::to_string(self)?).await?;
        info!("💾 Classifier artifact saved to: {}", path.display());
        Ok(())
    }
}

/// Create classifier instance from a trained artifact
pub fn create_classifier(artifact: ClassifierArtifact) -> Arc<dyn Classifier> {
    match artifact {
        ClassifierArtifact::Centroid(model) => Arc::new(model),
    }
}

/// Index of the highest score, first one wins on ties
pub fn argmax(scores: &[f32]) -> Option<usize> {
    scores
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f32)>, (i, &s)| match best {
            Some((_, b)) if b >= s => best,
            _ => Some((i, s)),
        })
        .map(|(i, _)| i)
}
