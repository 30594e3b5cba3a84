/// Nearest-centroid baseline classifier
///
/// Each class is represented by the mean of its training tensors. Scores are a softmax over
/// negative mean squared distances, so the closest template gets the highest score.
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{Classifier, ClassifierArtifact, LabeledTensor, SequenceTensor, Trainer};
use crate::error::{GestureError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CentroidModel {
    pub frames: usize,
    pub features: usize,

    /// One template per class; `None` for classes with no training samples
    pub centroids: Vec<Option<Vec<f32>>>,
}

impl Classifier for CentroidModel {
    fn input_frames(&self) -> usize {
        self.frames
    }

    fn num_classes(&self) -> usize {
        self.centroids.len()
    }

    fn predict(&self, input: &SequenceTensor) -> Result<Vec<f32>> {
        if input.frames() != self.frames || input.features() != self.features {
            return Err(GestureError::Classification(format!(
                "input shape {}x{} does not match model shape {}x{}",
                input.frames(),
                input.features(),
                self.frames,
                self.features
            )));
        }

        let distances: Vec<Option<f32>> = self
            .centroids
            .iter()
            .map(|centroid| {
                centroid.as_ref().map(|c| {
                    let sum: f32 = c
                        .iter()
                        .zip(input.data())
                        .map(|(a, b)| (a - b) * (a - b))
                        .sum();
                    sum / c.len().max(1) as f32
                })
            })
            .collect();

        let max_logit = distances
            .iter()
            .flatten()
            .map(|d| -d)
            .fold(f32::NEG_INFINITY, f32::max);
        if !max_logit.is_finite() {
            return Err(GestureError::Classification(
                "model has no trained classes".to_string(),
            ));
        }

        let exps: Vec<f32> = distances
            .iter()
            .map(|d| d.map_or(0.0, |d| (-d - max_logit).exp()))
            .collect();
        let total: f32 = exps.iter().sum();

        Ok(exps.into_iter().map(|e| e / total).collect())
    }
}

/// Trainer producing [`CentroidModel`] artifacts
#[derive(Debug, Clone, Default)]
pub struct CentroidTrainer;

impl Trainer for CentroidTrainer {
    fn train(
        &self,
        frames: usize,
        num_classes: usize,
        examples: &[LabeledTensor],
    ) -> Result<ClassifierArtifact> {
        let features = examples
            .first()
            .map(|e| e.tensor.features())
            .ok_or_else(|| GestureError::Classification("no training examples".to_string()))?;

        let width = frames * features;
        let mut sums = vec![vec![0.0f32; width]; num_classes];
        let mut counts = vec![0usize; num_classes];

        for example in examples {
            if example.label >= num_classes {
                return Err(GestureError::Classification(format!(
                    "label {} outside vocabulary of {}",
                    example.label, num_classes
                )));
            }
            if example.tensor.frames() != frames || example.tensor.features() != features {
                return Err(GestureError::Classification(
                    "training tensors must share one shape".to_string(),
                ));
            }
            for (acc, value) in sums[example.label].iter_mut().zip(example.tensor.data()) {
                *acc += value;
            }
            counts[example.label] += 1;
        }

        let centroids = sums
            .into_iter()
            .zip(&counts)
            .enumerate()
            .map(|(label, (sum, &count))| {
                if count == 0 {
                    warn!("No training samples for label {}", label);
                    None
                } else {
                    Some(sum.into_iter().map(|v| v / count as f32).collect())
                }
            })
            .collect();

        debug!(
            "Trained centroid model: {} frames, {} classes, {} examples",
            frames,
            num_classes,
            examples.len()
        );

        Ok(ClassifierArtifact::Centroid(CentroidModel {
            frames,
            features,
            centroids,
        }))
    }
}
