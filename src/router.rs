/// Length-bucketed routing of finished sequences to specialized classifiers
///
/// Bucket boundaries are data: an ordered list of `(max_length, classifier)` pairs. A
/// sequence goes to the smallest bucket that fits it; sequences longer than every bucket go
/// to the last one and are truncated.
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

use crate::classifier::{argmax, create_classifier, Classifier, ClassifierArtifact, SequenceTensor};
use crate::error::{GestureError, Result};
use crate::keypoints::{KeypointVector, KEYPOINT_LENGTH};

/// Binding of a bucket length to a trained artifact on disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BucketBinding {
    pub max_length: usize,
    pub artifact: PathBuf,
}

/// Check that bucket lengths are positive and strictly increasing
pub fn validate_bucket_lengths(lengths: &[usize]) -> Result<()> {
    if lengths.is_empty() {
        return Err(GestureError::Configuration(
            "bucket configuration has no entries".to_string(),
        ));
    }
    if lengths[0] == 0 {
        return Err(GestureError::Configuration(
            "bucket max_length must be greater than 0".to_string(),
        ));
    }
    if let Some(pair) = lengths.windows(2).find(|w| w[1] <= w[0]) {
        return Err(GestureError::Configuration(format!(
            "bucket lengths must be strictly increasing ({} then {})",
            pair[0], pair[1]
        )));
    }
    Ok(())
}

/// Pad or truncate a sequence to `target_len` frames.
///
/// Padding prepends zero frames, truncation drops trailing frames, so the real frames stay
/// aligned to the end of a padded input and to the start of a truncated one. Values are
/// narrowed to `f32` for the classifier.
pub fn pad_sequence(frames: &[KeypointVector], target_len: usize) -> Result<SequenceTensor> {
    let used = frames.len().min(target_len);
    let padding = target_len - used;

    let mut data = vec![0.0f32; padding * KEYPOINT_LENGTH];
    data.reserve(used * KEYPOINT_LENGTH);
    for frame in &frames[..used] {
        data.extend(frame.as_slice().iter().map(|v| *v as f32));
    }

    SequenceTensor::new(target_len, KEYPOINT_LENGTH, data)
}

/// One bucket: a sequence length and the classifier trained on it
#[derive(Clone)]
pub struct Bucket {
    pub max_length: usize,
    pub classifier: Arc<dyn Classifier>,
}

impl std::fmt::Debug for Bucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bucket")
            .field("max_length", &self.max_length)
            .field("classes", &self.classifier.num_classes())
            .finish()
    }
}

/// Routing outcome for one sequence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Index into the vocabulary
    pub label: usize,

    /// Raw per-word scores from the classifier
    pub scores: Vec<f32>,

    /// `max_length` of the bucket that handled the sequence
    pub bucket: usize,
}

impl Prediction {
    pub fn confidence(&self) -> f32 {
        self.scores.get(self.label).copied().unwrap_or(0.0)
    }
}

#[derive(Debug, Clone)]
pub struct BucketedClassifierRouter {
    buckets: Vec<Bucket>,
}

impl BucketedClassifierRouter {
    /// Build a router, rejecting empty or unordered bucket tables
    pub fn new(buckets: Vec<Bucket>) -> Result<Self> {
        let lengths: Vec<usize> = buckets.iter().map(|b| b.max_length).collect();
        validate_bucket_lengths(&lengths)?;

        if let Some(bucket) = buckets
            .iter()
            .find(|b| b.classifier.input_frames() != b.max_length)
        {
            return Err(GestureError::Configuration(format!(
                "classifier for bucket {} expects {} frames",
                bucket.max_length,
                bucket.classifier.input_frames()
            )));
        }

        let classes = buckets[0].classifier.num_classes();
        if buckets.iter().any(|b| b.classifier.num_classes() != classes) {
            return Err(GestureError::Configuration(
                "all bucket classifiers must share one vocabulary size".to_string(),
            ));
        }

        Ok(Self { buckets })
    }

    /// Load every bound artifact and build the router
    pub async fn from_bindings(bindings: &[BucketBinding]) -> Result<Self> {
        let mut buckets = Vec::with_capacity(bindings.len());
        for binding in bindings {
            let artifact = ClassifierArtifact::load(&binding.artifact).await?;
            buckets.push(Bucket {
                max_length: binding.max_length,
                classifier: create_classifier(artifact),
            });
        }

        let router = Self::new(buckets)?;
        info!(
            "🧭 Router ready with buckets: {:?}",
            router.buckets.iter().map(|b| b.max_length).collect::<Vec<_>>()
        );
        Ok(router)
    }

    pub fn buckets(&self) -> &[Bucket] {
        &self.buckets
    }

    pub fn num_classes(&self) -> usize {
        self.buckets[0].classifier.num_classes()
    }

    /// Smallest bucket holding `len` frames, or the last bucket for longer sequences
    pub fn select_bucket(&self, len: usize) -> &Bucket {
        self.buckets
            .iter()
            .find(|b| b.max_length >= len)
            .unwrap_or_else(|| &self.buckets[self.buckets.len() - 1])
    }

    /// Pad or truncate a sequence to the bucket it will be routed to
    pub fn prepare(&self, frames: &[KeypointVector]) -> Result<(&Bucket, SequenceTensor)> {
        if frames.is_empty() {
            return Err(GestureError::EmptySequence);
        }
        let bucket = self.select_bucket(frames.len());
        let tensor = pad_sequence(frames, bucket.max_length)?;
        Ok((bucket, tensor))
    }

    /// Classify a finished sequence
    pub fn route(&self, frames: &[KeypointVector]) -> Result<Prediction> {
        let (bucket, tensor) = self.prepare(frames)?;
        let scores = bucket.classifier.predict(&tensor)?;
        if scores.len() != bucket.classifier.num_classes() {
            return Err(GestureError::Classification(format!(
                "bucket {} classifier returned {} scores for {} classes",
                bucket.max_length,
                scores.len(),
                bucket.classifier.num_classes()
            )));
        }
        let label = argmax(&scores)
            .ok_or_else(|| GestureError::Classification("classifier returned no scores".to_string()))?;

        debug!(
            "Routed {} frames to bucket {} -> label {}",
            frames.len(),
            bucket.max_length,
            label
        );

        Ok(Prediction {
            label,
            scores,
            bucket: bucket.max_length,
        })
    }
}
