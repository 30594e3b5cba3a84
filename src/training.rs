/// Per-bucket classifier training
///
/// Every labeled sequence is padded or truncated to each bucket's length with the same rule
/// the router applies at prediction time, then one classifier is trained per bucket.
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;

use crate::classifier::{LabeledTensor, Trainer};
use crate::dataset::SequenceStore;
use crate::error::{GestureError, Result};
use crate::router::{pad_sequence, validate_bucket_lengths, BucketBinding};
use crate::vocabulary::Vocabulary;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainedBucket {
    pub max_length: usize,
    pub artifact: PathBuf,
    pub examples: usize,
}

/// Train one classifier per bucket binding and write each artifact to its bound path
pub async fn train_buckets(
    store: &SequenceStore,
    vocabulary: &Vocabulary,
    bindings: &[BucketBinding],
    trainer: &dyn Trainer,
) -> Result<Vec<TrainedBucket>> {
    let lengths: Vec<usize> = bindings.iter().map(|b| b.max_length).collect();
    validate_bucket_lengths(&lengths)?;

    let sequences = store.labeled_sequences(vocabulary)?;
    if sequences.is_empty() {
        return Err(GestureError::DatasetMissing(
            "no samples stored for any vocabulary word".to_string(),
        ));
    }
    info!(
        "🏋️ Training {} buckets on {} sequences ({} words)",
        bindings.len(),
        sequences.len(),
        vocabulary.len()
    );

    let mut trained = Vec::with_capacity(bindings.len());
    for binding in bindings {
        let start_time = Instant::now();
        let examples = sequences
            .iter()
            .map(|(frames, label)| {
                Ok(LabeledTensor {
                    tensor: pad_sequence(frames, binding.max_length)?,
                    label: *label,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let artifact = trainer.train(binding.max_length, vocabulary.len(), &examples)?;
        artifact.save(&binding.artifact).await?;

        info!(
            "✅ Bucket {} trained in {:.2}s",
            binding.max_length,
            start_time.elapsed().as_secs_f64()
        );
        trained.push(TrainedBucket {
            max_length: binding.max_length,
            artifact: binding.artifact.clone(),
            examples: examples.len(),
        });
    }

    Ok(trained)
}
