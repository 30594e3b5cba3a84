/// Inference request boundary
///
/// Requests carry `T` frames flattened into one numeric array of `T * 1662` values. Input is
/// validated in full before anything is reshaped or handed to the router.
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::error::{GestureError, Result};
use crate::keypoints::{KeypointVector, KEYPOINT_LENGTH};
use crate::router::BucketedClassifierRouter;
use crate::vocabulary::Vocabulary;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceRequest {
    pub keypoints: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferenceResponse {
    pub predicted_label: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub word: Option<String>,
    pub confidence: f32,
    pub bucket: usize,
}

/// Outcome class of a failed request, mirroring client/server error semantics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The request itself was malformed
    Client,
    /// The classifier or configuration failed
    Server,
}

impl FailureKind {
    pub fn of(error: &GestureError) -> Self {
        match error {
            GestureError::MalformedInput(_)
            | GestureError::EmptySequence
            | GestureError::KeypointLength { .. } => FailureKind::Client,
            _ => FailureKind::Server,
        }
    }
}

/// Convert raw JSON values to numbers, rejecting anything non-numeric or non-finite
pub fn parse_values(values: &[serde_json::Value]) -> Result<Vec<f64>> {
    values
        .iter()
        .enumerate()
        .map(|(i, value)| {
            let number = match value {
                serde_json::Value::Number(n) => n.as_f64(),
                serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
                _ => None,
            };
            number
                .filter(|n| n.is_finite())
                .ok_or_else(|| GestureError::MalformedInput(format!("value {} is not numeric: {}", i, value)))
        })
        .collect()
}

/// Reshape a flat array into frames of [`KEYPOINT_LENGTH`] values
pub fn reshape_flat(values: &[f64]) -> Result<Vec<KeypointVector>> {
    if values.is_empty() {
        return Err(GestureError::MalformedInput("no keypoints received".to_string()));
    }
    if values.len() % KEYPOINT_LENGTH != 0 {
        return Err(GestureError::MalformedInput(format!(
            "{} values is not a whole number of {}-value frames",
            values.len(),
            KEYPOINT_LENGTH
        )));
    }

    values
        .chunks(KEYPOINT_LENGTH)
        .map(|chunk| KeypointVector::from_vec(chunk.to_vec()))
        .collect()
}

/// Validate a request, route it and build the response
pub fn handle_request(
    request: &InferenceRequest,
    router: &BucketedClassifierRouter,
    vocabulary: Option<&Vocabulary>,
) -> Result<InferenceResponse> {
    let values = parse_values(&request.keypoints)?;
    let frames = reshape_flat(&values)?;

    let prediction = router.route(&frames).map_err(|e| {
        error!("Classification failed for {} frames: {}", frames.len(), e);
        e
    })?;

    let word = vocabulary.and_then(|v| v.word(prediction.label).map(str::to_string));
    info!(
        "🔮 Predicted label {} ({}) from {} frames",
        prediction.label,
        word.as_deref().unwrap_or("?"),
        frames.len()
    );

    Ok(InferenceResponse {
        predicted_label: prediction.label,
        word,
        confidence: prediction.confidence(),
        bucket: prediction.bucket,
    })
}
