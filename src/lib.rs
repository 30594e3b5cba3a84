/// LSE Sign Recognizer
///
/// Sign-language gesture recognition from body and hand landmark streams: frame keypoint
/// encoding, gesture segmentation, dataset building and length-bucketed classification.

pub mod capture;
pub mod classifier;
pub mod config;
pub mod dataset;
pub mod error;
pub mod evaluation;
pub mod inference;
pub mod keypoints;
pub mod landmarks;
pub mod router;
pub mod segmentation;
pub mod training;
pub mod vocabulary;

// Re-export main types for easy access
pub use crate::capture::{CaptureReport, CaptureSession, FrameSource, JsonLinesSource, SampleSink};
pub use crate::classifier::{Classifier, ClassifierArtifact, SequenceTensor, Trainer};
pub use crate::config::Config;
pub use crate::dataset::{DatasetBuilder, KeypointRecord, SequenceStore};
pub use crate::error::{GestureError, Result};
pub use crate::evaluation::{evaluate, ConfusionMatrix};
pub use crate::inference::{InferenceRequest, InferenceResponse};
pub use crate::keypoints::{extract_keypoints, KeypointVector, KEYPOINT_LENGTH};
pub use crate::landmarks::{FrameDetection, LandmarkGroup, LandmarkKind};
pub use crate::router::{BucketBinding, BucketedClassifierRouter, Prediction};
pub use crate::segmentation::{GestureSample, SegmentationConfig, SegmentationState, SegmentationStateMachine};
pub use crate::vocabulary::Vocabulary;
