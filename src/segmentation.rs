/// Gesture segmentation over a continuous frame stream
///
/// The state machine decides frame by frame where a gesture starts and ends. Short hand
/// detection dropouts are absorbed by a cooldown of `delay_frames` absent frames so one
/// gesture is never split in two.
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{GestureError, Result};
use crate::keypoints::{extract_keypoints, KeypointVector};
use crate::landmarks::FrameDetection;

/// Segmentation parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentationConfig {
    /// Frames discarded at the start of a detected gesture
    pub margin_frames: usize,

    /// Minimum frames a gesture must hold (after the margin) to be kept
    pub min_frames: usize,

    /// Consecutive hand-absent frames that end a gesture
    pub delay_frames: usize,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            margin_frames: 1,
            min_frames: 5,
            delay_frames: 3,
        }
    }
}

impl SegmentationConfig {
    pub fn new(margin_frames: usize, min_frames: usize, delay_frames: usize) -> Self {
        Self {
            margin_frames,
            min_frames,
            delay_frames,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.min_frames == 0 {
            return Err(GestureError::Configuration(
                "min_frames must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Buffered length required before hand absence starts a cooldown
    pub fn required_frames(&self) -> usize {
        self.min_frames + self.margin_frames
    }

    /// Frames trimmed from the end of the buffer when a gesture is finalized
    pub fn trailing_trim(&self) -> usize {
        self.margin_frames + self.delay_frames
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SegmentationState {
    /// No hand detected, nothing buffered
    Idle,

    /// Hand detected, frames are being buffered
    Recording,

    /// Hand lost, counting absent frames before deciding the gesture is over
    Cooldown,
}

/// A finalized gesture: an ordered, non-empty sequence of keypoint vectors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GestureSample {
    pub sample_id: u32,
    pub label: Option<String>,
    frames: Vec<KeypointVector>,
}

impl GestureSample {
    pub fn new(sample_id: u32, label: Option<String>, frames: Vec<KeypointVector>) -> Result<Self> {
        if frames.is_empty() {
            return Err(GestureError::EmptySequence);
        }
        Ok(Self {
            sample_id,
            label,
            frames,
        })
    }

    /// Encode the detections of one finished gesture
    pub fn from_detections(
        sample_id: u32,
        label: Option<String>,
        detections: &[FrameDetection],
    ) -> Result<Self> {
        let frames = detections
            .iter()
            .map(extract_keypoints)
            .collect::<Result<Vec<_>>>()?;
        Self::new(sample_id, label, frames)
    }

    pub fn frames(&self) -> &[KeypointVector] {
        &self.frames
    }

    pub fn into_frames(self) -> Vec<KeypointVector> {
        self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// Frame-driven segmentation state machine.
///
/// Generic over the buffered payload so capture can keep full detections while live
/// recognition keeps keypoint vectors. The machine is the sole owner of its buffer.
#[derive(Debug)]
pub struct SegmentationStateMachine<T> {
    config: SegmentationConfig,
    state: SegmentationState,
    presence_count: usize,
    cooldown_count: usize,
    buffer: Vec<T>,
    emitted: u32,
}

impl<T> SegmentationStateMachine<T> {
    pub fn new(config: SegmentationConfig) -> Self {
        Self {
            config,
            state: SegmentationState::Idle,
            presence_count: 0,
            cooldown_count: 0,
            buffer: Vec::new(),
            emitted: 0,
        }
    }

    pub fn config(&self) -> &SegmentationConfig {
        &self.config
    }

    pub fn state(&self) -> SegmentationState {
        self.state
    }

    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Number of gestures emitted so far
    pub fn emitted(&self) -> u32 {
        self.emitted
    }

    /// Drop any buffered frames and return to idle
    pub fn reset(&mut self) {
        self.state = SegmentationState::Idle;
        self.presence_count = 0;
        self.cooldown_count = 0;
        self.buffer.clear();
    }

    /// Feed one frame. Returns the finalized frames when this frame completes a gesture.
    pub fn push(&mut self, hand_present: bool, frame: T) -> Option<Vec<T>> {
        if hand_present {
            self.state = SegmentationState::Recording;
            self.cooldown_count = 0;
            self.presence_count += 1;
            if self.presence_count > self.config.margin_frames {
                self.buffer.push(frame);
            }
            return None;
        }

        if self.buffer.len() < self.config.required_frames() {
            if self.state != SegmentationState::Idle {
                debug!(
                    "Discarding short gesture ({} frames buffered, {} required)",
                    self.buffer.len(),
                    self.config.required_frames()
                );
            }
            self.reset();
            return None;
        }

        // Frames are not appended while absence is tolerated; the trim below relies on that.
        self.cooldown_count += 1;
        if self.cooldown_count < self.config.delay_frames {
            self.state = SegmentationState::Cooldown;
            return None;
        }

        let keep = self.buffer.len().saturating_sub(self.config.trailing_trim());
        let mut frames = std::mem::take(&mut self.buffer);
        frames.truncate(keep);
        self.reset();

        if frames.is_empty() {
            debug!("Gesture trimmed to zero frames, nothing emitted");
            return None;
        }

        self.emitted += 1;
        debug!("✋ Gesture finalized with {} frames", frames.len());
        Some(frames)
    }
}
