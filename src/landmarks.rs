/// Landmark detection results for a single video frame
///
/// A detector reports up to four independent landmark groups per frame. Any of them may be
/// absent (hand or face out of frame), which is a normal state rather than an error.
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{GestureError, Result};

/// Landmark group kinds with their fixed point counts and coordinate arity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LandmarkKind {
    Pose,
    Face,
    LeftHand,
    RightHand,
}

impl LandmarkKind {
    /// Concatenation order used for keypoint vectors
    pub const ORDER: [LandmarkKind; 4] = [
        LandmarkKind::Pose,
        LandmarkKind::Face,
        LandmarkKind::LeftHand,
        LandmarkKind::RightHand,
    ];

    /// Number of points the detector reports for this group
    pub fn point_count(&self) -> usize {
        match self {
            LandmarkKind::Pose => 33,
            LandmarkKind::Face => 468,
            LandmarkKind::LeftHand | LandmarkKind::RightHand => 21,
        }
    }

    /// Values per point (pose carries visibility as a fourth value)
    pub fn arity(&self) -> usize {
        match self {
            LandmarkKind::Pose => 4,
            _ => 3,
        }
    }

    /// Flattened length of this group inside a keypoint vector
    pub fn flat_len(&self) -> usize {
        self.point_count() * self.arity()
    }

    pub fn name(&self) -> &'static str {
        match self {
            LandmarkKind::Pose => "pose",
            LandmarkKind::Face => "face",
            LandmarkKind::LeftHand => "left_hand",
            LandmarkKind::RightHand => "right_hand",
        }
    }
}

/// Ordered points of one landmark group, each point being `[x, y, z]` or `[x, y, z, visibility]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LandmarkGroup {
    pub points: Vec<Vec<f64>>,
}

impl LandmarkGroup {
    pub fn new(points: Vec<Vec<f64>>) -> Self {
        Self { points }
    }

    /// Check that the group is complete for its kind.
    ///
    /// Groups are all-or-nothing per frame, so a short point list is as malformed as a point
    /// with the wrong number of coordinates.
    pub fn validate(&self, kind: LandmarkKind) -> Result<()> {
        if self.points.len() != kind.point_count() {
            return Err(GestureError::MalformedLandmarks {
                group: kind.name(),
                reason: format!(
                    "expected {} points, got {}",
                    kind.point_count(),
                    self.points.len()
                ),
            });
        }

        if let Some((index, point)) = self
            .points
            .iter()
            .enumerate()
            .find(|(_, p)| p.len() != kind.arity())
        {
            return Err(GestureError::MalformedLandmarks {
                group: kind.name(),
                reason: format!(
                    "point {} has {} coordinates, expected {}",
                    index,
                    point.len(),
                    kind.arity()
                ),
            });
        }

        Ok(())
    }
}

/// Detection result for one frame
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameDetection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pose: Option<LandmarkGroup>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub face: Option<LandmarkGroup>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left_hand: Option<LandmarkGroup>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub right_hand: Option<LandmarkGroup>,
}

impl FrameDetection {
    /// A frame with no detected landmarks
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn group(&self, kind: LandmarkKind) -> Option<&LandmarkGroup> {
        match kind {
            LandmarkKind::Pose => self.pose.as_ref(),
            LandmarkKind::Face => self.face.as_ref(),
            LandmarkKind::LeftHand => self.left_hand.as_ref(),
            LandmarkKind::RightHand => self.right_hand.as_ref(),
        }
    }

    /// Whether either hand was detected
    pub fn has_hand(&self) -> bool {
        self.left_hand.is_some() || self.right_hand.is_some()
    }

    /// Parse a detection from one JSON document
    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Load a detection stored as a per-frame JSON file
    pub async fn from_file(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        Self::from_json(&content)
    }

    /// Write a detection as a per-frame JSON file
    pub async fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string(self)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Build a complete group where every coordinate equals `value`
    pub(crate) fn filled_group(kind: LandmarkKind, value: f64) -> LandmarkGroup {
        LandmarkGroup::new(vec![vec![value; kind.arity()]; kind.point_count()])
    }

    pub(crate) fn hand_frame() -> FrameDetection {
        FrameDetection {
            right_hand: Some(filled_group(LandmarkKind::RightHand, 0.5)),
            ..FrameDetection::default()
        }
    }

    #[test]
    fn test_flat_lengths_sum_to_keypoint_length() {
        let total: usize = LandmarkKind::ORDER.iter().map(|k| k.flat_len()).sum();
        assert_eq!(total, 1662);
        assert_eq!(LandmarkKind::Pose.flat_len(), 132);
        assert_eq!(LandmarkKind::Face.flat_len(), 1404);
        assert_eq!(LandmarkKind::LeftHand.flat_len(), 63);
    }

    #[test]
    fn test_validate_rejects_wrong_arity() {
        let mut group = filled_group(LandmarkKind::LeftHand, 0.1);
        group.points[4] = vec![0.1, 0.2];

        let err = group.validate(LandmarkKind::LeftHand).unwrap_err();
        assert!(err.to_string().contains("point 4 has 2 coordinates"));
    }

    #[test]
    fn test_validate_rejects_partial_group() {
        let mut group = filled_group(LandmarkKind::Pose, 0.1);
        group.points.truncate(20);
        assert!(group.validate(LandmarkKind::Pose).is_err());
    }

    #[test]
    fn test_has_hand() {
        assert!(!FrameDetection::empty().has_hand());
        assert!(hand_frame().has_hand());

        let face_only = FrameDetection {
            face: Some(filled_group(LandmarkKind::Face, 0.3)),
            ..FrameDetection::default()
        };
        assert!(!face_only.has_hand());
    }

    #[test]
    fn test_missing_keys_parse_as_absent() {
        let detection = FrameDetection::from_json(r#"{"left_hand": null}"#).unwrap();
        assert_eq!(detection, FrameDetection::empty());
    }
}
