/// Fixed-layout numeric encoding of one frame's landmarks
use serde::{Deserialize, Serialize};

use crate::error::{GestureError, Result};
use crate::landmarks::{FrameDetection, LandmarkKind};

/// Number of values in a keypoint vector: pose(132) + face(1404) + left hand(63) + right hand(63)
pub const KEYPOINT_LENGTH: usize = 1662;

/// Keypoints of one frame, always exactly [`KEYPOINT_LENGTH`] values long
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct KeypointVector(Vec<f64>);

impl KeypointVector {
    /// All-zero vector, the encoding of a frame with nothing detected
    pub fn zeros() -> Self {
        Self(vec![0.0; KEYPOINT_LENGTH])
    }

    pub fn from_vec(values: Vec<f64>) -> Result<Self> {
        if values.len() != KEYPOINT_LENGTH {
            return Err(GestureError::KeypointLength {
                expected: KEYPOINT_LENGTH,
                actual: values.len(),
            });
        }
        Ok(Self(values))
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Slice holding one landmark group's values
    pub fn group(&self, kind: LandmarkKind) -> &[f64] {
        let start: usize = LandmarkKind::ORDER
            .iter()
            .take_while(|k| **k != kind)
            .map(|k| k.flat_len())
            .sum();
        &self.0[start..start + kind.flat_len()]
    }
}

impl TryFrom<Vec<f64>> for KeypointVector {
    type Error = GestureError;

    fn try_from(values: Vec<f64>) -> Result<Self> {
        Self::from_vec(values)
    }
}

impl From<KeypointVector> for Vec<f64> {
    fn from(vector: KeypointVector) -> Self {
        vector.0
    }
}

/// Encode a frame detection as a keypoint vector.
///
/// Groups are concatenated as pose, face, left hand, right hand. An absent group contributes a
/// zero block of its exact length. Only malformed groups (wrong point count or arity) fail.
pub fn extract_keypoints(detection: &FrameDetection) -> Result<KeypointVector> {
    let mut values = Vec::with_capacity(KEYPOINT_LENGTH);

    for kind in LandmarkKind::ORDER {
        match detection.group(kind) {
            Some(group) => {
                group.validate(kind)?;
                values.extend(group.points.iter().flatten().copied());
            }
            None => values.resize(values.len() + kind.flat_len(), 0.0),
        }
    }

    KeypointVector::from_vec(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::tests::{filled_group, hand_frame};

    #[test]
    fn test_all_absent_is_zero_vector() {
        let vector = extract_keypoints(&FrameDetection::empty()).unwrap();
        assert_eq!(vector.len(), KEYPOINT_LENGTH);
        assert!(vector.as_slice().iter().all(|v| *v == 0.0));
        assert_eq!(vector, KeypointVector::zeros());
    }

    #[test]
    fn test_length_is_fixed_for_any_combination() {
        let full = FrameDetection {
            pose: Some(filled_group(LandmarkKind::Pose, 0.1)),
            face: Some(filled_group(LandmarkKind::Face, 0.2)),
            left_hand: Some(filled_group(LandmarkKind::LeftHand, 0.3)),
            right_hand: Some(filled_group(LandmarkKind::RightHand, 0.4)),
        };

        for detection in [full, hand_frame(), FrameDetection::empty()] {
            assert_eq!(extract_keypoints(&detection).unwrap().len(), KEYPOINT_LENGTH);
        }
    }

    #[test]
    fn test_groups_land_in_fixed_order() {
        let detection = FrameDetection {
            pose: Some(filled_group(LandmarkKind::Pose, 1.0)),
            left_hand: Some(filled_group(LandmarkKind::LeftHand, 3.0)),
            ..FrameDetection::default()
        };
        let vector = extract_keypoints(&detection).unwrap();

        assert!(vector.group(LandmarkKind::Pose).iter().all(|v| *v == 1.0));
        assert!(vector.group(LandmarkKind::Face).iter().all(|v| *v == 0.0));
        assert!(vector.group(LandmarkKind::LeftHand).iter().all(|v| *v == 3.0));
        assert!(vector.group(LandmarkKind::RightHand).iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_malformed_group_is_rejected() {
        let mut detection = hand_frame();
        if let Some(hand) = detection.right_hand.as_mut() {
            hand.points[0].push(9.0);
        }
        assert!(extract_keypoints(&detection).is_err());
    }

    #[test]
    fn test_deserialize_enforces_length() {
        assert!(serde_json::from_str::<KeypointVector>("[0.0, 1.0]").is_err());

        let json = serde_json::to_string(&KeypointVector::zeros()).unwrap();
        let parsed: KeypointVector = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.len(), KEYPOINT_LENGTH);
    }
}
