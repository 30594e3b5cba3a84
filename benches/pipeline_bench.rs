use criterion::{black_box, criterion_group, criterion_main, Criterion};
use lse_sign_recognizer::classifier::{create_classifier, CentroidTrainer, LabeledTensor, Trainer};
use lse_sign_recognizer::keypoints::{extract_keypoints, KeypointVector};
use lse_sign_recognizer::landmarks::{FrameDetection, LandmarkGroup};
use lse_sign_recognizer::router::{pad_sequence, Bucket, BucketedClassifierRouter};
use lse_sign_recognizer::segmentation::{SegmentationConfig, SegmentationStateMachine};

fn full_frame() -> FrameDetection {
    FrameDetection {
        pose: Some(LandmarkGroup::new(vec![vec![0.5; 4]; 33])),
        face: Some(LandmarkGroup::new(vec![vec![0.5; 3]; 468])),
        left_hand: Some(LandmarkGroup::new(vec![vec![0.5; 3]; 21])),
        right_hand: Some(LandmarkGroup::new(vec![vec![0.5; 3]; 21])),
    }
}

/// Benchmark flattening one detection into a keypoint vector
fn bench_extract_keypoints(c: &mut Criterion) {
    let frame = full_frame();
    c.bench_function("extract_keypoints", |b| {
        b.iter(|| extract_keypoints(black_box(&frame)))
    });
}

/// Benchmark segmenting a stream of alternating gestures and pauses
fn bench_segmentation(c: &mut Criterion) {
    let pattern: Vec<bool> = (0..200).map(|i| i % 40 < 30).collect();

    c.bench_function("segmentation_200_frames", |b| {
        b.iter(|| {
            let mut machine = SegmentationStateMachine::new(SegmentationConfig::default());
            let mut emitted = 0;
            for (index, &present) in pattern.iter().enumerate() {
                if machine.push(present, black_box(index)).is_some() {
                    emitted += 1;
                }
            }
            emitted
        })
    });
}

/// Benchmark padding and routing through a three-bucket centroid router
fn bench_routing(c: &mut Criterion) {
    let frame = extract_keypoints(&full_frame()).unwrap();
    let sequence: Vec<KeypointVector> = vec![frame; 10];

    let buckets = [7, 12, 18]
        .into_iter()
        .map(|max_length| {
            let examples: Vec<LabeledTensor> = (0..3)
                .map(|label| LabeledTensor {
                    tensor: pad_sequence(&sequence[..label + 4], max_length).unwrap(),
                    label,
                })
                .collect();
            let artifact = CentroidTrainer.train(max_length, 3, &examples).unwrap();
            Bucket {
                max_length,
                classifier: create_classifier(artifact),
            }
        })
        .collect();
    let router = BucketedClassifierRouter::new(buckets).unwrap();

    c.bench_function("pad_sequence_12", |b| {
        b.iter(|| pad_sequence(black_box(&sequence), 12))
    });

    c.bench_function("route_10_frames", |b| {
        b.iter(|| router.route(black_box(&sequence)))
    });
}

criterion_group!(benches, bench_extract_keypoints, bench_segmentation, bench_routing);
criterion_main!(benches);
