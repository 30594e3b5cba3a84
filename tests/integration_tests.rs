use lse_sign_recognizer::capture::{CaptureSession, JsonLinesSource, RecognitionSink, SampleFolderSink, StopReason};
use lse_sign_recognizer::classifier::CentroidTrainer;
use lse_sign_recognizer::dataset::{write_sample_folder, DatasetBuilder, SequenceStore};
use lse_sign_recognizer::evaluation::evaluate;
use lse_sign_recognizer::inference::{handle_request, InferenceRequest};
use lse_sign_recognizer::keypoints::extract_keypoints;
use lse_sign_recognizer::landmarks::{FrameDetection, LandmarkGroup};
use lse_sign_recognizer::router::{BucketBinding, BucketedClassifierRouter};
use lse_sign_recognizer::segmentation::SegmentationConfig;
use lse_sign_recognizer::training::train_buckets;
use lse_sign_recognizer::vocabulary::Vocabulary;
use std::path::Path;
use tempfile::TempDir;
use tokio::sync::watch;

fn hand(value: f64) -> FrameDetection {
    FrameDetection {
        right_hand: Some(LandmarkGroup::new(vec![vec![value; 3]; 21])),
        ..FrameDetection::default()
    }
}

fn vocabulary() -> Vocabulary {
    Vocabulary::new("word_ids", vec!["hola".to_string(), "adios".to_string()])
}

fn bindings(models_dir: &Path) -> Vec<BucketBinding> {
    [7, 12, 18]
        .into_iter()
        .map(|max_length| BucketBinding {
            max_length,
            artifact: models_dir.join(format!("actions_{}.json", max_length)),
        })
        .collect()
}

/// Write a few samples per word, each word with its own hand position
async fn seed_samples(frame_actions_dir: &Path) {
    for (word, value) in [("hola", 0.2), ("adios", 0.8)] {
        for length in [5, 10, 16] {
            let frames = vec![hand(value); length];
            write_sample_folder(&frame_actions_dir.join(word), &frames)
                .await
                .unwrap();
        }
    }
}

async fn build_and_train(root: &Path) -> BucketedClassifierRouter {
    let frame_actions_dir = root.join("frame_actions");
    let keypoints_dir = root.join("keypoints");
    seed_samples(&frame_actions_dir).await;

    let builder = DatasetBuilder::new(frame_actions_dir, keypoints_dir.clone(), 2);
    let words = builder.discover_words().unwrap();
    assert_eq!(words, vec!["adios", "hola"]);

    let summary = builder.build_all(words).await;
    assert_eq!(summary.built.len(), 2);
    assert!(summary.failed_words.is_empty());
    assert_eq!(summary.built[1].samples, 3);
    assert_eq!(summary.built[1].frames, 31);

    let store = SequenceStore::load_vocabulary(&keypoints_dir, &vocabulary())
        .await
        .unwrap();
    let bindings = bindings(&root.join("models"));
    let trained = train_buckets(&store, &vocabulary(), &bindings, &CentroidTrainer)
        .await
        .unwrap();
    assert_eq!(trained.len(), 3);

    BucketedClassifierRouter::from_bindings(&bindings).await.unwrap()
}

#[tokio::test]
async fn test_build_train_evaluate() {
    let temp_dir = TempDir::new().unwrap();
    let router = build_and_train(temp_dir.path()).await;
    assert_eq!(router.num_classes(), 2);

    let store = SequenceStore::load_vocabulary(&temp_dir.path().join("keypoints"), &vocabulary())
        .await
        .unwrap();
    let matrix = evaluate(&store, &vocabulary(), &router).unwrap();

    assert_eq!(matrix.row_sums(), vec![3, 3]);
    assert_eq!(matrix.total(), 6);
    assert_eq!(matrix.correct(), 6);
}

#[tokio::test]
async fn test_classify_request_against_trained_buckets() {
    let temp_dir = TempDir::new().unwrap();
    let router = build_and_train(temp_dir.path()).await;

    let frame = extract_keypoints(&hand(0.8)).unwrap();
    let keypoints = std::iter::repeat(frame.as_slice())
        .take(9)
        .flatten()
        .map(|v| serde_json::json!(v))
        .collect();
    let request = InferenceRequest { keypoints };

    let response = handle_request(&request, &router, Some(&vocabulary())).unwrap();
    assert_eq!(response.predicted_label, 1);
    assert_eq!(response.word.as_deref(), Some("adios"));
    assert_eq!(response.bucket, 12);
    assert!(response.confidence > 0.5);
}

#[tokio::test]
async fn test_capture_then_build() {
    let temp_dir = TempDir::new().unwrap();
    let word_dir = temp_dir.path().join("frame_actions").join("hola");

    let mut lines = Vec::new();
    for _ in 0..9 {
        lines.push(serde_json::to_string(&hand(0.2)).unwrap());
    }
    for _ in 0..3 {
        lines.push("{}".to_string());
    }
    let input = lines.join("\n");

    let mut source = JsonLinesSource::new(input.as_bytes(), "memory".to_string());
    let mut sink = SampleFolderSink::new(word_dir.clone());
    let (_tx, rx) = watch::channel(false);

    let report = CaptureSession::new(SegmentationConfig::default(), 0, 4)
        .run(&mut source, &mut sink, rx)
        .await
        .unwrap();
    assert_eq!(report.stop, StopReason::EndOfStream);
    assert_eq!(report.gestures, 1);
    assert_eq!(sink.saved().len(), 1);
    assert!(source.is_released());

    let builder = DatasetBuilder::new(
        temp_dir.path().join("frame_actions"),
        temp_dir.path().join("keypoints"),
        1,
    );
    let built = builder.build_word("hola").await.unwrap().unwrap();
    assert_eq!(built.samples, 1);
    assert_eq!(built.frames, 4);
}

#[tokio::test]
async fn test_pipelined_recognition() {
    let temp_dir = TempDir::new().unwrap();
    let router = build_and_train(temp_dir.path()).await;
    let vocabulary = vocabulary();

    let mut lines = Vec::new();
    for (value, length) in [(0.8, 12), (0.2, 8)] {
        for _ in 0..length {
            lines.push(serde_json::to_string(&hand(value)).unwrap());
        }
        for _ in 0..3 {
            lines.push("{}".to_string());
        }
    }
    let input = lines.join("\n").into_bytes();

    let source = JsonLinesSource::new(std::io::Cursor::new(input), "memory".to_string());
    let mut sink = RecognitionSink::new(&router, &vocabulary);
    let (_tx, rx) = watch::channel(false);

    let report = CaptureSession::new(SegmentationConfig::default(), 0, 2)
        .run_pipelined(Box::new(source), &mut sink, rx)
        .await
        .unwrap();
    assert_eq!(report.gestures, 2);

    let words: Vec<Option<&str>> = sink.recognized().iter().map(|g| g.word.as_deref()).collect();
    assert_eq!(words, vec![Some("adios"), Some("hola")]);
    assert_eq!(sink.recognized()[0].frames, 7);
    assert_eq!(sink.recognized()[0].sample_id, 1);
    assert_eq!(sink.recognized()[1].sample_id, 2);
}

#[tokio::test]
async fn test_missing_dataset_is_reported() {
    let temp_dir = TempDir::new().unwrap();
    let result = SequenceStore::load_vocabulary(temp_dir.path(), &vocabulary()).await;
    assert!(result.is_err());
}
