/// Frame capture loop
///
/// Drives the segmentation state machine over a stream of frame detections and hands every
/// finished gesture to a sink. The frame source is released on every exit path: end of
/// stream, user cancellation, read failure and sink failure alike.
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader, Lines};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::dataset::write_sample_folder;
use crate::error::{GestureError, Result};
use crate::keypoints::extract_keypoints;
use crate::landmarks::FrameDetection;
use crate::router::{BucketedClassifierRouter, Prediction};
use crate::segmentation::{GestureSample, SegmentationConfig, SegmentationStateMachine};
use crate::vocabulary::Vocabulary;

/// Trait for sources of per-frame landmark detections
#[async_trait]
pub trait FrameSource: Send {
    /// Next frame, or `None` once the stream has ended
    async fn read_frame(&mut self) -> Result<Option<FrameDetection>>;

    /// Release the underlying device or file
    async fn release(&mut self) -> Result<()>;

    fn describe(&self) -> String;
}

/// Detections encoded as one JSON object per line
pub struct JsonLinesSource<R> {
    lines: Option<Lines<BufReader<R>>>,
    name: String,
    line_number: usize,
}

impl JsonLinesSource<tokio::fs::File> {
    pub async fn open(path: &Path) -> Result<Self> {
        let file = tokio::fs::File::open(path).await.map_err(|e| {
            GestureError::FrameSource(format!("cannot open {}: {}", path.display(), e))
        })?;
        Ok(Self::new(file, path.display().to_string()))
    }
}

impl JsonLinesSource<tokio::io::Stdin> {
    pub fn stdin() -> Self {
        Self::new(tokio::io::stdin(), "stdin".to_string())
    }
}

impl<R: AsyncRead + Unpin + Send> JsonLinesSource<R> {
    pub fn new(reader: R, name: String) -> Self {
        Self {
            lines: Some(BufReader::new(reader).lines()),
            name,
            line_number: 0,
        }
    }

    pub fn is_released(&self) -> bool {
        self.lines.is_none()
    }
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send> FrameSource for JsonLinesSource<R> {
    async fn read_frame(&mut self) -> Result<Option<FrameDetection>> {
        let lines = self
            .lines
            .as_mut()
            .ok_or_else(|| GestureError::FrameSource(format!("{} already released", self.name)))?;

        loop {
            let line = lines.next_line().await.map_err(|e| {
                GestureError::FrameSource(format!("read failed on {}: {}", self.name, e))
            })?;
            let Some(line) = line else {
                return Ok(None);
            };
            self.line_number += 1;

            if line.trim().is_empty() {
                continue;
            }

            return FrameDetection::from_json(&line).map(Some).map_err(|e| {
                GestureError::FrameSource(format!(
                    "malformed frame at {}:{}: {}",
                    self.name, self.line_number, e
                ))
            });
        }
    }

    async fn release(&mut self) -> Result<()> {
        if self.lines.take().is_some() {
            debug!("Released frame source {}", self.name);
        }
        Ok(())
    }

    fn describe(&self) -> String {
        self.name.clone()
    }
}

/// Receiver of finished gestures
#[async_trait]
pub trait SampleSink: Send {
    async fn accept(&mut self, frames: Vec<FrameDetection>) -> Result<()>;
}

/// Saves each gesture as a sample folder under a word directory
pub struct SampleFolderSink {
    word_dir: PathBuf,
    saved: Vec<PathBuf>,
}

impl SampleFolderSink {
    pub fn new(word_dir: PathBuf) -> Self {
        Self {
            word_dir,
            saved: Vec::new(),
        }
    }

    pub fn saved(&self) -> &[PathBuf] {
        &self.saved
    }
}

#[async_trait]
impl SampleSink for SampleFolderSink {
    async fn accept(&mut self, frames: Vec<FrameDetection>) -> Result<()> {
        let path = write_sample_folder(&self.word_dir, &frames).await?;
        info!("📸 Sample saved ({} frames): {}", frames.len(), path.display());
        self.saved.push(path);
        Ok(())
    }
}

/// One recognized gesture
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecognizedGesture {
    pub sample_id: u32,
    pub frames: usize,
    pub prediction: Prediction,
    pub word: Option<String>,
}

/// Classifies each gesture through the router
pub struct RecognitionSink<'a> {
    router: &'a BucketedClassifierRouter,
    vocabulary: &'a Vocabulary,
    recognized: Vec<RecognizedGesture>,
}

impl<'a> RecognitionSink<'a> {
    pub fn new(router: &'a BucketedClassifierRouter, vocabulary: &'a Vocabulary) -> Self {
        Self {
            router,
            vocabulary,
            recognized: Vec::new(),
        }
    }

    pub fn recognized(&self) -> &[RecognizedGesture] {
        &self.recognized
    }
}

#[async_trait]
impl<'a> SampleSink for RecognitionSink<'a> {
    async fn accept(&mut self, frames: Vec<FrameDetection>) -> Result<()> {
        let sample_id = self.recognized.len() as u32 + 1;
        let sample = GestureSample::from_detections(sample_id, None, &frames)?;
        let prediction = self.router.route(sample.frames())?;
        let word = self.vocabulary.word(prediction.label).map(str::to_string);

        info!(
            "🤟 {} (confidence {:.2}, {} frames)",
            word.as_deref()
                .map(|w| self.vocabulary.display_text(w))
                .unwrap_or_else(|| format!("label {}", prediction.label)),
            prediction.confidence(),
            sample.len()
        );

        self.recognized.push(RecognizedGesture {
            sample_id: sample.sample_id,
            frames: sample.len(),
            prediction,
            word,
        });
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    EndOfStream,
    Cancelled,
}

/// Capture loop statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureReport {
    pub frames: usize,
    pub gestures: usize,
    pub overlong_discarded: usize,
    pub stop: StopReason,
}

/// Per-frame segmentation and sink dispatch shared by both loop variants
struct SegmentDriver {
    machine: SegmentationStateMachine<FrameDetection>,
    max_gesture_frames: usize,
    frames: usize,
    gestures: usize,
    overlong_discarded: usize,
}

impl SegmentDriver {
    fn new(segmentation: SegmentationConfig, max_gesture_frames: usize) -> Self {
        Self {
            machine: SegmentationStateMachine::new(segmentation),
            max_gesture_frames,
            frames: 0,
            gestures: 0,
            overlong_discarded: 0,
        }
    }

    async fn process(&mut self, detection: FrameDetection, sink: &mut dyn SampleSink) -> Result<()> {
        // Malformed frames are surfaced here rather than stored for later
        extract_keypoints(&detection)?;
        self.frames += 1;

        let hand_present = detection.has_hand();
        if let Some(frames) = self.machine.push(hand_present, detection) {
            self.gestures += 1;
            sink.accept(frames).await?;
        } else if self.max_gesture_frames > 0 && self.machine.buffered_len() > self.max_gesture_frames {
            warn!(
                "Gesture exceeded {} frames without ending, discarding",
                self.max_gesture_frames
            );
            self.machine.reset();
            self.overlong_discarded += 1;
        }
        Ok(())
    }

    fn report(&self, stop: StopReason) -> CaptureReport {
        CaptureReport {
            frames: self.frames,
            gestures: self.gestures,
            overlong_discarded: self.overlong_discarded,
            stop,
        }
    }
}

/// Resolves once cancellation is requested; never resolves if the sender is gone
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    loop {
        if *cancel.borrow_and_update() {
            return;
        }
        if cancel.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Capture loop configuration
#[derive(Debug, Clone)]
pub struct CaptureSession {
    segmentation: SegmentationConfig,
    max_gesture_frames: usize,
    queue_capacity: usize,
}

impl CaptureSession {
    pub fn new(segmentation: SegmentationConfig, max_gesture_frames: usize, queue_capacity: usize) -> Self {
        Self {
            segmentation,
            max_gesture_frames,
            queue_capacity: queue_capacity.max(1),
        }
    }

    /// Read, segment and dispatch frames one at a time until the stream ends or is cancelled
    pub async fn run(
        &self,
        source: &mut dyn FrameSource,
        sink: &mut dyn SampleSink,
        mut cancel: watch::Receiver<bool>,
    ) -> Result<CaptureReport> {
        info!("🎥 Capture started on {}", source.describe());
        let result = self.drive(source, sink, &mut cancel).await;

        if let Err(e) = source.release().await {
            warn!("Failed to release frame source: {}", e);
        }
        log_outcome(&result);
        result
    }

    async fn drive(
        &self,
        source: &mut dyn FrameSource,
        sink: &mut dyn SampleSink,
        cancel: &mut watch::Receiver<bool>,
    ) -> Result<CaptureReport> {
        let mut driver = SegmentDriver::new(self.segmentation, self.max_gesture_frames);

        loop {
            let frame = tokio::select! {
                biased;
                _ = cancelled(cancel) => {
                    info!("Capture interrupted by user");
                    return Ok(driver.report(StopReason::Cancelled));
                }
                frame = source.read_frame() => frame?,
            };

            match frame {
                Some(detection) => driver.process(detection, sink).await?,
                None => return Ok(driver.report(StopReason::EndOfStream)),
            }
        }
    }

    /// Like [`run`](Self::run) but reads frames on a separate task connected by a bounded queue.
    ///
    /// Frames are consumed in capture order. The producer task owns the source and releases it
    /// when the stream ends, on cancellation, on a read failure, or when the consumer stops.
    pub async fn run_pipelined(
        &self,
        mut source: Box<dyn FrameSource>,
        sink: &mut dyn SampleSink,
        cancel: watch::Receiver<bool>,
    ) -> Result<CaptureReport> {
        info!(
            "🎥 Pipelined capture started on {} (queue {})",
            source.describe(),
            self.queue_capacity
        );
        let (tx, mut rx) = mpsc::channel::<Result<FrameDetection>>(self.queue_capacity);

        let producer = tokio::spawn(async move {
            let mut cancel = cancel;
            let stop = loop {
                let frame = tokio::select! {
                    biased;
                    _ = cancelled(&mut cancel) => break StopReason::Cancelled,
                    _ = tx.closed() => break StopReason::Cancelled,
                    frame = source.read_frame() => frame,
                };

                match frame {
                    Ok(Some(detection)) => {
                        if tx.send(Ok(detection)).await.is_err() {
                            break StopReason::Cancelled;
                        }
                    }
                    Ok(None) => break StopReason::EndOfStream,
                    Err(e) => {
                        let _ = tx.send(Err(e)).await;
                        break StopReason::EndOfStream;
                    }
                }
            };

            if let Err(e) = source.release().await {
                warn!("Failed to release frame source: {}", e);
            }
            stop
        });

        let mut driver = SegmentDriver::new(self.segmentation, self.max_gesture_frames);
        let mut consumed: Result<()> = Ok(());
        while let Some(frame) = rx.recv().await {
            let processed = match frame {
                Ok(detection) => driver.process(detection, sink).await,
                Err(e) => Err(e),
            };
            if let Err(e) = processed {
                consumed = Err(e);
                break;
            }
        }
        drop(rx);

        let stop = producer
            .await
            .map_err(|e| GestureError::FrameSource(format!("capture task failed: {}", e)))?;

        let result = consumed.map(|_| driver.report(stop));
        log_outcome(&result);
        result
    }
}

fn log_outcome(result: &Result<CaptureReport>) {
    match result {
        Ok(report) => info!(
            "🏁 Capture finished ({:?}): {} frames, {} gestures, {} overlong discarded",
            report.stop, report.frames, report.gestures, report.overlong_discarded
        ),
        Err(e) => warn!("❌ Capture stopped with error: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::landmarks::tests::hand_frame;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Scripted source that records whether it was released and how many reads it served
    struct ScriptedSource {
        frames: VecDeque<Result<FrameDetection>>,
        released: Arc<AtomicBool>,
        reads: Arc<AtomicUsize>,
    }

    impl ScriptedSource {
        fn new(frames: Vec<Result<FrameDetection>>) -> (Self, Arc<AtomicBool>) {
            let (source, released, _) = Self::counted(frames);
            (source, released)
        }

        fn counted(frames: Vec<Result<FrameDetection>>) -> (Self, Arc<AtomicBool>, Arc<AtomicUsize>) {
            let released = Arc::new(AtomicBool::new(false));
            let reads = Arc::new(AtomicUsize::new(0));
            (
                Self {
                    frames: frames.into(),
                    released: released.clone(),
                    reads: reads.clone(),
                },
                released,
                reads,
            )
        }
    }

    #[async_trait]
    impl FrameSource for ScriptedSource {
        async fn read_frame(&mut self) -> Result<Option<FrameDetection>> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.frames.pop_front().transpose()
        }

        async fn release(&mut self) -> Result<()> {
            self.released.store(true, Ordering::SeqCst);
            Ok(())
        }

        fn describe(&self) -> String {
            "scripted".to_string()
        }
    }

    #[derive(Default)]
    struct CollectingSink {
        gestures: Vec<usize>,
    }

    #[async_trait]
    impl SampleSink for CollectingSink {
        async fn accept(&mut self, frames: Vec<FrameDetection>) -> Result<()> {
            self.gestures.push(frames.len());
            Ok(())
        }
    }

    /// Sink that rejects every gesture
    struct RejectingSink;

    #[async_trait]
    impl SampleSink for RejectingSink {
        async fn accept(&mut self, _frames: Vec<FrameDetection>) -> Result<()> {
            Err(GestureError::Classification("model unavailable".to_string()))
        }
    }

    fn gesture_stream(present: usize, absent: usize) -> Vec<Result<FrameDetection>> {
        std::iter::repeat_with(|| Ok(hand_frame()))
            .take(present)
            .chain(std::iter::repeat_with(|| Ok(FrameDetection::empty())).take(absent))
            .collect()
    }

    fn session() -> CaptureSession {
        CaptureSession::new(SegmentationConfig::new(1, 5, 3), 0, 4)
    }

    #[tokio::test]
    async fn test_run_emits_and_releases() {
        let (mut source, released) = ScriptedSource::new(gesture_stream(9, 3));
        let mut sink = CollectingSink::default();
        let (_tx, rx) = watch::channel(false);

        let report = session().run(&mut source, &mut sink, rx).await.unwrap();
        assert_eq!(report.frames, 12);
        assert_eq!(report.gestures, 1);
        assert_eq!(report.stop, StopReason::EndOfStream);
        assert_eq!(sink.gestures, vec![4]);
        assert!(released.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_read_failure_releases_source() {
        let mut frames = gesture_stream(3, 0);
        frames.push(Err(GestureError::FrameSource("camera unplugged".to_string())));
        let (mut source, released) = ScriptedSource::new(frames);
        let mut sink = CollectingSink::default();
        let (_tx, rx) = watch::channel(false);

        let result = session().run(&mut source, &mut sink, rx).await;
        assert!(matches!(result, Err(GestureError::FrameSource(_))));
        assert!(released.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_cancellation_releases_source() {
        let (mut source, released) = ScriptedSource::new(gesture_stream(9, 3));
        let mut sink = CollectingSink::default();
        let (_tx, rx) = watch::channel(true);

        let report = session().run(&mut source, &mut sink, rx).await.unwrap();
        assert_eq!(report.stop, StopReason::Cancelled);
        assert_eq!(report.frames, 0);
        assert!(released.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_overlong_gesture_is_discarded() {
        let (mut source, _) = ScriptedSource::new(gesture_stream(30, 3));
        let mut sink = CollectingSink::default();
        let (_tx, rx) = watch::channel(false);

        let report = CaptureSession::new(SegmentationConfig::new(1, 5, 3), 10, 4)
            .run(&mut source, &mut sink, rx)
            .await
            .unwrap();
        assert_eq!(report.overlong_discarded, 2);
        assert!(sink.gestures.is_empty());
    }

    #[tokio::test]
    async fn test_pipelined_preserves_order_and_releases() {
        let mut frames = gesture_stream(9, 3);
        frames.extend(gesture_stream(12, 3));
        let (source, released) = ScriptedSource::new(frames);
        let mut sink = CollectingSink::default();
        let (_tx, rx) = watch::channel(false);

        let report = session()
            .run_pipelined(Box::new(source), &mut sink, rx)
            .await
            .unwrap();
        assert_eq!(report.frames, 27);
        assert_eq!(sink.gestures, vec![4, 7]);
        assert!(released.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_pipelined_read_failure_releases_source() {
        let mut frames = gesture_stream(3, 0);
        frames.push(Err(GestureError::FrameSource("camera unplugged".to_string())));
        frames.extend(gesture_stream(9, 3));
        let (source, released) = ScriptedSource::new(frames);
        let mut sink = CollectingSink::default();
        let (_tx, rx) = watch::channel(false);

        let result = session().run_pipelined(Box::new(source), &mut sink, rx).await;
        assert!(matches!(result, Err(GestureError::FrameSource(_))));
        assert!(sink.gestures.is_empty());
        assert!(released.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_pipelined_cancellation_releases_source() {
        let (source, released) = ScriptedSource::new(gesture_stream(9, 3));
        let mut sink = CollectingSink::default();
        let (_tx, rx) = watch::channel(true);

        let report = session()
            .run_pipelined(Box::new(source), &mut sink, rx)
            .await
            .unwrap();
        assert_eq!(report.stop, StopReason::Cancelled);
        assert_eq!(report.frames, 0);
        assert!(sink.gestures.is_empty());
        assert!(released.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_pipelined_sink_failure_stops_producer() {
        let mut frames = gesture_stream(9, 3);
        frames.extend(gesture_stream(1000, 0));
        let (source, released, reads) = ScriptedSource::counted(frames);
        let (_tx, rx) = watch::channel(false);

        let result = session()
            .run_pipelined(Box::new(source), &mut RejectingSink, rx)
            .await;
        assert!(matches!(result, Err(GestureError::Classification(_))));
        assert!(released.load(Ordering::SeqCst));
        // The producer stops once the queue closes instead of draining the stream
        assert!(reads.load(Ordering::SeqCst) < 100);
    }

    #[tokio::test]
    async fn test_json_lines_source() {
        let line = serde_json::to_string(&hand_frame()).unwrap();
        let input = format!("{}\n\n{{}}\nnot json\n", line);
        let mut source = JsonLinesSource::new(input.as_bytes(), "memory".to_string());

        assert!(source.read_frame().await.unwrap().unwrap().has_hand());
        assert!(!source.read_frame().await.unwrap().unwrap().has_hand());
        let err = source.read_frame().await.unwrap_err();
        assert!(err.to_string().contains("memory:4"));

        source.release().await.unwrap();
        assert!(source.is_released());
        assert!(source.read_frame().await.is_err());
    }
}
