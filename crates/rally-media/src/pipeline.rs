//! The per-frame analysis loop.
//!
//! For every decoded frame: detect objects, track the ball, estimate pose,
//! classify shots and feedback, paint the overlay and encode the result.
//! The loop is synchronous and CPU-bound; [`analyze_file`] runs it on a
//! blocking thread.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use rally_models::{AnalysisResult, BallObservation, LandmarkSet};
use tracing::{debug, info, warn};

use crate::ball_tracker::BallTracker;
use crate::config::PipelineConfig;
use crate::context::ModelContext;
use crate::error::{MediaError, MediaResult};
use crate::feedback::FeedbackAggregator;
use crate::frames::{FfmpegFrameReader, FfmpegFrameWriter, FrameSink, FrameSource};
use crate::overlay::{FrameLayers, OverlayRenderer, TextBlock};
use crate::probe::{probe_video, sanitize_fps};
use crate::shot_detector::ShotDetector;

const PROGRESS_EVERY: u64 = 300;

/// One analysis run over a frame stream.
pub struct FramePipeline<'a> {
    ctx: &'a ModelContext,
    config: &'a PipelineConfig,
    fps: f64,
}

impl<'a> FramePipeline<'a> {
    /// `fps` must already be sanitized.
    pub fn new(ctx: &'a ModelContext, config: &'a PipelineConfig, fps: f64) -> Self {
        Self { ctx, config, fps }
    }

    /// Drive `source` to exhaustion, writing annotated frames to `sink`.
    ///
    /// `cancel` is checked between frames.
    pub fn run(
        &self,
        source: &mut dyn FrameSource,
        sink: &mut dyn FrameSink,
        cancel: &AtomicBool,
    ) -> MediaResult<AnalysisResult> {
        let dims = (source.width(), source.height());
        let center = (dims.0 as i32 / 2, dims.1 as i32 / 2);

        let mut tracker = BallTracker::new(self.config);
        let mut shots = ShotDetector::new(self.ctx.rules.clone(), self.config);
        let mut feedback = FeedbackAggregator::new();
        let renderer = OverlayRenderer::new(self.ctx.font.clone(), self.config);

        let started = Instant::now();
        let mut frame_index: u64 = 0;
        let mut replaced_glyphs = 0usize;

        loop {
            if cancel.load(Ordering::Relaxed) {
                warn!(frame_index, "Frame loop cancelled");
                return Err(MediaError::Cancelled);
            }
            let Some(mut frame) = source.next_frame()? else {
                break;
            };
            let timestamp = frame_index as f64 / self.fps;

            let detections = self.ctx.detector.detect(&frame).unwrap_or_else(|e| {
                warn!(frame_index, "Object detection failed, skipping: {}", e);
                Vec::new()
            });
            tracker.observe(&frame, &detections, frame_index);
            let ball_box = tracker.select_ball(&detections);

            let landmarks: Option<LandmarkSet> =
                self.ctx.pose.estimate(&frame).unwrap_or_else(|e| {
                    warn!(frame_index, "Pose estimation failed, skipping: {}", e);
                    None
                });

            let ball = tracker.current_or(center);
            let assessment =
                shots.classify(landmarks.as_ref(), ball, dims, timestamp, frame_index);
            feedback.merge(assessment.good, assessment.bad);

            let trail: Vec<BallObservation> = tracker.history().copied().collect();
            let layers = FrameLayers {
                landmarks: landmarks.as_ref(),
                trail: &trail,
                ball_box,
                text: landmarks.as_ref().map(|_| TextBlock {
                    errors: feedback.bad(),
                    good: feedback.good(),
                    shots: shots.shots(),
                }),
            };
            replaced_glyphs += renderer.compose(&mut frame, &layers)?;

            sink.write_frame(&frame)?;
            frame_index += 1;

            if frame_index % PROGRESS_EVERY == 0 {
                debug!(
                    frames = frame_index,
                    shots = shots.shots().len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Frame loop progress"
                );
            }
        }

        sink.finish()?;
        metrics::counter!("rally_frames_processed_total").increment(frame_index);

        if replaced_glyphs > 0 {
            debug!(replaced_glyphs, "Some overlay characters had no glyph");
        }

        let (good, bad) = feedback.into_lists();
        let result = AnalysisResult::new(frame_index, good, bad, shots.into_shots());
        info!(
            frames = result.frame_count,
            shots = result.detected_shots.len(),
            good = result.good_points.len(),
            errors = result.errors.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Frame loop finished"
        );
        Ok(result)
    }
}

/// Analyze `input` and write the annotated (unconverted) video to `output`.
pub async fn analyze_file(
    ctx: Arc<ModelContext>,
    config: PipelineConfig,
    input: PathBuf,
    output: PathBuf,
    cancel: Arc<AtomicBool>,
) -> MediaResult<AnalysisResult> {
    let info = probe_video(&input).await?;
    let (fps, usable) = sanitize_fps(info.fps, config.max_fps, config.default_fps);
    if !usable {
        warn!(
            reported_fps = info.fps,
            fallback_fps = fps,
            input = %input.display(),
            "Unusable frame rate, using fallback"
        );
    }

    tokio::task::spawn_blocking(move || {
        let mut source = FfmpegFrameReader::open(&input, info.width, info.height)?;
        let mut sink = FfmpegFrameWriter::create(&output, info.width, info.height, fps)?;
        FramePipeline::new(&ctx, &config, fps).run(&mut source, &mut sink, &cancel)
    })
    .await
    .map_err(|e| MediaError::internal(format!("Frame loop aborted: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::{DisabledPoseEstimator, ObjectDetector, PoseEstimator};
    use crate::overlay::OverlayFont;
    use crate::rules::{RuleEvaluation, ShotCandidate, TechniqueRules};
    use image::RgbImage;
    use rally_models::{BoundingBox, Detection, FeedbackItem, Landmark, PoseLandmark};

    struct BlankSource {
        width: u32,
        height: u32,
        remaining: u64,
    }

    impl FrameSource for BlankSource {
        fn width(&self) -> u32 {
            self.width
        }

        fn height(&self) -> u32 {
            self.height
        }

        fn next_frame(&mut self) -> MediaResult<Option<RgbImage>> {
            if self.remaining == 0 {
                return Ok(None);
            }
            self.remaining -= 1;
            Ok(Some(RgbImage::new(self.width, self.height)))
        }
    }

    #[derive(Default)]
    struct CountingSink {
        frames: u64,
        finished: bool,
    }

    impl FrameSink for CountingSink {
        fn write_frame(&mut self, _frame: &RgbImage) -> MediaResult<()> {
            self.frames += 1;
            Ok(())
        }

        fn finish(&mut self) -> MediaResult<()> {
            self.finished = true;
            Ok(())
        }
    }

    /// Wrist fixed near the bottom-right corner.
    struct ScriptedPose;

    impl PoseEstimator for ScriptedPose {
        fn estimate(&self, _frame: &RgbImage) -> MediaResult<Option<LandmarkSet>> {
            Ok(Some(LandmarkSet::new(vec![Landmark::new(
                PoseLandmark::RightWrist,
                0.9,
                0.9,
                1.0,
            )])))
        }

        fn is_ready(&self) -> bool {
            true
        }

        fn name(&self) -> &'static str {
            "scripted"
        }
    }

    /// Ball next to the wrist for the first `near_frames` calls, then in the
    /// opposite corner.
    struct ScriptedDetector {
        calls: std::sync::atomic::AtomicU64,
        near_frames: u64,
    }

    impl ObjectDetector for ScriptedDetector {
        fn detect(&self, _frame: &RgbImage) -> MediaResult<Vec<Detection>> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            let (x, y) = if n < self.near_frames { (265.0, 265.0) } else { (0.0, 0.0) };
            Ok(vec![Detection::new(
                BoundingBox::new(x, y, 10.0, 10.0),
                "sports ball",
                0.9,
            )])
        }

        fn is_ready(&self) -> bool {
            true
        }

        fn name(&self) -> &'static str {
            "scripted"
        }
    }

    struct FailingDetector;

    impl ObjectDetector for FailingDetector {
        fn detect(&self, _frame: &RgbImage) -> MediaResult<Vec<Detection>> {
            Err(MediaError::detection_failed("boom"))
        }

        fn is_ready(&self) -> bool {
            true
        }

        fn name(&self) -> &'static str {
            "failing"
        }
    }

    /// Proposes a forehand on every frame.
    struct AlwaysForehand;

    impl TechniqueRules for AlwaysForehand {
        fn evaluate(&self, _: &LandmarkSet, _: (i32, i32), _: (u32, u32), t: f64) -> RuleEvaluation {
            RuleEvaluation {
                good: vec![FeedbackItem::good("Ready", "Paddle up")],
                bad: vec![FeedbackItem::bad("Late", "Swing earlier")],
                shots: vec![ShotCandidate {
                    shot_type: "forehand".into(),
                    time: t,
                }],
            }
        }

        fn name(&self) -> &'static str {
            "always-forehand"
        }
    }

    fn context(pose: Arc<dyn PoseEstimator>, detector: Arc<dyn ObjectDetector>) -> ModelContext {
        ModelContext::new(pose, detector, Arc::new(AlwaysForehand), Arc::new(OverlayFont::bundled()))
    }

    fn source(frames: u64) -> BlankSource {
        BlankSource {
            width: 300,
            height: 300,
            remaining: frames,
        }
    }

    #[test]
    fn test_ten_second_clip_with_ball_jump() {
        let ctx = context(
            Arc::new(ScriptedPose),
            Arc::new(ScriptedDetector {
                calls: Default::default(),
                near_frames: 5,
            }),
        );
        let config = PipelineConfig::default();
        let mut sink = CountingSink::default();

        let result = FramePipeline::new(&ctx, &config, 30.0)
            .run(&mut source(300), &mut sink, &AtomicBool::new(false))
            .unwrap();

        assert_eq!(result.frame_count, 300);
        assert_eq!(sink.frames, 300);
        assert!(sink.finished);
        assert_eq!(result.detected_shots.len(), 1);
        assert_eq!(result.detected_shots[0].time, 0.0);
        assert_eq!(result.detected_shot.as_ref(), result.detected_shots.last());
        assert_eq!(result.good_points.len(), 1);
        assert_eq!(result.errors.len(), 1);
    }

    #[test]
    fn test_no_pose_means_no_shots() {
        let ctx = context(
            Arc::new(DisabledPoseEstimator),
            Arc::new(ScriptedDetector {
                calls: Default::default(),
                near_frames: 300,
            }),
        );
        let config = PipelineConfig::default();
        let result = FramePipeline::new(&ctx, &config, 30.0)
            .run(&mut source(20), &mut CountingSink::default(), &AtomicBool::new(false))
            .unwrap();

        assert_eq!(result.frame_count, 20);
        assert!(result.detected_shots.is_empty());
        assert!(result.detected_shot.is_none());
        assert!(result.good_points.is_empty());
    }

    #[test]
    fn test_detector_failure_is_skipped() {
        let ctx = context(Arc::new(ScriptedPose), Arc::new(FailingDetector));
        let config = PipelineConfig::default();
        let result = FramePipeline::new(&ctx, &config, 30.0)
            .run(&mut source(10), &mut CountingSink::default(), &AtomicBool::new(false))
            .unwrap();
        assert_eq!(result.frame_count, 10);
    }

    #[test]
    fn test_cancel_stops_loop() {
        let ctx = context(Arc::new(ScriptedPose), Arc::new(FailingDetector));
        let config = PipelineConfig::default();
        let mut sink = CountingSink::default();
        let err = FramePipeline::new(&ctx, &config, 30.0)
            .run(&mut source(10), &mut sink, &AtomicBool::new(true))
            .unwrap_err();
        assert!(matches!(err, MediaError::Cancelled));
        assert_eq!(sink.frames, 0);
        assert!(!sink.finished);
    }

    #[tokio::test]
    async fn test_missing_input_fails_to_open() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = Arc::new(ModelContext::disabled(&PipelineConfig::default()));
        let err = analyze_file(
            ctx,
            PipelineConfig::default(),
            dir.path().join("missing.mp4"),
            dir.path().join("out.mp4"),
            Arc::new(AtomicBool::new(false)),
        )
        .await
        .unwrap_err();
        assert!(err.is_open_failure());
    }
}
