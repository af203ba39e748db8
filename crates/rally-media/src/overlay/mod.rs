//! Per-frame annotation overlay.
//!
//! Layers are painted onto a copy of the frame in a fixed order (skeleton,
//! ground ellipse, ball trail, ball box and label, text block) and the copy
//! is then alpha-blended back onto the frame.

pub mod text;

use std::sync::Arc;

use image::{Rgb, RgbImage};
use imageproc::drawing::{
    draw_filled_circle_mut, draw_hollow_ellipse_mut, draw_hollow_rect_mut, draw_line_segment_mut,
};
use imageproc::map::map_colors2;
use imageproc::pixelops::weighted_sum;
use imageproc::rect::Rect;
use rally_models::{BallObservation, Detection, FeedbackItem, LandmarkSet, PoseLandmark, ShotEvent};

use crate::config::PipelineConfig;
use crate::error::{MediaError, MediaResult};
pub use text::{OverlayFont, LABEL_SCALE, TEXT_SCALE};

pub const COLOR_JOINT: Rgb<u8> = Rgb([255, 0, 0]);
pub const COLOR_BONE: Rgb<u8> = Rgb([255, 255, 255]);
pub const COLOR_GROUND: Rgb<u8> = Rgb([0, 255, 0]);
pub const COLOR_BALL: Rgb<u8> = Rgb([255, 215, 0]);
pub const COLOR_ERROR_TEXT: Rgb<u8> = Rgb([255, 0, 0]);
pub const COLOR_GOOD_TEXT: Rgb<u8> = Rgb([0, 255, 0]);
pub const COLOR_SHOT_TEXT: Rgb<u8> = Rgb([51, 0, 0]);

/// Top of the first text line.
pub const TEXT_TOP: i32 = 10;
/// Vertical distance between text lines.
pub const LINE_SPACING: i32 = 30;
pub const TEXT_LEFT: i32 = 10;
/// Error lines leave room for the marker dot.
const ERROR_TEXT_LEFT: i32 = 24;
const ERROR_DOT_RADIUS: i32 = 8;
pub const MAX_GOOD_LINES: usize = 5;
pub const MAX_SHOT_LINES: usize = 5;

/// One line of the text block.
#[derive(Debug, Clone, PartialEq)]
pub struct TextLine {
    pub text: String,
    pub color: Rgb<u8>,
    /// Top y coordinate
    pub y: i32,
    /// Whether a marker dot precedes the text
    pub marker: bool,
}

/// Feedback and shots shown in the text block.
#[derive(Debug, Clone, Copy)]
pub struct TextBlock<'a> {
    pub errors: &'a [FeedbackItem],
    pub good: &'a [FeedbackItem],
    pub shots: &'a [ShotEvent],
}

impl TextBlock<'_> {
    /// Lay out every line: all errors, the first good points, the most
    /// recent shots.
    pub fn lines(&self) -> Vec<TextLine> {
        let errors = self.errors.iter().map(|e| {
            (format!("{}: {}", e.title, e.description), COLOR_ERROR_TEXT, true)
        });
        let good = self.good.iter().take(MAX_GOOD_LINES).map(|g| {
            (format!("Good: {} - {}", g.title, g.description), COLOR_GOOD_TEXT, false)
        });
        let start = self.shots.len().saturating_sub(MAX_SHOT_LINES);
        let shots = self.shots[start..].iter().map(|s| {
            (format!("Hit: {} ({:?}s)", s.shot_type, s.time), COLOR_SHOT_TEXT, false)
        });

        errors
            .chain(good)
            .chain(shots)
            .enumerate()
            .map(|(i, (text, color, marker))| TextLine {
                text,
                color,
                y: TEXT_TOP + i as i32 * LINE_SPACING,
                marker,
            })
            .collect()
    }
}

/// Everything to paint on one frame.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameLayers<'a> {
    pub landmarks: Option<&'a LandmarkSet>,
    pub trail: &'a [BallObservation],
    pub ball_box: Option<&'a Detection>,
    pub text: Option<TextBlock<'a>>,
}

/// Paints analysis overlays onto frames.
pub struct OverlayRenderer {
    font: Arc<OverlayFont>,
    alpha: f32,
    min_visibility: f32,
    major_axis_factor: f32,
    minor_axis_factor: f32,
    trail_max_age: u32,
}

impl OverlayRenderer {
    pub fn new(font: Arc<OverlayFont>, config: &PipelineConfig) -> Self {
        Self {
            font,
            alpha: config.alpha,
            min_visibility: config.min_landmark_visibility,
            major_axis_factor: config.major_axis_factor,
            minor_axis_factor: config.minor_axis_factor,
            trail_max_age: config.trail_max_age,
        }
    }

    /// Paint all layers and blend them onto `frame`.
    ///
    /// Returns the number of characters drawn with the replacement glyph.
    pub fn compose(&self, frame: &mut RgbImage, layers: &FrameLayers<'_>) -> MediaResult<usize> {
        let mut overlay = frame.clone();
        let replaced = self.paint(&mut overlay, layers);
        *frame = blend(frame, &overlay, self.alpha)?;
        Ok(replaced)
    }

    /// Paint all layers directly onto `canvas` without blending.
    pub fn paint(&self, canvas: &mut RgbImage, layers: &FrameLayers<'_>) -> usize {
        if let Some(landmarks) = layers.landmarks {
            self.draw_skeleton(canvas, landmarks);
            self.draw_ground_ellipse(canvas, landmarks);
        }
        self.draw_ball_trail(canvas, layers.trail);
        if let Some(det) = layers.ball_box {
            self.draw_detection(canvas, det);
        }
        layers
            .text
            .map(|block| self.draw_text_block(canvas, &block))
            .unwrap_or(0)
    }

    fn pixel(&self, landmarks: &LandmarkSet, kind: PoseLandmark, dims: (u32, u32)) -> Option<(i32, i32)> {
        landmarks
            .visible(kind, self.min_visibility)
            .map(|l| l.to_pixels(dims.0, dims.1))
    }

    pub fn draw_skeleton(&self, canvas: &mut RgbImage, landmarks: &LandmarkSet) {
        let dims = canvas.dimensions();
        for (a, b) in PoseLandmark::BODY_CONNECTIONS {
            if let (Some(pa), Some(pb)) = (self.pixel(landmarks, a, dims), self.pixel(landmarks, b, dims)) {
                thick_line(canvas, pa, pb, COLOR_BONE);
            }
        }
        for kind in PoseLandmark::ALL.iter().filter(|k| k.is_body()) {
            if let Some(p) = self.pixel(landmarks, *kind, dims) {
                draw_filled_circle_mut(canvas, p, 4, COLOR_JOINT);
            }
        }
    }

    /// Ellipse on the ground between the ankles, sized by shoulder width.
    pub fn draw_ground_ellipse(&self, canvas: &mut RgbImage, landmarks: &LandmarkSet) {
        let dims = canvas.dimensions();
        let ankles = self
            .pixel(landmarks, PoseLandmark::LeftAnkle, dims)
            .zip(self.pixel(landmarks, PoseLandmark::RightAnkle, dims));
        let shoulders = self
            .pixel(landmarks, PoseLandmark::LeftShoulder, dims)
            .zip(self.pixel(landmarks, PoseLandmark::RightShoulder, dims));

        let (Some((la, ra)), Some((ls, rs))) = (ankles, shoulders) else {
            return;
        };

        let center = ((la.0 + ra.0) / 2, (la.1 + ra.1) / 2);
        let shoulder_width = (ls.0 - rs.0).abs() as f32;
        let axes = (
            ((shoulder_width * self.major_axis_factor) as i32).max(10),
            ((shoulder_width * self.minor_axis_factor) as i32).max(4),
        );
        for inset in 0..2 {
            draw_hollow_ellipse_mut(canvas, center, axes.0 - inset, axes.1 - inset, COLOR_GROUND);
        }
    }

    /// Trail markers shrink and fade with age.
    pub fn draw_ball_trail(&self, canvas: &mut RgbImage, trail: &[BallObservation]) {
        let max_age = self.trail_max_age.max(1) as f32;
        let freshness = |obs: &BallObservation| 1.0 - (obs.age as f32 / max_age).min(1.0);
        let shade = |f: f32| {
            Rgb([
                (COLOR_BALL[0] as f32 * (0.4 + 0.6 * f)) as u8,
                (COLOR_BALL[1] as f32 * (0.4 + 0.6 * f)) as u8,
                (COLOR_BALL[2] as f32 * (0.4 + 0.6 * f)) as u8,
            ])
        };

        for pair in trail.windows(2) {
            let f = freshness(&pair[1]);
            thick_line(canvas, pair[0].position, pair[1].position, shade(f));
        }
        for obs in trail {
            let f = freshness(obs);
            draw_filled_circle_mut(canvas, obs.position, 2 + (4.0 * f) as i32, shade(f));
        }
    }

    /// Box and `"label 0.87"` caption for a detection.
    pub fn draw_detection(&self, canvas: &mut RgbImage, det: &Detection) {
        let b = det.bbox;
        let (x, y) = (b.x as i32, b.y as i32);
        let (w, h) = ((b.width as u32).max(1), (b.height as u32).max(1));
        draw_hollow_rect_mut(canvas, Rect::at(x, y).of_size(w, h), COLOR_BALL);
        if w > 2 && h > 2 {
            draw_hollow_rect_mut(canvas, Rect::at(x + 1, y + 1).of_size(w - 2, h - 2), COLOR_BALL);
        }

        let caption = format!("{} {:.2}", det.label, det.confidence);
        let (_, text_height) = self.font.measure(LABEL_SCALE, &caption);
        let caption_y = y - 5 - text_height as i32;
        self.font
            .draw(canvas, x, caption_y, LABEL_SCALE, &caption, COLOR_BALL);
    }

    /// Returns the number of replaced characters.
    pub fn draw_text_block(&self, canvas: &mut RgbImage, block: &TextBlock<'_>) -> usize {
        let mut replaced = 0;
        for line in block.lines() {
            let x = if line.marker {
                draw_filled_circle_mut(canvas, (TEXT_LEFT, line.y + 10), ERROR_DOT_RADIUS, line.color);
                ERROR_TEXT_LEFT
            } else {
                TEXT_LEFT
            };
            replaced += self.font.draw(canvas, x, line.y, TEXT_SCALE, &line.text, line.color);
        }
        replaced
    }
}

/// Two-pixel line between `a` and `b`.
fn thick_line(canvas: &mut RgbImage, a: (i32, i32), b: (i32, i32), color: Rgb<u8>) {
    let steep = (b.1 - a.1).abs() > (b.0 - a.0).abs();
    let (dx, dy) = if steep { (1.0, 0.0) } else { (0.0, 1.0) };
    for offset in [0.0, 1.0] {
        draw_line_segment_mut(
            canvas,
            (a.0 as f32 + dx * offset, a.1 as f32 + dy * offset),
            (b.0 as f32 + dx * offset, b.1 as f32 + dy * offset),
            color,
        );
    }
}

/// `alpha * overlay + (1 - alpha) * base`.
pub fn blend(base: &RgbImage, overlay: &RgbImage, alpha: f32) -> MediaResult<RgbImage> {
    if base.dimensions() != overlay.dimensions() {
        return Err(MediaError::internal(format!(
            "Blend size mismatch: {:?} vs {:?}",
            base.dimensions(),
            overlay.dimensions()
        )));
    }
    let alpha = alpha.clamp(0.0, 1.0);
    Ok(map_colors2(overlay, base, |o, b| weighted_sum(o, b, alpha, 1.0 - alpha)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rally_models::{BoundingBox, Landmark};

    fn renderer() -> OverlayRenderer {
        OverlayRenderer::new(Arc::new(OverlayFont::bundled()), &PipelineConfig::default())
    }

    fn shots(n: usize) -> Vec<ShotEvent> {
        (0..n).map(|i| ShotEvent::new(format!("s{}", i), i as f64, 1.0)).collect()
    }

    #[test]
    fn test_text_layout_order_and_limits() {
        let errors = vec![FeedbackItem::bad("E1", "a"), FeedbackItem::bad("E2", "b")];
        let good: Vec<_> = (0..7).map(|i| FeedbackItem::good(format!("G{}", i), "ok")).collect();
        let shots = shots(8);
        let block = TextBlock { errors: &errors, good: &good, shots: &shots };

        let lines = block.lines();
        assert_eq!(lines.len(), 2 + 5 + 5);
        assert_eq!(lines[0].text, "E1: a");
        assert!(lines[0].marker);
        assert_eq!(lines[0].color, COLOR_ERROR_TEXT);
        assert_eq!(lines[0].y, 10);
        assert_eq!(lines[2].text, "Good: G0 - ok");
        assert_eq!(lines[2].color, COLOR_GOOD_TEXT);
        assert_eq!(lines[6].text, "Good: G4 - ok");
        assert_eq!(lines[7].text, "Hit: s3 (3.0s)");
        assert_eq!(lines[7].color, COLOR_SHOT_TEXT);
        assert_eq!(lines[11].text, "Hit: s7 (7.0s)");
        assert_eq!(lines[11].y, 10 + 11 * 30);
    }

    #[test]
    fn test_shot_time_formatting() {
        let shots = vec![ShotEvent::new("forehand", 1.25, 3.0)];
        let block = TextBlock { errors: &[], good: &[], shots: &shots };
        assert_eq!(block.lines()[0].text, "Hit: forehand (1.25s)");
    }

    #[test]
    fn test_compose_blends() {
        let r = renderer();
        let mut frame = RgbImage::new(60, 60);
        let det = Detection::new(BoundingBox::new(20.0, 30.0, 20.0, 20.0), "sports ball", 0.9);
        let layers = FrameLayers { ball_box: Some(&det), ..Default::default() };
        r.compose(&mut frame, &layers).unwrap();
        let px = frame.get_pixel(20, 30);
        assert!(px[0].abs_diff((255.0f32 * 0.6) as u8) <= 1);
        assert_eq!(frame.get_pixel(30, 40), &Rgb([0, 0, 0]));
    }

    #[test]
    fn test_blend_weights() {
        let base = RgbImage::from_pixel(2, 2, Rgb([0, 100, 200]));
        let overlay = RgbImage::from_pixel(2, 2, Rgb([200, 100, 0]));
        let out = blend(&base, &overlay, 0.6).unwrap();
        let px = out.get_pixel(1, 1);
        assert!(px[0].abs_diff(120) <= 1);
        assert!(px[1].abs_diff(100) <= 1);
        assert!(px[2].abs_diff(80) <= 1);

        assert!(blend(&base, &RgbImage::new(3, 2), 0.6).is_err());
    }

    #[test]
    fn test_skeleton_needs_visible_landmarks() {
        let r = renderer();
        let set = LandmarkSet::new(vec![
            Landmark::new(PoseLandmark::LeftShoulder, 0.2, 0.2, 0.9),
            Landmark::new(PoseLandmark::RightShoulder, 0.8, 0.2, 0.1),
        ]);
        let mut canvas = RgbImage::new(100, 100);
        r.draw_skeleton(&mut canvas, &set);
        assert_eq!(canvas.get_pixel(20, 20), &COLOR_JOINT);
        assert_eq!(canvas.get_pixel(80, 20), &Rgb([0, 0, 0]));
        assert_eq!(canvas.get_pixel(50, 20), &Rgb([0, 0, 0]));
    }

    #[test]
    fn test_vietnamese_feedback_renders_without_replacement() {
        let r = renderer();
        let errors = vec![FeedbackItem::bad("Sai tư thế", "Khuỷu tay quá thấp")];
        let layers = FrameLayers {
            text: Some(TextBlock { errors: &errors, good: &[], shots: &[] }),
            ..Default::default()
        };
        let mut frame = RgbImage::new(400, 100);
        assert_eq!(r.compose(&mut frame, &layers).unwrap(), 0);
        let inked = (ERROR_TEXT_LEFT as u32..400)
            .any(|x| (10..40).any(|y| frame.get_pixel(x, y)[0] > 0));
        assert!(inked);
    }

    #[test]
    fn test_unsupported_characters_counted() {
        let r = renderer();
        let errors = vec![FeedbackItem::bad("姿勢", "ok")];
        let layers = FrameLayers {
            text: Some(TextBlock { errors: &errors, good: &[], shots: &[] }),
            ..Default::default()
        };
        let mut frame = RgbImage::new(400, 100);
        assert_eq!(r.compose(&mut frame, &layers).unwrap(), 2);
    }

    #[test]
    fn test_thick_line_is_two_pixels_wide() {
        let mut canvas = RgbImage::new(20, 20);
        thick_line(&mut canvas, (2, 5), (15, 5), COLOR_BONE);
        assert_eq!(canvas.get_pixel(8, 5), &COLOR_BONE);
        assert_eq!(canvas.get_pixel(8, 6), &COLOR_BONE);
        assert_eq!(canvas.get_pixel(8, 7), &Rgb([0, 0, 0]));
    }
}
