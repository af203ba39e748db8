//! Lightweight frame-diff ball finder.
//! Uses frame differencing on a downscaled grid, restricted to ball-coloured
//! cells, to find the centre of a small moving object.

use image::imageops::{grayscale, resize, FilterType};
use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::map::{map_colors, map_colors2};

/// Width of the processing grid.
const PROC_WIDTH: u32 = 96;

const MARKED: Luma<u8> = Luma([255]);
const CLEAR: Luma<u8> = Luma([0]);

/// Simple frame-diff detector for a small, bright, yellow-ish ball.
pub struct BallMotionDetector {
    /// Previous frame (downscaled, gray) for differencing.
    prev: Option<GrayImage>,
    /// Minimum luminance change to count as motion (0-255).
    threshold: u8,
    /// Above this share of changed cells the motion is treated as camera
    /// movement and ignored.
    max_changed_ratio: f32,
}

impl Default for BallMotionDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl BallMotionDetector {
    pub fn new() -> Self {
        Self {
            prev: None,
            threshold: 30,
            max_changed_ratio: 0.05,
        }
    }

    /// Centre of ball-coloured motion in full-frame pixels, if any.
    pub fn detect_center(&mut self, frame: &RgbImage) -> Option<(i32, i32)> {
        let (w, h) = frame.dimensions();
        if w == 0 || h == 0 {
            return None;
        }
        let proc_w = PROC_WIDTH.min(w);
        let proc_h = ((h as f32 * proc_w as f32 / w as f32).round() as u32).max(1);

        let small = resize(frame, proc_w, proc_h, FilterType::Nearest);
        let gray = grayscale(&small);

        let result = self
            .prev
            .as_ref()
            .filter(|prev| prev.dimensions() == gray.dimensions())
            .and_then(|prev| {
                let motion = self.motion_mask(prev, &gray);
                let changed = motion.pixels().filter(|p| **p == MARKED).count();
                if changed as f32 > (proc_w * proc_h) as f32 * self.max_changed_ratio {
                    return None;
                }

                let ball = map_colors2(&motion, &small, |m, px| {
                    if m == MARKED && is_ball_coloured(&px) {
                        MARKED
                    } else {
                        CLEAR
                    }
                });
                let (cx, cy) = centroid(&ball)?;
                let scale_x = w as f32 / proc_w as f32;
                let scale_y = h as f32 / proc_h as f32;
                Some((((cx + 0.5) * scale_x) as i32, ((cy + 0.5) * scale_y) as i32))
            });

        self.prev = Some(gray);
        result
    }

    /// Cells whose luminance moved by at least the threshold.
    fn motion_mask(&self, prev: &GrayImage, current: &GrayImage) -> GrayImage {
        let diff = map_colors2(current, prev, |a, b| Luma([a[0].abs_diff(b[0])]));
        map_colors(&diff, |d| if d[0] >= self.threshold { MARKED } else { CLEAR })
    }
}

/// Mean position of the marked cells of `mask`.
fn centroid(mask: &GrayImage) -> Option<(f32, f32)> {
    let (count, sum_x, sum_y) = mask
        .enumerate_pixels()
        .filter(|(_, _, p)| **p == MARKED)
        .fold((0u32, 0u64, 0u64), |(n, sx, sy), (x, y, _)| {
            (n + 1, sx + x as u64, sy + y as u64)
        });
    (count > 0).then(|| (sum_x as f32 / count as f32, sum_y as f32 / count as f32))
}

/// Bright with red and green well above blue: yellow-green ball colours.
fn is_ball_coloured(p: &Rgb<u8>) -> bool {
    let [r, g, b] = p.0;
    r > 140 && g > 140 && (b as u16) + 40 < r.min(g) as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    fn court() -> RgbImage {
        RgbImage::from_pixel(320, 240, Rgb([30, 80, 140]))
    }

    fn with_ball(cx: u32, cy: u32) -> RgbImage {
        let mut img = court();
        for y in cy.saturating_sub(6)..(cy + 6).min(240) {
            for x in cx.saturating_sub(6)..(cx + 6).min(320) {
                img.put_pixel(x, y, Rgb([230, 240, 40]));
            }
        }
        img
    }

    #[test]
    fn test_first_frame_has_no_motion() {
        let mut det = BallMotionDetector::new();
        assert!(det.detect_center(&with_ball(100, 100)).is_none());
    }

    #[test]
    fn test_detects_moving_ball() {
        let mut det = BallMotionDetector::new();
        det.detect_center(&court());
        let (x, y) = det.detect_center(&with_ball(200, 120)).unwrap();
        assert!((x - 200).abs() <= 8, "x = {}", x);
        assert!((y - 120).abs() <= 8, "y = {}", y);
    }

    #[test]
    fn test_ignores_non_ball_motion() {
        let mut det = BallMotionDetector::new();
        det.detect_center(&court());
        let mut moved = court();
        for y in 100..112 {
            for x in 100..112 {
                moved.put_pixel(x, y, Rgb([250, 250, 250]));
            }
        }
        assert!(det.detect_center(&moved).is_none());
    }

    #[test]
    fn test_centroid_of_mask() {
        let mut mask = GrayImage::new(10, 10);
        assert!(centroid(&mask).is_none());
        mask.put_pixel(2, 4, MARKED);
        mask.put_pixel(4, 6, MARKED);
        assert_eq!(centroid(&mask), Some((3.0, 5.0)));
    }

    #[test]
    fn test_ignores_global_change() {
        let mut det = BallMotionDetector::new();
        det.detect_center(&court());
        let flash = RgbImage::from_pixel(320, 240, Rgb([230, 240, 40]));
        assert!(det.detect_center(&flash).is_none());
    }
}
