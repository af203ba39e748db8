//! TrueType text rendering for overlays.
//!
//! DejaVu Sans is compiled into the binary so feedback text renders even when
//! no font is configured. Characters the font has no glyph for are drawn with
//! its `.notdef` glyph and counted.

use std::path::Path;

use ab_glyph::{Font, FontArc, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_text_mut, text_size};
use tracing::{debug, warn};

use crate::error::{MediaError, MediaResult};

const BUNDLED_FONT: &[u8] = include_bytes!("../../assets/fonts/DejaVuSans.ttf");

/// Pixel height of feedback and shot lines.
pub const TEXT_SCALE: f32 = 20.0;
/// Pixel height of detection captions.
pub const LABEL_SCALE: f32 = 14.0;

/// A scalable font used to draw overlay text.
#[derive(Clone)]
pub struct OverlayFont {
    font: FontArc,
}

impl std::fmt::Debug for OverlayFont {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverlayFont")
            .field("glyphs", &self.font.glyph_count())
            .finish()
    }
}

impl OverlayFont {
    /// The font compiled into the crate.
    pub fn bundled() -> Self {
        let font = FontArc::try_from_slice(BUNDLED_FONT)
            .expect("bundled DejaVu Sans is a valid TrueType font");
        Self { font }
    }

    /// Load a TrueType or OpenType font from disk.
    pub fn from_file(path: &Path) -> MediaResult<Self> {
        let bytes = std::fs::read(path)?;
        let font = FontArc::try_from_vec(bytes)
            .map_err(|e| MediaError::Font(format!("{}: {}", path.display(), e)))?;
        debug!(path = %path.display(), "Loaded overlay font");
        Ok(Self { font })
    }

    /// Use the font at `path` when given and readable, else the bundled one.
    pub fn load(path: Option<&Path>) -> Self {
        match path.map(Self::from_file) {
            Some(Ok(font)) => font,
            Some(Err(e)) => {
                warn!("Overlay font unavailable, using bundled font: {}", e);
                Self::bundled()
            }
            None => Self::bundled(),
        }
    }

    /// Whether `ch` renders with a real glyph.
    pub fn covers(&self, ch: char) -> bool {
        ch.is_whitespace() || self.font.glyph_id(ch).0 != 0
    }

    /// Number of characters in `text` that fall back to the replacement glyph.
    pub fn missing_glyphs(&self, text: &str) -> usize {
        text.chars().filter(|c| !self.covers(*c)).count()
    }

    /// Width and height in pixels of `text` at `scale`.
    pub fn measure(&self, scale: f32, text: &str) -> (u32, u32) {
        text_size(PxScale::from(scale), &self.font, text)
    }

    /// Draw `text` with its top-left corner at `(x, y)`. Returns the number
    /// of characters drawn with the replacement glyph.
    pub fn draw(
        &self,
        canvas: &mut RgbImage,
        x: i32,
        y: i32,
        scale: f32,
        text: &str,
        color: Rgb<u8>,
    ) -> usize {
        draw_text_mut(canvas, color, x, y, PxScale::from(scale), &self.font, text);
        self.missing_glyphs(text)
    }
}

impl Default for OverlayFont {
    fn default() -> Self {
        Self::bundled()
    }
}
