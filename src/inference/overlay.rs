//! Label overlay for displayed frames

use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_text_mut;
use tracing::{debug, warn};

/// Green in BGR channel order (frames are drawn before color conversion)
pub const LABEL_COLOR_BGR: Rgb<u8> = Rgb([0, 255, 0]);

/// Baseline anchor of the label text
pub const LABEL_ORIGIN: (i32, i32) = (10, 30);

const LABEL_SCALE: f32 = 32.0;

const FONT_PATHS: [&str; 5] = [
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// Load the first available system font
pub fn load_system_font() -> Option<FontVec> {
    for path in &FONT_PATHS {
        if let Ok(data) = std::fs::read(path) {
            if let Ok(font) = FontVec::try_from_vec(data) {
                debug!("Loaded font from {}", path);
                return Some(font);
            }
        }
    }

    None
}

/// Draws the predicted label onto frames
pub struct LabelOverlay {
    font: Option<FontVec>,
    color: Rgb<u8>,
    scale: PxScale,
}

impl LabelOverlay {
    pub fn new(font: Option<FontVec>) -> Self {
        Self {
            font,
            color: LABEL_COLOR_BGR,
            scale: PxScale::from(LABEL_SCALE),
        }
    }

    /// Use a system font; without one, frames are shown unlabelled
    pub fn with_system_font() -> Self {
        let font = load_system_font();
        if font.is_none() {
            warn!("No system font found, labels will not be drawn on frames");
        }
        Self::new(font)
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// Draw `label` with its baseline at [`LABEL_ORIGIN`]
    pub fn draw(&self, frame: &mut RgbImage, label: &str) {
        let Some(font) = &self.font else {
            return;
        };

        let (x, baseline) = LABEL_ORIGIN;
        // draw_text_mut positions the top of the glyph box
        let y = baseline - (self.scale.y * 0.75) as i32;
        draw_text_mut(frame, self.color, x, y.max(0), self.scale, font, label);
    }
}
