//! Webcam inference loop
//!
//! Reads frames from a [`FrameSource`], classifies each one, draws the label
//! and shows the frame on a [`FrameDisplay`] until the quit key is pressed,
//! the window is closed or the source stops delivering frames.
//!
//! The loop takes ownership of the source and the display. Both are dropped
//! when it returns, whether it ends normally, with an error, or by unwinding,
//! so implementations release the camera and close the window in `Drop`.

use burn::tensor::backend::Backend;
use image::RgbImage;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{LabelOverlay, Predictor};
use crate::model::ImageClassifier;
use crate::utils::error::Result;

/// Key that ends the loop
pub const QUIT_KEY: char = 'q';

/// Title of the display window
pub const WINDOW_TITLE: &str = "Webcam Inference";

/// A captured frame with pixel bytes in BGR order
#[derive(Debug, Clone)]
pub struct BgrFrame(RgbImage);

impl BgrFrame {
    /// Wrap tightly packed BGR bytes; `None` if the length does not match
    pub fn from_raw(width: u32, height: u32, bytes: Vec<u8>) -> Option<Self> {
        RgbImage::from_raw(width, height, bytes).map(Self)
    }

    pub fn width(&self) -> u32 {
        self.0.width()
    }

    pub fn height(&self) -> u32 {
        self.0.height()
    }

    /// Raw BGR bytes, row-major and tightly packed
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_raw()
    }

    /// Mutable access for drawing; channels are in BGR order
    pub fn as_image_mut(&mut self) -> &mut RgbImage {
        &mut self.0
    }

    /// Copy with the channel order swapped to RGB
    pub fn to_rgb(&self) -> RgbImage {
        let mut rgb = self.0.clone();
        for pixel in rgb.pixels_mut() {
            pixel.0.swap(0, 2);
        }
        rgb
    }
}

/// Something that yields frames, such as a camera
pub trait FrameSource {
    /// Next frame, or `None` once no more frames can be read
    fn read_frame(&mut self) -> Option<BgrFrame>;
}

/// User interaction observed by a display since the last poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayEvent {
    None,
    Key(char),
    Closed,
}

/// A window that shows frames
pub trait FrameDisplay {
    fn show(&mut self, frame: &BgrFrame) -> Result<()>;

    /// Non-blocking check for key presses and window closure
    fn poll_event(&mut self) -> DisplayEvent;
}

/// Why the loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    QuitKey,
    StreamEnded,
    WindowClosed,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StopReason::QuitKey => write!(f, "quit key pressed"),
            StopReason::StreamEnded => write!(f, "camera read failed"),
            StopReason::WindowClosed => write!(f, "window closed"),
        }
    }
}

/// Summary of a finished webcam session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebcamOutcome {
    pub frames_processed: usize,
    pub stop_reason: StopReason,
    pub last_label: Option<String>,
}

/// Hand `resource` back once `start` succeeds on it
///
/// On failure the resource is dropped here, so a camera or window that was
/// built but could not be started is still released by its `Drop`.
pub fn start_owned<T>(resource: T, start: impl FnOnce(&T) -> Result<()>) -> Result<T> {
    start(&resource)?;
    Ok(resource)
}

/// Classify frames from `source` and show them on `display` until stopped
///
/// Each iteration reads one frame, converts it to RGB, predicts, draws the
/// label on the original frame and shows it, all in sequence on the calling
/// thread. There is no frame-rate control.
pub fn run_webcam<B, M, S, D>(
    predictor: &Predictor<B, M>,
    mut source: S,
    mut display: D,
    overlay: &LabelOverlay,
) -> Result<WebcamOutcome>
where
    B: Backend,
    M: ImageClassifier<B>,
    S: FrameSource,
    D: FrameDisplay,
{
    println!("Press '{}' to quit.", QUIT_KEY);

    let mut frames_processed = 0;
    let mut last_label = None;

    let stop_reason = loop {
        let Some(mut frame) = source.read_frame() else {
            break StopReason::StreamEnded;
        };

        let result = predictor.predict_rgb(&frame.to_rgb())?;
        debug!(
            "Frame {}: {} ({:.1}%)",
            frames_processed,
            result.label,
            result.confidence * 100.0
        );

        overlay.draw(frame.as_image_mut(), &result.label);
        display.show(&frame)?;

        frames_processed += 1;
        last_label = Some(result.label);

        match display.poll_event() {
            DisplayEvent::Key(key) if key == QUIT_KEY => break StopReason::QuitKey,
            DisplayEvent::Closed => break StopReason::WindowClosed,
            DisplayEvent::Key(_) | DisplayEvent::None => {}
        }
    };

    info!(
        "Webcam loop ended after {} frames: {}",
        frames_processed, stop_reason
    );

    Ok(WebcamOutcome {
        frames_processed,
        stop_reason,
        last_label,
    })
}
