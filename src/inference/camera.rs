//! GStreamer camera capture and display window
//!
//! `GstCamera` pulls BGR frames from a capture device through an appsink;
//! `GstWindow` pushes frames into an appsrc feeding a video sink. Dropping
//! either one stops its pipeline.

use std::sync::mpsc;
use std::time::Duration;

use gstreamer::prelude::*;
use gstreamer::{self as gst, ElementFactory};
use gstreamer_app::{AppSink, AppSrc};
use gstreamer_video::{NavigationEvent, VideoFormat, VideoInfo};
use tracing::{debug, info, warn};

use super::webcam::{start_owned, BgrFrame, DisplayEvent, FrameDisplay, FrameSource};
use crate::utils::error::{MaskClassifierError, Result};

const BYTES_PER_PIXEL: usize = 3;

fn camera_error(msg: impl std::fmt::Display) -> MaskClassifierError {
    MaskClassifierError::Camera(msg.to_string())
}

fn display_error(msg: impl std::fmt::Display) -> MaskClassifierError {
    MaskClassifierError::Display(msg.to_string())
}

fn init_gstreamer() -> Result<()> {
    gst::init().map_err(|e| MaskClassifierError::Device(format!("GStreamer init failed: {}", e)))
}

/// Copy rows of `row_bytes` out of a buffer whose rows are `stride` bytes apart
fn strip_stride(src: &[u8], row_bytes: usize, stride: usize, height: usize) -> Vec<u8> {
    if stride == row_bytes {
        return src.iter().take(row_bytes * height).copied().collect();
    }

    let mut out = Vec::with_capacity(row_bytes * height);
    for row in 0..height {
        let start = row * stride;
        let end = (start + row_bytes).min(src.len());
        if start < end {
            out.extend_from_slice(&src[start..end]);
        }
        out.resize((row + 1) * row_bytes, 0);
    }
    out
}

/// Lay tightly packed rows out `stride` bytes apart
fn pad_stride(src: &[u8], row_bytes: usize, stride: usize, height: usize) -> Vec<u8> {
    if stride == row_bytes {
        return src.to_vec();
    }

    let mut out = vec![0u8; stride * height];
    for (row, chunk) in src.chunks(row_bytes).take(height).enumerate() {
        out[row * stride..row * stride + chunk.len()].copy_from_slice(chunk);
    }
    out
}

fn plane_stride(info: &VideoInfo) -> usize {
    let row_bytes = info.width() as usize * BYTES_PER_PIXEL;
    info.stride()
        .first()
        .map(|&s| s as usize)
        .unwrap_or(row_bytes)
}

fn bgr_caps() -> gst::Caps {
    gst::Caps::builder("video/x-raw")
        .field("format", "BGR")
        .build()
}

/// Capture device read through `v4l2src` (Linux) or `autovideosrc`
pub struct GstCamera {
    pipeline: gst::Pipeline,
    appsink: AppSink,
    timeout: gst::ClockTime,
}

impl GstCamera {
    /// Open capture device `device_index` and start streaming
    pub fn open(device_index: u32, read_timeout: Duration) -> Result<Self> {
        init_gstreamer()?;

        let pipeline = gst::Pipeline::new();
        let source = Self::make_source(device_index)?;
        let convert = ElementFactory::make("videoconvert")
            .name("camera_convert")
            .build()
            .map_err(camera_error)?;

        let appsink = AppSink::builder()
            .caps(&bgr_caps())
            .max_buffers(1)
            .drop(true)
            .sync(false)
            .build();

        pipeline
            .add_many(&[&source, &convert, appsink.upcast_ref::<gst::Element>()])
            .map_err(camera_error)?;
        gst::Element::link_many(&[&source, &convert, appsink.upcast_ref::<gst::Element>()])
            .map_err(camera_error)?;

        let camera = Self {
            pipeline,
            appsink,
            timeout: gst::ClockTime::from_mseconds(read_timeout.as_millis() as u64),
        };
        let camera = start_owned(camera, |camera| {
            camera
                .pipeline
                .set_state(gst::State::Playing)
                .map(|_| ())
                .map_err(|e| camera_error(format!("cannot open camera {}: {}", device_index, e)))
        })?;

        info!("Camera {} opened", device_index);
        Ok(camera)
    }

    #[cfg(target_os = "linux")]
    fn make_source(device_index: u32) -> Result<gst::Element> {
        ElementFactory::make("v4l2src")
            .name("camera_source")
            .property("device", format!("/dev/video{}", device_index))
            .build()
            .map_err(camera_error)
    }

    #[cfg(not(target_os = "linux"))]
    fn make_source(device_index: u32) -> Result<gst::Element> {
        if device_index != 0 {
            warn!("autovideosrc ignores device index {}", device_index);
        }
        ElementFactory::make("autovideosrc")
            .name("camera_source")
            .build()
            .map_err(camera_error)
    }

    fn sample_to_frame(sample: &gst::Sample) -> Result<BgrFrame> {
        let buffer = sample.buffer().ok_or_else(|| camera_error("sample without buffer"))?;
        let caps = sample.caps().ok_or_else(|| camera_error("sample without caps"))?;
        let info = VideoInfo::from_caps(caps).map_err(camera_error)?;
        let map = buffer.map_readable().map_err(camera_error)?;

        let (width, height) = (info.width(), info.height());
        let row_bytes = width as usize * BYTES_PER_PIXEL;
        let bytes = strip_stride(map.as_slice(), row_bytes, plane_stride(&info), height as usize);

        BgrFrame::from_raw(width, height, bytes)
            .ok_or_else(|| camera_error(format!("frame of {}x{} has the wrong size", width, height)))
    }
}

impl FrameSource for GstCamera {
    fn read_frame(&mut self) -> Option<BgrFrame> {
        let Some(sample) = self.appsink.try_pull_sample(self.timeout) else {
            warn!("No frame from camera within {}", self.timeout);
            return None;
        };

        match Self::sample_to_frame(&sample) {
            Ok(frame) => Some(frame),
            Err(e) => {
                warn!("Dropping camera stream: {}", e);
                None
            }
        }
    }
}

impl Drop for GstCamera {
    fn drop(&mut self) {
        if let Err(e) = self.pipeline.set_state(gst::State::Null) {
            warn!("Failed to stop camera pipeline: {}", e);
        }
        debug!("Camera released");
    }
}

/// Window showing BGR frames through `autovideosink`
///
/// Key presses travel upstream from the sink as navigation events and are
/// forwarded to [`FrameDisplay::poll_event`] over a channel.
pub struct GstWindow {
    pipeline: gst::Pipeline,
    appsrc: AppSrc,
    bus: gst::Bus,
    keys: mpsc::Receiver<char>,
    title: String,
    frame_info: Option<VideoInfo>,
}

impl GstWindow {
    pub fn open(title: &str) -> Result<Self> {
        init_gstreamer()?;

        let pipeline = gst::Pipeline::new();
        let appsrc = AppSrc::builder()
            .is_live(true)
            .do_timestamp(true)
            .format(gst::Format::Time)
            .build();
        let convert = ElementFactory::make("videoconvert")
            .name("window_convert")
            .build()
            .map_err(display_error)?;
        let sink = ElementFactory::make("autovideosink")
            .name("window_sink")
            .build()
            .map_err(display_error)?;

        pipeline
            .add_many(&[appsrc.upcast_ref::<gst::Element>(), &convert, &sink])
            .map_err(display_error)?;
        gst::Element::link_many(&[appsrc.upcast_ref::<gst::Element>(), &convert, &sink])
            .map_err(display_error)?;

        let (tx, keys) = mpsc::channel();
        let src_pad = appsrc
            .static_pad("src")
            .ok_or_else(|| display_error("appsrc has no src pad"))?;
        src_pad.add_probe(gst::PadProbeType::EVENT_UPSTREAM, move |_pad, probe_info| {
            if let Some(gst::PadProbeData::Event(ref event)) = probe_info.data {
                if let Ok(NavigationEvent::KeyPress { key, .. }) = NavigationEvent::parse(event) {
                    let mut chars = key.chars();
                    if let (Some(c), None) = (chars.next(), chars.next()) {
                        let _ = tx.send(c);
                    }
                }
            }
            gst::PadProbeReturn::Ok
        });

        let bus = pipeline
            .bus()
            .ok_or_else(|| display_error("pipeline has no bus"))?;

        let window = Self {
            pipeline,
            appsrc,
            bus,
            keys,
            title: title.to_string(),
            frame_info: None,
        };
        start_owned(window, |window| {
            window
                .pipeline
                .set_state(gst::State::Playing)
                .map(|_| ())
                .map_err(|e| display_error(format!("cannot open window: {}", e)))
        })
    }

    /// Negotiate caps for the frame size and send the window title
    fn configure(&mut self, width: u32, height: u32) -> Result<VideoInfo> {
        let info = VideoInfo::builder(VideoFormat::Bgr, width, height)
            .fps(gst::Fraction::new(0, 1))
            .build()
            .map_err(display_error)?;
        let caps = info.to_caps().map_err(display_error)?;
        self.appsrc.set_caps(Some(&caps));

        let mut tags = gst::TagList::new();
        if let Some(tags) = tags.get_mut() {
            tags.add::<gst::tags::Title>(&self.title.as_str(), gst::TagMergeMode::Replace);
        }
        self.appsrc.send_event(gst::event::Tag::new(tags));

        debug!("Window configured for {}x{} frames", width, height);
        self.frame_info = Some(info.clone());
        Ok(info)
    }
}

impl FrameDisplay for GstWindow {
    fn show(&mut self, frame: &BgrFrame) -> Result<()> {
        let info = match &self.frame_info {
            Some(info) if info.width() == frame.width() && info.height() == frame.height() => {
                info.clone()
            }
            _ => self.configure(frame.width(), frame.height())?,
        };

        let row_bytes = frame.width() as usize * BYTES_PER_PIXEL;
        let bytes = pad_stride(
            frame.as_bytes(),
            row_bytes,
            plane_stride(&info),
            frame.height() as usize,
        );

        self.appsrc
            .push_buffer(gst::Buffer::from_mut_slice(bytes))
            .map_err(|e| display_error(format!("cannot show frame: {:?}", e)))?;
        Ok(())
    }

    fn poll_event(&mut self) -> DisplayEvent {
        if let Some(msg) = self
            .bus
            .pop_filtered(&[gst::MessageType::Eos, gst::MessageType::Error])
        {
            if let gst::MessageView::Error(err) = msg.view() {
                debug!("Window pipeline error: {}", err.error());
            }
            return DisplayEvent::Closed;
        }

        match self.keys.try_recv() {
            Ok(key) => DisplayEvent::Key(key),
            Err(_) => DisplayEvent::None,
        }
    }
}

impl Drop for GstWindow {
    fn drop(&mut self) {
        let _ = self.appsrc.end_of_stream();
        if let Err(e) = self.pipeline.set_state(gst::State::Null) {
            warn!("Failed to stop window pipeline: {}", e);
        }
        debug!("Window closed");
    }
}
