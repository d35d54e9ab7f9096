//! Webcam frame source
//!
//! Wraps an OpenCV `VideoCapture` behind a mutex so the source can be shared
//! as `Arc<dyn FrameSource>`. Grabs are serialized; the main loop is the only
//! steady caller, with the occasional capture command interleaved.

use async_trait::async_trait;
use opencv::prelude::*;
use opencv::videoio;
use parking_lot::Mutex;
use tracing::{debug, info};

use super::{CameraError, Frame, FrameSource};
use crate::config::CameraConfig;

/// Frame source backed by a local video device.
pub struct CameraSource {
    name: String,
    device: i32,
    capture: Mutex<videoio::VideoCapture>,
}

impl CameraSource {
    /// Open the configured device.
    ///
    /// Fails when the device cannot be opened at all; the requested
    /// resolution is best-effort (the backend may pick the closest mode).
    pub fn open(config: &CameraConfig) -> Result<Self, CameraError> {
        let mut capture = videoio::VideoCapture::new(config.device, videoio::CAP_ANY)?;
        if !capture.is_opened()? {
            return Err(CameraError::Unavailable(config.device));
        }

        capture.set(videoio::CAP_PROP_FRAME_WIDTH, f64::from(config.width))?;
        capture.set(videoio::CAP_PROP_FRAME_HEIGHT, f64::from(config.height))?;

        info!(
            "📷 Camera {} opened ({}x{} requested)",
            config.device, config.width, config.height
        );

        Ok(Self {
            name: format!("camera{}", config.device),
            device: config.device,
            capture: Mutex::new(capture),
        })
    }
}

#[async_trait]
impl FrameSource for CameraSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn grab(&self) -> Result<Frame, CameraError> {
        let mut capture = self.capture.lock();
        let mut frame = Frame::default();
        let ok = capture.read(&mut frame)?;
        if !ok || frame.size()?.width == 0 {
            debug!("Camera {} returned an empty frame", self.device);
            return Err(CameraError::ReadFailed("empty frame".to_string()));
        }
        Ok(frame)
    }
}

/// Probe device indices `0..max_index` and return those that open.
///
/// Opening a device is the only portable way to tell whether it exists, so
/// this is slow and intended for the `--list-cameras` one-shot mode only.
pub fn probe_cameras(max_index: i32) -> Vec<i32> {
    let mut found = Vec::new();
    for index in 0..max_index {
        match videoio::VideoCapture::new(index, videoio::CAP_ANY) {
            Ok(capture) => {
                if capture.is_opened().unwrap_or(false) {
                    found.push(index);
                }
            }
            Err(e) => debug!("Probe of camera {} failed: {}", index, e),
        }
    }
    found
}
