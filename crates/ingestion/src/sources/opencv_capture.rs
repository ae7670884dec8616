//! OpenCV `VideoCapture` source for RTSP streams, devices and video files.

use chrono::Utc;
use contracts::{CameraId, ContractError, Frame, FrameSource};
use opencv::core::Mat;
use opencv::prelude::*;
use opencv::videoio::{self, VideoCapture};
use tracing::warn;

pub struct OpenCvSource {
    camera_id: CameraId,
    uri: String,
    capture: Option<VideoCapture>,
    frame: Mat,
}

impl OpenCvSource {
    pub fn new(camera_id: CameraId, uri: impl Into<String>) -> Self {
        Self {
            camera_id,
            uri: uri.into(),
            capture: None,
            frame: Mat::default(),
        }
    }

    fn open_capture(&self) -> opencv::Result<VideoCapture> {
        match parse_device_index(&self.uri) {
            Some(index) => VideoCapture::new(index, videoio::CAP_ANY),
            None => VideoCapture::from_file(&self.uri, videoio::CAP_ANY),
        }
    }

    fn read_err(&self, message: impl Into<String>) -> ContractError {
        ContractError::capture_read(self.camera_id.as_str(), message)
    }
}

/// `0`, `1`, ... or `/dev/videoN` map to a device index.
fn parse_device_index(uri: &str) -> Option<i32> {
    uri.parse()
        .ok()
        .or_else(|| uri.strip_prefix("/dev/video").and_then(|n| n.parse().ok()))
}

impl FrameSource for OpenCvSource {
    fn describe(&self) -> String {
        self.uri.clone()
    }

    fn open(&mut self) -> Result<(), ContractError> {
        let open_err = |m: String| ContractError::capture_open(self.camera_id.as_str(), m);
        let capture = self.open_capture().map_err(|e| open_err(e.to_string()))?;
        if !capture.is_opened().map_err(|e| open_err(e.to_string()))? {
            return Err(open_err(format!("cannot open {}", self.uri)));
        }
        self.capture = Some(capture);
        Ok(())
    }

    fn read(&mut self) -> Result<Frame, ContractError> {
        let Some(capture) = self.capture.as_mut() else {
            return Err(self.read_err("source not opened"));
        };
        let grabbed = capture
            .read(&mut self.frame)
            .map_err(|e| ContractError::capture_read(self.camera_id.as_str(), e.to_string()))?;
        let captured_at = Utc::now();
        let size = self.frame.size().map_err(|e| self.read_err(e.to_string()))?;
        if !grabbed || size.width <= 0 || size.height <= 0 {
            return Err(self.read_err("empty frame"));
        }

        // BGR8 -> RGB8
        let mut pixels = self
            .frame
            .data_bytes()
            .map_err(|e| self.read_err(e.to_string()))?
            .to_vec();
        for px in pixels.chunks_exact_mut(3) {
            px.swap(0, 2);
        }
        Frame::new(size.width as u32, size.height as u32, pixels, captured_at)
    }

    fn release(&mut self) {
        if let Some(mut capture) = self.capture.take() {
            if let Err(e) = capture.release() {
                warn!(camera_id = %self.camera_id, error = %e, "VideoCapture release failed");
            }
        }
    }

    fn is_opened(&self) -> bool {
        self.capture
            .as_ref()
            .is_some_and(|c| c.is_opened().unwrap_or(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_index_parsing() {
        assert_eq!(parse_device_index("0"), Some(0));
        assert_eq!(parse_device_index("/dev/video2"), Some(2));
        assert_eq!(parse_device_index("rtsp://10.0.0.21/stream1"), None);
    }
}
