//! Synthetic camera for demos and tests.

use std::thread;
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use contracts::{CameraId, ContractError, Frame, FrameSource};

use super::{flag, frame_interval, split_query};

const GRAY: u8 = 96;

/// Uniform gray frames with capture times on a virtual clock.
///
/// Frame `i` is stamped `start + i * interval`, so long scenarios run as fast
/// as the pipeline consumes them unless `realtime` pacing is enabled. With a
/// frame limit the source behaves like a camera that drops off the network:
/// reads fail after the last frame and it cannot be reopened.
#[derive(Debug)]
pub struct SyntheticFrameSource {
    camera_id: CameraId,
    width: u32,
    height: u32,
    interval: Duration,
    max_frames: Option<u64>,
    realtime: bool,
    pixels: Bytes,
    start: Option<DateTime<Utc>>,
    produced: u64,
    opened: bool,
}

impl SyntheticFrameSource {
    pub fn new(camera_id: CameraId, width: u32, height: u32, interval: Duration) -> Self {
        Self {
            camera_id,
            width,
            height,
            interval,
            max_frames: None,
            realtime: false,
            pixels: Bytes::from(vec![GRAY; width as usize * height as usize * 3]),
            start: None,
            produced: 0,
            opened: false,
        }
    }

    pub fn with_max_frames(mut self, frames: u64) -> Self {
        self.max_frames = Some(frames);
        self
    }

    pub fn with_realtime(mut self, realtime: bool) -> Self {
        self.realtime = realtime;
        self
    }

    /// Start the virtual clock at `start` instead of the first open time.
    pub fn starting_at(mut self, start: DateTime<Utc>) -> Self {
        self.start = Some(start);
        self
    }

    /// Parse the part after `mock://`, e.g. `640x480?fps=10&frames=100`.
    pub fn from_uri(camera_id: CameraId, rest: &str) -> Result<Self, String> {
        let (dims, params) = split_query(rest);
        let (w, h) = dims
            .split_once('x')
            .ok_or_else(|| format!("expected <width>x<height>, got '{dims}'"))?;
        let width: u32 = w.parse().map_err(|_| format!("bad width '{w}'"))?;
        let height: u32 = h.parse().map_err(|_| format!("bad height '{h}'"))?;
        if width == 0 || height == 0 {
            return Err("frame dimensions must be non-zero".to_string());
        }
        let mut source = Self::new(camera_id, width, height, frame_interval(&params, 25.0)?)
            .with_realtime(flag(&params, "realtime"));
        if let Some(n) = params.get("frames") {
            source = source.with_max_frames(n.parse().map_err(|_| format!("bad frames '{n}'"))?);
        }
        Ok(source)
    }

    fn exhausted(&self) -> bool {
        self.max_frames.is_some_and(|max| self.produced >= max)
    }

    pub fn produced(&self) -> u64 {
        self.produced
    }
}

impl FrameSource for SyntheticFrameSource {
    fn describe(&self) -> String {
        format!("mock://{}x{}", self.width, self.height)
    }

    fn open(&mut self) -> Result<(), ContractError> {
        if self.exhausted() {
            return Err(ContractError::capture_open(
                self.camera_id.as_str(),
                "synthetic stream ended",
            ));
        }
        self.start.get_or_insert_with(Utc::now);
        self.opened = true;
        Ok(())
    }

    fn read(&mut self) -> Result<Frame, ContractError> {
        if !self.opened {
            return Err(ContractError::capture_read(self.camera_id.as_str(), "source not opened"));
        }
        if self.exhausted() {
            self.opened = false;
            return Err(ContractError::capture_read(
                self.camera_id.as_str(),
                "synthetic stream ended",
            ));
        }
        if self.realtime && self.produced > 0 {
            thread::sleep(self.interval);
        }
        let start = self.start.unwrap_or_else(Utc::now);
        let offset = self.interval.saturating_mul(self.produced as u32);
        let captured_at = start
            + chrono::Duration::from_std(offset).unwrap_or_else(|_| chrono::Duration::zero());
        self.produced += 1;
        Frame::new(self.width, self.height, self.pixels.clone(), captured_at)
    }

    fn release(&mut self) {
        self.opened = false;
    }

    fn is_opened(&self) -> bool {
        self.opened
    }
}
