//! Replays a directory of still images as a camera stream.

use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use chrono::{DateTime, Utc};
use contracts::{CameraId, ContractError, Frame, FrameSource};
use tracing::debug;

use super::{flag, frame_interval, split_query};

const EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// Reads `*.png` / `*.jpg` files in name order.
///
/// Capture times advance by the frame interval from the open time. Without
/// `loop` the stream fails after the last file, like a video file reaching
/// its end; reopening starts from the first file again.
#[derive(Debug)]
pub struct DirectoryReplaySource {
    camera_id: CameraId,
    dir: PathBuf,
    interval: Duration,
    looping: bool,
    realtime: bool,
    files: Vec<PathBuf>,
    position: usize,
    start: Option<DateTime<Utc>>,
    produced: u64,
    opened: bool,
}

impl DirectoryReplaySource {
    pub fn new(camera_id: CameraId, dir: impl AsRef<Path>) -> Self {
        Self {
            camera_id,
            dir: dir.as_ref().to_path_buf(),
            interval: Duration::from_millis(40),
            looping: false,
            realtime: false,
            files: Vec::new(),
            position: 0,
            start: None,
            produced: 0,
            opened: false,
        }
    }

    /// Parse the part after `dir://`, e.g. `/data/cam0?fps=10&loop=true`.
    pub fn from_uri(camera_id: CameraId, rest: &str) -> Result<Self, String> {
        let (path, params) = split_query(rest);
        if path.is_empty() {
            return Err("empty directory path".to_string());
        }
        let mut source = Self::new(camera_id, path);
        source.interval = frame_interval(&params, 25.0)?;
        source.looping = flag(&params, "loop");
        source.realtime = flag(&params, "realtime");
        Ok(source)
    }

    pub fn with_looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    fn list_images(&self) -> std::io::Result<Vec<PathBuf>> {
        let mut files: Vec<PathBuf> = fs::read_dir(&self.dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| {
                p.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
            })
            .collect();
        files.sort();
        Ok(files)
    }

    fn next_timestamp(&self) -> DateTime<Utc> {
        let start = self.start.unwrap_or_else(Utc::now);
        let offset = self.interval.saturating_mul(self.produced as u32);
        start + chrono::Duration::from_std(offset).unwrap_or_else(|_| chrono::Duration::zero())
    }
}

impl FrameSource for DirectoryReplaySource {
    fn describe(&self) -> String {
        format!("dir://{}", self.dir.display())
    }

    fn open(&mut self) -> Result<(), ContractError> {
        let files = self
            .list_images()
            .map_err(|e| ContractError::capture_open(self.camera_id.as_str(), e.to_string()))?;
        if files.is_empty() {
            return Err(ContractError::capture_open(
                self.camera_id.as_str(),
                format!("no images in {}", self.dir.display()),
            ));
        }
        debug!(camera_id = %self.camera_id, files = files.len(), "Replay directory opened");
        self.files = files;
        self.position = 0;
        self.start.get_or_insert_with(Utc::now);
        self.opened = true;
        Ok(())
    }

    fn read(&mut self) -> Result<Frame, ContractError> {
        if !self.opened {
            return Err(ContractError::capture_read(self.camera_id.as_str(), "source not opened"));
        }
        if self.position >= self.files.len() {
            if !self.looping {
                self.opened = false;
                return Err(ContractError::capture_read(
                    self.camera_id.as_str(),
                    "end of replay directory",
                ));
            }
            self.position = 0;
        }
        if self.realtime && self.produced > 0 {
            thread::sleep(self.interval);
        }

        let path = &self.files[self.position];
        let image = image::open(path)
            .map_err(|e| {
                ContractError::capture_read(
                    self.camera_id.as_str(),
                    format!("{}: {e}", path.display()),
                )
            })?
            .to_rgb8();
        let frame = Frame::from_image(image, self.next_timestamp());
        self.position += 1;
        self.produced += 1;
        Ok(frame)
    }

    fn release(&mut self) {
        self.opened = false;
    }

    fn is_opened(&self) -> bool {
        self.opened
    }
}
