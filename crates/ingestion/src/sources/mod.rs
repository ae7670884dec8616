//! Frame source implementations and URI dispatch.
//!
//! - `mock://<w>x<h>?fps=<n>&frames=<n>&realtime=<bool>`: synthetic gray frames
//! - `dir://<path>?fps=<n>&loop=<bool>` or an existing directory: image replay
//! - anything else: OpenCV capture (`opencv-capture` feature)

mod directory;
#[cfg(feature = "opencv-capture")]
mod opencv_capture;
mod synthetic;

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use contracts::{CameraId, FrameSource};
use tracing::debug;

use crate::error::{IngestionError, Result};

pub use directory::DirectoryReplaySource;
#[cfg(feature = "opencv-capture")]
pub use opencv_capture::OpenCvSource;
pub use synthetic::SyntheticFrameSource;

/// Build the frame source for a camera's `source` string.
pub fn open_frame_source(camera_id: &CameraId, uri: &str) -> Result<Box<dyn FrameSource>> {
    let uri = uri.trim();
    let source: Box<dyn FrameSource> = if let Some(rest) = uri.strip_prefix("mock://") {
        Box::new(SyntheticFrameSource::from_uri(camera_id.clone(), rest).map_err(|m| {
            IngestionError::invalid_source(uri, m)
        })?)
    } else if let Some(rest) = uri.strip_prefix("dir://") {
        Box::new(DirectoryReplaySource::from_uri(camera_id.clone(), rest).map_err(|m| {
            IngestionError::invalid_source(uri, m)
        })?)
    } else if Path::new(uri).is_dir() {
        Box::new(DirectoryReplaySource::new(camera_id.clone(), uri))
    } else {
        capture_backend(camera_id, uri)?
    };
    debug!(camera_id = %camera_id, source = %source.describe(), "Frame source selected");
    Ok(source)
}

#[cfg(feature = "opencv-capture")]
fn capture_backend(camera_id: &CameraId, uri: &str) -> Result<Box<dyn FrameSource>> {
    Ok(Box::new(OpenCvSource::new(camera_id.clone(), uri)))
}

#[cfg(not(feature = "opencv-capture"))]
fn capture_backend(_camera_id: &CameraId, uri: &str) -> Result<Box<dyn FrameSource>> {
    Err(IngestionError::unsupported_source(
        uri,
        "built without the `opencv-capture` feature",
    ))
}

/// `a=1&b=x` query parameters following the first `?`.
pub(crate) fn split_query(rest: &str) -> (&str, HashMap<&str, &str>) {
    match rest.split_once('?') {
        Some((path, query)) => (
            path,
            query
                .split('&')
                .filter(|kv| !kv.is_empty())
                .map(|kv| kv.split_once('=').unwrap_or((kv, "")))
                .collect(),
        ),
        None => (rest, HashMap::new()),
    }
}

/// Frame interval from `interval_ms` or `fps`, falling back to `default_fps`.
pub(crate) fn frame_interval(
    params: &HashMap<&str, &str>,
    default_fps: f64,
) -> std::result::Result<Duration, String> {
    if let Some(ms) = params.get("interval_ms") {
        let ms: u64 = ms
            .parse()
            .map_err(|_| format!("interval_ms '{ms}' is not an integer"))?;
        return Ok(Duration::from_millis(ms.max(1)));
    }
    let fps = match params.get("fps") {
        Some(v) => v
            .parse::<f64>()
            .map_err(|_| format!("fps '{v}' is not a number"))?,
        None => default_fps,
    };
    if !(fps > 0.0 && fps.is_finite()) {
        return Err(format!("fps must be positive, got {fps}"));
    }
    Ok(Duration::from_secs_f64(1.0 / fps))
}

pub(crate) fn flag(params: &HashMap<&str, &str>, key: &str) -> bool {
    params
        .get(key)
        .is_some_and(|v| matches!(*v, "" | "1" | "true" | "yes"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_parsing() {
        let (path, params) = split_query("640x480?fps=10&frames=3&realtime");
        assert_eq!(path, "640x480");
        assert_eq!(params["fps"], "10");
        assert!(flag(&params, "realtime"));
        assert!(!flag(&params, "loop"));
        assert_eq!(frame_interval(&params, 25.0).unwrap(), Duration::from_millis(100));
    }

    #[test]
    fn test_interval_overrides_fps() {
        let (_, params) = split_query("x?interval_ms=600&fps=10");
        assert_eq!(frame_interval(&params, 25.0).unwrap(), Duration::from_millis(600));
        let (_, bad) = split_query("x?fps=0");
        assert!(frame_interval(&bad, 25.0).is_err());
    }

    #[test]
    fn test_dispatch_by_scheme() {
        let id = CameraId::new("0");
        assert!(open_frame_source(&id, "mock://32x24").is_ok());
        assert!(matches!(
            open_frame_source(&id, "mock://wide"),
            Err(IngestionError::InvalidSource { .. })
        ));
        let dir = tempfile::tempdir().unwrap();
        let source = open_frame_source(&id, dir.path().to_str().unwrap()).unwrap();
        assert!(source.describe().starts_with("dir://"));
    }

    #[cfg(not(feature = "opencv-capture"))]
    #[test]
    fn test_stream_urls_need_capture_backend() {
        let id = CameraId::new("0");
        assert!(matches!(
            open_frame_source(&id, "rtsp://10.0.0.21/stream1"),
            Err(IngestionError::UnsupportedSource { .. })
        ));
    }
}
