//! Camera producer: capture loop with reconnect state machine.
//!
//! ```text
//! Connecting ──open ok──▶ Streaming ──read error──▶ Interrupted
//!     │                      ▲                         │
//!  open error                └──────open ok──── Reconnecting ◀─┘
//!     ▼                                              (retries until stopped)
//!  Stopped ◀────────────── stop requested (any state)
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

use async_channel::Sender;
use chrono::{DateTime, Utc};
use contracts::{
    CameraConfig, CameraEvent, CameraEventKind, CameraStatus, Frame, FrameSource, PreviewCallback,
};
use metrics::{counter, gauge};
use tracing::{debug, info, instrument, warn};

use crate::config::{IngestionMetrics, WorkerSettings};
use crate::error::Result;
use crate::mailbox::Mailbox;
use crate::overlay::mask_roi;

/// Producer state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Connecting,
    Streaming,
    Interrupted,
    Reconnecting,
    Stopped,
}

/// One capture handed to the consumer.
#[derive(Debug, Clone)]
pub struct CaptureSnapshot {
    /// Camera configuration the frame was captured under
    pub camera: Arc<CameraConfig>,
    /// ROI-masked frame with the ROI outline, fed to detection
    pub visible: Frame,
    /// Unmodified frame, used for still captures and image rules
    pub raw: Frame,
    /// Increases by one per published snapshot
    pub sequence: u64,
    /// Black frame published while the camera is disconnected
    pub placeholder: bool,
}

/// Stop and pause switches shared between a worker and its owner.
#[derive(Debug)]
pub struct WorkerControl {
    stop: Mutex<bool>,
    stop_signal: Condvar,
    paused: AtomicBool,
    state: Mutex<WorkerState>,
}

impl Default for WorkerControl {
    fn default() -> Self {
        Self {
            stop: Mutex::new(false),
            stop_signal: Condvar::new(),
            paused: AtomicBool::new(false),
            state: Mutex::new(WorkerState::Connecting),
        }
    }
}

impl WorkerControl {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn request_stop(&self) {
        *self.stop.lock().unwrap_or_else(PoisonError::into_inner) = true;
        self.stop_signal.notify_all();
    }

    pub fn is_stop_requested(&self) -> bool {
        *self.stop.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sleep up to `timeout`, returning early with `true` if a stop is requested.
    pub fn wait_stop(&self, timeout: Duration) -> bool {
        let guard = self.stop.lock().unwrap_or_else(PoisonError::into_inner);
        let (guard, _) = self
            .stop_signal
            .wait_timeout_while(guard, timeout, |stopped| !*stopped)
            .unwrap_or_else(PoisonError::into_inner);
        *guard
    }

    /// Freeze or resume the preview. Analysis continues while paused.
    pub fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::Relaxed);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Relaxed)
    }

    pub fn state(&self) -> WorkerState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: WorkerState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }
}

pub struct CameraWorker {
    camera: Arc<CameraConfig>,
    source: Box<dyn FrameSource>,
    mailbox: Arc<Mailbox<CaptureSnapshot>>,
    events: Sender<CameraEvent>,
    preview: Option<PreviewCallback>,
    control: Arc<WorkerControl>,
    settings: WorkerSettings,
    metrics: Arc<IngestionMetrics>,
    roi_px: Option<(u32, u32, [(f64, f64); 4])>,
    last_capture: Option<(u32, u32, DateTime<Utc>)>,
    sequence: u64,
}

impl CameraWorker {
    pub fn new(
        camera: Arc<CameraConfig>,
        source: Box<dyn FrameSource>,
        mailbox: Arc<Mailbox<CaptureSnapshot>>,
        events: Sender<CameraEvent>,
        control: Arc<WorkerControl>,
        settings: WorkerSettings,
    ) -> Self {
        Self {
            camera,
            source,
            mailbox,
            events,
            preview: None,
            control,
            settings,
            metrics: Arc::new(IngestionMetrics::new()),
            roi_px: None,
            last_capture: None,
            sequence: 0,
        }
    }

    pub fn with_preview(mut self, preview: PreviewCallback) -> Self {
        self.preview = Some(preview);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<IngestionMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> Arc<IngestionMetrics> {
        self.metrics.clone()
    }

    /// Run until stopped. Closes the mailbox on exit so the consumer winds down.
    ///
    /// # Errors
    /// The first open failure; the camera never streams in that case.
    #[instrument(
        name = "camera_worker",
        skip(self),
        fields(camera_id = %self.camera.id, source = %self.source.describe())
    )]
    pub fn run(mut self) -> Result<()> {
        self.control.set_state(WorkerState::Connecting);
        if let Err(e) = self.source.open() {
            warn!(camera_id = %self.camera.id, error = %e, "Camera source could not be opened");
            self.emit(CameraEventKind::Status(CameraStatus::Offline));
            self.emit(CameraEventKind::Error(e.to_string()));
            self.finish();
            return Err(e.into());
        }
        info!(camera_id = %self.camera.id, "Camera online");
        self.set_online(true);

        loop {
            self.control.set_state(WorkerState::Streaming);
            self.stream();
            if self.control.is_stop_requested() {
                break;
            }

            self.control.set_state(WorkerState::Interrupted);
            self.set_online(false);
            self.publish_placeholder();
            self.source.release();

            self.control.set_state(WorkerState::Reconnecting);
            if !self.reconnect() {
                break;
            }
            self.metrics.record_reconnect();
            counter!("traffic_monitor_camera_reconnects_total", "camera_id" => self.camera.id.to_string())
                .increment(1);
            info!(camera_id = %self.camera.id, "Camera reconnected");
            self.set_online(true);
        }

        self.finish();
        Ok(())
    }

    /// Read and publish until a read fails or a stop is requested.
    fn stream(&mut self) {
        while !self.control.is_stop_requested() {
            let frame = match self.source.read() {
                Ok(frame) => frame,
                Err(e) => {
                    self.metrics.record_read_failure();
                    warn!(camera_id = %self.camera.id, error = %e, "Frame read failed, camera interrupted");
                    return;
                }
            };
            self.metrics.record_captured();
            counter!("traffic_monitor_frames_captured_total", "camera_id" => self.camera.id.to_string())
                .increment(1);
            self.last_capture = Some((frame.width, frame.height, frame.captured_at));

            let visible = self.visible_frame(&frame);
            if let Some(preview) = &self.preview {
                if !self.control.is_paused() {
                    preview(&visible);
                }
            }
            self.publish(visible, frame, false);
            self.mailbox.wait_for_consumer(self.settings.handoff_timeout);
        }
    }

    /// Retry `open` until it succeeds (`true`) or a stop is requested (`false`).
    fn reconnect(&mut self) -> bool {
        let mut attempt = 0u64;
        loop {
            if self.control.is_stop_requested() {
                return false;
            }
            attempt += 1;
            match self.source.open() {
                Ok(()) => return true,
                Err(e) => {
                    debug!(camera_id = %self.camera.id, attempt, error = %e, "Reconnect attempt failed");
                }
            }
            if self.control.wait_stop(self.settings.reconnect_delay) {
                return false;
            }
        }
    }

    fn visible_frame(&mut self, frame: &Frame) -> Frame {
        let roi = match self.roi_px {
            Some((w, h, roi)) if w == frame.width && h == frame.height => Some(roi),
            _ => {
                self.roi_px = self
                    .camera
                    .roi_pixels(frame.width, frame.height)
                    .map(|roi| (frame.width, frame.height, roi));
                self.roi_px.map(|(_, _, roi)| roi)
            }
        };
        let Some(roi) = roi else {
            return frame.clone();
        };
        match frame.to_image() {
            Ok(image) => Frame::from_image(mask_roi(&image, &roi), frame.captured_at),
            Err(e) => {
                warn!(camera_id = %self.camera.id, error = %e, "Frame not maskable, publishing as is");
                frame.clone()
            }
        }
    }

    fn publish_placeholder(&mut self) {
        let Some((w, h, at)) = self.last_capture else {
            return;
        };
        let black = Frame::black(w, h, at);
        self.metrics.record_placeholder();
        if let Some(preview) = &self.preview {
            if !self.control.is_paused() {
                preview(&black);
            }
        }
        self.publish(black.clone(), black, true);
    }

    fn publish(&mut self, visible: Frame, raw: Frame, placeholder: bool) {
        self.sequence += 1;
        let snapshot = CaptureSnapshot {
            camera: self.camera.clone(),
            visible,
            raw,
            sequence: self.sequence,
            placeholder,
        };
        if self.mailbox.publish(snapshot) {
            self.metrics.record_overwritten();
            counter!("traffic_monitor_frames_overwritten_total", "camera_id" => self.camera.id.to_string())
                .increment(1);
        }
    }

    fn set_online(&self, online: bool) {
        gauge!("traffic_monitor_camera_online", "camera_id" => self.camera.id.to_string())
            .set(if online { 1.0 } else { 0.0 });
        let status = if online {
            CameraStatus::Online
        } else {
            CameraStatus::Offline
        };
        self.emit(CameraEventKind::Status(status));
    }

    fn emit(&self, kind: CameraEventKind) {
        let event = CameraEvent::new(self.camera.id.clone(), kind);
        // A full or dropped status channel must not stall capture.
        if let Err(e) = self.events.try_send(event) {
            debug!(camera_id = %self.camera.id, error = %e, "Camera event not delivered");
        }
    }

    fn finish(&mut self) {
        self.source.release();
        self.mailbox.close();
        self.control.set_state(WorkerState::Stopped);
        self.emit(CameraEventKind::Stopped);
        debug!(camera_id = %self.camera.id, sequence = self.sequence, "Camera worker stopped");
    }
}
