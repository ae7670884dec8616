//! Run statistics.

use std::time::Duration;

use contracts::{CameraEvent, CameraEventKind, CameraStatus};
use dispatcher::MetricsSnapshot;
use observability::MonitorMetricsAggregator;

/// Statistics from a monitor run
#[derive(Debug, Clone, Default)]
pub struct RunStats {
    pub cameras_configured: usize,
    pub cameras_started: usize,

    /// Cameras whose capture ended with an error
    pub failed_cameras: Vec<(String, String)>,

    pub frames_captured: u64,

    /// Captures replaced before the consumer took them
    pub frames_overwritten: u64,

    pub reconnects: u64,

    pub offline_events: u64,
    pub error_events: u64,

    pub duration: Duration,

    /// Per-camera analysis metrics
    pub metrics: MonitorMetricsAggregator,

    /// Per-sink write metrics
    pub sinks: Vec<(String, MetricsSnapshot)>,
}

impl RunStats {
    pub fn record_event(&mut self, event: &CameraEvent) {
        match event.kind {
            CameraEventKind::Status(CameraStatus::Offline) => self.offline_events += 1,
            CameraEventKind::Error(_) => self.error_events += 1,
            _ => {}
        }
    }

    /// Analysed frames per second across all cameras
    pub fn fps(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.metrics.summary().total_frames as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    /// Share of captures never analysed, as percentage
    pub fn overwrite_rate(&self) -> f64 {
        if self.frames_captured > 0 {
            (self.frames_overwritten as f64 / self.frames_captured as f64) * 100.0
        } else {
            0.0
        }
    }

    pub fn print_summary(&self) {
        println!("\n=== Run Statistics ===\n");

        println!("Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!(
            "   ├─ Cameras: {} started / {} configured",
            self.cameras_started, self.cameras_configured
        );
        println!("   ├─ Frames captured: {}", self.frames_captured);
        println!(
            "   ├─ Frames overwritten: {} ({:.2}%)",
            self.frames_overwritten,
            self.overwrite_rate()
        );
        println!("   ├─ Analysed FPS: {:.2}", self.fps());
        println!("   ├─ Reconnects: {}", self.reconnects);
        println!(
            "   └─ Status events: {} offline, {} errors",
            self.offline_events, self.error_events
        );

        if !self.failed_cameras.is_empty() {
            println!("\nFailed cameras");
            for (camera_id, error) in &self.failed_cameras {
                println!("   ├─ {}: {}", camera_id, error);
            }
        }

        if !self.sinks.is_empty() {
            println!("\nSinks");
            for (name, m) in &self.sinks {
                println!(
                    "   ├─ {}: {} violations, {} aggregates, {} failures",
                    name, m.violations, m.aggregates, m.failure_count
                );
            }
        }

        println!("\n{}", self.metrics.summary());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::CameraId;

    #[test]
    fn test_event_counts_and_rates() {
        let mut stats = RunStats {
            frames_captured: 200,
            frames_overwritten: 50,
            ..Default::default()
        };
        let id = CameraId::new("0");
        stats.record_event(&CameraEvent::status(id.clone(), CameraStatus::Offline));
        stats.record_event(&CameraEvent::status(id.clone(), CameraStatus::Online));
        stats.record_event(&CameraEvent::new(id, CameraEventKind::Error("boom".into())));

        assert_eq!(stats.offline_events, 1);
        assert_eq!(stats.error_events, 1);
        assert!((stats.overwrite_rate() - 25.0).abs() < 1e-10);
        assert_eq!(stats.fps(), 0.0);
    }
}
