//! Pipeline metrics: Prometheus helpers and an in-memory run summary.

use std::collections::BTreeMap;

use contracts::ViolationKind;
use metrics::{counter, histogram};

/// Record one detector call for a camera.
///
/// `outcome` carries the failure reason (`timeout`, `transport`, `status`, ...).
pub fn record_detection(camera_id: &str, latency_ms: f64, outcome: Result<(), &str>) {
    histogram!(
        "traffic_monitor_detection_latency_ms",
        "camera_id" => camera_id.to_string()
    )
    .record(latency_ms);

    if let Err(reason) = outcome {
        counter!(
            "traffic_monitor_detection_failures_total",
            "camera_id" => camera_id.to_string(),
            "reason" => reason.to_string()
        )
        .increment(1);
    }
}

pub fn record_lane_flush(camera_id: &str) {
    counter!(
        "traffic_monitor_lane_flushes_total",
        "camera_id" => camera_id.to_string()
    )
    .increment(1);
}

/// Per-camera counters kept by the aggregator
#[derive(Debug, Clone, Default)]
struct CameraTotals {
    frames: u64,
    placeholders: u64,
    detection_failures: u64,
    violations: BTreeMap<ViolationKind, u64>,
    lane_flushes: u64,
    detection_latency: RunningStats,
}

/// Aggregates pipeline activity in memory for the end-of-run summary.
#[derive(Debug, Clone, Default)]
pub struct MonitorMetricsAggregator {
    cameras: BTreeMap<String, CameraTotals>,
}

impl MonitorMetricsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    fn camera(&mut self, camera_id: &str) -> &mut CameraTotals {
        self.cameras.entry(camera_id.to_string()).or_default()
    }

    /// Count a processed frame; placeholders are counted separately.
    pub fn record_frame(&mut self, camera_id: &str, placeholder: bool) {
        let totals = self.camera(camera_id);
        totals.frames += 1;
        if placeholder {
            totals.placeholders += 1;
        }
    }

    pub fn record_detection(&mut self, camera_id: &str, latency_ms: f64, ok: bool) {
        let totals = self.camera(camera_id);
        totals.detection_latency.push(latency_ms);
        if !ok {
            totals.detection_failures += 1;
        }
    }

    pub fn record_violation(&mut self, camera_id: &str, kind: ViolationKind) {
        *self.camera(camera_id).violations.entry(kind).or_insert(0) += 1;
    }

    pub fn record_lane_flush(&mut self, camera_id: &str) {
        self.camera(camera_id).lane_flushes += 1;
    }

    /// Fold another aggregator (e.g. one per pipeline) into this one.
    pub fn merge(&mut self, other: &MonitorMetricsAggregator) {
        for (camera_id, theirs) in &other.cameras {
            let ours = self.camera(camera_id);
            ours.frames += theirs.frames;
            ours.placeholders += theirs.placeholders;
            ours.detection_failures += theirs.detection_failures;
            ours.lane_flushes += theirs.lane_flushes;
            for (kind, n) in &theirs.violations {
                *ours.violations.entry(*kind).or_insert(0) += n;
            }
            ours.detection_latency.merge(&theirs.detection_latency);
        }
    }

    pub fn summary(&self) -> MetricsSummary {
        let cameras: Vec<CameraSummary> = self
            .cameras
            .iter()
            .map(|(camera_id, t)| CameraSummary {
                camera_id: camera_id.clone(),
                frames: t.frames,
                placeholders: t.placeholders,
                detection_failures: t.detection_failures,
                failure_rate: if t.detection_latency.count() > 0 {
                    t.detection_failures as f64 / t.detection_latency.count() as f64 * 100.0
                } else {
                    0.0
                },
                violations: t.violations.iter().map(|(k, n)| (k.as_str(), *n)).collect(),
                lane_flushes: t.lane_flushes,
                detection_latency_ms: StatsSummary::from(&t.detection_latency),
            })
            .collect();
        MetricsSummary {
            total_frames: cameras.iter().map(|c| c.frames).sum(),
            total_violations: cameras
                .iter()
                .flat_map(|c| c.violations.values())
                .sum(),
            cameras,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[derive(Debug, Clone, Default)]
pub struct CameraSummary {
    pub camera_id: String,
    pub frames: u64,
    pub placeholders: u64,
    pub detection_failures: u64,
    /// Percent of detector calls that failed
    pub failure_rate: f64,
    pub violations: BTreeMap<&'static str, u64>,
    pub lane_flushes: u64,
    pub detection_latency_ms: StatsSummary,
}

#[derive(Debug, Clone, Default)]
pub struct MetricsSummary {
    pub total_frames: u64,
    pub total_violations: u64,
    pub cameras: Vec<CameraSummary>,
}

impl std::fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Traffic Monitor Summary ===")?;
        writeln!(f, "Total frames: {}", self.total_frames)?;
        writeln!(f, "Total violations: {}", self.total_violations)?;
        for cam in &self.cameras {
            writeln!(f, "Camera {}:", cam.camera_id)?;
            writeln!(
                f,
                "  frames: {} ({} placeholders)",
                cam.frames, cam.placeholders
            )?;
            writeln!(
                f,
                "  detection failures: {} ({:.2}%)",
                cam.detection_failures, cam.failure_rate
            )?;
            writeln!(f, "  detection latency (ms): {}", cam.detection_latency_ms)?;
            writeln!(f, "  lane flushes: {}", cam.lane_flushes)?;
            for (kind, count) in &cam.violations {
                writeln!(f, "  {}: {}", kind, count)?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// Online mean/variance (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);

            let delta = value - self.mean;
            self.mean += delta / self.count as f64;
            let delta2 = value - self.mean;
            self.m2 += delta * delta2;
        }
    }

    /// Combine two partial results (Chan et al. parallel update)
    pub fn merge(&mut self, other: &RunningStats) {
        if other.count == 0 {
            return;
        }
        if self.count == 0 {
            *self = other.clone();
            return;
        }
        let count = self.count + other.count;
        let delta = other.mean - self.mean;
        self.m2 += other.m2 + delta * delta * (self.count * other.count) as f64 / count as f64;
        self.mean += delta * other.count as f64 / count as f64;
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
        self.count = count;
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// Sample variance
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}
