//! Per-camera violation engine.

use std::mem;

use chrono::{DateTime, Utc};
use contracts::{
    CameraConfig, CameraId, Detection, Frame, ObjectClass, TrafficFlow, ViolationEngineConfig,
    ViolationEvent, ViolationKind,
};
use metrics::counter;
use tracing::{debug, instrument, warn};

use crate::foreign_object::ForeignObjectDetector;
use crate::geometry::{estimate_speed_kmh, pixel_distance, LaneGeometry, Point};
use crate::occupancy::LaneOccupancy;
use crate::track::{seconds_between, TrackStore, DIRECTION_SAMPLES};

/// Classifies one camera's tracked detections into violations.
///
/// Owned by a single consumer thread; holds all per-camera state
/// (track history, direction samples, lane occupancy, foreign-object baseline).
#[derive(Debug)]
pub struct ViolationEngine {
    camera_id: CameraId,
    location: String,
    camera: CameraConfig,
    config: ViolationEngineConfig,
    geometry: Option<(u32, u32, LaneGeometry)>,
    tracks: TrackStore,
    occupancy: LaneOccupancy,
    foreign: ForeignObjectDetector,
    frames_processed: u64,
}

impl ViolationEngine {
    pub fn new(camera: &CameraConfig, config: ViolationEngineConfig) -> Self {
        Self {
            camera_id: camera.id.clone(),
            location: camera.zone.clone(),
            camera: camera.clone(),
            tracks: TrackStore::new(config.track_ttl_s, config.max_tracks),
            foreign: ForeignObjectDetector::new(config.foreign_object.clone()),
            occupancy: LaneOccupancy::new(),
            geometry: None,
            frames_processed: 0,
            config,
        }
    }

    /// Run every rule on one frame's detections.
    ///
    /// `frame` must be the frame the detections were computed on; its capture
    /// time drives all elapsed-time rules.
    #[instrument(
        level = "debug",
        name = "violation_engine_process",
        skip(self, frame, detections),
        fields(camera_id = %self.camera_id, detections = detections.len())
    )]
    pub fn process(&mut self, frame: &Frame, detections: &[Detection]) -> Vec<ViolationEvent> {
        self.frames_processed += 1;
        let now = frame.captured_at;
        self.refresh_geometry(frame.width, frame.height);

        let mut events = Vec::new();

        if self.config.foreign_object.enabled && self.check_foreign_object(frame, detections) {
            events.push(self.event(ViolationKind::ForeignObject, None, now, None));
        }

        for det in detections {
            match det.class {
                ObjectClass::Person => {
                    events.push(self.event(ViolationKind::Pedestrian, det.track_id, now, None));
                    continue;
                }
                ObjectClass::Bike => {
                    events.push(self.event(ViolationKind::Motorbike, det.track_id, now, None));
                }
                ObjectClass::Lane => continue,
                _ => {}
            }
            if let Some(track_id) = det.track_id {
                self.apply_track_rules(det, track_id, now, &mut events);
            }
        }

        let refresh = u64::from(self.config.direction_refresh_frames.max(1));
        if self.frames_processed % refresh == 0 {
            let lane_visible = detections.iter().any(|d| d.class == ObjectClass::Lane);
            self.evaluate_directions(lane_visible, now, &mut events);
        }

        let evicted = self.tracks.evict(now);
        if evicted > 0 {
            debug!(camera_id = %self.camera_id, evicted, "Evicted stale tracks");
        }
        for event in &events {
            counter!(
                "traffic_monitor_violations_total",
                "camera_id" => self.camera_id.to_string(),
                "kind" => event.kind.as_str()
            )
            .increment(1);
        }
        events
    }

    pub fn occupancy(&self) -> &LaneOccupancy {
        &self.occupancy
    }

    /// Hand over the current aggregation window and start a fresh one.
    pub fn take_occupancy(&mut self) -> LaneOccupancy {
        mem::take(&mut self.occupancy)
    }

    pub fn geometry(&self) -> Option<&LaneGeometry> {
        self.geometry.as_ref().map(|(_, _, g)| g)
    }

    pub fn tracked(&self) -> usize {
        self.tracks.len()
    }

    fn refresh_geometry(&mut self, width: u32, height: u32) {
        if matches!(self.geometry, Some((w, h, _)) if w == width && h == height) {
            return;
        }
        let goal_ratio = self.config.goal_ratio;
        self.geometry = self
            .camera
            .roi_pixels(width, height)
            .map(|px| (width, height, LaneGeometry::from_pixels(px, goal_ratio)));
        if self.geometry.is_none() {
            warn!(camera_id = %self.camera_id, "ROI does not have 4 corners, geometry rules disabled");
        }
    }

    fn check_foreign_object(&mut self, frame: &Frame, detections: &[Detection]) -> bool {
        let Some((_, _, geometry)) = self.geometry.as_ref() else {
            return false;
        };
        match frame.to_image() {
            Ok(image) => self.foreign.check(&image, geometry, detections),
            Err(e) => {
                warn!(camera_id = %self.camera_id, error = %e, "Frame unusable for foreign object check");
                false
            }
        }
    }

    fn apply_track_rules(
        &mut self,
        det: &Detection,
        track_id: u64,
        now: DateTime<Utc>,
        events: &mut Vec<ViolationEvent>,
    ) {
        let (mx, my) = det.bbox.midpoint();
        let mid = Point::new(mx, my);
        let obs = self.tracks.observe(track_id, det.class, mid, now);

        // Stopped: re-evaluated on every frame the condition holds
        let displacement = pixel_distance(obs.first_point, mid);
        let elapsed = seconds_between(obs.first_time, now);
        if displacement < self.config.stop_distance_px && elapsed > self.config.stop_duration_s {
            events.push(self.event(ViolationKind::Stopped, Some(track_id), now, None));
        }

        // Over-speed: instantaneous speed on every frame inside the speed trap
        let in_trap = self
            .geometry
            .as_ref()
            .is_some_and(|(_, _, g)| g.in_goal(mid));
        if in_trap {
            if let Some((prev_point, prev_time)) = obs.previous {
                let speed = estimate_speed_kmh(
                    pixel_distance(prev_point, mid),
                    seconds_between(prev_time, now),
                    self.config.sensor_size_mm,
                    self.config.focal_length_mm,
                );
                if let Some(speed) = speed.filter(|v| *v >= self.config.speed_limit_kmh) {
                    events.push(self.event(
                        ViolationKind::OverSpeed,
                        Some(track_id),
                        now,
                        Some(speed as u32),
                    ));
                }
            }
        }

        self.tracks.push_direction(track_id, my);

        if let (Some(class), Some((_, _, geometry))) = (det.class.vehicle(), self.geometry.as_ref())
        {
            let lane = geometry.midpoints.side_of(mid);
            self.occupancy.record(lane, class, track_id);
        }
    }

    fn evaluate_directions(
        &mut self,
        lane_visible: bool,
        now: DateTime<Utc>,
        events: &mut Vec<ViolationEvent>,
    ) {
        let flow = self.config.traffic_flow;
        for (track_id, samples) in self.tracks.drain_directions() {
            if lane_visible || samples.len() < DIRECTION_SAMPLES {
                continue;
            }
            if !follows_flow(&samples, flow) {
                events.push(self.event(ViolationKind::WrongDirection, Some(track_id), now, None));
            }
        }
    }

    fn event(
        &self,
        kind: ViolationKind,
        track_id: Option<u64>,
        timestamp: DateTime<Utc>,
        speed: Option<u32>,
    ) -> ViolationEvent {
        ViolationEvent {
            kind,
            camera_id: self.camera_id.clone(),
            location: self.location.clone(),
            track_id,
            timestamp,
            speed,
        }
    }
}

/// Whether vertical samples are ordered the way traffic should move.
fn follows_flow(samples: &[f64], flow: TrafficFlow) -> bool {
    samples.windows(2).all(|w| match flow {
        TrafficFlow::Approaching => w[0] <= w[1],
        TrafficFlow::Receding => w[0] >= w[1],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use contracts::BBox;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap()
    }

    fn camera() -> CameraConfig {
        CameraConfig {
            id: "0".into(),
            name: "north".into(),
            zone: "Km 12".into(),
            source: "mock://640x480".into(),
            roi: vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]],
            lane_count: 2,
        }
    }

    fn config() -> ViolationEngineConfig {
        let mut cfg = ViolationEngineConfig::default();
        cfg.foreign_object.enabled = false;
        cfg
    }

    fn frame_at(secs: f64) -> Frame {
        let ts = t0() + Duration::milliseconds((secs * 1000.0) as i64);
        Frame::black(640, 480, ts)
    }

    /// Box whose midpoint is `(x, y)`.
    fn car_at(track: u64, x: f64, y: f64) -> Detection {
        Detection::new(ObjectClass::Car, BBox::new(x - 20.0, y - 15.0, 40.0, 30.0)).with_track(track)
    }

    fn kinds(events: &[ViolationEvent]) -> Vec<ViolationKind> {
        events.iter().map(|e| e.kind).collect()
    }

    #[test]
    fn test_stationary_track_reported_after_five_seconds() {
        let mut engine = ViolationEngine::new(&camera(), config());
        let mut stopped = 0;
        for i in 0..=6 {
            let events = engine.process(&frame_at(i as f64), &[car_at(1, 100.0, 100.0)]);
            stopped += kinds(&events)
                .iter()
                .filter(|k| **k == ViolationKind::Stopped)
                .count();
        }
        // Reported at t=6 only; t=5 is not strictly past the threshold
        assert_eq!(stopped, 1);
    }

    #[test]
    fn test_moving_track_is_not_stopped() {
        let mut engine = ViolationEngine::new(&camera(), config());
        for i in 0..8 {
            let events =
                engine.process(&frame_at(i as f64), &[car_at(1, 100.0, 50.0 + 10.0 * i as f64)]);
            assert!(!kinds(&events).contains(&ViolationKind::Stopped));
        }
    }

    #[test]
    fn test_persons_are_never_stopped() {
        let mut engine = ViolationEngine::new(&camera(), config());
        let walker = Detection::new(ObjectClass::Person, BBox::new(90.0, 90.0, 20.0, 40.0))
            .with_track(3);
        let events = engine.process(&frame_at(0.0), &[walker.clone()]);
        assert_eq!(kinds(&events), vec![ViolationKind::Pedestrian]);
        let events = engine.process(&frame_at(10.0), &[walker]);
        assert_eq!(kinds(&events), vec![ViolationKind::Pedestrian]);
    }

    #[test]
    fn test_bike_reported_on_every_frame() {
        let mut engine = ViolationEngine::new(&camera(), config());
        let bike = Detection::new(ObjectClass::Bike, BBox::new(300.0, 100.0, 20.0, 30.0));
        for i in 0..3 {
            let events = engine.process(&frame_at(i as f64 * 0.1), &[bike.clone()]);
            assert_eq!(kinds(&events), vec![ViolationKind::Motorbike]);
        }
    }

    #[test]
    fn test_over_speed_inside_trap() {
        let mut engine = ViolationEngine::new(&camera(), config());
        // Goal region starts at y = 480 * 0.6 = 288
        engine.process(&frame_at(0.0), &[car_at(5, 320.0, 300.0)]);
        let events = engine.process(&frame_at(1.0), &[car_at(5, 320.0, 400.0)]);
        let over: Vec<_> = events
            .iter()
            .filter(|e| e.kind == ViolationKind::OverSpeed)
            .collect();
        assert_eq!(over.len(), 1);
        assert_eq!(over[0].speed, Some(172));
        assert_eq!(over[0].track_id, Some(5));
    }

    #[test]
    fn test_over_speed_repeats_while_speeding_in_trap() {
        let mut engine = ViolationEngine::new(&camera(), config());
        engine.process(&frame_at(0.0), &[car_at(5, 320.0, 300.0)]);
        let mut total = 0;
        for (i, y) in [350.0, 400.0, 450.0].into_iter().enumerate() {
            let t = 0.5 * (i + 1) as f64;
            let events = engine.process(&frame_at(t), &[car_at(5, 320.0, y)]);
            let over: Vec<_> = events
                .iter()
                .filter(|e| e.kind == ViolationKind::OverSpeed)
                .collect();
            assert_eq!(over.len(), 1, "frame at {t}s");
            assert_eq!(over[0].speed, Some(172));
            total += over.len();
        }
        assert_eq!(total, 3);
    }

    #[test]
    fn test_fast_track_outside_trap_is_ignored() {
        let mut engine = ViolationEngine::new(&camera(), config());
        engine.process(&frame_at(0.0), &[car_at(5, 320.0, 20.0)]);
        let events = engine.process(&frame_at(1.0), &[car_at(5, 320.0, 200.0)]);
        assert!(!kinds(&events).contains(&ViolationKind::OverSpeed));
    }

    #[test]
    fn test_wrong_direction_on_refresh() {
        let mut cfg = config();
        cfg.direction_refresh_frames = 3;
        let mut engine = ViolationEngine::new(&camera(), cfg);

        engine.process(&frame_at(0.0), &[car_at(1, 100.0, 200.0), car_at(2, 500.0, 100.0)]);
        engine.process(&frame_at(0.1), &[car_at(1, 100.0, 190.0), car_at(2, 500.0, 110.0)]);
        let events =
            engine.process(&frame_at(0.2), &[car_at(1, 100.0, 180.0), car_at(2, 500.0, 120.0)]);

        let wrong: Vec<_> = events
            .iter()
            .filter(|e| e.kind == ViolationKind::WrongDirection)
            .map(|e| e.track_id)
            .collect();
        assert_eq!(wrong, vec![Some(1)]);
    }

    #[test]
    fn test_lane_marking_suppresses_wrong_direction() {
        let mut cfg = config();
        cfg.direction_refresh_frames = 3;
        let mut engine = ViolationEngine::new(&camera(), cfg);
        let lane = Detection::new(ObjectClass::Lane, BBox::new(318.0, 0.0, 4.0, 480.0));

        engine.process(&frame_at(0.0), &[car_at(1, 100.0, 200.0)]);
        engine.process(&frame_at(0.1), &[car_at(1, 100.0, 190.0)]);
        let events = engine.process(&frame_at(0.2), &[car_at(1, 100.0, 180.0), lane]);
        assert!(!kinds(&events).contains(&ViolationKind::WrongDirection));

        // Buffers were cleared: the next cycle starts from scratch
        engine.process(&frame_at(0.3), &[car_at(1, 100.0, 170.0)]);
        engine.process(&frame_at(0.4), &[car_at(1, 100.0, 175.0)]);
        let events = engine.process(&frame_at(0.5), &[car_at(1, 100.0, 180.0)]);
        assert!(!kinds(&events).contains(&ViolationKind::WrongDirection));
    }

    #[test]
    fn test_occupancy_counts_distinct_vehicles_per_lane() {
        let mut engine = ViolationEngine::new(&camera(), config());
        let truck = Detection::new(ObjectClass::Truck, BBox::new(480.0, 100.0, 60.0, 40.0))
            .with_track(2);
        engine.process(&frame_at(0.0), &[car_at(1, 100.0, 100.0), truck.clone()]);
        engine.process(&frame_at(0.1), &[car_at(1, 102.0, 105.0), truck]);

        let occ = engine.take_occupancy();
        use crate::geometry::LaneSide;
        use contracts::VehicleClass;
        assert_eq!(occ.lane_count(LaneSide::Left, VehicleClass::Car), 1);
        assert_eq!(occ.lane_count(LaneSide::Right, VehicleClass::Truck), 1);
        assert!(engine.occupancy().is_empty());
    }

    #[test]
    fn test_lane_count_does_not_change_two_sided_split() {
        let mut cam = camera();
        cam.lane_count = 4;
        let mut engine = ViolationEngine::new(&cam, config());
        engine.process(
            &frame_at(0.0),
            &[car_at(1, 60.0, 100.0), car_at(2, 260.0, 100.0), car_at(3, 580.0, 100.0)],
        );

        let occ = engine.take_occupancy();
        use crate::geometry::LaneSide;
        use contracts::VehicleClass;
        assert_eq!(occ.lane_count(LaneSide::Left, VehicleClass::Car), 2);
        assert_eq!(occ.lane_count(LaneSide::Right, VehicleClass::Car), 1);
    }

    #[test]
    fn test_events_carry_camera_and_capture_time() {
        let mut engine = ViolationEngine::new(&camera(), config());
        let bike = Detection::new(ObjectClass::Bike, BBox::new(300.0, 100.0, 20.0, 30.0));
        let frame = frame_at(2.5);
        let events = engine.process(&frame, &[bike]);
        assert_eq!(events[0].camera_id, "0");
        assert_eq!(events[0].location, "Km 12");
        assert_eq!(events[0].timestamp, frame.captured_at);
    }
}
