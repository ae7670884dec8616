//! Detector response decoding.
//!
//! The service answers either with the payload object or with a JSON array
//! whose first element is the payload:
//!
//! ```json
//! [{"bbox": [[10, 20, 50, 60]], "label": [1], "score": [0.91], "track_id": [4]}]
//! ```

use contracts::{BBox, Detection, ObjectClass};
use serde::Deserialize;
use tracing::debug;

use crate::error::{DetectionError, Result};

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawResponse {
    Batch(Vec<RawPayload>),
    Single(RawPayload),
}

#[derive(Debug, Deserialize)]
struct RawPayload {
    bbox: Vec<Vec<f64>>,
    label: Vec<RawLabel>,
    #[serde(default)]
    score: Option<Vec<f64>>,
    #[serde(default)]
    track_id: Option<Vec<u64>>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawLabel {
    Index(u64),
    Float(f64),
    Name(String),
}

/// Maps numeric detector labels to object classes.
///
/// Entries that name no known class stay `None` and their detections are dropped.
#[derive(Debug, Clone, Default)]
pub struct LabelMap {
    classes: Vec<Option<ObjectClass>>,
}

impl LabelMap {
    pub fn new<S: AsRef<str>>(labels: &[S]) -> Self {
        Self {
            classes: labels.iter().map(|l| l.as_ref().parse().ok()).collect(),
        }
    }

    fn resolve(&self, label: &RawLabel) -> Option<ObjectClass> {
        match label {
            RawLabel::Index(i) => self.classes.get(*i as usize).copied().flatten(),
            RawLabel::Float(f) if f.fract() == 0.0 && *f >= 0.0 => {
                self.classes.get(*f as usize).copied().flatten()
            }
            RawLabel::Float(_) => None,
            RawLabel::Name(name) => name.parse().ok(),
        }
    }
}

/// Decode a response body into detections for one frame.
pub fn parse_response(body: &[u8], labels: &LabelMap) -> Result<Vec<Detection>> {
    let raw: RawResponse =
        serde_json::from_slice(body).map_err(|e| DetectionError::malformed(e.to_string()))?;
    let payload = match raw {
        RawResponse::Single(p) => p,
        RawResponse::Batch(list) => match list.into_iter().next() {
            Some(p) => p,
            None => return Ok(Vec::new()),
        },
    };
    decode_payload(payload, labels)
}

fn decode_payload(payload: RawPayload, labels: &LabelMap) -> Result<Vec<Detection>> {
    let n = payload.bbox.len();
    if payload.label.len() != n {
        return Err(DetectionError::malformed(format!(
            "{n} boxes but {} labels",
            payload.label.len()
        )));
    }
    if let Some(scores) = payload.score.as_ref().filter(|s| s.len() != n) {
        return Err(DetectionError::malformed(format!(
            "{n} boxes but {} scores",
            scores.len()
        )));
    }
    if let Some(ids) = payload.track_id.as_ref().filter(|t| t.len() != n) {
        return Err(DetectionError::malformed(format!(
            "{n} boxes but {} track ids",
            ids.len()
        )));
    }

    let mut out = Vec::with_capacity(n);
    for (i, (coords, label)) in payload.bbox.iter().zip(&payload.label).enumerate() {
        let &[x1, y1, x2, y2] = coords.as_slice() else {
            return Err(DetectionError::malformed(format!(
                "bbox {i} has {} values, expected 4",
                coords.len()
            )));
        };
        let Some(class) = labels.resolve(label) else {
            debug!(index = i, label = ?label, "Dropping detection with unknown label");
            continue;
        };
        let mut det = Detection::new(class, BBox::from_corners(x1, y1, x2, y2));
        if let Some(scores) = &payload.score {
            det.score = scores[i] as f32;
        }
        if let Some(ids) = &payload.track_id {
            det.track_id = Some(ids[i]);
        }
        out.push(det);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels() -> LabelMap {
        LabelMap::new(&["lane", "car", "truck", "bus", "trailer", "person", "bike"])
    }

    #[test]
    fn test_batch_with_numeric_labels() {
        let body = br#"[{"bbox": [[10, 20, 50, 60], [0, 0, 4, 300]], "label": [1, 0], "score": [0.9, 0.5]}]"#;
        let dets = parse_response(body, &labels()).unwrap();
        assert_eq!(dets.len(), 2);
        assert_eq!(dets[0].class, ObjectClass::Car);
        assert_eq!(dets[0].bbox, BBox::new(10.0, 20.0, 40.0, 40.0));
        assert!((dets[0].score - 0.9).abs() < 1e-6);
        assert_eq!(dets[0].track_id, None);
        assert_eq!(dets[1].class, ObjectClass::Lane);
    }

    #[test]
    fn test_single_object_with_names_and_tracks() {
        let body = br#"{"bbox": [[1, 2, 3, 4]], "label": ["person"], "track_id": [9]}"#;
        let dets = parse_response(body, &labels()).unwrap();
        assert_eq!(dets[0].class, ObjectClass::Person);
        assert_eq!(dets[0].track_id, Some(9));
    }

    #[test]
    fn test_empty_batch_and_unknown_labels() {
        assert!(parse_response(b"[]", &labels()).unwrap().is_empty());
        let body = br#"{"bbox": [[1, 2, 3, 4]], "label": [42]}"#;
        assert!(parse_response(body, &labels()).unwrap().is_empty());
    }

    #[test]
    fn test_malformed_bodies() {
        let cases: [&[u8]; 4] = [
            b"not json",
            br#"{"label": [1]}"#,
            br#"{"bbox": [[1, 2, 3, 4]], "label": []}"#,
            br#"{"bbox": [[1, 2, 3]], "label": [1]}"#,
        ];
        for body in cases {
            let err = parse_response(body, &labels()).unwrap_err();
            assert!(matches!(err, DetectionError::Malformed { .. }), "{err}");
        }
    }
}
