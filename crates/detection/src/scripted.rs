//! Scripted detection service for demos and tests.

use std::collections::VecDeque;

use contracts::{Detection, Frame};

use crate::error::{DetectionError, Result};
use crate::DetectionService;

/// Answers from a prepared script, one entry per call.
///
/// Once the script is exhausted every call returns no detections, or the
/// last entry again when built with [`ScriptedDetector::repeat_last`].
#[derive(Debug, Default)]
pub struct ScriptedDetector {
    script: VecDeque<Result<Vec<Detection>>>,
    last: Option<Vec<Detection>>,
    repeat_last: bool,
    calls: usize,
}

impl ScriptedDetector {
    pub fn new(frames: impl IntoIterator<Item = Vec<Detection>>) -> Self {
        Self {
            script: frames.into_iter().map(Ok).collect(),
            ..Self::default()
        }
    }

    /// Append a failing call.
    pub fn then_fail(mut self, error: DetectionError) -> Self {
        self.script.push_back(Err(error));
        self
    }

    pub fn then(mut self, detections: Vec<Detection>) -> Self {
        self.script.push_back(Ok(detections));
        self
    }

    pub fn repeat_last(mut self) -> Self {
        self.repeat_last = true;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls
    }

    pub fn remaining(&self) -> usize {
        self.script.len()
    }
}

impl DetectionService for ScriptedDetector {
    fn name(&self) -> &str {
        "scripted"
    }

    fn detect(&mut self, _frame: &Frame) -> Result<Vec<Detection>> {
        self.calls += 1;
        match self.script.pop_front() {
            Some(Ok(detections)) => {
                self.last = Some(detections.clone());
                Ok(detections)
            }
            Some(Err(e)) => Err(e),
            None if self.repeat_last => Ok(self.last.clone().unwrap_or_default()),
            None => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use contracts::{BBox, ObjectClass};

    fn car() -> Vec<Detection> {
        vec![Detection::new(ObjectClass::Car, BBox::new(0.0, 0.0, 10.0, 10.0)).with_track(1)]
    }

    #[test]
    fn test_script_then_empty() {
        let frame = Frame::black(4, 4, Utc::now());
        let mut det = ScriptedDetector::new([car()]).then_fail(DetectionError::malformed("x"));
        assert_eq!(det.detect(&frame).unwrap().len(), 1);
        assert!(det.detect(&frame).is_err());
        assert!(det.detect(&frame).unwrap().is_empty());
        assert_eq!(det.calls(), 3);
    }

    #[test]
    fn test_repeat_last() {
        let frame = Frame::black(4, 4, Utc::now());
        let mut det = ScriptedDetector::new([car()]).repeat_last();
        det.detect(&frame).unwrap();
        assert_eq!(det.detect(&frame).unwrap(), car());
    }
}
