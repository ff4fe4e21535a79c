use anyhow::Result;

use crate::detect::backend::{DetectionCapability, DetectorBackend};
use crate::detect::result::{BoundingBox, Detection, DetectionResult};
use crate::frame::Frame;

/// Stub backend for tests and dry runs.
///
/// Reports the configured labels on every frame, each as a full-frame box.
#[derive(Clone, Debug)]
pub struct StubBackend {
    labels: Vec<String>,
    confidence: f32,
    frames_seen: u64,
}

impl StubBackend {
    pub fn new() -> Self {
        Self::with_labels(Vec::<String>::new())
    }

    pub fn with_labels<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            labels: labels.into_iter().map(Into::into).collect(),
            confidence: 0.9,
            frames_seen: 0,
        }
    }

    pub fn frames_seen(&self) -> u64 {
        self.frames_seen
    }
}

impl Default for StubBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectorBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn supports(&self, capability: DetectionCapability) -> bool {
        matches!(capability, DetectionCapability::ObjectDetection)
    }

    fn detect(&mut self, frame: &Frame) -> Result<DetectionResult> {
        self.frames_seen += 1;
        let bbox = BoundingBox::new(0.0, 0.0, frame.width as f32, frame.height as f32);
        Ok(DetectionResult {
            detections: self
                .labels
                .iter()
                .map(|label| Detection::new(label.clone(), self.confidence, bbox))
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stub_reports_configured_labels_per_frame() {
        let mut backend = StubBackend::with_labels(["car", "person"]);
        let frame = Frame::from_rgb(vec![0u8; 4 * 2 * 3], 4, 2, 0).unwrap();

        let r1 = backend.detect(&frame).unwrap();
        assert_eq!(r1.labels().collect::<Vec<_>>(), vec!["car", "person"]);
        assert_eq!(r1.detections[0].bbox, BoundingBox::new(0.0, 0.0, 4.0, 2.0));

        backend.detect(&frame).unwrap();
        assert_eq!(backend.frames_seen(), 2);
    }

    #[test]
    fn empty_stub_detects_nothing() {
        let mut backend = StubBackend::new();
        let frame = Frame::from_rgb(vec![0u8; 3], 1, 1, 0).unwrap();
        assert!(backend.detect(&frame).unwrap().detections.is_empty());
    }
}
