use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};

use crate::detect::result::DetectionResult;
use crate::frame::Frame;

use super::backend::{DetectionCapability, DetectorBackend};

type SharedBackend = Arc<Mutex<dyn DetectorBackend>>;

/// Detector backends loaded for this process, in registration order.
///
/// A loaded model is shared behind a `Mutex` since `detect` takes `&mut self`.
/// The preferred backend is tried first; otherwise the first registered
/// backend with the needed capability answers.
#[derive(Default)]
pub struct BackendRegistry {
    entries: Vec<(&'static str, SharedBackend)>,
    preferred: Option<usize>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a backend. Registering a name twice replaces the earlier backend.
    pub fn register<B: DetectorBackend + 'static>(&mut self, backend: B) {
        let name = backend.name();
        let shared: SharedBackend = Arc::new(Mutex::new(backend));
        match self.position(name) {
            Some(idx) => self.entries[idx] = (name, shared),
            None => self.entries.push((name, shared)),
        }
        if self.preferred.is_none() {
            self.preferred = self.position(name);
        }
        log::debug!("detector backend '{}' registered", name);
    }

    pub fn set_default(&mut self, name: &str) -> Result<()> {
        let idx = self
            .position(name)
            .ok_or_else(|| anyhow!("detector backend '{}' is not registered", name))?;
        self.preferred = Some(idx);
        Ok(())
    }

    pub fn default_name(&self) -> Option<&'static str> {
        self.preferred.map(|idx| self.entries[idx].0)
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.entries.iter().map(|(name, _)| *name).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Load-time hook; a model that cannot run on a blank frame fails here
    /// rather than on the first upload.
    pub fn warm_up(&self) -> Result<()> {
        for (name, backend) in &self.entries {
            lock(name, backend)?
                .warm_up()
                .map_err(|e| anyhow!("detector backend '{}' failed to warm up: {:#}", name, e))?;
        }
        Ok(())
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|(n, _)| *n == name)
    }

    fn select(&self, capability: DetectionCapability) -> Result<(&'static str, &SharedBackend)> {
        let preferred = self.preferred.into_iter();
        let rest = (0..self.entries.len()).filter(|idx| Some(*idx) != self.preferred);
        for idx in preferred.chain(rest) {
            let (name, backend) = &self.entries[idx];
            if lock(name, backend)?.supports(capability) {
                return Ok((name, backend));
            }
        }
        Err(anyhow!(
            "no registered detector backend supports {:?}",
            capability
        ))
    }

    /// Run `frame` through the backend selected for `capability`.
    pub fn detect_with_capability(
        &self,
        capability: DetectionCapability,
        frame: &Frame,
    ) -> Result<DetectionResult> {
        let (name, backend) = self.select(capability)?;
        let result = lock(name, backend)?.detect(frame)?;
        log::debug!(
            "{} found {} object(s) in frame {}",
            name,
            result.detections.len(),
            frame.index
        );
        Ok(result)
    }
}

fn lock<'a>(
    name: &str,
    backend: &'a SharedBackend,
) -> Result<std::sync::MutexGuard<'a, dyn DetectorBackend + 'static>> {
    backend
        .lock()
        .map_err(|_| anyhow!("detector backend '{}' lock poisoned", name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::StubBackend;

    fn frame() -> Frame {
        Frame::from_rgb(vec![0u8; 12], 2, 2, 0).unwrap()
    }

    #[test]
    fn first_registered_backend_is_default() {
        let mut registry = BackendRegistry::new();
        assert!(registry.is_empty());
        registry.register(StubBackend::with_labels(["car"]));
        assert_eq!(registry.default_name(), Some("stub"));
        assert_eq!(registry.names(), vec!["stub"]);

        let result = registry
            .detect_with_capability(DetectionCapability::ObjectDetection, &frame())
            .unwrap();
        assert_eq!(result.labels().collect::<Vec<_>>(), vec!["car"]);
    }

    #[test]
    fn re_registering_replaces_backend() {
        let mut registry = BackendRegistry::new();
        registry.register(StubBackend::with_labels(["car"]));
        registry.register(StubBackend::with_labels(["person"]));
        assert_eq!(registry.names().len(), 1);

        let result = registry
            .detect_with_capability(DetectionCapability::ObjectDetection, &frame())
            .unwrap();
        assert_eq!(result.labels().collect::<Vec<_>>(), vec!["person"]);
    }

    #[test]
    fn set_default_rejects_unknown_backend() {
        let mut registry = BackendRegistry::new();
        let err = registry.set_default("tract").unwrap_err();
        assert!(err.to_string().contains("not registered"));
    }

    #[test]
    fn empty_registry_reports_missing_capability() {
        let registry = BackendRegistry::new();
        let err = registry
            .detect_with_capability(DetectionCapability::ObjectDetection, &frame())
            .unwrap_err();
        assert!(err.to_string().contains("no registered detector backend"));
    }
}
