mod backend;
mod backends;
mod registry;
mod result;
#[cfg(any(feature = "backend-tract", test))]
pub(crate) mod yolo;

pub use backend::{DetectionCapability, DetectorBackend};
pub use backends::StubBackend;
#[cfg(feature = "backend-tract")]
pub use backends::TractBackend;
pub use registry::BackendRegistry;
pub use result::{BoundingBox, Detection, DetectionResult};
