//! Parking Watch
//!
//! Vehicle-theft alerting for a parked vehicle. An uploaded photo or video of
//! the parking spot is run through an object detector, the detected labels are
//! classified against the parking area policy, and a suspicious scene produces
//! one alert message sent to the owner over WhatsApp and/or SMS.
//!
//! # Module Structure
//!
//! - `frame`: decoded RGB frames
//! - `ingest`: frame sources (image files, sampled video files)
//! - `detect`: detector backends and the registry that selects one
//! - `classify`: suspicion rules over detected labels and area type
//! - `alert`: alert events and their message text
//! - `dispatch`: per-channel delivery through a messaging transport
//! - `plate`: plate readers and the owner vehicle check
//! - `monitor`: one end-to-end run
//! - `config`: file and environment configuration

pub mod alert;
pub mod classify;
pub mod config;
pub mod detect;
pub mod dispatch;
pub mod frame;
pub mod ingest;
pub mod monitor;
pub mod plate;

pub use alert::{manual_review_notice, AlertEvent};
pub use classify::{
    AreaType, ClassifierPolicy, Reason, SuspicionClassifier, Verdict, VehiclePolicy,
};
pub use config::{
    DetectorKind, DetectorSettings, MessagingSettings, MonitorSettings, ParkingConfig,
    PlateReaderKind, PlateSettings,
};
#[cfg(feature = "backend-tract")]
pub use detect::TractBackend;
pub use detect::{
    BackendRegistry, BoundingBox, Detection, DetectionCapability, DetectionResult,
    DetectorBackend, StubBackend,
};
pub use dispatch::{
    AlertDispatcher, Channel, ChannelOutcome, ChannelSelection, DispatchReport, MessageSender,
    TwilioSender,
};
pub use frame::Frame;
pub use ingest::{FileConfig, FileSource, IngestError, MediaKind};
pub use monitor::{
    Monitor, MonitorError, MonitorReport, MonitorRequest, StatusLevel, StatusMessage, StatusSink,
};
#[cfg(feature = "plate-ocrs")]
pub use plate::OcrsPlateReader;
pub use plate::{FixedPlateReader, PlateReader};
