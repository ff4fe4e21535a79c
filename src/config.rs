use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use zeroize::Zeroizing;

use crate::classify::{normalize_labels, ClassifierPolicy, VehiclePolicy};

const DEFAULT_MODEL_PATH: &str = "yolov8n.onnx";
const DEFAULT_INPUT_SIZE: u32 = 640;
const MAX_INPUT_SIZE: u32 = 4096;
const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.25;
const DEFAULT_IOU_THRESHOLD: f32 = 0.45;
const DEFAULT_VIDEO_SAMPLE_EVERY: u32 = 30;
const DEFAULT_VIDEO_MAX_FRAMES: u32 = 20;
const DEFAULT_API_BASE: &str = "https://api.twilio.com";
const DEFAULT_TIMEOUT_SECS: u64 = 10;
const OCR_DETECTION_MODEL: &str = "text-detection.rten";
const OCR_RECOGNITION_MODEL: &str = "text-recognition.rten";

#[derive(Debug, Deserialize, Default)]
struct ParkingConfigFile {
    policy: Option<PolicyConfigFile>,
    detector: Option<DetectorConfigFile>,
    monitor: Option<MonitorConfigFile>,
    plate: Option<PlateConfigFile>,
    messaging: Option<MessagingConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct PolicyConfigFile {
    suspicious_labels: Option<Vec<String>>,
    vehicle_labels: Option<Vec<String>>,
    restricted_requires_vehicle: Option<bool>,
    vehicle_policy: Option<VehiclePolicy>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectorConfigFile {
    backend: Option<String>,
    model_path: Option<PathBuf>,
    input_size: Option<u32>,
    confidence_threshold: Option<f32>,
    iou_threshold: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct MonitorConfigFile {
    settle_delay_secs: Option<u64>,
    video_sample_every: Option<u32>,
    video_max_frames: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct PlateConfigFile {
    reader: Option<String>,
    detection_model: Option<PathBuf>,
    recognition_model: Option<PathBuf>,
}

#[derive(Deserialize, Default)]
struct MessagingConfigFile {
    api_base: Option<String>,
    account_sid: Option<String>,
    auth_token: Option<String>,
    whatsapp_from: Option<String>,
    whatsapp_to: Option<String>,
    sms_from: Option<String>,
    sms_to: Option<String>,
    timeout_secs: Option<u64>,
}

impl std::fmt::Debug for MessagingConfigFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessagingConfigFile")
            .field("api_base", &self.api_base)
            .field("account_sid", &self.account_sid)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "<redacted>"))
            .finish_non_exhaustive()
    }
}

/// Fully resolved configuration for one monitoring run.
#[derive(Debug, Clone, Default)]
pub struct ParkingConfig {
    pub policy: ClassifierPolicy,
    pub detector: DetectorSettings,
    pub monitor: MonitorSettings,
    pub plate: PlateSettings,
    pub messaging: MessagingSettings,
}

/// Which detector backend to load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorKind {
    /// YOLOv8 ONNX model through tract (feature: backend-tract).
    Tract,
    /// Fixed labels, no model.
    Stub,
}

impl FromStr for DetectorKind {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "tract" | "onnx" | "yolo" => Ok(DetectorKind::Tract),
            "stub" => Ok(DetectorKind::Stub),
            other => Err(anyhow!(
                "unknown detector backend '{}'; expected 'tract' or 'stub'",
                other
            )),
        }
    }
}

impl Default for DetectorKind {
    fn default() -> Self {
        if cfg!(feature = "backend-tract") {
            DetectorKind::Tract
        } else {
            DetectorKind::Stub
        }
    }
}

#[derive(Debug, Clone)]
pub struct DetectorSettings {
    pub backend: DetectorKind,
    pub model_path: PathBuf,
    pub input_size: u32,
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            backend: DetectorKind::default(),
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            input_size: DEFAULT_INPUT_SIZE,
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            iou_threshold: DEFAULT_IOU_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MonitorSettings {
    /// One-shot wait before the verdict is evaluated. Zero evaluates immediately.
    pub settle_delay: Duration,
    pub video_sample_every: u32,
    pub video_max_frames: u32,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            settle_delay: Duration::ZERO,
            video_sample_every: DEFAULT_VIDEO_SAMPLE_EVERY,
            video_max_frames: DEFAULT_VIDEO_MAX_FRAMES,
        }
    }
}

/// Which number-plate reader runs on analyzed frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlateReaderKind {
    /// No plate reading; the owner check is skipped.
    None,
    /// Text detection and recognition through ocrs (feature: plate-ocrs).
    Ocrs,
}

impl FromStr for PlateReaderKind {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "none" | "off" => Ok(PlateReaderKind::None),
            "ocrs" | "ocr" => Ok(PlateReaderKind::Ocrs),
            other => Err(anyhow!(
                "unknown plate reader '{}'; expected 'ocrs' or 'none'",
                other
            )),
        }
    }
}

impl Default for PlateReaderKind {
    fn default() -> Self {
        if cfg!(feature = "plate-ocrs") {
            PlateReaderKind::Ocrs
        } else {
            PlateReaderKind::None
        }
    }
}

/// OCR model locations. Defaults follow the ocrs CLI cache, `~/.cache/ocrs`.
#[derive(Debug, Clone)]
pub struct PlateSettings {
    pub reader: PlateReaderKind,
    pub detection_model: PathBuf,
    pub recognition_model: PathBuf,
}

impl Default for PlateSettings {
    fn default() -> Self {
        Self {
            reader: PlateReaderKind::default(),
            detection_model: ocrs_cache_dir().join(OCR_DETECTION_MODEL),
            recognition_model: ocrs_cache_dir().join(OCR_RECOGNITION_MODEL),
        }
    }
}

fn ocrs_cache_dir() -> PathBuf {
    let home = std::env::var_os("HOME").map(PathBuf::from).unwrap_or_default();
    home.join(".cache").join("ocrs")
}

/// Messaging API credentials and owner addresses.
#[derive(Clone)]
pub struct MessagingSettings {
    pub api_base: String,
    pub account_sid: Option<String>,
    pub auth_token: Option<Zeroizing<String>>,
    pub whatsapp_from: Option<String>,
    pub whatsapp_to: Option<String>,
    pub sms_from: Option<String>,
    pub sms_to: Option<String>,
    pub timeout: Duration,
}

impl Default for MessagingSettings {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            account_sid: None,
            auth_token: None,
            whatsapp_from: None,
            whatsapp_to: None,
            sms_from: None,
            sms_to: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl std::fmt::Debug for MessagingSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessagingSettings")
            .field("api_base", &self.api_base)
            .field("account_sid", &self.account_sid)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "<redacted>"))
            .field("whatsapp_from", &self.whatsapp_from)
            .field("whatsapp_to", &self.whatsapp_to)
            .field("sms_from", &self.sms_from)
            .field("sms_to", &self.sms_to)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl ParkingConfig {
    /// Load from `PARKING_CONFIG` (if set), then apply environment overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("PARKING_CONFIG").ok().map(PathBuf::from);
        Self::load_from(config_path.as_deref())
    }

    /// Load from an explicit file (if any), then apply environment overrides.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => Some(read_config_file(path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: ParkingConfigFile) -> Result<Self> {
        let mut policy = ClassifierPolicy::default();
        if let Some(file_policy) = file.policy {
            if let Some(labels) = file_policy.suspicious_labels {
                policy.suspicious_labels = normalize_labels(labels);
            }
            if let Some(labels) = file_policy.vehicle_labels {
                policy.vehicle_labels = normalize_labels(labels);
            }
            if let Some(required) = file_policy.restricted_requires_vehicle {
                policy.restricted_requires_vehicle = required;
            }
            if let Some(vehicle_policy) = file_policy.vehicle_policy {
                policy.vehicle_policy = vehicle_policy;
            }
        }

        let detector_file = file.detector.unwrap_or_default();
        let detector = DetectorSettings {
            backend: match detector_file.backend.as_deref() {
                Some(name) => name.parse()?,
                None => DetectorKind::default(),
            },
            model_path: detector_file
                .model_path
                .unwrap_or_else(|| PathBuf::from(DEFAULT_MODEL_PATH)),
            input_size: detector_file.input_size.unwrap_or(DEFAULT_INPUT_SIZE),
            confidence_threshold: detector_file
                .confidence_threshold
                .unwrap_or(DEFAULT_CONFIDENCE_THRESHOLD),
            iou_threshold: detector_file.iou_threshold.unwrap_or(DEFAULT_IOU_THRESHOLD),
        };

        let monitor_file = file.monitor.unwrap_or_default();
        let monitor = MonitorSettings {
            settle_delay: Duration::from_secs(monitor_file.settle_delay_secs.unwrap_or(0)),
            video_sample_every: monitor_file
                .video_sample_every
                .unwrap_or(DEFAULT_VIDEO_SAMPLE_EVERY),
            video_max_frames: monitor_file
                .video_max_frames
                .unwrap_or(DEFAULT_VIDEO_MAX_FRAMES),
        };

        let plate_file = file.plate.unwrap_or_default();
        let plate_defaults = PlateSettings::default();
        let plate = PlateSettings {
            reader: match plate_file.reader.as_deref() {
                Some(name) => name.parse()?,
                None => plate_defaults.reader,
            },
            detection_model: plate_file
                .detection_model
                .unwrap_or(plate_defaults.detection_model),
            recognition_model: plate_file
                .recognition_model
                .unwrap_or(plate_defaults.recognition_model),
        };

        let messaging_file = file.messaging.unwrap_or_default();
        let messaging = MessagingSettings {
            api_base: messaging_file
                .api_base
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            account_sid: messaging_file.account_sid,
            auth_token: messaging_file.auth_token.map(Zeroizing::new),
            whatsapp_from: messaging_file.whatsapp_from,
            whatsapp_to: messaging_file.whatsapp_to,
            sms_from: messaging_file.sms_from,
            sms_to: messaging_file.sms_to,
            timeout: Duration::from_secs(
                messaging_file.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
            ),
        };

        Ok(Self {
            policy,
            detector,
            monitor,
            plate,
            messaging,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        let messaging = &mut self.messaging;
        for (key, slot) in [
            ("TWILIO_ACCOUNT_SID", &mut messaging.account_sid),
            ("TWILIO_WHATSAPP_FROM", &mut messaging.whatsapp_from),
            ("OWNER_WHATSAPP", &mut messaging.whatsapp_to),
            ("TWILIO_SMS_FROM", &mut messaging.sms_from),
            ("OWNER_SMS", &mut messaging.sms_to),
        ] {
            if let Some(value) = non_empty_env(key) {
                *slot = Some(value);
            }
        }
        if let Some(token) = non_empty_env("TWILIO_AUTH_TOKEN") {
            messaging.auth_token = Some(Zeroizing::new(token));
        }
        if let Some(base) = non_empty_env("TWILIO_API_BASE") {
            messaging.api_base = base;
        }

        if let Some(labels) = non_empty_env("PARKING_SUSPICIOUS_LABELS") {
            self.policy.suspicious_labels = normalize_labels(split_csv(&labels));
        }
        if let Some(labels) = non_empty_env("PARKING_VEHICLE_LABELS") {
            self.policy.vehicle_labels = normalize_labels(split_csv(&labels));
        }
        if let Some(policy) = non_empty_env("PARKING_VEHICLE_POLICY") {
            self.policy.vehicle_policy = policy.parse()?;
        }
        if let Some(backend) = non_empty_env("PARKING_DETECTOR") {
            self.detector.backend = backend.parse()?;
        }
        if let Some(path) = non_empty_env("PARKING_MODEL_PATH") {
            self.detector.model_path = PathBuf::from(path);
        }
        if let Some(threshold) = non_empty_env("PARKING_CONFIDENCE_THRESHOLD") {
            self.detector.confidence_threshold = threshold.parse().map_err(|_| {
                anyhow!("PARKING_CONFIDENCE_THRESHOLD must be a number between 0 and 1")
            })?;
        }
        if let Some(reader) = non_empty_env("PARKING_PLATE_READER") {
            self.plate.reader = reader.parse()?;
        }
        if let Some(path) = non_empty_env("PARKING_OCR_DETECTION_MODEL") {
            self.plate.detection_model = PathBuf::from(path);
        }
        if let Some(path) = non_empty_env("PARKING_OCR_RECOGNITION_MODEL") {
            self.plate.recognition_model = PathBuf::from(path);
        }
        if let Some(delay) = non_empty_env("PARKING_SETTLE_DELAY_SECS") {
            let seconds: u64 = delay.parse().map_err(|_| {
                anyhow!("PARKING_SETTLE_DELAY_SECS must be an integer number of seconds")
            })?;
            self.monitor.settle_delay = Duration::from_secs(seconds);
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        self.policy.validate()?;
        if !(0.0..=1.0).contains(&self.detector.confidence_threshold) {
            return Err(anyhow!("confidence threshold must be within 0..=1"));
        }
        if !(0.0..=1.0).contains(&self.detector.iou_threshold) {
            return Err(anyhow!("iou threshold must be within 0..=1"));
        }
        if self.detector.input_size == 0 {
            return Err(anyhow!("detector input size must be greater than zero"));
        }
        if self.detector.input_size > MAX_INPUT_SIZE {
            return Err(anyhow!("detector input size must be at most {}", MAX_INPUT_SIZE));
        }
        if self.monitor.video_sample_every == 0 {
            return Err(anyhow!("video sample interval must be greater than zero"));
        }
        if self.monitor.video_max_frames == 0 {
            return Err(anyhow!("video frame limit must be greater than zero"));
        }
        if self.messaging.timeout.is_zero() {
            return Err(anyhow!("messaging timeout must be greater than zero"));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<ParkingConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|entry| entry.trim())
        .filter(|entry| !entry.is_empty())
        .map(|entry| entry.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = ParkingConfig::default();
        cfg.validate().unwrap();
        assert_eq!(cfg.detector.model_path, PathBuf::from("yolov8n.onnx"));
        assert_eq!(cfg.monitor.settle_delay, Duration::ZERO);
        assert_eq!(cfg.messaging.api_base, "https://api.twilio.com");
    }

    #[test]
    fn debug_output_redacts_auth_token() {
        let settings = MessagingSettings {
            auth_token: Some(Zeroizing::new("super-secret".to_string())),
            ..MessagingSettings::default()
        };
        let rendered = format!("{:?}", settings);
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn detector_kind_parsing() {
        assert_eq!("Tract".parse::<DetectorKind>().unwrap(), DetectorKind::Tract);
        assert_eq!("stub".parse::<DetectorKind>().unwrap(), DetectorKind::Stub);
        assert!("opencv".parse::<DetectorKind>().is_err());
    }

    #[test]
    fn plate_reader_kind_parsing() {
        assert_eq!("OCRS".parse::<PlateReaderKind>().unwrap(), PlateReaderKind::Ocrs);
        assert_eq!("none".parse::<PlateReaderKind>().unwrap(), PlateReaderKind::None);
        assert!("tesseract".parse::<PlateReaderKind>().is_err());
    }

    #[test]
    fn ocr_models_default_to_ocrs_cache() {
        let plate = PlateSettings::default();
        assert!(plate.detection_model.ends_with(".cache/ocrs/text-detection.rten"));
        assert!(plate.recognition_model.ends_with(".cache/ocrs/text-recognition.rten"));
    }

    #[test]
    fn oversized_input_is_rejected() {
        let mut cfg = ParkingConfig::default();
        cfg.detector.input_size = MAX_INPUT_SIZE;
        cfg.validate().unwrap();
        cfg.detector.input_size = MAX_INPUT_SIZE + 1;
        assert!(cfg.validate().unwrap_err().to_string().contains("at most"));
    }

    #[test]
    fn zero_video_frame_limit_is_rejected() {
        let mut cfg = ParkingConfig::default();
        cfg.monitor.video_max_frames = 0;
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("video frame limit"));
    }

    #[test]
    fn split_csv_drops_blanks() {
        assert_eq!(split_csv(" car, ,bus,"), vec!["car", "bus"]);
    }
}
