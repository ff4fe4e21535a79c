use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use tempfile::{Builder, NamedTempFile};

use parking_watch::config::{DetectorKind, ParkingConfig, PlateReaderKind};
use parking_watch::VehiclePolicy;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "PARKING_CONFIG",
        "PARKING_SUSPICIOUS_LABELS",
        "PARKING_VEHICLE_LABELS",
        "PARKING_VEHICLE_POLICY",
        "PARKING_DETECTOR",
        "PARKING_MODEL_PATH",
        "PARKING_CONFIDENCE_THRESHOLD",
        "PARKING_SETTLE_DELAY_SECS",
        "PARKING_PLATE_READER",
        "PARKING_OCR_DETECTION_MODEL",
        "PARKING_OCR_RECOGNITION_MODEL",
        "TWILIO_ACCOUNT_SID",
        "TWILIO_AUTH_TOKEN",
        "TWILIO_WHATSAPP_FROM",
        "OWNER_WHATSAPP",
        "TWILIO_SMS_FROM",
        "OWNER_SMS",
        "TWILIO_API_BASE",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn loads_json_config_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "policy": {
            "suspicious_labels": ["Person", "crowbar"],
            "vehicle_policy": "always"
        },
        "detector": {
            "backend": "stub",
            "model_path": "models/lot.onnx",
            "confidence_threshold": 0.4
        },
        "monitor": {
            "settle_delay_secs": 2,
            "video_sample_every": 15
        },
        "messaging": {
            "account_sid": "ACfile",
            "auth_token": "file-token",
            "whatsapp_from": "+14155238886",
            "whatsapp_to": "+919800000000",
            "timeout_secs": 5
        }
    }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");

    std::env::set_var("PARKING_CONFIG", file.path());
    std::env::set_var("TWILIO_ACCOUNT_SID", "ACenv");
    std::env::set_var("OWNER_SMS", "+919811111111");
    std::env::set_var("PARKING_SETTLE_DELAY_SECS", "0");

    let cfg = ParkingConfig::load().expect("load config");

    assert!(cfg.policy.suspicious_labels.contains("person"));
    assert!(cfg.policy.suspicious_labels.contains("crowbar"));
    assert!(!cfg.policy.suspicious_labels.contains("knife"));
    assert!(cfg.policy.vehicle_labels.contains("car"));
    assert_eq!(cfg.policy.vehicle_policy, VehiclePolicy::Always);
    assert_eq!(cfg.detector.backend, DetectorKind::Stub);
    assert_eq!(cfg.detector.model_path, PathBuf::from("models/lot.onnx"));
    assert!((cfg.detector.confidence_threshold - 0.4).abs() < f32::EPSILON);
    assert_eq!(cfg.detector.input_size, 640);
    assert_eq!(cfg.monitor.settle_delay, Duration::ZERO);
    assert_eq!(cfg.monitor.video_sample_every, 15);
    assert_eq!(cfg.messaging.account_sid.as_deref(), Some("ACenv"));
    assert_eq!(
        cfg.messaging.auth_token.as_deref().map(String::as_str),
        Some("file-token")
    );
    assert_eq!(cfg.messaging.whatsapp_to.as_deref(), Some("+919800000000"));
    assert_eq!(cfg.messaging.sms_to.as_deref(), Some("+919811111111"));
    assert_eq!(cfg.messaging.timeout, Duration::from_secs(5));

    clear_env();
}

#[test]
fn loads_toml_config_by_extension() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("temp config");
    let toml = r#"
[policy]
vehicle_labels = ["car", "van"]
restricted_requires_vehicle = false

[messaging]
api_base = "http://127.0.0.1:8089"
sms_from = "+15005550006"
"#;
    std::io::Write::write_all(&mut file, toml.as_bytes()).expect("write config");

    let cfg = ParkingConfig::load_from(Some(file.path())).expect("load config");

    assert!(cfg.policy.vehicle_labels.contains("van"));
    assert!(!cfg.policy.restricted_requires_vehicle);
    assert_eq!(cfg.messaging.api_base, "http://127.0.0.1:8089");
    assert_eq!(cfg.messaging.sms_from.as_deref(), Some("+15005550006"));
    assert_eq!(cfg.messaging.account_sid, None);

    clear_env();
}

#[test]
fn env_label_overrides_are_normalized() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("PARKING_SUSPICIOUS_LABELS", " Person , KNIFE,,");
    std::env::set_var("PARKING_VEHICLE_POLICY", "restricted_only");

    let cfg = ParkingConfig::load_from(None).expect("load config");
    let labels: Vec<&str> = cfg
        .policy
        .suspicious_labels
        .iter()
        .map(String::as_str)
        .collect();
    assert_eq!(labels, vec!["knife", "person"]);
    assert_eq!(cfg.policy.vehicle_policy, VehiclePolicy::RestrictedOnly);

    clear_env();
}

#[test]
fn rejects_out_of_range_threshold() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("PARKING_CONFIDENCE_THRESHOLD", "1.5");
    let err = ParkingConfig::load_from(None).unwrap_err();
    assert!(err.to_string().contains("confidence threshold"));

    std::env::set_var("PARKING_CONFIDENCE_THRESHOLD", "high");
    let err = ParkingConfig::load_from(None).unwrap_err();
    assert!(err.to_string().contains("PARKING_CONFIDENCE_THRESHOLD"));

    clear_env();
}

#[test]
fn rejects_empty_suspicious_label_set() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    std::io::Write::write_all(&mut file, br#"{"policy": {"suspicious_labels": []}}"#)
        .expect("write config");

    assert!(ParkingConfig::load_from(Some(file.path())).is_err());

    clear_env();
}

#[test]
fn plate_reader_section_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "plate": {
            "reader": "none",
            "detection_model": "models/det.rten",
            "recognition_model": "models/rec.rten"
        }
    }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");

    let cfg = ParkingConfig::load_from(Some(file.path())).expect("load config");
    assert_eq!(cfg.plate.reader, PlateReaderKind::None);
    assert_eq!(cfg.plate.detection_model, PathBuf::from("models/det.rten"));
    assert_eq!(cfg.plate.recognition_model, PathBuf::from("models/rec.rten"));

    std::env::set_var("PARKING_PLATE_READER", "ocrs");
    std::env::set_var("PARKING_OCR_RECOGNITION_MODEL", "/srv/ocr/rec.rten");
    let cfg = ParkingConfig::load_from(Some(file.path())).expect("load config");
    assert_eq!(cfg.plate.reader, PlateReaderKind::Ocrs);
    assert_eq!(cfg.plate.detection_model, PathBuf::from("models/det.rten"));
    assert_eq!(cfg.plate.recognition_model, PathBuf::from("/srv/ocr/rec.rten"));

    std::env::set_var("PARKING_PLATE_READER", "tesseract");
    let err = ParkingConfig::load_from(None).unwrap_err();
    assert!(err.to_string().contains("unknown plate reader"));

    clear_env();
}

#[test]
fn rejects_zero_video_frame_limit() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    std::io::Write::write_all(&mut file, br#"{"monitor": {"video_max_frames": 0}}"#)
        .expect("write config");

    let err = ParkingConfig::load_from(Some(file.path())).unwrap_err();
    assert!(err.to_string().contains("video frame limit"));

    clear_env();
}

#[test]
fn rejects_oversized_detector_input() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    std::io::Write::write_all(&mut file, br#"{"detector": {"input_size": 100000}}"#)
        .expect("write config");

    let err = ParkingConfig::load_from(Some(file.path())).unwrap_err();
    assert!(err.to_string().contains("detector input size"));

    clear_env();
}

#[test]
fn missing_config_file_is_an_error() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let err = ParkingConfig::load_from(Some(std::path::Path::new("/nonexistent/parking.json")))
        .unwrap_err();
    assert!(err.to_string().contains("failed to read config file"));

    clear_env();
}
