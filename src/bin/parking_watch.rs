//! parking_watch - run one theft-alert check on an uploaded photo or video.
//!
//! Detects objects in the media, classifies the scene against the parking
//! area, and notifies the owner over WhatsApp and/or SMS when it looks
//! suspicious. Status lines go to stderr; `--json` prints the run report on
//! stdout.

use anyhow::{Context, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;

#[path = "../ui.rs"]
mod ui;

#[cfg(feature = "plate-ocrs")]
use parking_watch::OcrsPlateReader;
#[cfg(feature = "backend-tract")]
use parking_watch::TractBackend;
use parking_watch::{
    AlertDispatcher, AreaType, BackendRegistry, ChannelSelection, DetectorKind, FixedPlateReader,
    Monitor, MonitorRequest, ParkingConfig, PlateReaderKind, StubBackend, SuspicionClassifier,
    TwilioSender,
};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Detect suspicious activity around a parked vehicle and alert the owner"
)]
struct Args {
    /// Photo (jpg, jpeg, png) or video (mp4) of the parking spot.
    #[arg(long, env = "PARKING_MEDIA")]
    media: Option<PathBuf>,

    /// Owner vehicle number, quoted in the alert.
    #[arg(long = "vehicle", env = "PARKING_VEHICLE_ID")]
    vehicle_id: Option<String>,

    /// Parking area type: 'authorized' or 'restricted'.
    #[arg(long, env = "PARKING_AREA", default_value = "authorized")]
    area: AreaType,

    /// Alert channels: whatsapp, sms, both or none (comma-separated allowed).
    #[arg(long, env = "PARKING_CHANNELS", default_value = "both")]
    channels: ChannelSelection,

    /// Detector backend override: 'tract' or 'stub'.
    #[arg(long, env = "PARKING_DETECTOR")]
    detector: Option<DetectorKind>,

    /// Comma-separated labels returned by the stub detector.
    #[arg(long)]
    stub_labels: Option<String>,

    /// Plate reader override: 'ocrs' or 'none'.
    #[arg(long, env = "PARKING_PLATE_READER")]
    plate_reader: Option<PlateReaderKind>,

    /// Plate text read from the scene, checked against the vehicle number.
    /// Replaces the configured plate reader.
    #[arg(long)]
    plate_text: Option<String>,

    /// Config file (JSON, or TOML with a .toml extension).
    #[arg(long, env = "PARKING_CONFIG")]
    config: Option<PathBuf>,

    /// Status output: auto, plain or pretty.
    #[arg(long, default_value = "auto")]
    ui: String,

    /// Print the run report as JSON on stdout.
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let is_tty = std::io::stderr().is_terminal();
    let mut ui = ui::Ui::from_args(Some(&args.ui), is_tty, args.json);

    let mut config = {
        let _stage = ui.stage("Load configuration");
        ParkingConfig::load_from(args.config.as_deref())?
    };
    if let Some(kind) = args.detector {
        config.detector.backend = kind;
    }
    if let Some(kind) = args.plate_reader {
        config.plate.reader = kind;
    }

    let registry = {
        let _stage = ui.stage("Load detector");
        let registry = build_registry(&config, args.stub_labels.as_deref())?;
        registry.warm_up()?;
        registry
    };

    let dispatcher = AlertDispatcher::new(TwilioSender::new(config.messaging.clone()));
    let classifier = SuspicionClassifier::new(config.policy.clone());
    let mut monitor = Monitor::new(registry, classifier, dispatcher, config.monitor.clone());
    if let Some(text) = args.plate_text.as_deref() {
        monitor = monitor.with_plate_reader(FixedPlateReader::new(text));
    } else if config.plate.reader == PlateReaderKind::Ocrs {
        let _stage = ui.stage("Load plate reader");
        monitor = with_ocrs_reader(monitor, &config)?;
    }

    let request = MonitorRequest {
        media_path: args.media.clone(),
        vehicle_id: args.vehicle_id.clone(),
        area: args.area,
        channels: args.channels,
    };
    log::info!(
        "checking {} for vehicle {} ({})",
        request
            .media_path
            .as_deref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<none>".to_string()),
        request.vehicle_id.as_deref().unwrap_or("<none>"),
        request.area
    );

    let report = {
        let _stage = ui.stage("Analyze upload");
        monitor.run(&request, &mut ui)?
    };

    if args.json {
        let json = serde_json::to_string_pretty(&report).context("failed to encode report")?;
        println!("{}", json);
    }
    Ok(())
}

fn build_registry(config: &ParkingConfig, stub_labels: Option<&str>) -> Result<BackendRegistry> {
    let mut registry = BackendRegistry::new();
    match config.detector.backend {
        DetectorKind::Stub => {
            let labels: Vec<String> = stub_labels
                .map(|labels| {
                    labels
                        .split(',')
                        .map(str::trim)
                        .filter(|l| !l.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();
            log::warn!(
                "using stub detector with fixed labels [{}]; no model inference is performed",
                labels.join(", ")
            );
            registry.register(StubBackend::with_labels(labels));
        }
        DetectorKind::Tract => register_tract(&mut registry, config)?,
    }
    Ok(registry)
}

#[cfg(feature = "backend-tract")]
fn register_tract(registry: &mut BackendRegistry, config: &ParkingConfig) -> Result<()> {
    let settings = &config.detector;
    let backend = TractBackend::new(&settings.model_path, settings.input_size)?
        .with_thresholds(settings.confidence_threshold, settings.iou_threshold);
    registry.register(backend);
    Ok(())
}

#[cfg(not(feature = "backend-tract"))]
fn register_tract(_registry: &mut BackendRegistry, _config: &ParkingConfig) -> Result<()> {
    Err(anyhow::anyhow!(
        "tract detector requested but this build lacks the backend-tract feature; \
         rebuild with --features backend-tract or use --detector stub"
    ))
}

#[cfg(feature = "plate-ocrs")]
fn with_ocrs_reader(monitor: Monitor, config: &ParkingConfig) -> Result<Monitor> {
    let plate = &config.plate;
    let reader = OcrsPlateReader::new(&plate.detection_model, &plate.recognition_model)?;
    Ok(monitor.with_plate_reader(reader))
}

#[cfg(not(feature = "plate-ocrs"))]
fn with_ocrs_reader(_monitor: Monitor, _config: &ParkingConfig) -> Result<Monitor> {
    Err(anyhow::anyhow!(
        "ocrs plate reader requested but this build lacks the plate-ocrs feature; \
         rebuild with --features plate-ocrs or use --plate-reader none"
    ))
}
