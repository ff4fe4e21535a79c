//! One monitoring run: acquire frames, detect, classify, alert.
//!
//! The run is synchronous and single-shot. Input problems are reported before
//! any detection or dispatch happens; dispatch problems are reported inline
//! and never abort the run.

use std::path::PathBuf;

use anyhow::Result;
use chrono::Local;
use serde::Serialize;

use crate::alert::{manual_review_notice, AlertEvent};
use crate::classify::{AreaType, SuspicionClassifier, Verdict};
use crate::config::MonitorSettings;
use crate::detect::{BackendRegistry, Detection, DetectionCapability};
use crate::dispatch::{AlertDispatcher, ChannelSelection, DispatchReport};
use crate::ingest::{FileConfig, FileSource, IngestError, MediaKind};
use crate::plate::{owner_vehicle_seen, PlateReader};

/// Severity of a status line shown to the operator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusLevel {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StatusMessage {
    pub level: StatusLevel,
    pub message: String,
}

/// Receives status lines as the run progresses.
pub trait StatusSink {
    fn status(&mut self, status: &StatusMessage);
}

impl StatusSink for Vec<StatusMessage> {
    fn status(&mut self, status: &StatusMessage) {
        self.push(status.clone());
    }
}

/// Inputs for one run.
#[derive(Clone, Debug, Default)]
pub struct MonitorRequest {
    pub media_path: Option<PathBuf>,
    pub vehicle_id: Option<String>,
    pub area: AreaType,
    pub channels: ChannelSelection,
}

/// Input problems detected before any processing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MonitorError {
    MissingInput(&'static str),
    MediaNotFound(PathBuf),
    UnsupportedMedia(String),
}

impl std::fmt::Display for MonitorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MonitorError::MissingInput(what) => write!(f, "missing required input: {}", what),
            MonitorError::MediaNotFound(path) => {
                write!(f, "media file not found: {}", path.display())
            }
            MonitorError::UnsupportedMedia(detail) => write!(f, "{}", detail),
        }
    }
}

impl std::error::Error for MonitorError {}

/// Summary of one run.
#[derive(Clone, Debug, Default, Serialize)]
pub struct MonitorReport {
    pub media_kind: Option<MediaKind>,
    pub frames_processed: u64,
    pub detections: Vec<Detection>,
    pub verdict: Option<Verdict>,
    pub alert: Option<AlertEvent>,
    pub alert_message: Option<String>,
    pub dispatch: Option<DispatchReport>,
    pub owner_vehicle_seen: Option<bool>,
    pub statuses: Vec<StatusMessage>,
}

impl MonitorReport {
    pub fn is_suspicious(&self) -> bool {
        self.verdict.as_ref().is_some_and(Verdict::is_suspicious)
    }

    pub fn messages_sent(&self) -> usize {
        self.dispatch.as_ref().map_or(0, DispatchReport::delivered)
    }

    fn push(&mut self, sink: &mut dyn StatusSink, level: StatusLevel, message: impl Into<String>) {
        let status = StatusMessage {
            level,
            message: message.into(),
        };
        match level {
            StatusLevel::Error => log::warn!("{}", status.message),
            _ => log::info!("{}", status.message),
        }
        sink.status(&status);
        self.statuses.push(status);
    }
}

/// Detector, classifier and dispatcher wired for repeated runs.
///
/// The registry is built once; loaded models are reused across runs.
pub struct Monitor {
    registry: BackendRegistry,
    classifier: SuspicionClassifier,
    dispatcher: AlertDispatcher,
    settings: MonitorSettings,
    plate_reader: Option<Box<dyn PlateReader>>,
}

impl Monitor {
    pub fn new(
        registry: BackendRegistry,
        classifier: SuspicionClassifier,
        dispatcher: AlertDispatcher,
        settings: MonitorSettings,
    ) -> Self {
        Self {
            registry,
            classifier,
            dispatcher,
            settings,
            plate_reader: None,
        }
    }

    pub fn with_plate_reader<R: PlateReader + 'static>(mut self, reader: R) -> Self {
        self.plate_reader = Some(Box::new(reader));
        self
    }

    pub fn run(
        &mut self,
        request: &MonitorRequest,
        sink: &mut dyn StatusSink,
    ) -> Result<MonitorReport> {
        let (media_path, vehicle_id) = validate_request(request)?;
        let kind = MediaKind::from_path(&media_path)
            .map_err(|e| MonitorError::UnsupportedMedia(e.to_string()))?;

        let mut report = MonitorReport {
            media_kind: Some(kind),
            ..MonitorReport::default()
        };
        report.push(sink, StatusLevel::Info, "Monitoring started...");

        let source = FileSource::new(FileConfig {
            path: media_path,
            sample_every: self.settings.video_sample_every,
            max_frames: self.settings.video_max_frames,
        });
        let source = match source {
            Ok(source) => source,
            Err(e) if e.downcast_ref::<IngestError>() == Some(&IngestError::VideoUnsupported) => {
                self.request_manual_review(&mut report, sink, request, vehicle_id);
                return Ok(report);
            }
            Err(e) => return Err(e),
        };

        let mut plate_text: Option<String> = None;
        for frame in source {
            let frame = frame?;
            let result = self
                .registry
                .detect_with_capability(DetectionCapability::ObjectDetection, &frame)?;
            if plate_text.is_none() {
                if let Some(reader) = self.plate_reader.as_mut() {
                    match reader.read_plate(&frame) {
                        Ok(text) => plate_text = text,
                        Err(e) => {
                            log::warn!("plate read failed on frame {}: {:#}", frame.index, e)
                        }
                    }
                }
            }
            report.frames_processed += 1;
            report.detections.extend(result.detections);
        }
        if report.frames_processed == 0 {
            anyhow::bail!("no frames could be decoded from the upload");
        }
        log::info!(
            "{} frame(s) processed, {} detection(s)",
            report.frames_processed,
            report.detections.len()
        );

        if !self.settings.settle_delay.is_zero() {
            log::info!(
                "waiting {:?} before evaluating the scene",
                self.settings.settle_delay
            );
            std::thread::sleep(self.settings.settle_delay);
        }

        if self.plate_reader.is_some() {
            let seen = plate_text
                .as_deref()
                .is_some_and(|text| owner_vehicle_seen(vehicle_id, text));
            report.owner_vehicle_seen = Some(seen);
            if seen {
                report.push(sink, StatusLevel::Success, "Owner vehicle detected");
            } else {
                report.push(sink, StatusLevel::Warning, "Unknown vehicle detected");
            }
        }

        let verdict = self.classifier.classify(&report.detections, request.area);
        if let Some(alert) =
            AlertEvent::from_verdict(&verdict, Some(vehicle_id), request.area, Local::now())
        {
            let reasons: Vec<&str> = verdict.reasons.iter().map(|r| r.describe()).collect();
            report.push(
                sink,
                StatusLevel::Error,
                format!("Suspicious activity detected: {}", reasons.join("; ")),
            );
            let message = alert.message();
            self.send(&mut report, sink, &message, request.channels);
            report.alert = Some(alert);
            report.alert_message = Some(message);
        } else {
            report.push(
                sink,
                StatusLevel::Success,
                "Monitoring completed – no threats detected",
            );
        }
        report.verdict = Some(verdict);
        Ok(report)
    }

    fn request_manual_review(
        &self,
        report: &mut MonitorReport,
        sink: &mut dyn StatusSink,
        request: &MonitorRequest,
        vehicle_id: &str,
    ) {
        report.push(
            sink,
            StatusLevel::Warning,
            "Video analysis is not available in this build; sending a manual review notice",
        );
        let notice = manual_review_notice(Some(vehicle_id), request.area);
        self.send(report, sink, &notice, request.channels);
        report.alert_message = Some(notice);
    }

    fn send(
        &self,
        report: &mut MonitorReport,
        sink: &mut dyn StatusSink,
        body: &str,
        channels: ChannelSelection,
    ) {
        if channels.is_empty() {
            report.push(
                sink,
                StatusLevel::Warning,
                "No alert channel selected; notification not sent",
            );
            return;
        }
        let dispatch = self.dispatcher.dispatch(body, channels);
        for outcome in &dispatch.outcomes {
            match &outcome.error {
                None => report.push(
                    sink,
                    StatusLevel::Success,
                    format!("{} alert sent", outcome.channel),
                ),
                Some(error) => report.push(
                    sink,
                    StatusLevel::Error,
                    format!("{} alert failed: {}", outcome.channel, error),
                ),
            }
        }
        report.dispatch = Some(dispatch);
    }
}

fn validate_request(request: &MonitorRequest) -> Result<(PathBuf, &str), MonitorError> {
    let media_path = request
        .media_path
        .as_ref()
        .filter(|p| !p.as_os_str().is_empty())
        .ok_or(MonitorError::MissingInput("media file"))?;
    let vehicle_id = request
        .vehicle_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or(MonitorError::MissingInput("vehicle number"))?;
    if !media_path.is_file() {
        return Err(MonitorError::MediaNotFound(media_path.clone()));
    }
    Ok((media_path.clone(), vehicle_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_media_is_reported_first() {
        let request = MonitorRequest::default();
        assert_eq!(
            validate_request(&request).unwrap_err(),
            MonitorError::MissingInput("media file")
        );
    }

    #[test]
    fn blank_vehicle_number_is_missing_input() {
        let request = MonitorRequest {
            media_path: Some(PathBuf::from("lot.jpg")),
            vehicle_id: Some("   ".to_string()),
            ..MonitorRequest::default()
        };
        assert_eq!(
            validate_request(&request).unwrap_err(),
            MonitorError::MissingInput("vehicle number")
        );
    }

    #[test]
    fn nonexistent_media_is_rejected() {
        let request = MonitorRequest {
            media_path: Some(PathBuf::from("/nonexistent/lot.jpg")),
            vehicle_id: Some("TN09AB1234".to_string()),
            ..MonitorRequest::default()
        };
        let err = validate_request(&request).unwrap_err();
        assert!(matches!(err, MonitorError::MediaNotFound(_)));
        assert!(err.to_string().contains("/nonexistent/lot.jpg"));
    }
}
