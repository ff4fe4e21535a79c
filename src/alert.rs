//! Alert events and their outbound message text.

use std::collections::BTreeSet;

use chrono::{DateTime, Local};
use serde::Serialize;

use crate::classify::{AreaType, Reason, Verdict};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A confirmed suspicious observation, alive only until it is sent.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AlertEvent {
    pub vehicle_id: Option<String>,
    pub area_type: AreaType,
    pub triggering_labels: BTreeSet<String>,
    pub reasons: Vec<Reason>,
    pub timestamp: DateTime<Local>,
}

impl AlertEvent {
    /// Build an alert from a suspicious verdict. Returns `None` for clean verdicts.
    pub fn from_verdict(
        verdict: &Verdict,
        vehicle_id: Option<&str>,
        area_type: AreaType,
        timestamp: DateTime<Local>,
    ) -> Option<Self> {
        if !verdict.suspicious {
            return None;
        }
        let vehicle_id = vehicle_id
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string);
        Some(Self {
            vehicle_id,
            area_type,
            triggering_labels: verdict.triggering_labels.clone(),
            reasons: verdict.reasons.clone(),
            timestamp,
        })
    }

    /// Render the fixed notification template.
    pub fn message(&self) -> String {
        let reasons = if self.reasons.is_empty() {
            "suspicious activity".to_string()
        } else {
            self.reasons
                .iter()
                .map(Reason::describe)
                .collect::<Vec<_>>()
                .join("; ")
        };
        let labels = if self.triggering_labels.is_empty() {
            "none".to_string()
        } else {
            self.triggering_labels
                .iter()
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(", ")
        };
        format!(
            "🚨 Parking alert\nVehicle: {}\nArea: {}\nReason: {}\nDetected: {}\nTime: {}",
            self.vehicle_id.as_deref().unwrap_or("unknown"),
            self.area_type.display_name(),
            reasons,
            labels,
            self.timestamp.format(TIMESTAMP_FORMAT)
        )
    }
}

/// Notice sent when an uploaded video cannot be analysed automatically.
pub fn manual_review_notice(vehicle_id: Option<&str>, area_type: AreaType) -> String {
    format!(
        "ℹ Video uploaded for {} ({}). Please review manually.",
        vehicle_id
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .unwrap_or("unknown vehicle"),
        area_type.display_name()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::SuspicionClassifier;
    use chrono::TimeZone;

    fn at_noon() -> DateTime<Local> {
        Local.with_ymd_and_hms(2024, 3, 9, 12, 30, 5).unwrap()
    }

    #[test]
    fn clean_verdict_builds_no_alert() {
        let verdict = SuspicionClassifier::default().classify_labels([], AreaType::Authorized);
        let alert = AlertEvent::from_verdict(
            &verdict,
            Some("TN09AB1234"),
            AreaType::Authorized,
            at_noon(),
        );
        assert!(alert.is_none());
    }

    #[test]
    fn message_embeds_vehicle_area_labels_and_time() {
        let classifier = SuspicionClassifier::default();
        let verdict = classifier.classify_labels(["car", "person"], AreaType::Restricted);
        let alert = AlertEvent::from_verdict(
            &verdict,
            Some(" TN09AB1234 "),
            AreaType::Restricted,
            at_noon(),
        )
        .unwrap();
        assert_eq!(
            alert.message(),
            "🚨 Parking alert\n\
             Vehicle: TN09AB1234\n\
             Area: Restricted / No Parking Area\n\
             Reason: suspicious object near vehicle; vehicle in restricted area\n\
             Detected: car, person\n\
             Time: 2024-03-09 12:30:05"
        );
    }

    #[test]
    fn blank_vehicle_id_renders_as_unknown() {
        let classifier = SuspicionClassifier::default();
        let verdict = classifier.classify_labels(["knife"], AreaType::Authorized);
        let alert = AlertEvent::from_verdict(&verdict, Some("  "), AreaType::Authorized, at_noon())
            .unwrap();
        assert_eq!(alert.vehicle_id, None);
        assert!(alert.message().contains("Vehicle: unknown\n"));
    }

    #[test]
    fn manual_review_notice_names_the_vehicle() {
        assert_eq!(
            manual_review_notice(Some("KA01XY9999"), AreaType::Authorized),
            "ℹ Video uploaded for KA01XY9999 (Authorized Parking Area). Please review manually."
        );
        assert!(manual_review_notice(None, AreaType::Restricted).contains("unknown vehicle"));
    }
}
