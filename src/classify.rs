//! Suspicion classifier.
//!
//! Decides whether the objects seen in an upload warrant an alert. The
//! decision is a boolean OR over a handful of label-set rules; the rules and
//! label sets come from `ClassifierPolicy`, never from globals.

use std::collections::BTreeSet;
use std::str::FromStr;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::detect::Detection;

pub const DEFAULT_SUSPICIOUS_LABELS: [&str; 4] = ["person", "knife", "stick", "crowbar"];
pub const DEFAULT_VEHICLE_LABELS: [&str; 4] = ["car", "motorcycle", "bus", "truck"];

/// Classification of the monitored zone.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AreaType {
    #[default]
    Authorized,
    Restricted,
}

impl AreaType {
    pub fn display_name(&self) -> &'static str {
        match self {
            AreaType::Authorized => "Authorized Parking Area",
            AreaType::Restricted => "Restricted / No Parking Area",
        }
    }
}

impl std::fmt::Display for AreaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for AreaType {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        let normalized = value.trim().to_lowercase();
        match normalized.as_str() {
            "authorized" | "authorised" | "authorized parking area" => Ok(AreaType::Authorized),
            "restricted" | "no-parking" | "no_parking" | "restricted / no parking area" => {
                Ok(AreaType::Restricted)
            }
            _ => Err(anyhow!(
                "unknown area type '{}'; expected 'authorized' or 'restricted'",
                value.trim()
            )),
        }
    }
}

/// Whether a detected vehicle alone is suspicious.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehiclePolicy {
    /// Vehicles only matter in restricted areas.
    #[default]
    RestrictedOnly,
    /// Any detected vehicle raises an alert, whatever the area type.
    Always,
}

impl FromStr for VehiclePolicy {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().replace('-', "_").as_str() {
            "restricted_only" | "restricted" => Ok(VehiclePolicy::RestrictedOnly),
            "always" => Ok(VehiclePolicy::Always),
            other => Err(anyhow!(
                "unknown vehicle policy '{}'; expected 'restricted_only' or 'always'",
                other
            )),
        }
    }
}

/// Why a verdict came out suspicious.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Reason {
    SuspiciousObject,
    VehicleInRestrictedArea,
    RestrictedArea,
    VehiclePresent,
}

impl Reason {
    pub fn describe(&self) -> &'static str {
        match self {
            Reason::SuspiciousObject => "suspicious object near vehicle",
            Reason::VehicleInRestrictedArea => "vehicle in restricted area",
            Reason::RestrictedArea => "unauthorized parking in restricted area",
            Reason::VehiclePresent => "vehicle detected",
        }
    }
}

impl std::fmt::Display for Reason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.describe())
    }
}

/// Label sets and switches the classifier runs with.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassifierPolicy {
    pub suspicious_labels: BTreeSet<String>,
    pub vehicle_labels: BTreeSet<String>,
    /// In a restricted area, alert only when a vehicle is actually detected.
    pub restricted_requires_vehicle: bool,
    pub vehicle_policy: VehiclePolicy,
}

impl Default for ClassifierPolicy {
    fn default() -> Self {
        Self {
            suspicious_labels: normalize_labels(DEFAULT_SUSPICIOUS_LABELS),
            vehicle_labels: normalize_labels(DEFAULT_VEHICLE_LABELS),
            restricted_requires_vehicle: true,
            vehicle_policy: VehiclePolicy::RestrictedOnly,
        }
    }
}

impl ClassifierPolicy {
    pub fn validate(&self) -> Result<()> {
        if self.suspicious_labels.is_empty() {
            return Err(anyhow!("suspicious label set must not be empty"));
        }
        if self.vehicle_labels.is_empty() {
            return Err(anyhow!("vehicle label set must not be empty"));
        }
        Ok(())
    }
}

/// Outcome of classifying one upload.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Verdict {
    pub suspicious: bool,
    pub reasons: Vec<Reason>,
    pub triggering_labels: BTreeSet<String>,
}

impl Verdict {
    pub fn is_suspicious(&self) -> bool {
        self.suspicious
    }

    fn fire(&mut self, reason: Reason) {
        self.suspicious = true;
        if !self.reasons.contains(&reason) {
            self.reasons.push(reason);
        }
    }
}

/// Applies a `ClassifierPolicy` to detector output.
#[derive(Clone, Debug, Default)]
pub struct SuspicionClassifier {
    policy: ClassifierPolicy,
}

impl SuspicionClassifier {
    pub fn new(policy: ClassifierPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &ClassifierPolicy {
        &self.policy
    }

    pub fn classify(&self, detections: &[Detection], area: AreaType) -> Verdict {
        self.classify_labels(detections.iter().map(|d| d.label.as_str()), area)
    }

    pub fn classify_labels<'a, I>(&self, labels: I, area: AreaType) -> Verdict
    where
        I: IntoIterator<Item = &'a str>,
    {
        let labels: BTreeSet<String> = labels.into_iter().map(normalize_label).collect();
        let suspicious: Vec<&String> = labels
            .iter()
            .filter(|l| self.policy.suspicious_labels.contains(*l))
            .collect();
        let vehicles: Vec<&String> = labels
            .iter()
            .filter(|l| self.policy.vehicle_labels.contains(*l))
            .collect();

        let mut verdict = Verdict::default();

        if !suspicious.is_empty() {
            verdict.fire(Reason::SuspiciousObject);
            verdict
                .triggering_labels
                .extend(suspicious.iter().map(|l| l.to_string()));
        }

        if area == AreaType::Restricted {
            if !self.policy.restricted_requires_vehicle {
                verdict.fire(Reason::RestrictedArea);
                verdict
                    .triggering_labels
                    .extend(vehicles.iter().map(|l| l.to_string()));
            } else if !vehicles.is_empty() {
                verdict.fire(Reason::VehicleInRestrictedArea);
                verdict
                    .triggering_labels
                    .extend(vehicles.iter().map(|l| l.to_string()));
            }
        }

        if self.policy.vehicle_policy == VehiclePolicy::Always && !vehicles.is_empty() {
            verdict.fire(Reason::VehiclePresent);
            verdict
                .triggering_labels
                .extend(vehicles.iter().map(|l| l.to_string()));
        }

        verdict.reasons.sort();
        verdict
    }
}

pub fn normalize_label(label: &str) -> String {
    label.trim().to_ascii_lowercase()
}

/// Normalise a label list, dropping blanks.
pub fn normalize_labels<I, S>(labels: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    labels
        .into_iter()
        .map(|l| normalize_label(l.as_ref()))
        .filter(|l| !l.is_empty())
        .collect()
}
