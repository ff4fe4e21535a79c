//! Owner vehicle check against number-plate text.
//!
//! Plate reading itself is delegated to a `PlateReader`. The check only
//! produces a status for the operator; it never suppresses an alert.

use anyhow::Result;

use crate::frame::Frame;

#[cfg(feature = "plate-ocrs")]
mod ocr;

#[cfg(feature = "plate-ocrs")]
pub use ocr::OcrsPlateReader;

/// Source of number-plate text for a frame.
pub trait PlateReader: Send {
    fn read_plate(&mut self, frame: &Frame) -> Result<Option<String>>;
}

/// Plate reader that returns caller-supplied text for every frame.
#[derive(Clone, Debug)]
pub struct FixedPlateReader {
    text: String,
}

impl FixedPlateReader {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl PlateReader for FixedPlateReader {
    fn read_plate(&mut self, _frame: &Frame) -> Result<Option<String>> {
        Ok(Some(self.text.clone()))
    }
}

/// Uppercase alphanumerics only; OCR output routinely carries spaces and dashes.
pub fn normalize_plate(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// True when the owner's id appears in the plate text read from the scene.
pub fn owner_vehicle_seen(owner_id: &str, plate_text: &str) -> bool {
    let owner = normalize_plate(owner_id);
    !owner.is_empty() && normalize_plate(plate_text).contains(&owner)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_separators() {
        assert_eq!(normalize_plate(" tn 09-ab 1234\n"), "TN09AB1234");
    }

    #[test]
    fn owner_match_ignores_formatting() {
        assert!(owner_vehicle_seen("TN09AB1234", "IND TN 09 AB 1234"));
        assert!(owner_vehicle_seen("tn09ab1234", "TN09AB1234"));
        assert!(!owner_vehicle_seen("TN09AB1234", "KA01XY9999"));
    }

    #[test]
    fn blank_owner_never_matches() {
        assert!(!owner_vehicle_seen("  ", "TN09AB1234"));
    }

    #[test]
    fn fixed_reader_returns_its_text() {
        let mut reader = FixedPlateReader::new("TN 09 AB 1234");
        let frame = Frame::from_rgb(vec![0u8; 3], 1, 1, 0).unwrap();
        assert_eq!(
            reader.read_plate(&frame).unwrap().as_deref(),
            Some("TN 09 AB 1234")
        );
    }
}
