//! Plate text through ocrs text detection and recognition.
//!
//! The frame is reduced to grayscale before recognition; ocrs still expects
//! three channels, so the gray plane is expanded back to RGB.

use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use image::DynamicImage;
use ocrs::{ImageSource, OcrEngine, OcrEngineParams};
use rten::Model;

use super::PlateReader;
use crate::frame::Frame;

pub struct OcrsPlateReader {
    engine: OcrEngine,
}

impl OcrsPlateReader {
    pub fn new(detection_model: &Path, recognition_model: &Path) -> Result<Self> {
        for path in [detection_model, recognition_model] {
            if !path.exists() {
                bail!(
                    "OCR model not found at {}; download the ocrs models or set \
                     PARKING_OCR_DETECTION_MODEL / PARKING_OCR_RECOGNITION_MODEL",
                    path.display()
                );
            }
        }
        let detection = Model::load_file(detection_model)
            .with_context(|| format!("cannot load {}", detection_model.display()))?;
        let recognition = Model::load_file(recognition_model)
            .with_context(|| format!("cannot load {}", recognition_model.display()))?;
        let engine = OcrEngine::new(OcrEngineParams {
            detection_model: Some(detection),
            recognition_model: Some(recognition),
            ..Default::default()
        })?;
        log::info!(
            "plate OCR ready ({}, {})",
            detection_model.display(),
            recognition_model.display()
        );
        Ok(Self { engine })
    }
}

impl PlateReader for OcrsPlateReader {
    fn read_plate(&mut self, frame: &Frame) -> Result<Option<String>> {
        let gray = DynamicImage::ImageRgb8(frame.to_rgb_image()?).to_luma8();
        let rgb = DynamicImage::ImageLuma8(gray).to_rgb8();
        let source = ImageSource::from_bytes(rgb.as_raw(), rgb.dimensions())
            .map_err(|e| anyhow!("frame {} rejected by OCR: {:?}", frame.index, e))?;
        let input = self.engine.prepare_input(source)?;
        let text = self.engine.get_text(&input)?;
        let text = text.trim();
        log::debug!("OCR read {:?} from frame {}", text, frame.index);
        Ok((!text.is_empty()).then(|| text.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_model_is_reported_with_its_path() {
        let missing = Path::new("/nonexistent/text-detection.rten");
        let err = OcrsPlateReader::new(missing, missing).err().expect("missing model");
        assert!(err.to_string().contains("/nonexistent/text-detection.rten"));
    }
}
