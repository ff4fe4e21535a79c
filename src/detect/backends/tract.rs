#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::{imageops, Rgb, RgbImage};
use tract_onnx::prelude::*;

use crate::detect::backend::{DetectionCapability, DetectorBackend};
use crate::detect::result::DetectionResult;
use crate::detect::yolo::{
    decode_predictions, non_max_suppression, Letterbox, COCO_CLASSES, LETTERBOX_FILL,
};
use crate::frame::Frame;

/// Tract-based backend for YOLOv8 ONNX object detection.
///
/// This backend loads a local model file once and performs inference on RGB
/// frames. It does not perform any network I/O.
pub struct TractBackend {
    model: SimplePlan<TypedFact, Box<dyn TypedOp>>,
    input_size: u32,
    confidence_threshold: f32,
    iou_threshold: f32,
}

impl TractBackend {
    /// Load an ONNX model from disk and prepare it for `input_size` square inputs.
    pub fn new<P: AsRef<Path>>(model_path: P, input_size: u32) -> Result<Self> {
        let model_path = model_path.as_ref();
        if input_size == 0 {
            return Err(anyhow!("model input size must be greater than zero"));
        }
        let side = input_size as usize;
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(f32::datum_type(), tvec!(1, 3, side, side)),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        log::info!(
            "loaded detector model {} ({}x{})",
            model_path.display(),
            input_size,
            input_size
        );

        Ok(Self {
            model,
            input_size,
            confidence_threshold: 0.25,
            iou_threshold: 0.45,
        })
    }

    /// Override the default confidence and NMS thresholds.
    pub fn with_thresholds(mut self, confidence: f32, iou: f32) -> Self {
        self.confidence_threshold = confidence;
        self.iou_threshold = iou;
        self
    }

    fn build_input(&self, frame: &Frame, letterbox: &Letterbox) -> Result<Tensor> {
        let source = frame.to_rgb_image()?;
        let resized = imageops::resize(
            &source,
            letterbox.resized_w,
            letterbox.resized_h,
            imageops::FilterType::Triangle,
        );
        let mut canvas = RgbImage::from_pixel(
            self.input_size,
            self.input_size,
            Rgb([LETTERBOX_FILL; 3]),
        );
        imageops::overlay(
            &mut canvas,
            &resized,
            letterbox.pad_x as i64,
            letterbox.pad_y as i64,
        );

        let side = self.input_size as usize;
        let input = tract_ndarray::Array4::from_shape_fn((1, 3, side, side), |(_, c, y, x)| {
            canvas.get_pixel(x as u32, y as u32).0[c] as f32 / 255.0
        });
        Ok(input.into_tensor())
    }
}

impl DetectorBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn supports(&self, capability: DetectionCapability) -> bool {
        matches!(capability, DetectionCapability::ObjectDetection)
    }

    fn detect(&mut self, frame: &Frame) -> Result<DetectionResult> {
        let letterbox = Letterbox::new(frame.width, frame.height, self.input_size);
        let input = self.build_input(frame, &letterbox)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let view = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?;
        let shape = view.shape();
        if shape.len() != 3 || shape[0] != 1 {
            return Err(anyhow!(
                "unexpected detector output shape {:?}; expected [1, 4 + classes, anchors]",
                shape
            ));
        }
        let num_anchors = shape[2];
        let flat: Vec<f32> = view.iter().copied().collect();

        let detections = decode_predictions(
            &flat,
            num_anchors,
            &COCO_CLASSES,
            &letterbox,
            self.confidence_threshold,
        );
        let detections = non_max_suppression(detections, self.iou_threshold);
        log::debug!(
            "tract: frame {} -> {} detections",
            frame.index,
            detections.len()
        );
        Ok(DetectionResult { detections })
    }

    fn warm_up(&mut self) -> Result<()> {
        let side = self.input_size;
        let len = Letterbox::rgb_len(side)
            .ok_or_else(|| anyhow!("model input size {} is too large", side))?;
        let blank = Frame::from_rgb(vec![LETTERBOX_FILL; len], side, side, 0)?;
        self.detect(&blank).map(|_| ())
    }
}
