//! YOLOv8 pre/post-processing shared by ONNX backends.
//!
//! Output layout is `[1, 4 + classes, anchors]`: rows 0..4 hold the box
//! centre/size in letterboxed input pixels, the remaining rows hold one score
//! per class.

use crate::detect::result::{BoundingBox, Detection};

/// Padding value used by the letterbox, matching the exporter (114/255).
pub(crate) const LETTERBOX_FILL: u8 = 114;

/// COCO-80 class names in model output order.
pub const COCO_CLASSES: [&str; 80] = [
    "person",
    "bicycle",
    "car",
    "motorcycle",
    "airplane",
    "bus",
    "train",
    "truck",
    "boat",
    "traffic light",
    "fire hydrant",
    "stop sign",
    "parking meter",
    "bench",
    "bird",
    "cat",
    "dog",
    "horse",
    "sheep",
    "cow",
    "elephant",
    "bear",
    "zebra",
    "giraffe",
    "backpack",
    "umbrella",
    "handbag",
    "tie",
    "suitcase",
    "frisbee",
    "skis",
    "snowboard",
    "sports ball",
    "kite",
    "baseball bat",
    "baseball glove",
    "skateboard",
    "surfboard",
    "tennis racket",
    "bottle",
    "wine glass",
    "cup",
    "fork",
    "knife",
    "spoon",
    "bowl",
    "banana",
    "apple",
    "sandwich",
    "orange",
    "broccoli",
    "carrot",
    "hot dog",
    "pizza",
    "donut",
    "cake",
    "chair",
    "couch",
    "potted plant",
    "bed",
    "dining table",
    "toilet",
    "tv",
    "laptop",
    "mouse",
    "remote",
    "keyboard",
    "cell phone",
    "microwave",
    "oven",
    "toaster",
    "sink",
    "refrigerator",
    "book",
    "clock",
    "vase",
    "scissors",
    "teddy bear",
    "hair drier",
    "toothbrush",
];

/// Aspect-preserving resize into a square model input.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct Letterbox {
    pub scale: f32,
    pub pad_x: f32,
    pub pad_y: f32,
    pub resized_w: u32,
    pub resized_h: u32,
    src_w: f32,
    src_h: f32,
}

impl Letterbox {
    pub fn new(src_w: u32, src_h: u32, size: u32) -> Self {
        let (w0, h0) = (src_w.max(1) as f32, src_h.max(1) as f32);
        let scale = (size as f32 / w0).min(size as f32 / h0);
        let resized_w = ((w0 * scale).round() as u32).clamp(1, size);
        let resized_h = ((h0 * scale).round() as u32).clamp(1, size);
        Self {
            scale,
            pad_x: ((size - resized_w) / 2) as f32,
            pad_y: ((size - resized_h) / 2) as f32,
            resized_w,
            resized_h,
            src_w: w0,
            src_h: h0,
        }
    }

    /// Byte length of a packed RGB square input of side `size`, if addressable.
    pub fn rgb_len(size: u32) -> Option<usize> {
        let side = usize::try_from(size).ok()?;
        side.checked_mul(side)?.checked_mul(3)
    }

    /// Map a centre/size box from model input space back to the source frame.
    pub fn to_source(&self, cx: f32, cy: f32, w: f32, h: f32) -> BoundingBox {
        let x1 = (cx - w / 2.0 - self.pad_x) / self.scale;
        let y1 = (cy - h / 2.0 - self.pad_y) / self.scale;
        let x2 = (cx + w / 2.0 - self.pad_x) / self.scale;
        let y2 = (cy + h / 2.0 - self.pad_y) / self.scale;
        BoundingBox::new(
            x1.clamp(0.0, self.src_w),
            y1.clamp(0.0, self.src_h),
            x2.clamp(0.0, self.src_w),
            y2.clamp(0.0, self.src_h),
        )
    }
}

/// Decode a flattened `[4 + classes, anchors]` prediction tensor.
pub(crate) fn decode_predictions(
    output: &[f32],
    num_anchors: usize,
    names: &[&str],
    letterbox: &Letterbox,
    confidence_threshold: f32,
) -> Vec<Detection> {
    let rows = if num_anchors == 0 {
        0
    } else {
        output.len() / num_anchors
    };
    if rows <= 4 {
        return Vec::new();
    }
    let num_classes = rows - 4;
    let at = |row: usize, anchor: usize| output[row * num_anchors + anchor];

    let mut detections = Vec::new();
    for anchor in 0..num_anchors {
        let mut best = (0usize, f32::NEG_INFINITY);
        for class in 0..num_classes {
            let score = at(4 + class, anchor);
            if score > best.1 {
                best = (class, score);
            }
        }
        let (class, confidence) = best;
        if confidence < confidence_threshold {
            continue;
        }
        let bbox = letterbox.to_source(at(0, anchor), at(1, anchor), at(2, anchor), at(3, anchor));
        let label = names
            .get(class)
            .map(|name| name.to_string())
            .unwrap_or_else(|| format!("class_{}", class));
        detections.push(Detection::new(label, confidence, bbox));
    }
    detections
}

/// Class-wise non-max suppression. Output is sorted by descending confidence.
pub(crate) fn non_max_suppression(
    mut detections: Vec<Detection>,
    iou_threshold: f32,
) -> Vec<Detection> {
    detections.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut kept: Vec<Detection> = Vec::with_capacity(detections.len());
    for candidate in detections {
        let overlaps = kept
            .iter()
            .any(|k| k.label == candidate.label && k.bbox.iou(&candidate.bbox) > iou_threshold);
        if !overlaps {
            kept.push(candidate);
        }
    }
    kept
}
