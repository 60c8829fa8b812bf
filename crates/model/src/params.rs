use crate::error::DetectorError;
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_INPUT_SIZE: (u32, u32) = (640, 640);

/// How the network lays out its outputs, which also fixes the input
/// normalization the network was trained with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputLayout {
    /// Single output `[1, 4 + nc, anchors]` (or its transpose), boxes as
    /// `cx, cy, w, h` in input pixels, class scores already activated.
    #[default]
    Yolo,
    /// `dets [1, Q, 4]` normalized `cx, cy, w, h` and `labels [1, Q, C]`
    /// class logits with index 0 reserved for background.
    Detr,
}

impl OutputLayout {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputLayout::Yolo => "yolo",
            OutputLayout::Detr => "detr",
        }
    }

    /// Number of tensors the backend must return for this layout.
    pub fn num_outputs(&self) -> usize {
        match self {
            OutputLayout::Yolo => 1,
            OutputLayout::Detr => 2,
        }
    }
}

impl fmt::Display for OutputLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputLayout {
    type Err = DetectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "yolo" | "yolov8" | "yolo11" => Ok(OutputLayout::Yolo),
            "detr" | "rtdetr" | "rf-detr" | "rfdetr" => Ok(OutputLayout::Detr),
            other => Err(DetectorError::InvalidParams(format!(
                "unknown output layout '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionProvider {
    #[default]
    Cpu,
    Cuda {
        device_id: i32,
    },
}

impl ExecutionProvider {
    pub fn parse(name: &str, device_id: i32) -> Result<Self, DetectorError> {
        match name.trim().to_lowercase().as_str() {
            "cpu" => Ok(ExecutionProvider::Cpu),
            "cuda" | "gpu" => Ok(ExecutionProvider::Cuda { device_id }),
            other => Err(DetectorError::InvalidParams(format!(
                "unknown execution provider '{}'",
                other
            ))),
        }
    }
}

/// Detection configuration shared by every worker built from it.
#[derive(Debug, Clone, PartialEq)]
pub struct Params {
    /// Network input as `(width, height)`.
    pub input_size: (u32, u32),
    pub confidence_threshold: f32,
    /// IoU above which a lower-scored box of the same class is suppressed.
    pub nms_threshold: f32,
    pub max_detections: usize,
    /// Inferred from the output shape when `None`.
    pub num_classes: Option<usize>,
    pub layout: OutputLayout,
    pub provider: ExecutionProvider,
    pub intra_threads: usize,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            input_size: DEFAULT_INPUT_SIZE,
            confidence_threshold: 0.25,
            nms_threshold: 0.45,
            max_detections: 300,
            num_classes: None,
            layout: OutputLayout::default(),
            provider: ExecutionProvider::default(),
            intra_threads: 4,
        }
    }
}

impl Params {
    pub fn validate(&self) -> Result<(), DetectorError> {
        let (width, height) = self.input_size;
        if width == 0 || height == 0 {
            return Err(DetectorError::InvalidParams(format!(
                "input size must be non-zero, got {}x{}",
                width, height
            )));
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(DetectorError::InvalidParams(format!(
                "confidence threshold must be within [0, 1], got {}",
                self.confidence_threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.nms_threshold) {
            return Err(DetectorError::InvalidParams(format!(
                "NMS threshold must be within [0, 1], got {}",
                self.nms_threshold
            )));
        }
        if self.max_detections == 0 {
            return Err(DetectorError::InvalidParams(
                "max detections must be at least 1".to_string(),
            ));
        }
        if self.num_classes == Some(0) {
            return Err(DetectorError::InvalidParams(
                "number of classes must be at least 1".to_string(),
            ));
        }
        if self.intra_threads == 0 {
            return Err(DetectorError::InvalidParams(
                "intra threads must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
