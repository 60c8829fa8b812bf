use crate::{
    backend::InferenceOutput,
    detector::{BBox, Detections},
    error::DetectorError,
    params::{OutputLayout, Params},
    processing::pre::LetterboxTransform,
};
use ndarray::ArrayViewD;

pub struct PostProcessor {
    pub confidence_threshold: f32,
    pub nms_threshold: f32,
    pub max_detections: usize,
    pub num_classes: Option<usize>,
}

impl PostProcessor {
    pub fn new(params: &Params) -> Self {
        Self {
            confidence_threshold: params.confidence_threshold,
            nms_threshold: params.nms_threshold,
            max_detections: params.max_detections,
            num_classes: params.num_classes,
        }
    }

    /// Decode raw network outputs into detections on the original image.
    pub fn process(
        &self,
        layout: OutputLayout,
        output: &InferenceOutput,
        transform: &LetterboxTransform,
    ) -> Result<Detections, DetectorError> {
        if output.len() != layout.num_outputs() {
            return Err(DetectorError::UnexpectedOutput(format!(
                "{} layout expects {} output tensors, got {}",
                layout,
                layout.num_outputs(),
                output.len()
            )));
        }

        match layout {
            OutputLayout::Yolo => self.parse_yolo(&output.tensors[0].view(), transform),
            OutputLayout::Detr => self.parse_detr(
                &output.tensors[0].view(),
                &output.tensors[1].view(),
                transform,
            ),
        }
    }

    /// Parse a YOLO head: `[1, 4 + nc, anchors]` or `[1, anchors, 4 + nc]`,
    /// boxes as `cx, cy, w, h` in input pixels.
    #[tracing::instrument(skip_all)]
    pub fn parse_yolo(
        &self,
        preds: &ArrayViewD<f32>,
        transform: &LetterboxTransform,
    ) -> Result<Detections, DetectorError> {
        let shape = preds.shape();
        if shape.len() != 3 || shape[0] != 1 {
            return Err(DetectorError::UnexpectedOutput(format!(
                "expected [1, 4 + classes, anchors], got {:?}",
                shape
            )));
        }

        let (channels_first, channels, anchors) = match self.num_classes {
            Some(nc) if shape[1] == 4 + nc => (true, shape[1], shape[2]),
            Some(nc) if shape[2] == 4 + nc => (false, shape[2], shape[1]),
            Some(nc) => {
                return Err(DetectorError::UnexpectedOutput(format!(
                    "{} classes do not match output shape {:?}",
                    nc, shape
                )));
            }
            // Anchors always outnumber channels on real heads
            None if shape[1] <= shape[2] => (true, shape[1], shape[2]),
            None => (false, shape[2], shape[1]),
        };

        if channels <= 4 {
            return Err(DetectorError::UnexpectedOutput(format!(
                "output shape {:?} has no class scores",
                shape
            )));
        }

        let value = |anchor: usize, channel: usize| {
            if channels_first {
                preds[[0, channel, anchor]]
            } else {
                preds[[0, anchor, channel]]
            }
        };

        let mut candidates = Vec::new();

        for anchor in 0..anchors {
            let mut confidence = f32::NEG_INFINITY;
            let mut class_idx = 0usize;
            for c in 4..channels {
                let score = value(anchor, c);
                if score > confidence {
                    confidence = score;
                    class_idx = c - 4;
                }
            }

            if !(confidence >= self.confidence_threshold) {
                continue;
            }

            let input_box = BBox::from_cxcywh(
                value(anchor, 0),
                value(anchor, 1),
                value(anchor, 2),
                value(anchor, 3),
                class_idx as u32,
            );

            if let Some(bbox) = to_original(&input_box, transform) {
                candidates.push((confidence, bbox));
            }
        }

        tracing::trace!(anchors, candidates = candidates.len(), "Decoded YOLO head");

        non_max_suppression(&mut candidates, self.nms_threshold, self.max_detections);

        Ok(candidates.into_iter().collect())
    }

    /// Parse a DETR head: `dets [1, Q, 4]` normalized `cx, cy, w, h` and
    /// `logits [1, Q, C]`.
    ///
    /// Class index 0 is background; the reported `class_id` is shifted down by
    /// one so the first real class is 0.
    #[tracing::instrument(skip_all)]
    pub fn parse_detr(
        &self,
        dets: &ArrayViewD<f32>,
        logits: &ArrayViewD<f32>,
        transform: &LetterboxTransform,
    ) -> Result<Detections, DetectorError> {
        let dets_shape = dets.shape();
        let logits_shape = logits.shape();
        if dets_shape.len() != 3
            || logits_shape.len() != 3
            || dets_shape[2] != 4
            || dets_shape[..2] != logits_shape[..2]
            || logits_shape[2] < 2
        {
            return Err(DetectorError::UnexpectedOutput(format!(
                "expected dets [1, Q, 4] and logits [1, Q, C], got {:?} and {:?}",
                dets_shape, logits_shape
            )));
        }

        let num_queries = dets_shape[1];
        let num_classes = logits_shape[2];

        let mut candidates = Vec::new();

        for i in 0..num_queries {
            let mut max_logit = f32::NEG_INFINITY;
            let mut class_idx = 1usize;
            for c in 1..num_classes {
                let logit = logits[[0, i, c]];
                if logit > max_logit {
                    max_logit = logit;
                    class_idx = c;
                }
            }

            let confidence = sigmoid(max_logit);

            if !(confidence >= self.confidence_threshold) {
                continue;
            }

            // Denormalize to the network input before undoing the letterbox
            let input_box = BBox::from_cxcywh(
                dets[[0, i, 0]] * transform.input_width as f32,
                dets[[0, i, 1]] * transform.input_height as f32,
                dets[[0, i, 2]] * transform.input_width as f32,
                dets[[0, i, 3]] * transform.input_height as f32,
                (class_idx - 1) as u32,
            );

            if let Some(bbox) = to_original(&input_box, transform) {
                candidates.push((confidence, bbox));
            }
        }

        // Set prediction already de-duplicates, only rank and cap here
        candidates.sort_by(|a, b| b.0.total_cmp(&a.0));
        candidates.truncate(self.max_detections);

        Ok(candidates.into_iter().collect())
    }
}

/// Greedy class-aware NMS. Sorts `candidates` by descending score and keeps
/// at most `max_keep` of them.
pub fn non_max_suppression(candidates: &mut Vec<(f32, BBox)>, iou_threshold: f32, max_keep: usize) {
    candidates.sort_by(|a, b| b.0.total_cmp(&a.0));

    let mut kept = 0;
    for index in 0..candidates.len() {
        if kept == max_keep {
            break;
        }
        let suppressed = (0..kept).any(|prev| {
            let (_, prev_box) = &candidates[prev];
            let (_, cur_box) = &candidates[index];
            prev_box.class_id == cur_box.class_id && prev_box.iou(cur_box) > iou_threshold
        });
        if !suppressed {
            candidates.swap(kept, index);
            kept += 1;
        }
    }
    candidates.truncate(kept);
}

/// Undo the letterbox on both corners. Boxes left with no area after clamping
/// lie entirely in the padding and are dropped.
fn to_original(input_box: &BBox, transform: &LetterboxTransform) -> Option<BBox> {
    let (x1, y1) = transform.to_original(input_box.x1, input_box.y1);
    let (x2, y2) = transform.to_original(input_box.x2, input_box.y2);
    let bbox = BBox::new(x1, y1, x2, y2, input_box.class_id);
    (bbox.area() > 0.0).then_some(bbox)
}

#[inline]
fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}
