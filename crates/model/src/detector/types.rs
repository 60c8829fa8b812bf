/// Axis-aligned box in original-image pixels, corner format.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
    pub class_id: u32,
}

impl BBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32, class_id: u32) -> Self {
        Self {
            x1,
            y1,
            x2,
            y2,
            class_id,
        }
    }

    pub fn from_cxcywh(cx: f32, cy: f32, w: f32, h: f32, class_id: u32) -> Self {
        Self::new(cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0, class_id)
    }

    pub fn width(&self) -> f32 {
        (self.x2 - self.x1).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.y2 - self.y1).max(0.0)
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    pub fn intersection_area(&self, other: &BBox) -> f32 {
        let l = self.x1.max(other.x1);
        let r = self.x2.min(other.x2);
        let t = self.y1.max(other.y1);
        let b = self.y2.min(other.y2);
        (r - l).max(0.0) * (b - t).max(0.0)
    }

    pub fn iou(&self, other: &BBox) -> f32 {
        let intersection = self.intersection_area(other);
        let union = self.area() + other.area() - intersection;
        if union > 0.0 {
            intersection / union
        } else {
            0.0
        }
    }
}

/// Detections for one image: `scores[i]` is the confidence of `boxes[i]`,
/// highest score first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Detections {
    scores: Vec<f32>,
    boxes: Vec<BBox>,
}

impl Detections {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            scores: Vec::with_capacity(capacity),
            boxes: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, score: f32, bbox: BBox) {
        self.scores.push(score);
        self.boxes.push(bbox);
    }

    pub fn scores(&self) -> &[f32] {
        &self.scores
    }

    pub fn boxes(&self) -> &[BBox] {
        &self.boxes
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (f32, &BBox)> {
        self.scores.iter().copied().zip(self.boxes.iter())
    }

    /// Empties both buffers, keeping their allocations.
    pub fn clear(&mut self) {
        self.scores.clear();
        self.boxes.clear();
    }

    pub fn into_parts(self) -> (Vec<f32>, Vec<BBox>) {
        (self.scores, self.boxes)
    }
}

impl FromIterator<(f32, BBox)> for Detections {
    fn from_iter<I: IntoIterator<Item = (f32, BBox)>>(iter: I) -> Self {
        let mut detections = Detections::default();
        for (score, bbox) in iter {
            detections.push(score, bbox);
        }
        detections
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_cxcywh() {
        let bbox = BBox::from_cxcywh(0.5, 0.5, 0.4, 0.2, 3);
        assert!((bbox.x1 - 0.3).abs() < 1e-6);
        assert!((bbox.y1 - 0.4).abs() < 1e-6);
        assert!((bbox.x2 - 0.7).abs() < 1e-6);
        assert!((bbox.y2 - 0.6).abs() < 1e-6);
        assert_eq!(bbox.class_id, 3);
    }

    #[test]
    fn test_iou() {
        let a = BBox::new(0.0, 0.0, 10.0, 10.0, 0);
        let b = BBox::new(5.0, 0.0, 15.0, 10.0, 0);
        let c = BBox::new(20.0, 20.0, 30.0, 30.0, 0);

        // overlap 50, union 150
        assert!((a.iou(&b) - 1.0 / 3.0).abs() < 1e-6);
        assert_eq!(a.iou(&c), 0.0);
        assert_eq!(a.iou(&a), 1.0);
    }

    #[test]
    fn test_degenerate_box_has_zero_area_and_iou() {
        let point = BBox::new(5.0, 5.0, 5.0, 5.0, 0);
        let inverted = BBox::new(10.0, 10.0, 0.0, 0.0, 0);

        assert_eq!(point.area(), 0.0);
        assert_eq!(inverted.width(), 0.0);
        assert_eq!(point.iou(&inverted), 0.0);
    }

    #[test]
    fn test_detections_keep_scores_and_boxes_paired() {
        let mut detections = Detections::default();
        detections.push(0.9, BBox::new(0.0, 0.0, 1.0, 1.0, 1));
        detections.push(0.4, BBox::new(2.0, 2.0, 3.0, 3.0, 2));

        assert_eq!(detections.len(), 2);
        assert_eq!(detections.scores(), &[0.9, 0.4]);

        let classes: Vec<u32> = detections.iter().map(|(_, b)| b.class_id).collect();
        assert_eq!(classes, vec![1, 2]);

        detections.clear();
        assert!(detections.is_empty());
        assert!(detections.boxes().is_empty());
    }

    #[test]
    fn test_collect_from_pairs() {
        let detections: Detections = vec![
            (0.8, BBox::new(0.0, 0.0, 1.0, 1.0, 0)),
            (0.7, BBox::new(1.0, 1.0, 2.0, 2.0, 5)),
        ]
        .into_iter()
        .collect();

        let (scores, boxes) = detections.into_parts();
        assert_eq!(scores, vec![0.8, 0.7]);
        assert_eq!(boxes[1].class_id, 5);
    }
}
