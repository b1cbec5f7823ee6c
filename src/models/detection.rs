use serde::{Deserialize, Serialize};

/// One recognized text box. Fields are always present; an engine that
/// finds no text returns an empty vector rather than an absent field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Detection {
    /// 4 ordered corner points [[x1,y1], [x2,y2], [x3,y3], [x4,y4]]
    #[serde(rename = "box")]
    pub bbox: [[f64; 2]; 4],
    pub text: String,
    pub score: f64,
}

impl Detection {
    /// Build a detection from an axis-aligned rectangle.
    pub fn from_rect(x: f64, y: f64, width: f64, height: f64, text: String, score: f64) -> Self {
        Self {
            bbox: [
                [x, y],
                [x + width, y],
                [x + width, y + height],
                [x, y + height],
            ],
            text,
            score,
        }
    }

    /// Bounding box as (x_min, y_min, x_max, y_max).
    fn rect(&self) -> (f64, f64, f64, f64) {
        let xs = self.bbox.iter().map(|p| p[0]);
        let ys = self.bbox.iter().map(|p| p[1]);

        let x_min = xs.clone().fold(f64::INFINITY, f64::min);
        let x_max = xs.fold(f64::NEG_INFINITY, f64::max);
        let y_min = ys.clone().fold(f64::INFINITY, f64::min);
        let y_max = ys.fold(f64::NEG_INFINITY, f64::max);

        (x_min, y_min, x_max, y_max)
    }

    /// Leftmost x-coordinate, for left-to-right ordering.
    fn left_x(&self) -> f64 {
        self.bbox.iter().map(|p| p[0]).fold(f64::INFINITY, f64::min)
    }

    fn area(&self) -> f64 {
        let (x_min, y_min, x_max, y_max) = self.rect();
        (x_max - x_min) * (y_max - y_min)
    }

    /// Intersection over union with another box.
    fn iou(&self, other: &Detection) -> f64 {
        let (x1_min, y1_min, x1_max, y1_max) = self.rect();
        let (x2_min, y2_min, x2_max, y2_max) = other.rect();

        let inter_x_min = x1_min.max(x2_min);
        let inter_y_min = y1_min.max(y2_min);
        let inter_x_max = x1_max.min(x2_max);
        let inter_y_max = y1_max.min(y2_max);

        if inter_x_max <= inter_x_min || inter_y_max <= inter_y_min {
            return 0.0;
        }

        let inter_area = (inter_x_max - inter_x_min) * (inter_y_max - inter_y_min);
        let union_area = self.area() + other.area() - inter_area;

        if union_area <= 0.0 {
            return 0.0;
        }

        inter_area / union_area
    }
}

/// Overlap threshold above which two boxes are considered duplicate reads
/// of the same text.
const IOU_OVERLAP_THRESHOLD: f64 = 0.3;

/// Drop overlapping boxes (keeping the larger one), sort the survivors
/// left to right, and concatenate their text.
pub fn merge_text(detections: &[Detection]) -> String {
    if detections.is_empty() {
        return String::new();
    }

    // Largest first so a duplicate smaller read is the one discarded.
    let mut ordered: Vec<&Detection> = detections.iter().collect();
    ordered.sort_by(|a, b| {
        b.area()
            .partial_cmp(&a.area())
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut kept: Vec<&Detection> = Vec::with_capacity(ordered.len());
    for candidate in ordered {
        if kept.iter().all(|k| k.iou(candidate) <= IOU_OVERLAP_THRESHOLD) {
            kept.push(candidate);
        }
    }

    kept.sort_by(|a, b| {
        a.left_x()
            .partial_cmp(&b.left_x())
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    kept.iter().map(|d| d.text.as_str()).collect()
}
