// ------------------------------------------------------------
// helpers: softmax • top-k • NMS
// ------------------------------------------------------------

use crate::DetectedObject;
use ndarray::{Array1, ArrayView1};

/// Numerically stable softmax over a logit vector.
pub fn softmax(logits: ArrayView1<f32>) -> Array1<f32> {
    let max = logits.fold(f32::NEG_INFINITY, |m, &v| m.max(v));
    let exp = logits.mapv(|v| (v - max).exp());
    let sum = exp.sum();
    if sum > 0.0 && sum.is_finite() {
        exp / sum
    } else {
        exp
    }
}

/// Indices and values of the `k` largest entries, best first.
///
/// Ties keep the lower index first.
pub fn top_k(values: ArrayView1<f32>, k: usize) -> Vec<(usize, f32)> {
    let mut indexed: Vec<(usize, f32)> = values.iter().copied().enumerate().collect();
    indexed.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    indexed.truncate(k);
    indexed
}

/// Greedy NMS: keeps the best-scoring box of every overlapping cluster.
pub fn non_max_suppression(
    dets: Vec<DetectedObject>,
    iou_thr: f32,
    max_keep: usize,
) -> Vec<DetectedObject> {
    let mut dets = dets;
    dets.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut keep: Vec<DetectedObject> = Vec::with_capacity(dets.len().min(max_keep));

    'outer: for d in dets {
        if keep.len() >= max_keep {
            break;
        }
        for k in &keep {
            if d.bbox.iou(&k.bbox) > iou_thr {
                continue 'outer;
            }
        }
        keep.push(d);
    }
    keep
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NormalizedBox;
    use ndarray::array;

    fn det(l: f32, t: f32, r: f32, b: f32, score: f32) -> DetectedObject {
        DetectedObject {
            bbox: NormalizedBox::new(l, t, r, b),
            score,
            class_id: 1,
            label: "person".into(),
        }
    }

    #[test]
    fn softmax_sums_to_one() {
        let p = softmax(array![1.0f32, 2.0, 3.0].view());
        assert!((p.sum() - 1.0).abs() < 1e-5);
        assert!(p[2] > p[1] && p[1] > p[0]);
    }

    #[test]
    fn softmax_survives_large_logits() {
        let p = softmax(array![1000.0f32, 1000.0].view());
        assert!((p[0] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn top_k_orders_and_breaks_ties_by_index() {
        let v = array![0.1f32, 0.7, 0.7, 0.05];
        assert_eq!(top_k(v.view(), 3), vec![(1, 0.7), (2, 0.7), (0, 0.1)]);
        assert_eq!(top_k(v.view(), 10).len(), 4);
    }

    #[test]
    fn nms_drops_overlapping_boxes() {
        let dets = vec![
            det(0.0, 0.0, 0.5, 0.5, 0.6),
            det(0.01, 0.01, 0.5, 0.5, 0.9),
            det(0.6, 0.6, 1.0, 1.0, 0.3),
        ];
        let kept = non_max_suppression(dets, 0.5, 10);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].score, 0.9);
        assert_eq!(kept[1].score, 0.3);
    }

    #[test]
    fn nms_respects_max_keep() {
        let dets = vec![det(0.0, 0.0, 0.1, 0.1, 0.5), det(0.5, 0.5, 0.6, 0.6, 0.4)];
        assert_eq!(non_max_suppression(dets, 0.5, 1).len(), 1);
    }
}
