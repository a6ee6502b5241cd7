use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};

/// How messages that land on the same segment are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    #[default]
    Sum,
    Mean,
    Max,
}

impl Aggregation {
    pub const ALL: [Aggregation; 3] =
        [Aggregation::Sum, Aggregation::Mean, Aggregation::Max];

    pub fn label(&self) -> &'static str {
        match self {
            Aggregation::Sum => "Sum",
            Aggregation::Mean => "Mean",
            Aggregation::Max => "Max",
        }
    }
}

/// Unsorted segment reduction: row `i` of `values` is folded into row
/// `segment_ids[i]` of the output.
///
/// Segments that receive nothing stay at zero for every aggregation.
pub fn segment_reduce(
    values: ArrayView2<f32>,
    segment_ids: &[usize],
    num_segments: usize,
    aggregation: Aggregation,
) -> Array2<f32> {
    debug_assert_eq!(values.nrows(), segment_ids.len());
    let width = values.ncols();
    let mut out = Array2::<f32>::zeros((num_segments, width));
    let mut counts = vec![0usize; num_segments];

    for (row, &segment) in values.rows().into_iter().zip(segment_ids) {
        let mut target = out.row_mut(segment);
        match aggregation {
            Aggregation::Sum | Aggregation::Mean => target += &row,
            Aggregation::Max => {
                if counts[segment] == 0 {
                    target.assign(&row);
                } else {
                    target.zip_mut_with(&row, |t, &v| *t = t.max(v));
                }
            }
        }
        counts[segment] += 1;
    }

    if aggregation == Aggregation::Mean {
        for (mut row, &count) in out.rows_mut().into_iter().zip(&counts) {
            if count > 0 {
                row /= count as f32;
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_sum_mean_max_per_segment() {
        let values = array![[1.0, -2.0], [3.0, 4.0], [5.0, 6.0]];
        let ids = [0, 0, 2];

        let sum = segment_reduce(values.view(), &ids, 3, Aggregation::Sum);
        let mean = segment_reduce(values.view(), &ids, 3, Aggregation::Mean);
        let max = segment_reduce(values.view(), &ids, 3, Aggregation::Max);

        assert_eq!(sum, array![[4.0, 2.0], [0.0, 0.0], [5.0, 6.0]]);
        assert_eq!(mean, array![[2.0, 1.0], [0.0, 0.0], [5.0, 6.0]]);
        assert_eq!(max, array![[3.0, 4.0], [0.0, 0.0], [5.0, 6.0]]);
    }

    #[test]
    fn test_max_keeps_negative_values() {
        let values = array![[-3.0], [-1.0]];

        let max = segment_reduce(values.view(), &[0, 0], 1, Aggregation::Max);

        assert_eq!(max, array![[-1.0]]);
    }
}
