/// Result of [`adjusted_mean_detail`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdjustedMean {
    pub value: f64,
    /// Index (into the input slice) of the discarded value, if any.
    pub discarded: Option<usize>,
}

/// Mean of the present values after dropping the one furthest from the mean.
///
/// - missing values are ignored;
/// - with a single present value it is returned as is;
/// - with two or more, exactly one is always discarded, even in a tight
///   cluster. Ties go to the earliest value.
///
/// `None` when every value is missing.
pub fn adjusted_mean(values: &[Option<f64>]) -> Option<f64> {
    adjusted_mean_detail(values).map(|m| m.value)
}

pub fn adjusted_mean_detail(values: &[Option<f64>]) -> Option<AdjustedMean> {
    let present: Vec<(usize, f64)> = values
        .iter()
        .enumerate()
        .filter_map(|(i, v)| v.map(|v| (i, v)))
        .collect();

    match present.len() {
        0 => None,
        1 => Some(AdjustedMean {
            value: present[0].1,
            discarded: None,
        }),
        n => {
            let mean = present.iter().map(|(_, v)| v).sum::<f64>() / n as f64;

            let mut worst = 0;
            let mut worst_dev = (present[0].1 - mean).abs();
            for (pos, (_, v)) in present.iter().enumerate().skip(1) {
                let dev = (v - mean).abs();
                if dev > worst_dev {
                    worst = pos;
                    worst_dev = dev;
                }
            }

            let kept: f64 = present
                .iter()
                .enumerate()
                .filter(|(pos, _)| *pos != worst)
                .map(|(_, (_, v))| v)
                .sum();
            Some(AdjustedMean {
                value: kept / (n - 1) as f64,
                discarded: Some(present[worst].0),
            })
        }
    }
}
