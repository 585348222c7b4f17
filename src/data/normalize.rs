//! Data Normalization Utilities
//!
//! Per-channel normalization statistics for (batch, lat, lon, channel)
//! tensors. Statistics can be computed on a time-subsampled view of the
//! data; if the subsample is too thin to be meaningful the computation
//! falls back to the full dataset instead of failing.

use ndarray::{s, Array1, Array4, Axis};
use serde::{Deserialize, Serialize};

/// Per-channel mean and standard deviation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelStats {
    pub mean: Array1<f64>,
    pub std: Array1<f64>,
}

/// Compute per-channel statistics over the batch and spatial axes.
pub fn channel_stats(data: &Array4<f64>) -> ChannelStats {
    let (n_time, n_lat, n_lon, n_channels) = data.dim();
    let n = (n_time * n_lat * n_lon) as f64;

    let mean = data
        .sum_axis(Axis(0))
        .sum_axis(Axis(0))
        .sum_axis(Axis(0))
        / n;

    let mut std = Array1::zeros(n_channels);
    for c in 0..n_channels {
        let diff = &data.slice(s![.., .., .., c]) - mean[c];
        std[c] = ((&diff * &diff).sum() / n).sqrt();
    }

    // Avoid division by zero for constant channels
    let std = std.mapv(|v: f64| if v.abs() < 1e-10 { 1.0 } else { v });

    ChannelStats { mean, std }
}

/// Compute per-channel statistics on every `step`-th time slice.
///
/// Falls back to the full dataset when the subsample has fewer than two
/// time steps or produces non-finite statistics.
pub fn channel_stats_subsampled(data: &Array4<f64>, step: usize) -> ChannelStats {
    let step = step.max(1);
    let sampled = data.slice(s![..;step, .., .., ..]);

    if sampled.len_of(Axis(0)) < 2 {
        return channel_stats(data);
    }

    let stats = channel_stats(&sampled.to_owned());
    let degenerate = stats.mean.iter().any(|v| !v.is_finite())
        || stats.std.iter().any(|v| !v.is_finite());
    if degenerate {
        return channel_stats(data);
    }
    stats
}

/// Normalizer trait
pub trait Normalizer: Send + Sync {
    /// Fit the normalizer to training data
    fn fit(&mut self, data: &Array4<f64>);

    /// Transform data using fitted parameters
    fn transform(&self, data: &Array4<f64>) -> Array4<f64>;

    /// Fit and transform in one step
    fn fit_transform(&mut self, data: &Array4<f64>) -> Array4<f64> {
        self.fit(data);
        self.transform(data)
    }

    /// Inverse transform to original scale
    fn inverse_transform(&self, data: &Array4<f64>) -> Array4<f64>;
}

/// Standard (Z-score) normalization per channel
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StandardNormalizer {
    pub mean: Option<Array1<f64>>,
    pub std: Option<Array1<f64>>,
}

impl StandardNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an already-fitted normalizer from known statistics
    pub fn from_stats(stats: ChannelStats) -> Self {
        Self {
            mean: Some(stats.mean),
            std: Some(stats.std),
        }
    }
}

impl Normalizer for StandardNormalizer {
    fn fit(&mut self, data: &Array4<f64>) {
        let stats = channel_stats(data);
        self.mean = Some(stats.mean);
        self.std = Some(stats.std);
    }

    fn transform(&self, data: &Array4<f64>) -> Array4<f64> {
        let mean = self.mean.as_ref().expect("Normalizer not fitted");
        let std = self.std.as_ref().expect("Normalizer not fitted");

        let mut result = data.clone();
        for c in 0..data.len_of(Axis(3)) {
            let (m, s) = (mean[c], std[c]);
            result
                .slice_mut(s![.., .., .., c])
                .mapv_inplace(|v| (v - m) / s);
        }
        result
    }

    fn inverse_transform(&self, data: &Array4<f64>) -> Array4<f64> {
        let mean = self.mean.as_ref().expect("Normalizer not fitted");
        let std = self.std.as_ref().expect("Normalizer not fitted");

        let mut result = data.clone();
        for c in 0..data.len_of(Axis(3)) {
            let (m, s) = (mean[c], std[c]);
            result
                .slice_mut(s![.., .., .., c])
                .mapv_inplace(|v| v * s + m);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::Array;

    #[test]
    fn test_channel_stats() {
        let mut data = Array4::zeros((2, 2, 2, 2));
        data.slice_mut(s![.., .., .., 0]).fill(3.0);
        data.slice_mut(s![.., .., .., 1])
            .assign(&Array::from_shape_fn((2, 2, 2), |(t, _, _)| t as f64 * 2.0));

        let stats = channel_stats(&data);
        assert_relative_eq!(stats.mean[0], 3.0, epsilon = 1e-12);
        // Constant channel gets the unit-std guard.
        assert_relative_eq!(stats.std[0], 1.0, epsilon = 1e-12);
        assert_relative_eq!(stats.mean[1], 1.0, epsilon = 1e-12);
        assert_relative_eq!(stats.std[1], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_subsample_falls_back_on_thin_sample() {
        let data = Array::from_shape_fn((4, 2, 2, 1), |(t, _, _, _)| t as f64);

        // Step larger than the record leaves a single sample; the fallback
        // must produce full-dataset statistics.
        let stats = channel_stats_subsampled(&data, 100);
        let full = channel_stats(&data);
        assert_relative_eq!(stats.mean[0], full.mean[0], epsilon = 1e-12);
        assert_relative_eq!(stats.std[0], full.std[0], epsilon = 1e-12);
    }

    #[test]
    fn test_subsample_uses_stride() {
        let data = Array::from_shape_fn((6, 1, 1, 1), |(t, _, _, _)| t as f64);
        let stats = channel_stats_subsampled(&data, 2);
        // Samples 0, 2, 4 -> mean 2.
        assert_relative_eq!(stats.mean[0], 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_standard_normalizer_roundtrip() {
        let data = Array::from_shape_fn((3, 2, 4, 2), |(t, i, j, c)| {
            (t * 100 + i * 10 + j + c * 3) as f64
        });

        let mut normalizer = StandardNormalizer::new();
        let normalized = normalizer.fit_transform(&data);

        // Each channel has mean ~0 after normalization.
        let stats = channel_stats(&normalized);
        for c in 0..2 {
            assert_relative_eq!(stats.mean[c], 0.0, epsilon = 1e-10);
        }

        let reconstructed = normalizer.inverse_transform(&normalized);
        for (a, b) in data.iter().zip(reconstructed.iter()) {
            assert_relative_eq!(a, b, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_inverse_transform_is_scale_then_shift() {
        let normalizer = StandardNormalizer::from_stats(ChannelStats {
            mean: Array1::from_vec(vec![10.0]),
            std: Array1::from_vec(vec![4.0]),
        });
        let y = Array::from_shape_fn((2, 2, 2, 1), |(t, i, j, _)| (t + i + j) as f64);
        let unnorm = normalizer.inverse_transform(&y);

        for (u, v) in unnorm.iter().zip(y.iter()) {
            assert_eq!(*u, v * 4.0 + 10.0);
        }
    }
}
