//! Forecast Scoring
//!
//! Latitude-weighted RMSE for fields on regular lat/lon grids. Grid cells
//! shrink toward the poles, so error contributions are weighted by
//! cos(latitude), normalized to a mean weight of one.

use ndarray::{Array1, Array3, Axis};

/// cos(latitude) weights normalized so their mean is 1.
pub fn latitude_weights(lat_deg: &Array1<f64>) -> Array1<f64> {
    let weights = lat_deg.mapv(|l| l.to_radians().cos());
    let mean = weights.mean().unwrap_or(1.0);
    weights / mean
}

/// Latitude-weighted RMSE between forecast and truth, averaged over all
/// (time, lat, lon) cells.
///
/// For a constant error field `e` the weights cancel and the result is |e|.
pub fn compute_weighted_rmse(
    forecast: &Array3<f64>,
    truth: &Array3<f64>,
    lat_deg: &Array1<f64>,
) -> f64 {
    let weights = latitude_weights(lat_deg);
    let (n_time, n_lat, n_lon) = forecast.dim();

    let mut total = 0.0;
    for i in 0..n_lat {
        let diff = &forecast.index_axis(Axis(1), i) - &truth.index_axis(Axis(1), i);
        total += weights[i] * (&diff * &diff).sum();
    }

    (total / (n_time * n_lat * n_lon) as f64).sqrt()
}

/// Latitude-weighted RMSE per time step.
pub fn weighted_rmse_per_time(
    forecast: &Array3<f64>,
    truth: &Array3<f64>,
    lat_deg: &Array1<f64>,
) -> Array1<f64> {
    let weights = latitude_weights(lat_deg);
    let (n_time, n_lat, n_lon) = forecast.dim();

    let mut rmse = Array1::zeros(n_time);
    for t in 0..n_time {
        let mut total = 0.0;
        for i in 0..n_lat {
            for j in 0..n_lon {
                let d = forecast[[t, i, j]] - truth[[t, i, j]];
                total += weights[i] * d * d;
            }
        }
        rmse[t] = (total / (n_lat * n_lon) as f64).sqrt();
    }
    rmse
}
