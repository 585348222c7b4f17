//! Forecast Module
//!
//! Turns raw network output into labeled forecasts and scores them:
//! - Prediction assembly (un-normalize, split channels per variable)
//! - Latitude-weighted RMSE

mod predict;
mod score;

pub use predict::create_predictions;
pub use score::{compute_weighted_rmse, latitude_weights, weighted_rmse_per_time};
