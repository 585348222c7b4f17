//! # Weather CNN in Rust
//!
//! A modular implementation of fully-convolutional neural networks for
//! gridded weather forecasting. Longitude is treated as a cyclic axis
//! (the globe wraps around) and latitude as a bounded one, so convolution
//! layers pad periodically along longitude and with zeros along latitude,
//! preserving the spatial grid shape end-to-end.
//!
//! ## Modules
//!
//! - `nn` - Periodic padding/convolution layers, network builder, training
//! - `data` - Labeled weather grids, normalization, batched generation
//! - `forecast` - Prediction assembly and latitude-weighted scoring
//! - `plot` - Shaded equirectangular map rendering

pub mod data;
pub mod error;
pub mod forecast;
pub mod nn;
pub mod plot;

pub use data::{DataGenerator, Forecast, VarDict, WeatherDataset};
pub use error::{Error, Result};
pub use forecast::{compute_weighted_rmse, create_predictions};
pub use nn::{FullyConvNet, NetworkConfig, PeriodicConv2D, PeriodicPadding2D};
