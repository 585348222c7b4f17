//! Data Module
//!
//! Labeled weather grids and their preprocessing:
//! - Gridded datasets with time/lat/lon/channel coordinates
//! - Variable dictionaries mapping names to pressure levels
//! - Per-channel normalization with subsampled statistics
//! - Batched (input, target) generation at a fixed forecast lead time

mod generator;
mod grid;
mod normalize;

pub use generator::DataGenerator;
pub use grid::{Forecast, ForecastField, VarDict, VarEntry, WeatherDataset};
pub use normalize::{
    channel_stats, channel_stats_subsampled, ChannelStats, Normalizer, StandardNormalizer,
};
