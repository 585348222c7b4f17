//! Batched Data Generator
//!
//! Turns a labeled dataset into (input, target) sample pairs for a direct
//! forecast at a fixed lead time: the input is the normalized state at time
//! `t`, the target the normalized state at `t + lead`. Provides shuffled
//! batch iteration for training and ordered batches for inference.

use chrono::{DateTime, Utc};
use ndarray::{s, Array1, Array4, Axis};
use rand::seq::SliceRandom;

use super::grid::{VarDict, WeatherDataset};
use super::normalize::{channel_stats_subsampled, ChannelStats};
use crate::error::{Error, Result};

/// Batched sample generator over a normalized weather dataset.
pub struct DataGenerator {
    dataset: WeatherDataset,
    mean: Array1<f64>,
    std: Array1<f64>,
    lead_time: usize,
    batch_size: usize,
    shuffle: bool,
    indices: Vec<usize>,
    current: usize,
}

impl DataGenerator {
    /// Create a generator.
    ///
    /// Normalization statistics are computed on every `subsample_step`-th
    /// time slice (falling back to the full record when that is too thin)
    /// and the stored fields are normalized with them.
    pub fn new(
        dataset: WeatherDataset,
        lead_time: usize,
        batch_size: usize,
        shuffle: bool,
        subsample_step: usize,
    ) -> Result<Self> {
        if batch_size == 0 {
            return Err(Error::InvalidConfig("batch_size must be > 0".to_string()));
        }
        if lead_time == 0 {
            return Err(Error::InvalidConfig("lead_time must be > 0".to_string()));
        }
        if dataset.len() <= lead_time {
            return Err(Error::InvalidConfig(format!(
                "dataset has {} time steps, not enough for lead time {}",
                dataset.len(),
                lead_time
            )));
        }

        let ChannelStats { mean, std } = channel_stats_subsampled(&dataset.fields, subsample_step);

        let mut dataset = dataset;
        for c in 0..dataset.num_channels() {
            let (m, s) = (mean[c], std[c]);
            dataset
                .fields
                .slice_mut(s![.., .., .., c])
                .mapv_inplace(|v| (v - m) / s);
        }

        let num_samples = dataset.len() - lead_time;
        let mut generator = Self {
            dataset,
            mean,
            std,
            lead_time,
            batch_size,
            shuffle,
            indices: (0..num_samples).collect(),
            current: 0,
        };
        generator.reset();
        Ok(generator)
    }

    /// Per-channel normalization mean
    pub fn mean(&self) -> &Array1<f64> {
        &self.mean
    }

    /// Per-channel normalization standard deviation
    pub fn std(&self) -> &Array1<f64> {
        &self.std
    }

    /// Variable dictionary describing the channel axis
    pub fn var_dict(&self) -> &VarDict {
        &self.dataset.var_dict
    }

    /// Latitude coordinate (degrees)
    pub fn lat(&self) -> &Array1<f64> {
        &self.dataset.lat
    }

    /// Longitude coordinate (degrees)
    pub fn lon(&self) -> &Array1<f64> {
        &self.dataset.lon
    }

    /// Forecast valid times: the dataset times shifted by the lead time
    pub fn valid_time(&self) -> &[DateTime<Utc>] {
        &self.dataset.time[self.lead_time..]
    }

    /// Forecast lead time in time steps
    pub fn lead_time(&self) -> usize {
        self.lead_time
    }

    /// Number of (input, target) samples
    pub fn num_samples(&self) -> usize {
        self.dataset.len() - self.lead_time
    }

    /// Number of batches per epoch
    pub fn num_batches(&self) -> usize {
        (self.num_samples() + self.batch_size - 1) / self.batch_size
    }

    /// Batch size
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Reset the iteration state, reshuffling when shuffle is enabled
    pub fn reset(&mut self) {
        self.current = 0;
        if self.shuffle {
            self.indices.shuffle(&mut rand::thread_rng());
        }
    }

    /// Next shuffled batch, or `None` at the end of the epoch
    pub fn next_batch(&mut self) -> Option<(Array4<f64>, Array4<f64>)> {
        if self.current >= self.num_samples() {
            return None;
        }

        let end = (self.current + self.batch_size).min(self.num_samples());
        let batch_indices = &self.indices[self.current..end];
        self.current = end;

        let target_indices: Vec<usize> = batch_indices.iter().map(|&i| i + self.lead_time).collect();
        let inputs = self.dataset.fields.select(Axis(0), batch_indices);
        let targets = self.dataset.fields.select(Axis(0), &target_indices);
        Some((inputs, targets))
    }

    /// Batch `index` in time order, independent of the shuffle state.
    /// Used for inference, where outputs must line up with `valid_time`.
    pub fn ordered_batch(&self, index: usize) -> (Array4<f64>, Array4<f64>) {
        let start = index * self.batch_size;
        let end = (start + self.batch_size).min(self.num_samples());
        let lead = self.lead_time;

        let inputs = self.dataset.fields.slice(s![start..end, .., .., ..]).to_owned();
        let targets = self
            .dataset
            .fields
            .slice(s![start + lead..end + lead, .., .., ..])
            .to_owned();
        (inputs, targets)
    }

    /// Materialize all samples in time order as (inputs, targets)
    pub fn training_arrays(&self) -> (Array4<f64>, Array4<f64>) {
        let n = self.num_samples();
        let lead = self.lead_time;
        let inputs = self.dataset.fields.slice(s![..n, .., .., ..]).to_owned();
        let targets = self.dataset.fields.slice(s![lead..n + lead, .., .., ..]).to_owned();
        (inputs, targets)
    }
}
