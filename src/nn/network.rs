//! Fully-Convolutional Network
//!
//! Stacks periodic convolution layers into a shape-preserving regression
//! network: every hidden layer is conv -> leaky ReLU -> optional dropout,
//! and the final layer is a linear convolution.

use ndarray::{concatenate, Array4, Axis};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tracing::{debug, info};

use super::activation::ActivationType;
use super::conv::{KernelSpec, PeriodicConv2D};
use super::optimizer::{Adam, Optimizer};
use crate::data::DataGenerator;
use crate::error::{Error, Result};

/// Network configuration: parallel filter/kernel vectors plus the hidden
/// activation and dropout rate. Constructed once, validated eagerly, and
/// passed by value to the network builder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Input channel count
    pub in_channels: usize,
    /// Output channel count per layer
    pub filters: Vec<usize>,
    /// Kernel specification per layer
    pub kernels: Vec<KernelSpec>,
    /// Dropout rate applied after each hidden activation (0.0 = none)
    pub dropout: f64,
    /// Hidden layer activation
    pub activation: ActivationType,
}

impl NetworkConfig {
    pub fn new(in_channels: usize) -> Self {
        Self {
            in_channels,
            filters: Vec::new(),
            kernels: Vec::new(),
            dropout: 0.0,
            activation: ActivationType::LeakyReLU,
        }
    }

    /// Append a convolution layer
    pub fn add_layer(mut self, filters: usize, kernel: impl Into<KernelSpec>) -> Self {
        self.filters.push(filters);
        self.kernels.push(kernel.into());
        self
    }

    /// Set the dropout rate for hidden layers
    pub fn with_dropout(mut self, rate: f64) -> Self {
        self.dropout = rate;
        self
    }

    /// Set the hidden layer activation
    pub fn with_activation(mut self, activation: ActivationType) -> Self {
        self.activation = activation;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.filters.len() != self.kernels.len() {
            return Err(Error::LayerSpecMismatch {
                filters: self.filters.len(),
                kernels: self.kernels.len(),
            });
        }
        if self.filters.is_empty() {
            return Err(Error::InvalidConfig("network has no layers".to_string()));
        }
        if self.in_channels == 0 {
            return Err(Error::InvalidConfig("in_channels must be > 0".to_string()));
        }
        if self.filters.iter().any(|&f| f == 0) {
            return Err(Error::InvalidConfig(
                "every layer needs at least one filter".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(Error::InvalidConfig(format!(
                "dropout must be in [0, 1), got {}",
                self.dropout
            )));
        }
        for kernel in &self.kernels {
            kernel.side()?;
        }
        Ok(())
    }

    /// Channel count of the network output
    pub fn output_channels(&self) -> usize {
        self.filters.last().copied().unwrap_or(0)
    }
}

/// Fully-convolutional regression network over (batch, lat, lon, channel)
/// tensors. Spatial dimensions are preserved end-to-end.
pub struct FullyConvNet {
    pub layers: Vec<PeriodicConv2D>,
    pub config: NetworkConfig,
    optimizers: Vec<Box<dyn Optimizer>>,
}

impl FullyConvNet {
    /// Build a network from a validated configuration.
    ///
    /// Every layer except the last gets the configured activation and
    /// dropout; the final layer stays linear. A single-layer configuration
    /// is just the linear output convolution.
    pub fn from_config(config: NetworkConfig) -> Result<Self> {
        config.validate()?;

        let mut layers = Vec::with_capacity(config.filters.len());
        let mut in_channels = config.in_channels;
        let last = config.filters.len() - 1;

        for (i, (&filters, &kernel)) in config.filters.iter().zip(&config.kernels).enumerate() {
            let mut layer = PeriodicConv2D::new(in_channels, filters, kernel)?;
            if i < last {
                layer = layer.with_activation(config.activation);
                if config.dropout > 0.0 {
                    layer = layer.with_dropout(config.dropout);
                }
            }
            layers.push(layer);
            in_channels = filters;
        }

        // Default optimizer: Adam
        let optimizers: Vec<Box<dyn Optimizer>> = (0..layers.len())
            .map(|_| Box::new(Adam::new(0.001)) as Box<dyn Optimizer>)
            .collect();

        Ok(Self {
            layers,
            config,
            optimizers,
        })
    }

    /// Set optimizer for all layers
    pub fn set_optimizer(&mut self, optimizer: Box<dyn Optimizer>) {
        self.optimizers = self.layers.iter().map(|_| optimizer.clone_box()).collect();
    }

    /// Forward pass through the network
    pub fn forward(&mut self, input: &Array4<f64>, training: bool) -> Array4<f64> {
        let mut output = input.clone();
        for layer in &mut self.layers {
            output = layer.forward(&output, training);
        }
        output
    }

    /// Predict (forward pass without training mode)
    pub fn predict(&mut self, input: &Array4<f64>) -> Array4<f64> {
        self.forward(input, false)
    }

    /// Run inference over every batch of a data generator, in time order,
    /// and concatenate the outputs along the batch axis.
    pub fn predict_generator(&mut self, generator: &DataGenerator) -> Array4<f64> {
        let mut outputs = Vec::with_capacity(generator.num_batches());
        for i in 0..generator.num_batches() {
            let (inputs, _) = generator.ordered_batch(i);
            outputs.push(self.predict(&inputs));
        }
        let views: Vec<_> = outputs.iter().map(|o| o.view()).collect();
        concatenate(Axis(0), &views).expect("batch outputs share spatial and channel dimensions")
    }

    /// Mean squared error over all tensor elements
    pub fn compute_loss(&self, predictions: &Array4<f64>, targets: &Array4<f64>) -> f64 {
        let diff = predictions - targets;
        (&diff * &diff).sum() / predictions.len() as f64
    }

    /// Backward pass and weight update
    pub fn backward(&mut self, predictions: &Array4<f64>, targets: &Array4<f64>) {
        // MSE gradient
        let n = predictions.len() as f64;
        let mut gradient = (predictions - targets) * (2.0 / n);

        // Backpropagate through layers
        for i in (0..self.layers.len()).rev() {
            let (input_grad, weight_grad, bias_grad) = self.layers[i].backward(&gradient);
            self.layers[i].update_weights(&mut *self.optimizers[i], &weight_grad, &bias_grad);
            gradient = input_grad;
        }
    }

    /// Train for one epoch with shuffled mini-batches
    pub fn train_epoch(
        &mut self,
        x_train: &Array4<f64>,
        y_train: &Array4<f64>,
        batch_size: usize,
    ) -> f64 {
        let n_samples = x_train.len_of(Axis(0));
        let n_batches = (n_samples + batch_size - 1) / batch_size;
        let mut total_loss = 0.0;

        // Shuffle indices
        let mut indices: Vec<usize> = (0..n_samples).collect();
        use rand::seq::SliceRandom;
        indices.shuffle(&mut rand::thread_rng());

        for batch_idx in 0..n_batches {
            let start = batch_idx * batch_size;
            let end = (start + batch_size).min(n_samples);
            let batch_indices = &indices[start..end];

            let x_batch = x_train.select(Axis(0), batch_indices);
            let y_batch = y_train.select(Axis(0), batch_indices);

            let predictions = self.forward(&x_batch, true);
            total_loss += self.compute_loss(&predictions, &y_batch);
            self.backward(&predictions, &y_batch);
        }

        total_loss / n_batches as f64
    }

    /// Train the network, returning the per-epoch loss history
    pub fn train(
        &mut self,
        x_train: &Array4<f64>,
        y_train: &Array4<f64>,
        epochs: usize,
        batch_size: usize,
    ) -> Vec<f64> {
        let mut losses = Vec::with_capacity(epochs);

        for epoch in 0..epochs {
            let loss = self.train_epoch(x_train, y_train, batch_size);
            losses.push(loss);

            debug!(epoch = epoch + 1, loss, "epoch complete");
            if (epoch + 1) % 10 == 0 {
                info!("epoch {}/{}: loss = {:.6}", epoch + 1, epochs, loss);
            }
        }

        losses
    }

    /// Evaluate MSE on held-out data
    pub fn evaluate(&mut self, x_test: &Array4<f64>, y_test: &Array4<f64>) -> f64 {
        let predictions = self.predict(x_test);
        self.compute_loss(&predictions, y_test)
    }

    /// Get total number of parameters
    pub fn num_parameters(&self) -> usize {
        self.layers.iter().map(|l| l.num_parameters()).sum()
    }

    /// Save model to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = File::create(path)?;
        let writer = BufWriter::new(file);

        let data = (&self.config, &self.layers);
        serde_json::to_writer(writer, &data)?;

        Ok(())
    }

    /// Load model from file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);

        let (config, layers): (NetworkConfig, Vec<PeriodicConv2D>) =
            serde_json::from_reader(reader)?;

        let optimizers: Vec<Box<dyn Optimizer>> = (0..layers.len())
            .map(|_| Box::new(Adam::new(0.001)) as Box<dyn Optimizer>)
            .collect();

        Ok(Self {
            layers,
            config,
            optimizers,
        })
    }

    /// Print network summary
    pub fn summary(&self) {
        println!("Fully-Convolutional Network Summary");
        println!("===================================");
        println!("Input channels: {}", self.config.in_channels);

        for (i, layer) in self.layers.iter().enumerate() {
            println!(
                "Layer {}: {} -> {} channels, {}x{} kernel ({:?}), params: {}",
                i + 1,
                layer.in_channels,
                layer.filters,
                layer.kernel_size,
                layer.kernel_size,
                layer.activation_type,
                layer.num_parameters()
            );
        }

        println!("===================================");
        println!("Total parameters: {}", self.num_parameters());
    }
}
