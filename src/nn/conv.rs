//! Periodic Convolution Layer
//!
//! A shape-preserving 2-D convolution for global lat/lon grids: the input is
//! padded cyclically along longitude and with zeros along latitude, then a
//! valid-bordered convolution is applied. The pad adds `2 * (k-1)/2` cells per
//! spatial axis and the valid convolution removes `k - 1`, so for odd kernel
//! sizes the output spatial shape equals the input's.

use ndarray::{s, Array1, Array4};
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::activation::{create_activation, ActivationType};
use super::optimizer::Optimizer;
use super::padding::PeriodicPadding2D;
use crate::error::{Error, Result};

/// Kernel specification: an integer side length or an explicit pair.
///
/// A pair with unequal sides is rejected at layer construction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum KernelSpec {
    Square(usize),
    Pair(usize, usize),
}

impl KernelSpec {
    /// Resolve to a square side length, rejecting rectangular kernels.
    pub fn side(&self) -> Result<usize> {
        match *self {
            KernelSpec::Square(k) => Ok(k),
            KernelSpec::Pair(rows, cols) if rows == cols => Ok(rows),
            KernelSpec::Pair(rows, cols) => Err(Error::NonSquareKernel { rows, cols }),
        }
    }
}

impl From<usize> for KernelSpec {
    fn from(k: usize) -> Self {
        KernelSpec::Square(k)
    }
}

impl From<(usize, usize)> for KernelSpec {
    fn from(pair: (usize, usize)) -> Self {
        KernelSpec::Pair(pair.0, pair.1)
    }
}

/// Periodic convolution layer: cyclic-longitude padding followed by a
/// valid-bordered 2-D convolution.
///
/// Kernel weights have shape (filters, k, k, in_channels); input and output
/// tensors have layout (batch, lat, lon, channel).
#[derive(Serialize, Deserialize)]
pub struct PeriodicConv2D {
    /// Kernel weights (filters, k, k, in_channels)
    pub weights: Array4<f64>,
    /// Bias vector (filters)
    pub biases: Array1<f64>,
    /// Activation applied after the convolution
    pub activation_type: ActivationType,
    /// Input channel count
    pub in_channels: usize,
    /// Output channel count
    pub filters: usize,
    /// Square kernel side length
    pub kernel_size: usize,
    /// Dropout rate (0.0 = no dropout)
    pub dropout_rate: f64,
    padding: PeriodicPadding2D,

    // Cached values for backpropagation (not serialized)
    #[serde(skip)]
    last_padded: Option<Array4<f64>>,
    #[serde(skip)]
    last_z: Option<Array4<f64>>,
    #[serde(skip)]
    dropout_mask: Option<Array4<f64>>,
}

impl PeriodicConv2D {
    /// Create a new layer with Xavier initialization and a linear activation.
    ///
    /// Returns an error for rectangular kernel specifications; the check runs
    /// here so misconfiguration never reaches a forward pass.
    pub fn new(
        in_channels: usize,
        filters: usize,
        kernel: impl Into<KernelSpec>,
    ) -> Result<Self> {
        let kernel_size = kernel.into().side()?;
        if kernel_size == 0 {
            return Err(Error::InvalidConfig(
                "kernel size must be at least 1".to_string(),
            ));
        }
        let pad_width = (kernel_size - 1) / 2;

        // Xavier/Glorot initialization
        let fan_in = (kernel_size * kernel_size * in_channels) as f64;
        let fan_out = (kernel_size * kernel_size * filters) as f64;
        let limit = (6.0 / (fan_in + fan_out)).sqrt();
        let weights = Array4::random(
            (filters, kernel_size, kernel_size, in_channels),
            Uniform::new(-limit, limit),
        );
        let biases = Array1::zeros(filters);

        Ok(Self {
            weights,
            biases,
            activation_type: ActivationType::Linear,
            in_channels,
            filters,
            kernel_size,
            dropout_rate: 0.0,
            padding: PeriodicPadding2D::new(pad_width),
            last_padded: None,
            last_z: None,
            dropout_mask: None,
        })
    }

    /// Set the activation applied after the convolution
    pub fn with_activation(mut self, activation: ActivationType) -> Self {
        self.activation_type = activation;
        self
    }

    /// Set the dropout rate applied after the activation during training
    pub fn with_dropout(mut self, rate: f64) -> Self {
        self.dropout_rate = rate.clamp(0.0, 1.0);
        self
    }

    /// Valid-bordered convolution over an already padded tensor.
    fn convolve_valid(&self, padded: &Array4<f64>) -> Array4<f64> {
        let (batch, padded_lat, padded_lon, in_channels) = padded.dim();
        let k = self.kernel_size;
        let lat = padded_lat - (k - 1);
        let lon = padded_lon - (k - 1);

        let mut out = Array4::zeros((batch, lat, lon, self.filters));
        for oc in 0..self.filters {
            let mut out_channel = out.slice_mut(s![.., .., .., oc]);
            for ki in 0..k {
                for kj in 0..k {
                    for ic in 0..in_channels {
                        let weight = self.weights[[oc, ki, kj, ic]];
                        let window = padded.slice(s![.., ki..ki + lat, kj..kj + lon, ic]);
                        out_channel.scaled_add(weight, &window);
                    }
                }
            }
            out_channel += self.biases[oc];
        }
        out
    }

    /// Forward pass through the layer.
    ///
    /// In training mode the padded input and pre-activation output are cached
    /// for backpropagation, and dropout is applied with inverted scaling.
    pub fn forward(&mut self, input: &Array4<f64>, training: bool) -> Array4<f64> {
        let padded = self.padding.pad(input);
        let z = self.convolve_valid(&padded);

        let activation = create_activation(self.activation_type);
        let mut output = activation.forward(&z);

        if training {
            if self.dropout_rate > 0.0 {
                let mut rng = rand::thread_rng();
                let keep = 1.0 - self.dropout_rate;
                let mask = Array4::from_shape_fn(output.dim(), |_| {
                    if rng.gen::<f64>() < keep {
                        1.0 / keep
                    } else {
                        0.0
                    }
                });
                output = &output * &mask;
                self.dropout_mask = Some(mask);
            } else {
                self.dropout_mask = None;
            }
            self.last_padded = Some(padded);
            self.last_z = Some(z);
        } else {
            self.last_padded = None;
            self.last_z = None;
            self.dropout_mask = None;
        }

        output
    }

    /// Backward pass - compute gradients.
    /// Returns: (input_gradient, weight_gradient, bias_gradient)
    pub fn backward(&self, output_gradient: &Array4<f64>) -> (Array4<f64>, Array4<f64>, Array1<f64>) {
        let padded = self
            .last_padded
            .as_ref()
            .expect("Must call forward in training mode before backward");
        let z = self
            .last_z
            .as_ref()
            .expect("Must call forward in training mode before backward");

        // Apply dropout mask to gradient
        let grad = if let Some(mask) = &self.dropout_mask {
            output_gradient * mask
        } else {
            output_gradient.clone()
        };

        // Chain through the activation
        let activation = create_activation(self.activation_type);
        let delta = &grad * &activation.backward(z);

        let (_, padded_lat, padded_lon, in_channels) = padded.dim();
        let k = self.kernel_size;
        let lat = padded_lat - (k - 1);
        let lon = padded_lon - (k - 1);

        let mut weight_gradient = Array4::zeros(self.weights.dim());
        let mut bias_gradient = Array1::zeros(self.filters);
        let mut padded_gradient = Array4::zeros(padded.dim());

        for oc in 0..self.filters {
            let delta_channel = delta.slice(s![.., .., .., oc]);
            bias_gradient[oc] = delta_channel.sum();

            for ki in 0..k {
                for kj in 0..k {
                    for ic in 0..in_channels {
                        let window = padded.slice(s![.., ki..ki + lat, kj..kj + lon, ic]);
                        weight_gradient[[oc, ki, kj, ic]] = (&window * &delta_channel).sum();

                        padded_gradient
                            .slice_mut(s![.., ki..ki + lat, kj..kj + lon, ic])
                            .scaled_add(self.weights[[oc, ki, kj, ic]], &delta_channel);
                    }
                }
            }
        }

        // Fold the padded gradient back onto the unpadded input
        let input_gradient = self.padding.unpad_gradient(&padded_gradient);

        (input_gradient, weight_gradient, bias_gradient)
    }

    /// Update weights using gradients
    pub fn update_weights(
        &mut self,
        optimizer: &mut dyn Optimizer,
        weight_gradient: &Array4<f64>,
        bias_gradient: &Array1<f64>,
    ) {
        optimizer.update_weights(&mut self.weights, weight_gradient);
        optimizer.update_biases(&mut self.biases, bias_gradient);
    }

    /// Get number of parameters
    pub fn num_parameters(&self) -> usize {
        self.weights.len() + self.biases.len()
    }
}

impl Clone for PeriodicConv2D {
    fn clone(&self) -> Self {
        Self {
            weights: self.weights.clone(),
            biases: self.biases.clone(),
            activation_type: self.activation_type,
            in_channels: self.in_channels,
            filters: self.filters,
            kernel_size: self.kernel_size,
            dropout_rate: self.dropout_rate,
            padding: self.padding,
            last_padded: None,
            last_z: None,
            dropout_mask: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::Array;

    #[test]
    fn test_layer_creation() {
        let layer = PeriodicConv2D::new(3, 8, 5).unwrap();
        assert_eq!(layer.weights.dim(), (8, 5, 5, 3));
        assert_eq!(layer.biases.len(), 8);
        assert_eq!(layer.num_parameters(), 8 * 5 * 5 * 3 + 8);
    }

    #[test]
    fn test_rectangular_kernel_rejected() {
        let result = PeriodicConv2D::new(1, 4, (3, 5));
        assert!(matches!(
            result,
            Err(Error::NonSquareKernel { rows: 3, cols: 5 })
        ));
    }

    #[test]
    fn test_square_pair_accepted() {
        let layer = PeriodicConv2D::new(1, 4, (3, 3)).unwrap();
        assert_eq!(layer.kernel_size, 3);
    }

    #[test]
    fn test_shape_preservation() {
        let input = Array4::ones((2, 8, 16, 3));
        for k in [1, 3, 5, 7] {
            let mut layer = PeriodicConv2D::new(3, 6, k).unwrap();
            let output = layer.forward(&input, false);
            assert_eq!(output.dim(), (2, 8, 16, 6), "kernel size {}", k);
        }
    }

    #[test]
    fn test_one_by_one_kernel_is_pointwise() {
        let mut layer = PeriodicConv2D::new(1, 1, 1).unwrap();
        layer.weights.fill(2.0);
        layer.biases.fill(0.5);

        let input = Array::from_shape_fn((1, 2, 3, 1), |(_, i, j, _)| (i * 3 + j) as f64);
        let output = layer.forward(&input, false);

        for (o, i) in output.iter().zip(input.iter()) {
            assert_relative_eq!(*o, i * 2.0 + 0.5, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_longitude_wrap_reaches_convolution() {
        // A constant field convolved with an all-ones 3x3 kernel: every
        // longitude column of an interior latitude row sums a full window
        // thanks to the wrap, while the first and last latitude rows lose a
        // zero-padded row.
        let mut layer = PeriodicConv2D::new(1, 1, 3).unwrap();
        layer.weights.fill(1.0);
        layer.biases.fill(0.0);

        let input = Array4::from_elem((1, 4, 6, 1), 2.0);
        let output = layer.forward(&input, false);

        for j in 0..6 {
            assert_relative_eq!(output[[0, 1, j, 0]], 18.0, epsilon = 1e-12);
            assert_relative_eq!(output[[0, 2, j, 0]], 18.0, epsilon = 1e-12);
            assert_relative_eq!(output[[0, 0, j, 0]], 12.0, epsilon = 1e-12);
            assert_relative_eq!(output[[0, 3, j, 0]], 12.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_backward_gradient_shapes() {
        let mut layer = PeriodicConv2D::new(2, 4, 3).unwrap();
        let input = Array4::ones((2, 5, 6, 2));
        let output = layer.forward(&input, true);

        let grad = Array4::ones(output.dim());
        let (input_grad, weight_grad, bias_grad) = layer.backward(&grad);

        assert_eq!(input_grad.dim(), input.dim());
        assert_eq!(weight_grad.dim(), layer.weights.dim());
        assert_eq!(bias_grad.len(), 4);
    }

    #[test]
    fn test_weight_gradient_matches_finite_difference() {
        let mut layer = PeriodicConv2D::new(1, 1, 3).unwrap();
        let input = Array::from_shape_fn((1, 3, 4, 1), |(_, i, j, _)| (i as f64) - (j as f64) * 0.5);

        // Loss = sum(output); its gradient w.r.t. the output is all ones.
        let output = layer.forward(&input, true);
        let grad = Array4::ones(output.dim());
        let (_, weight_grad, bias_grad) = layer.backward(&grad);

        let eps = 1e-6;
        for ki in 0..3 {
            for kj in 0..3 {
                let mut bumped = layer.clone();
                bumped.weights[[0, ki, kj, 0]] += eps;
                let plus = bumped.forward(&input, false).sum();
                bumped.weights[[0, ki, kj, 0]] -= 2.0 * eps;
                let minus = bumped.forward(&input, false).sum();

                let numeric = (plus - minus) / (2.0 * eps);
                assert_relative_eq!(weight_grad[[0, ki, kj, 0]], numeric, epsilon = 1e-4);
            }
        }
        assert_relative_eq!(bias_gradient_check(&mut layer, &input), bias_grad[0], epsilon = 1e-4);
    }

    fn bias_gradient_check(layer: &mut PeriodicConv2D, input: &Array4<f64>) -> f64 {
        let eps = 1e-6;
        layer.biases[0] += eps;
        let plus = layer.forward(input, false).sum();
        layer.biases[0] -= 2.0 * eps;
        let minus = layer.forward(input, false).sum();
        layer.biases[0] += eps;
        (plus - minus) / (2.0 * eps)
    }

    #[test]
    fn test_dropout_only_in_training() {
        let mut layer = PeriodicConv2D::new(1, 1, 3).unwrap().with_dropout(0.5);
        let input = Array4::ones((1, 4, 4, 1));

        let a = layer.forward(&input, false);
        let b = layer.forward(&input, false);
        assert_eq!(a, b);
    }
}
