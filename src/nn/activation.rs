//! Activation Functions for Convolutional Networks
//!
//! Implements common activation functions and their derivatives
//! for use in backpropagation. All functions operate elementwise on
//! (batch, lat, lon, channel) tensors.

use ndarray::Array4;
use serde::{Deserialize, Serialize};

/// Types of activation functions available
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum ActivationType {
    /// Rectified Linear Unit: max(0, x)
    ReLU,
    /// Leaky ReLU: max(alpha * x, x) with alpha = 0.3
    LeakyReLU,
    /// Hyperbolic tangent
    Tanh,
    /// Linear (identity): x
    Linear,
}

/// Activation function trait with forward and backward passes
pub trait Activation: Send + Sync {
    /// Apply the activation function
    fn forward(&self, x: &Array4<f64>) -> Array4<f64>;

    /// Compute the derivative for backpropagation
    fn backward(&self, x: &Array4<f64>) -> Array4<f64>;
}

/// ReLU activation function
pub struct ReLU;

impl Activation for ReLU {
    fn forward(&self, x: &Array4<f64>) -> Array4<f64> {
        x.mapv(|v| v.max(0.0))
    }

    fn backward(&self, x: &Array4<f64>) -> Array4<f64> {
        x.mapv(|v| if v > 0.0 { 1.0 } else { 0.0 })
    }
}

/// Leaky ReLU activation function
pub struct LeakyReLU {
    pub alpha: f64,
}

impl Default for LeakyReLU {
    fn default() -> Self {
        Self { alpha: 0.3 }
    }
}

impl Activation for LeakyReLU {
    fn forward(&self, x: &Array4<f64>) -> Array4<f64> {
        x.mapv(|v| if v > 0.0 { v } else { self.alpha * v })
    }

    fn backward(&self, x: &Array4<f64>) -> Array4<f64> {
        x.mapv(|v| if v > 0.0 { 1.0 } else { self.alpha })
    }
}

/// Tanh activation function
pub struct TanhActivation;

impl Activation for TanhActivation {
    fn forward(&self, x: &Array4<f64>) -> Array4<f64> {
        x.mapv(|v| v.tanh())
    }

    fn backward(&self, x: &Array4<f64>) -> Array4<f64> {
        x.mapv(|v| 1.0 - v.tanh() * v.tanh())
    }
}

/// Linear (identity) activation function
pub struct Linear;

impl Activation for Linear {
    fn forward(&self, x: &Array4<f64>) -> Array4<f64> {
        x.clone()
    }

    fn backward(&self, x: &Array4<f64>) -> Array4<f64> {
        Array4::ones(x.dim())
    }
}

/// Create an activation function from type
pub fn create_activation(activation_type: ActivationType) -> Box<dyn Activation> {
    match activation_type {
        ActivationType::ReLU => Box::new(ReLU),
        ActivationType::LeakyReLU => Box::new(LeakyReLU::default()),
        ActivationType::Tanh => Box::new(TanhActivation),
        ActivationType::Linear => Box::new(Linear),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::Array;

    fn tensor(values: &[f64]) -> Array4<f64> {
        Array::from_shape_vec((1, 1, values.len(), 1), values.to_vec()).unwrap()
    }

    #[test]
    fn test_relu() {
        let relu = ReLU;
        let y = relu.forward(&tensor(&[-1.0, 0.0, 1.0, 2.0]));
        assert_eq!(y, tensor(&[0.0, 0.0, 1.0, 2.0]));
    }

    #[test]
    fn test_leaky_relu() {
        let leaky = LeakyReLU::default();
        let y = leaky.forward(&tensor(&[-1.0, 2.0]));
        assert_relative_eq!(y[[0, 0, 0, 0]], -0.3, epsilon = 1e-12);
        assert_relative_eq!(y[[0, 0, 1, 0]], 2.0, epsilon = 1e-12);

        let dy = leaky.backward(&tensor(&[-1.0, 2.0]));
        assert_relative_eq!(dy[[0, 0, 0, 0]], 0.3, epsilon = 1e-12);
        assert_relative_eq!(dy[[0, 0, 1, 0]], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_tanh() {
        let tanh = TanhActivation;
        let y = tanh.forward(&tensor(&[0.0]));
        assert_relative_eq!(y[[0, 0, 0, 0]], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_linear_derivative_is_one() {
        let linear = Linear;
        let dy = linear.backward(&tensor(&[-5.0, 0.0, 5.0]));
        assert!(dy.iter().all(|&v| v == 1.0));
    }
}
