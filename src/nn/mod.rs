//! Neural Network Module
//!
//! Building blocks for fully-convolutional networks on global grids:
//! - Periodic padding (cyclic longitude, zero-filled latitude)
//! - Shape-preserving periodic convolution layers
//! - Activation functions and optimizers
//! - Network builder with training capabilities

mod activation;
mod conv;
mod network;
mod optimizer;
mod padding;

pub use activation::{Activation, ActivationType};
pub use conv::{KernelSpec, PeriodicConv2D};
pub use network::{FullyConvNet, NetworkConfig};
pub use optimizer::{Adam, Optimizer, SGD};
pub use padding::PeriodicPadding2D;
