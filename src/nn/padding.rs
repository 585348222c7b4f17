//! Periodic Padding for Global Lat/Lon Grids
//!
//! Pads the longitude axis cyclically (the globe wraps around) and the
//! latitude axis with zeros (the poles do not).

use ndarray::{concatenate, s, Array4, Axis};
use serde::{Deserialize, Serialize};

/// Longitude axis index in the (batch, lat, lon, channel) layout.
const LON_AXIS: usize = 2;

/// Pads a 4-D tensor cyclically along longitude and with zeros along latitude.
///
/// For an input of shape `(batch, lat, lon, channel)` and pad width `p`, the
/// output has shape `(batch, lat + 2p, lon + 2p, channel)`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PeriodicPadding2D {
    pub pad_width: usize,
}

impl PeriodicPadding2D {
    pub fn new(pad_width: usize) -> Self {
        Self { pad_width }
    }

    /// Apply the padding.
    ///
    /// The longitude wrap must happen first: the latitude zero rows span the
    /// already-widened longitude extent.
    pub fn pad(&self, input: &Array4<f64>) -> Array4<f64> {
        let p = self.pad_width;
        if p == 0 {
            return input.clone();
        }

        let lon = input.len_of(Axis(LON_AXIS));
        let wrapped = concatenate(
            Axis(LON_AXIS),
            &[
                input.slice(s![.., .., lon - p.., ..]),
                input.view(),
                input.slice(s![.., .., ..p, ..]),
            ],
        )
        .expect("wrap slices share all non-longitude dimensions");

        let (batch, lat, wide_lon, channels) = wrapped.dim();
        let mut padded = Array4::zeros((batch, lat + 2 * p, wide_lon, channels));
        padded
            .slice_mut(s![.., p..p + lat, .., ..])
            .assign(&wrapped);
        padded
    }

    /// Adjoint of [`pad`](Self::pad), used during backpropagation.
    ///
    /// Crops the zero-padded latitude rows and folds the gradient of the
    /// wrapped longitude columns back onto the columns they were copied from.
    pub fn unpad_gradient(&self, grad: &Array4<f64>) -> Array4<f64> {
        let p = self.pad_width;
        if p == 0 {
            return grad.clone();
        }

        let (_, padded_lat, padded_lon, _) = grad.dim();
        let lat = padded_lat - 2 * p;
        let lon = padded_lon - 2 * p;

        // Latitude zero rows received no input contribution; drop them.
        let inner = grad.slice(s![.., p..p + lat, .., ..]);

        let mut result = inner.slice(s![.., .., p..p + lon, ..]).to_owned();
        // Left wrap columns came from the input's last p columns.
        result
            .slice_mut(s![.., .., lon - p.., ..])
            .zip_mut_with(&inner.slice(s![.., .., ..p, ..]), |r, &g| *r += g);
        // Right wrap columns came from the input's first p columns.
        result
            .slice_mut(s![.., .., ..p, ..])
            .zip_mut_with(&inner.slice(s![.., .., lon + p.., ..]), |r, &g| *r += g);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array;

    fn sequential(batch: usize, lat: usize, lon: usize, channels: usize) -> Array4<f64> {
        Array::from_shape_fn((batch, lat, lon, channels), |(b, i, j, c)| {
            (b * 10000 + i * 100 + j * 10 + c) as f64
        })
    }

    #[test]
    fn test_output_shape() {
        let input = sequential(2, 4, 8, 3);
        for p in 0..4 {
            let padded = PeriodicPadding2D::new(p).pad(&input);
            assert_eq!(padded.dim(), (2, 4 + 2 * p, 8 + 2 * p, 3));
        }
    }

    #[test]
    fn test_zero_width_is_identity() {
        let input = sequential(1, 3, 5, 2);
        let padded = PeriodicPadding2D::new(0).pad(&input);
        assert_eq!(padded, input);
    }

    #[test]
    fn test_longitude_wraps_cyclically() {
        let input = sequential(2, 4, 8, 3);
        let p = 2;
        let padded = PeriodicPadding2D::new(p).pad(&input);

        // The first p wrap columns equal the input's last p columns.
        let left = padded.slice(s![.., p..p + 4, ..p, ..]);
        assert_eq!(left, input.slice(s![.., .., 8 - p.., ..]));

        // The last p wrap columns equal the input's first p columns.
        let right = padded.slice(s![.., p..p + 4, 8 + p.., ..]);
        assert_eq!(right, input.slice(s![.., .., ..p, ..]));

        // The interior is the input itself.
        let interior = padded.slice(s![.., p..p + 4, p..p + 8, ..]);
        assert_eq!(interior, input);
    }

    #[test]
    fn test_latitude_rows_are_zero() {
        let input = sequential(2, 4, 8, 3) + 1.0;
        let p = 2;
        let padded = PeriodicPadding2D::new(p).pad(&input);

        assert!(padded.slice(s![.., ..p, .., ..]).iter().all(|&v| v == 0.0));
        assert!(padded
            .slice(s![.., 4 + p.., .., ..])
            .iter()
            .all(|&v| v == 0.0));
    }

    #[test]
    fn test_unpad_gradient_shape_and_fold() {
        let pad = PeriodicPadding2D::new(1);
        let (lat, lon) = (3, 4);
        let grad = Array4::ones((1, lat + 2, lon + 2, 1));
        let folded = pad.unpad_gradient(&grad);
        assert_eq!(folded.dim(), (1, lat, lon, 1));

        // Interior columns keep their gradient; the first and last columns
        // additionally receive the wrap column gradients.
        assert_eq!(folded[[0, 0, 1, 0]], 1.0);
        assert_eq!(folded[[0, 0, 0, 0]], 2.0);
        assert_eq!(folded[[0, 0, lon - 1, 0]], 2.0);
    }

    #[test]
    fn test_pad_unpad_adjoint_identity() {
        // <pad(x), y> == <x, unpad(y)> for the padding linear map.
        let pad = PeriodicPadding2D::new(2);
        let x = sequential(1, 4, 6, 2);
        let y = Array::from_shape_fn((1, 8, 10, 2), |(b, i, j, c)| {
            ((b + 3 * i + 7 * j + 11 * c) % 5) as f64 - 2.0
        });

        let lhs: f64 = (&pad.pad(&x) * &y).sum();
        let rhs: f64 = (&x * &pad.unpad_gradient(&y)).sum();
        assert!((lhs - rhs).abs() < 1e-9);
    }
}
