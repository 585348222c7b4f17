//! Map Rendering
//!
//! Equirectangular PNG rendering of 2-D gridded fields with interval-based
//! shading: values are quantized into contour bins of a fixed width and each
//! bin is filled from a color palette. Values below an optional minimum
//! shade level are left on the background.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{ImageBuffer, ImageEncoder, Rgb};
use ndarray::Array2;
use thiserror::Error;

/// Errors that can occur during map rendering.
#[derive(Error, Debug)]
pub enum PlotError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image encoding error: {0}")]
    Image(#[from] image::ImageError),
    #[error("Field has no cells to render")]
    EmptyField,
    #[error("Contour interval must be positive, got {0}")]
    InvalidInterval(f64),
}

/// Color palettes for shaded maps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Palette {
    /// 25-stop purple-to-red rainbow, suited to temperature fields
    RainbowPurpleRed,
    /// 7-stop blue-to-purple ramp, suited to precipitation fields
    BluePurple,
}

const RAINBOW_PURPLE_RED: [[u8; 3]; 25] = [
    [120, 28, 129],
    [125, 50, 148],
    [123, 72, 165],
    [117, 93, 177],
    [108, 112, 184],
    [97, 130, 187],
    [87, 146, 185],
    [78, 160, 178],
    [72, 172, 168],
    [69, 182, 155],
    [70, 191, 139],
    [77, 198, 121],
    [89, 204, 103],
    [106, 208, 85],
    [126, 210, 70],
    [149, 210, 57],
    [173, 208, 48],
    [196, 202, 43],
    [216, 192, 43],
    [230, 177, 46],
    [238, 156, 51],
    [240, 129, 55],
    [236, 98, 56],
    [227, 63, 55],
    [213, 23, 53],
];

const BLUE_PURPLE: [[u8; 3]; 7] = [
    [198, 219, 239],
    [158, 202, 225],
    [107, 174, 214],
    [66, 146, 198],
    [84, 107, 190],
    [106, 81, 163],
    [84, 39, 143],
];

impl Palette {
    /// Color stops of the palette, from lowest to highest bin
    pub fn colors(&self) -> &'static [[u8; 3]] {
        match self {
            Palette::RainbowPurpleRed => &RAINBOW_PURPLE_RED,
            Palette::BluePurple => &BLUE_PURPLE,
        }
    }
}

/// Shading style for a rendered map.
#[derive(Debug, Clone)]
pub struct MapStyle {
    pub palette: Palette,
    /// Width of one contour bin, in field units
    pub contour_interval: f64,
    /// Values below this are not shaded; `None` shades everything
    pub shade_min_level: Option<f64>,
    /// Background color for unshaded cells
    pub background: [u8; 3],
    /// Side length of the pixel block drawn per grid cell
    pub pixels_per_cell: u32,
}

impl Default for MapStyle {
    fn default() -> Self {
        Self {
            palette: Palette::RainbowPurpleRed,
            contour_interval: 1.0,
            shade_min_level: None,
            background: [235, 235, 235],
            pixels_per_cell: 4,
        }
    }
}

/// Style preset for temperature fields: fine intervals on the rainbow ramp.
pub fn temperature_style() -> MapStyle {
    MapStyle {
        palette: Palette::RainbowPurpleRed,
        contour_interval: 0.25,
        ..MapStyle::default()
    }
}

/// Style preset for precipitation fields: coarse intervals on the
/// blue-purple ramp, hiding cells below 1 field unit.
pub fn precipitation_style() -> MapStyle {
    MapStyle {
        palette: Palette::BluePurple,
        contour_interval: 2.0,
        shade_min_level: Some(1.0),
        ..MapStyle::default()
    }
}

/// Shade a field into an RGB image without touching the filesystem.
///
/// Row 0 of the field becomes the top pixel row; the caller owns any
/// latitude reordering.
pub fn shade_image(
    field: &Array2<f64>,
    style: &MapStyle,
) -> Result<ImageBuffer<Rgb<u8>, Vec<u8>>, PlotError> {
    let (n_rows, n_cols) = field.dim();
    if n_rows == 0 || n_cols == 0 || style.pixels_per_cell == 0 {
        return Err(PlotError::EmptyField);
    }
    if !(style.contour_interval > 0.0) {
        return Err(PlotError::InvalidInterval(style.contour_interval));
    }

    let colors = style.palette.colors();
    let shown_min = match style.shade_min_level {
        Some(min) => min,
        None => field.iter().cloned().fold(f64::INFINITY, f64::min),
    };

    let cell = style.pixels_per_cell;
    let width = n_cols as u32 * cell;
    let height = n_rows as u32 * cell;
    let mut img: ImageBuffer<Rgb<u8>, Vec<u8>> = ImageBuffer::new(width, height);

    for row in 0..n_rows {
        for col in 0..n_cols {
            let value = field[[row, col]];
            let color = if !value.is_finite() || value < shown_min {
                style.background
            } else {
                let bin = ((value - shown_min) / style.contour_interval) as usize;
                colors[bin.min(colors.len() - 1)]
            };

            for dy in 0..cell {
                for dx in 0..cell {
                    img.put_pixel(col as u32 * cell + dx, row as u32 * cell + dy, Rgb(color));
                }
            }
        }
    }

    Ok(img)
}

/// Render a field to an RGB PNG at `path`.
pub fn render_map(field: &Array2<f64>, style: &MapStyle, path: &Path) -> Result<(), PlotError> {
    let img = shade_image(field, style)?;

    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    let encoder =
        PngEncoder::new_with_quality(writer, CompressionType::Default, FilterType::Adaptive);
    encoder.write_image(
        img.as_raw(),
        img.width(),
        img.height(),
        image::ExtendedColorType::Rgb8,
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array;

    #[test]
    fn test_image_dimensions() {
        let field = Array2::zeros((4, 8));
        let style = MapStyle {
            pixels_per_cell: 3,
            ..MapStyle::default()
        };
        let img = shade_image(&field, &style).unwrap();
        assert_eq!((img.width(), img.height()), (24, 12));
    }

    #[test]
    fn test_empty_field_rejected() {
        let field = Array2::zeros((0, 8));
        assert!(matches!(
            shade_image(&field, &MapStyle::default()),
            Err(PlotError::EmptyField)
        ));
    }

    #[test]
    fn test_invalid_interval_rejected() {
        let field = Array2::zeros((2, 2));
        let style = MapStyle {
            contour_interval: 0.0,
            ..MapStyle::default()
        };
        assert!(matches!(
            shade_image(&field, &style),
            Err(PlotError::InvalidInterval(_))
        ));
    }

    #[test]
    fn test_bins_increase_along_ramp() {
        // A left-to-right gradient spanning several intervals uses different
        // palette stops for the first and last columns.
        let field = Array::from_shape_fn((1, 10), |(_, j)| j as f64);
        let style = MapStyle {
            contour_interval: 1.0,
            pixels_per_cell: 1,
            ..MapStyle::default()
        };
        let img = shade_image(&field, &style).unwrap();
        assert_ne!(img.get_pixel(0, 0), img.get_pixel(9, 0));
    }

    #[test]
    fn test_shade_min_hides_low_values() {
        let mut field = Array2::zeros((1, 2));
        field[[0, 1]] = 5.0;
        let style = precipitation_style();
        let styled = MapStyle {
            pixels_per_cell: 1,
            ..style
        };
        let img = shade_image(&field, &styled).unwrap();
        assert_eq!(img.get_pixel(0, 0).0, styled.background);
        assert_ne!(img.get_pixel(1, 0).0, styled.background);
    }
}
