//! Map Plotting Module
//!
//! Renders gridded fields as shaded equirectangular PNG maps.

mod map;

pub use map::{
    precipitation_style, render_map, shade_image, temperature_style, MapStyle, Palette, PlotError,
};
