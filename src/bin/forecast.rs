//! Create and evaluate forecasts from a trained model
//!
//! Runs inference over the tail of a dataset, reports latitude-weighted
//! RMSE per variable, and renders shaded maps of the first forecast.
//!
//! Usage: cargo run --bin forecast -- --data data.json --model model.json

use anyhow::Result;
use clap::Parser;
use ndarray::s;
use std::path::Path;
use tracing::info;

use rust_weather_cnn::data::ForecastField;
use rust_weather_cnn::forecast::compute_weighted_rmse;
use rust_weather_cnn::plot::{precipitation_style, render_map, temperature_style, MapStyle};
use rust_weather_cnn::{create_predictions, DataGenerator, FullyConvNet, WeatherDataset};

#[derive(Parser)]
#[command(name = "forecast")]
#[command(about = "Evaluate a trained network and render forecast maps")]
struct Args {
    /// Input dataset path
    #[arg(long, default_value = "data.json")]
    data: String,

    /// Trained model path
    #[arg(long, default_value = "model.json")]
    model: String,

    /// Directory for rendered maps
    #[arg(long, default_value = "maps")]
    out_dir: String,

    /// Forecast lead time, in dataset time steps
    #[arg(long, default_value_t = 4)]
    lead: usize,

    /// Batch size for inference
    #[arg(long, default_value_t = 8)]
    batch: usize,

    /// Fraction of the record tail to forecast over
    #[arg(long, default_value_t = 0.2)]
    test_frac: f64,

    /// Time subsampling step for normalization statistics
    #[arg(long, default_value_t = 50)]
    subsample: usize,
}

/// Pick a shading style for a variable, spreading the palette over the
/// field's value range; precipitation-like variables keep their preset.
fn style_for(name: &str, field_min: f64, field_max: f64) -> MapStyle {
    if name == "tp" || name.starts_with("precip") {
        return precipitation_style();
    }
    let mut style = temperature_style();
    let span = (field_max - field_min).max(1e-10);
    style.contour_interval = span / style.palette.colors().len() as f64;
    style
}

fn render_first_map(
    name: &str,
    label: &str,
    field: &ndarray::Array2<f64>,
    out_dir: &Path,
) -> Result<()> {
    let min = field.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = field.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let style = style_for(name, min, max);
    let path = out_dir.join(format!("{label}.png"));
    render_map(field, &style, &path)?;
    info!("rendered {}", path.display());
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let dataset = WeatherDataset::load(&args.data)?;
    let mut model = FullyConvNet::load(&args.model)?;

    // Forecast over the chronological tail of the record
    let start = dataset.len() - ((dataset.len() as f64) * args.test_frac) as usize;
    let tail = WeatherDataset::new(
        dataset.time[start..].to_vec(),
        dataset.lat.clone(),
        dataset.lon.clone(),
        dataset.fields.slice(s![start.., .., .., ..]).to_owned(),
        dataset.var_dict.clone(),
    )?;
    // Keep an unnormalized copy around for the truth fields
    let truth_ds = tail.clone();

    let generator = DataGenerator::new(tail, args.lead, args.batch, false, args.subsample)?;
    let forecast = create_predictions(&mut model, &generator)?;
    info!(
        "created forecasts for {} valid times at lead {} steps",
        forecast.time.len(),
        args.lead
    );

    let out_dir = Path::new(&args.out_dir);
    std::fs::create_dir_all(out_dir)?;

    for (name, predicted) in forecast.iter() {
        let truth = truth_ds.extract(name)?;
        match (predicted, &truth) {
            (ForecastField::Surface(pred), ForecastField::Surface(truth_vals)) => {
                let truth_valid = truth_vals.slice(s![args.lead.., .., ..]).to_owned();
                let rmse = compute_weighted_rmse(pred, &truth_valid, &forecast.lat);
                info!("{}: weighted RMSE = {:.4}", name, rmse);

                render_first_map(name, name, &pred.slice(s![0, .., ..]).to_owned(), out_dir)?;
            }
            (
                ForecastField::Leveled {
                    levels,
                    values: pred,
                },
                ForecastField::Leveled {
                    values: truth_vals, ..
                },
            ) => {
                for (k, level) in levels.iter().enumerate() {
                    let pred_level = pred.slice(s![.., .., .., k]).to_owned();
                    let truth_level = truth_vals.slice(s![args.lead.., .., .., k]).to_owned();
                    let rmse = compute_weighted_rmse(&pred_level, &truth_level, &forecast.lat);
                    info!("{}@{}: weighted RMSE = {:.4}", name, level, rmse);

                    let label = format!("{}_{}", name, level);
                    render_first_map(
                        name,
                        &label,
                        &pred_level.slice(s![0, .., ..]).to_owned(),
                        out_dir,
                    )?;
                }
            }
            _ => anyhow::bail!("variable {} has mismatched level structure", name),
        }
    }

    Ok(())
}
