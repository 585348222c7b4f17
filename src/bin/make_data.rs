//! Synthesize an idealized gridded weather dataset
//!
//! Builds a physically plausible toy record — a surface temperature field
//! with a latitudinal gradient and seasonal cycle, plus geopotential at two
//! pressure levels carrying a traveling planetary wave — and saves it as a
//! JSON dataset for the train/forecast binaries.
//!
//! Usage: cargo run --bin make_data -- --out data.json --time-steps 400

use anyhow::{Context, Result};
use chrono::{Duration, TimeZone, Utc};
use clap::Parser;
use ndarray::{Array1, Array4};
use rand::Rng;
use tracing::info;

use rust_weather_cnn::data::VarDict;
use rust_weather_cnn::WeatherDataset;

#[derive(Parser)]
#[command(name = "make_data")]
#[command(about = "Synthesize an idealized gridded weather dataset")]
struct Args {
    /// Output dataset path
    #[arg(long, default_value = "data.json")]
    out: String,

    /// Number of time steps
    #[arg(long, default_value_t = 400)]
    time_steps: usize,

    /// Latitude grid points
    #[arg(long, default_value_t = 16)]
    lat_points: usize,

    /// Longitude grid points
    #[arg(long, default_value_t = 32)]
    lon_points: usize,

    /// Hours between time steps
    #[arg(long, default_value_t = 6)]
    step_hours: i64,

    /// Standard deviation of the additive noise
    #[arg(long, default_value_t = 0.5)]
    noise: f64,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let start = Utc
        .with_ymd_and_hms(1979, 1, 1, 0, 0, 0)
        .single()
        .context("invalid start date")?;
    let time: Vec<_> = (0..args.time_steps)
        .map(|i| start + Duration::hours(args.step_hours * i as i64))
        .collect();

    // Cell-centered grid, poles excluded
    let lat = Array1::linspace(
        -90.0 + 90.0 / args.lat_points as f64,
        90.0 - 90.0 / args.lat_points as f64,
        args.lat_points,
    );
    let lon = Array1::linspace(
        0.0,
        360.0 - 360.0 / args.lon_points as f64,
        args.lon_points,
    );

    let var_dict = VarDict::new()
        .with_surface_var("t2m")
        .with_level_var("z", vec![500.0, 850.0]);

    let mut rng = rand::thread_rng();
    let mut fields = Array4::zeros((args.time_steps, args.lat_points, args.lon_points, 3));

    let hours_per_year = 365.25 * 24.0;
    for t in 0..args.time_steps {
        let hours = (args.step_hours * t as i64) as f64;
        let season = (2.0 * std::f64::consts::PI * hours / hours_per_year).sin();
        // Planetary wave phase advances a full turn every ~5 days
        let phase = 2.0 * std::f64::consts::PI * hours / 120.0;

        for (i, &lat_deg) in lat.iter().enumerate() {
            let lat_rad = lat_deg.to_radians();
            // Equator-to-pole gradient with a mild polar sharpening
            let gradient = (lat_rad.abs() / std::f64::consts::FRAC_PI_2).powf(1.15);
            let baseline = 300.0 * (1.0 - gradient) + 250.0 * gradient;
            let seasonal = 15.0 * season * lat_rad.sin();

            for (j, &lon_deg) in lon.iter().enumerate() {
                let lon_rad = lon_deg.to_radians();
                let wave = (3.0 * lon_rad - phase).sin() * lat_rad.cos();

                fields[[t, i, j, 0]] =
                    baseline + seasonal + 2.0 * wave + args.noise * (rng.gen::<f64>() - 0.5);
                fields[[t, i, j, 1]] =
                    5500.0 - 800.0 * gradient + 120.0 * wave + args.noise * (rng.gen::<f64>() - 0.5);
                fields[[t, i, j, 2]] =
                    1400.0 - 300.0 * gradient + 60.0 * wave + args.noise * (rng.gen::<f64>() - 0.5);
            }
        }
    }

    let dataset = WeatherDataset::new(time, lat, lon, fields, var_dict)?;
    dataset.save(&args.out)?;

    info!(
        "wrote {} time steps on a {}x{} grid with {} channels to {}",
        args.time_steps,
        args.lat_points,
        args.lon_points,
        dataset.num_channels(),
        args.out
    );
    Ok(())
}
