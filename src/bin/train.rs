//! Train a fully-convolutional forecast network
//!
//! Usage: cargo run --bin train -- --data data.json --epochs 50 --lead 4

use anyhow::{bail, Result};
use clap::Parser;
use ndarray::s;
use tracing::info;

use rust_weather_cnn::nn::{Adam, FullyConvNet, NetworkConfig};
use rust_weather_cnn::{DataGenerator, WeatherDataset};

#[derive(Parser)]
#[command(name = "train")]
#[command(about = "Train a fully-convolutional network on a gridded dataset")]
struct Args {
    /// Input dataset path
    #[arg(long, default_value = "data.json")]
    data: String,

    /// Output model path
    #[arg(long, default_value = "model.json")]
    model: String,

    /// Forecast lead time, in dataset time steps
    #[arg(long, default_value_t = 4)]
    lead: usize,

    /// Number of training epochs
    #[arg(long, default_value_t = 50)]
    epochs: usize,

    /// Batch size
    #[arg(long, default_value_t = 8)]
    batch: usize,

    /// Learning rate
    #[arg(long, default_value_t = 0.001)]
    lr: f64,

    /// Filters per layer; the last entry must match the dataset channels
    #[arg(long, value_delimiter = ',', default_values_t = [32, 32, 3])]
    filters: Vec<usize>,

    /// Kernel size per layer
    #[arg(long, value_delimiter = ',', default_values_t = [5, 5, 5])]
    kernels: Vec<usize>,

    /// Dropout rate for hidden layers
    #[arg(long, default_value_t = 0.0)]
    dropout: f64,

    /// Fraction of the record used for training, the rest for evaluation
    #[arg(long, default_value_t = 0.8)]
    train_frac: f64,

    /// Time subsampling step for normalization statistics
    #[arg(long, default_value_t = 50)]
    subsample: usize,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    info!("loading dataset from {}", args.data);
    let dataset = WeatherDataset::load(&args.data)?;
    info!(
        "loaded {} time steps, {}x{} grid, {} channels",
        dataset.len(),
        dataset.lat.len(),
        dataset.lon.len(),
        dataset.num_channels()
    );

    if args.filters.len() != args.kernels.len() {
        bail!(
            "--filters and --kernels must have the same length, got {} and {}",
            args.filters.len(),
            args.kernels.len()
        );
    }
    let channels = dataset.num_channels();
    if args.filters.last() != Some(&channels) {
        bail!(
            "the final layer must produce {} channels to match the dataset, got {:?}",
            channels,
            args.filters
        );
    }
    if !(0.0..1.0).contains(&args.train_frac) || args.train_frac == 0.0 {
        bail!("train_frac must be in (0, 1), got {}", args.train_frac);
    }

    // Chronological split: the early record trains, the tail evaluates
    let split = ((dataset.len() as f64) * args.train_frac) as usize;
    let train_ds = WeatherDataset::new(
        dataset.time[..split].to_vec(),
        dataset.lat.clone(),
        dataset.lon.clone(),
        dataset.fields.slice(s![..split, .., .., ..]).to_owned(),
        dataset.var_dict.clone(),
    )?;
    let test_ds = WeatherDataset::new(
        dataset.time[split..].to_vec(),
        dataset.lat.clone(),
        dataset.lon.clone(),
        dataset.fields.slice(s![split.., .., .., ..]).to_owned(),
        dataset.var_dict.clone(),
    )?;

    let train_gen = DataGenerator::new(train_ds, args.lead, args.batch, true, args.subsample)?;
    let test_gen = DataGenerator::new(test_ds, args.lead, args.batch, false, args.subsample)?;
    info!(
        "training on {} samples, evaluating on {}",
        train_gen.num_samples(),
        test_gen.num_samples()
    );

    let mut config = NetworkConfig::new(channels).with_dropout(args.dropout);
    for (&filters, &kernel) in args.filters.iter().zip(&args.kernels) {
        config = config.add_layer(filters, kernel);
    }

    let mut model = FullyConvNet::from_config(config)?;
    model.set_optimizer(Box::new(Adam::new(args.lr)));
    model.summary();

    let (x_train, y_train) = train_gen.training_arrays();
    info!("training for {} epochs, batch size {}", args.epochs, args.batch);
    let losses = model.train(&x_train, &y_train, args.epochs, args.batch);

    let (x_test, y_test) = test_gen.training_arrays();
    let train_loss = model.evaluate(&x_train, &y_train);
    let test_loss = model.evaluate(&x_test, &y_test);
    info!("final training MSE: {:.6}", train_loss);
    info!("held-out MSE: {:.6}", test_loss);
    if let (Some(first), Some(last)) = (losses.first(), losses.last()) {
        info!("loss went from {:.6} to {:.6}", first, last);
    }

    model.save(&args.model)?;
    info!("model saved to {}", args.model);

    Ok(())
}
