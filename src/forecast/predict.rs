//! Prediction Assembly
//!
//! Runs batched inference, rescales the raw network output back to physical
//! units, and splits the channel axis into named variables following the
//! variable dictionary's order: one channel per surface variable, one per
//! pressure level for leveled variables.

use ndarray::s;

use crate::data::{DataGenerator, Forecast, ForecastField};
use crate::error::{Error, Result};
use crate::nn::FullyConvNet;

/// Create a forecast dataset from a trained network and a data generator.
///
/// The output channel count is validated against the generator's variable
/// dictionary before any slicing; a mismatch is an error, never a silently
/// truncated forecast.
pub fn create_predictions(
    model: &mut FullyConvNet,
    generator: &DataGenerator,
) -> Result<Forecast> {
    let preds = model.predict_generator(generator);

    let expected = generator.var_dict().num_channels();
    let actual = preds.len_of(ndarray::Axis(3));
    if expected != actual {
        return Err(Error::ChannelMismatch { expected, actual });
    }

    // Unnormalize: y * std + mean, broadcast over the channel axis
    let mut preds = preds;
    for (c, (&m, &s)) in generator
        .mean()
        .iter()
        .zip(generator.std().iter())
        .enumerate()
    {
        preds
            .slice_mut(s![.., .., .., c])
            .mapv_inplace(|v| v * s + m);
    }

    let mut forecast = Forecast::new(
        generator.valid_time().to_vec(),
        generator.lat().clone(),
        generator.lon().clone(),
    );

    // Walk the channel axis in dictionary order
    let mut channel = 0;
    for entry in generator.var_dict().iter() {
        match &entry.levels {
            None => {
                let values = preds.slice(s![.., .., .., channel]).to_owned();
                forecast.insert(entry.name.clone(), ForecastField::Surface(values));
                channel += 1;
            }
            Some(levels) => {
                let n_levels = levels.len();
                let values = preds
                    .slice(s![.., .., .., channel..channel + n_levels])
                    .to_owned();
                forecast.insert(
                    entry.name.clone(),
                    ForecastField::Leveled {
                        levels: levels.clone(),
                        values,
                    },
                );
                channel += n_levels;
            }
        }
    }

    Ok(forecast)
}
