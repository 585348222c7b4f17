//! Labeled Weather Grids
//!
//! Storage for gridded atmospheric fields with time, latitude, longitude
//! and channel coordinates. The channel axis is described by a [`VarDict`]:
//! an ordered mapping from physical variable name to its pressure levels
//! (or none, for single-level fields). Channel order always follows the
//! dictionary's insertion order.

use chrono::{DateTime, Utc};
use ndarray::{s, Array1, Array3, Array4, Axis};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use crate::error::{Error, Result};

/// One variable entry: a name and its optional pressure levels.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VarEntry {
    pub name: String,
    /// `None` for single-level (surface) fields
    pub levels: Option<Vec<f64>>,
}

/// Ordered mapping from variable name to pressure levels.
///
/// A level-less variable occupies one channel; a leveled variable occupies
/// one channel per level, in level order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct VarDict {
    entries: Vec<VarEntry>,
}

impl VarDict {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a single-level variable
    pub fn with_surface_var(mut self, name: impl Into<String>) -> Self {
        self.entries.push(VarEntry {
            name: name.into(),
            levels: None,
        });
        self
    }

    /// Append a variable with pressure levels
    pub fn with_level_var(mut self, name: impl Into<String>, levels: Vec<f64>) -> Self {
        self.entries.push(VarEntry {
            name: name.into(),
            levels: Some(levels),
        });
        self
    }

    /// Total channel count implied by the dictionary
    pub fn num_channels(&self) -> usize {
        self.entries
            .iter()
            .map(|e| e.levels.as_ref().map_or(1, Vec::len))
            .sum()
    }

    /// Number of variables
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &VarEntry> {
        self.entries.iter()
    }

    /// Channel range occupied by a variable, in insertion order
    pub fn channel_range(&self, name: &str) -> Option<std::ops::Range<usize>> {
        let mut start = 0;
        for entry in &self.entries {
            let width = entry.levels.as_ref().map_or(1, Vec::len);
            if entry.name == name {
                return Some(start..start + width);
            }
            start += width;
        }
        None
    }
}

/// A labeled gridded dataset with layout (time, lat, lon, channel).
///
/// Latitude and longitude coordinates are in degrees. The channel axis must
/// match the variable dictionary exactly; this is checked at construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherDataset {
    pub time: Vec<DateTime<Utc>>,
    pub lat: Array1<f64>,
    pub lon: Array1<f64>,
    pub fields: Array4<f64>,
    pub var_dict: VarDict,
}

impl WeatherDataset {
    /// Create a dataset, validating coordinates against the field tensor and
    /// the channel axis against the variable dictionary.
    pub fn new(
        time: Vec<DateTime<Utc>>,
        lat: Array1<f64>,
        lon: Array1<f64>,
        fields: Array4<f64>,
        var_dict: VarDict,
    ) -> Result<Self> {
        let (n_time, n_lat, n_lon, n_channels) = fields.dim();
        if time.len() != n_time {
            return Err(Error::DimensionMismatch {
                axis: "time",
                coord: time.len(),
                field: n_time,
            });
        }
        if lat.len() != n_lat {
            return Err(Error::DimensionMismatch {
                axis: "lat",
                coord: lat.len(),
                field: n_lat,
            });
        }
        if lon.len() != n_lon {
            return Err(Error::DimensionMismatch {
                axis: "lon",
                coord: lon.len(),
                field: n_lon,
            });
        }
        let expected = var_dict.num_channels();
        if expected != n_channels {
            return Err(Error::ChannelMismatch {
                expected,
                actual: n_channels,
            });
        }

        Ok(Self {
            time,
            lat,
            lon,
            fields,
            var_dict,
        })
    }

    /// Number of time steps
    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    /// Total channel count
    pub fn num_channels(&self) -> usize {
        self.fields.len_of(Axis(3))
    }

    /// Extract one variable as a labeled field across all time steps
    pub fn extract(&self, name: &str) -> Result<ForecastField> {
        let range = self
            .var_dict
            .channel_range(name)
            .ok_or_else(|| Error::UnknownVariable(name.to_string()))?;
        let entry = self
            .var_dict
            .iter()
            .find(|e| e.name == name)
            .ok_or_else(|| Error::UnknownVariable(name.to_string()))?;

        let field = match &entry.levels {
            None => ForecastField::Surface(
                self.fields.slice(s![.., .., .., range.start]).to_owned(),
            ),
            Some(levels) => ForecastField::Leveled {
                levels: levels.clone(),
                values: self.fields.slice(s![.., .., .., range]).to_owned(),
            },
        };
        Ok(field)
    }

    /// Save as JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = File::create(path)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer(writer, self)?;
        Ok(())
    }

    /// Load from JSON
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let dataset: Self = serde_json::from_reader(reader)?;
        // Re-run the construction checks; the file may not be ours.
        Self::new(
            dataset.time,
            dataset.lat,
            dataset.lon,
            dataset.fields,
            dataset.var_dict,
        )
    }
}

/// One forecast variable: a surface field or a stack of pressure levels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ForecastField {
    /// (time, lat, lon)
    Surface(Array3<f64>),
    /// (time, lat, lon, level) with its level coordinate
    Leveled {
        levels: Vec<f64>,
        values: Array4<f64>,
    },
}

impl ForecastField {
    /// Number of channels the field occupies
    pub fn num_channels(&self) -> usize {
        match self {
            ForecastField::Surface(_) => 1,
            ForecastField::Leveled { levels, .. } => levels.len(),
        }
    }

    /// A single (lat, lon) map at the given time index (and level index for
    /// leveled fields; the level index is ignored for surface fields).
    pub fn map_at(&self, time_idx: usize, level_idx: usize) -> ndarray::Array2<f64> {
        match self {
            ForecastField::Surface(values) => values.slice(s![time_idx, .., ..]).to_owned(),
            ForecastField::Leveled { values, .. } => {
                values.slice(s![time_idx, .., .., level_idx]).to_owned()
            }
        }
    }
}

/// A merged set of forecast variables with shared coordinates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Forecast {
    pub time: Vec<DateTime<Utc>>,
    pub lat: Array1<f64>,
    pub lon: Array1<f64>,
    fields: Vec<(String, ForecastField)>,
}

impl Forecast {
    pub fn new(time: Vec<DateTime<Utc>>, lat: Array1<f64>, lon: Array1<f64>) -> Self {
        Self {
            time,
            lat,
            lon,
            fields: Vec::new(),
        }
    }

    /// Append a named field
    pub fn insert(&mut self, name: impl Into<String>, field: ForecastField) {
        self.fields.push((name.into(), field));
    }

    /// Look up a field by variable name
    pub fn get(&self, name: &str) -> Option<&ForecastField> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, f)| f)
    }

    /// Iterate (name, field) pairs in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ForecastField)> {
        self.fields.iter().map(|(n, f)| (n.as_str(), f))
    }

    /// Number of variables
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn times(n: usize) -> Vec<DateTime<Utc>> {
        (0..n)
            .map(|i| {
                Utc.with_ymd_and_hms(1979, 1, 1, 0, 0, 0).unwrap()
                    + chrono::Duration::hours(6 * i as i64)
            })
            .collect()
    }

    #[test]
    fn test_var_dict_channel_accounting() {
        let dict = VarDict::new()
            .with_surface_var("t")
            .with_level_var("z", vec![500.0, 850.0]);

        assert_eq!(dict.num_channels(), 3);
        assert_eq!(dict.channel_range("t"), Some(0..1));
        assert_eq!(dict.channel_range("z"), Some(1..3));
        assert_eq!(dict.channel_range("q"), None);
    }

    #[test]
    fn test_dataset_validates_channels() {
        let dict = VarDict::new().with_surface_var("t");
        let result = WeatherDataset::new(
            times(2),
            Array1::zeros(4),
            Array1::zeros(8),
            Array4::zeros((2, 4, 8, 3)),
            dict,
        );
        assert!(matches!(
            result,
            Err(Error::ChannelMismatch {
                expected: 1,
                actual: 3
            })
        ));
    }

    #[test]
    fn test_dataset_validates_coordinates() {
        let dict = VarDict::new().with_surface_var("t");
        let result = WeatherDataset::new(
            times(3),
            Array1::zeros(4),
            Array1::zeros(8),
            Array4::zeros((2, 4, 8, 1)),
            dict,
        );
        assert!(matches!(
            result,
            Err(Error::DimensionMismatch { axis: "time", .. })
        ));
    }

    #[test]
    fn test_extract_variable() {
        let dict = VarDict::new()
            .with_surface_var("t")
            .with_level_var("z", vec![500.0, 850.0]);
        let mut fields = Array4::zeros((2, 4, 8, 3));
        fields.slice_mut(s![.., .., .., 1]).fill(5.0);
        fields.slice_mut(s![.., .., .., 2]).fill(8.0);

        let ds = WeatherDataset::new(
            times(2),
            Array1::zeros(4),
            Array1::zeros(8),
            fields,
            dict,
        )
        .unwrap();

        match ds.extract("t").unwrap() {
            ForecastField::Surface(values) => {
                assert_eq!(values.dim(), (2, 4, 8));
                assert!(values.iter().all(|&v| v == 0.0));
            }
            _ => panic!("t should be a surface field"),
        }

        match ds.extract("z").unwrap() {
            ForecastField::Leveled { levels, values } => {
                assert_eq!(levels, vec![500.0, 850.0]);
                assert_eq!(values.dim(), (2, 4, 8, 2));
                assert!(values.slice(s![.., .., .., 0]).iter().all(|&v| v == 5.0));
                assert!(values.slice(s![.., .., .., 1]).iter().all(|&v| v == 8.0));
            }
            _ => panic!("z should be leveled"),
        }

        assert!(matches!(
            ds.extract("missing"),
            Err(Error::UnknownVariable(_))
        ));
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dict = VarDict::new().with_surface_var("t");
        let ds = WeatherDataset::new(
            times(2),
            Array1::linspace(-80.0, 80.0, 4),
            Array1::linspace(0.0, 315.0, 8),
            Array4::ones((2, 4, 8, 1)),
            dict,
        )
        .unwrap();

        let path = std::env::temp_dir().join("rust_weather_cnn_test_dataset.json");
        ds.save(&path).unwrap();
        let restored = WeatherDataset::load(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(restored.time, ds.time);
        assert_eq!(restored.fields, ds.fields);
        assert_eq!(restored.var_dict, ds.var_dict);
    }
}
