//! Input datasets and configurations of an analysis.
use crate::error::{HmmClimateError, Result};
use crate::gen_seq::PanelConfig;
use crate::ghmm::HmmConfig;
use serde::{Deserialize, Serialize};

pub const MONTHS: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// Monthly (or any regularly spaced) averages observed at a station.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationDataset {
    pub station: String,
    /// One label per value.
    pub labels: Vec<String>,
    pub values: Vec<f64>,
    #[serde(default = "default_drought_threshold")]
    pub drought_threshold: f64,
}

fn default_drought_threshold() -> f64 {
    10f64
}

impl StationDataset {
    pub fn new(station: &str, labels: Vec<String>, values: Vec<f64>) -> Self {
        Self {
            station: station.to_string(),
            labels,
            values,
            drought_threshold: default_drought_threshold(),
        }
    }
    /// Values labeled by their positions.
    pub fn from_values(station: &str, values: Vec<f64>) -> Self {
        let labels = (0..values.len()).map(|i| format!("{}", i)).collect();
        Self::new(station, labels, values)
    }
    pub fn from_reader<R: std::io::Read>(rdr: R) -> Result<Self> {
        let dataset: Self = serde_json::from_reader(rdr)?;
        dataset.validate()?;
        Ok(dataset)
    }
    pub fn from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let rdr = std::fs::File::open(path).map(std::io::BufReader::new)?;
        Self::from_reader(rdr)
    }
    pub fn validate(&self) -> Result<()> {
        if self.values.is_empty() {
            return Err(HmmClimateError::invalid(format!(
                "no values for station {}",
                self.station
            )));
        }
        if self.labels.len() != self.values.len() {
            return Err(HmmClimateError::invalid(format!(
                "{} labels for {} values",
                self.labels.len(),
                self.values.len()
            )));
        }
        if let Some(pos) = self.values.iter().position(|x| !x.is_finite()) {
            return Err(HmmClimateError::invalid(format!(
                "non-finite value at {}",
                self.labels[pos]
            )));
        }
        Ok(())
    }
    /// Whether each value is below the drought threshold.
    pub fn droughts(&self) -> Vec<bool> {
        self.values
            .iter()
            .map(|&v| v < self.drought_threshold)
            .collect()
    }
}

impl std::default::Default for StationDataset {
    /// Monthly precipitation averages at Toritama in 2023.
    fn default() -> Self {
        let labels = MONTHS.iter().map(|m| m.to_string()).collect();
        let values = vec![7., 8., 9., 10., 14., 15., 16., 17., 18., 19., 20., 21.];
        Self::new("Toritama", labels, values)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// Configurations of the whole analysis.
/// Missing fields take their default values.
#[serde(default)]
pub struct AnalysisConfig {
    pub dataset: StationDataset,
    pub panel: PanelConfig,
    pub hmm: HmmConfig,
    /// Seed of the synthetic data, and of the HMM unless `hmm.seed` is set.
    pub seed: u64,
}

impl AnalysisConfig {
    pub fn new(dataset: StationDataset, panel: PanelConfig, hmm: HmmConfig, seed: u64) -> Self {
        Self {
            dataset,
            panel,
            hmm,
            seed,
        }
    }
    /// Read a configuration from JSON. Missing fields take their default values.
    pub fn from_reader<R: std::io::Read>(rdr: R) -> Result<Self> {
        let config: Self = serde_json::from_reader(rdr)?;
        config.dataset.validate()?;
        config.panel.validate()?;
        Ok(config)
    }
    pub fn from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let rdr = std::fs::File::open(path).map(std::io::BufReader::new)?;
        Self::from_reader(rdr)
    }
}

impl std::default::Default for AnalysisConfig {
    fn default() -> Self {
        Self::new(
            StationDataset::default(),
            PanelConfig::default(),
            HmmConfig::default(),
            32389,
        )
    }
}
