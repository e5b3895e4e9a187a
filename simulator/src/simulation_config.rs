use crate::{
    roi::RoiModel,
    simulation::SimulationError,
    source::SourceComponent,
};
use serde::Deserialize;
use std::{fs::File, io::BufReader, path::{Path, PathBuf}};
use xpol_common::{Degrees, Time};

///
/// This struct is created from the configuration JSON file.
///
#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SimulationConfig {
    pub roi_ra: Degrees,
    pub roi_dec: Degrees,
    pub sources: Vec<SourceComponent>,
    #[serde(default)]
    pub start_time: Time,
    #[serde(default = "SimulationConfig::default_duration")]
    pub duration: Time,
    //  Number of points of the time grid the count spectra are sampled on
    #[serde(default = "SimulationConfig::default_num_time_points")]
    pub num_time_points: usize,
    #[serde(default = "SimulationConfig::default_irf_name")]
    pub irf_name: String,
    #[serde(default)]
    pub seed: u64,
    #[serde(default)]
    pub output_file: Option<PathBuf>,
}

impl SimulationConfig {
    fn default_duration() -> Time {
        10.0
    }

    fn default_num_time_points() -> usize {
        100
    }

    fn default_irf_name() -> String {
        "xipe_baseline".to_owned()
    }

    pub fn from_path(path: &Path) -> Result<Self, SimulationError> {
        let file = File::open(path).map_err(|source| SimulationError::Io {
            path: path.to_owned(),
            source,
        })?;
        serde_json::from_reader(BufReader::new(file)).map_err(|source| SimulationError::Config {
            path: path.to_owned(),
            source,
        })
    }

    /// Checks the observation parameters and every source component.
    pub fn validate(&self) -> Result<(), SimulationError> {
        if !(self.duration > 0.0) {
            return Err(SimulationError::InvalidOption(
                "duration",
                format!("must be positive, found {}", self.duration),
            ));
        }
        if self.num_time_points < 2 {
            return Err(SimulationError::InvalidOption(
                "num-time-points",
                format!("must be at least 2, found {}", self.num_time_points),
            ));
        }
        if self.sources.is_empty() {
            return Err(SimulationError::InvalidOption(
                "sources",
                "at least one source is required".to_owned(),
            ));
        }
        for source in &self.sources {
            source
                .validate()
                .map_err(|e| SimulationError::InvalidSource(source.name.clone(), e))?;
        }
        Ok(())
    }

    pub fn roi_model(&self) -> RoiModel {
        let mut roi = RoiModel::new(self.roi_ra, self.roi_dec);
        roi.add_sources(self.sources.iter().cloned());
        roi
    }
}
