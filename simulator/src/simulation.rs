//! Simulation entry point: from a configuration and a response set to a
//! finished event file.

use crate::{
    roi::{RoiError, RoiModel},
    simulation_config::SimulationConfig,
    source::SourceError,
};
use rand::{SeedableRng, rngs::StdRng};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{info, instrument};
use xpol_common::{
    EventFile, EventFileHeader, GtiList, Time, irf::EnergyDispersion, irf::IrfSet, linspace,
};

#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("Cannot read configuration {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid configuration {path}: {source}")]
    Config {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Invalid option {0}: {1}")]
    InvalidOption(&'static str, String),
    #[error("Invalid source {0}: {1}")]
    InvalidSource(String, SourceError),
    #[error("Empty observation window [{0}, {1}]")]
    EmptyWindow(Time, Time),
    #[error("ROI model: {0}")]
    Roi(#[from] RoiError),
}

/// Everything written alongside the events, besides the events themselves.
pub struct SimulationInfo<'a> {
    pub gti: GtiList,
    pub roi: &'a RoiModel,
    pub irf: &'a IrfSet,
    pub seed: u64,
}

impl SimulationInfo<'_> {
    pub fn header(&self) -> EventFileHeader {
        let mut header = EventFileHeader::new(
            concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION")),
            &self.irf.name,
            self.irf.edisp.num_channels(),
            self.roi.ra(),
            self.roi.dec(),
        );
        header.sources = self.roi.components().map(ToString::to_string).collect();
        header.seed = Some(self.seed);
        header
    }
}

/// Intersection of the observation with the ROI validity window, and the
/// time grid spanning it.
pub fn time_grid(
    config: &SimulationConfig,
    roi: &RoiModel,
) -> Result<(Time, Time, Vec<Time>), SimulationError> {
    let tstart = config.start_time.max(roi.min_time()?);
    let tstop = (config.start_time + config.duration).min(roi.max_time()?);
    if !(tstart < tstop) {
        return Err(SimulationError::EmptyWindow(tstart, tstop));
    }
    Ok((tstart, tstop, linspace(tstart, tstop, config.num_time_points)))
}

#[instrument(skip_all, fields(seed = config.seed))]
pub fn simulate(config: &SimulationConfig, irf: &IrfSet) -> Result<EventFile, SimulationError> {
    config.validate()?;
    let roi = config.roi_model();
    info!("{roi}");
    let (tstart, tstop, times) = time_grid(config, &roi)?;
    info!("Sampling {} time points in [{tstart}, {tstop}]", times.len());

    let mut rng = StdRng::seed_from_u64(config.seed);
    let events = roi.rvs_event_list(irf.responses(), &times, &mut rng)?;
    info!("{} events generated", events.len());

    let info = SimulationInfo {
        gti: GtiList::single(tstart, tstop),
        roi: &roi,
        irf,
        seed: config.seed,
    };
    Ok(EventFile::new(info.header(), info.gti, events))
}
