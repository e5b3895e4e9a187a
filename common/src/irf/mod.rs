//! Instrument response functions.
//!
//! The simulation only ever talks to the four traits below; the concrete
//! tables are loaded by name from a calibration store and are read-only
//! once loaded.

mod aeff;
mod edisp;
mod modf;
mod psf;

pub use aeff::EffectiveAreaTable;
pub use edisp::{EnergyDispersionMatrix, EnergyDispersionParameters};
pub use modf::{ModulationFactor, azimuthal_cdf, invert_azimuthal_cdf};
pub use psf::{KingPsf, PsfParameters};

use crate::{Channel, Degrees, Energy, Radians, interpolation::InterpolationError};
use rand::RngCore;
use serde::Deserialize;
use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum IrfError {
    #[error("{response} evaluated outside its domain: {value} not in [{min}, {max}]")]
    OutOfDomain {
        response: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
    #[error("Polarization degree {0} not in [0, 1]")]
    InvalidPolarizationDegree(f64),
    #[error("Channel {0} out of range [0, {1})")]
    InvalidChannel(Channel, usize),
    #[error("Invalid table: {0}")]
    Table(#[from] InterpolationError),
    #[error("Response matrix row {0} cannot be sampled: {1}")]
    MatrixRow(usize, rand::distr::weighted::Error),
    #[error("Invalid energy dispersion: {0}")]
    InvalidDispersion(String),
    #[error("Cannot read calibration file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid calibration file {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl IrfError {
    fn out_of_domain(response: &'static str, error: InterpolationError) -> Self {
        match error {
            InterpolationError::OutOfBounds(value, min, max) => Self::OutOfDomain {
                response,
                value,
                min,
                max,
            },
            other => Self::Table(other),
        }
    }
}

pub trait EffectiveArea {
    /// Area in cm^2 at the given true energy.
    fn effective_area(&self, energy: Energy) -> Result<f64, IrfError>;
    /// Energy grid on which the response is tabulated.
    fn energy_grid(&self) -> &[Energy];
}

pub trait PointSpreadFunction {
    /// Smears a true sky position into an observed one.
    fn smear(&self, ra: Degrees, dec: Degrees, rng: &mut dyn RngCore) -> (Degrees, Degrees);
}

pub trait ModulationResponse {
    fn modulation_factor(&self, energy: Energy) -> Result<f64, IrfError>;
    /// Samples a photoelectron emission angle in `[0, 2pi)`.
    fn sample_azimuth(
        &self,
        energy: Energy,
        degree: f64,
        angle: Radians,
        rng: &mut dyn RngCore,
    ) -> Result<Radians, IrfError>;
}

pub trait EnergyDispersion {
    fn num_channels(&self) -> usize;
    fn sample_channel(&self, energy: Energy, rng: &mut dyn RngCore) -> Result<Channel, IrfError>;
    /// Nominal reconstructed energy of a channel (the "ebounds" mapping).
    fn channel_to_energy(&self, channel: Channel) -> Result<Energy, IrfError>;
}

/// Borrowed view over the four responses used by the event generation.
#[derive(Clone, Copy)]
pub struct ResponseFunctions<'a> {
    pub aeff: &'a dyn EffectiveArea,
    pub psf: &'a dyn PointSpreadFunction,
    pub modf: &'a dyn ModulationResponse,
    pub edisp: &'a dyn EnergyDispersion,
}

/// A complete, named set of calibrated responses.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct IrfSet {
    pub name: String,
    pub aeff: EffectiveAreaTable,
    pub psf: KingPsf,
    pub modf: ModulationFactor,
    pub edisp: EnergyDispersionMatrix,
}

impl IrfSet {
    pub fn responses(&self) -> ResponseFunctions<'_> {
        ResponseFunctions {
            aeff: &self.aeff,
            psf: &self.psf,
            modf: &self.modf,
            edisp: &self.edisp,
        }
    }
}

/// Directory of `<name>.json` calibration documents.
#[derive(Clone, Debug)]
pub struct IrfStore {
    root: PathBuf,
}

impl IrfStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_of(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}.json"))
    }

    fn read<T: for<'de> Deserialize<'de>>(&self, name: &str) -> Result<T, IrfError> {
        let path = self.path_of(name);
        info!("Loading instrument response functions from {}", path.display());
        let file = File::open(&path).map_err(|source| IrfError::Io {
            path: path.clone(),
            source,
        })?;
        serde_json::from_reader(BufReader::new(file))
            .map_err(|source| IrfError::Json { path, source })
    }

    pub fn load(&self, name: &str) -> Result<IrfSet, IrfError> {
        self.read(name)
    }

    /// Loads only the modulation factor, which is all the polarization analysis needs.
    pub fn load_modulation_factor(&self, name: &str) -> Result<ModulationFactor, IrfError> {
        #[derive(Deserialize)]
        struct ModfOnly {
            modf: ModulationFactor,
        }
        self.read::<ModfOnly>(name).map(|irf| irf.modf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn store() -> IrfStore {
        IrfStore::new(concat!(env!("CARGO_MANIFEST_DIR"), "/../irf"))
    }

    #[test]
    fn loads_baseline_response_set() {
        let irf = store().load("xipe_baseline").unwrap();
        assert_eq!(irf.name, "xipe_baseline");
        let responses = irf.responses();
        assert_eq!(responses.edisp.num_channels(), 256);
        assert!(responses.aeff.effective_area(2.0).unwrap() > 0.0);
        assert_approx_eq!(responses.modf.modulation_factor(5.0).unwrap(), 0.42);
    }

    #[test]
    fn loads_modulation_factor_alone() {
        let modf = store().load_modulation_factor("xipe_baseline").unwrap();
        assert_approx_eq!(modf.modulation_factor(1.0).unwrap(), 0.15);
    }

    #[test]
    fn missing_response_set_is_an_io_error() {
        assert!(matches!(
            store().load("no_such_instrument"),
            Err(IrfError::Io { .. })
        ));
    }
}
