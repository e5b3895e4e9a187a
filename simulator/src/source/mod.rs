//! Source components of a region-of-interest model.

mod models;
mod position;

pub use models::{ParameterExpression, PolarizationModel, SpectralModel, Transformation};
pub use position::{PositionModel, SkyImage};

use crate::count_spectrum::CountSpectrum;
use rand::{Rng, RngCore};
use serde::Deserialize;
use std::fmt;
use thiserror::Error;
use tracing::{debug, instrument};
use xpol_common::{
    Degrees, Energy, EventColumn, EventList, EventListError, SourceId, Time,
    interpolation::InterpolationError,
    irf::{IrfError, ResponseFunctions},
};

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Source {0} has not been added to a ROI model")]
    Unregistered(String),
    #[error("Invalid {0}: {1}")]
    InvalidExtent(&'static str, f64),
    #[error("Invalid validity window [{0}, {1})")]
    InvalidWindow(Time, Time),
    #[error("Invalid image: {0}")]
    InvalidImage(String),
    #[error("Model evaluation: {0}")]
    Interpolation(#[from] InterpolationError),
    #[error("Response function: {0}")]
    Irf(#[from] IrfError),
    #[error("Event list: {0}")]
    EventList(#[from] EventListError),
    #[error("Invalid normal distribution: {0}")]
    Normal(#[from] rand_distr::NormalError),
    #[error("Invalid Poisson distribution: {0}")]
    Poisson(#[from] rand_distr::PoissonError),
}

/// A sky component with its own position, spectrum and polarization.
///
/// The identifier is assigned by the ROI model on insertion and never
/// by the configuration.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SourceComponent {
    pub name: String,
    #[serde(skip)]
    identifier: Option<SourceId>,
    pub position: PositionModel,
    pub spectrum: SpectralModel,
    #[serde(default)]
    pub polarization: PolarizationModel,
    #[serde(default = "SourceComponent::default_min_time")]
    pub min_time: Time,
    #[serde(default = "SourceComponent::default_max_time")]
    pub max_time: Time,
}

/// Validity window of a component that does not declare one.
pub const DEFAULT_MIN_TIME: Time = 0.0;
pub const DEFAULT_MAX_TIME: Time = 1e6;

impl SourceComponent {
    fn default_min_time() -> Time {
        DEFAULT_MIN_TIME
    }

    fn default_max_time() -> Time {
        DEFAULT_MAX_TIME
    }

    pub fn new(
        name: &str,
        position: PositionModel,
        spectrum: SpectralModel,
        polarization: PolarizationModel,
    ) -> Self {
        Self {
            name: name.to_owned(),
            identifier: None,
            position,
            spectrum,
            polarization,
            min_time: Self::default_min_time(),
            max_time: Self::default_max_time(),
        }
    }

    pub fn with_window(mut self, min_time: Time, max_time: Time) -> Self {
        self.min_time = min_time;
        self.max_time = max_time;
        self
    }

    pub fn identifier(&self) -> Option<SourceId> {
        self.identifier
    }

    pub(crate) fn set_identifier(&mut self, identifier: SourceId) {
        self.identifier = Some(identifier);
    }

    pub fn validate(&self) -> Result<(), SourceError> {
        if !(self.min_time < self.max_time) {
            return Err(SourceError::InvalidWindow(self.min_time, self.max_time));
        }
        self.position.validate()
    }

    /// Generates the detected events of this component over a time grid.
    ///
    /// Columns are filled in causal order and every random draw goes through
    /// `rng` in that same order, so a fixed seed gives a fixed table. A zero
    /// Poisson draw yields a table with every column present and empty.
    #[instrument(skip_all, fields(source = %self.name))]
    pub fn sample_events(
        &self,
        irf: ResponseFunctions<'_>,
        times: &[Time],
        rng: &mut dyn RngCore,
    ) -> Result<EventList, SourceError> {
        let identifier = self
            .identifier
            .ok_or_else(|| SourceError::Unregistered(self.name.clone()))?;
        let spectrum = CountSpectrum::new(&self.spectrum, irf.aeff, times)?;
        let n = spectrum.sample_count(rng)?;
        debug!("Sampling {n} events, {} expected", spectrum.normalization());

        let time = spectrum.sample_times(n, rng);
        let mc_energy = spectrum.sample_energies(&time, rng)?;
        detect_photons(
            irf,
            &self.polarization,
            identifier,
            time,
            mc_energy,
            |rng| self.position.sample_sky_positions(n, rng),
            rng,
        )
    }
}

/// Folds true photons through the detector response.
///
/// The columns after MC_ENERGY are drawn in causal order. `positions`
/// supplies the true sky positions once the channels have been sampled,
/// and may draw from the same generator.
pub fn detect_photons(
    irf: ResponseFunctions<'_>,
    polarization: &PolarizationModel,
    identifier: SourceId,
    time: Vec<Time>,
    mc_energy: Vec<Energy>,
    positions: impl FnOnce(&mut dyn RngCore) -> Result<(Vec<Degrees>, Vec<Degrees>), SourceError>,
    rng: &mut dyn RngCore,
) -> Result<EventList, SourceError> {
    let pha = mc_energy
        .iter()
        .map(|&e| irf.edisp.sample_channel(e, rng))
        .collect::<Result<Vec<_>, _>>()?;
    let energy = pha
        .iter()
        .map(|&c| irf.edisp.channel_to_energy(c))
        .collect::<Result<Vec<_>, _>>()?;
    let (mc_ra, mc_dec) = positions(rng)?;
    let (ra, dec): (Vec<_>, Vec<_>) = mc_ra
        .iter()
        .zip(&mc_dec)
        .map(|(&ra, &dec)| irf.psf.smear(ra, dec, rng))
        .unzip();
    let pe_angle = time
        .iter()
        .zip(&mc_energy)
        .map(|(&t, &e)| {
            let degree = polarization.degree(e, t)?;
            let angle = polarization.angle(e, t)?;
            Ok(irf.modf.sample_azimuth(e, degree, angle, rng)?)
        })
        .collect::<Result<Vec<_>, SourceError>>()?;
    let phase = (0..time.len()).map(|_| rng.random::<f64>()).collect();

    let mut events = EventList::new();
    events.set_float_column(EventColumn::Time, time)?;
    events.set_float_column(EventColumn::McEnergy, mc_energy)?;
    events.set_int_column(EventColumn::Pha, pha)?;
    events.set_float_column(EventColumn::Energy, energy)?;
    events.set_float_column(EventColumn::McRa, mc_ra)?;
    events.set_float_column(EventColumn::McDec, mc_dec)?;
    events.set_float_column(EventColumn::Ra, ra)?;
    events.set_float_column(EventColumn::Dec, dec)?;
    events.set_float_column(EventColumn::PeAngle, pe_angle)?;
    events.set_float_column(EventColumn::Phase, phase)?;
    events.set_constant_int_column(EventColumn::McSrcId, identifier)?;
    Ok(events)
}

impl fmt::Display for SourceComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.identifier {
            Some(id) => write!(f, "{} (id = {id})", self.name)?,
            None => write!(f, "{} (unregistered)", self.name)?,
        }
        write!(
            f,
            ", {}, valid in [{}, {})",
            self.position, self.min_time, self.max_time
        )
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use rand::{SeedableRng, rngs::StdRng};
    use xpol_common::{
        interpolation::LinearTable,
        irf::{
            EffectiveAreaTable, EnergyDispersionMatrix, EnergyDispersionParameters, IrfSet,
            KingPsf, ModulationFactor, PsfParameters,
        },
        linspace,
    };

    /// Small self-contained response set over 1-10 keV.
    pub(crate) fn test_irfs() -> IrfSet {
        let energy = linspace(1.0, 10.0, 91);
        IrfSet {
            name: "test".to_owned(),
            aeff: EffectiveAreaTable::new(energy.clone(), vec![100.0; energy.len()]).unwrap(),
            psf: KingPsf::new(PsfParameters {
                gaussian_weight: 2.79e-4,
                sigma: 10.61,
                king_weight: 3.289e-3,
                core_radius: 6.06,
                eta: 1.481,
                max_radius: 300.0,
                num_points: 301,
            })
            .unwrap(),
            modf: ModulationFactor::new(vec![1.0, 10.0], vec![0.2, 0.5]).unwrap(),
            edisp: EnergyDispersionMatrix::new(EnergyDispersionParameters {
                num_channels: 256,
                channel_offset: 0.0,
                channel_slope: 11.0 / 256.0,
                energy_edges: energy,
                fwhm: LinearTable::new(vec![1.0, 10.0], vec![0.3, 0.9]).unwrap(),
            })
            .unwrap(),
        }
    }

    pub(crate) fn point_source(name: &str, normalization: f64) -> SourceComponent {
        SourceComponent::new(
            name,
            PositionModel::Point {
                ra: 45.0,
                dec: 45.0,
            },
            SpectralModel::power_law(normalization, 2.0),
            PolarizationModel::constant(0.5, 0.3),
        )
    }

    #[test]
    fn unregistered_source_cannot_sample() {
        let irf = test_irfs();
        let mut rng = StdRng::seed_from_u64(0);
        let source = point_source("crab", 1.0);
        assert!(matches!(
            source.sample_events(irf.responses(), &linspace(0.0, 1.0, 3), &mut rng),
            Err(SourceError::Unregistered(_))
        ));
    }

    #[test]
    fn events_carry_every_column_in_order() {
        let irf = test_irfs();
        let mut rng = StdRng::seed_from_u64(0);
        let mut source = point_source("crab", 1.0);
        source.set_identifier(3);
        let events = source
            .sample_events(irf.responses(), &linspace(0.0, 10.0, 11), &mut rng)
            .unwrap();
        let names = events.column_names().collect::<Vec<_>>();
        assert_eq!(
            names,
            vec![
                EventColumn::Time,
                EventColumn::McEnergy,
                EventColumn::Pha,
                EventColumn::Energy,
                EventColumn::McRa,
                EventColumn::McDec,
                EventColumn::Ra,
                EventColumn::Dec,
                EventColumn::PeAngle,
                EventColumn::Phase,
                EventColumn::McSrcId,
            ]
        );
        assert!(!events.is_empty());
        assert!(
            events
                .int_column(EventColumn::McSrcId)
                .unwrap()
                .iter()
                .all(|&id| id == 3)
        );
        let phase = events.float_column(EventColumn::Phase).unwrap();
        assert!(phase.iter().all(|p| (0.0..1.0).contains(p)));
        let time = events.float_column(EventColumn::Time).unwrap();
        assert!(time.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn zero_events_give_a_well_formed_empty_table() {
        let irf = test_irfs();
        let mut rng = StdRng::seed_from_u64(0);
        let mut source = point_source("dark", 0.0);
        source.set_identifier(0);
        let events = source
            .sample_events(irf.responses(), &linspace(0.0, 10.0, 11), &mut rng)
            .unwrap();
        assert!(events.is_empty());
        assert_eq!(events.num_columns(), 11);
    }

    #[test]
    fn invalid_polarization_degree_is_fatal() {
        let irf = test_irfs();
        let mut rng = StdRng::seed_from_u64(0);
        let mut source = point_source("crab", 1.0);
        source.polarization = PolarizationModel::constant(1.5, 0.0);
        source.set_identifier(0);
        assert!(matches!(
            source.sample_events(irf.responses(), &linspace(0.0, 10.0, 11), &mut rng),
            Err(SourceError::Irf(IrfError::InvalidPolarizationDegree(_)))
        ));
    }

    #[test]
    fn display_names_the_source() {
        let mut source = point_source("crab", 1.0).with_window(0.0, 100.0);
        source.set_identifier(1);
        assert_eq!(
            source.to_string(),
            "crab (id = 1), point at (45.0000, 45.0000), valid in [0, 100)"
        );
    }

    #[test]
    fn undeclared_window_defaults_to_a_million_seconds() {
        let source = point_source("crab", 1.0);
        assert_eq!(source.min_time, 0.0);
        assert_eq!(source.max_time, 1e6);

        let parsed: SourceComponent = serde_json::from_str(
            r#"{
                "name": "crab",
                "position": {"position-type": "point", "ra": 45.0, "dec": 45.0},
                "spectrum": {
                    "spectrum-type": "power-law",
                    "normalization": {"value": 1.0},
                    "index": {"value": 2.0}
                }
            }"#,
        )
        .unwrap();
        assert_eq!((parsed.min_time, parsed.max_time), (DEFAULT_MIN_TIME, DEFAULT_MAX_TIME));
    }
}
