//! Conversion of a photon list observed by another instrument into a
//! detected event file: effective-area re-weighting, optional stretching to
//! a longer observation, then the detector response.

use crate::source::{PolarizationModel, SourceError, detect_photons};
use rand::{Rng, RngCore, SeedableRng, rngs::StdRng};
use serde::Deserialize;
use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};
use thiserror::Error;
use tracing::{debug, info, instrument};
use xpol_common::{
    Degrees, Energy, EventFile, EventFileHeader, EventList, EventListError, GtiList, Time,
    interpolation::{InterpolationError, LinearTable},
    irf::{EffectiveArea, EnergyDispersion, IrfError, IrfSet, ResponseFunctions},
};

/// Photons at or above this energy are never converted.
pub const MAX_ENERGY: Energy = 10.0;

#[derive(Debug, Error)]
pub enum ResampleError {
    #[error("Observation time must be positive, found {0} s")]
    NonPositiveObservation(Time),
    #[error("Requested duration must be non-negative, found {0} s")]
    NegativeDuration(Time),
    #[error("Photon columns differ in length: {time} time, {energy} energy, {ra} ra, {dec} dec")]
    MismatchedColumns {
        time: usize,
        energy: usize,
        ra: usize,
        dec: usize,
    },
    #[error("Cannot read photon list {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid photon list {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Effective area ratio: {0}")]
    Interpolation(#[from] InterpolationError),
    #[error("Response function: {0}")]
    Irf(#[from] IrfError),
    #[error("Detector response: {0}")]
    Source(#[from] SourceError),
    #[error("Event list: {0}")]
    EventList(#[from] EventListError),
}

/// Minimal photon list as delivered by another instrument.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(try_from = "PhotonColumns")]
pub struct PhotonList {
    time: Vec<Time>,
    energy: Vec<Energy>,
    ra: Vec<Degrees>,
    dec: Vec<Degrees>,
}

#[derive(Deserialize)]
struct PhotonColumns {
    time: Vec<Time>,
    energy: Vec<Energy>,
    ra: Vec<Degrees>,
    dec: Vec<Degrees>,
}

impl TryFrom<PhotonColumns> for PhotonList {
    type Error = ResampleError;

    fn try_from(columns: PhotonColumns) -> Result<Self, Self::Error> {
        Self::new(columns.time, columns.energy, columns.ra, columns.dec)
    }
}

impl PhotonList {
    pub fn new(
        time: Vec<Time>,
        energy: Vec<Energy>,
        ra: Vec<Degrees>,
        dec: Vec<Degrees>,
    ) -> Result<Self, ResampleError> {
        let n = time.len();
        if energy.len() != n || ra.len() != n || dec.len() != n {
            return Err(ResampleError::MismatchedColumns {
                time: n,
                energy: energy.len(),
                ra: ra.len(),
                dec: dec.len(),
            });
        }
        Ok(Self {
            time,
            energy,
            ra,
            dec,
        })
    }

    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    fn select(&self, mask: &[bool]) -> Self {
        let pick = |column: &[f64]| {
            column
                .iter()
                .zip(mask)
                .filter_map(|(&v, &keep)| keep.then_some(v))
                .collect()
        };
        Self {
            time: pick(&self.time),
            energy: pick(&self.energy),
            ra: pick(&self.ra),
            dec: pick(&self.dec),
        }
    }

    fn append(&mut self, mut other: Self) {
        self.time.append(&mut other.time);
        self.energy.append(&mut other.energy);
        self.ra.append(&mut other.ra);
        self.dec.append(&mut other.dec);
    }

    /// Treats the photons as true events of a single source with id 0 and
    /// folds them through the detector response. The table is not sorted.
    pub fn into_event_list(
        self,
        irf: ResponseFunctions<'_>,
        polarization: &PolarizationModel,
        rng: &mut dyn RngCore,
    ) -> Result<EventList, ResampleError> {
        let Self {
            time,
            energy,
            ra,
            dec,
        } = self;
        Ok(detect_photons(irf, polarization, 0, time, energy, |_| Ok((ra, dec)), rng)?)
    }
}

/// Ratio of a target effective area to a reference one, on the target grid.
pub struct EffectiveAreaRatio {
    ratio: LinearTable,
    max_energy: Energy,
}

impl EffectiveAreaRatio {
    /// Events at or above `max_energy`, or outside the target grid, are
    /// always dropped.
    pub fn new(
        target: &dyn EffectiveArea,
        reference: &LinearTable,
        max_energy: Energy,
    ) -> Result<Self, IrfError> {
        let energy = target.energy_grid().to_vec();
        let ratio = energy
            .iter()
            .map(|&e| {
                let reference = reference.evaluate(e)?;
                Ok(if reference > 0.0 {
                    target.effective_area(e)? / reference
                } else {
                    0.0
                })
            })
            .collect::<Result<Vec<_>, IrfError>>()?;
        Ok(Self {
            ratio: LinearTable::new(energy, ratio)?,
            max_energy,
        })
    }

    pub fn ratio(&self, energy: Energy) -> Result<f64, InterpolationError> {
        self.ratio.evaluate(energy)
    }

    fn accepts(&self, energy: Energy) -> bool {
        energy < self.max_energy && (self.ratio.xmin()..=self.ratio.xmax()).contains(&energy)
    }

    /// Thins events where the ratio is below one and duplicates a fraction
    /// of them where it exceeds one.
    ///
    /// One uniform variate `u` is drawn per event: the event is kept if
    /// `u < ratio`, and appears a second time if `u < ratio - 1`. The
    /// duplicates are appended after the kept events.
    pub fn resample(
        &self,
        photons: &PhotonList,
        rng: &mut dyn RngCore,
    ) -> Result<PhotonList, InterpolationError> {
        let mut keep = Vec::with_capacity(photons.len());
        let mut duplicate = Vec::with_capacity(photons.len());
        for &energy in &photons.energy {
            let u = rng.random::<f64>();
            let ratio = if self.accepts(energy) {
                self.ratio(energy)?
            } else {
                0.0
            };
            keep.push(u < ratio);
            duplicate.push(u < ratio - 1.0);
        }
        let mut resampled = photons.select(&keep);
        resampled.append(photons.select(&duplicate));
        info!("Resampled {} photons into {}", photons.len(), resampled.len());
        Ok(resampled)
    }
}

/// Stretches a list observed over `observed` seconds to `duration` seconds.
///
/// The list is repeated `floor(duration / observed)` times, each copy
/// shifted by the time span of the list, and the leading fraction of one
/// more copy fills the remainder.
pub fn replicate_in_time(
    photons: &PhotonList,
    observed: Time,
    duration: Time,
) -> Result<PhotonList, ResampleError> {
    if !(observed > 0.0) {
        return Err(ResampleError::NonPositiveObservation(observed));
    }
    if !(duration >= 0.0) {
        return Err(ResampleError::NegativeDuration(duration));
    }
    let (Some(first), Some(last)) = (photons.time.first(), photons.time.last()) else {
        return Ok(PhotonList::default());
    };
    let span = last - first;
    let scale = duration / observed;
    let copies = scale.trunc() as usize;
    let remainder = (scale.fract() * photons.len() as f64) as usize;
    debug!("Replicating {copies} times plus {remainder} events");

    let shifted = |copy: usize, n: usize| PhotonList {
        time: photons.time[..n]
            .iter()
            .map(|t| t + copy as f64 * span)
            .collect(),
        energy: photons.energy[..n].to_vec(),
        ra: photons.ra[..n].to_vec(),
        dec: photons.dec[..n].to_vec(),
    };
    let mut stretched = PhotonList::default();
    for copy in 0..copies {
        stretched.append(shifted(copy, photons.len()));
    }
    stretched.append(shifted(copies, remainder));
    Ok(stretched)
}

/// A photon list together with the pointing, exposure and effective area
/// of the instrument that observed it.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Observation {
    pub tstart: Time,
    pub tstop: Time,
    pub ra_pnt: Degrees,
    pub dec_pnt: Degrees,
    pub reference_aeff: LinearTable,
    pub photons: PhotonList,
}

impl Observation {
    pub fn from_path(path: &Path) -> Result<Self, ResampleError> {
        let file = File::open(path).map_err(|source| ResampleError::Io {
            path: path.to_owned(),
            source,
        })?;
        serde_json::from_reader(BufReader::new(file)).map_err(|source| ResampleError::Json {
            path: path.to_owned(),
            source,
        })
    }

    pub fn exposure(&self) -> Time {
        self.tstop - self.tstart
    }
}

/// Re-observes `observation` with the responses in `irf`.
///
/// With a `duration`, the re-weighted list is stretched to it and the
/// good time interval becomes `[tstart, tstart + duration]`.
#[instrument(skip(observation, irf, polarization))]
pub fn convert(
    observation: &Observation,
    irf: &IrfSet,
    polarization: &PolarizationModel,
    duration: Option<Time>,
    seed: u64,
) -> Result<EventFile, ResampleError> {
    let exposure = observation.exposure();
    if !(exposure > 0.0) {
        return Err(ResampleError::NonPositiveObservation(exposure));
    }
    info!("Converting {} photons observed over {exposure} s", observation.photons.len());
    let mut rng = StdRng::seed_from_u64(seed);
    let ratio = EffectiveAreaRatio::new(&irf.aeff, &observation.reference_aeff, MAX_ENERGY)?;
    let mut photons = ratio.resample(&observation.photons, &mut rng)?;
    let tstop = match duration {
        Some(duration) => {
            photons = replicate_in_time(&photons, exposure, duration)?;
            observation.tstart + duration
        }
        None => observation.tstop,
    };

    let num_photons = photons.len();
    let mut events = photons.into_event_list(irf.responses(), polarization, &mut rng)?;
    events.sort_by_time()?;

    let mut header = EventFileHeader::new(
        concat!(env!("CARGO_PKG_NAME"), " ", env!("CARGO_PKG_VERSION")),
        &irf.name,
        irf.edisp.num_channels(),
        observation.ra_pnt,
        observation.dec_pnt,
    );
    header.sources = vec![format!(
        "converted photon list (id = 0), {num_photons} events in [{}, {tstop})",
        observation.tstart
    )];
    header.seed = Some(seed);
    Ok(EventFile::new(
        header,
        GtiList::single(observation.tstart, tstop),
        events,
    ))
}
