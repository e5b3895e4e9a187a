use crate::{
    algorithm::{BinningAlgorithm, EdgeSpec},
    error::BinningError,
    fit::{AzimuthalFit, fit_histogram},
    histogram::{Axis, histogram2d},
};
use clap::Args;
use itertools::izip;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::{f64::consts::TAU, fmt, path::PathBuf};
use tracing::{info, instrument};
use xpol_common::{
    Energy, EventColumn, EventFile, GtiList, irf::ModulationResponse, linspace,
};

#[derive(Clone, Debug, Args)]
pub struct McubeOptions {
    /// Energy binning algorithm (LIN, LOG, EQP or FILE)
    #[clap(long, default_value = "LIN")]
    pub ebinalg: String,

    /// Lower edge of the first energy slice, defaults to the lowest event energy
    #[clap(long)]
    pub emin: Option<Energy>,

    /// Upper edge of the last energy slice, defaults to the highest event energy
    #[clap(long)]
    pub emax: Option<Energy>,

    /// Number of energy slices
    #[clap(long, default_value = "5")]
    pub ebins: usize,

    /// Text file with the energy edges, for FILE binning
    #[clap(long)]
    pub ebinfile: Option<PathBuf>,

    /// Number of azimuthal bins over [0, 2pi]
    #[clap(long, default_value = "75")]
    pub phibins: usize,

    /// Slice on the true rather than the reconstructed energy
    #[clap(long)]
    pub mc: bool,
}

impl Default for McubeOptions {
    fn default() -> Self {
        Self {
            ebinalg: "LIN".to_owned(),
            emin: None,
            emax: None,
            ebins: 5,
            ebinfile: None,
            phibins: 75,
            mc: false,
        }
    }
}

impl McubeOptions {
    fn energy_column(&self) -> EventColumn {
        if self.mc {
            EventColumn::McEnergy
        } else {
            EventColumn::Energy
        }
    }

    pub fn resolve(&self, file: &EventFile) -> Result<McubeBinning, BinningError> {
        let algorithm = BinningAlgorithm::parse("ebinalg", &self.ebinalg)?;
        let energy_column = self.energy_column();
        let energy = file.float_column(energy_column)?;
        let emin = match self.emin {
            Some(emin) => emin,
            None => energy
                .iter()
                .copied()
                .reduce(f64::min)
                .ok_or(BinningError::EmptySelection("emin"))?,
        };
        let emax = match self.emax {
            Some(emax) => emax,
            None => energy
                .iter()
                .copied()
                .reduce(f64::max)
                .ok_or(BinningError::EmptySelection("emax"))?,
        };
        let energy_edges = EdgeSpec {
            option: "ebinalg",
            algorithm,
            min: emin,
            max: emax,
            bins: self.ebins,
            values: energy,
            file: self.ebinfile.as_deref(),
        }
        .edges()?;
        if self.phibins == 0 {
            return Err(BinningError::InvalidOption {
                option: "phibins",
                reason: "number of bins must be positive".to_owned(),
            });
        }
        Ok(McubeBinning {
            energy_column,
            energy_axis: Axis::new(&energy_edges)?,
            phi_axis: Axis::new(&phi_edges(self.phibins))?,
        })
    }
}

/// Uniform azimuthal binning over a full turn.
fn phi_edges(bins: usize) -> Vec<f64> {
    linspace(0.0, TAU, bins + 1)
}

#[derive(Clone, Debug)]
pub struct McubeBinning {
    energy_column: EventColumn,
    energy_axis: Axis,
    phi_axis: Axis,
}

impl McubeBinning {
    #[instrument(skip_all)]
    pub fn bin(&self, file: &EventFile) -> Result<ModulationCube, BinningError> {
        let energy = file.float_column(self.energy_column)?;
        let phi = file.float_column(EventColumn::PeAngle)?;
        let phi_hist = histogram2d(energy, phi, &self.energy_axis, &self.phi_axis);

        let slices = self.energy_axis.num_bins();
        let mut sums = vec![0.0; slices];
        let mut counts = vec![0usize; slices];
        for &e in energy {
            if let Some(i) = self.energy_axis.index_of(e) {
                sums[i] += e;
                counts[i] += 1;
            }
        }
        let energy_mean = izip!(self.energy_axis.centers(), &sums, &counts)
            .map(|(centre, &sum, &n)| if n > 0 { sum / n as f64 } else { centre })
            .collect();
        info!(
            "Modulation cube with {slices} energy slices and {} azimuthal bins",
            self.phi_axis.num_bins()
        );
        Ok(ModulationCube {
            energy_lo: self.energy_axis.lower_edges(),
            energy_hi: self.energy_axis.upper_edges(),
            energy_mean,
            phi_hist,
            gti: file.gti.clone(),
        })
    }
}

/// Azimuthal histograms of the photoelectron direction, one per energy slice.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct ModulationCube {
    pub energy_lo: Vec<Energy>,
    pub energy_hi: Vec<Energy>,
    /// Mean event energy in each slice, or its centre if the slice is empty.
    pub energy_mean: Vec<Energy>,
    /// Counts indexed by `[energy slice, azimuthal bin]`.
    pub phi_hist: Array2<u64>,
    pub gti: GtiList,
}

impl ModulationCube {
    pub fn num_slices(&self) -> usize {
        self.phi_hist.nrows()
    }

    pub fn phi_edges(&self) -> Vec<f64> {
        phi_edges(self.phi_hist.ncols())
    }

    pub fn fit_slices(&self) -> Result<Vec<AzimuthalFit>, BinningError> {
        let edges = self.phi_edges();
        self.phi_hist
            .rows()
            .into_iter()
            .map(|row| {
                let counts = row.iter().map(|&n| n as f64).collect::<Vec<_>>();
                Ok(fit_histogram(&counts, &edges)?)
            })
            .collect()
    }

    /// Fits every slice and converts the visibility into a polarization
    /// degree with the modulation factor at the slice mean energy.
    #[instrument(skip_all)]
    pub fn analyze(
        &self,
        modf: &dyn ModulationResponse,
    ) -> Result<Vec<SlicePolarization>, BinningError> {
        let slices = self.num_slices();
        for (column, values) in [
            ("ENERGY_LO", &self.energy_lo),
            ("ENERGY_HI", &self.energy_hi),
            ("ENERGY_MEAN", &self.energy_mean),
        ] {
            if values.len() != slices {
                return Err(BinningError::InconsistentCube {
                    column,
                    len: values.len(),
                    slices,
                });
            }
        }
        let fits = self.fit_slices()?;
        izip!(fits, &self.energy_lo, &self.energy_hi, &self.energy_mean)
            .map(|(fit, &energy_lo, &energy_hi, &energy_mean)| {
                let modulation_factor = modf.modulation_factor(energy_mean)?;
                let (degree, degree_error) = fit.polarization_degree(modulation_factor);
                let slice = SlicePolarization {
                    energy_lo,
                    energy_hi,
                    energy_mean,
                    modulation_factor,
                    degree,
                    degree_error,
                    angle: fit.phase.to_degrees(),
                    angle_error: fit.phase_error.to_degrees(),
                    fit,
                };
                info!("{slice}");
                Ok(slice)
            })
            .collect()
    }
}

/// Polarization measured in one energy slice.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct SlicePolarization {
    pub energy_lo: Energy,
    pub energy_hi: Energy,
    pub energy_mean: Energy,
    pub modulation_factor: f64,
    pub degree: f64,
    pub degree_error: f64,
    /// Polarization angle in degrees.
    pub angle: f64,
    pub angle_error: f64,
    pub fit: AzimuthalFit,
}

impl fmt::Display for SlicePolarization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.2}-{:.2} keV (mean {:.2}, mu = {:.3}): \
             degree = {:.4} +/- {:.4}, angle = {:.2} +/- {:.2} deg",
            self.energy_lo,
            self.energy_hi,
            self.energy_mean,
            self.modulation_factor,
            self.degree,
            self.degree_error,
            self.angle,
            self.angle_error
        )
    }
}
