use crate::{
    algorithm::{BinningAlgorithm, EdgeSpec},
    error::BinningError,
    histogram::{Axis, histogram1d, poisson_errors},
};
use clap::Args;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use xpol_common::{EventColumn, EventFile, GtiList};

#[derive(Clone, Debug, Args)]
pub struct PhasgOptions {
    /// Number of phase bins over [0, 1]
    #[clap(long, default_value = "50")]
    pub phasebins: usize,
}

impl PhasgOptions {
    pub fn resolve(&self, file: &EventFile) -> Result<PhasgBinning, BinningError> {
        let edges = EdgeSpec {
            option: "phasebins",
            algorithm: BinningAlgorithm::Lin,
            min: 0.0,
            max: 1.0,
            bins: self.phasebins,
            values: file.float_column(EventColumn::Phase)?,
            file: None,
        }
        .edges()?;
        Ok(PhasgBinning {
            axis: Axis::new(&edges)?,
        })
    }
}

#[derive(Clone, Debug)]
pub struct PhasgBinning {
    axis: Axis,
}

impl PhasgBinning {
    #[instrument(skip_all)]
    pub fn bin(&self, file: &EventFile) -> Result<Phasogram, BinningError> {
        let counts = histogram1d(file.float_column(EventColumn::Phase)?, &self.axis).to_vec();
        info!("Phasogram with {} bins", self.axis.num_bins());
        Ok(Phasogram {
            phase: self.axis.centers(),
            phasedel: self.axis.widths(),
            error: poisson_errors(&counts),
            counts,
            gti: file.gti.clone(),
        })
    }
}

/// Event counts against rotational phase.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct Phasogram {
    pub phase: Vec<f64>,
    pub phasedel: Vec<f64>,
    pub counts: Vec<u64>,
    pub error: Vec<f64>,
    pub gti: GtiList,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::products::tests::synthetic_file;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn uniform_phases_fill_bins_evenly() {
        let file = synthetic_file(100, 4, 10.0);
        let phasogram = PhasgOptions { phasebins: 4 }
            .resolve(&file)
            .unwrap()
            .bin(&file)
            .unwrap();
        assert_eq!(phasogram.counts, vec![25; 4]);
        assert_approx_eq!(phasogram.phase[0], 0.125);
        assert_approx_eq!(phasogram.phasedel[3], 0.25);
        assert_approx_eq!(phasogram.error[1], 5.0);
    }

    #[test]
    fn zero_bins_rejected() {
        let file = synthetic_file(10, 4, 10.0);
        assert!(matches!(
            PhasgOptions { phasebins: 0 }.resolve(&file),
            Err(BinningError::InvalidOption { option: "phasebins", .. })
        ));
    }
}
