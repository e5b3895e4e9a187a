use crate::{
    algorithm::{BinningAlgorithm, EdgeSpec},
    error::BinningError,
    histogram::{Axis, histogram1d, poisson_errors},
};
use clap::Args;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{info, instrument};
use xpol_common::{EventColumn, EventFile, GtiList, Time};

#[derive(Clone, Debug, Args)]
pub struct LcOptions {
    /// Time binning algorithm (LIN, LOG, EQP or FILE)
    #[clap(long, default_value = "LIN")]
    pub tbinalg: String,

    /// Start of the first bin, defaults to the first good time
    #[clap(long)]
    pub tstart: Option<Time>,

    /// End of the last bin, defaults to the last good time
    #[clap(long)]
    pub tstop: Option<Time>,

    /// Number of time bins
    #[clap(long, default_value = "100")]
    pub tbins: usize,

    /// Text file with the bin edges, for FILE binning
    #[clap(long)]
    pub tbinfile: Option<PathBuf>,
}

impl Default for LcOptions {
    fn default() -> Self {
        Self {
            tbinalg: "LIN".to_owned(),
            tstart: None,
            tstop: None,
            tbins: 100,
            tbinfile: None,
        }
    }
}

impl LcOptions {
    pub fn resolve(&self, file: &EventFile) -> Result<LcBinning, BinningError> {
        let algorithm = BinningAlgorithm::parse("tbinalg", &self.tbinalg)?;
        let tstart = self
            .tstart
            .or_else(|| file.gti.min_good_time())
            .ok_or(BinningError::MissingOption {
                option: "tstart",
                reason: "event file has no good time intervals",
            })?;
        let tstop = self
            .tstop
            .or_else(|| file.gti.max_good_time())
            .ok_or(BinningError::MissingOption {
                option: "tstop",
                reason: "event file has no good time intervals",
            })?;
        let edges = EdgeSpec {
            option: "tbinalg",
            algorithm,
            min: tstart,
            max: tstop,
            bins: self.tbins,
            values: file.float_column(EventColumn::Time)?,
            file: self.tbinfile.as_deref(),
        }
        .edges()?;
        Ok(LcBinning {
            axis: Axis::new(&edges)?,
        })
    }
}

#[derive(Clone, Debug)]
pub struct LcBinning {
    axis: Axis,
}

impl LcBinning {
    #[instrument(skip_all)]
    pub fn bin(&self, file: &EventFile) -> Result<LightCurve, BinningError> {
        let counts = histogram1d(file.float_column(EventColumn::Time)?, &self.axis).to_vec();
        info!(
            "{} counts in {} time bins",
            counts.iter().sum::<u64>(),
            self.axis.num_bins()
        );
        Ok(LightCurve {
            time: self.axis.centers(),
            timedel: self.axis.widths(),
            error: poisson_errors(&counts),
            counts,
            gti: file.gti.clone(),
        })
    }
}

/// Event counts in time bins.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct LightCurve {
    /// Bin centres.
    pub time: Vec<Time>,
    pub timedel: Vec<Time>,
    pub counts: Vec<u64>,
    pub error: Vec<f64>,
    pub gti: GtiList,
}
