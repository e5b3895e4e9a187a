use crate::{
    error::BinningError,
    histogram::{Axis, histogram1d, poisson_errors},
};
use clap::Args;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use xpol_common::{Channel, EventColumn, EventFile, linspace};

#[derive(Clone, Debug, Default, Args)]
pub struct Pha1Options {}

impl Pha1Options {
    pub fn resolve(&self, file: &EventFile) -> Result<Pha1Binning, BinningError> {
        let detchans = file.header.detchans;
        if detchans == 0 {
            return Err(BinningError::InvalidOption {
                option: "detchans",
                reason: "event file header has no detector channels".to_owned(),
            });
        }
        let exposure = file.gti.total_good_time();
        if exposure <= 0.0 {
            return Err(BinningError::ZeroExposure);
        }
        // One unit-wide bin centred on each channel number.
        let axis = Axis::new(&linspace(-0.5, detchans as f64 - 0.5, detchans + 1))?;
        Ok(Pha1Binning { axis, exposure })
    }
}

#[derive(Clone, Debug)]
pub struct Pha1Binning {
    axis: Axis,
    exposure: f64,
}

impl Pha1Binning {
    #[instrument(skip_all)]
    pub fn bin(&self, file: &EventFile) -> Result<CountSpectrum, BinningError> {
        let pha = file
            .int_column(EventColumn::Pha)?
            .iter()
            .map(|&ch| ch as f64)
            .collect::<Vec<_>>();
        let counts = histogram1d(&pha, &self.axis);
        let counts = counts.as_slice().unwrap_or_default();
        info!(
            "{} counts in {} channels over {} s",
            counts.iter().sum::<u64>(),
            self.axis.num_bins(),
            self.exposure
        );
        Ok(CountSpectrum {
            channel: (0..self.axis.num_bins() as Channel).collect(),
            rate: counts
                .iter()
                .map(|&n| n as f64 / self.exposure)
                .collect(),
            stat_err: poisson_errors(counts)
                .into_iter()
                .map(|err| err / self.exposure)
                .collect(),
            exposure: self.exposure,
        })
    }
}

/// Count rate per detector channel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct CountSpectrum {
    pub channel: Vec<Channel>,
    pub rate: Vec<f64>,
    pub stat_err: Vec<f64>,
    pub exposure: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::products::tests::synthetic_file;
    use assert_approx_eq::assert_approx_eq;
    use xpol_common::GtiList;

    #[test]
    fn rate_is_counts_over_exposure() {
        let file = synthetic_file(100, 10, 1000.0);
        let spectrum = Pha1Options::default()
            .resolve(&file)
            .unwrap()
            .bin(&file)
            .unwrap();
        assert_eq!(spectrum.channel, (0..10).collect::<Vec<_>>());
        assert_approx_eq!(spectrum.exposure, 1000.0);
        for (&rate, &err) in spectrum.rate.iter().zip(&spectrum.stat_err) {
            assert_approx_eq!(rate, 10.0 / 1000.0);
            assert_approx_eq!(err, 10f64.sqrt() / 1000.0);
        }
    }

    #[test]
    fn highest_channel_is_counted() {
        let file = synthetic_file(30, 3, 10.0);
        let spectrum = Pha1Options::default()
            .resolve(&file)
            .unwrap()
            .bin(&file)
            .unwrap();
        assert_approx_eq!(spectrum.rate[2], 1.0);
    }

    #[test]
    fn no_exposure_is_an_error() {
        let mut file = synthetic_file(10, 4, 10.0);
        file.gti = GtiList::default();
        assert!(matches!(
            Pha1Options::default().resolve(&file),
            Err(BinningError::ZeroExposure)
        ));
    }
}
