use super::{EnergyDispersion, IrfError};
use crate::{Channel, Energy, interpolation::LinearTable};
use rand::{RngCore, distr::Distribution, distr::weighted::WeightedIndex};
use serde::{Deserialize, Serialize};

/// Linear channel scale with a Gaussian resolution tabulated as FWHM (keV)
/// against true energy.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct EnergyDispersionParameters {
    pub num_channels: usize,
    /// Energy of the lower edge of channel zero.
    pub channel_offset: Energy,
    /// Width in keV of one channel.
    pub channel_slope: Energy,
    /// Edges of the true-energy bins, one matrix row per bin.
    pub energy_edges: Vec<Energy>,
    pub fwhm: LinearTable,
}

/// Channel redistribution matrix, one sampling row per true-energy bin.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(try_from = "EnergyDispersionParameters", into = "EnergyDispersionParameters")]
pub struct EnergyDispersionMatrix {
    parameters: EnergyDispersionParameters,
    rows: Vec<WeightedIndex<f64>>,
}

impl TryFrom<EnergyDispersionParameters> for EnergyDispersionMatrix {
    type Error = IrfError;

    fn try_from(parameters: EnergyDispersionParameters) -> Result<Self, Self::Error> {
        if parameters.num_channels == 0 || parameters.channel_slope <= 0.0 {
            return Err(IrfError::InvalidDispersion(format!(
                "{} channels of width {} keV",
                parameters.num_channels, parameters.channel_slope
            )));
        }
        if parameters.energy_edges.len() < 2
            || parameters.energy_edges.windows(2).any(|w| w[1] <= w[0])
        {
            return Err(IrfError::InvalidDispersion(
                "energy edges must be strictly increasing with at least two entries".to_owned(),
            ));
        }
        let rows = parameters
            .energy_edges
            .windows(2)
            .enumerate()
            .map(|(index, edges)| {
                let energy = 0.5 * (edges[0] + edges[1]);
                let weights = parameters.channel_weights(energy)?;
                WeightedIndex::new(weights).map_err(|e| IrfError::MatrixRow(index, e))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { parameters, rows })
    }
}

impl From<EnergyDispersionMatrix> for EnergyDispersionParameters {
    fn from(matrix: EnergyDispersionMatrix) -> Self {
        matrix.parameters
    }
}

impl EnergyDispersionParameters {
    /// Unnormalised Gaussian weights over channels for a given true energy.
    fn channel_weights(&self, energy: Energy) -> Result<Vec<f64>, IrfError> {
        let fwhm = self
            .fwhm
            .evaluate(energy)
            .map_err(|e| IrfError::out_of_domain("Energy resolution", e))?;
        let mean = ((energy - self.channel_offset) / self.channel_slope).floor();
        let rms = fwhm / 2.358 / self.channel_slope;
        Ok((0..self.num_channels)
            .map(|channel| {
                let z = (channel as f64 - mean) / rms;
                (-0.5 * z * z).exp()
            })
            .collect())
    }
}

impl EnergyDispersionMatrix {
    pub fn new(parameters: EnergyDispersionParameters) -> Result<Self, IrfError> {
        Self::try_from(parameters)
    }

    pub fn parameters(&self) -> &EnergyDispersionParameters {
        &self.parameters
    }

    fn row_of(&self, energy: Energy) -> Result<&WeightedIndex<f64>, IrfError> {
        let edges = &self.parameters.energy_edges;
        let (min, max) = (edges[0], edges[edges.len() - 1]);
        if !(min..=max).contains(&energy) {
            return Err(IrfError::OutOfDomain {
                response: "Energy dispersion",
                value: energy,
                min,
                max,
            });
        }
        let index = edges.partition_point(|&e| e <= energy).clamp(1, self.rows.len()) - 1;
        Ok(&self.rows[index])
    }
}

impl EnergyDispersion for EnergyDispersionMatrix {
    fn num_channels(&self) -> usize {
        self.parameters.num_channels
    }

    fn sample_channel(&self, energy: Energy, rng: &mut dyn RngCore) -> Result<Channel, IrfError> {
        Ok(self.row_of(energy)?.sample(rng) as Channel)
    }

    fn channel_to_energy(&self, channel: Channel) -> Result<Energy, IrfError> {
        if channel < 0 || channel as usize >= self.parameters.num_channels {
            return Err(IrfError::InvalidChannel(channel, self.parameters.num_channels));
        }
        Ok(self.parameters.channel_offset + (channel as f64 + 0.5) * self.parameters.channel_slope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linspace;
    use assert_approx_eq::assert_approx_eq;
    use rand::{SeedableRng, rngs::StdRng};

    fn matrix(fwhm: f64) -> EnergyDispersionMatrix {
        EnergyDispersionMatrix::new(EnergyDispersionParameters {
            num_channels: 256,
            channel_offset: 0.0,
            channel_slope: 11.0 / 256.0,
            energy_edges: linspace(0.1, 11.0, 110),
            fwhm: LinearTable::new(vec![0.1, 11.0], vec![fwhm, fwhm]).unwrap(),
        })
        .unwrap()
    }

    #[test]
    fn channels_stay_in_range_and_cluster_on_the_mean() {
        let edisp = matrix(0.5);
        let mut rng = StdRng::seed_from_u64(5);
        let n = 5000;
        let channels = (0..n)
            .map(|_| edisp.sample_channel(5.0, &mut rng).unwrap())
            .collect::<Vec<_>>();
        assert!(channels.iter().all(|&c| (0..256).contains(&c)));
        let mean = channels.iter().sum::<i64>() as f64 / n as f64;
        let energy = edisp.channel_to_energy(mean.round() as Channel).unwrap();
        assert_approx_eq!(energy, 5.0, 0.15);
    }

    #[test]
    fn ebounds_are_channel_centres() {
        let edisp = matrix(0.5);
        assert_approx_eq!(edisp.channel_to_energy(0).unwrap(), 0.5 * 11.0 / 256.0);
        assert!(matches!(
            edisp.channel_to_energy(256),
            Err(IrfError::InvalidChannel(256, 256))
        ));
        assert!(edisp.channel_to_energy(-1).is_err());
    }

    #[test]
    fn energy_outside_matrix_rejected() {
        let edisp = matrix(0.5);
        let mut rng = StdRng::seed_from_u64(5);
        assert!(matches!(
            edisp.sample_channel(12.0, &mut rng),
            Err(IrfError::OutOfDomain { .. })
        ));
    }

    #[test]
    fn zero_channels_rejected() {
        let result = EnergyDispersionMatrix::new(EnergyDispersionParameters {
            num_channels: 0,
            channel_offset: 0.0,
            channel_slope: 0.1,
            energy_edges: vec![1.0, 2.0],
            fwhm: LinearTable::new(vec![1.0, 2.0], vec![0.1, 0.1]).unwrap(),
        });
        assert!(matches!(result, Err(IrfError::InvalidDispersion(_))));
    }
}
