//! Effective-area weighted photon spectrum sampled on a time grid.

use crate::source::{SourceError, SpectralModel};
use ndarray::Array2;
use rand::{Rng, RngCore};
use rand_distr::{Distribution, Poisson};
use tracing::debug;
use xpol_common::{
    Energy, Time,
    interpolation::{InterpolationError, InverseCdf, trapezoid},
    irf::EffectiveArea,
};

/// Density of expected counts over (time, energy) in counts s^-1 keV^-1.
pub struct CountSpectrum {
    time: Vec<Time>,
    energy: Vec<Energy>,
    density: Array2<f64>,
    light_curve: Option<InverseCdf>,
    normalization: f64,
    /// Conditional energy sampler per time row, absent for rows with no counts.
    rows: Vec<Option<InverseCdf>>,
}

impl CountSpectrum {
    pub fn new(
        spectrum: &SpectralModel,
        aeff: &dyn EffectiveArea,
        time: &[Time],
    ) -> Result<Self, SourceError> {
        let energy = aeff.energy_grid().to_vec();
        let area = energy
            .iter()
            .map(|&e| aeff.effective_area(e))
            .collect::<Result<Vec<_>, _>>()?;
        let mut density = Array2::<f64>::zeros((time.len(), energy.len()));
        for (mut row, &t) in density.rows_mut().into_iter().zip(time) {
            for ((value, &e), a) in row.iter_mut().zip(&energy).zip(&area) {
                *value = spectrum.flux(e, t)? * a;
            }
        }
        let rate = density
            .rows()
            .into_iter()
            .map(|row| trapezoid(&energy, &row.to_vec()))
            .collect::<Vec<_>>();
        let normalization = trapezoid(time, &rate);
        let light_curve = match InverseCdf::new(time.to_vec(), &rate) {
            Ok(light_curve) => Some(light_curve),
            Err(InterpolationError::ZeroNormalization) => None,
            Err(e) => return Err(e.into()),
        };
        let rows = density
            .rows()
            .into_iter()
            .map(|row| match InverseCdf::new(energy.clone(), &row.to_vec()) {
                Ok(sampler) => Ok(Some(sampler)),
                Err(InterpolationError::ZeroNormalization) => Ok(None),
                Err(e) => Err(e),
            })
            .collect::<Result<Vec<_>, _>>()?;
        debug!(
            "Count spectrum over {} times x {} energies, {normalization} expected counts",
            time.len(),
            energy.len()
        );
        Ok(Self {
            time: time.to_vec(),
            energy,
            density,
            light_curve,
            normalization,
            rows,
        })
    }

    /// Total expected counts: the integral of the light curve over time.
    pub fn normalization(&self) -> f64 {
        self.normalization
    }

    /// Poisson draw of the number of events, zero when nothing is expected.
    pub fn sample_count(&self, rng: &mut dyn RngCore) -> Result<usize, SourceError> {
        if self.normalization <= 0.0 {
            return Ok(0);
        }
        let count: f64 = Poisson::new(self.normalization)?.sample(rng);
        Ok(count as usize)
    }

    /// Event times drawn from the light curve, sorted ascending.
    pub fn sample_times(&self, n: usize, rng: &mut dyn RngCore) -> Vec<Time> {
        let mut times = match &self.light_curve {
            Some(light_curve) => light_curve.sample_n(n, rng),
            None => Vec::new(),
        };
        times.sort_by(f64::total_cmp);
        times
    }

    /// True energies conditional on the event times.
    ///
    /// One uniform variate per event goes through the inverse CDFs of the two
    /// time rows bracketing the event, and the results are interpolated
    /// linearly in time.
    pub fn sample_energies(
        &self,
        times: &[Time],
        rng: &mut dyn RngCore,
    ) -> Result<Vec<Energy>, SourceError> {
        times
            .iter()
            .map(|&t| {
                let u = rng.random::<f64>();
                self.conditional_ppf(t, u)
            })
            .collect()
    }

    fn conditional_ppf(&self, t: Time, u: f64) -> Result<Energy, SourceError> {
        let n = self.time.len();
        let hi = self.time.partition_point(|&x| x < t).clamp(1, n - 1);
        let lo = hi - 1;
        let (t0, t1) = (self.time[lo], self.time[hi]);
        let w = if t1 > t0 {
            ((t - t0) / (t1 - t0)).clamp(0.0, 1.0)
        } else {
            0.0
        };
        match (&self.rows[lo], &self.rows[hi]) {
            (Some(a), Some(b)) => Ok((1.0 - w) * a.ppf(u) + w * b.ppf(u)),
            (Some(a), None) => Ok(a.ppf(u)),
            (None, Some(b)) => Ok(b.ppf(u)),
            (None, None) => Err(InterpolationError::ZeroNormalization.into()),
        }
    }
}
