use super::{IrfError, ModulationResponse};
use crate::{Energy, Radians, interpolation::LinearTable};
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;

/// Modulation factor for a fully polarized beam, against true energy.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModulationFactor(LinearTable);

impl ModulationFactor {
    pub fn new(energy: Vec<Energy>, factor: Vec<f64>) -> Result<Self, IrfError> {
        Ok(Self(LinearTable::new(energy, factor)?))
    }

    pub fn table(&self) -> &LinearTable {
        &self.0
    }
}

/// Cumulative distribution of `phi` in `[0, 2pi)` for the density
/// `(1 + v cos(2 (phi - psi))) / 2pi`.
pub fn azimuthal_cdf(phi: Radians, visibility: f64, angle: Radians) -> f64 {
    (phi + 0.5 * visibility * ((2.0 * (phi - angle)).sin() + (2.0 * angle).sin())) / TAU
}

/// Solves `azimuthal_cdf(phi) = u` with Newton steps, falling back to
/// bisection whenever a step leaves the current bracket.
pub fn invert_azimuthal_cdf(u: f64, visibility: f64, angle: Radians) -> Radians {
    const TOLERANCE: f64 = 1e-12;
    const MAX_ITERATIONS: usize = 100;

    let target = TAU * u.clamp(0.0, 1.0);
    let residual = |phi: f64| TAU * azimuthal_cdf(phi, visibility, angle) - target;
    let (mut lo, mut hi) = (0.0, TAU);
    let mut phi = target;
    for _ in 0..MAX_ITERATIONS {
        let f = residual(phi);
        if f.abs() < TOLERANCE {
            break;
        }
        if f > 0.0 {
            hi = phi;
        } else {
            lo = phi;
        }
        let derivative = 1.0 + visibility * (2.0 * (phi - angle)).cos();
        let newton = phi - f / derivative;
        phi = if derivative > TOLERANCE && newton > lo && newton < hi {
            newton
        } else {
            0.5 * (lo + hi)
        };
    }
    phi.rem_euclid(TAU)
}

impl ModulationResponse for ModulationFactor {
    fn modulation_factor(&self, energy: Energy) -> Result<f64, IrfError> {
        self.0
            .evaluate(energy)
            .map_err(|e| IrfError::out_of_domain("Modulation factor", e))
    }

    fn sample_azimuth(
        &self,
        energy: Energy,
        degree: f64,
        angle: Radians,
        rng: &mut dyn RngCore,
    ) -> Result<Radians, IrfError> {
        if !(0.0..=1.0).contains(&degree) {
            return Err(IrfError::InvalidPolarizationDegree(degree));
        }
        let visibility = self.modulation_factor(energy)? * degree;
        Ok(invert_azimuthal_cdf(rng.random::<f64>(), visibility, angle))
    }
}
