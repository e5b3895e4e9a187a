//! Fit of `A (1 + V cos(2 (phi - phi0)))` to an azimuthal histogram.
//!
//! The model is linear in `(a, b, c) = (A, A V cos 2phi0, A V sin 2phi0)`
//! once integrated over each bin, so the fit is an iteratively reweighted
//! linear least-squares problem: the first pass weights bins by their
//! observed counts, the following ones by the model prediction. Visibility
//! and phase are then derived from `(a, b, c)`, which makes the visibility
//! non-negative by construction.

use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};
use std::{f64::consts::FRAC_PI_2, fmt};
use thiserror::Error;
use tracing::debug;

const REWEIGHTING_PASSES: usize = 3;

#[derive(Debug, Error)]
pub enum FitError {
    #[error("At least 3 bins are needed, found {0}")]
    TooFewBins(usize),
    #[error("{0} counts for {1} edges")]
    MismatchedLengths(usize, usize),
    #[error("Histogram is empty")]
    EmptyHistogram,
    #[error("Normal equations are singular")]
    Singular,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AzimuthalFit {
    /// Baseline density in counts per radian.
    pub normalization: f64,
    pub normalization_error: f64,
    pub visibility: f64,
    pub visibility_error: f64,
    /// Modulation phase in radians, in `(-pi/2, pi/2]`.
    pub phase: f64,
    pub phase_error: f64,
    pub chi2: f64,
    pub ndof: usize,
}

impl AzimuthalFit {
    /// Polarization degree and its error for a known modulation factor.
    pub fn polarization_degree(&self, modulation_factor: f64) -> (f64, f64) {
        (
            self.visibility / modulation_factor,
            self.visibility_error / modulation_factor,
        )
    }
}

impl fmt::Display for AzimuthalFit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "A = {:.3} +/- {:.3}, V = {:.4} +/- {:.4}, \
             phase = {:.2} +/- {:.2} deg, chi2 = {:.1}/{}",
            self.normalization,
            self.normalization_error,
            self.visibility,
            self.visibility_error,
            self.phase.to_degrees(),
            self.phase_error.to_degrees(),
            self.chi2,
            self.ndof
        )
    }
}

/// Integrals of `(1, cos 2phi, sin 2phi)` over each bin.
fn regressors(edges: &[f64]) -> Vec<Vector3<f64>> {
    edges
        .windows(2)
        .map(|w| {
            let (lo, hi) = (w[0], w[1]);
            Vector3::new(
                hi - lo,
                0.5 * ((2.0 * hi).sin() - (2.0 * lo).sin()),
                0.5 * ((2.0 * lo).cos() - (2.0 * hi).cos()),
            )
        })
        .collect()
}

fn solve(
    rows: &[Vector3<f64>],
    counts: &[f64],
    variances: &[f64],
) -> Result<(Vector3<f64>, Matrix3<f64>), FitError> {
    let mut normal = Matrix3::zeros();
    let mut rhs = Vector3::zeros();
    for ((x, &n), &var) in rows.iter().zip(counts).zip(variances) {
        normal += x * x.transpose() / var;
        rhs += x * n / var;
    }
    let covariance = normal.try_inverse().ok_or(FitError::Singular)?;
    Ok((covariance * rhs, covariance))
}

pub fn fit_histogram(counts: &[f64], edges: &[f64]) -> Result<AzimuthalFit, FitError> {
    if edges.len() != counts.len() + 1 {
        return Err(FitError::MismatchedLengths(counts.len(), edges.len()));
    }
    if counts.len() < 3 {
        return Err(FitError::TooFewBins(counts.len()));
    }
    if counts.iter().sum::<f64>() <= 0.0 {
        return Err(FitError::EmptyHistogram);
    }
    let rows = regressors(edges);

    let mut variances = counts.iter().map(|&n| n.max(1.0)).collect::<Vec<_>>();
    let (mut theta, mut covariance) = solve(&rows, counts, &variances)?;
    for _ in 1..REWEIGHTING_PASSES {
        variances = rows.iter().map(|x| x.dot(&theta).max(1.0)).collect();
        (theta, covariance) = solve(&rows, counts, &variances)?;
    }

    let chi2 = rows
        .iter()
        .zip(counts)
        .zip(&variances)
        .map(|((x, &n), &var)| (n - x.dot(&theta)).powi(2) / var)
        .sum();

    let (a, b, c) = (theta[0], theta[1], theta[2]);
    let r = b.hypot(c);
    let propagate = |gradient: Vector3<f64>| {
        (gradient.transpose() * covariance * gradient)[(0, 0)]
            .max(0.0)
            .sqrt()
    };
    let normalization_error = covariance[(0, 0)].max(0.0).sqrt();
    let (visibility_error, phase_error) = if r > 0.0 && a != 0.0 {
        (
            propagate(Vector3::new(-r / (a * a), b / (a * r), c / (a * r))),
            propagate(Vector3::new(0.0, -0.5 * c / (r * r), 0.5 * b / (r * r))),
        )
    } else {
        (
            (0.5 * (covariance[(1, 1)] + covariance[(2, 2)])).max(0.0).sqrt() / a.abs(),
            FRAC_PI_2,
        )
    };
    let fit = AzimuthalFit {
        normalization: a,
        normalization_error,
        visibility: r / a,
        visibility_error,
        phase: 0.5 * c.atan2(b),
        phase_error,
        chi2,
        ndof: counts.len() - 3,
    };
    debug!("{fit}");
    Ok(fit)
}
