//! Tabulated functions and inverse-CDF sampling over 1-D densities.

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InterpolationError {
    #[error("Value {0} is out of bounds for interpolation range [{1}, {2}]")]
    OutOfBounds(f64, f64, f64),
    #[error("Input vectors must have at least 2 points")]
    InsufficientData,
    #[error("Input vectors must have the same length: {0} != {1}")]
    MismatchedLengths(usize, usize),
    #[error("X values must be sorted in ascending order")]
    UnsortedData,
    #[error("Density must be finite and non-negative, found {0}")]
    NegativeDensity(f64),
    #[error("Density integrates to zero")]
    ZeroNormalization,
}

fn validate(x: &[f64], y: &[f64]) -> Result<(), InterpolationError> {
    if x.len() != y.len() {
        return Err(InterpolationError::MismatchedLengths(x.len(), y.len()));
    }
    if x.len() < 2 {
        return Err(InterpolationError::InsufficientData);
    }
    if x.windows(2).any(|w| w[1] < w[0]) {
        return Err(InterpolationError::UnsortedData);
    }
    Ok(())
}

/// Running trapezoidal integral, starting at zero.
pub fn cumulative_trapezoid(x: &[f64], y: &[f64]) -> Vec<f64> {
    let mut total = 0.0;
    std::iter::once(0.0)
        .chain(x.windows(2).zip(y.windows(2)).map(|(x, y)| {
            total += 0.5 * (y[0] + y[1]) * (x[1] - x[0]);
            total
        }))
        .collect()
}

pub fn trapezoid(x: &[f64], y: &[f64]) -> f64 {
    cumulative_trapezoid(x, y).last().copied().unwrap_or_default()
}

/// Piecewise-linear function defined on `[x[0], x[n-1]]`.
///
/// Evaluation outside the tabulated range is an error, never a clamp.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(try_from = "RawTable")]
pub struct LinearTable {
    x: Vec<f64>,
    y: Vec<f64>,
}

#[derive(Deserialize)]
struct RawTable {
    x: Vec<f64>,
    y: Vec<f64>,
}

impl TryFrom<RawTable> for LinearTable {
    type Error = InterpolationError;

    fn try_from(raw: RawTable) -> Result<Self, Self::Error> {
        Self::new(raw.x, raw.y)
    }
}

impl LinearTable {
    pub fn new(x: Vec<f64>, y: Vec<f64>) -> Result<Self, InterpolationError> {
        validate(&x, &y)?;
        Ok(Self { x, y })
    }

    pub fn x(&self) -> &[f64] {
        &self.x
    }

    pub fn y(&self) -> &[f64] {
        &self.y
    }

    pub fn xmin(&self) -> f64 {
        self.x.first().copied().unwrap_or_default()
    }

    pub fn xmax(&self) -> f64 {
        self.x.last().copied().unwrap_or_default()
    }

    pub fn evaluate(&self, x: f64) -> Result<f64, InterpolationError> {
        let (xmin, xmax) = (self.xmin(), self.xmax());
        if !(xmin..=xmax).contains(&x) {
            return Err(InterpolationError::OutOfBounds(x, xmin, xmax));
        }
        // partition_point returns the index of the first element > x
        let idx = self.x.partition_point(|&val| val <= x);
        if idx == 0 {
            return Ok(self.y[0]);
        }
        if idx == self.x.len() {
            return Ok(self.y[idx - 1]);
        }
        let (x1, x2) = (self.x[idx - 1], self.x[idx]);
        let (y1, y2) = (self.y[idx - 1], self.y[idx]);
        let t = (x - x1) / (x2 - x1);
        Ok(y1 + t * (y2 - y1))
    }
}

/// Inverse-CDF sampler for a density tabulated on a grid.
///
/// The CDF is the running trapezoidal integral of the density, normalised
/// to one; the percent-point function interpolates it linearly.
#[derive(Clone, Debug)]
pub struct InverseCdf {
    x: Vec<f64>,
    cdf: Vec<f64>,
    norm: f64,
}

impl InverseCdf {
    pub fn new(x: Vec<f64>, density: &[f64]) -> Result<Self, InterpolationError> {
        validate(&x, density)?;
        if let Some(&bad) = density.iter().find(|d| !d.is_finite() || **d < 0.0) {
            return Err(InterpolationError::NegativeDensity(bad));
        }
        let mut cdf = cumulative_trapezoid(&x, density);
        let norm = cdf.last().copied().unwrap_or_default();
        if norm <= 0.0 {
            return Err(InterpolationError::ZeroNormalization);
        }
        cdf.iter_mut().for_each(|c| *c /= norm);
        Ok(Self { x, cdf, norm })
    }

    /// Integral of the density over the whole grid.
    pub fn norm(&self) -> f64 {
        self.norm
    }

    pub fn cdf(&self) -> &[f64] {
        &self.cdf
    }

    /// Percent-point function: the `x` at which the CDF reaches `u`.
    pub fn ppf(&self, u: f64) -> f64 {
        let u = u.clamp(0.0, 1.0);
        // First grid point whose CDF reaches u; flat stretches are skipped.
        let idx = self.cdf.partition_point(|&c| c < u);
        if idx == 0 {
            return self.x[0];
        }
        if idx == self.x.len() {
            return self.x[idx - 1];
        }
        let (c1, c2) = (self.cdf[idx - 1], self.cdf[idx]);
        let (x1, x2) = (self.x[idx - 1], self.x[idx]);
        let t = if c2 > c1 { (u - c1) / (c2 - c1) } else { 0.0 };
        x1 + t * (x2 - x1)
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        self.ppf(rng.random::<f64>())
    }

    pub fn sample_n<R: Rng + ?Sized>(&self, n: usize, rng: &mut R) -> Vec<f64> {
        (0..n).map(|_| self.sample(rng)).collect()
    }
}
