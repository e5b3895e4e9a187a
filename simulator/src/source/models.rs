use super::SourceError;
use serde::Deserialize;
use xpol_common::{Energy, Time, interpolation::LinearTable};

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Transformation {
    pub scale: f64,
    pub translate: f64,
}

impl Transformation {
    pub fn transform(&self, x: f64) -> f64 {
        x * self.scale + self.translate
    }
}

/// A scalar model parameter, optionally varying with energy or time.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ParameterExpression {
    Value(f64),
    /// Linear function of the true energy (keV).
    EnergyFunc(Transformation),
    /// Linear function of the event time (s).
    TimeFunc(Transformation),
    /// Tabulated against energy; evaluating outside the table is an error.
    EnergyTable(LinearTable),
    /// Tabulated against time; evaluating outside the table is an error.
    TimeTable(LinearTable),
}

impl ParameterExpression {
    pub fn value(&self, energy: Energy, time: Time) -> Result<f64, SourceError> {
        match self {
            Self::Value(v) => Ok(*v),
            Self::EnergyFunc(function) => Ok(function.transform(energy)),
            Self::TimeFunc(function) => Ok(function.transform(time)),
            Self::EnergyTable(table) => Ok(table.evaluate(energy)?),
            Self::TimeTable(table) => Ok(table.evaluate(time)?),
        }
    }
}

impl From<f64> for ParameterExpression {
    fn from(value: f64) -> Self {
        Self::Value(value)
    }
}

/// Differential photon flux in ph cm^-2 s^-1 keV^-1.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "spectrum-type")]
pub enum SpectralModel {
    /// `normalization * E^-index`
    PowerLaw {
        normalization: ParameterExpression,
        index: ParameterExpression,
    },
    /// Flux tabulated against energy, scaled by a possibly time-dependent factor.
    Tabulated {
        flux: LinearTable,
        #[serde(default = "SpectralModel::unit_scale")]
        scale: ParameterExpression,
    },
}

impl SpectralModel {
    fn unit_scale() -> ParameterExpression {
        ParameterExpression::Value(1.0)
    }

    pub fn power_law(normalization: f64, index: f64) -> Self {
        Self::PowerLaw {
            normalization: normalization.into(),
            index: index.into(),
        }
    }

    pub fn flux(&self, energy: Energy, time: Time) -> Result<f64, SourceError> {
        match self {
            Self::PowerLaw {
                normalization,
                index,
            } => Ok(normalization.value(energy, time)?
                * energy.powf(-index.value(energy, time)?)),
            Self::Tabulated { flux, scale } => {
                Ok(flux.evaluate(energy)? * scale.value(energy, time)?)
            }
        }
    }
}

/// Polarization degree in `[0, 1]` and angle in radians, both functions of
/// energy and time.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct PolarizationModel {
    pub degree: ParameterExpression,
    pub angle: ParameterExpression,
}

impl PolarizationModel {
    pub fn constant(degree: f64, angle: f64) -> Self {
        Self {
            degree: degree.into(),
            angle: angle.into(),
        }
    }

    pub fn unpolarized() -> Self {
        Self::constant(0.0, 0.0)
    }

    pub fn degree(&self, energy: Energy, time: Time) -> Result<f64, SourceError> {
        self.degree.value(energy, time)
    }

    pub fn angle(&self, energy: Energy, time: Time) -> Result<f64, SourceError> {
        self.angle.value(energy, time)
    }
}

impl Default for PolarizationModel {
    fn default() -> Self {
        Self::unpolarized()
    }
}
