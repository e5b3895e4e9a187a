use super::{EffectiveArea, IrfError};
use crate::{Energy, interpolation::LinearTable};
use serde::{Deserialize, Serialize};

/// On-axis effective area tabulated against true energy.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EffectiveAreaTable(LinearTable);

impl EffectiveAreaTable {
    pub fn new(energy: Vec<Energy>, area: Vec<f64>) -> Result<Self, IrfError> {
        Ok(Self(LinearTable::new(energy, area)?))
    }

    pub fn table(&self) -> &LinearTable {
        &self.0
    }
}

impl EffectiveArea for EffectiveAreaTable {
    fn effective_area(&self, energy: Energy) -> Result<f64, IrfError> {
        self.0
            .evaluate(energy)
            .map_err(|e| IrfError::out_of_domain("Effective area", e))
    }

    fn energy_grid(&self) -> &[Energy] {
        self.0.x()
    }
}
