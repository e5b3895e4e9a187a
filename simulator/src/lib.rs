pub mod count_spectrum;
pub mod resample;
pub mod roi;
pub mod simulation;
pub mod simulation_config;
pub mod source;

pub use count_spectrum::CountSpectrum;
pub use resample::{Observation, PhotonList, ResampleError};
pub use roi::{RoiError, RoiModel};
pub use simulation::{SimulationError, SimulationInfo, simulate};
pub use simulation_config::SimulationConfig;
pub use source::{SourceComponent, SourceError};
