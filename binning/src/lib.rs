//! Binning of simulated or observed photon lists into science products:
//! count spectra, count maps, light curves, phasograms and modulation cubes.

pub mod algorithm;
pub mod engine;
pub mod error;
pub mod fit;
pub mod histogram;
pub mod products;

pub use algorithm::BinningAlgorithm;
pub use engine::{BinningEngine, BinningRequest, default_outfile};
pub use error::BinningError;
pub use fit::{AzimuthalFit, FitError, fit_histogram};
pub use products::{BinnedProduct, ProductFile, ProductOptions};
