//! Binned science products and their on-disk form.

mod cmap;
mod lc;
mod mcube;
mod pha1;
mod phasg;

pub use cmap::{CmapBinning, CmapOptions, CountMap};
pub use lc::{LcBinning, LcOptions, LightCurve};
pub use mcube::{McubeBinning, McubeOptions, ModulationCube, SlicePolarization};
pub use pha1::{CountSpectrum, Pha1Binning, Pha1Options};
pub use phasg::{PhasgBinning, PhasgOptions, Phasogram};

use crate::error::BinningError;
use clap::Subcommand;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::Path,
};
use strum::{AsRefStr, Display};
use tracing::info;
use xpol_common::{EventFile, EventFileHeader};

/// Product to bin, with its options as given on the command line.
#[derive(Clone, Debug, Subcommand)]
pub enum ProductOptions {
    /// Count spectrum: rate per detector channel
    Pha1(Pha1Options),
    /// Sky count map
    Cmap(CmapOptions),
    /// Light curve
    Lc(LcOptions),
    /// Phase histogram
    Phasg(PhasgOptions),
    /// Modulation cube: azimuthal histograms in energy slices
    Mcube(McubeOptions),
}

impl ProductOptions {
    /// Suffix appended to the event file name for the default output.
    pub fn suffix(&self) -> &'static str {
        match self {
            Self::Pha1(_) => "pha1",
            Self::Cmap(_) => "cmap",
            Self::Lc(_) => "lc",
            Self::Phasg(_) => "phasg",
            Self::Mcube(_) => "mcube",
        }
    }

    /// Fills in unset options from the event file and builds the binning.
    pub fn resolve(&self, file: &EventFile) -> Result<Binning, BinningError> {
        Ok(match self {
            Self::Pha1(options) => Binning::Pha1(options.resolve(file)?),
            Self::Cmap(options) => Binning::Cmap(options.resolve(file)?),
            Self::Lc(options) => Binning::Lc(options.resolve(file)?),
            Self::Phasg(options) => Binning::Phasg(options.resolve(file)?),
            Self::Mcube(options) => Binning::Mcube(options.resolve(file)?),
        })
    }
}

/// Fully resolved binning of one product.
#[derive(Clone, Debug)]
pub enum Binning {
    Pha1(Pha1Binning),
    Cmap(CmapBinning),
    Lc(LcBinning),
    Phasg(PhasgBinning),
    Mcube(McubeBinning),
}

impl Binning {
    pub fn bin(&self, file: &EventFile) -> Result<BinnedProduct, BinningError> {
        Ok(match self {
            Self::Pha1(binning) => BinnedProduct::Pha1(binning.bin(file)?),
            Self::Cmap(binning) => BinnedProduct::Cmap(binning.bin(file)?),
            Self::Lc(binning) => BinnedProduct::Lc(binning.bin(file)?),
            Self::Phasg(binning) => BinnedProduct::Phasg(binning.bin(file)?),
            Self::Mcube(binning) => BinnedProduct::Mcube(binning.bin(file)?),
        })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, AsRefStr, Display)]
#[strum(serialize_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE", tag = "BINALG")]
pub enum BinnedProduct {
    Pha1(CountSpectrum),
    Cmap(CountMap),
    Lc(LightCurve),
    Phasg(Phasogram),
    Mcube(ModulationCube),
}

/// A binned product together with the header of the events it came from.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ProductFile {
    pub header: EventFileHeader,
    #[serde(flatten)]
    pub product: BinnedProduct,
}

impl ProductFile {
    pub fn write(&self, path: &Path) -> Result<(), BinningError> {
        info!("Writing binned {} data to {}", self.product, path.display());
        let io_error = |source| BinningError::Io {
            path: path.to_owned(),
            source,
        };
        let mut writer = BufWriter::new(File::create(path).map_err(io_error)?);
        serde_json::to_writer_pretty(&mut writer, self).map_err(|source| BinningError::Json {
            path: path.to_owned(),
            source,
        })?;
        writer.flush().map_err(io_error)
    }

    pub fn read(path: &Path) -> Result<Self, BinningError> {
        info!("Opening binned file {}", path.display());
        let file = File::open(path).map_err(|source| BinningError::Io {
            path: path.to_owned(),
            source,
        })?;
        serde_json::from_reader(BufReader::new(file)).map_err(|source| BinningError::Json {
            path: path.to_owned(),
            source,
        })
    }

    pub fn modulation_cube(&self) -> Result<&ModulationCube, BinningError> {
        match &self.product {
            BinnedProduct::Mcube(cube) => Ok(cube),
            other => Err(BinningError::WrongProduct {
                expected: "MCUBE",
                found: other.to_string(),
            }),
        }
    }
}
