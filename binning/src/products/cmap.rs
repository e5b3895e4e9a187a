use crate::error::BinningError;
use clap::Args;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::{info, instrument, warn};
use xpol_common::{
    Degrees, EventColumn, EventFile,
    projection::{ProjectionKind, SkyProjection, Wcs},
};

#[derive(Clone, Debug, Args)]
pub struct CmapOptions {
    /// Number of pixels along the x axis
    #[clap(long, default_value = "256")]
    pub nxpix: usize,

    /// Number of pixels along the y axis
    #[clap(long, default_value = "256")]
    pub nypix: usize,

    /// Pixel size in arcseconds
    #[clap(long, default_value = "2.5")]
    pub binsz: f64,

    /// Right ascension of the image centre, defaults to the ROI centre
    #[clap(long)]
    pub xref: Option<Degrees>,

    /// Declination of the image centre, defaults to the ROI centre
    #[clap(long)]
    pub yref: Option<Degrees>,

    /// Sky projection (TAN or CAR)
    #[clap(long, default_value = "TAN")]
    pub proj: String,

    /// Bin the true rather than the reconstructed positions
    #[clap(long)]
    pub mc: bool,
}

impl Default for CmapOptions {
    fn default() -> Self {
        Self {
            nxpix: 256,
            nypix: 256,
            binsz: 2.5,
            xref: None,
            yref: None,
            proj: "TAN".to_owned(),
            mc: false,
        }
    }
}

impl CmapOptions {
    pub fn resolve(&self, file: &EventFile) -> Result<CmapBinning, BinningError> {
        if self.nxpix == 0 || self.nypix == 0 {
            return Err(BinningError::InvalidOption {
                option: "nxpix/nypix",
                reason: format!("image of {} x {} pixels", self.nxpix, self.nypix),
            });
        }
        if !(self.binsz > 0.0) {
            return Err(BinningError::InvalidOption {
                option: "binsz",
                reason: format!("pixel size must be positive, found {}", self.binsz),
            });
        }
        let projection =
            ProjectionKind::from_str(&self.proj).map_err(|_| BinningError::UnsupportedAlgorithm {
                option: "proj",
                name: self.proj.clone(),
            })?;
        let wcs = Wcs::centred(
            projection,
            self.xref.unwrap_or(file.header.roi_ra),
            self.yref.unwrap_or(file.header.roi_dec),
            self.binsz / 3600.0,
            self.nxpix,
            self.nypix,
        )?;
        Ok(CmapBinning {
            wcs,
            nx: self.nxpix,
            ny: self.nypix,
            mc: self.mc,
        })
    }
}

#[derive(Clone, Debug)]
pub struct CmapBinning {
    wcs: Wcs,
    nx: usize,
    ny: usize,
    mc: bool,
}

impl CmapBinning {
    #[instrument(skip_all)]
    pub fn bin(&self, file: &EventFile) -> Result<CountMap, BinningError> {
        let (ra, dec) = if self.mc {
            (EventColumn::McRa, EventColumn::McDec)
        } else {
            (EventColumn::Ra, EventColumn::Dec)
        };
        let (ra, dec) = (file.float_column(ra)?, file.float_column(dec)?);

        let mut counts = Array2::zeros((self.ny, self.nx));
        let mut outside = 0;
        for (&ra, &dec) in ra.iter().zip(dec) {
            let Ok((x, y)) = self.wcs.world_to_pixel(ra, dec) else {
                outside += 1;
                continue;
            };
            let (x, y) = (x.floor(), y.floor());
            if (0.0..self.nx as f64).contains(&x) && (0.0..self.ny as f64).contains(&y) {
                counts[[y as usize, x as usize]] += 1u64;
            } else {
                outside += 1;
            }
        }
        if outside > 0 {
            warn!("{outside} events fall outside the count map");
        }
        info!(
            "{} x {} count map with {} counts",
            self.nx,
            self.ny,
            counts.sum()
        );
        Ok(CountMap {
            wcs: self.wcs.clone(),
            counts,
        })
    }
}

/// Sky image of event counts, indexed `[y, x]`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct CountMap {
    pub wcs: Wcs,
    pub counts: Array2<u64>,
}
