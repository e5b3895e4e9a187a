//! Pixel to sky mapping.
//!
//! Pixel coordinates are continuous and zero based: pixel `(i, j)` covers
//! `[i, i + 1) x [j, j + 1)` and its centre sits at `(i + 0.5, j + 0.5)`.
//! The reference pixel `crpix` maps onto the reference sky position
//! `crval`, and `cdelt` is the pixel increment in degrees (negative on the
//! first axis for the usual east-left orientation).

use crate::Degrees;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("Position ({0}, {1}) lies on the far side of the tangent plane")]
    BehindTangentPlane(Degrees, Degrees),
    #[error("Pixel increment must be non-zero, got ({0}, {1})")]
    ZeroPixelSize(f64, f64),
}

/// Bidirectional mapping between detector/image pixels and sky coordinates.
pub trait SkyProjection {
    fn world_to_pixel(&self, ra: Degrees, dec: Degrees) -> Result<(f64, f64), ProjectionError>;
    fn pixel_to_world(&self, x: f64, y: f64) -> (Degrees, Degrees);
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProjectionKind {
    /// Gnomonic (tangent plane).
    #[default]
    Tan,
    /// Plate carrée.
    Car,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Wcs {
    pub projection: ProjectionKind,
    pub crpix: [f64; 2],
    pub crval: [Degrees; 2],
    pub cdelt: [Degrees; 2],
}

fn wrap_ra(ra: Degrees) -> Degrees {
    ra.rem_euclid(360.0)
}

impl Wcs {
    pub fn new(
        projection: ProjectionKind,
        crpix: [f64; 2],
        crval: [Degrees; 2],
        cdelt: [Degrees; 2],
    ) -> Result<Self, ProjectionError> {
        if cdelt[0] == 0.0 || cdelt[1] == 0.0 {
            return Err(ProjectionError::ZeroPixelSize(cdelt[0], cdelt[1]));
        }
        Ok(Self {
            projection,
            crpix,
            crval,
            cdelt,
        })
    }

    /// Image of `nx` by `ny` pixels of side `pixel_size` degrees, centred on `(ra, dec)`.
    pub fn centred(
        projection: ProjectionKind,
        ra: Degrees,
        dec: Degrees,
        pixel_size: Degrees,
        nx: usize,
        ny: usize,
    ) -> Result<Self, ProjectionError> {
        Self::new(
            projection,
            [0.5 * nx as f64, 0.5 * ny as f64],
            [ra, dec],
            [-pixel_size, pixel_size],
        )
    }

    /// Projects onto the intermediate plane, in degrees.
    fn project(&self, ra: Degrees, dec: Degrees) -> Result<(f64, f64), ProjectionError> {
        let [ra0, dec0] = self.crval;
        match self.projection {
            ProjectionKind::Tan => {
                let (a, d) = (ra.to_radians(), dec.to_radians());
                let (a0, d0) = (ra0.to_radians(), dec0.to_radians());
                let cos_c = d0.sin() * d.sin() + d0.cos() * d.cos() * (a - a0).cos();
                if cos_c <= 0.0 {
                    return Err(ProjectionError::BehindTangentPlane(ra, dec));
                }
                let xi = d.cos() * (a - a0).sin() / cos_c;
                let eta = (d0.cos() * d.sin() - d0.sin() * d.cos() * (a - a0).cos()) / cos_c;
                Ok((xi.to_degrees(), eta.to_degrees()))
            }
            ProjectionKind::Car => {
                let dra = (ra - ra0 + 180.0).rem_euclid(360.0) - 180.0;
                Ok((dra, dec - dec0))
            }
        }
    }

    fn deproject(&self, x: f64, y: f64) -> (Degrees, Degrees) {
        let [ra0, dec0] = self.crval;
        match self.projection {
            ProjectionKind::Tan => {
                let (xi, eta) = (x.to_radians(), y.to_radians());
                let (a0, d0) = (ra0.to_radians(), dec0.to_radians());
                let rho2 = xi * xi + eta * eta;
                let dec = ((d0.sin() + eta * d0.cos()) / (1.0 + rho2).sqrt()).asin();
                let ra = a0 + xi.atan2(d0.cos() - eta * d0.sin());
                (wrap_ra(ra.to_degrees()), dec.to_degrees())
            }
            ProjectionKind::Car => (wrap_ra(ra0 + x), dec0 + y),
        }
    }
}

impl SkyProjection for Wcs {
    fn world_to_pixel(&self, ra: Degrees, dec: Degrees) -> Result<(f64, f64), ProjectionError> {
        let (x, y) = self.project(ra, dec)?;
        Ok((
            self.crpix[0] + x / self.cdelt[0],
            self.crpix[1] + y / self.cdelt[1],
        ))
    }

    fn pixel_to_world(&self, x: f64, y: f64) -> (Degrees, Degrees) {
        self.deproject(
            (x - self.crpix[0]) * self.cdelt[0],
            (y - self.crpix[1]) * self.cdelt[1],
        )
    }
}
