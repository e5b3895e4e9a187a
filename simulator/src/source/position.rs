use super::SourceError;
use ndarray::Array2;
use rand::{Rng, RngCore};
use rand_distr::{Distribution, Normal};
use serde::Deserialize;
use std::{f64::consts::TAU, fmt};
use tracing::debug;
use xpol_common::{
    Degrees,
    projection::{SkyProjection, Wcs},
};

/// Brightness map sampled through the cumulative sum of its pixels.
#[derive(Clone, Debug, Deserialize)]
#[serde(try_from = "SkyImageDescription")]
pub struct SkyImage {
    wcs: Wcs,
    shape: (usize, usize),
    cdf: Vec<f64>,
    dither: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
struct SkyImageDescription {
    wcs: Wcs,
    /// Rows are declination (y), columns right ascension (x).
    pixels: Array2<f64>,
    #[serde(default = "SkyImageDescription::default_dither")]
    dither: bool,
}

impl SkyImageDescription {
    fn default_dither() -> bool {
        true
    }
}

impl TryFrom<SkyImageDescription> for SkyImage {
    type Error = SourceError;

    fn try_from(description: SkyImageDescription) -> Result<Self, Self::Error> {
        SkyImage::new(description.wcs, &description.pixels, description.dither)
    }
}

impl SkyImage {
    pub fn new(wcs: Wcs, pixels: &Array2<f64>, dither: bool) -> Result<Self, SourceError> {
        if let Some(&bad) = pixels.iter().find(|p| !p.is_finite() || **p < 0.0) {
            return Err(SourceError::InvalidImage(format!("pixel value {bad}")));
        }
        // Row-major flattening, so index k maps back to (k / nx, k % nx).
        let mut total = 0.0;
        let mut cdf = pixels
            .iter()
            .map(|p| {
                total += p;
                total
            })
            .collect::<Vec<_>>();
        if total <= 0.0 {
            return Err(SourceError::InvalidImage("image has no flux".to_owned()));
        }
        cdf.iter_mut().for_each(|c| *c /= total);
        debug!("Built image sampler over {} pixels", cdf.len());
        Ok(Self {
            wcs,
            shape: pixels.dim(),
            cdf,
            dither,
        })
    }

    pub fn wcs(&self) -> &Wcs {
        &self.wcs
    }

    /// Flat pixel index holding the cumulative fraction `u`.
    fn pixel_index(&self, u: f64) -> usize {
        self.cdf
            .partition_point(|&c| c <= u)
            .min(self.cdf.len() - 1)
    }

    pub fn sample(&self, n: usize, rng: &mut dyn RngCore) -> (Vec<Degrees>, Vec<Degrees>) {
        let nx = self.shape.1;
        let (mut ra, mut dec): (Vec<_>, Vec<_>) = (0..n)
            .map(|_| {
                let k = self.pixel_index(rng.random::<f64>());
                let (row, col) = (k / nx, k % nx);
                self.wcs.pixel_to_world(col as f64 + 0.5, row as f64 + 0.5)
            })
            .unzip();
        if self.dither {
            let [dx, dy] = self.wcs.cdelt;
            ra.iter_mut()
                .for_each(|ra| *ra += dx * (rng.random::<f64>() - 0.5));
            dec.iter_mut()
                .for_each(|dec| *dec += dy * (rng.random::<f64>() - 0.5));
        }
        (ra, dec)
    }
}

/// Sky-position generators. Angles in decimal degrees.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "position-type")]
pub enum PositionModel {
    Point {
        ra: Degrees,
        dec: Degrees,
    },
    UniformDisk {
        ra: Degrees,
        dec: Degrees,
        radius: Degrees,
    },
    GaussianDisk {
        ra: Degrees,
        dec: Degrees,
        sigma: Degrees,
    },
    Image(SkyImage),
}

impl PositionModel {
    pub fn validate(&self) -> Result<(), SourceError> {
        match self {
            Self::UniformDisk { radius, .. } if !(*radius > 0.0) => {
                Err(SourceError::InvalidExtent("radius", *radius))
            }
            Self::GaussianDisk { sigma, .. } if !(*sigma > 0.0) => {
                Err(SourceError::InvalidExtent("sigma", *sigma))
            }
            _ => Ok(()),
        }
    }

    pub fn sample_sky_positions(
        &self,
        n: usize,
        rng: &mut dyn RngCore,
    ) -> Result<(Vec<Degrees>, Vec<Degrees>), SourceError> {
        match self {
            Self::Point { ra, dec } => Ok((vec![*ra; n], vec![*dec; n])),
            Self::UniformDisk { ra, dec, radius } => {
                let r = (0..n)
                    .map(|_| radius * rng.random::<f64>().sqrt())
                    .collect::<Vec<_>>();
                let theta = (0..n)
                    .map(|_| TAU * rng.random::<f64>())
                    .collect::<Vec<_>>();
                Ok(r.iter()
                    .zip(&theta)
                    .map(|(r, theta)| (ra + r * theta.cos(), dec + r * theta.sin()))
                    .unzip())
            }
            Self::GaussianDisk { ra, dec, sigma } => {
                let ra_distr = Normal::new(*ra, *sigma)?;
                let dec_distr = Normal::new(*dec, *sigma)?;
                let ra = (0..n).map(|_| ra_distr.sample(rng)).collect();
                let dec = (0..n).map(|_| dec_distr.sample(rng)).collect();
                Ok((ra, dec))
            }
            Self::Image(image) => Ok(image.sample(n, rng)),
        }
    }
}

impl fmt::Display for PositionModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Point { ra, dec } => write!(f, "point at ({ra:.4}, {dec:.4})"),
            Self::UniformDisk { ra, dec, radius } => {
                write!(f, "uniform disk at ({ra:.4}, {dec:.4}), radius {radius} deg")
            }
            Self::GaussianDisk { ra, dec, sigma } => {
                write!(f, "gaussian disk at ({ra:.4}, {dec:.4}), sigma {sigma} deg")
            }
            Self::Image(image) => {
                let [ra, dec] = image.wcs.crval;
                write!(
                    f,
                    "{}x{} image at ({ra:.4}, {dec:.4})",
                    image.shape.1, image.shape.0
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use ndarray::array;
    use rand::{SeedableRng, rngs::StdRng};
    use xpol_common::projection::ProjectionKind;

    #[test]
    fn point_source_repeats_position() {
        let model = PositionModel::Point { ra: 1.0, dec: 2.0 };
        let mut rng = StdRng::seed_from_u64(0);
        let (ra, dec) = model.sample_sky_positions(3, &mut rng).unwrap();
        assert_eq!(ra, vec![1.0; 3]);
        assert_eq!(dec, vec![2.0; 3]);
    }

    #[test]
    fn uniform_disk_second_moment() {
        let radius = 0.05;
        let model = PositionModel::UniformDisk {
            ra: 10.0,
            dec: 20.0,
            radius,
        };
        let mut rng = StdRng::seed_from_u64(1);
        let n = 100_000;
        let (ra, dec) = model.sample_sky_positions(n, &mut rng).unwrap();
        let r2 = ra
            .iter()
            .zip(&dec)
            .map(|(ra, dec)| (ra - 10.0).powi(2) + (dec - 20.0).powi(2))
            .collect::<Vec<_>>();
        assert!(r2.iter().all(|&r2| r2 <= radius * radius * (1.0 + 1e-9)));
        let mean = r2.iter().sum::<f64>() / n as f64;
        assert_approx_eq!(mean / (radius * radius), 0.5, 0.01);
    }

    #[test]
    fn gaussian_disk_spread() {
        let model = PositionModel::GaussianDisk {
            ra: 0.0,
            dec: 0.0,
            sigma: 0.1,
        };
        let mut rng = StdRng::seed_from_u64(2);
        let n = 50_000;
        let (ra, dec) = model.sample_sky_positions(n, &mut rng).unwrap();
        let var = |v: &[f64]| v.iter().map(|x| x * x).sum::<f64>() / n as f64;
        assert_approx_eq!(var(&ra), 0.01, 0.0005);
        assert_approx_eq!(var(&dec), 0.01, 0.0005);
    }

    #[test]
    fn invalid_extent_rejected() {
        let model = PositionModel::UniformDisk {
            ra: 0.0,
            dec: 0.0,
            radius: -1.0,
        };
        assert!(matches!(
            model.validate(),
            Err(SourceError::InvalidExtent("radius", _))
        ));
    }

    #[test]
    fn image_samples_only_bright_pixels() {
        let wcs = Wcs::centred(ProjectionKind::Car, 100.0, 0.0, 0.01, 2, 2).unwrap();
        let pixels = array![[0.0, 0.0], [0.0, 1.0]];
        let image = SkyImage::new(wcs.clone(), &pixels, false).unwrap();
        let mut rng = StdRng::seed_from_u64(4);
        let (ra, dec) = image.sample(100, &mut rng);
        let (ra0, dec0) = wcs.pixel_to_world(1.5, 1.5);
        assert!(ra.iter().all(|&ra| (ra - ra0).abs() < 1e-9));
        assert!(dec.iter().all(|&dec| (dec - dec0).abs() < 1e-9));
    }

    #[test]
    fn dither_stays_within_the_pixel() {
        let wcs = Wcs::centred(ProjectionKind::Car, 100.0, 0.0, 0.01, 1, 1).unwrap();
        let image = SkyImage::new(wcs, &array![[1.0]], true).unwrap();
        let mut rng = StdRng::seed_from_u64(4);
        let (ra, dec) = image.sample(1000, &mut rng);
        assert!(ra.iter().all(|&ra| (ra - 100.0).abs() <= 0.005));
        assert!(dec.iter().all(|&dec| dec.abs() <= 0.005));
    }

    #[test]
    fn empty_image_rejected() {
        let wcs = Wcs::centred(ProjectionKind::Tan, 0.0, 0.0, 0.01, 2, 1).unwrap();
        assert!(SkyImage::new(wcs, &array![[0.0, 0.0]], false).is_err());
    }
}
