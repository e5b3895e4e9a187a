//! Drives one binning run from event file to product file.

use crate::{
    error::BinningError,
    products::{Binning, ProductFile, ProductOptions},
};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};
use xpol_common::{EventFile, EventFileFormat, JsonEventFile};

/// What to bin, and where to put the result.
#[derive(Clone, Debug)]
pub struct BinningRequest {
    pub evfile: PathBuf,
    pub outfile: Option<PathBuf>,
    pub product: ProductOptions,
}

/// `<dir>/<stem>_<suffix>.json`, where `stem` is the event file name
/// without any `.json` or `.events.json` extension.
pub fn default_outfile(evfile: &Path, suffix: &str) -> PathBuf {
    let name = evfile
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = name
        .strip_suffix(".json")
        .map(|stem| stem.strip_suffix(".events").unwrap_or(stem))
        .unwrap_or(name.as_str());
    evfile.with_file_name(format!("{stem}_{suffix}.json"))
}

enum State {
    Load(BinningRequest),
    ProcessOptions {
        request: BinningRequest,
        file: EventFile,
    },
    Bin {
        binning: Binning,
        file: EventFile,
        outfile: PathBuf,
    },
    Write {
        product: ProductFile,
        outfile: PathBuf,
    },
    Done(PathBuf),
}

impl State {
    fn name(&self) -> &'static str {
        match self {
            Self::Load(_) => "load",
            Self::ProcessOptions { .. } => "process-options",
            Self::Bin { .. } => "bin",
            Self::Write { .. } => "write",
            Self::Done(_) => "done",
        }
    }
}

/// Runs binning requests against event files stored in format `F`.
#[derive(Clone, Debug, Default)]
pub struct BinningEngine<F = JsonEventFile> {
    format: F,
}

impl<F: EventFileFormat> BinningEngine<F> {
    pub fn new(format: F) -> Self {
        Self { format }
    }

    fn step(&self, state: State) -> Result<State, BinningError> {
        debug!("Entering {} state", state.name());
        Ok(match state {
            State::Load(request) => {
                info!("Loading events from {}", request.evfile.display());
                let file = self.format.read(&request.evfile)?;
                info!("{} events loaded", file.num_events());
                State::ProcessOptions { request, file }
            }
            State::ProcessOptions { request, file } => {
                let binning = request.product.resolve(&file)?;
                let outfile = request.outfile.unwrap_or_else(|| {
                    default_outfile(&request.evfile, request.product.suffix())
                });
                State::Bin {
                    binning,
                    file,
                    outfile,
                }
            }
            State::Bin {
                binning,
                file,
                outfile,
            } => {
                let product = binning.bin(&file)?;
                State::Write {
                    product: ProductFile {
                        header: file.header,
                        product,
                    },
                    outfile,
                }
            }
            State::Write { product, outfile } => {
                product.write(&outfile)?;
                State::Done(outfile)
            }
            State::Done(outfile) => State::Done(outfile),
        })
    }

    /// Bins the request and returns the path of the file written.
    #[instrument(skip_all, fields(evfile = %request.evfile.display()))]
    pub fn run(&self, request: BinningRequest) -> Result<PathBuf, BinningError> {
        let mut state = State::Load(request);
        loop {
            state = match self.step(state)? {
                State::Done(outfile) => return Ok(outfile),
                next => next,
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::products::{
        BinnedProduct, LcOptions, McubeOptions, Pha1Options, tests::synthetic_file,
    };
    use xpol_common::{GtiList, irf::IrfStore};
    use xpol_simulator::{
        Observation, SimulationConfig, resample::convert, simulate, source::PolarizationModel,
    };

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(name)
    }

    #[test]
    fn default_outfile_names() {
        assert_eq!(
            default_outfile(Path::new("/data/crab.events.json"), "lc"),
            PathBuf::from("/data/crab_lc.json")
        );
        assert_eq!(
            default_outfile(Path::new("obs.json"), "pha1"),
            PathBuf::from("obs_pha1.json")
        );
        assert_eq!(
            default_outfile(Path::new("obs"), "cmap"),
            PathBuf::from("obs_cmap.json")
        );
    }

    #[test]
    fn writes_next_to_the_event_file_by_default() {
        let evfile = temp_path("xpol_engine_default.events.json");
        JsonEventFile
            .write(&synthetic_file(100, 10, 1000.0), &evfile)
            .unwrap();
        let outfile = BinningEngine::<JsonEventFile>::default()
            .run(BinningRequest {
                evfile: evfile.clone(),
                outfile: None,
                product: ProductOptions::Pha1(Pha1Options::default()),
            })
            .unwrap();
        assert_eq!(outfile, temp_path("xpol_engine_default_pha1.json"));
        let product = ProductFile::read(&outfile).unwrap();
        std::fs::remove_file(&evfile).unwrap();
        std::fs::remove_file(&outfile).unwrap();
        assert_eq!(product.header.detchans, 10);
        assert!(matches!(
            product.product,
            BinnedProduct::Pha1(spectrum) if spectrum.rate.len() == 10
        ));
    }

    #[test]
    fn explicit_outfile_and_bad_options() {
        let evfile = temp_path("xpol_engine_explicit.events.json");
        let outfile = temp_path("xpol_engine_explicit_curve.json");
        JsonEventFile
            .write(&synthetic_file(100, 10, 1000.0), &evfile)
            .unwrap();
        let engine = BinningEngine::new(JsonEventFile);
        let written = engine
            .run(BinningRequest {
                evfile: evfile.clone(),
                outfile: Some(outfile.clone()),
                product: ProductOptions::Lc(LcOptions {
                    tbins: 4,
                    ..Default::default()
                }),
            })
            .unwrap();
        let failed = engine.run(BinningRequest {
            evfile: evfile.clone(),
            outfile: None,
            product: ProductOptions::Lc(LcOptions {
                tbinalg: "LOG".to_owned(),
                tstart: Some(0.0),
                ..Default::default()
            }),
        });
        std::fs::remove_file(&evfile).unwrap();
        std::fs::remove_file(&outfile).unwrap();
        assert_eq!(written, outfile);
        assert!(matches!(
            failed,
            Err(BinningError::InvalidOption { option: "tbinalg", .. })
        ));
    }

    #[test]
    fn missing_event_file() {
        let result = BinningEngine::<JsonEventFile>::default().run(BinningRequest {
            evfile: temp_path("xpol_engine_no_such_file.json"),
            outfile: None,
            product: ProductOptions::Pha1(Pha1Options::default()),
        });
        assert!(matches!(result, Err(BinningError::EventFile(_))));
    }

    #[test]
    fn simulated_observation_end_to_end() {
        let config = SimulationConfig::from_path(Path::new(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/../demos/stationary_point_pl.json"
        )))
        .unwrap();
        let irf = IrfStore::new(concat!(env!("CARGO_MANIFEST_DIR"), "/../irf"))
            .load(&config.irf_name)
            .unwrap();
        let events = simulate(&config, &irf).unwrap();
        assert!(events.num_events() > 0);

        let evfile = temp_path("xpol_engine_end_to_end.events.json");
        JsonEventFile.write(&events, &evfile).unwrap();
        let engine = BinningEngine::new(JsonEventFile);
        let pha1 = engine
            .run(BinningRequest {
                evfile: evfile.clone(),
                outfile: None,
                product: ProductOptions::Pha1(Pha1Options::default()),
            })
            .unwrap();
        let mcube = engine
            .run(BinningRequest {
                evfile: evfile.clone(),
                outfile: None,
                product: ProductOptions::Mcube(McubeOptions {
                    ebins: 2,
                    ..Default::default()
                }),
            })
            .unwrap();
        let spectrum = ProductFile::read(&pha1).unwrap();
        let cube = ProductFile::read(&mcube).unwrap();
        for path in [&evfile, &pha1, &mcube] {
            std::fs::remove_file(path).unwrap();
        }

        let total = events.num_events() as f64;
        assert_eq!(spectrum.header.irf_name, "xipe_baseline");
        assert!(matches!(
            &spectrum.product,
            BinnedProduct::Pha1(pha)
                if (pha.rate.iter().sum::<f64>() * pha.exposure - total).abs() < 1e-6
        ));
        let cube = cube.modulation_cube().unwrap();
        assert_eq!(cube.phi_hist.sum() as f64, total);
        let slices = cube.analyze(&irf.modf).unwrap();
        assert_eq!(slices.len(), 2);
        assert!(slices.iter().all(|slice| slice.fit.visibility >= 0.0));
    }

    #[test]
    fn converted_photon_list_end_to_end() {
        let observation = Observation::from_path(Path::new(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/../demos/observed_photons.json"
        )))
        .unwrap();
        let irf = IrfStore::new(concat!(env!("CARGO_MANIFEST_DIR"), "/../irf"))
            .load("xipe_baseline")
            .unwrap();
        let polarization = PolarizationModel::constant(0.2, 0.8);
        let events = convert(&observation, &irf, &polarization, Some(400.0), 5).unwrap();
        assert!(events.num_events() > 0);
        assert_eq!(events.gti, GtiList::single(0.0, 400.0));

        let evfile = temp_path("xpol_engine_converted.events.json");
        JsonEventFile.write(&events, &evfile).unwrap();
        let lc = BinningEngine::new(JsonEventFile)
            .run(BinningRequest {
                evfile: evfile.clone(),
                outfile: None,
                product: ProductOptions::Lc(LcOptions {
                    tbins: 8,
                    ..Default::default()
                }),
            })
            .unwrap();
        let curve = ProductFile::read(&lc).unwrap();
        std::fs::remove_file(&evfile).unwrap();
        std::fs::remove_file(&lc).unwrap();

        let total = events.num_events() as u64;
        assert!(matches!(
            &curve.product,
            BinnedProduct::Lc(curve) if curve.counts.iter().sum::<u64>() == total
        ));
    }
}
