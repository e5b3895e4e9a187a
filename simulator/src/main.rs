use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::{fs::File, io::BufReader, path::PathBuf};
use tracing::{info, level_filters::LevelFilter};
use xpol_common::{
    EventFileFormat, JsonEventFile, Time, init_tracer, irf::IrfStore, tracer::TracerOptions,
};
use xpol_simulator::{
    Observation, SimulationConfig, resample::convert, simulate, source::PolarizationModel,
};

#[derive(Debug, Parser)]
#[clap(author, version, about)]
struct Cli {
    /// Directory holding the `<irf-name>.json` calibration files
    #[clap(long, env = "XPOL_IRF", default_value = "irf", global = true)]
    irf_store: PathBuf,

    /// Disable ANSI colours in the log output
    #[clap(long, global = true)]
    no_ansi: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Simulate an observation of a configured source model
    Simulate(SimulateArgs),
    /// Re-observe a photon list from another instrument
    Convert(ConvertArgs),
}

#[derive(Debug, clap::Args)]
struct SimulateArgs {
    /// Path to the JSON simulation configuration
    #[clap(long)]
    config: PathBuf,

    /// Output event file, overrides the configuration
    #[clap(long)]
    output_file: Option<PathBuf>,

    /// Random seed, overrides the configuration
    #[clap(long)]
    seed: Option<u64>,

    /// Name of the response set, overrides the configuration
    #[clap(long)]
    irf_name: Option<String>,
}

#[derive(Debug, clap::Args)]
struct ConvertArgs {
    /// JSON photon list with its pointing and reference effective area
    observation: PathBuf,

    /// Output event file, defaults to `<observation stem>.events.json`
    #[clap(long)]
    output_file: Option<PathBuf>,

    /// JSON polarization model assigned to every photon, unpolarized if absent
    #[clap(long)]
    polarization: Option<PathBuf>,

    /// Stretch the observation to this many seconds
    #[clap(long)]
    duration: Option<Time>,

    #[clap(long, default_value = "0")]
    seed: u64,

    /// Name of the response set to fold the photons through
    #[clap(long, default_value = "xipe_baseline")]
    irf_name: String,
}

fn run_simulation(args: SimulateArgs, store: &IrfStore) -> Result<()> {
    let mut config = SimulationConfig::from_path(&args.config)?;
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if let Some(irf_name) = args.irf_name {
        config.irf_name = irf_name;
    }
    let output_file = args
        .output_file
        .or_else(|| config.output_file.clone())
        .unwrap_or_else(|| args.config.with_extension("events.json"));

    let irf = store
        .load(&config.irf_name)
        .with_context(|| format!("loading response set {}", config.irf_name))?;

    let file = simulate(&config, &irf)?;
    JsonEventFile.write(&file, &output_file)?;
    info!("Done, {} events written to {}", file.num_events(), output_file.display());
    Ok(())
}

fn run_conversion(args: ConvertArgs, store: &IrfStore) -> Result<()> {
    let observation = Observation::from_path(&args.observation)?;
    let polarization = match &args.polarization {
        Some(path) => {
            let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
            serde_json::from_reader(BufReader::new(file))
                .with_context(|| format!("parsing polarization model {}", path.display()))?
        }
        None => PolarizationModel::default(),
    };
    let output_file = args
        .output_file
        .unwrap_or_else(|| args.observation.with_extension("events.json"));

    let irf = store
        .load(&args.irf_name)
        .with_context(|| format!("loading response set {}", args.irf_name))?;

    let file = convert(&observation, &irf, &polarization, args.duration, args.seed)?;
    JsonEventFile.write(&file, &output_file)?;
    info!("Done, {} events written to {}", file.num_events(), output_file.display());
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let _tracer = init_tracer!(TracerOptions {
        default_level: LevelFilter::INFO,
        ansi: !cli.no_ansi,
    });

    let store = IrfStore::new(&cli.irf_store);
    match cli.command {
        Command::Simulate(args) => run_simulation(args, &store),
        Command::Convert(args) => run_conversion(args, &store),
    }
}
