use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::{
    fs::File,
    io::{BufWriter, Write},
    path::PathBuf,
};
use tracing::{info, level_filters::LevelFilter};
use xpol_binning::{BinningEngine, BinningRequest, ProductFile, ProductOptions};
use xpol_common::{JsonEventFile, init_tracer, irf::IrfStore, tracer::TracerOptions};

#[derive(Debug, Parser)]
#[clap(author, version, about)]
struct Cli {
    /// Disable ANSI colours in the log output
    #[clap(long, global = true)]
    no_ansi: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Bin an event file into a science product
    Bin(BinArgs),
    /// Measure the polarization in each slice of a binned modulation cube
    FitMcube(FitArgs),
}

#[derive(Debug, clap::Args)]
struct BinArgs {
    /// Event file to bin
    evfile: PathBuf,

    /// Output file, defaults to `<evfile stem>_<product>.json`
    #[clap(long)]
    outfile: Option<PathBuf>,

    #[command(subcommand)]
    product: ProductOptions,
}

#[derive(Debug, clap::Args)]
struct FitArgs {
    /// Binned MCUBE file
    file: PathBuf,

    /// Directory holding the `<irf-name>.json` calibration files
    #[clap(long, env = "XPOL_IRF", default_value = "irf")]
    irf_store: PathBuf,

    /// Write the per-slice results to this JSON file
    #[clap(long)]
    outfile: Option<PathBuf>,
}

fn fit_mcube(args: FitArgs) -> Result<()> {
    let binned = ProductFile::read(&args.file)?;
    let cube = binned.modulation_cube()?;
    let modf = IrfStore::new(&args.irf_store)
        .load_modulation_factor(&binned.header.irf_name)
        .with_context(|| format!("loading modulation factor for {}", binned.header.irf_name))?;
    let slices = cube.analyze(&modf)?;
    if let Some(outfile) = args.outfile {
        let mut writer = BufWriter::new(
            File::create(&outfile).with_context(|| format!("creating {}", outfile.display()))?,
        );
        serde_json::to_writer_pretty(&mut writer, &slices)?;
        writer.flush()?;
        info!("Polarization of {} slices written to {}", slices.len(), outfile.display());
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let _tracer = init_tracer!(TracerOptions {
        default_level: LevelFilter::INFO,
        ansi: !cli.no_ansi,
    });

    match cli.command {
        Command::Bin(args) => {
            let outfile = BinningEngine::new(JsonEventFile).run(BinningRequest {
                evfile: args.evfile,
                outfile: args.outfile,
                product: args.product,
            })?;
            info!("Done, binned data written to {}", outfile.display());
        }
        Command::FitMcube(args) => fit_mcube(args)?,
    }
    Ok(())
}
