use crate::fit::FitError;
use std::path::PathBuf;
use thiserror::Error;
use xpol_common::{EventFileError, irf::IrfError, projection::ProjectionError};

#[derive(Debug, Error)]
pub enum BinningError {
    #[error("Unsupported value {name} for {option}")]
    UnsupportedAlgorithm { option: &'static str, name: String },
    #[error("Option {option} is required: {reason}")]
    MissingOption {
        option: &'static str,
        reason: &'static str,
    },
    #[error("Invalid value for {option}: {reason}")]
    InvalidOption { option: &'static str, reason: String },
    #[error("No events selected for {0}")]
    EmptySelection(&'static str),
    #[error("Cannot read bin edges from {path}: {source}")]
    EdgesFile {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid bin edge {token:?} in {path}")]
    EdgesParse { path: PathBuf, token: String },
    #[error("Invalid bin edges: {0}")]
    InvalidEdges(String),
    #[error("Modulation cube column {column} has {len} entries for {slices} slices")]
    InconsistentCube {
        column: &'static str,
        len: usize,
        slices: usize,
    },
    #[error("Event file has no exposure")]
    ZeroExposure,
    #[error("Expected a {expected} product, found {found}")]
    WrongProduct {
        expected: &'static str,
        found: String,
    },
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Malformed binned file {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Event file: {0}")]
    EventFile(#[from] EventFileError),
    #[error("Projection: {0}")]
    Projection(#[from] ProjectionError),
    #[error("Response function: {0}")]
    Irf(#[from] IrfError),
    #[error("Fit: {0}")]
    Fit(#[from] FitError),
}
