//! Persisted photon lists: a header, the good time intervals and the events.

use crate::{Degrees, EventColumn, EventList, EventListError, GtiList};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum EventFileError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Malformed event file {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Event list: {0}")]
    EventList(#[from] EventListError),
}

/// Descriptive metadata carried alongside the events.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct EventFileHeader {
    pub creator: String,
    pub date: DateTime<Utc>,
    /// Name of the response set used to generate or calibrate the events.
    pub irf_name: String,
    /// Number of detector energy channels.
    pub detchans: usize,
    pub roi_ra: Degrees,
    pub roi_dec: Degrees,
    /// One-line description of each source component.
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default)]
    pub seed: Option<u64>,
}

impl EventFileHeader {
    pub fn new(
        creator: &str,
        irf_name: &str,
        detchans: usize,
        roi_ra: Degrees,
        roi_dec: Degrees,
    ) -> Self {
        Self {
            creator: creator.to_owned(),
            date: Utc::now(),
            irf_name: irf_name.to_owned(),
            detchans,
            roi_ra,
            roi_dec,
            sources: Vec::new(),
            seed: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct EventFile {
    pub header: EventFileHeader,
    pub gti: GtiList,
    pub events: EventList,
}

impl EventFile {
    pub fn new(header: EventFileHeader, gti: GtiList, events: EventList) -> Self {
        Self { header, gti, events }
    }

    pub fn num_events(&self) -> usize {
        self.events.len()
    }

    pub fn float_column(&self, column: EventColumn) -> Result<&[f64], EventFileError> {
        Ok(self.events.float_column(column)?)
    }

    pub fn int_column(&self, column: EventColumn) -> Result<&[i64], EventFileError> {
        Ok(self.events.int_column(column)?)
    }
}

/// On-disk representation of an [EventFile].
pub trait EventFileFormat {
    fn write(&self, file: &EventFile, path: &Path) -> Result<(), EventFileError>;
    fn read(&self, path: &Path) -> Result<EventFile, EventFileError>;
}

/// Pretty-printed JSON document.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonEventFile;

impl EventFileFormat for JsonEventFile {
    fn write(&self, file: &EventFile, path: &Path) -> Result<(), EventFileError> {
        info!("Writing {} events to {}", file.num_events(), path.display());
        let io_error = |source| EventFileError::Io {
            path: path.to_owned(),
            source,
        };
        let mut writer = BufWriter::new(File::create(path).map_err(io_error)?);
        serde_json::to_writer_pretty(&mut writer, file).map_err(|source| EventFileError::Json {
            path: path.to_owned(),
            source,
        })?;
        writer.flush().map_err(io_error)?;
        debug!("Done writing {}", path.display());
        Ok(())
    }

    fn read(&self, path: &Path) -> Result<EventFile, EventFileError> {
        info!("Reading events from {}", path.display());
        let file = File::open(path).map_err(|source| EventFileError::Io {
            path: path.to_owned(),
            source,
        })?;
        let file: EventFile =
            serde_json::from_reader(BufReader::new(file)).map_err(|source| EventFileError::Json {
                path: path.to_owned(),
                source,
            })?;
        debug!("Read {} events", file.num_events());
        Ok(file)
    }
}
