pub mod event_file;
pub mod event_list;
pub mod gti;
pub mod interpolation;
pub mod irf;
pub mod projection;
pub mod tracer;

pub use event_file::{EventFile, EventFileError, EventFileFormat, EventFileHeader, JsonEventFile};
pub use event_list::{ColumnData, EventColumn, EventList, EventListError};
pub use gti::{GoodTimeInterval, GtiList};

/// Time in seconds, mission elapsed.
pub type Time = f64;
/// Energy in keV.
pub type Energy = f64;
/// Right ascension or declination in decimal degrees.
pub type Degrees = f64;
/// Angle in radians.
pub type Radians = f64;
/// Detector-native energy channel.
pub type Channel = i64;
/// Identifier of a source component within a ROI model.
pub type SourceId = i64;

/// Returns `n` evenly spaced values over `[start, stop]`, endpoints included.
pub fn linspace(start: f64, stop: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (n - 1) as f64;
            (0..n)
                .map(|i| if i == n - 1 { stop } else { start + step * i as f64 })
                .collect()
        }
    }
}
