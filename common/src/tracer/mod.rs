mod tracer_engine;

pub use tracer_engine::{TracerEngine, TracerOptions};

/// Should be called at the start of each binary.
/// Initialises the stdout subscriber and logs the name of the component
/// together with the level filter in force.
#[macro_export]
macro_rules! init_tracer {
    ($options:expr) => {{
        let tracer = $crate::tracer::TracerEngine::new($options, env!("CARGO_BIN_NAME"));
        tracing::info!(
            "{} {} started, log filter: {}",
            tracer.service_name(),
            env!("CARGO_PKG_VERSION"),
            tracer.filter()
        );
        tracer
    }};
}
