use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt};

pub struct TracerOptions {
    /// Level used when `RUST_LOG` is not set.
    pub default_level: LevelFilter,
    /// Emit ANSI colour codes on stdout.
    pub ansi: bool,
}

impl Default for TracerOptions {
    fn default() -> Self {
        Self {
            default_level: LevelFilter::INFO,
            ansi: true,
        }
    }
}

/// This object initialises the global subscriber, given a TracerOptions struct.
pub struct TracerEngine {
    service_name: String,
    filter: String,
}

impl TracerEngine {
    /// Initialises the stdout tracer for the crate
    /// #Arguments
    /// * `options` - The caller-specified instance of TracerOptions.
    /// * `service_name` - The name of the binary being traced.
    /// #Returns
    /// An instance of TracerEngine
    pub fn new(options: TracerOptions, service_name: &str) -> Self {
        let stdout_tracer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stdout)
            .with_ansi(options.ansi)
            .with_target(false);

        // This filter is applied to the stdout tracer
        let log_filter = EnvFilter::builder()
            .with_default_directive(options.default_level.into())
            .from_env_lossy();
        let filter = log_filter.to_string();

        let subscriber =
            tracing_subscriber::Registry::default().with(stdout_tracer.with_filter(log_filter));

        // A second initialisation (e.g. from a test harness) keeps the first subscriber.
        if tracing::subscriber::set_global_default(subscriber).is_err() {
            tracing::warn!("Global tracing subscriber already set for {service_name}");
        }

        Self {
            service_name: service_name.to_owned(),
            filter,
        }
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn filter(&self) -> &str {
        &self.filter
    }
}
