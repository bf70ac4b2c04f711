//! Statechart Engine
//!
//! Hierarchical state charts (Harel statecharts) for device proxies.
//!
//! This library provides functionality for:
//! - Resolving names and forward references across a declared node tree
//! - Declaring nested states with triggers, aliases, monitors and `recall(..)` history
//! - Running charts with inherited actions and per-runtime history
//! - Driving a chart from an async task on behalf of a named service
//! - Loading charts from TOML/JSON and exporting them to Graphviz or JSON
//!
//! ```
//! use statechart_engine::chart::{ChartRuntime, StateChart, on};
//! use statechart_engine::state;
//! use std::sync::Arc;
//!
//! let chart = StateChart::new(
//!     "SWITCH -> OFF",
//!     [
//!         state!("OFF", on("flip").goto("ON")).unwrap(),
//!         state!("ON", on("flip").goto("OFF")).unwrap(),
//!     ],
//! )
//! .unwrap();
//! let mut runtime = ChartRuntime::start(Arc::new(chart)).unwrap();
//! runtime.dispatch("flip").unwrap();
//! assert_eq!(runtime.current_name(), "ON");
//! ```

pub mod chart;
pub mod cli;
pub mod config;
pub mod error;
pub mod name_graph;
pub mod proxy;

pub use chart::{ChartRuntime, StateChart, StateDecl};
pub use config::Config;
pub use error::{Error, Result};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Initialize logging with the given log level, optionally mirrored to a file.
///
/// Logs go to stderr so command output on stdout stays machine-readable.
pub fn init_logging(level: &str, file: Option<&std::path::Path>) -> Result<()> {
    use std::sync::Arc;
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let file_layer = match file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            Some(fmt::layer().with_ansi(false).with_writer(Arc::new(file)))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
        assert_eq!(NAME, "statechart-engine");
    }
}
