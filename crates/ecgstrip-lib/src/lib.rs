pub mod config;
pub mod detectors;
pub mod error;
pub mod filter;
pub mod io;
pub mod metrics;
pub mod pipeline;
pub mod signal;

pub use config::AnalysisConfig;
pub use error::{AnalysisError, Result};
pub use pipeline::{analyze_file, analyze_rows, Analysis, MetricsRecord};
pub use signal::*;
