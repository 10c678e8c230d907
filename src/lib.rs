pub mod commands;
pub mod error;
pub mod models;
pub mod output;
pub mod parsers;
pub mod processors;
pub mod utils;

// main re-exports
pub use error::{ConfigError, DecodeError, TraceError};
pub use models::{EventKind, ReaderVariant, TimeWindow, TraceEvent};
pub use parsers::{StreamMerger, TraceCodec};
pub use processors::{run_analysis, AnalysisConfig, AnalysisPlugin, PluginSet};
