pub mod busy;
pub mod c2d;
pub mod d2c;
pub mod driver;
pub mod i2c;
pub mod merge;
pub mod plug;
pub mod plugin;
pub mod q2c;
pub mod registry;
pub mod reqsize;
pub mod seek;
pub mod stats;

pub use driver::{analyze_device, analyze_stream, run_analysis, AnalysisConfig, ClosedWindow};
pub use plugin::{AnalysisPlugin, PluginArgs, ReportContext};
pub use registry::{PluginDescriptor, PluginRegistry, PluginReport, PluginSet, PLUGINS, REGISTRY};
