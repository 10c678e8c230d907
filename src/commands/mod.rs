pub mod analyze;

pub use analyze::{handle_analyze, AnalyzeArgs};
