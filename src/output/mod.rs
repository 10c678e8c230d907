pub mod detail;
pub mod report;

pub use detail::{detail_path, DetailWriter};
pub use report::{save_summary_json, Summary, WindowReport};
