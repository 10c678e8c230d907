use crate::models::TraceEvent;
use crate::output::detail::detail_path;
use crate::utils::constants::{DEFAULT_HIST_BINS, DEFAULT_HIST_BIN_WIDTH};
use std::any::Any;
use std::path::PathBuf;

/// A statistical accumulator fed with the events of one window.
///
/// `feed` never fails: events that do not fit the plugin's model (a
/// completion without a dispatch, an unplug without a plug) are ignored.
pub trait AnalysisPlugin: Send + Any {
    fn feed(&mut self, event: &TraceEvent);

    /// Folds `other` into `self`. `other` is always the same concrete plugin.
    fn merge(&mut self, other: &dyn AnalysisPlugin);

    /// Commits work left pending at the end of a window and flushes files.
    fn close(&mut self) {}

    fn report(&self, ctx: &ReportContext) -> Vec<String>;

    fn as_any(&self) -> &dyn Any;
}

/// Downcasts `other` to the concrete type of the plugin merging it.
pub(crate) fn same_kind<T: AnalysisPlugin>(other: &dyn AnalysisPlugin) -> Option<&T> {
    other.as_any().downcast_ref::<T>()
}

/// Aggregates some plugins need from their siblings when reporting.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ReportContext {
    /// Completed requests (from the request size accumulator).
    pub total_requests: u64,
    /// Completed 512-byte blocks (from the request size accumulator).
    pub total_blocks: u64,
}

/// Per-window construction arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct PluginArgs {
    pub d2c_detail: Option<String>,
    pub i2c_oio: Option<String>,
    pub i2c_oio_hist: Option<String>,
    pub hist_bin_width: u64,
    pub hist_bins: usize,
    /// Device and window end the plugins are built for, used in file names.
    pub device: Option<String>,
    pub window_end: Option<u64>,
}

impl Default for PluginArgs {
    fn default() -> Self {
        Self {
            d2c_detail: None,
            i2c_oio: None,
            i2c_oio_hist: None,
            hist_bin_width: DEFAULT_HIST_BIN_WIDTH,
            hist_bins: DEFAULT_HIST_BINS,
            device: None,
            window_end: None,
        }
    }
}

impl PluginArgs {
    pub fn for_window(&self, device: &str, window_end: u64) -> Self {
        Self {
            device: Some(device.to_string()),
            window_end: Some(window_end),
            ..self.clone()
        }
    }

    /// Data file `suffix` of this window under `prefix`.
    pub fn detail_path(&self, prefix: &str, suffix: &str) -> PathBuf {
        detail_path(prefix, self.device.as_deref(), suffix, self.window_end)
    }

    /// Arguments for the global aggregate, which never writes data files.
    pub fn aggregate(&self) -> Self {
        Self {
            d2c_detail: None,
            i2c_oio: None,
            i2c_oio_hist: None,
            device: None,
            window_end: None,
            ..self.clone()
        }
    }
}
