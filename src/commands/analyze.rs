use crate::models::ReaderVariant;
use crate::output::{save_summary_json, Summary, WindowReport};
use crate::parsers::{parse_range_file, parse_range_specs};
use crate::processors::{run_analysis, AnalysisConfig, PluginArgs};
use crate::utils::constants::{DEFAULT_HIST_BINS, DEFAULT_HIST_BIN_WIDTH};
use crate::utils::Logger;
use crate::{log, log_debug};
use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Instant;

/// Per-window block I/O statistics from blktrace captures.
#[derive(Parser, Debug, Clone)]
#[command(name = "btstats", version)]
pub struct AnalyzeArgs {
    /// Device and time ranges: `dev[@start[:end]]`, comma separated, seconds
    #[arg(value_name = "TRACE", required_unless_present = "range_file")]
    pub traces: Vec<String>,

    /// Range file with `@device` sections and one end time per line
    #[arg(short = 'f', long, value_name = "FILE", conflicts_with = "traces")]
    pub range_file: Option<PathBuf>,

    /// Also report the aggregate of every window
    #[arg(short = 't', long)]
    pub total: bool,

    /// Write D2C detail files `<PREFIX>_<dev>_d2c_<end>.dat`
    #[arg(short = 'd', long, value_name = "PREFIX")]
    pub d2c_detail: Option<String>,

    /// Trace reader: 0 default, 1 ata_piix
    #[arg(short = 'r', long, value_name = "VARIANT", default_value = "0")]
    pub reader: ReaderVariant,

    /// Write outstanding I/O files `<PREFIX>_<dev>_i2c_oio_<end>.dat`
    #[arg(short = 'i', long, value_name = "PREFIX")]
    pub i2c_oio: Option<String>,

    /// Write outstanding I/O histograms `<PREFIX>_<dev>_i2c_oio_hist_<end>.dat`
    #[arg(short = 's', long, value_name = "PREFIX")]
    pub i2c_oio_hist: Option<String>,

    /// Width of the I2C size histogram bins, in blocks
    #[arg(long, default_value_t = DEFAULT_HIST_BIN_WIDTH)]
    pub hist_bin_width: u64,

    /// Number of I2C size histogram bins
    #[arg(long, default_value_t = DEFAULT_HIST_BINS)]
    pub hist_bins: usize,

    /// Devices analysed in parallel (0 = one per CPU)
    #[arg(short = 'j', long, default_value_t = 1)]
    pub jobs: usize,

    /// Save every report as JSON
    #[arg(long, value_name = "PATH")]
    pub json: Option<PathBuf>,

    /// Also write the output to a log file
    #[arg(long, value_name = "PATH")]
    pub log: Option<PathBuf>,

    /// Print discovery and window diagnostics
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

impl AnalyzeArgs {
    /// Validated analysis configuration. Fails before any trace is opened.
    pub fn to_config(&self) -> Result<AnalysisConfig> {
        let ranges = match self.range_file.as_ref() {
            Some(path) => parse_range_file(path)
                .with_context(|| format!("reading range file '{}'", path.display()))?,
            None => parse_range_specs(self.traces.as_slice()).context("parsing trace selection")?,
        };

        Ok(AnalysisConfig {
            ranges,
            total: self.total,
            reader: self.reader,
            plugin_args: PluginArgs {
                d2c_detail: self.d2c_detail.clone(),
                i2c_oio: self.i2c_oio.clone(),
                i2c_oio_hist: self.i2c_oio_hist.clone(),
                hist_bin_width: self.hist_bin_width,
                hist_bins: self.hist_bins,
                device: None,
                window_end: None,
            },
            jobs: self.jobs,
        })
    }
}

pub fn handle_analyze(args: &AnalyzeArgs) -> Result<()> {
    if let Some(path) = args.log.as_ref() {
        Logger::init(path);
    }
    Logger::set_verbose(args.verbose);

    let config = args.to_config()?;
    log_debug!(
        "{} device(s), reader {}, {} job(s)",
        config.ranges.len(),
        config.reader.display_name(),
        config.effective_jobs()
    );

    let started = Instant::now();
    let mut summary = args.json.as_ref().map(|_| Summary::new());

    let total = run_analysis(&config, |closed| {
        let report = WindowReport::for_window(&closed.device, &closed.window, &closed.plugins);
        log!("{}", report.render());
        if let Some(summary) = summary.as_mut() {
            summary.windows.push(report);
        }
    })?;

    if let Some(total) = total {
        let report = WindowReport::aggregate(&total);
        log!("{}", report.render());
        if let Some(summary) = summary.as_mut() {
            summary.total = Some(report);
        }
    }

    if let (Some(summary), Some(path)) = (summary.as_ref(), args.json.as_ref()) {
        save_summary_json(summary, path)
            .with_context(|| format!("writing summary '{}'", path.display()))?;
        log_debug!("summary saved to {}", path.display());
    }

    log_debug!("analysis took {:.3}s", started.elapsed().as_secs_f64());
    Logger::flush().context("flushing log file")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TimeWindow;

    #[test]
    fn test_parse_flags() {
        let args = AnalyzeArgs::try_parse_from([
            "btstats", "-t", "-r", "1", "-d", "out", "-j", "0", "sda@0:1,sdb",
        ])
        .unwrap();
        assert!(args.total);
        assert_eq!(args.reader, ReaderVariant::AtaPiix);
        assert_eq!(args.jobs, 0);

        let config = args.to_config().unwrap();
        assert_eq!(config.ranges.len(), 2);
        assert_eq!(config.ranges["sda"], vec![TimeWindow::new(0, 1_000_000_000)]);
        assert_eq!(config.plugin_args.d2c_detail.as_deref(), Some("out"));
        assert_eq!(config.plugin_args.hist_bins, DEFAULT_HIST_BINS);
    }

    #[test]
    fn test_traces_or_range_file_required() {
        assert!(AnalyzeArgs::try_parse_from(["btstats"]).is_err());
        assert!(AnalyzeArgs::try_parse_from(["btstats", "-f", "ranges", "sda"]).is_err());
        assert!(AnalyzeArgs::try_parse_from(["btstats", "-f", "ranges"]).is_ok());
        assert!(AnalyzeArgs::try_parse_from(["btstats", "-r", "7", "sda"]).is_err());
    }

    #[test]
    fn test_bad_selection_fails_before_analysis() {
        let args = AnalyzeArgs::try_parse_from(["btstats", "sda@3:1"]).unwrap();
        assert!(args.to_config().is_err());
    }
}
