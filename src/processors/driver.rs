//! Windowed analysis of one or more devices.
//!
//! Every window of a device owns a [`PluginSet`]. Events are pulled in time
//! order; an event at or past a window's end closes it, an event inside a
//! window is fed to its plugins, anything else is skipped. Windows still open
//! at the end of the input are closed with whatever they saw.

use crate::error::TraceError;
use crate::models::{DeviceRanges, ReaderVariant, TimeWindow};
use crate::parsers::ata_piix::TraceReader;
use crate::parsers::blktrace::{ByteOrderProbe, TraceCodec};
use crate::parsers::stream::StreamMerger;
use crate::processors::plugin::PluginArgs;
use crate::processors::registry::PluginSet;
use crate::{log_debug, log_error};
use rayon::prelude::*;
use std::collections::VecDeque;

/// A window whose plugins will not see any more events.
pub struct ClosedWindow {
    pub device: String,
    pub window: TimeWindow,
    pub plugins: PluginSet,
}

/// Feeds the events of `merger` into one plugin set per window.
///
/// `windows` must be sorted and disjoint. `on_close` is called once per
/// window, in window order, after the window's plugins were closed.
pub fn analyze_stream<F>(
    device: &str,
    windows: &[TimeWindow],
    reader: &mut TraceReader,
    merger: &mut StreamMerger,
    args: &PluginArgs,
    mut on_close: F,
) -> Result<(), TraceError>
where
    F: FnMut(ClosedWindow) -> Result<(), TraceError>,
{
    let mut active = windows
        .iter()
        .map(|w| Ok((*w, PluginSet::new(&args.for_window(device, w.end))?)))
        .collect::<Result<VecDeque<_>, TraceError>>()?;

    let mut close = |window: TimeWindow, mut plugins: PluginSet| {
        log_debug!("{}: closing {}", device, window.heading(device));
        plugins.close();
        on_close(ClosedWindow {
            device: device.to_string(),
            window,
            plugins,
        })
    };

    let mut fed = 0u64;
    let mut skipped = 0u64;

    while !active.is_empty() {
        let Some(event) = reader.read_next(merger)? else {
            break;
        };

        while active.front().is_some_and(|(w, _)| w.is_past(event.time)) {
            if let Some((window, plugins)) = active.pop_front() {
                close(window, plugins)?;
            }
        }

        match active.iter_mut().find(|(w, _)| w.contains(event.time)) {
            Some((_, plugins)) => {
                plugins.feed(&event);
                fed += 1;
            }
            None => skipped += 1,
        }
    }

    // end of input, report what was seen
    while let Some((window, plugins)) = active.pop_front() {
        close(window, plugins)?;
    }

    log_debug!("{}: {} events analysed, {} outside any window", device, fed, skipped);
    Ok(())
}

/// Opens the traces of `device` and analyses them over `windows`.
pub fn analyze_device<F>(
    device: &str,
    windows: &[TimeWindow],
    variant: ReaderVariant,
    codec: TraceCodec,
    args: &PluginArgs,
    on_close: F,
) -> Result<(), TraceError>
where
    F: FnMut(ClosedWindow) -> Result<(), TraceError>,
{
    let mut merger = StreamMerger::open(device, codec)?;
    let mut reader = TraceReader::new(variant);
    analyze_stream(device, windows, &mut reader, &mut merger, args, on_close)
}

/// Everything a run needs, validated before any trace is opened.
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    pub ranges: DeviceRanges,
    /// Fold every window into one global aggregate.
    pub total: bool,
    pub reader: ReaderVariant,
    pub plugin_args: PluginArgs,
    /// Devices analysed at once; 0 means one per CPU.
    pub jobs: usize,
}

impl AnalysisConfig {
    pub fn new(ranges: DeviceRanges) -> Self {
        Self {
            ranges,
            total: false,
            reader: ReaderVariant::Default,
            plugin_args: PluginArgs::default(),
            jobs: 1,
        }
    }

    pub fn effective_jobs(&self) -> usize {
        match self.jobs {
            0 => num_cpus::get(),
            n => n,
        }
    }
}

/// Runs the whole analysis.
///
/// Closed windows are handed to `sink` in device order, then window order,
/// whatever the number of jobs. Returns the aggregate when `config.total` is set.
pub fn run_analysis<S>(config: &AnalysisConfig, mut sink: S) -> Result<Option<PluginSet>, TraceError>
where
    S: FnMut(&ClosedWindow),
{
    let probe = ByteOrderProbe::new();
    let mut total = if config.total {
        Some(PluginSet::new(&config.plugin_args.aggregate())?)
    } else {
        None
    };

    let mut deliver = |closed: ClosedWindow| -> Result<(), TraceError> {
        sink(&closed);
        if let Some(total) = total.as_mut() {
            total.merge(&closed.plugins);
        }
        Ok(())
    };

    let jobs = config.effective_jobs().min(config.ranges.len()).max(1);
    if jobs == 1 {
        for (device, windows) in config.ranges.iter() {
            analyze_device(
                device,
                windows,
                config.reader,
                TraceCodec::new(probe.clone()),
                &config.plugin_args,
                &mut deliver,
            )?;
        }
    } else {
        log_debug!("analysing {} devices on {} threads", config.ranges.len(), jobs);
        let pool = rayon::ThreadPoolBuilder::new().num_threads(jobs).build()?;

        let per_device: Vec<Result<Vec<ClosedWindow>, TraceError>> = pool.install(|| {
            config
                .ranges
                .par_iter()
                .map(|(device, windows)| {
                    let mut closed = Vec::with_capacity(windows.len());
                    analyze_device(
                        device,
                        windows,
                        config.reader,
                        TraceCodec::new(probe.clone()),
                        &config.plugin_args,
                        |w| {
                            closed.push(w);
                            Ok(())
                        },
                    )?;
                    Ok(closed)
                })
                .collect()
        });

        for (result, device) in per_device.into_iter().zip(config.ranges.keys()) {
            let closed = result.inspect_err(|e| log_error!("{}: {}", device, e))?;
            for window in closed {
                deliver(window)?;
            }
        }
    }

    Ok(total.map(|mut set| {
        set.close();
        set
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Direction, EventKind, TraceEvent};
    use crate::parsers::blktrace::{encode_record, ByteOrder};
    use crate::parsers::stream::TraceStream;
    use crate::processors::d2c::D2C;
    use crate::processors::reqsize::RequestSize;
    use crate::processors::registry::REQUEST_SIZE_INDEX;
    use std::io::Cursor;
    use std::path::{Path, PathBuf};

    const S: u64 = 1_000_000_000;

    fn ev(kind: EventKind, time: u64, sector: u64) -> TraceEvent {
        TraceEvent::of_kind(kind, Direction::Read, time, sector, 4096)
    }

    fn merger_of(events: &[TraceEvent]) -> StreamMerger {
        let bytes: Vec<u8> = events
            .iter()
            .flat_map(|e| encode_record(e, ByteOrder::Native).unwrap())
            .collect();
        let stream = TraceStream::new(PathBuf::from("cpu0"), Box::new(Cursor::new(bytes)));
        StreamMerger::from_streams("dev", vec![stream], TraceCodec::default()).unwrap()
    }

    fn run(events: &[TraceEvent], windows: &[TimeWindow]) -> Vec<ClosedWindow> {
        let mut merger = merger_of(events);
        let mut reader = TraceReader::new(ReaderVariant::Default);
        let mut out = Vec::new();
        analyze_stream(
            "dev",
            windows,
            &mut reader,
            &mut merger,
            &PluginArgs::default(),
            |w| {
                out.push(w);
                Ok(())
            },
        )
        .unwrap();
        out
    }

    fn requests(closed: &ClosedWindow) -> u64 {
        closed
            .plugins
            .get::<RequestSize>(REQUEST_SIZE_INDEX)
            .unwrap()
            .combined()
            .count
    }

    #[test]
    fn test_single_unbounded_window() {
        let closed = run(
            &[
                ev(EventKind::Queue, 0, 100),
                ev(EventKind::Issue, 1, 100),
                ev(EventKind::Complete, 5, 100),
            ],
            &[TimeWindow::everything()],
        );

        assert_eq!(closed.len(), 1);
        assert_eq!(requests(&closed[0]), 1);
        assert_eq!(closed[0].plugins.get::<D2C>(4).unwrap().busy().totals().busy_time, 4);

        let reports = closed[0].plugins.report();
        assert!(reports[0].lines[0].contains("min: 8 avg: 8.000000 max: 8"));
        assert_eq!(reports[1].lines, vec!["No seeks"]);
    }

    #[test]
    fn test_window_boundaries_are_half_open() {
        // rebased to 0, 1s, 2s, 3s
        let events: Vec<TraceEvent> = (0..4).map(|i| ev(EventKind::Complete, 10 + i * S, i)).collect();
        let closed = run(
            &events,
            &[TimeWindow::new(0, S), TimeWindow::new(S, 3 * S)],
        );

        assert_eq!(closed.len(), 2);
        assert_eq!(requests(&closed[0]), 1);
        assert_eq!(requests(&closed[1]), 2);
    }

    #[test]
    fn test_gaps_and_empty_windows() {
        let events: Vec<TraceEvent> = (0..6).map(|i| ev(EventKind::Complete, i * S, i)).collect();
        let windows = [
            TimeWindow::new(S, S + 1),
            TimeWindow::new(S + 2, S + 3),
            TimeWindow::new(4 * S, u64::MAX),
        ];
        let closed = run(&events, &windows);

        // one event closes two windows in a row
        assert_eq!(closed.len(), 3);
        assert_eq!(closed.iter().map(requests).collect::<Vec<_>>(), vec![1, 0, 2]);
        assert_eq!(closed.iter().map(|c| c.window).collect::<Vec<_>>(), windows.to_vec());
    }

    #[test]
    fn test_window_force_closed_at_end_of_input() {
        let closed = run(
            &[ev(EventKind::Issue, 0, 1), ev(EventKind::Complete, 3, 1), ev(EventKind::Issue, 4, 2)],
            &[TimeWindow::new(0, 100 * S), TimeWindow::new(200 * S, 300 * S)],
        );
        assert_eq!(closed.len(), 2);
        assert_eq!(requests(&closed[0]), 1);
        assert_eq!(requests(&closed[1]), 0);
    }

    #[test]
    fn test_windows_are_disjoint() {
        let events: Vec<TraceEvent> = (0..100).map(|i| ev(EventKind::Complete, i * 1000, i)).collect();
        let windows: Vec<TimeWindow> = (0..10)
            .map(|i| TimeWindow::new(i * 10_000, (i + 1) * 10_000))
            .collect();
        let closed = run(&events, &windows);
        assert_eq!(closed.iter().map(requests).sum::<u64>(), 100);
        assert!(closed.iter().all(|c| requests(c) == 10));
    }

    fn write_device(dir: &Path, name: &str, events: &[TraceEvent]) -> String {
        let bytes: Vec<u8> = events
            .iter()
            .flat_map(|e| encode_record(e, ByteOrder::Native).unwrap())
            .collect();
        std::fs::write(dir.join(format!("{name}.blktrace.0")), bytes).unwrap();
        dir.join(name).to_string_lossy().into_owned()
    }

    fn config_for(dir: &Path) -> AnalysisConfig {
        let sda = write_device(
            dir,
            "sda",
            &[ev(EventKind::Issue, 100, 8), ev(EventKind::Complete, 110, 8)],
        );
        let sdb = write_device(
            dir,
            "sdb",
            &[
                ev(EventKind::Issue, 0, 8),
                ev(EventKind::Complete, 30, 8),
                ev(EventKind::Issue, 40, 16),
                ev(EventKind::Complete, 45, 16),
            ],
        );

        let mut ranges = DeviceRanges::new();
        ranges.insert(sda, vec![TimeWindow::everything()]);
        ranges.insert(sdb, vec![TimeWindow::new(0, 35), TimeWindow::new(35, u64::MAX)]);

        let mut config = AnalysisConfig::new(ranges);
        config.total = true;
        config
    }

    #[test]
    fn test_run_with_total() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_for(dir.path());

        let mut headings = Vec::new();
        let total = run_analysis(&config, |c| headings.push(c.window.heading("x")))
            .unwrap()
            .unwrap();

        assert_eq!(headings.len(), 3);
        assert_eq!(total.context().total_requests, 3);
        assert_eq!(total.get::<D2C>(4).unwrap().busy().totals().busy_time, 10 + 30 + 5);
    }

    #[test]
    fn test_parallel_run_matches_sequential() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_for(dir.path());

        let collect = |config: &AnalysisConfig| {
            let mut reports = Vec::new();
            let total = run_analysis(config, |c| {
                reports.push((c.device.clone(), c.window, c.plugins.report()))
            })
            .unwrap()
            .unwrap();
            (reports, total.report())
        };

        let sequential = collect(&config);
        config.jobs = 2;
        let parallel = collect(&config);
        assert_eq!(sequential, parallel);
    }

    #[test]
    fn test_detail_files_are_per_device() {
        let dir = tempfile::tempdir().unwrap();
        let mut ranges = DeviceRanges::new();
        for name in ["sda", "sdb"] {
            let device = write_device(
                dir.path(),
                name,
                &[ev(EventKind::Issue, 0, 8), ev(EventKind::Complete, 10, 8)],
            );
            ranges.insert(device, vec![TimeWindow::everything()]);
        }

        let prefix = dir.path().join("run").to_string_lossy().into_owned();
        let mut config = AnalysisConfig::new(ranges);
        config.plugin_args.d2c_detail = Some(prefix.clone());
        config.jobs = 2;
        run_analysis(&config, |_| {}).unwrap();

        for name in ["sda", "sdb"] {
            let text =
                std::fs::read_to_string(format!("{prefix}_{name}_d2c_{}.dat", u64::MAX)).unwrap();
            assert_eq!(text, "0.000000010 8 8 0.000000010\n");
        }
    }

    #[test]
    fn test_missing_device_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let mut ranges = DeviceRanges::new();
        ranges.insert(
            dir.path().join("nope").to_string_lossy().into_owned(),
            vec![TimeWindow::everything()],
        );
        let err = run_analysis(&AnalysisConfig::new(ranges), |_| {}).err().unwrap();
        assert!(matches!(err, TraceError::NoTracesFound(_)));
    }
}
