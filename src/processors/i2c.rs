use crate::error::TraceError;
use crate::models::{Direction, EventKind, TraceEvent};
use crate::output::detail::{format_secs, DetailWriter};
use crate::processors::plugin::{same_kind, AnalysisPlugin, PluginArgs, ReportContext};
use crate::processors::stats::ratio;
use crate::utils::Histogram;
use std::any::Any;
use std::collections::HashSet;
use std::path::PathBuf;

pub const EVENTS: &[EventKind] = &[EventKind::Insert, EventKind::Complete];

pub const OIO_SUFFIX: &str = "i2c_oio";
pub const OIO_HIST_SUFFIX: &str = "i2c_oio_hist";

/// Insert-to-complete: how many requests are outstanding, and for how long.
pub struct I2C {
    pending: HashSet<u64>,
    outstanding: u32,
    max_outstanding: u32,

    first_transition: Option<u64>,
    last_transition: Option<u64>,
    // indexed by outstanding level
    level_time: Vec<u64>,
    // request sizes at insert, indexed by the level reached and direction
    level_sizes: Vec<[Histogram; 2]>,

    hist_bin_width: u64,
    hist_bins: usize,

    oio: Option<DetailWriter>,
    hist_path: Option<PathBuf>,
}

impl I2C {
    pub fn new(args: &PluginArgs) -> Result<Self, TraceError> {
        let oio = match args.i2c_oio.as_deref() {
            Some(prefix) => Some(DetailWriter::create(args.detail_path(prefix, OIO_SUFFIX))?),
            None => None,
        };
        let hist_path = args
            .i2c_oio_hist
            .as_deref()
            .map(|prefix| args.detail_path(prefix, OIO_HIST_SUFFIX));

        Ok(Self {
            pending: HashSet::new(),
            outstanding: 0,
            max_outstanding: 0,
            first_transition: None,
            last_transition: None,
            level_time: Vec::new(),
            level_sizes: Vec::new(),
            hist_bin_width: args.hist_bin_width,
            hist_bins: args.hist_bins,
            oio,
            hist_path,
        })
    }

    pub fn outstanding(&self) -> u32 {
        self.outstanding
    }

    pub fn max_outstanding(&self) -> u32 {
        self.max_outstanding
    }

    pub fn level_time(&self) -> &[u64] {
        &self.level_time
    }

    /// Time between the first and the last change of the outstanding count.
    pub fn observed_span(&self) -> u64 {
        match (self.first_transition, self.last_transition) {
            (Some(first), Some(last)) => last - first,
            _ => 0,
        }
    }

    pub fn level_sizes(&self, level: usize, direction: Direction) -> Option<&Histogram> {
        self.level_sizes.get(level).map(|h| &h[direction.index()])
    }

    fn level_slot(&mut self, level: usize) -> &mut u64 {
        if self.level_time.len() <= level {
            self.level_time.resize(level + 1, 0);
        }
        &mut self.level_time[level]
    }

    fn new_histogram(&self) -> Histogram {
        Histogram::new(self.hist_bin_width, self.hist_bins)
    }

    // Charges the time since the last transition to the level being left.
    fn transition(&mut self, time: u64) {
        match self.last_transition {
            Some(last) => {
                let level = self.outstanding as usize;
                *self.level_slot(level) += time.saturating_sub(last);
            }
            None => self.first_transition = Some(time),
        }
        self.last_transition = Some(time);
    }

    fn write_outstanding(&mut self, time: u64) {
        let outstanding = self.outstanding;
        if let Some(oio) = self.oio.as_mut() {
            oio.write_row([format_secs(time), outstanding.to_string()]);
        }
    }

    /// Share of observed time spent at each level, in percent.
    pub fn level_percentages(&self) -> Vec<f64> {
        let total: u64 = self.level_time.iter().sum();
        self.level_time
            .iter()
            .map(|t| 100.0 * ratio(*t as f64, total as f64))
            .collect()
    }

    /// Time-weighted mean outstanding count.
    pub fn average_outstanding(&self) -> f64 {
        let total: u64 = self.level_time.iter().sum();
        let weighted: f64 = self
            .level_time
            .iter()
            .enumerate()
            .map(|(level, t)| level as f64 * *t as f64)
            .sum();
        ratio(weighted, total as f64)
    }

    fn write_histograms(&self, path: PathBuf) -> Result<(), TraceError> {
        let mut out = DetailWriter::create(path)?;

        for (level, pct) in self.level_percentages().iter().enumerate() {
            out.write_row([level.to_string(), format!("{pct:.6}")]);
        }
        for (level, sizes) in self.level_sizes.iter().enumerate() {
            for direction in [Direction::Read, Direction::Write] {
                let hist = &sizes[direction.index()];
                if hist.total() == 0 {
                    continue;
                }
                for (start, count) in hist.bin_edges().zip(hist.counts()) {
                    out.write_row([
                        level.to_string(),
                        direction.code().to_string(),
                        start.to_string(),
                        count.to_string(),
                    ]);
                }
            }
        }
        out.flush();
        Ok(())
    }
}

impl AnalysisPlugin for I2C {
    fn feed(&mut self, event: &TraceEvent) {
        match event.kind() {
            EventKind::Insert => {
                if !self.pending.insert(event.sector) {
                    return;
                }
                self.transition(event.time);
                self.outstanding += 1;
                self.max_outstanding = self.max_outstanding.max(self.outstanding);

                let level = self.outstanding as usize;
                while self.level_sizes.len() <= level {
                    let slot = [self.new_histogram(), self.new_histogram()];
                    self.level_sizes.push(slot);
                }
                self.level_sizes[level][event.direction().index()].increment(event.blocks());

                self.write_outstanding(event.time);
            }
            EventKind::Complete => {
                if !self.pending.remove(&event.sector) {
                    return;
                }
                self.transition(event.time);
                self.outstanding = self.outstanding.saturating_sub(1);

                self.write_outstanding(event.time);
            }
            _ => {}
        }
    }

    fn merge(&mut self, other: &dyn AnalysisPlugin) {
        let Some(other) = same_kind::<Self>(other) else {
            return;
        };

        self.max_outstanding = self.max_outstanding.max(other.max_outstanding);
        for (level, t) in other.level_time.iter().enumerate() {
            *self.level_slot(level) += *t;
        }
        for (level, sizes) in other.level_sizes.iter().enumerate() {
            while self.level_sizes.len() <= level {
                let slot = [self.new_histogram(), self.new_histogram()];
                self.level_sizes.push(slot);
            }
            for direction in [Direction::Read, Direction::Write] {
                let idx = direction.index();
                self.level_sizes[level][idx].merge(&sizes[idx]);
            }
        }
    }

    fn close(&mut self) {
        if let Some(oio) = self.oio.as_mut() {
            oio.flush();
        }
        if let Some(path) = self.hist_path.take() {
            if let Err(e) = self.write_histograms(path) {
                crate::log_error!("I2C histogram not written: {}", e);
            }
        }
    }

    fn report(&self, _ctx: &ReportContext) -> Vec<String> {
        let mut lines = vec![format!("I2C max outstanding: {} (reqs)", self.max_outstanding)];
        if self.level_time.iter().all(|t| *t == 0) {
            return lines;
        }

        lines.push(format!("I2C avg outstanding: {:.6} (reqs)", self.average_outstanding()));
        let levels: Vec<String> = self
            .level_percentages()
            .iter()
            .enumerate()
            .map(|(level, pct)| format!("{level}:{pct:.2}"))
            .collect();
        lines.push(format!("I2C time per outstanding level (%): {}", levels.join(" ")));
        lines
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ev(kind: EventKind, dir: Direction, time: u64, sector: u64) -> TraceEvent {
        TraceEvent::of_kind(kind, dir, time, sector, 4096)
    }

    fn sample() -> Vec<TraceEvent> {
        vec![
            ev(EventKind::Insert, Direction::Read, 10, 1),
            ev(EventKind::Insert, Direction::Write, 20, 2),
            ev(EventKind::Insert, Direction::Write, 25, 2),
            ev(EventKind::Complete, Direction::Read, 50, 1),
            ev(EventKind::Complete, Direction::Read, 55, 99),
            ev(EventKind::Complete, Direction::Write, 60, 2),
            ev(EventKind::Insert, Direction::Read, 100, 3),
            ev(EventKind::Complete, Direction::Read, 130, 3),
        ]
    }

    fn fed(args: &PluginArgs) -> I2C {
        let mut p = I2C::new(args).unwrap();
        sample().iter().for_each(|e| p.feed(e));
        p
    }

    #[test]
    fn test_level_time_is_conserved() {
        let p = fed(&PluginArgs::default());
        assert_eq!(p.outstanding(), 0);
        assert_eq!(p.max_outstanding(), 2);
        // 0: 60..100, 1: 10..20 + 50..60 + 100..130, 2: 20..50
        assert_eq!(p.level_time(), &[40, 50, 30]);
        assert_eq!(p.level_time().iter().sum::<u64>(), p.observed_span());
        assert_eq!(p.observed_span(), 120);
    }

    #[test]
    fn test_sizes_per_level_and_direction() {
        let p = fed(&PluginArgs::default());
        assert_eq!(p.level_sizes(1, Direction::Read).unwrap().total(), 2);
        assert_eq!(p.level_sizes(2, Direction::Write).unwrap().total(), 1);
        assert_eq!(p.level_sizes(2, Direction::Read).unwrap().total(), 0);
        assert!(p.level_sizes(3, Direction::Read).is_none());
    }

    #[test]
    fn test_report() {
        let p = fed(&PluginArgs::default());
        let ctx = ReportContext::default();
        let lines = p.report(&ctx);
        assert_eq!(lines[0], "I2C max outstanding: 2 (reqs)");
        assert_eq!(lines[1], "I2C avg outstanding: 0.916667 (reqs)");
        assert_eq!(lines[2], "I2C time per outstanding level (%): 0:33.33 1:41.67 2:25.00");
        assert_eq!(lines, p.report(&ctx));

        let empty = I2C::new(&PluginArgs::default()).unwrap();
        assert_eq!(empty.report(&ctx), vec!["I2C max outstanding: 0 (reqs)"]);
    }

    #[test]
    fn test_merge() {
        let mut a = fed(&PluginArgs::default());
        let b = fed(&PluginArgs::default());
        a.merge(&b);
        assert_eq!(a.level_time(), &[80, 100, 60]);
        assert_eq!(a.max_outstanding(), 2);
        assert_eq!(a.level_sizes(1, Direction::Read).unwrap().total(), 4);
    }

    #[test]
    fn test_detail_files() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("run").to_string_lossy().into_owned();
        let args = PluginArgs {
            i2c_oio: Some(prefix.clone()),
            i2c_oio_hist: Some(prefix.clone()),
            hist_bin_width: 8,
            hist_bins: 2,
            ..Default::default()
        }
        .for_window("sdc", 500);

        let mut p = fed(&args);
        p.close();

        let oio = std::fs::read_to_string(format!("{prefix}_sdc_i2c_oio_500.dat")).unwrap();
        let lines: Vec<&str> = oio.lines().collect();
        assert_eq!(lines.len(), 6);
        assert_eq!(lines[0], "0.000000010 1");
        assert_eq!(lines[1], "0.000000020 2");
        assert_eq!(lines[5], "0.000000130 0");

        let hist = std::fs::read_to_string(format!("{prefix}_sdc_i2c_oio_hist_500.dat")).unwrap();
        let rows: Vec<&str> = hist.lines().collect();
        assert_eq!(rows[0], "0 33.333333");
        assert_eq!(rows[2], "2 25.000000");
        assert!(rows.contains(&"1 R 8 2"));
        assert!(rows.contains(&"2 W 8 1"));
    }
}
