use crate::models::TimeWindow;
use crate::processors::{PluginReport, PluginSet};
use crate::utils::constants::nanos_to_secs;
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

pub const AGGREGATE_HEADING: &str = "All";

/// Reports of every plugin for one closed window (or the aggregate).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindowReport {
    pub heading: String,
    pub device: Option<String>,
    pub start_secs: f64,
    /// `None` for an unbounded window and for the aggregate.
    pub end_secs: Option<f64>,
    pub plugins: Vec<PluginReport>,
}

impl WindowReport {
    pub fn for_window(device: &str, window: &TimeWindow, plugins: &PluginSet) -> Self {
        Self {
            heading: window.heading(device),
            device: Some(device.to_string()),
            start_secs: nanos_to_secs(window.start),
            end_secs: (!window.is_unbounded()).then(|| nanos_to_secs(window.end)),
            plugins: plugins.report(),
        }
    }

    pub fn aggregate(plugins: &PluginSet) -> Self {
        Self {
            heading: AGGREGATE_HEADING.to_string(),
            device: None,
            start_secs: 0.0,
            end_secs: None,
            plugins: plugins.report(),
        }
    }

    /// Heading, a rule under it, then every plugin line.
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(&self.heading);
        out.push('\n');
        out.push_str(&"=".repeat(self.heading.len().max(5)));
        out.push('\n');
        for line in self.plugins.iter().flat_map(|p| p.lines.iter()) {
            out.push_str(line);
            out.push('\n');
        }
        out
    }
}

/// Everything one run printed, for `--json`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Summary {
    pub generated_at: String,
    pub windows: Vec<WindowReport>,
    pub total: Option<WindowReport>,
}

impl Summary {
    pub fn new() -> Self {
        Self {
            generated_at: chrono::Local::now().to_rfc3339(),
            ..Default::default()
        }
    }
}

pub fn save_summary_json(summary: &Summary, path: &Path) -> std::io::Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, summary)?;
    writer.write_all(b"\n")?;
    writer.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processors::PluginArgs;

    #[test]
    fn test_render_window() {
        let set = PluginSet::new(&PluginArgs::default()).unwrap();
        let report = WindowReport::for_window("sda", &TimeWindow::new(0, 1_500_000_000), &set);
        assert_eq!(report.end_secs, Some(1.5));

        let text = report.render();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("sda[0.0000:1.5000]"));
        assert_eq!(lines.next(), Some("=================="));
        assert_eq!(lines.next(), Some("No requests"));
        assert!(text.contains("Not enough data for D2C stats"));
    }

    #[test]
    fn test_aggregate_heading() {
        let set = PluginSet::new(&PluginArgs::default()).unwrap();
        let text = WindowReport::aggregate(&set).render();
        assert!(text.starts_with("All\n=====\n"));
    }

    #[test]
    fn test_summary_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.json");
        let set = PluginSet::new(&PluginArgs::default()).unwrap();

        let mut summary = Summary::new();
        summary.windows.push(WindowReport::for_window("sdb", &TimeWindow::everything(), &set));
        summary.total = Some(WindowReport::aggregate(&set));
        save_summary_json(&summary, &path).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["windows"][0]["heading"], "sdb[0.0000:inf]");
        assert_eq!(value["windows"][0]["end_secs"], serde_json::Value::Null);
        assert_eq!(value["windows"][0]["plugins"][0]["name"], "reqsize");
        assert_eq!(value["total"]["heading"], "All");
    }
}
