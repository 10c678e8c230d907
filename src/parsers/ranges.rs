//! Device / time range selection.
//!
//! Command line form: `sda`, `sda@1.5`, `sda@1.5:3`, `sda@0:-1`, several
//! comma-separated per argument. Times are seconds relative to the device
//! genesis; a missing or `-1` end means unbounded.
//!
//! Range file form:
//!
//! ```text
//! # comment
//! @sda
//! 1.0      # [0, 1)
//! 2.5      # [1, 2.5)
//! -1       # [2.5, inf)
//! @sdb
//! 10
//! ```

use crate::error::ConfigError;
use crate::models::{DeviceRanges, TimeWindow};
use crate::utils::constants::secs_to_nanos;
use lazy_static::lazy_static;
use regex::Regex;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

lazy_static! {
    static ref RANGE_RE: Regex = Regex::new(
        r"^(?P<dev>[^@,\s]+)(?:@(?P<start>\d+(?:\.\d*)?)?(?::(?P<end>-1|\d+(?:\.\d*)?)?)?)?$"
    )
    .unwrap();
    static ref END_RE: Regex = Regex::new(r"^(?P<end>-1|\d+(?:\.\d*)?)$").unwrap();
}

const UNBOUNDED_SECS: f64 = -1.0;

/// Parses `device[@start[:end]]` selectors.
pub fn parse_range_specs<S: AsRef<str>>(specs: &[S]) -> Result<DeviceRanges, ConfigError> {
    let mut ranges = DeviceRanges::new();

    for spec in specs {
        for item in spec.as_ref().split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let caps = RANGE_RE
                .captures(item)
                .ok_or_else(|| ConfigError::BadRangeSpec(item.to_string()))?;

            let start = parse_secs(caps.name("start").map(|m| m.as_str()), 0.0)
                .ok_or_else(|| ConfigError::BadRangeSpec(item.to_string()))?;
            let end = parse_secs(caps.name("end").map(|m| m.as_str()), UNBOUNDED_SECS)
                .ok_or_else(|| ConfigError::BadRangeSpec(item.to_string()))?;

            let device = caps["dev"].to_string();
            let window = to_window(&device, start, end)?;
            ranges.entry(device).or_default().push(window);
        }
    }

    if ranges.is_empty() {
        return Err(ConfigError::BadRangeSpec(String::new()));
    }

    validate(&mut ranges)?;
    Ok(ranges)
}

/// Parses a range file (see module docs).
pub fn parse_range_file(path: &Path) -> Result<DeviceRanges, ConfigError> {
    let file = File::open(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_range_reader(BufReader::new(file)).map_err(|e| match e {
        ConfigError::Io { source, .. } => ConfigError::Io {
            path: path.to_path_buf(),
            source,
        },
        other => other,
    })
}

pub fn parse_range_reader<R: BufRead>(reader: R) -> Result<DeviceRanges, ConfigError> {
    let mut ranges = DeviceRanges::new();
    let mut current: Option<String> = None;
    let mut last_start: Option<f64> = Some(0.0);

    for (idx, line) in reader.lines().enumerate() {
        let line_no = idx + 1;
        let line = line.map_err(|source| ConfigError::Io {
            path: Default::default(),
            source,
        })?;

        let content = line.split('#').next().unwrap_or("").trim();
        if content.is_empty() {
            continue;
        }

        if let Some(device) = content.strip_prefix('@') {
            let device = device.trim();
            if device.is_empty() {
                return Err(ConfigError::BadRangeFile {
                    line: line_no,
                    reason: "empty device name".to_string(),
                });
            }
            current = Some(device.to_string());
            last_start = Some(0.0);
            continue;
        }

        let Some(device) = current.as_ref() else {
            return Err(ConfigError::MissingDevice(line_no));
        };
        let Some(start) = last_start else {
            return Err(ConfigError::RangeAfterUnbounded(line_no));
        };

        let end = END_RE
            .captures(content)
            .and_then(|caps| parse_secs(Some(&caps["end"]), UNBOUNDED_SECS))
            .ok_or_else(|| ConfigError::BadRangeFile {
                line: line_no,
                reason: format!("wrong range '{content}'"),
            })?;

        let window = to_window(device, start, end)?;
        ranges.entry(device.clone()).or_default().push(window);
        last_start = if window.is_unbounded() { None } else { Some(end) };
    }

    validate(&mut ranges)?;
    Ok(ranges)
}

fn parse_secs(value: Option<&str>, default: f64) -> Option<f64> {
    match value {
        None => Some(default),
        Some(s) => s.parse::<f64>().ok().filter(|v| v.is_finite()),
    }
}

fn to_window(device: &str, start: f64, end: f64) -> Result<TimeWindow, ConfigError> {
    let end_ns = if end == UNBOUNDED_SECS {
        TimeWindow::UNBOUNDED_END
    } else {
        secs_to_nanos(end)
    };
    let start_ns = secs_to_nanos(start);

    if end_ns <= start_ns {
        return Err(ConfigError::EmptyWindow {
            device: device.to_string(),
            start,
            end,
        });
    }
    Ok(TimeWindow::new(start_ns, end_ns))
}

/// Sorts every device's windows by start and rejects overlaps.
pub fn validate(ranges: &mut DeviceRanges) -> Result<(), ConfigError> {
    for (device, windows) in ranges.iter_mut() {
        windows.sort();
        if windows.windows(2).any(|pair| pair[0].overlaps(&pair[1])) {
            return Err(ConfigError::OverlappingWindows(device.clone()));
        }
    }
    Ok(())
}
