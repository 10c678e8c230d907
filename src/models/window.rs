use crate::utils::constants::nanos_to_secs;
use serde::Serialize;
use std::collections::BTreeMap;

/// Half-open analysis interval `[start, end)` in nanoseconds relative to the
/// device genesis. `end == u64::MAX` means unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct TimeWindow {
    pub start: u64,
    pub end: u64,
}

impl TimeWindow {
    pub const UNBOUNDED_END: u64 = u64::MAX;

    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    /// `[0, ∞)`
    pub fn everything() -> Self {
        Self::new(0, Self::UNBOUNDED_END)
    }

    pub fn is_unbounded(&self) -> bool {
        self.end == Self::UNBOUNDED_END
    }

    pub fn contains(&self, time: u64) -> bool {
        self.start <= time && time < self.end
    }

    /// An event at `time` closes this window.
    pub fn is_past(&self, time: u64) -> bool {
        time >= self.end
    }

    pub fn overlaps(&self, other: &TimeWindow) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Report heading, e.g. `sda[0.0000:1.5000]` or `sda[2.0000:inf]`.
    pub fn heading(&self, device: &str) -> String {
        let end = if self.is_unbounded() {
            "inf".to_string()
        } else {
            format!("{:.4}", nanos_to_secs(self.end))
        };
        format!("{}[{:.4}:{}]", device, nanos_to_secs(self.start), end)
    }
}

/// Windows to analyse per device, devices in sorted order.
pub type DeviceRanges = BTreeMap<String, Vec<TimeWindow>>;
