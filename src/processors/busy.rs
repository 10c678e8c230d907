use crate::models::TraceEvent;
use crate::processors::stats::ratio;
use crate::utils::constants::{BLOCKS_PER_MB, NANOS_PER_MSEC};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingRequest {
    pub time: u64,
    pub bytes: u32,
    pub blocks: u64,
}

/// Device busy time with overlapping requests folded into bursts.
///
/// A burst starts when the first request goes out and ends when the
/// outstanding count drops back to zero. The busy time of a burst is its
/// envelope, `last completion - first start`.
#[derive(Debug, Default)]
pub struct BusyTracker {
    pending: BTreeMap<u64, PendingRequest>,
    outstanding: u32,
    starts: Vec<u64>,
    ends: Vec<u64>,
    totals: BusyTotals,
}

/// The part of a [`BusyTracker`] that survives a window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BusyTotals {
    pub busy_time: u64,
    pub max_outstanding: u32,
}

impl BusyTotals {
    pub fn merge(&mut self, other: &BusyTotals) {
        self.busy_time += other.busy_time;
        self.max_outstanding = self.max_outstanding.max(other.max_outstanding);
    }
}

impl BusyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn totals(&self) -> &BusyTotals {
        &self.totals
    }

    pub fn totals_mut(&mut self) -> &mut BusyTotals {
        &mut self.totals
    }

    pub fn outstanding(&self) -> u32 {
        self.outstanding
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// A request goes out. Zero-sized requests and a second start for a
    /// sector that is already pending are ignored.
    pub fn start(&mut self, event: &TraceEvent) -> bool {
        let blocks = event.blocks();
        if blocks == 0 || self.pending.contains_key(&event.sector) {
            return false;
        }

        self.pending.insert(
            event.sector,
            PendingRequest {
                time: event.time,
                bytes: event.bytes,
                blocks,
            },
        );
        self.outstanding += 1;
        true
    }

    /// Completion of exactly the request started at `event.sector`.
    ///
    /// Returns the start time when the sizes match and the pair was recorded.
    pub fn complete(&mut self, event: &TraceEvent) -> Option<u64> {
        if event.blocks() == 0 {
            return None;
        }
        let request = self.pending.remove(&event.sector)?;
        self.outstanding = self.outstanding.saturating_sub(1);

        let matched = request.bytes == event.bytes;
        if matched {
            self.starts.push(request.time);
            self.ends.push(event.time);
        }
        self.end_of_burst_check();

        matched.then_some(request.time)
    }

    /// Completion of every pending request lying inside the completed range.
    ///
    /// Requests merged into a bigger one complete with it. Returns the number
    /// of requests retired.
    pub fn complete_covered(&mut self, event: &TraceEvent) -> usize {
        if event.blocks() == 0 {
            return 0;
        }
        let first = event.sector;
        let last = event.sector + event.blocks();

        let covered: Vec<u64> = self
            .pending
            .range(first..last)
            .filter(|(sector, req)| **sector + req.blocks <= last)
            .map(|(sector, _)| *sector)
            .collect();

        for sector in covered.iter() {
            if let Some(req) = self.pending.remove(sector) {
                self.starts.push(req.time);
                self.ends.push(event.time);
                self.outstanding = self.outstanding.saturating_sub(1);
            }
        }
        self.end_of_burst_check();

        covered.len()
    }

    /// The request started at `event.sector` goes back to the queue and will
    /// be started again later.
    pub fn requeue(&mut self, event: &TraceEvent) {
        if self.pending.remove(&event.sector).is_some() {
            self.outstanding = self.outstanding.saturating_sub(1);
            self.end_of_burst_check();
        }
    }

    fn end_of_burst_check(&mut self) {
        if self.outstanding == 0 {
            self.account_burst();
        }
    }

    /// Adds the recorded burst to the totals. `outstanding` is left alone.
    pub fn account_burst(&mut self) {
        if self.starts.is_empty() {
            return;
        }

        self.starts.sort_unstable();
        self.ends.sort_unstable();

        let (Some(first), Some(last)) = (self.starts.first(), self.ends.last()) else {
            return;
        };
        self.totals.busy_time += last.saturating_sub(*first);

        let burst_max = max_overlap(&self.starts, &self.ends);
        self.totals.max_outstanding = self.totals.max_outstanding.max(burst_max);

        self.starts.clear();
        self.ends.clear();
    }
}

/// Report lines shared by the D2C and Q2C accumulators.
pub fn busy_report(label: &str, totals: &BusyTotals, requests: u64, blocks: u64) -> Vec<String> {
    if totals.busy_time == 0 {
        return vec![format!("Not enough data for {label} stats")];
    }

    let total_ms = totals.busy_time as f64 / NANOS_PER_MSEC;
    let megabytes = blocks as f64 / BLOCKS_PER_MB;
    vec![
        format!("{label} Total time: {total_ms:.6} (msec)"),
        format!("Avg. {label} per I/O: {:.6} (msec)", ratio(total_ms, requests as f64)),
        format!("Avg. {label} per block: {:.6} (msec)", ratio(total_ms, blocks as f64)),
        format!("Avg. {label} Throughput: {:.6} (MB/sec)", ratio(megabytes, total_ms / 1000.0)),
        format!("{label} Max outstanding: {} (reqs)", totals.max_outstanding),
    ]
}

// Both slices sorted. A start at the same instant as an end counts first.
fn max_overlap(starts: &[u64], ends: &[u64]) -> u32 {
    let (mut i, mut j) = (0, 0);
    let (mut current, mut max) = (0u32, 0u32);

    while i < starts.len() {
        if j >= ends.len() || starts[i] <= ends[j] {
            current += 1;
            max = max.max(current);
            i += 1;
        } else {
            current = current.saturating_sub(1);
            j += 1;
        }
    }
    max
}
