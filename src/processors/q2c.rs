use crate::models::{EventKind, TraceEvent};
use crate::processors::busy::{busy_report, BusyTracker};
use crate::processors::plugin::{same_kind, AnalysisPlugin, ReportContext};
use std::any::Any;

pub const EVENTS: &[EventKind] = &[EventKind::Queue, EventKind::Complete];

/// Queue-to-completion: busy time seen from the moment requests are queued.
///
/// Queued requests that were merged into a bigger one complete with it, so a
/// completion retires every pending request inside its sector range. Request
/// counts come from the queue events themselves.
#[derive(Debug, Default)]
pub struct Q2C {
    busy: BusyTracker,
    queued_requests: u64,
    queued_blocks: u64,
}

impl Q2C {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn busy(&self) -> &BusyTracker {
        &self.busy
    }

    pub fn queued(&self) -> (u64, u64) {
        (self.queued_requests, self.queued_blocks)
    }
}

impl AnalysisPlugin for Q2C {
    fn feed(&mut self, event: &TraceEvent) {
        match event.kind() {
            EventKind::Queue => {
                if self.busy.start(event) {
                    self.queued_requests += 1;
                    self.queued_blocks += event.blocks();
                }
            }
            EventKind::Complete => {
                self.busy.complete_covered(event);
            }
            _ => {}
        }
    }

    fn merge(&mut self, other: &dyn AnalysisPlugin) {
        if let Some(other) = same_kind::<Self>(other) {
            self.busy.totals_mut().merge(other.busy.totals());
            self.queued_requests += other.queued_requests;
            self.queued_blocks += other.queued_blocks;
        }
    }

    fn close(&mut self) {
        self.busy.account_burst();
    }

    fn report(&self, _ctx: &ReportContext) -> Vec<String> {
        busy_report("Q2C", self.busy.totals(), self.queued_requests, self.queued_blocks)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Direction;

    fn ev(kind: EventKind, time: u64, sector: u64, bytes: u32) -> TraceEvent {
        TraceEvent::of_kind(kind, Direction::Write, time, sector, bytes)
    }

    #[test]
    fn test_merged_queue_completes_with_its_request() {
        let mut p = Q2C::new();
        for e in [
            ev(EventKind::Queue, 0, 100, 4096),
            ev(EventKind::Queue, 2, 108, 4096),
            ev(EventKind::Complete, 30, 100, 8192),
        ] {
            p.feed(&e);
        }

        assert_eq!(p.busy().outstanding(), 0);
        assert_eq!(p.busy().totals().busy_time, 30);
        assert_eq!(p.busy().totals().max_outstanding, 2);
        assert_eq!(p.queued(), (2, 16));
    }

    #[test]
    fn test_report_uses_queue_counts() {
        let mut p = Q2C::new();
        p.feed(&ev(EventKind::Queue, 0, 0, 1024 * 1024));
        p.feed(&ev(EventKind::Complete, 1_000_000, 0, 1024 * 1024));
        p.close();

        let lines = p.report(&ReportContext::default());
        assert_eq!(lines[0], "Q2C Total time: 1.000000 (msec)");
        assert_eq!(lines[1], "Avg. Q2C per I/O: 1.000000 (msec)");
        assert_eq!(lines[3], "Avg. Q2C Throughput: 1000.000000 (MB/sec)");
    }

    #[test]
    fn test_report_is_idempotent() {
        let mut p = Q2C::new();
        p.feed(&ev(EventKind::Queue, 0, 0, 4096));
        p.feed(&ev(EventKind::Complete, 10, 0, 4096));
        let ctx = ReportContext::default();
        assert_eq!(p.report(&ctx), p.report(&ctx));
    }

    #[test]
    fn test_merge() {
        let mut a = Q2C::new();
        a.feed(&ev(EventKind::Queue, 0, 0, 4096));
        a.feed(&ev(EventKind::Complete, 10, 0, 4096));
        let mut b = Q2C::new();
        b.feed(&ev(EventKind::Queue, 0, 0, 512));
        b.feed(&ev(EventKind::Complete, 5, 0, 512));

        a.merge(&b);
        assert_eq!(a.busy().totals().busy_time, 15);
        assert_eq!(a.queued(), (2, 9));
    }
}
