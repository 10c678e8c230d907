use crate::models::{EventKind, TraceEvent};
use crate::processors::plugin::{same_kind, AnalysisPlugin, ReportContext};
use crate::processors::stats::RunningStats;
use crate::utils::constants::nanos_to_secs;
use std::any::Any;

pub const EVENTS: &[EventKind] = &[EventKind::Issue, EventKind::Complete, EventKind::Requeue];

/// Complete-to-dispatch: idle gaps between the device draining and the next dispatch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct C2D {
    outstanding: u32,
    last_complete: Option<u64>,
    // gap opened by the dispatch that ended the idle period
    candidate: Option<u64>,
    gaps: RunningStats,
}

impl C2D {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gaps(&self) -> &RunningStats {
        &self.gaps
    }
}

impl AnalysisPlugin for C2D {
    fn feed(&mut self, event: &TraceEvent) {
        match event.kind() {
            EventKind::Issue => {
                if self.outstanding == 0 {
                    if let Some(last) = self.last_complete {
                        self.candidate = Some(event.time.saturating_sub(last));
                    }
                }
                self.outstanding += 1;
            }
            EventKind::Requeue => {
                self.outstanding = self.outstanding.saturating_sub(1);
                if self.outstanding == 0 {
                    self.candidate = None;
                }
            }
            EventKind::Complete => {
                if self.outstanding == 0 {
                    return;
                }
                self.outstanding -= 1;
                if self.outstanding == 0 {
                    self.last_complete = Some(event.time);
                    if let Some(gap) = self.candidate.take() {
                        self.gaps.add(gap);
                    }
                }
            }
            _ => {}
        }
    }

    fn merge(&mut self, other: &dyn AnalysisPlugin) {
        if let Some(other) = same_kind::<Self>(other) {
            self.gaps.merge(&other.gaps);
        }
    }

    fn report(&self, _ctx: &ReportContext) -> Vec<String> {
        if self.gaps.total == 0 {
            return vec!["C2D Total: 0".to_string()];
        }

        vec![format!(
            "C2D Total: {:.6} min: {:.6} avg: {:.6} max: {:.6} (sec)",
            nanos_to_secs(self.gaps.total),
            nanos_to_secs(self.gaps.min),
            nanos_to_secs(self.gaps.total) / self.gaps.count as f64,
            nanos_to_secs(self.gaps.max)
        )]
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Direction;

    fn fed(events: &[(EventKind, u64)]) -> C2D {
        let mut p = C2D::new();
        for (kind, time) in events {
            p.feed(&TraceEvent::of_kind(*kind, Direction::Read, *time, 0, 4096));
        }
        p
    }

    #[test]
    fn test_idle_gaps() {
        let p = fed(&[
            (EventKind::Issue, 0),
            (EventKind::Complete, 10),
            (EventKind::Issue, 40),
            (EventKind::Issue, 45),
            (EventKind::Complete, 50),
            (EventKind::Complete, 60),
            (EventKind::Issue, 160),
            (EventKind::Complete, 170),
        ]);
        assert_eq!(p.gaps().count, 2);
        assert_eq!((p.gaps().min, p.gaps().max, p.gaps().total), (30, 100, 130));
    }

    #[test]
    fn test_requeue_discards_gap() {
        let p = fed(&[
            (EventKind::Issue, 0),
            (EventKind::Complete, 10),
            (EventKind::Issue, 40),
            (EventKind::Requeue, 41),
            (EventKind::Issue, 90),
            (EventKind::Complete, 95),
        ]);
        assert_eq!(p.gaps().count, 1);
        assert_eq!(p.gaps().total, 80);
    }

    #[test]
    fn test_report() {
        assert_eq!(C2D::new().report(&ReportContext::default()), vec!["C2D Total: 0"]);

        let p = fed(&[
            (EventKind::Issue, 0),
            (EventKind::Complete, 10),
            (EventKind::Issue, 250_000_010),
            (EventKind::Complete, 250_000_020),
        ]);
        assert_eq!(
            p.report(&ReportContext::default()),
            vec!["C2D Total: 0.250000 min: 0.250000 avg: 0.250000 max: 0.250000 (sec)"]
        );
    }

    #[test]
    fn test_merge_commutative_and_associative() {
        let a = fed(&[(EventKind::Issue, 0), (EventKind::Complete, 1), (EventKind::Issue, 5), (EventKind::Complete, 6)]);
        let b = fed(&[(EventKind::Issue, 0), (EventKind::Complete, 1), (EventKind::Issue, 3), (EventKind::Complete, 4)]);
        let c = C2D::new();

        let mut ab = a;
        ab.merge(&b);
        let mut ba = b;
        ba.merge(&a);
        assert_eq!(ab.gaps(), ba.gaps());

        let mut ab_c = ab;
        ab_c.merge(&c);
        let mut bc = b;
        bc.merge(&c);
        let mut a_bc = a;
        a_bc.merge(&bc);
        assert_eq!(ab_c.gaps(), a_bc.gaps());
        assert_eq!(ab_c.gaps().total, 6);
    }
}
