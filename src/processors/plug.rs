use crate::models::{EventKind, TraceEvent};
use crate::processors::plugin::{same_kind, AnalysisPlugin, ReportContext};
use crate::processors::stats::RunningStats;
use crate::utils::constants::nanos_to_secs;
use std::any::Any;

pub const EVENTS: &[EventKind] = &[EventKind::Plug, EventKind::UnplugIo, EventKind::UnplugTimer];

/// Time the queue stays plugged, from a plug to the next unplug of either kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlugTime {
    plugged_at: Option<u64>,
    periods: RunningStats,
}

impl PlugTime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn periods(&self) -> &RunningStats {
        &self.periods
    }
}

impl AnalysisPlugin for PlugTime {
    fn feed(&mut self, event: &TraceEvent) {
        match event.kind() {
            EventKind::Plug => {
                // only one period open at a time
                self.plugged_at.get_or_insert(event.time);
            }
            EventKind::UnplugIo | EventKind::UnplugTimer => {
                if let Some(start) = self.plugged_at.take() {
                    self.periods.add(event.time.saturating_sub(start));
                }
            }
            _ => {}
        }
    }

    fn merge(&mut self, other: &dyn AnalysisPlugin) {
        if let Some(other) = same_kind::<Self>(other) {
            self.periods.merge(&other.periods);
        }
    }

    fn report(&self, _ctx: &ReportContext) -> Vec<String> {
        if self.periods.is_empty() {
            return vec!["No plugging in this range".to_string()];
        }

        vec![format!(
            "Plug Time Min: {:.6} Avg: {:.6} Max: {:.6} (sec)",
            nanos_to_secs(self.periods.min),
            nanos_to_secs(self.periods.total) / self.periods.count as f64,
            nanos_to_secs(self.periods.max)
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

    fn fed(events: &[(EventKind, u64)]) -> PlugTime {
        let mut p = PlugTime::new();
        for (kind, time) in events {
            p.feed(&TraceEvent::of_kind(*kind, Direction::Read, *time, 0, 0));
        }
        p
    }

    #[test]
    fn test_plug_periods() {
        let p = fed(&[
            (EventKind::UnplugIo, 1),
            (EventKind::Plug, 10),
            (EventKind::Plug, 15),
            (EventKind::UnplugTimer, 40),
            (EventKind::Plug, 100),
            (EventKind::UnplugIo, 110),
            (EventKind::Plug, 500),
        ]);
        assert_eq!(p.periods().count, 2);
        assert_eq!(p.periods().min, 10);
        assert_eq!(p.periods().max, 30);
    }

    #[test]
    fn test_report() {
        let p = fed(&[(EventKind::Plug, 0), (EventKind::UnplugIo, 500_000_000)]);
        assert_eq!(
            p.report(&ReportContext::default()),
            vec!["Plug Time Min: 0.500000 Avg: 0.500000 Max: 0.500000 (sec)"]
        );
        assert_eq!(
            PlugTime::new().report(&ReportContext::default()),
            vec!["No plugging in this range"]
        );
    }

    #[test]
    fn test_merge_commutative_and_associative() {
        let a = fed(&[(EventKind::Plug, 0), (EventKind::UnplugIo, 7)]);
        let b = fed(&[(EventKind::Plug, 0), (EventKind::UnplugIo, 3)]);
        let c = fed(&[(EventKind::Plug, 4), (EventKind::UnplugTimer, 20)]);

        let mut ab = a;
        ab.merge(&b);
        let mut ba = b;
        ba.merge(&a);
        assert_eq!(ab.periods(), ba.periods());

        let mut ab_c = ab;
        ab_c.merge(&c);
        let mut bc = b;
        bc.merge(&c);
        let mut a_bc = a;
        a_bc.merge(&bc);
        assert_eq!(ab_c.periods(), a_bc.periods());
        assert_eq!(ab_c.periods().total, 26);
    }
}
