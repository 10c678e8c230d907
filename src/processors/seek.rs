use crate::models::{EventKind, TraceEvent};
use crate::processors::plugin::{same_kind, AnalysisPlugin, ReportContext};
use crate::processors::stats::{ratio, RunningStats};
use std::any::Any;

pub const EVENTS: &[EventKind] = &[EventKind::Complete];

/// Distance between the end of one completed request and the start of the next.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeekDistance {
    // sector right after the previous completion
    next_sector: Option<u64>,
    seeks: RunningStats,
}

impl SeekDistance {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seeks(&self) -> &RunningStats {
        &self.seeks
    }
}

impl AnalysisPlugin for SeekDistance {
    fn feed(&mut self, event: &TraceEvent) {
        let blocks = event.blocks();
        if blocks == 0 {
            return;
        }

        if let Some(expected) = self.next_sector {
            let distance = expected.abs_diff(event.sector);
            if distance > 0 {
                self.seeks.add(distance);
            }
        }
        self.next_sector = Some(event.sector + blocks);
    }

    fn merge(&mut self, other: &dyn AnalysisPlugin) {
        if let Some(other) = same_kind::<Self>(other) {
            self.seeks.merge(&other.seeks);
        }
    }

    fn report(&self, ctx: &ReportContext) -> Vec<String> {
        if self.seeks.is_empty() {
            return vec!["No seeks".to_string()];
        }

        let sequential = 1.0 - ratio(self.seeks.count as f64, ctx.total_requests as f64);
        vec![
            format!("Seq.: {:.2}%", (sequential * 100.0).max(0.0)),
            format!(
                "Seeks #: {} min: {} avg: {:.6} max: {} (blks)",
                self.seeks.count,
                self.seeks.min,
                self.seeks.avg(),
                self.seeks.max
            ),
        ]
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
