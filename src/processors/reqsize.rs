use crate::models::{Direction, EventKind, TraceEvent};
use crate::processors::plugin::{same_kind, AnalysisPlugin, ReportContext};
use crate::processors::stats::{ratio, RunningStats};
use std::any::Any;

pub const EVENTS: &[EventKind] = &[EventKind::Complete];

/// Sizes of completed requests in blocks, split by direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestSize {
    by_direction: [RunningStats; 2],
}

impl RequestSize {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stats(&self, direction: Direction) -> &RunningStats {
        &self.by_direction[direction.index()]
    }

    pub fn combined(&self) -> RunningStats {
        let mut all = self.by_direction[0];
        all.merge(&self.by_direction[1]);
        all
    }

    pub fn context(&self) -> ReportContext {
        let all = self.combined();
        ReportContext {
            total_requests: all.count,
            total_blocks: all.total,
        }
    }
}

impl AnalysisPlugin for RequestSize {
    fn feed(&mut self, event: &TraceEvent) {
        let blocks = event.blocks();
        if blocks > 0 {
            self.by_direction[event.direction().index()].add(blocks);
        }
    }

    fn merge(&mut self, other: &dyn AnalysisPlugin) {
        if let Some(other) = same_kind::<Self>(other) {
            for (mine, theirs) in self.by_direction.iter_mut().zip(other.by_direction.iter()) {
                mine.merge(theirs);
            }
        }
    }

    fn report(&self, _ctx: &ReportContext) -> Vec<String> {
        let all = self.combined();
        if all.is_empty() {
            return vec!["No requests".to_string()];
        }

        let reads = self.stats(Direction::Read).count;
        let writes = self.stats(Direction::Write).count;
        vec![format!(
            "Reqs. #: {} Reads: {} ({:.1}%) Writes: {} ({:.1}%) Size:(min: {} avg: {:.6} max: {} (blks))",
            all.count,
            reads,
            100.0 * ratio(reads as f64, all.count as f64),
            writes,
            100.0 * ratio(writes as f64, all.count as f64),
            all.min,
            all.avg(),
            all.max
        )]
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
