use crate::models::{EventKind, TraceEvent};
use crate::processors::plugin::{same_kind, AnalysisPlugin, ReportContext};
use crate::processors::stats::ratio;
use std::any::Any;

pub const EVENTS: &[EventKind] = &[EventKind::BackMerge, EventKind::FrontMerge, EventKind::Insert];

/// Inserted requests against front and back merges.
///
/// Merges seen before the first insert belong to requests inserted before the
/// window opened and are not counted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeRatio {
    pub inserts: u64,
    pub back_merges: u64,
    pub front_merges: u64,
}

impl MergeRatio {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AnalysisPlugin for MergeRatio {
    fn feed(&mut self, event: &TraceEvent) {
        match event.kind() {
            EventKind::Insert => self.inserts += 1,
            EventKind::BackMerge if self.inserts > 0 => self.back_merges += 1,
            EventKind::FrontMerge if self.inserts > 0 => self.front_merges += 1,
            _ => {}
        }
    }

    fn merge(&mut self, other: &dyn AnalysisPlugin) {
        if let Some(other) = same_kind::<Self>(other) {
            self.inserts += other.inserts;
            self.back_merges += other.back_merges;
            self.front_merges += other.front_merges;
        }
    }

    fn report(&self, _ctx: &ReportContext) -> Vec<String> {
        if self.inserts == 0 {
            return vec!["#I: 0".to_string()];
        }

        let merges = self.front_merges + self.back_merges;
        vec![format!(
            "#I: {} #F+#M: {} ratio: {:.6}",
            self.inserts,
            merges,
            ratio((merges + self.inserts) as f64, self.inserts as f64)
        )]
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
