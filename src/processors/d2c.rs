use crate::error::TraceError;
use crate::models::{EventKind, TraceEvent};
use crate::output::detail::{format_secs, DetailWriter};
use crate::processors::busy::{busy_report, BusyTracker};
use crate::processors::plugin::{same_kind, AnalysisPlugin, PluginArgs, ReportContext};
use std::any::Any;

pub const EVENTS: &[EventKind] = &[EventKind::Issue, EventKind::Complete, EventKind::Requeue];

pub const DETAIL_SUFFIX: &str = "d2c";

/// Dispatch-to-completion: time the device spends servicing requests.
pub struct D2C {
    busy: BusyTracker,
    detail: Option<DetailWriter>,
}

impl D2C {
    pub fn new(args: &PluginArgs) -> Result<Self, TraceError> {
        let detail = match args.d2c_detail.as_deref() {
            Some(prefix) => Some(DetailWriter::create(args.detail_path(prefix, DETAIL_SUFFIX))?),
            None => None,
        };

        Ok(Self {
            busy: BusyTracker::new(),
            detail,
        })
    }

    pub fn busy(&self) -> &BusyTracker {
        &self.busy
    }
}

impl AnalysisPlugin for D2C {
    fn feed(&mut self, event: &TraceEvent) {
        match event.kind() {
            EventKind::Issue => {
                self.busy.start(event);
            }
            EventKind::Complete => {
                let Some(issued_at) = self.busy.complete(event) else {
                    return;
                };
                if let Some(detail) = self.detail.as_mut() {
                    detail.write_row([
                        format_secs(event.time),
                        event.sector.to_string(),
                        event.blocks().to_string(),
                        format_secs(event.time.saturating_sub(issued_at)),
                    ]);
                }
            }
            EventKind::Requeue => self.busy.requeue(event),
            _ => {}
        }
    }

    fn merge(&mut self, other: &dyn AnalysisPlugin) {
        if let Some(other) = same_kind::<Self>(other) {
            self.busy.totals_mut().merge(other.busy.totals());
        }
    }

    fn close(&mut self) {
        self.busy.account_burst();
        if let Some(detail) = self.detail.as_mut() {
            detail.flush();
        }
    }

    fn report(&self, ctx: &ReportContext) -> Vec<String> {
        busy_report("D2C", self.busy.totals(), ctx.total_requests, ctx.total_blocks)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
