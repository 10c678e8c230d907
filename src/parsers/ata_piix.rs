use crate::error::TraceError;
use crate::log_debug;
use crate::models::{EventKind, ReaderVariant, TraceEvent};
use crate::parsers::stream::StreamMerger;
use std::collections::VecDeque;

/// State of the ata_piix reader.
///
/// Those controllers only ever have two requests in flight and the trace shows the
/// second dispatch long before the device actually starts it. The second Issue is
/// held back and surfaced right after the next completion instead, once every
/// event sharing that completion's timestamp has been read.
#[derive(Debug, Default)]
pub struct AtaPiixState {
    outstanding: u32,
    held: Option<TraceEvent>,
    // moved past a completion, waiting for the merger to reach their time
    released: VecDeque<TraceEvent>,
}

impl AtaPiixState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read_next(&mut self, merger: &mut StreamMerger) -> Result<Option<TraceEvent>, TraceError> {
        if let Some(due) = self.released.front().map(|held| held.time) {
            if merger.current().map_or(true, |next| next.time >= due) {
                return Ok(self.released.pop_front());
            }
        }

        loop {
            let Some(event) = merger.next_event()? else {
                return Ok(self.released.pop_front());
            };

            match event.kind() {
                EventKind::Complete => {
                    if self.outstanding == 2 {
                        if let Some(mut held) = self.held.take() {
                            held.time = event.time + 1;
                            self.released.push_back(held);
                        }
                    }
                    self.outstanding = self.outstanding.saturating_sub(1);
                }
                EventKind::Issue => {
                    if self.outstanding >= 2 {
                        log_debug!(
                            "ata_piix: {} outstanding, dispatch passed through: {}",
                            self.outstanding,
                            event
                        );
                        return Ok(Some(event));
                    }
                    self.outstanding += 1;
                    if self.outstanding == 2 {
                        self.held = Some(event);
                        continue;
                    }
                }
                EventKind::Requeue => {
                    if self.held.take().is_none() {
                        self.released.pop_back();
                    }
                    self.outstanding = self.outstanding.saturating_sub(1);
                }
                _ => {}
            }

            return Ok(Some(event));
        }
    }
}

/// Pulls events out of a [`StreamMerger`] with the selected reader variant.
#[derive(Debug)]
pub enum TraceReader {
    Default,
    AtaPiix(AtaPiixState),
}

impl TraceReader {
    pub fn new(variant: ReaderVariant) -> Self {
        match variant {
            ReaderVariant::Default => TraceReader::Default,
            ReaderVariant::AtaPiix => TraceReader::AtaPiix(AtaPiixState::new()),
        }
    }

    pub fn read_next(&mut self, merger: &mut StreamMerger) -> Result<Option<TraceEvent>, TraceError> {
        match self {
            TraceReader::Default => merger.next_event(),
            TraceReader::AtaPiix(state) => state.read_next(merger),
        }
    }
}
