use crate::error::TraceError;
use crate::log_debug;
use crate::models::TraceEvent;
use crate::parsers::blktrace::TraceCodec;
use glob::Pattern;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

// blktrace writes one file per CPU, named after the device
const TRACE_FILE_SUFFIXES: [&str; 2] = ["blktrace", "trace"];

/// One per-CPU trace with a single event of lookahead.
pub struct TraceStream {
    path: PathBuf,
    reader: Box<dyn Read + Send>,
    lookahead: Option<TraceEvent>,
}

impl TraceStream {
    pub fn new(path: PathBuf, reader: Box<dyn Read + Send>) -> Self {
        Self {
            path,
            reader,
            lookahead: None,
        }
    }

    pub fn open(path: &Path) -> Result<Self, TraceError> {
        let file = File::open(path).map_err(|source| TraceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::new(path.to_path_buf(), Box::new(BufReader::new(file))))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    // Decodes the next real event into the lookahead slot, skipping pseudo-events.
    fn advance(&mut self, codec: &TraceCodec, genesis: u64) -> Result<(), TraceError> {
        loop {
            let decoded = codec
                .decode(&mut self.reader)
                .map_err(|source| TraceError::Decode {
                    path: self.path.clone(),
                    source,
                })?;

            match decoded {
                None => {
                    log_debug!("{}: end of trace", self.path.display());
                    self.lookahead = None;
                    return Ok(());
                }
                Some(ev) if ev.is_pseudo() => continue,
                Some(mut ev) => {
                    ev.time = ev.time.saturating_sub(genesis);
                    self.lookahead = Some(ev);
                    return Ok(());
                }
            }
        }
    }
}

/// Merges the per-CPU traces of one device into a single time-ordered sequence.
///
/// Timestamps are rebased to the device genesis (the earliest first event over
/// all streams), so the first event surfaced has time 0. Events with equal
/// timestamps come out in stream order (lowest stream index first).
pub struct StreamMerger {
    streams: Vec<TraceStream>,
    heap: BinaryHeap<Reverse<(u64, usize)>>,
    genesis: u64,
    codec: TraceCodec,
}

impl StreamMerger {
    /// Opens every `<device>.blktrace.*` / `<device>.trace.*` file next to `device`.
    pub fn open(device: &str, codec: TraceCodec) -> Result<Self, TraceError> {
        let paths = find_trace_files(device)?;
        if paths.is_empty() {
            return Err(TraceError::NoTracesFound(device.to_string()));
        }

        log_debug!("{}: {} trace file(s)", device, paths.len());
        let streams = paths
            .iter()
            .map(|p| {
                log_debug!("  {}", p.display());
                TraceStream::open(p)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Self::from_streams(device, streams, codec)
    }

    /// Builds a merger over already opened streams.
    pub fn from_streams(
        device: &str,
        mut streams: Vec<TraceStream>,
        codec: TraceCodec,
    ) -> Result<Self, TraceError> {
        if streams.is_empty() {
            return Err(TraceError::NoTracesFound(device.to_string()));
        }

        for stream in streams.iter_mut() {
            stream.advance(&codec, 0)?;
        }

        let genesis = streams
            .iter()
            .filter_map(|s| s.lookahead.as_ref().map(|ev| ev.time))
            .min()
            .unwrap_or(0);

        let mut heap = BinaryHeap::with_capacity(streams.len());
        for (idx, stream) in streams.iter_mut().enumerate() {
            if let Some(ev) = stream.lookahead.as_mut() {
                ev.time -= genesis;
                heap.push(Reverse((ev.time, idx)));
            }
        }

        log_debug!("{}: genesis {} ns", device, genesis);

        Ok(Self {
            streams,
            heap,
            genesis,
            codec,
        })
    }

    pub fn genesis(&self) -> u64 {
        self.genesis
    }

    pub fn stream_count(&self) -> usize {
        self.streams.len()
    }

    /// The event `next_event` would return, without consuming it.
    pub fn current(&self) -> Option<&TraceEvent> {
        self.heap
            .peek()
            .and_then(|Reverse((_, idx))| self.streams[*idx].lookahead.as_ref())
    }

    /// Chronologically next real event over all streams, `None` once every
    /// stream is exhausted.
    pub fn next_event(&mut self) -> Result<Option<TraceEvent>, TraceError> {
        let Some(Reverse((_, idx))) = self.heap.pop() else {
            return Ok(None);
        };

        let stream = &mut self.streams[idx];
        let event = stream.lookahead.take();
        stream.advance(&self.codec, self.genesis)?;
        if let Some(next) = stream.lookahead.as_ref() {
            self.heap.push(Reverse((next.time, idx)));
        }

        Ok(event)
    }
}

impl Iterator for StreamMerger {
    type Item = Result<TraceEvent, TraceError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_event().transpose()
    }
}

/// Lists the per-CPU trace files of `device`, sorted by path.
pub fn find_trace_files(device: &str) -> Result<Vec<PathBuf>, TraceError> {
    let mut paths = Vec::new();

    for suffix in TRACE_FILE_SUFFIXES {
        let pattern = format!("{}.{}.*", Pattern::escape(device), suffix);
        let entries = glob::glob(&pattern).map_err(|e| TraceError::Pattern {
            pattern: pattern.clone(),
            reason: e.to_string(),
        })?;

        for entry in entries {
            let path = entry.map_err(|e| TraceError::Io {
                path: e.path().to_path_buf(),
                source: e.into_error(),
            })?;
            if path.is_file() {
                paths.push(path);
            }
        }
    }

    paths.sort();
    paths.dedup();
    Ok(paths)
}
