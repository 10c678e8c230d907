use std::io;
use std::path::PathBuf;

/// Failure while decoding a single binary trace record.
#[derive(thiserror::Error, Debug)]
pub enum DecodeError {
    #[error("read error: {0}")]
    Io(#[from] io::Error),
    #[error("truncated record: expected {expected} bytes, got {got}")]
    TruncatedRecord { expected: usize, got: usize },
    #[error("bad trace magic {0:#010x}")]
    BadMagic(u32),
    #[error("unsupported trace version {0:#04x}")]
    UnsupportedVersion(u8),
    #[error("payload of {0} bytes does not fit a record")]
    PduTooLong(usize),
}

/// Failure while opening or reading the per-CPU traces of one device.
#[derive(thiserror::Error, Debug)]
pub enum TraceError {
    #[error("cannot access '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("no such traces: {0}")]
    NoTracesFound(String),
    #[error("bad trace in '{}': {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: DecodeError,
    },
    #[error("invalid trace pattern '{pattern}': {reason}")]
    Pattern { pattern: String, reason: String },
    #[error("cannot start analysis threads: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Malformed device/range selection, reported before any trace is opened.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("wrong device or range '{0}'")]
    BadRangeSpec(String),
    #[error("range file line {line}: {reason}")]
    BadRangeFile { line: usize, reason: String },
    #[error("empty window [{start}:{end}] for device '{device}'")]
    EmptyWindow { device: String, start: f64, end: f64 },
    #[error("overlapping windows for device '{0}'")]
    OverlappingWindows(String),
    #[error("range file line {0}: window follows an unbounded one")]
    RangeAfterUnbounded(usize),
    #[error("range file line {0}: range before any '@device' header")]
    MissingDevice(usize),
    #[error("cannot read range file '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
