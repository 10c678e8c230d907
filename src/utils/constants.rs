// nanosecond conversions
pub const NANOS_PER_SEC: u64 = 1_000_000_000;
pub const NANOS_PER_MSEC: f64 = 1_000_000.0;

// blktrace reports sizes in bytes, statistics are kept in 512-byte blocks
pub const SECTOR_SHIFT: u32 = 9;

// 2048 blocks of 512 bytes = 1 MB
pub const BLOCKS_PER_MB: f64 = 2048.0;

// Default shape of the I2C per-level size histograms (in blocks)
pub const DEFAULT_HIST_BIN_WIDTH: u64 = 8;
pub const DEFAULT_HIST_BINS: usize = 32;

/// Converts a nanosecond timestamp to fractional seconds.
pub fn nanos_to_secs(ns: u64) -> f64 {
    ns as f64 / NANOS_PER_SEC as f64
}

/// Converts fractional seconds to nanoseconds, saturating at the bounds of `u64`.
pub fn secs_to_nanos(secs: f64) -> u64 {
    (secs * NANOS_PER_SEC as f64) as u64
}

/// Converts a byte count to 512-byte blocks.
pub fn bytes_to_blocks(bytes: u32) -> u64 {
    u64::from(bytes >> SECTOR_SHIFT)
}
