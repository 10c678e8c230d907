//! Fixed-width histogram used by the I2C per-level size statistics.

use serde::Serialize;

/// Uniform-width histogram. Bin `i` counts values in `[i * width, (i + 1) * width)`,
/// except the final bin which also catches every larger value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Histogram {
    width: u64,
    counts: Vec<u64>,
}

impl Histogram {
    /// Creates an empty histogram. A zero `width` or `bins` is bumped to 1.
    pub fn new(width: u64, bins: usize) -> Self {
        Self {
            width: width.max(1),
            counts: vec![0; bins.max(1)],
        }
    }

    pub fn increment(&mut self, value: u64) {
        self.add(value, 1);
    }

    pub fn add(&mut self, value: u64, count: u64) {
        let last = self.counts.len() - 1;
        let idx = usize::try_from(value / self.width).map_or(last, |i| i.min(last));
        self.counts[idx] += count;
    }

    /// Adds `other` bin for bin. Histograms of a different shape are re-binned by
    /// the lower edge of each source bin.
    pub fn merge(&mut self, other: &Histogram) {
        if self.width == other.width && self.counts.len() == other.counts.len() {
            for (dst, src) in self.counts.iter_mut().zip(&other.counts) {
                *dst += src;
            }
        } else {
            for (edge, count) in other.bin_edges().zip(other.counts.iter().copied()) {
                if count > 0 {
                    self.add(edge, count);
                }
            }
        }
    }

    pub fn bin_count(&self) -> usize {
        self.counts.len()
    }

    pub fn width(&self) -> u64 {
        self.width
    }

    /// Lower edge of every bin, in order.
    pub fn bin_edges(&self) -> impl Iterator<Item = u64> + '_ {
        (0..self.counts.len() as u64).map(move |i| i * self.width)
    }

    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }
}
