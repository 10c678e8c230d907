use serde::Serialize;

/// Running min/max/sum/count of `u64` samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunningStats {
    pub min: u64,
    pub max: u64,
    pub total: u64,
    pub count: u64,
}

impl Default for RunningStats {
    fn default() -> Self {
        Self {
            min: u64::MAX,
            max: 0,
            total: 0,
            count: 0,
        }
    }
}

impl RunningStats {
    pub fn add(&mut self, value: u64) {
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        self.total += value;
        self.count += 1;
    }

    pub fn merge(&mut self, other: &RunningStats) {
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
        self.total += other.total;
        self.count += other.count;
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn avg(&self) -> f64 {
        ratio(self.total as f64, self.count as f64)
    }
}

/// `num / den`, or 0 when there is nothing to divide by.
pub fn ratio(num: f64, den: f64) -> f64 {
    if den == 0.0 {
        0.0
    } else {
        num / den
    }
}
