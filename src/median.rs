use std::collections::VecDeque;

/// Exact median over a sliding window of the most recent samples.
///
/// Keeps arrival order (to know what to evict) and a sorted copy (to read
/// the middle). Each push is O(window).
#[derive(Debug, Clone)]
pub struct RunningMedian {
    /// Maximum number of samples retained
    window_size: usize,
    /// Samples in arrival order
    window: VecDeque<f64>,
    /// Same samples, ascending
    sorted: Vec<f64>,
}

impl RunningMedian {
    /// `window_size` is clamped to at least one sample.
    pub fn new(window_size: usize) -> Self {
        let window_size = window_size.max(1);
        Self {
            window_size,
            window: VecDeque::with_capacity(window_size),
            sorted: Vec::with_capacity(window_size),
        }
    }

    /// Add a sample, evicting the oldest one when full. Non-finite samples
    /// are ignored.
    pub fn push(&mut self, value: f64) {
        if !value.is_finite() {
            return;
        }
        if self.window.len() >= self.window_size {
            if let Some(old) = self.window.pop_front() {
                let idx = self.sorted.partition_point(|x| *x < old);
                self.sorted.remove(idx);
            }
        }
        self.window.push_back(value);
        let idx = self.sorted.partition_point(|x| *x < value);
        self.sorted.insert(idx, value);
    }

    pub fn median(&self) -> Option<f64> {
        let n = self.sorted.len();
        if n == 0 {
            return None;
        }
        let mid = n / 2;
        if n % 2 == 1 {
            Some(self.sorted[mid])
        } else {
            Some((self.sorted[mid - 1] + self.sorted[mid]) / 2.0)
        }
    }

    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }
}
