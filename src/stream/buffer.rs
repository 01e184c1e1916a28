//! Bounded replay buffers for lines and samples.

use std::collections::{HashSet, VecDeque};

use crate::stream::{LogLine, MetricSample};

/// Replay buffer for log lines with duplicate suppression.
///
/// A line is a duplicate when its rendered display form has been seen
/// before on this stream, regardless of whether the original copy is
/// still buffered.
#[derive(Debug)]
pub struct LogBuffer {
    capacity: usize,
    lines: VecDeque<LogLine>,
    // TODO: retire keys when their line is evicted; on very long streams
    // this set outlives the buffer and keeps growing.
    seen: HashSet<String>,
}

impl LogBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            lines: VecDeque::with_capacity(capacity.min(256)),
            seen: HashSet::new(),
        }
    }

    /// Insert a line, returning `false` when it was suppressed as a
    /// duplicate. Evicts the oldest line once the buffer is full.
    pub fn insert(&mut self, line: LogLine) -> bool {
        if !self.seen.insert(line.display_line()) {
            return false;
        }
        if self.lines.len() == self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(line);
        true
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Buffered lines, oldest first.
    pub fn snapshot(&self) -> Vec<LogLine> {
        self.lines.iter().cloned().collect()
    }
}

/// Rolling window of the most recent metric samples, ordered by arrival.
#[derive(Debug)]
pub struct MetricHistory {
    capacity: usize,
    samples: VecDeque<MetricSample>,
}

impl MetricHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            samples: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, sample: MetricSample) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    pub fn latest(&self) -> Option<&MetricSample> {
        self.samples.back()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Samples oldest first.
    pub fn snapshot(&self) -> Vec<MetricSample> {
        self.samples.iter().cloned().collect()
    }
}
