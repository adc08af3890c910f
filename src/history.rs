use std::collections::VecDeque;

use crate::types::SpectralFrame;

pub const DEFAULT_CAPACITY: usize = 3;

/// Most recent accepted frames, oldest first. Used for display fading only.
#[derive(Debug, Clone)]
pub struct RollingHistory {
    frames: VecDeque<SpectralFrame>,
    capacity: usize,
}

impl RollingHistory {
    /// A capacity of zero is raised to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            frames: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, frame: SpectralFrame) {
        if self.frames.len() == self.capacity {
            self.frames.pop_front();
        }
        self.frames.push_back(frame);
    }

    /// Current contents, most recent last.
    pub fn snapshot(&self) -> Vec<SpectralFrame> {
        self.frames.iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for RollingHistory {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
