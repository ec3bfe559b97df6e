/// Ping-pong sample buffer for continuous inference.
///
/// One buffer is always the write target; the other holds the most recently
/// completed window and stays readable until the next swap. When the write
/// target fills up the buffers swap and `ready` is raised.
#[derive(Debug)]
pub struct DoubleBuffer<T> {
    buffers: [Vec<T>; 2],
    active: usize,
    fill_count: usize,
    ready: bool,
    capacity: usize,
}

impl<T: Copy + Default> DoubleBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffers: [vec![T::default(); capacity], vec![T::default(); capacity]],
            active: 0,
            fill_count: 0,
            ready: false,
            capacity,
        }
    }

    /// Store one sample. Returns `true` if it completed a window.
    pub fn push(&mut self, sample: T) -> bool {
        if self.capacity == 0 {
            return false;
        }
        self.buffers[self.active][self.fill_count] = sample;
        self.fill_count += 1;

        if self.fill_count == self.capacity {
            self.active ^= 1;
            self.fill_count = 0;
            self.ready = true;
            return true;
        }
        false
    }

    /// Store every sample in order. Returns how many windows completed.
    pub fn extend(&mut self, samples: impl IntoIterator<Item = T>) -> usize {
        samples.into_iter().filter(|&s| self.push(s)).count()
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Acknowledge the completed window.
    pub fn clear_ready(&mut self) {
        self.ready = false;
    }

    /// The just-completed window (index `1 - active`).
    pub fn readable(&self) -> &[T] {
        &self.buffers[self.active ^ 1]
    }

    pub fn active_index(&self) -> usize {
        self.active
    }

    pub fn fill_count(&self) -> usize {
        self.fill_count
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Drop the partially filled window and any pending `ready`.
    pub fn reset(&mut self) {
        self.fill_count = 0;
        self.ready = false;
    }
}
