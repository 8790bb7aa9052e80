use crate::Observation;

/// Observations waiting for the next flush.
///
/// Owned by the flush loop alone.
#[derive(Debug, Clone)]
pub struct BatchBuf {
    buf: Vec<Observation>,
    max_size: usize,
}
impl BatchBuf {
    pub fn new(max_size: usize) -> Self {
        let max_size = max_size.max(1);
        let buf = Vec::with_capacity(max_size);
        Self { buf, max_size }
    }

    /// Returns `true` once the buffer holds `max_size` observations.
    pub fn push(&mut self, observation: Observation) -> bool {
        debug_assert!(self.buf.len() < self.max_size);
        self.buf.push(observation);
        self.is_full()
    }
    pub fn is_full(&self) -> bool {
        self.buf.len() == self.max_size
    }
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
    pub fn len(&self) -> usize {
        self.buf.len()
    }
    pub fn max_size(&self) -> usize {
        self.max_size
    }
    pub fn as_slice(&self) -> &[Observation] {
        &self.buf
    }
    pub fn clear(&mut self) {
        self.buf.clear();
    }
}
