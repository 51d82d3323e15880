//! Bounded FIFO experience replay buffer (spec §3: "capacity ≤ configured
//! bound", default 10 000). Grounded on the teacher's
//! `ExperienceBuffer` (`agent/rl.rs`), which evicts via `Vec::remove(0)`;
//! kept here as a `VecDeque` for O(1) front-eviction instead.

use std::collections::VecDeque;

use rand::seq::SliceRandom;

use crate::domain::Experience;

pub struct ReplayBuffer {
    buffer: VecDeque<Experience>,
    capacity: usize,
}

impl ReplayBuffer {
    pub fn new(capacity: usize) -> Self {
        Self { buffer: VecDeque::with_capacity(capacity), capacity: capacity.max(1) }
    }

    pub fn push(&mut self, experience: Experience) {
        if self.buffer.len() >= self.capacity {
            self.buffer.pop_front();
        }
        self.buffer.push_back(experience);
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Uniform sample without replacement, capped at the buffer's current size.
    pub fn sample(&self, batch_size: usize) -> Vec<Experience> {
        let mut rng = rand::thread_rng();
        let mut indices: Vec<usize> = (0..self.buffer.len()).collect();
        indices.shuffle(&mut rng);
        indices
            .into_iter()
            .take(batch_size.min(self.buffer.len()))
            .map(|i| self.buffer[i].clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(action: usize) -> Experience {
        Experience { state: vec![0.0; crate::domain::STATE_DIM], action, reward: 0.0, next_state: vec![0.0; crate::domain::STATE_DIM], done: false }
    }

    #[test]
    fn never_exceeds_capacity() {
        let mut buffer = ReplayBuffer::new(3);
        for i in 0..10 {
            buffer.push(sample(i));
        }
        assert_eq!(buffer.len(), 3);
    }

    #[test]
    fn evicts_oldest_first() {
        let mut buffer = ReplayBuffer::new(2);
        buffer.push(sample(1));
        buffer.push(sample(2));
        buffer.push(sample(3));
        let remaining: Vec<usize> = buffer.buffer.iter().map(|e| e.action).collect();
        assert_eq!(remaining, vec![2, 3]);
    }

    #[test]
    fn sample_never_exceeds_buffer_size() {
        let mut buffer = ReplayBuffer::new(10);
        buffer.push(sample(1));
        buffer.push(sample(2));
        let batch = buffer.sample(5);
        assert_eq!(batch.len(), 2);
    }
}
