//! Fixed-capacity sliding window of movement speed samples

use crate::game::constants::movement::WINDOW_CAPACITY;

/// One speed measurement between two authoritative positions
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleEntry {
    /// Network seconds between the two positions (> 0)
    pub elapsed: f32,
    /// Distance / elapsed
    pub observed_speed: f32,
    /// Speed stat at the time the sample was taken
    pub allowed_speed: f32,
}

impl SampleEntry {
    const EMPTY: SampleEntry = SampleEntry {
        elapsed: 0.0,
        observed_speed: 0.0,
        allowed_speed: 0.0,
    };
}

/// Ring buffer holding the `N` most recent samples, oldest evicted first
#[derive(Debug, Clone)]
pub struct SampleWindow<const N: usize = { WINDOW_CAPACITY }> {
    entries: [SampleEntry; N],
    /// Next write slot
    head: usize,
    len: usize,
}

impl<const N: usize> SampleWindow<N> {
    pub fn new() -> Self {
        Self {
            entries: [SampleEntry::EMPTY; N],
            head: 0,
            len: 0,
        }
    }

    /// Append a sample, evicting the oldest when full
    pub fn push(&mut self, entry: SampleEntry) {
        if N == 0 {
            return;
        }
        self.entries[self.head] = entry;
        self.head = (self.head + 1) % N;
        if self.len < N {
            self.len += 1;
        }
    }

    pub fn clear(&mut self) {
        self.head = 0;
        self.len = 0;
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        N
    }

    /// Samples from oldest to newest
    pub fn iter(&self) -> impl Iterator<Item = &SampleEntry> + '_ {
        let start = (self.head + N - self.len) % N.max(1);
        (0..self.len).map(move |i| &self.entries[(start + i) % N])
    }

    /// Mean observed and mean allowed speed; `None` when empty
    pub fn averages(&self) -> Option<(f32, f32)> {
        if self.len == 0 {
            return None;
        }
        let (observed, allowed) = self
            .iter()
            .fold((0.0f32, 0.0f32), |(o, a), e| (o + e.observed_speed, a + e.allowed_speed));
        let count = self.len as f32;
        Some((observed / count, allowed / count))
    }
}

impl<const N: usize> Default for SampleWindow<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(observed: f32, allowed: f32) -> SampleEntry {
        SampleEntry {
            elapsed: 0.1,
            observed_speed: observed,
            allowed_speed: allowed,
        }
    }

    #[test]
    fn test_empty_has_no_averages() {
        let window: SampleWindow = SampleWindow::new();
        assert!(window.is_empty());
        assert_eq!(window.capacity(), 20);
        assert_eq!(window.averages(), None);
    }

    #[test]
    fn test_averages() {
        let mut window: SampleWindow<4> = SampleWindow::new();
        window.push(sample(4.0, 5.0));
        window.push(sample(6.0, 5.0));
        window.push(sample(8.0, 2.0));

        let (observed, allowed) = window.averages().unwrap();
        assert!((observed - 6.0).abs() < 1e-5);
        assert!((allowed - 4.0).abs() < 1e-5);
    }

    #[test]
    fn test_fifo_eviction() {
        let mut window: SampleWindow<3> = SampleWindow::new();
        for i in 1..=5 {
            window.push(sample(i as f32, 0.0));
        }

        assert_eq!(window.len(), 3);
        let speeds: Vec<f32> = window.iter().map(|e| e.observed_speed).collect();
        assert_eq!(speeds, vec![3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_never_exceeds_capacity() {
        let mut window: SampleWindow = SampleWindow::new();
        for i in 0..100 {
            window.push(sample(i as f32, 1.0));
            assert!(window.len() <= 20);
        }
        assert_eq!(window.len(), 20);
        assert_eq!(window.iter().next().unwrap().observed_speed, 80.0);
    }

    #[test]
    fn test_clear() {
        let mut window: SampleWindow<3> = SampleWindow::new();
        window.push(sample(1.0, 1.0));
        window.push(sample(2.0, 1.0));
        window.clear();

        assert!(window.is_empty());
        assert_eq!(window.iter().count(), 0);

        window.push(sample(7.0, 1.0));
        assert_eq!(window.averages(), Some((7.0, 1.0)));
    }
}
