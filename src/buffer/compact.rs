use crate::error::{Error, Result};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::OnceLock;

/// Append-only output with an atomic write cursor.
///
/// Used when tasks emit a variable number of candidates (zero or one per
/// task in practice) and only the dense list of candidates matters, not
/// their task index.
#[derive(Debug)]
pub struct CompactBuffer<T> {
    slots: Box<[OnceLock<T>]>,
    cursor: AtomicUsize,
}

impl<T> CompactBuffer<T> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: (0..capacity).map(|_| OnceLock::new()).collect(),
            cursor: AtomicUsize::new(0),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Reserve the next position and store `value` there. Returns the
    /// position.
    pub fn push(&self, value: T) -> Result<usize> {
        let pos = self.cursor.fetch_add(1, Ordering::AcqRel);
        let slot = self.slots.get(pos).ok_or_else(|| {
            Error::schedule(format!(
                "compact buffer overflow: position {} with capacity {}",
                pos,
                self.slots.len()
            ))
        })?;
        slot.set(value)
            .map_err(|_| Error::schedule(format!("compact position {} reserved twice", pos)))?;
        Ok(pos)
    }

    /// Number of reserved positions, capped at capacity.
    pub fn len(&self) -> usize {
        self.cursor.load(Ordering::Acquire).min(self.slots.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        self.slots[..self.len()].iter().filter_map(OnceLock::get)
    }

    pub fn reset(&mut self) {
        for slot in self.slots.iter_mut() {
            slot.take();
        }
        *self.cursor.get_mut() = 0;
    }

    /// Move every stored value out, in position order.
    pub fn drain(&mut self) -> Vec<T> {
        let len = self.len();
        let out = self.slots[..len]
            .iter_mut()
            .filter_map(OnceLock::take)
            .collect();
        *self.cursor.get_mut() = 0;
        out
    }

    pub fn into_vec(mut self) -> Vec<T> {
        self.drain()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_push_is_dense() {
        let buffer = CompactBuffer::with_capacity(4);
        assert_eq!(buffer.push('a').unwrap(), 0);
        assert_eq!(buffer.push('b').unwrap(), 1);
        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.iter().copied().collect::<String>(), "ab");
    }

    #[test]
    fn test_overflow_is_reported() {
        let buffer = CompactBuffer::with_capacity(1);
        buffer.push(1).unwrap();
        assert!(buffer.push(2).unwrap_err().is_schedule_defect());
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn test_reset_and_drain() {
        let mut buffer = CompactBuffer::with_capacity(3);
        buffer.push(5).unwrap();
        buffer.push(6).unwrap();
        assert_eq!(buffer.drain(), vec![5, 6]);
        assert!(buffer.is_empty());

        buffer.push(7).unwrap();
        buffer.reset();
        assert!(buffer.is_empty());
        assert_eq!(buffer.push(8).unwrap(), 0);
    }

    #[test]
    fn test_concurrent_push() {
        let buffer = CompactBuffer::with_capacity(400);
        thread::scope(|s| {
            for t in 0..4 {
                let buffer = &buffer;
                s.spawn(move || {
                    for i in 0..100 {
                        buffer.push(t * 100 + i).unwrap();
                    }
                });
            }
        });
        let mut values = buffer.into_vec();
        values.sort_unstable();
        assert_eq!(values, (0..400).collect::<Vec<_>>());
    }
}
