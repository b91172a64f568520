use crate::error::{Error, Result};
use crate::partition::TaskIndex;
use std::sync::OnceLock;

/// Per-task output slots, written concurrently by host workers and the
/// accelerator on disjoint indices.
///
/// Each slot accepts one write per iteration. A second write or an index
/// past the end is reported as a schedule defect instead of being clamped,
/// since either means two participants believed they owned the same task.
#[derive(Debug)]
pub struct ResultBuffer<T> {
    slots: Box<[OnceLock<T>]>,
}

impl<T> ResultBuffer<T> {
    pub fn new(n_tasks: usize) -> Self {
        Self {
            slots: (0..n_tasks).map(|_| OnceLock::new()).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn write(&self, task: TaskIndex, value: T) -> Result<()> {
        let slot = self.slots.get(task).ok_or_else(|| {
            Error::schedule(format!(
                "task {} outside result buffer of {} slots",
                task,
                self.slots.len()
            ))
        })?;
        slot.set(value)
            .map_err(|_| Error::schedule(format!("task {} written twice", task)))
    }

    pub fn get(&self, task: TaskIndex) -> Option<&T> {
        self.slots.get(task).and_then(OnceLock::get)
    }

    pub fn is_written(&self, task: TaskIndex) -> bool {
        self.get(task).is_some()
    }

    pub fn written(&self) -> usize {
        self.slots.iter().filter(|s| s.get().is_some()).count()
    }

    /// Remove and return the value in `task`, leaving the slot empty.
    pub fn take(&mut self, task: TaskIndex) -> Option<T> {
        self.slots.get_mut(task).and_then(OnceLock::take)
    }

    /// Clear every slot for the next iteration.
    pub fn reset(&mut self) {
        for slot in self.slots.iter_mut() {
            slot.take();
        }
    }

    /// First unwritten slot, if any.
    pub fn first_missing(&self) -> Option<TaskIndex> {
        self.slots.iter().position(|s| s.get().is_none())
    }

    /// Fails on the first task nobody produced a value for.
    pub fn ensure_complete(&self) -> Result<()> {
        match self.first_missing() {
            Some(task) => Err(Error::schedule(format!(
                "task {} of {} was never executed",
                task,
                self.slots.len()
            ))),
            None => Ok(()),
        }
    }

    /// Values in task order, `None` for unwritten slots.
    pub fn iter(&self) -> impl Iterator<Item = Option<&T>> + '_ {
        self.slots.iter().map(OnceLock::get)
    }

    pub fn into_vec(self) -> Result<Vec<T>> {
        let len = self.slots.len();
        self.slots
            .into_vec()
            .into_iter()
            .enumerate()
            .map(|(task, slot)| {
                slot.into_inner().ok_or_else(|| {
                    Error::schedule(format!("task {} of {} was never executed", task, len))
                })
            })
            .collect()
    }
}

impl<T: Clone> ResultBuffer<T> {
    /// Clone out all values; fails if any slot is empty.
    pub fn to_vec(&self) -> Result<Vec<T>> {
        self.ensure_complete()?;
        Ok(self.slots.iter().filter_map(|s| s.get().cloned()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_write_and_read() {
        let buffer = ResultBuffer::new(3);
        buffer.write(1, "b").unwrap();
        assert_eq!(buffer.get(1), Some(&"b"));
        assert_eq!(buffer.get(0), None);
        assert_eq!(buffer.written(), 1);
        assert_eq!(buffer.first_missing(), Some(0));
    }

    #[test]
    fn test_duplicate_write_fails() {
        let buffer = ResultBuffer::new(2);
        buffer.write(0, 1).unwrap();
        let err = buffer.write(0, 2).unwrap_err();
        assert!(err.is_schedule_defect());
        // first value survives
        assert_eq!(buffer.get(0), Some(&1));
    }

    #[test]
    fn test_out_of_range_fails() {
        let buffer: ResultBuffer<u8> = ResultBuffer::new(2);
        assert!(buffer.write(2, 0).unwrap_err().is_schedule_defect());
        assert!(buffer.get(5).is_none());
    }

    #[test]
    fn test_reset_allows_rewrite() {
        let mut buffer = ResultBuffer::new(2);
        buffer.write(0, 10).unwrap();
        buffer.write(1, 11).unwrap();
        buffer.reset();
        assert_eq!(buffer.written(), 0);
        buffer.write(0, 20).unwrap();
        assert_eq!(buffer.get(0), Some(&20));
    }

    #[test]
    fn test_into_vec_requires_every_slot() {
        let buffer = ResultBuffer::new(3);
        buffer.write(0, 'a').unwrap();
        buffer.write(2, 'c').unwrap();
        assert!(buffer.ensure_complete().is_err());
        assert!(buffer.into_vec().is_err());

        let buffer = ResultBuffer::new(2);
        buffer.write(1, 'y').unwrap();
        buffer.write(0, 'x').unwrap();
        assert_eq!(buffer.into_vec().unwrap(), vec!['x', 'y']);
    }

    #[test]
    fn test_disjoint_concurrent_writes() {
        let buffer = ResultBuffer::new(1000);
        thread::scope(|s| {
            for t in 0..4 {
                let buffer = &buffer;
                s.spawn(move || {
                    for i in (t..1000).step_by(4) {
                        buffer.write(i, i * 3).unwrap();
                    }
                });
            }
        });
        let values = buffer.to_vec().unwrap();
        assert!(values.iter().enumerate().all(|(i, &v)| v == i * 3));
    }

    #[test]
    fn test_empty_buffer_is_complete() {
        let buffer: ResultBuffer<u32> = ResultBuffer::new(0);
        assert!(buffer.is_empty());
        assert!(buffer.ensure_complete().is_ok());
        assert!(buffer.into_vec().unwrap().is_empty());
    }
}
