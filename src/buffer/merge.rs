//! Combining host and accelerator outputs after the co-execution barrier.

use super::{CompactBuffer, ResultBuffer};
use crate::error::{Error, Result};
use crate::partition::TaskIndex;
use std::ops::Range;

/// Outcome of a partitioned merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Slots copied from the accelerator's buffer.
    pub copied: usize,
    /// Slots in the accelerator range already written by the host.
    pub kept: usize,
}

/// Copy the accelerator's results for `device_range` into `host`.
///
/// `device_range` must be the range the accelerator owned in the iteration
/// being merged. Device slots outside it are ignored even if written, and a
/// slot the host already produced wins over the device copy. An unwritten
/// device slot inside the range means the accelerator skipped a task it
/// owned and fails the merge.
pub fn merge_partitioned<T>(
    host: &mut ResultBuffer<T>,
    device: &mut ResultBuffer<T>,
    device_range: Range<TaskIndex>,
) -> Result<MergeReport> {
    if host.len() != device.len() {
        return Err(Error::schedule(format!(
            "merge of mismatched buffers: host {} slots, device {} slots",
            host.len(),
            device.len()
        )));
    }
    if device_range.start > device_range.end || device_range.end > host.len() {
        return Err(Error::schedule(format!(
            "device range {:?} outside {} slots",
            device_range,
            host.len()
        )));
    }

    let mut report = MergeReport::default();
    for task in device_range {
        if host.is_written(task) {
            report.kept += 1;
            continue;
        }
        let value = device.take(task).ok_or_else(|| {
            Error::schedule(format!("accelerator left task {} unwritten", task))
        })?;
        host.write(task, value)?;
        report.copied += 1;
    }
    Ok(report)
}

/// Append the device's candidates after the host's. Returns how many were
/// appended.
pub fn append<T>(host: &mut CompactBuffer<T>, device: &mut CompactBuffer<T>) -> Result<usize> {
    let moved = device.drain();
    let count = moved.len();
    for value in moved {
        host.push(value)?;
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_static_split() {
        let mut host = ResultBuffer::new(100);
        let mut device = ResultBuffer::new(100);
        for i in 0..30 {
            host.write(i, 'H').unwrap();
        }
        for i in 30..100 {
            device.write(i, 'A').unwrap();
        }

        let report = merge_partitioned(&mut host, &mut device, 30..100).unwrap();
        assert_eq!(report, MergeReport { copied: 70, kept: 0 });
        for i in 0..100 {
            let expected = if i < 30 { 'H' } else { 'A' };
            assert_eq!(host.get(i), Some(&expected));
        }
    }

    #[test]
    fn test_merge_ignores_device_output_outside_its_range() {
        let mut host = ResultBuffer::new(10);
        let mut device = ResultBuffer::new(10);
        for i in 0..4 {
            host.write(i, 1).unwrap();
        }
        // stale device values below the cut must not overwrite the host
        for i in 0..10 {
            device.write(i, 2).unwrap();
        }
        merge_partitioned(&mut host, &mut device, 4..10).unwrap();
        assert_eq!(host.to_vec().unwrap(), vec![1, 1, 1, 1, 2, 2, 2, 2, 2, 2]);
    }

    #[test]
    fn test_host_written_slots_take_precedence() {
        let mut host = ResultBuffer::new(4);
        let mut device = ResultBuffer::new(4);
        host.write(3, "host").unwrap();
        for i in 2..4 {
            device.write(i, "device").unwrap();
        }
        let report = merge_partitioned(&mut host, &mut device, 2..4).unwrap();
        assert_eq!(report, MergeReport { copied: 1, kept: 1 });
        assert_eq!(host.get(3), Some(&"host"));
        assert_eq!(host.get(2), Some(&"device"));
    }

    #[test]
    fn test_missing_device_slot_fails() {
        let mut host: ResultBuffer<u8> = ResultBuffer::new(3);
        let mut device = ResultBuffer::new(3);
        device.write(1, 9).unwrap();
        let err = merge_partitioned(&mut host, &mut device, 1..3).unwrap_err();
        assert!(err.is_schedule_defect());
    }

    #[test]
    fn test_range_and_size_checks() {
        let mut host: ResultBuffer<u8> = ResultBuffer::new(3);
        let mut device: ResultBuffer<u8> = ResultBuffer::new(4);
        assert!(merge_partitioned(&mut host, &mut device, 0..3).is_err());

        let mut device: ResultBuffer<u8> = ResultBuffer::new(3);
        assert!(merge_partitioned(&mut host, &mut device, 2..5).is_err());
        // empty range is a no-op
        assert_eq!(
            merge_partitioned(&mut host, &mut device, 3..3).unwrap(),
            MergeReport::default()
        );
    }

    #[test]
    fn test_append_places_device_after_host() {
        let mut host = CompactBuffer::with_capacity(5);
        let mut device = CompactBuffer::with_capacity(5);
        host.push("h0").unwrap();
        host.push("h1").unwrap();
        device.push("d0").unwrap();
        device.push("d1").unwrap();
        device.push("d2").unwrap();

        assert_eq!(append(&mut host, &mut device).unwrap(), 3);
        assert!(device.is_empty());
        assert_eq!(
            host.iter().copied().collect::<Vec<_>>(),
            vec!["h0", "h1", "d0", "d1", "d2"]
        );
    }

    #[test]
    fn test_append_overflow_fails() {
        let mut host = CompactBuffer::with_capacity(1);
        let mut device = CompactBuffer::with_capacity(2);
        host.push(0).unwrap();
        device.push(1).unwrap();
        assert!(append(&mut host, &mut device).is_err());
    }
}
