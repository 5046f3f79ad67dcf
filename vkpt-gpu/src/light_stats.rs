use core::sync::atomic::{AtomicU32, Ordering};

use crate::NUM_LIGHT_STATS_BUFFERS;

/// Number of counters per (light-list entry, normal octant) pair: unshadowed
/// samples and all samples.
pub const LIGHT_STATS_COUNTERS: u32 = 2;

/// Number of normal octants light statistics are bucketed by.
pub const LIGHT_STATS_OCTANTS: u32 = 8;

/// Lower bound of the factor applied to a light's selection mass.
pub const LIGHT_STATS_MIN_FACTOR: f32 = 0.1;

/// Which light-statistics buffers a frame touches.
///
/// A frame accumulates into `frame % 3`, which must be cleared first, and
/// reads `(frame + 1) % 3`, i.e. the buffer accumulated two frames ago; by
/// then that frame's work has finished.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LightStatsSchedule {
    pub write: u32,
    pub read: u32,
}

impl LightStatsSchedule {
    pub fn for_frame(frame: u32) -> Self {
        Self {
            write: frame % NUM_LIGHT_STATS_BUFFERS,
            read: (frame + 1) % NUM_LIGHT_STATS_BUFFERS,
        }
    }

    /// Buffer that has to be zeroed before the frame starts.
    pub fn clear(&self) -> u32 {
        self.write
    }
}

/// Returns address of the first counter of given light-list entry (that is:
/// a light within a cluster's list) and normal octant.
pub fn light_stats_addr(list_entry: u32, octant: u32) -> usize {
    ((list_entry * LIGHT_STATS_OCTANTS + octant) * LIGHT_STATS_COUNTERS) as usize
}

/// Number of words of a light-statistics buffer covering given number of
/// light-list entries.
pub fn light_stats_buffer_len(list_entries: u32) -> usize {
    light_stats_addr(list_entries, 0)
}

pub struct LightStatsView<'a> {
    /// Buffer accumulated two frames ago
    pub read: &'a [u32],

    /// Buffer accumulated by this frame
    pub write: &'a [AtomicU32],
}

impl<'a> LightStatsView<'a> {
    pub fn new(read: &'a [u32], write: &'a [AtomicU32]) -> Self {
        Self { read, write }
    }

    /// Returns factor to multiply light's selection mass with:
    /// `max(unshadowed / total, 0.1)`, or `1.0` when there's no data.
    pub fn factor(&self, list_entry: u32, octant: u32) -> f32 {
        let addr = light_stats_addr(list_entry, octant);

        let (Some(unshadowed), Some(total)) = (self.read.get(addr), self.read.get(addr + 1))
        else {
            return 1.0;
        };

        if *total == 0 {
            1.0
        } else {
            (*unshadowed as f32 / *total as f32).max(LIGHT_STATS_MIN_FACTOR)
        }
    }

    pub fn record(&self, list_entry: u32, octant: u32, unshadowed: bool) {
        let addr = light_stats_addr(list_entry, octant);

        if let (Some(hits), Some(total)) = (self.write.get(addr), self.write.get(addr + 1)) {
            if unshadowed {
                hits.fetch_add(1, Ordering::Relaxed);
            }

            total.fetch_add(1, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schedule() {
        for frame in 0..12 {
            let schedule = LightStatsSchedule::for_frame(frame);

            assert_eq!(frame % 3, schedule.write);
            assert_eq!(schedule.write, schedule.clear());
            assert_ne!(schedule.write, schedule.read);
        }
    }

    #[test]
    fn buffers_are_never_read_before_two_frames_pass() {
        for frame in 0..30 {
            let written = LightStatsSchedule::for_frame(frame).write;

            // Neither the frame itself nor the next one reads its buffer
            assert_ne!(written, LightStatsSchedule::for_frame(frame).read);
            assert_ne!(written, LightStatsSchedule::for_frame(frame + 1).read);

            // The one after does, before the buffer gets cleared again
            assert_eq!(written, LightStatsSchedule::for_frame(frame + 2).read);
            assert_eq!(written, LightStatsSchedule::for_frame(frame + 3).clear());
        }
    }

    #[test]
    fn addresses_are_unique() {
        let mut addrs = Vec::new();

        for entry in 0..4 {
            for octant in 0..LIGHT_STATS_OCTANTS {
                addrs.push(light_stats_addr(entry, octant));
            }
        }

        let len = addrs.len();

        addrs.sort_unstable();
        addrs.dedup();

        assert_eq!(len, addrs.len());
        assert!(addrs.iter().all(|addr| addr + 1 < light_stats_buffer_len(4)));
    }

    #[test]
    fn factor() {
        let write: Vec<_> = (0..light_stats_buffer_len(2))
            .map(|_| AtomicU32::new(0))
            .collect();

        let view = LightStatsView::new(&[], &write);

        view.record(1, 3, true);
        view.record(1, 3, false);
        view.record(1, 3, false);
        view.record(1, 3, false);
        view.record(0, 0, false);

        let read: Vec<_> = write.iter().map(|c| c.load(Ordering::Relaxed)).collect();
        let view = LightStatsView::new(&read, &write);

        assert_eq!(0.25, view.factor(1, 3));
        assert_eq!(LIGHT_STATS_MIN_FACTOR, view.factor(0, 0));
        assert_eq!(1.0, view.factor(1, 4));
        assert_eq!(1.0, view.factor(100, 0));
    }
}
