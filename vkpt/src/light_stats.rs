use std::sync::atomic::{AtomicU32, Ordering};

use log::debug;

use crate::gpu;

/// Host-memory counterpart of the rotating light-statistics buffers.
///
/// Frame `f` accumulates into buffer `f % 3` and reads buffer `(f + 1) % 3`,
/// that is: the one accumulated by frame `f - 2`.
#[derive(Debug, Default)]
pub struct LightStatsRing {
    buffers: [Vec<AtomicU32>; gpu::NUM_LIGHT_STATS_BUFFERS as usize],
    read: Vec<u32>,
    schedule: Option<gpu::LightStatsSchedule>,
}

impl LightStatsRing {
    pub fn new() -> Self {
        Default::default()
    }

    /// Clears this frame's buffer and takes a snapshot of the readable one.
    ///
    /// When the number of light-list entries changes, counters no longer line
    /// up with their entries, so all buffers start over from zero.
    pub fn begin_frame(&mut self, frame: u32, list_entries: u32) {
        let len = gpu::light_stats_buffer_len(list_entries);
        let schedule = gpu::LightStatsSchedule::for_frame(frame);

        if self.buffers[0].len() != len {
            debug!("Resetting light stats buffers; len={len}");

            for buffer in &mut self.buffers {
                *buffer = (0..len).map(|_| AtomicU32::new(0)).collect();
            }
        }

        for counter in &self.buffers[schedule.clear() as usize] {
            counter.store(0, Ordering::Relaxed);
        }

        self.read = self.buffers[schedule.read as usize]
            .iter()
            .map(|counter| counter.load(Ordering::Relaxed))
            .collect();

        self.schedule = Some(schedule);
    }

    pub fn schedule(&self) -> Option<gpu::LightStatsSchedule> {
        self.schedule
    }

    pub fn view(&self) -> Option<gpu::LightStatsView<'_>> {
        let schedule = self.schedule?;

        Some(gpu::LightStatsView::new(
            &self.read,
            &self.buffers[schedule.write as usize],
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_becomes_visible_two_frames_later() {
        let mut target = LightStatsRing::new();

        assert!(target.view().is_none());

        // Frame 0 sees its light as always shadowed
        target.begin_frame(0, 1);
        target.view().unwrap().record(0, 0, false);

        target.begin_frame(1, 1);
        assert_eq!(1.0, target.view().unwrap().factor(0, 0));

        target.begin_frame(2, 1);
        assert_eq!(gpu::LIGHT_STATS_MIN_FACTOR, target.view().unwrap().factor(0, 0));

        // ... and once the buffer gets reused, the data is gone
        target.begin_frame(3, 1);
        target.begin_frame(4, 1);
        target.begin_frame(5, 1);
        assert_eq!(1.0, target.view().unwrap().factor(0, 0));
    }

    #[test]
    fn resizing_discards_statistics() {
        let mut target = LightStatsRing::new();

        for frame in 0..3 {
            target.begin_frame(frame, 1);
            target.view().unwrap().record(0, 0, false);
        }

        // Frame 2 would see frame 0's shadowed sample...
        assert_eq!(gpu::LIGHT_STATS_MIN_FACTOR, target.view().unwrap().factor(0, 0));

        // ... but not after the light list has changed
        target.begin_frame(3, 2);
        assert_eq!(1.0, target.view().unwrap().factor(0, 0));

        target.begin_frame(4, 2);
        assert_eq!(1.0, target.view().unwrap().factor(0, 0));
        assert!(target.buffers.iter().all(|buffer| {
            buffer.iter().all(|counter| counter.load(Ordering::Relaxed) == 0)
        }));
    }

    #[test]
    fn buffers_rotate() {
        let mut target = LightStatsRing::new();

        for frame in 0..6 {
            target.begin_frame(frame, 1);

            let view = target.view().unwrap();

            // Frame `f` sees what frame `f - 2` recorded
            if frame >= 2 {
                assert_eq!(frame - 2, view.read[1]);
            }

            for _ in 0..frame {
                view.record(0, 0, false);
            }

            assert_eq!(frame % 3, target.schedule().unwrap().write);
        }
    }
}
