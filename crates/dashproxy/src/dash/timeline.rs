use dash_mpd::{SegmentTimeline, S};

/// One `S` element of a `SegmentTimeline`, in its compact run-length form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimelineEntry {
    /// `S@d`, in timescale units
    pub duration: u64,
    /// `S@r`, number of additional segments with the same duration
    pub repeat: u64,
    /// `S@t`, resets the timeline clock when present
    pub start_time: Option<u64>,
}

impl TimelineEntry {
    pub fn new(duration: u64, repeat: u64, start_time: Option<u64>) -> Self {
        Self {
            duration,
            repeat,
            start_time,
        }
    }

    /// Read the compact entries of a timeline without touching the MPD tree.
    pub fn from_timeline(timeline: &SegmentTimeline) -> Vec<Self> {
        timeline.segments.iter().map(Self::from).collect()
    }
}

impl From<&S> for TimelineEntry {
    fn from(s: &S) -> Self {
        // The last S element may carry a negative @r meaning "repeat until the period ends".
        // That needs period timing which is not tracked here, so it counts as a single segment.
        let repeat = match s.r {
            Some(r) if r < 0 => {
                tracing::warn!(r, "Open-ended S@r is not supported, treating as 0");
                0
            }
            Some(r) => r as u64,
            None => 0,
        };

        Self {
            duration: s.d,
            repeat,
            start_time: s.t,
        }
    }
}

/// A concrete media segment after repeat expansion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SegmentDescriptor {
    /// `$Number$`
    pub sequence_number: u64,
    /// `$Time$`
    pub start_time: u64,
}

impl SegmentDescriptor {
    pub fn new(sequence_number: u64, start_time: u64) -> Self {
        Self {
            sequence_number,
            start_time,
        }
    }
}

/// Iterator expanding compact timeline entries into [`SegmentDescriptor`]s.
///
/// > Only additional segment references are counted by @r, so S@r=5 indicates a total of
/// > 6 consecutive media segments with the same duration.
///
/// Gaps and overlaps described by `S@t` are passed through untouched.
pub struct SegmentTimelineExpander<'a> {
    entries: std::slice::Iter<'a, TimelineEntry>,
    current: Option<(TimelineEntry, u64)>,
    clock: u64,
    next_number: u64,
}

impl<'a> SegmentTimelineExpander<'a> {
    pub fn new(entries: &'a [TimelineEntry]) -> Self {
        Self::with_start_number(entries, 1)
    }

    /// Number the first segment with `start_number` instead of 1 (`SegmentTemplate@startNumber`).
    pub fn with_start_number(entries: &'a [TimelineEntry], start_number: u64) -> Self {
        Self {
            entries: entries.iter(),
            current: None,
            clock: 0,
            next_number: start_number,
        }
    }
}

impl Iterator for SegmentTimelineExpander<'_> {
    type Item = SegmentDescriptor;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some((entry, remaining)) = self.current.as_mut() {
                if *remaining > 0 {
                    *remaining -= 1;

                    let descriptor = SegmentDescriptor::new(self.next_number, self.clock);
                    self.next_number += 1;
                    self.clock += entry.duration;
                    return Some(descriptor);
                }
            }

            let entry = *self.entries.next()?;
            if let Some(start_time) = entry.start_time {
                self.clock = start_time;
            }
            self.current = Some((entry, entry.repeat + 1));
        }
    }
}

/// Expand a whole timeline, numbering segments from 1.
pub fn expand(entries: &[TimelineEntry]) -> Vec<SegmentDescriptor> {
    SegmentTimelineExpander::new(entries).collect()
}
