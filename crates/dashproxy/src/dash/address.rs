use std::fmt;

/// Position of a representation inside an MPD, as observed in one manifest snapshot.
///
/// The indices are only meaningful against the snapshot they were taken from: a refreshed
/// MPD that reorders adaptation sets makes the same address point at different content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RepresentationAddress {
    pub period: usize,
    pub adaptation_set: usize,
    pub representation: usize,
}

impl RepresentationAddress {
    pub fn new(period: usize, adaptation_set: usize, representation: usize) -> Self {
        Self {
            period,
            adaptation_set,
            representation,
        }
    }
}

impl fmt::Display for RepresentationAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Representation (period={} adaptation-set={} representation={})",
            self.period, self.adaptation_set, self.representation
        )
    }
}
