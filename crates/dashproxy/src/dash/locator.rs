use dash_mpd::{AdaptationSet, BaseURL, Period, Representation, SegmentTemplate, SegmentTimeline, MPD};

use super::address::RepresentationAddress;
use crate::{ProxyError, ProxyResult};

/// Read-only navigation from a [`RepresentationAddress`] to the MPD nodes describing it.
///
/// Nothing is cached: every lookup walks `MPD -> Period -> AdaptationSet -> Representation`.
#[derive(Clone, Copy)]
pub struct ManifestLocator<'a> {
    mpd: &'a MPD,
}

impl<'a> ManifestLocator<'a> {
    pub fn new(mpd: &'a MPD) -> Self {
        Self { mpd }
    }

    /// Every representation of a period, in document order.
    pub fn addresses(&self, period: usize) -> Vec<RepresentationAddress> {
        let Some(period_node) = self.mpd.periods.get(period) else {
            return Vec::new();
        };

        period_node
            .adaptations
            .iter()
            .enumerate()
            .flat_map(|(adaptation_set, node)| {
                (0..node.representations.len()).map(move |representation| {
                    RepresentationAddress::new(period, adaptation_set, representation)
                })
            })
            .collect()
    }

    pub fn period(&self, addr: &RepresentationAddress) -> ProxyResult<&'a Period> {
        self.mpd
            .periods
            .get(addr.period)
            .ok_or_else(|| out_of_range(addr, "period", self.mpd.periods.len()))
    }

    pub fn adaptation_set(&self, addr: &RepresentationAddress) -> ProxyResult<&'a AdaptationSet> {
        let period = self.period(addr)?;
        period
            .adaptations
            .get(addr.adaptation_set)
            .ok_or_else(|| out_of_range(addr, "adaptation set", period.adaptations.len()))
    }

    pub fn representation(&self, addr: &RepresentationAddress) -> ProxyResult<&'a Representation> {
        let adaptation_set = self.adaptation_set(addr)?;
        adaptation_set
            .representations
            .get(addr.representation)
            .ok_or_else(|| {
                out_of_range(addr, "representation", adaptation_set.representations.len())
            })
    }

    /// The representation's own template wins over the one of its adaptation set.
    pub fn segment_template(
        &self,
        addr: &RepresentationAddress,
    ) -> ProxyResult<Option<&'a SegmentTemplate>> {
        let representation = self.representation(addr)?;
        if let Some(template) = representation.SegmentTemplate.as_ref() {
            return Ok(Some(template));
        }

        Ok(self.adaptation_set(addr)?.SegmentTemplate.as_ref())
    }

    /// `None` when there is no template, or the template uses `@duration` addressing.
    pub fn segment_timeline(
        &self,
        addr: &RepresentationAddress,
    ) -> ProxyResult<Option<&'a SegmentTimeline>> {
        Ok(self
            .segment_template(addr)?
            .and_then(|template| template.SegmentTimeline.as_ref()))
    }

    pub fn base_url(&self, addr: &RepresentationAddress) -> ProxyResult<Option<&'a BaseURL>> {
        Ok(self.representation(addr)?.BaseURL.first())
    }
}

fn out_of_range(addr: &RepresentationAddress, level: &'static str, len: usize) -> ProxyError {
    ProxyError::AddressOutOfRange {
        address: *addr,
        level,
        len,
    }
}
