// References:
// 1. https://github.com/clitic/vsd/blob/30ca1985e4a467ea3304b11c08d3176deaafd22a/vsd/src/dash/template.rs
// 2. ISO/IEC 23009-1:2014 5.3.9.4.4, Template-based Segment URL construction

use regex::Regex;
use std::sync::LazyLock;

use super::timeline::SegmentDescriptor;
use crate::{ProxyError, ProxyResult};

// From https://dashif.org/docs/DASH-IF-IOP-v4.3.pdf:
// "For the avoidance of doubt, only %0[width]d is permitted and no other identifiers. The reason
// is that such a string replacement can be easily implemented without requiring a specific library."
//
// Example template: "$RepresentationID$/$Number%06d$.m4s"
//
// Other identifiers are matched as a whole so that their closing `$` is never taken for the
// start of an escaped `$$`.
static TEMPLATE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$(?:(RepresentationID|Number|Time)(?:%0(\d+)d)?|([A-Za-z]+)(?:%0\d+d)?)?\$")
        .unwrap()
});

/// Values available to a `SegmentTemplate@initialization` or `SegmentTemplate@media` string.
///
/// Unknown identifiers such as `$Bandwidth$` are left in the output untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct Template<'a> {
    representation_id: Option<&'a str>,
    segment: Option<SegmentDescriptor>,
}

impl<'a> Template<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_representation_id(mut self, id: Option<&'a str>) -> Self {
        self.representation_id = id;
        self
    }

    pub fn with_segment(mut self, segment: SegmentDescriptor) -> Self {
        self.segment = Some(segment);
        self
    }

    pub fn resolve(&self, template: &str) -> ProxyResult<String> {
        let mut result = String::with_capacity(template.len() + 16);
        let mut last = 0;

        for caps in TEMPLATE_REGEX.captures_iter(template) {
            let Some(whole) = caps.get(0) else {
                continue;
            };
            result.push_str(&template[last..whole.start()]);
            last = whole.end();

            if caps.get(3).is_some() {
                result.push_str(whole.as_str());
                continue;
            }
            // `$$` is an escaped dollar sign
            let Some(key) = caps.get(1).map(|m| m.as_str()) else {
                result.push('$');
                continue;
            };

            let value = match key {
                "RepresentationID" => self.representation_id.map(str::to_string),
                "Number" => self.segment.map(|s| s.sequence_number.to_string()),
                "Time" => self.segment.map(|s| s.start_time.to_string()),
                _ => None,
            };
            let Some(value) = value else {
                return Err(ProxyError::UnresolvedMarker {
                    marker: key.to_string(),
                    template: template.to_string(),
                });
            };

            match caps.get(2).and_then(|m| m.as_str().parse::<usize>().ok()) {
                Some(width) => result.push_str(&format!("{value:0>width$}")),
                None => result.push_str(&value),
            }
        }
        result.push_str(&template[last..]);

        Ok(result)
    }
}
