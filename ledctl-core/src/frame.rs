//! Immutable frame types: what the next flush should paint.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::color::Color;
use crate::error::FrameError;
use crate::zone::ZoneId;

/// Default time-to-live for a submitted frame.
pub const DEFAULT_TTL: Duration = Duration::from_millis(100);

/// Totally ordered priority levels. Higher wins; ties break on submission
/// recency (most recent wins).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    Idle = 0,
    Manual = 10,
    Pulse = 20,
    Animation = 30,
    Transition = 40,
    Debug = 50,
}

impl Priority {
    /// All levels, highest first -- the order the FrameManager walks them in.
    pub const DESCENDING: [Priority; 6] = [
        Priority::Debug,
        Priority::Transition,
        Priority::Animation,
        Priority::Pulse,
        Priority::Manual,
        Priority::Idle,
    ];
}

/// Who submitted a frame. Used for logging/introspection only; never
/// influences selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Source {
    Idle,
    Static,
    Pulse,
    Animation,
    Transition,
    Preview,
    Debug,
}

/// What the channel's pixels should become on the next flush.
#[derive(Clone, Debug, PartialEq)]
pub enum FrameKind {
    /// Paint every pixel of the channel with one color.
    FullStrip(Color),
    /// Per-zone uniform colors; unlisted zones leave the rest of the channel
    /// black (see open question in spec -- pixel/zone frames are
    /// authoritative over the whole channel).
    Zone(HashMap<ZoneId, Color>),
    /// Per-pixel colors inside named zones.
    Pixel(HashMap<ZoneId, Vec<Color>>),
    /// Fixed 8-pixel preview buffer.
    Preview([Color; 8]),
}

/// An immutable, timestamped, prioritized unit of rendering work.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    pub kind: FrameKind,
    pub priority: Priority,
    pub source: Source,
    pub submitted_at: Instant,
    pub ttl: Duration,
}

impl Frame {
    pub fn new(kind: FrameKind, priority: Priority, source: Source) -> Self {
        Self {
            kind,
            priority,
            source,
            submitted_at: Instant::now(),
            ttl: DEFAULT_TTL,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.submitted_at) > self.ttl
    }

    /// Validate the shape invariants that apply to this frame's kind against
    /// a zone's configured pixel count (for `Pixel`) or the fixed preview
    /// size (for `Preview`). `Pixel` frames are validated per zone by the
    /// caller, which knows each zone's configured pixel count; this method
    /// validates the invariants that do not require that context.
    pub fn validate_preview(&self) -> Result<(), FrameError> {
        if let FrameKind::Preview(pixels) = &self.kind {
            if pixels.len() != 8 {
                return Err(FrameError::PreviewLengthMismatch {
                    got: pixels.len(),
                    expected: 8,
                });
            }
        }
        Ok(())
    }

    pub fn validate_zone_pixels(
        &self,
        zone: ZoneId,
        expected: usize,
    ) -> Result<(), FrameError> {
        if let FrameKind::Pixel(map) = &self.kind {
            if let Some(pixels) = map.get(&zone) {
                if pixels.len() != expected {
                    return Err(FrameError::ZonePixelCountMismatch {
                        zone,
                        got: pixels.len(),
                        expected,
                    });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priority_order() {
        assert!(Priority::Debug > Priority::Transition);
        assert!(Priority::Transition > Priority::Animation);
        assert!(Priority::Animation > Priority::Pulse);
        assert!(Priority::Pulse > Priority::Manual);
        assert!(Priority::Manual > Priority::Idle);
    }

    #[test]
    fn frame_expires_after_ttl() {
        let f = Frame::new(FrameKind::FullStrip(Color::black()), Priority::Manual, Source::Static)
            .with_ttl(Duration::from_millis(10));
        assert!(!f.is_expired(f.submitted_at));
        assert!(f.is_expired(f.submitted_at + Duration::from_millis(11)));
    }
}
