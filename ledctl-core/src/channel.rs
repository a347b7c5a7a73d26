//! `OutputChannel`: the hardware-facing boundary.
//!
//! One physical data line, one contiguous addressable strip. Exactly one
//! atomic flush per call; RGB is materialized from `Color` only here.
//! `BufferChannel` is the in-memory implementation used by tests, the
//! `--dry-run` CLI mode, and as the skeleton a real chip driver replaces
//! (the chip driver itself is out of scope -- see `spec.md` §1).

use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::color::Color;
use crate::error::OutputError;
use crate::zone::ZoneId;

/// Closed set of output channels. "Typically one main + one preview"
/// per `spec.md` §4.2.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChannelId {
    Main,
    Preview,
}

/// Byte order the strip's driver expects pixel triples in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ByteOrder {
    #[default]
    Rgb,
    Rbg,
    Grb,
    Gbr,
    Brg,
    Bgr,
}

impl ByteOrder {
    pub fn reorder(&self, (r, g, b): (u8, u8, u8)) -> (u8, u8, u8) {
        match self {
            ByteOrder::Rgb => (r, g, b),
            ByteOrder::Rbg => (r, b, g),
            ByteOrder::Grb => (g, r, b),
            ByteOrder::Gbr => (g, b, r),
            ByteOrder::Brg => (b, r, g),
            ByteOrder::Bgr => (b, g, r),
        }
    }
}

/// Abstraction over one physical data line. Implementors own their staging
/// buffer and perform exactly one hardware flush per `apply_*` call.
pub trait OutputChannel: Send {
    fn id(&self) -> ChannelId;
    fn pixel_count(&self) -> usize;
    fn min_flush_interval(&self) -> Duration;

    fn apply_full(&mut self, color: &Color) -> Result<(), OutputError>;
    fn apply_zone_map(&mut self, map: &HashMap<ZoneId, Color>) -> Result<(), OutputError>;
    fn apply_pixel_frame(&mut self, pixels: &HashMap<ZoneId, Vec<Color>>) -> Result<(), OutputError>;
    fn apply_preview(&mut self, pixels: &[Color; 8]) -> Result<(), OutputError>;

    /// Zero the staging buffer and flush once.
    fn clear(&mut self) -> Result<(), OutputError>;

    /// Zone-to-absolute-range lookup used to translate `(ZoneId, relative_index)`.
    fn zone_range(&self, zone: ZoneId) -> Option<(usize, usize)>;
}

/// In-memory `OutputChannel`. Staging buffer is plain RGB triples in the
/// channel's native byte order; `flush()` is the only "hardware write."
pub struct BufferChannel {
    id: ChannelId,
    byte_order: ByteOrder,
    staging: Vec<(u8, u8, u8)>,
    zones: HashMap<ZoneId, (usize, usize)>,
    min_flush_interval: Duration,
    last_flush: Option<Instant>,
    /// Most recently flushed frame, exposed for tests / diagnostics.
    pub last_flushed: Vec<(u8, u8, u8)>,
    consecutive_failures: u32,
    fail_next_n: u32,
}

impl BufferChannel {
    pub fn new(id: ChannelId, pixel_count: usize, zones: HashMap<ZoneId, (usize, usize)>) -> Self {
        Self {
            id,
            byte_order: ByteOrder::default(),
            staging: vec![(0, 0, 0); pixel_count],
            zones,
            min_flush_interval: Duration::from_micros(2750),
            last_flush: None,
            last_flushed: vec![(0, 0, 0); pixel_count],
            consecutive_failures: 0,
            fail_next_n: 0,
        }
    }

    pub fn with_byte_order(mut self, order: ByteOrder) -> Self {
        self.byte_order = order;
        self
    }

    pub fn with_min_flush_interval(mut self, interval: Duration) -> Self {
        self.min_flush_interval = interval;
        self
    }

    /// Test hook: make the next `n` flushes fail, to exercise quarantine logic.
    #[cfg(test)]
    pub fn inject_failures(&mut self, n: u32) {
        self.fail_next_n = n;
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    fn flush(&mut self) -> Result<(), OutputError> {
        if self.fail_next_n > 0 {
            self.fail_next_n -= 1;
            self.consecutive_failures += 1;
            return Err(OutputError::FlushFailed {
                channel: self.id,
                reason: "injected test failure".to_string(),
            });
        }
        self.consecutive_failures = 0;
        self.last_flush = Some(Instant::now());
        self.last_flushed = self.staging.iter().map(|c| self.byte_order.reorder(*c)).collect();
        Ok(())
    }
}

impl OutputChannel for BufferChannel {
    fn id(&self) -> ChannelId {
        self.id
    }

    fn pixel_count(&self) -> usize {
        self.staging.len()
    }

    fn min_flush_interval(&self) -> Duration {
        self.min_flush_interval
    }

    fn zone_range(&self, zone: ZoneId) -> Option<(usize, usize)> {
        self.zones.get(&zone).copied()
    }

    fn apply_full(&mut self, color: &Color) -> Result<(), OutputError> {
        let rgb = color.to_rgb();
        self.staging.iter_mut().for_each(|p| *p = rgb);
        self.flush()
    }

    fn apply_zone_map(&mut self, map: &HashMap<ZoneId, Color>) -> Result<(), OutputError> {
        self.staging.iter_mut().for_each(|p| *p = (0, 0, 0));
        for (zone, color) in map {
            if let Some((start, end)) = self.zone_range(*zone) {
                let rgb = color.to_rgb();
                for px in &mut self.staging[start..end] {
                    *px = rgb;
                }
            }
        }
        self.flush()
    }

    fn apply_pixel_frame(&mut self, pixels: &HashMap<ZoneId, Vec<Color>>) -> Result<(), OutputError> {
        self.staging.iter_mut().for_each(|p| *p = (0, 0, 0));
        for (zone, colors) in pixels {
            if let Some((start, _end)) = self.zone_range(*zone) {
                for (i, color) in colors.iter().enumerate() {
                    if let Some(slot) = self.staging.get_mut(start + i) {
                        *slot = color.to_rgb();
                    }
                }
            }
        }
        self.flush()
    }

    fn apply_preview(&mut self, pixels: &[Color; 8]) -> Result<(), OutputError> {
        for (slot, color) in self.staging.iter_mut().zip(pixels.iter()) {
            *slot = color.to_rgb();
        }
        self.flush()
    }

    fn clear(&mut self) -> Result<(), OutputError> {
        self.staging.iter_mut().for_each(|p| *p = (0, 0, 0));
        self.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel() -> BufferChannel {
        let mut zones = HashMap::new();
        zones.insert(ZoneId::Floor, (0, 15));
        BufferChannel::new(ChannelId::Main, 30, zones)
    }

    #[test]
    fn full_strip_paints_every_pixel() {
        let mut c = channel();
        c.apply_full(&Color::Raw(1, 2, 3)).unwrap();
        assert!(c.last_flushed.iter().all(|p| *p == (1, 2, 3)));
    }

    #[test]
    fn zone_map_leaves_unlisted_pixels_black() {
        let mut c = channel();
        let mut map = HashMap::new();
        map.insert(ZoneId::Floor, Color::Raw(255, 0, 0));
        c.apply_zone_map(&map).unwrap();
        assert!(c.last_flushed[0..15].iter().all(|p| *p == (255, 0, 0)));
        assert!(c.last_flushed[15..30].iter().all(|p| *p == (0, 0, 0)));
    }

    #[test]
    fn byte_order_reorders_on_flush() {
        let mut c = channel().with_byte_order(ByteOrder::Bgr);
        c.apply_full(&Color::Raw(10, 20, 30)).unwrap();
        assert!(c.last_flushed.iter().all(|p| *p == (30, 20, 10)));
    }

    #[test]
    fn injected_failures_surface_as_output_error() {
        let mut c = channel();
        c.inject_failures(1);
        assert!(c.apply_full(&Color::black()).is_err());
        assert_eq!(c.consecutive_failures(), 1);
        c.apply_full(&Color::black()).unwrap();
        assert_eq!(c.consecutive_failures(), 0);
    }
}
