//! ColorSnake: like Snake, but the segment is a short rainbow spread
//! between `Hue` and `Hue + HueOffset`.

use std::collections::HashMap;
use std::time::Instant;

use async_trait::async_trait;
use tokio::time::{sleep, Duration};

use crate::color::Color;
use crate::error::ParamError;
use crate::frame::{Frame, FrameKind, Priority, Source};
use crate::zone::ZoneId;

use super::{Animation, AnimationId, ParamDecl, ParamId, ParamMap, ParamValue, ZoneSpan};

const FRAME_INTERVAL: Duration = Duration::from_millis(1000 / 60);

pub struct ColorSnake {
    zones: Vec<ZoneId>,
    pixel_counts: HashMap<ZoneId, usize>,
    params: ParamMap,
    start: Instant,
}

impl ColorSnake {
    pub fn new(zones: Vec<ZoneSpan>) -> Self {
        let pixel_counts: HashMap<ZoneId, usize> = zones.iter().copied().collect();
        let zone_ids: Vec<ZoneId> = zones.into_iter().map(|(z, _)| z).collect();

        let mut map = HashMap::new();
        map.insert(
            ParamId::Speed,
            (
                ParamDecl::Int { min: 1, max: 100, step: 1, default: 50 },
                ParamValue::Int(50),
            ),
        );
        map.insert(
            ParamId::Length,
            (
                ParamDecl::Int { min: 2, max: 5, step: 1, default: 3 },
                ParamValue::Int(3),
            ),
        );
        map.insert(ParamId::Hue, (ParamDecl::Hue { default: 0 }, ParamValue::Hue(0)));
        map.insert(
            ParamId::HueOffset,
            (
                ParamDecl::Int { min: 1, max: 180, step: 1, default: 60 },
                ParamValue::Int(60),
            ),
        );

        Self {
            zones: zone_ids,
            pixel_counts,
            params: ParamMap(map),
            start: Instant::now(),
        }
    }

    fn render_zone(
        &self,
        zone: ZoneId,
        elapsed: f32,
        speed: i32,
        length: i32,
        hue: u16,
        hue_offset: i32,
    ) -> Vec<Color> {
        let count = *self.pixel_counts.get(&zone).unwrap_or(&0);
        if count == 0 {
            return Vec::new();
        }
        let pixels_per_sec = 1.0 + (speed as f32 / 100.0) * (count as f32 * 2.0);
        let head = ((elapsed * pixels_per_sec) as i64).rem_euclid(count as i64) as usize;

        (0..count)
            .map(|i| {
                let dist = (head as i64 - i as i64).rem_euclid(count as i64);
                if dist < length as i64 {
                    let t = dist as f32 / length.max(1) as f32;
                    let segment_hue = (hue as i32 + (hue_offset as f32 * t) as i32).rem_euclid(360) as u16;
                    Color::hue(segment_hue)
                } else {
                    Color::black()
                }
            })
            .collect()
    }
}

#[async_trait]
impl Animation for ColorSnake {
    fn id(&self) -> AnimationId {
        AnimationId::ColorSnake
    }

    fn zones(&self) -> &[ZoneId] {
        &self.zones
    }

    fn parameters(&self) -> &ParamMap {
        &self.params
    }

    fn set_parameter(&mut self, id: ParamId, value: ParamValue) -> Result<(), ParamError> {
        self.params.validate_and_set(id, value)
    }

    async fn next_frame(&mut self) -> Option<Frame> {
        let speed = match self.params.get(ParamId::Speed) {
            Some(ParamValue::Int(v)) => v,
            _ => 50,
        };
        let length = match self.params.get(ParamId::Length) {
            Some(ParamValue::Int(v)) => v,
            _ => 3,
        };
        let hue = match self.params.get(ParamId::Hue) {
            Some(ParamValue::Hue(h)) => h,
            _ => 0,
        };
        let hue_offset = match self.params.get(ParamId::HueOffset) {
            Some(ParamValue::Int(v)) => v,
            _ => 60,
        };
        let elapsed = self.start.elapsed().as_secs_f32();

        let mut map = HashMap::new();
        for zone in self.zones.iter().copied().collect::<Vec<_>>() {
            map.insert(zone, self.render_zone(zone, elapsed, speed, length, hue, hue_offset));
        }

        sleep(FRAME_INTERVAL).await;
        Some(Frame::new(FrameKind::Pixel(map), Priority::Animation, Source::Animation))
    }
}
