//! Snake: a hue-colored segment chasing itself around each zone's pixels.

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

pub struct Snake {
    zones: Vec<ZoneId>,
    pixel_counts: HashMap<ZoneId, usize>,
    params: ParamMap,
    start: Instant,
}

impl Snake {
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
                ParamDecl::Int { min: 1, max: 20, step: 1, default: 5 },
                ParamValue::Int(5),
            ),
        );
        map.insert(ParamId::Hue, (ParamDecl::Hue { default: 0 }, ParamValue::Hue(0)));

        Self {
            zones: zone_ids,
            pixel_counts,
            params: ParamMap(map),
            start: Instant::now(),
        }
    }

    fn render_zone(&self, zone: ZoneId, elapsed: f32, speed: i32, length: i32, hue: u16) -> Vec<Color> {
        let count = *self.pixel_counts.get(&zone).unwrap_or(&0);
        if count == 0 {
            return Vec::new();
        }
        let pixels_per_sec = 1.0 + (speed as f32 / 100.0) * (count as f32 * 2.0);
        let head = ((elapsed * pixels_per_sec) as i64).rem_euclid(count as i64) as usize;
        let color = Color::hue(hue);
        (0..count)
            .map(|i| {
                let dist = (head as i64 - i as i64).rem_euclid(count as i64);
                if dist < length as i64 {
                    let falloff = 255 - ((dist as u32 * 255) / length.max(1) as u32) as u8;
                    color.with_brightness(falloff)
                } else {
                    Color::black()
                }
            })
            .collect()
    }
}

#[async_trait]
impl Animation for Snake {
    fn id(&self) -> AnimationId {
        AnimationId::Snake
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
            _ => 5,
        };
        let hue = match self.params.get(ParamId::Hue) {
            Some(ParamValue::Hue(h)) => h,
            _ => 0,
        };
        let elapsed = self.start.elapsed().as_secs_f32();

        let mut map = HashMap::new();
        for zone in self.zones.iter().copied().collect::<Vec<_>>() {
            map.insert(zone, self.render_zone(zone, elapsed, speed, length, hue));
        }

        sleep(FRAME_INTERVAL).await;
        Some(Frame::new(FrameKind::Pixel(map), Priority::Animation, Source::Animation))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn renders_expected_pixel_count_per_zone() {
        let mut anim = Snake::new(vec![(ZoneId::Floor, 15)]);
        let frame = anim.next_frame().await.unwrap();
        match frame.kind {
            FrameKind::Pixel(map) => assert_eq!(map[&ZoneId::Floor].len(), 15),
            _ => panic!("expected pixel frame"),
        }
    }
}
