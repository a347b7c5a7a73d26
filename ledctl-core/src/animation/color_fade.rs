//! ColorFade: ambient slow hue rotation across the zone.

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

pub struct ColorFade {
    zones: Vec<ZoneId>,
    params: ParamMap,
    start: Instant,
}

impl ColorFade {
    pub fn new(zones: Vec<ZoneSpan>) -> Self {
        let zones: Vec<ZoneId> = zones.into_iter().map(|(z, _)| z).collect();
        let mut map = HashMap::new();
        map.insert(
            ParamId::Speed,
            (
                ParamDecl::Int { min: 1, max: 100, step: 1, default: 50 },
                ParamValue::Int(50),
            ),
        );
        map.insert(
            ParamId::Intensity,
            (
                ParamDecl::Int { min: 0, max: 100, step: 1, default: 75 },
                ParamValue::Int(75),
            ),
        );
        Self {
            zones,
            params: ParamMap(map),
            start: Instant::now(),
        }
    }
}

#[async_trait]
impl Animation for ColorFade {
    fn id(&self) -> AnimationId {
        AnimationId::ColorFade
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
        let intensity = match self.params.get(ParamId::Intensity) {
            Some(ParamValue::Int(v)) => v,
            _ => 75,
        };

        let degrees_per_sec = speed as f32 * 1.2;
        let elapsed = self.start.elapsed().as_secs_f32();
        let hue = ((elapsed * degrees_per_sec) as u32 % 360) as u16;
        let brightness = ((intensity as f32 / 100.0) * 255.0) as u8;

        let color = Color::hue(hue).with_brightness(brightness);
        let map: HashMap<ZoneId, Color> = self.zones.iter().map(|z| (*z, color)).collect();

        sleep(FRAME_INTERVAL).await;
        Some(Frame::new(FrameKind::Zone(map), Priority::Animation, Source::Animation))
    }
}
