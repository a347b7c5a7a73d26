//! Breathe: ambient sinusoidal brightness pulse over a fixed hue.

use std::collections::HashMap;
use std::f32::consts::TAU;
use std::time::Instant;

use async_trait::async_trait;
use tokio::time::{sleep, Duration};

use crate::color::Color;
use crate::error::ParamError;
use crate::frame::{Frame, FrameKind, Priority, Source};
use crate::zone::ZoneId;

use super::{Animation, AnimationId, ParamDecl, ParamId, ParamMap, ParamValue, ZoneSpan};

/// Render loop frame rate for animations driving their own pacing sleep.
const FRAME_INTERVAL: Duration = Duration::from_millis(1000 / 60);

pub struct Breathe {
    zones: Vec<ZoneId>,
    params: ParamMap,
    start: Instant,
}

impl Breathe {
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
        map.insert(ParamId::Hue, (ParamDecl::Hue { default: 0 }, ParamValue::Hue(0)));
        Self {
            zones,
            params: ParamMap(map),
            start: Instant::now(),
        }
    }
}

#[async_trait]
impl Animation for Breathe {
    fn id(&self) -> AnimationId {
        AnimationId::Breathe
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
        // Step timing is recomputed from current parameter values on every
        // call, not cached at construction, so a live speed/intensity change
        // takes effect within one frame period.
        let speed = matches_int(self.params.get(ParamId::Speed), 50);
        let intensity = matches_int(self.params.get(ParamId::Intensity), 75);
        let hue = match self.params.get(ParamId::Hue) {
            Some(ParamValue::Hue(h)) => h,
            _ => 0,
        };

        let period_secs = 4.0 - (speed as f32 / 100.0) * 3.5;
        let elapsed = self.start.elapsed().as_secs_f32();
        let phase = (elapsed % period_secs) / period_secs;
        let wave = (phase * TAU).sin() * 0.5 + 0.5;
        let brightness = ((wave * (intensity as f32 / 100.0)) * 255.0) as u8;

        let color = Color::hue(hue).with_brightness(brightness);
        let map: HashMap<ZoneId, Color> = self.zones.iter().map(|z| (*z, color)).collect();

        sleep(FRAME_INTERVAL).await;
        Some(Frame::new(FrameKind::Zone(map), Priority::Animation, Source::Animation))
    }
}

fn matches_int(v: Option<ParamValue>, default: i32) -> i32 {
    match v {
        Some(ParamValue::Int(n)) => n,
        _ => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn parameter_update_reflected_in_next_frame() {
        let mut anim = Breathe::new(vec![(ZoneId::Lamp, 10)]);
        anim.set_parameter(ParamId::Hue, ParamValue::Hue(240)).unwrap();
        let frame = anim.next_frame().await.unwrap();
        match frame.kind {
            FrameKind::Zone(map) => {
                let c = map[&ZoneId::Lamp];
                assert_eq!(c.mode(), crate::color::ColorMode::Hue);
            }
            _ => panic!("expected zone frame"),
        }
    }
}
