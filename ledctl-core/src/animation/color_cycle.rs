//! ColorCycle: hard-coded 3s steps of Red -> Green -> Blue. No parameters.

use std::time::Instant;

use async_trait::async_trait;
use tokio::time::{sleep, Duration};

use crate::color::Color;
use crate::error::ParamError;
use crate::frame::{Frame, FrameKind, Priority, Source};
use crate::zone::ZoneId;

use super::{Animation, AnimationId, ParamId, ParamMap, ParamValue, ZoneSpan};

const FRAME_INTERVAL: Duration = Duration::from_millis(1000 / 60);
const STEP_SECS: f32 = 3.0;
const STEPS: [Color; 3] = [Color::Raw(255, 0, 0), Color::Raw(0, 255, 0), Color::Raw(0, 0, 255)];

pub struct ColorCycle {
    zones: Vec<ZoneId>,
    params: ParamMap,
    start: Instant,
}

impl ColorCycle {
    pub fn new(zones: Vec<ZoneSpan>) -> Self {
        let zones: Vec<ZoneId> = zones.into_iter().map(|(z, _)| z).collect();
        Self {
            zones,
            params: ParamMap::default(),
            start: Instant::now(),
        }
    }
}

#[async_trait]
impl Animation for ColorCycle {
    fn id(&self) -> AnimationId {
        AnimationId::ColorCycle
    }

    fn zones(&self) -> &[ZoneId] {
        &self.zones
    }

    fn parameters(&self) -> &ParamMap {
        &self.params
    }

    fn set_parameter(&mut self, id: ParamId, _value: ParamValue) -> Result<(), ParamError> {
        Err(ParamError::UnknownParameter(id.name().to_string()))
    }

    async fn next_frame(&mut self) -> Option<Frame> {
        let elapsed = self.start.elapsed().as_secs_f32();
        let step = ((elapsed / STEP_SECS) as usize) % STEPS.len();
        let color = STEPS[step];

        sleep(FRAME_INTERVAL).await;
        Some(Frame::new(FrameKind::FullStrip(color), Priority::Animation, Source::Animation))
    }
}
