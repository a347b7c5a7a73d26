//! TransitionService: fade-in, fade-out, cross-fade and cut, emitted at
//! `Transition` priority. Stateless apart from the mutex that serializes one
//! instance's own transitions (spec §4.5) -- a rapid fade_in immediately
//! followed by a fade_out must not interleave their frames.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::debug;

use crate::channel::ChannelId;
use crate::color::Color;
use crate::frame::{Frame, FrameKind, Priority, Source};
use crate::frame_manager::FrameManager;
use crate::zone::ZoneId;

/// A channel-wide or per-zone color snapshot, the unit transitions
/// interpolate between. Zone-level granularity is enough for the
/// `Zone`-frame animations in the catalog; `Pixel` animations fold to their
/// per-zone average before a cross-fade starts.
pub type Snapshot = HashMap<ZoneId, Color>;

pub struct TransitionService {
    frame_manager: Arc<FrameManager>,
    default_duration: Duration,
    lock: Mutex<()>,
}

impl TransitionService {
    pub fn new(frame_manager: Arc<FrameManager>) -> Self {
        Self {
            frame_manager,
            default_duration: Duration::from_millis(400),
            lock: Mutex::new(()),
        }
    }

    pub fn with_default_duration(mut self, duration: Duration) -> Self {
        self.default_duration = duration;
        self
    }

    pub fn default_duration(&self) -> Duration {
        self.default_duration
    }

    pub async fn fade_out(&self, channel: ChannelId, from: Snapshot, duration: Duration) {
        let black: Snapshot = from.keys().map(|z| (*z, Color::black())).collect();
        self.run(channel, from, black, duration).await;
    }

    pub async fn fade_in(&self, channel: ChannelId, target: Snapshot, duration: Duration) {
        let black: Snapshot = target.keys().map(|z| (*z, Color::black())).collect();
        self.run(channel, black, target, duration).await;
    }

    pub async fn crossfade(&self, channel: ChannelId, from: Snapshot, to: Snapshot, duration: Duration) {
        self.run(channel, from, to, duration).await;
    }

    /// Single instantaneous frame, no interpolation.
    pub async fn cut(&self, channel: ChannelId, target: Snapshot) {
        let _guard = self.lock.lock().await;
        let _ = self
            .frame_manager
            .submit(channel, Frame::new(FrameKind::Zone(target), Priority::Transition, Source::Transition))
            .await;
    }

    /// `steps = ceil(duration * rate)` frames, linear per-pixel RGB lerp,
    /// step `k` at `ease(k/steps)` with `ease` the identity (linear).
    async fn run(&self, channel: ChannelId, from: Snapshot, to: Snapshot, duration: Duration) {
        let _guard = self.lock.lock().await;
        let rate = self.frame_manager.snapshot().await.rate_hz.max(1);
        let steps = ((duration.as_secs_f64() * rate as f64).ceil() as u64).max(1);
        let tick_interval = Duration::from_secs_f64(1.0 / rate as f64);

        let zones: Vec<ZoneId> = from.keys().chain(to.keys()).copied().collect::<std::collections::HashSet<_>>().into_iter().collect();

        for k in 0..=steps {
            let t = k as f32 / steps as f32;
            let mut map = HashMap::new();
            for zone in &zones {
                let a = from.get(zone).copied().unwrap_or(Color::black());
                let b = to.get(zone).copied().unwrap_or(Color::black());
                map.insert(*zone, lerp_color(a, b, t));
            }
            let frame = Frame::new(FrameKind::Zone(map), Priority::Transition, Source::Transition);
            let _ = self.frame_manager.submit(channel, frame).await;
            if k < steps {
                sleep(tick_interval).await;
            }
        }
        debug!(?channel, steps, "transition complete");
    }
}

fn lerp_color(a: Color, b: Color, t: f32) -> Color {
    let (ar, ag, ab) = a.to_rgb();
    let (br, bg, bb) = b.to_rgb();
    let lerp = |x: u8, y: u8| -> u8 {
        (x as f32 + (y as f32 - x as f32) * t).round().clamp(0.0, 255.0) as u8
    };
    Color::Raw(lerp(ar, br), lerp(ag, bg), lerp(ab, bb))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::BufferChannel;
    use std::collections::HashMap as Map;

    fn manager() -> Arc<FrameManager> {
        let mut zones = Map::new();
        zones.insert(ZoneId::Lamp, (0, 10));
        let ch = BufferChannel::new(ChannelId::Main, 10, zones);
        Arc::new(FrameManager::new(vec![Box::new(ch)]))
    }

    #[tokio::test]
    async fn crossfade_ends_at_target_color() {
        let mgr = manager();
        let svc = TransitionService::new(mgr.clone()).with_default_duration(Duration::from_millis(16));

        let mut from = Snapshot::new();
        from.insert(ZoneId::Lamp, Color::Raw(255, 0, 0));
        let mut to = Snapshot::new();
        to.insert(ZoneId::Lamp, Color::Raw(0, 0, 255));

        svc.crossfade(ChannelId::Main, from, to, Duration::from_millis(16)).await;

        let snap = mgr.snapshot().await;
        let last = snap.channels[0].last_rendered.clone().unwrap();
        match last.kind {
            FrameKind::Zone(m) => assert_eq!(m.get(&ZoneId::Lamp), Some(&Color::Raw(0, 0, 255))),
            _ => panic!("expected zone frame"),
        }
    }

    #[tokio::test]
    async fn fade_out_ends_black() {
        let mgr = manager();
        let svc = TransitionService::new(mgr.clone());
        let mut from = Snapshot::new();
        from.insert(ZoneId::Lamp, Color::Raw(10, 20, 30));
        svc.fade_out(ChannelId::Main, from, Duration::from_millis(8)).await;

        let snap = mgr.snapshot().await;
        let last = snap.channels[0].last_rendered.clone().unwrap();
        match last.kind {
            FrameKind::Zone(m) => assert_eq!(m.get(&ZoneId::Lamp), Some(&Color::Raw(0, 0, 0))),
            _ => panic!("expected zone frame"),
        }
    }
}
