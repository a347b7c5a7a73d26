//! AnimationEngine: owns at most one running animation per zone, orchestrates
//! cross-fade transitions on start/stop/switch, and enforces the lock
//! discipline from spec §5 -- task handles are popped out of the running
//! map under lock, the lock is dropped, and only then is cancellation
//! awaited.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{info, warn};

use crate::animation::{self, Animation, AnimationId, ParamId, ParamValue};
use crate::channel::ChannelId;
use crate::color::Color;
use crate::error::EngineError;
use crate::frame::{Frame, FrameKind, Priority, Source};
use crate::frame_manager::FrameManager;
use crate::task_registry::{TaskCategory, TaskId, TaskRegistry};
use crate::transition::TransitionService;
use crate::zone::{RenderMode, Zone, ZoneConfig, ZoneId};

struct RunningAnimation {
    animation_id: AnimationId,
    animation: Arc<Mutex<Box<dyn Animation>>>,
    abort: AbortHandle,
    task_id: TaskId,
}

pub struct AnimationEngine {
    frame_manager: Arc<FrameManager>,
    transitions: Arc<TransitionService>,
    task_registry: Arc<TaskRegistry>,
    zones: Mutex<HashMap<ZoneId, Zone>>,
    running: Arc<Mutex<HashMap<ZoneId, RunningAnimation>>>,
    crossfade_duration: Duration,
}

impl AnimationEngine {
    pub fn new(
        frame_manager: Arc<FrameManager>,
        transitions: Arc<TransitionService>,
        task_registry: Arc<TaskRegistry>,
        zones: HashMap<ZoneId, ZoneConfig>,
    ) -> Self {
        let zones = zones.into_iter().map(|(id, config)| (id, Zone::new(config))).collect();
        Self {
            frame_manager,
            transitions,
            task_registry,
            zones: Mutex::new(zones),
            running: Arc::new(Mutex::new(HashMap::new())),
            crossfade_duration: Duration::from_millis(400),
        }
    }

    pub fn with_crossfade_duration(mut self, duration: Duration) -> Self {
        self.crossfade_duration = duration;
        self
    }

    async fn zone_config(&self, zone: ZoneId) -> Result<ZoneConfig, EngineError> {
        let zones = self.zones.lock().await;
        Ok(zones.get(&zone).ok_or(EngineError::UnknownZone(zone))?.config.clone())
    }

    /// The zone's actually-rendered color, read from `FrameManager`'s
    /// last-rendered cache for the zone's channel (spec §4.4 step 1) --
    /// never from a hand-kept ledger, so a prior `set_zone_color` is always
    /// reflected as a cross-fade source.
    async fn rendered_zone_color(&self, channel: ChannelId, zone: ZoneId) -> Color {
        let snapshot = self.frame_manager.snapshot().await;
        snapshot
            .channels
            .iter()
            .find(|c| c.channel == channel)
            .and_then(|c| first_zone_color(c.last_rendered.as_ref(), zone))
            .unwrap_or(Color::black())
    }

    /// Start `animation_id` on `zone`. If an animation already runs there,
    /// cross-fades to the new one; otherwise fades in from the zone's
    /// currently rendered color (black if nothing has ever been rendered).
    pub async fn start(
        &self,
        zone: ZoneId,
        animation_id: AnimationId,
        params: HashMap<ParamId, ParamValue>,
    ) -> Result<(), EngineError> {
        let config = self.zone_config(zone).await?;
        let anim = animation::build(animation_id, vec![(zone, config.pixel_count)], params)?;
        self.start_with(zone, animation_id, config, anim).await
    }

    async fn start_with(
        &self,
        zone: ZoneId,
        animation_id: AnimationId,
        config: ZoneConfig,
        mut anim: Box<dyn Animation>,
    ) -> Result<(), EngineError> {
        // Pop any prior handle out from under the lock before awaiting its
        // cancellation -- holding `running` across the abort/cross-fade
        // would deadlock a concurrent `update_parameter` on the same zone.
        let prior = self.running.lock().await.remove(&zone);
        if let Some(prior) = prior {
            prior.abort.abort();
            self.task_registry.mark_cancelled(prior.task_id).await;
        }

        let from_color = self.rendered_zone_color(config.channel, zone).await;
        let to_color = first_zone_color(anim.next_frame().await.as_ref(), zone).unwrap_or(Color::black());

        let mut from_map = HashMap::new();
        from_map.insert(zone, from_color);
        let mut to_map = HashMap::new();
        to_map.insert(zone, to_color);
        self.transitions.crossfade(config.channel, from_map, to_map, self.crossfade_duration).await;

        let task_id = self
            .task_registry
            .register(TaskCategory::Animation, format!("{animation_id:?} on {zone:?}"), None)
            .await;

        let animation = Arc::new(Mutex::new(anim));
        let animation_for_task = animation.clone();
        let frame_manager = self.frame_manager.clone();
        let task_registry_for_task = self.task_registry.clone();
        let channel = config.channel;

        let handle: JoinHandle<()> = tokio::spawn(async move {
            loop {
                let frame = {
                    let mut guard = animation_for_task.lock().await;
                    guard.next_frame().await
                };
                match frame {
                    Some(frame) => {
                        if frame_manager.submit(channel, frame).await.is_err() {
                            warn!(?zone, "animation frame rejected by frame manager");
                        }
                    }
                    None => {
                        task_registry_for_task.mark_completed(task_id, None).await;
                        return;
                    }
                }
            }
        });
        let abort = handle.abort_handle();

        // Supervise the detached task: a panic is caught at this boundary,
        // the record marked Failed, and the zone's slot released, instead of
        // the task simply vanishing with no trace (spec §4.4/§4.6).
        let running_for_watch = self.running.clone();
        let task_registry_for_watch = self.task_registry.clone();
        tokio::spawn(async move {
            match handle.await {
                Ok(()) => {}
                Err(join_err) if join_err.is_cancelled() => return,
                Err(join_err) => {
                    warn!(?zone, error = %join_err, "animation task panicked");
                    task_registry_for_watch.mark_failed(task_id, join_err.to_string()).await;
                }
            }
            let mut running = running_for_watch.lock().await;
            if matches!(running.get(&zone), Some(ra) if ra.task_id == task_id) {
                running.remove(&zone);
            }
        });

        self.running.lock().await.insert(
            zone,
            RunningAnimation { animation_id, animation, abort, task_id },
        );

        {
            let mut zones = self.zones.lock().await;
            if let Some(z) = zones.get_mut(&zone) {
                z.state.current_color = to_color;
                z.state.render_mode = RenderMode::Animation;
            }
        }

        info!(?zone, ?animation_id, "animation started");
        Ok(())
    }

    /// Cancel the running animation on `zone`. Idempotent: a zone with
    /// nothing running returns `Ok(())` without side effects.
    pub async fn stop(&self, zone: ZoneId, skip_fade: bool) -> Result<(), EngineError> {
        let config = self.zone_config(zone).await?;

        let prior = self.running.lock().await.remove(&zone);
        let Some(prior) = prior else {
            return Ok(());
        };
        prior.abort.abort();
        self.task_registry.mark_cancelled(prior.task_id).await;

        if !skip_fade {
            let from_color = self.rendered_zone_color(config.channel, zone).await;
            let mut from_map = HashMap::new();
            from_map.insert(zone, from_color);
            self.transitions.fade_out(config.channel, from_map, self.crossfade_duration).await;
        }

        {
            let mut zones = self.zones.lock().await;
            if let Some(z) = zones.get_mut(&zone) {
                z.state.current_color = Color::black();
                z.state.render_mode = RenderMode::Off;
            }
        }

        info!(?zone, animation_id = ?prior.animation_id, "animation stopped");
        Ok(())
    }

    /// Sequential (not concurrent) stop of every running zone. See spec §5:
    /// a concurrent join-all was tried and produced lock-acquisition races.
    pub async fn stop_all(&self) {
        let zones: Vec<ZoneId> = self.running.lock().await.keys().copied().collect();
        for zone in zones {
            if let Err(err) = self.stop(zone, false).await {
                warn!(?zone, %err, "stop_all: failed to stop zone");
            }
        }
    }

    pub async fn update_parameter(&self, zone: ZoneId, param_id: ParamId, value: ParamValue) -> Result<(), EngineError> {
        let animation = {
            let running = self.running.lock().await;
            running.get(&zone).map(|ra| ra.animation.clone()).ok_or(EngineError::NotRunning(zone))?
        };
        let mut anim = animation.lock().await;
        anim.set_parameter(param_id, value).map_err(EngineError::from)
    }

    pub async fn is_running(&self, zone: ZoneId) -> bool {
        self.running.lock().await.contains_key(&zone)
    }

    pub async fn running_animation(&self, zone: ZoneId) -> Option<AnimationId> {
        self.running.lock().await.get(&zone).map(|ra| ra.animation_id)
    }

    /// Submit a one-shot `Manual`-priority frame, bypassing the animation
    /// engine's task loop entirely, and update the zone's runtime state to
    /// reflect it. The control-surface operation `set_zone_color` from
    /// spec §6; the channel is resolved from the zone's own configuration,
    /// so callers only name the zone.
    pub async fn set_zone_color(&self, zone: ZoneId, color: Color, brightness: u8) -> Result<(), EngineError> {
        let config = self.zone_config(zone).await?;
        let resolved = color.with_brightness(brightness);

        let mut map = HashMap::new();
        map.insert(zone, resolved);
        self.frame_manager
            .submit(config.channel, Frame::new(FrameKind::Zone(map), Priority::Manual, Source::Static))
            .await?;

        let mut zones = self.zones.lock().await;
        if let Some(z) = zones.get_mut(&zone) {
            z.state.current_color = resolved;
            z.state.render_mode = RenderMode::Static;
        }
        Ok(())
    }

    /// Fade every zone not already off to black through `TransitionService`,
    /// then stop any running animations. The control-surface operation
    /// `power_off` from spec §6.
    pub async fn power_off(&self) {
        self.stop_all().await;

        let remaining: Vec<(ZoneId, ChannelId, Color)> = {
            let zones = self.zones.lock().await;
            zones
                .values()
                .filter(|z| z.state.render_mode != RenderMode::Off)
                .map(|z| (z.config.id, z.config.channel, z.state.current_color))
                .collect()
        };
        for (channel, snapshot) in group_by_channel(remaining) {
            self.transitions.fade_out(channel, snapshot, self.crossfade_duration).await;
        }

        let mut zones = self.zones.lock().await;
        for z in zones.values_mut() {
            z.state.render_mode = RenderMode::Off;
        }
    }

    /// Fade every currently-off zone back in to its last known color through
    /// `TransitionService`. The control-surface operation `power_on` from
    /// spec §6. Zones whose animation was stopped by `power_off` come back
    /// at their static fallback color, not the animation itself -- spec
    /// §4.4 bars automatic animation restart.
    pub async fn power_on(&self) {
        let targets: Vec<(ZoneId, ChannelId, Color)> = {
            let zones = self.zones.lock().await;
            zones
                .values()
                .filter(|z| z.state.render_mode == RenderMode::Off)
                .map(|z| (z.config.id, z.config.channel, z.state.current_color))
                .collect()
        };
        for (channel, snapshot) in group_by_channel(targets) {
            self.transitions.fade_in(channel, snapshot, self.crossfade_duration).await;
        }

        let mut zones = self.zones.lock().await;
        for z in zones.values_mut() {
            if z.state.render_mode == RenderMode::Off {
                z.state.render_mode = RenderMode::Static;
            }
        }
    }
}

fn group_by_channel(entries: Vec<(ZoneId, ChannelId, Color)>) -> HashMap<ChannelId, crate::transition::Snapshot> {
    let mut by_channel: HashMap<ChannelId, crate::transition::Snapshot> = HashMap::new();
    for (zone, channel, color) in entries {
        by_channel.entry(channel).or_default().insert(zone, color);
    }
    by_channel
}

fn first_zone_color(frame: Option<&Frame>, zone: ZoneId) -> Option<Color> {
    match frame?.kind {
        FrameKind::FullStrip(color) => Some(color),
        FrameKind::Zone(ref map) => map.get(&zone).copied(),
        FrameKind::Pixel(ref map) => map.get(&zone).and_then(|pixels| pixels.first()).copied(),
        FrameKind::Preview(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::{ParamMap, ParamError};
    use crate::channel::BufferChannel;
    use std::collections::HashMap as Map;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn test_engine() -> (AnimationEngine, Arc<FrameManager>) {
        let mut channel_zones = Map::new();
        channel_zones.insert(ZoneId::Lamp, (0, 10));
        let ch = BufferChannel::new(ChannelId::Main, 10, channel_zones);
        let frame_manager = Arc::new(FrameManager::new(vec![Box::new(ch)]));
        let transitions = Arc::new(TransitionService::new(frame_manager.clone()).with_default_duration(Duration::from_millis(8)));
        let task_registry = Arc::new(TaskRegistry::new());

        let mut zones = HashMap::new();
        zones.insert(
            ZoneId::Lamp,
            ZoneConfig { id: ZoneId::Lamp, display_name: "Lamp".into(), pixel_count: 10, channel: ChannelId::Main, range: (0, 10) },
        );

        let engine = AnimationEngine::new(frame_manager.clone(), transitions, task_registry, zones)
            .with_crossfade_duration(Duration::from_millis(8));
        (engine, frame_manager)
    }

    #[tokio::test]
    async fn start_then_skip_fade_stop_leaves_nothing_running() {
        let (engine, _fm) = test_engine();
        engine.start(ZoneId::Lamp, AnimationId::ColorCycle, HashMap::new()).await.unwrap();
        assert!(engine.is_running(ZoneId::Lamp).await);

        engine.stop(ZoneId::Lamp, true).await.unwrap();
        assert!(!engine.is_running(ZoneId::Lamp).await);
    }

    #[tokio::test]
    async fn stop_on_idle_zone_is_idempotent() {
        let (engine, _fm) = test_engine();
        assert!(engine.stop(ZoneId::Lamp, true).await.is_ok());
    }

    #[tokio::test]
    async fn update_parameter_fails_when_nothing_running() {
        let (engine, _fm) = test_engine();
        let err = engine.update_parameter(ZoneId::Lamp, ParamId::Speed, ParamValue::Int(10)).await.unwrap_err();
        assert!(matches!(err, EngineError::NotRunning(_)));
    }

    #[tokio::test]
    async fn switching_animations_replaces_the_running_id() {
        let (engine, _fm) = test_engine();
        engine.start(ZoneId::Lamp, AnimationId::Breathe, HashMap::new()).await.unwrap();
        assert_eq!(engine.running_animation(ZoneId::Lamp).await, Some(AnimationId::Breathe));

        engine.start(ZoneId::Lamp, AnimationId::ColorFade, HashMap::new()).await.unwrap();
        assert_eq!(engine.running_animation(ZoneId::Lamp).await, Some(AnimationId::ColorFade));
    }

    #[tokio::test]
    async fn stop_all_clears_every_running_zone() {
        let (engine, _fm) = test_engine();
        engine.start(ZoneId::Lamp, AnimationId::ColorCycle, HashMap::new()).await.unwrap();
        engine.stop_all().await;
        assert!(!engine.is_running(ZoneId::Lamp).await);
    }

    #[tokio::test]
    async fn set_zone_color_feeds_the_next_crossfade() {
        let (engine, _fm) = test_engine();
        engine.set_zone_color(ZoneId::Lamp, Color::Raw(0, 255, 0), 255).await.unwrap();

        let rendered = engine.rendered_zone_color(ChannelId::Main, ZoneId::Lamp).await;
        assert_eq!(rendered, Color::Raw(0, 255, 0));
    }

    #[tokio::test]
    async fn power_off_then_power_on_restores_static_color() {
        let (engine, _fm) = test_engine();
        engine.set_zone_color(ZoneId::Lamp, Color::Raw(10, 20, 30), 255).await.unwrap();

        engine.power_off().await;
        {
            let zones = engine.zones.lock().await;
            assert_eq!(zones[&ZoneId::Lamp].state.render_mode, RenderMode::Off);
        }

        engine.power_on().await;
        let zones = engine.zones.lock().await;
        assert_eq!(zones[&ZoneId::Lamp].state.render_mode, RenderMode::Static);
        assert_eq!(zones[&ZoneId::Lamp].state.current_color, Color::Raw(10, 20, 30));
    }

    struct PanicAnimation {
        params: ParamMap,
        calls: AtomicU32,
    }

    impl PanicAnimation {
        fn new() -> Self {
            Self { params: ParamMap::default(), calls: AtomicU32::new(0) }
        }
    }

    #[async_trait::async_trait]
    impl Animation for PanicAnimation {
        fn id(&self) -> AnimationId {
            AnimationId::Breathe
        }

        fn zones(&self) -> &[ZoneId] {
            &[]
        }

        fn parameters(&self) -> &ParamMap {
            &self.params
        }

        fn set_parameter(&mut self, _id: ParamId, _value: ParamValue) -> Result<(), ParamError> {
            Ok(())
        }

        async fn next_frame(&mut self) -> Option<Frame> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Some(Frame::new(FrameKind::Zone(HashMap::new()), Priority::Animation, Source::Animation))
            } else {
                panic!("boom")
            }
        }
    }

    #[tokio::test]
    async fn panicking_animation_is_marked_failed_and_released() {
        let (engine, _fm) = test_engine();
        let config = ZoneConfig { id: ZoneId::Lamp, display_name: "Lamp".into(), pixel_count: 10, channel: ChannelId::Main, range: (0, 10) };
        engine
            .start_with(ZoneId::Lamp, AnimationId::Breathe, config, Box::new(PanicAnimation::new()))
            .await
            .unwrap();
        assert!(engine.is_running(ZoneId::Lamp).await);

        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(!engine.is_running(ZoneId::Lamp).await);
        let failed = engine.task_registry.failed().await;
        assert_eq!(failed.len(), 1);
    }
}
