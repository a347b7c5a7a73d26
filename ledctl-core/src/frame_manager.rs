//! FrameManager: multi-queue priority scheduler running at a fixed tick
//! rate. Selects one winning frame per output channel per tick and
//! dispatches it with exactly one hardware flush.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, warn};

use crate::channel::{ChannelId, OutputChannel};
use crate::error::{FrameError, FrameManagerError};
use crate::frame::{Frame, FrameKind, Priority, DEFAULT_TTL};
use crate::zone::ZoneId;

/// Consecutive `apply_*` failures before a channel is quarantined.
const DEFAULT_FAILURE_THRESHOLD: u32 = 10;

/// Rolling window size for the average-tick-duration counter.
const TICK_WINDOW: usize = 60;

#[derive(Default, Debug, Clone)]
pub struct ChannelCounters {
    pub selected_by_priority: HashMap<Priority, u64>,
    pub expired: u64,
    pub dropped_on_overflow: u64,
}

/// Snapshot returned by `FrameManager::snapshot`.
#[derive(Debug, Clone)]
pub struct ChannelSnapshot {
    pub channel: ChannelId,
    pub last_rendered: Option<Frame>,
    pub counters: ChannelCounters,
    pub quarantined: bool,
}

#[derive(Debug, Clone)]
pub struct ManagerSnapshot {
    pub channels: Vec<ChannelSnapshot>,
    pub average_tick: Duration,
    pub rate_hz: u32,
    pub paused: bool,
}

struct ChannelSlot {
    channel: Box<dyn OutputChannel>,
    /// Capacity-2 deque per priority; newest submission evicts oldest of
    /// the same priority.
    queues: HashMap<Priority, VecDeque<Frame>>,
    last_rendered: Option<Frame>,
    last_flush_at: Option<Instant>,
    counters: ChannelCounters,
    quarantined: bool,
    consecutive_failures: u32,
}

impl ChannelSlot {
    fn new(channel: Box<dyn OutputChannel>) -> Self {
        let mut queues = HashMap::new();
        for p in Priority::DESCENDING {
            queues.insert(p, VecDeque::with_capacity(2));
        }
        Self {
            channel,
            queues,
            last_rendered: None,
            last_flush_at: None,
            counters: ChannelCounters::default(),
            quarantined: false,
            consecutive_failures: 0,
        }
    }

    fn submit(&mut self, frame: Frame) {
        let q = self.queues.entry(frame.priority).or_default();
        if q.len() >= 2 {
            q.pop_front();
            self.counters.dropped_on_overflow += 1;
        }
        q.push_back(frame);
    }

    /// Walk priorities highest to lowest; within a priority, discard expired
    /// frames, the last non-expired frame in submission order wins.
    fn select_winner(&mut self, now: Instant) -> Option<Frame> {
        for priority in Priority::DESCENDING {
            let q = self.queues.get_mut(&priority).expect("all priorities present");
            let before = q.len();
            q.retain(|f| !f.is_expired(now));
            self.counters.expired += (before - q.len()) as u64;
            if let Some(frame) = q.back() {
                self.counters
                    .selected_by_priority
                    .entry(priority)
                    .and_modify(|c| *c += 1)
                    .or_insert(1);
                return Some(frame.clone());
            }
        }
        None
    }

    fn dispatch(&mut self, frame: &Frame) -> Result<(), crate::error::OutputError> {
        match &frame.kind {
            FrameKind::FullStrip(color) => self.channel.apply_full(color),
            FrameKind::Zone(map) => self.channel.apply_zone_map(map),
            FrameKind::Pixel(map) => self.channel.apply_pixel_frame(map),
            FrameKind::Preview(pixels) => self.channel.apply_preview(pixels),
        }
    }
}

/// Multi-queue priority scheduler. Owns N output channels (typically one
/// main + one preview).
pub struct FrameManager {
    slots: Mutex<HashMap<ChannelId, ChannelSlot>>,
    rate_hz: Mutex<u32>,
    paused: Mutex<bool>,
    step_requested: Mutex<bool>,
    failure_threshold: u32,
    tick_durations: Mutex<VecDeque<Duration>>,
}

impl FrameManager {
    pub fn new(channels: Vec<Box<dyn OutputChannel>>) -> Self {
        let mut slots = HashMap::new();
        for ch in channels {
            slots.insert(ch.id(), ChannelSlot::new(ch));
        }
        Self {
            slots: Mutex::new(slots),
            rate_hz: Mutex::new(60),
            paused: Mutex::new(false),
            step_requested: Mutex::new(false),
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            tick_durations: Mutex::new(VecDeque::with_capacity(TICK_WINDOW)),
        }
    }

    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold;
        self
    }

    /// Queue a frame for the next tick. Never fails for priority/queue
    /// reasons (oldest at the same priority is evicted); fails only if the
    /// frame's own shape invariants are violated.
    pub async fn submit(&self, channel: ChannelId, frame: Frame) -> Result<(), FrameManagerError> {
        frame.validate_preview().map_err(FrameError::from)?;
        let mut slots = self.slots.lock().await;
        if let Some(slot) = slots.get_mut(&channel) {
            if let FrameKind::Pixel(map) = &frame.kind {
                for zone in map.keys() {
                    if let Some((start, end)) = slot.channel.zone_range(*zone) {
                        frame.validate_zone_pixels(*zone, end - start).map_err(FrameError::from)?;
                    }
                }
            }
            slot.submit(frame);
        } else {
            warn!(?channel, "submit() to unknown channel ignored");
        }
        Ok(())
    }

    /// Zero every channel's staging buffer and flush once. Used by the
    /// shutdown handler at `priority::OUTPUT_CHANNEL_CLEAR` so LEDs go dark
    /// immediately instead of waiting on TTL expiry.
    pub async fn clear_all(&self) {
        let mut slots = self.slots.lock().await;
        for slot in slots.values_mut() {
            match slot.channel.clear() {
                Ok(()) => {
                    slot.last_rendered = Some(Frame::new(
                        FrameKind::FullStrip(crate::color::Color::black()),
                        Priority::Idle,
                        crate::frame::Source::Idle,
                    ));
                    slot.last_flush_at = Some(Instant::now());
                }
                Err(e) => {
                    error!(channel = ?slot.channel.id(), error = %e, "clear_all: channel clear failed");
                }
            }
        }
    }

    pub async fn pause(&self) {
        *self.paused.lock().await = true;
    }

    pub async fn resume(&self) {
        *self.paused.lock().await = false;
        let mut slots = self.slots.lock().await;
        for slot in slots.values_mut() {
            slot.quarantined = false;
            slot.consecutive_failures = 0;
        }
    }

    /// Execute exactly one tick regardless of pause state. Fails if not
    /// currently paused.
    pub async fn step(&self) -> Result<(), FrameManagerError> {
        if !*self.paused.lock().await {
            return Err(FrameManagerError::NotPaused);
        }
        *self.step_requested.lock().await = true;
        self.tick_once().await;
        Ok(())
    }

    pub async fn set_rate(&self, hz: i64) -> Result<(), FrameManagerError> {
        if hz <= 0 {
            return Err(FrameManagerError::NonPositiveRate(hz));
        }
        *self.rate_hz.lock().await = hz as u32;
        Ok(())
    }

    pub async fn snapshot(&self) -> ManagerSnapshot {
        let slots = self.slots.lock().await;
        let durations = self.tick_durations.lock().await;
        let average_tick = if durations.is_empty() {
            Duration::ZERO
        } else {
            durations.iter().sum::<Duration>() / durations.len() as u32
        };
        ManagerSnapshot {
            channels: slots
                .values()
                .map(|s| ChannelSnapshot {
                    channel: s.channel.id(),
                    last_rendered: s.last_rendered.clone(),
                    counters: s.counters.clone(),
                    quarantined: s.quarantined,
                })
                .collect(),
            average_tick,
            rate_hz: *self.rate_hz.lock().await,
            paused: *self.paused.lock().await,
        }
    }

    /// Run the render loop until `shutdown.cancelled()` resolves. Spawned as
    /// a task by the application's `main`; runs concurrently with any
    /// caller of `step()`, so a pending step is consumed atomically inside
    /// `tick_once` rather than observed-then-acted-on here.
    pub async fn run(&self, shutdown: tokio_util_cancel::CancelSignal) {
        loop {
            if shutdown.is_cancelled() {
                return;
            }
            self.tick_once().await;
        }
    }

    /// Whether this invocation of `tick_once` should perform a real tick.
    /// When paused, a pending `step_requested` flag is consumed atomically
    /// under one lock acquisition, so a concurrent caller (the `run()` loop
    /// racing a direct `step()` call) can never also consume it and produce
    /// a second tick for the same step.
    async fn should_tick_now(&self) -> bool {
        if !*self.paused.lock().await {
            return true;
        }
        let mut stepping = self.step_requested.lock().await;
        if *stepping {
            *stepping = false;
            true
        } else {
            false
        }
    }

    /// One iteration of the render tick algorithm (spec §4.2).
    async fn tick_once(&self) {
        let tick_start = Instant::now();
        if !self.should_tick_now().await {
            let rate = *self.rate_hz.lock().await;
            tokio::time::sleep(Duration::from_secs_f64(1.0 / rate.max(1) as f64)).await;
            return;
        }

        let now = Instant::now();
        let failure_threshold = self.failure_threshold;
        let mut slots = self.slots.lock().await;
        for slot in slots.values_mut() {
            if slot.quarantined {
                continue;
            }
            let winner = match slot.select_winner(now) {
                Some(f) => Some(f),
                None => match &slot.last_rendered {
                    Some(last) if !last.is_expired(now) => Some(last.clone()),
                    _ => None,
                },
            };

            let min_interval = slot.channel.min_flush_interval();
            if let Some(last_flush) = slot.last_flush_at {
                let since = now.saturating_duration_since(last_flush);
                if since < min_interval {
                    tokio::time::sleep(min_interval - since).await;
                }
            }

            let frame = winner.unwrap_or_else(|| {
                Frame::new(
                    FrameKind::FullStrip(crate::color::Color::black()),
                    Priority::Idle,
                    crate::frame::Source::Idle,
                )
                .with_ttl(DEFAULT_TTL)
            });

            match slot.dispatch(&frame) {
                Ok(()) => {
                    slot.last_rendered = Some(frame);
                    slot.last_flush_at = Some(Instant::now());
                    slot.consecutive_failures = 0;
                }
                Err(e) => {
                    error!(channel = ?slot.channel.id(), priority = ?frame.priority, source = ?frame.source, error = %e, "channel apply failed");
                    slot.consecutive_failures += 1;
                    if slot.consecutive_failures >= failure_threshold {
                        warn!(channel = ?slot.channel.id(), failures = slot.consecutive_failures, "quarantining channel after repeated failures");
                        slot.quarantined = true;
                    }
                }
            }
        }

        let tick_duration = Instant::now().saturating_duration_since(tick_start);
        let mut durations = self.tick_durations.lock().await;
        durations.push_back(tick_duration);
        if durations.len() > TICK_WINDOW {
            durations.pop_front();
        }
        drop(durations);
        drop(slots);

        let rate = *self.rate_hz.lock().await;
        let budget = Duration::from_secs_f64(1.0 / rate.max(1) as f64);
        if tick_duration < budget {
            tokio::time::sleep(budget - tick_duration).await;
        }
        debug!(?tick_duration, "tick complete");
    }
}

/// Minimal cooperative-cancellation token so `FrameManager::run` doesn't
/// need to depend on the application's concrete shutdown type.
pub mod tokio_util_cancel {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Clone, Default)]
    pub struct CancelSignal(Arc<AtomicBool>);

    impl CancelSignal {
        pub fn new() -> Self {
            Self(Arc::new(AtomicBool::new(false)))
        }

        pub fn cancel(&self) {
            self.0.store(true, Ordering::SeqCst);
        }

        pub fn is_cancelled(&self) -> bool {
            self.0.load(Ordering::SeqCst)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{BufferChannel, ChannelId};
    use crate::color::Color;
    use crate::frame::{FrameKind, Priority, Source};
    use std::collections::HashMap as Map;

    fn manager_with_floor() -> FrameManager {
        let mut zones = Map::new();
        zones.insert(ZoneId::Floor, (0, 15));
        let ch = BufferChannel::new(ChannelId::Main, 30, zones);
        FrameManager::new(vec![Box::new(ch)])
    }

    #[tokio::test]
    async fn single_static_color_renders_after_one_tick() {
        let mgr = manager_with_floor();
        let mut map = Map::new();
        map.insert(ZoneId::Floor, Color::Raw(255, 0, 0));
        mgr.submit(
            ChannelId::Main,
            Frame::new(FrameKind::Zone(map), Priority::Manual, Source::Static),
        )
        .await
        .unwrap();

        mgr.tick_once().await;
        let snap = mgr.snapshot().await;
        let last = snap.channels[0].last_rendered.clone().unwrap();
        match last.kind {
            FrameKind::Zone(m) => assert_eq!(m.get(&ZoneId::Floor), Some(&Color::Raw(255, 0, 0))),
            _ => panic!("expected zone frame"),
        }
    }

    #[tokio::test]
    async fn higher_priority_preempts_lower() {
        let mgr = manager_with_floor();
        let mut red = Map::new();
        red.insert(ZoneId::Floor, Color::Raw(255, 0, 0));
        mgr.submit(ChannelId::Main, Frame::new(FrameKind::Zone(red), Priority::Manual, Source::Static))
            .await
            .unwrap();

        let mut blue = Map::new();
        blue.insert(ZoneId::Floor, Color::Raw(0, 0, 255));
        mgr.submit(ChannelId::Main, Frame::new(FrameKind::Zone(blue), Priority::Animation, Source::Animation))
            .await
            .unwrap();

        mgr.tick_once().await;
        let snap = mgr.snapshot().await;
        let last = snap.channels[0].last_rendered.clone().unwrap();
        match last.kind {
            FrameKind::Zone(m) => assert_eq!(m.get(&ZoneId::Floor), Some(&Color::Raw(0, 0, 255))),
            _ => panic!("expected zone frame"),
        }
    }

    #[tokio::test]
    async fn empty_queue_and_expired_cache_falls_back_to_idle_black() {
        let mgr = manager_with_floor();
        let mut red = Map::new();
        red.insert(ZoneId::Floor, Color::Raw(255, 0, 0));
        mgr.submit(
            ChannelId::Main,
            Frame::new(FrameKind::Zone(red), Priority::Manual, Source::Static)
                .with_ttl(Duration::from_millis(1)),
        )
        .await
        .unwrap();
        mgr.tick_once().await;
        tokio::time::sleep(Duration::from_millis(5)).await;
        mgr.tick_once().await;

        let snap = mgr.snapshot().await;
        let last = snap.channels[0].last_rendered.clone().unwrap();
        assert_eq!(last.priority, Priority::Idle);
        match last.kind {
            FrameKind::FullStrip(c) => assert_eq!(c.to_rgb(), (0, 0, 0)),
            _ => panic!("expected implicit idle full-strip frame"),
        }
    }

    #[tokio::test]
    async fn pause_then_resume_preserves_last_rendered() {
        let mgr = manager_with_floor();
        let mut red = Map::new();
        red.insert(ZoneId::Floor, Color::Raw(1, 2, 3));
        mgr.submit(ChannelId::Main, Frame::new(FrameKind::Zone(red), Priority::Manual, Source::Static))
            .await
            .unwrap();
        mgr.tick_once().await;
        let before = mgr.snapshot().await.channels[0].last_rendered.clone();

        mgr.pause().await;
        mgr.resume().await;
        let after = mgr.snapshot().await.channels[0].last_rendered.clone();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn duplicate_submission_within_one_tick_renders_once() {
        let mgr = manager_with_floor();
        let mut red = Map::new();
        red.insert(ZoneId::Floor, Color::Raw(9, 9, 9));
        let frame = Frame::new(FrameKind::Zone(red), Priority::Manual, Source::Static);
        mgr.submit(ChannelId::Main, frame.clone()).await.unwrap();
        mgr.submit(ChannelId::Main, frame).await.unwrap();

        let slots = mgr.slots.lock().await;
        let slot = &slots[&ChannelId::Main];
        assert_eq!(slot.queues[&Priority::Manual].len(), 2);
    }

    #[tokio::test]
    async fn set_rate_rejects_non_positive() {
        let mgr = manager_with_floor();
        assert!(mgr.set_rate(0).await.is_err());
        assert!(mgr.set_rate(-5).await.is_err());
        assert!(mgr.set_rate(30).await.is_ok());
    }

    #[tokio::test]
    async fn channel_quarantined_after_threshold_failures_and_cleared_on_resume() {
        let mut zones = Map::new();
        zones.insert(ZoneId::Floor, (0, 15));
        let mut ch = BufferChannel::new(ChannelId::Main, 30, zones);
        ch.inject_failures(3);
        let mgr = FrameManager::new(vec![Box::new(ch)]).with_failure_threshold(3);

        for _ in 0..3 {
            mgr.tick_once().await;
        }
        assert!(mgr.snapshot().await.channels[0].quarantined);

        mgr.pause().await;
        mgr.resume().await;
        assert!(!mgr.snapshot().await.channels[0].quarantined);
    }

    #[tokio::test]
    async fn step_fails_when_not_paused() {
        let mgr = manager_with_floor();
        assert!(mgr.step().await.is_err());
        mgr.pause().await;
        assert!(mgr.step().await.is_ok());
    }
}
