//! Typed error kinds for the rendering core.
//!
//! Configuration errors are fatal at startup, hardware-apply errors are
//! logged and swallowed, parameter/frame validation errors are surfaced to
//! the caller verbatim.

use thiserror::Error;

/// Malformed manifests, duplicate zone ids, channel pixel-range overbooking.
/// Fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("duplicate zone id `{0:?}` in zone manifest")]
    DuplicateZone(crate::zone::ZoneId),

    #[error("zone `{zone:?}` pixel range [{start}, {end}) overruns channel `{channel:?}` capacity of {capacity}")]
    ChannelOverbooked {
        zone: crate::zone::ZoneId,
        channel: crate::channel::ChannelId,
        start: usize,
        end: usize,
        capacity: usize,
    },

    #[error("zone `{0:?}` references unknown channel `{1:?}`")]
    UnknownChannel(crate::zone::ZoneId, crate::channel::ChannelId),

    #[error("preset color `{0}` referenced but not declared in the color dictionary")]
    UnknownPreset(String),

    #[error("failed to parse manifest: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to read manifest file: {0}")]
    Io(#[from] std::io::Error),
}

/// A single-channel hardware flush failed. Non-fatal; the caller logs and
/// continues to the next channel.
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("channel `{channel:?}` flush failed: {reason}")]
    FlushFailed {
        channel: crate::channel::ChannelId,
        reason: String,
    },

    #[error("channel `{channel:?}` is quarantined after {failures} consecutive failures")]
    Quarantined {
        channel: crate::channel::ChannelId,
        failures: u32,
    },
}

/// Range/type mismatch from a control input. Does not mutate animation state.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParamError {
    #[error("unknown parameter `{0}` for this animation")]
    UnknownParameter(String),

    #[error("parameter `{name}` value {value} is outside range [{min}, {max}]")]
    OutOfRange {
        name: String,
        value: i64,
        min: i64,
        max: i64,
    },

    #[error("parameter `{name}` value {value} is not a multiple of step {step}")]
    BadStep { name: String, value: i64, step: i64 },

    #[error("parameter `{name}` expected type {expected}, got {got}")]
    TypeMismatch {
        name: String,
        expected: &'static str,
        got: &'static str,
    },
}

/// A frame failed its shape invariants (wrong preview length, wrong
/// per-zone pixel count).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FrameError {
    #[error("preview frame has {got} pixels, expected {expected}")]
    PreviewLengthMismatch { got: usize, expected: usize },

    #[error("pixel frame for zone `{zone:?}` has {got} pixels, expected {expected}")]
    ZonePixelCountMismatch {
        zone: crate::zone::ZoneId,
        got: usize,
        expected: usize,
    },
}

/// Errors surfaced by the `FrameManager` public operations.
#[derive(Debug, Error)]
pub enum FrameManagerError {
    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error("step() called while not paused")]
    NotPaused,

    #[error("set_rate() requires a positive hertz value, got {0}")]
    NonPositiveRate(i64),
}

/// Errors surfaced by `AnimationEngine` control-surface operations.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("zone `{0:?}` is not configured")]
    UnknownZone(crate::zone::ZoneId),

    #[error("zone `{0:?}` has no running animation")]
    NotRunning(crate::zone::ZoneId),

    #[error(transparent)]
    Param(#[from] ParamError),

    #[error(transparent)]
    Frame(#[from] FrameManagerError),
}
