//! Zone identity and runtime state.

use serde::{Deserialize, Serialize};

use crate::channel::ChannelId;
use crate::color::Color;

/// Closed set of zone identifiers. Configuration selects a subset of this
/// compiled-in set and binds each to a channel and pixel range; it never
/// invents new identifiers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ZoneId {
    Floor,
    Lamp,
    Top,
    Left,
    Right,
    Bottom,
    Preview,
}

/// Whether a zone is painted by a static setter, an animation, or nothing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderMode {
    Static,
    Animation,
    Off,
}

/// Immutable zone configuration, resolved once from the zone + hardware
/// manifests at startup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ZoneConfig {
    pub id: ZoneId,
    pub display_name: String,
    pub pixel_count: usize,
    pub channel: ChannelId,
    /// `[start, end)` absolute pixel range on `channel`.
    pub range: (usize, usize),
}

/// Mutable per-zone runtime state.
#[derive(Clone, Debug, PartialEq)]
pub struct ZoneState {
    pub current_color: Color,
    pub brightness: u8,
    pub render_mode: RenderMode,
}

impl Default for ZoneState {
    fn default() -> Self {
        Self {
            current_color: Color::black(),
            brightness: 255,
            render_mode: RenderMode::Off,
        }
    }
}

/// A configured zone paired with its mutable runtime state.
#[derive(Clone, Debug)]
pub struct Zone {
    pub config: ZoneConfig,
    pub state: ZoneState,
}

impl Zone {
    pub fn new(config: ZoneConfig) -> Self {
        Self {
            config,
            state: ZoneState::default(),
        }
    }
}
