//! Configuration loader: hardware manifest, zone manifest, zone-to-channel
//! mapping, and preset color dictionary, all TOML-encoded, folded into the
//! immutable runtime tables the rest of the crate consumes. YAML parsing
//! (the source project's actual format) is out of scope per spec §1; TOML
//! plus `serde` is the idiomatic substitute for an async-first Rust stack.

use std::collections::HashMap;

use serde::Deserialize;

use crate::channel::{ByteOrder, ChannelId};
use crate::color::Color;
use crate::error::ConfigError;
use crate::zone::ZoneConfig;
use crate::zone::ZoneId;

#[derive(Debug, Deserialize)]
pub struct HardwareManifest {
    pub channel: Vec<ChannelManifestEntry>,
}

#[derive(Debug, Deserialize)]
pub struct ChannelManifestEntry {
    pub id: ChannelId,
    pub address: String,
    pub chip: String,
    #[serde(default)]
    pub byte_order: ByteOrder,
    pub pixel_count: usize,
}

#[derive(Debug, Deserialize)]
pub struct ZoneManifest {
    pub zone: Vec<ZoneManifestEntry>,
}

#[derive(Debug, Deserialize)]
pub struct ZoneManifestEntry {
    pub id: ZoneId,
    pub display_name: String,
    pub pixel_count: usize,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub channel: ChannelId,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct ColorDictionary {
    #[serde(flatten)]
    pub presets: HashMap<String, (u8, u8, u8)>,
}

/// Resolved, immutable runtime configuration. Produced once at startup by
/// `load`; never mutated afterward.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub zones: HashMap<ZoneId, ZoneConfig>,
    pub channel_pixel_counts: HashMap<ChannelId, usize>,
    pub channel_byte_order: HashMap<ChannelId, ByteOrder>,
    pub presets: HashMap<String, (u8, u8, u8)>,
}

impl RuntimeConfig {
    /// Look up a preset by name, resolving it to a `Color::Preset` with its
    /// RGB already materialized -- the "eager resolution" design note from
    /// spec §9 that avoids a circular Color <-> ColorManager dependency.
    pub fn resolve_preset(&self, name: &str) -> Result<Color, ConfigError> {
        self.presets
            .get(name)
            .map(|rgb| Color::preset(name.to_string(), *rgb))
            .ok_or_else(|| ConfigError::UnknownPreset(name.to_string()))
    }
}

pub fn load(hardware_toml: &str, zone_toml: &str, colors_toml: &str) -> Result<RuntimeConfig, ConfigError> {
    let hardware: HardwareManifest = toml::from_str(hardware_toml)?;
    let zone_manifest: ZoneManifest = toml::from_str(zone_toml)?;
    let colors: ColorDictionary = toml::from_str(colors_toml)?;

    let channel_pixel_counts: HashMap<ChannelId, usize> =
        hardware.channel.iter().map(|c| (c.id, c.pixel_count)).collect();
    let channel_byte_order: HashMap<ChannelId, ByteOrder> =
        hardware.channel.iter().map(|c| (c.id, c.byte_order)).collect();

    let mut zones = HashMap::new();
    let mut next_offset: HashMap<ChannelId, usize> = HashMap::new();

    for entry in zone_manifest.zone.into_iter().filter(|z| z.enabled) {
        if zones.contains_key(&entry.id) {
            return Err(ConfigError::DuplicateZone(entry.id));
        }
        let capacity = *channel_pixel_counts
            .get(&entry.channel)
            .ok_or(ConfigError::UnknownChannel(entry.id, entry.channel))?;

        let start = *next_offset.get(&entry.channel).unwrap_or(&0);
        let end = start + entry.pixel_count;
        if end > capacity {
            return Err(ConfigError::ChannelOverbooked {
                zone: entry.id,
                channel: entry.channel,
                start,
                end,
                capacity,
            });
        }
        next_offset.insert(entry.channel, end);

        zones.insert(
            entry.id,
            ZoneConfig {
                id: entry.id,
                display_name: entry.display_name,
                pixel_count: entry.pixel_count,
                channel: entry.channel,
                range: (start, end),
            },
        );
    }

    Ok(RuntimeConfig {
        zones,
        channel_pixel_counts,
        channel_byte_order,
        presets: colors.presets,
    })
}

/// Convenience entry point: read the three manifest files from disk and
/// load them. Kept separate from `load` so tests can exercise the parsing
/// logic against inline TOML without touching the filesystem.
pub fn load_from_paths(
    hardware_path: impl AsRef<std::path::Path>,
    zone_path: impl AsRef<std::path::Path>,
    colors_path: impl AsRef<std::path::Path>,
) -> Result<RuntimeConfig, ConfigError> {
    let hardware_toml = std::fs::read_to_string(hardware_path)?;
    let zone_toml = std::fs::read_to_string(zone_path)?;
    let colors_toml = std::fs::read_to_string(colors_path)?;
    load(&hardware_toml, &zone_toml, &colors_toml)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HARDWARE: &str = r#"
        [[channel]]
        id = "Main"
        address = "spi0.0"
        chip = "ws2812b"
        byte_order = "Grb"
        pixel_count = 30
    "#;

    const ZONES: &str = r#"
        [[zone]]
        id = "Floor"
        display_name = "Floor strip"
        pixel_count = 15
        channel = "Main"

        [[zone]]
        id = "Lamp"
        display_name = "Desk lamp"
        pixel_count = 10
        channel = "Main"
    "#;

    const COLORS: &str = r#"
        warm-white = [255, 214, 170]
        deep-red = [180, 0, 0]
    "#;

    #[test]
    fn loads_zones_with_computed_ranges() {
        let config = load(HARDWARE, ZONES, COLORS).unwrap();
        assert_eq!(config.zones[&ZoneId::Floor].range, (0, 15));
        assert_eq!(config.zones[&ZoneId::Lamp].range, (15, 25));
    }

    #[test]
    fn overbooked_channel_is_rejected() {
        let zones = r#"
            [[zone]]
            id = "Floor"
            display_name = "Floor strip"
            pixel_count = 25
            channel = "Main"

            [[zone]]
            id = "Lamp"
            display_name = "Desk lamp"
            pixel_count = 10
            channel = "Main"
        "#;
        let err = load(HARDWARE, zones, COLORS).unwrap_err();
        assert!(matches!(err, ConfigError::ChannelOverbooked { .. }));
    }

    #[test]
    fn duplicate_zone_id_is_rejected() {
        let zones = r#"
            [[zone]]
            id = "Floor"
            display_name = "Floor strip"
            pixel_count = 10
            channel = "Main"

            [[zone]]
            id = "Floor"
            display_name = "Floor strip again"
            pixel_count = 5
            channel = "Main"
        "#;
        let err = load(HARDWARE, zones, COLORS).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateZone(_)));
    }

    #[test]
    fn unknown_preset_is_rejected() {
        let config = load(HARDWARE, ZONES, COLORS).unwrap();
        assert!(config.resolve_preset("not-declared").is_err());
        assert!(config.resolve_preset("warm-white").is_ok());
    }
}
