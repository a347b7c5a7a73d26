//! Color model: a tagged variant over hue, named preset, and raw RGB.
//!
//! `with_brightness` is the only way to dim a color in the rendering
//! pipeline and is variant-preserving -- a `Hue` stays a `Hue` after
//! scaling, just at a lower implicit value. RGB is derived from a `Color`
//! exactly once, at the `OutputChannel` flush boundary (see `channel.rs`).

use serde::{Deserialize, Serialize};

/// A color in one of three representable modes, plus the `Black`
/// convenience constructor.
///
/// `Hue` carries an implicit HSV value channel (full by default, scaled down
/// by `with_brightness`) so that repeated dimming stays representable
/// without collapsing into `Raw`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum Color {
    Hue { degrees: u16, value: u8 },
    Preset { name: ColorName, rgb: (u8, u8, u8) },
    Raw(u8, u8, u8),
}

/// Interned preset name. A `String` would work equally well; this newtype
/// just keeps `Color` trivially `Copy`-adjacent in spirit (it still isn't
/// `Copy` because of the heap string, but callers rarely need that).
pub type ColorName = std::borrow::Cow<'static, str>;

/// Which constructor produced a `Color`, independent of its current value.
/// Used to assert that `with_brightness` never collapses the mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColorMode {
    Hue,
    Preset,
    Raw,
}

impl Color {
    pub const BLACK: Color = Color::Raw(0, 0, 0);

    pub fn black() -> Color {
        Color::BLACK
    }

    /// Construct a fully saturated hue at maximum value.
    pub fn hue(degrees: u16) -> Color {
        Color::Hue {
            degrees: degrees % 360,
            value: 255,
        }
    }

    pub fn preset(name: impl Into<ColorName>, rgb: (u8, u8, u8)) -> Color {
        Color::Preset {
            name: name.into(),
            rgb,
        }
    }

    pub fn mode(&self) -> ColorMode {
        match self {
            Color::Hue { .. } => ColorMode::Hue,
            Color::Preset { .. } => ColorMode::Preset,
            Color::Raw(..) => ColorMode::Raw,
        }
    }

    /// Resolve this color to its `(r, g, b)` triple. The only place hue-to-RGB
    /// conversion happens; callers should otherwise treat `Color` opaquely.
    pub fn to_rgb(&self) -> (u8, u8, u8) {
        match self {
            Color::Hue { degrees, value } => scale_rgb(hue_to_rgb(*degrees), *value),
            Color::Preset { rgb, .. } => *rgb,
            Color::Raw(r, g, b) => (*r, *g, *b),
        }
    }

    /// Scale this color by `brightness / 255`, rounding down, preserving
    /// `mode()`. `with_brightness(255)` leaves `to_rgb()` unchanged;
    /// `with_brightness(0)` always resolves to `(0, 0, 0)`.
    pub fn with_brightness(&self, brightness: u8) -> Color {
        match self {
            Color::Hue { degrees, value } => Color::Hue {
                degrees: *degrees,
                value: ((*value as u32 * brightness as u32) / 255) as u8,
            },
            Color::Preset { name, rgb } => Color::Preset {
                name: name.clone(),
                rgb: scale_rgb(*rgb, brightness),
            },
            Color::Raw(r, g, b) => {
                let (r, g, b) = scale_rgb((*r, *g, *b), brightness);
                Color::Raw(r, g, b)
            }
        }
    }
}

fn scale_rgb((r, g, b): (u8, u8, u8), brightness: u8) -> (u8, u8, u8) {
    let scale = |c: u8| ((c as u32 * brightness as u32) / 255) as u8;
    (scale(r), scale(g), scale(b))
}

/// HSV→RGB with S=1, at the given value `[0, 255]`.
fn hue_to_rgb(hue: u16) -> (u8, u8, u8) {
    let h = (hue % 360) as f32;
    let c = 255.0_f32;
    let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
    let (r1, g1, b1) = match h as u32 {
        0..=59 => (c, x, 0.0),
        60..=119 => (x, c, 0.0),
        120..=179 => (0.0, c, x),
        180..=239 => (0.0, x, c),
        240..=299 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    (r1 as u8, g1 as u8, b1 as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn brightness_preserves_mode() {
        for c in [
            Color::hue(240),
            Color::preset("warm-white", (255, 214, 170)),
            Color::Raw(10, 20, 30),
        ] {
            for b in [0u8, 1, 128, 255] {
                assert_eq!(c.with_brightness(b).mode(), c.mode());
            }
        }
    }

    #[test]
    fn full_brightness_is_identity() {
        let c = Color::Raw(12, 200, 7);
        assert_eq!(c.with_brightness(255).to_rgb(), c.to_rgb());
    }

    #[test]
    fn zero_brightness_is_black() {
        for c in [Color::hue(90), Color::preset("p", (1, 2, 3)), Color::Raw(9, 9, 9)] {
            assert_eq!(c.with_brightness(0).to_rgb(), (0, 0, 0), "{c:?}");
        }
    }

    #[test]
    fn hue_blue_scales_as_raw_blue() {
        let c = Color::hue(240);
        let d = c.with_brightness(128);
        assert_eq!(d.mode(), ColorMode::Hue);
        assert_eq!(d.to_rgb(), (0, 0, 128));
    }

    #[test]
    fn black_is_raw_zero() {
        assert_eq!(Color::black(), Color::Raw(0, 0, 0));
        assert_eq!(Color::black().to_rgb(), (0, 0, 0));
    }
}
