//! Animation trait, parameter model, and the closed catalog.

mod breathe;
mod color_cycle;
mod color_fade;
mod color_snake;
mod matrix;
mod snake;

pub use breathe::Breathe;
pub use color_cycle::ColorCycle;
pub use color_fade::ColorFade;
pub use color_snake::ColorSnake;
pub use matrix::Matrix;
pub use snake::Snake;

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::ParamError;
use crate::frame::Frame;
use crate::zone::ZoneId;

/// A zone this animation paints, paired with that zone's configured pixel
/// count -- needed by the `Pixel`-frame animations (Snake, ColorSnake,
/// Matrix) to size their per-zone pixel vectors correctly.
pub type ZoneSpan = (ZoneId, usize);

/// Closed catalog of animation kinds. Implementers may extend this in their
/// own builds; the six below are the required minimum.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AnimationId {
    Breathe,
    ColorFade,
    ColorCycle,
    Snake,
    ColorSnake,
    Matrix,
}

/// A parameter's declared identity. Stable across the animation's lifetime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ParamId {
    Speed,
    Intensity,
    Hue,
    Length,
    HueOffset,
}

impl ParamId {
    pub fn name(&self) -> &'static str {
        match self {
            ParamId::Speed => "speed",
            ParamId::Intensity => "intensity",
            ParamId::Hue => "hue",
            ParamId::Length => "length",
            ParamId::HueOffset => "hue_offset",
        }
    }
}

/// A declared parameter's type/range, independent of its current value.
#[derive(Clone, Debug, PartialEq)]
pub enum ParamDecl {
    Int { min: i32, max: i32, step: i32, default: i32 },
    Float { min: f32, max: f32, step: f32, default: f32 },
    Bool { default: bool },
    Hue { default: u16 },
}

/// A parameter's current value, as submitted by a caller.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ParamValue {
    Int(i32),
    Float(f32),
    Bool(bool),
    Hue(u16),
}

impl ParamValue {
    fn type_name(&self) -> &'static str {
        match self {
            ParamValue::Int(_) => "Int",
            ParamValue::Float(_) => "Float",
            ParamValue::Bool(_) => "Bool",
            ParamValue::Hue(_) => "Hue",
        }
    }
}

/// Declared parameters for one animation instance: id -> (decl, current).
#[derive(Clone, Debug, Default)]
pub struct ParamMap(pub HashMap<ParamId, (ParamDecl, ParamValue)>);

impl ParamMap {
    pub fn get(&self, id: ParamId) -> Option<ParamValue> {
        self.0.get(&id).map(|(_, v)| *v)
    }

    /// Validate `value` against `id`'s declaration and, if valid, store it.
    pub fn validate_and_set(&mut self, id: ParamId, value: ParamValue) -> Result<(), ParamError> {
        let (decl, slot) = self
            .0
            .get_mut(&id)
            .ok_or_else(|| ParamError::UnknownParameter(id.name().to_string()))?;
        match (&decl, value) {
            (ParamDecl::Int { min, max, step, .. }, ParamValue::Int(v)) => {
                if v < *min || v > *max {
                    return Err(ParamError::OutOfRange {
                        name: id.name().to_string(),
                        value: v as i64,
                        min: *min as i64,
                        max: *max as i64,
                    });
                }
                if (v - min) % step != 0 {
                    return Err(ParamError::BadStep {
                        name: id.name().to_string(),
                        value: v as i64,
                        step: *step as i64,
                    });
                }
            }
            (ParamDecl::Float { min, max, .. }, ParamValue::Float(v)) => {
                if v < *min || v > *max {
                    return Err(ParamError::OutOfRange {
                        name: id.name().to_string(),
                        value: v as i64,
                        min: *min as i64,
                        max: *max as i64,
                    });
                }
            }
            (ParamDecl::Bool { .. }, ParamValue::Bool(_)) => {}
            (ParamDecl::Hue { .. }, ParamValue::Hue(h)) => {
                if h >= 360 {
                    return Err(ParamError::OutOfRange {
                        name: id.name().to_string(),
                        value: h as i64,
                        min: 0,
                        max: 359,
                    });
                }
            }
            _ => {
                return Err(ParamError::TypeMismatch {
                    name: id.name().to_string(),
                    expected: decl_type_name(decl),
                    got: value.type_name(),
                });
            }
        }
        *slot = value;
        Ok(())
    }
}

fn decl_type_name(decl: &ParamDecl) -> &'static str {
    match decl {
        ParamDecl::Int { .. } => "Int",
        ParamDecl::Float { .. } => "Float",
        ParamDecl::Bool { .. } => "Bool",
        ParamDecl::Hue { .. } => "Hue",
    }
}

/// A producer of a lazy, restartable sequence of frames, live-mutable while
/// running. `next_frame` never blocks on I/O; it is pure compute plus an
/// optional pacing sleep, and it must yield at least once per iteration so
/// cancellation is observable within one frame period.
#[async_trait]
pub trait Animation: Send {
    fn id(&self) -> AnimationId;
    fn zones(&self) -> &[ZoneId];
    fn parameters(&self) -> &ParamMap;
    fn set_parameter(&mut self, id: ParamId, value: ParamValue) -> Result<(), ParamError>;
    async fn next_frame(&mut self) -> Option<Frame>;
}

/// Maps `AnimationId` + initial parameters + zone selection to a boxed
/// running instance. The "dynamic dispatch by animation id" pattern from
/// the design notes.
pub fn build(
    id: AnimationId,
    zones: Vec<ZoneSpan>,
    overrides: HashMap<ParamId, ParamValue>,
) -> Result<Box<dyn Animation>, ParamError> {
    let mut anim: Box<dyn Animation> = match id {
        AnimationId::Breathe => Box::new(Breathe::new(zones)),
        AnimationId::ColorFade => Box::new(ColorFade::new(zones)),
        AnimationId::ColorCycle => Box::new(ColorCycle::new(zones)),
        AnimationId::Snake => Box::new(Snake::new(zones)),
        AnimationId::ColorSnake => Box::new(ColorSnake::new(zones)),
        AnimationId::Matrix => Box::new(Matrix::new(zones)),
    };
    for (param_id, value) in overrides {
        anim.set_parameter(param_id, value)?;
    }
    Ok(anim)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zone::ZoneId;

    #[test]
    fn rejects_out_of_range_int() {
        let mut p = Breathe::new(vec![(ZoneId::Floor, 15)]);
        let err = p.set_parameter(ParamId::Speed, ParamValue::Int(1000)).unwrap_err();
        assert!(matches!(err, ParamError::OutOfRange { .. }));
    }

    #[test]
    fn rejects_unknown_parameter() {
        let mut p = ColorCycle::new(vec![(ZoneId::Floor, 15)]);
        let err = p.set_parameter(ParamId::Speed, ParamValue::Int(1)).unwrap_err();
        assert!(matches!(err, ParamError::UnknownParameter(_)));
    }

    #[test]
    fn rejects_type_mismatch() {
        let mut p = Breathe::new(vec![(ZoneId::Floor, 15)]);
        let err = p.set_parameter(ParamId::Speed, ParamValue::Bool(true)).unwrap_err();
        assert!(matches!(err, ParamError::TypeMismatch { .. }));
    }
}
