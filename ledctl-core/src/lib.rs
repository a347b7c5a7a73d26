//! Rendering core, animation runtime, and shutdown coordinator for an
//! addressable-LED control system.
//!
//! Control flow (steady state): animations, the transition service, and
//! static setters all submit [`Frame`](frame::Frame)s; [`FrameManager`]
//! selects one winner per channel per tick and dispatches it through an
//! [`OutputChannel`](channel::OutputChannel). Shutdown flow: a signal trips
//! [`ShutdownCoordinator`], which runs registered handlers priority-first,
//! cancelling [`AnimationEngine`] tasks and flushing channels dark before
//! the process exits.

pub mod animation;
pub mod channel;
pub mod color;
pub mod config;
pub mod engine;
pub mod error;
pub mod event_bus;
pub mod frame;
pub mod frame_manager;
pub mod shutdown;
pub mod task_registry;
pub mod transition;
pub mod zone;

pub use animation::{Animation, AnimationId, ParamId, ParamValue};
pub use channel::{ChannelId, OutputChannel};
pub use color::Color;
pub use engine::AnimationEngine;
pub use error::{ConfigError, EngineError, FrameError, FrameManagerError, OutputError, ParamError};
pub use event_bus::EventBus;
pub use frame::{Frame, FrameKind, Priority, Source};
pub use frame_manager::FrameManager;
pub use shutdown::ShutdownCoordinator;
pub use task_registry::{TaskCategory, TaskRegistry};
pub use transition::TransitionService;
pub use zone::{RenderMode, Zone, ZoneConfig, ZoneId, ZoneState};
