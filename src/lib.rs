//! Interactive canvas core: a spring-damped dot field reacting to floating
//! panels, particle bursts, panel drag/momentum physics, and a connection
//! graph drawn as routed grid paths that can be sliced apart.

pub mod canvas;
pub mod clock;
pub mod connections;
pub mod events;
pub mod feedback;
pub mod field;
pub mod geometry;
pub mod motion;
pub mod panel;
pub mod particles;
pub mod render;
pub mod renderer;
pub mod settings;

pub use canvas::Canvas;
pub use connections::{Connection, ConnectionGraph, ConnectionId};
pub use events::{CanvasEvent, EventQueue};
pub use feedback::{AudioFeedback, Cue, CueKind};
pub use geometry::{Rect, Vec2};
pub use motion::{MotionEngine, PressTarget};
pub use panel::{Panel, PanelContent, PanelId};
pub use render::DrawList;
pub use renderer::{CanvasRenderer, FrameInput};
pub use settings::CanvasSettings;
