//! Reactive background: the spring-damped dot lattice, ripple pulses and the
//! flat dot-pattern alternative.

pub mod dot_pattern;
pub mod grid;
pub mod pulse;

pub use grid::{FieldGrid, GridCoord, GridDot, GridEdge};
pub use pulse::PulseEvent;
