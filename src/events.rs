use crate::connections::slicer::CutId;
use crate::connections::{Connection, ConnectionId};
use crate::geometry::Vec2;
use crate::panel::PanelId;

/// Mutations and notifications flowing from the core to the host.
/// The host applies them and feeds the next snapshot back in.
#[derive(Debug, Clone, PartialEq)]
pub enum CanvasEvent {
    PositionChanged { id: PanelId, position: Vec2 },
    SizeChanged { id: PanelId, size: Vec2 },
    /// A panel hit the viewport boundary; `impact` is normalised to [0, 1].
    Bounce { id: PanelId, point: Vec2, impact: f64 },
    Dismiss(PanelId),
    MinimizeToggled { id: PanelId, minimized: bool },
    DragStart(PanelId),
    DragEnd(PanelId),
    PanelSpawned(PanelId),
    ConnectionCreated(Connection),
    ConnectionDeleted(ConnectionId),
    ConnectionCut { connection: ConnectionId, cut: CutId, point: Vec2 },
    CutAnimationComplete(CutId),
}

#[derive(Debug, Default)]
pub struct EventQueue {
    events: Vec<CanvasEvent>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: CanvasEvent) {
        self.events.push(event);
    }

    pub fn drain(&mut self) -> Vec<CanvasEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CanvasEvent> {
        self.events.iter()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
