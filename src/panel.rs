use crate::geometry::{Rect, Vec2};
use std::fmt;

/// Height a minimized panel collapses to (its header).
pub const PANEL_HEADER_HEIGHT: f64 = 40.0;
pub const DEFAULT_PANEL_WIDTH: f64 = 220.0;
pub const DEFAULT_PANEL_HEIGHT: f64 = 220.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PanelId(pub u32);

impl fmt::Display for PanelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "panel-{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TodoItem {
    pub text: String,
    pub done: bool,
}

/// What a panel shows. The simulation only ever looks at geometry.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum PanelContent {
    /// Freshly spawned panel offering a content type picker
    #[default]
    Selector,
    Note {
        text: String,
    },
    Todo {
        items: Vec<TodoItem>,
    },
    Image {
        source: String,
    },
    Tool {
        tool_id: String,
    },
}

/// Snapshot record of one panel, owned by the host.
#[derive(Debug, Clone, PartialEq)]
pub struct Panel {
    pub id: PanelId,
    pub position: Vec2,
    /// Width and full (unminimized) height
    pub size: Vec2,
    pub minimized: bool,
    pub color: Option<String>,
    /// Set while the removal animation plays; exiting panels take no part
    /// in physics or hit-testing.
    pub exiting: bool,
    pub title: String,
    pub content: PanelContent,
}

impl Panel {
    pub fn new(id: PanelId, position: Vec2, size: Vec2) -> Self {
        Self {
            id,
            position,
            size,
            minimized: false,
            color: None,
            exiting: false,
            title: String::new(),
            content: PanelContent::default(),
        }
    }

    /// Panel of the default size centred on `center`.
    pub fn centered_at(id: PanelId, center: Vec2) -> Self {
        let size = Vec2::new(DEFAULT_PANEL_WIDTH, DEFAULT_PANEL_HEIGHT);
        Self::new(id, center - size / 2.0, size)
    }

    pub fn width(&self) -> f64 {
        self.size.x
    }

    pub fn effective_height(&self) -> f64 {
        if self.minimized {
            PANEL_HEADER_HEIGHT
        } else {
            self.size.y
        }
    }

    pub fn effective_size(&self) -> Vec2 {
        Vec2::new(self.size.x, self.effective_height())
    }

    pub fn rect(&self) -> Rect {
        Rect::new(
            self.position.x,
            self.position.y,
            self.size.x,
            self.effective_height(),
        )
    }

    pub fn center(&self) -> Vec2 {
        self.rect().center()
    }

    pub fn is_live(&self) -> bool {
        !self.exiting
    }
}

/// Looks a panel up by id, including exiting ones.
pub fn find_panel(panels: &[Panel], id: PanelId) -> Option<&Panel> {
    panels.iter().find(|panel| panel.id == id)
}

/// Topmost live panel under `point`. Panels are in paint order, last on top.
pub fn panel_at(panels: &[Panel], point: Vec2) -> Option<&Panel> {
    panels
        .iter()
        .rev()
        .find(|panel| panel.is_live() && panel.rect().contains(point))
}

/// Rectangles of every live panel, for the physics passes.
pub fn live_rects(panels: &[Panel]) -> Vec<Rect> {
    panels
        .iter()
        .filter(|panel| panel.is_live())
        .map(Panel::rect)
        .collect()
}
