//! Graph of panel-to-panel links plus everything that draws, creates and
//! destroys them.

pub mod drag;
pub mod routing;
pub mod slicer;

use crate::panel::{find_panel, Panel, PanelId};
use log::debug;
use std::fmt;
use thiserror::Error;

pub use drag::{ConnectionDrag, DragOutcome};
pub use routing::{route_l_path, PathCommand};
pub use slicer::{CutConnection, CutId, SlicePoint, Slicer};

/// Identity derived from the ordered pair of endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId {
    pub from: PanelId,
    pub to: PanelId,
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "connection-{}-{}", self.from, self.to)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Connection {
    pub id: ConnectionId,
    pub from: PanelId,
    pub to: PanelId,
}

impl Connection {
    pub fn new(from: PanelId, to: PanelId) -> Self {
        Self {
            id: ConnectionId { from, to },
            from,
            to,
        }
    }

    pub fn touches(&self, panel: PanelId) -> bool {
        self.from == panel || self.to == panel
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConnectError {
    #[error("{0} cannot connect to itself")]
    SelfConnection(PanelId),
    #[error("{0} and {1} are already connected")]
    Duplicate(PanelId, PanelId),
    #[error("{0} is not a live panel")]
    UnknownPanel(PanelId),
}

/// Undirected-unique set of directed links, kept in insertion order.
#[derive(Debug, Clone, Default)]
pub struct ConnectionGraph {
    connections: Vec<Connection>,
}

impl ConnectionGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect(&mut self, from: PanelId, to: PanelId) -> Result<Connection, ConnectError> {
        if from == to {
            return Err(ConnectError::SelfConnection(from));
        }
        if self.are_connected(from, to) {
            return Err(ConnectError::Duplicate(from, to));
        }
        let connection = Connection::new(from, to);
        self.connections.push(connection);
        debug!("{} created", connection.id);
        Ok(connection)
    }

    pub fn disconnect(&mut self, id: ConnectionId) -> Option<Connection> {
        let index = self.connections.iter().position(|c| c.id == id)?;
        Some(self.connections.remove(index))
    }

    /// True if a link exists in either direction.
    pub fn are_connected(&self, a: PanelId, b: PanelId) -> bool {
        self.connections
            .iter()
            .any(|c| (c.from == a && c.to == b) || (c.from == b && c.to == a))
    }

    /// Drops every link touching `panel` and returns their ids.
    pub fn remove_panel(&mut self, panel: PanelId) -> Vec<ConnectionId> {
        let removed = self
            .connections
            .iter()
            .filter(|c| c.touches(panel))
            .map(|c| c.id)
            .collect();
        self.connections.retain(|c| !c.touches(panel));
        removed
    }

    pub fn get(&self, id: ConnectionId) -> Option<&Connection> {
        self.connections.iter().find(|c| c.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Connection> {
        self.connections.iter()
    }

    pub fn as_slice(&self) -> &[Connection] {
        &self.connections
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn clear(&mut self) {
        self.connections.clear();
    }
}

/// Pairs each connection with its live endpoint panels. Connections whose
/// endpoints are missing or exiting are skipped, not removed.
pub fn resolve<'a>(
    connections: &'a [Connection],
    panels: &'a [Panel],
) -> impl Iterator<Item = (&'a Connection, &'a Panel, &'a Panel)> + 'a {
    connections.iter().filter_map(move |connection| {
        let from = find_panel(panels, connection.from).filter(|p| p.is_live())?;
        let to = find_panel(panels, connection.to).filter(|p| p.is_live())?;
        Some((connection, from, to))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Vec2;

    #[test]
    fn rejects_self_and_reverse_duplicates() {
        let mut graph = ConnectionGraph::new();
        assert!(graph.connect(PanelId(1), PanelId(2)).is_ok());
        assert_eq!(
            graph.connect(PanelId(2), PanelId(1)),
            Err(ConnectError::Duplicate(PanelId(2), PanelId(1)))
        );
        assert_eq!(
            graph.connect(PanelId(3), PanelId(3)),
            Err(ConnectError::SelfConnection(PanelId(3)))
        );
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn ids_name_both_endpoints() {
        let connection = Connection::new(PanelId(1), PanelId(4));
        assert_eq!(connection.id.to_string(), "connection-panel-1-panel-4");
    }

    #[test]
    fn removing_a_panel_drops_its_links() {
        let mut graph = ConnectionGraph::new();
        graph.connect(PanelId(1), PanelId(2)).unwrap();
        graph.connect(PanelId(3), PanelId(1)).unwrap();
        graph.connect(PanelId(2), PanelId(3)).unwrap();
        let removed = graph.remove_panel(PanelId(1));
        assert_eq!(removed.len(), 2);
        assert_eq!(graph.len(), 1);
        assert!(graph.are_connected(PanelId(3), PanelId(2)));
    }

    #[test]
    fn dangling_links_are_skipped_but_kept() {
        let mut graph = ConnectionGraph::new();
        graph.connect(PanelId(1), PanelId(2)).unwrap();
        graph.connect(PanelId(1), PanelId(9)).unwrap();
        let size = Vec2::new(220.0, 220.0);
        let panels = vec![
            Panel::new(PanelId(1), Vec2::zeros(), size),
            Panel::new(PanelId(2), Vec2::new(400.0, 0.0), size),
        ];
        let live: Vec<_> = resolve(graph.as_slice(), &panels).collect();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].0.to, PanelId(2));
        assert_eq!(graph.len(), 2);
    }
}
