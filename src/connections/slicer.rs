use crate::connections::routing::routed_points;
use crate::connections::{resolve, ConnectionGraph, ConnectionId};
use crate::events::{CanvasEvent, EventQueue};
use crate::field::FieldGrid;
use crate::geometry::{ease_out_cubic, segment_intersection, Vec2};
use crate::panel::{Panel, PanelId};
use crate::settings::ConnectionSettings;
use log::debug;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CutId(pub u64);

impl fmt::Display for CutId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cut-{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlicePoint {
    pub position: Vec2,
    pub time: f64,
}

/// A severed connection playing its retraction animation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CutConnection {
    pub id: CutId,
    pub connection: ConnectionId,
    pub from: PanelId,
    pub to: PanelId,
    pub point: Vec2,
    pub time: f64,
}

/// The two shrinking halves of a cut path.
#[derive(Debug, Clone, PartialEq)]
pub struct CutRemnants {
    pub from_side: Vec<Vec2>,
    pub to_side: Vec<Vec2>,
    pub alpha: f64,
}

impl CutConnection {
    pub fn progress(&self, now: f64, settings: &ConnectionSettings) -> f64 {
        if settings.cut_duration <= 0.0 {
            return 1.0;
        }
        ((now - self.time) / settings.cut_duration).clamp(0.0, 1.0)
    }

    pub fn is_complete(&self, now: f64, settings: &ConnectionSettings) -> bool {
        self.progress(now, settings) >= 1.0
    }

    /// Both halves of `path` retracting toward the path point nearest the
    /// cut. `None` once the animation is over or the path is degenerate.
    pub fn remnants(
        &self,
        path: &[Vec2],
        now: f64,
        settings: &ConnectionSettings,
    ) -> Option<CutRemnants> {
        let progress = self.progress(now, settings);
        if progress >= 1.0 || path.len() < 2 {
            return None;
        }
        let len = path.len();
        let cut_index = path
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| {
                (**a - self.point)
                    .norm()
                    .total_cmp(&(**b - self.point).norm())
            })
            .map(|(i, _)| i)
            .unwrap_or(len / 2);

        let ease = ease_out_cubic(progress);
        let retract_from = ((cut_index + 1) as f64 * ease).floor() as usize;
        let from_end = cut_index.saturating_sub(retract_from).max(1);
        let retract_to = ((len - cut_index) as f64 * ease).floor() as usize;
        let to_start = (cut_index + retract_to).min(len - 2);

        Some(CutRemnants {
            from_side: path[..=from_end].to_vec(),
            to_side: path[to_start..].to_vec(),
            alpha: settings.line_alpha * (1.0 - ease * 0.8),
        })
    }
}

/// Slice gesture state: press on empty canvas, classify once the pointer
/// travels past the threshold, then test each new trail segment against
/// every live connection path.
#[derive(Debug, Clone, Default)]
pub struct Slicer {
    next_cut: u64,
    start: Option<Vec2>,
    last: Vec2,
    slicing: bool,
    trail: Vec<SlicePoint>,
}

impl Slicer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&mut self, pointer: Vec2) {
        self.start = Some(pointer);
        self.last = pointer;
        self.slicing = false;
    }

    pub fn is_pressed(&self) -> bool {
        self.start.is_some()
    }

    pub fn is_slicing(&self) -> bool {
        self.slicing
    }

    pub fn trail(&self) -> &[SlicePoint] {
        &self.trail
    }

    /// Pointer motion. Returns the connection cut by this segment, if any;
    /// it has already been removed from `graph`.
    #[allow(clippy::too_many_arguments)]
    pub fn update(
        &mut self,
        pointer: Vec2,
        now: f64,
        graph: &mut ConnectionGraph,
        panels: &[Panel],
        grid: &FieldGrid,
        settings: &ConnectionSettings,
        events: &mut EventQueue,
    ) -> Option<CutConnection> {
        let start = self.start?;
        if !self.slicing {
            if (pointer - start).norm() <= settings.slice_threshold {
                return None;
            }
            self.slicing = true;
            debug!("slice started at {:?}", start);
        }

        self.prune_trail(now, settings);
        self.trail.push(SlicePoint {
            position: pointer,
            time: now,
        });

        let blade = (self.last, pointer);
        self.last = pointer;
        let (id, point) = nearest_crossing(blade, graph, panels, grid)?;
        let connection = graph.disconnect(id)?;

        let cut = CutConnection {
            id: CutId(self.next_cut),
            connection: id,
            from: connection.from,
            to: connection.to,
            point,
            time: now,
        };
        self.next_cut += 1;
        events.push(CanvasEvent::ConnectionDeleted(id));
        events.push(CanvasEvent::ConnectionCut {
            connection: id,
            cut: cut.id,
            point,
        });
        debug!("{} cut at {:?} as {}", id, point, cut.id);
        Some(cut)
    }

    pub fn prune_trail(&mut self, now: f64, settings: &ConnectionSettings) {
        self.trail
            .retain(|p| now - p.time < settings.trail_lifetime);
    }

    /// Release. The trail stays and fades out by age.
    pub fn end(&mut self) {
        self.start = None;
        self.slicing = false;
    }

    pub fn cancel(&mut self) {
        self.end();
        self.trail.clear();
    }
}

/// Connection whose path the blade crosses closest to the blade's start.
/// Ties go to the earlier connection.
fn nearest_crossing(
    (a, b): (Vec2, Vec2),
    graph: &ConnectionGraph,
    panels: &[Panel],
    grid: &FieldGrid,
) -> Option<(ConnectionId, Vec2)> {
    let mut best: Option<(f64, ConnectionId, Vec2)> = None;
    for (connection, from, to) in resolve(graph.as_slice(), panels) {
        let path = routed_points(from.center(), to.center(), grid);
        for segment in path.windows(2) {
            if let Some(hit) = segment_intersection(a, b, segment[0], segment[1]) {
                let dist = (hit - a).norm();
                if best.map_or(true, |(d, _, _)| dist < d) {
                    best = Some((dist, connection.id, hit));
                }
            }
        }
    }
    best.map(|(_, id, point)| (id, point))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (Vec<Panel>, ConnectionGraph, FieldGrid) {
        let size = Vec2::new(80.0, 80.0);
        // centres (80, 80), (400, 80), (80, 240), (400, 240)
        let panels = vec![
            Panel::new(PanelId(1), Vec2::new(40.0, 40.0), size),
            Panel::new(PanelId(2), Vec2::new(360.0, 40.0), size),
            Panel::new(PanelId(3), Vec2::new(40.0, 200.0), size),
            Panel::new(PanelId(4), Vec2::new(360.0, 200.0), size),
        ];
        let grid = FieldGrid::new(Vec2::new(600.0, 400.0), 40.0);
        (panels, ConnectionGraph::new(), grid)
    }

    #[test]
    fn crossing_one_path_cuts_it() {
        let (panels, mut graph, grid) = setup();
        graph.connect(PanelId(1), PanelId(2)).unwrap();
        let settings = ConnectionSettings::default();
        let mut events = EventQueue::new();
        let mut slicer = Slicer::new();

        slicer.begin(Vec2::new(200.0, 20.0));
        assert!(slicer
            .update(Vec2::new(200.0, 25.0), 0.0, &mut graph, &panels, &grid, &settings, &mut events)
            .is_none());
        assert!(!slicer.is_slicing());
        let cut = slicer
            .update(Vec2::new(200.0, 140.0), 16.0, &mut graph, &panels, &grid, &settings, &mut events)
            .unwrap();
        assert!(graph.is_empty());
        assert_eq!(cut.point, Vec2::new(200.0, 80.0));
        assert_eq!(cut.time, 16.0);
        assert_eq!(cut.from, PanelId(1));
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn nearest_crossing_wins() {
        let (panels, mut graph, grid) = setup();
        graph.connect(PanelId(3), PanelId(4)).unwrap();
        graph.connect(PanelId(1), PanelId(2)).unwrap();
        let settings = ConnectionSettings::default();
        let mut events = EventQueue::new();
        let mut slicer = Slicer::new();

        slicer.begin(Vec2::new(200.0, 20.0));
        let cut = slicer
            .update(Vec2::new(200.0, 300.0), 0.0, &mut graph, &panels, &grid, &settings, &mut events)
            .unwrap();
        assert_eq!(cut.connection.from, PanelId(1));
        assert_eq!(graph.len(), 1);

        let second = slicer
            .update(Vec2::new(210.0, 20.0), 5.0, &mut graph, &panels, &grid, &settings, &mut events)
            .unwrap();
        assert_eq!(second.connection.from, PanelId(3));
        assert!(second.id > cut.id);
    }

    #[test]
    fn missing_the_paths_cuts_nothing() {
        let (panels, mut graph, grid) = setup();
        graph.connect(PanelId(1), PanelId(2)).unwrap();
        let settings = ConnectionSettings::default();
        let mut events = EventQueue::new();
        let mut slicer = Slicer::new();
        slicer.begin(Vec2::new(500.0, 300.0));
        for i in 1..10 {
            let p = Vec2::new(500.0 + i as f64 * 5.0, 300.0 + i as f64 * 5.0);
            assert!(slicer
                .update(p, i as f64 * 16.0, &mut graph, &panels, &grid, &settings, &mut events)
                .is_none());
        }
        assert_eq!(graph.len(), 1);
        assert!(events.is_empty());
        assert!(!slicer.trail().is_empty());
    }

    #[test]
    fn trail_forgets_old_points() {
        let (panels, mut graph, grid) = setup();
        let settings = ConnectionSettings::default();
        let mut events = EventQueue::new();
        let mut slicer = Slicer::new();
        slicer.begin(Vec2::zeros());
        slicer.update(Vec2::new(20.0, 0.0), 0.0, &mut graph, &panels, &grid, &settings, &mut events);
        slicer.update(Vec2::new(40.0, 0.0), 200.0, &mut graph, &panels, &grid, &settings, &mut events);
        slicer.update(Vec2::new(60.0, 0.0), 350.0, &mut graph, &panels, &grid, &settings, &mut events);
        let times: Vec<f64> = slicer.trail().iter().map(|p| p.time).collect();
        assert_eq!(times, vec![200.0, 350.0]);
    }

    #[test]
    fn remnants_shrink_toward_the_cut() {
        let path: Vec<Vec2> = (0..=10).map(|i| Vec2::new(i as f64 * 40.0, 0.0)).collect();
        let settings = ConnectionSettings::default();
        let cut = CutConnection {
            id: CutId(0),
            connection: ConnectionId {
                from: PanelId(1),
                to: PanelId(2),
            },
            from: PanelId(1),
            to: PanelId(2),
            point: Vec2::new(200.0, 0.0),
            time: 0.0,
        };
        let fresh = cut.remnants(&path, 0.0, &settings).unwrap();
        assert_eq!(fresh.from_side.len(), 6);
        assert_eq!(fresh.to_side.len(), 6);
        assert!((fresh.alpha - 0.7).abs() < 1e-12);

        let late = cut.remnants(&path, 550.0, &settings).unwrap();
        assert!(late.from_side.len() < 6 && late.from_side.len() >= 2);
        assert!(late.to_side.len() < 6 && late.to_side.len() >= 2);
        assert!(late.alpha < fresh.alpha);

        assert!(cut.remnants(&path, 600.0, &settings).is_none());
        assert!(cut.is_complete(600.0, &settings));
    }
}
