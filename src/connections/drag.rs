use crate::connections::ConnectionGraph;
use crate::feedback::{emit, AudioFeedback, Cue, CueKind, RateLimiter};
use crate::field::GridCoord;
use crate::geometry::Vec2;
use crate::panel::{panel_at, Panel, PanelId};
use crate::settings::{ConnectionSettings, SoundSettings};
use log::debug;
use rand::Rng;
use std::collections::HashSet;

const TICK_VOLUME: f64 = 0.035;
const TICK_PITCH_SPREAD: f64 = 0.15;
const HOVER_VOLUME: f64 = 0.015;
const HOVER_PITCH: f64 = 1.5;

/// What releasing a connection drag should do.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DragOutcome {
    Connect { from: PanelId, to: PanelId },
    /// Dropped on empty canvas: spawn a panel centred at `center` and link it.
    Spawn { from: PanelId, center: Vec2 },
    /// Dropped on the source or an already-linked panel.
    Cancelled,
}

/// A live drag from a panel's connection handle.
#[derive(Debug, Clone)]
pub struct ConnectionDrag {
    pub from: PanelId,
    /// Where the drag started, the handle position
    pub origin: Vec2,
    pub pointer: Vec2,
    /// Highlighted panel, if the pointer is over a valid target
    pub target: Option<PanelId>,
    touched: HashSet<GridCoord>,
    ticks: RateLimiter,
}

impl ConnectionDrag {
    pub fn begin(from: PanelId, origin: Vec2, settings: &ConnectionSettings) -> Self {
        debug!("connection drag from {}", from);
        Self {
            from,
            origin,
            pointer: origin,
            target: None,
            touched: HashSet::new(),
            ticks: RateLimiter::new(settings.tick_interval),
        }
    }

    /// Lattice intersections within `tick_radius` of the straight line from
    /// the origin to the pointer.
    fn touched_dots(&self, pitch: f64, settings: &ConnectionSettings) -> HashSet<GridCoord> {
        let mut touched = HashSet::new();
        if !(pitch > 0.0) {
            return touched;
        }
        let span = self.pointer - self.origin;
        let steps = if settings.tick_step > 0.0 {
            ((span.norm() / settings.tick_step).ceil() as usize).max(1)
        } else {
            1
        };
        for i in 0..=steps {
            let point = self.origin + span * (i as f64 / steps as f64);
            let coord = GridCoord::snap(point, pitch);
            if (point - coord.to_point(pitch)).norm() < settings.tick_radius {
                touched.insert(coord);
            }
        }
        touched
    }

    /// Moves the drag end, re-evaluates the target and ticks for every
    /// newly crossed intersection.
    #[allow(clippy::too_many_arguments)]
    pub fn update<R: Rng>(
        &mut self,
        pointer: Vec2,
        now: f64,
        panels: &[Panel],
        graph: &ConnectionGraph,
        pitch: f64,
        settings: &ConnectionSettings,
        sound: &SoundSettings,
        feedback: &mut dyn AudioFeedback,
        rng: &mut R,
    ) {
        self.pointer = pointer;

        let touched = self.touched_dots(pitch, settings);
        for coord in &touched {
            if !self.touched.contains(coord) && self.ticks.try_fire(now) {
                let pitch_shift = rng.gen_range(-TICK_PITCH_SPREAD..=TICK_PITCH_SPREAD);
                emit(
                    feedback,
                    sound,
                    Cue::new(CueKind::Tick, TICK_VOLUME).with_pitch(1.0 + pitch_shift),
                );
            }
        }
        self.touched = touched;

        let target = panel_at(panels, pointer)
            .map(|panel| panel.id)
            .filter(|&id| id != self.from && !graph.are_connected(self.from, id));
        if target.is_some() && target != self.target {
            emit(
                feedback,
                sound,
                Cue::new(CueKind::Hover, HOVER_VOLUME).with_pitch(HOVER_PITCH),
            );
        }
        self.target = target;
    }

    /// Decides what the release does. The graph is not touched here.
    pub fn finish(&self, panels: &[Panel], graph: &ConnectionGraph) -> DragOutcome {
        match panel_at(panels, self.pointer) {
            None => DragOutcome::Spawn {
                from: self.from,
                center: self.pointer,
            },
            Some(panel) if panel.id != self.from && !graph.are_connected(self.from, panel.id) => {
                DragOutcome::Connect {
                    from: self.from,
                    to: panel.id,
                }
            }
            Some(_) => DragOutcome::Cancelled,
        }
    }
}
