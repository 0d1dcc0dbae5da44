use crate::connections::{
    ConnectError, Connection, ConnectionDrag, ConnectionGraph, CutConnection, DragOutcome, Slicer,
};
use crate::events::{CanvasEvent, EventQueue};
use crate::feedback::{emit, randomized_cue, AudioFeedback, Cue, CueKind, SilentFeedback};
use crate::field::pulse;
use crate::field::PulseEvent;
use crate::geometry::{Rect, Vec2};
use crate::motion::{MotionEngine, PressOutcome, PressTarget};
use crate::panel::{find_panel, panel_at, Panel, PanelId};
use crate::particles::ParticleSystem;
use crate::render::DrawList;
use crate::renderer::{CanvasRenderer, FrameInput};
use crate::settings::CanvasSettings;
use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Minimum gap between two middle-click spawns.
const SPAWN_DEBOUNCE_MS: f64 = 650.0;

/// Exit animation length before a dismissed panel leaves the list.
const EXIT_ANIMATION_MS: f64 = 200.0;

/// Side of the square connection handle, inset from the bottom-right corner.
const HANDLE_SIZE: f64 = 16.0;
const HANDLE_INSET: f64 = 4.0;

/// Offset of the connection drag origin from the bottom-right corner.
const HANDLE_ORIGIN_INSET: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Capture {
    Panel(PanelId),
    Connection,
    Slice,
}

/// Where the connection handle of `panel` sits, if it has one.
pub fn handle_rect(panel: &Panel) -> Option<Rect> {
    if panel.minimized || !panel.is_live() {
        return None;
    }
    let rect = panel.rect();
    Some(Rect::new(
        rect.right() - HANDLE_INSET - HANDLE_SIZE,
        rect.bottom() - HANDLE_INSET - HANDLE_SIZE,
        HANDLE_SIZE,
        HANDLE_SIZE,
    ))
}

/// Reference host: owns the panel list, connection graph, pulses and cut
/// animations, routes pointer input to the motion engine, connection drag
/// and slicer, and applies the resulting event stream before forwarding it.
pub struct Canvas {
    settings: CanvasSettings,
    viewport: Vec2,
    panels: Vec<Panel>,
    graph: ConnectionGraph,
    pulses: Vec<PulseEvent>,
    cuts: Vec<CutConnection>,
    motion: MotionEngine,
    renderer: CanvasRenderer,
    slicer: Slicer,
    connection_drag: Option<ConnectionDrag>,
    capture: Option<Capture>,
    pointer: Option<Vec2>,
    next_id: u32,
    last_spawn: Option<f64>,
    pending_removals: Vec<(PanelId, f64)>,
    reset_at: Option<f64>,
    feedback: Box<dyn AudioFeedback>,
    rng: StdRng,
    scratch: EventQueue,
    outbox: EventQueue,
}

impl Canvas {
    pub fn new(viewport: Vec2, settings: CanvasSettings, feedback: Box<dyn AudioFeedback>) -> Self {
        Self::with_rng(viewport, settings, feedback, StdRng::from_entropy())
    }

    /// Deterministic canvas for tests and replays.
    pub fn with_seed(viewport: Vec2, settings: CanvasSettings, seed: u64) -> Self {
        Self::with_rng(
            viewport,
            settings,
            Box::new(SilentFeedback),
            StdRng::seed_from_u64(seed),
        )
    }

    fn with_rng(
        viewport: Vec2,
        settings: CanvasSettings,
        feedback: Box<dyn AudioFeedback>,
        mut rng: StdRng,
    ) -> Self {
        let particles = ParticleSystem::new(StdRng::seed_from_u64(rng.gen()));
        Self {
            renderer: CanvasRenderer::with_particles(viewport, &settings, particles),
            motion: MotionEngine::new(viewport),
            settings,
            viewport,
            panels: Vec::new(),
            graph: ConnectionGraph::new(),
            pulses: Vec::new(),
            cuts: Vec::new(),
            slicer: Slicer::new(),
            connection_drag: None,
            capture: None,
            pointer: None,
            next_id: 0,
            last_spawn: None,
            pending_removals: Vec::new(),
            reset_at: None,
            feedback,
            rng,
            scratch: EventQueue::new(),
            outbox: EventQueue::new(),
        }
    }

    pub fn set_feedback(&mut self, feedback: Box<dyn AudioFeedback>) {
        self.feedback = feedback;
    }

    pub fn settings(&self) -> &CanvasSettings {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: CanvasSettings) {
        self.settings = settings;
    }

    pub fn viewport(&self) -> Vec2 {
        self.viewport
    }

    /// Panels in paint order, topmost last.
    pub fn panels(&self) -> &[Panel] {
        &self.panels
    }

    pub fn panel(&self, id: PanelId) -> Option<&Panel> {
        find_panel(&self.panels, id)
    }

    pub fn connections(&self) -> &[Connection] {
        self.graph.as_slice()
    }

    pub fn cuts(&self) -> &[CutConnection] {
        &self.cuts
    }

    pub fn pulses(&self) -> &[PulseEvent] {
        &self.pulses
    }

    pub fn motion(&self) -> &MotionEngine {
        &self.motion
    }

    pub fn renderer(&self) -> &CanvasRenderer {
        &self.renderer
    }

    pub fn slicer(&self) -> &Slicer {
        &self.slicer
    }

    pub fn connection_drag(&self) -> Option<&ConnectionDrag> {
        self.connection_drag.as_ref()
    }

    pub fn is_interacting(&self) -> bool {
        self.slicer.is_slicing()
            || self.connection_drag.is_some()
            || matches!(self.capture, Some(Capture::Panel(_)))
    }

    /// Applied events since the last call, in order.
    pub fn drain_events(&mut self) -> Vec<CanvasEvent> {
        self.outbox.drain()
    }

    fn allocate_id(&mut self) -> PanelId {
        let id = PanelId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Adds an existing panel, e.g. restored from storage.
    pub fn insert_panel(&mut self, panel: Panel) {
        self.next_id = self.next_id.max(panel.id.0 + 1);
        self.panels.push(panel);
    }

    /// New default-sized panel centred on `center`.
    pub fn spawn_panel(&mut self, center: Vec2) -> PanelId {
        let id = self.allocate_id();
        self.panels.push(Panel::centered_at(id, center));
        let cue = randomized_cue(&mut self.rng, CueKind::Spawn, 0.04, 0.9, 0.1);
        emit(self.feedback.as_mut(), &self.settings.sound, cue);
        self.outbox.push(CanvasEvent::PanelSpawned(id));
        debug!("spawned {} at {:?}", id, center);
        id
    }

    /// Middle-click spawn, debounced and ignored mid-gesture.
    pub fn spawn_at_click(&mut self, point: Vec2, now: f64) -> Option<PanelId> {
        if self.is_interacting() {
            return None;
        }
        if let Some(last) = self.last_spawn {
            if now - last < SPAWN_DEBOUNCE_MS {
                return None;
            }
        }
        self.last_spawn = Some(now);
        Some(self.spawn_panel(point))
    }

    /// Links two live panels. Missing or exiting endpoints are rejected.
    pub fn connect(&mut self, from: PanelId, to: PanelId) -> Result<Connection, ConnectError> {
        for id in [from, to] {
            if !find_panel(&self.panels, id).is_some_and(Panel::is_live) {
                return Err(ConnectError::UnknownPanel(id));
            }
        }
        let connection = self.graph.connect(from, to)?;
        emit(
            self.feedback.as_mut(),
            &self.settings.sound,
            Cue::new(CueKind::Connect, 0.06),
        );
        self.outbox.push(CanvasEvent::ConnectionCreated(connection));
        Ok(connection)
    }

    pub fn pointer_down(&mut self, pointer: Vec2, now: f64, target: PressTarget) {
        self.pointer = Some(pointer);
        let hit = panel_at(&self.panels, pointer).cloned();
        let Some(panel) = hit else {
            self.slicer.begin(pointer);
            self.capture = Some(Capture::Slice);
            return;
        };

        if handle_rect(&panel).is_some_and(|r| r.contains(pointer)) {
            let rect = panel.rect();
            let origin = Vec2::new(rect.right() - HANDLE_ORIGIN_INSET, rect.bottom() - HANDLE_ORIGIN_INSET);
            self.connection_drag = Some(ConnectionDrag::begin(panel.id, origin, &self.settings.connections));
            self.capture = Some(Capture::Connection);
            return;
        }

        let outcome = self.motion.pointer_down(
            &panel,
            pointer,
            now,
            target,
            &self.settings,
            &mut self.scratch,
        );
        self.capture = match outcome {
            PressOutcome::Ignored => None,
            PressOutcome::Drag | PressOutcome::Resize(_) => Some(Capture::Panel(panel.id)),
        };
        self.flush(now);
    }

    /// `snap` is the grid-snap modifier key.
    pub fn pointer_move(&mut self, pointer: Vec2, now: f64, snap: bool) {
        self.pointer = Some(pointer);
        match self.capture {
            Some(Capture::Panel(id)) => {
                self.motion
                    .pointer_move(id, pointer, now, snap, &self.settings, &mut self.scratch);
            }
            Some(Capture::Connection) => {
                if let Some(drag) = self.connection_drag.as_mut() {
                    drag.update(
                        pointer,
                        now,
                        &self.panels,
                        &self.graph,
                        self.renderer.grid().pitch(),
                        &self.settings.connections,
                        &self.settings.sound,
                        self.feedback.as_mut(),
                        &mut self.rng,
                    );
                }
            }
            Some(Capture::Slice) => {
                let cut = self.slicer.update(
                    pointer,
                    now,
                    &mut self.graph,
                    &self.panels,
                    self.renderer.grid(),
                    &self.settings.connections,
                    &mut self.scratch,
                );
                if let Some(cut) = cut {
                    let cue = randomized_cue(&mut self.rng, CueKind::Cut, 0.05, 0.7, 0.15);
                    emit(self.feedback.as_mut(), &self.settings.sound, cue);
                    self.cuts.push(cut);
                }
            }
            None => {}
        }
        self.flush(now);
    }

    pub fn pointer_up(&mut self, now: f64) {
        match self.capture.take() {
            Some(Capture::Panel(id)) => {
                self.motion
                    .pointer_up(id, now, &self.settings, &mut self.scratch);
            }
            Some(Capture::Connection) => {
                if let Some(drag) = self.connection_drag.take() {
                    self.finish_connection(&drag);
                }
            }
            Some(Capture::Slice) => self.slicer.end(),
            None => {}
        }
        self.flush(now);
    }

    pub fn pointer_leave(&mut self) {
        self.pointer = None;
        if self.capture == Some(Capture::Slice) {
            self.slicer.end();
            self.capture = None;
        }
    }

    fn finish_connection(&mut self, drag: &ConnectionDrag) {
        match drag.finish(&self.panels, &self.graph) {
            DragOutcome::Connect { from, to } => {
                if let Err(err) = self.connect(from, to) {
                    debug!("connection drag dropped: {}", err);
                }
            }
            DragOutcome::Spawn { from, center } => {
                let to = self.spawn_panel(center);
                if let Err(err) = self.connect(from, to) {
                    debug!("connection drag dropped: {}", err);
                }
            }
            DragOutcome::Cancelled => debug!("connection drag from {} cancelled", drag.from),
        }
    }

    pub fn toggle_minimize(&mut self, id: PanelId, now: f64) {
        if let Some(panel) = find_panel(&self.panels, id) {
            self.motion.toggle_minimize(panel, &mut self.scratch);
        }
        self.flush(now);
    }

    /// Starts the exit animation and drops the panel's connections.
    pub fn dismiss(&mut self, id: PanelId, now: f64) {
        self.motion.dismiss(id, &mut self.scratch);
        self.flush(now);
    }

    fn begin_exit(&mut self, id: PanelId, now: f64) {
        let Some(panel) = self.panels.iter_mut().find(|p| p.id == id) else {
            return;
        };
        if panel.exiting {
            return;
        }
        panel.exiting = true;
        self.motion.cancel(id);
        if self.capture == Some(Capture::Panel(id)) {
            self.capture = None;
        }
        if self.connection_drag.as_ref().is_some_and(|d| d.from == id) {
            self.connection_drag = None;
            self.capture = None;
        }
        for removed in self.graph.remove_panel(id) {
            self.outbox.push(CanvasEvent::ConnectionDeleted(removed));
        }
        self.pending_removals.push((id, now + EXIT_ANIMATION_MS));
        debug!("{} dismissed", id);
    }

    /// Every panel exits; the id counter resets once the animation ends.
    pub fn clear_all(&mut self, now: f64) {
        for panel in &mut self.panels {
            panel.exiting = true;
        }
        for connection in self.graph.iter() {
            self.outbox.push(CanvasEvent::ConnectionDeleted(connection.id));
        }
        self.graph.clear();
        self.cuts.clear();
        self.connection_drag = None;
        self.capture = None;
        self.slicer.cancel();
        self.motion.clear();
        self.reset_at = Some(now + EXIT_ANIMATION_MS);
        debug!("clearing {} panels", self.panels.len());
    }

    /// Panel positions scale with the viewport; the lattice is rebuilt on
    /// the next frame.
    pub fn resize_viewport(&mut self, viewport: Vec2) {
        let old = self.viewport;
        if old.x > 0.0 && old.y > 0.0 {
            for panel in &mut self.panels {
                panel.position.x = panel.position.x / old.x * viewport.x;
                panel.position.y = panel.position.y / old.y * viewport.y;
            }
        }
        self.viewport = viewport;
        self.motion.set_viewport(viewport);
    }

    pub fn set_display_scale(&mut self, scale: f64) {
        self.motion.set_display_scale(scale);
    }

    /// Runs one display frame: timers, momentum, then the render pass.
    pub fn frame(&mut self, now: f64) -> DrawList {
        self.run_timers(now);
        self.motion.tick(
            &self.panels,
            &self.settings,
            self.feedback.as_mut(),
            &mut self.scratch,
        );
        self.flush(now);

        pulse::prune(&mut self.pulses, now, &self.settings.pulse);
        self.slicer.prune_trail(now, &self.settings.connections);

        let input = FrameInput {
            now,
            viewport: self.viewport,
            panels: &self.panels,
            connections: self.graph.as_slice(),
            pulses: &self.pulses,
            connection_drag: self.connection_drag.as_ref(),
            pointer: self.pointer,
            slice_trail: self.slicer.trail(),
            cut_connections: &self.cuts,
        };
        let list = self
            .renderer
            .step(&input, &self.settings, self.feedback.as_mut(), &mut self.scratch);
        self.flush(now);
        list
    }

    fn run_timers(&mut self, now: f64) {
        if self.reset_at.is_some_and(|at| now >= at) {
            self.reset_at = None;
            self.panels.clear();
            self.pending_removals.clear();
            self.pulses.clear();
            self.next_id = 0;
            self.renderer.reset();
            debug!("canvas reset");
        }
        let (due, pending): (Vec<_>, Vec<_>) = self
            .pending_removals
            .drain(..)
            .partition(|&(_, at)| now >= at);
        self.pending_removals = pending;
        for (id, _) in due {
            self.panels.retain(|p| p.id != id);
        }
    }

    /// Applies queued core events to host state and forwards them.
    fn flush(&mut self, now: f64) {
        while !self.scratch.is_empty() {
            for event in self.scratch.drain() {
                self.apply(&event, now);
                self.outbox.push(event);
            }
        }
    }

    fn apply(&mut self, event: &CanvasEvent, now: f64) {
        match *event {
            CanvasEvent::PositionChanged { id, position } => {
                if let Some(panel) = self.panels.iter_mut().find(|p| p.id == id) {
                    panel.position = position;
                }
            }
            CanvasEvent::SizeChanged { id, size } => {
                if let Some(panel) = self.panels.iter_mut().find(|p| p.id == id) {
                    panel.size = size;
                }
            }
            CanvasEvent::Bounce { point, impact, .. } => {
                self.pulses.push(PulseEvent::new(point, now, impact));
                pulse::prune(&mut self.pulses, now, &self.settings.pulse);
            }
            CanvasEvent::Dismiss(id) => self.begin_exit(id, now),
            CanvasEvent::MinimizeToggled { id, minimized } => {
                if let Some(panel) = self.panels.iter_mut().find(|p| p.id == id) {
                    panel.minimized = minimized;
                }
            }
            CanvasEvent::DragStart(id) => {
                if let Some(index) = self.panels.iter().position(|p| p.id == id) {
                    let panel = self.panels.remove(index);
                    self.panels.push(panel);
                }
            }
            CanvasEvent::CutAnimationComplete(cut) => self.cuts.retain(|c| c.id != cut),
            CanvasEvent::DragEnd(_)
            | CanvasEvent::PanelSpawned(_)
            | CanvasEvent::ConnectionCreated(_)
            | CanvasEvent::ConnectionDeleted(_)
            | CanvasEvent::ConnectionCut { .. } => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canvas() -> Canvas {
        Canvas::with_seed(Vec2::new(1000.0, 800.0), CanvasSettings::default(), 11)
    }

    #[test]
    fn middle_click_spawns_are_debounced() {
        let mut canvas = canvas();
        assert!(canvas.spawn_at_click(Vec2::new(300.0, 300.0), 0.0).is_some());
        assert!(canvas.spawn_at_click(Vec2::new(600.0, 300.0), 400.0).is_none());
        assert!(canvas.spawn_at_click(Vec2::new(600.0, 300.0), 700.0).is_some());
        assert_eq!(canvas.panels().len(), 2);
        assert_eq!(canvas.panels()[0].position, Vec2::new(190.0, 190.0));
    }

    #[test]
    fn dragging_from_the_handle_into_space_spawns_and_links() {
        let mut canvas = canvas();
        let a = canvas.spawn_panel(Vec2::new(200.0, 200.0));
        // panel spans 90..310; handle covers 290..306
        canvas.pointer_down(Vec2::new(300.0, 300.0), 0.0, PressTarget::Surface);
        assert!(canvas.connection_drag().is_some());
        canvas.pointer_move(Vec2::new(700.0, 500.0), 16.0, false);
        canvas.pointer_up(32.0);

        assert_eq!(canvas.panels().len(), 2);
        let b = canvas.panels()[1].id;
        assert_eq!(canvas.panels()[1].center(), Vec2::new(700.0, 500.0));
        assert_eq!(canvas.connections().len(), 1);
        assert_eq!(canvas.connections()[0].from, a);
        assert_eq!(canvas.connections()[0].to, b);
        assert!(canvas.connection_drag().is_none());
    }

    #[test]
    fn drag_start_raises_the_panel() {
        let mut canvas = canvas();
        let a = canvas.spawn_panel(Vec2::new(200.0, 200.0));
        canvas.spawn_panel(Vec2::new(600.0, 200.0));
        canvas.pointer_down(Vec2::new(200.0, 200.0), 0.0, PressTarget::Surface);
        canvas.pointer_move(Vec2::new(220.0, 200.0), 16.0, false);
        assert_eq!(canvas.panels().last().map(|p| p.id), Some(a));
        assert_eq!(canvas.panel(a).unwrap().position, Vec2::new(110.0, 90.0));
    }

    #[test]
    fn dismiss_removes_links_then_panel() {
        let mut canvas = canvas();
        let a = canvas.spawn_panel(Vec2::new(200.0, 200.0));
        let b = canvas.spawn_panel(Vec2::new(600.0, 200.0));
        canvas.connect(a, b).unwrap();
        canvas.dismiss(a, 0.0);
        assert!(canvas.connections().is_empty());
        assert!(canvas.panel(a).unwrap().exiting);
        canvas.frame(100.0);
        assert!(canvas.panel(a).is_some());
        canvas.frame(200.0);
        assert!(canvas.panel(a).is_none());
        assert!(canvas.panel(b).is_some());
    }

    #[test]
    fn connect_rejects_missing_and_exiting_panels() {
        let mut canvas = canvas();
        let a = canvas.spawn_panel(Vec2::new(200.0, 200.0));
        let b = canvas.spawn_panel(Vec2::new(600.0, 200.0));
        assert_eq!(
            canvas.connect(a, PanelId(99)),
            Err(ConnectError::UnknownPanel(PanelId(99)))
        );
        canvas.dismiss(b, 0.0);
        assert_eq!(canvas.connect(a, b), Err(ConnectError::UnknownPanel(b)));
        assert!(canvas.connections().is_empty());
    }

    #[test]
    fn clear_all_resets_ids_after_exit() {
        let mut canvas = canvas();
        canvas.spawn_panel(Vec2::new(200.0, 200.0));
        canvas.spawn_panel(Vec2::new(600.0, 200.0));
        canvas.clear_all(0.0);
        assert!(canvas.panels().iter().all(|p| p.exiting));
        canvas.frame(250.0);
        assert!(canvas.panels().is_empty());
        assert_eq!(canvas.spawn_panel(Vec2::new(100.0, 100.0)), PanelId(0));
    }

    #[test]
    fn viewport_resize_rescales_positions() {
        let mut canvas = canvas();
        let a = canvas.spawn_panel(Vec2::new(210.0, 210.0));
        canvas.resize_viewport(Vec2::new(500.0, 400.0));
        assert_eq!(canvas.panel(a).unwrap().position, Vec2::new(50.0, 50.0));
    }

    #[test]
    fn minimize_toggles_through_the_event_stream() {
        let mut canvas = canvas();
        let a = canvas.spawn_panel(Vec2::new(300.0, 300.0));
        canvas.toggle_minimize(a, 0.0);
        assert!(canvas.panel(a).unwrap().minimized);
        assert!(canvas
            .drain_events()
            .contains(&CanvasEvent::MinimizeToggled { id: a, minimized: true }));
    }
}
