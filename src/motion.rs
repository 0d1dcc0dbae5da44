use crate::events::{CanvasEvent, EventQueue};
use crate::feedback::{emit, AudioFeedback, Cue, CueKind};
use crate::geometry::{snap_to_grid, Rect, Vec2};
use crate::panel::{find_panel, Panel, PanelId};
use crate::settings::{CanvasSettings, MotionSettings};
use log::debug;
use std::collections::{HashMap, VecDeque};

/// Drag samples are scaled to pixels per 60 Hz frame.
const FRAME_MS: f64 = 16.67;

/// Bounces slower than this are silent.
const BOUNCE_SOUND_SPEED: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq)]
struct VelocitySample {
    position: Vec2,
    time: f64,
}

/// Rolling buffer of recent drag positions for release-velocity estimation.
#[derive(Debug, Clone)]
pub struct VelocityTracker {
    samples: VecDeque<VelocitySample>,
    capacity: usize,
}

impl VelocityTracker {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity + 1),
            capacity: capacity.max(2),
        }
    }

    pub fn push(&mut self, position: Vec2, time: f64) {
        self.samples.push_back(VelocitySample { position, time });
        while self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// Weighted average of recent sample-to-sample velocities in px/frame.
    /// Stale samples and implausible gaps are ignored; later samples weigh more.
    pub fn estimate(&self, now: f64, settings: &MotionSettings) -> Vec2 {
        let Some(last) = self.samples.back() else {
            return Vec2::zeros();
        };
        if self.samples.len() < 2 || now - last.time > settings.velocity_max_age {
            return Vec2::zeros();
        }
        let len = self.samples.len() as f64;
        let mut total_weight = 0.0;
        let mut weighted = Vec2::zeros();
        for (i, (prev, curr)) in self
            .samples
            .iter()
            .zip(self.samples.iter().skip(1))
            .enumerate()
        {
            let dt = curr.time - prev.time;
            let age = now - curr.time;
            if age <= settings.velocity_max_age
                && dt >= settings.velocity_min_dt
                && dt < settings.velocity_max_dt
            {
                let weight = (i + 1) as f64 / len;
                weighted += (curr.position - prev.position) / dt * FRAME_MS * weight;
                total_weight += weight;
            }
        }
        if total_weight == 0.0 {
            Vec2::zeros()
        } else {
            weighted / total_weight
        }
    }
}

/// Which edges of a panel a resize grabbed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResizeEdge {
    pub north: bool,
    pub south: bool,
    pub east: bool,
    pub west: bool,
}

impl ResizeEdge {
    /// Edge under `pointer` within `threshold` px of the rectangle's border.
    /// Top wins over bottom and left over right on narrow panels.
    pub fn detect(rect: &Rect, pointer: Vec2, threshold: f64) -> Option<Self> {
        if !rect.contains(pointer) {
            return None;
        }
        let local = pointer - Vec2::new(rect.x, rect.y);
        let north = local.y < threshold;
        let west = local.x < threshold;
        let edge = Self {
            north,
            south: !north && local.y > rect.height - threshold,
            west,
            east: !west && local.x > rect.width - threshold,
        };
        if edge == Self::default() {
            None
        } else {
            Some(edge)
        }
    }
}

/// Part of a panel a press landed on, as classified by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PressTarget {
    /// Header or body; starts a drag
    Surface,
    /// Inner content that handles its own pointer input
    Interactive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PressOutcome {
    Drag,
    Resize(ResizeEdge),
    Ignored,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionPhase {
    Idle,
    Dragging,
    Momentum,
    Resizing,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PanelVisual {
    pub scale: f64,
    /// Raised shadow while held
    pub lifted: bool,
}

#[derive(Debug, Clone)]
struct DragState {
    grab_pointer: Vec2,
    start_position: Vec2,
    position: Vec2,
    size: Vec2,
    moved: bool,
    snap: bool,
    tracker: VelocityTracker,
}

#[derive(Debug, Clone, Copy)]
struct MomentumState {
    position: Vec2,
    velocity: Vec2,
    size: Vec2,
    just_bounced_x: bool,
    just_bounced_y: bool,
}

#[derive(Debug, Clone, Copy)]
struct ResizeState {
    edge: ResizeEdge,
    start_pointer: Vec2,
    start_rect: Rect,
}

#[derive(Debug, Clone)]
enum PanelMotion {
    Dragging(DragState),
    Momentum(MomentumState),
    Resizing(ResizeState),
}

/// Clamp that tolerates an empty range by preferring the lower bound.
fn clamp_to(value: f64, lo: f64, hi: f64) -> f64 {
    value.min(hi).max(lo)
}

fn clamp_velocity(velocity: Vec2, max_velocity: f64) -> Vec2 {
    let speed = velocity.norm();
    if speed > max_velocity.max(0.0) && speed > 0.0 {
        velocity * (max_velocity.max(0.0) / speed)
    } else {
        velocity
    }
}

/// Position that puts the panel's centre on the nearest grid multiple.
fn snap_center(position: Vec2, size: Vec2, pitch: f64) -> Vec2 {
    Vec2::new(
        snap_to_grid(position.x + size.x / 2.0, pitch) - size.x / 2.0,
        snap_to_grid(position.y + size.y / 2.0, pitch) - size.y / 2.0,
    )
}

/// Per-panel interaction state machine: drag capture, release velocity,
/// momentum with boundary bounce, and edge resizing. Panels with no entry
/// are idle.
#[derive(Debug, Clone)]
pub struct MotionEngine {
    panels: HashMap<PanelId, PanelMotion>,
    viewport: Vec2,
    display_scale: f64,
}

impl MotionEngine {
    pub fn new(viewport: Vec2) -> Self {
        Self {
            panels: HashMap::new(),
            viewport,
            display_scale: 1.0,
        }
    }

    pub fn set_viewport(&mut self, viewport: Vec2) {
        self.viewport = viewport;
    }

    pub fn set_display_scale(&mut self, scale: f64) {
        if scale.is_finite() && scale > 0.0 {
            self.display_scale = scale;
        }
    }

    /// Allowed top-left range for a panel of `size`.
    fn bounds(&self, size: Vec2, settings: &MotionSettings) -> (Vec2, Vec2) {
        let extent = self.viewport / self.display_scale;
        let min = Vec2::new(settings.boundary_margin, settings.boundary_margin);
        let max = extent - size - min;
        (min, max)
    }

    fn clamp_position(&self, position: Vec2, size: Vec2, settings: &MotionSettings) -> Vec2 {
        let (min, max) = self.bounds(size, settings);
        Vec2::new(
            clamp_to(position.x, min.x, max.x),
            clamp_to(position.y, min.y, max.y),
        )
    }

    pub fn phase(&self, id: PanelId) -> MotionPhase {
        match self.panels.get(&id) {
            None => MotionPhase::Idle,
            Some(PanelMotion::Dragging(_)) => MotionPhase::Dragging,
            Some(PanelMotion::Momentum(_)) => MotionPhase::Momentum,
            Some(PanelMotion::Resizing(_)) => MotionPhase::Resizing,
        }
    }

    pub fn is_animating(&self) -> bool {
        self.panels
            .values()
            .any(|motion| matches!(motion, PanelMotion::Momentum(_)))
    }

    /// Current momentum velocity, if the panel is coasting.
    pub fn velocity(&self, id: PanelId) -> Option<Vec2> {
        match self.panels.get(&id) {
            Some(PanelMotion::Momentum(state)) => Some(state.velocity),
            _ => None,
        }
    }

    pub fn visual(&self, id: PanelId, settings: &MotionSettings) -> PanelVisual {
        let lifted = match self.panels.get(&id) {
            Some(PanelMotion::Dragging(drag)) => drag.moved,
            Some(PanelMotion::Resizing(_)) => true,
            _ => false,
        };
        PanelVisual {
            scale: if lifted {
                settings.drag_panel_scale
            } else {
                settings.idle_panel_scale
            },
            lifted,
        }
    }

    /// Press on a panel. A running momentum animation is discarded, not blended.
    pub fn pointer_down(
        &mut self,
        panel: &Panel,
        pointer: Vec2,
        now: f64,
        target: PressTarget,
        settings: &CanvasSettings,
        events: &mut EventQueue,
    ) -> PressOutcome {
        let motion = &settings.motion;
        let position = match self.panels.get(&panel.id) {
            Some(PanelMotion::Momentum(state)) => state.position,
            _ => panel.position,
        };
        let screen_rect = Rect::new(
            position.x,
            position.y,
            panel.width(),
            panel.effective_height(),
        )
        .scale(self.display_scale);

        if !panel.minimized {
            if let Some(edge) = ResizeEdge::detect(&screen_rect, pointer, motion.edge_threshold) {
                self.panels.insert(
                    panel.id,
                    PanelMotion::Resizing(ResizeState {
                        edge,
                        start_pointer: pointer,
                        start_rect: Rect::new(position.x, position.y, panel.size.x, panel.size.y),
                    }),
                );
                events.push(CanvasEvent::DragStart(panel.id));
                debug!("{} resize start {:?}", panel.id, edge);
                return PressOutcome::Resize(edge);
            }
        }
        if target == PressTarget::Interactive {
            return PressOutcome::Ignored;
        }

        if self.panels.remove(&panel.id).is_some() {
            debug!("{} momentum interrupted", panel.id);
        }
        let mut tracker = VelocityTracker::new(motion.velocity_sample_count);
        tracker.push(position, now);
        self.panels.insert(
            panel.id,
            PanelMotion::Dragging(DragState {
                grab_pointer: pointer,
                start_position: position,
                position,
                size: panel.effective_size(),
                moved: false,
                snap: false,
                tracker,
            }),
        );
        PressOutcome::Drag
    }

    /// Pointer motion while a panel is held. `snap` is the grid-snap modifier.
    pub fn pointer_move(
        &mut self,
        id: PanelId,
        pointer: Vec2,
        now: f64,
        snap: bool,
        settings: &CanvasSettings,
        events: &mut EventQueue,
    ) {
        let scale = self.display_scale;
        let Some(mut motion) = self.panels.remove(&id) else {
            return;
        };
        match &mut motion {
            PanelMotion::Dragging(drag) => {
                let delta = (pointer - drag.grab_pointer) / scale;
                if !drag.moved
                    && (delta.x.abs() > settings.motion.drag_threshold
                        || delta.y.abs() > settings.motion.drag_threshold)
                {
                    drag.moved = true;
                    events.push(CanvasEvent::DragStart(id));
                    debug!("{} drag start", id);
                }
                if drag.moved {
                    let mut position =
                        self.clamp_position(drag.start_position + delta, drag.size, &settings.motion);
                    drag.snap = snap;
                    if snap {
                        let snapped = snap_center(position, drag.size, settings.field.grid_scale);
                        position = self.clamp_position(snapped, drag.size, &settings.motion);
                    }
                    drag.position = position;
                    drag.tracker.push(position, now);
                    events.push(CanvasEvent::PositionChanged { id, position });
                }
            }
            PanelMotion::Resizing(resize) => {
                let rect = self.resized_rect(resize, pointer, snap, settings);
                events.push(CanvasEvent::PositionChanged {
                    id,
                    position: Vec2::new(rect.x, rect.y),
                });
                events.push(CanvasEvent::SizeChanged {
                    id,
                    size: Vec2::new(rect.width, rect.height),
                });
            }
            PanelMotion::Momentum(_) => {}
        }
        self.panels.insert(id, motion);
    }

    fn resized_rect(
        &self,
        resize: &ResizeState,
        pointer: Vec2,
        snap: bool,
        settings: &CanvasSettings,
    ) -> Rect {
        let motion = &settings.motion;
        let (min_size, max_size) = (motion.min_panel_size, motion.max_panel_size);
        let delta = pointer - resize.start_pointer;
        let start = resize.start_rect;
        let edge = resize.edge;
        let mut rect = start;
        let extent = self.viewport / self.display_scale;
        let margin = motion.boundary_margin;

        // West and north drags pin the opposite edge.
        if edge.east {
            rect.width = clamp_to(start.width + delta.x, min_size, max_size);
        }
        if edge.west {
            let right = start.right();
            rect.x = clamp_to(start.x + delta.x, margin.max(right - max_size), right - min_size);
            rect.width = right - rect.x;
        }
        if edge.south {
            rect.height = clamp_to(start.height + delta.y, min_size, max_size);
        }
        if edge.north {
            let bottom = start.bottom();
            rect.y = clamp_to(start.y + delta.y, margin.max(bottom - max_size), bottom - min_size);
            rect.height = bottom - rect.y;
        }

        rect.x = rect.x.max(margin);
        rect.y = rect.y.max(margin);
        if edge.east {
            rect.width = clamp_to(rect.width, min_size, extent.x - margin - rect.x);
        }
        if edge.south {
            rect.height = clamp_to(rect.height, min_size, extent.y - margin - rect.y);
        }

        if snap {
            let pitch = settings.field.grid_scale;
            let snapped_w = snap_to_grid(rect.width, pitch);
            let snapped_h = snap_to_grid(rect.height, pitch);
            if edge.west {
                rect.x += rect.width - snapped_w;
            }
            if edge.west || edge.east {
                rect.width = snapped_w;
            }
            if edge.north {
                rect.y += rect.height - snapped_h;
            }
            if edge.north || edge.south {
                rect.height = snapped_h;
            }
        }
        rect
    }

    /// Release. Fast releases coast with momentum; slow ones just stop.
    pub fn pointer_up(
        &mut self,
        id: PanelId,
        now: f64,
        settings: &CanvasSettings,
        events: &mut EventQueue,
    ) {
        match self.panels.remove(&id) {
            Some(PanelMotion::Dragging(drag)) => {
                if !drag.moved {
                    return;
                }
                events.push(CanvasEvent::DragEnd(id));
                if drag.snap {
                    let snapped = snap_center(drag.position, drag.size, settings.field.grid_scale);
                    let position = self.clamp_position(snapped, drag.size, &settings.motion);
                    events.push(CanvasEvent::PositionChanged { id, position });
                    debug!("{} snapped to {:?}", id, position);
                    return;
                }
                let velocity = clamp_velocity(
                    drag.tracker.estimate(now, &settings.motion),
                    settings.motion.max_velocity,
                );
                if velocity.norm() > settings.motion.momentum_threshold {
                    self.launch(id, drag.position, drag.size, velocity, &settings.motion);
                } else {
                    debug!("{} drag end at rest", id);
                }
            }
            Some(PanelMotion::Resizing(_)) => {
                events.push(CanvasEvent::DragEnd(id));
                debug!("{} resize end", id);
            }
            Some(momentum @ PanelMotion::Momentum(_)) => {
                self.panels.insert(id, momentum);
            }
            None => {}
        }
    }

    /// Starts coasting from `position` with `velocity` in px/frame.
    pub fn launch(
        &mut self,
        id: PanelId,
        position: Vec2,
        size: Vec2,
        velocity: Vec2,
        settings: &MotionSettings,
    ) {
        let velocity = clamp_velocity(velocity, settings.max_velocity);
        debug!("{} momentum start {:?}", id, velocity);
        self.panels.insert(
            id,
            PanelMotion::Momentum(MomentumState {
                position,
                velocity,
                size,
                just_bounced_x: false,
                just_bounced_y: false,
            }),
        );
    }

    /// Advances every coasting panel by one frame. Bounds use each panel's
    /// live size from `panels`, so minimizing mid-coast takes effect.
    pub fn tick(
        &mut self,
        panels: &[Panel],
        settings: &CanvasSettings,
        feedback: &mut dyn AudioFeedback,
        events: &mut EventQueue,
    ) {
        let motion = &settings.motion;
        let mut finished = Vec::new();
        let ids: Vec<PanelId> = self
            .panels
            .iter()
            .filter(|(_, m)| matches!(m, PanelMotion::Momentum(_)))
            .map(|(id, _)| *id)
            .collect();

        for id in ids {
            let Some(PanelMotion::Momentum(mut state)) = self.panels.get(&id).cloned() else {
                continue;
            };
            if let Some(panel) = find_panel(panels, id) {
                state.size = panel.effective_size();
            }
            let (min, max) = self.bounds(state.size, motion);
            let speed_ratio = if motion.max_velocity > 0.0 {
                (state.velocity.norm() / motion.max_velocity).min(1.0)
            } else {
                1.0
            };
            let friction = motion.base_friction
                - speed_ratio * (motion.base_friction - motion.high_speed_friction);
            let boost = |bounced: bool| {
                if bounced {
                    motion.bounce_friction_boost
                } else {
                    1.0
                }
            };
            state.velocity.x *= friction * boost(state.just_bounced_x);
            state.velocity.y *= friction * boost(state.just_bounced_y);
            state.just_bounced_x = false;
            state.just_bounced_y = false;
            state.position += state.velocity;

            let pre_speed = state.velocity.norm();
            let impact = if motion.max_velocity > 0.0 {
                (pre_speed / motion.max_velocity).min(1.0)
            } else {
                1.0
            };
            let (w, h) = (state.size.x, state.size.y);
            let mut bounces = Vec::new();

            if state.position.x < min.x {
                state.position.x = min.x;
                state.velocity.x = state.velocity.x.abs() * motion.bounce_damping;
                state.just_bounced_x = true;
                bounces.push(Vec2::new(state.position.x, state.position.y + h / 2.0));
            } else if state.position.x > max.x {
                state.position.x = max.x.max(min.x);
                state.velocity.x = -state.velocity.x.abs() * motion.bounce_damping;
                state.just_bounced_x = true;
                bounces.push(Vec2::new(state.position.x + w, state.position.y + h / 2.0));
            }
            if state.position.y < min.y {
                state.position.y = min.y;
                state.velocity.y = state.velocity.y.abs() * motion.bounce_damping;
                state.just_bounced_y = true;
                bounces.push(Vec2::new(state.position.x + w / 2.0, state.position.y));
            } else if state.position.y > max.y {
                state.position.y = max.y.max(min.y);
                state.velocity.y = -state.velocity.y.abs() * motion.bounce_damping;
                state.just_bounced_y = true;
                bounces.push(Vec2::new(state.position.x + w / 2.0, state.position.y + h));
            }

            for point in &bounces {
                events.push(CanvasEvent::Bounce {
                    id,
                    point: *point,
                    impact,
                });
            }
            if !bounces.is_empty() && pre_speed > BOUNCE_SOUND_SPEED {
                let sound = &settings.sound;
                let volume = (sound.min_volume
                    + impact * impact * (sound.max_volume - sound.min_volume))
                    * sound.volume;
                emit(feedback, sound, Cue::new(CueKind::Bounce, volume));
            }

            events.push(CanvasEvent::PositionChanged {
                id,
                position: state.position,
            });
            if state.velocity.norm() > motion.min_velocity {
                self.panels.insert(id, PanelMotion::Momentum(state));
            } else {
                finished.push(id);
            }
        }

        for id in finished {
            self.panels.remove(&id);
            debug!("{} momentum settled", id);
        }
    }

    /// Drops any interaction state for the panel.
    pub fn cancel(&mut self, id: PanelId) {
        self.panels.remove(&id);
    }

    pub fn clear(&mut self) {
        self.panels.clear();
    }

    pub fn toggle_minimize(&mut self, panel: &Panel, events: &mut EventQueue) {
        events.push(CanvasEvent::MinimizeToggled {
            id: panel.id,
            minimized: !panel.minimized,
        });
    }

    pub fn dismiss(&mut self, id: PanelId, events: &mut EventQueue) {
        self.cancel(id);
        events.push(CanvasEvent::Dismiss(id));
    }
}
