use crate::clock::FrameClock;
use crate::connections::routing::{flow_segments, routed_points, sample_path, smooth_commands};
use crate::connections::{resolve, Connection, ConnectionDrag, ConnectionId, CutConnection, CutId, SlicePoint};
use crate::events::{CanvasEvent, EventQueue};
use crate::feedback::AudioFeedback;
use crate::field::dot_pattern::{self, glyph_font_size};
use crate::field::{FieldGrid, PulseEvent};
use crate::geometry::{Rect, Vec2};
use crate::panel::{find_panel, live_rects, Panel};
use crate::particles::{Particle, ParticleShape, ParticleSystem, ParticleTint};
use crate::render::{Color, DrawList, Shape};
use crate::settings::{BackgroundType, CanvasSettings, DotShape};
use log::trace;
use std::collections::HashSet;

const DRAG_PREVIEW_GREY: &str = "#888888";
const DRAG_PREVIEW_ALPHA: f64 = 0.5;
const DRAG_TARGET_ALPHA: f64 = 0.85;
const PATTERN_GLOW_BLUR: f64 = 10.0;

/// Everything the host hands the core for one frame.
#[derive(Debug, Clone, Copy)]
pub struct FrameInput<'a> {
    /// Frame timestamp in ms
    pub now: f64,
    pub viewport: Vec2,
    pub panels: &'a [Panel],
    pub connections: &'a [Connection],
    pub pulses: &'a [PulseEvent],
    pub connection_drag: Option<&'a ConnectionDrag>,
    pub pointer: Option<Vec2>,
    pub slice_trail: &'a [SlicePoint],
    pub cut_connections: &'a [CutConnection],
}

/// The per-frame simulation and paint pass: field physics, particles,
/// connection paths, cut retraction, drag preview and slice trail.
pub struct CanvasRenderer {
    grid: FieldGrid,
    particles: ParticleSystem,
    clock: FrameClock,
    last_pulse_time: f64,
    known_connections: HashSet<ConnectionId>,
    completed_cuts: HashSet<CutId>,
}

impl CanvasRenderer {
    pub fn new(viewport: Vec2, settings: &CanvasSettings) -> Self {
        Self::with_particles(viewport, settings, ParticleSystem::default())
    }

    pub fn with_particles(viewport: Vec2, settings: &CanvasSettings, particles: ParticleSystem) -> Self {
        Self {
            grid: FieldGrid::new(viewport, settings.field.grid_scale),
            particles,
            clock: FrameClock::new(),
            last_pulse_time: f64::NEG_INFINITY,
            known_connections: HashSet::new(),
            completed_cuts: HashSet::new(),
        }
    }

    pub fn grid(&self) -> &FieldGrid {
        &self.grid
    }

    pub fn particles(&self) -> &ParticleSystem {
        &self.particles
    }

    pub fn clock(&self) -> &FrameClock {
        &self.clock
    }

    /// Drops particles and transient bookkeeping and puts the grid at rest.
    pub fn reset(&mut self) {
        self.grid.reset();
        self.particles.clear();
        self.known_connections.clear();
        self.completed_cuts.clear();
    }

    pub fn step(
        &mut self,
        frame: &FrameInput,
        settings: &CanvasSettings,
        feedback: &mut dyn AudioFeedback,
        events: &mut EventQueue,
    ) -> DrawList {
        let now = frame.now;
        let dt = self.clock.tick(now);
        let live = frame.panels.iter().filter(|p| p.is_live()).count();
        let settings = settings.effective(live);
        let rects = live_rects(frame.panels);
        let mut list = DrawList::new();

        if self.grid.ensure(frame.viewport, settings.field.grid_scale) {
            trace!("field grid rebuilt with {} dots", self.grid.len());
        }
        self.grid.step(&rects, &settings.field);
        self.grid.update_intensities(
            frame.pulses,
            frame.pointer,
            now,
            &settings.pulse,
            &settings.field,
        );

        match settings.field.background {
            BackgroundType::Grid if settings.field.grid_enabled => {
                self.paint_grid(&mut list, &rects, frame, &settings)
            }
            BackgroundType::DotPattern => paint_pattern(&mut list, &rects, frame, &settings),
            BackgroundType::Grid => {}
        }

        self.spawn_bursts(frame, &settings);
        self.paint_connections(&mut list, frame, &settings);
        self.paint_cuts(&mut list, frame, &settings, events);
        self.paint_drag(&mut list, frame, &settings);
        paint_trail(&mut list, frame, &settings);

        if settings.particles.enabled {
            self.particles.step(
                dt,
                now,
                frame.panels,
                frame.viewport,
                &settings.particles,
                &settings.sound,
                feedback,
            );
            self.paint_particles(&mut list, &settings);
        }
        trace!(
            "frame {}: {} pulses, {} particles",
            self.clock.frames(),
            frame.pulses.len(),
            self.particles.len()
        );
        list
    }

    fn paint_grid(&self, list: &mut DrawList, rects: &[Rect], frame: &FrameInput, settings: &CanvasSettings) {
        let appearance = &settings.appearance;
        let line_color = Color::from_hex(&appearance.grid_line_color);
        let dot_color = Color::from_hex(&appearance.dot_color);

        for edge in self
            .grid
            .dense_edges(rects, frame.pulses, frame.now, &settings.field, &settings.pulse)
        {
            list.push_grid_line(
                edge.start,
                edge.end,
                edge.width,
                line_color.with_alpha(edge.alpha * appearance.grid_line_opacity),
            );
        }
        for edge in self.grid.edges(&settings.field) {
            list.push_grid_line(
                edge.start,
                edge.end,
                edge.width,
                line_color.with_alpha(edge.alpha * appearance.grid_line_opacity),
            );
        }
        for dot in self.grid.dots() {
            if let Some(opacity) = dot.opacity(&settings.field) {
                list.push_grid_dot(
                    dot.position,
                    dot.radius(),
                    Shape::Circle,
                    dot_color.with_alpha(opacity * appearance.dot_opacity),
                    0.0,
                );
            }
        }
    }

    /// Bursts for pulses newer than any seen before and for connections
    /// that appeared since the previous frame.
    fn spawn_bursts(&mut self, frame: &FrameInput, settings: &CanvasSettings) {
        let fresh: Vec<PulseEvent> = frame
            .pulses
            .iter()
            .filter(|p| p.time > self.last_pulse_time)
            .copied()
            .collect();
        for pulse in &fresh {
            if settings.particles.enabled {
                self.particles
                    .spawn_burst(pulse.origin, pulse.intensity, &settings.particles);
            }
            self.last_pulse_time = self.last_pulse_time.max(pulse.time);
        }

        let first_frame = self.clock.frames() <= 1;
        let current: HashSet<ConnectionId> = frame.connections.iter().map(|c| c.id).collect();
        if !first_frame && settings.particles.enabled {
            for (connection, _, to) in resolve(frame.connections, frame.panels) {
                if !self.known_connections.contains(&connection.id) {
                    self.particles.spawn_burst(
                        to.center(),
                        settings.particles.connect_burst_intensity,
                        &settings.particles,
                    );
                }
            }
        }
        self.known_connections = current;
    }

    fn paint_connections(&self, list: &mut DrawList, frame: &FrameInput, settings: &CanvasSettings) {
        let conn = &settings.connections;
        let color = Color::from_hex(&settings.appearance.connection_color);
        let flow_color = color.lighten(0, 40, 40);

        for (_, from, to) in resolve(frame.connections, frame.panels) {
            let points = routed_points(from.center(), to.center(), &self.grid);
            if points.len() < 2 {
                continue;
            }
            list.push_path(
                smooth_commands(&points),
                conn.line_width,
                color.with_alpha(conn.line_alpha),
            );
            let sampled = sample_path(&points, conn.samples_per_segment);
            for segment in flow_segments(&sampled, frame.now, conn) {
                list.push_overlay_line(
                    segment.start,
                    segment.end,
                    conn.line_width + segment.brightness * 1.5,
                    flow_color.with_alpha(segment.brightness * 0.9),
                );
            }
            paint_endpoints(list, &points, conn.endpoint_radius, color.with_alpha(conn.line_alpha));
        }
    }

    /// Retraction animations. Completion is reported once per cut even if
    /// the host keeps passing it in.
    fn paint_cuts(
        &mut self,
        list: &mut DrawList,
        frame: &FrameInput,
        settings: &CanvasSettings,
        events: &mut EventQueue,
    ) {
        let conn = &settings.connections;
        let color = Color::from_hex(&settings.appearance.connection_color);
        self.completed_cuts
            .retain(|id| frame.cut_connections.iter().any(|cut| cut.id == *id));

        for cut in frame.cut_connections {
            if self.completed_cuts.contains(&cut.id) {
                continue;
            }
            if cut.is_complete(frame.now, conn) {
                self.completed_cuts.insert(cut.id);
                events.push(CanvasEvent::CutAnimationComplete(cut.id));
                continue;
            }
            let (Some(from), Some(to)) = (
                find_panel(frame.panels, cut.from),
                find_panel(frame.panels, cut.to),
            ) else {
                continue;
            };
            let points = routed_points(from.center(), to.center(), &self.grid);
            if let Some(remnants) = cut.remnants(&points, frame.now, conn) {
                let stroke = color.with_alpha(remnants.alpha);
                list.push_polyline(&remnants.from_side, conn.line_width, stroke);
                list.push_polyline(&remnants.to_side, conn.line_width, stroke);
            }
        }
    }

    fn paint_drag(&self, list: &mut DrawList, frame: &FrameInput, settings: &CanvasSettings) {
        let Some(drag) = frame.connection_drag else {
            return;
        };
        let Some(from) = find_panel(frame.panels, drag.from) else {
            return;
        };
        let conn = &settings.connections;
        let color = if drag.target.is_some() {
            Color::from_hex(&settings.appearance.connection_color).with_alpha(DRAG_TARGET_ALPHA)
        } else {
            Color::from_hex(DRAG_PREVIEW_GREY).with_alpha(DRAG_PREVIEW_ALPHA)
        };
        let points = routed_points(from.center(), drag.pointer, &self.grid);
        if points.len() < 2 {
            return;
        }
        list.push_path(smooth_commands(&points), conn.line_width, color);
        paint_endpoints(list, &points, conn.endpoint_radius, color);
    }

    fn paint_particles(&self, list: &mut DrawList, settings: &CanvasSettings) {
        let base = Color::from_hex(&settings.appearance.particle_color);
        let op = settings.appearance.particle_opacity;

        for p in self.particles.directional() {
            let fade = p.opacity * p.life_ratio() * op;
            push_particle(list, p, base.with_alpha(fade), base.lighten(60, 60, 20).with_alpha(fade * 0.8), 0.5);
        }
        for p in self.particles.bouncy() {
            match p.tint {
                ParticleTint::Cyan => push_particle(
                    list,
                    p,
                    base.lighten(110, 120, 20).with_alpha(p.opacity * 0.9 * op),
                    base.lighten(180, 140, 20).with_alpha(p.opacity * op),
                    0.8,
                ),
                ParticleTint::Blue | ParticleTint::Accent => push_particle(
                    list,
                    p,
                    base.with_alpha(p.opacity * 0.95 * op),
                    base.lighten(60, 60, 20).with_alpha(p.opacity * 0.8 * op),
                    0.5,
                ),
            }
        }
    }
}

fn push_particle(list: &mut DrawList, p: &Particle, fill: Color, stroke: Color, stroke_width: f64) {
    let shape = match p.shape {
        ParticleShape::Circle => Shape::Circle,
        ParticleShape::Triangle => Shape::Triangle,
        ParticleShape::Square => Shape::Square,
    };
    list.push_particle(p.position, p.rotation, p.size, shape, fill, stroke, stroke_width);
}

fn paint_endpoints(list: &mut DrawList, points: &[Vec2], radius: f64, color: Color) {
    if let (Some(&first), Some(&last)) = (points.first(), points.last()) {
        list.push_overlay_dot(first, radius, color);
        list.push_overlay_dot(last, radius, color);
    }
}

fn paint_pattern(list: &mut DrawList, rects: &[Rect], frame: &FrameInput, settings: &CanvasSettings) {
    let pattern = &settings.pattern;
    let color = Color::from_hex(&pattern.color);
    let shape = match pattern.shape {
        DotShape::Circle => Shape::Circle,
        DotShape::Square => Shape::Square,
        DotShape::Glyph => Shape::Glyph,
    };
    if shape == Shape::Glyph {
        list.glyph = Some(pattern.glyph.clone());
    }
    for dot in dot_pattern::layout(frame.viewport, rects, frame.pointer, pattern, &settings.field) {
        let radius = if shape == Shape::Glyph {
            glyph_font_size(dot.size)
        } else {
            dot.size
        };
        let glow = if dot.glow { PATTERN_GLOW_BLUR } else { 0.0 };
        list.push_grid_dot(dot.position, radius, shape, color.with_alpha(dot.opacity), glow);
    }
}

/// Recent trail points as one stroke fading with the age of the newest point.
fn paint_trail(list: &mut DrawList, frame: &FrameInput, settings: &CanvasSettings) {
    let conn = &settings.connections;
    let Some(newest) = frame.slice_trail.last() else {
        return;
    };
    if frame.slice_trail.len() < 2 || conn.trail_render_window <= 0.0 {
        return;
    }
    let points: Vec<Vec2> = frame
        .slice_trail
        .iter()
        .filter(|p| frame.now - p.time < conn.trail_render_window)
        .map(|p| p.position)
        .collect();
    let alpha = (1.0 - (frame.now - newest.time) / conn.trail_render_window).max(0.0) * 0.8;
    list.push_polyline(
        &points,
        conn.line_width,
        Color::from_hex(&settings.appearance.slice_trail_color).with_alpha(alpha),
    );
}
