//! Backend-neutral draw output. Instances are plain `Pod` records so a GPU
//! host can upload them as instance buffers without conversion.

use crate::connections::PathCommand;
use crate::geometry::Vec2;
use bytemuck::{Pod, Zeroable};

/// Used when a configured colour fails to parse.
const FALLBACK_RGB: (u8, u8, u8) = (160, 160, 160);

/// Straight-alpha RGBA with channels in `0..=1`.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub fn from_rgb8(r: u8, g: u8, b: u8) -> Self {
        Self {
            r: r as f32 / 255.0,
            g: g as f32 / 255.0,
            b: b as f32 / 255.0,
            a: 1.0,
        }
    }

    /// Parses `#rrggbb` (leading `#` optional), falling back to mid grey.
    pub fn from_hex(hex: &str) -> Self {
        let digits = hex.trim().trim_start_matches('#');
        let channel = |i: usize| {
            digits
                .get(i..i + 2)
                .and_then(|s| u8::from_str_radix(s, 16).ok())
        };
        match (digits.len(), channel(0), channel(2), channel(4)) {
            (6, Some(r), Some(g), Some(b)) => Self::from_rgb8(r, g, b),
            _ => Self::from_rgb8(FALLBACK_RGB.0, FALLBACK_RGB.1, FALLBACK_RGB.2),
        }
    }

    pub fn with_alpha(self, alpha: f64) -> Self {
        Self {
            a: alpha.clamp(0.0, 1.0) as f32,
            ..self
        }
    }

    /// Adds per-channel offsets in 8-bit units, saturating at white.
    pub fn lighten(self, r: u8, g: u8, b: u8) -> Self {
        let add = |c: f32, d: u8| (c + d as f32 / 255.0).min(1.0);
        Self {
            r: add(self.r, r),
            g: add(self.g, g),
            b: add(self.b, b),
            a: self.a,
        }
    }
}

#[repr(u32)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Shape {
    Circle = 0,
    Square = 1,
    Triangle = 2,
    /// Text glyph; the character is `DrawList::glyph`
    Glyph = 3,
}

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct LineInstance {
    pub start: [f32; 2],
    pub end: [f32; 2],
    pub color: Color,
    pub width: f32,
    pub _padding: [f32; 3],
}

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct DotInstance {
    pub position: [f32; 2],
    pub radius: f32,
    pub shape: u32,
    pub color: Color,
    /// Shadow blur radius, zero for none
    pub glow: f32,
    pub _padding: [f32; 3],
}

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct ParticleInstance {
    pub position: [f32; 2],
    pub rotation: f32,
    pub size: f32,
    pub fill: Color,
    pub stroke: Color,
    pub stroke_width: f32,
    pub shape: u32,
    pub _padding: [f32; 2],
}

/// A stroked vector path with round caps and joins.
#[derive(Debug, Clone, PartialEq)]
pub struct PathStroke {
    pub commands: Vec<PathCommand>,
    pub width: f32,
    pub color: Color,
}

fn finite(v: Vec2) -> bool {
    v.x.is_finite() && v.y.is_finite()
}

fn point(v: Vec2) -> [f32; 2] {
    [v.x as f32, v.y as f32]
}

fn command_is_finite(command: &PathCommand) -> bool {
    match *command {
        PathCommand::MoveTo(p) | PathCommand::LineTo(p) => finite(p),
        PathCommand::QuadTo { control, end } => finite(control) && finite(end),
    }
}

/// Everything one frame paints, in paint order: grid lines, grid dots,
/// connection paths, flow highlights, endpoint dots, particles.
/// Elements with non-finite geometry are dropped on insertion.
#[derive(Debug, Clone, Default)]
pub struct DrawList {
    pub grid_lines: Vec<LineInstance>,
    pub grid_dots: Vec<DotInstance>,
    pub paths: Vec<PathStroke>,
    pub overlay_lines: Vec<LineInstance>,
    pub overlay_dots: Vec<DotInstance>,
    pub particles: Vec<ParticleInstance>,
    pub glyph: Option<String>,
}

impl DrawList {
    pub fn new() -> Self {
        Self::default()
    }

    fn line(start: Vec2, end: Vec2, width: f64, color: Color) -> Option<LineInstance> {
        if !(finite(start) && finite(end) && width.is_finite()) {
            return None;
        }
        Some(LineInstance {
            start: point(start),
            end: point(end),
            color,
            width: width as f32,
            _padding: [0.0; 3],
        })
    }

    fn dot(position: Vec2, radius: f64, shape: Shape, color: Color, glow: f64) -> Option<DotInstance> {
        if !(finite(position) && radius.is_finite()) {
            return None;
        }
        Some(DotInstance {
            position: point(position),
            radius: radius as f32,
            shape: shape as u32,
            color,
            glow: glow as f32,
            _padding: [0.0; 3],
        })
    }

    pub fn push_grid_line(&mut self, start: Vec2, end: Vec2, width: f64, color: Color) {
        self.grid_lines.extend(Self::line(start, end, width, color));
    }

    pub fn push_grid_dot(&mut self, position: Vec2, radius: f64, shape: Shape, color: Color, glow: f64) {
        self.grid_dots
            .extend(Self::dot(position, radius, shape, color, glow));
    }

    pub fn push_path(&mut self, commands: Vec<PathCommand>, width: f64, color: Color) {
        if commands.len() < 2 || !width.is_finite() || !commands.iter().all(command_is_finite) {
            return;
        }
        self.paths.push(PathStroke {
            commands,
            width: width as f32,
            color,
        });
    }

    /// Straight-segment path through `points`.
    pub fn push_polyline(&mut self, points: &[Vec2], width: f64, color: Color) {
        let commands = points
            .iter()
            .enumerate()
            .map(|(i, &p)| {
                if i == 0 {
                    PathCommand::MoveTo(p)
                } else {
                    PathCommand::LineTo(p)
                }
            })
            .collect();
        self.push_path(commands, width, color);
    }

    pub fn push_overlay_line(&mut self, start: Vec2, end: Vec2, width: f64, color: Color) {
        self.overlay_lines
            .extend(Self::line(start, end, width, color));
    }

    pub fn push_overlay_dot(&mut self, position: Vec2, radius: f64, color: Color) {
        self.overlay_dots
            .extend(Self::dot(position, radius, Shape::Circle, color, 0.0));
    }

    #[allow(clippy::too_many_arguments)]
    pub fn push_particle(
        &mut self,
        position: Vec2,
        rotation: f64,
        size: f64,
        shape: Shape,
        fill: Color,
        stroke: Color,
        stroke_width: f64,
    ) {
        if !(finite(position) && rotation.is_finite() && size.is_finite()) {
            return;
        }
        self.particles.push(ParticleInstance {
            position: point(position),
            rotation: rotation as f32,
            size: size as f32,
            fill,
            stroke,
            stroke_width: stroke_width as f32,
            shape: shape as u32,
            _padding: [0.0; 2],
        });
    }

    pub fn grid_line_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.grid_lines)
    }

    pub fn grid_dot_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.grid_dots)
    }

    pub fn overlay_line_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.overlay_lines)
    }

    pub fn particle_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.particles)
    }

    pub fn is_empty(&self) -> bool {
        self.grid_lines.is_empty()
            && self.grid_dots.is_empty()
            && self.paths.is_empty()
            && self.overlay_lines.is_empty()
            && self.overlay_dots.is_empty()
            && self.particles.is_empty()
    }
}
