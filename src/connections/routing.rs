use crate::field::{FieldGrid, GridCoord};
use crate::geometry::Vec2;
use crate::settings::ConnectionSettings;
use std::f64::consts::PI;

/// Flow segments dimmer than this are not drawn.
const FLOW_VISIBLE_BRIGHTNESS: f64 = 0.02;

/// Orthogonal lattice path between two points: a horizontal run along the
/// source row, then a vertical run along the target column. Both ends are
/// snapped to the grid first, so equal snapped rows give a single run.
pub fn route_l_path(from: Vec2, to: Vec2, pitch: f64) -> Vec<GridCoord> {
    let start = GridCoord::snap(from, pitch);
    let end = GridCoord::snap(to, pitch);
    let mut coords = Vec::new();

    let col_step = if start.col < end.col { 1 } else { -1 };
    let mut col = start.col;
    coords.push(GridCoord::new(col, start.row));
    while col != end.col {
        col += col_step;
        coords.push(GridCoord::new(col, start.row));
    }

    let row_step = if start.row < end.row { 1 } else { -1 };
    let mut row = start.row;
    while row != end.row {
        row += row_step;
        coords.push(GridCoord::new(end.col, row));
    }
    coords
}

/// Maps lattice coordinates to the dots' current displaced positions.
pub fn resolve_path(coords: &[GridCoord], grid: &FieldGrid) -> Vec<Vec2> {
    coords.iter().map(|&coord| grid.position_of(coord)).collect()
}

/// Live routed path between two panel centres, following the displaced grid.
pub fn routed_points(from: Vec2, to: Vec2, grid: &FieldGrid) -> Vec<Vec2> {
    resolve_path(&route_l_path(from, to, grid.pitch()), grid)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PathCommand {
    MoveTo(Vec2),
    LineTo(Vec2),
    QuadTo { control: Vec2, end: Vec2 },
}

fn midpoint(a: Vec2, b: Vec2) -> Vec2 {
    (a + b) / 2.0
}

/// Stroke commands that round every interior joint with a quadratic curve
/// between the midpoints of its two segments.
pub fn smooth_commands(points: &[Vec2]) -> Vec<PathCommand> {
    let (first, last) = match (points.first(), points.last()) {
        (Some(&first), Some(&last)) if points.len() >= 2 => (first, last),
        _ => return Vec::new(),
    };
    let mut commands = vec![PathCommand::MoveTo(first)];
    if points.len() == 2 {
        commands.push(PathCommand::LineTo(last));
        return commands;
    }
    commands.push(PathCommand::LineTo(midpoint(points[0], points[1])));
    for window in points.windows(3) {
        commands.push(PathCommand::QuadTo {
            control: window[1],
            end: midpoint(window[1], window[2]),
        });
    }
    commands.push(PathCommand::LineTo(last));
    commands
}

/// Polyline approximation of the smoothed path, `samples` points per piece.
pub fn sample_path(points: &[Vec2], samples: usize) -> Vec<Vec2> {
    if points.len() <= 2 {
        return points.to_vec();
    }
    let samples = samples.max(1);
    let steps = || (1..=samples).map(move |t| t as f64 / samples as f64);
    let n = points.len();
    let mut sampled = vec![points[0]];

    let first_mid = midpoint(points[0], points[1]);
    sampled.extend(steps().map(|t| points[0] + (first_mid - points[0]) * t));
    for window in points.windows(3) {
        let m1 = midpoint(window[0], window[1]);
        let m2 = midpoint(window[1], window[2]);
        let control = window[1];
        sampled.extend(steps().map(|t| {
            m1 * ((1.0 - t) * (1.0 - t)) + control * (2.0 * (1.0 - t) * t) + m2 * (t * t)
        }));
    }
    let last_mid = midpoint(points[n - 2], points[n - 1]);
    sampled.extend(steps().map(|t| last_mid + (points[n - 1] - last_mid) * t));
    sampled
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlowSegment {
    pub start: Vec2,
    pub end: Vec2,
    /// 0..=1
    pub brightness: f64,
}

/// Travelling brightness pulses along a sampled path. Pulses repeat every
/// `flow_spacing` px of arc length and advance with time.
pub fn flow_segments(sampled: &[Vec2], now: f64, settings: &ConnectionSettings) -> Vec<FlowSegment> {
    if sampled.len() < 2 || settings.flow_spacing <= 0.0 || settings.flow_width <= 0.0 {
        return Vec::new();
    }
    let mut cumulative = Vec::with_capacity(sampled.len());
    let mut total = 0.0;
    cumulative.push(0.0);
    for pair in sampled.windows(2) {
        total += (pair[1] - pair[0]).norm();
        cumulative.push(total);
    }
    if total <= settings.flow_min_length {
        return Vec::new();
    }

    let spacing = settings.flow_spacing;
    let flow_pos = (now * settings.flow_speed).rem_euclid(spacing);
    let mut segments = Vec::new();
    for (i, pair) in sampled.windows(2).enumerate() {
        let mid = (cumulative[i] + cumulative[i + 1]) / 2.0;
        let mut brightness: f64 = 0.0;
        let mut offset = -spacing;
        while offset <= total + spacing {
            let d = (mid - (flow_pos + offset)).abs();
            if d < settings.flow_width {
                brightness = brightness.max(((d / settings.flow_width * PI).cos() + 1.0) / 2.0);
            }
            offset += spacing;
        }
        if brightness > FLOW_VISIBLE_BRIGHTNESS {
            segments.push(FlowSegment {
                start: pair[0],
                end: pair[1],
                brightness,
            });
        }
    }
    segments
}
