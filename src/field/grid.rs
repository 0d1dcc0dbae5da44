use crate::field::pulse::{any_live, hover_intensity, ripple_intensity, PulseEvent};
use crate::geometry::{round_half_up, Rect, Vec2};
use crate::settings::{FieldSettings, PulseSettings};
use rayon::prelude::*;
use std::f64::consts::PI;

/// Integer lattice coordinate; the rest position is `coord * pitch`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GridCoord {
    pub col: i64,
    pub row: i64,
}

impl GridCoord {
    pub fn new(col: i64, row: i64) -> Self {
        Self { col, row }
    }

    /// Nearest lattice coordinate to `point`.
    pub fn snap(point: Vec2, pitch: f64) -> Self {
        Self {
            col: round_half_up(point.x / pitch) as i64,
            row: round_half_up(point.y / pitch) as i64,
        }
    }

    pub fn to_point(self, pitch: f64) -> Vec2 {
        Vec2::new(self.col as f64 * pitch, self.row as f64 * pitch)
    }
}

#[derive(Debug, Clone)]
pub struct GridDot {
    pub coord: GridCoord,
    pub rest: Vec2,
    pub position: Vec2,
    pub velocity: Vec2,
    pub size: f64,
    pub target_size: f64,
    /// Distance from the rest position to the nearest live panel
    pub panel_distance: f64,
    /// Same, measured from the displaced position; shades the lattice lines
    pub line_distance: f64,
    pub ripple: f64,
    pub hover: f64,
}

impl GridDot {
    fn at_rest(coord: GridCoord, pitch: f64) -> Self {
        let rest = coord.to_point(pitch);
        Self {
            coord,
            rest,
            position: rest,
            velocity: Vec2::zeros(),
            size: 1.0,
            target_size: 1.0,
            panel_distance: f64::INFINITY,
            line_distance: f64::INFINITY,
            ripple: 0.0,
            hover: 0.0,
        }
    }

    /// Drawn opacity before the configured dot opacity, or `None` when the
    /// dot is beyond the render distance.
    pub fn opacity(&self, settings: &FieldSettings) -> Option<f64> {
        if self.panel_distance >= settings.render_distance {
            return None;
        }
        let falloff = if settings.brightness_radius > 0.0 {
            (self.panel_distance / settings.brightness_radius).min(1.0).powi(2)
        } else {
            1.0
        };
        Some(0.12 + (1.0 - falloff) * 0.8)
    }

    pub fn radius(&self) -> f64 {
        self.size.max(0.5)
    }
}

/// One styled lattice segment. `alpha` excludes the configured line opacity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridEdge {
    pub start: Vec2,
    pub end: Vec2,
    pub alpha: f64,
    pub width: f64,
}

/// Push a single panel exerts on a rest point, and the distance between them.
fn panel_push(rest: Vec2, rect: &Rect, settings: &FieldSettings) -> (Vec2, f64) {
    let offset = rest - rect.closest_point(rest);
    let dist = offset.norm();
    if dist <= 0.0 {
        return (Vec2::zeros(), 0.0);
    }
    let norm = (dist / settings.max_influence_distance).min(1.0);
    let push = (1.0 - norm).powi(2) * settings.push_strength;
    (offset / dist * push, dist)
}

/// Summed push from every panel plus the nearest panel distance.
pub fn displacement(rest: Vec2, rects: &[Rect], settings: &FieldSettings) -> (Vec2, f64) {
    rects
        .iter()
        .fold((Vec2::zeros(), f64::INFINITY), |(total, nearest), rect| {
            let (push, dist) = panel_push(rest, rect, settings);
            (total + push, nearest.min(dist))
        })
}

fn nearest_distance(point: Vec2, rects: &[Rect]) -> f64 {
    rects
        .iter()
        .map(|rect| (point - rect.closest_point(point)).norm())
        .fold(f64::INFINITY, f64::min)
}

/// Spring-damped dot lattice covering the viewport with one cell of margin.
#[derive(Debug, Clone)]
pub struct FieldGrid {
    pitch: f64,
    viewport: Vec2,
    min_coord: GridCoord,
    cols: usize,
    rows: usize,
    dots: Vec<GridDot>,
}

/// Last lattice index `k` with `k * pitch < extent + 2 * pitch`.
fn last_index(extent: f64, pitch: f64) -> i64 {
    ((extent + 2.0 * pitch) / pitch).ceil() as i64 - 1
}

impl FieldGrid {
    pub fn new(viewport: Vec2, pitch: f64) -> Self {
        let mut grid = Self {
            pitch,
            viewport,
            min_coord: GridCoord::new(-1, -1),
            cols: 0,
            rows: 0,
            dots: Vec::new(),
        };
        grid.rebuild();
        grid
    }

    fn rebuild(&mut self) {
        self.dots.clear();
        self.cols = 0;
        self.rows = 0;
        if !(self.pitch.is_finite() && self.pitch > 0.0)
            || !(self.viewport.x.is_finite() && self.viewport.y.is_finite())
        {
            return;
        }
        let last_col = last_index(self.viewport.x.max(0.0), self.pitch);
        let last_row = last_index(self.viewport.y.max(0.0), self.pitch);
        self.cols = (last_col - self.min_coord.col + 1).max(0) as usize;
        self.rows = (last_row - self.min_coord.row + 1).max(0) as usize;
        self.dots.reserve(self.cols * self.rows);
        for row in self.min_coord.row..=last_row {
            for col in self.min_coord.col..=last_col {
                self.dots
                    .push(GridDot::at_rest(GridCoord::new(col, row), self.pitch));
            }
        }
    }

    /// Rebuilds the lattice if the viewport or pitch changed. Returns true on rebuild.
    pub fn ensure(&mut self, viewport: Vec2, pitch: f64) -> bool {
        if viewport == self.viewport && pitch == self.pitch {
            return false;
        }
        self.viewport = viewport;
        self.pitch = pitch;
        self.rebuild();
        true
    }

    pub fn pitch(&self) -> f64 {
        self.pitch
    }

    pub fn viewport(&self) -> Vec2 {
        self.viewport
    }

    pub fn dots(&self) -> &[GridDot] {
        &self.dots
    }

    pub fn len(&self) -> usize {
        self.dots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dots.is_empty()
    }

    fn index(&self, coord: GridCoord) -> Option<usize> {
        let col = coord.col - self.min_coord.col;
        let row = coord.row - self.min_coord.row;
        if col < 0 || row < 0 || col as usize >= self.cols || row as usize >= self.rows {
            return None;
        }
        Some(row as usize * self.cols + col as usize)
    }

    pub fn dot(&self, coord: GridCoord) -> Option<&GridDot> {
        self.index(coord).map(|i| &self.dots[i])
    }

    /// Live position of the dot at `coord`, or its rest position when the
    /// coordinate lies outside the lattice.
    pub fn position_of(&self, coord: GridCoord) -> Vec2 {
        self.dot(coord)
            .map(|dot| dot.position)
            .unwrap_or_else(|| coord.to_point(self.pitch))
    }

    /// Advances every dot's spring one frame toward its displaced target.
    pub fn step(&mut self, rects: &[Rect], settings: &FieldSettings) {
        self.dots.par_iter_mut().for_each(|dot| {
            let (push, nearest) = displacement(dot.rest, rects, settings);
            let target = dot.rest + push;
            dot.velocity =
                (dot.velocity + (target - dot.position) * settings.spring_stiffness)
                    * settings.spring_damping;
            dot.position += dot.velocity;
            dot.panel_distance = nearest;
            dot.line_distance = nearest_distance(dot.position, rects);

            let norm = (nearest / settings.max_influence_distance).min(1.0);
            dot.target_size = 0.8 + (norm * PI).sin() * 2.0;
            dot.size += (dot.target_size - dot.size) * settings.size_easing;
        });
    }

    /// Samples ripple and hover intensity at each dot's live position.
    pub fn update_intensities(
        &mut self,
        pulses: &[PulseEvent],
        pointer: Option<Vec2>,
        now: f64,
        pulse_settings: &PulseSettings,
        field_settings: &FieldSettings,
    ) {
        if self.dots.is_empty() {
            return;
        }
        let chunk_size = (self.dots.len() / num_cpus::get()).max(1);
        self.dots.par_chunks_mut(chunk_size).for_each(|chunk| {
            for dot in chunk {
                dot.ripple = ripple_intensity(pulses, dot.position, now, pulse_settings);
                dot.hover = hover_intensity(pointer, dot.position, field_settings);
            }
        });
    }

    /// Right and down lattice segments, styled by panel proximity and the
    /// stronger of the ripple and hover effects at both ends.
    pub fn edges(&self, settings: &FieldSettings) -> Vec<GridEdge> {
        let mut edges = Vec::with_capacity(self.dots.len() * 2);
        for dot in &self.dots {
            let norm = (dot.line_distance / settings.max_influence_distance).min(1.0);
            let base = (0.25 - norm * 0.2) * 0.5;
            let right = GridCoord::new(dot.coord.col + 1, dot.coord.row);
            let down = GridCoord::new(dot.coord.col, dot.coord.row + 1);
            for neighbour in [right, down].into_iter().filter_map(|c| self.dot(c)) {
                let effect = ((dot.ripple + neighbour.ripple) / 2.0)
                    .max((dot.hover + neighbour.hover) / 2.0);
                let opacity = base + effect * 0.8;
                if opacity <= 0.01 {
                    continue;
                }
                let alpha = if effect > 0.1 {
                    opacity + effect * 0.7
                } else {
                    opacity
                };
                edges.push(GridEdge {
                    start: dot.position,
                    end: neighbour.position,
                    alpha: alpha.max(0.0),
                    width: 0.5 + effect * 2.0,
                });
            }
        }
        edges
    }

    /// Half-pitch segments lit by live ripples. Empty when no pulse is live.
    pub fn dense_edges(
        &self,
        rects: &[Rect],
        pulses: &[PulseEvent],
        now: f64,
        field_settings: &FieldSettings,
        pulse_settings: &PulseSettings,
    ) -> Vec<GridEdge> {
        if self.cols == 0 || !pulse_settings.ripple_enabled || !any_live(pulses, now, pulse_settings)
        {
            return Vec::new();
        }
        let step = self.pitch / 2.0;
        let last_col = last_index(self.viewport.x.max(0.0), step);
        let last_row = last_index(self.viewport.y.max(0.0), step);
        let threshold = pulse_settings.dense_threshold;
        let sample = |col: i64, row: i64| {
            let rest = Vec2::new(col as f64 * step, row as f64 * step);
            let position = rest + displacement(rest, rects, field_settings).0;
            (position, ripple_intensity(pulses, position, now, pulse_settings))
        };

        (-1..=last_row)
            .into_par_iter()
            .flat_map_iter(|row| {
                let mut row_edges = Vec::new();
                for col in -1..=last_col {
                    if col % 2 == 0 && row % 2 == 0 {
                        continue;
                    }
                    let (position, intensity) = sample(col, row);
                    if intensity < threshold {
                        continue;
                    }
                    for (n_col, n_row) in [(col + 1, row), (col, row + 1)] {
                        let (neighbour, n_intensity) = sample(n_col, n_row);
                        let avg = (intensity + n_intensity) / 2.0;
                        if avg > threshold {
                            row_edges.push(GridEdge {
                                start: position,
                                end: neighbour,
                                alpha: avg,
                                width: 0.3 + avg * 0.5,
                            });
                        }
                    }
                }
                row_edges
            })
            .collect()
    }

    /// Puts every dot back at rest.
    pub fn reset(&mut self) {
        self.rebuild();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> FieldSettings {
        FieldSettings::default()
    }

    #[test]
    fn lattice_covers_viewport_with_margin() {
        let grid = FieldGrid::new(Vec2::new(1000.0, 600.0), 40.0);
        let first = &grid.dots()[0];
        assert_eq!(first.rest, Vec2::new(-40.0, -40.0));
        let last = grid.dots().last().unwrap();
        assert_eq!(last.rest, Vec2::new(1040.0, 640.0));
        assert_eq!(grid.len(), 28 * 18);
    }

    #[test]
    fn ensure_rebuilds_only_on_change() {
        let mut grid = FieldGrid::new(Vec2::new(400.0, 400.0), 40.0);
        assert!(!grid.ensure(Vec2::new(400.0, 400.0), 40.0));
        assert!(grid.ensure(Vec2::new(800.0, 400.0), 40.0));
        assert!(grid.dot(GridCoord::new(20, 0)).is_some());
    }

    #[test]
    fn missing_dots_fall_back_to_rest_position() {
        let grid = FieldGrid::new(Vec2::new(200.0, 200.0), 40.0);
        assert_eq!(
            grid.position_of(GridCoord::new(100, 3)),
            Vec2::new(4000.0, 120.0)
        );
    }

    #[test]
    fn panels_push_dots_away() {
        let rect = Rect::new(100.0, 100.0, 100.0, 100.0);
        let (push, dist) = displacement(Vec2::new(240.0, 150.0), &[rect], &settings());
        assert_eq!(dist, 40.0);
        assert!(push.x > 0.0);
        assert!(push.y.abs() < 1e-12);
        let expected = (1.0_f64 - 0.1).powi(2) * 25.0;
        assert!((push.x - expected).abs() < 1e-9);

        let (inside, _) = displacement(Vec2::new(150.0, 150.0), &[rect], &settings());
        assert_eq!(inside, Vec2::zeros());
    }

    #[test]
    fn springs_overshoot_then_settle() {
        let mut grid = FieldGrid::new(Vec2::new(400.0, 400.0), 40.0);
        let rect = Rect::new(100.0, 100.0, 100.0, 100.0);
        let coord = GridCoord::new(6, 4);
        let rest = coord.to_point(40.0);
        let (push, _) = displacement(rest, &[rect], &settings());
        let target = rest + push;

        let mut max_x: f64 = 0.0;
        for _ in 0..300 {
            grid.step(&[rect], &settings());
            max_x = max_x.max(grid.position_of(coord).x);
        }
        assert!(max_x > target.x, "spring should overshoot its target");
        assert!((grid.position_of(coord) - target).norm() < 1e-6);
    }

    #[test]
    fn lines_shade_from_the_displaced_position() {
        let mut grid = FieldGrid::new(Vec2::new(400.0, 400.0), 40.0);
        let rect = Rect::new(100.0, 100.0, 100.0, 100.0);
        let coord = GridCoord::new(6, 4);
        for _ in 0..300 {
            grid.step(&[rect], &settings());
        }
        let dot = grid.dot(coord).unwrap();
        // rest (240, 160) sits 40 px out and is pushed a further 20.25 px
        assert_eq!(dot.panel_distance, 40.0);
        assert!((dot.line_distance - 60.25).abs() < 1e-6);

        let right = grid.position_of(GridCoord::new(7, 4));
        let edge = grid
            .edges(&settings())
            .into_iter()
            .find(|e| e.start == dot.position && e.end == right)
            .unwrap();
        let norm = dot.line_distance / settings().max_influence_distance;
        assert!((edge.alpha - (0.25 - norm * 0.2) * 0.5).abs() < 1e-12);
    }

    #[test]
    fn far_dots_are_not_drawn() {
        let mut grid = FieldGrid::new(Vec2::new(2000.0, 400.0), 40.0);
        let rect = Rect::new(0.0, 0.0, 40.0, 40.0);
        grid.step(&[rect], &settings());
        let near = grid.dot(GridCoord::new(2, 0)).unwrap();
        let far = grid.dot(GridCoord::new(40, 0)).unwrap();
        assert!(near.opacity(&settings()).is_some());
        assert!(far.opacity(&settings()).is_none());
    }

    #[test]
    fn dense_grid_only_while_pulses_live() {
        let grid = FieldGrid::new(Vec2::new(400.0, 400.0), 40.0);
        let pulse_settings = PulseSettings::default();
        let pulse = PulseEvent::new(Vec2::new(200.0, 200.0), 0.0, 1.0);
        let lit = grid.dense_edges(&[], &[pulse], 100.0, &settings(), &pulse_settings);
        assert!(!lit.is_empty());
        let dark = grid.dense_edges(&[], &[pulse], 5000.0, &settings(), &pulse_settings);
        assert!(dark.is_empty());
    }

    #[test]
    fn ripples_brighten_edges() {
        let mut grid = FieldGrid::new(Vec2::new(400.0, 400.0), 40.0);
        let quiet: f64 = grid.edges(&settings()).iter().map(|e| e.alpha).sum();
        let pulse = PulseEvent::new(Vec2::new(200.0, 200.0), 0.0, 1.0);
        grid.update_intensities(&[pulse], None, 100.0, &PulseSettings::default(), &settings());
        let lit: f64 = grid.edges(&settings()).iter().map(|e| e.alpha).sum();
        assert!(lit > quiet);
    }
}
