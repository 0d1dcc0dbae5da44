use nalgebra::Vector2;

pub type Vec2 = Vector2<f64>;

/// Below this the two segments are treated as parallel.
const PARALLEL_EPSILON: f64 = 0.0001;

/// Axis-aligned rectangle in canvas pixels, origin at the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    pub fn left(&self) -> f64 {
        self.x
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn top(&self) -> f64 {
        self.y
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    pub fn contains(&self, point: Vec2) -> bool {
        point.x >= self.left()
            && point.x <= self.right()
            && point.y >= self.top()
            && point.y <= self.bottom()
    }

    /// Grows the rectangle by `pad` on every side.
    pub fn expand(&self, pad: f64) -> Rect {
        Rect::new(
            self.x - pad,
            self.y - pad,
            self.width + pad * 2.0,
            self.height + pad * 2.0,
        )
    }

    pub fn scale(&self, factor: f64) -> Rect {
        Rect::new(
            self.x * factor,
            self.y * factor,
            self.width * factor,
            self.height * factor,
        )
    }

    /// Nearest point on (or inside) the rectangle to `point`.
    pub fn closest_point(&self, point: Vec2) -> Vec2 {
        Vec2::new(
            point.x.clamp(self.left(), self.right()),
            point.y.clamp(self.top(), self.bottom()),
        )
    }

    /// Zero for points inside the rectangle.
    pub fn distance_to(&self, point: Vec2) -> f64 {
        (point - self.closest_point(point)).norm()
    }
}

/// Rounds half-way values toward positive infinity so negative
/// coordinates snap the same way as positive ones.
pub fn round_half_up(value: f64) -> f64 {
    (value + 0.5).floor()
}

pub fn snap_to_grid(value: f64, pitch: f64) -> f64 {
    round_half_up(value / pitch) * pitch
}

pub fn snap_point(point: Vec2, pitch: f64) -> Vec2 {
    Vec2::new(snap_to_grid(point.x, pitch), snap_to_grid(point.y, pitch))
}

/// Intersection of segments `a1-a2` and `b1-b2`, endpoints inclusive.
/// Parallel and collinear segments never intersect.
pub fn segment_intersection(a1: Vec2, a2: Vec2, b1: Vec2, b2: Vec2) -> Option<Vec2> {
    let denom = (b2.y - b1.y) * (a2.x - a1.x) - (b2.x - b1.x) * (a2.y - a1.y);
    if denom.abs() < PARALLEL_EPSILON {
        return None;
    }
    let ua = ((b2.x - b1.x) * (a1.y - b1.y) - (b2.y - b1.y) * (a1.x - b1.x)) / denom;
    let ub = ((a2.x - a1.x) * (a1.y - b1.y) - (a2.y - a1.y) * (a1.x - b1.x)) / denom;
    if (0.0..=1.0).contains(&ua) && (0.0..=1.0).contains(&ub) {
        Some(a1 + (a2 - a1) * ua)
    } else {
        None
    }
}

pub fn segments_intersect(a1: Vec2, a2: Vec2, b1: Vec2, b2: Vec2) -> bool {
    segment_intersection(a1, a2, b1, b2).is_some()
}

/// Cubic ease-out on `t` in `[0, 1]`.
pub fn ease_out_cubic(t: f64) -> f64 {
    1.0 - (1.0 - t).powi(3)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapping_rounds_half_up() {
        assert_eq!(snap_to_grid(100.0, 40.0), 120.0);
        assert_eq!(snap_to_grid(99.0, 40.0), 80.0);
        assert_eq!(snap_to_grid(-20.0, 40.0), 0.0);
        assert_eq!(snap_to_grid(-21.0, 40.0), -40.0);
    }

    #[test]
    fn closest_point_clamps_into_rect() {
        let rect = Rect::new(10.0, 10.0, 100.0, 50.0);
        assert_eq!(rect.closest_point(Vec2::new(0.0, 0.0)), Vec2::new(10.0, 10.0));
        assert_eq!(rect.closest_point(Vec2::new(50.0, 30.0)), Vec2::new(50.0, 30.0));
        assert_eq!(rect.distance_to(Vec2::new(110.0, 90.0)), 30.0);
    }

    #[test]
    fn crossing_segments_intersect_at_crossing_point() {
        let hit = segment_intersection(
            Vec2::new(0.0, -10.0),
            Vec2::new(0.0, 10.0),
            Vec2::new(-10.0, 0.0),
            Vec2::new(10.0, 0.0),
        )
        .expect("segments cross");
        assert!(hit.norm() < 1e-9);
    }

    #[test]
    fn disjoint_and_parallel_segments_do_not_intersect() {
        assert!(!segments_intersect(
            Vec2::new(0.0, 0.0),
            Vec2::new(10.0, 0.0),
            Vec2::new(0.0, 5.0),
            Vec2::new(10.0, 5.0),
        ));
        assert!(!segments_intersect(
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(5.0, -5.0),
            Vec2::new(5.0, 5.0),
        ));
    }

    #[test]
    fn ease_out_cubic_hits_endpoints() {
        assert_eq!(ease_out_cubic(0.0), 0.0);
        assert_eq!(ease_out_cubic(1.0), 1.0);
        assert!(ease_out_cubic(0.5) > 0.5);
    }
}
