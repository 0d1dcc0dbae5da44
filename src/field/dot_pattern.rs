use crate::geometry::{Rect, Vec2};
use crate::settings::{FieldSettings, PatternSettings};

/// Opacity every pattern dot starts from.
const BASE_OPACITY: f64 = 0.15;

/// Dots brighter than this get a glow copy when glow is enabled.
const GLOW_THRESHOLD: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PatternDot {
    pub position: Vec2,
    pub size: f64,
    pub opacity: f64,
    pub glow: bool,
}

/// Flat tiled background. Dots are warped by nearby panels and brightened
/// near panels and the pointer, with no spring state.
pub fn layout(
    viewport: Vec2,
    rects: &[Rect],
    pointer: Option<Vec2>,
    pattern: &PatternSettings,
    field: &FieldSettings,
) -> Vec<PatternDot> {
    if !(pattern.spacing.is_finite() && pattern.spacing > 0.0) {
        return Vec::new();
    }
    let cols = (viewport.x / pattern.spacing).ceil().max(0.0) as usize + 1;
    let rows = (viewport.y / pattern.spacing).ceil().max(0.0) as usize + 1;
    let mut dots = Vec::with_capacity((cols + 1) * (rows + 1));

    for row in 0..=rows {
        for col in 0..=cols {
            let rest = Vec2::new(col as f64 * pattern.spacing, row as f64 * pattern.spacing);
            let position = rest + push(rest, rects, field);
            let (size, opacity) = boost(position, rects, pointer, pattern);
            dots.push(PatternDot {
                position,
                size,
                opacity,
                glow: pattern.glow && opacity > GLOW_THRESHOLD,
            });
        }
    }
    dots
}

/// Same falloff as the field grid, but only panels strictly inside the
/// influence distance push.
fn push(rest: Vec2, rects: &[Rect], field: &FieldSettings) -> Vec2 {
    let mut total = Vec2::zeros();
    for rect in rects {
        let offset = rest - rect.closest_point(rest);
        let dist = offset.norm();
        if dist > 0.0 && dist < field.max_influence_distance {
            let norm = dist / field.max_influence_distance;
            total += offset / dist * (1.0 - norm).powi(2) * field.push_strength;
        }
    }
    total
}

fn boost(
    position: Vec2,
    rects: &[Rect],
    pointer: Option<Vec2>,
    pattern: &PatternSettings,
) -> (f64, f64) {
    let mut size = pattern.size;
    let mut opacity = BASE_OPACITY;

    if pattern.panel_range > 0.0 {
        for rect in rects {
            let dist = rect.distance_to(position);
            if dist < pattern.panel_range {
                let effect = 1.0 - dist / pattern.panel_range;
                opacity = opacity.max(BASE_OPACITY + effect * 0.6);
                size = size.max(pattern.size * (1.0 + effect * 0.8));
            }
        }
    }

    if let Some(pointer) = pointer {
        let dist = (position - pointer).norm();
        if dist < pattern.pointer_range {
            let effect = 1.0 - dist / pattern.pointer_range;
            size = size.max(pattern.size * (1.0 + effect * 1.5));
            opacity = opacity.max(BASE_OPACITY + effect * 0.85);
        }
    }
    (size, opacity)
}

/// Font size for glyph-shaped dots.
pub fn glyph_font_size(size: f64) -> f64 {
    (size * 6.0).max(6.0)
}
