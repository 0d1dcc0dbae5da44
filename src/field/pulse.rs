use crate::geometry::Vec2;
use crate::settings::{FieldSettings, PulseSettings};

/// A circular wave source left behind by a panel bounce.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PulseEvent {
    pub origin: Vec2,
    /// Creation timestamp in ms
    pub time: f64,
    /// 0..=1
    pub intensity: f64,
}

impl PulseEvent {
    pub fn new(origin: Vec2, time: f64, intensity: f64) -> Self {
        Self {
            origin,
            time,
            intensity: intensity.clamp(0.0, 1.0),
        }
    }

    pub fn age(&self, now: f64) -> f64 {
        now - self.time
    }

    pub fn is_live(&self, now: f64, settings: &PulseSettings) -> bool {
        self.age(now) <= settings.duration
    }

    /// Wave-front intensity at `point`. Stronger pulses travel faster and
    /// spread wider; everything fades linearly with age.
    pub fn intensity_at(&self, point: Vec2, now: f64, settings: &PulseSettings) -> f64 {
        let age = self.age(now);
        if age < 0.0 || age > settings.duration || settings.duration <= 0.0 {
            return 0.0;
        }
        let spread = 0.5 + self.intensity * 0.5;
        let radius = age / 1000.0 * settings.speed * spread;
        let width = settings.width * spread;
        let from_front = ((point - self.origin).norm() - radius).abs();
        if width <= 0.0 || from_front >= width {
            return 0.0;
        }
        (1.0 - from_front / width) * (1.0 - age / settings.duration) * self.intensity
    }
}

/// Strongest wave at `point` over all pulses.
pub fn ripple_intensity(
    pulses: &[PulseEvent],
    point: Vec2,
    now: f64,
    settings: &PulseSettings,
) -> f64 {
    if !settings.ripple_enabled {
        return 0.0;
    }
    pulses
        .iter()
        .map(|pulse| pulse.intensity_at(point, now, settings))
        .fold(0.0, f64::max)
}

/// Glow around the pointer, independent of pulses.
pub fn hover_intensity(pointer: Option<Vec2>, point: Vec2, settings: &FieldSettings) -> f64 {
    let Some(pointer) = pointer else {
        return 0.0;
    };
    let dist = (point - pointer).norm();
    if settings.hover_radius <= 0.0 || dist > settings.hover_radius {
        return 0.0;
    }
    (1.0 - dist / settings.hover_radius).powi(2) * settings.hover_strength
}

pub fn any_live(pulses: &[PulseEvent], now: f64, settings: &PulseSettings) -> bool {
    pulses.iter().any(|pulse| pulse.age(now) < settings.duration)
}

/// Drops pulses older than the pulse duration.
pub fn prune(pulses: &mut Vec<PulseEvent>, now: f64, settings: &PulseSettings) {
    pulses.retain(|pulse| pulse.age(now) < settings.duration);
}
