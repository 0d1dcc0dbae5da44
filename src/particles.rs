use crate::feedback::{emit, AudioFeedback, Cue, CueKind, RateLimiter};
use crate::geometry::{Rect, Vec2};
use crate::panel::{Panel, PanelId};
use crate::settings::{ParticleSettings, SoundSettings};
use log::trace;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use std::collections::HashMap;
use std::f64::consts::PI;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParticleShape {
    Circle,
    Triangle,
    Square,
}

impl ParticleShape {
    fn random<R: Rng>(rng: &mut R) -> Self {
        match rng.gen_range(0..3) {
            0 => ParticleShape::Circle,
            1 => ParticleShape::Triangle,
            _ => ParticleShape::Square,
        }
    }
}

/// Colour variant relative to the configured particle colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParticleTint {
    Accent,
    Blue,
    Cyan,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Particle {
    pub position: Vec2,
    pub velocity: Vec2,
    pub rotation: f64,
    pub spin: f64,
    pub size: f64,
    pub opacity: f64,
    /// Remaining life in ms
    pub life: f64,
    pub max_life: f64,
    pub shape: ParticleShape,
    pub tint: ParticleTint,
    /// Panel the particle is sliding on this frame, if any
    pub resting_on: Option<PanelId>,
}

impl Particle {
    pub fn new(position: Vec2, velocity: Vec2, size: f64, life: f64) -> Self {
        Self {
            position,
            velocity,
            rotation: 0.0,
            spin: 0.0,
            size,
            opacity: 1.0,
            life,
            max_life: life,
            shape: ParticleShape::Circle,
            tint: ParticleTint::Accent,
            resting_on: None,
        }
    }

    pub fn life_ratio(&self) -> f64 {
        if self.max_life > 0.0 {
            (self.life / self.max_life).clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    fn outside(&self, viewport: Vec2, margin: f64) -> bool {
        self.position.y > viewport.y + margin
            || self.position.x < -margin
            || self.position.x > viewport.x + margin
    }
}

/// A live panel as seen by the bouncy particles this frame.
#[derive(Debug, Clone, Copy)]
struct PanelBody {
    id: PanelId,
    rect: Rect,
    /// Displacement since the previous frame
    velocity: Vec2,
}

#[derive(Debug, Clone, Copy)]
struct RestContact {
    id: PanelId,
    velocity: Vec2,
    top: f64,
    left: f64,
    right: f64,
}

enum Contact {
    Free,
    Bounced { speed: f64 },
    Resting(RestContact),
}

/// Directional and bouncy particle populations.
pub struct ParticleSystem {
    directional: Vec<Particle>,
    bouncy: Vec<Particle>,
    rng: StdRng,
    last_panel_positions: HashMap<PanelId, Vec2>,
    sound_limiter: RateLimiter,
}

impl Default for ParticleSystem {
    fn default() -> Self {
        Self::new(StdRng::from_entropy())
    }
}

impl ParticleSystem {
    pub fn new(rng: StdRng) -> Self {
        Self {
            directional: Vec::new(),
            bouncy: Vec::new(),
            rng,
            last_panel_positions: HashMap::new(),
            sound_limiter: RateLimiter::new(ParticleSettings::default().sound_interval),
        }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }

    pub fn directional(&self) -> &[Particle] {
        &self.directional
    }

    pub fn bouncy(&self) -> &[Particle] {
        &self.bouncy
    }

    pub fn len(&self) -> usize {
        self.directional.len() + self.bouncy.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn push_directional(&mut self, particle: Particle) {
        self.directional.push(particle);
    }

    pub fn push_bouncy(&mut self, particle: Particle) {
        self.bouncy.push(particle);
    }

    pub fn clear(&mut self) {
        self.directional.clear();
        self.bouncy.clear();
        self.last_panel_positions.clear();
        self.sound_limiter.reset();
    }

    /// Radial burst of both populations at `origin`. Particle count and
    /// speed scale with `intensity`.
    pub fn spawn_burst(&mut self, origin: Vec2, intensity: f64, settings: &ParticleSettings) {
        let intensity = intensity.clamp(0.0, 1.0);
        let rng = &mut self.rng;

        let count = (settings.count as f64 * (0.5 + intensity * 0.5)).floor() as usize;
        for i in 0..count {
            let angle = 2.0 * PI * i as f64 / count as f64 + (rng.gen::<f64>() - 0.5) * 0.5;
            let speed = settings.speed * (0.5 + rng.gen::<f64>() * 0.5) * intensity;
            self.directional.push(Particle {
                position: origin,
                velocity: Vec2::new(angle.cos(), angle.sin()) * speed,
                rotation: rng.gen::<f64>() * 2.0 * PI,
                spin: (rng.gen::<f64>() - 0.5) * 0.3,
                size: 3.0 + rng.gen::<f64>() * 4.0 * intensity,
                opacity: 0.8 + rng.gen::<f64>() * 0.2,
                life: settings.lifespan,
                max_life: settings.lifespan,
                shape: ParticleShape::random(rng),
                tint: ParticleTint::Accent,
                resting_on: None,
            });
        }

        let count = (settings.bouncy_count as f64 * (0.5 + intensity * 0.5)).floor() as usize;
        for i in 0..count {
            let angle = 2.0 * PI * i as f64 / count as f64 + (rng.gen::<f64>() - 0.5) * 0.8;
            let speed = settings.bouncy_speed * (0.7 + rng.gen::<f64>() * 0.6) * intensity;
            let blue = rng.gen::<f64>() < 0.4;
            let size = if blue {
                1.0 + rng.gen::<f64>() * 2.0 * intensity
            } else {
                2.0 + rng.gen::<f64>() * 4.0 * intensity
            };
            self.bouncy.push(Particle {
                position: origin,
                velocity: Vec2::new(angle.cos(), angle.sin()) * speed,
                rotation: rng.gen::<f64>() * 2.0 * PI,
                spin: (rng.gen::<f64>() - 0.5) * 0.2,
                size,
                opacity: 0.9,
                life: settings.bouncy_lifespan,
                max_life: settings.bouncy_lifespan,
                shape: ParticleShape::random(rng),
                tint: if blue {
                    ParticleTint::Blue
                } else {
                    ParticleTint::Cyan
                },
                resting_on: None,
            });
        }
    }

    /// Advances both populations by `dt` ms and drops dead or escaped particles.
    pub fn step(
        &mut self,
        dt: f64,
        now: f64,
        panels: &[Panel],
        viewport: Vec2,
        settings: &ParticleSettings,
        sound: &SoundSettings,
        feedback: &mut dyn AudioFeedback,
    ) {
        let dt = dt.max(0.0);
        self.step_directional(dt, viewport, settings);
        let bodies = self.track_panels(panels);
        self.step_bouncy(dt, now, &bodies, viewport, settings, sound, feedback);
        trace!(
            "particles: {} directional, {} bouncy",
            self.directional.len(),
            self.bouncy.len()
        );
    }

    fn step_directional(&mut self, dt: f64, viewport: Vec2, settings: &ParticleSettings) {
        self.directional.par_iter_mut().for_each(|p| {
            p.life -= dt;
            if p.life <= 0.0 {
                return;
            }
            p.velocity.y += settings.gravity;
            p.velocity *= settings.friction;
            p.position += p.velocity;
            p.rotation += p.spin;
        });
        let margin = settings.cull_margin;
        self.directional
            .retain(|p| p.life > 0.0 && !p.outside(viewport, margin));
    }

    /// Panel velocities are measured as the displacement since last frame.
    fn track_panels(&mut self, panels: &[Panel]) -> Vec<PanelBody> {
        let bodies: Vec<PanelBody> = panels
            .iter()
            .filter(|panel| panel.is_live())
            .map(|panel| PanelBody {
                id: panel.id,
                rect: panel.rect(),
                velocity: self
                    .last_panel_positions
                    .get(&panel.id)
                    .map(|last| panel.position - last)
                    .unwrap_or_else(Vec2::zeros),
            })
            .collect();
        self.last_panel_positions = panels
            .iter()
            .filter(|panel| panel.is_live())
            .map(|panel| (panel.id, panel.position))
            .collect();
        bodies
    }

    #[allow(clippy::too_many_arguments)]
    fn step_bouncy(
        &mut self,
        dt: f64,
        now: f64,
        bodies: &[PanelBody],
        viewport: Vec2,
        settings: &ParticleSettings,
        sound: &SoundSettings,
        feedback: &mut dyn AudioFeedback,
    ) {
        collide_pairs(&mut self.bouncy, settings.collision_damping);

        let margin = settings.cull_margin;
        let mut loudest: Option<f64> = None;
        let rng = &mut self.rng;
        self.bouncy.retain_mut(|p| {
            if p.outside(viewport, margin) {
                return false;
            }
            p.life -= dt;
            if p.life <= 0.0 {
                return false;
            }
            p.velocity.y += settings.bouncy_gravity;
            p.velocity *= settings.bouncy_friction;
            p.resting_on = None;

            match collide_with_panels(p, bodies, settings, rng) {
                Contact::Bounced { speed } => {
                    if speed > settings.sound_speed_threshold {
                        loudest = Some(loudest.map_or(speed, |s: f64| s.max(speed)));
                    }
                    p.position += p.velocity;
                }
                Contact::Resting(contact) => {
                    rest_on_panel(p, &contact, settings);
                    p.position.x += p.velocity.x;
                }
                Contact::Free => {
                    p.position += p.velocity;
                }
            }
            p.rotation += p.spin;
            true
        });

        self.sound_limiter.set_interval(settings.sound_interval);
        if let Some(speed) = loudest {
            if self.sound_limiter.try_fire(now) {
                let norm = ((speed - settings.sound_speed_threshold) / 8.0).min(1.0);
                emit(
                    feedback,
                    sound,
                    Cue::new(CueKind::Collision, 0.01 + norm * 0.03),
                );
            }
        }
    }
}

/// Pushes overlapping particles apart and exchanges a damped impulse along
/// the contact normal when they are approaching.
fn collide_pairs(particles: &mut [Particle], damping: f64) {
    for i in 0..particles.len() {
        let (head, tail) = particles.split_at_mut(i + 1);
        let p1 = &mut head[i];
        for p2 in tail.iter_mut() {
            let delta = p2.position - p1.position;
            let dist = delta.norm();
            let min_dist = (p1.size + p2.size) * 0.6;
            if dist <= 0.0 || dist >= min_dist {
                continue;
            }
            let normal = delta / dist;
            let overlap = min_dist - dist;
            p1.position -= normal * overlap * 0.5;
            p2.position += normal * overlap * 0.5;
            let approach = (p1.velocity - p2.velocity).dot(&normal);
            if approach > 0.0 {
                let impulse = normal * approach * damping;
                p1.velocity -= impulse;
                p2.velocity += impulse;
            }
        }
    }
}

fn random_deflection<R: Rng>(rng: &mut R) -> f64 {
    let degrees = 1.0 + rng.gen::<f64>() * 2.0;
    let sign = if rng.gen_bool(0.5) { 1.0 } else { -1.0 };
    degrees.to_radians() * sign
}

/// Tests the particle against every panel's padded rectangle. The first
/// bounce wins; a top-edge rest is kept unless a later panel bounces it.
fn collide_with_panels<R: Rng>(
    p: &mut Particle,
    bodies: &[PanelBody],
    settings: &ParticleSettings,
    rng: &mut R,
) -> Contact {
    let pad = p.size * settings.pad_factor;
    let mut resting = None;

    for body in bodies {
        let rect = body.rect;
        let padded = rect.expand(pad);
        let pv = body.velocity;
        let next = p.position + p.velocity;
        let in_x = p.position.x >= padded.left() && p.position.x <= padded.right();
        let in_y = p.position.y >= padded.top() && p.position.y <= padded.bottom();
        let next_in = padded.contains(next);

        let moving_into = pv.norm() > 0.5
            && ((pv.x > 0.0
                && p.position.x > rect.right() - 20.0
                && p.position.x < rect.right() + pad + 10.0
                && in_y)
                || (pv.x < 0.0
                    && p.position.x < rect.left() + 20.0
                    && p.position.x > rect.left() - pad - 10.0
                    && in_y)
                || (pv.y > 0.0
                    && p.position.y > rect.bottom() - 20.0
                    && p.position.y < rect.bottom() + pad + 10.0
                    && in_x)
                || (pv.y < 0.0
                    && p.position.y < rect.top() + 20.0
                    && p.position.y > rect.top() - pad - 10.0
                    && in_x));

        if !(moving_into || next_in || (in_x && in_y)) {
            continue;
        }

        let dist_left = (p.position.x - padded.left()).abs();
        let dist_right = (p.position.x - padded.right()).abs();
        let dist_top = (p.position.y - padded.top()).abs();
        let dist_bottom = (p.position.y - padded.bottom()).abs();
        let nearest = dist_left.min(dist_right).min(dist_top).min(dist_bottom);
        let deflection = random_deflection(rng);
        let speed = p.velocity.norm();

        let angle = if nearest == dist_top {
            if p.velocity.y >= 0.0
                && p.velocity.y.abs() < settings.rest_speed
                && pv.y >= settings.rest_panel_vy
            {
                resting = Some(RestContact {
                    id: body.id,
                    velocity: pv,
                    top: padded.top(),
                    left: rect.left(),
                    right: rect.right(),
                });
                continue;
            }
            p.position.y = padded.top() - 1.0;
            (-p.velocity.y).atan2(p.velocity.x) + deflection
        } else if nearest == dist_left || nearest == dist_right {
            p.position.x = if nearest == dist_left {
                padded.left() - 1.0
            } else {
                padded.right() + 1.0
            };
            p.spin = -p.spin * 1.2;
            p.velocity.y.atan2(-p.velocity.x) + deflection
        } else {
            p.position.y = padded.bottom() + 1.0;
            p.spin = -p.spin * 1.2;
            (-p.velocity.y).atan2(p.velocity.x) + deflection
        };

        p.velocity = Vec2::new(angle.cos(), angle.sin()) * speed * settings.bounce_damping
            + pv * settings.momentum_transfer;
        return Contact::Bounced { speed };
    }

    match resting {
        Some(contact) => Contact::Resting(contact),
        None => Contact::Free,
    }
}

/// Slides the particle along a panel top with surface friction, carried by
/// the panel and kept within its horizontal extent.
fn rest_on_panel(p: &mut Particle, contact: &RestContact, settings: &ParticleSettings) {
    let pv = contact.velocity;
    p.velocity.x = pv.x + (p.velocity.x - pv.x) * settings.surface_friction;
    p.velocity.y = 0.0;
    p.position.y = contact.top - 1.0;
    p.spin *= 0.85;
    p.resting_on = Some(contact.id);

    let margin = p.size * settings.pad_factor + 2.0;
    if p.position.x < contact.left + margin {
        p.position.x = contact.left + margin;
        p.velocity.x = p.velocity.x.max(pv.x);
    }
    if p.position.x > contact.right - margin {
        p.position.x = contact.right - margin;
        p.velocity.x = p.velocity.x.min(pv.x);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feedback::RecordingFeedback;

    fn panel_at(x: f64, y: f64) -> Panel {
        Panel::new(PanelId(1), Vec2::new(x, y), Vec2::new(200.0, 200.0))
    }

    fn run(system: &mut ParticleSystem, panels: &[Panel], frames: usize) -> RecordingFeedback {
        let mut feedback = RecordingFeedback::default();
        let settings = ParticleSettings::default();
        for frame in 0..frames {
            system.step(
                16.0,
                frame as f64 * 16.0,
                panels,
                Vec2::new(1000.0, 800.0),
                &settings,
                &SoundSettings::default(),
                &mut feedback,
            );
        }
        feedback
    }

    #[test]
    fn burst_size_scales_with_intensity() {
        let settings = ParticleSettings::default();
        let mut system = ParticleSystem::with_seed(1);
        system.spawn_burst(Vec2::new(100.0, 100.0), 1.0, &settings);
        assert_eq!(system.directional().len(), 12);
        assert_eq!(system.bouncy().len(), 16);

        let mut system = ParticleSystem::with_seed(1);
        system.spawn_burst(Vec2::new(100.0, 100.0), 0.0, &settings);
        assert_eq!(system.directional().len(), 6);
        assert_eq!(system.bouncy().len(), 8);
    }

    #[test]
    fn directional_particles_expire() {
        let settings = ParticleSettings::default();
        let mut system = ParticleSystem::with_seed(2);
        system.spawn_burst(Vec2::new(500.0, 400.0), 0.5, &settings);
        run(&mut system, &[], 10);
        assert!(!system.directional().is_empty());
        run(&mut system, &[], 70);
        assert!(system.directional().is_empty());
    }

    #[test]
    fn falling_particle_bounces_off_panel_top() {
        let mut system = ParticleSystem::with_seed(3);
        system.push_bouncy(Particle::new(
            Vec2::new(300.0, 293.0),
            Vec2::new(0.0, 6.0),
            2.0,
            2500.0,
        ));
        let feedback = run(&mut system, &[panel_at(200.0, 300.0)], 1);
        let p = &system.bouncy()[0];
        assert!(p.velocity.y < 0.0, "should head back up, got {:?}", p.velocity);
        assert!(p.velocity.norm() < 6.2);
        assert!(p.position.y < 298.0);
        assert_eq!(feedback.count(CueKind::Collision), 1);
    }

    #[test]
    fn slow_particle_comes_to_rest_on_panel() {
        let mut system = ParticleSystem::with_seed(4);
        system.push_bouncy(Particle::new(
            Vec2::new(300.0, 298.5),
            Vec2::new(1.0, 0.2),
            2.0,
            2500.0,
        ));
        let feedback = run(&mut system, &[panel_at(200.0, 300.0)], 1);
        let p = &system.bouncy()[0];
        assert_eq!(p.resting_on, Some(PanelId(1)));
        assert_eq!(p.velocity.y, 0.0);
        assert_eq!(p.position.y, 297.0);
        assert!(feedback.cues.is_empty());
    }

    #[test]
    fn resting_particles_stay_on_the_panel() {
        let mut system = ParticleSystem::with_seed(5);
        system.push_bouncy(Particle::new(
            Vec2::new(398.0, 298.5),
            Vec2::new(1.4, 0.1),
            2.0,
            2500.0,
        ));
        run(&mut system, &[panel_at(200.0, 300.0)], 1);
        let p = &system.bouncy()[0];
        assert!(p.position.x <= 400.0 - 4.0 + p.velocity.x + 1e-9);
    }

    #[test]
    fn moving_panel_throws_particles_it_hits() {
        let mut system = ParticleSystem::with_seed(7);
        system.push_bouncy(Particle::new(
            Vec2::new(410.0, 400.0),
            Vec2::zeros(),
            2.0,
            2500.0,
        ));
        run(&mut system, &[panel_at(200.0, 300.0)], 1);
        assert!(system.bouncy()[0].velocity.x.abs() < 1e-9);

        // the right edge sweeps from 400 to 420, over the particle
        run(&mut system, &[panel_at(210.0, 300.0)], 1);
        let p = &system.bouncy()[0];
        let carried = 10.0 * ParticleSettings::default().momentum_transfer;
        assert!((p.velocity.x - carried).abs() < 0.5, "got {:?}", p.velocity);
        assert!(p.position.x > 420.0);
        assert_eq!(p.resting_on, None);
    }

    #[test]
    fn resting_particles_ride_a_moving_panel() {
        let mut system = ParticleSystem::with_seed(8);
        system.push_bouncy(Particle::new(
            Vec2::new(300.0, 298.5),
            Vec2::new(0.0, 0.2),
            2.0,
            2500.0,
        ));
        run(&mut system, &[panel_at(200.0, 300.0)], 1);
        assert_eq!(system.bouncy()[0].resting_on, Some(PanelId(1)));
        let start_x = system.bouncy()[0].position.x;

        for frame in 1..=20 {
            run(&mut system, &[panel_at(200.0 + 2.0 * frame as f64, 300.0)], 1);
        }
        let p = &system.bouncy()[0];
        let travelled = p.position.x - start_x;
        // the panel travels 40 px
        assert!(travelled > 15.0 && travelled <= 40.0, "travelled {}", travelled);
        assert!(p.velocity.x > 1.0);
        assert!(p.position.y < 300.0);
    }

    #[test]
    fn overlapping_particles_separate() {
        let mut pair = vec![
            Particle::new(Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0), 4.0, 1000.0),
            Particle::new(Vec2::new(2.0, 0.0), Vec2::new(-1.0, 0.0), 4.0, 1000.0),
        ];
        collide_pairs(&mut pair, 0.8);
        assert!((pair[1].position.x - pair[0].position.x - 4.8).abs() < 1e-9);
        assert!(pair[0].velocity.x < 1.0);
        assert!(pair[1].velocity.x > -1.0);
    }

    #[test]
    fn escaped_particles_are_culled() {
        let mut system = ParticleSystem::with_seed(6);
        system.push_bouncy(Particle::new(
            Vec2::new(-250.0, 100.0),
            Vec2::zeros(),
            2.0,
            2500.0,
        ));
        system.push_directional(Particle::new(
            Vec2::new(500.0, 1100.0),
            Vec2::zeros(),
            2.0,
            2500.0,
        ));
        run(&mut system, &[], 1);
        assert!(system.is_empty());
    }
}
