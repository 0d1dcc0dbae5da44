use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Live panel count above which the canvas dials its background down.
pub const CROWD_PANEL_THRESHOLD: usize = 25;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse settings: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MovementMode {
    Sticky,
    #[default]
    Default,
    Bouncy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackgroundType {
    #[default]
    Grid,
    DotPattern,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DotShape {
    #[default]
    Circle,
    Square,
    Glyph,
}

/// Panel drag, momentum, bounce and resize tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionSettings {
    /// Gap kept between a panel and the viewport edge
    pub boundary_margin: f64,
    /// Momentum speed clamp in pixels per frame
    pub max_velocity: f64,
    /// Friction applied at low speed
    pub base_friction: f64,
    /// Friction applied at max speed
    pub high_speed_friction: f64,
    /// Fraction of the crossing velocity kept after a bounce
    pub bounce_damping: f64,
    /// Extra friction on the frame after a bounce
    pub bounce_friction_boost: f64,
    /// Momentum stops below this speed
    pub min_velocity: f64,
    /// Releases slower than this do not start momentum
    pub momentum_threshold: f64,
    /// Capacity of the drag velocity sample buffer
    pub velocity_sample_count: usize,
    /// Samples older than this (ms) are ignored on release
    pub velocity_max_age: f64,
    /// Sample spacing outside [min, max) ms is implausible
    pub velocity_min_dt: f64,
    pub velocity_max_dt: f64,
    /// Pointer travel (px) before a press becomes a drag
    pub drag_threshold: f64,
    /// Distance from the panel edge that grabs a resize handle
    pub edge_threshold: f64,
    pub min_panel_size: f64,
    pub max_panel_size: f64,
    pub idle_panel_scale: f64,
    pub drag_panel_scale: f64,
    pub movement_mode: MovementMode,
}

impl Default for MotionSettings {
    fn default() -> Self {
        Self {
            boundary_margin: 8.0,
            max_velocity: 40.0,
            base_friction: 0.97,
            high_speed_friction: 0.94,
            bounce_damping: 0.45,
            bounce_friction_boost: 0.85,
            min_velocity: 0.15,
            momentum_threshold: 1.5,
            velocity_sample_count: 4,
            velocity_max_age: 80.0,
            velocity_min_dt: 8.0,
            velocity_max_dt: 100.0,
            drag_threshold: 2.0,
            edge_threshold: 20.0,
            min_panel_size: 220.0,
            max_panel_size: 1200.0,
            idle_panel_scale: 1.0,
            drag_panel_scale: 1.018,
            movement_mode: MovementMode::Default,
        }
    }
}

impl MotionSettings {
    /// Overwrites the momentum tunables with the named preset.
    pub fn apply_preset(&mut self, mode: MovementMode) {
        let (max_velocity, base, high, bounce, boost, threshold) = match mode {
            MovementMode::Sticky => (0.0, 0.5, 0.5, 0.0, 0.0, 9999.0),
            MovementMode::Default => (40.0, 0.97, 0.94, 0.45, 0.85, 1.5),
            MovementMode::Bouncy => (60.0, 0.985, 0.96, 0.7, 0.95, 0.5),
        };
        self.max_velocity = max_velocity;
        self.base_friction = base;
        self.high_speed_friction = high;
        self.bounce_damping = bounce;
        self.bounce_friction_boost = boost;
        self.momentum_threshold = threshold;
        self.movement_mode = mode;
    }
}

/// Dot lattice displacement and spring tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldSettings {
    pub grid_enabled: bool,
    /// Lattice pitch in pixels
    pub grid_scale: f64,
    /// Panels stop pushing dots beyond this distance
    pub max_influence_distance: f64,
    pub push_strength: f64,
    pub spring_stiffness: f64,
    pub spring_damping: f64,
    /// Dots farther than this from every panel are not drawn
    pub render_distance: f64,
    /// Radius of the dot brightness falloff around panels
    pub brightness_radius: f64,
    /// Per-frame easing of dot size toward its target
    pub size_easing: f64,
    pub hover_radius: f64,
    pub hover_strength: f64,
    pub background: BackgroundType,
}

impl Default for FieldSettings {
    fn default() -> Self {
        Self {
            grid_enabled: true,
            grid_scale: 40.0,
            max_influence_distance: 400.0,
            push_strength: 25.0,
            spring_stiffness: 0.08,
            spring_damping: 0.75,
            render_distance: 500.0,
            brightness_radius: 110.0,
            size_easing: 0.15,
            hover_radius: 120.0,
            hover_strength: 0.6,
            background: BackgroundType::Grid,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PulseSettings {
    pub ripple_enabled: bool,
    /// Wave front speed in pixels per second
    pub speed: f64,
    pub width: f64,
    /// Pulse lifetime in ms
    pub duration: f64,
    /// Dense sub-grid cells fainter than this are skipped
    pub dense_threshold: f64,
}

impl Default for PulseSettings {
    fn default() -> Self {
        Self {
            ripple_enabled: true,
            speed: 400.0,
            width: 80.0,
            duration: 2000.0,
            dense_threshold: 0.05,
        }
    }
}

/// Particle burst tunables. Speeds are pixels per frame, lifespans ms.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ParticleSettings {
    pub enabled: bool,
    pub count: usize,
    pub speed: f64,
    pub gravity: f64,
    pub friction: f64,
    pub lifespan: f64,
    pub bouncy_count: usize,
    pub bouncy_speed: f64,
    pub bouncy_gravity: f64,
    pub bouncy_friction: f64,
    pub bouncy_lifespan: f64,
    pub bounce_damping: f64,
    pub surface_friction: f64,
    pub collision_damping: f64,
    /// Fraction of the panel's per-frame velocity a hit particle inherits
    pub momentum_transfer: f64,
    /// Panel collision pad as a multiple of particle size
    pub pad_factor: f64,
    /// Top-edge hits slower than this come to rest on the panel
    pub rest_speed: f64,
    /// Panels rising faster than this never hold resting particles
    pub rest_panel_vy: f64,
    pub sound_speed_threshold: f64,
    pub sound_interval: f64,
    /// Particles this far outside the viewport are culled
    pub cull_margin: f64,
    pub connect_burst_intensity: f64,
}

impl Default for ParticleSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            count: 12,
            speed: 8.0,
            gravity: 0.15,
            friction: 0.98,
            lifespan: 1200.0,
            bouncy_count: 16,
            bouncy_speed: 6.0,
            bouncy_gravity: 0.12,
            bouncy_friction: 0.99,
            bouncy_lifespan: 2500.0,
            bounce_damping: 0.7,
            surface_friction: 0.6,
            collision_damping: 0.8,
            momentum_transfer: 0.8,
            pad_factor: 1.0,
            rest_speed: 1.5,
            rest_panel_vy: -5.0,
            sound_speed_threshold: 2.5,
            sound_interval: 20.0,
            cull_margin: 200.0,
            connect_burst_intensity: 0.6,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionSettings {
    pub line_width: f64,
    pub line_alpha: f64,
    pub endpoint_radius: f64,
    /// Distance between traveling flow pulses along a path
    pub flow_spacing: f64,
    pub flow_width: f64,
    /// Flow travel in pixels per ms
    pub flow_speed: f64,
    /// Paths shorter than this get no flow animation
    pub flow_min_length: f64,
    pub samples_per_segment: usize,
    /// Cut retraction duration in ms
    pub cut_duration: f64,
    /// Pointer travel before an empty-canvas drag becomes a slice
    pub slice_threshold: f64,
    /// Slice points older than this (ms) are dropped
    pub trail_lifetime: f64,
    /// Slice points older than this (ms) are not drawn
    pub trail_render_window: f64,
    pub tick_interval: f64,
    pub tick_radius: f64,
    pub tick_step: f64,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            line_width: 2.0,
            line_alpha: 0.7,
            endpoint_radius: 4.0,
            flow_spacing: 100.0,
            flow_width: 60.0,
            flow_speed: 0.12,
            flow_min_length: 20.0,
            samples_per_segment: 8,
            cut_duration: 600.0,
            slice_threshold: 10.0,
            trail_lifetime: 300.0,
            trail_render_window: 200.0,
            tick_interval: 25.0,
            tick_radius: 15.0,
            tick_step: 10.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SoundSettings {
    pub enabled: bool,
    pub volume: f64,
    pub min_volume: f64,
    pub max_volume: f64,
}

impl Default for SoundSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            volume: 0.7,
            min_volume: 0.015,
            max_volume: 0.15,
        }
    }
}

/// Colors are `#rrggbb` strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppearanceSettings {
    pub grid_line_color: String,
    pub grid_line_opacity: f64,
    pub dot_color: String,
    pub dot_opacity: f64,
    pub particle_color: String,
    pub particle_opacity: f64,
    pub connection_color: String,
    pub slice_trail_color: String,
}

impl Default for AppearanceSettings {
    fn default() -> Self {
        Self {
            grid_line_color: "#a0a0a0".to_string(),
            grid_line_opacity: 1.0,
            dot_color: "#a0a0a0".to_string(),
            dot_opacity: 1.0,
            particle_color: "#2563eb".to_string(),
            particle_opacity: 1.0,
            connection_color: "#3B82F6".to_string(),
            slice_trail_color: "#b4b4b4".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternSettings {
    pub size: f64,
    pub spacing: f64,
    pub color: String,
    pub glow: bool,
    pub shape: DotShape,
    pub glyph: String,
    pub panel_range: f64,
    pub pointer_range: f64,
}

impl Default for PatternSettings {
    fn default() -> Self {
        Self {
            size: 1.0,
            spacing: 20.0,
            color: "#37352f".to_string(),
            glow: false,
            shape: DotShape::Circle,
            glyph: "·".to_string(),
            panel_range: 300.0,
            pointer_range: 150.0,
        }
    }
}

/// Every tunable the canvas core reads. Consumed read-only each frame.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CanvasSettings {
    pub motion: MotionSettings,
    pub field: FieldSettings,
    pub pulse: PulseSettings,
    pub particles: ParticleSettings,
    pub connections: ConnectionSettings,
    pub sound: SoundSettings,
    pub appearance: AppearanceSettings,
    pub pattern: PatternSettings,
}

impl CanvasSettings {
    pub const SETTINGS_FILE: &'static str = "canvas.toml";

    pub fn from_toml_str(contents: &str) -> Result<Self, SettingsError> {
        Ok(toml::from_str(contents)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Loads settings from `path`, or returns defaults if the file doesn't exist.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Settings as seen by the background with `live_panels` on screen.
    /// Crowded canvases get a coarser, fainter grid.
    pub fn effective(&self, live_panels: usize) -> CanvasSettings {
        let mut effective = self.clone();
        if live_panels > CROWD_PANEL_THRESHOLD {
            effective.field.grid_scale = (self.field.grid_scale * 1.5).max(80.0);
            effective.appearance.grid_line_opacity *= 0.7;
            effective.appearance.dot_opacity *= 0.7;
        }
        effective
    }
}
