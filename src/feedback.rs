use crate::settings::SoundSettings;
use log::warn;
use rand::Rng;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CueKind {
    /// Panel hit a viewport edge
    Bounce,
    /// Bouncy particle hit a panel
    Collision,
    Connect,
    /// Connection drag moved onto a new target
    Hover,
    /// Connection drag crossed a grid intersection
    Tick,
    Cut,
    Spawn,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cue {
    pub kind: CueKind,
    pub volume: f64,
    pub pitch: Option<f64>,
}

impl Cue {
    pub fn new(kind: CueKind, volume: f64) -> Self {
        Self {
            kind,
            volume,
            pitch: None,
        }
    }

    pub fn with_pitch(mut self, pitch: f64) -> Self {
        self.pitch = Some(pitch);
        self
    }
}

#[derive(Debug, Error)]
pub enum FeedbackError {
    #[error("audio output unavailable")]
    Unavailable,
    #[error("playback failed: {0}")]
    Playback(String),
}

/// Fire-and-forget sound output supplied by the host.
pub trait AudioFeedback {
    fn play(&mut self, cue: Cue) -> Result<(), FeedbackError>;
}

/// Plays nothing.
#[derive(Debug, Default)]
pub struct SilentFeedback;

impl AudioFeedback for SilentFeedback {
    fn play(&mut self, _cue: Cue) -> Result<(), FeedbackError> {
        Ok(())
    }
}

/// Keeps every cue it is asked to play.
#[derive(Debug, Default)]
pub struct RecordingFeedback {
    pub cues: Vec<Cue>,
}

impl RecordingFeedback {
    pub fn count(&self, kind: CueKind) -> usize {
        self.cues.iter().filter(|cue| cue.kind == kind).count()
    }
}

impl AudioFeedback for RecordingFeedback {
    fn play(&mut self, cue: Cue) -> Result<(), FeedbackError> {
        self.cues.push(cue);
        Ok(())
    }
}

/// Plays `cue` if sound is enabled. Failures are logged and dropped.
pub fn emit(feedback: &mut dyn AudioFeedback, sound: &SoundSettings, cue: Cue) {
    if !sound.enabled {
        return;
    }
    if let Err(err) = feedback.play(cue) {
        warn!("dropping {:?} cue: {}", cue.kind, err);
    }
}

/// Cue whose volume and pitch wander by up to `variation` around the base.
pub fn randomized_cue<R: Rng>(
    rng: &mut R,
    kind: CueKind,
    volume: f64,
    pitch: f64,
    variation: f64,
) -> Cue {
    let volume = volume * (1.0 + rng.gen_range(-variation..=variation));
    let pitch = pitch + rng.gen_range(-variation..=variation);
    Cue::new(kind, volume.max(0.0)).with_pitch(pitch)
}

/// Lets an event through at most once per `min_interval` milliseconds.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    min_interval: f64,
    last: Option<f64>,
}

impl RateLimiter {
    pub fn new(min_interval: f64) -> Self {
        Self {
            min_interval,
            last: None,
        }
    }

    pub fn set_interval(&mut self, min_interval: f64) {
        self.min_interval = min_interval;
    }

    /// Returns true and arms the limiter if enough time has passed.
    pub fn try_fire(&mut self, now: f64) -> bool {
        match self.last {
            Some(last) if now - last <= self.min_interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}
