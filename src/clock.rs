use std::collections::VecDeque;

/// Frames kept for the rolling frame-time average.
const FRAME_HISTORY: usize = 60;

/// Nominal frame length in ms, used for the first frame.
pub const NOMINAL_FRAME_MS: f64 = 1000.0 / 60.0;

/// Per-frame clock driven by host timestamps in milliseconds.
#[derive(Debug, Clone)]
pub struct FrameClock {
    last: Option<f64>,
    delta: f64,
    frame_times: VecDeque<f64>,
    avg_frame_time: f64,
    frames: u64,
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameClock {
    pub fn new() -> Self {
        Self {
            last: None,
            delta: 0.0,
            frame_times: VecDeque::with_capacity(FRAME_HISTORY),
            avg_frame_time: NOMINAL_FRAME_MS,
            frames: 0,
        }
    }

    /// Advances to `now` and returns the elapsed milliseconds.
    /// Timestamps that go backwards count as a zero-length frame.
    pub fn tick(&mut self, now: f64) -> f64 {
        let delta = match self.last {
            Some(last) => (now - last).max(0.0),
            None => NOMINAL_FRAME_MS,
        };
        self.last = Some(now);
        self.delta = delta;
        self.frames += 1;

        self.frame_times.push_back(delta);
        if self.frame_times.len() > FRAME_HISTORY {
            self.frame_times.pop_front();
        }
        self.avg_frame_time = self.frame_times.iter().sum::<f64>() / self.frame_times.len() as f64;
        delta
    }

    pub fn delta(&self) -> f64 {
        self.delta
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn avg_frame_time(&self) -> f64 {
        self.avg_frame_time
    }

    pub fn fps(&self) -> f64 {
        if self.avg_frame_time > 0.0 {
            1000.0 / self.avg_frame_time
        } else {
            0.0
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }
}
