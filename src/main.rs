use dotgrid_canvas::feedback::{AudioFeedback, Cue, FeedbackError};
use dotgrid_canvas::{Canvas, CanvasEvent, CanvasSettings, PressTarget, Vec2};
use log::{debug, info, warn};
use std::time::{Duration, Instant};

const VIEWPORT: (f64, f64) = (1280.0, 800.0);
const FRAME_MS: f64 = 1000.0 / 60.0;

/// Logs cues instead of playing them.
struct LoggedFeedback;

impl AudioFeedback for LoggedFeedback {
    fn play(&mut self, cue: Cue) -> Result<(), FeedbackError> {
        debug!("cue {:?} volume {:.3}", cue.kind, cue.volume);
        Ok(())
    }
}

struct Session {
    canvas: Canvas,
    now: f64,
    frame_count: u32,
    events: Vec<CanvasEvent>,
    last_report: Instant,
}

impl Session {
    fn new(settings: CanvasSettings) -> Self {
        Self {
            canvas: Canvas::new(
                Vec2::new(VIEWPORT.0, VIEWPORT.1),
                settings,
                Box::new(LoggedFeedback),
            ),
            now: 0.0,
            frame_count: 0,
            events: Vec::new(),
            last_report: Instant::now(),
        }
    }

    fn run_frames(&mut self, frames: u32) {
        for _ in 0..frames {
            self.now += FRAME_MS;
            let list = self.canvas.frame(self.now);
            self.events.extend(self.canvas.drain_events());
            self.frame_count += 1;

            let elapsed = self.last_report.elapsed();
            if elapsed >= Duration::from_millis(500) {
                let clock = self.canvas.renderer().clock();
                info!(
                    "{} frames, simulated {:.1} fps, {} particles, {} grid lines",
                    self.frame_count,
                    clock.fps(),
                    list.particles.len(),
                    list.grid_lines.len()
                );
                self.last_report = Instant::now();
            }
        }
    }

    /// Drags with a steady per-frame step, then releases.
    fn fling(&mut self, from: Vec2, step: Vec2, frames: u32) {
        self.canvas.pointer_down(from, self.now, PressTarget::Surface);
        let mut pointer = from;
        for _ in 0..frames {
            pointer += step;
            self.now += FRAME_MS;
            self.canvas.pointer_move(pointer, self.now, false);
            self.canvas.frame(self.now);
        }
        self.canvas.pointer_up(self.now);
        self.events.extend(self.canvas.drain_events());
    }

    fn stroke(&mut self, from: Vec2, to: Vec2, steps: u32) {
        self.canvas.pointer_down(from, self.now, PressTarget::Surface);
        for i in 1..=steps {
            self.now += FRAME_MS;
            let t = i as f64 / steps as f64;
            self.canvas.pointer_move(from + (to - from) * t, self.now, false);
            self.canvas.frame(self.now);
        }
        self.canvas.pointer_up(self.now);
        self.events.extend(self.canvas.drain_events());
    }
}

fn main() {
    env_logger::init();

    let settings = match CanvasSettings::load_or_default(CanvasSettings::SETTINGS_FILE) {
        Ok(settings) => settings,
        Err(err) => {
            warn!("{}: {}, using defaults", CanvasSettings::SETTINGS_FILE, err);
            CanvasSettings::default()
        }
    };
    let mut session = Session::new(settings);

    let left = session.canvas.spawn_panel(Vec2::new(320.0, 300.0));
    let right = session.canvas.spawn_panel(Vec2::new(900.0, 300.0));
    if let Err(err) = session.canvas.connect(left, right) {
        warn!("{}", err);
    }
    session.run_frames(30);

    // handle drag into empty space spawns a third panel
    let handle = session
        .canvas
        .panel(right)
        .map(|p| Vec2::new(p.rect().right() - 12.0, p.rect().bottom() - 12.0));
    if let Some(handle) = handle {
        session.stroke(handle, Vec2::new(900.0, 650.0), 12);
    }
    session.run_frames(30);

    // throw the left panel at the wall
    let grab = session.canvas.panel(left).map(|p| p.center());
    if let Some(grab) = grab {
        session.fling(grab, Vec2::new(-30.0, 8.0), 6);
    }
    session.run_frames(120);

    // slice across the first connection
    session.stroke(Vec2::new(600.0, 150.0), Vec2::new(620.0, 450.0), 10);
    session.run_frames(60);

    let bounces = session
        .events
        .iter()
        .filter(|e| matches!(e, CanvasEvent::Bounce { .. }))
        .count();
    let cuts = session
        .events
        .iter()
        .filter(|e| matches!(e, CanvasEvent::ConnectionCut { .. }))
        .count();
    info!(
        "session: {} panels, {} connections, {} bounces, {} cuts, {} events",
        session.canvas.panels().len(),
        session.canvas.connections().len(),
        bounces,
        cuts,
        session.events.len()
    );
}
