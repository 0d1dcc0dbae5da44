//! End-to-end behaviour of the canvas core: momentum, bounces, routing,
//! connection bookkeeping, particles and slicing.

use dotgrid_canvas::connections::routing::route_l_path;
use dotgrid_canvas::connections::{ConnectionGraph, Slicer};
use dotgrid_canvas::feedback::SilentFeedback;
use dotgrid_canvas::field::{FieldGrid, GridCoord};
use dotgrid_canvas::motion::MotionPhase;
use dotgrid_canvas::particles::ParticleSystem;
use dotgrid_canvas::settings::ConnectionSettings;
use dotgrid_canvas::{
    Canvas, CanvasEvent, CanvasSettings, EventQueue, MotionEngine, Panel, PanelId, PressTarget,
    Vec2,
};
use proptest::prelude::*;

const FRAME_MS: f64 = 16.0;

fn viewport() -> Vec2 {
    Vec2::new(1000.0, 800.0)
}

// ── Scenarios ───────────────────────────────────────────────────────────

#[test]
fn level_panels_route_as_one_horizontal_run() {
    let path = route_l_path(Vec2::new(100.0, 100.0), Vec2::new(500.0, 100.0), 40.0);
    let row = path[0].row;
    assert!(path.iter().all(|c| c.row == row));
    assert_eq!(path.first().map(|c| c.to_point(40.0)), Some(Vec2::new(120.0, 120.0)));
    assert_eq!(path.last().map(|c| c.to_point(40.0)), Some(Vec2::new(520.0, 120.0)));
}

#[test]
fn flung_panel_bounces_off_the_right_edge() {
    let mut canvas = Canvas::with_seed(viewport(), CanvasSettings::default(), 5);
    let id = canvas.spawn_panel(Vec2::new(600.0, 400.0));
    let width = canvas.panel(id).unwrap().size.x;

    let mut pointer = Vec2::new(600.0, 400.0);
    canvas.pointer_down(pointer, 0.0, PressTarget::Surface);
    for frame in 1..=4 {
        pointer.x += 40.0;
        canvas.pointer_move(pointer, frame as f64 * FRAME_MS, false);
    }
    canvas.pointer_up(70.0);
    assert_eq!(canvas.motion().phase(id), MotionPhase::Momentum);
    canvas.drain_events();

    let mut now = 70.0;
    let mut bounce = None;
    for _ in 0..20 {
        now += FRAME_MS;
        canvas.frame(now);
        let events = canvas.drain_events();
        let bounces: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                CanvasEvent::Bounce { point, impact, .. } => Some((*point, *impact)),
                _ => None,
            })
            .collect();
        if !bounces.is_empty() {
            assert_eq!(bounces.len(), 1);
            bounce = Some(bounces[0]);
            break;
        }
    }

    let (point, impact) = bounce.expect("panel never reached the wall");
    let settled_x = 1000.0 - width - 8.0;
    let panel = canvas.panel(id).unwrap();
    assert_eq!(panel.position.x, settled_x);
    assert_eq!(point.x, panel.position.x + width);
    assert!(impact > 0.0 && impact <= 1.0);
    assert!(canvas.motion().velocity(id).unwrap().x < 0.0);
    assert_eq!(canvas.pulses().len(), 1);
}

#[test]
fn slicing_one_connection_cuts_and_retracts_it() {
    let mut canvas = Canvas::with_seed(viewport(), CanvasSettings::default(), 9);
    let a = canvas.spawn_panel(Vec2::new(200.0, 200.0));
    let b = canvas.spawn_panel(Vec2::new(700.0, 200.0));
    canvas.connect(a, b).unwrap();
    canvas.frame(FRAME_MS);
    canvas.drain_events();

    let mut now = FRAME_MS;
    let mut cut_at = None;
    canvas.pointer_down(Vec2::new(450.0, 50.0), now, PressTarget::Surface);
    for step in 1..=10 {
        now += FRAME_MS;
        canvas.pointer_move(Vec2::new(450.0, 50.0 + step as f64 * 30.0), now, false);
        if cut_at.is_none() && canvas.connections().is_empty() {
            cut_at = Some(now);
        }
    }
    canvas.pointer_up(now);

    let cut_at = cut_at.expect("stroke never crossed the connection");
    assert_eq!(canvas.cuts().len(), 1);
    assert_eq!(canvas.cuts()[0].time, cut_at);
    let events = canvas.drain_events();
    assert_eq!(
        events
            .iter()
            .filter(|e| matches!(e, CanvasEvent::ConnectionCut { .. }))
            .count(),
        1
    );

    let mut completions = 0;
    while now < cut_at + 800.0 {
        now += FRAME_MS;
        canvas.frame(now);
        completions += canvas
            .drain_events()
            .iter()
            .filter(|e| matches!(e, CanvasEvent::CutAnimationComplete(_)))
            .count();
    }
    assert_eq!(completions, 1);
    assert!(canvas.cuts().is_empty());
}

#[test]
fn dropping_on_a_linked_panel_creates_nothing() {
    let mut canvas = Canvas::with_seed(viewport(), CanvasSettings::default(), 2);
    let a = canvas.spawn_panel(Vec2::new(200.0, 200.0));
    let b = canvas.spawn_panel(Vec2::new(700.0, 200.0));
    canvas.connect(b, a).unwrap();

    canvas.pointer_down(Vec2::new(298.0, 298.0), 0.0, PressTarget::Surface);
    canvas.pointer_move(Vec2::new(700.0, 200.0), 16.0, false);
    assert_eq!(canvas.connection_drag().and_then(|d| d.target), None);
    canvas.pointer_up(32.0);
    assert_eq!(canvas.connections().len(), 1);
    assert_eq!(canvas.panels().len(), 2);
}

// ── Properties ──────────────────────────────────────────────────────────

proptest! {
    #[test]
    fn momentum_always_settles(vx in -60.0f64..60.0, vy in -60.0f64..60.0, x in 8.0f64..772.0, y in 8.0f64..572.0) {
        let settings = CanvasSettings::default();
        let min_velocity = settings.motion.min_velocity;
        let mut engine = MotionEngine::new(viewport());
        let mut events = EventQueue::new();
        let id = PanelId(1);
        engine.launch(id, Vec2::new(x, y), Vec2::new(220.0, 220.0), Vec2::new(vx, vy), &settings.motion);

        let mut position = Vec2::new(x, y);
        let mut last_step = Vec2::zeros();
        let mut bounced_last = false;
        let mut frames = 0;
        while let Some(velocity) = engine.velocity(id) {
            prop_assert!(velocity.norm() <= settings.motion.max_velocity + 1e-9);
            engine.tick(&[], &settings, &mut SilentFeedback, &mut events);
            bounced_last = false;
            for event in events.drain() {
                match event {
                    CanvasEvent::PositionChanged { position: next, .. } => {
                        last_step = next - position;
                        position = next;
                    }
                    CanvasEvent::Bounce { .. } => bounced_last = true,
                    _ => {}
                }
            }
            if let Some(remaining) = engine.velocity(id) {
                prop_assert!(remaining.norm() > min_velocity);
            }
            frames += 1;
            prop_assert!(frames < 2000);
        }

        prop_assert_eq!(engine.phase(id), MotionPhase::Idle);
        prop_assert!(!engine.is_animating());
        // A bounce on the final frame moves by the pre-bounce velocity.
        if frames > 0 && !bounced_last {
            prop_assert!(last_step.norm() <= min_velocity + 1e-9);
        }
    }

    #[test]
    fn bounces_never_gain_energy(speed in 1.0f64..40.0, damping in 0.0f64..1.0) {
        let mut settings = CanvasSettings::default();
        settings.motion.bounce_damping = damping;
        let mut engine = MotionEngine::new(viewport());
        let mut events = EventQueue::new();
        let id = PanelId(1);
        let start_x = 1000.0 - 220.0 - 8.0 - 0.5;
        engine.launch(id, Vec2::new(start_x, 300.0), Vec2::new(220.0, 220.0), Vec2::new(speed, 0.0), &settings.motion);
        engine.tick(&[], &settings, &mut SilentFeedback, &mut events);

        prop_assert!(events.iter().any(|e| matches!(e, CanvasEvent::Bounce { .. })), "expected a Bounce event");
        if let Some(outgoing) = engine.velocity(id) {
            prop_assert!(outgoing.x <= 0.0);
            prop_assert!(outgoing.x.abs() <= speed * damping + 1e-9);
        }
    }

    #[test]
    fn at_most_one_link_per_pair(ops in prop::collection::vec((0u32..5, 0u32..5, any::<bool>()), 0..60)) {
        let mut graph = ConnectionGraph::new();
        for (a, b, connect) in ops {
            if connect {
                let _ = graph.connect(PanelId(a), PanelId(b));
            } else {
                let id = graph
                    .iter()
                    .find(|c| (c.from == PanelId(a) && c.to == PanelId(b)) || (c.from == PanelId(b) && c.to == PanelId(a)))
                    .map(|c| c.id);
                if let Some(id) = id {
                    graph.disconnect(id);
                }
            }
            for a in 0..5 {
                for b in a..5 {
                    let links = graph
                        .iter()
                        .filter(|c| (c.from == PanelId(a) && c.to == PanelId(b)) || (c.from == PanelId(b) && c.to == PanelId(a)))
                        .count();
                    let allowed = if a == b { 0 } else { 1 };
                    prop_assert!(links <= allowed);
                }
            }
        }
    }

    #[test]
    fn routing_is_a_deterministic_l(
        fx in -200.0f64..1200.0, fy in -200.0f64..1200.0,
        tx in -200.0f64..1200.0, ty in -200.0f64..1200.0,
        pitch in prop::sample::select(vec![20.0f64, 40.0, 80.0]),
    ) {
        let from = Vec2::new(fx, fy);
        let to = Vec2::new(tx, ty);
        let path = route_l_path(from, to, pitch);
        prop_assert_eq!(&path, &route_l_path(from, to, pitch));
        prop_assert_eq!(path.first().copied(), Some(GridCoord::snap(from, pitch)));
        prop_assert_eq!(path.last().copied(), Some(GridCoord::snap(to, pitch)));

        let mut turned = false;
        for pair in path.windows(2) {
            let (dc, dr) = (pair[1].col - pair[0].col, pair[1].row - pair[0].row);
            prop_assert_eq!(dc.abs() + dr.abs(), 1);
            if dr != 0 {
                turned = true;
            } else {
                prop_assert!(!turned, "horizontal step after the turn");
            }
        }
    }

    #[test]
    fn particles_are_culled_when_spent(
        seed in any::<u64>(),
        ox in 0.0f64..1000.0, oy in 0.0f64..800.0,
        intensity in 0.0f64..1.0,
    ) {
        let settings = CanvasSettings::default();
        let mut system = ParticleSystem::with_seed(seed);
        let panels = vec![Panel::new(PanelId(1), Vec2::new(300.0, 500.0), Vec2::new(220.0, 220.0))];
        system.spawn_burst(Vec2::new(ox, oy), intensity, &settings.particles);

        for frame in 1..=200 {
            system.step(
                FRAME_MS,
                frame as f64 * FRAME_MS,
                &panels,
                viewport(),
                &settings.particles,
                &settings.sound,
                &mut SilentFeedback,
            );
            for p in system.directional().iter().chain(system.bouncy()) {
                prop_assert!(p.life > 0.0);
                prop_assert!(p.life <= p.max_life);
            }
        }
        prop_assert!(system.directional().is_empty());
    }

    #[test]
    fn strokes_that_miss_cut_nothing(points in prop::collection::vec((0.0f64..600.0, 300.0f64..600.0), 2..40)) {
        let size = Vec2::new(80.0, 80.0);
        let panels = vec![
            Panel::new(PanelId(1), Vec2::new(40.0, 40.0), size),
            Panel::new(PanelId(2), Vec2::new(360.0, 40.0), size),
        ];
        let grid = FieldGrid::new(Vec2::new(600.0, 600.0), 40.0);
        let settings = ConnectionSettings::default();
        let mut graph = ConnectionGraph::new();
        graph.connect(PanelId(1), PanelId(2)).unwrap();
        let mut events = EventQueue::new();
        let mut slicer = Slicer::new();

        slicer.begin(Vec2::new(points[0].0, points[0].1));
        for (i, &(x, y)) in points.iter().enumerate().skip(1) {
            let cut = slicer.update(Vec2::new(x, y), i as f64 * FRAME_MS, &mut graph, &panels, &grid, &settings, &mut events);
            prop_assert!(cut.is_none());
        }
        prop_assert_eq!(graph.len(), 1);
        prop_assert!(events.is_empty());
    }
}
