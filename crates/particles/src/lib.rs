//! Bounded-lifetime confetti simulation and the per-frame loop that drives it.
//!
//! Each [`ParticleEngine::trigger`] call spawns a fresh, independent
//! [`ParticleSet`]; overlapping bursts share nothing but the drawing
//! surface, which is cleared and fully redrawn every frame.

use std::{sync::Arc, time::Duration};

use rand::Rng;
use tokio::{sync::Mutex, task::JoinHandle, time};
use tracing::debug;

/// Hard cap on frames per burst; bounds worst-case animation time
/// regardless of the physics parameters.
pub const MAX_FRAMES: u32 = 400;

/// Default delay between simulation frames (~60 fps).
pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(16);

const FIRST_SUCCESS_COLORS: [&str; 7] = [
    "#ff6b6b", "#4ecdc4", "#45b7d1", "#96ceb4", "#ffeaa7", "#dda0dd", "#98d8c8",
];
const RAINBOW_COLORS: [&str; 8] = [
    "#ff0080", "#00ffff", "#ff8000", "#8000ff", "#00ff80", "#ffff00", "#ff4080", "#40ff80",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Rect,
    Circle,
}

/// Which transition is being celebrated; selects the spawn profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BurstKind {
    FirstSuccess,
    SecondSuccess,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone)]
pub struct Particle {
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub color: &'static str,
    pub size: f32,
    pub rotation: f32,
    pub rotation_speed: f32,
    pub shape: Shape,
}

struct SpawnProfile {
    count: usize,
    /// Scatter start positions across a full viewport height above the top
    /// edge instead of dropping everything from just above it.
    scatter_above: bool,
    vx_spread: f32,
    vy_min: f32,
    vy_max: f32,
    size_min: f32,
    size_max: f32,
    rotation_spread: f32,
    gravity: f32,
    damping: f32,
    mixed_shapes: bool,
    palette: &'static [&'static str],
}

impl BurstKind {
    fn profile(self) -> SpawnProfile {
        match self {
            BurstKind::FirstSuccess => SpawnProfile {
                count: 100,
                scatter_above: false,
                vx_spread: 6.0,
                vy_min: 2.0,
                vy_max: 5.0,
                size_min: 4.0,
                size_max: 12.0,
                rotation_spread: 10.0,
                gravity: 0.1,
                damping: 1.0,
                mixed_shapes: false,
                palette: &FIRST_SUCCESS_COLORS,
            },
            // Denser and faster for the celebratory endings.
            BurstKind::SecondSuccess | BurstKind::Completed => SpawnProfile {
                count: 200,
                scatter_above: true,
                vx_spread: 8.0,
                vy_min: 3.0,
                vy_max: 7.0,
                size_min: 6.0,
                size_max: 16.0,
                rotation_spread: 15.0,
                gravity: 0.15,
                damping: 0.99,
                mixed_shapes: true,
                palette: &RAINBOW_COLORS,
            },
        }
    }
}

/// Shared drawing surface. The engine clears and fully redraws it each
/// frame; no other component touches it while a burst runs.
pub trait Surface: Send {
    fn clear(&mut self);
    fn fill_rect(&mut self, x: f32, y: f32, width: f32, height: f32, rotation: f32, color: &str);
    fn fill_circle(&mut self, x: f32, y: f32, radius: f32, color: &str);
}

/// Discards every draw call; used when no renderer is attached.
pub struct NullSurface;

impl Surface for NullSurface {
    fn clear(&mut self) {}
    fn fill_rect(&mut self, _: f32, _: f32, _: f32, _: f32, _: f32, _: &str) {}
    fn fill_circle(&mut self, _: f32, _: f32, _: f32, _: &str) {}
}

/// One independent burst. Never shared across concurrent animations; a new
/// trigger always starts a fresh set.
pub struct ParticleSet {
    particles: Vec<Particle>,
    viewport: Viewport,
    gravity: f32,
    damping: f32,
    frames: u32,
}

impl ParticleSet {
    pub fn spawn(kind: BurstKind, viewport: Viewport, rng: &mut impl Rng) -> Self {
        let profile = kind.profile();
        let particles = (0..profile.count)
            .map(|_| {
                let y = if profile.scatter_above {
                    rng.gen::<f32>() * viewport.height - viewport.height
                } else {
                    -10.0
                };
                Particle {
                    x: rng.gen::<f32>() * viewport.width,
                    y,
                    vx: (rng.gen::<f32>() - 0.5) * profile.vx_spread,
                    vy: rng.gen_range(profile.vy_min..profile.vy_max),
                    color: profile.palette[rng.gen_range(0..profile.palette.len())],
                    size: rng.gen_range(profile.size_min..profile.size_max),
                    rotation: rng.gen::<f32>() * 360.0,
                    rotation_speed: (rng.gen::<f32>() - 0.5) * profile.rotation_spread,
                    shape: if profile.mixed_shapes && rng.gen_bool(0.5) {
                        Shape::Circle
                    } else {
                        Shape::Rect
                    },
                }
            })
            .collect();
        Self {
            particles,
            viewport,
            gravity: profile.gravity,
            damping: profile.damping,
            frames: 0,
        }
    }

    /// Advance one frame: integrate positions, apply gravity and damping,
    /// spin, then drop every piece that has fallen past the viewport by
    /// more than its own size.
    pub fn step(&mut self) {
        for particle in &mut self.particles {
            particle.x += particle.vx;
            particle.y += particle.vy;
            particle.vy += self.gravity;
            particle.vx *= self.damping;
            particle.rotation += particle.rotation_speed;
        }
        let floor = self.viewport.height;
        self.particles.retain(|p| p.y <= floor + p.size);
        self.frames += 1;
    }

    pub fn render(&self, surface: &mut dyn Surface) {
        surface.clear();
        for p in &self.particles {
            match p.shape {
                Shape::Rect => surface.fill_rect(
                    p.x - p.size / 2.0,
                    p.y - p.size / 4.0,
                    p.size,
                    p.size / 2.0,
                    p.rotation,
                    p.color,
                ),
                Shape::Circle => surface.fill_circle(p.x, p.y, p.size / 2.0, p.color),
            }
        }
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub fn frames(&self) -> u32 {
        self.frames
    }

    /// Finished when drained or frame-capped, whichever comes first.
    pub fn is_finished(&self) -> bool {
        self.particles.is_empty() || self.frames >= MAX_FRAMES
    }

    #[cfg(test)]
    fn with_physics(particles: Vec<Particle>, viewport: Viewport, gravity: f32) -> Self {
        Self {
            particles,
            viewport,
            gravity,
            damping: 1.0,
            frames: 0,
        }
    }
}

/// Owns the drawing surface and runs one frame loop per triggered burst.
#[derive(Clone)]
pub struct ParticleEngine {
    surface: Arc<Mutex<Box<dyn Surface>>>,
    viewport: Viewport,
    frame_interval: Duration,
}

impl ParticleEngine {
    pub fn new(surface: Box<dyn Surface>, viewport: Viewport) -> Self {
        Self {
            surface: Arc::new(Mutex::new(surface)),
            viewport,
            frame_interval: DEFAULT_FRAME_INTERVAL,
        }
    }

    /// Engine with a discarding surface, for headless front ends and tests.
    pub fn headless(viewport: Viewport) -> Self {
        Self::new(Box::new(NullSurface), viewport)
    }

    pub fn with_frame_interval(mut self, interval: Duration) -> Self {
        self.frame_interval = interval;
        self
    }

    /// Start an independent burst. Re-triggering while another burst runs
    /// is fine; concurrent sets only contend on the surface lock.
    pub fn trigger(&self, kind: BurstKind) -> JoinHandle<()> {
        let surface = Arc::clone(&self.surface);
        let viewport = self.viewport;
        let interval = self.frame_interval;
        tokio::spawn(async move {
            let mut set = ParticleSet::spawn(kind, viewport, &mut rand::thread_rng());
            debug!(?kind, particles = set.len(), "particle burst started");
            while !set.is_finished() {
                set.step();
                set.render(&mut **surface.lock().await);
                time::sleep(interval).await;
            }
            surface.lock().await.clear();
            debug!(?kind, frames = set.frames(), "particle burst finished");
        })
    }
}
