use crate::chat::Message;
use crate::config::WorldConfig;
use crate::world::clock::Clock;
use crate::world::World;
use tokio::sync::mpsc;
use tracing::warn;

const DEFAULT_MAX_FPS: f64 = 60.0;

/// Caps the tick rate and absorbs stalls.
///
/// The first call always advances. After that a tick runs only when more
/// than `1000 / max_fps` ms have elapsed since the last one; elapsed time is
/// clamped to `max_elapsed_ms`, and the remainder carries into the next
/// frame so the average rate stays at the cap.
///
/// A non-positive `max_fps` falls back to 60, and `max_elapsed_ms` is raised
/// to at least two frame intervals so the clamp can never starve the loop.
#[derive(Debug, Clone)]
pub struct FrameScheduler {
    min_elapsed_ms: f64,
    max_elapsed_ms: f64,
    last_frame: Option<f64>,
}

impl FrameScheduler {
    pub fn new(max_fps: f64, max_elapsed_ms: f64) -> Self {
        let max_fps = if max_fps.is_finite() && max_fps > 0.0 {
            max_fps
        } else {
            warn!(max_fps, fallback = DEFAULT_MAX_FPS, "Invalid max_fps, using fallback");
            DEFAULT_MAX_FPS
        };
        let min_elapsed_ms = 1000.0 / max_fps;

        let floor = 2.0 * min_elapsed_ms;
        if max_elapsed_ms.is_nan() || max_elapsed_ms < floor {
            warn!(max_elapsed_ms, floor, "max_elapsed_ms below two frames, raising it");
        }

        Self {
            min_elapsed_ms,
            max_elapsed_ms: max_elapsed_ms.max(floor),
            last_frame: None,
        }
    }

    pub fn from_config(config: &WorldConfig) -> Self {
        Self::new(config.max_fps, config.max_elapsed_ms)
    }

    pub fn should_advance(&mut self, now_ms: f64) -> bool {
        let Some(last) = self.last_frame else {
            self.last_frame = Some(now_ms);
            return true;
        };

        let elapsed = (now_ms - last).clamp(0.0, self.max_elapsed_ms);
        if elapsed > self.min_elapsed_ms {
            self.last_frame = Some(now_ms - elapsed % self.min_elapsed_ms);
            true
        } else {
            false
        }
    }
}

/// Drives a [`World`] from a clock, feeding it messages from an inbox
pub struct SimulationLoop<C: Clock> {
    world: World,
    clock: C,
    scheduler: FrameScheduler,
    inbox: mpsc::UnboundedReceiver<Message>,
}

impl<C: Clock> SimulationLoop<C> {
    /// Returns the loop and the sender that feeds its inbox
    pub fn new(world: World, clock: C) -> (Self, mpsc::UnboundedSender<Message>) {
        let (tx, inbox) = mpsc::unbounded_channel();
        let scheduler = FrameScheduler::from_config(world.config());
        let sim = Self {
            world,
            clock,
            scheduler,
            inbox,
        };
        (sim, tx)
    }

    /// Runs one frame if the scheduler allows it. Queued messages are applied
    /// before entities update; returns whether a tick ran.
    pub fn frame(&mut self) -> bool {
        if !self.scheduler.should_advance(self.clock.now_ms()) {
            return false;
        }

        while let Ok(message) = self.inbox.try_recv() {
            self.world.handle_message(&message);
        }

        self.world.update();
        true
    }

    pub fn world(&self) -> &World {
        &self.world
    }
}
