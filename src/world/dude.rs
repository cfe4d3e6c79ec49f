use crate::config::WorldConfig;
use crate::world::command::{ColorSource, Directive};
use rand::Rng;
use serde::Serialize;
use std::collections::VecDeque;

/// Downward acceleration, units/s²
const GRAVITY: f64 = 400.0;
const JUMP_SPEED_X: f64 = 100.0;
const JUMP_SPEED_Y: f64 = -300.0;
/// Horizontal walk speed while not idle, units/s
const DRIFT_SPEED: f64 = 60.0;

const SPRITE_SIZE: f64 = 32.0;
const SCALE: f64 = 4.0;
const COLLIDER_Y: f64 = 8.0;
const COLLIDER_WIDTH: f64 = 14.0;
const COLLIDER_HEIGHT: f64 = 16.0;

/// Distance from the entity origin down to its feet
const FOOT_OFFSET: f64 = (COLLIDER_Y + COLLIDER_HEIGHT - SPRITE_SIZE / 2.0) * SCALE;
const HALF_WIDTH: f64 = COLLIDER_WIDTH / 2.0 * SCALE;

const DEFAULT_TINT: &str = "#969696";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AnimationState {
    Idle,
    Run,
    Jump,
    Fall,
    Land,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

/// Snapshot polled by the renderer once per tick
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityView {
    pub user_id: String,
    pub name: String,
    pub position: Vec2,
    pub direction: f64,
    pub state: AnimationState,
    pub tint: String,
    pub message: Option<String>,
    pub emotes: Vec<String>,
    pub opacity: f64,
}

/// Messages waiting behind the visible one; older ones are dropped past this
const MAX_PENDING_MESSAGES: usize = 4;

/// Speech bubble: one message visible at a time, the rest wait in order
#[derive(Debug, Clone, Default)]
struct MessageQueue {
    pending: VecDeque<String>,
    active: Option<(String, f64)>,
}

impl MessageQueue {
    fn push(&mut self, text: String, display_ms: f64) {
        self.pending.push_back(text);
        while self.pending.len() > MAX_PENDING_MESSAGES {
            self.pending.pop_front();
        }
        self.promote(display_ms);
    }

    fn update(&mut self, dt: f64, display_ms: f64) {
        if let Some((_, remaining)) = self.active.as_mut() {
            *remaining -= dt;
            if *remaining <= 0.0 {
                self.active = None;
            }
        }
        self.promote(display_ms);
    }

    fn promote(&mut self, display_ms: f64) {
        if self.active.is_none() {
            self.active = self.pending.pop_front().map(|text| (text, display_ms));
        }
    }

    fn current(&self) -> Option<&str> {
        self.active.as_ref().map(|(text, _)| text.as_str())
    }
}

/// Emotes are released one at a time and each lives for a fixed span
#[derive(Debug, Clone, Default)]
struct EmoteQueue {
    pending: VecDeque<String>,
    active: Vec<(String, f64)>,
    cooldown: f64,
}

impl EmoteQueue {
    fn push(&mut self, emotes: &[String]) {
        self.pending.extend(emotes.iter().cloned());
    }

    fn update(&mut self, dt: f64, interval_ms: f64, lifetime_ms: f64) {
        for (_, age) in self.active.iter_mut() {
            *age += dt;
        }
        self.active.retain(|(_, age)| *age < lifetime_ms);

        self.cooldown -= dt;
        if self.cooldown <= 0.0 {
            if let Some(url) = self.pending.pop_front() {
                self.active.push((url, 0.0));
                self.cooldown = interval_ms;
            }
        }
    }

    fn urls(&self) -> Vec<String> {
        self.active.iter().map(|(url, _)| url.clone()).collect()
    }
}

/// One chat participant's avatar
#[derive(Debug, Clone)]
pub struct Dude {
    user_id: String,
    name: String,
    position: Vec2,
    velocity: Vec2,
    direction: f64,
    state: AnimationState,
    twitch_color: String,
    user_color: Option<String>,
    messages: MessageQueue,
    emotes: EmoteQueue,
    /// Time spent in `Land`, while landing
    land_elapsed: Option<f64>,
    dwell_elapsed: f64,
    dwell_limit: f64,
    lifetime: f64,
    fade: f64,
    opacity: f64,
    should_be_deleted: bool,
}

impl Dude {
    /// Spawns above the scene at a random x with a random facing
    pub fn spawn<R: Rng + ?Sized>(
        user_id: &str,
        name: &str,
        config: &WorldConfig,
        rng: &mut R,
    ) -> Self {
        let span = (config.width - SPRITE_SIZE * SCALE).max(0.0);
        let x = rng.gen::<f64>() * span + SPRITE_SIZE / 2.0 * SCALE;
        let direction = if rng.gen::<f64>() > 0.5 { 1.0 } else { -1.0 };

        Self {
            user_id: user_id.to_string(),
            name: name.to_string(),
            position: Vec2 { x, y: -FOOT_OFFSET },
            velocity: Vec2::default(),
            direction,
            state: AnimationState::Idle,
            twitch_color: DEFAULT_TINT.to_string(),
            user_color: None,
            messages: MessageQueue::default(),
            emotes: EmoteQueue::default(),
            land_elapsed: None,
            dwell_elapsed: 0.0,
            dwell_limit: rng.gen::<f64>() * config.max_dwell_ms,
            lifetime: config.max_lifetime_ms,
            fade: config.max_fade_ms,
            opacity: 1.0,
            should_be_deleted: false,
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn state(&self) -> AnimationState {
        self.state
    }

    pub fn position(&self) -> Vec2 {
        self.position
    }

    pub fn velocity(&self) -> Vec2 {
        self.velocity
    }

    pub fn direction(&self) -> f64 {
        self.direction
    }

    pub fn lifetime(&self) -> f64 {
        self.lifetime
    }

    pub fn fade(&self) -> f64 {
        self.fade
    }

    pub fn opacity(&self) -> f64 {
        self.opacity
    }

    pub fn should_be_deleted(&self) -> bool {
        self.should_be_deleted
    }

    /// User override wins over the stream color
    pub fn tint(&self) -> &str {
        self.user_color.as_deref().unwrap_or(&self.twitch_color)
    }

    fn is_airborne(&self) -> bool {
        matches!(self.state, AnimationState::Jump | AnimationState::Fall)
    }

    /// Switches animation; returns false when already in `state`
    fn play(&mut self, state: AnimationState) -> bool {
        if self.state == state {
            return false;
        }
        self.state = state;
        true
    }

    pub fn apply(&mut self, directive: &Directive, config: &WorldConfig) {
        match directive {
            Directive::Jump => {
                self.jump();
            }
            Directive::SetColor { color, source } => match source {
                ColorSource::Stream => self.twitch_color = color.clone(),
                ColorSource::User => self.user_color = Some(color.clone()),
            },
            Directive::Speak(text) => self.add_message(text.clone(), config),
            Directive::Emote(emotes) => self.emotes.push(emotes),
        }
    }

    /// Ignored while already jumping or falling
    pub fn jump(&mut self) -> bool {
        if self.is_airborne() {
            return false;
        }
        self.velocity = Vec2 {
            x: self.direction * JUMP_SPEED_X,
            y: JUMP_SPEED_Y,
        };
        self.land_elapsed = None;
        self.play(AnimationState::Jump)
    }

    /// Shows a message and restarts the lifetime
    pub fn add_message(&mut self, text: String, config: &WorldConfig) {
        self.messages.push(text, config.message_display_ms);
        self.lifetime = config.max_lifetime_ms;
        self.fade = config.max_fade_ms;
        self.opacity = 1.0;
    }

    /// Advances one fixed tick
    pub fn update<R: Rng + ?Sized>(&mut self, config: &WorldConfig, rng: &mut R) {
        let dt = config.fixed_delta_ms;
        let secs = dt / 1000.0;

        if let Some(elapsed) = self.land_elapsed.as_mut() {
            *elapsed += dt;
            if *elapsed > config.land_duration_ms {
                self.land_elapsed = None;
                self.play(AnimationState::Idle);
            }
        }

        self.dwell_elapsed += dt;
        if self.dwell_elapsed > self.dwell_limit
            && matches!(self.state, AnimationState::Idle | AnimationState::Run)
        {
            let next = if self.state == AnimationState::Idle {
                AnimationState::Run
            } else {
                AnimationState::Idle
            };
            self.play(next);
            self.dwell_elapsed = 0.0;
            self.dwell_limit = rng.gen::<f64>() * config.max_dwell_ms;
        }

        self.velocity.y += GRAVITY * secs;

        let mut next = Vec2 {
            x: self.position.x + self.velocity.x * secs,
            y: self.position.y + self.velocity.y * secs,
        };

        let floor = config.height - FOOT_OFFSET;
        if next.y > floor {
            self.velocity = Vec2::default();
            next.y = floor;

            if self.state == AnimationState::Fall {
                self.play(AnimationState::Land);
                self.land_elapsed = Some(0.0);
            }
        }

        self.position = next;

        if self.velocity.y > 0.0 {
            self.play(AnimationState::Fall);
        }

        if self.state != AnimationState::Idle {
            self.position.x += DRIFT_SPEED * self.direction * secs;

            // Only flip when heading into the wall, so one contact flips once
            let hit_right = self.direction > 0.0 && self.position.x + HALF_WIDTH >= config.width;
            let hit_left = self.direction < 0.0 && self.position.x - HALF_WIDTH <= 0.0;
            if hit_right || hit_left {
                self.direction = -self.direction;
                self.velocity.x = -self.velocity.x;
            }
        }

        if self.lifetime > 0.0 {
            self.lifetime -= dt;
        } else if self.fade > 0.0 {
            self.fade -= dt;
            self.opacity = (self.fade / config.max_fade_ms).clamp(0.0, 1.0);
        } else {
            self.should_be_deleted = true;
        }

        self.messages.update(dt, config.message_display_ms);
        self.emotes
            .update(dt, config.emote_interval_ms, config.emote_lifetime_ms);
    }

    pub fn view(&self) -> EntityView {
        EntityView {
            user_id: self.user_id.clone(),
            name: self.name.clone(),
            position: self.position,
            direction: self.direction,
            state: self.state,
            tint: self.tint().to_string(),
            message: self.messages.current().map(str::to_string),
            emotes: self.emotes.urls(),
            opacity: self.opacity,
        }
    }
}
