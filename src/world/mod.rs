// Entity simulation driven by chat directives

mod clock;
mod color;
mod command;
mod dude;
mod scheduler;

#[cfg(test)]
mod tests;

pub use clock::{Clock, ManualClock, SystemClock};
pub use color::{validate_color, ColorError};
pub use command::{interpret, ColorSource, Directive};
pub use dude::{AnimationState, Dude, EntityView, Vec2};
pub use scheduler::{FrameScheduler, SimulationLoop};

use crate::chat::Message;
use crate::config::WorldConfig;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Live entities, one per chat participant, in creation order
pub struct World {
    config: WorldConfig,
    rng: StdRng,
    dudes: BTreeMap<u64, Dude>,
    /// user_id -> creation sequence
    index: HashMap<String, u64>,
    next_seq: u64,
}

impl World {
    pub fn new(config: WorldConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Self {
            config,
            rng,
            dudes: BTreeMap::new(),
            index: HashMap::new(),
            next_seq: 0,
        }
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// Applies one message to its sender's entity, spawning it on first sight.
    /// Returns the directives that were applied.
    pub fn handle_message(&mut self, message: &Message) -> Vec<Directive> {
        let seq = match self.index.get(&message.user_id) {
            Some(seq) => *seq,
            None => {
                let seq = self.next_seq;
                self.next_seq += 1;
                let dude = Dude::spawn(
                    &message.user_id,
                    &message.display_name,
                    &self.config,
                    &mut self.rng,
                );
                self.dudes.insert(seq, dude);
                self.index.insert(message.user_id.clone(), seq);
                debug!(user_id = %message.user_id, name = %message.display_name, "Spawned entity");
                seq
            }
        };

        let directives = interpret(message);
        if let Some(dude) = self.dudes.get_mut(&seq) {
            for directive in &directives {
                dude.apply(directive, &self.config);
            }
        }
        directives
    }

    /// Advances every entity one tick, then drops the ones that faded out.
    /// Returns how many were removed.
    pub fn update(&mut self) -> usize {
        for dude in self.dudes.values_mut() {
            dude.update(&self.config, &mut self.rng);
        }

        let expired: Vec<u64> = self
            .dudes
            .iter()
            .filter(|(_, dude)| dude.should_be_deleted())
            .map(|(seq, _)| *seq)
            .collect();

        for seq in &expired {
            if let Some(dude) = self.dudes.remove(seq) {
                self.index.remove(dude.user_id());
                debug!(user_id = %dude.user_id(), "Removed faded entity");
            }
        }

        expired.len()
    }

    /// Renderer snapshot, in creation order
    pub fn views(&self) -> Vec<EntityView> {
        self.dudes.values().map(Dude::view).collect()
    }

    pub fn get(&self, user_id: &str) -> Option<&Dude> {
        self.index.get(user_id).and_then(|seq| self.dudes.get(seq))
    }

    pub fn len(&self) -> usize {
        self.dudes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dudes.is_empty()
    }

    /// Scene bounds change with the host window
    pub fn resize(&mut self, width: f64, height: f64) {
        self.config.width = width;
        self.config.height = height;
    }
}
