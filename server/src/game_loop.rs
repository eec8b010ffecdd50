//! Fixed-rate driver for the simulation.

use crate::context::{Outbound, ServerContext};
use crate::world::World;
use log::{debug, info, warn};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

pub struct GameLoop {
    ctx: Arc<ServerContext>,
    world: World,
    tick: u64,
}

impl GameLoop {
    pub fn new(ctx: Arc<ServerContext>, world: World) -> Self {
        Self { ctx, world, tick: 0 }
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    /// One iteration: drain inbound events, advance the world, queue its updates.
    /// Returns the number of records queued.
    pub fn step(&mut self, dt: f32) -> usize {
        let events = self.ctx.inbound.drain();
        let updates = self.world.tick(events, dt);
        let queued = updates.len();
        for (target, state) in updates {
            self.ctx.outbound.push(Outbound::State { target, state });
        }
        self.tick += 1;
        queued
    }

    /// Runs until the context stops. Never blocks beyond the sleep to the next tick.
    pub fn run(mut self) {
        let budget = self.ctx.config.tick_duration();
        let dt = budget.as_secs_f32();
        let stats_every = u64::from(self.ctx.config.tick_rate.max(1)) * 10;
        info!("Game loop running at {} Hz", self.ctx.config.tick_rate);

        while self.ctx.is_running() {
            let started = Instant::now();
            let queued = self.step(dt);
            let elapsed = started.elapsed();

            if elapsed > budget {
                warn!(
                    "Tick {} overran its budget: {:.2?} > {:.2?}",
                    self.tick, elapsed, budget
                );
            } else {
                thread::sleep(budget - elapsed);
            }

            if self.tick % stats_every == 0 {
                let stats = self.world.last_collision_stats();
                debug!(
                    "Tick {}: {} entities, {} sessions, {} pairs resolved, {} records queued",
                    self.tick,
                    self.world.entity_count(),
                    self.ctx.sessions.len(),
                    stats.processed,
                    queued
                );
            }
        }
        debug!("Game loop stopped after {} ticks", self.tick);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::level::ArenaLevel;
    use crate::lobby::Phase;
    use shared::{Event, EventKind, BROADCAST};

    fn game_loop() -> GameLoop {
        let config = ServerConfig {
            seed: Some(9),
            ..ServerConfig::default()
        };
        let world = World::new(&config, &ArenaLevel::default());
        GameLoop::new(Arc::new(ServerContext::new(config)), world)
    }

    fn targets(ctx: &ServerContext) -> Vec<u32> {
        ctx.outbound
            .drain()
            .into_iter()
            .filter_map(|item| match item {
                Outbound::State { target, .. } => Some(target),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_first_step_broadcasts_level() {
        let mut game = game_loop();
        let queued = game.step(0.03);
        assert_eq!(queued, game.world().entity_count());
        let ctx = Arc::clone(&game.ctx);
        assert!(targets(&ctx).iter().all(|t| *t == BROADCAST));
        assert_eq!(game.tick_count(), 1);
    }

    #[test]
    fn test_inbound_join_is_answered_with_full_snapshot() {
        let mut game = game_loop();
        game.step(0.03);
        let ctx = Arc::clone(&game.ctx);
        targets(&ctx);

        ctx.inbound.push(Event::new(EventKind::Join, 1));
        game.step(0.03);
        let sent = targets(&ctx);
        assert_eq!(sent.len(), game.world().entity_count());
        assert!(sent.iter().all(|t| *t == 1));
    }

    #[test]
    fn test_lobby_is_idle_between_rounds() {
        let mut game = game_loop();
        game.step(0.03);
        for _ in 0..10 {
            assert_eq!(game.step(0.5), 0);
        }
        assert_eq!(game.world().phase(), Phase::Lobby);
    }
}
