//! Authoritative simulation state, owned exclusively by the game loop thread.
//!
//! A [`World`] holds the entity collection, the roster and the level data, and advances
//! all of it by one tick at a time in [`World::tick`]. The result of a tick is the list
//! of state records to replicate, each addressed to one player or to everyone.

use crate::collision::{CollisionManager, CollisionStats};
use crate::config::ServerConfig;
use crate::entity::{
    CollisionContext, DoghouseNetwork, Entity, EntityId, EntityIds, Side, Spawn,
};
use crate::events::EventManager;
use crate::level::LevelProvider;
use crate::lobby::{Lobby, Phase};
use log::{debug, info};
use rand::rngs::StdRng;
use rand::SeedableRng;
use shared::{EntityKind, Event, EventKind, State, Vec2, Vec3, BROADCAST};
use std::collections::BTreeMap;

/// How an active round ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundEnd {
    HumansWin,
    DogsWin,
    Abandoned,
}

pub struct World {
    entities: BTreeMap<EntityId, Entity>,
    ids: EntityIds,
    lobby: Lobby,
    phase: Phase,
    human_spawns: Vec<Vec3>,
    dog_spawns: Vec<Vec3>,
    jail_points: Vec<Vec3>,
    doghouses: DoghouseNetwork,
    center: Vec2,
    half_extent: f32,
    collisions: CollisionManager,
    rng: StdRng,
    round_secs: f32,
    round_elapsed: f32,
    /// Players owed a full snapshot on the next tick.
    newcomers: Vec<u32>,
    broadcast_full: bool,
    last_stats: CollisionStats,
}

impl World {
    pub fn new(config: &ServerConfig, provider: &dyn LevelProvider) -> Self {
        let mut ids = EntityIds::new();
        let level = provider.build(&mut ids);
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        info!(
            "Level loaded: {} entities, {} jail points",
            level.entities.len(),
            level.jail_points.len()
        );

        Self {
            entities: level.entities.into_iter().map(|e| (e.id(), e)).collect(),
            ids,
            lobby: Lobby::new(config.min_per_side),
            phase: Phase::Lobby,
            human_spawns: level.human_spawns,
            dog_spawns: level.dog_spawns,
            jail_points: level.jail_points,
            doghouses: level.doghouses,
            center: level.center,
            half_extent: level.half_extent,
            collisions: CollisionManager::new(config.collision_cap),
            rng,
            round_secs: config.round_duration.as_secs_f32(),
            round_elapsed: 0.0,
            newcomers: Vec::new(),
            broadcast_full: false,
            last_stats: CollisionStats::default(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn lobby(&self) -> &Lobby {
        &self.lobby
    }

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Avatar currently controlled by `player`.
    pub fn avatar_of(&self, player: u32) -> Option<&Entity> {
        let id = self.lobby.get(player)?.entity?;
        self.entities.get(&id)
    }

    pub fn last_collision_stats(&self) -> CollisionStats {
        self.last_stats
    }

    /// Advances the simulation by `dt` seconds and returns `(target, state)` records to
    /// replicate. A target of [`BROADCAST`] addresses every session.
    pub fn tick(&mut self, events: Vec<Event>, dt: f32) -> Vec<(u32, State)> {
        let collated = EventManager::collate(events);
        for event in &collated.lifecycle {
            self.handle_lifecycle(event);
        }

        if self.phase == Phase::Lobby && self.lobby.all_ready() {
            self.start_round();
        }

        if self.phase == Phase::Active {
            let mut spawns = Vec::new();
            for entity in self.entities.values_mut().filter(|e| !e.is_destroyed()) {
                let events = entity
                    .owner()
                    .map(|owner| collated.events_for(owner))
                    .unwrap_or(&[]);
                entity.update(events, dt, &mut spawns);
            }
            for spawn in spawns {
                self.spawn(spawn);
            }

            let mut ctx = CollisionContext {
                jail_points: &self.jail_points,
                doghouses: &mut self.doghouses,
                rng: &mut self.rng,
            };
            self.last_stats =
                self.collisions
                    .resolve(&mut self.entities, self.center, self.half_extent, &mut ctx);

            self.doghouses.tick(dt);
            for entity in self.entities.values_mut() {
                entity.tick_timers(dt);
                entity.sync_doghouse(&self.doghouses);
            }

            self.round_elapsed += dt;
            if let Some(end) = self.round_result() {
                self.end_round(end);
            }
        }

        self.snapshot()
    }

    fn handle_lifecycle(&mut self, event: &Event) {
        let id = event.player_id;
        match event.kind {
            EventKind::Join => {
                let known = self.lobby.get(id).is_some();
                self.lobby.join(id, event.name.as_deref());
                if !known {
                    self.newcomers.push(id);
                }
            }
            EventKind::Leave => {
                if let Some(player) = self.lobby.leave(id) {
                    if let Some(entity) = player.entity.and_then(|e| self.entities.get_mut(&e)) {
                        entity.destroy();
                    }
                }
                self.newcomers.retain(|p| *p != id);
            }
            EventKind::Switch if self.phase == Phase::Lobby => {
                if let Some(side) = self.lobby.switch(id) {
                    info!("Player {} switched to {:?}", id, side);
                }
            }
            EventKind::Ready if self.phase == Phase::Lobby => {
                if self.lobby.set_ready(id) {
                    debug!("Player {} is ready", id);
                }
            }
            kind => debug!("Ignoring {:?} from player {} in {:?}", kind, id, self.phase),
        }
    }

    fn start_round(&mut self) {
        let mut placed = [0usize; 2];
        let mut avatars = Vec::new();
        for player in self.lobby.players_mut() {
            let (spawns, slot) = match player.side {
                Side::Human => (&self.human_spawns, &mut placed[0]),
                Side::Dog => (&self.dog_spawns, &mut placed[1]),
            };
            let home = if spawns.is_empty() {
                Vec3::ZERO
            } else {
                spawns[*slot % spawns.len()]
            };
            *slot += 1;

            let id = self.ids.next_id();
            player.entity = Some(id);
            avatars.push(Entity::avatar(id, player.id, &player.name, player.side, home));
        }
        for avatar in avatars {
            self.entities.insert(avatar.id(), avatar);
        }

        self.phase = Phase::Active;
        self.round_elapsed = 0.0;
        self.broadcast_full = true;
        info!(
            "Round started: {} humans, {} dogs",
            self.lobby.count(Side::Human),
            self.lobby.count(Side::Dog)
        );
    }

    fn spawn(&mut self, spawn: Spawn) {
        match spawn {
            Spawn::Ball {
                thrower,
                position,
                direction,
            } => {
                let id = self.ids.next_id();
                debug!("Player {} threw ball {}", thrower, id);
                self.entities
                    .insert(id, Entity::ball(id, thrower, position, direction));
            }
        }
    }

    fn round_result(&self) -> Option<RoundEnd> {
        if self.lobby.participants() == 0 {
            return Some(RoundEnd::Abandoned);
        }
        let mut dogs = self
            .entities
            .values()
            .filter(|e| !e.is_destroyed() && e.side() == Some(Side::Dog))
            .peekable();
        if dogs.peek().is_some() && dogs.all(|dog| dog.is_jailed()) {
            return Some(RoundEnd::HumansWin);
        }
        if self.round_elapsed >= self.round_secs {
            return Some(RoundEnd::DogsWin);
        }
        None
    }

    fn end_round(&mut self, end: RoundEnd) {
        info!("Round over: {:?}", end);
        for entity in self.entities.values_mut() {
            if entity.owner().is_some() || entity.kind() == EntityKind::Ball {
                entity.destroy();
            }
        }
        self.lobby.reset();
        self.phase = Phase::Lobby;
    }

    /// Collects replication records, clears dirty flags and erases destroyed entities.
    fn snapshot(&mut self) -> Vec<(u32, State)> {
        let mut out = Vec::new();

        if self.broadcast_full {
            out.extend(self.entities.values().map(|e| (BROADCAST, e.snapshot())));
            self.newcomers.clear();
            self.broadcast_full = false;
        } else {
            for player in self.newcomers.drain(..) {
                out.extend(self.entities.values().map(|e| (player, e.snapshot())));
            }
            out.extend(
                self.entities
                    .values()
                    .filter(|e| e.has_changed())
                    .map(|e| (BROADCAST, e.snapshot())),
            );
        }

        for entity in self.entities.values_mut() {
            entity.clear_changed();
        }
        self.entities.retain(|_, e| !e.is_destroyed());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::Level;
    use shared::StateExtra;
    use std::time::Duration;

    /// Two walls far from the spawn points; nothing moves on its own.
    struct QuietLevel;

    impl LevelProvider for QuietLevel {
        fn build(&self, ids: &mut EntityIds) -> Level {
            Level {
                entities: vec![
                    Entity::wall(ids.next_id(), Vec3::new(0.0, 0.0, 20.0), 10.0, 1.0, 2.0),
                    Entity::wall(ids.next_id(), Vec3::new(0.0, 0.0, -20.0), 10.0, 1.0, 2.0),
                ],
                human_spawns: vec![Vec3::new(-5.0, 0.0, 0.0)],
                dog_spawns: vec![Vec3::new(5.0, 0.0, 0.0)],
                jail_points: vec![Vec3::new(0.0, 0.0, 15.0)],
                doghouses: DoghouseNetwork::default(),
                center: Vec2::ZERO,
                half_extent: 30.0,
            }
        }
    }

    const DT: f32 = 1.0 / 30.0;

    fn config() -> ServerConfig {
        ServerConfig {
            seed: Some(5),
            ..ServerConfig::default()
        }
    }

    fn quiet_world() -> World {
        let mut world = World::new(&config(), &QuietLevel);
        world.tick(Vec::new(), DT);
        world
    }

    fn start_two_player_round(world: &mut World) -> Vec<(u32, State)> {
        world.tick(
            vec![Event::new(EventKind::Join, 1), Event::new(EventKind::Join, 2)],
            DT,
        );
        world.tick(
            vec![Event::new(EventKind::Ready, 1), Event::new(EventKind::Ready, 2)],
            DT,
        )
    }

    #[test]
    fn test_join_sends_full_snapshot_to_newcomer_only() {
        let mut world = quiet_world();
        let out = world.tick(vec![Event::new(EventKind::Join, 1)], DT);
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|(target, _)| *target == 1));

        let idle = world.tick(Vec::new(), DT);
        assert!(idle.is_empty());
    }

    #[test]
    fn test_round_starts_when_everyone_is_ready() {
        let mut world = quiet_world();
        let out = start_two_player_round(&mut world);

        assert_eq!(world.phase(), Phase::Active);
        assert_eq!(out.len(), 4);
        assert!(out.iter().all(|(target, _)| *target == BROADCAST));

        let human = world.avatar_of(1).unwrap();
        let dog = world.avatar_of(2).unwrap();
        assert_eq!(human.kind(), EntityKind::Human);
        assert_eq!(dog.kind(), EntityKind::Dog);
        assert_eq!(human.position(), Vec3::new(-5.0, 0.0, 0.0));
        assert_eq!(dog.position(), Vec3::new(5.0, 0.0, 0.0));
    }

    #[test]
    fn test_unchanged_world_sends_nothing() {
        let mut world = quiet_world();
        start_two_player_round(&mut world);
        assert!(world.tick(Vec::new(), DT).is_empty());
    }

    #[test]
    fn test_move_replicates_only_the_mover() {
        let mut world = quiet_world();
        start_two_player_round(&mut world);
        let avatar = world.avatar_of(1).unwrap().id();

        let out = world.tick(
            vec![Event::new(EventKind::Move, 1).with_direction(Vec2::new(0.0, 1.0))],
            DT,
        );
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].1.id, avatar);
    }

    #[test]
    fn test_leave_mid_round_reports_one_destroyed_record() {
        let mut world = quiet_world();
        start_two_player_round(&mut world);
        let avatar = world.avatar_of(1).unwrap().id();

        let out = world.tick(vec![Event::new(EventKind::Leave, 1)], DT);
        assert_eq!(out.len(), 1);
        let (target, state) = &out[0];
        assert_eq!(*target, BROADCAST);
        assert_eq!(state.id, avatar);
        assert!(state.destroyed);
        assert!(matches!(state.extra, StateExtra::Avatar { owner: 1, .. }));

        assert!(world.entity(avatar).is_none());
        assert_eq!(world.phase(), Phase::Active);
    }

    #[test]
    fn test_everyone_leaving_returns_to_lobby() {
        let mut world = quiet_world();
        start_two_player_round(&mut world);
        world.tick(
            vec![Event::new(EventKind::Leave, 1), Event::new(EventKind::Leave, 2)],
            DT,
        );
        assert_eq!(world.phase(), Phase::Lobby);
        assert_eq!(world.entity_count(), 2);
    }

    #[test]
    fn test_capturing_every_dog_ends_round() {
        let mut world = quiet_world();
        start_two_player_round(&mut world);

        // Walk the human into the dog until it is captured.
        let mut ended = false;
        for _ in 0..120 {
            world.tick(
                vec![Event::new(EventKind::Move, 1).with_direction(Vec2::new(1.0, 0.0))],
                DT,
            );
            if world.phase() == Phase::Lobby {
                ended = true;
                break;
            }
        }
        assert!(ended);
        assert!(world.avatar_of(1).is_none());
        assert!(!world.lobby().get(1).unwrap().ready);
    }

    #[test]
    fn test_round_timer_ends_round() {
        let config = ServerConfig {
            round_duration: Duration::from_millis(100),
            seed: Some(1),
            ..ServerConfig::default()
        };
        let mut world = World::new(&config, &QuietLevel);
        start_two_player_round(&mut world);
        for _ in 0..5 {
            world.tick(Vec::new(), DT);
        }
        assert_eq!(world.phase(), Phase::Lobby);
        assert_eq!(world.entity_count(), 2);
    }

    #[test]
    fn test_mid_round_joiner_waits_with_full_snapshot() {
        let mut world = quiet_world();
        start_two_player_round(&mut world);

        let out = world.tick(vec![Event::new(EventKind::Join, 3)], DT);
        assert_eq!(out.len(), 4);
        assert!(out.iter().all(|(target, _)| *target == 3));
        assert!(world.avatar_of(3).is_none());
        assert_eq!(world.phase(), Phase::Active);
    }

    #[test]
    fn test_switch_and_ready_are_ignored_mid_round() {
        let mut world = quiet_world();
        start_two_player_round(&mut world);
        world.tick(vec![Event::new(EventKind::Switch, 2)], DT);
        assert_eq!(world.lobby().get(2).unwrap().side, Side::Dog);
    }

    #[test]
    fn test_throw_spawns_ball() {
        let mut world = quiet_world();
        start_two_player_round(&mut world);
        let before = world.entity_count();

        let out = world.tick(vec![Event::new(EventKind::Throw, 1)], DT);
        assert_eq!(world.entity_count(), before + 1);
        assert!(out.iter().any(|(_, s)| s.kind == EntityKind::Ball));

        // Dogs cannot throw.
        world.tick(vec![Event::new(EventKind::Throw, 2)], DT);
        assert_eq!(world.entity_count(), before + 1);
    }
}
