//! Initial world layout.
//!
//! A [`LevelProvider`] is invoked once at startup to produce the level props, the spawn
//! and jail points, and the doghouse network. The simulation never calls it again, so
//! props persist across rounds.

use crate::entity::{DoghouseNetwork, Entity, EntityIds};
use shared::{Vec2, Vec3};

/// Everything the simulation needs to start.
#[derive(Debug)]
pub struct Level {
    pub entities: Vec<Entity>,
    pub human_spawns: Vec<Vec3>,
    pub dog_spawns: Vec<Vec3>,
    pub jail_points: Vec<Vec3>,
    pub doghouses: DoghouseNetwork,
    /// Center of the square the spatial index covers.
    pub center: Vec2,
    pub half_extent: f32,
}

pub trait LevelProvider {
    fn build(&self, ids: &mut EntityIds) -> Level;
}

/// Walled square arena split by a partition wall with a gate in the middle.
#[derive(Debug, Clone)]
pub struct ArenaLevel {
    pub half_size: f32,
}

impl Default for ArenaLevel {
    fn default() -> Self {
        Self { half_size: 30.0 }
    }
}

const WALL_THICKNESS: f32 = 1.0;
const WALL_HEIGHT: f32 = 2.5;
const GATE_WIDTH: f32 = 6.0;

impl LevelProvider for ArenaLevel {
    fn build(&self, ids: &mut EntityIds) -> Level {
        let h = self.half_size;
        let span = 2.0 * h + WALL_THICKNESS;
        let mut entities = Vec::new();

        // Perimeter
        for (center, width, depth) in [
            (Vec3::new(0.0, 0.0, h), span, WALL_THICKNESS),
            (Vec3::new(0.0, 0.0, -h), span, WALL_THICKNESS),
            (Vec3::new(h, 0.0, 0.0), WALL_THICKNESS, span),
            (Vec3::new(-h, 0.0, 0.0), WALL_THICKNESS, span),
        ] {
            entities.push(Entity::wall(ids.next_id(), center, width, depth, WALL_HEIGHT));
        }

        // Partition with open ends and a gate in the middle
        let inner = h * 2.0 / 3.0;
        let segment = inner - GATE_WIDTH * 0.5;
        let offset = GATE_WIDTH * 0.5 + segment * 0.5;
        for x in [-offset, offset] {
            entities.push(Entity::wall(
                ids.next_id(),
                Vec3::new(x, 0.0, 0.0),
                segment,
                WALL_THICKNESS,
                WALL_HEIGHT,
            ));
        }
        entities.push(Entity::gate(
            ids.next_id(),
            Vec3::ZERO,
            GATE_WIDTH,
            WALL_THICKNESS,
            WALL_HEIGHT,
        ));

        entities.push(Entity::puddle(
            ids.next_id(),
            Vec3::new(-h * 0.5, 0.0, -h / 3.0),
            3.0,
            2.0,
        ));
        entities.push(Entity::puddle(
            ids.next_id(),
            Vec3::new(h * 0.5, 0.0, h / 3.0),
            3.0,
            2.0,
        ));
        entities.push(Entity::water_bowl(
            ids.next_id(),
            Vec3::new(h / 3.0, 0.0, h * 0.8),
        ));

        let mut doghouses = DoghouseNetwork::default();
        for center in [
            Vec3::new(-h * 0.8, 0.0, h * 0.8),
            Vec3::new(h * 0.8, 0.0, -h * 0.8),
        ] {
            let doghouse = Entity::doghouse(ids.next_id(), center);
            doghouses.register(doghouse.id(), center);
            entities.push(doghouse);
        }

        let row = |z: f32| -> Vec<Vec3> {
            [-4.0, 0.0, 4.0, -8.0, 8.0]
                .into_iter()
                .map(|x| Vec3::new(x, 0.0, z))
                .collect()
        };

        Level {
            entities,
            human_spawns: row(-h * 0.6),
            dog_spawns: row(h * 0.6),
            jail_points: vec![
                Vec3::new(-h * 0.9, 0.0, -h * 0.9),
                Vec3::new(h * 0.9, 0.0, h * 0.9),
            ],
            doghouses,
            center: Vec2::ZERO,
            half_extent: h + WALL_THICKNESS * 2.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Side;
    use shared::EntityKind;
    use std::collections::HashSet;

    #[test]
    fn test_arena_ids_are_unique() {
        let mut ids = EntityIds::new();
        let level = ArenaLevel::default().build(&mut ids);
        let unique: HashSet<_> = level.entities.iter().map(|e| e.id()).collect();
        assert_eq!(unique.len(), level.entities.len());
        assert!(!level.entities.is_empty());
    }

    #[test]
    fn test_arena_points_lie_inside_bounds() {
        let level = ArenaLevel::default().build(&mut EntityIds::new());
        let points = level
            .human_spawns
            .iter()
            .chain(&level.dog_spawns)
            .chain(&level.jail_points);
        for p in points {
            assert!(p.x.abs() < level.half_extent && p.z.abs() < level.half_extent);
        }
        assert!(!level.human_spawns.is_empty());
        assert!(!level.dog_spawns.is_empty());
    }

    #[test]
    fn test_arena_registers_doghouses() {
        let level = ArenaLevel::default().build(&mut EntityIds::new());
        let count = level
            .entities
            .iter()
            .filter(|e| e.kind() == EntityKind::Doghouse)
            .count();
        assert_eq!(level.doghouses.len(), count);
        assert_eq!(count, 2);
    }

    #[test]
    fn test_spawn_points_do_not_overlap_props() {
        let level = ArenaLevel::default().build(&mut EntityIds::new());
        let mut ids = EntityIds::new();
        for (side, points) in [
            (Side::Human, &level.human_spawns),
            (Side::Dog, &level.dog_spawns),
        ] {
            for p in points {
                let avatar = Entity::avatar(ids.next_id() + 1000, 1, "probe", side, *p);
                assert!(avatar.colliding(&level.entities).is_empty(), "{:?}", p);
            }
        }
    }
}
