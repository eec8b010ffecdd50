use super::{EntityId, Transform, BALL_LIFETIME_SECS, BALL_SPEED, DOGHOUSE_COOLDOWN_SECS};
use log::debug;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use shared::{Vec2, Vec3};
use std::collections::BTreeMap;

/// Raises and lowers a gate on a fixed period.
#[derive(Debug, Clone)]
pub struct GateCycle {
    period: f32,
    raise_height: f32,
    elapsed: f32,
    raised: bool,
}

impl GateCycle {
    pub fn new(period: f32, raise_height: f32) -> Self {
        Self {
            period: period.max(f32::EPSILON),
            raise_height,
            elapsed: 0.0,
            raised: false,
        }
    }

    pub fn is_raised(&self) -> bool {
        self.raised
    }

    pub fn tick(&mut self, dt: f32, transform: &mut Transform) {
        self.elapsed += dt;
        while self.elapsed >= self.period {
            self.elapsed -= self.period;
            self.raised = !self.raised;
        }
        transform.position.y = if self.raised { self.raise_height } else { 0.0 };
    }
}

/// A thrown ball. Flies straight until it hits something or runs out of time.
#[derive(Debug, Clone)]
pub struct Ball {
    thrower: u32,
    velocity: Vec2,
    remaining: f32,
}

impl Ball {
    pub fn new(thrower: u32, direction: Vec2) -> Self {
        Self {
            thrower,
            velocity: direction.normalize() * BALL_SPEED,
            remaining: BALL_LIFETIME_SECS,
        }
    }

    pub fn thrower(&self) -> u32 {
        self.thrower
    }

    pub fn advance(&mut self, dt: f32, transform: &mut Transform) {
        transform.position += Vec3::from_ground(self.velocity * dt, 0.0);
    }

    /// Returns true once the ball's lifetime has run out.
    pub fn tick(&mut self, dt: f32) -> bool {
        self.remaining -= dt;
        self.remaining <= 0.0
    }
}

#[derive(Debug, Clone, Copy)]
struct Doghouse {
    position: Vec3,
    cooldown: f32,
}

/// Linked doghouses. A dog entering a ready doghouse comes out of another ready one,
/// after which both rest for a while.
#[derive(Debug, Default)]
pub struct DoghouseNetwork {
    houses: BTreeMap<EntityId, Doghouse>,
}

impl DoghouseNetwork {
    pub fn register(&mut self, id: EntityId, position: Vec3) {
        self.houses.insert(
            id,
            Doghouse {
                position,
                cooldown: 0.0,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.houses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.houses.is_empty()
    }

    /// Remaining cooldown of a doghouse; unknown ids report zero.
    pub fn cooldown(&self, id: EntityId) -> f32 {
        self.houses.get(&id).map_or(0.0, |house| house.cooldown)
    }

    pub fn is_ready(&self, id: EntityId) -> bool {
        self.houses.get(&id).map_or(false, |house| house.cooldown <= 0.0)
    }

    /// Picks an exit for a dog entering `from`. None when `from` is resting or no
    /// other doghouse is ready.
    pub fn tunnel(&mut self, from: EntityId, rng: &mut StdRng) -> Option<Vec3> {
        if !self.is_ready(from) {
            return None;
        }
        let exits: Vec<EntityId> = self
            .houses
            .iter()
            .filter(|(id, house)| **id != from && house.cooldown <= 0.0)
            .map(|(id, _)| *id)
            .collect();
        let exit = *exits.choose(rng)?;

        for id in [from, exit] {
            if let Some(house) = self.houses.get_mut(&id) {
                house.cooldown = DOGHOUSE_COOLDOWN_SECS;
            }
        }
        debug!("Doghouse tunnel {} -> {}", from, exit);
        self.houses.get(&exit).map(|house| house.position)
    }

    pub fn tick(&mut self, dt: f32) {
        for house in self.houses.values_mut() {
            house.cooldown = (house.cooldown - dt).max(0.0);
        }
    }
}
