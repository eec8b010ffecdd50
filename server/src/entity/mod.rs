//! Authoritative per-object state and per-kind behaviour.
//!
//! Every simulated object is an [`Entity`]. The fields every kind shares (transform,
//! footprint, lifecycle flags, collider) live on the entity itself; what differs per
//! kind lives in the closed [`Behavior`] enum, chosen at construction. Call sites only
//! use the entity's capability methods and never inspect the variant directly.

mod avatar;
mod props;

pub use avatar::{Avatar, Side};
pub use props::{Ball, DoghouseNetwork, GateCycle};

use crate::collider::{self, Body, Collider};
use rand::rngs::StdRng;
use shared::{ColliderKind, EntityKind, Event, State, StateExtra, Vec2, Vec3};

pub type EntityId = u32;

pub const HUMAN_SIZE: (f32, f32, f32) = (0.8, 0.8, 1.8);
pub const DOG_SIZE: (f32, f32, f32) = (0.9, 0.9, 0.6);
pub const HUMAN_SPEED: f32 = 6.0;
pub const DOG_SPEED: f32 = 7.0;
pub const SPRINT_MULTIPLIER: f32 = 1.6;
pub const STAMINA_MAX: f32 = 1.0;
pub const STAMINA_DRAIN_PER_SEC: f32 = 0.25;
pub const STAMINA_REGEN_PER_SEC: f32 = 0.1;
pub const SLIP_SECS: f32 = 1.0;
pub const STUN_SECS: f32 = 1.5;
pub const JAIL_SECS: f32 = 10.0;
pub const THROW_COOLDOWN_SECS: f32 = 1.0;
pub const BALL_DIAMETER: f32 = 0.4;
pub const BALL_SPEED: f32 = 14.0;
pub const BALL_LIFETIME_SECS: f32 = 2.0;
pub const GATE_PERIOD_SECS: f32 = 4.0;
pub const GATE_RAISE_HEIGHT: f32 = 1.2;
pub const GATE_DOG_THRESHOLD: f32 = 0.8;
pub const DOGHOUSE_COOLDOWN_SECS: f32 = 5.0;

/// Monotonic entity id source. Ids start at 1 and are never handed out twice.
#[derive(Debug)]
pub struct EntityIds {
    next: EntityId,
}

impl EntityIds {
    pub fn new() -> Self {
        Self { next: 1 }
    }

    pub fn next_id(&mut self) -> EntityId {
        let id = self.next;
        self.next += 1;
        id
    }
}

impl Default for EntityIds {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub up: Vec3,
    pub forward: Vec3,
    pub scale: Vec3,
}

impl Transform {
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            up: Vec3::UP,
            forward: Vec3::FORWARD,
            scale: Vec3::ONE,
        }
    }
}

/// Decides whether an entity blocks another one. Runtime-only, never replicated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SolidRule {
    /// Uses the entity's own solid flag.
    Fixed,
    /// Solid to everything except dogs while the entity is raised above `threshold`.
    ExceptDogsWhileRaised { threshold: f32 },
}

/// Per-object collision callbacks that run before the kind's general hook.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CollisionRule {
    /// Destroy self on touching a blocking static object or an avatar other than `spared`.
    ExpireOnImpact { spared: Option<u32> },
}

/// Something an entity asked the world to create during its update.
#[derive(Debug, Clone, PartialEq)]
pub enum Spawn {
    Ball {
        thrower: u32,
        position: Vec3,
        direction: Vec2,
    },
}

/// World data the collision hooks may consult or change.
pub struct CollisionContext<'a> {
    pub jail_points: &'a [Vec3],
    pub doghouses: &'a mut DoghouseNetwork,
    pub rng: &'a mut StdRng,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollisionOutcome {
    /// The entity was moved somewhere else entirely (captured, tunneled).
    pub relocated: bool,
}

#[derive(Debug, Clone)]
pub enum Behavior {
    Avatar(Avatar),
    Wall,
    Gate(GateCycle),
    Puddle,
    WaterBowl,
    Doghouse { cooldown: f32 },
    Ball(Ball),
}

#[derive(Debug, Clone)]
pub struct Entity {
    id: EntityId,
    kind: EntityKind,
    transform: Transform,
    width: f32,
    depth: f32,
    height: f32,
    collider_kind: ColliderKind,
    collider: Collider,
    transparency: f32,
    destroyed: bool,
    is_static: bool,
    solid: bool,
    visible: bool,
    solid_rule: SolidRule,
    callbacks: Vec<CollisionRule>,
    behavior: Behavior,
    has_changed: bool,
}

impl Entity {
    #[allow(clippy::too_many_arguments)]
    fn new(
        id: EntityId,
        kind: EntityKind,
        position: Vec3,
        size: (f32, f32, f32),
        collider_kind: ColliderKind,
        is_static: bool,
        solid: bool,
        behavior: Behavior,
    ) -> Self {
        Self {
            id,
            kind,
            transform: Transform::at(position),
            width: size.0,
            depth: size.1,
            height: size.2,
            collider_kind,
            collider: Collider::for_kind(collider_kind),
            transparency: 0.0,
            destroyed: false,
            is_static,
            solid,
            visible: true,
            solid_rule: SolidRule::Fixed,
            callbacks: Vec::new(),
            behavior,
            has_changed: true,
        }
    }

    pub fn human(id: EntityId, owner: u32, name: &str, home: Vec3) -> Self {
        Self::new(
            id,
            EntityKind::Human,
            home,
            HUMAN_SIZE,
            ColliderKind::Capsule,
            false,
            true,
            Behavior::Avatar(Avatar::new(owner, name, Side::Human, home)),
        )
    }

    pub fn dog(id: EntityId, owner: u32, name: &str, home: Vec3) -> Self {
        Self::new(
            id,
            EntityKind::Dog,
            home,
            DOG_SIZE,
            ColliderKind::Capsule,
            false,
            true,
            Behavior::Avatar(Avatar::new(owner, name, Side::Dog, home)),
        )
    }

    pub fn avatar(id: EntityId, owner: u32, name: &str, side: Side, home: Vec3) -> Self {
        match side {
            Side::Human => Self::human(id, owner, name, home),
            Side::Dog => Self::dog(id, owner, name, home),
        }
    }

    pub fn wall(id: EntityId, center: Vec3, width: f32, depth: f32, height: f32) -> Self {
        Self::new(
            id,
            EntityKind::Wall,
            center,
            (width, depth, height),
            ColliderKind::Box,
            true,
            true,
            Behavior::Wall,
        )
    }

    pub fn gate(id: EntityId, center: Vec3, width: f32, depth: f32, height: f32) -> Self {
        let mut gate = Self::new(
            id,
            EntityKind::Gate,
            center,
            (width, depth, height),
            ColliderKind::Gate,
            true,
            true,
            Behavior::Gate(GateCycle::new(GATE_PERIOD_SECS, GATE_RAISE_HEIGHT)),
        );
        gate.solid_rule = SolidRule::ExceptDogsWhileRaised {
            threshold: GATE_DOG_THRESHOLD,
        };
        gate
    }

    pub fn puddle(id: EntityId, center: Vec3, width: f32, depth: f32) -> Self {
        let mut puddle = Self::new(
            id,
            EntityKind::Puddle,
            center,
            (width, depth, 0.05),
            ColliderKind::Box,
            true,
            false,
            Behavior::Puddle,
        );
        puddle.transparency = 0.4;
        puddle
    }

    pub fn water_bowl(id: EntityId, center: Vec3) -> Self {
        Self::new(
            id,
            EntityKind::WaterBowl,
            center,
            (0.6, 0.6, 0.2),
            ColliderKind::Capsule,
            true,
            false,
            Behavior::WaterBowl,
        )
    }

    pub fn doghouse(id: EntityId, center: Vec3) -> Self {
        Self::new(
            id,
            EntityKind::Doghouse,
            center,
            (1.5, 1.5, 1.2),
            ColliderKind::Box,
            true,
            false,
            Behavior::Doghouse { cooldown: 0.0 },
        )
    }

    pub fn ball(id: EntityId, thrower: u32, position: Vec3, direction: Vec2) -> Self {
        let mut ball = Self::new(
            id,
            EntityKind::Ball,
            position,
            (BALL_DIAMETER, BALL_DIAMETER, BALL_DIAMETER),
            ColliderKind::Capsule,
            false,
            false,
            Behavior::Ball(Ball::new(thrower, direction)),
        );
        ball.transform.forward = Vec3::from_ground(direction.normalize(), 0.0);
        ball.callbacks.push(CollisionRule::ExpireOnImpact {
            spared: Some(thrower),
        });
        ball
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn position(&self) -> Vec3 {
        self.transform.position
    }

    pub fn forward(&self) -> Vec3 {
        self.transform.forward
    }

    pub fn collider_kind(&self) -> ColliderKind {
        self.collider_kind
    }

    pub fn is_static(&self) -> bool {
        self.is_static
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    pub fn has_changed(&self) -> bool {
        self.has_changed
    }

    pub fn clear_changed(&mut self) {
        self.has_changed = false;
    }

    pub fn set_position(&mut self, position: Vec3) {
        if self.transform.position != position {
            self.transform.position = position;
            self.has_changed = true;
        }
    }

    /// Marks the entity for deletion; the next snapshot reports it once, then it is erased.
    pub fn destroy(&mut self) {
        if !self.destroyed {
            self.destroyed = true;
            self.has_changed = true;
        }
    }

    /// Player that controls this entity, for avatars.
    pub fn owner(&self) -> Option<u32> {
        match &self.behavior {
            Behavior::Avatar(avatar) => Some(avatar.owner()),
            _ => None,
        }
    }

    pub fn side(&self) -> Option<Side> {
        match &self.behavior {
            Behavior::Avatar(avatar) => Some(avatar.side()),
            _ => None,
        }
    }

    pub fn is_jailed(&self) -> bool {
        matches!(&self.behavior, Behavior::Avatar(avatar) if avatar.is_jailed())
    }

    /// Whether this entity takes part in the spatial index at all.
    pub fn is_collidable(&self) -> bool {
        !self.destroyed && self.collider != Collider::Empty
    }

    pub fn body(&self) -> Body {
        Body {
            center: self.transform.position.ground(),
            width: self.width * self.transform.scale.x,
            depth: self.depth * self.transform.scale.z,
            collider: self.collider,
        }
    }

    pub fn solid_with(&self, other: &Entity) -> bool {
        match self.solid_rule {
            SolidRule::Fixed => self.solid,
            SolidRule::ExceptDogsWhileRaised { threshold } => {
                if other.kind == EntityKind::Dog && self.transform.position.y > threshold {
                    false
                } else {
                    self.solid
                }
            }
        }
    }

    /// Entities in `candidates` this entity truly overlaps.
    pub fn colliding<'a>(&self, candidates: impl IntoIterator<Item = &'a Entity>) -> Vec<EntityId> {
        let body = self.body();
        candidates
            .into_iter()
            .filter(|other| other.id != self.id && other.is_collidable())
            .filter(|other| body.overlaps(&other.body()))
            .map(|other| other.id)
            .collect()
    }

    /// Separates two overlapping entities when both block each other.
    /// Returns whether any correction was applied.
    pub fn handle_push_back(&mut self, other: &mut Entity) -> bool {
        if !self.solid_with(other) || !other.solid_with(self) {
            return false;
        }
        let Some(split) =
            collider::push_back(&self.body(), self.is_static, &other.body(), other.is_static)
        else {
            return false;
        };
        self.nudge(split.for_a);
        other.nudge(split.for_b);
        true
    }

    fn nudge(&mut self, offset: Vec2) {
        if !offset.is_zero() {
            let position = self.transform.position + Vec3::from_ground(offset, 0.0);
            self.set_position(position);
        }
    }

    /// Applies this tick's events addressed to the entity, then advances its motion.
    pub fn update(&mut self, events: &[Event], dt: f32, spawns: &mut Vec<Spawn>) {
        let before = (self.transform, self.extra());
        match &mut self.behavior {
            Behavior::Avatar(avatar) => {
                avatar.apply_events(events, &mut self.transform, spawns);
                avatar.advance(dt, &mut self.transform);
            }
            Behavior::Ball(ball) => ball.advance(dt, &mut self.transform),
            Behavior::Wall
            | Behavior::Gate(_)
            | Behavior::Puddle
            | Behavior::WaterBowl
            | Behavior::Doghouse { .. } => {}
        }
        self.note_changes(before);
    }

    /// Advances object-local timers. Runs once per tick after collisions.
    pub fn tick_timers(&mut self, dt: f32) {
        let before = (self.transform, self.extra());
        match &mut self.behavior {
            Behavior::Avatar(avatar) => avatar.tick_timers(dt, &mut self.transform),
            Behavior::Gate(cycle) => cycle.tick(dt, &mut self.transform),
            Behavior::Ball(ball) => {
                if ball.tick(dt) {
                    self.destroyed = true;
                    self.has_changed = true;
                }
            }
            Behavior::Wall | Behavior::Puddle | Behavior::WaterBowl | Behavior::Doghouse { .. } => {}
        }
        self.note_changes(before);
    }

    /// Mirrors the doghouse cooldown map into the replicated doghouse state.
    pub fn sync_doghouse(&mut self, doghouses: &DoghouseNetwork) {
        if let Behavior::Doghouse { cooldown } = &mut self.behavior {
            let current = doghouses.cooldown(self.id);
            if *cooldown != current {
                *cooldown = current;
                self.has_changed = true;
            }
        }
    }

    /// Runs registered callbacks, then the kind's general collision hook.
    pub fn handle_collision(
        &mut self,
        other: &Entity,
        ctx: &mut CollisionContext<'_>,
    ) -> CollisionOutcome {
        for rule in self.callbacks.clone() {
            match rule {
                CollisionRule::ExpireOnImpact { spared } => {
                    let blocking_static = other.is_static && other.solid_with(self);
                    let struck_avatar = other.owner().is_some() && other.owner() != spared;
                    if blocking_static || struck_avatar {
                        self.destroy();
                    }
                }
            }
        }
        if self.destroyed {
            return CollisionOutcome::default();
        }

        let before = (self.transform, self.extra());
        let outcome = match &mut self.behavior {
            Behavior::Avatar(avatar) => avatar.on_collision(other, &mut self.transform, ctx),
            _ => CollisionOutcome::default(),
        };
        self.note_changes(before);
        outcome
    }

    fn note_changes(&mut self, before: (Transform, StateExtra)) {
        if before.0 != self.transform || before.1 != self.extra() {
            self.has_changed = true;
        }
    }

    fn extra(&self) -> StateExtra {
        match &self.behavior {
            Behavior::Avatar(avatar) => avatar.extra(),
            Behavior::Gate(cycle) => StateExtra::Gate {
                raised: cycle.is_raised(),
            },
            Behavior::Doghouse { cooldown } => StateExtra::Doghouse {
                cooldown: *cooldown,
            },
            Behavior::Ball(ball) => StateExtra::Ball {
                thrower: ball.thrower(),
            },
            Behavior::Wall | Behavior::Puddle | Behavior::WaterBowl => StateExtra::None,
        }
    }

    pub fn snapshot(&self) -> State {
        State {
            kind: self.kind,
            id: self.id,
            position: self.transform.position,
            up: self.transform.up,
            forward: self.transform.forward,
            scale: self.transform.scale,
            width: self.width,
            depth: self.depth,
            height: self.height,
            collider_kind: self.collider_kind,
            transparency: self.transparency,
            destroyed: self.destroyed,
            is_static: self.is_static,
            solid: self.solid,
            visible: self.visible,
            extra: self.extra(),
        }
    }
}
