use super::{
    CollisionContext, CollisionOutcome, Entity, Spawn, Transform, BALL_DIAMETER,
    DOG_SPEED, HUMAN_SPEED, JAIL_SECS, SLIP_SECS, SPRINT_MULTIPLIER, STAMINA_DRAIN_PER_SEC,
    STAMINA_MAX, STAMINA_REGEN_PER_SEC, STUN_SECS, THROW_COOLDOWN_SECS,
};
use log::info;
use rand::seq::SliceRandom;
use shared::{EntityKind, Event, EventKind, StateExtra, Vec2, Vec3};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Human,
    Dog,
}

impl Side {
    pub fn other(self) -> Side {
        match self {
            Side::Human => Side::Dog,
            Side::Dog => Side::Human,
        }
    }
}

/// Player-controlled state shared by humans and dogs.
#[derive(Debug, Clone)]
pub struct Avatar {
    owner: u32,
    name: String,
    side: Side,
    home: Vec3,
    move_dir: Vec2,
    sprinting: bool,
    stamina: f32,
    slip_timer: f32,
    slide_dir: Vec2,
    stun_timer: f32,
    jail_timer: f32,
    throw_cooldown: f32,
}

impl Avatar {
    pub fn new(owner: u32, name: &str, side: Side, home: Vec3) -> Self {
        Self {
            owner,
            name: name.to_string(),
            side,
            home,
            move_dir: Vec2::ZERO,
            sprinting: false,
            stamina: STAMINA_MAX,
            slip_timer: 0.0,
            slide_dir: Vec2::ZERO,
            stun_timer: 0.0,
            jail_timer: 0.0,
            throw_cooldown: 0.0,
        }
    }

    pub fn owner(&self) -> u32 {
        self.owner
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn is_jailed(&self) -> bool {
        self.jail_timer > 0.0
    }

    fn is_slipping(&self) -> bool {
        self.slip_timer > 0.0
    }

    fn is_stunned(&self) -> bool {
        self.stun_timer > 0.0
    }

    /// Whether movement input is currently honoured.
    fn in_control(&self) -> bool {
        !self.is_jailed() && !self.is_stunned() && !self.is_slipping()
    }

    fn speed(&self) -> f32 {
        let base = match self.side {
            Side::Human => HUMAN_SPEED,
            Side::Dog => DOG_SPEED,
        };
        if self.sprinting {
            base * SPRINT_MULTIPLIER
        } else {
            base
        }
    }

    pub(super) fn apply_events(
        &mut self,
        events: &[Event],
        transform: &mut Transform,
        spawns: &mut Vec<Spawn>,
    ) {
        for event in events {
            match event.kind {
                EventKind::Look => {
                    let dir = event.direction.unwrap_or_default().normalize();
                    if !dir.is_zero() {
                        transform.forward = Vec3::from_ground(dir, 0.0);
                    }
                }
                EventKind::Move if self.in_control() => {
                    self.move_dir = event.direction.unwrap_or_default().normalize();
                }
                EventKind::Stop => {
                    self.move_dir = Vec2::ZERO;
                    self.sprinting = false;
                }
                EventKind::Sprint if self.in_control() => {
                    self.sprinting = !self.sprinting && self.stamina > 0.0;
                }
                EventKind::Throw if self.side == Side::Human && self.in_control() => {
                    if self.throw_cooldown <= 0.0 {
                        self.throw_cooldown = THROW_COOLDOWN_SECS;
                        let facing = transform.forward.ground().normalize();
                        let reach = super::HUMAN_SIZE.0 * 0.5 + BALL_DIAMETER * 0.5 + 0.1;
                        spawns.push(Spawn::Ball {
                            thrower: self.owner,
                            position: transform.position + Vec3::from_ground(facing * reach, 0.0),
                            direction: facing,
                        });
                    }
                }
                _ => {}
            }
        }
    }

    pub(super) fn advance(&mut self, dt: f32, transform: &mut Transform) {
        let velocity = if self.is_slipping() {
            self.slide_dir * self.speed()
        } else if self.in_control() {
            self.move_dir * self.speed()
        } else {
            Vec2::ZERO
        };
        if !velocity.is_zero() {
            transform.position += Vec3::from_ground(velocity * dt, 0.0);
        }

        if self.sprinting && !self.move_dir.is_zero() {
            self.stamina = (self.stamina - STAMINA_DRAIN_PER_SEC * dt).max(0.0);
            if self.stamina == 0.0 {
                self.sprinting = false;
            }
        }
    }

    pub(super) fn tick_timers(&mut self, dt: f32, transform: &mut Transform) {
        self.slip_timer = (self.slip_timer - dt).max(0.0);
        self.stun_timer = (self.stun_timer - dt).max(0.0);
        self.throw_cooldown = (self.throw_cooldown - dt).max(0.0);

        if self.jail_timer > 0.0 {
            self.jail_timer = (self.jail_timer - dt).max(0.0);
            if self.jail_timer == 0.0 {
                info!("Player {} released from jail", self.owner);
                transform.position = self.home;
            }
        }

        if !self.sprinting && self.stamina < STAMINA_MAX {
            self.stamina = (self.stamina + STAMINA_REGEN_PER_SEC * dt).min(STAMINA_MAX);
        }
    }

    pub(super) fn on_collision(
        &mut self,
        other: &Entity,
        transform: &mut Transform,
        ctx: &mut CollisionContext<'_>,
    ) -> CollisionOutcome {
        match (self.side, other.kind()) {
            (Side::Dog, EntityKind::Human) if !self.is_jailed() => {
                let Some(jail) = ctx.jail_points.choose(&mut *ctx.rng).copied() else {
                    return CollisionOutcome::default();
                };
                info!(
                    "Dog of player {} captured by player {:?}",
                    self.owner,
                    other.owner()
                );
                transform.position = jail;
                self.jail_timer = JAIL_SECS;
                self.move_dir = Vec2::ZERO;
                self.sprinting = false;
                CollisionOutcome { relocated: true }
            }
            (Side::Dog, EntityKind::Doghouse) if !self.is_jailed() => {
                match ctx.doghouses.tunnel(other.id(), &mut *ctx.rng) {
                    Some(exit) => {
                        transform.position = Vec3::new(exit.x, transform.position.y, exit.z);
                        CollisionOutcome { relocated: true }
                    }
                    None => CollisionOutcome::default(),
                }
            }
            (Side::Dog, EntityKind::WaterBowl) => {
                self.stamina = STAMINA_MAX;
                CollisionOutcome::default()
            }
            (Side::Dog, EntityKind::Ball) => {
                self.stun_timer = STUN_SECS;
                self.sprinting = false;
                CollisionOutcome::default()
            }
            (Side::Human, EntityKind::Puddle) if !self.is_slipping() => {
                self.slide_dir = if self.move_dir.is_zero() {
                    transform.forward.ground().normalize()
                } else {
                    self.move_dir
                };
                self.slip_timer = SLIP_SECS;
                self.sprinting = false;
                CollisionOutcome::default()
            }
            _ => CollisionOutcome::default(),
        }
    }

    pub(super) fn extra(&self) -> StateExtra {
        StateExtra::Avatar {
            owner: self.owner,
            name: self.name.clone(),
            stamina: self.stamina,
            sprinting: self.sprinting,
            jailed: self.is_jailed(),
            slipping: self.is_slipping(),
            stunned: self.is_stunned(),
        }
    }
}
