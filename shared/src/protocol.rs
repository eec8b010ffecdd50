//! Message schemas exchanged between the server and its clients.
//!
//! Clients send [`Event`]s; the server replies with [`State`] records. Both are
//! encoded with bincode and wrapped in a length-prefixed frame (see [`crate::codec`]).

use crate::math::{Vec2, Vec3};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Player id reserved for "every session" when addressing outbound updates.
pub const BROADCAST: u32 = 0;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("serialization failed: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("unknown event kind {0}")]
    UnknownEventKind(u8),

    #[error("{0:?} event is missing its direction")]
    MissingPayload(EventKind),
}

/// What a client event asks for.
///
/// The declaration order is the processing order used when several events for the
/// same avatar arrive in one tick: a look is applied before a move, a stop after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum EventKind {
    Join = 0,
    Leave = 1,
    Switch = 2,
    Ready = 3,
    Look = 4,
    Move = 5,
    Sprint = 6,
    Stop = 7,
    Throw = 8,
}

impl EventKind {
    /// Connection-lifecycle kinds are handled by the lobby, not by an entity.
    pub fn is_lifecycle(self) -> bool {
        matches!(
            self,
            EventKind::Join | EventKind::Leave | EventKind::Switch | EventKind::Ready
        )
    }
}

impl TryFrom<u8> for EventKind {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => EventKind::Join,
            1 => EventKind::Leave,
            2 => EventKind::Switch,
            3 => EventKind::Ready,
            4 => EventKind::Look,
            5 => EventKind::Move,
            6 => EventKind::Sprint,
            7 => EventKind::Stop,
            8 => EventKind::Throw,
            other => return Err(ProtocolError::UnknownEventKind(other)),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub kind: EventKind,
    pub player_id: u32,
    pub name: Option<String>,
    pub direction: Option<Vec2>,
}

impl Event {
    pub fn new(kind: EventKind, player_id: u32) -> Self {
        Self {
            kind,
            player_id,
            name: None,
            direction: None,
        }
    }

    pub fn with_direction(mut self, direction: Vec2) -> Self {
        self.direction = Some(direction);
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// On-wire shape of an event. The kind travels as a raw byte so that an unknown
/// kind can be reported and dropped instead of failing the whole frame.
#[derive(Serialize, Deserialize)]
struct WireEvent {
    kind: u8,
    player_id: u32,
    name: Option<String>,
    direction: Option<Vec2>,
}

pub fn encode_event(event: &Event) -> Result<Vec<u8>, ProtocolError> {
    let wire = WireEvent {
        kind: event.kind as u8,
        player_id: event.player_id,
        name: event.name.clone(),
        direction: event.direction,
    };
    Ok(bincode::serialize(&wire)?)
}

pub fn decode_event(bytes: &[u8]) -> Result<Event, ProtocolError> {
    let wire: WireEvent = bincode::deserialize(bytes)?;
    let kind = EventKind::try_from(wire.kind)?;
    if matches!(kind, EventKind::Look | EventKind::Move) && wire.direction.is_none() {
        return Err(ProtocolError::MissingPayload(kind));
    }
    Ok(Event {
        kind,
        player_id: wire.player_id,
        name: wire.name,
        direction: wire.direction,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Human,
    Dog,
    Wall,
    Gate,
    Puddle,
    WaterBowl,
    Doghouse,
    Ball,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColliderKind {
    None,
    Box,
    Capsule,
    Gate,
}

/// Kind-specific fields appended to a [`State`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StateExtra {
    None,
    Avatar {
        owner: u32,
        name: String,
        stamina: f32,
        sprinting: bool,
        jailed: bool,
        slipping: bool,
        stunned: bool,
    },
    Gate {
        raised: bool,
    },
    Doghouse {
        cooldown: f32,
    },
    Ball {
        thrower: u32,
    },
}

/// Replicated snapshot of one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct State {
    pub kind: EntityKind,
    pub id: u32,
    pub position: Vec3,
    pub up: Vec3,
    pub forward: Vec3,
    pub scale: Vec3,
    pub width: f32,
    pub depth: f32,
    pub height: f32,
    pub collider_kind: ColliderKind,
    pub transparency: f32,
    pub destroyed: bool,
    pub is_static: bool,
    pub solid: bool,
    pub visible: bool,
    pub extra: StateExtra,
}

pub fn encode_state(state: &State) -> Result<Vec<u8>, ProtocolError> {
    Ok(bincode::serialize(state)?)
}

pub fn decode_state(bytes: &[u8]) -> Result<State, ProtocolError> {
    Ok(bincode::deserialize(bytes)?)
}
