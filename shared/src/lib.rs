//! Types shared between the kennel server and its clients: ground-plane math, the
//! event/state message schemas, and the length-prefixed frame codec.

pub mod codec;
pub mod math;
pub mod protocol;

pub use codec::{decode_player_id, encode_frame, encode_player_id, FrameError, FrameReader};
pub use math::{Vec2, Vec3};
pub use protocol::{
    decode_event, decode_state, encode_event, encode_state, ColliderKind, EntityKind, Event,
    EventKind, ProtocolError, State, StateExtra, BROADCAST,
};

pub const DEFAULT_PORT: u16 = 7777;
pub const DEFAULT_MAX_FRAME_LEN: usize = 64 * 1024;

/// Serializes an event and wraps it in a frame, ready to write to a socket.
pub fn frame_event(event: &Event) -> Result<Vec<u8>, ProtocolError> {
    Ok(encode_frame(&encode_event(event)?))
}

/// Serializes a state record and wraps it in a frame.
pub fn frame_state(state: &State) -> Result<Vec<u8>, ProtocolError> {
    Ok(encode_frame(&encode_state(state)?))
}
