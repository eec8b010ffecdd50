use crate::context::ServerContext;
use crate::session::{ReadError, ReadStatus, Session};
use log::{debug, info, warn};
use shared::{decode_event, EventKind, FrameError, ProtocolError};
use std::sync::Arc;
use std::thread;
use thiserror::Error;

/// Why a session stops being read.
#[derive(Debug, Error)]
enum Disconnect {
    #[error("connection closed by peer")]
    Closed,

    #[error("client left")]
    Left,

    #[error(transparent)]
    Read(#[from] ReadError),

    #[error("bad frame: {0}")]
    Frame(#[from] FrameError),
}

/// Polls every session for readable bytes and turns complete frames into events.
///
/// When a full pass reads nothing the thread sleeps for the poll timeout.
pub fn run(ctx: Arc<ServerContext>) {
    while ctx.is_running() {
        let mut received = false;
        for session in ctx.sessions.snapshot() {
            match pump(&ctx, &session) {
                Ok(got) => received |= got,
                Err(reason) => {
                    match reason {
                        Disconnect::Closed | Disconnect::Left => {
                            info!("Player {}: {}", session.player_id(), reason)
                        }
                        Disconnect::Read(_) | Disconnect::Frame(_) => {
                            warn!("Player {}: {}", session.player_id(), reason)
                        }
                    }
                    ctx.teardown(session.player_id());
                }
            }
        }
        if !received {
            thread::sleep(ctx.config.poll_timeout);
        }
    }
    debug!("Reader stopped");
}

/// Drains one session. Returns whether any bytes arrived.
fn pump(ctx: &ServerContext, session: &Session) -> Result<bool, Disconnect> {
    let status = session.fill()?;
    while let Some(payload) = session.next_frame()? {
        dispatch(ctx, session, &payload)?;
    }
    match status {
        ReadStatus::Closed => Err(Disconnect::Closed),
        ReadStatus::Idle => Ok(false),
        ReadStatus::Received(_) => Ok(true),
    }
}

fn dispatch(ctx: &ServerContext, session: &Session, payload: &[u8]) -> Result<(), Disconnect> {
    let player_id = session.player_id();
    match decode_event(payload) {
        Ok(mut event) => {
            // The connection decides who sent it, not the payload.
            event.player_id = player_id;
            if event.kind == EventKind::Leave {
                return Err(Disconnect::Left);
            }
            ctx.inbound.push(event);
        }
        Err(ProtocolError::UnknownEventKind(kind)) => {
            warn!("Player {} sent unknown event kind {}, dropping", player_id, kind);
        }
        Err(e) => warn!("Dropping event from player {}: {}", player_id, e),
    }
    Ok(())
}
