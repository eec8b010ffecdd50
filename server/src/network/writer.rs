use crate::context::{Outbound, ServerContext};
use crate::session::Session;
use log::{debug, error, trace, warn};
use shared::{frame_state, State, BROADCAST};
use std::sync::Arc;

/// Pops outbound items one at a time and fans each out to its sessions.
///
/// The pop waits at most one poll timeout; on an empty wait the writer retries any
/// buffers a slow peer left partially sent.
pub fn run(ctx: Arc<ServerContext>) {
    loop {
        match ctx.outbound.pop_timeout(ctx.config.poll_timeout) {
            Some(Outbound::State { target, state }) => send(&ctx, target, &state),
            Some(Outbound::Wake) | None => {
                if !ctx.is_running() {
                    break;
                }
                flush_pending(&ctx);
            }
            Some(Outbound::Shutdown) => break,
        }
    }
    debug!("Writer stopped");
}

fn send(ctx: &ServerContext, target: u32, state: &State) {
    let frame = match frame_state(state) {
        Ok(frame) => frame,
        Err(e) => {
            error!("Could not encode state of entity {}: {}", state.id, e);
            return;
        }
    };

    let sessions = if target == BROADCAST {
        ctx.sessions.snapshot()
    } else {
        match ctx.sessions.get(target) {
            Some(session) => vec![session],
            None => {
                trace!("Dropping update for departed player {}", target);
                return;
            }
        }
    };

    for session in sessions {
        session.queue(&frame);
        deliver(ctx, &session);
    }
}

fn flush_pending(ctx: &ServerContext) {
    for session in ctx.sessions.snapshot() {
        if session.pending_bytes() > 0 {
            deliver(ctx, &session);
        }
    }
}

fn deliver(ctx: &ServerContext, session: &Session) {
    if let Err(e) = session.flush(ctx.config.max_outbound_bytes) {
        warn!("Write to player {} failed: {}", session.player_id(), e);
        ctx.teardown(session.player_id());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::entity::Entity;
    use shared::{Event, EventKind, Vec3};
    use std::net::{TcpListener, TcpStream};

    #[test]
    fn test_peer_that_stops_reading_is_torn_down() {
        let ctx = ServerContext::new(ServerConfig {
            max_outbound_bytes: 1024,
            ..ServerConfig::default()
        });
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let _client = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        let (stream, peer) = listener.accept().unwrap();
        let session = ctx.admit(stream, peer).unwrap().unwrap();
        ctx.inbound.drain();

        // Far more than the kernel will buffer for a client that never reads.
        session.queue(&vec![0u8; 64 << 20]);
        deliver(&ctx, &session);

        assert!(ctx.sessions.is_empty());
        assert!(session.is_closed());
        assert_eq!(
            ctx.inbound.drain(),
            vec![Event::new(EventKind::Leave, session.player_id())]
        );
        assert!(matches!(ctx.outbound.drain().as_slice(), [Outbound::Wake]));
    }

    #[test]
    fn test_update_for_departed_player_is_dropped() {
        let ctx = ServerContext::new(ServerConfig::default());
        let state = Entity::wall(1, Vec3::ZERO, 1.0, 1.0, 1.0).snapshot();
        send(&ctx, 7, &state);
        assert!(ctx.sessions.is_empty());
        assert!(ctx.inbound.is_empty());
    }
}
