use crate::context::ServerContext;
use log::{debug, error, info, warn};
use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;

/// Accept loop. The listener must already be in non-blocking mode.
pub fn run(ctx: Arc<ServerContext>, listener: TcpListener) {
    while ctx.is_running() {
        match listener.accept() {
            Ok((stream, peer)) => accept(&ctx, stream, peer),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                thread::sleep(ctx.config.poll_timeout);
            }
            Err(e) => {
                error!("Accept failed: {}", e);
                thread::sleep(ctx.config.poll_timeout);
            }
        }
    }
    debug!("Listener stopped");
}

fn accept(ctx: &ServerContext, stream: TcpStream, peer: SocketAddr) {
    match ctx.admit(stream, peer) {
        Ok(Some(session)) => {
            info!("Player {} connected from {}", session.player_id(), peer);
        }
        Ok(None) => info!(
            "Rejected {}: server is full ({} sessions)",
            peer,
            ctx.sessions.capacity()
        ),
        Err(e) => warn!("Handshake with {} failed: {}", peer, e),
    }
}
