use crate::config::ServerConfig;
use crate::queue::BlockingQueue;
use crate::session::{Session, SessionRegistry};
use log::{debug, info};
use shared::{Event, EventKind, State};
use std::io;
use std::net::{SocketAddr, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Item consumed by the writer thread.
#[derive(Debug, Clone)]
pub enum Outbound {
    /// A state record for one player, or for everyone when `target` is `BROADCAST`.
    State { target: u32, state: State },
    /// Does nothing except wake a writer blocked on an empty queue.
    Wake,
    Shutdown,
}

/// Process-wide state shared by the network threads and the game loop.
///
/// Built once at startup (or once per test) and handed around as `Arc<ServerContext>`.
#[derive(Debug)]
pub struct ServerContext {
    pub config: ServerConfig,
    pub sessions: SessionRegistry,
    pub inbound: BlockingQueue<Event>,
    pub outbound: BlockingQueue<Outbound>,
    running: AtomicBool,
}

impl ServerContext {
    pub fn new(config: ServerConfig) -> Self {
        let sessions = SessionRegistry::new(config.max_sessions, config.max_frame_len);
        Self {
            config,
            sessions,
            inbound: BlockingQueue::new(),
            outbound: BlockingQueue::new(),
            running: AtomicBool::new(true),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Asks every thread to finish. Only the first call has an effect.
    pub fn stop(&self) {
        if self.running.swap(false, Ordering::AcqRel) {
            info!("Stopping server");
            self.outbound.push(Outbound::Shutdown);
        }
    }

    /// Registers an accepted connection and queues its `Join`.
    ///
    /// The `Join` is queued while the registry is still locked, so a teardown racing
    /// with this call always queues its `Leave` after it.
    pub fn admit(&self, stream: TcpStream, peer: SocketAddr) -> io::Result<Option<Arc<Session>>> {
        self.sessions.admit(stream, peer, |session| {
            self.inbound
                .push(Event::new(EventKind::Join, session.player_id()));
        })
    }

    /// Drops a session and tells the simulation the player left.
    ///
    /// Returns false when the session was already gone; a repeated call queues
    /// nothing.
    pub fn teardown(&self, player_id: u32) -> bool {
        let Some(session) = self.sessions.remove(player_id) else {
            debug!("Session {} already torn down", player_id);
            return false;
        };
        session.close();
        info!("Session {} ({}) torn down", player_id, session.peer());
        self.inbound.push(Event::new(EventKind::Leave, player_id));
        self.outbound.push(Outbound::Wake);
        true
    }
}
