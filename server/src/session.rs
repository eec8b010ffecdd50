//! Connected sessions and the registry that tracks them.
//!
//! The registry is the only structure shared between the network threads. Lookups
//! and iteration take the read lock and hand out `Arc<Session>` clones, so socket I/O
//! never happens while the lock is held. Inserting on accept and removing on teardown
//! take the write lock.

use parking_lot::{Mutex, RwLock};
use shared::{encode_player_id, FrameError, FrameReader};
use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use thiserror::Error;

const READ_CHUNK: usize = 4096;

/// Result of draining a socket's readable bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStatus {
    Idle,
    Received(usize),
    /// The peer closed its side. Bytes read before the close are still buffered.
    Closed,
}

#[derive(Debug, Error)]
pub enum ReadError {
    #[error("read failed: {0}")]
    Io(#[from] io::Error),

    #[error("bad frame: {0}")]
    Frame(#[from] FrameError),
}

/// One live connection.
///
/// The reader thread owns the inbound side and the writer thread the outbound side;
/// each side has its own lock so the two threads never contend.
#[derive(Debug)]
pub struct Session {
    player_id: u32,
    peer: SocketAddr,
    stream: TcpStream,
    inbound: Mutex<FrameReader>,
    outbound: Mutex<Vec<u8>>,
    closed: AtomicBool,
}

impl Session {
    fn new(player_id: u32, stream: TcpStream, peer: SocketAddr, max_frame_len: usize) -> Self {
        Self {
            player_id,
            peer,
            stream,
            inbound: Mutex::new(FrameReader::new(max_frame_len)),
            outbound: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        }
    }

    pub fn player_id(&self) -> u32 {
        self.player_id
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Reads what the socket has available without blocking, at most one full frame's
    /// worth per call so a busy peer cannot hold the reader on this session.
    pub fn fill(&self) -> Result<ReadStatus, ReadError> {
        let mut chunk = [0u8; READ_CHUNK];
        let mut reader = self.inbound.lock();
        let budget = reader.capacity();
        let mut total = 0;
        while total < budget {
            let want = READ_CHUNK.min(budget - total);
            match (&self.stream).read(&mut chunk[..want]) {
                Ok(0) => return Ok(ReadStatus::Closed),
                Ok(n) => {
                    reader.try_extend(&chunk[..n])?;
                    total += n;
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(if total == 0 {
            ReadStatus::Idle
        } else {
            ReadStatus::Received(total)
        })
    }

    /// Next complete payload buffered from the socket.
    pub fn next_frame(&self) -> Result<Option<Vec<u8>>, FrameError> {
        self.inbound.lock().next_frame()
    }

    pub fn queue(&self, bytes: &[u8]) {
        self.outbound.lock().extend_from_slice(bytes);
    }

    pub fn pending_bytes(&self) -> usize {
        self.outbound.lock().len()
    }

    /// Sends as much of the outbound buffer as the socket accepts right now.
    ///
    /// Fails on a hard socket error, or when more than `max_pending` bytes are left
    /// unsent, which means the peer has stopped reading.
    pub fn flush(&self, max_pending: usize) -> io::Result<()> {
        let mut outbound = self.outbound.lock();
        let mut sent = 0;
        let result = loop {
            if sent == outbound.len() {
                break Ok(());
            }
            match (&self.stream).write(&outbound[sent..]) {
                Ok(0) => break Err(io::ErrorKind::WriteZero.into()),
                Ok(n) => sent += n,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break Ok(()),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => break Err(e),
            }
        };
        outbound.drain(..sent);
        result?;

        if outbound.len() > max_pending {
            return Err(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("{} bytes left unsent", outbound.len()),
            ));
        }
        Ok(())
    }

    /// Shuts the socket down and frees both buffers. Safe to call more than once.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let _ = self.stream.shutdown(Shutdown::Both);
        self.outbound.lock().clear();
        *self.inbound.lock() = FrameReader::new(0);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

/// Concurrent map from player id to session.
#[derive(Debug)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<u32, Arc<Session>>>,
    next_id: AtomicU32,
    capacity: usize,
    max_frame_len: usize,
}

impl SessionRegistry {
    pub fn new(capacity: usize, max_frame_len: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            next_id: AtomicU32::new(1),
            capacity,
            max_frame_len,
        }
    }

    /// Registers a freshly accepted connection.
    ///
    /// Returns `Ok(None)` and closes the socket when the registry is full. Otherwise
    /// the next player id is written to the socket as its first four bytes, the socket
    /// is switched to non-blocking mode, and the new session is returned.
    ///
    /// `on_admit` runs before the write lock is released, so nothing that needs the
    /// lock (a teardown in particular) can act on the session before it returns.
    pub fn admit(
        &self,
        stream: TcpStream,
        peer: SocketAddr,
        on_admit: impl FnOnce(&Session),
    ) -> io::Result<Option<Arc<Session>>> {
        let mut sessions = self.sessions.write();
        if sessions.len() >= self.capacity {
            drop(sessions);
            let _ = stream.shutdown(Shutdown::Both);
            return Ok(None);
        }

        let player_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        stream.set_nonblocking(false)?;
        stream.set_nodelay(true)?;
        (&stream).write_all(&encode_player_id(player_id))?;
        stream.set_nonblocking(true)?;

        let session = Arc::new(Session::new(player_id, stream, peer, self.max_frame_len));
        sessions.insert(player_id, Arc::clone(&session));
        on_admit(&session);
        Ok(Some(session))
    }

    /// Removes a session. Only the first call for an id returns it.
    pub fn remove(&self, player_id: u32) -> Option<Arc<Session>> {
        self.sessions.write().remove(&player_id)
    }

    pub fn get(&self, player_id: u32) -> Option<Arc<Session>> {
        self.sessions.read().get(&player_id).cloned()
    }

    /// Handles to every live session, taken under the read lock.
    pub fn snapshot(&self) -> Vec<Arc<Session>> {
        self.sessions.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Closes and forgets every session.
    pub fn close_all(&self) {
        let drained: Vec<_> = self.sessions.write().drain().map(|(_, s)| s).collect();
        for session in drained {
            session.close();
        }
    }
}
