//! Network side of the server: one accept thread, one multiplexed reader and one
//! writer, all plain OS threads over non-blocking `std::net` sockets.
//!
//! None of them touch entity state. The reader posts decoded [`shared::Event`]s to
//! the inbound queue; the writer consumes [`crate::context::Outbound`] items. Failures
//! are turned into a session teardown or a log line inside the thread that saw them.

mod listener;
mod reader;
mod writer;

use crate::context::ServerContext;
use crate::error::{ServerError, ServerResult};
use crate::game_loop::GameLoop;
use crate::world::World;
use log::{error, info};
use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// A bound, not yet running server.
pub struct Server {
    ctx: Arc<ServerContext>,
    listener: TcpListener,
}

impl Server {
    pub fn bind(ctx: Arc<ServerContext>) -> ServerResult<Self> {
        ctx.config.validate()?;
        let listener = TcpListener::bind(ctx.config.address())?;
        listener.set_nonblocking(true)?;
        Ok(Self { ctx, listener })
    }

    pub fn local_addr(&self) -> ServerResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Spawns the listener, reader, writer and game loop threads.
    pub fn start(self, world: World) -> ServerResult<ServerHandle> {
        let addr = self.local_addr()?;
        let mut handle = ServerHandle {
            ctx: Arc::clone(&self.ctx),
            addr,
            threads: Vec::with_capacity(4),
        };
        if let Err(e) = spawn_all(&self.ctx, self.listener, world, &mut handle.threads) {
            // Threads that did start exit on their own once the context stops.
            handle.shutdown();
            let _ = handle.join();
            return Err(e);
        }
        info!("Server listening on {}", addr);
        Ok(handle)
    }
}

fn spawn_all(
    ctx: &Arc<ServerContext>,
    socket: TcpListener,
    world: World,
    threads: &mut Vec<(&'static str, JoinHandle<()>)>,
) -> ServerResult<()> {
    let c = Arc::clone(ctx);
    threads.push(spawn("listener", move || listener::run(c, socket))?);
    let c = Arc::clone(ctx);
    threads.push(spawn("reader", move || reader::run(c))?);
    let c = Arc::clone(ctx);
    threads.push(spawn("writer", move || writer::run(c))?);
    let c = Arc::clone(ctx);
    threads.push(spawn("game-loop", move || GameLoop::new(c, world).run())?);
    Ok(())
}

fn spawn<F>(name: &'static str, body: F) -> ServerResult<(&'static str, JoinHandle<()>)>
where
    F: FnOnce() + Send + 'static,
{
    let handle = thread::Builder::new().name(name.to_string()).spawn(body)?;
    Ok((name, handle))
}

/// Running server. Dropping it leaves the threads running; call [`ServerHandle::shutdown`]
/// and then [`ServerHandle::join`].
pub struct ServerHandle {
    ctx: Arc<ServerContext>,
    addr: SocketAddr,
    threads: Vec<(&'static str, JoinHandle<()>)>,
}

impl ServerHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn context(&self) -> &Arc<ServerContext> {
        &self.ctx
    }

    pub fn shutdown(&self) {
        self.ctx.stop();
    }

    /// Waits for every thread, then closes whatever sessions are left.
    pub fn join(self) -> ServerResult<()> {
        let mut result = Ok(());
        for (name, handle) in self.threads {
            if handle.join().is_err() {
                error!("{} thread panicked", name);
                result = Err(ServerError::ThreadPanicked(name));
            }
        }
        self.ctx.sessions.close_all();
        info!("Server stopped");
        result
    }
}
