//! # Kennel Game Server
//!
//! Authoritative server for a team chase game played between humans and dogs. It owns
//! the canonical world, applies player input on a fixed tick, resolves collisions, and
//! replicates changed entity state to every connected client over TCP.
//!
//! ## Architecture
//!
//! ### Four Threads
//! The process runs four long-lived OS threads and nothing per connection:
//! - **Listener**: accepts connections, enforces the session limit, and sends each new
//!   client its player id as the first four bytes on the wire
//! - **Reader**: polls every session's non-blocking socket, reassembles length-prefixed
//!   frames, and posts decoded events to the inbound queue
//! - **Writer**: pops one outbound state record at a time and sends it to one session
//!   or to all of them
//! - **Game Loop**: drains inbound events, advances the world, and queues the records
//!   that changed
//!
//! ### Single Mutator
//! Only the game loop thread touches entities. The network threads move opaque bytes
//! and fully-formed events or state records through two [`queue::BlockingQueue`]s. The
//! session registry is the one structure the threads share, behind a reader/writer lock.
//!
//! ### No Globals
//! Configuration, sessions, queues and the running flag live in one
//! [`context::ServerContext`], built at startup and passed to each thread as an `Arc`.
//!
//! ## Module Organization
//!
//! ### Simulation
//! - `entity`: entity state, per-kind behaviour and dirty tracking
//! - `collider`: narrow-phase overlap tests and push-back corrections
//! - `spatial`: region quadtree used as the collision broad phase
//! - `collision`: per-tick pair discovery and iterative resolution
//! - `events`: per-tick grouping, deduplication and ordering of input events
//! - `lobby`: roster, sides and ready state
//! - `level`: startup level layout
//! - `world`: ties the above together into one tick
//!
//! ### Runtime
//! - `config`: startup parameters
//! - `context`: shared handles and outbound item type
//! - `session`: per-connection sockets and buffers
//! - `network`: listener, reader and writer threads
//! - `game_loop`: fixed-rate driver with overrun detection
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::context::ServerContext;
//! use server::level::ArenaLevel;
//! use server::network::Server;
//! use server::world::World;
//! use std::sync::Arc;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::default();
//!     let world = World::new(&config, &ArenaLevel::default());
//!     let ctx = Arc::new(ServerContext::new(config));
//!
//!     let handle = Server::bind(ctx)?.start(world)?;
//!     // ... later
//!     handle.shutdown();
//!     handle.join()?;
//!     Ok(())
//! }
//! ```

pub mod collider;
pub mod collision;
pub mod config;
pub mod context;
pub mod entity;
pub mod error;
pub mod events;
pub mod game_loop;
pub mod level;
pub mod lobby;
pub mod network;
pub mod queue;
pub mod session;
pub mod spatial;
pub mod world;

pub use error::{ServerError, ServerResult};
