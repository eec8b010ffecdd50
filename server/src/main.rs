use clap::Parser;
use log::info;
use server::config::ServerConfig;
use server::context::ServerContext;
use server::level::ArenaLevel;
use server::network::Server;
use server::world::World;
use std::sync::Arc;
use std::time::Duration;

/// Parses command-line arguments, starts the server threads and waits for Ctrl+C.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Command line arguments
    #[derive(Parser, Debug)]
    #[clap(author, version, about)]
    struct Args {
        /// Server IP address to bind to
        #[clap(short = 'H', long, default_value = "127.0.0.1")]
        host: String,
        /// Server port to listen on
        #[clap(short, long, default_value_t = shared::DEFAULT_PORT)]
        port: u16,
        /// Tick rate (updates per second)
        #[clap(short, long, default_value = "30")]
        tick_rate: u32,
        /// Maximum number of concurrent sessions
        #[clap(short, long, default_value = "16")]
        max_sessions: usize,
        /// How long the network threads wait between idle polls, in milliseconds
        #[clap(long, default_value = "10")]
        poll_timeout_ms: u64,
        /// Largest accepted inbound frame, in bytes
        #[clap(long, default_value_t = shared::DEFAULT_MAX_FRAME_LEN)]
        max_frame_len: usize,
        /// Unsent bytes after which a session is considered stuck
        #[clap(long, default_value = "4194304")]
        max_outbound_bytes: usize,
        /// Collision pairs resolved per tick before giving up
        #[clap(long, default_value = "4096")]
        collision_cap: usize,
        /// Round length in seconds
        #[clap(long, default_value = "180")]
        round_secs: u64,
        /// Players needed on each side before a round starts
        #[clap(long, default_value = "1")]
        min_per_side: usize,
        /// Seed for jail and doghouse choices
        #[clap(long)]
        seed: Option<u64>,
    }

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Parse command line arguments
    let args = Args::parse();
    let config = ServerConfig {
        host: args.host,
        port: args.port,
        tick_rate: args.tick_rate,
        max_sessions: args.max_sessions,
        poll_timeout: Duration::from_millis(args.poll_timeout_ms),
        max_frame_len: args.max_frame_len,
        max_outbound_bytes: args.max_outbound_bytes,
        collision_cap: args.collision_cap,
        round_duration: Duration::from_secs(args.round_secs),
        min_per_side: args.min_per_side,
        seed: args.seed,
    };
    config.validate()?;

    let world = World::new(&config, &ArenaLevel::default());
    let ctx = Arc::new(ServerContext::new(config));
    let handle = Server::bind(ctx)?.start(world)?;

    tokio::signal::ctrl_c().await?;
    info!("Received Ctrl+C, shutting down gracefully...");
    handle.shutdown();

    // Joining blocks, so keep it off the runtime's worker threads.
    tokio::task::spawn_blocking(move || handle.join()).await??;
    Ok(())
}
