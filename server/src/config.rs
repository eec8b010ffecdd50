use crate::error::{ServerError, ServerResult};
use std::time::Duration;

/// Startup parameters. Built once, then shared read-only for the life of the process.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Simulation ticks per second.
    pub tick_rate: u32,
    /// Connections beyond this count are closed right after accept.
    pub max_sessions: usize,
    /// Upper bound on how long the reader and listener wait before polling again.
    pub poll_timeout: Duration,
    pub max_frame_len: usize,
    /// A session whose unsent bytes grow past this is considered stuck and torn down.
    pub max_outbound_bytes: usize,
    /// Pair resolutions allowed per tick before the collision pass gives up.
    pub collision_cap: usize,
    pub round_duration: Duration,
    pub min_per_side: usize,
    pub seed: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: shared::DEFAULT_PORT,
            tick_rate: 30,
            max_sessions: 16,
            poll_timeout: Duration::from_millis(10),
            max_frame_len: shared::DEFAULT_MAX_FRAME_LEN,
            max_outbound_bytes: 4 * 1024 * 1024,
            collision_cap: 4096,
            round_duration: Duration::from_secs(180),
            min_per_side: 1,
            seed: None,
        }
    }
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn tick_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_rate.max(1) as f64)
    }

    pub fn validate(&self) -> ServerResult<()> {
        if self.tick_rate == 0 {
            return Err(ServerError::Config("tick rate must be positive".into()));
        }
        if self.max_sessions == 0 {
            return Err(ServerError::Config("max sessions must be positive".into()));
        }
        if self.max_frame_len == 0 {
            return Err(ServerError::Config("max frame length must be positive".into()));
        }
        if self.collision_cap == 0 {
            return Err(ServerError::Config("collision cap must be positive".into()));
        }
        Ok(())
    }
}
