//! Integration tests for the networked server
//!
//! These tests run the real listener, reader, writer and game loop threads on a local
//! port and talk to them over TCP, the way a game client would.

use serde::Serialize;
use server::config::ServerConfig;
use server::context::ServerContext;
use server::entity::{DoghouseNetwork, Entity, EntityIds};
use server::level::{Level, LevelProvider};
use server::network::{Server, ServerHandle};
use server::world::World;
use shared::{
    decode_event, decode_player_id, decode_state, encode_frame, frame_event, EntityKind, Event,
    EventKind, FrameReader, State, StateExtra, Vec2, Vec3,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{sleep, timeout};
use tokio_test::assert_ok;

/// Two walls well away from the spawn points, so idle avatars never collide.
struct WallsOnly;

impl LevelProvider for WallsOnly {
    fn build(&self, ids: &mut EntityIds) -> Level {
        Level {
            entities: vec![
                Entity::wall(ids.next_id(), Vec3::new(0.0, 0.0, 20.0), 10.0, 1.0, 2.0),
                Entity::wall(ids.next_id(), Vec3::new(0.0, 0.0, -20.0), 10.0, 1.0, 2.0),
            ],
            human_spawns: vec![Vec3::new(-5.0, 0.0, 0.0)],
            dog_spawns: vec![Vec3::new(5.0, 0.0, 0.0)],
            jail_points: vec![Vec3::new(0.0, 0.0, 15.0)],
            doghouses: DoghouseNetwork::default(),
            center: Vec2::ZERO,
            half_extent: 30.0,
        }
    }
}

fn test_config() -> ServerConfig {
    ServerConfig {
        port: 0,
        seed: Some(42),
        poll_timeout: Duration::from_millis(5),
        ..ServerConfig::default()
    }
}

fn start_server(config: ServerConfig) -> ServerHandle {
    let world = World::new(&config, &WallsOnly);
    let ctx = Arc::new(ServerContext::new(config));
    let server = Server::bind(ctx).expect("bind");
    server.start(world).expect("start")
}

async fn stop_server(handle: ServerHandle) {
    handle.shutdown();
    let joined = tokio::task::spawn_blocking(move || handle.join())
        .await
        .expect("join task");
    assert_ok!(joined);
}

/// Minimal client speaking the wire protocol.
struct TestClient {
    stream: TcpStream,
    frames: FrameReader,
    player_id: u32,
}

impl TestClient {
    async fn connect(handle: &ServerHandle) -> std::io::Result<Self> {
        let mut stream = TcpStream::connect(handle.local_addr()).await?;
        let mut id = [0u8; 4];
        timeout(Duration::from_secs(2), stream.read_exact(&mut id))
            .await
            .map_err(|_| std::io::Error::from(std::io::ErrorKind::TimedOut))??;
        Ok(Self {
            stream,
            frames: FrameReader::new(shared::DEFAULT_MAX_FRAME_LEN),
            player_id: decode_player_id(id),
        })
    }

    async fn send(&mut self, kind: EventKind) {
        let bytes = frame_event(&Event::new(kind, self.player_id)).unwrap();
        self.stream.write_all(&bytes).await.unwrap();
    }

    /// Next state record, or None once nothing arrives for `quiet`.
    async fn next_state(&mut self, quiet: Duration) -> Option<State> {
        loop {
            if let Some(payload) = self.frames.next_frame().unwrap() {
                return Some(decode_state(&payload).unwrap());
            }
            let mut buf = [0u8; 4096];
            match timeout(quiet, self.stream.read(&mut buf)).await {
                Ok(Ok(0)) | Ok(Err(_)) | Err(_) => return None,
                Ok(Ok(n)) => self.frames.extend(&buf[..n]),
            }
        }
    }

    async fn drain(&mut self, quiet: Duration) -> Vec<State> {
        let mut states = Vec::new();
        while let Some(state) = self.next_state(quiet).await {
            states.push(state);
        }
        states
    }
}

fn owner(state: &State) -> Option<u32> {
    match state.extra {
        StateExtra::Avatar { owner, .. } => Some(owner),
        _ => None,
    }
}

const QUIET: Duration = Duration::from_millis(400);

/// WIRE PROTOCOL TESTS
mod protocol_tests {
    use super::*;

    /// Frames written a few bytes at a time still reassemble into the original event
    #[tokio::test]
    async fn framing_over_tcp_survives_fragmentation() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let events = vec![
            Event::new(EventKind::Join, 1).with_name("ann"),
            Event::new(EventKind::Move, 1).with_direction(Vec2::new(0.0, -1.0)),
            Event::new(EventKind::Throw, 1),
        ];
        let mut bytes = Vec::new();
        for event in &events {
            bytes.extend(frame_event(event).unwrap());
        }

        let sender = tokio::spawn(async move {
            let mut stream = TcpStream::connect(addr).await.unwrap();
            for chunk in bytes.chunks(3) {
                stream.write_all(chunk).await.unwrap();
                stream.flush().await.unwrap();
                sleep(Duration::from_millis(1)).await;
            }
        });

        let (mut stream, _) = listener.accept().await.unwrap();
        let mut reader = FrameReader::new(1024);
        let mut decoded = Vec::new();
        let mut buf = [0u8; 64];
        while decoded.len() < events.len() {
            let n = stream.read(&mut buf).await.unwrap();
            assert!(n > 0, "stream closed early");
            reader.extend(&buf[..n]);
            while let Some(payload) = reader.next_frame().unwrap() {
                decoded.push(decode_event(&payload).unwrap());
            }
        }

        assert_ok!(sender.await);
        assert_eq!(decoded, events);
    }

    /// The very first bytes from the server are the bare player id
    #[tokio::test]
    async fn player_id_precedes_any_frame() {
        let handle = start_server(test_config());

        let first = assert_ok!(TestClient::connect(&handle).await);
        let second = assert_ok!(TestClient::connect(&handle).await);
        assert_eq!(first.player_id, 1);
        assert_eq!(second.player_id, 2);

        stop_server(handle).await;
    }
}

/// SERVER SCENARIO TESTS
mod server_tests {
    use super::*;

    /// Two players ready up, one disconnects mid-round, the other sees exactly one deletion
    #[tokio::test]
    async fn two_players_round_and_disconnect() {
        let handle = start_server(test_config());

        let mut c1 = assert_ok!(TestClient::connect(&handle).await);
        let mut c2 = assert_ok!(TestClient::connect(&handle).await);
        assert_eq!((c1.player_id, c2.player_id), (1, 2));

        // Lobby snapshot of the level
        let lobby_view = c1.drain(QUIET).await;
        assert!(lobby_view.iter().all(|s| s.kind == EntityKind::Wall));
        c2.drain(QUIET).await;

        c1.send(EventKind::Ready).await;
        c2.send(EventKind::Ready).await;

        for client in [&mut c1, &mut c2] {
            let full = client.drain(QUIET).await;
            assert_eq!(full.len(), 4, "full world snapshot expected");
            let human = full.iter().find(|s| s.kind == EntityKind::Human).unwrap();
            let dog = full.iter().find(|s| s.kind == EntityKind::Dog).unwrap();
            assert_eq!(owner(human), Some(1));
            assert_eq!(owner(dog), Some(2));
            assert_eq!(human.position, Vec3::new(-5.0, 0.0, 0.0));
            assert_eq!(dog.position, Vec3::new(5.0, 0.0, 0.0));
        }

        drop(c1);

        let after = c2.drain(QUIET).await;
        assert_eq!(after.len(), 1, "unexpected records: {:?}", after);
        assert!(after[0].destroyed);
        assert_eq!(owner(&after[0]), Some(1));
        assert_eq!(handle.context().sessions.len(), 1);

        stop_server(handle).await;
    }

    /// The connection decides who an event is from, whatever id the payload claims
    #[tokio::test]
    async fn forged_player_id_is_replaced_by_session_id() {
        let handle = start_server(test_config());
        let mut c1 = assert_ok!(TestClient::connect(&handle).await);
        let mut c2 = assert_ok!(TestClient::connect(&handle).await);
        c1.drain(QUIET).await;
        c2.drain(QUIET).await;

        let forged = frame_event(&Event::new(EventKind::Ready, 999)).unwrap();
        c1.stream.write_all(&forged).await.unwrap();
        c2.send(EventKind::Ready).await;

        // The round only starts if player 1 is the one who became ready.
        let full = c2.drain(QUIET).await;
        assert_eq!(full.len(), 4);
        assert!(full
            .iter()
            .any(|s| s.kind == EntityKind::Human && owner(s) == Some(c1.player_id)));

        stop_server(handle).await;
    }

    /// A client that stops reading is torn down and its avatar removed like any leave
    #[tokio::test]
    async fn stuck_peer_is_torn_down() {
        let handle = start_server(ServerConfig {
            max_outbound_bytes: 1024,
            ..test_config()
        });
        let mut stuck = assert_ok!(TestClient::connect(&handle).await);
        let mut other = assert_ok!(TestClient::connect(&handle).await);
        stuck.drain(QUIET).await;
        other.drain(QUIET).await;
        stuck.send(EventKind::Ready).await;
        other.send(EventKind::Ready).await;
        stuck.drain(QUIET).await;
        assert_eq!(other.drain(QUIET).await.len(), 4);

        // From here on `stuck` never reads; pile up more than its socket can absorb.
        let session = handle.context().sessions.get(stuck.player_id).unwrap();
        session.queue(&vec![0u8; 64 << 20]);

        let after = other.drain(QUIET).await;
        assert_eq!(after.len(), 1, "unexpected records: {:?}", after);
        assert!(after[0].destroyed);
        assert_eq!(owner(&after[0]), Some(stuck.player_id));
        assert!(handle.context().sessions.get(stuck.player_id).is_none());
        assert!(session.is_closed());

        stop_server(handle).await;
    }

    /// Connections beyond the session limit are closed without an id
    #[tokio::test]
    async fn capacity_rejects_extra_connection() {
        let handle = start_server(ServerConfig {
            max_sessions: 1,
            ..test_config()
        });

        let _first = assert_ok!(TestClient::connect(&handle).await);
        assert!(TestClient::connect(&handle).await.is_err());
        assert_eq!(handle.context().sessions.len(), 1);

        stop_server(handle).await;
    }

    /// A voluntary leave tears the session down once; a repeat teardown is a no-op
    #[tokio::test]
    async fn leave_tears_down_once() {
        let handle = start_server(test_config());
        let mut client = assert_ok!(TestClient::connect(&handle).await);
        client.drain(QUIET).await;

        client.send(EventKind::Leave).await;
        assert!(client.drain(QUIET).await.is_empty());
        assert!(handle.context().sessions.is_empty());
        assert!(!handle.context().teardown(client.player_id));

        stop_server(handle).await;
    }

    /// Oversized frames end the session, other sessions carry on
    #[tokio::test]
    async fn oversized_frame_closes_only_that_session() {
        let handle = start_server(ServerConfig {
            max_frame_len: 128,
            ..test_config()
        });
        let mut bad = assert_ok!(TestClient::connect(&handle).await);
        let mut good = assert_ok!(TestClient::connect(&handle).await);
        bad.drain(QUIET).await;
        good.drain(QUIET).await;

        bad.stream.write_all(&encode_frame(&[0u8; 512])).await.unwrap();
        sleep(QUIET).await;

        assert_eq!(handle.context().sessions.len(), 1);
        assert!(handle.context().sessions.get(good.player_id).is_some());
        let mut buf = [0u8; 8];
        let closed = timeout(QUIET, bad.stream.read(&mut buf)).await;
        assert!(matches!(closed, Ok(Ok(0)) | Ok(Err(_))));

        stop_server(handle).await;
    }

    /// Unknown event kinds are dropped without disconnecting the sender
    #[tokio::test]
    async fn unknown_event_kind_is_dropped() {
        #[derive(Serialize)]
        struct RawEvent {
            kind: u8,
            player_id: u32,
            name: Option<String>,
            direction: Option<Vec2>,
        }

        let handle = start_server(test_config());
        let mut client = assert_ok!(TestClient::connect(&handle).await);
        client.drain(QUIET).await;

        let raw = RawEvent {
            kind: 200,
            player_id: client.player_id,
            name: None,
            direction: None,
        };
        let payload = bincode::serialize(&raw).unwrap();
        client.stream.write_all(&encode_frame(&payload)).await.unwrap();
        sleep(QUIET).await;

        assert_eq!(handle.context().sessions.len(), 1);

        stop_server(handle).await;
    }
}
