use clap::Parser;
use rand::Rng;
use shared::{
    decode_player_id, decode_state, frame_event, Event, EventKind, FrameReader, StateExtra, Vec2,
    DEFAULT_MAX_FRAME_LEN,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::TcpStream;
use tokio::time::{interval, sleep, Duration, Instant};

/// Headless client that joins, readies up and wanders around. Handy for load testing.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    #[derive(Parser, Debug)]
    #[clap(author, version, about)]
    struct Args {
        /// Server address
        #[clap(short = 'H', long, default_value = "127.0.0.1")]
        host: String,
        /// Server port
        #[clap(short, long, default_value_t = shared::DEFAULT_PORT)]
        port: u16,
        /// Display name sent with the join event
        #[clap(short, long, default_value = "bot")]
        name: String,
        /// How long to play before disconnecting, in seconds
        #[clap(short, long, default_value = "30")]
        duration: u64,
    }

    let args = Args::parse();
    let address = format!("{}:{}", args.host, args.port);
    let mut stream = TcpStream::connect(&address).await?;
    stream.set_nodelay(true)?;

    let mut id = [0u8; 4];
    stream.read_exact(&mut id).await?;
    let player_id = decode_player_id(id);
    println!("Connected to {} as player {}", address, player_id);

    let (reader, mut writer) = stream.into_split();
    let receiver = tokio::spawn(receive_states(reader, player_id));

    writer
        .write_all(&frame_event(&Event::new(EventKind::Join, player_id).with_name(&args.name))?)
        .await?;
    writer
        .write_all(&frame_event(&Event::new(EventKind::Ready, player_id))?)
        .await?;

    let deadline = Instant::now() + Duration::from_secs(args.duration);
    let mut ticker = interval(Duration::from_millis(500));
    let mut rng = rand::thread_rng();

    while Instant::now() < deadline {
        ticker.tick().await;
        let angle: f32 = rng.gen_range(0.0..std::f32::consts::TAU);
        let direction = Vec2::new(angle.cos(), angle.sin());

        let mut batch = Vec::new();
        batch.extend(frame_event(
            &Event::new(EventKind::Look, player_id).with_direction(direction),
        )?);
        batch.extend(frame_event(
            &Event::new(EventKind::Move, player_id).with_direction(direction),
        )?);
        if rng.gen_bool(0.1) {
            batch.extend(frame_event(&Event::new(EventKind::Sprint, player_id))?);
        }
        if rng.gen_bool(0.2) {
            batch.extend(frame_event(&Event::new(EventKind::Throw, player_id))?);
        }
        writer.write_all(&batch).await?;
    }

    writer
        .write_all(&frame_event(&Event::new(EventKind::Leave, player_id))?)
        .await?;
    writer.shutdown().await?;
    sleep(Duration::from_millis(100)).await;
    receiver.abort();

    println!("Bot client finished");
    Ok(())
}

/// Reads state frames until the server closes the connection.
async fn receive_states(mut reader: OwnedReadHalf, player_id: u32) {
    let mut frames = FrameReader::new(DEFAULT_MAX_FRAME_LEN);
    let mut buf = [0u8; 4096];
    let mut received = 0usize;

    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                println!("Read error: {}", e);
                break;
            }
        };
        frames.extend(&buf[..n]);

        loop {
            match frames.next_frame() {
                Ok(Some(payload)) => match decode_state(&payload) {
                    Ok(state) => {
                        received += 1;
                        if let StateExtra::Avatar { owner, jailed, .. } = state.extra {
                            if owner == player_id && jailed {
                                println!("Player {} is in jail", player_id);
                            }
                        }
                    }
                    Err(e) => println!("Failed to decode state: {}", e),
                },
                Ok(None) => break,
                Err(e) => {
                    println!("Framing error: {}", e);
                    return;
                }
            }
        }
    }

    println!("Server closed the connection after {} states", received);
}
