//! Peer demo.
//!
//! Dials the host demo, mirrors its replicated player, shouts at it over
//! RPC once the mirror appears, and prints the mirrored state as it drifts
//! in.
//!
//! Run the host demo first, then `cargo run --example peer
//! [host-address]` (default `127.0.0.1:7777`).

use std::error::Error;
use std::net::SocketAddr;
use std::thread::sleep;
use std::time::{Duration, Instant};

use glam::Vec3;
use tetherlink::prelude::*;

struct Player {
    base: ObjectBase,
}

impl Player {
    fn new() -> Self {
        let mut base = ObjectBase::replicated();
        base.properties.declare("health", PropertyValue::I32(100));
        base.properties
            .declare("position", PropertyValue::Vec3(Vec3::ZERO));
        Self { base }
    }
}

impl NetObject for Player {
    fn base(&self) -> &ObjectBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ObjectBase {
        &mut self.base
    }

    fn type_name(&self) -> &str {
        "Player"
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let remote: SocketAddr = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:7777".to_string())
        .parse()?;

    let mut world = World::new();
    world.register_type("Player", Box::new(|| Box::new(Player::new())));

    let mut session = NetSession::new(NetConfig::peer(remote))?;
    session.register_rpc(
        "ping",
        RpcDirection::ToAll,
        Box::new(|object, _| {
            println!("[peer] ping for object {}", object.net_id());
        }),
    )?;

    println!("[peer] connecting to {remote}");

    let dt = 1.0 / 60.0;
    let frame = Duration::from_secs_f32(dt);
    let mut shouted = false;
    let mut frames = 0u32;

    loop {
        let frame_start = Instant::now();

        world.tick_objects(dt);
        session.tick(dt, &mut world);

        while let Some(event) = session.poll_event() {
            println!("[peer] {event:?}");
            match event {
                SessionEvent::PeerDisconnected(_) | SessionEvent::ConnectDenied(_) => {
                    println!("[peer] session over");
                    return Ok(());
                }
                SessionEvent::PeerConnected(_) => {}
            }
        }

        // shout at the first mirrored object, once
        if !shouted {
            if let Some(&id) = world.ids().first() {
                let mut params = ByteStream::new();
                params.write_str("hello from a peer");
                session.call_rpc_to_host(id, "shout", params.as_bytes())?;
                shouted = true;
            }
        }

        frames += 1;
        if frames % 60 == 0 {
            if let Some(&id) = world.ids().first() {
                let mirror = world.lookup(id).unwrap();
                let health = mirror.properties().get("health").and_then(|v| v.as_i32());
                let position = mirror
                    .properties()
                    .get("position")
                    .and_then(|v| v.as_vec3())
                    .unwrap_or(Vec3::ZERO);
                println!(
                    "[peer] mirror {id}: health {health:?}, position ({:.1}, {:.1}, {:.1})",
                    position.x, position.y, position.z
                );
            }
        }

        let elapsed = frame_start.elapsed();
        if elapsed < frame {
            sleep(frame - elapsed);
        }
    }
}
