//! Authoritative host demo.
//!
//! Listens on port 7777, spawns one replicated player that circles the
//! origin and loses health, answers the peer demo's `shout` procedure, and
//! pings every peer once per second.
//!
//! Run with `cargo run --example host`, then start one or more
//! `cargo run --example peer` alongside it.

use std::error::Error;
use std::thread::sleep;
use std::time::{Duration, Instant};

use glam::Vec3;
use tetherlink::prelude::*;

struct Player {
    base: ObjectBase,
    age: f32,
}

impl Player {
    fn new() -> Self {
        let mut base = ObjectBase::replicated();
        base.properties.declare("health", PropertyValue::I32(100));
        base.properties
            .declare("position", PropertyValue::Vec3(Vec3::ZERO));
        Self { base, age: 0.0 }
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

    fn tick(&mut self, dt: f32) {
        self.age += dt;

        let position = Vec3::new(self.age.cos() * 5.0, 0.0, self.age.sin() * 5.0);
        self.base.position = position;
        self.base
            .properties
            .set("position", PropertyValue::Vec3(position));

        let health = (100 - self.age as i32).max(0);
        self.base
            .properties
            .set("health", PropertyValue::I32(health));
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let mut world = World::new();
    world.register_type("Player", Box::new(|| Box::new(Player::new())));

    let mut session = NetSession::new(NetConfig::host(7777, 16))?;
    session.register_rpc(
        "shout",
        RpcDirection::ToHost,
        Box::new(|object, params| {
            let message = params.read_string().unwrap_or_default();
            println!("[host] object {} heard: {message}", object.net_id());
        }),
    )?;

    let player_id = world.spawn(Box::new(Player::new()));
    println!("[host] listening on 7777, spawned player {player_id}");

    let dt = 1.0 / 60.0;
    let frame = Duration::from_secs_f32(dt);
    let mut since_ping = 0.0f32;

    loop {
        let frame_start = Instant::now();

        world.tick_objects(dt);
        session.tick(dt, &mut world);

        while let Some(event) = session.poll_event() {
            println!("[host] {event:?}");
        }

        since_ping += dt;
        if since_ping >= 1.0 && !session.driver().connected_peers().is_empty() {
            since_ping = 0.0;
            session.call_rpc_to_all(player_id, "ping", &[])?;
        }

        let elapsed = frame_start.elapsed();
        if elapsed < frame {
            sleep(frame - elapsed);
        }
    }
}
