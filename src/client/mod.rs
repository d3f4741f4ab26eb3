pub mod chat;
pub mod login;
pub mod movement;
pub mod world;
pub mod zone;

use std::collections::{BTreeMap, VecDeque};
use std::net::ToSocketAddrs;
use std::sync::Arc;
use std::time::Instant;

use glam::Vec3;

use crate::config::InstanceConfig;
use crate::entities::entity::EntityList;
use crate::error::ClientError;
use crate::net::packet::PacketReader;
use crate::net::session::Session;
use crate::proto::login::WorldServer;
use crate::proto::opcodes::opcode_name;
use crate::proto::world::ChatServerInfo;
use crate::telemetry::logging;
use crate::world::pathfind::Pathfinder;
use crate::world::zone_map::ZoneMap;
use movement::{MoveGate, MovementEngine, TickContext};

/// All world servers advertise their zone handoff on this port.
pub const WORLD_PORT: u16 = 9000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Login,
    World,
    Zone,
}

/// A frame produced by a handler, waiting for the pump to hand it to its
/// session. Keeping senders socket-free makes the state machines testable
/// against recorded frames.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outbound {
    pub stream: StreamKind,
    pub data: Vec<u8>,
    pub reliable: bool,
}

/// Per-zone-session bring-up flags; every send in the choreography is
/// guarded by its flag so replays stay idempotent.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ZoneFlags {
    pub session_established: bool,
    pub weather_received: bool,
    pub req_new_zone_sent: bool,
    pub new_zone_received: bool,
    pub aa_table_sent: bool,
    pub update_aa_sent: bool,
    pub tributes_sent: bool,
    pub guild_tributes_sent: bool,
    pub req_client_spawn_sent: bool,
    pub world_objects_sent: bool,
    pub exp_zonein_sent: bool,
    pub send_exp_zonein_received: bool,
    pub server_filter_sent: bool,
    pub client_ready_sent: bool,
    pub aa_table_count: u32,
    pub tribute_count: u32,
    pub guild_tribute_count: u32,
}

/// One headless client instance: the three-phase protocol driver plus the
/// movement engine and entity model it feeds.
pub struct Client {
    pub(crate) instance: InstanceConfig,
    pub(crate) debug_level: u8,

    pub(crate) login_session: Option<Session>,
    pub(crate) world_session: Option<Session>,
    pub(crate) zone_session: Option<Session>,
    pub(crate) outbound: VecDeque<Outbound>,
    pub(crate) login_addr: String,
    pub(crate) login_reconnect: bool,
    pub(crate) pending_world_connect: Option<(String, u16)>,
    pub(crate) pending_zone_connect: Option<(String, u16)>,

    pub(crate) login_sequence: u32,
    pub(crate) dbid: u32,
    pub(crate) key: String,
    pub(crate) world_servers: BTreeMap<u32, WorldServer>,

    pub(crate) login_info_sent: bool,
    pub(crate) world_ready: bool,
    pub(crate) enter_world_sent: bool,
    pub(crate) char_select_index: Option<usize>,
    pub(crate) chat_server: Option<ChatServerInfo>,
    pub(crate) zone_host: String,
    pub(crate) zone_port: u16,

    pub(crate) zone_connected: bool,
    pub(crate) flags: ZoneFlags,
    pub(crate) zone_name: String,
    pub(crate) entities: EntityList,
    pub(crate) my_spawn_id: u32,
    pub(crate) pathfinder: Option<Pathfinder>,
    pub(crate) zone_map: Option<ZoneMap>,
    pub(crate) movement: MovementEngine,
    pub(crate) move_gate: Arc<MoveGate>,

    pub(crate) failed: bool,
}

impl Client {
    pub fn new(instance: InstanceConfig, debug_level: u8, pathfinding: bool) -> Self {
        let move_gate = Arc::new(MoveGate::new());
        Self {
            instance,
            debug_level,
            login_session: None,
            world_session: None,
            zone_session: None,
            outbound: VecDeque::new(),
            login_addr: String::new(),
            login_reconnect: true,
            pending_world_connect: None,
            pending_zone_connect: None,
            login_sequence: 2,
            dbid: 0,
            key: String::new(),
            world_servers: BTreeMap::new(),
            login_info_sent: false,
            world_ready: false,
            enter_world_sent: false,
            char_select_index: None,
            chat_server: None,
            zone_host: String::new(),
            zone_port: 0,
            zone_connected: false,
            flags: ZoneFlags::default(),
            zone_name: String::new(),
            entities: EntityList::new(),
            my_spawn_id: 0,
            pathfinder: None,
            zone_map: None,
            movement: MovementEngine::new(move_gate.clone(), pathfinding),
            move_gate,
            failed: false,
        }
    }

    /// Resolves the login host and dials the login server.
    pub fn start(&mut self) -> Result<(), ClientError> {
        let addr = (self.instance.host.as_str(), self.instance.port)
            .to_socket_addrs()
            .map_err(|err| {
                ClientError::Resolve(format!(
                    "could not resolve {}: {}",
                    self.instance.host, err
                ))
            })?
            .next()
            .ok_or_else(|| {
                ClientError::Resolve(format!("no address for {}", self.instance.host))
            })?;
        self.login_addr = addr.ip().to_string();
        println!(
            "Connecting to {}:{} as '{}' ({} / {})",
            self.login_addr, self.instance.port, self.instance.user, self.instance.server,
            self.instance.character
        );
        self.open_login_session()?;
        Ok(())
    }

    fn open_login_session(&mut self) -> Result<(), ClientError> {
        let session = Session::connect(&self.login_addr, self.instance.port)
            .map_err(ClientError::Transport)?;
        self.login_session = Some(session);
        Ok(())
    }

    pub fn move_gate(&self) -> Arc<MoveGate> {
        self.move_gate.clone()
    }

    pub fn has_failed(&self) -> bool {
        self.failed
    }

    pub fn debug_level(&self) -> u8 {
        self.debug_level
    }

    pub fn set_debug_level(&mut self, level: u8) {
        self.debug_level = level;
    }

    /// Movement and chat are only legal after `ClientReady` has gone out.
    pub fn fully_zoned_in(&self) -> bool {
        self.zone_connected && self.flags.client_ready_sent
    }

    /// One pump iteration: establish pending connections, drain session
    /// events through the state machines, then flush queued sends.
    pub fn pump(&mut self) {
        self.establish_pending();

        if let Some(mut session) = self.login_session.take() {
            let events = session.poll();
            self.login_session = Some(session);
            for event in events {
                self.on_login_event(event);
            }
        }
        if let Some(mut session) = self.world_session.take() {
            let events = session.poll();
            self.world_session = Some(session);
            for event in events {
                self.on_world_event(event);
            }
        }
        if let Some(mut session) = self.zone_session.take() {
            let events = session.poll();
            self.zone_session = Some(session);
            for event in events {
                self.on_zone_event(event);
            }
        }

        self.flush_outbound();
    }

    /// Movement tick; also keeps the self entity coherent with the movement
    /// engine's scalars.
    pub fn tick(&mut self, now: Instant) {
        if !self.fully_zoned_in() {
            return;
        }
        let outcome = {
            let ctx = TickContext {
                entities: &self.entities,
                pathfinder: self.pathfinder.as_ref(),
                zone_map: self.zone_map.as_ref(),
            };
            self.movement.tick(now, &ctx)
        };
        self.sync_self_entity(now);
        if outcome.send_update {
            self.send_position_update();
        }
    }

    pub(crate) fn sync_self_entity(&mut self, now: Instant) {
        if self.my_spawn_id == 0 {
            return;
        }
        let position = self.movement.position();
        let heading = self.movement.heading();
        let animation = self.movement.animation();
        if let Some(entity) = self.entities.get_mut(self.my_spawn_id) {
            entity.x = position.x;
            entity.y = position.y;
            entity.z = position.z;
            entity.heading = heading;
            entity.animation = animation;
            entity.last_update = now;
        }
    }

    /// A position update with spawn id zero would be interpreted as a
    /// broadcast by the server, so those are suppressed.
    pub(crate) fn send_position_update(&mut self) {
        let spawn_id = (self.my_spawn_id & 0xffff) as u16;
        if spawn_id == 0 || !self.fully_zoned_in() {
            return;
        }
        let frame = self.movement.build_update(spawn_id);
        self.send(StreamKind::Zone, frame);
    }

    fn establish_pending(&mut self) {
        if let Some((host, port)) = self.pending_world_connect.take() {
            match Session::connect(&host, port) {
                Ok(session) => {
                    println!("Connecting to world at {}:{}", host, port);
                    self.world_session = Some(session);
                }
                Err(err) => {
                    logging::log_error(&format!("world connect failed: {}", err));
                    eprintln!("world connect failed: {}", err);
                    self.failed = true;
                }
            }
        }
        if let Some((host, port)) = self.pending_zone_connect.take() {
            match Session::connect(&host, port) {
                Ok(session) => {
                    println!("Connecting to zone at {}:{}", host, port);
                    self.zone_session = Some(session);
                }
                Err(err) => {
                    logging::log_error(&format!("zone connect failed: {}", err));
                    eprintln!("zone connect failed: {}", err);
                    self.failed = true;
                }
            }
        }
    }

    fn flush_outbound(&mut self) {
        while let Some(outbound) = self.outbound.pop_front() {
            let session = match outbound.stream {
                StreamKind::Login => self.login_session.as_mut(),
                StreamKind::World => self.world_session.as_mut(),
                StreamKind::Zone => self.zone_session.as_mut(),
            };
            match session {
                Some(session) => session.queue_packet(&outbound.data, outbound.reliable),
                None => logging::log_error(&format!(
                    "dropping {} frame for closed {:?} session",
                    opcode_name(frame_opcode(&outbound.data)),
                    outbound.stream
                )),
            }
        }
    }

    pub(crate) fn send(&mut self, stream: StreamKind, data: Vec<u8>) {
        self.dump_packet("C->S", &data);
        self.outbound.push_back(Outbound {
            stream,
            data,
            reliable: true,
        });
    }

    pub(crate) fn send_unreliable(&mut self, stream: StreamKind, data: Vec<u8>) {
        self.dump_packet("C->S", &data);
        self.outbound.push_back(Outbound {
            stream,
            data,
            reliable: false,
        });
    }

    pub(crate) fn debug(&self, level: u8, message: &str) {
        if self.debug_level >= level {
            println!("{}", message);
        }
    }

    pub(crate) fn dump_packet(&self, prefix: &str, frame: &[u8]) {
        if self.debug_level < 3 {
            return;
        }
        let opcode = frame_opcode(frame);
        println!(
            "[Packet {}] [{}] [{:#06x}] Size [{}]",
            prefix,
            opcode_name(opcode),
            opcode,
            frame.len()
        );
        println!("{}", logging::hex_dump(frame));
    }

    // --- shared state the REPL reads ---

    pub fn location(&self) -> (Vec3, f32) {
        (self.movement.position(), self.movement.heading())
    }

    pub fn is_moving(&self) -> bool {
        self.movement.is_moving()
    }

    pub fn set_pathfinding(&mut self, enabled: bool) {
        self.movement.set_pathfinding(enabled);
    }

    pub fn pathfinding_enabled(&self) -> bool {
        self.movement.pathfinding_enabled()
    }

    pub fn set_move_speed(&mut self, speed: f32) {
        self.movement.set_move_speed(speed);
    }

    /// Nearest-first entity listing for the `list` command.
    pub fn list_entities(&self, search: Option<&str>) -> Result<String, ClientError> {
        if !self.fully_zoned_in() {
            return Err(ClientError::NotInZone);
        }
        if self.entities.is_empty() {
            return Ok("No entities in zone".to_string());
        }
        let origin = self.movement.position();
        let matches = self.entities.enumerate_near(origin, search);
        if matches.is_empty() {
            return Ok(format!(
                "No entities found matching '{}'",
                search.unwrap_or("")
            ));
        }
        let mut out = match search {
            Some(search) => format!("Entities matching '{}' in zone:", search),
            None => format!("Entities in zone ({} total):", self.entities.len()),
        };
        for entity in matches.iter().take(20) {
            out.push_str(&format!(
                "\n  {} (ID: {}) - Level {} - {:.1} units away at ({:.0}, {:.0}, {:.0})",
                entity.name,
                entity.spawn_id,
                entity.level,
                entity.distance_to(origin),
                entity.x,
                entity.y,
                entity.z
            ));
            if entity.hp_percent < 100 {
                out.push_str(&format!("\n    HP: {}%", entity.hp_percent));
            }
        }
        if matches.len() > 20 {
            out.push_str("\n  ... and more");
        }
        Ok(out)
    }

    // --- movement entry points used by the command thread ---

    pub fn move_to(&mut self, x: f32, y: f32, z: f32) -> Result<(), ClientError> {
        if !self.fully_zoned_in() {
            return Err(ClientError::NotInZone);
        }
        self.movement
            .move_to(Vec3::new(x, y, z), self.pathfinder.as_ref());
        self.send_position_update();
        Ok(())
    }

    pub fn move_to_entity(&mut self, name: &str) -> Result<(), ClientError> {
        if !self.fully_zoned_in() {
            return Err(ClientError::NotInZone);
        }
        let target = self
            .entities
            .find_by_name_prefix(name)
            .map(|entity| entity.position())
            .ok_or_else(|| ClientError::Protocol(format!("entity '{}' not found", name)))?;
        self.movement.move_to(target, self.pathfinder.as_ref());
        self.send_position_update();
        Ok(())
    }

    pub fn follow(&mut self, name: &str) -> Result<String, ClientError> {
        if !self.fully_zoned_in() {
            return Err(ClientError::NotInZone);
        }
        let resolved = self
            .entities
            .find_by_name_prefix(name)
            .map(|entity| entity.name.clone())
            .ok_or_else(|| ClientError::Protocol(format!("entity '{}' not found", name)))?;
        self.movement.follow(&resolved);
        Ok(resolved)
    }

    pub fn stop_follow(&mut self) -> Option<String> {
        let previous = self.movement.stop_follow();
        self.send_position_update();
        previous
    }

    pub fn stop_movement(&mut self) {
        self.movement.stop();
        self.send_position_update();
    }

    pub fn face(&mut self, x: f32, y: f32, z: f32) -> Result<(), ClientError> {
        if !self.fully_zoned_in() {
            return Err(ClientError::NotInZone);
        }
        self.movement.face(Vec3::new(x, y, z));
        self.send_position_update();
        Ok(())
    }

    pub fn face_entity(&mut self, name: &str) -> Result<(), ClientError> {
        if !self.fully_zoned_in() {
            return Err(ClientError::NotInZone);
        }
        let target = self
            .entities
            .find_by_name_prefix(name)
            .map(|entity| entity.position())
            .ok_or_else(|| ClientError::Protocol(format!("entity '{}' not found", name)))?;
        self.movement.face(target);
        self.send_position_update();
        Ok(())
    }

    pub fn turn(&mut self, degrees: f32) -> Result<(), ClientError> {
        if !self.fully_zoned_in() {
            return Err(ClientError::NotInZone);
        }
        self.movement.set_heading(degrees);
        self.send_position_update();
        Ok(())
    }
}

pub(crate) fn frame_opcode(frame: &[u8]) -> u16 {
    PacketReader::new(frame).u16_at(0).unwrap_or(0)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::config::InstanceConfig;

    pub fn test_client() -> Client {
        Client::new(
            InstanceConfig {
                host: "login.test".to_string(),
                port: 5998,
                user: "quser".to_string(),
                pass: "qpass".to_string(),
                server: "Test".to_string(),
                character: "Wimplo".to_string(),
                navmesh_path: None,
                maps_path: None,
            },
            0,
            true,
        )
    }

    /// Opcodes queued since the last drain, oldest first.
    pub fn drain_outbound(client: &mut Client) -> Vec<(StreamKind, u16)> {
        client
            .outbound
            .drain(..)
            .map(|outbound| (outbound.stream, frame_opcode(&outbound.data)))
            .collect()
    }
}
