use std::time::Instant;

use glam::Vec3;

use crate::client::{frame_opcode, Client, StreamKind};
use crate::entities::entity::Entity;
use crate::net::session::SessionEvent;
use crate::proto::opcodes::{self, opcode_name};
use crate::proto::position::parse_client_update;
use crate::proto::zone::{
    build_request, build_set_server_filter, build_stream_identify, build_update_aa,
    build_zone_entry, parse_death, parse_delete_spawn, parse_hp_update, parse_mana_change,
    parse_mob_health, parse_new_spawn, parse_new_zone_name, parse_player_profile,
    parse_zone_spawns, SpawnRecord,
};
use crate::proto::world::build_ack;
use crate::telemetry::logging;
use crate::world::pathfind::Pathfinder;
use crate::world::zone_map::ZoneMap;

impl Client {
    pub(crate) fn on_zone_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Connected => {
                println!("Zone connected.");
                self.zone_connected = true;
                self.begin_zone_session();
            }
            SessionEvent::Disconnected => {
                println!("Zone connection lost.");
                logging::log_error("zone session disconnected");
                self.zone_connected = false;
                self.zone_session = None;
            }
            SessionEvent::Packet(frame) => self.handle_zone_packet(&frame),
        }
    }

    /// Stage 0: identify the stream (unreliable), ack, then announce
    /// ourselves with the zone entry block.
    fn begin_zone_session(&mut self) {
        self.send_unreliable(StreamKind::Zone, build_stream_identify());
        self.send(StreamKind::Zone, build_ack());
        let character = self.instance.character.clone();
        self.send(StreamKind::Zone, build_zone_entry(&character));
        self.flags.session_established = true;
    }

    pub(crate) fn handle_zone_packet(&mut self, frame: &[u8]) {
        self.dump_packet("S->C", frame);
        match frame_opcode(frame) {
            opcodes::OP_PLAYER_PROFILE => self.handle_player_profile(frame),
            opcodes::OP_ZONE_ENTRY => {
                // the server echoes our entry with its own spawn block
                self.debug(1, "Zone entry echo received");
            }
            opcodes::OP_CHAR_INVENTORY => self.debug(1, "Received character inventory"),
            opcodes::OP_TIME_OF_DAY => self.debug(1, "Received time of day"),
            opcodes::OP_TRIBUTE_UPDATE => self.debug(1, "Received tribute update"),
            opcodes::OP_TRIBUTE_TIMER => self.debug(1, "Received tribute timer"),
            opcodes::OP_ZONE_SPAWNS => self.handle_zone_spawns(frame),
            opcodes::OP_SPAWN_DOOR => self.debug(2, "Received door spawns"),
            opcodes::OP_GROUND_SPAWN => self.debug(2, "Received ground spawn"),
            opcodes::OP_WEATHER => self.handle_weather(),
            opcodes::OP_NEW_ZONE => self.handle_new_zone(frame),
            opcodes::OP_SEND_AA_TABLE => {
                self.debug(1, "Received AA table");
                self.flags.aa_table_count += 1;
                self.maybe_request_client_spawn();
            }
            opcodes::OP_RESPOND_AA => {
                self.debug(1, "Received AA response");
                self.maybe_request_client_spawn();
            }
            opcodes::OP_TRIBUTE_INFO => {
                self.debug(1, "Received tribute info");
                self.flags.tribute_count += 1;
                self.maybe_request_client_spawn();
            }
            opcodes::OP_SEND_GUILD_TRIBUTES => {
                self.debug(1, "Received guild tributes");
                self.flags.guild_tribute_count += 1;
                self.maybe_request_client_spawn();
            }
            opcodes::OP_SEND_AA_STATS => self.debug(2, "Received AA stats"),
            opcodes::OP_SEND_ZONEPOINTS => self.debug(1, "Received zone points"),
            opcodes::OP_WORLD_OBJECTS_SENT => self.handle_world_objects_sent(),
            opcodes::OP_SEND_EXP_ZONEIN => {
                self.debug(1, "Received exp zone-in");
                self.flags.send_exp_zonein_received = true;
            }
            opcodes::OP_EXP_UPDATE => self.debug(2, "Received exp update"),
            opcodes::OP_RAID_UPDATE => self.debug(2, "Received raid update"),
            opcodes::OP_GUILD_MOTD => self.handle_guild_motd(),
            opcodes::OP_SPAWN_APPEARANCE => self.debug(2, "Spawn appearance update"),
            opcodes::OP_NEW_SPAWN => self.handle_new_spawn(frame),
            opcodes::OP_CLIENT_UPDATE => self.handle_client_update(frame),
            opcodes::OP_DELETE_SPAWN => self.handle_delete_spawn(frame),
            opcodes::OP_MOB_HEALTH => self.handle_mob_health(frame),
            opcodes::OP_HP_UPDATE => self.handle_hp_update(frame),
            opcodes::OP_MANA_CHANGE => self.handle_mana_change(frame),
            opcodes::OP_DEATH => self.handle_death(frame),
            opcodes::OP_CHANNEL_MESSAGE => self.handle_channel_message(frame),
            opcodes::OP_WEAR_CHANGE => self.debug(2, "Equipment change"),
            opcodes::OP_MOVE_DOOR => self.debug(2, "Door animation"),
            opcodes::OP_COMPLETED_TASKS => self.debug(2, "Completed task list"),
            opcodes::OP_DZ_COMPASS => self.debug(2, "Expedition compass update"),
            opcodes::OP_DZ_EXPEDITION_LOCKOUT_TIMERS => self.debug(2, "Expedition lockouts"),
            opcodes::OP_BEGIN_CAST => self.debug(2, "Spell cast begins"),
            opcodes::OP_FORMATTED_MESSAGE => self.debug(2, "Formatted system message"),
            opcodes::OP_PLAYER_STATE_ADD => self.debug(2, "Player state added"),
            opcodes::OP_PLAYER_STATE_REMOVE => self.debug(2, "Player state removed"),
            opcodes::OP_STAMINA => self.debug(2, "Stamina update"),
            other => {
                self.debug(1, &format!("Unhandled zone opcode: {}", opcode_name(other)));
            }
        }
    }

    /// Stage 1: the profile carries our entity id and starting position; the
    /// self entity enters the model here and stays until teardown.
    fn handle_player_profile(&mut self, frame: &[u8]) {
        let profile = match parse_player_profile(frame) {
            Ok(profile) => profile,
            Err(err) => {
                logging::log_error(&format!("player profile malformed: {}", err.message));
                return;
            }
        };
        self.debug(
            1,
            &format!(
                "Player profile: entity {} at ({:.2}, {:.2}, {:.2}) heading {:.1}",
                profile.entity_id, profile.x, profile.y, profile.z, profile.heading
            ),
        );
        self.my_spawn_id = profile.entity_id;
        self.movement.set_position(
            Vec3::new(profile.x, profile.y, profile.z),
            profile.heading,
        );
        let character = self.instance.character.clone();
        self.entities.insert_or_replace(Entity {
            spawn_id: profile.entity_id,
            name: character,
            x: profile.x,
            y: profile.y,
            z: profile.z,
            heading: profile.heading,
            level: 1,
            class_id: 0,
            race_id: 0,
            gender: 0,
            guild_id: 0,
            hp_percent: 100,
            cur_mana: 0,
            max_mana: 0,
            animation: 0,
            delta_x: 0.0,
            delta_y: 0.0,
            delta_z: 0.0,
            delta_heading: 0.0,
            last_update: Instant::now(),
        });
    }

    /// Stage 2: bulk spawn stream. Our own record only refreshes position;
    /// the profile already established identity.
    fn handle_zone_spawns(&mut self, frame: &[u8]) {
        let records = parse_zone_spawns(frame);
        self.debug(1, &format!("Zone spawns: {} records", records.len()));
        let now = Instant::now();
        for record in records {
            self.adopt_spawn(record, now, false);
        }
    }

    fn handle_new_spawn(&mut self, frame: &[u8]) {
        match parse_new_spawn(frame) {
            Ok(record) => {
                self.debug(
                    1,
                    &format!("New spawn: {} (ID: {})", record.name, record.spawn_id),
                );
                self.adopt_spawn(record, Instant::now(), true);
            }
            Err(err) => {
                logging::log_error(&format!("new spawn malformed: {}", err.message));
            }
        }
    }

    fn adopt_spawn(&mut self, record: SpawnRecord, now: Instant, adopt_identity: bool) {
        if record.spawn_id == 0 {
            self.debug(1, &format!("Skipping spawn '{}' with id 0", record.name));
            return;
        }
        if record.name == self.instance.character {
            if adopt_identity {
                self.my_spawn_id = record.spawn_id;
            }
            self.movement.set_position(
                Vec3::new(record.position.x, record.position.y, record.position.z),
                self.movement.heading(),
            );
        }
        self.entities
            .insert_or_replace(Entity::from_spawn(&record, now));
    }

    /// Weather ends the spawn stream; stage 3 opens with `ReqNewZone`.
    fn handle_weather(&mut self) {
        self.debug(1, "Weather update received");
        self.flags.weather_received = true;
        if !self.flags.req_new_zone_sent {
            self.send(StreamKind::Zone, build_request(opcodes::OP_REQ_NEW_ZONE));
            self.flags.req_new_zone_sent = true;
        }
    }

    /// Stage 3: the zone is named, terrain assets load, and the four
    /// bring-up requests go out in order.
    fn handle_new_zone(&mut self, frame: &[u8]) {
        match parse_new_zone_name(frame) {
            Ok(name) => {
                println!("Entering zone '{}'", name);
                self.zone_name = name;
                self.load_zone_assets();
            }
            Err(err) => {
                logging::log_error(&format!("new zone malformed: {}", err.message));
            }
        }
        self.flags.new_zone_received = true;

        if !self.flags.aa_table_sent {
            self.send(StreamKind::Zone, build_request(opcodes::OP_SEND_AA_TABLE));
            self.flags.aa_table_sent = true;
        }
        if !self.flags.update_aa_sent {
            self.send(StreamKind::Zone, build_update_aa());
            self.flags.update_aa_sent = true;
        }
        if !self.flags.tributes_sent {
            self.send(StreamKind::Zone, build_request(opcodes::OP_SEND_TRIBUTES));
            self.flags.tributes_sent = true;
        }
        if !self.flags.guild_tributes_sent {
            self.send(
                StreamKind::Zone,
                build_request(opcodes::OP_REQUEST_GUILD_TRIBUTES),
            );
            self.flags.guild_tributes_sent = true;
        }
    }

    fn load_zone_assets(&mut self) {
        self.pathfinder = match self.instance.navmesh_path.as_deref() {
            Some(root) => {
                let pathfinder = Pathfinder::load(root, &self.zone_name);
                self.debug(
                    1,
                    &format!(
                        "Pathfinder for '{}': {}",
                        self.zone_name,
                        if pathfinder.is_navmesh() {
                            "navmesh"
                        } else {
                            "direct"
                        }
                    ),
                );
                Some(pathfinder)
            }
            None => {
                self.debug(1, "No navmesh root configured, using direct paths");
                Some(Pathfinder::Null)
            }
        };
        self.zone_map = match self.instance.maps_path.as_deref() {
            Some(root) => match ZoneMap::load_for_zone(root, &self.zone_name) {
                Ok(map) => {
                    self.debug(
                        1,
                        &format!(
                            "Loaded zone map for '{}': {} faces",
                            self.zone_name,
                            map.face_count()
                        ),
                    );
                    Some(map)
                }
                Err(err) => {
                    eprintln!("warning: {}", err);
                    logging::log_error(&err);
                    None
                }
            },
            None => None,
        };
    }

    /// Gate for `ReqClientSpawn`: all three request counters positive and
    /// `NewZone` seen.
    fn maybe_request_client_spawn(&mut self) {
        let flags = &self.flags;
        if flags.new_zone_received
            && flags.aa_table_count > 0
            && flags.tribute_count > 0
            && flags.guild_tribute_count > 0
            && !flags.req_client_spawn_sent
        {
            self.debug(1, "Zone request phase complete, requesting client spawn");
            self.send(StreamKind::Zone, build_request(opcodes::OP_REQ_CLIENT_SPAWN));
            self.flags.req_client_spawn_sent = true;
        }
    }

    /// Stage 4 opener: the zero opcode only means "world objects sent" in
    /// this state.
    fn handle_world_objects_sent(&mut self) {
        self.debug(1, "World objects sent");
        self.flags.world_objects_sent = true;
        if !self.flags.exp_zonein_sent {
            self.send(StreamKind::Zone, build_request(opcodes::OP_SEND_EXP_ZONEIN));
            self.flags.exp_zonein_sent = true;
        }
    }

    /// GuildMOTD closes the bring-up: filters wide open, then ClientReady.
    fn handle_guild_motd(&mut self) {
        self.debug(1, "Received guild MOTD");
        if !self.flags.server_filter_sent {
            self.send(StreamKind::Zone, build_set_server_filter());
            self.flags.server_filter_sent = true;
        }
        if !self.flags.client_ready_sent {
            self.send(StreamKind::Zone, build_request(opcodes::OP_CLIENT_READY));
            self.flags.client_ready_sent = true;
            println!("Zone connection complete; client is now in the zone.");
        }
    }

    fn handle_client_update(&mut self, frame: &[u8]) {
        let Some((spawn_id, record)) = parse_client_update(frame) else {
            self.debug(1, &format!("ClientUpdate too small: {} bytes", frame.len()));
            return;
        };
        if u32::from(spawn_id) == self.my_spawn_id & 0xffff {
            // the server corrected us; adopt its view
            self.movement.set_position(
                Vec3::new(record.x, record.y, record.z),
                record.heading_degrees(),
            );
            self.sync_self_entity(Instant::now());
            return;
        }
        if !self
            .entities
            .apply_position(u32::from(spawn_id), &record, Instant::now())
        {
            self.debug(2, &format!("ClientUpdate for unknown spawn {}", spawn_id));
        }
    }

    fn handle_delete_spawn(&mut self, frame: &[u8]) {
        match parse_delete_spawn(frame) {
            Ok(spawn_id) => match self.entities.remove(u32::from(spawn_id)) {
                Some(entity) => {
                    self.debug(1, &format!("{} ({}) despawned", entity.name, spawn_id));
                }
                None => {
                    self.debug(2, &format!("DeleteSpawn for unknown spawn {}", spawn_id));
                }
            },
            Err(err) => self.debug(1, &err.message),
        }
    }

    fn handle_mob_health(&mut self, frame: &[u8]) {
        if let Ok((spawn_id, hp)) = parse_mob_health(frame) {
            self.entities.update_hp_percent(u32::from(spawn_id), hp);
        }
    }

    fn handle_hp_update(&mut self, frame: &[u8]) {
        match parse_hp_update(frame) {
            Ok((cur_hp, max_hp, cur_mana)) => {
                self.debug(
                    1,
                    &format!("Player HP: {}/{}, mana: {}", cur_hp, max_hp, cur_mana),
                );
                if self.my_spawn_id != 0 {
                    let percent = if max_hp > 0 {
                        ((cur_hp.saturating_mul(100)) / max_hp).min(100) as u8
                    } else {
                        100
                    };
                    self.entities.update_hp_percent(self.my_spawn_id, percent);
                }
            }
            Err(err) => self.debug(1, &err.message),
        }
    }

    fn handle_mana_change(&mut self, frame: &[u8]) {
        if let Ok((spawn_id, cur, max)) = parse_mana_change(frame) {
            self.entities.update_mana(u32::from(spawn_id), cur, max);
        }
    }

    fn handle_death(&mut self, frame: &[u8]) {
        match parse_death(frame) {
            Ok(death) => {
                let victim = self
                    .entities
                    .get(u32::from(death.victim_id))
                    .map(|entity| entity.name.clone())
                    .unwrap_or_else(|| "Unknown".to_string());
                let killer = self
                    .entities
                    .get(u32::from(death.killer_id))
                    .map(|entity| entity.name.clone())
                    .unwrap_or_else(|| "Unknown".to_string());
                println!(
                    "{} ({}) was killed by {} ({}) for {} damage",
                    victim, death.victim_id, killer, death.killer_id, death.damage
                );
                self.entities.mark_dead(u32::from(death.victim_id));
                if u32::from(death.victim_id) == self.my_spawn_id & 0xffff {
                    println!("YOU HAVE BEEN SLAIN!");
                }
            }
            Err(err) => self.debug(1, &err.message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::test_support::{drain_outbound, test_client};
    use crate::net::packet::PacketWriter;
    use crate::proto::position::PositionRecord;
    use crate::proto::zone::test_support::{
        new_zone_frame, player_profile_frame, spawn_record_bytes, zone_spawns_frame, SpawnSpec,
    };

    fn bare(opcode: u16) -> Vec<u8> {
        opcode.to_le_bytes().to_vec()
    }

    fn spawn(spawn_id: u32, name: &str, x: f32, y: f32) -> SpawnSpec<'_> {
        SpawnSpec {
            spawn_id,
            name,
            level: 5,
            x,
            y,
            z: 0.0,
            heading_raw: 0,
            hp_percent: 100,
        }
    }

    /// The end-to-end bring-up choreography of §4.6.3, driven packet by
    /// packet, checking the exact reply order.
    #[test]
    fn zone_bring_up_emits_replies_in_order() {
        let mut client = test_client();
        client.zone_connected = true;

        client.handle_zone_packet(&player_profile_frame(42, 288.0, 344.0, 3.75, 128.0));
        assert_eq!(client.my_spawn_id, 42);
        assert!(!client.fully_zoned_in());

        client.handle_zone_packet(&zone_spawns_frame(&[
            spawn(101, "Renux_Herkanor000", 100.0, -50.0),
            spawn(102, "a_large_rat001", -12.0, 8.0),
        ]));
        assert_eq!(client.entities.len(), 3); // two spawns plus ourselves
        assert!(drain_outbound(&mut client).is_empty());

        client.handle_zone_packet(&bare(opcodes::OP_WEATHER));
        client.handle_zone_packet(&new_zone_frame("freporte"));
        assert_eq!(client.zone_name, "freporte");

        client.handle_zone_packet(&bare(opcodes::OP_SEND_AA_TABLE));
        client.handle_zone_packet(&bare(opcodes::OP_TRIBUTE_INFO));
        client.handle_zone_packet(&bare(opcodes::OP_SEND_GUILD_TRIBUTES));

        client.handle_zone_packet(&bare(opcodes::OP_WORLD_OBJECTS_SENT));
        client.handle_zone_packet(&bare(opcodes::OP_SEND_EXP_ZONEIN));
        client.handle_zone_packet(&bare(opcodes::OP_EXP_UPDATE));
        client.handle_zone_packet(&bare(opcodes::OP_RAID_UPDATE));
        client.handle_zone_packet(&bare(opcodes::OP_GUILD_MOTD));

        let sent: Vec<u16> = drain_outbound(&mut client)
            .into_iter()
            .map(|(_, opcode)| opcode)
            .collect();
        assert_eq!(
            sent,
            vec![
                opcodes::OP_REQ_NEW_ZONE,
                opcodes::OP_SEND_AA_TABLE,
                opcodes::OP_UPDATE_AA,
                opcodes::OP_SEND_TRIBUTES,
                opcodes::OP_REQUEST_GUILD_TRIBUTES,
                opcodes::OP_REQ_CLIENT_SPAWN,
                opcodes::OP_SEND_EXP_ZONEIN,
                opcodes::OP_SET_SERVER_FILTER,
                opcodes::OP_CLIENT_READY,
            ]
        );

        assert!(client.fully_zoned_in());
        let me = client.entities.get(42).expect("self entity");
        assert_eq!(me.name, "Wimplo");
        assert_eq!(me.x, 288.0);
        assert_eq!(me.y, 344.0);
        assert_eq!(me.z, 3.75);
        assert_eq!(client.flags.send_exp_zonein_received, true);
    }

    #[test]
    fn bring_up_flags_make_sends_idempotent() {
        let mut client = test_client();
        client.zone_connected = true;
        client.handle_zone_packet(&bare(opcodes::OP_WEATHER));
        client.handle_zone_packet(&bare(opcodes::OP_WEATHER));
        client.handle_zone_packet(&new_zone_frame("freporte"));
        client.handle_zone_packet(&new_zone_frame("freporte"));
        client.handle_zone_packet(&bare(opcodes::OP_SEND_AA_TABLE));
        client.handle_zone_packet(&bare(opcodes::OP_SEND_AA_TABLE));
        client.handle_zone_packet(&bare(opcodes::OP_TRIBUTE_INFO));
        client.handle_zone_packet(&bare(opcodes::OP_SEND_GUILD_TRIBUTES));
        client.handle_zone_packet(&bare(opcodes::OP_GUILD_MOTD));
        client.handle_zone_packet(&bare(opcodes::OP_GUILD_MOTD));

        let sent: Vec<u16> = drain_outbound(&mut client)
            .into_iter()
            .map(|(_, opcode)| opcode)
            .collect();
        let req_new_zone = sent
            .iter()
            .filter(|&&op| op == opcodes::OP_REQ_NEW_ZONE)
            .count();
        let client_ready = sent
            .iter()
            .filter(|&&op| op == opcodes::OP_CLIENT_READY)
            .count();
        assert_eq!(req_new_zone, 1);
        assert_eq!(client_ready, 1);
    }

    #[test]
    fn req_client_spawn_waits_for_all_three_counters() {
        let mut client = test_client();
        client.zone_connected = true;
        client.handle_zone_packet(&new_zone_frame("freporte"));
        drain_outbound(&mut client);

        client.handle_zone_packet(&bare(opcodes::OP_SEND_AA_TABLE));
        client.handle_zone_packet(&bare(opcodes::OP_TRIBUTE_INFO));
        assert!(drain_outbound(&mut client).is_empty());

        client.handle_zone_packet(&bare(opcodes::OP_SEND_GUILD_TRIBUTES));
        let sent: Vec<u16> = drain_outbound(&mut client)
            .into_iter()
            .map(|(_, opcode)| opcode)
            .collect();
        assert_eq!(sent, vec![opcodes::OP_REQ_CLIENT_SPAWN]);
    }

    #[test]
    fn client_updates_move_entities_and_self() {
        let mut client = test_client();
        client.zone_connected = true;
        client.handle_zone_packet(&player_profile_frame(42, 0.0, 0.0, 0.0, 0.0));
        client.handle_zone_packet(&zone_spawns_frame(&[spawn(101, "a_large_rat001", 0.0, 0.0)]));

        // another entity moves
        let record = PositionRecord {
            x: 55.0,
            y: -10.0,
            z: 2.0,
            animation: 27,
            heading_raw: 512,
            ..PositionRecord::default()
        };
        let mut frame = bare(opcodes::OP_CLIENT_UPDATE);
        frame.extend_from_slice(&101u16.to_le_bytes());
        frame.extend_from_slice(&record.encode());
        client.handle_zone_packet(&frame);
        let rat = client.entities.get(101).expect("rat");
        assert_eq!(rat.x, 55.0);
        assert_eq!(rat.animation, 27);

        // a self-addressed update overrides our position
        let record = PositionRecord {
            x: 10.0,
            y: 20.0,
            z: 3.0,
            heading_raw: 1024,
            ..PositionRecord::default()
        };
        let mut frame = bare(opcodes::OP_CLIENT_UPDATE);
        frame.extend_from_slice(&42u16.to_le_bytes());
        frame.extend_from_slice(&record.encode());
        client.handle_zone_packet(&frame);
        let (pos, heading) = client.location();
        assert_eq!(pos, Vec3::new(10.0, 20.0, 3.0));
        assert!((heading - 180.0).abs() < 1e-4);
        let me = client.entities.get(42).expect("self");
        assert_eq!(me.x, 10.0);

        // unknown ids are ignored without error
        let mut frame = bare(opcodes::OP_CLIENT_UPDATE);
        frame.extend_from_slice(&999u16.to_le_bytes());
        frame.extend_from_slice(&PositionRecord::default().encode());
        client.handle_zone_packet(&frame);
    }

    #[test]
    fn spawn_lifecycle_packets_mutate_the_model() {
        let mut client = test_client();
        client.zone_connected = true;
        client.handle_zone_packet(&zone_spawns_frame(&[spawn(7, "a_skeleton001", 5.0, 5.0)]));
        assert!(client.entities.get(7).is_some());

        // new spawn of our own character adopts identity and position
        let mut frame = bare(opcodes::OP_NEW_SPAWN);
        frame.extend_from_slice(&spawn_record_bytes(&spawn(31, "Wimplo", 12.0, 30.0)));
        client.handle_zone_packet(&frame);
        assert_eq!(client.my_spawn_id, 31);
        assert_eq!(client.location().0.truncate(), glam::Vec2::new(12.0, 30.0));

        // health, mana, death, despawn
        let mut frame = PacketWriter::zeroed(5);
        frame.put_u16_at(0, opcodes::OP_MOB_HEALTH);
        frame.put_u16_at(2, 7);
        frame.put_u8_at(4, 40);
        client.handle_zone_packet(frame.as_slice());
        assert_eq!(client.entities.get(7).expect("entity").hp_percent, 40);

        let mut frame = PacketWriter::zeroed(8);
        frame.put_u16_at(0, opcodes::OP_MANA_CHANGE);
        frame.put_u16_at(2, 7);
        frame.put_u16_at(4, 15);
        frame.put_u16_at(6, 60);
        client.handle_zone_packet(frame.as_slice());
        let skeleton = client.entities.get(7).expect("entity");
        assert_eq!((skeleton.cur_mana, skeleton.max_mana), (15, 60));

        let mut frame = PacketWriter::zeroed(12);
        frame.put_u16_at(0, opcodes::OP_DEATH);
        frame.put_u16_at(2, 7);
        frame.put_u16_at(4, 31);
        frame.put_u32_at(6, 99);
        client.handle_zone_packet(frame.as_slice());
        assert_eq!(client.entities.get(7).expect("entity").hp_percent, 0);

        let mut frame = PacketWriter::zeroed(5);
        frame.put_u16_at(0, opcodes::OP_DELETE_SPAWN);
        frame.put_u16_at(2, 7);
        client.handle_zone_packet(frame.as_slice());
        assert!(client.entities.get(7).is_none());
    }

    #[test]
    fn malformed_zone_packets_never_panic() {
        let mut client = test_client();
        client.zone_connected = true;
        for opcode in [
            opcodes::OP_PLAYER_PROFILE,
            opcodes::OP_CLIENT_UPDATE,
            opcodes::OP_DELETE_SPAWN,
            opcodes::OP_MOB_HEALTH,
            opcodes::OP_HP_UPDATE,
            opcodes::OP_MANA_CHANGE,
            opcodes::OP_DEATH,
            opcodes::OP_NEW_SPAWN,
            opcodes::OP_NEW_ZONE,
            opcodes::OP_CHANNEL_MESSAGE,
        ] {
            client.handle_zone_packet(&bare(opcode));
            client.handle_zone_packet(&[]);
        }
    }
}
