use crate::client::{frame_opcode, Client, StreamKind};
use crate::net::session::SessionEvent;
use crate::proto::opcodes::{self, opcode_name};
use crate::proto::world::{
    build_ack, build_approve_world, build_client_crc, build_enter_world, build_send_login_info,
    build_world_client_ready, build_world_complete, find_character_slot, parse_character_select,
    parse_chat_server_info, parse_expansion_info, parse_zone_server_info,
};
use crate::telemetry::logging;

impl Client {
    pub(crate) fn on_world_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Connected => {
                println!("World connected.");
                self.send_world_login_info();
            }
            SessionEvent::Disconnected => {
                println!("World connection lost.");
                logging::log_error("world session disconnected");
                self.world_session = None;
            }
            SessionEvent::Packet(frame) => self.handle_world_packet(&frame),
        }
    }

    pub(crate) fn handle_world_packet(&mut self, frame: &[u8]) {
        self.dump_packet("S->C", frame);
        match frame_opcode(frame) {
            // either of these means the server is ready for our auth block
            opcodes::OP_CHAT_MESSAGE | opcodes::OP_SESSION_READY => {
                self.send_world_login_info();
            }
            opcodes::OP_GUILDS_LIST => self.debug(1, "Received guilds list"),
            opcodes::OP_LOG_SERVER => self.debug(1, "Received log server info"),
            opcodes::OP_APPROVE_WORLD => self.handle_approve_world(),
            opcodes::OP_ENTER_WORLD => self.debug(1, "Server acknowledged enter world"),
            opcodes::OP_POST_ENTER_WORLD => self.debug(1, "Post enter world received"),
            opcodes::OP_EXPANSION_INFO => self.handle_expansion_info(frame),
            opcodes::OP_SEND_CHAR_INFO => self.handle_character_select(frame),
            opcodes::OP_MOTD => self.debug(1, "Received message of the day"),
            opcodes::OP_SET_CHAT_SERVER | opcodes::OP_SET_CHAT_SERVER2 => {
                self.handle_set_chat_server(frame)
            }
            opcodes::OP_ZONE_SERVER_INFO => self.handle_zone_server_info(frame),
            other => {
                self.debug(1, &format!("Unhandled world opcode: {}", opcode_name(other)));
            }
        }
    }

    fn send_world_login_info(&mut self) {
        if self.login_info_sent {
            return;
        }
        self.debug(
            1,
            &format!("Sending login info: dbid={}, key={}", self.dbid, self.key),
        );
        let frame = build_send_login_info(self.dbid, &self.key);
        self.send(StreamKind::World, frame);
        self.login_info_sent = true;
    }

    fn handle_approve_world(&mut self) {
        self.debug(1, "World approved, answering with approval and CRC blocks");
        self.send(StreamKind::World, build_approve_world());
        self.send(
            StreamKind::World,
            build_client_crc(opcodes::OP_WORLD_CLIENT_CRC1),
        );
        self.send(
            StreamKind::World,
            build_client_crc(opcodes::OP_WORLD_CLIENT_CRC2),
        );
    }

    fn handle_expansion_info(&mut self, frame: &[u8]) {
        if let Some(expansions) = parse_expansion_info(frame) {
            self.debug(1, &format!("Expansion info: {:#x}", expansions));
        }
        if self.world_ready {
            return;
        }
        self.send(StreamKind::World, build_ack());
        self.send(StreamKind::World, build_world_client_ready());
        self.world_ready = true;
        if !self.enter_world_sent {
            let character = self.instance.character.clone();
            self.send(StreamKind::World, build_enter_world(&character));
            self.enter_world_sent = true;
        }
    }

    fn handle_character_select(&mut self, frame: &[u8]) {
        let slots = match parse_character_select(frame) {
            Ok(slots) => slots,
            Err(err) => {
                logging::log_error(&format!("character select malformed: {}", err.message));
                eprintln!("Malformed character select packet: {}", err.message);
                return;
            }
        };
        for slot in &slots {
            self.debug(
                1,
                &format!(
                    "Character slot {}: name='{}', level={}, class={}, race={}",
                    slot.index, slot.name, slot.level, slot.class_id, slot.race_id
                ),
            );
        }
        match find_character_slot(&slots, &self.instance.character) {
            Some(index) => {
                self.debug(
                    1,
                    &format!(
                        "Found character '{}' at slot {}",
                        self.instance.character, index
                    ),
                );
                self.char_select_index = Some(index);
            }
            None => {
                eprintln!(
                    "Character '{}' not on this account, cannot continue.",
                    self.instance.character
                );
                logging::log_error(&format!(
                    "character '{}' missing from select list",
                    self.instance.character
                ));
                self.failed = true;
                if let Some(session) = self.world_session.as_mut() {
                    session.close();
                }
            }
        }
    }

    fn handle_set_chat_server(&mut self, frame: &[u8]) {
        match parse_chat_server_info(frame) {
            Ok(info) => {
                self.debug(
                    1,
                    &format!("Chat server coordinates: {}:{}", info.host, info.port),
                );
                self.chat_server = Some(info);
            }
            Err(err) => {
                self.debug(1, &format!("Invalid chat server info: {}", err.message));
            }
        }
    }

    fn handle_zone_server_info(&mut self, frame: &[u8]) {
        match parse_zone_server_info(frame) {
            Ok((host, port)) => {
                println!("Zone server info received: {}:{}", host, port);
                self.zone_host = host.clone();
                self.zone_port = port;
                self.send(StreamKind::World, build_world_complete());
                self.pending_zone_connect = Some((host, port));
            }
            Err(err) => {
                logging::log_error(&format!("zone server info malformed: {}", err.message));
                eprintln!("Malformed zone server info, dropping world session.");
                if let Some(session) = self.world_session.as_mut() {
                    session.close();
                }
            }
        }
    }
}
