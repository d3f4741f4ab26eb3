use crate::client::{frame_opcode, Client, StreamKind, WORLD_PORT};
use crate::net::session::SessionEvent;
use crate::proto::login::{
    build_login, build_play_request, build_server_list_request, build_session_ready,
    parse_login_accepted, parse_play_response, parse_server_list, LoginOutcome,
};
use crate::proto::opcodes::{self, opcode_name};
use crate::telemetry::logging;

impl Client {
    pub(crate) fn on_login_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Connected => {
                println!("Login connected.");
                self.send_login_session_ready();
            }
            SessionEvent::Disconnected => {
                if self.login_reconnect {
                    println!("Login connection lost before world handoff, reconnecting.");
                    self.key.clear();
                    self.dbid = 0;
                    self.login_session = None;
                    if let Err(err) = self.reconnect_login() {
                        logging::log_error(&format!("login reconnect failed: {}", err));
                        self.failed = true;
                    }
                } else {
                    self.login_session = None;
                }
            }
            SessionEvent::Packet(frame) => self.handle_login_packet(&frame),
        }
    }

    fn reconnect_login(&mut self) -> Result<(), String> {
        let session = crate::net::session::Session::connect(&self.login_addr, self.instance.port)?;
        self.login_session = Some(session);
        Ok(())
    }

    pub(crate) fn handle_login_packet(&mut self, frame: &[u8]) {
        self.dump_packet("S->C", frame);
        match frame_opcode(frame) {
            opcodes::OP_CHAT_MESSAGE => {
                self.debug(1, "Login server hello received, sending credentials");
                self.send_login_credentials();
            }
            opcodes::OP_LOGIN_ACCEPTED => self.handle_login_accepted(frame),
            opcodes::OP_SERVER_LIST_RESPONSE => self.handle_server_list(frame),
            opcodes::OP_PLAY_EVERQUEST_RESPONSE => self.handle_play_response(frame),
            other => {
                self.debug(1, &format!("Unhandled login opcode: {}", opcode_name(other)));
            }
        }
    }

    fn send_login_session_ready(&mut self) {
        let frame = build_session_ready(self.login_sequence);
        self.login_sequence += 1;
        self.send(StreamKind::Login, frame);
    }

    fn send_login_credentials(&mut self) {
        let frame = build_login(
            self.login_sequence,
            &self.instance.user,
            &self.instance.pass,
        );
        self.login_sequence += 1;
        self.send(StreamKind::Login, frame);
    }

    fn handle_login_accepted(&mut self, frame: &[u8]) {
        match parse_login_accepted(frame) {
            Ok(LoginOutcome::Accepted { dbid, key }) => {
                println!("Logged in successfully with dbid {}", dbid);
                self.dbid = dbid;
                self.key = key;
                let frame = build_server_list_request(self.login_sequence);
                self.login_sequence += 1;
                self.send(StreamKind::Login, frame);
            }
            Ok(LoginOutcome::Rejected { code }) => {
                eprintln!("Login refused with response code {}", code);
                logging::log_error(&format!("login refused: response code {}", code));
                self.fail_login();
            }
            Err(err) => self.login_protocol_error("LoginAccepted", &err.message),
        }
    }

    fn handle_server_list(&mut self, frame: &[u8]) {
        match parse_server_list(frame) {
            Ok(servers) => {
                self.world_servers = servers;
                let wanted = self.instance.server.as_str();
                match self
                    .world_servers
                    .iter()
                    .find(|(_, server)| server.long_name == wanted)
                {
                    Some((&id, _)) => {
                        println!("Found world server {}, requesting play.", wanted);
                        let frame = build_play_request(self.login_sequence, id);
                        self.login_sequence += 1;
                        self.send(StreamKind::Login, frame);
                    }
                    None => {
                        eprintln!("World server '{}' not in server list, disconnecting.", wanted);
                        logging::log_error(&format!("world server '{}' not listed", wanted));
                        self.fail_login();
                    }
                }
            }
            Err(err) => self.login_protocol_error("ServerListResponse", &err.message),
        }
    }

    fn handle_play_response(&mut self, frame: &[u8]) {
        match parse_play_response(frame) {
            Ok(response) if response.allowed => {
                match self.world_servers.get(&response.server_id) {
                    Some(server) => {
                        println!(
                            "Play granted; world server {} at {}:{}",
                            server.long_name, server.address, WORLD_PORT
                        );
                        self.pending_world_connect = Some((server.address.clone(), WORLD_PORT));
                        self.finish_login_phase();
                    }
                    None => {
                        eprintln!(
                            "Play response names unknown server id {}",
                            response.server_id
                        );
                        self.fail_login();
                    }
                }
            }
            Ok(response) => {
                eprintln!("World denied play with message {}", response.message);
                logging::log_error(&format!("play denied: message {}", response.message));
                self.fail_login();
            }
            Err(err) => self.login_protocol_error("PlayEverquestResponse", &err.message),
        }
    }

    /// Once the handoff to world begins the login session is done for good.
    fn finish_login_phase(&mut self) {
        self.login_reconnect = false;
        if let Some(session) = self.login_session.as_mut() {
            session.close();
        }
    }

    fn fail_login(&mut self) {
        self.failed = true;
        self.finish_login_phase();
    }

    fn login_protocol_error(&mut self, what: &str, detail: &str) {
        logging::log_error(&format!("login {} malformed: {}", what, detail));
        eprintln!("Malformed {} from login server, dropping session.", what);
        self.finish_login_phase();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::test_support::{drain_outbound, test_client};
    use crate::net::packet::PacketReader;
    use crate::proto::login::test_support::{
        login_accepted_frame, play_response_frame, server_list_frame,
    };

    fn hello_frame() -> Vec<u8> {
        let mut frame = opcodes::OP_CHAT_MESSAGE.to_le_bytes().to_vec();
        frame.extend_from_slice(b"login hello\0");
        frame
    }

    #[test]
    fn happy_path_reaches_world_handoff() {
        let mut client = test_client();

        client.handle_login_packet(&hello_frame());
        let sent = drain_outbound(&mut client);
        assert_eq!(sent, vec![(StreamKind::Login, opcodes::OP_LOGIN)]);

        client.handle_login_packet(&login_accepted_frame(0, 17, "abcd1234"));
        assert_eq!(client.dbid, 17);
        assert_eq!(client.key, "abcd1234");
        let sent = drain_outbound(&mut client);
        assert_eq!(sent, vec![(StreamKind::Login, opcodes::OP_SERVER_LIST_REQUEST)]);

        client.handle_login_packet(&server_list_frame(&[(1, "10.0.0.5", "Test")]));
        let frames: Vec<_> = client.outbound.drain(..).collect();
        assert_eq!(frames.len(), 1);
        assert_eq!(
            frame_opcode(&frames[0].data),
            opcodes::OP_PLAY_EVERQUEST_REQUEST
        );
        // requested server id rides at offset 12
        assert_eq!(PacketReader::new(&frames[0].data).u32_at(12), Some(1));

        client.handle_login_packet(&play_response_frame(1, 1));
        assert_eq!(
            client.pending_world_connect,
            Some(("10.0.0.5".to_string(), WORLD_PORT))
        );
        assert!(!client.login_reconnect);
        assert!(!client.has_failed());
    }

    #[test]
    fn rejected_credentials_never_reach_world() {
        let mut client = test_client();
        client.handle_login_packet(&login_accepted_frame(102, 0, ""));
        assert!(client.has_failed());
        assert!(client.pending_world_connect.is_none());
        assert!(!client.login_reconnect);
        assert!(drain_outbound(&mut client).is_empty());
    }

    #[test]
    fn unknown_world_name_fails() {
        let mut client = test_client();
        client.handle_login_packet(&login_accepted_frame(0, 17, "k"));
        drain_outbound(&mut client);
        client.handle_login_packet(&server_list_frame(&[(1, "10.0.0.5", "SomeOtherWorld")]));
        assert!(client.has_failed());
        assert!(drain_outbound(&mut client).is_empty());
    }

    #[test]
    fn denied_play_fails() {
        let mut client = test_client();
        client.handle_login_packet(&login_accepted_frame(0, 17, "k"));
        client.handle_login_packet(&server_list_frame(&[(1, "10.0.0.5", "Test")]));
        drain_outbound(&mut client);
        client.handle_login_packet(&play_response_frame(0, 1));
        assert!(client.has_failed());
        assert!(client.pending_world_connect.is_none());
    }

    #[test]
    fn sequence_counter_increments_across_sends() {
        let mut client = test_client();
        client.handle_login_packet(&hello_frame());
        client.handle_login_packet(&login_accepted_frame(0, 17, "k"));
        let frames: Vec<_> = client.outbound.drain(..).collect();
        let seqs: Vec<u32> = frames
            .iter()
            .map(|f| PacketReader::new(&f.data).u32_at(2).expect("seq"))
            .collect();
        // starts at 2 and rises monotonically
        assert_eq!(seqs, vec![2, 3]);
    }

    #[test]
    fn truncated_login_packet_drops_session_without_panic() {
        let mut client = test_client();
        let mut frame = opcodes::OP_LOGIN_ACCEPTED.to_le_bytes().to_vec();
        frame.extend_from_slice(&[0u8; 4]);
        client.handle_login_packet(&frame);
        assert!(!client.login_reconnect);
    }
}
