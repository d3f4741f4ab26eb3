use std::collections::BTreeMap;

use crate::net::crypt::LoginCipher;
use crate::net::packet::{PacketReader, PacketWriter};
use crate::proto::{opcodes, ParseError};

/// Response codes above this value mean the login was refused.
pub const MAX_ACCEPTED_RESPONSE: u16 = 101;

const LOGIN_MAGIC: u32 = 0x0002_0000;
const SESSION_MAX_LENGTH: u32 = 2048;

/// One world server advertised by the login server's list response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorldServer {
    pub address: String,
    pub server_type: i32,
    pub long_name: String,
    pub lang: String,
    pub region: String,
    pub status: i32,
    pub players: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    Accepted { dbid: u32, key: String },
    Rejected { code: u16 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayResponse {
    pub allowed: bool,
    pub message: u16,
    pub server_id: u32,
}

pub fn build_session_ready(sequence: u32) -> Vec<u8> {
    let mut writer = PacketWriter::with_capacity(14);
    writer.write_u16_le(opcodes::OP_SESSION_READY);
    writer.write_u32_le(sequence);
    writer.write_u32_le(0);
    writer.write_u32_le(SESSION_MAX_LENGTH);
    writer.into_vec()
}

pub fn build_login(sequence: u32, user: &str, pass: &str) -> Vec<u8> {
    let block = LoginCipher.encrypt_credentials(user, pass);
    let mut writer = PacketWriter::with_capacity(12 + block.len());
    writer.write_u16_le(opcodes::OP_LOGIN);
    writer.write_u32_le(sequence);
    writer.write_u32_le(LOGIN_MAGIC);
    writer.write_u16_le(0);
    writer.write_bytes(&block);
    writer.into_vec()
}

pub fn build_server_list_request(sequence: u32) -> Vec<u8> {
    let mut writer = PacketWriter::with_capacity(12);
    writer.write_u16_le(opcodes::OP_SERVER_LIST_REQUEST);
    writer.write_u32_le(sequence);
    writer.write_u32_le(0);
    writer.write_u16_le(0);
    writer.into_vec()
}

pub fn build_play_request(sequence: u32, server_id: u32) -> Vec<u8> {
    let mut writer = PacketWriter::with_capacity(16);
    writer.write_u16_le(opcodes::OP_PLAY_EVERQUEST_REQUEST);
    writer.write_u32_le(sequence);
    writer.write_u32_le(0);
    writer.write_u16_le(0);
    writer.write_u32_le(server_id);
    writer.into_vec()
}

/// Decrypts the `LoginAccepted` payload (everything from offset 12, rounded
/// down to whole DES blocks) and pulls out the session grant.
pub fn parse_login_accepted(frame: &[u8]) -> Result<LoginOutcome, ParseError> {
    if frame.len() < 12 {
        return Err(ParseError::truncated("LoginAccepted"));
    }
    let encrypted_len = (frame.len() - 12) / 8 * 8;
    let decrypted = LoginCipher
        .decrypt_to_vec(&frame[12..12 + encrypted_len])
        .map_err(ParseError::new)?;

    let reader = PacketReader::new(&decrypted);
    let code = reader
        .u16_at(1)
        .ok_or_else(|| ParseError::truncated("LoginAccepted"))?;
    if code > MAX_ACCEPTED_RESPONSE {
        return Ok(LoginOutcome::Rejected { code });
    }

    let dbid = reader
        .u32_at(8)
        .ok_or_else(|| ParseError::truncated("LoginAccepted"))?;
    let key = reader
        .cstring_at(12)
        .ok_or_else(|| ParseError::new("LoginAccepted key missing terminator"))?;
    Ok(LoginOutcome::Accepted { dbid, key })
}

/// Server list: record count at offset 18, then variable-length records.
pub fn parse_server_list(frame: &[u8]) -> Result<BTreeMap<u32, WorldServer>, ParseError> {
    let mut reader = PacketReader::new(frame);
    let count = reader
        .u32_at(18)
        .ok_or_else(|| ParseError::truncated("ServerListResponse"))?;
    reader
        .seek(22)
        .ok_or_else(|| ParseError::truncated("ServerListResponse"))?;

    let mut servers = BTreeMap::new();
    for _ in 0..count {
        let address = reader
            .read_cstring()
            .ok_or_else(|| ParseError::truncated("ServerListResponse record"))?;
        let server_type = reader
            .read_i32_le()
            .ok_or_else(|| ParseError::truncated("ServerListResponse record"))?;
        let id = reader
            .read_u32_le()
            .ok_or_else(|| ParseError::truncated("ServerListResponse record"))?;
        let long_name = reader
            .read_cstring()
            .ok_or_else(|| ParseError::truncated("ServerListResponse record"))?;
        let lang = reader
            .read_cstring()
            .ok_or_else(|| ParseError::truncated("ServerListResponse record"))?;
        let region = reader
            .read_cstring()
            .ok_or_else(|| ParseError::truncated("ServerListResponse record"))?;
        let status = reader
            .read_i32_le()
            .ok_or_else(|| ParseError::truncated("ServerListResponse record"))?;
        let players = reader
            .read_i32_le()
            .ok_or_else(|| ParseError::truncated("ServerListResponse record"))?;
        servers.insert(
            id,
            WorldServer {
                address,
                server_type,
                long_name,
                lang,
                region,
                status,
                players,
            },
        );
    }
    Ok(servers)
}

pub fn parse_play_response(frame: &[u8]) -> Result<PlayResponse, ParseError> {
    let reader = PacketReader::new(frame);
    let allowed = reader
        .u8_at(12)
        .ok_or_else(|| ParseError::truncated("PlayEverquestResponse"))?;
    let message = reader
        .u16_at(13)
        .ok_or_else(|| ParseError::truncated("PlayEverquestResponse"))?;
    let server_id = reader
        .u32_at(18)
        .ok_or_else(|| ParseError::truncated("PlayEverquestResponse"))?;
    Ok(PlayResponse {
        allowed: allowed != 0,
        message,
        server_id,
    })
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn session_ready_layout() {
        let frame = build_session_ready(2);
        assert_eq!(frame.len(), 14);
        let reader = PacketReader::new(&frame);
        assert_eq!(reader.u16_at(0), Some(opcodes::OP_SESSION_READY));
        assert_eq!(reader.u32_at(2), Some(2));
        assert_eq!(reader.u32_at(6), Some(0));
        assert_eq!(reader.u32_at(10), Some(2048));
    }

    #[test]
    fn login_frame_carries_encrypted_credentials() {
        let frame = build_login(3, "user", "pass");
        let reader = PacketReader::new(&frame);
        assert_eq!(reader.u16_at(0), Some(opcodes::OP_LOGIN));
        assert_eq!(reader.u32_at(2), Some(3));
        assert_eq!(reader.u32_at(6), Some(LOGIN_MAGIC));
        assert_eq!((frame.len() - 12) % 8, 0);
        let plain = LoginCipher.decrypt_to_vec(&frame[12..]).expect("decrypt");
        assert_eq!(&plain[..5], b"user\0");
        assert_eq!(&plain[5..10], b"pass\0");
    }

    #[test]
    fn login_accepted_grant() {
        let frame = login_accepted_frame(0, 17, "abcd1234");
        match parse_login_accepted(&frame).expect("parse") {
            LoginOutcome::Accepted { dbid, key } => {
                assert_eq!(dbid, 17);
                assert_eq!(key, "abcd1234");
            }
            LoginOutcome::Rejected { .. } => panic!("expected acceptance"),
        }
    }

    #[test]
    fn login_accepted_rejection_code() {
        let frame = login_accepted_frame(102, 0, "");
        match parse_login_accepted(&frame).expect("parse") {
            LoginOutcome::Rejected { code } => assert_eq!(code, 102),
            LoginOutcome::Accepted { .. } => panic!("expected rejection"),
        }
    }

    #[test]
    fn login_accepted_truncated() {
        assert!(parse_login_accepted(&[0u8; 4]).is_err());
    }

    #[test]
    fn server_list_roundtrip() {
        let frame = server_list_frame(&[(1, "10.0.0.5", "Test"), (7, "10.0.0.9", "Other")]);
        let servers = parse_server_list(&frame).expect("parse");
        assert_eq!(servers.len(), 2);
        assert_eq!(servers[&1].long_name, "Test");
        assert_eq!(servers[&1].address, "10.0.0.5");
        assert_eq!(servers[&7].long_name, "Other");
    }

    #[test]
    fn server_list_truncated_record() {
        let mut frame = server_list_frame(&[(1, "10.0.0.5", "Test")]);
        frame.truncate(frame.len() - 3);
        assert!(parse_server_list(&frame).is_err());
    }

    #[test]
    fn play_response_fields() {
        let frame = play_response_frame(1, 1);
        let response = parse_play_response(&frame).expect("parse");
        assert!(response.allowed);
        assert_eq!(response.server_id, 1);

        let denied = play_response_frame(0, 1);
        assert!(!parse_play_response(&denied).expect("parse").allowed);
    }
}
