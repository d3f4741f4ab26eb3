use crate::net::packet::{PacketReader, PacketWriter};
use crate::proto::{opcodes, ParseError};

const LOGIN_INFO_SIZE: usize = 466;
const LOGIN_INFO_DBID_MAX: usize = 18;
const LOGIN_INFO_KEY_MAX: usize = 15;
/// Zoning flag inside the login-info block; zero means a fresh login.
const LOGIN_INFO_ZONING_OFFSET: usize = 188;

const APPROVE_WORLD_SIZE: usize = 274;
const CLIENT_CRC_SIZE: usize = 2058;
const ENTER_WORLD_SIZE: usize = 74;

pub const CHARACTER_SLOTS: usize = 10;
const CHARACTER_NAME_WIDTH: usize = 64;
const CHARACTER_NAMES_OFFSET: usize = 1024;
const CHARACTER_CLASS_OFFSET: usize = 1004;
const CHARACTER_LEVEL_OFFSET: usize = 1694;
const CHARACTER_ZONE_OFFSET: usize = 964;
pub const CHARACTER_SELECT_MIN_SIZE: usize = 1706;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacterSlot {
    pub index: usize,
    pub name: String,
    pub level: u8,
    pub class_id: u8,
    pub race_id: u32,
    pub zone_id: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatServerInfo {
    pub host: String,
    pub port: u16,
    pub identity: String,
    pub connection_type: String,
    pub mail_key: String,
}

/// `SendLoginInfo`: the account id as a decimal string, a zero byte, then
/// the session key, inside a zero-filled 464-byte block.
pub fn build_send_login_info(dbid: u32, key: &str) -> Vec<u8> {
    let mut writer = PacketWriter::zeroed(LOGIN_INFO_SIZE);
    writer.put_u16_at(0, opcodes::OP_SEND_LOGIN_INFO);

    let dbid_str = dbid.to_string();
    let dbid_len = dbid_str.len().min(LOGIN_INFO_DBID_MAX);
    writer.put_bytes_at(2, &dbid_str.as_bytes()[..dbid_len]);

    let key_len = key.len().min(LOGIN_INFO_KEY_MAX);
    writer.put_bytes_at(2 + dbid_len + 1, &key.as_bytes()[..key_len]);

    writer.put_u8_at(2 + LOGIN_INFO_ZONING_OFFSET, 0);
    writer.into_vec()
}

pub fn build_approve_world() -> Vec<u8> {
    let mut writer = PacketWriter::zeroed(APPROVE_WORLD_SIZE);
    writer.put_u16_at(0, opcodes::OP_APPROVE_WORLD);
    writer.into_vec()
}

/// The server accepts zero-filled CRC payloads for this revision.
pub fn build_client_crc(opcode: u16) -> Vec<u8> {
    let mut writer = PacketWriter::zeroed(CLIENT_CRC_SIZE);
    writer.put_u16_at(0, opcode);
    writer.into_vec()
}

pub fn build_ack() -> Vec<u8> {
    let mut writer = PacketWriter::with_capacity(6);
    writer.write_u16_le(opcodes::OP_ACK_PACKET);
    writer.write_u32_le(0);
    writer.into_vec()
}

pub fn build_world_client_ready() -> Vec<u8> {
    opcodes::OP_WORLD_CLIENT_READY.to_le_bytes().to_vec()
}

pub fn build_enter_world(character: &str) -> Vec<u8> {
    let mut writer = PacketWriter::zeroed(ENTER_WORLD_SIZE);
    writer.put_u16_at(0, opcodes::OP_ENTER_WORLD);
    writer.put_fixed_str_at(2, character, CHARACTER_NAME_WIDTH);
    writer.into_vec()
}

pub fn build_world_complete() -> Vec<u8> {
    opcodes::OP_WORLD_COMPLETE.to_le_bytes().to_vec()
}

/// The ten 64-byte name slots start at struct offset 1024; level, class and
/// race ride in parallel arrays. Slots with empty names are omitted.
pub fn parse_character_select(frame: &[u8]) -> Result<Vec<CharacterSlot>, ParseError> {
    if frame.len() < CHARACTER_SELECT_MIN_SIZE {
        return Err(ParseError::new(format!(
            "character select packet too small: {} bytes",
            frame.len()
        )));
    }
    let reader = PacketReader::new(frame);
    let mut slots = Vec::new();
    for index in 0..CHARACTER_SLOTS {
        let name_offset = 2 + CHARACTER_NAMES_OFFSET + index * CHARACTER_NAME_WIDTH;
        let field = &frame[name_offset..name_offset + CHARACTER_NAME_WIDTH];
        let nul = field.iter().position(|&b| b == 0).unwrap_or(field.len());
        if nul == 0 {
            continue;
        }
        let name = String::from_utf8_lossy(&field[..nul]).to_string();
        slots.push(CharacterSlot {
            index,
            name,
            level: reader.u8_at(2 + CHARACTER_LEVEL_OFFSET + index).unwrap_or(0),
            class_id: reader.u8_at(2 + CHARACTER_CLASS_OFFSET + index).unwrap_or(0),
            race_id: reader.u32_at(2 + index * 4).unwrap_or(0),
            zone_id: reader
                .u32_at(2 + CHARACTER_ZONE_OFFSET + index * 4)
                .unwrap_or(0),
        });
    }
    Ok(slots)
}

/// Case-sensitive match against the configured character name.
pub fn find_character_slot(slots: &[CharacterSlot], character: &str) -> Option<usize> {
    slots
        .iter()
        .find(|slot| slot.name == character)
        .map(|slot| slot.index)
}

/// Payload is a single comma-separated string:
/// `host,port,server.character,connection_type,mail_key`.
pub fn parse_chat_server_info(frame: &[u8]) -> Result<ChatServerInfo, ParseError> {
    let reader = PacketReader::new(frame);
    let raw = reader
        .cstring_at(2)
        .ok_or_else(|| ParseError::truncated("SetChatServer"))?;
    let parts: Vec<&str> = raw.split(',').collect();
    if parts.len() < 5 {
        return Err(ParseError::new(format!(
            "chat server info has {} fields, expected 5",
            parts.len()
        )));
    }
    let port = parts[1]
        .parse::<u16>()
        .map_err(|_| ParseError::new(format!("chat server port '{}' invalid", parts[1])))?;
    Ok(ChatServerInfo {
        host: parts[0].to_string(),
        port,
        identity: parts[2].to_string(),
        connection_type: parts[3].to_string(),
        mail_key: parts[4].to_string(),
    })
}

pub fn parse_zone_server_info(frame: &[u8]) -> Result<(String, u16), ParseError> {
    let reader = PacketReader::new(frame);
    let host = reader
        .cstring_at(2)
        .ok_or_else(|| ParseError::truncated("ZoneServerInfo"))?;
    let port = reader
        .u16_at(130)
        .ok_or_else(|| ParseError::truncated("ZoneServerInfo"))?;
    Ok((host, port))
}

pub fn parse_expansion_info(frame: &[u8]) -> Option<u32> {
    PacketReader::new(frame).u32_at(2)
}
