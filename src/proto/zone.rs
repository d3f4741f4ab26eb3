use crate::net::packet::{PacketReader, PacketWriter};
use crate::proto::position::PositionRecord;
use crate::proto::{opcodes, ParseError};

/// Annotated in the source protocol only as a possible checksum; the server
/// accepts this literal for the Titanium revision. Unexplained.
pub const ZONE_ENTRY_MAGIC: u32 = 0xFFF67726;

const ZONE_ENTRY_SIZE: usize = 70;
const CHARACTER_NAME_WIDTH: usize = 64;

pub const SPAWN_RECORD_BYTES: usize = 385;
const SPAWN_NAME_OFFSET: usize = 7;
const SPAWN_HP_OFFSET: usize = 86;
const SPAWN_BITFIELDS_OFFSET: usize = 94;
const SPAWN_LEVEL_OFFSET: usize = 151;
const SPAWN_GUILD_OFFSET: usize = 238;
const SPAWN_RACE_OFFSET: usize = 284;
const SPAWN_CLASS_OFFSET: usize = 331;
const SPAWN_GENDER_OFFSET: usize = 334;
const SPAWN_ID_OFFSET: usize = 340;

/// Position block inside the player profile, relative to the frame.
const PROFILE_POSITION_OFFSET: usize = 30;
const PROFILE_ENTITY_ID_OFFSET: usize = 14386;

const SERVER_FILTER_COUNT: usize = 29;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerProfile {
    pub entity_id: u32,
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub heading: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpawnRecord {
    pub spawn_id: u32,
    pub name: String,
    pub level: u8,
    pub class_id: u8,
    pub race_id: u32,
    pub gender: u8,
    pub guild_id: u32,
    pub hp_percent: u8,
    pub position: PositionRecord,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeathNotice {
    pub victim_id: u16,
    pub killer_id: u16,
    pub damage: u32,
    pub spell_id: u16,
}

/// Bare stream-identification frame; goes out unreliable right after the
/// zone session connects.
pub fn build_stream_identify() -> Vec<u8> {
    opcodes::OP_ZONE_ENTRY.to_le_bytes().to_vec()
}

pub fn build_zone_entry(character: &str) -> Vec<u8> {
    let mut writer = PacketWriter::zeroed(ZONE_ENTRY_SIZE);
    writer.put_u16_at(0, opcodes::OP_ZONE_ENTRY);
    writer.put_u32_at(2, ZONE_ENTRY_MAGIC);
    writer.put_fixed_str_at(6, character, CHARACTER_NAME_WIDTH);
    writer.into_vec()
}

/// Most zone-phase requests are bare two-byte frames.
pub fn build_request(opcode: u16) -> Vec<u8> {
    opcode.to_le_bytes().to_vec()
}

pub fn build_update_aa() -> Vec<u8> {
    let mut writer = PacketWriter::zeroed(12);
    writer.put_u16_at(0, opcodes::OP_UPDATE_AA);
    writer.into_vec()
}

/// All 29 filters wide open.
pub fn build_set_server_filter() -> Vec<u8> {
    let mut writer = PacketWriter::with_capacity(2 + SERVER_FILTER_COUNT * 4);
    writer.write_u16_le(opcodes::OP_SET_SERVER_FILTER);
    for _ in 0..SERVER_FILTER_COUNT {
        writer.write_u32_le(0xFFFF_FFFF);
    }
    writer.into_vec()
}

/// The zone short name sits past the 64-byte character name field.
pub fn parse_new_zone_name(frame: &[u8]) -> Result<String, ParseError> {
    PacketReader::new(frame)
        .cstring_at(66)
        .ok_or_else(|| ParseError::truncated("NewZone"))
}

pub fn parse_player_profile(frame: &[u8]) -> Result<PlayerProfile, ParseError> {
    let reader = PacketReader::new(frame);
    let entity_id = reader
        .u32_at(PROFILE_ENTITY_ID_OFFSET)
        .ok_or_else(|| ParseError::truncated("PlayerProfile"))?;
    let x = reader
        .f32_at(PROFILE_POSITION_OFFSET)
        .ok_or_else(|| ParseError::truncated("PlayerProfile"))?;
    let y = reader
        .f32_at(PROFILE_POSITION_OFFSET + 4)
        .ok_or_else(|| ParseError::truncated("PlayerProfile"))?;
    let z = reader
        .f32_at(PROFILE_POSITION_OFFSET + 8)
        .ok_or_else(|| ParseError::truncated("PlayerProfile"))?;
    let heading = reader
        .f32_at(PROFILE_POSITION_OFFSET + 12)
        .ok_or_else(|| ParseError::truncated("PlayerProfile"))?;
    Ok(PlayerProfile {
        entity_id,
        x,
        y,
        z,
        heading,
    })
}

fn parse_spawn_at(reader: &PacketReader, base: usize) -> Option<SpawnRecord> {
    let name = reader.cstring_at(base + SPAWN_NAME_OFFSET)?;
    let words = [
        reader.u32_at(base + SPAWN_BITFIELDS_OFFSET)?,
        reader.u32_at(base + SPAWN_BITFIELDS_OFFSET + 4)?,
        reader.u32_at(base + SPAWN_BITFIELDS_OFFSET + 8)?,
        reader.u32_at(base + SPAWN_BITFIELDS_OFFSET + 12)?,
        0,
    ];
    Some(SpawnRecord {
        spawn_id: reader.u32_at(base + SPAWN_ID_OFFSET)?,
        name,
        level: reader.u8_at(base + SPAWN_LEVEL_OFFSET)?,
        class_id: reader.u8_at(base + SPAWN_CLASS_OFFSET)?,
        race_id: reader.u32_at(base + SPAWN_RACE_OFFSET)?,
        gender: reader.u8_at(base + SPAWN_GENDER_OFFSET)?,
        guild_id: reader.u32_at(base + SPAWN_GUILD_OFFSET)?,
        hp_percent: reader.u8_at(base + SPAWN_HP_OFFSET)?,
        position: PositionRecord::from_words(words),
    })
}

/// `ZoneSpawns` carries back-to-back 385-byte descriptors; parsing stops at
/// the first record with an empty name.
pub fn parse_zone_spawns(frame: &[u8]) -> Vec<SpawnRecord> {
    let reader = PacketReader::new(frame);
    let mut spawns = Vec::new();
    let mut base = 2;
    while base + SPAWN_RECORD_BYTES <= frame.len() {
        match parse_spawn_at(&reader, base) {
            Some(record) if !record.name.is_empty() => spawns.push(record),
            _ => break,
        }
        base += SPAWN_RECORD_BYTES;
    }
    spawns
}

pub fn parse_new_spawn(frame: &[u8]) -> Result<SpawnRecord, ParseError> {
    if frame.len() < 2 + SPAWN_RECORD_BYTES {
        return Err(ParseError::new(format!(
            "NewSpawn packet too small: {} bytes",
            frame.len()
        )));
    }
    parse_spawn_at(&PacketReader::new(frame), 2)
        .filter(|record| !record.name.is_empty())
        .ok_or_else(|| ParseError::new("NewSpawn record malformed"))
}

pub fn parse_delete_spawn(frame: &[u8]) -> Result<u16, ParseError> {
    PacketReader::new(frame)
        .u16_at(2)
        .ok_or_else(|| ParseError::truncated("DeleteSpawn"))
}

pub fn parse_mob_health(frame: &[u8]) -> Result<(u16, u8), ParseError> {
    let reader = PacketReader::new(frame);
    let spawn_id = reader
        .u16_at(2)
        .ok_or_else(|| ParseError::truncated("MobHealth"))?;
    let hp = reader
        .u8_at(4)
        .ok_or_else(|| ParseError::truncated("MobHealth"))?;
    Ok((spawn_id, hp))
}

/// Own vitals; Titanium sends current hp, max hp, and current mana only.
pub fn parse_hp_update(frame: &[u8]) -> Result<(u32, u32, u16), ParseError> {
    let reader = PacketReader::new(frame);
    let cur_hp = reader
        .u32_at(2)
        .ok_or_else(|| ParseError::truncated("HpUpdate"))?;
    let max_hp = reader
        .u32_at(6)
        .ok_or_else(|| ParseError::truncated("HpUpdate"))?;
    let cur_mana = reader
        .u16_at(10)
        .ok_or_else(|| ParseError::truncated("HpUpdate"))?;
    Ok((cur_hp, max_hp, cur_mana))
}

pub fn parse_mana_change(frame: &[u8]) -> Result<(u16, u16, u16), ParseError> {
    let reader = PacketReader::new(frame);
    let spawn_id = reader
        .u16_at(2)
        .ok_or_else(|| ParseError::truncated("ManaChange"))?;
    let cur = reader
        .u16_at(4)
        .ok_or_else(|| ParseError::truncated("ManaChange"))?;
    let max = reader
        .u16_at(6)
        .ok_or_else(|| ParseError::truncated("ManaChange"))?;
    Ok((spawn_id, cur, max))
}

pub fn parse_death(frame: &[u8]) -> Result<DeathNotice, ParseError> {
    let reader = PacketReader::new(frame);
    let victim_id = reader
        .u16_at(2)
        .ok_or_else(|| ParseError::truncated("Death"))?;
    let killer_id = reader
        .u16_at(4)
        .ok_or_else(|| ParseError::truncated("Death"))?;
    let damage = reader
        .u32_at(6)
        .ok_or_else(|| ParseError::truncated("Death"))?;
    let spell_id = reader.u16_at(10).unwrap_or(0);
    Ok(DeathNotice {
        victim_id,
        killer_id,
        damage,
        spell_id,
    })
}
