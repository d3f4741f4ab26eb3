//! Titanium-revision opcode constants for the three server phases.

// Login server
pub const OP_SESSION_READY: u16 = 0x0001;
pub const OP_LOGIN: u16 = 0x0002;
pub const OP_SERVER_LIST_REQUEST: u16 = 0x0004;
pub const OP_PLAY_EVERQUEST_REQUEST: u16 = 0x000d;
pub const OP_CHAT_MESSAGE: u16 = 0x0016;
pub const OP_LOGIN_ACCEPTED: u16 = 0x0017;
pub const OP_SERVER_LIST_RESPONSE: u16 = 0x0018;
pub const OP_PLAY_EVERQUEST_RESPONSE: u16 = 0x0021;

// World server
pub const OP_SEND_LOGIN_INFO: u16 = 0x4dd0;
pub const OP_GUILDS_LIST: u16 = 0x6957;
pub const OP_LOG_SERVER: u16 = 0x0fa6;
pub const OP_APPROVE_WORLD: u16 = 0x3c25;
pub const OP_ENTER_WORLD: u16 = 0x7cba;
pub const OP_POST_ENTER_WORLD: u16 = 0x52a4;
pub const OP_EXPANSION_INFO: u16 = 0x04ec;
pub const OP_SEND_CHAR_INFO: u16 = 0x4513;
pub const OP_WORLD_CLIENT_CRC1: u16 = 0x5072;
pub const OP_WORLD_CLIENT_CRC2: u16 = 0x5b18;
pub const OP_ACK_PACKET: u16 = 0x7752;
pub const OP_WORLD_CLIENT_READY: u16 = 0x5e99;
pub const OP_MOTD: u16 = 0x024d;
pub const OP_SET_CHAT_SERVER: u16 = 0x00d7;
pub const OP_SET_CHAT_SERVER2: u16 = 0x6536;
pub const OP_ZONE_SERVER_INFO: u16 = 0x61b6;
pub const OP_WORLD_COMPLETE: u16 = 0x509d;

// Zone server
pub const OP_ZONE_ENTRY: u16 = 0x7213;
pub const OP_NEW_ZONE: u16 = 0x0920;
pub const OP_REQ_CLIENT_SPAWN: u16 = 0x0322;
pub const OP_ZONE_SPAWNS: u16 = 0x2e78;
pub const OP_SEND_ZONEPOINTS: u16 = 0x3eba;
pub const OP_REQ_NEW_ZONE: u16 = 0x7ac5;
pub const OP_PLAYER_PROFILE: u16 = 0x75df;
pub const OP_CHAR_INVENTORY: u16 = 0x5394;
pub const OP_TIME_OF_DAY: u16 = 0x1580;
pub const OP_SPAWN_DOOR: u16 = 0x4c24;
pub const OP_CLIENT_READY: u16 = 0x5e20;
pub const OP_ZONE_CHANGE: u16 = 0x5dd8;
pub const OP_SET_SERVER_FILTER: u16 = 0x6563;
pub const OP_GROUND_SPAWN: u16 = 0x0f47;
pub const OP_WEATHER: u16 = 0x254d;
pub const OP_CLIENT_UPDATE: u16 = 0x14cb;
pub const OP_SPAWN_APPEARANCE: u16 = 0x7c32;
pub const OP_NEW_SPAWN: u16 = 0x1860;
pub const OP_DELETE_SPAWN: u16 = 0x55bc;
pub const OP_MOB_HEALTH: u16 = 0x0695;
pub const OP_HP_UPDATE: u16 = 0x3bcf;
pub const OP_TRIBUTE_UPDATE: u16 = 0x5639;
pub const OP_TRIBUTE_TIMER: u16 = 0x4665;
pub const OP_SEND_AA_TABLE: u16 = 0x367d;
pub const OP_UPDATE_AA: u16 = 0x5966;
pub const OP_RESPOND_AA: u16 = 0x3af4;
pub const OP_SEND_TRIBUTES: u16 = 0x067a;
pub const OP_TRIBUTE_INFO: u16 = 0x152d;
pub const OP_REQUEST_GUILD_TRIBUTES: u16 = 0x5e3a;
pub const OP_SEND_GUILD_TRIBUTES: u16 = 0x5e3d;
pub const OP_SEND_AA_STATS: u16 = 0x5996;
pub const OP_SEND_EXP_ZONEIN: u16 = 0x0587;
// No Titanium mapping; the server sends a literal zero opcode in this one
// spot, so it is only meaningful during the final bring-up stage.
pub const OP_WORLD_OBJECTS_SENT: u16 = 0x0000;
pub const OP_EXP_UPDATE: u16 = 0x5ecd;
pub const OP_RAID_UPDATE: u16 = 0x1f21;
pub const OP_GUILD_MOTD: u16 = 0x475a;
pub const OP_CHANNEL_MESSAGE: u16 = 0x1004;
pub const OP_WEAR_CHANGE: u16 = 0x7441;
pub const OP_MOVE_DOOR: u16 = 0x700d;
pub const OP_COMPLETED_TASKS: u16 = 0x76a2;
pub const OP_DZ_COMPASS: u16 = 0x28aa;
pub const OP_DZ_EXPEDITION_LOCKOUT_TIMERS: u16 = 0x7c12;
pub const OP_BEGIN_CAST: u16 = 0x3990;
pub const OP_MANA_CHANGE: u16 = 0x4839;
pub const OP_FORMATTED_MESSAGE: u16 = 0x5a48;
pub const OP_PLAYER_STATE_ADD: u16 = 0x63da;
pub const OP_DEATH: u16 = 0x6160;
pub const OP_PLAYER_STATE_REMOVE: u16 = 0x381d;
pub const OP_STAMINA: u16 = 0x7a83;

/// UCS (auxiliary chat) opcodes, 1-byte wire format. The UCS sub-client is
/// out of scope for this revision; the constants are reserved so the wire
/// format stays documented.
#[allow(dead_code)]
pub mod ucs {
    pub const OP_MAIL_LOGIN: u8 = 0x00;
    pub const OP_CHAT_MESSAGE: u8 = 0x01;
    pub const OP_CHAT_JOIN: u8 = 0x02;
    pub const OP_CHAT_LEAVE: u8 = 0x03;
    pub const OP_CHAT_WHO: u8 = 0x04;
    pub const OP_CHAT_INVITE: u8 = 0x05;
    pub const OP_CHAT_MODERATE: u8 = 0x06;
    pub const OP_CHAT_GRANT: u8 = 0x07;
    pub const OP_CHAT_VOICE: u8 = 0x08;
    pub const OP_CHAT_KICK: u8 = 0x09;
    pub const OP_CHAT_SET_OWNER: u8 = 0x0a;
    pub const OP_CHAT_OP_LIST: u8 = 0x0b;
    pub const OP_CHAT_LIST: u8 = 0x0c;
    pub const OP_MAIL_HEADER_COUNT: u8 = 0x20;
    pub const OP_MAIL_HEADER: u8 = 0x21;
    pub const OP_MAIL_GET_BODY: u8 = 0x22;
    pub const OP_MAIL_SEND_BODY: u8 = 0x23;
    pub const OP_MAIL_DELETE_MSG: u8 = 0x24;
    pub const OP_MAIL_NEW: u8 = 0x25;
    pub const OP_BUDDY: u8 = 0x40;
    pub const OP_IGNORE: u8 = 0x41;
}

pub fn opcode_name(opcode: u16) -> String {
    let name = match opcode {
        OP_SESSION_READY => "SessionReady",
        OP_LOGIN => "Login",
        OP_SERVER_LIST_REQUEST => "ServerListRequest",
        OP_PLAY_EVERQUEST_REQUEST => "PlayEverquestRequest",
        OP_CHAT_MESSAGE => "ChatMessage",
        OP_LOGIN_ACCEPTED => "LoginAccepted",
        OP_SERVER_LIST_RESPONSE => "ServerListResponse",
        OP_PLAY_EVERQUEST_RESPONSE => "PlayEverquestResponse",
        OP_SEND_LOGIN_INFO => "SendLoginInfo",
        OP_GUILDS_LIST => "GuildsList",
        OP_LOG_SERVER => "LogServer",
        OP_APPROVE_WORLD => "ApproveWorld",
        OP_ENTER_WORLD => "EnterWorld",
        OP_POST_ENTER_WORLD => "PostEnterWorld",
        OP_EXPANSION_INFO => "ExpansionInfo",
        OP_SEND_CHAR_INFO => "SendCharInfo",
        OP_WORLD_CLIENT_CRC1 => "WorldClientCrc1",
        OP_WORLD_CLIENT_CRC2 => "WorldClientCrc2",
        OP_ACK_PACKET => "AckPacket",
        OP_WORLD_CLIENT_READY => "WorldClientReady",
        OP_MOTD => "Motd",
        OP_SET_CHAT_SERVER => "SetChatServer",
        OP_SET_CHAT_SERVER2 => "SetChatServer2",
        OP_ZONE_SERVER_INFO => "ZoneServerInfo",
        OP_WORLD_COMPLETE => "WorldComplete",
        OP_ZONE_ENTRY => "ZoneEntry",
        OP_NEW_ZONE => "NewZone",
        OP_REQ_CLIENT_SPAWN => "ReqClientSpawn",
        OP_ZONE_SPAWNS => "ZoneSpawns",
        OP_SEND_ZONEPOINTS => "SendZonepoints",
        OP_REQ_NEW_ZONE => "ReqNewZone",
        OP_PLAYER_PROFILE => "PlayerProfile",
        OP_CHAR_INVENTORY => "CharInventory",
        OP_TIME_OF_DAY => "TimeOfDay",
        OP_SPAWN_DOOR => "SpawnDoor",
        OP_CLIENT_READY => "ClientReady",
        OP_ZONE_CHANGE => "ZoneChange",
        OP_SET_SERVER_FILTER => "SetServerFilter",
        OP_GROUND_SPAWN => "GroundSpawn",
        OP_WEATHER => "Weather",
        OP_CLIENT_UPDATE => "ClientUpdate",
        OP_SPAWN_APPEARANCE => "SpawnAppearance",
        OP_NEW_SPAWN => "NewSpawn",
        OP_DELETE_SPAWN => "DeleteSpawn",
        OP_MOB_HEALTH => "MobHealth",
        OP_HP_UPDATE => "HpUpdate",
        OP_TRIBUTE_UPDATE => "TributeUpdate",
        OP_TRIBUTE_TIMER => "TributeTimer",
        OP_SEND_AA_TABLE => "SendAATable",
        OP_UPDATE_AA => "UpdateAA",
        OP_RESPOND_AA => "RespondAA",
        OP_SEND_TRIBUTES => "SendTributes",
        OP_TRIBUTE_INFO => "TributeInfo",
        OP_REQUEST_GUILD_TRIBUTES => "RequestGuildTributes",
        OP_SEND_GUILD_TRIBUTES => "SendGuildTributes",
        OP_SEND_AA_STATS => "SendAAStats",
        OP_SEND_EXP_ZONEIN => "SendExpZonein",
        OP_WORLD_OBJECTS_SENT => "WorldObjectsSent",
        OP_EXP_UPDATE => "ExpUpdate",
        OP_RAID_UPDATE => "RaidUpdate",
        OP_GUILD_MOTD => "GuildMotd",
        OP_CHANNEL_MESSAGE => "ChannelMessage",
        OP_WEAR_CHANGE => "WearChange",
        OP_MOVE_DOOR => "MoveDoor",
        OP_COMPLETED_TASKS => "CompletedTasks",
        OP_DZ_COMPASS => "DzCompass",
        OP_DZ_EXPEDITION_LOCKOUT_TIMERS => "DzExpeditionLockoutTimers",
        OP_BEGIN_CAST => "BeginCast",
        OP_MANA_CHANGE => "ManaChange",
        OP_FORMATTED_MESSAGE => "FormattedMessage",
        OP_PLAYER_STATE_ADD => "PlayerStateAdd",
        OP_DEATH => "Death",
        OP_PLAYER_STATE_REMOVE => "PlayerStateRemove",
        OP_STAMINA => "Stamina",
        _ => return format!("Unknown_{:#06x}", opcode),
    };
    name.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_and_unknown_names() {
        assert_eq!(opcode_name(OP_ZONE_ENTRY), "ZoneEntry");
        assert_eq!(opcode_name(OP_WORLD_OBJECTS_SENT), "WorldObjectsSent");
        assert_eq!(opcode_name(0x7fff), "Unknown_0x7fff");
    }
}
