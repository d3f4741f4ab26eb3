use crate::net::packet::{PacketReader, PacketWriter};
use crate::proto::{opcodes, ParseError};

const TARGET_OFFSET: usize = 2;
const SENDER_OFFSET: usize = 66;
const LANGUAGE_OFFSET: usize = 130;
const CHANNEL_OFFSET: usize = 134;
const SKILL_OFFSET: usize = 146;
const MESSAGE_OFFSET: usize = 150;
const NAME_WIDTH: usize = 64;

/// Perfect language skill; what real clients send.
const LANGUAGE_SKILL: u32 = 100;
const COMMON_TONGUE: u32 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatChannel {
    Guild,
    Group,
    Shout,
    Auction,
    Ooc,
    Broadcast,
    Tell,
    Say,
    Petition,
    GmSay,
    Raid,
    Emote,
}

impl ChatChannel {
    pub fn wire_id(self) -> u32 {
        match self {
            ChatChannel::Guild => 0,
            ChatChannel::Group => 2,
            ChatChannel::Shout => 3,
            ChatChannel::Auction => 4,
            ChatChannel::Ooc => 5,
            ChatChannel::Broadcast => 6,
            ChatChannel::Tell => 7,
            ChatChannel::Say => 8,
            ChatChannel::Petition => 10,
            ChatChannel::GmSay => 11,
            ChatChannel::Raid => 15,
            ChatChannel::Emote => 22,
        }
    }

    pub fn from_wire(id: u32) -> Option<Self> {
        Some(match id {
            0 => ChatChannel::Guild,
            2 => ChatChannel::Group,
            3 => ChatChannel::Shout,
            4 => ChatChannel::Auction,
            5 => ChatChannel::Ooc,
            6 => ChatChannel::Broadcast,
            7 => ChatChannel::Tell,
            8 => ChatChannel::Say,
            10 => ChatChannel::Petition,
            11 => ChatChannel::GmSay,
            15 => ChatChannel::Raid,
            22 => ChatChannel::Emote,
            _ => return None,
        })
    }

    pub fn label(self) -> &'static str {
        match self {
            ChatChannel::Guild => "guild",
            ChatChannel::Group => "group",
            ChatChannel::Shout => "shout",
            ChatChannel::Auction => "auction",
            ChatChannel::Ooc => "ooc",
            ChatChannel::Broadcast => "broadcast",
            ChatChannel::Tell => "tell",
            ChatChannel::Say => "say",
            ChatChannel::Petition => "petition",
            ChatChannel::GmSay => "gmsay",
            ChatChannel::Raid => "raid",
            ChatChannel::Emote => "emote",
        }
    }

    /// Command-facing channel names accepted by the REPL.
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name.to_ascii_lowercase().as_str() {
            "guild" => ChatChannel::Guild,
            "group" => ChatChannel::Group,
            "shout" => ChatChannel::Shout,
            "auction" => ChatChannel::Auction,
            "ooc" => ChatChannel::Ooc,
            "tell" => ChatChannel::Tell,
            "say" => ChatChannel::Say,
            "emote" => ChatChannel::Emote,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChannelMessage {
    pub target: String,
    pub sender: String,
    pub language: u32,
    pub channel_id: u32,
    pub skill: u32,
    pub message: String,
}

impl ChannelMessage {
    pub fn channel(&self) -> Option<ChatChannel> {
        ChatChannel::from_wire(self.channel_id)
    }
}

/// Fixed header (target, sender, language, channel, skill) followed by the
/// null-terminated body. Target is only meaningful for tells.
pub fn build_channel_message(
    sender: &str,
    channel: ChatChannel,
    target: &str,
    message: &str,
) -> Vec<u8> {
    let mut writer = PacketWriter::zeroed(MESSAGE_OFFSET + message.len() + 1);
    writer.put_u16_at(0, opcodes::OP_CHANNEL_MESSAGE);
    if !target.is_empty() {
        writer.put_fixed_str_at(TARGET_OFFSET, target, NAME_WIDTH);
    }
    writer.put_fixed_str_at(SENDER_OFFSET, sender, NAME_WIDTH);
    writer.put_u32_at(LANGUAGE_OFFSET, COMMON_TONGUE);
    writer.put_u32_at(CHANNEL_OFFSET, channel.wire_id());
    writer.put_u32_at(SKILL_OFFSET, LANGUAGE_SKILL);
    writer.put_bytes_at(MESSAGE_OFFSET, message.as_bytes());
    writer.into_vec()
}

pub fn parse_channel_message(frame: &[u8]) -> Result<ChannelMessage, ParseError> {
    if frame.len() < MESSAGE_OFFSET {
        return Err(ParseError::new(format!(
            "channel message packet too small: {} bytes",
            frame.len()
        )));
    }
    let reader = PacketReader::new(frame);
    Ok(ChannelMessage {
        target: reader.cstring_at(TARGET_OFFSET).unwrap_or_default(),
        sender: reader.cstring_at(SENDER_OFFSET).unwrap_or_default(),
        language: reader.u32_at(LANGUAGE_OFFSET).unwrap_or(0),
        channel_id: reader.u32_at(CHANNEL_OFFSET).unwrap_or(0),
        skill: reader.u32_at(SKILL_OFFSET).unwrap_or(0),
        message: reader.cstring_at(MESSAGE_OFFSET).unwrap_or_default(),
    })
}
