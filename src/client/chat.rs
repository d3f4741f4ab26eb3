use crate::client::{Client, StreamKind};
use crate::error::ClientError;
use crate::proto::chat::{build_channel_message, parse_channel_message, ChatChannel};
use crate::telemetry::logging;

impl Client {
    /// Sends a channel message through the zone session. Tells require a
    /// target; everything else ignores it.
    pub fn send_chat(
        &mut self,
        channel: ChatChannel,
        target: &str,
        message: &str,
    ) -> Result<(), ClientError> {
        if !self.fully_zoned_in() {
            return Err(ClientError::NotInZone);
        }
        if channel == ChatChannel::Tell && target.is_empty() {
            return Err(ClientError::Protocol(
                "tell requires a target player name".to_string(),
            ));
        }
        let character = self.instance.character.clone();
        let frame = build_channel_message(&character, channel, target, message);
        logging::log_chat(&format!("[{}] {}: {}", channel.label(), character, message));
        self.send(StreamKind::Zone, frame);
        Ok(())
    }

    pub(crate) fn handle_channel_message(&mut self, frame: &[u8]) {
        match parse_channel_message(frame) {
            Ok(message) => {
                let channel = message
                    .channel()
                    .map(|c| c.label().to_string())
                    .unwrap_or_else(|| format!("chan{}", message.channel_id));
                println!("[chat] {} ({}): {}", message.sender, channel, message.message);
                if message.channel() == Some(ChatChannel::Tell) && !message.target.is_empty() {
                    println!("  (tell to: {})", message.target);
                }
                logging::log_chat(&format!(
                    "[{}] {}: {}",
                    channel, message.sender, message.message
                ));
            }
            Err(err) => {
                self.debug(1, &format!("Bad channel message: {}", err.message));
            }
        }
    }
}
