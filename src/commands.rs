use crate::proto::chat::ChatChannel;

/// One parsed REPL line. The first token is case-insensitive; chat message
/// bodies keep their original casing.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Chat {
        channel: ChatChannel,
        target: String,
        message: String,
    },
    Move {
        x: f32,
        y: f32,
        z: f32,
    },
    MoveTo(String),
    Follow(String),
    StopFollow,
    FaceCoord {
        x: f32,
        y: f32,
        z: f32,
    },
    FaceEntity(String),
    Turn(f32),
    Loc,
    List(Option<String>),
    Walk,
    Run,
    Pathfinding(Option<bool>),
    Debug(u8),
    Help,
    Quit,
}

pub const HELP_TEXT: &str = "\
Available commands:
  say <message>              - Say message in current zone
  tell <player> <message>    - Send tell to player
  shout <message>            - Shout message (zone-wide)
  ooc <message>              - OOC message (cross-zone)
  auction <message>          - Auction message (cross-zone)
  emote <message>            - Emote in current zone
  move <x> <y> <z>           - Move to coordinates
  moveto <entity>            - Move to named entity
  follow <entity>            - Follow named entity
  stopfollow                 - Stop following
  face <x> <y> <z>           - Face coordinates
  face <entity>              - Face named entity
  turn <degrees>             - Turn to heading (0=N, 90=E, 180=S, 270=W)
  loc                        - Show current location
  list [search]              - List nearby entities
  walk                       - Set movement speed to walk
  run                        - Set movement speed to run
  pathfinding <on|off>       - Toggle pathfinding
  debug <level>              - Set debug level (0-3)
  quit                       - Exit program";

pub fn parse_command(line: &str) -> Result<Command, String> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Err("empty command".to_string());
    }
    let (head, rest) = match trimmed.split_once(char::is_whitespace) {
        Some((head, rest)) => (head, rest.trim()),
        None => (trimmed, ""),
    };
    let keyword = head.to_ascii_lowercase();

    match keyword.as_str() {
        "say" | "shout" | "ooc" | "auction" | "emote" => {
            if rest.is_empty() {
                return Err(format!("usage: {} <message>", keyword));
            }
            let channel = match keyword.as_str() {
                "say" => ChatChannel::Say,
                "shout" => ChatChannel::Shout,
                "ooc" => ChatChannel::Ooc,
                "auction" => ChatChannel::Auction,
                _ => ChatChannel::Emote,
            };
            Ok(Command::Chat {
                channel,
                target: String::new(),
                message: rest.to_string(),
            })
        }
        "tell" => {
            let (target, message) = rest
                .split_once(char::is_whitespace)
                .map(|(t, m)| (t.trim(), m.trim()))
                .unwrap_or((rest, ""));
            if target.is_empty() || message.is_empty() {
                return Err("usage: tell <player> <message>".to_string());
            }
            Ok(Command::Chat {
                channel: ChatChannel::Tell,
                target: target.to_string(),
                message: message.to_string(),
            })
        }
        "move" => match parse_coords(rest) {
            Some((x, y, z)) => Ok(Command::Move { x, y, z }),
            None => Err("usage: move <x> <y> <z>".to_string()),
        },
        "moveto" => {
            if rest.is_empty() {
                Err("usage: moveto <entity_name>".to_string())
            } else {
                Ok(Command::MoveTo(rest.to_string()))
            }
        }
        "follow" => {
            if rest.is_empty() {
                Err("usage: follow <entity_name>".to_string())
            } else {
                Ok(Command::Follow(rest.to_string()))
            }
        }
        "stopfollow" => Ok(Command::StopFollow),
        "face" => {
            if let Some((x, y, z)) = parse_coords(rest) {
                Ok(Command::FaceCoord { x, y, z })
            } else if rest.is_empty() {
                Err("usage: face <x> <y> <z> or face <entity_name>".to_string())
            } else {
                Ok(Command::FaceEntity(rest.to_string()))
            }
        }
        "turn" => rest
            .parse::<f32>()
            .map(Command::Turn)
            .map_err(|_| "usage: turn <degrees>".to_string()),
        "loc" => Ok(Command::Loc),
        "list" => Ok(Command::List(if rest.is_empty() {
            None
        } else {
            Some(rest.to_string())
        })),
        "walk" => Ok(Command::Walk),
        "run" => Ok(Command::Run),
        "pathfinding" => match rest.to_ascii_lowercase().as_str() {
            "on" | "true" | "1" => Ok(Command::Pathfinding(Some(true))),
            "off" | "false" | "0" => Ok(Command::Pathfinding(Some(false))),
            "" => Ok(Command::Pathfinding(None)),
            other => Err(format!("unknown pathfinding state '{}'", other)),
        },
        "debug" => rest
            .parse::<u8>()
            .ok()
            .filter(|level| *level <= 3)
            .map(Command::Debug)
            .ok_or_else(|| "usage: debug <0-3>".to_string()),
        "help" => Ok(Command::Help),
        "quit" | "exit" => Ok(Command::Quit),
        other => Err(format!(
            "unknown command: '{}'. Type 'help' for commands.",
            other
        )),
    }
}

fn parse_coords(rest: &str) -> Option<(f32, f32, f32)> {
    let mut parts = rest.split_whitespace();
    let x = parts.next()?.parse::<f32>().ok()?;
    let y = parts.next()?.parse::<f32>().ok()?;
    let z = parts.next()?.parse::<f32>().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some((x, y, z))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_commands() {
        assert_eq!(
            parse_command("say Hail, friend").expect("parse"),
            Command::Chat {
                channel: ChatChannel::Say,
                target: String::new(),
                message: "Hail, friend".to_string(),
            }
        );
        assert_eq!(
            parse_command("TELL Gearheart are you there").expect("parse"),
            Command::Chat {
                channel: ChatChannel::Tell,
                target: "Gearheart".to_string(),
                message: "are you there".to_string(),
            }
        );
        assert!(parse_command("tell Gearheart").is_err());
        assert!(parse_command("say").is_err());
        assert_eq!(
            parse_command("emote waves").expect("parse"),
            Command::Chat {
                channel: ChatChannel::Emote,
                target: String::new(),
                message: "waves".to_string(),
            }
        );
    }

    #[test]
    fn movement_commands() {
        assert_eq!(
            parse_command("move 10 -20.5 3").expect("parse"),
            Command::Move {
                x: 10.0,
                y: -20.5,
                z: 3.0,
            }
        );
        assert!(parse_command("move 1 2").is_err());
        assert_eq!(
            parse_command("moveto a large rat").expect("parse"),
            Command::MoveTo("a large rat".to_string())
        );
        assert_eq!(
            parse_command("follow Guard_Timmons").expect("parse"),
            Command::Follow("Guard_Timmons".to_string())
        );
        assert_eq!(parse_command("stopfollow").expect("parse"), Command::StopFollow);
    }

    #[test]
    fn face_disambiguates_coords_from_names() {
        assert_eq!(
            parse_command("face 1 2 3").expect("parse"),
            Command::FaceCoord {
                x: 1.0,
                y: 2.0,
                z: 3.0,
            }
        );
        assert_eq!(
            parse_command("face Guard Timmons").expect("parse"),
            Command::FaceEntity("Guard Timmons".to_string())
        );
        assert!(parse_command("face").is_err());
    }

    #[test]
    fn state_commands() {
        assert_eq!(parse_command("turn 270").expect("parse"), Command::Turn(270.0));
        assert_eq!(parse_command("LOC").expect("parse"), Command::Loc);
        assert_eq!(parse_command("list").expect("parse"), Command::List(None));
        assert_eq!(
            parse_command("list rat").expect("parse"),
            Command::List(Some("rat".to_string()))
        );
        assert_eq!(parse_command("walk").expect("parse"), Command::Walk);
        assert_eq!(parse_command("run").expect("parse"), Command::Run);
        assert_eq!(
            parse_command("pathfinding off").expect("parse"),
            Command::Pathfinding(Some(false))
        );
        assert_eq!(
            parse_command("pathfinding").expect("parse"),
            Command::Pathfinding(None)
        );
        assert_eq!(parse_command("debug 3").expect("parse"), Command::Debug(3));
        assert!(parse_command("debug 9").is_err());
        assert_eq!(parse_command("quit").expect("parse"), Command::Quit);
        assert_eq!(parse_command("Exit").expect("parse"), Command::Quit);
        assert!(parse_command("").is_err());
        assert!(parse_command("frobnicate").is_err());
    }
}
