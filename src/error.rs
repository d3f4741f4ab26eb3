/// Failure classes for one client instance; policy per class is decided by
/// the caller (startup errors halt, protocol errors drop the session,
/// user-input errors report and no-op).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// Missing or malformed configuration or command-line argument.
    Config(String),
    /// DNS resolution of the login host failed.
    Resolve(String),
    /// The login server refused the credentials, or world denied play.
    Auth(String),
    /// Unexpected or malformed packet for the current state.
    Protocol(String),
    /// Surfaced by the session layer as a disconnect.
    Transport(String),
    /// Map or navmesh file failed to parse.
    Parse(String),
    /// A command that requires the fully-zoned-in state arrived early.
    NotInZone,
}

impl std::fmt::Display for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientError::Config(msg) => write!(f, "config error: {}", msg),
            ClientError::Resolve(msg) => write!(f, "resolve error: {}", msg),
            ClientError::Auth(msg) => write!(f, "auth error: {}", msg),
            ClientError::Protocol(msg) => write!(f, "protocol error: {}", msg),
            ClientError::Transport(msg) => write!(f, "transport error: {}", msg),
            ClientError::Parse(msg) => write!(f, "parse error: {}", msg),
            ClientError::NotInZone => write!(f, "not in zone yet"),
        }
    }
}

impl std::error::Error for ClientError {}
