pub mod chat;
pub mod login;
pub mod opcodes;
pub mod position;
pub mod world;
pub mod zone;

/// Malformed or truncated packet; the frame is dropped, never panicked on.
#[derive(Debug, Clone)]
pub struct ParseError {
    pub message: String,
}

impl ParseError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn truncated(what: &str) -> Self {
        Self::new(format!("{} packet truncated", what))
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}
