//! Degraded-mode answers

/// Produces an answer when the agent loop aborts
pub trait FallbackResponder: Send + Sync {
    fn respond(&self, message: &str) -> String;
}

pub const OFFLINE_PREFIX: &str = "[Offline mode]";

/// Fixed reply that echoes the start of the user's message
#[derive(Debug, Clone, Default)]
pub struct OfflineFallback;

const ECHO_CHARS: usize = 80;

impl FallbackResponder for OfflineFallback {
    fn respond(&self, message: &str) -> String {
        let trimmed = message.trim();
        let mut echo: String = trimmed.chars().take(ECHO_CHARS).collect();
        if trimmed.chars().count() > ECHO_CHARS {
            echo.push_str("...");
        }

        if echo.is_empty() {
            format!(
                "{} I can't reach my reasoning engine right now. Please try again shortly.",
                OFFLINE_PREFIX
            )
        } else {
            format!(
                "{} I can't reach my reasoning engine right now, so I couldn't work on \"{}\". Please try again shortly.",
                OFFLINE_PREFIX, echo
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offline_prefix() {
        let reply = OfflineFallback.respond("list my files");
        assert!(reply.starts_with("[Offline mode]"));
        assert!(reply.contains("list my files"));
    }

    #[test]
    fn test_long_message_truncated() {
        let reply = OfflineFallback.respond(&"x".repeat(500));
        assert!(reply.contains("..."));
        assert!(reply.len() < 300);
    }

    #[test]
    fn test_empty_message() {
        assert!(OfflineFallback.respond("   ").starts_with(OFFLINE_PREFIX));
    }
}
