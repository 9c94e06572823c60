//! Chat Command Parsing

/// A subscriber command received over chat
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// `/start`: subscribe to alerts
    Start,
    /// `/stop`: unsubscribe
    Stop,
    /// `/sleep N`: snooze for N minutes (0 or unparsable clears)
    Sleep(i64),
}

impl Command {
    /// Parse a message text; anything that is not a known command is `None`.
    ///
    /// Group chats address bots as `/start@botname`, so the suffix is dropped.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let (head, rest) = match text.split_once(char::is_whitespace) {
            Some((head, rest)) => (head, rest.trim()),
            None => (text, ""),
        };
        let name = head.split('@').next().unwrap_or(head);

        match name {
            "/start" => Some(Command::Start),
            "/stop" => Some(Command::Stop),
            "/sleep" => Some(Command::Sleep(rest.parse().unwrap_or(0))),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_commands() {
        assert_eq!(Command::parse("/start"), Some(Command::Start));
        assert_eq!(Command::parse("  /stop  "), Some(Command::Stop));
        assert_eq!(Command::parse("/sleep 30"), Some(Command::Sleep(30)));
        assert_eq!(Command::parse("/sleep\t-5"), Some(Command::Sleep(-5)));
    }

    #[test]
    fn test_bot_suffix() {
        assert_eq!(Command::parse("/start@co2_alert_bot"), Some(Command::Start));
        assert_eq!(Command::parse("/sleep@co2_alert_bot 10"), Some(Command::Sleep(10)));
    }

    #[test]
    fn test_unparsable_sleep_clears() {
        assert_eq!(Command::parse("/sleep"), Some(Command::Sleep(0)));
        assert_eq!(Command::parse("/sleep soon"), Some(Command::Sleep(0)));
    }

    #[test]
    fn test_non_commands() {
        assert_eq!(Command::parse(""), None);
        assert_eq!(Command::parse("start"), None);
        assert_eq!(Command::parse("/help"), None);
        assert_eq!(Command::parse("/starting"), None);
    }
}
