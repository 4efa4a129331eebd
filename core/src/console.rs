//! Console command parser (SPEC_FULL §6 "console command"). Reading stdin
//! and dispatching the parsed command lives outside this crate; this is
//! the pure `&str -> ConsoleCommand` mapping plus its inverse token table.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConsoleCommand {
    PriceFeedStart,
    PriceFeedStop,
    TelemetryStart,
    TelemetryStop,
    Shutdown,
}

/// Parses one console line. The server console uses `p+`/`p-` for the
/// price feed; a client mirror uses `s+`/`s-` for the same toggle under a
/// different name. Both accept `t+`/`t-`/`q`. Unrecognized input is `None`,
/// not an error — stdin is a free-form human channel.
pub fn parse(line: &str) -> Option<ConsoleCommand> {
    match line.trim() {
        "p+" | "s+" => Some(ConsoleCommand::PriceFeedStart),
        "p-" | "s-" => Some(ConsoleCommand::PriceFeedStop),
        "t+" => Some(ConsoleCommand::TelemetryStart),
        "t-" => Some(ConsoleCommand::TelemetryStop),
        "q" => Some(ConsoleCommand::Shutdown),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_every_server_token() {
        assert_eq!(parse("p+"), Some(ConsoleCommand::PriceFeedStart));
        assert_eq!(parse("p-"), Some(ConsoleCommand::PriceFeedStop));
        assert_eq!(parse("t+"), Some(ConsoleCommand::TelemetryStart));
        assert_eq!(parse("t-"), Some(ConsoleCommand::TelemetryStop));
        assert_eq!(parse("q"), Some(ConsoleCommand::Shutdown));
    }

    #[test]
    fn recognizes_the_client_mirror_tokens() {
        assert_eq!(parse("s+"), Some(ConsoleCommand::PriceFeedStart));
        assert_eq!(parse("s-"), Some(ConsoleCommand::PriceFeedStop));
    }

    #[test]
    fn trims_surrounding_whitespace() {
        assert_eq!(parse("  q\n"), Some(ConsoleCommand::Shutdown));
    }

    #[test]
    fn unrecognized_input_is_none() {
        assert_eq!(parse("unknown"), None);
        assert_eq!(parse(""), None);
    }
}
