use std::str::FromStr;

use strum::{AsRefStr, EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

/// Commands that can be invoked by starting a message with a leading slash.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, EnumIter, AsRefStr, IntoStaticStr,
)]
#[strum(serialize_all = "kebab-case")]
pub enum SlashCommand {
    /// Sign in with phone number and one-time password
    Login,
    /// Ask about a listed order by its number
    Order,
    /// Send a quick action for a category
    Quick,
    /// Toggle reading replies aloud
    Speech,
    /// Start or stop voice input
    Listen,
    /// Close the chat panel
    Close,
    /// Show help
    Help,
    /// Exit the application
    Bye,
}

pub fn command_entries() -> Vec<CommandEntry> {
    SlashCommand::iter()
        .map(|command| CommandEntry {
            command,
            keyword: command.command(),
            description: command.description(),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    pub command: SlashCommand,
    pub argument: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandEntry {
    pub command: SlashCommand,
    pub keyword: &'static str,
    pub description: &'static str,
}

impl ParsedCommand {
    pub fn argument(&self) -> Option<&str> {
        self.argument.as_deref()
    }

    /// 1-based order number for `/order N`
    pub fn order_number(&self) -> Option<usize> {
        if self.command != SlashCommand::Order {
            return None;
        }

        self.argument()?
            .trim()
            .trim_start_matches('#')
            .parse()
            .ok()
            .filter(|n| *n > 0)
    }
}

impl SlashCommand {
    /// User-visible description shown in help.
    pub fn description(self) -> &'static str {
        match self {
            SlashCommand::Login => "sign in with your phone number",
            SlashCommand::Order => "ask about a listed order (/order <number>)",
            SlashCommand::Quick => "quick action for a category (/quick <category>)",
            SlashCommand::Speech => "toggle reading replies aloud",
            SlashCommand::Listen => "start or stop voice input",
            SlashCommand::Close => "close the chat panel",
            SlashCommand::Help => "show available commands",
            SlashCommand::Bye => "exit the application",
        }
    }

    /// Command string without the leading '/'.
    pub fn command(self) -> &'static str {
        self.into()
    }
}

/// Return all built-in commands in a Vec paired with their command string.
pub fn built_in_slash_commands() -> Vec<(&'static str, SlashCommand)> {
    SlashCommand::iter().map(|c| (c.command(), c)).collect()
}

/// Parse a slash command from user input
pub fn parse_slash_command(input: &str) -> Option<ParsedCommand> {
    let input = input.trim();
    if !input.starts_with('/') {
        return None;
    }

    let mut parts = input[1..].split_whitespace();
    let head = parts.next()?;
    let rest: Vec<String> = parts.map(|s| s.to_string()).collect();

    let command = SlashCommand::from_str(head).ok().or_else(|| match head.to_lowercase().as_str() {
        "q" | "quit" | "exit" => Some(SlashCommand::Bye),
        "h" | "?" => Some(SlashCommand::Help),
        "o" | "orders" => Some(SlashCommand::Order),
        "mic" | "voice" => Some(SlashCommand::Listen),
        "mute" | "speak" => Some(SlashCommand::Speech),
        "signin" => Some(SlashCommand::Login),
        _ => None,
    })?;

    let argument = if rest.is_empty() {
        None
    } else {
        Some(rest.join(" "))
    };

    Some(ParsedCommand { command, argument })
}

/// Message sent for a quick-action category
pub fn quick_action_message(category: &str) -> String {
    let category = category.trim();
    if category.eq_ignore_ascii_case("customersupport") {
        "Hello".to_string()
    } else {
        format!("I'm interested in {}.", category)
    }
}

/// Get help text for all available commands
pub fn get_help_text() -> String {
    let mut help = String::from("Available commands:\n\n");
    for (command_str, command) in built_in_slash_commands() {
        help.push_str(&format!("/{} - {}\n", command_str, command.description()));
    }

    help.push_str("\nAliases: /q for /bye, /o for /order, /mic for /listen, /mute for /speech");
    help.push_str("\nCtrl+O toggles the panel. PageUp/PageDown scroll the conversation.");

    help
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands_and_aliases() {
        let parsed = parse_slash_command("/order 2").unwrap();
        assert_eq!(parsed.command, SlashCommand::Order);
        assert_eq!(parsed.order_number(), Some(2));

        assert_eq!(parse_slash_command("/q").unwrap().command, SlashCommand::Bye);
        assert_eq!(parse_slash_command("  /mic ").unwrap().command, SlashCommand::Listen);
        assert!(parse_slash_command("where is /order").is_none());
        assert!(parse_slash_command("/unknown").is_none());
    }

    #[test]
    fn order_number_rejects_zero_and_garbage() {
        assert_eq!(parse_slash_command("/order #3").unwrap().order_number(), Some(3));
        assert_eq!(parse_slash_command("/order 0").unwrap().order_number(), None);
        assert_eq!(parse_slash_command("/order two").unwrap().order_number(), None);
        assert_eq!(parse_slash_command("/order").unwrap().order_number(), None);
        assert_eq!(parse_slash_command("/help 2").unwrap().order_number(), None);
    }

    #[test]
    fn quick_actions_map_to_messages() {
        assert_eq!(quick_action_message("customersupport"), "Hello");
        assert_eq!(quick_action_message("laptops"), "I'm interested in laptops.");
    }

    #[test]
    fn help_lists_every_command() {
        let help = get_help_text();
        for (keyword, _) in built_in_slash_commands() {
            assert!(help.contains(&format!("/{} - ", keyword)));
        }
    }
}
