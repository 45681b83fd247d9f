//! Conversation UI components for the chat panel

pub mod commands;
pub mod composer;
pub mod history;
pub mod manager;
pub mod panel;

pub use commands::{
    get_help_text, parse_slash_command, quick_action_message, ParsedCommand, SlashCommand,
};
pub use composer::{ConversationComposer, ConversationResult};
pub use history::ConversationHistory;
pub use manager::{ConversationAction, ConversationManager};
pub use panel::ChatPanel;
