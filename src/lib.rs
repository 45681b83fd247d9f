//! Terminal chat widget for a remote customer-support assistant.

pub mod config;
pub mod console;
pub mod controller;
pub mod display;
pub mod error;
pub mod events;
pub mod logger;
pub mod models;
pub mod service;
pub mod session;
pub mod speech;
pub mod ui;

pub use controller::ConversationController;
pub use display::DisplaySurface;
pub use error::DispatchError;
pub use service::{ChatService, HttpChatService};
