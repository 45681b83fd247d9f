use crate::controller::{ConversationController, TurnRequest};
use crate::events::AppEvent;
use crate::service::ChatService;
use crate::speech::SpeechActivity;
use crate::ui::conversation::{
    get_help_text, quick_action_message, ChatPanel, ConversationComposer, ConversationResult,
    ParsedCommand, SlashCommand,
};
use crossterm::event::KeyEvent;
use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    text::{Line, Span},
    widgets::Widget,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Actions that can be requested by the conversation manager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationAction {
    None,
    ClosePanel,
    Exit,
}

/// Manages the conversation flow and UI components
pub struct ConversationManager<S: ChatService + ?Sized + 'static> {
    controller: ConversationController<S, ChatPanel>,
    composer: ConversationComposer,
    events: mpsc::UnboundedSender<AppEvent>,
    in_flight: Option<JoinHandle<()>>,
}

impl<S: ChatService + ?Sized + 'static> ConversationManager<S> {
    pub fn new(
        controller: ConversationController<S, ChatPanel>,
        events: mpsc::UnboundedSender<AppEvent>,
    ) -> Self {
        Self {
            controller,
            composer: ConversationComposer::new(),
            events,
            in_flight: None,
        }
    }

    pub fn controller(&self) -> &ConversationController<S, ChatPanel> {
        &self.controller
    }

    pub fn panel(&self) -> &ChatPanel {
        self.controller.display()
    }

    fn panel_mut(&mut self) -> &mut ChatPanel {
        self.controller.display_mut()
    }

    pub fn composer(&self) -> &ConversationComposer {
        &self.composer
    }

    pub fn greet(&mut self, welcome: &str) {
        self.controller.greet(welcome);
    }

    pub fn open_panel(&mut self) {
        self.panel_mut().open();
        self.composer.set_focus(true);
    }

    /// Close the panel, abandoning any unfinished turn
    pub fn close_panel(&mut self) {
        if self.controller.cancel() {
            self.abort_in_flight();
        }
        self.panel_mut().close();
        self.composer.set_focus(false);
        self.composer.clear();
    }

    /// Submit user text as a turn
    pub fn submit(&mut self, text: &str) {
        if let Some(request) = self.controller.begin_turn(text) {
            self.spawn_turn(request);
        }
        self.sync_composer();
    }

    /// Send a quick action without echoing it
    pub fn quick_action(&mut self, category: &str) {
        if let Some(request) = self.controller.begin_chat_request(&quick_action_message(category)) {
            self.spawn_turn(request);
        }
    }

    fn spawn_turn(&mut self, request: TurnRequest) {
        self.abort_in_flight();

        let service = self.controller.service();
        let events = self.events.clone();
        tracing::debug!(ticket = request.ticket().value(), "dispatching turn");

        self.in_flight = Some(tokio::spawn(async move {
            let outcome = request.execute(service.as_ref()).await;
            let _ = events.send(AppEvent::TurnCompleted(outcome));
        }));
    }

    fn abort_in_flight(&mut self) {
        if let Some(handle) = self.in_flight.take() {
            handle.abort();
        }
    }

    /// Apply an event from a background task
    pub fn handle_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::TurnCompleted(outcome) => {
                if self.controller.finish_turn(outcome) {
                    self.in_flight = None;
                }
                self.sync_composer();
            }
            AppEvent::Transcript(text) => {
                tracing::debug!(chars = text.chars().count(), "voice transcript received");
                self.submit(&text);
            }
            AppEvent::SpeechFailed(message) => {
                self.panel_mut().history_mut().add_system_message(message);
            }
        }
    }

    /// Handle key input
    pub fn handle_key(&mut self, key: KeyEvent) -> ConversationAction {
        match self.composer.handle_key(key) {
            ConversationResult::Submitted(input) => {
                self.submit(&input);
                ConversationAction::None
            }
            ConversationResult::Command(command) => self.handle_slash_command(command),
            ConversationResult::None => ConversationAction::None,
        }
    }

    /// Periodic housekeeping from the UI loop
    pub fn tick(&mut self) {
        self.panel_mut().speech_mut().tick();
    }

    pub fn scroll_history(&mut self, up: bool, lines: usize) {
        let history = self.panel_mut().history_mut();
        if up {
            history.scroll_up(lines);
        } else {
            history.scroll_down(lines);
        }
    }

    /// Stop background work before exit
    pub fn shutdown(&mut self) {
        self.controller.cancel();
        self.abort_in_flight();
        self.panel_mut().speech_mut().stop_all();
    }

    /// Handle slash commands
    fn handle_slash_command(&mut self, command: ParsedCommand) -> ConversationAction {
        match command.command {
            SlashCommand::Login => {
                if let Err(e) = self.controller.request_phone() {
                    tracing::debug!(error = %e, "login requested mid-flow");
                    self.notice("Sign-in is already in progress.");
                }
                self.sync_composer();
            }
            SlashCommand::Order => match command.order_number() {
                Some(number) => {
                    let prompt = self
                        .panel()
                        .history()
                        .order(number)
                        .map(ConversationController::<S, ChatPanel>::order_prompt);
                    match prompt {
                        Some(prompt) => self.submit(&prompt),
                        None => self.notice(&format!("There is no order #{}.", number)),
                    }
                }
                None => self.notice("Usage: /order <number>"),
            },
            SlashCommand::Quick => match command.argument() {
                Some(category) => self.quick_action(category),
                None => self.notice("Usage: /quick <category>"),
            },
            SlashCommand::Speech => {
                let enabled = self.panel_mut().speech_mut().toggle_synthesis();
                self.notice(if enabled { "Replies will be read aloud." } else { "Speech muted." });
            }
            SlashCommand::Listen => match self.panel_mut().speech_mut().toggle_listening() {
                Ok(true) => self.notice("Listening..."),
                Ok(false) => self.notice("Stopped listening."),
                Err(e) => {
                    tracing::warn!(error = %e, "voice input unavailable");
                    self.notice(&e.to_string());
                }
            },
            SlashCommand::Close => return ConversationAction::ClosePanel,
            SlashCommand::Help => self.notice(&get_help_text()),
            SlashCommand::Bye => return ConversationAction::Exit,
        }

        ConversationAction::None
    }

    fn notice(&mut self, text: &str) {
        self.panel_mut().history_mut().add_system_message(text.to_string());
    }

    fn sync_composer(&mut self) {
        self.composer.set_pending(self.controller.pending());
    }

    fn status_line(&mut self) -> Line<'static> {
        let session = self.controller.session().to_string();
        let short_session: String = session.chars().take(8).collect();
        let speech = self.panel_mut().speech_mut();
        let voice = if speech.is_enabled() { "🔊" } else { "🔇" };
        let activity = match speech.activity() {
            SpeechActivity::Listening => " 🎙 listening",
            SpeechActivity::Speaking => " 🗣 speaking",
            SpeechActivity::Idle => "",
        };

        Line::from(vec![
            Span::styled("Support Chat", Style::default().fg(Color::Cyan)),
            Span::styled(
                format!("  session {}  {}{}", short_session, voice, activity),
                Style::default().fg(Color::DarkGray),
            ),
            Span::styled("  Ctrl+O close · /help", Style::default().fg(Color::DarkGray)),
        ])
    }

    /// Render the open panel
    pub fn render(&mut self, area: Rect, buf: &mut Buffer) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1), // Status
                Constraint::Min(5),    // History
                Constraint::Length(3), // Composer
            ])
            .split(area);

        let status = self.status_line();
        buf.set_line(chunks[0].x, chunks[0].y, &status, chunks[0].width);
        self.panel().history().render(chunks[1], buf);
        self.composer.render(chunks[2], buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::error::DispatchError;
    use crate::events::{ConversationRole, PendingInput};
    use crate::models::{ChatReply, OtpReply};
    use crate::session::SessionId;
    use crate::ui::conversation::history::EntryBody;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Arc;

    /// Answers every chat message with one order and echoes the text back
    struct EchoService;

    #[async_trait]
    impl ChatService for EchoService {
        async fn post_message(
            &self,
            message: &str,
            _session: &SessionId,
        ) -> Result<ChatReply, DispatchError> {
            ChatReply::from_value(json!({
                "status": "success",
                "data": {
                    "answer": format!("echo: {message}"),
                    "orders": [{"order_id": "5501", "itemname": "Kettle"}]
                }
            }))
        }

        async fn request_otp(
            &self,
            _phone: &str,
            _session: &SessionId,
        ) -> Result<OtpReply, DispatchError> {
            OtpReply::from_value(json!({"error": "0"}))
        }

        async fn verify_otp(
            &self,
            _phone: &str,
            _code: &str,
            _session: &SessionId,
        ) -> Result<OtpReply, DispatchError> {
            OtpReply::from_value(json!({"error": "0"}))
        }
    }

    fn manager() -> (ConversationManager<EchoService>, mpsc::UnboundedReceiver<AppEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let panel = ChatPanel::new(&Config::default(), tx.clone());
        let controller = ConversationController::new(Arc::new(EchoService), panel);
        (ConversationManager::new(controller, tx), rx)
    }

    fn assistant_messages(manager: &ConversationManager<EchoService>) -> Vec<String> {
        manager
            .panel()
            .history()
            .entries()
            .filter_map(|entry| match &entry.body {
                EntryBody::Message { role: ConversationRole::Assistant, content } => {
                    Some(content.clone())
                }
                _ => None,
            })
            .collect()
    }

    async fn pump(
        manager: &mut ConversationManager<EchoService>,
        rx: &mut mpsc::UnboundedReceiver<AppEvent>,
    ) {
        let event = rx.recv().await.expect("turn event");
        manager.handle_event(event);
    }

    #[tokio::test]
    async fn submitted_text_round_trips_through_a_spawned_turn() {
        let (mut manager, mut rx) = manager();
        manager.open_panel();
        manager.submit("where is my kettle");
        assert!(manager.panel().history().is_typing());

        pump(&mut manager, &mut rx).await;

        assert!(!manager.panel().history().is_typing());
        assert!(!manager.controller().is_busy());
        assert_eq!(assistant_messages(&manager), vec!["echo: where is my kettle"]);
        assert_eq!(manager.panel().history().order_count(), 1);
    }

    #[tokio::test]
    async fn order_command_sends_the_selected_order_prompt() {
        let (mut manager, mut rx) = manager();
        manager.submit("my orders");
        pump(&mut manager, &mut rx).await;

        let action = manager.handle_slash_command(parse("/order 1"));
        assert_eq!(action, ConversationAction::None);
        pump(&mut manager, &mut rx).await;

        assert_eq!(
            assistant_messages(&manager).last().unwrap(),
            "echo: This order Kettle and 5501"
        );
    }

    #[tokio::test]
    async fn quick_action_is_not_echoed_as_a_user_message() {
        let (mut manager, mut rx) = manager();
        manager.handle_slash_command(parse("/quick customersupport"));
        pump(&mut manager, &mut rx).await;

        let user_messages = manager
            .panel()
            .history()
            .entries()
            .filter(|entry| {
                matches!(
                    &entry.body,
                    EntryBody::Message { role: ConversationRole::User, .. }
                )
            })
            .count();
        assert_eq!(user_messages, 0);
        assert_eq!(assistant_messages(&manager), vec!["echo: Hello"]);
    }

    #[tokio::test]
    async fn login_moves_composer_into_phone_entry() {
        let (mut manager, _rx) = manager();
        manager.handle_slash_command(parse("/login"));
        assert_eq!(manager.controller().pending(), PendingInput::AwaitingPhone);

        manager.handle_slash_command(parse("/login"));
        assert_eq!(manager.controller().pending(), PendingInput::AwaitingPhone);
    }

    #[tokio::test]
    async fn closing_the_panel_discards_the_unfinished_turn() {
        let (mut manager, mut rx) = manager();
        manager.open_panel();
        manager.submit("hello");
        manager.close_panel();

        assert!(!manager.controller().is_busy());
        assert!(!manager.panel().is_open());
        assert!(!manager.panel().history().is_typing());
        // The aborted task never reports back
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn bye_and_close_are_reported_to_the_app() {
        let (mut manager, _rx) = manager();
        assert_eq!(manager.handle_slash_command(parse("/bye")), ConversationAction::Exit);
        assert_eq!(manager.handle_slash_command(parse("/close")), ConversationAction::ClosePanel);
    }

    fn parse(input: &str) -> ParsedCommand {
        crate::ui::conversation::parse_slash_command(input).unwrap()
    }
}
