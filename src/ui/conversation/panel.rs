use tokio::sync::mpsc;

use crate::config::Config;
use crate::display::DisplaySurface;
use crate::events::AppEvent;
use crate::models::{Order, Product};
use crate::speech::SpeechCoordinator;
use crate::ui::conversation::ConversationHistory;

/// Chat panel state: the visible conversation, the open/closed toggle and the unread badge.
pub struct ChatPanel {
    history: ConversationHistory,
    speech: SpeechCoordinator,
    open: bool,
    unread: usize,
}

impl ChatPanel {
    pub fn new(config: &Config, events: mpsc::UnboundedSender<AppEvent>) -> Self {
        Self {
            history: ConversationHistory::new(config.ui.max_history, config.ui.show_timestamps),
            speech: SpeechCoordinator::new(&config.speech, events),
            open: false,
            unread: 0,
        }
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    pub fn history_mut(&mut self) -> &mut ConversationHistory {
        &mut self.history
    }

    pub fn speech_mut(&mut self) -> &mut SpeechCoordinator {
        &mut self.speech
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Badge count shown on the closed launcher
    pub fn unread(&self) -> usize {
        self.unread
    }

    /// Open the panel and clear the badge
    pub fn open(&mut self) {
        self.open = true;
        self.unread = 0;
    }

    /// Close the panel, silencing any speech
    pub fn close(&mut self) {
        self.open = false;
        self.speech.stop_all();
    }
}

impl DisplaySurface for ChatPanel {
    fn append_user_message(&mut self, text: &str) {
        self.history.add_user_message(text.to_string());
    }

    fn append_bot_message(&mut self, text: &str) {
        self.history.add_assistant_message(text.to_string());
        self.speech.speak(text);
    }

    fn append_product_card(&mut self, product: &Product) {
        self.history.add_product(product.clone());
    }

    fn append_order_card(&mut self, order: &Order) {
        self.history.add_order(order.clone());
    }

    fn show_typing(&mut self) {
        self.history.set_typing(true);
    }

    fn hide_typing(&mut self) {
        self.history.set_typing(false);
    }

    fn show_notification(&mut self) {
        if !self.open {
            self.unread = 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn panel() -> ChatPanel {
        let (tx, _rx) = mpsc::unbounded_channel();
        ChatPanel::new(&Config::default(), tx)
    }

    #[test]
    fn badge_is_raised_only_while_closed() {
        let mut panel = panel();
        panel.show_notification();
        assert_eq!(panel.unread(), 1);

        panel.open();
        assert_eq!(panel.unread(), 0);

        panel.show_notification();
        assert_eq!(panel.unread(), 0);
    }

    #[test]
    fn typing_and_cards_reach_the_history() {
        let mut panel = panel();
        panel.show_typing();
        assert!(panel.history().is_typing());

        panel.append_order_card(&Order { order_id: Some("77".into()), ..Default::default() });
        panel.hide_typing();

        assert!(!panel.history().is_typing());
        assert_eq!(panel.history().order(1).unwrap().display_order_id(), "77");
    }
}
