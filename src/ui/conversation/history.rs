//! Conversation history display component

use crate::events::ConversationRole;
use crate::models::{Order, Product};
use chrono::{DateTime, Local};
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Widget},
};
use std::collections::VecDeque;

/// Product names longer than this many words are shortened on cards
const CARD_NAME_WORDS: usize = 6;

/// What a history entry shows
#[derive(Debug, Clone)]
pub enum EntryBody {
    Message { role: ConversationRole, content: String },
    Product(Product),
    Order { order: Order, number: usize },
}

/// A single entry in the conversation history
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub body: EntryBody,
    pub timestamp: DateTime<Local>,
}

/// Conversation history display component
#[derive(Debug, Clone)]
pub struct ConversationHistory {
    entries: VecDeque<HistoryEntry>,
    orders: VecDeque<Order>,
    /// Number of `orders.front()`
    first_order_number: usize,
    max_entries: usize,
    typing: bool,
    show_timestamps: bool,
    scroll_offset: usize,
}

impl ConversationHistory {
    pub fn new(max_entries: usize, show_timestamps: bool) -> Self {
        Self {
            entries: VecDeque::new(),
            orders: VecDeque::new(),
            first_order_number: 1,
            max_entries: max_entries.max(1),
            typing: false,
            show_timestamps,
            scroll_offset: 0,
        }
    }

    fn push(&mut self, body: EntryBody) {
        self.entries.push_back(HistoryEntry { body, timestamp: Local::now() });

        if self.entries.len() > self.max_entries {
            if let Some(HistoryEntry { body: EntryBody::Order { number, .. }, .. }) =
                self.entries.pop_front()
            {
                self.forget_orders_through(number);
            }
        }

        self.scroll_to_bottom();
    }

    pub fn add_message(&mut self, role: ConversationRole, content: String) {
        self.push(EntryBody::Message { role, content });
    }

    pub fn add_user_message(&mut self, content: String) {
        self.add_message(ConversationRole::User, content);
    }

    pub fn add_assistant_message(&mut self, content: String) {
        self.add_message(ConversationRole::Assistant, content);
    }

    pub fn add_system_message(&mut self, content: String) {
        self.add_message(ConversationRole::System, content);
    }

    pub fn add_product(&mut self, product: Product) {
        self.push(EntryBody::Product(product));
    }

    /// Add an order card and return the number it can be selected by
    pub fn add_order(&mut self, order: Order) -> usize {
        let number = self.first_order_number + self.orders.len();
        self.orders.push_back(order.clone());
        self.push(EntryBody::Order { order, number });
        number
    }

    /// Order card by its 1-based number, while the card is still in the history
    pub fn order(&self, number: usize) -> Option<&Order> {
        number
            .checked_sub(self.first_order_number)
            .and_then(|index| self.orders.get(index))
    }

    /// Orders that can still be selected
    pub fn order_count(&self) -> usize {
        self.orders.len()
    }

    fn forget_orders_through(&mut self, number: usize) {
        while self.first_order_number <= number && self.orders.pop_front().is_some() {
            self.first_order_number += 1;
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn set_typing(&mut self, typing: bool) {
        self.typing = typing;
        if typing {
            self.scroll_to_bottom();
        }
    }

    pub fn is_typing(&self) -> bool {
        self.typing
    }

    pub fn scroll_up(&mut self, lines: usize) {
        self.scroll_offset = self.scroll_offset.saturating_add(lines);
    }

    pub fn scroll_down(&mut self, lines: usize) {
        self.scroll_offset = self.scroll_offset.saturating_sub(lines);
    }

    pub fn scroll_to_bottom(&mut self) {
        self.scroll_offset = 0;
    }
}

/// Text lines of a product card
pub fn product_card_lines(product: &Product) -> Vec<String> {
    let mut lines = vec![format!("🛒 {}", product.short_name(CARD_NAME_WORDS))];
    if !product.price.is_empty() {
        lines.push(format!("   {}", product.price));
    }
    for feature in &product.features {
        lines.push(format!("   • {}", feature));
    }
    if let Some(image) = &product.image {
        lines.push(format!("   Image: {}", image));
    }
    if !product.link.is_empty() {
        lines.push(format!("   View: {}", product.link));
    }
    lines
}

/// Text lines of an order card; `number` adds the selection hint
pub fn order_card_lines(order: &Order, number: Option<usize>) -> Vec<String> {
    let mut title = format!("📦 {}", order.display_item_name());
    if let Some(number) = number {
        title.push_str(&format!("  [/order {}]", number));
    }

    let mut lines = vec![title, format!("   Order ID: {}", order.display_order_id())];
    if let Some(date) = &order.date {
        lines.push(format!("   Date: {}", date));
    }
    if let Some(invoice_no) = &order.invoice_no {
        lines.push(format!("   Invoice No: {}", invoice_no));
    }
    lines.push(format!("   Status: {}", order.display_status()));
    if let Some(url) = &order.invoice_url {
        lines.push(format!("   View Invoice: {}", url));
    }
    if let Some(image) = &order.image {
        lines.push(format!("   Image: {}", image));
    }
    lines
}

/// Wrap text to fit within the given width, keeping explicit line breaks
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    if width == 0 {
        return vec![text.to_string()];
    }

    let mut lines = Vec::new();
    for paragraph in text.lines() {
        let mut current_line = String::new();
        let mut current_width = 0;

        for word in paragraph.split_whitespace() {
            let word_width = word.chars().count();
            if current_width > 0 && current_width + word_width + 1 > width {
                lines.push(std::mem::take(&mut current_line));
                current_width = 0;
            }
            if current_width > 0 {
                current_line.push(' ');
                current_width += 1;
            }
            current_line.push_str(word);
            current_width += word_width;
        }

        lines.push(current_line);
    }

    if lines.is_empty() {
        lines.push(String::new());
    }

    lines
}

impl Widget for &ConversationHistory {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let block = Block::default()
            .borders(Borders::ALL)
            .title("💬 Conversation");

        let inner_area = block.inner(area);
        block.render(area, buf);

        let mut all_lines: Vec<Line> = Vec::new();
        for entry in self.entries.iter() {
            all_lines.append(&mut self.render_entry(entry, inner_area.width));
            all_lines.push(Line::from(""));
        }

        if self.is_empty() && !self.typing {
            all_lines.push(Line::from(Span::styled(
                "No messages yet. Type below or /help for commands.",
                Style::default().fg(Color::DarkGray),
            )));
        }

        if self.typing {
            all_lines.push(self.render_typing_indicator());
        }

        // Show the window ending `scroll_offset` lines above the bottom
        let height = inner_area.height as usize;
        let total = all_lines.len();
        let end = total.saturating_sub(self.scroll_offset.min(total.saturating_sub(height)));
        let start = end.saturating_sub(height);

        for (i, line) in all_lines[start..end].iter().enumerate() {
            buf.set_line(inner_area.x, inner_area.y + i as u16, line, inner_area.width);
        }
    }
}

impl ConversationHistory {
    fn render_entry(&self, entry: &HistoryEntry, width: u16) -> Vec<Line<'static>> {
        match &entry.body {
            EntryBody::Message { role, content } => {
                self.render_message(*role, content, entry.timestamp, width)
            }
            EntryBody::Product(product) => {
                Self::render_card(product_card_lines(product), Color::Magenta)
            }
            EntryBody::Order { order, number } => {
                Self::render_card(order_card_lines(order, Some(*number)), Color::Cyan)
            }
        }
    }

    fn render_message(
        &self,
        role: ConversationRole,
        content: &str,
        timestamp: DateTime<Local>,
        width: u16,
    ) -> Vec<Line<'static>> {
        let mut lines = Vec::new();

        let (icon, label) = match role {
            ConversationRole::User => ("👤", "You"),
            ConversationRole::Assistant => ("🤖", "Assistant"),
            ConversationRole::System => ("⚙️", "Notice"),
        };

        let header = if self.show_timestamps {
            format!("{} {} {}", icon, label, timestamp.format("%H:%M"))
        } else {
            format!("{} {}", icon, label)
        };
        lines.push(Line::from(Span::styled(
            header,
            Style::default().fg(Color::DarkGray),
        )));

        let style = content_style(role);
        for content_line in wrap_text(content, width.saturating_sub(2) as usize) {
            lines.push(Line::from(vec![
                Span::raw("  "),
                Span::styled(content_line, style),
            ]));
        }

        lines
    }

    fn render_card(card: Vec<String>, accent: Color) -> Vec<Line<'static>> {
        card.into_iter()
            .enumerate()
            .map(|(i, text)| {
                let style = if i == 0 {
                    Style::default().fg(accent).add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(Color::Gray)
                };
                Line::from(vec![
                    Span::styled("│ ", Style::default().fg(accent)),
                    Span::styled(text, style),
                ])
            })
            .collect()
    }

    fn render_typing_indicator(&self) -> Line<'static> {
        let dots = match (std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis()
            / 300)
            % 4
        {
            0 => ".",
            1 => "..",
            2 => "...",
            _ => "   ",
        };

        Line::from(vec![
            Span::styled("🤖 ", Style::default().fg(Color::Green)),
            Span::styled("Assistant is typing", Style::default().fg(Color::Green)),
            Span::styled(dots, Style::default().fg(Color::Yellow)),
        ])
    }
}

fn content_style(role: ConversationRole) -> Style {
    match role {
        ConversationRole::User => Style::default().fg(Color::Blue),
        ConversationRole::Assistant => Style::default().fg(Color::Green),
        ConversationRole::System => Style::default().fg(Color::Yellow),
    }
}
