use crate::events::PendingInput;
use crate::ui::conversation::commands::{
    command_entries, parse_slash_command, CommandEntry, ParsedCommand,
};
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Widget},
};
use std::cell::{Cell, RefCell};

/// Result returned when the user interacts with the conversation composer
#[derive(Debug, PartialEq)]
pub enum ConversationResult {
    Submitted(String),
    Command(ParsedCommand),
    None,
}

/// State for the text area within the composer.
///
/// `cursor_position` counts characters, not bytes.
#[derive(Debug, Clone, Default)]
pub struct TextAreaState {
    pub content: String,
    pub cursor_position: usize,
}

impl TextAreaState {
    fn char_count(&self) -> usize {
        self.content.chars().count()
    }

    fn byte_index(&self, char_index: usize) -> usize {
        self.content
            .char_indices()
            .nth(char_index)
            .map(|(i, _)| i)
            .unwrap_or(self.content.len())
    }
}

/// Conversation composer for user input
#[derive(Clone)]
pub struct ConversationComposer {
    state: RefCell<TextAreaState>,
    has_focus: bool,
    pending: PendingInput,
    command_entries: Vec<CommandEntry>,
    filtered_commands: RefCell<Vec<CommandEntry>>,
    show_command_palette: Cell<bool>,
    selected_command: Cell<Option<usize>>,
}

impl ConversationComposer {
    pub fn new() -> Self {
        Self {
            state: RefCell::new(TextAreaState::default()),
            has_focus: false,
            pending: PendingInput::Normal,
            command_entries: command_entries(),
            filtered_commands: RefCell::new(Vec::new()),
            show_command_palette: Cell::new(false),
            selected_command: Cell::new(None),
        }
    }

    /// Handle key input
    pub fn handle_key(&self, key: KeyEvent) -> ConversationResult {
        if key.kind != KeyEventKind::Press {
            return ConversationResult::None;
        }

        let mut state = self.state.borrow_mut();

        match key.code {
            KeyCode::Enter => {
                if key.modifiers.contains(KeyModifiers::SHIFT) {
                    self.insert_char(&mut state, '\n');
                } else if self.show_command_palette.get()
                    && self.apply_selected_command(&mut state)
                {
                    return ConversationResult::None;
                } else if !state.content.trim().is_empty() {
                    let content = std::mem::take(&mut state.content);
                    state.cursor_position = 0;
                    self.close_command_palette();
                    drop(state);
                    return match parse_slash_command(&content) {
                        Some(command) => ConversationResult::Command(command),
                        None => ConversationResult::Submitted(content),
                    };
                }
            }
            KeyCode::Up | KeyCode::BackTab if self.show_command_palette.get() => {
                self.move_command_selection(-1);
            }
            KeyCode::Down if self.show_command_palette.get() => {
                self.move_command_selection(1);
            }
            KeyCode::Esc if self.show_command_palette.get() => {
                self.close_command_palette();
            }
            KeyCode::Tab if self.show_command_palette.get() => {
                self.apply_selected_command(&mut state);
            }
            KeyCode::Char(c) => {
                self.insert_char(&mut state, c);

                if self.show_command_palette.get() {
                    if state.content.starts_with('/') && !c.is_whitespace() {
                        self.refresh_command_palette(&state);
                    } else {
                        self.close_command_palette();
                    }
                } else if state.content == "/" {
                    self.open_command_palette(&state);
                }
            }
            KeyCode::Backspace => {
                if self.backspace(&mut state) {
                    self.after_removal(&state);
                }
            }
            KeyCode::Delete => {
                if self.delete(&mut state) {
                    self.after_removal(&state);
                }
            }
            KeyCode::Left => {
                state.cursor_position = state.cursor_position.saturating_sub(1);
            }
            KeyCode::Right => {
                if state.cursor_position < state.char_count() {
                    state.cursor_position += 1;
                }
            }
            KeyCode::Home => {
                state.cursor_position = 0;
            }
            KeyCode::End => {
                state.cursor_position = state.char_count();
            }
            _ => {}
        }

        ConversationResult::None
    }

    /// Insert a character at the cursor position
    fn insert_char(&self, state: &mut TextAreaState, c: char) {
        let at = state.byte_index(state.cursor_position);
        state.content.insert(at, c);
        state.cursor_position += 1;
    }

    /// Delete character before cursor
    fn backspace(&self, state: &mut TextAreaState) -> bool {
        if state.cursor_position > 0 {
            state.cursor_position -= 1;
            let at = state.byte_index(state.cursor_position);
            state.content.remove(at);
            true
        } else {
            false
        }
    }

    /// Delete character at cursor
    fn delete(&self, state: &mut TextAreaState) -> bool {
        if state.cursor_position < state.char_count() {
            let at = state.byte_index(state.cursor_position);
            state.content.remove(at);
            true
        } else {
            false
        }
    }

    fn after_removal(&self, state: &TextAreaState) {
        if !self.show_command_palette.get() {
            return;
        }
        if state.content.starts_with('/') {
            self.refresh_command_palette(state);
        } else {
            self.close_command_palette();
        }
    }

    fn open_command_palette(&self, state: &TextAreaState) {
        self.show_command_palette.set(true);
        self.refresh_command_palette(state);
        self.selected_command.set(Some(0));
    }

    fn close_command_palette(&self) {
        self.show_command_palette.set(false);
        self.filtered_commands.borrow_mut().clear();
        self.selected_command.set(None);
    }

    fn refresh_command_palette(&self, state: &TextAreaState) {
        let query = state.content.trim_start_matches('/').to_lowercase();
        let mut filtered = self.filtered_commands.borrow_mut();
        filtered.clear();

        for entry in &self.command_entries {
            if query.is_empty() || entry.keyword.starts_with(&query) {
                filtered.push(*entry);
            }
        }

        if filtered.is_empty() {
            self.selected_command.set(None);
        } else {
            let index = self.selected_command.get().unwrap_or(0);
            self.selected_command.set(Some(index.min(filtered.len() - 1)));
        }
    }

    fn move_command_selection(&self, delta: isize) {
        let filtered = self.filtered_commands.borrow();
        if filtered.is_empty() {
            self.selected_command.set(None);
            return;
        }

        let len = filtered.len() as isize;
        let current = self.selected_command.get().unwrap_or(0) as isize;
        let next = (current + delta).rem_euclid(len);

        self.selected_command.set(Some(next as usize));
    }

    fn apply_selected_command(&self, state: &mut TextAreaState) -> bool {
        let filtered = self.filtered_commands.borrow();
        let Some(entry) = self.selected_command.get().and_then(|i| filtered.get(i).copied()) else {
            return false;
        };
        drop(filtered);

        state.content = format!("/{} ", entry.keyword);
        state.cursor_position = state.char_count();
        self.close_command_palette();
        true
    }

    /// Whether the slash-command palette is showing
    pub fn is_palette_open(&self) -> bool {
        self.show_command_palette.get()
    }

    /// Set focus state
    pub fn set_focus(&mut self, has_focus: bool) {
        self.has_focus = has_focus;
    }

    /// Track what the next submission will be used for
    pub fn set_pending(&mut self, pending: PendingInput) {
        self.pending = pending;
    }

    /// Get current content
    pub fn get_content(&self) -> String {
        self.state.borrow().content.clone()
    }

    /// Clear content
    pub fn clear(&self) {
        let mut state = self.state.borrow_mut();
        state.content.clear();
        state.cursor_position = 0;
        drop(state);
        self.close_command_palette();
    }

    fn title(&self) -> String {
        let icon = match self.pending {
            PendingInput::Normal => "💬",
            PendingInput::AwaitingPhone => "📱",
            PendingInput::AwaitingOtp => "🔑",
        };
        format!("{} {}", icon, self.pending.display_name())
    }

    fn placeholder(&self) -> &'static str {
        match self.pending {
            PendingInput::Normal => "Type your message... (/ for commands)",
            PendingInput::AwaitingPhone => "Enter your registered phone number",
            PendingInput::AwaitingOtp => "Enter the code we sent you",
        }
    }
}

impl Default for ConversationComposer {
    fn default() -> Self {
        Self::new()
    }
}

impl Widget for &ConversationComposer {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let state = self.state.borrow();

        let block = Block::default()
            .borders(Borders::ALL)
            .title(self.title())
            .style(if self.has_focus {
                Style::default().fg(Color::Green)
            } else {
                Style::default().fg(Color::Gray)
            });

        let inner_area = block.inner(area);
        block.render(area, buf);

        if state.content.is_empty() {
            let placeholder_line = Line::from(Span::styled(
                self.placeholder(),
                Style::default().fg(Color::DarkGray),
            ));
            buf.set_line(inner_area.x, inner_area.y, &placeholder_line, inner_area.width);
        } else {
            let mut content = state.content.clone();
            if self.has_focus {
                content.insert(state.byte_index(state.cursor_position), '▌');
            }

            // Keep the cursor's line in view
            let lines: Vec<&str> = content.split('\n').collect();
            let skip = lines.len().saturating_sub(inner_area.height as usize);
            for (i, line_text) in lines.iter().skip(skip).enumerate() {
                let line = Line::from(Span::raw(*line_text));
                buf.set_line(inner_area.x, inner_area.y + i as u16, &line, inner_area.width);
            }
        }

        if self.show_command_palette.get() {
            let filtered = self.filtered_commands.borrow();
            let palette_height = (filtered.len().min(5) + 2) as u16;
            let palette_area = Rect {
                x: inner_area.x,
                y: area.y.saturating_sub(palette_height),
                width: inner_area.width,
                height: palette_height.min(area.y),
            };

            let block = Block::default()
                .borders(Borders::ALL)
                .title("Commands")
                .style(Style::default().fg(Color::Blue));
            let inner = block.inner(palette_area);
            block.render(palette_area, buf);

            let selected = self.selected_command.get();
            for (index, entry) in filtered.iter().enumerate().take(inner.height as usize) {
                let style = if selected == Some(index) {
                    Style::default().fg(Color::Black).bg(Color::Cyan).add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(Color::White)
                };

                let line = Line::from(vec![
                    Span::styled(format!("/{}", entry.keyword), style),
                    Span::styled("  ", Style::default()),
                    Span::styled(entry.description, Style::default().fg(Color::Gray)),
                ]);

                buf.set_line(inner.x, inner.y + index as u16, &line, inner.width);
            }
        }
    }
}
