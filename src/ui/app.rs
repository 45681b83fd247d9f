use std::io::{self, Stdout};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::{
    event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use futures::StreamExt;
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame, Terminal,
};
use tokio::sync::mpsc;

use crate::config::Config;
use crate::controller::ConversationController;
use crate::events::AppEvent;
use crate::service::HttpChatService;
use crate::ui::conversation::{ChatPanel, ConversationAction, ConversationManager};

type Tui = Terminal<CrosstermBackend<Stdout>>;

const TICK: Duration = Duration::from_millis(250);

/// Run the interactive chat widget until the user quits.
pub async fn run(config: Config, start_open: bool) -> Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel();

    let service = Arc::new(HttpChatService::new(&config)?);
    tracing::info!(base_url = service.base_url(), "chat widget starting");

    let panel = ChatPanel::new(&config, tx.clone());
    let controller = ConversationController::new(service, panel);
    let mut manager = ConversationManager::new(controller, tx);

    manager.greet(&config.welcome_message);
    if start_open || config.ui.start_open {
        manager.open_panel();
    }

    let mut terminal = setup_terminal()?;
    let result = event_loop(&mut terminal, &mut manager, &mut rx).await;

    manager.shutdown();
    restore_terminal(&mut terminal)?;
    tracing::info!("chat widget stopped");
    result
}

fn setup_terminal() -> Result<Tui> {
    enable_raw_mode().context("Failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).context("Failed to enter alternate screen")?;
    Terminal::new(CrosstermBackend::new(stdout)).context("Failed to create terminal")
}

fn restore_terminal(terminal: &mut Tui) -> Result<()> {
    disable_raw_mode().context("Failed to disable raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("Failed to leave alternate screen")?;
    terminal.show_cursor()?;
    Ok(())
}

async fn event_loop(
    terminal: &mut Tui,
    manager: &mut ConversationManager<HttpChatService>,
    rx: &mut mpsc::UnboundedReceiver<AppEvent>,
) -> Result<()> {
    let mut input = EventStream::new();
    let mut ticker = tokio::time::interval(TICK);

    loop {
        terminal.draw(|frame| draw(frame, manager))?;

        tokio::select! {
            maybe_event = input.next() => match maybe_event {
                Some(Ok(Event::Key(key))) => {
                    if handle_key(manager, key) == ConversationAction::Exit {
                        return Ok(());
                    }
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e).context("Failed to read terminal input"),
                None => return Ok(()),
            },
            Some(event) = rx.recv() => manager.handle_event(event),
            _ = ticker.tick() => manager.tick(),
        }
    }
}

/// Route a key press to the launcher or the open panel
fn handle_key(
    manager: &mut ConversationManager<HttpChatService>,
    key: KeyEvent,
) -> ConversationAction {
    if key.kind != KeyEventKind::Press {
        return ConversationAction::None;
    }

    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    if ctrl && key.code == KeyCode::Char('c') {
        return ConversationAction::Exit;
    }

    if !manager.panel().is_open() {
        match key.code {
            KeyCode::Char('o') if ctrl => manager.open_panel(),
            KeyCode::Enter => manager.open_panel(),
            KeyCode::Char('q') | KeyCode::Esc => return ConversationAction::Exit,
            _ => {}
        }
        return ConversationAction::None;
    }

    match key.code {
        KeyCode::Char('o') if ctrl => manager.close_panel(),
        KeyCode::Esc if !manager.composer().is_palette_open() => manager.close_panel(),
        KeyCode::PageUp => manager.scroll_history(true, 5),
        KeyCode::PageDown => manager.scroll_history(false, 5),
        _ => match manager.handle_key(key) {
            ConversationAction::ClosePanel => manager.close_panel(),
            ConversationAction::Exit => return ConversationAction::Exit,
            ConversationAction::None => {}
        },
    }

    ConversationAction::None
}

fn draw(frame: &mut Frame, manager: &mut ConversationManager<HttpChatService>) {
    let area = frame.size();
    if manager.panel().is_open() {
        manager.render(area, frame.buffer_mut());
    } else {
        draw_launcher(frame, manager.panel().unread(), area);
    }
}

fn draw_launcher(frame: &mut Frame, unread: usize, area: Rect) {
    let mut title = vec![Span::styled(
        " 💬 Chat with us ",
        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
    )];
    if unread > 0 {
        title.push(Span::styled(
            format!(" {} ", unread),
            Style::default().fg(Color::White).bg(Color::Red).add_modifier(Modifier::BOLD),
        ));
    }

    let text = vec![
        Line::from(title),
        Line::from(""),
        Line::from(Span::styled(
            "Enter or Ctrl+O to open · q to quit",
            Style::default().fg(Color::DarkGray),
        )),
    ];

    let launcher = Paragraph::new(text)
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(launcher, centered_rect(40, 5, area));
}

/// Fixed-size rectangle centred in `area`
fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(0),
            Constraint::Length(height),
            Constraint::Min(0),
        ])
        .split(area);

    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Min(0),
            Constraint::Length(width),
            Constraint::Min(0),
        ])
        .split(vertical[1]);

    horizontal[1]
}
