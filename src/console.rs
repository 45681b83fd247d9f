use std::io::{self, Write};

use crate::display::DisplaySurface;
use crate::models::{Order, Product};
use crate::ui::conversation::history::{order_card_lines, product_card_lines};

/// Line-oriented surface for one-shot use: entries go to `out`, the typing
/// indicator to stderr.
pub struct ConsoleSurface<W: Write> {
    out: W,
}

impl ConsoleSurface<io::Stdout> {
    pub fn stdout() -> Self {
        Self { out: io::stdout() }
    }
}

impl<W: Write> ConsoleSurface<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn get_ref(&self) -> &W {
        &self.out
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_lines(&mut self, lines: &[String]) {
        for line in lines {
            if let Err(e) = writeln!(self.out, "{}", line) {
                tracing::warn!(error = %e, "failed to write to console");
                return;
            }
        }
    }
}

impl<W: Write> DisplaySurface for ConsoleSurface<W> {
    fn append_user_message(&mut self, text: &str) {
        self.write_lines(&[format!("👤 {}", text)]);
    }

    fn append_bot_message(&mut self, text: &str) {
        self.write_lines(&[format!("🤖 {}", text)]);
    }

    fn append_product_card(&mut self, product: &Product) {
        self.write_lines(&product_card_lines(product));
    }

    fn append_order_card(&mut self, order: &Order) {
        self.write_lines(&order_card_lines(order, None));
    }

    fn show_typing(&mut self) {
        eprint!("… waiting for reply\r");
    }

    fn hide_typing(&mut self) {
        eprint!("                     \r");
    }

    fn show_notification(&mut self) {}
}
