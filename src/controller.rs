//! Conversation flow: user input -> outbound request -> reply interpretation -> display calls.

use std::sync::Arc;

use crate::display::DisplaySurface;
use crate::error::{DispatchError, StateError};
use crate::events::PendingInput;
use crate::models::{ChatReply, Order, OtpReply, ReplyData, ReplyStatus};
use crate::service::ChatService;
use crate::session::SessionId;

/// Shown when the reply has an unexpected status and carries no answer.
pub const FALLBACK_REPLY: &str = "Sorry, I didn't get that.";

pub const PHONE_PROMPT: &str =
    "Please share your registered mobile number so I can look up your account.";
const OTP_SEND_FAILED: &str = "I couldn't send a one-time password to that number.";
const OTP_VERIFIED: &str = "Thanks, you're verified. How can I help you today?";
const OTP_MISMATCH: &str = "That one-time password didn't match. Type /login to try again.";

/// Sequence number of one turn. Outcomes carrying an older ticket are stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TurnTicket(u64);

impl TurnTicket {
    pub fn value(&self) -> u64 {
        self.0
    }
}

/// Network work a turn needs done
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnAction {
    Chat { message: String },
    RequestOtp { phone: String },
    VerifyOtp { phone: String, code: String },
}

/// Owned description of a turn's network call, safe to move onto a spawned task
#[derive(Debug, Clone)]
pub struct TurnRequest {
    ticket: TurnTicket,
    session: SessionId,
    action: TurnAction,
}

#[derive(Debug)]
pub enum TurnResult {
    Chat(Result<ChatReply, DispatchError>),
    OtpRequested(Result<OtpReply, DispatchError>),
    OtpVerified(Result<OtpReply, DispatchError>),
}

/// Result of [`TurnRequest::execute`], handed back to [`ConversationController::finish_turn`]
#[derive(Debug)]
pub struct TurnOutcome {
    pub ticket: TurnTicket,
    pub result: TurnResult,
}

impl TurnRequest {
    pub fn ticket(&self) -> TurnTicket {
        self.ticket
    }

    pub fn action(&self) -> &TurnAction {
        &self.action
    }

    /// Perform the call. Never fails: errors travel inside the outcome.
    pub async fn execute<S: ChatService + ?Sized>(self, service: &S) -> TurnOutcome {
        let result = match &self.action {
            TurnAction::Chat { message } => {
                TurnResult::Chat(service.post_message(message, &self.session).await)
            }
            TurnAction::RequestOtp { phone } => {
                TurnResult::OtpRequested(service.request_otp(phone, &self.session).await)
            }
            TurnAction::VerifyOtp { phone, code } => {
                TurnResult::OtpVerified(service.verify_otp(phone, code, &self.session).await)
            }
        };

        TurnOutcome { ticket: self.ticket, result }
    }
}

/// Drives one conversation against a [`ChatService`], rendering onto a [`DisplaySurface`].
///
/// Each turn is split in three so the network call can run off the UI loop:
/// [`begin_turn`](Self::begin_turn) performs the synchronous side effects and returns a
/// [`TurnRequest`], [`TurnRequest::execute`] does the I/O, and
/// [`finish_turn`](Self::finish_turn) renders the outcome. Starting a new turn while one
/// is unfinished supersedes it; its late outcome is discarded.
pub struct ConversationController<S: ?Sized, D> {
    service: Arc<S>,
    display: D,
    session: SessionId,
    pending: PendingInput,
    phone: Option<String>,
    next_ticket: u64,
    in_flight: Option<(TurnTicket, TurnAction)>,
}

impl<S, D> ConversationController<S, D>
where
    S: ChatService + ?Sized,
    D: DisplaySurface,
{
    pub fn new(service: Arc<S>, display: D) -> Self {
        let session = SessionId::generate();
        tracing::info!(session = %session, "conversation started");

        Self {
            service,
            display,
            session,
            pending: PendingInput::Normal,
            phone: None,
            next_ticket: 0,
            in_flight: None,
        }
    }

    pub fn session(&self) -> &SessionId {
        &self.session
    }

    pub fn pending(&self) -> PendingInput {
        self.pending
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn display_mut(&mut self) -> &mut D {
        &mut self.display
    }

    pub fn service(&self) -> Arc<S> {
        Arc::clone(&self.service)
    }

    /// Whether a turn is waiting for its outcome
    pub fn is_busy(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Show the welcome message and raise the notification badge.
    pub fn greet(&mut self, welcome: &str) {
        self.display.append_bot_message(welcome);
        self.display.show_notification();
    }

    /// Start the login flow: the next input is read as a phone number.
    pub fn request_phone(&mut self) -> Result<(), StateError> {
        self.pending = self.pending.transition(PendingInput::AwaitingPhone)?;
        self.display.append_bot_message(PHONE_PROMPT);
        Ok(())
    }

    /// Prompt submitted when the user selects a rendered order card.
    pub fn order_prompt(order: &Order) -> String {
        format!(
            "This order {} and {}",
            order.display_item_name(),
            order.display_order_id()
        )
    }

    /// Synchronous half of a user turn.
    ///
    /// Returns `None` without touching the display when `text` is blank.
    pub fn begin_turn(&mut self, text: &str) -> Option<TurnRequest> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }

        self.display.append_user_message(text);
        let ticket = self.open_turn();

        let action = match self.pending {
            PendingInput::AwaitingPhone => {
                self.phone = Some(text.to_string());
                self.advance(PendingInput::AwaitingOtp);
                TurnAction::RequestOtp { phone: text.to_string() }
            }
            PendingInput::AwaitingOtp => {
                let phone = self.phone.take().unwrap_or_default();
                self.advance(PendingInput::Normal);
                TurnAction::VerifyOtp { phone, code: text.to_string() }
            }
            PendingInput::Normal => TurnAction::Chat { message: text.to_string() },
        };

        Some(self.track(ticket, action))
    }

    /// Synchronous half of a chat request that bypasses input interpretation and
    /// echoes no user message (used by quick actions).
    pub fn begin_chat_request(&mut self, text: &str) -> Option<TurnRequest> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }

        let ticket = self.open_turn();
        Some(self.track(ticket, TurnAction::Chat { message: text.to_string() }))
    }

    /// Render a finished turn. Returns `false` if the outcome was stale and discarded.
    pub fn finish_turn(&mut self, outcome: TurnOutcome) -> bool {
        if self.in_flight.as_ref().map(|(ticket, _)| *ticket) != Some(outcome.ticket) {
            tracing::debug!(ticket = outcome.ticket.0, "discarding stale turn outcome");
            return false;
        }

        self.in_flight = None;
        self.display.hide_typing();

        match outcome.result {
            TurnResult::Chat(result) => self.render_chat(result),
            TurnResult::OtpRequested(result) => self.render_otp_requested(result),
            TurnResult::OtpVerified(result) => self.render_otp_verified(result),
        }
        true
    }

    /// Abandon the unfinished turn, if any. Its outcome will be discarded.
    pub fn cancel(&mut self) -> bool {
        match self.abandon_in_flight() {
            Some(ticket) => {
                tracing::info!(ticket = ticket.0, "turn cancelled");
                true
            }
            None => false,
        }
    }

    /// Run a whole user turn inline.
    pub async fn send_user_text(&mut self, text: &str) -> bool {
        match self.begin_turn(text) {
            Some(request) => self.complete(request).await,
            None => false,
        }
    }

    /// Run a whole chat request inline, without echoing a user message.
    pub async fn dispatch_chat_request(&mut self, text: &str) -> bool {
        match self.begin_chat_request(text) {
            Some(request) => self.complete(request).await,
            None => false,
        }
    }

    /// Submit the prompt for a selected order card as a new user turn.
    pub async fn select_order(&mut self, order: &Order) -> bool {
        let prompt = Self::order_prompt(order);
        self.send_user_text(&prompt).await
    }

    /// Execute a request against this controller's service and render the outcome.
    pub async fn complete(&mut self, request: TurnRequest) -> bool {
        let service = Arc::clone(&self.service);
        let outcome = request.execute(service.as_ref()).await;
        self.finish_turn(outcome)
    }

    fn open_turn(&mut self) -> TurnTicket {
        if let Some(stale) = self.abandon_in_flight() {
            tracing::info!(ticket = stale.0, "superseding unfinished turn");
        }

        self.next_ticket += 1;
        self.display.show_typing();
        TurnTicket(self.next_ticket)
    }

    fn track(&mut self, ticket: TurnTicket, action: TurnAction) -> TurnRequest {
        let request = TurnRequest { ticket, session: self.session.clone(), action };
        self.in_flight = Some((ticket, request.action().clone()));
        request
    }

    /// Drop the unfinished turn. An abandoned OTP request can no longer end the
    /// login, so the flow falls back to `Normal` here.
    fn abandon_in_flight(&mut self) -> Option<TurnTicket> {
        let (ticket, action) = self.in_flight.take()?;
        self.display.hide_typing();
        if matches!(action, TurnAction::RequestOtp { .. }) {
            self.abort_login();
        }
        Some(ticket)
    }

    fn advance(&mut self, next: PendingInput) {
        match self.pending.transition(next) {
            Ok(state) => {
                tracing::debug!(from = ?self.pending, to = ?state, "pending input changed");
                self.pending = state;
            }
            Err(e) => tracing::warn!(error = %e, "ignoring invalid pending-input transition"),
        }
    }

    fn render_chat(&mut self, result: Result<ChatReply, DispatchError>) {
        match result {
            Ok(ChatReply { status: ReplyStatus::Success, data: Some(data) }) => {
                self.render_reply_data(data)
            }
            Ok(reply) => {
                tracing::debug!(status = ?reply.status, "reply had an unexpected shape");
                let text = reply.answer().unwrap_or(FALLBACK_REPLY).to_string();
                self.display.append_bot_message(&text);
            }
            Err(e @ DispatchError::Service { .. }) => {
                self.display.append_bot_message(&e.to_string());
            }
            Err(e) => {
                tracing::warn!(error = %e, "chat request failed");
                self.display.append_bot_message(&something_went_wrong(&e));
            }
        }
    }

    fn render_reply_data(&mut self, data: ReplyData) {
        if let Some(answer) = &data.answer {
            self.display.append_bot_message(answer);
        }
        for order in &data.orders {
            self.display.append_order_card(order);
        }
        for product in &data.products {
            self.display.append_product_card(product);
        }
        if !data.comparison.is_empty() {
            tracing::debug!(items = data.comparison.len(), "comparison items are not rendered");
        }
        if let Some(end) = &data.end {
            self.display.append_bot_message(end);
        }
    }

    fn render_otp_requested(&mut self, result: Result<OtpReply, DispatchError>) {
        match result {
            Ok(reply) if reply.accepted => {
                let phone = self.phone.as_deref().unwrap_or("your number");
                let text = reply.message.unwrap_or_else(|| {
                    format!(
                        "I've sent a one-time password to {phone}. Please enter it to continue."
                    )
                });
                self.display.append_bot_message(&text);
            }
            Ok(reply) => {
                self.abort_login();
                let text = reply.message.unwrap_or_else(|| OTP_SEND_FAILED.to_string());
                self.display.append_bot_message(&text);
            }
            Err(e) => {
                tracing::warn!(error = %e, "OTP request failed");
                self.abort_login();
                self.display.append_bot_message(&something_went_wrong(&e));
            }
        }
    }

    fn render_otp_verified(&mut self, result: Result<OtpReply, DispatchError>) {
        match result {
            Ok(reply) if reply.accepted => {
                tracing::info!(session = %self.session, "phone verified");
                let text = reply.message.unwrap_or_else(|| OTP_VERIFIED.to_string());
                self.display.append_bot_message(&text);
            }
            Ok(reply) => {
                let text = reply.message.unwrap_or_else(|| OTP_MISMATCH.to_string());
                self.display.append_bot_message(&text);
            }
            Err(e) => {
                tracing::warn!(error = %e, "OTP verification failed");
                self.display.append_bot_message(&something_went_wrong(&e));
            }
        }
    }

    fn abort_login(&mut self) {
        if self.pending == PendingInput::AwaitingOtp {
            self.advance(PendingInput::Normal);
            self.phone = None;
        }
    }
}

fn something_went_wrong(err: &DispatchError) -> String {
    format!("Oops, something went wrong: {}", err)
}
