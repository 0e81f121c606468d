//! One chat panel's transient state.

use shared::chat::ChatTurn;
use shared::messages::ChatContext;

/// Live state of an open panel: the rendered turn list, the typing
/// indicator, and the context captured from the exchange that opened it.
#[derive(Debug, Default)]
pub struct OverlaySession {
    turns: Vec<ChatTurn>,
    pending: bool,
    context: ChatContext,
}

impl OverlaySession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a panel with an already-completed exchange (initial turns passed
    /// at open). Also primes the follow-up context when it is still unset.
    pub fn seed(&mut self, message: Option<String>, response: Option<String>) {
        if let Some(message) = message {
            if self.context.original_text.is_none() {
                self.context.original_text = Some(message.clone());
            }
            self.turns.push(ChatTurn::user(message));
        }
        if let Some(response) = response {
            if self.context.prior_response.is_none() {
                self.context.prior_response = Some(response.clone());
            }
            self.turns.push(ChatTurn::assistant(response));
        }
    }

    // ── Privileged exchange path (menu trigger) ──────────────────────

    /// Render the user's selected text and switch the typing indicator on.
    /// The first exchange's text becomes the session's original-text context.
    pub fn begin_exchange(&mut self, text: &str) {
        if self.context.original_text.is_none() {
            self.context.original_text = Some(text.to_string());
        }
        self.pending = true;
        self.turns.push(ChatTurn::user(text));
    }

    /// Drop the indicator and render the assistant's reply. The first reply
    /// becomes the session's prior-response context.
    pub fn complete_exchange(&mut self, text: String) {
        if self.context.prior_response.is_none() {
            self.context.prior_response = Some(text.clone());
        }
        self.pending = false;
        self.turns.push(ChatTurn::assistant(text));
    }

    /// Drop the indicator and render an inline error turn. The session
    /// stays open; a failed turn never terminates it.
    pub fn fail_exchange(&mut self, error: &str) {
        self.pending = false;
        self.turns.push(ChatTurn::assistant(format!("Error: {error}")));
    }

    // ── Follow-up path (panel input box) ─────────────────────────────

    /// Start a follow-up send. Refuses while a send is already outstanding
    /// in this session; the caller serializes, the router does not queue.
    pub fn begin_request(&mut self, text: &str) -> bool {
        if self.pending {
            return false;
        }
        self.pending = true;
        self.turns.push(ChatTurn::user(text));
        true
    }

    /// Settle the outstanding follow-up with the gateway's outcome.
    pub fn finish_request(&mut self, outcome: Result<String, String>) {
        self.pending = false;
        match outcome {
            Ok(text) => self.turns.push(ChatTurn::assistant(text)),
            Err(error) => self.turns.push(ChatTurn::assistant(format!("Error: {error}"))),
        }
    }

    // ── Views ────────────────────────────────────────────────────────

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    /// Context passed along with follow-up messages.
    pub fn context(&self) -> &ChatContext {
        &self.context
    }

    /// Newest assistant turn, if any. `None` means copy is a no-op.
    pub fn last_assistant_reply(&self) -> Option<&str> {
        self.turns
            .iter()
            .rev()
            .find(|t| t.role == shared::chat::Role::Assistant)
            .map(|t| t.content.as_str())
    }

    pub fn snapshot(&self) -> PanelSnapshot {
        PanelSnapshot {
            turns: self.turns.clone(),
            pending: self.pending,
        }
    }
}

/// Point-in-time view of a panel, for the shell and for tests.
#[derive(Debug, Clone)]
pub struct PanelSnapshot {
    pub turns: Vec<ChatTurn>,
    pub pending: bool,
}
