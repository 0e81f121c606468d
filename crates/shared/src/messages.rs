//! Cross-context message contract.
//!
//! The privileged background context and the page context are independently
//! scheduled and share no memory; everything crossing the boundary is one of
//! the request/response shapes below. Requests carry an `action` discriminator
//! on the wire; each response is shaped per action.

use serde::{Deserialize, Serialize};

use crate::chat::ChatTurn;

/// Identity of a page's chat session context. At most one overlay panel may
/// exist per tab at any time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TabId(pub u32);

impl std::fmt::Display for TabId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "tab {}", self.0)
    }
}

/// Context threaded through follow-up messages so the model keeps sight of
/// the exchange that opened the panel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatContext {
    #[serde(rename = "originalText", default, skip_serializing_if = "Option::is_none")]
    pub original_text: Option<String>,
    #[serde(rename = "resultText", default, skip_serializing_if = "Option::is_none")]
    pub prior_response: Option<String>,
}

impl ChatContext {
    pub fn is_empty(&self) -> bool {
        fn blank(part: &Option<String>) -> bool {
            part.as_deref().map_or(true, |s| s.trim().is_empty())
        }
        blank(&self.original_text) && blank(&self.prior_response)
    }
}

/// What a menu trigger asks for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TriggerAction {
    /// Apply a stored preset by id.
    Preset { id: u32 },
    /// Apply a free-form instruction typed at trigger time.
    PromptOnTheFly { prompt: String },
}

/// Requests handled by the privileged background context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum BackgroundRequest {
    /// Options UI asks the background to re-read persisted settings.
    #[serde(rename = "reloadConfig")]
    ReloadConfig,

    /// Follow-up message typed into an open overlay panel.
    #[serde(rename = "chat")]
    Chat {
        message: String,
        #[serde(default)]
        context: ChatContext,
    },

    /// Passive selection report from the page. Fire-and-forget.
    #[serde(rename = "text_selected")]
    TextSelected { text: String, url: String },

    /// A menu entry was activated for a tab.
    #[serde(rename = "menu_trigger")]
    MenuTrigger { tab: TabId, trigger: TriggerAction },

    /// Drop all persisted chat turns.
    #[serde(rename = "clear_history")]
    ClearHistory,

    /// Read the current history buffer contents.
    #[serde(rename = "chat_history")]
    HistorySnapshot,
}

/// Commands the background dispatches into the page context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum PageCommand {
    /// Ask the page for its current text selection.
    #[serde(rename = "analyze_text")]
    AnalyzeText { tab: TabId },

    /// Open the overlay panel, or focus the existing one. Initial turns, when
    /// present, are appended to whatever panel ends up visible.
    #[serde(rename = "show_panel")]
    ShowPanel {
        tab: TabId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        initial_message: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        initial_response: Option<String>,
    },

    /// Render the user's turn and switch on the typing indicator.
    #[serde(rename = "begin_exchange")]
    BeginExchange { tab: TabId, text: String },

    /// Generation succeeded: drop the indicator, render the assistant turn.
    #[serde(rename = "complete_exchange")]
    CompleteExchange { tab: TabId, text: String },

    /// Generation failed: drop the indicator, render an inline error turn.
    #[serde(rename = "fail_exchange")]
    FailExchange { tab: TabId, error: String },

    /// Blocking notice shown to the user (validation failures).
    #[serde(rename = "alert")]
    Alert { tab: TabId, message: String },
}

/// Plain success/failure acknowledgement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    pub success: bool,
}

impl Ack {
    pub fn ok() -> Self {
        Self { success: true }
    }
}

/// Reply to a `chat` request: either the generated message or an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChatResponse {
    Reply { message: String },
    Failure { error: String },
}

/// Reply to an `analyze_text` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionReply {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SelectionReply {
    pub fn found(text: impl Into<String>) -> Self {
        Self {
            success: true,
            text: Some(text.into()),
            error: None,
        }
    }

    pub fn missing(error: impl Into<String>) -> Self {
        Self {
            success: false,
            text: None,
            error: Some(error.into()),
        }
    }
}

/// In-process response envelope, one arm per request family. The wire
/// shapes are the individual response types above.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionReply {
    Ack(Ack),
    Chat(ChatResponse),
    Selection(SelectionReply),
    History(Vec<ChatTurn>),
}
