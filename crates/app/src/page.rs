//! Page context: owns the overlay panels and the current text selection.
//!
//! Runs independently of the privileged context and never blocks its inbox
//! on a network round-trip: follow-up sends are spawned, and their results
//! come back through the same inbox. A reply that arrives after its panel
//! was closed is discarded.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};

use overlay::{OverlayRegistry, PanelSnapshot};
use shared::messages::{
    ActionReply, BackgroundRequest, ChatResponse, PageCommand, SelectionReply, TabId,
};

use crate::router::{respond, BackgroundHandle, Inbound, PageHandle};

/// How long the copy confirmation stays visible before the panel closes.
const COPY_CLOSE_DELAY: Duration = Duration::from_millis(500);

/// User interactions with the page and its panel.
#[derive(Debug)]
pub enum UiEvent {
    /// The user selected text on the page.
    Select { tab: TabId, text: String, url: String },
    /// Open (or focus) the panel without a trigger exchange.
    OpenPanel { tab: TabId },
    /// A follow-up message typed into the panel's input box.
    FollowUp { tab: TabId, text: String },
    /// Copy the last assistant reply; auto-closes shortly after success.
    Copy { tab: TabId },
    /// Close-button activation.
    Close { tab: TabId },
    /// The page navigated away; all panel state is gone.
    Navigate { tab: TabId },
}

/// Everything the page context's inbox can carry.
pub enum PageMsg {
    /// Command dispatched by the privileged context.
    Command(Inbound<PageCommand>),
    Ui(UiEvent),
    /// A spawned follow-up settled. The epoch pins the reply to the panel
    /// instance that sent it; a replacement panel must not receive it.
    Resolved {
        tab: TabId,
        epoch: u64,
        outcome: ChatResponse,
    },
    /// The post-copy close timer fired.
    AutoClose { tab: TabId, epoch: u64 },
    /// Panel view for the shell.
    Snapshot {
        tab: TabId,
        reply: oneshot::Sender<Option<PanelSnapshot>>,
    },
}

struct Page {
    registry: OverlayRegistry,
    selections: HashMap<TabId, String>,
    background: BackgroundHandle,
    handle: PageHandle,
}

pub async fn run(
    mut inbox: mpsc::Receiver<PageMsg>,
    background: BackgroundHandle,
    handle: PageHandle,
) {
    let mut page = Page {
        registry: OverlayRegistry::new(),
        selections: HashMap::new(),
        background,
        handle,
    };
    while let Some(msg) = inbox.recv().await {
        page.handle(msg).await;
    }
    tracing::debug!("page context stopped");
}

impl Page {
    async fn handle(&mut self, msg: PageMsg) {
        match msg {
            PageMsg::Command(Inbound { msg, reply }) => match msg {
                PageCommand::AnalyzeText { tab } => {
                    let selection = self
                        .selections
                        .get(&tab)
                        .filter(|s| !s.trim().is_empty());
                    let body = match selection {
                        Some(text) => SelectionReply::found(text.clone()),
                        None => SelectionReply::missing("No text selected"),
                    };
                    respond(reply, ActionReply::Selection(body));
                }
                PageCommand::ShowPanel {
                    tab,
                    initial_message,
                    initial_response,
                } => {
                    self.registry.open(tab, initial_message, initial_response);
                    respond(reply, ActionReply::Ack(shared::messages::Ack::ok()));
                }
                PageCommand::BeginExchange { tab, text } => {
                    if let Some(session) = self.registry.session_mut(tab) {
                        session.begin_exchange(&text);
                        render(tab, &format!("you: {text}"));
                        render(tab, "assistant is typing...");
                    }
                }
                PageCommand::CompleteExchange { tab, text } => {
                    match self.registry.session_mut(tab) {
                        Some(session) => {
                            session.complete_exchange(text.clone());
                            render(tab, &format!("assistant: {text}"));
                        }
                        None => tracing::debug!(%tab, "reply for a closed panel discarded"),
                    }
                }
                PageCommand::FailExchange { tab, error } => {
                    match self.registry.session_mut(tab) {
                        Some(session) => {
                            session.fail_exchange(&error);
                            render(tab, &format!("assistant: Error: {error}"));
                        }
                        None => tracing::debug!(%tab, "failure for a closed panel discarded"),
                    }
                }
                PageCommand::Alert { tab, message } => {
                    render(tab, &format!("! {message}"));
                }
            },
            PageMsg::Ui(event) => self.handle_ui(event).await,
            PageMsg::Resolved { tab, epoch, outcome } => {
                if self.registry.epoch(tab) != Some(epoch) {
                    // The panel closed (or was replaced) while the request
                    // was in flight; the reply is dropped, not an error.
                    tracing::debug!(%tab, "late chat reply discarded");
                    return;
                }
                if let Some(session) = self.registry.session_mut(tab) {
                    let rendered = match &outcome {
                        ChatResponse::Reply { message } => format!("assistant: {message}"),
                        ChatResponse::Failure { error } => format!("assistant: Error: {error}"),
                    };
                    session.finish_request(match outcome {
                        ChatResponse::Reply { message } => Ok(message),
                        ChatResponse::Failure { error } => Err(error),
                    });
                    render(tab, &rendered);
                }
            }
            PageMsg::AutoClose { tab, epoch } => {
                if self.registry.epoch(tab) == Some(epoch) && self.registry.close(tab) {
                    render(tab, "panel closed");
                }
            }
            PageMsg::Snapshot { tab, reply } => {
                let _ = reply.send(self.registry.session(tab).map(|s| s.snapshot()));
            }
        }
    }

    async fn handle_ui(&mut self, event: UiEvent) {
        match event {
            UiEvent::Select { tab, text, url } => {
                self.selections.insert(tab, text.clone());
                // Passive report; the privileged side does not answer it.
                if let Err(e) = self
                    .background
                    .notify(BackgroundRequest::TextSelected { text, url })
                    .await
                {
                    tracing::warn!(error = %e, "selection report failed");
                }
            }
            UiEvent::OpenPanel { tab } => {
                self.registry.open(tab, None, None);
                render(tab, "panel open");
            }
            UiEvent::FollowUp { tab, text } => self.follow_up(tab, text).await,
            UiEvent::Copy { tab } => {
                let Some(session) = self.registry.session(tab) else {
                    return;
                };
                // No assistant turn yet: safely ignored.
                let Some(text) = session.last_assistant_reply() else {
                    return;
                };
                copy_to_clipboard(text);
                render(tab, "copied");
                let Some(epoch) = self.registry.epoch(tab) else {
                    return;
                };
                let handle = self.handle.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(COPY_CLOSE_DELAY).await;
                    let _ = handle.send(PageMsg::AutoClose { tab, epoch }).await;
                });
            }
            UiEvent::Close { tab } => {
                if self.registry.close(tab) {
                    render(tab, "panel closed");
                }
            }
            UiEvent::Navigate { tab } => {
                self.registry.forget(tab);
                self.selections.remove(&tab);
            }
        }
    }

    /// Send a follow-up. The caller-side serialization lives here: nothing
    /// is sent while a reply for this panel is still outstanding.
    async fn follow_up(&mut self, tab: TabId, text: String) {
        let Some(session) = self.registry.session_mut(tab) else {
            render(tab, "! no panel open");
            return;
        };
        if !session.begin_request(&text) {
            render(tab, "! still waiting for the previous reply");
            return;
        }
        render(tab, &format!("you: {text}"));
        render(tab, "assistant is typing...");

        let context = session.context().clone();
        let Some(epoch) = self.registry.epoch(tab) else {
            return;
        };
        let background = self.background.clone();
        let handle = self.handle.clone();
        tokio::spawn(async move {
            let outcome = match background
                .request(BackgroundRequest::Chat {
                    message: text,
                    context,
                })
                .await
            {
                Ok(ActionReply::Chat(response)) => response,
                Ok(_) | Err(_) => ChatResponse::Failure {
                    error: "Failed to process message".to_string(),
                },
            };
            let _ = handle
                .send(PageMsg::Resolved { tab, epoch, outcome })
                .await;
        });
    }
}

fn render(tab: TabId, line: &str) {
    println!("[{tab}] {line}");
}

/// Best-effort clipboard write; headless environments simply miss out.
fn copy_to_clipboard(text: &str) -> bool {
    match arboard::Clipboard::new() {
        Ok(mut clipboard) => clipboard.set_text(text.to_string()).is_ok(),
        Err(_) => false,
    }
}
