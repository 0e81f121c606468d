//! Privileged context: owns the config store, the history buffer, and the
//! gateway. Processes its inbox strictly in arrival order; all rendering
//! happens in the page context via dispatched commands.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use providers::TextGenerator;
use shared::messages::{
    Ack, ActionReply, BackgroundRequest, ChatContext, ChatResponse, PageCommand,
    SelectionReply, TabId, TriggerAction,
};
use shared::settings::Settings;
use store::{ConfigStore, HistoryBuffer};

use crate::router::{respond, Inbound, PageHandle};

const CONFIGURE_NOTICE: &str =
    "Please configure your API key and select a model in the settings.";

struct Background {
    store: Arc<ConfigStore>,
    settings_watch: watch::Receiver<Settings>,
    history: HistoryBuffer,
    gateway: Arc<dyn TextGenerator>,
    page: PageHandle,
}

pub async fn run(
    mut inbox: mpsc::Receiver<Inbound<BackgroundRequest>>,
    store: Arc<ConfigStore>,
    history: HistoryBuffer,
    gateway: Arc<dyn TextGenerator>,
    page: PageHandle,
) {
    let settings_watch = store.subscribe();
    let mut context = Background {
        store,
        settings_watch,
        history,
        gateway,
        page,
    };
    let mut changes = context.settings_watch.clone();
    let mut watch_alive = true;
    loop {
        tokio::select! {
            msg = inbox.recv() => {
                let Some(Inbound { msg, reply }) = msg else { break };
                context.handle(msg, reply).await;
            }
            changed = changes.changed(), if watch_alive => {
                match changed {
                    Ok(()) => {
                        let presets = changes.borrow_and_update().prompts.len();
                        tracing::info!(presets, "settings changed; menu entries rebuilt");
                    }
                    Err(_) => watch_alive = false,
                }
            }
        }
    }
    tracing::debug!("background context stopped");
}

impl Background {
    async fn handle(
        &mut self,
        msg: BackgroundRequest,
        reply: Option<tokio::sync::oneshot::Sender<ActionReply>>,
    ) {
        match msg {
            BackgroundRequest::ReloadConfig => {
                self.store.reload();
                respond(reply, ActionReply::Ack(Ack::ok()));
            }
            BackgroundRequest::Chat { message, context } => {
                let response = self.handle_chat(message, context).await;
                respond(reply, ActionReply::Chat(response));
            }
            BackgroundRequest::TextSelected { text, url } => {
                // Passive broadcast; nothing answers it.
                tracing::debug!(len = text.len(), %url, "selection reported");
            }
            BackgroundRequest::MenuTrigger { tab, trigger } => {
                self.handle_trigger(tab, trigger).await;
                respond(reply, ActionReply::Ack(Ack::ok()));
            }
            BackgroundRequest::ClearHistory => {
                self.history.clear();
                respond(reply, ActionReply::Ack(Ack::ok()));
            }
            BackgroundRequest::HistorySnapshot => {
                respond(reply, ActionReply::History(self.history.get_all().to_vec()));
            }
        }
    }

    /// Latest committed settings. The watch channel holds the value every
    /// save has already published, so this never lags a completed write.
    fn settings(&self) -> Settings {
        self.settings_watch.borrow().clone()
    }

    /// Follow-up round-trip: converse over the stored history, then append
    /// the completed exchange. A failed turn leaves the buffer untouched.
    async fn handle_chat(&mut self, message: String, context: ChatContext) -> ChatResponse {
        let settings = self.settings();
        let outcome = self
            .gateway
            .converse(&settings, self.history.get_all(), &message, &context)
            .await;
        match outcome {
            Ok(text) => {
                self.history.append_exchange(message, text.clone());
                ChatResponse::Reply { message: text }
            }
            Err(e) => ChatResponse::Failure {
                error: e.to_string(),
            },
        }
    }

    /// Menu trigger: surface the panel first, then validate, then run the
    /// generation and render its outcome.
    async fn handle_trigger(&mut self, tab: TabId, trigger: TriggerAction) {
        let _ = self
            .page
            .command(PageCommand::ShowPanel {
                tab,
                initial_message: None,
                initial_response: None,
            })
            .await;

        let selection = match self.capture_selection(tab).await {
            Some(text) if !text.trim().is_empty() => text,
            _ => {
                self.alert(tab, "No text selected").await;
                return;
            }
        };

        let settings = self.settings();
        if settings.api_key.is_empty() || settings.selected_model.is_empty() {
            self.alert(tab, CONFIGURE_NOTICE).await;
            return;
        }

        let instruction = match trigger {
            TriggerAction::Preset { id } => match settings.preset(id) {
                Some(preset) => preset.template.clone(),
                None => {
                    tracing::warn!(id, "menu trigger for unknown preset");
                    return;
                }
            },
            TriggerAction::PromptOnTheFly { prompt } => {
                let prompt = prompt.trim().to_string();
                if prompt.is_empty() {
                    return;
                }
                prompt
            }
        };

        let _ = self
            .page
            .command(PageCommand::BeginExchange {
                tab,
                text: selection.clone(),
            })
            .await;

        let outcome = self
            .gateway
            .generate(&settings, &instruction, &selection)
            .await;
        let command = match outcome {
            Ok(text) => PageCommand::CompleteExchange { tab, text },
            Err(e) => PageCommand::FailExchange {
                tab,
                error: e.to_string(),
            },
        };
        let _ = self.page.command(command).await;
    }

    /// Ask the page for its current selection.
    async fn capture_selection(&self, tab: TabId) -> Option<String> {
        match self.page.request(PageCommand::AnalyzeText { tab }).await {
            Ok(ActionReply::Selection(SelectionReply {
                success: true,
                text: Some(text),
                ..
            })) => Some(text),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(error = %e, "selection capture failed");
                None
            }
        }
    }

    async fn alert(&self, tab: TabId, message: &str) {
        let _ = self
            .page
            .command(PageCommand::Alert {
                tab,
                message: message.to_string(),
            })
            .await;
    }
}
