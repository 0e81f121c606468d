//! Channel plumbing between the privileged and page contexts.
//!
//! The two contexts share no memory; every exchange goes through these
//! handles as a typed request, optionally carrying the oneshot slot its
//! response comes back through.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use tokio::sync::{mpsc, oneshot};

use overlay::PanelSnapshot;
use providers::TextGenerator;
use shared::messages::{ActionReply, BackgroundRequest, PageCommand, TabId};
use store::{ConfigStore, HistoryBuffer};

use crate::background;
use crate::page::{self, PageMsg, UiEvent};

const INBOX_DEPTH: usize = 64;

/// A request plus the slot its response goes back through. `None` marks a
/// fire-and-forget notification.
pub struct Inbound<M> {
    pub msg: M,
    pub reply: Option<oneshot::Sender<ActionReply>>,
}

pub(crate) fn respond(reply: Option<oneshot::Sender<ActionReply>>, value: ActionReply) {
    if let Some(reply) = reply {
        // The requester may have gone away; that is its business.
        let _ = reply.send(value);
    }
}

/// Sender side of the background context's inbox.
#[derive(Clone)]
pub struct BackgroundHandle {
    tx: mpsc::Sender<Inbound<BackgroundRequest>>,
}

impl BackgroundHandle {
    /// Single request / single response exchange.
    pub async fn request(&self, msg: BackgroundRequest) -> Result<ActionReply> {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(Inbound {
                msg,
                reply: Some(tx),
            })
            .await
            .map_err(|_| anyhow!("background context is gone"))?;
        rx.await
            .map_err(|_| anyhow!("background context dropped the request"))
    }

    /// Fire-and-forget notification.
    pub async fn notify(&self, msg: BackgroundRequest) -> Result<()> {
        self.tx
            .send(Inbound { msg, reply: None })
            .await
            .map_err(|_| anyhow!("background context is gone"))
    }
}

/// Sender side of the page context's inbox.
#[derive(Clone)]
pub struct PageHandle {
    tx: mpsc::Sender<PageMsg>,
}

impl PageHandle {
    pub(crate) async fn send(&self, msg: PageMsg) -> Result<()> {
        self.tx
            .send(msg)
            .await
            .map_err(|_| anyhow!("page context is gone"))
    }

    /// Dispatch a command without waiting for a response.
    pub async fn command(&self, command: PageCommand) -> Result<()> {
        self.send(PageMsg::Command(Inbound {
            msg: command,
            reply: None,
        }))
        .await
    }

    /// Dispatch a command and wait for its reply (selection capture).
    pub async fn request(&self, command: PageCommand) -> Result<ActionReply> {
        let (tx, rx) = oneshot::channel();
        self.send(PageMsg::Command(Inbound {
            msg: command,
            reply: Some(tx),
        }))
        .await?;
        rx.await
            .map_err(|_| anyhow!("page context dropped the request"))
    }

    /// Deliver a user interaction with the page (selection, panel input).
    pub async fn ui(&self, event: UiEvent) -> Result<()> {
        self.send(PageMsg::Ui(event)).await
    }

    /// Current view of a tab's panel, `None` when no panel is open.
    pub async fn snapshot(&self, tab: TabId) -> Result<Option<PanelSnapshot>> {
        let (tx, rx) = oneshot::channel();
        self.send(PageMsg::Snapshot { tab, reply: tx }).await?;
        rx.await.map_err(|_| anyhow!("page context dropped the request"))
    }
}

/// Spawn both contexts and hand back their inbox handles.
pub fn spawn_contexts(
    store: Arc<ConfigStore>,
    history: HistoryBuffer,
    gateway: Arc<dyn TextGenerator>,
) -> (BackgroundHandle, PageHandle) {
    let (page_tx, page_rx) = mpsc::channel(INBOX_DEPTH);
    let page_handle = PageHandle { tx: page_tx };

    let (bg_tx, bg_rx) = mpsc::channel(INBOX_DEPTH);
    let background_handle = BackgroundHandle { tx: bg_tx };

    tokio::spawn(background::run(
        bg_rx,
        store,
        history,
        gateway,
        page_handle.clone(),
    ));
    tokio::spawn(page::run(
        page_rx,
        background_handle.clone(),
        page_handle.clone(),
    ));

    (background_handle, page_handle)
}
