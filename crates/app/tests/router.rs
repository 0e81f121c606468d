//! End-to-end exchanges across the privileged and page contexts, with the
//! gateway stubbed out.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use app::page::UiEvent;
use app::router::{spawn_contexts, BackgroundHandle, PageHandle};
use overlay::PanelSnapshot;
use providers::TextGenerator;
use shared::chat::{ChatTurn, Role};
use shared::error::GatewayError;
use shared::messages::{ActionReply, BackgroundRequest, ChatContext, TabId, TriggerAction};
use shared::settings::{PromptPreset, Settings, SettingsPatch};
use store::{ConfigStore, HistoryBuffer};

const TAB: TabId = TabId(1);

#[derive(Clone, Copy)]
enum Script {
    /// Answer deterministically and immediately.
    Echo,
    /// Every call fails at the protocol level.
    Fail,
    /// Answer after a delay, to race against UI events.
    Slow,
}

struct StubGateway {
    script: Script,
    calls: AtomicUsize,
    last_generate: Mutex<Option<(String, String)>>,
}

impl StubGateway {
    fn new(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script,
            calls: AtomicUsize::new(0),
            last_generate: Mutex::new(None),
        })
    }

    async fn answer(&self, text: String) -> Result<String, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.script {
            Script::Echo => Ok(text),
            Script::Fail => Err(GatewayError::protocol("quota exceeded")),
            Script::Slow => {
                tokio::time::sleep(Duration::from_millis(100)).await;
                Ok(text)
            }
        }
    }
}

#[async_trait]
impl TextGenerator for StubGateway {
    async fn generate(
        &self,
        _settings: &Settings,
        instruction: &str,
        input_text: &str,
    ) -> Result<String, GatewayError> {
        *self.last_generate.lock().unwrap() =
            Some((instruction.to_string(), input_text.to_string()));
        if instruction == "Translate to English" && input_text == "Bonjour le monde" {
            return self.answer("Hello world".to_string()).await;
        }
        self.answer(format!("{instruction}: {input_text}")).await
    }

    async fn converse(
        &self,
        _settings: &Settings,
        _history: &[ChatTurn],
        new_message: &str,
        _context: &ChatContext,
    ) -> Result<String, GatewayError> {
        self.answer(format!("re: {new_message}")).await
    }
}

fn configured_store() -> Arc<ConfigStore> {
    let store = Arc::new(ConfigStore::in_memory());
    store
        .save(SettingsPatch {
            api_key: Some("key".into()),
            selected_model: Some("gemini-2.0-flash".into()),
            prompts: Some(vec![PromptPreset::new(
                1,
                "Translate",
                "Translate to English",
            )]),
        })
        .unwrap();
    store
}

fn harness(script: Script) -> (BackgroundHandle, PageHandle, Arc<StubGateway>) {
    let gateway = StubGateway::new(script);
    let (background, page) = spawn_contexts(
        configured_store(),
        HistoryBuffer::in_memory(),
        gateway.clone(),
    );
    (background, page, gateway)
}

async fn select(page: &PageHandle, text: &str) {
    page.ui(UiEvent::Select {
        tab: TAB,
        text: text.to_string(),
        url: "test://page".to_string(),
    })
    .await
    .unwrap();
}

/// Poll until the panel has at least `want` turns and no pending request.
async fn wait_for_settled(page: &PageHandle, want: usize) -> PanelSnapshot {
    for _ in 0..200 {
        if let Some(snapshot) = page.snapshot(TAB).await.unwrap() {
            if snapshot.turns.len() >= want && !snapshot.pending {
                return snapshot;
            }
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("panel never reached {want} settled turns");
}

/// The background processes its inbox in order, so a completed round-trip
/// request guarantees every earlier notification has been fully handled.
async fn fence(background: &BackgroundHandle) {
    background
        .request(BackgroundRequest::HistorySnapshot)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_preset_trigger_renders_the_exchange() {
    let (background, page, gateway) = harness(Script::Echo);
    select(&page, "Bonjour le monde").await;
    background
        .notify(BackgroundRequest::MenuTrigger {
            tab: TAB,
            trigger: TriggerAction::Preset { id: 1 },
        })
        .await
        .unwrap();

    let snapshot = wait_for_settled(&page, 2).await;
    assert_eq!(snapshot.turns[0], ChatTurn::user("Bonjour le monde"));
    assert_eq!(snapshot.turns[1], ChatTurn::assistant("Hello world"));

    let (instruction, input) = gateway.last_generate.lock().unwrap().clone().unwrap();
    assert_eq!(instruction, "Translate to English");
    assert_eq!(input, "Bonjour le monde");
}

#[tokio::test]
async fn test_trigger_without_selection_issues_no_network_call() {
    let (background, page, gateway) = harness(Script::Echo);
    background
        .notify(BackgroundRequest::MenuTrigger {
            tab: TAB,
            trigger: TriggerAction::Preset { id: 1 },
        })
        .await
        .unwrap();
    fence(&background).await;

    assert_eq!(gateway.calls.load(Ordering::SeqCst), 0);
    // The panel still opened; it just shows the notice and no turns.
    let snapshot = page.snapshot(TAB).await.unwrap().unwrap();
    assert!(snapshot.turns.is_empty());
}

#[tokio::test]
async fn test_trigger_without_api_key_is_blocked_before_the_network() {
    let gateway = StubGateway::new(Script::Echo);
    let store = Arc::new(ConfigStore::in_memory());
    store
        .save(SettingsPatch::prompts(vec![PromptPreset::new(
            1,
            "Translate",
            "Translate to English",
        )]))
        .unwrap();
    let (background, page) =
        spawn_contexts(store, HistoryBuffer::in_memory(), gateway.clone());

    select(&page, "Bonjour le monde").await;
    background
        .notify(BackgroundRequest::MenuTrigger {
            tab: TAB,
            trigger: TriggerAction::Preset { id: 1 },
        })
        .await
        .unwrap();
    fence(&background).await;
    assert_eq!(gateway.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_second_trigger_reuses_the_panel() {
    let (background, page, _) = harness(Script::Echo);
    select(&page, "Bonjour le monde").await;
    for _ in 0..2 {
        background
            .notify(BackgroundRequest::MenuTrigger {
                tab: TAB,
                trigger: TriggerAction::Preset { id: 1 },
            })
            .await
            .unwrap();
    }
    // Four turns in one panel: the second trigger appended, it did not
    // recreate the instance.
    let snapshot = wait_for_settled(&page, 4).await;
    assert_eq!(snapshot.turns.len(), 4);
}

#[tokio::test]
async fn test_follow_up_round_trip_appends_history() {
    let (background, page, _) = harness(Script::Echo);
    page.ui(UiEvent::OpenPanel { tab: TAB }).await.unwrap();
    page.ui(UiEvent::FollowUp {
        tab: TAB,
        text: "hi".to_string(),
    })
    .await
    .unwrap();

    let snapshot = wait_for_settled(&page, 2).await;
    assert_eq!(snapshot.turns[1], ChatTurn::assistant("re: hi"));

    match background
        .request(BackgroundRequest::HistorySnapshot)
        .await
        .unwrap()
    {
        ActionReply::History(turns) => {
            assert_eq!(turns, vec![ChatTurn::user("hi"), ChatTurn::assistant("re: hi")]);
        }
        other => panic!("unexpected reply: {other:?}"),
    }
}

#[tokio::test]
async fn test_failed_follow_up_renders_error_and_skips_history() {
    let (background, page, _) = harness(Script::Fail);
    page.ui(UiEvent::OpenPanel { tab: TAB }).await.unwrap();
    page.ui(UiEvent::FollowUp {
        tab: TAB,
        text: "hi".to_string(),
    })
    .await
    .unwrap();

    let snapshot = wait_for_settled(&page, 2).await;
    assert_eq!(snapshot.turns[1].role, Role::Assistant);
    assert_eq!(snapshot.turns[1].content, "Error: quota exceeded");

    match background
        .request(BackgroundRequest::HistorySnapshot)
        .await
        .unwrap()
    {
        ActionReply::History(turns) => assert!(turns.is_empty()),
        other => panic!("unexpected reply: {other:?}"),
    }
}

#[tokio::test]
async fn test_second_send_is_refused_while_one_is_outstanding() {
    let (_background, page, gateway) = harness(Script::Slow);
    page.ui(UiEvent::OpenPanel { tab: TAB }).await.unwrap();
    page.ui(UiEvent::FollowUp {
        tab: TAB,
        text: "one".to_string(),
    })
    .await
    .unwrap();
    page.ui(UiEvent::FollowUp {
        tab: TAB,
        text: "two".to_string(),
    })
    .await
    .unwrap();

    let snapshot = wait_for_settled(&page, 2).await;
    assert_eq!(
        snapshot.turns,
        vec![ChatTurn::user("one"), ChatTurn::assistant("re: one")]
    );
    assert_eq!(gateway.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_late_reply_after_close_is_discarded() {
    let (_background, page, _) = harness(Script::Slow);
    page.ui(UiEvent::OpenPanel { tab: TAB }).await.unwrap();
    page.ui(UiEvent::FollowUp {
        tab: TAB,
        text: "hi".to_string(),
    })
    .await
    .unwrap();
    page.ui(UiEvent::Close { tab: TAB }).await.unwrap();
    // Reopen right away: the fresh panel must not inherit the reply that is
    // still in flight for its predecessor.
    page.ui(UiEvent::OpenPanel { tab: TAB }).await.unwrap();

    tokio::time::sleep(Duration::from_millis(250)).await;
    let snapshot = page.snapshot(TAB).await.unwrap().unwrap();
    assert!(snapshot.turns.is_empty());
    assert!(!snapshot.pending);
}

#[tokio::test]
async fn test_copy_closes_the_panel_after_a_short_delay() {
    let (_background, page, _) = harness(Script::Echo);
    page.ui(UiEvent::OpenPanel { tab: TAB }).await.unwrap();
    page.ui(UiEvent::FollowUp {
        tab: TAB,
        text: "hi".to_string(),
    })
    .await
    .unwrap();
    wait_for_settled(&page, 2).await;

    page.ui(UiEvent::Copy { tab: TAB }).await.unwrap();
    tokio::time::sleep(Duration::from_millis(700)).await;
    assert!(page.snapshot(TAB).await.unwrap().is_none());
}

#[tokio::test]
async fn test_copy_without_a_reply_is_a_noop() {
    let (_background, page, _) = harness(Script::Echo);
    page.ui(UiEvent::OpenPanel { tab: TAB }).await.unwrap();
    page.ui(UiEvent::Copy { tab: TAB }).await.unwrap();

    tokio::time::sleep(Duration::from_millis(700)).await;
    // No reply to copy, so no auto-close either.
    assert!(page.snapshot(TAB).await.unwrap().is_some());
}

#[tokio::test]
async fn test_reload_config_acks_success() {
    let (background, _page, _) = harness(Script::Echo);
    match background
        .request(BackgroundRequest::ReloadConfig)
        .await
        .unwrap()
    {
        ActionReply::Ack(ack) => assert!(ack.success),
        other => panic!("unexpected reply: {other:?}"),
    }
}
