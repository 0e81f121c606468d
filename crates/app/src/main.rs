//! TextLens dev shell.
//!
//! Drives the two contexts from stdin the way the platform shell (menus,
//! panel input box) would: report a selection, fire a preset or a free-form
//! prompt at it, follow up in the panel, manage presets and settings.

use std::fs;
use std::sync::Arc;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader};

use app::options::OptionsSession;
use app::page::UiEvent;
use app::router::{spawn_contexts, BackgroundHandle, PageHandle};
use providers::GeminiGateway;
use shared::messages::{ActionReply, BackgroundRequest, TabId, TriggerAction};
use store::{ConfigStore, HistoryBuffer};

const HELP: &str = "\
commands:
  select <text>        report the page selection
  preset <id>          apply a stored preset to the selection
  prompt <text>        apply a one-off instruction to the selection
  send <text>          follow up in the open panel
  panel                show the panel's turns
  copy                 copy the last reply (panel closes shortly after)
  open / close / nav   panel lifecycle
  tab <n>              switch tabs
  history / clear      show or wipe the stored chat history
  key <key>            save the API key
  model <name>         pick a model
  models               list models available to the key
  prompts              list presets
  addprompt            add a placeholder preset
  name <id> <text>     rename a preset
  template <id> <text> change a preset's instruction
  delprompt <id>       delete a preset
  moveprompt <a> <b>   reorder presets
  saveprompts          persist preset edits
  export <path>        write a settings backup
  import <path>        restore a settings backup
  reload               ask the background to re-read settings
  quit";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let store = Arc::new(ConfigStore::open());
    let history = HistoryBuffer::open();
    let gateway = Arc::new(GeminiGateway::new());
    let (background, page) = spawn_contexts(store.clone(), history, gateway);

    let mut options = OptionsSession::new(store.clone());
    let mut tab = TabId(1);

    println!("TextLens shell. Type 'help' for commands.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let (command, rest) = match line.split_once(' ') {
            Some((c, r)) => (c, r.trim()),
            None => (line, ""),
        };
        match command {
            "help" => println!("{HELP}"),
            "quit" | "exit" => break,
            "tab" => match rest.parse::<u32>() {
                Ok(n) => {
                    tab = TabId(n);
                    println!("now on {tab}");
                }
                Err(_) => println!("usage: tab <n>"),
            },
            "select" => {
                page.ui(UiEvent::Select {
                    tab,
                    text: rest.to_string(),
                    url: "shell://page".to_string(),
                })
                .await?;
            }
            "preset" => match rest.parse::<u32>() {
                Ok(id) => {
                    background
                        .notify(BackgroundRequest::MenuTrigger {
                            tab,
                            trigger: TriggerAction::Preset { id },
                        })
                        .await?;
                }
                Err(_) => println!("usage: preset <id>"),
            },
            "prompt" => {
                background
                    .notify(BackgroundRequest::MenuTrigger {
                        tab,
                        trigger: TriggerAction::PromptOnTheFly {
                            prompt: rest.to_string(),
                        },
                    })
                    .await?;
            }
            "send" => {
                page.ui(UiEvent::FollowUp {
                    tab,
                    text: rest.to_string(),
                })
                .await?;
            }
            "panel" => show_panel(&page, tab).await?,
            "copy" => page.ui(UiEvent::Copy { tab }).await?,
            "open" => page.ui(UiEvent::OpenPanel { tab }).await?,
            "close" => page.ui(UiEvent::Close { tab }).await?,
            "nav" => page.ui(UiEvent::Navigate { tab }).await?,
            "history" => show_history(&background).await?,
            "clear" => {
                background.request(BackgroundRequest::ClearHistory).await?;
                println!("history cleared");
            }
            "reload" => match background.request(BackgroundRequest::ReloadConfig).await? {
                ActionReply::Ack(ack) if ack.success => println!("config reloaded"),
                _ => println!("reload failed"),
            },
            "key" => match options.save_api_key(rest) {
                Ok(()) => println!("API key saved"),
                Err(e) => println!("Error saving API key: {e}"),
            },
            "model" => match options.select_model(rest) {
                Ok(()) => println!("model saved"),
                Err(e) => println!("Error saving model: {e}"),
            },
            "models" => match providers::list_models(&store.current().api_key).await {
                Ok(models) => {
                    for model in models {
                        println!("  {model}");
                    }
                }
                Err(e) => println!("Failed to fetch models: {e}"),
            },
            "prompts" => {
                for (i, preset) in options.prompts().iter().enumerate() {
                    println!("  {}. [{}] {} - {}", i + 1, preset.id, preset.name, preset.template);
                }
                if options.has_unsaved_changes() {
                    println!("  (unsaved changes)");
                }
            }
            "addprompt" => {
                let id = options.add_prompt();
                println!("added preset {id}");
            }
            "name" | "template" => match rest.split_once(' ') {
                Some((id, text)) => match id.parse::<u32>() {
                    Ok(id) => {
                        let (name, template) = if command == "name" {
                            (Some(text), None)
                        } else {
                            (None, Some(text))
                        };
                        if !options.update_prompt(id, name, template) {
                            println!("no preset {id}");
                        }
                    }
                    Err(_) => println!("usage: {command} <id> <text>"),
                },
                None => println!("usage: {command} <id> <text>"),
            },
            "delprompt" => match rest.parse::<u32>() {
                Ok(id) => {
                    if !options.delete_prompt(id) {
                        println!("no preset {id}");
                    }
                }
                Err(_) => println!("usage: delprompt <id>"),
            },
            "moveprompt" => {
                let mut parts = rest.split_whitespace();
                match (
                    parts.next().and_then(|s| s.parse::<usize>().ok()),
                    parts.next().and_then(|s| s.parse::<usize>().ok()),
                ) {
                    (Some(from), Some(to)) if from >= 1 && to >= 1 => {
                        if !options.move_prompt(from - 1, to - 1) {
                            println!("positions out of range");
                        }
                    }
                    _ => println!("usage: moveprompt <from> <to>"),
                }
            }
            "saveprompts" => match options.save_prompts() {
                Ok(()) => println!("prompts saved"),
                Err(e) => println!("Error saving prompts: {e}"),
            },
            "export" => {
                let json = serde_json::to_string_pretty(&options.export())?;
                match fs::write(rest, json) {
                    Ok(()) => println!("exported to {rest}"),
                    Err(e) => println!("Error exporting settings: {e}"),
                }
            }
            "import" => match fs::read_to_string(rest) {
                Ok(json) => match options.import(&json) {
                    Ok(()) => {
                        background.request(BackgroundRequest::ReloadConfig).await?;
                        println!("import successful");
                    }
                    Err(e) => println!("Error importing settings: {e}"),
                },
                Err(e) => println!("Error importing settings: {e}"),
            },
            other => println!("unknown command '{other}' (try 'help')"),
        }
    }
    Ok(())
}

async fn show_panel(page: &PageHandle, tab: TabId) -> Result<()> {
    match page.snapshot(tab).await? {
        Some(snapshot) => {
            for turn in &snapshot.turns {
                println!("  {}: {}", turn.role.as_str(), turn.content);
            }
            if snapshot.pending {
                println!("  assistant is typing...");
            }
        }
        None => println!("no panel open on {tab}"),
    }
    Ok(())
}

async fn show_history(background: &BackgroundHandle) -> Result<()> {
    match background.request(BackgroundRequest::HistorySnapshot).await? {
        ActionReply::History(turns) => {
            if turns.is_empty() {
                println!("history is empty");
            }
            for turn in turns {
                println!("  {}: {}", turn.role.as_str(), turn.content);
            }
        }
        _ => println!("history unavailable"),
    }
    Ok(())
}
