//! Decision Chat - terminal front end for the decision-tree chat widget
//!
//! Reads configuration from `DECISION_CHAT_*` environment variables, keeps
//! the session in a local SQLite file and drives the widget from stdin.

use decision_chat::config::ConfigOverrides;
use decision_chat::presenter::TerminalPresenter;
use decision_chat::runtime::HttpWidgetRuntime;
use decision_chat::store::SqliteStore;
use decision_chat::{ActionRegistry, WidgetConfig, WidgetHandle};
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const HELP: &str = "\
  <number>   pick an option
  <text>     send a message
  /open      open the chat
  /close     close the chat
  /quit      exit
";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "decision_chat=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false)
                .with_writer(std::io::stderr),
        )
        .init();

    // Configuration
    let mut config = WidgetConfig::from_env();
    if let Ok(path) = std::env::var("DECISION_CHAT_CONFIG") {
        tracing::info!(path = %path, "Loading config overrides");
        config.apply_overrides(ConfigOverrides::from_file(&path)?);
    }

    let db_path = std::env::var("DECISION_CHAT_DB_PATH").unwrap_or_else(|_| {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
        format!("{home}/.decision-chat/widget.db")
    });

    // Ensure storage directory exists
    if let Some(parent) = PathBuf::from(&db_path).parent() {
        std::fs::create_dir_all(parent)?;
    }

    tracing::info!(path = %db_path, "Opening session store");
    let store = SqliteStore::open(&db_path)?;

    if config.api_url.is_none() && config.initial_tree.is_none() {
        tracing::warn!("No decision tree configured. Set DECISION_CHAT_API_URL or DECISION_CHAT_CONFIG.");
    }

    let (runtime, handle) = HttpWidgetRuntime::from_config(
        &config,
        store,
        TerminalPresenter::stdout(),
        ActionRegistry::new(),
    );
    let runtime_task = tokio::spawn(runtime.run());

    println!("{HELP}");
    handle.open()?;
    read_commands(&handle).await?;

    handle.shutdown();
    runtime_task.await?;
    Ok(())
}

/// Turn stdin lines into widget events until `/quit` or EOF
async fn read_commands(handle: &WidgetHandle) -> Result<(), Box<dyn std::error::Error>> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        match line {
            "" => {}
            "/quit" => break,
            "/open" => handle.open()?,
            "/close" => handle.close()?,
            "/help" => println!("{HELP}"),
            _ => {
                if let Ok(choice) = line.parse::<usize>() {
                    let options = handle.snapshot().options;
                    match choice.checked_sub(1).and_then(|i| options.get(i)) {
                        Some(option) => handle.select_option(option.clone())?,
                        None => println!("  no option {choice}"),
                    }
                } else {
                    handle.submit_text(line)?;
                }
            }
        }
    }
    Ok(())
}
