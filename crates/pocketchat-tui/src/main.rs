use anyhow::Result;
use clap::Parser;
use pocketchat_core::bridge::WorkerSettings;
use pocketchat_core::{
    ChatState, Config, GenerationBridge, GenerationOptions, OllamaClient, OllamaLoader, PipelineHandle,
};

mod app;
mod handler;
mod logging;
mod tui;
mod ui;

use app::App;
use tui::EventHandler;

#[derive(Parser)]
#[command(name = "pocketchat")]
#[command(about = "Chat with a local model in your terminal, with its thought process tucked away")]
struct Cli {
    /// Ollama server address (defaults to $OLLAMA_HOST or the config file)
    #[arg(long)]
    host: Option<String>,
    /// Model to chat with
    #[arg(short, long)]
    model: Option<String>,
    /// System prompt sent at the start of every conversation
    #[arg(short, long)]
    system: Option<String>,
    /// Maximum number of tokens generated per reply
    #[arg(long)]
    max_new_tokens: Option<u32>,
    /// Remember the chosen model as the default
    #[arg(long, requires = "model")]
    save_model: bool,
    /// Start with the chat drawer open
    #[arg(long)]
    open: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _log_guard = logging::init()?;

    let config = Config::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "ignoring unreadable config");
        Config::new()
    });

    let host = cli.host.unwrap_or_else(|| config.host());
    let model = cli.model.unwrap_or_else(|| config.model().to_string());
    let system_prompt = cli.system.unwrap_or_else(|| config.system_prompt().to_string());
    let max_new_tokens = cli.max_new_tokens.unwrap_or_else(|| config.max_new_tokens());

    if cli.save_model {
        Config::save_default_model(&model)?;
    }

    tracing::info!(%host, %model, max_new_tokens, "starting pocketchat");

    let loader = OllamaLoader::new(OllamaClient::new(&host), model.clone());
    let mut bridge = GenerationBridge::spawn(
        PipelineHandle::new(loader),
        WorkerSettings {
            options: GenerationOptions { max_new_tokens },
            system_prompt: system_prompt.clone(),
        },
    );

    let mut app = App::new(ChatState::new(system_prompt), model, host);
    if cli.open {
        app.toggle_drawer();
    }

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let result = run(&mut terminal, &mut app, &mut bridge).await;
    tui::restore()?;

    bridge.terminate();
    tracing::info!("pocketchat exited");
    result
}

async fn run(terminal: &mut tui::Tui, app: &mut App, bridge: &mut GenerationBridge) -> Result<()> {
    let mut events = EventHandler::new();

    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        let Some(event) = events.next(bridge, app.worker_alive).await else {
            break;
        };
        handler::handle_event(app, bridge, event)?;

        // Drain whatever else the worker already delivered before redrawing
        while let Some(event) = bridge.try_next_event() {
            app.chat.apply(event);
        }
    }

    Ok(())
}
