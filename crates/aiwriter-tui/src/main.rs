mod app;
mod buffer;
mod handler;
mod settings;
mod tui;
mod ui;

use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::Mutex;
use anyhow::Result;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use aiwriter_core::{Config, ConfigStore};
use app::App;
use tui::EventHandler;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let store = ConfigStore::open_default()?;
    let config = match store.load() {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(path = %store.path().display(), error = %e, "using default settings");
            Config::default()
        }
    };
    let start_folder = config.default_folder().map(str::to_string);

    let mut app = App::new(config, store);
    if let Some(folder) = std::env::args().nth(1).or(start_folder) {
        app.open_folder(&folder);
    }

    tui::install_panic_hook();
    let mut terminal = tui::init()?;

    let result = run(&mut terminal, &mut app).await;

    tui::restore()?;
    result
}

async fn run(terminal: &mut tui::Tui, app: &mut App) -> Result<()> {
    let mut events = EventHandler::new();

    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        if let Some(event) = events.next().await {
            handler::handle_event(app, event).await?;
        }
    }

    Ok(())
}

/// Logs go to a file; writing to the terminal would corrupt the UI.
fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match open_log_file() {
        Some((path, file)) => {
            tracing_subscriber::registry()
                .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
                .with(env_filter)
                .init();
            tracing::info!(path = %path.display(), "logging initialized");
        }
        None => tracing_subscriber::registry().with(env_filter).init(),
    }
}

fn open_log_file() -> Option<(PathBuf, fs::File)> {
    let path = dirs::data_dir()?.join("ai-writer").join("aiwriter.log");
    fs::create_dir_all(path.parent()?).ok()?;
    let file = OpenOptions::new().create(true).append(true).open(&path).ok()?;
    Some((path, file))
}
