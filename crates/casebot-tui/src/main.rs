use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use casebot_core::{run_query, AnswerClient, Config, CopyAction, SystemClipboard};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

mod app;
mod handler;
mod transcript;
mod tui;
mod ui;

use app::App;
use tui::{AppEvent, EventHandler};

const DEFAULT_LOG_FILTER: &str = "casebot_core=info,casebot_tui=info";

fn log_dir() -> Result<PathBuf> {
    let data_dir = dirs::data_local_dir()
        .ok_or_else(|| anyhow!("Could not determine data directory"))?;
    Ok(data_dir.join("casebot").join("logs"))
}

/// Log to a file; the terminal belongs to the UI
fn init_logging() -> Result<WorkerGuard> {
    let log_dir = log_dir()?;
    std::fs::create_dir_all(&log_dir)?;

    let mut log_file_opts = OpenOptions::new();
    log_file_opts.create(true).append(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        log_file_opts.mode(0o600);
    }
    let log_file = log_file_opts.open(log_dir.join("casebot.log"))?;

    let (non_blocking, guard) = tracing_appender::non_blocking(log_file);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_target(false)
        .with_ansi(false)
        .with_filter(env_filter);

    let _ = tracing_subscriber::registry().with(file_layer).try_init();
    Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logging is best-effort; a read-only home should not stop the UI
    let _log_guard = init_logging().ok();

    let config = Config::load()
        .unwrap_or_else(|err| {
            warn!(error = %err, "config unreadable, using defaults");
            Config::new()
        })
        .with_env_overrides();
    info!(endpoint = config.endpoint(), "starting casebot");

    let backend = Arc::new(AnswerClient::new(config.endpoint()));
    let mut app = App::new(&config);

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = EventHandler::new();
    let result = run(&mut terminal, &mut app, &mut events, backend).await;
    tui::restore()?;

    result
}

/// Clipboard writes run on one long-lived thread that owns the clipboard
/// handle, so copied text stays available after the write returns.
fn spawn_clipboard_worker(
    events: mpsc::UnboundedSender<AppEvent>,
) -> mpsc::UnboundedSender<CopyAction> {
    let (tx, mut rx) = mpsc::unbounded_channel::<CopyAction>();
    let spawned = std::thread::Builder::new()
        .name("clipboard".to_string())
        .spawn(move || {
            let mut clipboard = SystemClipboard::new();
            while let Some(action) = rx.blocking_recv() {
                let outcome = action.perform(&mut clipboard);
                if events.send(AppEvent::Copied(outcome)).is_err() {
                    break;
                }
            }
            debug!("clipboard worker stopped");
        });
    if let Err(err) = spawned {
        warn!(error = %err, "could not start clipboard worker");
    }
    tx
}

async fn run(
    terminal: &mut tui::Tui,
    app: &mut App,
    events: &mut EventHandler,
    backend: Arc<AnswerClient>,
) -> Result<()> {
    let clipboard = spawn_clipboard_worker(events.sender());
    terminal.draw(|frame| ui::render(app, frame))?;

    while !app.should_quit {
        let Some(event) = events.next().await else {
            break;
        };
        let redraw = !matches!(event, AppEvent::Tick) || app.needs_tick_redraw();
        handler::handle_event(app, event);

        for pending in app.take_outgoing_queries() {
            let backend = Arc::clone(&backend);
            let tx = events.sender();
            let wait = app.request_timeout;
            tokio::spawn(async move {
                let resolution = run_query(&backend, pending, wait).await;
                let _ = tx.send(AppEvent::Resolved(resolution));
            });
        }

        for action in app.take_outgoing_copies() {
            if clipboard.send(action).is_err() {
                app.set_notice("Copy failed: clipboard unavailable");
            }
        }

        if redraw {
            terminal.draw(|frame| ui::render(app, frame))?;
        }
    }

    Ok(())
}
