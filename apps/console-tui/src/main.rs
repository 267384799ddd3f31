//! Terminal operator console for a covert channel engine.
//!
//! Run with: cargo run -p covert-console-tui -- --engine ws://127.0.0.1:8080/api/ws

mod app;
mod cli;
mod ui;

use std::{
    io,
    path::Path,
    sync::{Arc, Mutex},
    time::Duration,
};

use anyhow::{Context, Result};
use clap::Parser;
use covert_console_core::{ConsoleConfig, MessageLog};
use covert_console_session::{ConsoleSession, storage::FileStorage};
use covert_console_transport::{
    ProtocolClient, WsTransport,
    tui::{Input, input},
};
use crossterm::{
    event::{self, DisableBracketedPaste, EnableBracketedPaste},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use tokio::sync::mpsc::{UnboundedSender, unbounded_channel};
use tracing_subscriber::EnvFilter;

use app::App;
use cli::Cli;

const TICK: Duration = Duration::from_millis(250);

#[tokio::main]
async fn main() -> Result<()> {
    let config: ConsoleConfig = Cli::parse().into();
    if let Some(path) = &config.log_file {
        init_tracing_to_file(path)?;
    }

    let mut client = connect(&config).await;

    let mut terminal = init_terminal()?;
    let run_result = run_app_loop(&mut terminal, &mut client, &config).await;
    let restore_result = restore_terminal(&mut terminal);
    if let Err(e) = client.disconnect().await {
        tracing::warn!("Closing engine connection: {e}");
    }
    restore_result?;
    run_result
}

fn init_tracing_to_file(log_path: &Path) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_path)
        .with_context(|| format!("open log file {}", log_path.display()))?;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .try_init();
    Ok(())
}

/// Connect to the engine. A failed connection still yields a client so the
/// console can show what went wrong.
async fn connect(config: &ConsoleConfig) -> ProtocolClient<WsTransport> {
    let storage = Arc::new(FileStorage::new(&config.snapshot_path));
    let mut session = ConsoleSession::new(Arc::new(MessageLog::new())).with_storage(storage);

    match WsTransport::connect(&config.engine_url).await {
        Ok(transport) => {
            let mut client = ProtocolClient::detached(session);
            if let Err(e) = client.attach(transport).await {
                tracing::error!("Catalog request failed: {e}");
            }
            client
        }
        Err(e) => {
            session.on_transport_failure(&e);
            ProtocolClient::detached(session)
        }
    }
}

async fn run_app_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    client: &mut ProtocolClient<WsTransport>,
    config: &ConsoleConfig,
) -> Result<()> {
    let mut app = App::new();
    let (input_tx, mut input_rx) = unbounded_channel::<Input>();
    spawn_input_task(input_tx);

    loop {
        let url = &config.engine_url;
        terminal.draw(|frame| ui::render(frame, &app, client.session(), url))?;
        if app.should_quit {
            break;
        }

        tokio::select! {
            maybe_input = input_rx.recv() => {
                let command = match maybe_input {
                    Some(Input::Key(key)) => app.on_key(&key, client.session()),
                    Some(Input::Paste(text)) => {
                        app.on_paste(&text);
                        None
                    }
                    None => break,
                };
                if let Some(command) = command {
                    if let Err(e) = client.command(command).await {
                        tracing::debug!("Command failed: {e}");
                    }
                }
            }
            inbound = client.next_inbound(), if client.is_connected() => {
                if let Some(Err(e)) = inbound {
                    tracing::debug!("Inbound message: {e}");
                }
            }
            () = tokio::time::sleep(TICK) => {}
        }
        app.clamp(client.session());
    }
    Ok(())
}

fn init_terminal() -> Result<Terminal<CrosstermBackend<io::Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableBracketedPaste)?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend)?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        DisableBracketedPaste,
        LeaveAlternateScreen
    )?;
    terminal.show_cursor()?;
    Ok(())
}

fn spawn_input_task(input_tx: UnboundedSender<Input>) {
    tokio::task::spawn_blocking(move || {
        loop {
            match event::poll(Duration::from_millis(100)) {
                Ok(true) => match event::read() {
                    Ok(event) => {
                        if let Some(item) = input(event) {
                            if input_tx.send(item).is_err() {
                                break;
                            }
                        }
                    }
                    Err(_) => break,
                },
                Ok(false) => {
                    if input_tx.is_closed() {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
    });
}
