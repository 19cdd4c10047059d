mod api;
mod app;
mod config;
mod controller;
mod error;
mod events;
mod logging;
mod models;
mod storage;
mod ui;

use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::Backend, prelude::*};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use api::BedrockInvoker;
use app::App;
use controller::RequestLifecycleController;
use events::AppEvent;
use storage::ImageStore;

#[tokio::main]
async fn main() -> Result<()> {
    logging::init(&config::get_log_path()?)?;

    // Everything that can fail on configuration happens before the terminal is taken over
    let app_config = config::load_config()?;
    let settings = config::load_bedrock_settings(&app_config)?;
    let invoker = BedrockInvoker::connect(&settings)
        .await
        .context("Failed to create Bedrock client")?;

    let store = match &app_config.output_dir {
        Some(dir) => ImageStore::with_root(dir),
        None => ImageStore::new(),
    };
    let store = match store {
        Ok(store) => {
            log::info!("Saving images to {}", store.root().display());
            Some(store)
        }
        Err(e) => {
            log::warn!("Image saving disabled: {e:#}");
            None
        }
    };

    let controller = RequestLifecycleController::new(
        Arc::new(invoker.clone()),
        settings.model_id.clone(),
        app_config.generation.clone(),
    );
    let mut app = App::new(controller, invoker.region().to_string(), store);

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Create channel for async events
    let (tx, mut rx) = mpsc::unbounded_channel::<AppEvent>();

    let res = run_app(&mut terminal, &mut app, &tx, &mut rx);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        log::error!("Application error: {err:?}");
        eprintln!("Error: {err:?}");
    }

    Ok(())
}

fn handle_app_event(app: &mut App, event: AppEvent) {
    match event {
        AppEvent::GenerationSettled { id, result } => {
            app.finish_generation(id, result);
        }
    }
}

fn handle_popup_keys(app: &mut App, key: KeyCode, modifiers: KeyModifiers) -> bool {
    if app.show_help {
        match key {
            KeyCode::Char('h') if modifiers.contains(KeyModifiers::CONTROL) => app.toggle_help(),
            KeyCode::Esc => app.show_help = false,
            _ => {}
        }
        return true;
    }

    if app.show_info {
        match key {
            KeyCode::Char('i') if modifiers.contains(KeyModifiers::CONTROL) => app.toggle_info(),
            KeyCode::Esc => app.show_info = false,
            _ => {}
        }
        return true;
    }

    false
}

fn handle_keyboard_input(
    app: &mut App,
    key: KeyCode,
    modifiers: KeyModifiers,
    event_tx: &mpsc::UnboundedSender<AppEvent>,
) {
    match key {
        KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => {
            if app.exit_pending {
                app.quit();
            } else {
                app.exit_pending = true;
            }
            return;
        }
        KeyCode::Esc if app.exit_pending => {
            app.exit_pending = false;
            return;
        }
        _ if app.exit_pending => {
            // Any other key cancels pending exit and is processed normally
            app.exit_pending = false;
        }
        _ => {}
    }

    match key {
        KeyCode::Char('q') if modifiers.contains(KeyModifiers::CONTROL) => app.quit(),
        KeyCode::Char('h') if modifiers.contains(KeyModifiers::CONTROL) => app.toggle_help(),
        KeyCode::Char('i') if modifiers.contains(KeyModifiers::CONTROL) => app.toggle_info(),
        KeyCode::Char('u') if modifiers.contains(KeyModifiers::CONTROL) => app.clear_prompt(),
        KeyCode::Backspace => app.pop_char(),
        KeyCode::Enter => start_generation(app, event_tx),
        KeyCode::Char(c) if !modifiers.contains(KeyModifiers::CONTROL) => app.push_char(c),
        _ => {}
    }
}

fn start_generation(app: &mut App, event_tx: &mpsc::UnboundedSender<AppEvent>) {
    // The controller refuses while a request is outstanding
    let Some(submission) = app.begin_generation() else {
        return;
    };

    let tx = event_tx.clone();
    tokio::spawn(async move {
        let id = submission.id();
        let result = submission.run().await;
        let _ = tx.send(AppEvent::GenerationSettled { id, result });
    });
}

fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    event_tx: &mpsc::UnboundedSender<AppEvent>,
    event_rx: &mut mpsc::UnboundedReceiver<AppEvent>,
) -> Result<()> {
    loop {
        terminal.draw(|f| ui::render(f, app))?;

        while let Ok(app_event) = event_rx.try_recv() {
            handle_app_event(app, app_event);
        }

        if event::poll(Duration::from_millis(16))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press
                    && !handle_popup_keys(app, key.code, key.modifiers)
                {
                    handle_keyboard_input(app, key.code, key.modifiers, event_tx);
                }
            }
        }

        if app.should_quit {
            break;
        }
    }
    Ok(())
}
