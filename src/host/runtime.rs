use std::io;
use std::thread;

use anyhow::{anyhow, Result};
use chrono::{NaiveDate, Utc};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use super::{ui, HostApp};
use crate::config::Config;
use crate::gateway::Gateway;
use crate::session::SessionController;

pub async fn run_host<G: Gateway>(
    gateway: G,
    config: &Config,
    class_id: &str,
    attendance_date: NaiveDate,
    validity_minutes: u32,
) -> Result<()> {
    let mut controller = SessionController::new(gateway);

    println!("Opening attendance session for {class_id} on {attendance_date}...");
    controller
        .generate_session(class_id, attendance_date, validity_minutes)
        .await
        .map_err(|e| anyhow!("could not open session: {e}"))?;

    let mut app = HostApp::new(controller);

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, &mut app, config).await;

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Some(note) = &app.closing_note {
        println!("{note}");
    }

    res
}

/// Background thread that polls for key events.
fn input_worker(tx: mpsc::Sender<KeyEvent>) {
    loop {
        if event::poll(std::time::Duration::from_millis(50)).unwrap_or(false) {
            if let Ok(Event::Key(key)) = event::read() {
                if tx.blocking_send(key).is_err() {
                    break;
                }
            }
        } else if tx.is_closed() {
            break;
        }
    }
}

async fn run_app<B: ratatui::backend::Backend, G: Gateway>(
    terminal: &mut Terminal<B>,
    app: &mut HostApp<G>,
    config: &Config,
) -> Result<()> {
    let (key_tx, mut key_rx) = mpsc::channel::<KeyEvent>(64);
    thread::spawn(move || input_worker(key_tx));

    // Both session timers live in this scope, so every exit path below
    // drops them together.
    let mut countdown = tokio::time::interval(config.session.countdown_tick());
    countdown.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut log_poll = tokio::time::interval(config.session.log_poll_period());
    log_poll.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        terminal.draw(|f| ui::draw(f, app))?;

        tokio::select! {
            _ = countdown.tick() => {
                app.controller.tick(Utc::now());
            }
            // The poll stops within one tick of the session ending.
            _ = log_poll.tick(), if app.controller.is_active() => {
                app.controller.refresh_scan_log().await;
            }
            key = key_rx.recv() => {
                match key {
                    Some(key) => handle_key(app, key).await,
                    None => break,
                }
            }
        }

        if app.should_quit {
            break;
        }
    }

    Ok(())
}

async fn handle_key<G: Gateway>(app: &mut HostApp<G>, key: KeyEvent) {
    if key.kind != KeyEventKind::Press {
        return;
    }

    // Confirmation popup blocks other input.
    if app.confirm_deactivate {
        match key.code {
            KeyCode::Char('y') | KeyCode::Enter => {
                app.confirm_deactivate = false;
                deactivate(app).await;
            }
            _ => app.confirm_deactivate = false,
        }
        return;
    }

    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => {
            if app.controller.is_active() {
                app.closing_note =
                    Some("Dashboard closed; the session is still open on the backend.".to_string());
            }
            app.should_quit = true;
        }
        KeyCode::Char('d') => {
            if app.controller.session().is_some() {
                app.confirm_deactivate = true;
            }
        }
        KeyCode::Char('r') => {
            app.controller.refresh_scan_log().await;
        }
        _ => {}
    }
}

async fn deactivate<G: Gateway>(app: &mut HostApp<G>) {
    let checked_in = app.controller.scan_log().len();

    match app.controller.deactivate().await {
        Ok(()) => {
            app.closing_note = Some(format!(
                "Session deactivated with {checked_in} check-in(s)."
            ));
            app.should_quit = true;
        }
        Err(err) => {
            // Session is presumed still active; keep the dashboard up.
            app.status_message = Some(format!("Deactivate failed: {err}"));
        }
    }
}
