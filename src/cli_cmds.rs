//! Student-side and one-shot commands.

use anyhow::{anyhow, Result};
use chrono::Local;
use dialoguer::{theme::ColorfulTheme, Confirm, Input};

use crate::capture::{CaptureEngine, CommandFrameSource};
use crate::config::Config;
use crate::gateway::{Gateway, HttpGateway};
use crate::manual;
use crate::verify::{AttemptOutcome, ScanAttempt, ScanError};

/// Camera scan: drive the capture loop until one attempt finishes. A
/// missing or refused camera drops through to manual entry.
pub async fn cmd_scan(config: &Config) -> Result<()> {
    let gateway = HttpGateway::new(&config.api);
    let mut engine = CaptureEngine::new(gateway, config.camera.frame_interval());

    let source = match CommandFrameSource::from_command(&config.camera.grab_command) {
        Ok(source) => source,
        Err(err) => return redirect_to_manual(config, err).await,
    };

    println!("Point the camera at the session QR code (Ctrl+C to cancel)...");

    let outcome = tokio::select! {
        res = engine.run_to_completion(source) => Some(res),
        _ = tokio::signal::ctrl_c() => None,
    };

    match outcome {
        None => {
            engine.stop();
            tracing::debug!(state = ?engine.state(), "scan cancelled");
            println!("Scan cancelled.");
            Ok(())
        }
        Some(Ok(attempt)) => report_attempt(&attempt),
        Some(Err(err @ ScanError::CameraUnavailable(_))) => redirect_to_manual(config, err).await,
        Some(Err(err)) => Err(anyhow!(err)),
    }
}

async fn redirect_to_manual(config: &Config, err: ScanError) -> Result<()> {
    println!("⚠ {err}");

    let fallback = Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt("Switch to manual code entry?")
        .default(true)
        .interact()?;

    if fallback {
        cmd_enter(config, None).await
    } else {
        Err(anyhow!(err))
    }
}

/// Manual entry: same verification pipeline, typed token.
pub async fn cmd_enter(config: &Config, token: Option<String>) -> Result<()> {
    let token = match token {
        Some(token) => token,
        None => Input::with_theme(&ColorfulTheme::default())
            .with_prompt("Session token")
            .interact_text()?,
    };

    let gateway = HttpGateway::new(&config.api);
    let attempt = manual::submit(&gateway, &token).await;
    report_attempt(&attempt)
}

fn report_attempt(attempt: &ScanAttempt) -> Result<()> {
    if let Some(info) = &attempt.session {
        println!("Session: {} {}", info.course_code, info.class_code);
    }

    match (&attempt.outcome, &attempt.error) {
        (AttemptOutcome::Scanned, _) => {
            match &attempt.confirmation {
                Some(confirmation) => println!(
                    "✓ Attendance recorded for {} ({})",
                    confirmation.attendance_date, confirmation.status
                ),
                None => println!("✓ Attendance recorded"),
            }
            Ok(())
        }
        (_, Some(err)) => Err(anyhow!("{err}")),
        _ => Err(anyhow!("scan attempt did not complete")),
    }
}

/// One-shot scan-log fetch outside the live dashboard.
pub async fn cmd_logs(config: &Config, session_id: &str) -> Result<()> {
    let gateway = HttpGateway::new(&config.api);
    let entries = gateway
        .scan_logs(session_id)
        .await
        .map_err(|e| anyhow!("could not fetch scan log: {e}"))?;

    if entries.is_empty() {
        println!("No check-ins recorded.");
        return Ok(());
    }

    println!("{:<12} {:<24} {}", "Matric no", "Name", "Scan time");
    for entry in &entries {
        println!(
            "{:<12} {:<24} {}",
            entry.matric_no,
            entry.display_name(),
            entry
                .scan_time
                .with_timezone(&Local)
                .format("%Y-%m-%d %H:%M:%S")
        );
    }

    Ok(())
}
