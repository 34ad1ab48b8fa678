use anyhow::Result;
use dialoguer::{theme::ColorfulTheme, Confirm, Input, Select};

use crate::config::Config;

/// Interactive setup wizard for new users
pub async fn run_init() -> Result<()> {
    let theme = ColorfulTheme::default();

    println!("\nrollcall setup\n");

    // Check if config already exists
    let config_path = Config::config_path();
    if config_path.exists() {
        let overwrite = Confirm::with_theme(&theme)
            .with_prompt("Config file already exists. Overwrite?")
            .default(false)
            .interact()?;

        if !overwrite {
            println!("Setup cancelled.");
            return Ok(());
        }
    }

    let mut config = Config::default();

    // Step 1: Backend
    config.api.base_url = Input::with_theme(&theme)
        .with_prompt("Backend API base URL")
        .default(config.api.base_url.clone())
        .interact_text()?;
    config.api.base_url = config.api.base_url.trim_end_matches('/').to_string();

    config.api.token_env = Input::with_theme(&theme)
        .with_prompt("Environment variable holding your login token")
        .default(config.api.token_env.clone())
        .interact_text()?;

    if std::env::var(&config.api.token_env).is_err() {
        println!(
            "⚠ {} is not set in this shell; backend calls will go out unauthenticated.",
            config.api.token_env
        );
    }

    // Step 2: Reachability check
    println!("\nChecking backend...");
    match reqwest::get(&config.api.base_url).await {
        Ok(response) => println!("✓ Backend answered with HTTP {}", response.status().as_u16()),
        Err(e) => {
            println!("⚠ Could not reach backend: {}", e);
            println!("  You can fix the URL later in {}", config_path.display());
        }
    }

    // Step 3: Camera capture command
    let capture_options = vec![
        "ffmpeg with a V4L2 webcam (recommended)",
        "libcamera-still (Raspberry Pi)",
        "Custom command",
        "No camera here - manual entry only",
    ];

    let capture_idx = Select::with_theme(&theme)
        .with_prompt("\nHow should frames be captured?")
        .items(&capture_options)
        .default(0)
        .interact()?;

    match capture_idx {
        0 => {} // keep the default grab command
        1 => {
            config.camera.grab_command =
                "libcamera-still --nopreview --immediate --encoding png --output -".to_string();
        }
        2 => {
            config.camera.grab_command = Input::with_theme(&theme)
                .with_prompt("Command that writes one encoded frame to stdout")
                .default(config.camera.grab_command.clone())
                .interact_text()?;
        }
        _ => {
            // Scanning still works elsewhere; `scan` offers manual entry
            // when the device is missing.
        }
    }

    // Save config
    config.save()?;
    println!("\n✓ Config saved to {}", config_path.display());

    println!("\nSetup complete!");
    println!("  Lecturers: rollcall host --class <id>");
    println!("  Students:  rollcall scan   (or: rollcall enter <token>)\n");

    Ok(())
}
