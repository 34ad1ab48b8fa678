use chrono::NaiveDate;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "rollcall")]
#[command(version)]
#[command(about = "Terminal client for QR-based class attendance sessions")]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub(crate) command: Commands,

    /// Backend API base URL (overrides the config file)
    #[arg(long)]
    pub(crate) api_url: Option<String>,

    /// Verbose logging to stderr
    #[arg(short, long)]
    pub(crate) verbose: bool,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Open an attendance session and monitor check-ins (lecturer)
    Host {
        /// Class identifier
        #[arg(short, long)]
        class: String,

        /// Attendance date (YYYY-MM-DD); today when omitted
        #[arg(short, long)]
        date: Option<NaiveDate>,

        /// Session validity in minutes (5-60)
        #[arg(short, long)]
        minutes: Option<u32>,
    },
    /// Scan a session QR code with the camera (student)
    Scan,
    /// Type a session token instead of scanning (student fallback)
    Enter {
        /// Session token; prompted for when omitted
        token: Option<String>,
    },
    /// Print the check-in log for a session
    Logs {
        /// Session identifier
        session_id: String,
    },
    /// Interactive setup wizard
    Init,
}
