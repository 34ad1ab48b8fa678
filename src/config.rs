use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub camera: CameraConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the attendance backend, without a trailing slash.
    pub base_url: String,
    /// Environment variable holding the bearer token for backend calls.
    #[serde(default = "default_token_env")]
    pub token_env: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Session validity requested when --minutes is not given (5-60).
    #[serde(default = "default_validity_minutes")]
    pub default_validity_minutes: u32,
    /// Countdown repaint interval for the host dashboard (ms).
    #[serde(default = "default_countdown_tick_ms")]
    pub countdown_tick_ms: u64,
    /// Scan-log poll period (seconds).
    #[serde(default = "default_log_poll_secs")]
    pub log_poll_secs: u64,
    /// Upper bound for the random jitter added to the poll period (ms).
    #[serde(default = "default_log_poll_jitter_ms")]
    pub log_poll_jitter_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraConfig {
    /// Command that writes one camera frame as an encoded image to stdout.
    #[serde(default = "default_grab_command")]
    pub grab_command: String,
    /// Frame sampling interval for the capture loop (ms).
    #[serde(default = "default_frame_interval_ms")]
    pub frame_interval_ms: u64,
}

fn default_token_env() -> String {
    "ROLLCALL_TOKEN".to_string()
}

fn default_validity_minutes() -> u32 {
    15
}

fn default_countdown_tick_ms() -> u64 {
    1000
}

fn default_log_poll_secs() -> u64 {
    5
}

fn default_log_poll_jitter_ms() -> u64 {
    500
}

fn default_grab_command() -> String {
    // One still frame from the default V4L2 device, PNG on stdout.
    "ffmpeg -loglevel error -f video4linux2 -video_size 1280x720 -i /dev/video0 \
     -frames:v 1 -f image2pipe -vcodec png -"
        .to_string()
}

fn default_frame_interval_ms() -> u64 {
    300
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000/api".to_string(),
            token_env: default_token_env(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_validity_minutes: default_validity_minutes(),
            countdown_tick_ms: default_countdown_tick_ms(),
            log_poll_secs: default_log_poll_secs(),
            log_poll_jitter_ms: default_log_poll_jitter_ms(),
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            grab_command: default_grab_command(),
            frame_interval_ms: default_frame_interval_ms(),
        }
    }
}

impl SessionConfig {
    pub fn countdown_tick(&self) -> Duration {
        Duration::from_millis(self.countdown_tick_ms)
    }

    /// Poll period with its jitter applied once, at timer creation.
    pub fn log_poll_period(&self) -> Duration {
        let jitter = if self.log_poll_jitter_ms == 0 {
            0
        } else {
            use rand::Rng;
            rand::thread_rng().gen_range(0..self.log_poll_jitter_ms)
        };
        Duration::from_secs(self.log_poll_secs) + Duration::from_millis(jitter)
    }
}

impl CameraConfig {
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }
}

impl Config {
    /// Return the path to the configuration file.
    pub fn config_path() -> PathBuf {
        directories::ProjectDirs::from("com", "rollcall", "rollcall")
            .map(|dirs| dirs.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."))
            .join("config.toml")
    }

    /// Load config from file, creating default if missing or corrupt.
    pub fn load() -> Result<Self> {
        let path = Self::config_path();

        if path.exists() {
            let data = fs::read_to_string(&path)?;
            match toml::from_str::<Config>(&data) {
                Ok(config) => Ok(config),
                Err(e) => {
                    eprintln!(
                        "Warning: Failed to parse config at {}: {}",
                        path.display(),
                        e
                    );
                    eprintln!("Using default configuration.");
                    Ok(Config::default())
                }
            }
        } else {
            Ok(Config::default())
        }
    }

    /// Save config to file.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let data = toml::to_string_pretty(self)?;
        fs::write(&path, data)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_protocol_constants() {
        let config = Config::default();
        assert_eq!(config.session.countdown_tick_ms, 1000);
        assert_eq!(config.session.log_poll_secs, 5);
        assert_eq!(config.camera.frame_interval_ms, 300);
        assert!((5..=60).contains(&config.session.default_validity_minutes));
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [api]
            base_url = "https://attendance.example.edu/api"
            "#,
        )
        .unwrap();

        assert_eq!(config.api.base_url, "https://attendance.example.edu/api");
        assert_eq!(config.api.token_env, "ROLLCALL_TOKEN");
        assert_eq!(config.camera.frame_interval_ms, 300);
    }

    #[test]
    fn test_poll_period_stays_within_jitter_bound() {
        let session = SessionConfig {
            log_poll_secs: 5,
            log_poll_jitter_ms: 500,
            ..SessionConfig::default()
        };

        for _ in 0..20 {
            let period = session.log_poll_period();
            assert!(period >= Duration::from_secs(5));
            assert!(period < Duration::from_millis(5500));
        }
    }

    #[test]
    fn test_zero_jitter_is_exact_period() {
        let session = SessionConfig {
            log_poll_secs: 5,
            log_poll_jitter_ms: 0,
            ..SessionConfig::default()
        };
        assert_eq!(session.log_poll_period(), Duration::from_secs(5));
    }
}
