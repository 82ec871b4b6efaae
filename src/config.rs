//! Application-level configuration loading, including game pacing and rules.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "TECH_QUEST_BACK_CONFIG_PATH";
/// Environment variable that overrides the configured admin PIN.
const ADMIN_PIN_ENV: &str = "ADMIN_PIN";
/// Environment variable that overrides the configured question bank path.
const QUESTIONS_PATH_ENV: &str = "QUESTIONS_PATH";

/// Immutable runtime configuration shared across the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    admin_pin: String,
    questions_path: PathBuf,
    final_round: u32,
    speed_bonus_window_secs: u32,
    reveal_delay_secs: u64,
    advance_delay_secs: u64,
    leaderboard_broadcast_limit: Option<usize>,
}

impl AppConfig {
    /// Load the application configuration from disk, merging environment
    /// overrides and falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        let config = match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    info!(path = %path.display(), "loaded configuration file");
                    raw.into()
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        };

        config.with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        if let Ok(pin) = env::var(ADMIN_PIN_ENV) {
            if !pin.is_empty() {
                self.admin_pin = pin;
            }
        }
        if let Ok(path) = env::var(QUESTIONS_PATH_ENV) {
            if !path.is_empty() {
                self.questions_path = PathBuf::from(path);
            }
        }
        self
    }

    /// Shared secret required for admin operations.
    pub fn admin_pin(&self) -> &str {
        &self.admin_pin
    }

    /// Location of the JSON question bank.
    pub fn questions_path(&self) -> &PathBuf {
        &self.questions_path
    }

    /// Number of the last round; the qualification cutoff is waived there.
    pub fn final_round(&self) -> u32 {
        self.final_round
    }

    /// Round-1 speed bonus window: answers within this many seconds of the
    /// question opening earn the extra point.
    pub fn speed_bonus_window_secs(&self) -> u32 {
        self.speed_bonus_window_secs
    }

    /// Delay between grading and the leaderboard reveal broadcast.
    pub fn reveal_delay(&self) -> Duration {
        Duration::from_secs(self.reveal_delay_secs)
    }

    /// Delay between grading and loading the next question.
    pub fn advance_delay(&self) -> Duration {
        Duration::from_secs(self.advance_delay_secs)
    }

    /// Optional row cap applied to broadcast leaderboards; exports always
    /// carry the full snapshot.
    pub fn leaderboard_broadcast_limit(&self) -> Option<usize> {
        self.leaderboard_broadcast_limit
    }
}

#[cfg(test)]
impl AppConfig {
    /// Override the final-round number for engine tests.
    pub(crate) fn with_final_round(mut self, final_round: u32) -> Self {
        self.final_round = final_round;
        self
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            admin_pin: "labquiz".into(),
            questions_path: PathBuf::from("data/questions.json"),
            final_round: 3,
            speed_bonus_window_secs: 5,
            reveal_delay_secs: 3,
            advance_delay_secs: 8,
            leaderboard_broadcast_limit: None,
        }
    }
}

/// JSON representation of the configuration file.
#[derive(Debug, Deserialize)]
struct RawConfig {
    admin_pin: Option<String>,
    questions_path: Option<PathBuf>,
    final_round: Option<u32>,
    speed_bonus_window_secs: Option<u32>,
    reveal_delay_secs: Option<u64>,
    advance_delay_secs: Option<u64>,
    leaderboard_broadcast_limit: Option<usize>,
}

impl From<RawConfig> for AppConfig {
    fn from(raw: RawConfig) -> Self {
        let defaults = AppConfig::default();
        Self {
            admin_pin: raw.admin_pin.unwrap_or(defaults.admin_pin),
            questions_path: raw.questions_path.unwrap_or(defaults.questions_path),
            final_round: raw.final_round.unwrap_or(defaults.final_round),
            speed_bonus_window_secs: raw
                .speed_bonus_window_secs
                .unwrap_or(defaults.speed_bonus_window_secs),
            reveal_delay_secs: raw.reveal_delay_secs.unwrap_or(defaults.reveal_delay_secs),
            advance_delay_secs: raw
                .advance_delay_secs
                .unwrap_or(defaults.advance_delay_secs),
            leaderboard_broadcast_limit: raw
                .leaderboard_broadcast_limit
                .or(defaults.leaderboard_broadcast_limit),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_three_round_format() {
        let config = AppConfig::default();
        assert_eq!(config.final_round(), 3);
        assert_eq!(config.speed_bonus_window_secs(), 5);
        assert_eq!(config.reveal_delay(), Duration::from_secs(3));
        assert_eq!(config.advance_delay(), Duration::from_secs(8));
    }

    #[test]
    fn partial_raw_config_keeps_defaults_elsewhere() {
        let raw: RawConfig = serde_json::from_str(r#"{ "final_round": 2 }"#).unwrap();
        let config: AppConfig = raw.into();
        assert_eq!(config.final_round(), 2);
        assert_eq!(config.admin_pin(), "labquiz");
    }
}
