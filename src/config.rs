//! Application-level configuration loading.

use std::{
    env, fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "TRIVIA_ROOMS_CONFIG_PATH";

const DEFAULT_SPEED_BONUS: u32 = 5;
const DEFAULT_QUESTION_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Clone, PartialEq, Eq)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    speed_bonus: u32,
    default_team_names: Vec<String>,
    question_timeout: Duration,
    questions_path: Option<PathBuf>,
}

impl AppConfig {
    /// Load the configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config = Self::from_raw(raw, path.parent());
                    info!(
                        path = %path.display(),
                        speed_bonus = app_config.speed_bonus,
                        teams = app_config.default_team_names.len(),
                        "loaded room configuration"
                    );
                    app_config
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
        }
    }

    /// Extra points for the fastest correct team when several teams answer correctly.
    pub fn speed_bonus(&self) -> u32 {
        self.speed_bonus
    }

    /// Team names used when the host starts a game without naming teams.
    pub fn default_team_names(&self) -> &[String] {
        &self.default_team_names
    }

    /// Upper bound on a single question store lookup.
    pub fn question_timeout(&self) -> Duration {
        self.question_timeout
    }

    /// Seed file for the in-memory question store.
    pub fn questions_path(&self) -> Option<&Path> {
        self.questions_path.as_deref()
    }

    pub fn with_speed_bonus(mut self, speed_bonus: u32) -> Self {
        self.speed_bonus = speed_bonus;
        self
    }

    pub fn with_question_timeout(mut self, timeout: Duration) -> Self {
        self.question_timeout = timeout;
        self
    }

    /// Relative `questions_path` entries are resolved against the config file's directory.
    fn from_raw(raw: RawConfig, base_dir: Option<&Path>) -> Self {
        let defaults = Self::default();

        let mut seen = Vec::new();
        let names = raw
            .default_team_names
            .into_iter()
            .map(|name| name.trim().to_owned())
            .filter(|name| !name.is_empty())
            .filter(|name| {
                let key = name.to_lowercase();
                let fresh = !seen.contains(&key);
                seen.push(key);
                fresh
            })
            .collect::<Vec<_>>();
        let default_team_names = if names.len() >= 2 {
            names
        } else {
            warn!(
                count = names.len(),
                "config needs at least two distinct default team names; using built-in names"
            );
            defaults.default_team_names
        };

        let questions_path = raw.questions_path.map(|path| match base_dir {
            Some(dir) if path.is_relative() => dir.join(path),
            _ => path,
        });

        Self {
            speed_bonus: raw.speed_bonus,
            default_team_names,
            question_timeout: Duration::from_millis(raw.question_timeout_ms.max(1)),
            questions_path,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            speed_bonus: DEFAULT_SPEED_BONUS,
            default_team_names: default_team_names(),
            question_timeout: Duration::from_millis(DEFAULT_QUESTION_TIMEOUT_MS),
            questions_path: None,
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    #[serde(default = "default_speed_bonus")]
    speed_bonus: u32,
    #[serde(default = "default_team_names")]
    default_team_names: Vec<String>,
    #[serde(default = "default_question_timeout_ms")]
    question_timeout_ms: u64,
    #[serde(default)]
    questions_path: Option<PathBuf>,
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

fn default_speed_bonus() -> u32 {
    DEFAULT_SPEED_BONUS
}

fn default_question_timeout_ms() -> u64 {
    DEFAULT_QUESTION_TIMEOUT_MS
}

fn default_team_names() -> Vec<String> {
    vec!["Red".to_owned(), "Blue".to_owned()]
}
