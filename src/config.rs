use anyhow::Result;
use clap::Parser;
use serde::Deserialize;
use serde_yaml;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "bootcamp")]
#[command(about = "Runs the bootcamp REST service", long_about = None)]
pub struct Cli {
    #[arg(short = 'c', long = "config")]
    pub config_path: Option<String>,

    /// Wipe the library and todo tables and load the demo rows
    #[arg(long)]
    pub seed: bool,
}

pub fn default_config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".bootcamp")
}

pub fn default_config_path() -> PathBuf {
    default_config_dir().join("config.yaml")
}

#[derive(Debug, Deserialize, Clone)]
pub struct App {
    #[serde(default = "default_database")]
    database: String,
    #[serde(default = "default_port")]
    port: u16,
    #[serde(default)]
    pub products_file: Option<String>,
}

fn default_database() -> String {
    "bootcamp.db".to_string()
}

fn default_port() -> u16 {
    3000
}

impl Default for App {
    fn default() -> Self {
        App {
            database: default_database(),
            port: default_port(),
            products_file: None,
        }
    }
}

impl App {
    pub fn get_db(&self) -> &str {
        &self.database
    }

    pub fn get_port(&self) -> u16 {
        self.port
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RateLimit {
    #[serde(default = "default_window_ms")]
    pub window_ms: u64,
    #[serde(default = "default_max_requests")]
    pub max_requests: usize,
}

fn default_window_ms() -> u64 {
    env::var("RATE_LIMIT_WINDOW")
        .ok()
        .and_then(|v| parse_positive(&v))
        .unwrap_or(900_000)
}

fn default_max_requests() -> usize {
    env::var("RATE_LIMIT_MAX")
        .ok()
        .and_then(|v| parse_positive(&v))
        .unwrap_or(100)
}

/// Zero would switch the limiter off, so it counts as unset.
fn parse_positive<T: FromStr + Default + PartialOrd>(raw: &str) -> Option<T> {
    raw.trim().parse().ok().filter(|v| *v > T::default())
}

impl Default for RateLimit {
    fn default() -> Self {
        RateLimit {
            window_ms: default_window_ms(),
            max_requests: default_max_requests(),
        }
    }
}

impl RateLimit {
    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }

    fn or_defaults(mut self) -> Self {
        if self.window_ms == 0 {
            tracing::warn!("rate_limit.window_ms is 0, using the default");
            self.window_ms = default_window_ms();
        }
        if self.max_requests == 0 {
            tracing::warn!("rate_limit.max_requests is 0, using the default");
            self.max_requests = default_max_requests();
        }
        self
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Tasks {
    #[serde(default = "default_tasks_file")]
    pub data_file: String,
}

fn default_tasks_file() -> String {
    "data/tasks.json".to_string()
}

impl Default for Tasks {
    fn default() -> Self {
        Tasks {
            data_file: default_tasks_file(),
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    #[serde(default)]
    pub app: App,
    #[serde(default)]
    pub rate_limit: RateLimit,
    #[serde(default)]
    pub tasks: Tasks,
}

impl Config {
    pub fn new(path: &str) -> Result<Self> {
        let cfg = Config::load_config(path)?;
        Ok(cfg)
    }

    /// Loads the config at `path`, or the defaults when no file exists there.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::info!(path = ?path, "no config file found, using defaults");
            return Ok(Config::default());
        }
        Config::new(&path.to_string_lossy())
    }

    fn load_config(path: &str) -> Result<Config> {
        let yaml_str = fs::read_to_string(path)?;
        Config::from_yaml(&yaml_str)
    }

    pub fn from_yaml(yaml_str: &str) -> Result<Config> {
        let yaml_with_env = Config::substitute_env_vars(yaml_str)?;
        let mut config: Config = serde_yaml::from_str(&yaml_with_env)?;
        config.rate_limit = config.rate_limit.or_defaults();
        Ok(config)
    }

    fn substitute_env_vars(yaml_str: &str) -> Result<String> {
        let mut result = yaml_str.to_string();
        let mut offset = 0;

        while let Some(start) = result[offset..].find("${") {
            let actual_start = offset + start;
            if let Some(end) = result[actual_start..].find("}") {
                let var_name = &result[actual_start + 2..actual_start + end];

                // ${VAR:-default}
                let env_value = if let Some(default_start) = var_name.find(":-") {
                    let actual_var = &var_name[..default_start];
                    let default_val = &var_name[default_start + 2..];
                    env::var(actual_var).unwrap_or_else(|_| default_val.to_string())
                } else {
                    env::var(var_name).unwrap_or_else(|_| {
                        tracing::warn!(var = var_name, "environment variable not found");
                        String::new()
                    })
                };

                result.replace_range(actual_start..actual_start + end + 1, &env_value);
                offset = actual_start + env_value.len();
            } else {
                break;
            }
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_defaults_for_unset_vars() {
        let out = Config::substitute_env_vars("port: ${BOOTCAMP_TEST_UNSET_PORT:-4100}").unwrap();
        assert_eq!(out, "port: 4100");
    }

    #[test]
    fn parses_partial_yaml_with_defaults() {
        let cfg = Config::from_yaml(
            r#"
app:
  port: ${BOOTCAMP_TEST_UNSET_PORT2:-8081}
rate_limit:
  max_requests: 5
"#,
        )
        .unwrap();

        assert_eq!(cfg.app.get_port(), 8081);
        assert_eq!(cfg.app.get_db(), "bootcamp.db");
        assert_eq!(cfg.rate_limit.max_requests, 5);
        assert_eq!(cfg.tasks.data_file, "data/tasks.json");
    }

    #[test]
    fn zero_rate_limits_fall_back_to_defaults() {
        assert_eq!(parse_positive::<u64>("0"), None);
        assert_eq!(parse_positive::<u64>(" 500 "), Some(500));
        assert_eq!(parse_positive::<usize>("-3"), None);

        let cfg = Config::from_yaml(
            r#"
rate_limit:
  window_ms: ${BOOTCAMP_TEST_UNSET_WINDOW:-0}
  max_requests: 0
"#,
        )
        .unwrap();
        assert!(cfg.rate_limit.window_ms > 0);
        assert!(cfg.rate_limit.max_requests > 0);
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = Config::load_or_default(&dir.path().join("absent.yaml")).unwrap();
        assert_eq!(cfg.app.get_port(), 3000);
    }
}
