use std::{
    collections::BTreeMap,
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

use lerobot_gui_client::{config::BackendConfig, models::Mode};

use crate::{Result, feed::RowMatching};

const CONFIG_DIR: &str = ".lerobot-panel";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all(deserialize = "kebab-case"))]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub panel: PanelConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all(deserialize = "kebab-case"))]
pub struct PanelConfig {
    /// Lines kept by log panels; `0` keeps everything.
    #[serde(default = "default_log_capacity")]
    pub log_capacity: usize,
    #[serde(default)]
    pub row_matching: RowMatching,
    #[serde(default, with = "humantime_serde")]
    pub directory_check_debounce: Duration,
    /// Form action overrides keyed by mode (`teleop`, `record`, `eval`, `hg_dagger`).
    #[serde(default)]
    pub form_actions: BTreeMap<Mode, String>,
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            log_capacity: default_log_capacity(),
            row_matching: RowMatching::default(),
            directory_check_debounce: Duration::ZERO,
            form_actions: BTreeMap::new(),
        }
    }
}

impl PanelConfig {
    /// Log panel bound, `None` when unbounded.
    pub fn log_limit(&self) -> Option<usize> {
        (self.log_capacity > 0).then_some(self.log_capacity)
    }
}

fn default_log_capacity() -> usize {
    10_000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all(deserialize = "kebab-case"))]
pub struct LoggingConfig {
    #[serde(default = "default_ansi")]
    pub ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            ansi: default_ansi(),
        }
    }
}

fn default_ansi() -> bool {
    true
}

#[derive(clap::Args, Debug)]
pub struct Args<T: serde::de::DeserializeOwned + Clone + Send + Sync + 'static> {
    #[arg(short, long, env = "LEROBOT_PANEL_CONFIG", value_parser = toml_from_file::<T>)]
    pub config: Option<T>,
    /// Backend base URL, overriding the config file.
    #[arg(short, long, env = "LEROBOT_BACKEND")]
    pub backend: Option<Url>,
}

impl Args<Config> {
    /// Explicit `--config`, else the default path if it exists, else defaults.
    pub fn get_config(&self) -> Result<Config> {
        let mut config = if let Some(config) = &self.config {
            config.clone()
        } else {
            let default_path = default_config_path();
            if Path::new(&default_path).exists() {
                toml_from_file(&default_path)?
            } else {
                debug!(path = %default_path, "No config file, using defaults");
                Config::default()
            }
        };

        if let Some(backend) = &self.backend {
            config.backend.address = backend.clone();
        }

        Ok(config)
    }
}

pub fn default_config_path() -> String {
    if let Ok(home_dir) = std::env::var("HOME") {
        format!("{home_dir}/{CONFIG_DIR}/config.toml")
    } else {
        "config.toml".to_string()
    }
}

pub fn toml_from_file<T: serde::de::DeserializeOwned>(path: &str) -> Result<T> {
    let toml = std::fs::read_to_string(path)?;
    toml_from_str(&toml)
}

pub fn toml_from_str<T: serde::de::DeserializeOwned>(toml: &str) -> Result<T> {
    let config_json: serde_json::Value = toml::from_str(toml)?;
    let config = serde_json::from_value(config_json)?;
    Ok(config)
}

/// Walks the user through writing a config file unless one already exists.
pub fn check_and_create_config() -> Result<PathBuf> {
    let home_dir = std::env::var("HOME").map_err(|_| {
        std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "HOME environment variable not set",
        )
    })?;

    let config_dir = Path::new(&home_dir).join(CONFIG_DIR);
    let config_path = config_dir.join("config.toml");

    if !config_path.exists() {
        info!("Configuration file not found. Setting up initial configuration...");

        fs::create_dir_all(&config_dir).map_err(|e| {
            std::io::Error::new(e.kind(), format!("Failed to create config directory: {e}"))
        })?;

        let config_content = prompt_for_config()?;
        fs::write(&config_path, config_content).map_err(|e| {
            std::io::Error::new(e.kind(), format!("Failed to write config file: {e}"))
        })?;

        info!("Configuration file created at: {}", config_path.display());
    }

    Ok(config_path)
}

fn prompt_for_config() -> Result<String> {
    println!("Welcome to the LeRobot control panel setup!");
    println!("Press Enter to use default values shown in brackets.\n");

    let address = prompt_with_default("Backend address", "http://localhost:8000")?;
    let request_timeout = prompt_with_default("Request timeout (e.g., 10s, 1m)", "10s")?;
    let log_capacity = prompt_with_default("Log lines to keep (0 keeps all)", "10000")?;
    let row_matching =
        prompt_with_default("State table row matching (positional/by-joint/rebuild)", "positional")?;
    let debounce = prompt_with_default("Directory check debounce (e.g., 0s, 300ms)", "0s")?;

    Ok(render_config(
        &address,
        &request_timeout,
        &log_capacity,
        &row_matching,
        &debounce,
    ))
}

fn render_config(
    address: &str,
    request_timeout: &str,
    log_capacity: &str,
    row_matching: &str,
    debounce: &str,
) -> String {
    format!(
        r#"[backend]
address = "{address}"
request-timeout = "{request_timeout}"
accept-invalid-certs = false

[panel]
log-capacity = {log_capacity}
row-matching = "{row_matching}"
directory-check-debounce = "{debounce}"

[panel.form-actions]
# hg_dagger = "/robot/hg-dagger/config-update"

[logging]
ansi = true
"#
    )
}

fn prompt_with_default(prompt: &str, default: &str) -> Result<String> {
    print!("{prompt} [{default}]: ");
    io::stdout()
        .flush()
        .map_err(|e| std::io::Error::new(e.kind(), format!("Failed to flush stdout: {e}")))?;

    let mut input = String::new();
    io::stdin()
        .read_line(&mut input)
        .map_err(|e| std::io::Error::new(e.kind(), format!("Failed to read input: {e}")))?;

    let input = input.trim();
    if input.is_empty() {
        Ok(default.to_string())
    } else {
        Ok(input.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: Config = toml_from_str("").expect("empty config");
        assert_eq!(config.backend.address.as_str(), "http://localhost:8000/");
        assert_eq!(config.backend.request_timeout, Duration::from_secs(10));
        assert_eq!(config.panel.row_matching, RowMatching::Positional);
        assert_eq!(config.panel.directory_check_debounce, Duration::ZERO);
        assert_eq!(config.panel.log_limit(), Some(10_000));
        assert!(config.logging.ansi);
    }

    #[test]
    fn test_zero_log_capacity_is_unbounded() {
        let config: Config = toml_from_str("[panel]\nlog-capacity = 0\n").expect("config");
        assert_eq!(config.panel.log_capacity, 0);
        assert_eq!(config.panel.log_limit(), None);
    }

    #[test]
    fn test_rendered_defaults_parse_back() {
        let rendered = render_config("http://robot:9000", "3s", "500", "by-joint", "250ms");
        let config: Config = toml_from_str(&rendered).expect("rendered config");

        assert_eq!(config.backend.address.as_str(), "http://robot:9000/");
        assert_eq!(config.backend.request_timeout, Duration::from_secs(3));
        assert_eq!(config.panel.log_limit(), Some(500));
        assert_eq!(config.panel.row_matching, RowMatching::ByJoint);
        assert_eq!(
            config.panel.directory_check_debounce,
            Duration::from_millis(250)
        );
        assert!(config.panel.form_actions.is_empty());
    }

    #[test]
    fn test_form_action_overrides() {
        let config: Config = toml_from_str(
            r#"
            [panel.form-actions]
            hg_dagger = "/custom/hg-dagger"
            "#,
        )
        .expect("config");

        assert_eq!(
            config.panel.form_actions.get(&Mode::HgDagger).map(String::as_str),
            Some("/custom/hg-dagger")
        );
    }

    #[test]
    fn test_config_file_and_backend_override() {
        let file = tempfile::NamedTempFile::new().expect("temp file");
        fs::write(
            file.path(),
            "[backend]\naddress = \"http://10.0.0.5:8000\"\n",
        )
        .expect("write");

        let path = file.path().to_string_lossy().to_string();
        let config: Config = toml_from_file(&path).expect("config from file");
        assert_eq!(config.backend.address.as_str(), "http://10.0.0.5:8000/");

        let args = Args {
            config: Some(config),
            backend: Some("http://127.0.0.1:9999".parse().expect("url")),
        };
        let config = args.get_config().expect("config");
        assert_eq!(config.backend.address.as_str(), "http://127.0.0.1:9999/");
    }
}
