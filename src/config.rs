use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

pub const APP_NAME: &str = "spotiscreen";

/// User settings, stored as JSON in the app's config directory.
///
/// Missing fields fall back to their defaults and unknown fields are
/// ignored. A file that cannot be parsed is replaced by defaults entirely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub client_id: String,
    pub redirect_uri: String,
    pub font: String,
    pub brightness: i64,
    pub simulated: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            redirect_uri: String::new(),
            font: "DejaVuSans.ttf".to_string(),
            brightness: 25,
            simulated: false,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Self {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("No config file found, creating one in {}", path.display());
                return Self::default();
            }
            Err(e) => {
                log::error!("Error loading config, falling back to defaults: {}", e);
                return Self::default();
            }
        };

        match serde_json::from_str(&contents) {
            Ok(config) => config,
            Err(e) => {
                log::error!("Error loading config, falling back to defaults: {}", e);
                Self::default()
            }
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
    }

    /// Asks for the Spotify app details that are not configured yet.
    pub fn prompt_missing(&mut self, input: &mut impl BufRead, output: &mut impl Write) -> Result<()> {
        if self.client_id.is_empty() {
            self.client_id = ask(input, output, "Please enter your Spotify app's client ID: ")?;
        }
        if self.redirect_uri.is_empty() {
            self.redirect_uri = ask(
                input,
                output,
                "Please enter your Spotify app's redirect URI (used to authorize token.json): ",
            )?;
        }
        Ok(())
    }

    /// Brightness as a percentage. Stored values outside 0..=100 are clamped.
    pub fn brightness(&self) -> u8 {
        self.brightness.clamp(0, 100) as u8
    }
}

fn ask(input: &mut impl BufRead, output: &mut impl Write, question: &str) -> Result<String> {
    output.write_all(question.as_bytes())?;
    output.flush()?;
    let mut answer = String::new();
    input.read_line(&mut answer).context("Failed to read answer")?;
    Ok(answer.trim().to_string())
}

/// `$XDG_CONFIG_HOME/spotiscreen`, falling back to `~/.config/spotiscreen`.
pub fn config_dir() -> Result<PathBuf> {
    let base = match std::env::var_os("XDG_CONFIG_HOME").filter(|v| !v.is_empty()) {
        Some(dir) => PathBuf::from(dir),
        None => {
            let home = std::env::var_os("HOME").context("Neither XDG_CONFIG_HOME nor HOME is set")?;
            PathBuf::from(home).join(".config")
        }
    };
    Ok(base.join(APP_NAME))
}
