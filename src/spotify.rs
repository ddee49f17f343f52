//! Minimal Spotify Web API client: reads the cached OAuth token, refreshes
//! it when it is about to expire and queries the current playback.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::runner::PlaybackSource;
use crate::types::CurrentPlayback;

const PLAYER_URL: &str = "https://api.spotify.com/v1/me/player";
const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
const REFRESH_MARGIN_SECS: u64 = 60;
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("no token cache at {0}; authorize the app once to create it")]
    Missing(PathBuf),
    #[error("token cache at {0} is unreadable: {1}")]
    Corrupt(PathBuf, serde_json::Error),
    #[error("cached token has expired and carries no refresh token")]
    NoRefreshToken,
}

/// On-disk token cache, in the format written by common Spotify OAuth
/// helpers so an existing cache can be reused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub expires_in: u64,
    #[serde(default)]
    pub scope: Option<String>,
    /// Unix time in seconds.
    #[serde(default)]
    pub expires_at: u64,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl Token {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(TokenError::Missing(path.to_path_buf()).into());
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", path.display()));
            }
        };
        serde_json::from_str(&contents).map_err(|e| TokenError::Corrupt(path.to_path_buf(), e).into())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string(self).context("Failed to serialize token")?;
        std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))
    }

    /// True if the token expires within the refresh margin of `now`.
    pub fn needs_refresh(&self, now: u64) -> bool {
        self.expires_at <= now + REFRESH_MARGIN_SECS
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    token_type: String,
    expires_in: u64,
    scope: Option<String>,
    refresh_token: Option<String>,
}

impl TokenResponse {
    /// Spotify only sometimes rotates the refresh token; keep the old one
    /// when it does not.
    fn into_token(self, previous_refresh: Option<String>, now: u64) -> Token {
        Token {
            access_token: self.access_token,
            token_type: self.token_type,
            expires_in: self.expires_in,
            scope: self.scope,
            expires_at: now + self.expires_in,
            refresh_token: self.refresh_token.or(previous_refresh),
        }
    }
}

pub struct SpotifyClient {
    http: Client,
    client_id: String,
    token_path: PathBuf,
    token: Token,
}

impl SpotifyClient {
    pub fn new(client_id: &str, token_path: PathBuf) -> Result<Self> {
        let token = Token::load(&token_path)?;
        let http = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            http,
            client_id: client_id.to_string(),
            token_path,
            token,
        })
    }

    fn refresh(&mut self) -> Result<()> {
        let refresh_token = self.token.refresh_token.clone().ok_or(TokenError::NoRefreshToken)?;
        log::info!("Refreshing Spotify access token");

        let response = self
            .http
            .post(TOKEN_URL)
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token.as_str()),
                ("client_id", self.client_id.as_str()),
            ])
            .send()
            .context("Token refresh request failed")?
            .error_for_status()
            .context("Token refresh rejected")?;
        let fresh: TokenResponse = response.json().context("Malformed token response")?;

        self.token = fresh.into_token(Some(refresh_token), unix_now());
        if let Err(e) = self.token.save(&self.token_path) {
            log::warn!("Could not persist refreshed token: {:#}", e);
        }
        Ok(())
    }

    fn query_player(&self) -> Result<reqwest::blocking::Response> {
        self.http
            .get(PLAYER_URL)
            .bearer_auth(&self.token.access_token)
            .send()
            .context("Playback request failed")
    }
}

impl PlaybackSource for SpotifyClient {
    fn current_playback(&mut self) -> Result<Option<CurrentPlayback>> {
        if self.token.needs_refresh(unix_now()) {
            self.refresh()?;
        }

        let mut response = self.query_player()?;
        if response.status() == StatusCode::UNAUTHORIZED {
            log::warn!("Access token rejected, refreshing");
            self.refresh()?;
            response = self.query_player()?;
        }
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }

        let body = response
            .error_for_status()
            .context("Playback request rejected")?
            .text()
            .context("Failed to read playback response")?;
        parse_playback(&body)
    }
}

/// An empty body means no active session, same as a 204.
fn parse_playback(body: &str) -> Result<Option<CurrentPlayback>> {
    if body.trim().is_empty() {
        return Ok(None);
    }
    let playback = serde_json::from_str(body).context("Malformed playback response")?;
    Ok(Some(playback))
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
