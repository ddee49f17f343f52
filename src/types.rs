use std::sync::Arc;
use std::time::Duration;

use image::RgbaImage;
use serde::{Deserialize, Serialize};

/// Payload of `GET /v1/me/player`.
///
/// Only the fields the display needs are modelled. Everything is optional
/// because the API omits or nulls fields for ads, episodes and local files;
/// the snapshot builder decides which ones are required.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CurrentPlayback {
    pub is_playing: Option<bool>,
    pub progress_ms: Option<u64>,
    pub item: Option<Track>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Track {
    pub name: Option<String>,
    #[serde(default)]
    pub artists: Vec<Artist>,
    pub album: Option<Album>,
    pub duration_ms: Option<u64>,
    pub track_number: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Artist {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Album {
    pub name: Option<String>,
    #[serde(default)]
    pub images: Vec<AlbumImage>,
    pub total_tracks: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlbumImage {
    pub url: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// Render-ready view of what is currently playing.
#[derive(Debug, Clone)]
pub struct PlaybackSnapshot {
    pub artist: String,
    pub track_name: String,
    pub album: String,
    pub album_art_url: Option<String>,
    /// Decoded art, shared with the art cache. `None` when the track has no
    /// art or the download failed.
    pub album_art: Option<Arc<RgbaImage>>,
    pub progress: Duration,
    pub duration: Duration,
    pub track_number: u32,
    pub total_tracks: u32,
}

impl PlaybackSnapshot {
    /// Position within the track as a percentage in `0.0..=100.0`.
    ///
    /// The API does not guarantee `progress <= duration`, and reports a zero
    /// duration for some items, so the value is clamped and a zero duration
    /// reads as 0%.
    pub fn progress_percent(&self) -> f32 {
        let total = self.duration.as_millis();
        if total == 0 {
            return 0.0;
        }
        let percent = self.progress.as_millis() as f64 / total as f64 * 100.0;
        percent.clamp(0.0, 100.0) as f32
    }
}
