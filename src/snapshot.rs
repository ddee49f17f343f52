use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use image::RgbaImage;

use crate::cache::LruCache;
use crate::types::{CurrentPlayback, PlaybackSnapshot};

/// How many decoded album covers are kept around.
pub const ART_CACHE_CAPACITY: usize = 32;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SnapshotError {
    #[error("malformed playback response: missing {0}")]
    MalformedResponse(&'static str),
}

/// Downloads raw image bytes.
pub trait ImageFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// Plain HTTP GET, failing on non-2xx responses.
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client })
    }
}

impl ImageFetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .send()
            .with_context(|| format!("Failed to request {}", url))?
            .error_for_status()
            .with_context(|| format!("Bad response for {}", url))?;
        let bytes = response.bytes().context("Failed to read image body")?;
        Ok(bytes.to_vec())
    }
}

/// Turns playback responses into [`PlaybackSnapshot`]s, downloading album
/// art through a bounded cache so a track's cover is fetched once.
pub struct SnapshotBuilder<F: ImageFetcher> {
    fetcher: F,
    art: LruCache<String, Arc<RgbaImage>>,
}

impl<F: ImageFetcher> SnapshotBuilder<F> {
    pub fn new(fetcher: F) -> Self {
        Self {
            fetcher,
            art: LruCache::new(ART_CACHE_CAPACITY),
        }
    }

    /// Fails if a required field is missing. A missing or undownloadable
    /// cover is not an error; the snapshot just has no art.
    pub fn build(&mut self, playback: &CurrentPlayback) -> Result<PlaybackSnapshot, SnapshotError> {
        use SnapshotError::MalformedResponse;

        let item = playback.item.as_ref().ok_or(MalformedResponse("item"))?;
        let album = item.album.as_ref().ok_or(MalformedResponse("item.album"))?;

        let artist = item
            .artists
            .first()
            .and_then(|a| a.name.clone())
            .ok_or(MalformedResponse("item.artists[0].name"))?;
        let track_name = item.name.clone().ok_or(MalformedResponse("item.name"))?;
        let album_name = album.name.clone().ok_or(MalformedResponse("item.album.name"))?;
        let progress_ms = playback.progress_ms.ok_or(MalformedResponse("progress_ms"))?;
        let duration_ms = item.duration_ms.ok_or(MalformedResponse("item.duration_ms"))?;
        let track_number = item.track_number.ok_or(MalformedResponse("item.track_number"))?;
        let total_tracks = album
            .total_tracks
            .ok_or(MalformedResponse("item.album.total_tracks"))?;

        if duration_ms == 0 {
            log::warn!("Playback reports a zero duration for '{}'", track_name);
        }

        let album_art_url = album.images.first().map(|img| img.url.clone());
        let album_art = album_art_url.as_deref().and_then(|url| self.album_art(url));

        Ok(PlaybackSnapshot {
            artist,
            track_name,
            album: album_name,
            album_art_url,
            album_art,
            progress: Duration::from_millis(progress_ms),
            duration: Duration::from_millis(duration_ms),
            track_number,
            total_tracks,
        })
    }

    fn album_art(&mut self, url: &str) -> Option<Arc<RgbaImage>> {
        let key = url.to_string();
        if let Some(img) = self.art.get(&key) {
            return Some(Arc::clone(img));
        }

        match self.download(url) {
            Ok(img) => {
                let img = Arc::new(img);
                self.art.insert(key, Arc::clone(&img));
                Some(img)
            }
            Err(e) => {
                log::warn!("Error downloading album art: {:#}", e);
                None
            }
        }
    }

    fn download(&self, url: &str) -> Result<RgbaImage> {
        log::debug!("Downloading album art from {}", url);
        let bytes = self.fetcher.fetch(url)?;
        let img = image::load_from_memory(&bytes).context("Failed to decode album art")?;
        Ok(img.to_rgba8())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Album, AlbumImage, Artist, Track};
    use image::{ImageFormat, Rgba};
    use std::cell::Cell;
    use std::io::Cursor;

    struct CountingFetcher {
        calls: Cell<usize>,
        body: Option<Vec<u8>>,
    }

    impl CountingFetcher {
        fn serving(body: Vec<u8>) -> Self {
            Self {
                calls: Cell::new(0),
                body: Some(body),
            }
        }

        fn failing() -> Self {
            Self {
                calls: Cell::new(0),
                body: None,
            }
        }
    }

    impl ImageFetcher for &CountingFetcher {
        fn fetch(&self, _url: &str) -> Result<Vec<u8>> {
            self.calls.set(self.calls.get() + 1);
            self.body
                .clone()
                .ok_or_else(|| anyhow::anyhow!("connection refused"))
        }
    }

    fn png_bytes() -> Vec<u8> {
        let img = RgbaImage::from_pixel(4, 4, Rgba([255, 0, 0, 255]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, ImageFormat::Png).unwrap();
        out.into_inner()
    }

    fn playback(art_url: &str) -> CurrentPlayback {
        CurrentPlayback {
            is_playing: Some(true),
            progress_ms: Some(30_000),
            item: Some(Track {
                name: Some("Roygbiv".into()),
                artists: vec![Artist {
                    name: Some("Boards of Canada".into()),
                }],
                album: Some(Album {
                    name: Some("Music Has the Right to Children".into()),
                    images: vec![AlbumImage {
                        url: art_url.into(),
                        width: Some(640),
                        height: Some(640),
                    }],
                    total_tracks: Some(18),
                }),
                duration_ms: Some(120_000),
                track_number: Some(4),
            }),
        }
    }

    #[test]
    fn builds_snapshot_from_response() {
        let fetcher = CountingFetcher::serving(png_bytes());
        let mut builder = SnapshotBuilder::new(&fetcher);

        let snap = builder.build(&playback("https://art/1")).unwrap();

        assert_eq!(snap.artist, "Boards of Canada");
        assert_eq!(snap.track_name, "Roygbiv");
        assert_eq!(snap.album, "Music Has the Right to Children");
        assert_eq!(snap.progress, Duration::from_secs(30));
        assert_eq!(snap.duration, Duration::from_secs(120));
        assert_eq!((snap.track_number, snap.total_tracks), (4, 18));
        assert_eq!(snap.album_art_url.as_deref(), Some("https://art/1"));
        assert_eq!(snap.album_art.as_ref().unwrap().dimensions(), (4, 4));
        assert_eq!(snap.progress_percent(), 25.0);
    }

    #[test]
    fn same_url_is_fetched_once() {
        let fetcher = CountingFetcher::serving(png_bytes());
        let mut builder = SnapshotBuilder::new(&fetcher);

        builder.build(&playback("https://art/1")).unwrap();
        builder.build(&playback("https://art/1")).unwrap();

        assert_eq!(fetcher.calls.get(), 1);
    }

    #[test]
    fn failed_fetch_leaves_art_absent() {
        let fetcher = CountingFetcher::failing();
        let mut builder = SnapshotBuilder::new(&fetcher);

        let snap = builder.build(&playback("https://art/1")).unwrap();

        assert!(snap.album_art.is_none());
        assert_eq!(snap.album_art_url.as_deref(), Some("https://art/1"));
    }

    #[test]
    fn undecodable_art_leaves_art_absent() {
        let fetcher = CountingFetcher::serving(b"<html>not an image</html>".to_vec());
        let mut builder = SnapshotBuilder::new(&fetcher);

        let snap = builder.build(&playback("https://art/1")).unwrap();

        assert!(snap.album_art.is_none());
    }

    #[test]
    fn failures_are_retried_on_the_next_build() {
        let fetcher = CountingFetcher::failing();
        let mut builder = SnapshotBuilder::new(&fetcher);

        builder.build(&playback("https://art/1")).unwrap();
        builder.build(&playback("https://art/1")).unwrap();

        assert_eq!(fetcher.calls.get(), 2);
    }

    #[test]
    fn missing_item_is_malformed() {
        let fetcher = CountingFetcher::failing();
        let mut builder = SnapshotBuilder::new(&fetcher);

        let err = builder.build(&CurrentPlayback::default()).unwrap_err();

        assert_eq!(err, SnapshotError::MalformedResponse("item"));
    }

    #[test]
    fn missing_artist_is_malformed() {
        let fetcher = CountingFetcher::failing();
        let mut builder = SnapshotBuilder::new(&fetcher);
        let mut response = playback("https://art/1");
        response.item.as_mut().unwrap().artists.clear();

        let err = builder.build(&response).unwrap_err();

        assert_eq!(err, SnapshotError::MalformedResponse("item.artists[0].name"));
        assert_eq!(fetcher.calls.get(), 0);
    }

    #[test]
    fn track_without_images_has_no_art() {
        let fetcher = CountingFetcher::serving(png_bytes());
        let mut builder = SnapshotBuilder::new(&fetcher);
        let mut response = playback("unused");
        if let Some(album) = response.item.as_mut().and_then(|i| i.album.as_mut()) {
            album.images.clear();
        }

        let snap = builder.build(&response).unwrap();

        assert!(snap.album_art_url.is_none());
        assert!(snap.album_art.is_none());
        assert_eq!(fetcher.calls.get(), 0);
    }
}
