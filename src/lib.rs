//! Shows what Spotify is playing on a small USB display.
//!
//! The binary wires these modules together; they are exposed as a library so
//! the run loop can be exercised with fake devices and playback sources.

pub mod cache;
pub mod compositor;
pub mod config;
pub mod device;
pub mod font;
pub mod runner;
pub mod scene;
pub mod screen;
pub mod snapshot;
pub mod spotify;
pub mod state;
pub mod ticker;
pub mod types;

pub use config::Config;
pub use runner::{PlaybackSource, Runner};
pub use state::Shutdown;
pub use types::{CurrentPlayback, PlaybackSnapshot};
