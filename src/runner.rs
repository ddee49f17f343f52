use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::config::Config;
use crate::device::DisplayDevice;
use crate::font::Typeface;
use crate::scene;
use crate::screen::Screen;
use crate::snapshot::{ImageFetcher, SnapshotBuilder};
use crate::state::Shutdown;
use crate::ticker::{Clock, Ticker};
use crate::types::CurrentPlayback;

/// How often playback is polled while something is playing.
pub const TICK_INTERVAL: Duration = Duration::from_secs(1);
/// Extra pause after finding nothing playing, to go easy on the API.
pub const IDLE_POLL_DELAY: Duration = Duration::from_secs(5);
/// Pause before rebuilding everything after an error.
pub const RETRY_DELAY: Duration = Duration::from_secs(5);

/// Where playback status comes from. `Ok(None)` means no active session.
pub trait PlaybackSource {
    fn current_playback(&mut self) -> Result<Option<CurrentPlayback>>;
}

/// Opens a fresh display device. Called again after every failure.
pub type DeviceOpener = Box<dyn FnMut() -> Result<Box<dyn DisplayDevice>>>;

/// The polling loop: waits for a tick, asks what is playing and either turns
/// the display off or draws the current track.
///
/// Any error tears the display down, waits [`RETRY_DELAY`] and starts over
/// from opening the device. Only a [`Shutdown`] request ends the loop.
pub struct Runner<P: PlaybackSource, F: ImageFetcher, C: Clock + Clone> {
    source: P,
    snapshots: SnapshotBuilder<F>,
    open_device: DeviceOpener,
    face: Arc<dyn Typeface>,
    brightness: u8,
    clock: C,
    shutdown: Shutdown,
}

impl<P: PlaybackSource, F: ImageFetcher, C: Clock + Clone> Runner<P, F, C> {
    pub fn new(
        config: &Config,
        source: P,
        fetcher: F,
        open_device: DeviceOpener,
        face: Arc<dyn Typeface>,
        clock: C,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            source,
            snapshots: SnapshotBuilder::new(fetcher),
            open_device,
            face,
            brightness: config.brightness(),
            clock,
            shutdown,
        }
    }

    pub fn run(&mut self) {
        log::info!("Starting");
        let mut screen: Option<Screen> = None;

        while !self.shutdown.is_requested() {
            if let Err(e) = self.run_screen(&mut screen) {
                log::error!("Error occurred: {:#}", e);
                if !self.shutdown.is_requested() {
                    log::info!("Retrying in {} seconds...", RETRY_DELAY.as_secs());
                    self.clock.sleep(RETRY_DELAY);
                }
            }
        }

        if let Some(screen) = screen.as_mut() {
            if let Err(e) = screen.off() {
                log::warn!("Failed to turn display off on shutdown: {:#}", e);
            }
        }
        log::info!("Shutdown complete");
    }

    /// One attempt: open the display and poll until shutdown or an error.
    fn run_screen(&mut self, slot: &mut Option<Screen>) -> Result<()> {
        *slot = None;
        let device = (self.open_device)().context("Failed to open display")?;
        let screen = slot.insert(Screen::new(device, Arc::clone(&self.face), self.brightness)?);
        log::info!("Screen initialized, now running...");

        let mut ticker = Ticker::new(TICK_INTERVAL, self.clock.clone());
        loop {
            if self.shutdown.is_requested() {
                return Ok(());
            }
            ticker.wait();
            if self.shutdown.is_requested() {
                return Ok(());
            }
            self.tick(screen)?;
        }
    }

    fn tick(&mut self, screen: &mut Screen) -> Result<()> {
        match self.source.current_playback()? {
            None => {
                screen.off()?;
                self.clock.sleep(IDLE_POLL_DELAY);
            }
            Some(playback) => {
                screen.on()?;
                let snapshot = self.snapshots.build(&playback)?;
                let scene = scene::build(screen.size(), &snapshot, screen.face());
                screen.update(scene)?;
            }
        }
        Ok(())
    }
}
