//! Shared fakes for the run loop tests.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::time::Instant;

use anyhow::Result;
use image::{Rgba, RgbaImage};

use spotiscreen::device::{DisplayDevice, Orientation};
use spotiscreen::font::{TextMetrics, Typeface};
use spotiscreen::runner::DeviceOpener;
use spotiscreen::snapshot::ImageFetcher;
use spotiscreen::ticker::{Clock, ManualClock};
use spotiscreen::types::{Album, AlbumImage, Artist, Track};
use spotiscreen::{CurrentPlayback, PlaybackSource, Shutdown};

/// Fixed-advance face that draws text as solid boxes.
pub struct BlockFace;

impl TextMetrics for BlockFace {
    fn text_width(&self, text: &str, size: f32) -> f32 {
        text.chars().count() as f32 * size / 2.0
    }

    fn line_height(&self, size: f32) -> f32 {
        size
    }
}

impl Typeface for BlockFace {
    fn draw(&self, canvas: &mut RgbaImage, x: i32, y: i32, size: f32, color: Rgba<u8>, text: &str) {
        let w = self.text_width(text, size) as i32;
        for py in y.max(0)..(y + size as i32).min(canvas.height() as i32) {
            for px in x.max(0)..(x + w).min(canvas.width() as i32) {
                canvas.put_pixel(px as u32, py as u32, color);
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCall {
    Reset,
    Init,
    Brightness(u8),
    Orientation(Orientation),
    On,
    Off,
    Clear,
    Paint,
}

/// Calls made to every device a [`FakeDisplays`] has opened, tagged with the
/// device's sequence number (0 for the first one opened).
#[derive(Clone, Default)]
pub struct FakeDisplays {
    log: Rc<RefCell<Vec<(usize, DeviceCall)>>>,
    opened: Rc<RefCell<usize>>,
    failing_paints: Rc<RefCell<Vec<usize>>>,
}

impl FakeDisplays {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `paint` fail on the device with sequence number `device`.
    pub fn fail_paint_on(&self, device: usize) {
        self.failing_paints.borrow_mut().push(device);
    }

    pub fn opened(&self) -> usize {
        *self.opened.borrow()
    }

    pub fn calls(&self) -> Vec<(usize, DeviceCall)> {
        self.log.borrow().clone()
    }

    pub fn count(&self, call: &DeviceCall) -> usize {
        self.log.borrow().iter().filter(|(_, c)| c == call).count()
    }

    pub fn opener(&self) -> DeviceOpener {
        let displays = self.clone();
        Box::new(move || {
            let id = {
                let mut opened = displays.opened.borrow_mut();
                *opened += 1;
                *opened - 1
            };
            let device: Box<dyn DisplayDevice> = Box::new(FakeDevice {
                id,
                displays: displays.clone(),
            });
            Ok(device)
        })
    }
}

struct FakeDevice {
    id: usize,
    displays: FakeDisplays,
}

impl FakeDevice {
    fn record(&self, call: DeviceCall) {
        self.displays.log.borrow_mut().push((self.id, call));
    }
}

impl DisplayDevice for FakeDevice {
    fn reset(&mut self) -> Result<()> {
        self.record(DeviceCall::Reset);
        Ok(())
    }

    fn initialize_comm(&mut self) -> Result<()> {
        self.record(DeviceCall::Init);
        Ok(())
    }

    fn set_brightness(&mut self, level: u8) -> Result<()> {
        self.record(DeviceCall::Brightness(level));
        Ok(())
    }

    fn set_orientation(&mut self, orientation: Orientation) -> Result<()> {
        self.record(DeviceCall::Orientation(orientation));
        Ok(())
    }

    fn screen_on(&mut self) -> Result<()> {
        self.record(DeviceCall::On);
        Ok(())
    }

    fn screen_off(&mut self) -> Result<()> {
        self.record(DeviceCall::Off);
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.record(DeviceCall::Clear);
        Ok(())
    }

    fn paint(&mut self, _image: &RgbaImage, _x: u32, _y: u32) -> Result<()> {
        self.record(DeviceCall::Paint);
        if self.displays.failing_paints.borrow().contains(&self.id) {
            anyhow::bail!("serial write timed out");
        }
        Ok(())
    }

    fn size(&self) -> (u32, u32) {
        (480, 320)
    }
}

/// Replays scripted playback results, recording when each query happened.
/// Once the script runs out it requests shutdown and reports no session, or
/// the playback given to [`ScriptedSource::then_stop_while_playing`].
pub struct ScriptedSource {
    script: VecDeque<Result<Option<CurrentPlayback>>>,
    last: Option<CurrentPlayback>,
    clock: ManualClock,
    shutdown: Shutdown,
    queried_at: Rc<RefCell<Vec<Instant>>>,
}

impl ScriptedSource {
    pub fn new(
        script: Vec<Result<Option<CurrentPlayback>>>,
        clock: ManualClock,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            script: script.into(),
            last: None,
            clock,
            shutdown,
            queried_at: Rc::default(),
        }
    }

    pub fn then_stop_while_playing(mut self, playback: CurrentPlayback) -> Self {
        self.last = Some(playback);
        self
    }

    pub fn queries(&self) -> Rc<RefCell<Vec<Instant>>> {
        Rc::clone(&self.queried_at)
    }
}

impl PlaybackSource for ScriptedSource {
    fn current_playback(&mut self) -> Result<Option<CurrentPlayback>> {
        self.queried_at.borrow_mut().push(self.clock.now());
        match self.script.pop_front() {
            Some(result) => result,
            None => {
                self.shutdown.request();
                Ok(self.last.clone())
            }
        }
    }
}

/// Album art server that is always down.
pub struct OfflineFetcher;

impl ImageFetcher for OfflineFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        anyhow::bail!("could not resolve host for {}", url)
    }
}

pub fn playing(track: &str, progress_ms: u64) -> CurrentPlayback {
    CurrentPlayback {
        is_playing: Some(true),
        progress_ms: Some(progress_ms),
        item: Some(Track {
            name: Some(track.to_string()),
            artists: vec![Artist {
                name: Some("Stereolab".into()),
            }],
            album: Some(Album {
                name: Some("Dots and Loops".into()),
                images: vec![AlbumImage {
                    url: "https://i.scdn.co/image/dots".into(),
                    width: Some(640),
                    height: Some(640),
                }],
                total_tracks: Some(10),
            }),
            duration_ms: Some(240_000),
            track_number: Some(1),
        }),
    }
}
