//! Display hardware behind a small command interface.
//!
//! The display controller only ever talks to a [`DisplayDevice`]; which one
//! is used is decided once at startup from the config.

use std::path::PathBuf;

use anyhow::Result;
use image::RgbaImage;

pub mod rev_a;
pub mod simulated;

pub use rev_a::RevA;
pub use simulated::Simulated;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Portrait = 0,
    ReversePortrait = 1,
    Landscape = 2,
    ReverseLandscape = 3,
}

impl Orientation {
    pub fn is_landscape(self) -> bool {
        matches!(self, Orientation::Landscape | Orientation::ReverseLandscape)
    }
}

pub trait DisplayDevice {
    fn reset(&mut self) -> Result<()>;
    fn initialize_comm(&mut self) -> Result<()>;
    /// `level` is a percentage, 0 (dark) to 100 (brightest).
    fn set_brightness(&mut self, level: u8) -> Result<()>;
    fn set_orientation(&mut self, orientation: Orientation) -> Result<()>;
    fn screen_on(&mut self) -> Result<()>;
    fn screen_off(&mut self) -> Result<()>;
    fn clear(&mut self) -> Result<()>;
    /// Paints `image` with its top-left corner at `(x, y)`.
    fn paint(&mut self, image: &RgbaImage, x: u32, y: u32) -> Result<()>;
    /// Width and height in the current orientation.
    fn size(&self) -> (u32, u32);
}

/// Opens the device selected by `simulated`. The simulated display writes
/// its frames to `frame_path`.
pub fn open(simulated: bool, frame_path: PathBuf) -> Result<Box<dyn DisplayDevice>> {
    if simulated {
        let device = Simulated::new(frame_path);
        log::info!("Simulated LCD writing frames to {}", device.frame_path().display());
        Ok(Box::new(device))
    } else {
        Ok(Box::new(RevA::open()?))
    }
}
