use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::{Rgba, RgbaImage};

use super::{DisplayDevice, Orientation};

const NATIVE_SIZE: (u32, u32) = (320, 480);
const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// Stand-in display that keeps a framebuffer in memory and saves it as a PNG
/// after every change, so a browser or image viewer can follow along.
pub struct Simulated {
    frame_path: PathBuf,
    orientation: Orientation,
    framebuffer: RgbaImage,
    on: bool,
}

impl Simulated {
    pub fn new(frame_path: PathBuf) -> Self {
        let (w, h) = NATIVE_SIZE;
        Self {
            frame_path,
            orientation: Orientation::Portrait,
            framebuffer: RgbaImage::from_pixel(w, h, BLACK),
            on: true,
        }
    }

    pub fn frame_path(&self) -> &Path {
        &self.frame_path
    }

    pub fn framebuffer(&self) -> &RgbaImage {
        &self.framebuffer
    }

    pub fn is_on(&self) -> bool {
        self.on
    }

    fn flush(&self) -> Result<()> {
        let shown;
        let frame = if self.on {
            &self.framebuffer
        } else {
            let (w, h) = self.framebuffer.dimensions();
            shown = RgbaImage::from_pixel(w, h, BLACK);
            &shown
        };
        frame
            .save(&self.frame_path)
            .with_context(|| format!("Failed to write {}", self.frame_path.display()))
    }
}

impl DisplayDevice for Simulated {
    fn reset(&mut self) -> Result<()> {
        log::debug!("Simulated LCD reset");
        self.on = true;
        self.framebuffer.pixels_mut().for_each(|p| *p = BLACK);
        self.flush()
    }

    fn initialize_comm(&mut self) -> Result<()> {
        Ok(())
    }

    fn set_brightness(&mut self, level: u8) -> Result<()> {
        log::debug!("Simulated LCD brightness {}%", level.min(100));
        Ok(())
    }

    fn set_orientation(&mut self, orientation: Orientation) -> Result<()> {
        if orientation.is_landscape() != self.orientation.is_landscape() {
            let (w, h) = self.framebuffer.dimensions();
            self.framebuffer = RgbaImage::from_pixel(h, w, BLACK);
        }
        self.orientation = orientation;
        Ok(())
    }

    fn screen_on(&mut self) -> Result<()> {
        self.on = true;
        self.flush()
    }

    fn screen_off(&mut self) -> Result<()> {
        self.on = false;
        self.flush()
    }

    fn clear(&mut self) -> Result<()> {
        self.framebuffer.pixels_mut().for_each(|p| *p = BLACK);
        self.flush()
    }

    fn paint(&mut self, image: &RgbaImage, x: u32, y: u32) -> Result<()> {
        image::imageops::replace(&mut self.framebuffer, image, x as i64, y as i64);
        self.flush()
    }

    fn size(&self) -> (u32, u32) {
        self.framebuffer.dimensions()
    }
}
