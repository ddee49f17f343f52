//! Turing Smart Screen 3.5" (hardware revision A) over USB serial.
//!
//! Every command is a 6-byte frame packing a rectangle (x, y, ex, ey) into
//! 10-bit fields followed by the command byte. Bitmaps follow a
//! `DISPLAY_BITMAP` frame as raw RGB565 little-endian pixels, row by row.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use image::RgbaImage;

use super::{DisplayDevice, Orientation};

const NATIVE_WIDTH: u32 = 320;
const NATIVE_HEIGHT: u32 = 480;
const SERIAL_ID_MARKER: &str = "USB35INCHIPS";
const FALLBACK_PORT: &str = "/dev/ttyACM0";
const RESET_SETTLE: Duration = Duration::from_secs(5);

mod cmd {
    pub const RESET: u8 = 101;
    pub const CLEAR: u8 = 102;
    pub const SCREEN_OFF: u8 = 108;
    pub const SCREEN_ON: u8 = 109;
    pub const SET_BRIGHTNESS: u8 = 110;
    pub const SET_ORIENTATION: u8 = 121;
    pub const DISPLAY_BITMAP: u8 = 197;
}

pub struct RevA {
    port: Option<File>,
    orientation: Orientation,
}

impl RevA {
    pub fn open() -> Result<Self> {
        let port = open_port()?;
        Ok(Self {
            port: Some(port),
            orientation: Orientation::Portrait,
        })
    }

    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        let port = self.port.as_mut().context("Display serial port is closed")?;
        port.write_all(bytes).context("Failed to write to display")?;
        port.flush().context("Failed to flush display port")?;
        Ok(())
    }

    fn send(&mut self, command: u8, x: u32, y: u32, ex: u32, ey: u32) -> Result<()> {
        self.write(&frame(command, x, y, ex, ey))
    }
}

impl DisplayDevice for RevA {
    fn reset(&mut self) -> Result<()> {
        log::info!("Display reset (serial port may change)...");
        self.send(cmd::RESET, 0, 0, 0, 0)?;
        self.port = None;
        thread::sleep(RESET_SETTLE);
        self.port = Some(open_port()?);
        Ok(())
    }

    fn initialize_comm(&mut self) -> Result<()> {
        // Revision A needs no handshake.
        Ok(())
    }

    fn set_brightness(&mut self, level: u8) -> Result<()> {
        self.send(cmd::SET_BRIGHTNESS, brightness_level(level), 0, 0, 0)
    }

    fn set_orientation(&mut self, orientation: Orientation) -> Result<()> {
        self.orientation = orientation;
        let (width, height) = self.size();
        self.write(&orientation_frame(orientation, width, height))
    }

    fn screen_on(&mut self) -> Result<()> {
        self.send(cmd::SCREEN_ON, 0, 0, 0, 0)
    }

    fn screen_off(&mut self) -> Result<()> {
        self.send(cmd::SCREEN_OFF, 0, 0, 0, 0)
    }

    fn clear(&mut self) -> Result<()> {
        // CLEAR only wipes correctly in portrait.
        let restore = self.orientation;
        self.set_orientation(Orientation::Portrait)?;
        self.send(cmd::CLEAR, 0, 0, 0, 0)?;
        self.set_orientation(restore)
    }

    fn paint(&mut self, image: &RgbaImage, x: u32, y: u32) -> Result<()> {
        let (width, height) = self.size();
        let w = image.width().min(width.saturating_sub(x));
        let h = image.height().min(height.saturating_sub(y));
        if w == 0 || h == 0 {
            return Ok(());
        }

        self.send(cmd::DISPLAY_BITMAP, x, y, x + w - 1, y + h - 1)?;
        let mut pixels = Vec::with_capacity((w * h * 2) as usize);
        for row in 0..h {
            for col in 0..w {
                let p = image.get_pixel(col, row);
                pixels.extend_from_slice(&rgb565(p[0], p[1], p[2]).to_le_bytes());
            }
        }
        self.write(&pixels)
    }

    fn size(&self) -> (u32, u32) {
        if self.orientation.is_landscape() {
            (NATIVE_HEIGHT, NATIVE_WIDTH)
        } else {
            (NATIVE_WIDTH, NATIVE_HEIGHT)
        }
    }
}

fn frame(command: u8, x: u32, y: u32, ex: u32, ey: u32) -> [u8; 6] {
    [
        (x >> 2) as u8,
        (((x & 3) << 6) + (y >> 4)) as u8,
        (((y & 15) << 4) + (ex >> 6)) as u8,
        (((ex & 63) << 2) + (ey >> 8)) as u8,
        (ey & 255) as u8,
        command,
    ]
}

fn orientation_frame(orientation: Orientation, width: u32, height: u32) -> [u8; 16] {
    let mut bytes = [0u8; 16];
    bytes[..6].copy_from_slice(&frame(cmd::SET_ORIENTATION, 0, 0, 0, 0));
    bytes[6] = orientation as u8 + 100;
    bytes[7] = (width >> 8) as u8;
    bytes[8] = (width & 255) as u8;
    bytes[9] = (height >> 8) as u8;
    bytes[10] = (height & 255) as u8;
    bytes
}

/// The panel takes 0 as brightest and 255 as darkest.
fn brightness_level(percent: u8) -> u32 {
    let percent = u32::from(percent.min(100));
    255 - percent * 255 / 100
}

fn rgb565(r: u8, g: u8, b: u8) -> u16 {
    (u16::from(r) >> 3) << 11 | (u16::from(g) >> 2) << 5 | u16::from(b) >> 3
}

fn find_port() -> Result<PathBuf> {
    if let Ok(entries) = std::fs::read_dir("/dev/serial/by-id") {
        let mut matches: Vec<PathBuf> = entries
            .flatten()
            .map(|e| e.path())
            .filter(|p| {
                p.file_name()
                    .map_or(false, |n| n.to_string_lossy().contains(SERIAL_ID_MARKER))
            })
            .collect();
        matches.sort();
        if let Some(port) = matches.into_iter().next() {
            return Ok(port);
        }
    }

    let fallback = Path::new(FALLBACK_PORT);
    if fallback.exists() {
        return Ok(fallback.to_path_buf());
    }
    anyhow::bail!("No display found (looked for {} and {})", SERIAL_ID_MARKER, FALLBACK_PORT)
}

fn open_port() -> Result<File> {
    let path = find_port()?;
    log::info!("Opening display on {}", path.display());
    let port = OpenOptions::new()
        .read(true)
        .write(true)
        .open(&path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    configure_raw(&port).with_context(|| format!("Failed to configure {}", path.display()))?;
    Ok(port)
}

#[cfg(unix)]
fn configure_raw(port: &File) -> Result<()> {
    use nix::sys::termios::{cfmakeraw, cfsetspeed, tcgetattr, tcsetattr, BaudRate, SetArg};

    let mut attrs = tcgetattr(port)?;
    cfmakeraw(&mut attrs);
    cfsetspeed(&mut attrs, BaudRate::B115200)?;
    tcsetattr(port, SetArg::TCSANOW, &attrs)?;
    Ok(())
}

#[cfg(not(unix))]
fn configure_raw(_port: &File) -> Result<()> {
    Ok(())
}
