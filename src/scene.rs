//! Declarative layout of the "now playing" screen.
//!
//! [`build`] is a pure function of the snapshot, the display size and the
//! metrics of the configured font. Positions are resolved here, so the
//! compositor only has to draw what it is given.

use std::sync::Arc;

use image::{Rgba, RgbaImage};

use crate::font::TextMetrics;
use crate::types::PlaybackSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl From<(u32, u32)> for Size {
    fn from((width, height): (u32, u32)) -> Self {
        Self { width, height }
    }
}

/// Top-left corner of a child, relative to its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone)]
pub enum Widget {
    Rect {
        size: Size,
        fill: Rgba<u8>,
        children: Vec<Placed>,
    },
    Image {
        size: Size,
        /// Stable identity of the image across scenes (the art URL).
        key: String,
        image: Arc<RgbaImage>,
    },
    Text(TextBlock),
    ProgressBar {
        size: Size,
        percent: f32,
        track: Rgba<u8>,
        fill: Rgba<u8>,
    },
}

/// Image nodes compare by key and allocation, never by pixels. The art cache
/// hands out one `Arc` per URL, so an unchanged cover stays cheap to compare.
impl PartialEq for Widget {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (
                Widget::Rect { size, fill, children },
                Widget::Rect {
                    size: other_size,
                    fill: other_fill,
                    children: other_children,
                },
            ) => size == other_size && fill == other_fill && children == other_children,
            (
                Widget::Image { size, key, image },
                Widget::Image {
                    size: other_size,
                    key: other_key,
                    image: other_image,
                },
            ) => size == other_size && key == other_key && Arc::ptr_eq(image, other_image),
            (Widget::Text(a), Widget::Text(b)) => a == b,
            (
                Widget::ProgressBar { size, percent, track, fill },
                Widget::ProgressBar {
                    size: other_size,
                    percent: other_percent,
                    track: other_track,
                    fill: other_fill,
                },
            ) => size == other_size && percent == other_percent && track == other_track && fill == other_fill,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Placed {
    pub at: Point,
    pub widget: Widget,
}

/// Already wrapped text; each line is drawn `line_height` below the last.
#[derive(Debug, Clone, PartialEq)]
pub struct TextBlock {
    pub lines: Vec<String>,
    pub font_size: f32,
    pub line_height: f32,
    pub color: Rgba<u8>,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Align {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Baseline {
    Top,
    Bottom,
}

const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);
const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
const DIM: Rgba<u8> = Rgba([200, 200, 200, 255]);
const BAR_TRACK: Rgba<u8> = Rgba([64, 64, 64, 255]);

const ART_SIZE: Size = Size::new(255, 255);
const BAR_AT: Point = Point::new(0, 270);
const BAR_SIZE: Size = Size::new(480, 5);
const TIME_ROW_Y: i32 = 290;
const TIME_SIZE: f32 = 20.0;
const TEXT_COLUMN_X: i32 = 265;
const TEXT_COLUMN_WIDTH: f32 = 215.0;
const ALBUM_Y: i32 = 2;
const ALBUM_SIZE: f32 = 16.0;
const ARTIST_GAP: i32 = 20;
const ARTIST_SIZE: f32 = 24.0;
const TRACK_BOTTOM_Y: i32 = 255;
const TRACK_SIZE: f32 = 20.0;

/// Lays out the now-playing screen for a 480x320 landscape display.
pub fn build<M: TextMetrics + ?Sized>(size: Size, snapshot: &PlaybackSnapshot, metrics: &M) -> Widget {
    let mut children = Vec::new();

    if let (Some(image), Some(url)) = (&snapshot.album_art, &snapshot.album_art_url) {
        children.push(Placed {
            at: Point::new(0, 0),
            widget: Widget::Image {
                size: ART_SIZE,
                key: url.clone(),
                image: Arc::clone(image),
            },
        });
    }

    children.push(Placed {
        at: BAR_AT,
        widget: Widget::ProgressBar {
            size: BAR_SIZE,
            percent: snapshot.progress_percent(),
            track: BAR_TRACK,
            fill: WHITE,
        },
    });

    let elapsed = text(metrics, &format_time(snapshot.progress.as_secs()), TIME_SIZE, DIM, None);
    children.push(anchored(Point::new(5, TIME_ROW_Y), Align::Left, Baseline::Top, elapsed));

    let total = text(metrics, &format_time(snapshot.duration.as_secs()), TIME_SIZE, DIM, None);
    children.push(anchored(Point::new(475, TIME_ROW_Y), Align::Right, Baseline::Top, total));

    let counter = format!("{} / {}", snapshot.track_number, snapshot.total_tracks);
    let counter = text(metrics, &counter, TIME_SIZE, DIM, None);
    children.push(anchored(Point::new(240, TIME_ROW_Y), Align::Center, Baseline::Top, counter));

    let album = text(metrics, &snapshot.album, ALBUM_SIZE, DIM, Some(TEXT_COLUMN_WIDTH));
    let artist_y = album.height as i32 + ARTIST_GAP;
    children.push(anchored(Point::new(TEXT_COLUMN_X, ALBUM_Y), Align::Left, Baseline::Top, album));

    let artist = text(metrics, &snapshot.artist, ARTIST_SIZE, WHITE, Some(TEXT_COLUMN_WIDTH));
    children.push(anchored(Point::new(TEXT_COLUMN_X, artist_y), Align::Left, Baseline::Top, artist));

    let track = text(metrics, &snapshot.track_name, TRACK_SIZE, WHITE, Some(TEXT_COLUMN_WIDTH));
    children.push(anchored(
        Point::new(TEXT_COLUMN_X, TRACK_BOTTOM_Y),
        Align::Left,
        Baseline::Bottom,
        track,
    ));

    Widget::Rect {
        size,
        fill: BLACK,
        children,
    }
}

/// Formats whole seconds as `m:ss`. Minutes are not padded or capped.
pub fn format_time(seconds: u64) -> String {
    format!("{}:{:02}", seconds / 60, seconds % 60)
}

fn text<M: TextMetrics + ?Sized>(
    metrics: &M,
    content: &str,
    font_size: f32,
    color: Rgba<u8>,
    max_width: Option<f32>,
) -> TextBlock {
    let lines = match max_width {
        Some(limit) => wrap(metrics, content, font_size, limit),
        None => vec![content.to_string()],
    };
    let line_height = metrics.line_height(font_size);
    let width = lines
        .iter()
        .map(|l| metrics.text_width(l, font_size))
        .fold(0.0_f32, f32::max);

    TextBlock {
        height: (line_height * lines.len() as f32).ceil() as u32,
        width: width.ceil() as u32,
        lines,
        font_size,
        line_height,
        color,
    }
}

fn anchored(at: Point, align: Align, baseline: Baseline, block: TextBlock) -> Placed {
    let x = match align {
        Align::Left => at.x,
        Align::Center => at.x - block.width as i32 / 2,
        Align::Right => at.x - block.width as i32,
    };
    let y = match baseline {
        Baseline::Top => at.y,
        Baseline::Bottom => at.y - block.height as i32,
    };
    Placed {
        at: Point::new(x, y),
        widget: Widget::Text(block),
    }
}

/// Greedy word wrap. A word wider than `max_width` gets a line to itself.
fn wrap<M: TextMetrics + ?Sized>(metrics: &M, content: &str, font_size: f32, max_width: f32) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in content.split_whitespace() {
        if current.is_empty() {
            current.push_str(word);
            continue;
        }
        let candidate = format!("{} {}", current, word);
        if metrics.text_width(&candidate, font_size) <= max_width {
            current = candidate;
        } else {
            lines.push(std::mem::take(&mut current));
            current.push_str(word);
        }
    }

    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}
