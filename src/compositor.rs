use std::sync::Arc;

use image::imageops::FilterType;
use image::{Rgba, RgbaImage};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;

use crate::font::Typeface;
use crate::scene::{Point, Size, TextBlock, Widget};

/// Rasterizes scenes into RGBA frames.
pub struct Compositor {
    face: Arc<dyn Typeface>,
    /// Last resized image, keyed by widget key. Album art stays the same for
    /// a whole track, so this saves a resize on nearly every frame.
    resized: Option<(String, Size, RgbaImage)>,
}

impl Compositor {
    pub fn new(face: Arc<dyn Typeface>) -> Self {
        Self { face, resized: None }
    }

    pub fn face(&self) -> &dyn Typeface {
        &*self.face
    }

    /// Renders `scene` onto a new canvas of `size`. The canvas starts black;
    /// the scene's root rectangle normally covers it.
    pub fn render(&mut self, scene: &Widget, size: Size) -> RgbaImage {
        let mut canvas = RgbaImage::from_pixel(size.width, size.height, Rgba([0, 0, 0, 255]));
        self.draw(&mut canvas, scene, Point::new(0, 0));
        canvas
    }

    fn draw(&mut self, canvas: &mut RgbaImage, widget: &Widget, at: Point) {
        match widget {
            Widget::Rect { size, fill, children } => {
                fill_rect(canvas, at, *size, *fill);
                for child in children {
                    let child_at = Point::new(at.x + child.at.x, at.y + child.at.y);
                    self.draw(canvas, &child.widget, child_at);
                }
            }
            Widget::Image { size, key, image } => {
                let resized = self.resized_image(key, *size, image);
                image::imageops::overlay(canvas, resized, at.x as i64, at.y as i64);
            }
            Widget::Text(block) => self.draw_text(canvas, block, at),
            Widget::ProgressBar {
                size,
                percent,
                track,
                fill,
            } => {
                fill_rect(canvas, at, *size, *track);
                let filled = (size.width as f32 * percent.clamp(0.0, 100.0) / 100.0).round() as u32;
                fill_rect(canvas, at, Size::new(filled, size.height), *fill);
            }
        }
    }

    fn draw_text(&self, canvas: &mut RgbaImage, block: &TextBlock, at: Point) {
        for (i, line) in block.lines.iter().enumerate() {
            let y = at.y + (i as f32 * block.line_height).round() as i32;
            self.face.draw(canvas, at.x, y, block.font_size, block.color, line);
        }
    }

    fn resized_image(&mut self, key: &str, size: Size, image: &RgbaImage) -> &RgbaImage {
        let stale = match &self.resized {
            Some((k, s, _)) => k != key || *s != size,
            None => true,
        };
        if stale {
            self.resized = None;
        }
        let (_, _, img) = self.resized.get_or_insert_with(|| {
            log::debug!("Resizing image '{}' to {}x{}", key, size.width, size.height);
            let img = if image.dimensions() == (size.width, size.height) {
                image.clone()
            } else {
                image::imageops::resize(image, size.width, size.height, FilterType::Triangle)
            };
            (key.to_string(), size, img)
        });
        img
    }
}

fn fill_rect(canvas: &mut RgbaImage, at: Point, size: Size, color: Rgba<u8>) {
    if size.width == 0 || size.height == 0 {
        return;
    }
    draw_filled_rect_mut(canvas, Rect::at(at.x, at.y).of_size(size.width, size.height), color);
}

/// Smallest rectangle `(x, y, width, height)` containing every pixel that
/// differs between two frames of equal size, or `None` if they match.
pub fn changed_region(previous: &RgbaImage, next: &RgbaImage) -> Option<(u32, u32, u32, u32)> {
    debug_assert_eq!(previous.dimensions(), next.dimensions());

    let mut bounds: Option<(u32, u32, u32, u32)> = None;
    for (x, y, pixel) in next.enumerate_pixels() {
        if previous.get_pixel(x, y) == pixel {
            continue;
        }
        bounds = Some(match bounds {
            None => (x, y, x, y),
            Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
        });
    }
    bounds.map(|(x0, y0, x1, y1)| (x0, y0, x1 - x0 + 1, y1 - y0 + 1))
}
