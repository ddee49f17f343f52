use std::sync::Arc;

use anyhow::{Context, Result};
use image::RgbaImage;

use crate::compositor::{changed_region, Compositor};
use crate::device::{DisplayDevice, Orientation};
use crate::font::Typeface;
use crate::scene::{Size, Widget};

/// Owns the display and its power state.
///
/// Construction resets and configures the device and leaves it on. Device
/// errors are passed straight up; recovery is the run loop's job.
pub struct Screen {
    device: Box<dyn DisplayDevice>,
    compositor: Compositor,
    is_on: bool,
    last_scene: Option<Widget>,
    last_frame: Option<RgbaImage>,
}

impl Screen {
    pub fn new(mut device: Box<dyn DisplayDevice>, face: Arc<dyn Typeface>, brightness: u8) -> Result<Self> {
        device.reset().context("Display reset failed")?;
        device.initialize_comm().context("Display handshake failed")?;
        device.set_brightness(brightness.min(100))?;
        device.set_orientation(Orientation::Landscape)?;

        Ok(Self {
            device,
            compositor: Compositor::new(face),
            is_on: true,
            last_scene: None,
            last_frame: None,
        })
    }

    pub fn is_on(&self) -> bool {
        self.is_on
    }

    pub fn size(&self) -> Size {
        self.device.size().into()
    }

    /// Font used to draw scenes, for laying them out.
    pub fn face(&self) -> &dyn Typeface {
        self.compositor.face()
    }

    pub fn off(&mut self) -> Result<()> {
        if !self.is_on {
            return Ok(());
        }
        log::info!("Nothing playing, turning display off");
        self.reset_paint_state();
        self.device.screen_off()?;
        self.device.clear()?;
        self.is_on = false;
        Ok(())
    }

    pub fn on(&mut self) -> Result<()> {
        if self.is_on {
            return Ok(());
        }
        log::info!("Playback started, turning display on");
        self.device.screen_on()?;
        self.is_on = true;
        Ok(())
    }

    /// Draws `scene`, sending only the region that changed since the last
    /// frame. Only meaningful while the screen is on.
    pub fn update(&mut self, scene: Widget) -> Result<()> {
        if self.last_scene.as_ref() == Some(&scene) {
            return Ok(());
        }

        let size = self.size();
        let frame = self.compositor.render(&scene, size);
        let region = match &self.last_frame {
            Some(prev) if prev.dimensions() == frame.dimensions() => changed_region(prev, &frame),
            _ => Some((0, 0, size.width, size.height)),
        };

        if let Some((x, y, w, h)) = region {
            log::trace!("Painting {}x{} at ({}, {})", w, h, x, y);
            let patch = image::imageops::crop_imm(&frame, x, y, w, h).to_image();
            self.device.paint(&patch, x, y)?;
        }

        self.last_frame = Some(frame);
        self.last_scene = Some(scene);
        Ok(())
    }

    fn reset_paint_state(&mut self) {
        self.last_scene = None;
        self.last_frame = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::font::TextMetrics;
    use crate::scene::{Placed, Point};
    use image::Rgba;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct NoText;

    impl TextMetrics for NoText {
        fn text_width(&self, _text: &str, _size: f32) -> f32 {
            0.0
        }

        fn line_height(&self, size: f32) -> f32 {
            size
        }
    }

    impl Typeface for NoText {
        fn draw(&self, _: &mut RgbaImage, _: i32, _: i32, _: f32, _: Rgba<u8>, _: &str) {}
    }

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Reset,
        Init,
        Brightness(u8),
        Orientation(Orientation),
        On,
        Off,
        Clear,
        Paint { x: u32, y: u32, w: u32, h: u32 },
    }

    #[derive(Clone, Default)]
    struct Recorder(Rc<RefCell<Vec<Call>>>);

    impl Recorder {
        fn calls(&self) -> Vec<Call> {
            self.0.borrow().clone()
        }

        fn clear(&self) {
            self.0.borrow_mut().clear();
        }
    }

    impl DisplayDevice for Recorder {
        fn reset(&mut self) -> Result<()> {
            self.0.borrow_mut().push(Call::Reset);
            Ok(())
        }
        fn initialize_comm(&mut self) -> Result<()> {
            self.0.borrow_mut().push(Call::Init);
            Ok(())
        }
        fn set_brightness(&mut self, level: u8) -> Result<()> {
            self.0.borrow_mut().push(Call::Brightness(level));
            Ok(())
        }
        fn set_orientation(&mut self, orientation: Orientation) -> Result<()> {
            self.0.borrow_mut().push(Call::Orientation(orientation));
            Ok(())
        }
        fn screen_on(&mut self) -> Result<()> {
            self.0.borrow_mut().push(Call::On);
            Ok(())
        }
        fn screen_off(&mut self) -> Result<()> {
            self.0.borrow_mut().push(Call::Off);
            Ok(())
        }
        fn clear(&mut self) -> Result<()> {
            self.0.borrow_mut().push(Call::Clear);
            Ok(())
        }
        fn paint(&mut self, image: &RgbaImage, x: u32, y: u32) -> Result<()> {
            let (w, h) = image.dimensions();
            self.0.borrow_mut().push(Call::Paint { x, y, w, h });
            Ok(())
        }
        fn size(&self) -> (u32, u32) {
            (480, 320)
        }
    }

    fn screen() -> (Screen, Recorder) {
        let recorder = Recorder::default();
        let screen = Screen::new(Box::new(recorder.clone()), Arc::new(NoText), 25).unwrap();
        (screen, recorder)
    }

    fn scene_with_bar(percent: f32) -> Widget {
        Widget::Rect {
            size: Size::new(480, 320),
            fill: Rgba([0, 0, 0, 255]),
            children: vec![Placed {
                at: Point::new(0, 270),
                widget: Widget::ProgressBar {
                    size: Size::new(480, 5),
                    percent,
                    track: Rgba([64, 64, 64, 255]),
                    fill: Rgba([255, 255, 255, 255]),
                },
            }],
        }
    }

    #[test]
    fn construction_configures_the_device() {
        let (screen, recorder) = screen();

        assert!(screen.is_on());
        assert_eq!(
            recorder.calls(),
            vec![
                Call::Reset,
                Call::Init,
                Call::Brightness(25),
                Call::Orientation(Orientation::Landscape),
            ]
        );
    }

    #[test]
    fn off_and_on_are_idempotent() {
        let (mut screen, recorder) = screen();
        recorder.clear();

        screen.off().unwrap();
        screen.off().unwrap();
        screen.on().unwrap();
        screen.on().unwrap();

        assert_eq!(recorder.calls(), vec![Call::Off, Call::Clear, Call::On]);
    }

    #[test]
    fn on_while_on_sends_nothing() {
        let (mut screen, recorder) = screen();
        recorder.clear();

        screen.on().unwrap();

        assert!(recorder.calls().is_empty());
    }

    #[test]
    fn first_update_paints_full_frame_then_only_changes() {
        let (mut screen, recorder) = screen();
        recorder.clear();

        screen.update(scene_with_bar(0.0)).unwrap();
        screen.update(scene_with_bar(50.0)).unwrap();

        assert_eq!(
            recorder.calls(),
            vec![
                Call::Paint { x: 0, y: 0, w: 480, h: 320 },
                Call::Paint { x: 0, y: 270, w: 240, h: 5 },
            ]
        );
    }

    #[test]
    fn identical_scene_is_not_repainted() {
        let (mut screen, recorder) = screen();
        recorder.clear();

        screen.update(scene_with_bar(10.0)).unwrap();
        screen.update(scene_with_bar(10.0)).unwrap();

        assert_eq!(recorder.calls().len(), 1);
    }

    #[test]
    fn turning_off_forces_a_full_repaint() {
        let (mut screen, recorder) = screen();
        screen.update(scene_with_bar(10.0)).unwrap();
        screen.off().unwrap();
        screen.on().unwrap();
        recorder.clear();

        screen.update(scene_with_bar(10.0)).unwrap();

        assert_eq!(recorder.calls(), vec![Call::Paint { x: 0, y: 0, w: 480, h: 320 }]);
    }
}
