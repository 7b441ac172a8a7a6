pub mod oled;

use embedded_graphics::{draw_target::DrawTarget, pixelcolor::BinaryColor};
use quotepad_core::render::Screen;

pub trait FrameRenderer {
    fn render<D>(&mut self, screen: Screen<'_>, frame: &mut D)
    where
        D: DrawTarget<Color = BinaryColor>;
}
