use embedded_graphics::{
    draw_target::DrawTarget,
    mono_font::{MonoTextStyle, ascii::FONT_6X10},
    pixelcolor::BinaryColor,
    prelude::*,
    text::{Baseline, Text},
};
use quotepad_core::render::{LineWrap, Screen};

use crate::platform::display::{HEIGHT, WIDTH};

use super::FrameRenderer;

const CHAR_WIDTH: u32 = 6;
const LINE_HEIGHT: i32 = 10;
const COLUMNS: usize = (WIDTH / CHAR_WIDTH) as usize;
const PRIMARY_ROWS: usize = 5;
const SECONDARY_Y: i32 = HEIGHT as i32 - LINE_HEIGHT;
const SCROLL_Y: i32 = (HEIGHT as i32 - LINE_HEIGHT) / 2;

/// Text layout for the 128x64 panel using the 6x10 font.
#[derive(Debug, Clone, Copy)]
pub struct OledRenderer {
    inverted: bool,
}

impl Default for OledRenderer {
    fn default() -> Self {
        Self::new(false)
    }
}

impl OledRenderer {
    pub const fn new(inverted: bool) -> Self {
        Self { inverted }
    }

    fn palette(&self) -> (BinaryColor, BinaryColor) {
        if self.inverted {
            (BinaryColor::On, BinaryColor::Off)
        } else {
            (BinaryColor::Off, BinaryColor::On)
        }
    }
}

impl FrameRenderer for OledRenderer {
    fn render<D>(&mut self, screen: Screen<'_>, frame: &mut D)
    where
        D: DrawTarget<Color = BinaryColor>,
    {
        let (background, foreground) = self.palette();
        let style = MonoTextStyle::new(&FONT_6X10, foreground);
        let _ = frame.clear(background);

        match screen {
            Screen::Text { primary, secondary } => {
                for (row, line) in LineWrap::new(primary, COLUMNS)
                    .take(PRIMARY_ROWS)
                    .enumerate()
                {
                    let y = row as i32 * LINE_HEIGHT;
                    let _ = Text::with_baseline(line, Point::new(0, y), style, Baseline::Top)
                        .draw(frame);
                }

                // The hint sits on the bottom row, centred.
                if let Some(hint) = LineWrap::new(secondary, COLUMNS).next() {
                    let origin = Point::new(centred_x(hint), SECONDARY_Y);
                    let _ = Text::with_baseline(hint, origin, style, Baseline::Top).draw(frame);
                }
            }
            Screen::Scrolling { text, .. } => {
                let x = scroll_x(text, screen.scroll_offset_px());
                let _ = Text::with_baseline(text, Point::new(x, SCROLL_Y), style, Baseline::Top)
                    .draw(frame);
            }
        }
    }
}

fn text_width_px(text: &str) -> u32 {
    text.chars().count() as u32 * CHAR_WIDTH
}

fn centred_x(text: &str) -> i32 {
    (WIDTH.saturating_sub(text_width_px(text)) / 2) as i32
}

/// Enters from the right edge and wraps once fully off the left edge.
fn scroll_x(text: &str, offset_px: u32) -> i32 {
    let travel = WIDTH + text_width_px(text);
    WIDTH as i32 - (offset_px % travel) as i32
}
