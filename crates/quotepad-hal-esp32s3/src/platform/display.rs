use embedded_hal::i2c::I2c;
use log::info;
use ssd1306::{I2CDisplayInterface, Ssd1306, mode::BufferedGraphicsMode, prelude::*};

pub const WIDTH: u32 = 128;
pub const HEIGHT: u32 = 64;

pub type OledDisplay<I2C> =
    Ssd1306<I2CInterface<I2C>, DisplaySize128x64, BufferedGraphicsMode<DisplaySize128x64>>;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum OledError {
    Init,
    Flush,
    Power,
}

pub fn new<I2C>(i2c: I2C) -> OledDisplay<I2C>
where
    I2C: I2c,
{
    let interface = I2CDisplayInterface::new(i2c);
    Ssd1306::new(interface, DisplaySize128x64, DisplayRotation::Rotate0)
        .into_buffered_graphics_mode()
}

/// Brings up the panel and pushes one blank frame.
pub fn init<I2C>(display: &mut OledDisplay<I2C>) -> Result<(), OledError>
where
    I2C: I2c,
{
    display.init().map_err(|err| {
        info!("display: init failed err={:?}", err);
        OledError::Init
    })?;
    display.clear_buffer();
    flush(display)
}

pub fn flush<I2C>(display: &mut OledDisplay<I2C>) -> Result<(), OledError>
where
    I2C: I2c,
{
    display.flush().map_err(|err| {
        info!("display: flush failed err={:?}", err);
        OledError::Flush
    })
}

/// Panel off; RAM contents are kept.
pub fn power_off<I2C>(display: &mut OledDisplay<I2C>) -> Result<(), OledError>
where
    I2C: I2c,
{
    display.set_display_on(false).map_err(|_| OledError::Power)
}
