use embedded_hal::{digital::OutputPin, i2c::I2c, spi::SpiBus};
use esp_hal::{
    gpio::RtcPin,
    peripherals::{GPIO10, GPIO11, LPWR},
    rtc_cntl::{
        Rtc,
        sleep::{RtcioWakeupSource, WakeupLevel},
    },
};
use quotepad_hal_esp32s3::platform::display::{self, OledDisplay};

pub(super) fn enter_deep_sleep<I2C, SDBUS, SDCS>(
    oled: &mut OledDisplay<I2C>,
    sd_spi: &mut SDBUS,
    sd_cs: &mut SDCS,
) -> !
where
    I2C: I2c,
    SDBUS: SpiBus<u8>,
    SDCS: OutputPin,
{
    // The sleep notice stays in panel RAM; switch the panel off to save power.
    let _ = display::power_off(oled);

    // Keep SD bus idle and CS deasserted so no transaction remains active.
    let _ = sd_spi.flush();
    let _ = sd_cs.set_high();

    let mut rtc = Rtc::new(unsafe { LPWR::steal() });
    let mut wake_b1 = unsafe { GPIO10::steal() };
    let mut wake_b2 = unsafe { GPIO11::steal() };
    let mut wake_pins: [(&mut dyn RtcPin, WakeupLevel); 2] = [
        (&mut wake_b1, WakeupLevel::Low),
        (&mut wake_b2, WakeupLevel::Low),
    ];
    let wake_source = RtcioWakeupSource::new(&mut wake_pins);

    rtc.sleep_deep(&[&wake_source]);
}
