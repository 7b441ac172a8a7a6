#![no_std]
#![no_main]
#![deny(
    clippy::mem_forget,
    reason = "mem::forget is generally not safe to do with esp_hal types, especially those \
    holding buffers for the duration of a data transfer."
)]
#![deny(clippy::large_stack_frames)]

use esp_hal::{
    clock::CpuClock,
    delay::Delay,
    gpio::{Input, InputConfig, Level, Output, OutputConfig, Pull},
    i2c::master::{Config as I2cConfig, I2c},
    rng::Rng,
    rtc_cntl::{reset_reason, wakeup_cause},
    spi::master::{Config as SpiConfig, Spi},
    system::Cpu,
    time::{Instant, Rate},
    timer::timg::TimerGroup,
};
use log::{LevelFilter, info};
use quotepad_core::{
    app::{QuoteDevice, TickResult},
    gesture::ButtonLevels,
    persist::PersistentStore,
    pipeline::Collaborators,
};
use quotepad_hal_esp32s3::{
    input::buttons::{ButtonConfig, ButtonPair},
    network::{NetResources, WifiLink},
    platform::display,
    render::{FrameRenderer, oled::OledRenderer},
    storage::sd_card::SdStorage,
};
use rand::{SeedableRng, rngs::SmallRng};
use static_cell::StaticCell;

use store::BootStore;

#[path = "main/boot.rs"]
mod boot;
#[path = "main/power.rs"]
mod power;
#[path = "main/store.rs"]
mod store;

const SD_SPI_HZ: u32 = 1_000_000;
const DISPLAY_I2C_KHZ: u32 = 400;
const BUTTON_DEBOUNCE_POLLS: u8 = 3;
const LOOP_INTERVAL_MS: u32 = 10;
const SLEEP_NOTICE_MS: u32 = 1_500;

// Plain HTTP: the link does not carry TLS.
const QUOTE_URL: &str = "http://zenquotes.io/api/random";
const SNTP_SERVER: &str = "pool.ntp.org";

static NET_RESOURCES: StaticCell<NetResources> = StaticCell::new();

#[panic_handler]
fn panic(_: &core::panic::PanicInfo) -> ! {
    loop {}
}

// This creates a default app-descriptor required by the esp-idf bootloader.
// For more information see: <https://docs.espressif.com/projects/esp-idf/en/stable/esp32/api-reference/system/app_image_format.html#application-description>
esp_bootloader_esp_idf::esp_app_desc!();

/// Parks the firmware after an unrecoverable bring-up failure.
fn halt(reason: &str) -> ! {
    esp_println::println!("boot: halted ({})", reason);
    let delay = Delay::new();
    loop {
        delay.delay_millis(1_000);
    }
}

#[allow(
    clippy::large_stack_frames,
    reason = "it's not unusual to allocate larger buffers etc. in main"
)]
#[esp_hal::main]
fn main() -> ! {
    esp_println::logger::init_logger(LevelFilter::Info);
    esp_println::println!("boot: quotepad starting");

    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(config);
    info!(
        "boot reset_reason={:?} wakeup_cause={:?}",
        reset_reason(Cpu::ProCpu),
        wakeup_cause()
    );

    // esp-radio requires an allocator.
    esp_alloc::heap_allocator!(#[esp_hal::ram(reclaimed)] size: 65536);

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    let delay = Delay::new();

    // Display wiring: SDA=GPIO5, SCL=GPIO6
    let i2c = match I2c::new(
        peripherals.I2C0,
        I2cConfig::default().with_frequency(Rate::from_khz(DISPLAY_I2C_KHZ)),
    ) {
        Ok(i2c) => i2c.with_sda(peripherals.GPIO5).with_scl(peripherals.GPIO6),
        Err(err) => {
            info!("display: i2c config failed: {:?}", err);
            halt("display i2c");
        }
    };
    let mut oled = display::new(i2c);
    let mut display_ok = display::init(&mut oled).is_ok();
    let mut renderer = OledRenderer::default();

    // Button wiring: B1=GPIO10, B2=GPIO11, both to ground.
    let input_cfg = InputConfig::default().with_pull(Pull::Up);
    let button1 = Input::new(peripherals.GPIO10, input_cfg);
    let button2 = Input::new(peripherals.GPIO11, input_cfg);
    let Ok(mut buttons) = ButtonPair::new(
        button1,
        button2,
        ButtonConfig::default().with_debounce_polls(BUTTON_DEBOUNCE_POLLS),
    ) else {
        halt("buttons");
    };

    // SD SPI wiring: CS=GPIO8, SCK=GPIO4, MOSI=GPIO40, MISO=GPIO41
    let sd_cs = Output::new(peripherals.GPIO8, Level::High, OutputConfig::default());
    let sd_spi_config = SpiConfig::default()
        .with_frequency(Rate::from_hz(SD_SPI_HZ))
        // SD cards in SPI mode use CPOL=0, CPHA=0.
        .with_mode(esp_hal::spi::Mode::_0);
    let sd_spi = match Spi::new(peripherals.SPI3, sd_spi_config) {
        Ok(spi) => spi
            .with_sck(peripherals.GPIO4)
            .with_mosi(peripherals.GPIO40)
            .with_miso(peripherals.GPIO41),
        Err(err) => {
            info!("sd: spi config failed: {:?}", err);
            halt("sd spi");
        }
    };
    let mut sd = SdStorage::new(sd_spi, sd_cs, Delay::new());

    let store = PersistentStore::new(BootStore::open());
    let settings = boot::load_settings(&mut sd);
    let candidates = boot::load_candidates(&mut sd, &store);
    info!(
        "boot: mode={:?} cache={} candidates={} long_press_ms={}",
        settings.mode,
        settings.cache_enabled,
        candidates.len(),
        settings.long_press_ms
    );

    let hw_rng = Rng::new();
    let seed = ((hw_rng.random() as u64) << 32) | hw_rng.random() as u64;

    let radio = match esp_radio::init() {
        Ok(radio) => radio,
        Err(err) => {
            info!("esp-radio init failed: {:?}", err);
            halt("radio");
        }
    };
    let (wifi_controller, interfaces) =
        match esp_radio::wifi::new(&radio, peripherals.WIFI, esp_radio::wifi::Config::default()) {
            Ok(parts) => parts,
            Err(err) => {
                info!("wifi peripheral init failed: {:?}", err);
                halt("wifi");
            }
        };
    let network = WifiLink::new(
        wifi_controller,
        interfaces.sta,
        NET_RESOURCES.init(NetResources::new()),
        SNTP_SERVER,
        seed,
    );

    let io = Collaborators {
        network,
        library: sd,
        delay: Delay::new(),
        rng: SmallRng::seed_from_u64(seed),
    };
    let mut device = QuoteDevice::new(settings, io, store, candidates, QUOTE_URL);

    let loop_start = Instant::now();
    loop {
        let now_ms = loop_start.elapsed().as_millis();
        let levels = buttons.sample().unwrap_or(ButtonLevels::RELEASED);

        let result = device.tick(levels, now_ms);
        if result != TickResult::NoRender {
            device.with_screen(now_ms, |screen| renderer.render(screen, &mut oled));
            match display::flush(&mut oled) {
                Ok(()) if !display_ok => {
                    info!("display: recovered");
                    display_ok = true;
                }
                Err(_) => display_ok = false,
                Ok(()) => {}
            }
        }

        if result == TickResult::Sleep {
            info!("sleep: entering deep sleep mode={:?}", device.effective_mode());
            delay.delay_millis(SLEEP_NOTICE_MS);

            let io = device.io_mut();
            io.network.shutdown();
            let (sd_bus, sd_cs) = io.library.bus_and_cs();
            power::enter_deep_sleep(&mut oled, sd_bus, sd_cs);
        }

        delay.delay_millis(LOOP_INTERVAL_MS);
    }
}
