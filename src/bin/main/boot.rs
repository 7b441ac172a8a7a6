use embedded_hal::{delay::DelayNs, digital::OutputPin, spi::SpiBus};
use log::{info, warn};
use quotepad_core::{
    credentials::{self, CandidateList},
    persist::{PersistentStore, RawStore},
    settings::Settings,
};
use quotepad_hal_esp32s3::storage::sd_card::{CONFIG_FILE, SdStorage, WIFI_FILE};

const CONFIG_BYTES: usize = 512;
const WIFI_BYTES: usize = 1024;

pub(super) fn load_settings<BUS, CS, DELAY>(sd: &mut SdStorage<BUS, CS, DELAY>) -> Settings
where
    BUS: SpiBus<u8>,
    CS: OutputPin,
    DELAY: DelayNs,
    BUS::Error: core::fmt::Debug,
    CS::Error: core::fmt::Debug,
{
    let mut buf = [0u8; CONFIG_BYTES];
    let text = match sd.read_text(CONFIG_FILE, &mut buf) {
        Ok(text) => Some(text),
        Err(err) => {
            warn!("boot: {} unreadable: {:?}", CONFIG_FILE, err);
            None
        }
    };
    Settings::load_or_default(text)
}

pub(super) fn load_candidates<BUS, CS, DELAY, R>(
    sd: &mut SdStorage<BUS, CS, DELAY>,
    store: &PersistentStore<R>,
) -> CandidateList
where
    BUS: SpiBus<u8>,
    CS: OutputPin,
    DELAY: DelayNs,
    BUS::Error: core::fmt::Debug,
    CS::Error: core::fmt::Debug,
    R: RawStore,
{
    let last_good = credentials::load_last_good(store);
    if let Some(credential) = &last_good {
        info!("boot: last good network ssid={}", credential.ssid);
    }

    let mut buf = [0u8; WIFI_BYTES];
    let text = match sd.read_text(WIFI_FILE, &mut buf) {
        Ok(text) => Some(text),
        Err(err) => {
            warn!("boot: {} unreadable: {:?}", WIFI_FILE, err);
            None
        }
    };
    credentials::candidate_list(last_good, text)
}
