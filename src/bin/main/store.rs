use log::{info, warn};
use quotepad_core::persist::{MemoryStore, RawStore, STORE_BYTES};
use quotepad_hal_esp32s3::storage::eeprom::FlashEeprom;

/// Flash-backed when the data partition is usable, RAM-only otherwise.
pub(super) enum BootStore {
    Flash(FlashEeprom),
    Volatile(MemoryStore<STORE_BYTES>),
}

impl BootStore {
    pub(super) fn open() -> Self {
        match FlashEeprom::new() {
            Ok(eeprom) => {
                info!("store: flash store ready");
                Self::Flash(eeprom)
            }
            Err(err) => {
                warn!(
                    "store: flash unavailable ({:?}); cache will not survive power loss",
                    err
                );
                Self::Volatile(MemoryStore::new())
            }
        }
    }
}

impl RawStore for BootStore {
    fn capacity(&self) -> usize {
        match self {
            Self::Flash(store) => store.capacity(),
            Self::Volatile(store) => store.capacity(),
        }
    }

    fn read_byte(&self, offset: usize) -> u8 {
        match self {
            Self::Flash(store) => store.read_byte(offset),
            Self::Volatile(store) => store.read_byte(offset),
        }
    }

    fn write_byte(&mut self, offset: usize, value: u8) {
        match self {
            Self::Flash(store) => store.write_byte(offset, value),
            Self::Volatile(store) => store.write_byte(offset, value),
        }
    }

    fn commit(&mut self) -> bool {
        match self {
            Self::Flash(store) => store.commit(),
            Self::Volatile(store) => store.commit(),
        }
    }
}
