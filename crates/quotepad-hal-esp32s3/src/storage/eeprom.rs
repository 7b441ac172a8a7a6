use embedded_storage::{ReadStorage, Storage};
use esp_bootloader_esp_idf::partitions::{
    DataPartitionSubType, PARTITION_TABLE_MAX_LEN, PartitionType, read_partition_table,
};
use esp_rom_sys::rom::spiflash::{
    ESP_ROM_SPIFLASH_RESULT_OK, esp_rom_spiflash_erase_sector, esp_rom_spiflash_read,
    esp_rom_spiflash_unlock, esp_rom_spiflash_write,
};
use log::{info, warn};
use quotepad_core::persist::{RawStore, STORE_BYTES};

const FLASH_SECTOR_SIZE: u32 = 4096;
const DEFAULT_FLASH_CAPACITY_BYTES: usize = 16 * 1024 * 1024;

const IMAGE_MAGIC: u32 = 0x3150_5145; // "EQP1"
const HEADER_BYTES: usize = 8;
const RECORD_BYTES: usize = HEADER_BYTES + STORE_BYTES;

const _: () = assert!(RECORD_BYTES % 4 == 0);
const _: () = assert!(RECORD_BYTES <= FLASH_SECTOR_SIZE as usize);

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum EepromError {
    PartitionTable,
    PartitionMissing,
    PartitionTooSmall,
    FlashOpFailed(i32),
    Unaligned,
}

/// Word-granular access to the SPI flash through the ROM routines.
#[derive(Debug)]
struct RomFlash;

impl RomFlash {
    fn unlock() -> Result<Self, EepromError> {
        let rc = unsafe { esp_rom_spiflash_unlock() };
        check(rc)?;
        Ok(Self)
    }

    fn erase_sector(&mut self, sector_addr: u32) -> Result<(), EepromError> {
        if !sector_addr.is_multiple_of(FLASH_SECTOR_SIZE) {
            return Err(EepromError::Unaligned);
        }
        check(unsafe { esp_rom_spiflash_erase_sector(sector_addr / FLASH_SECTOR_SIZE) })
    }

    /// Both `addr` and `out.len()` must be word aligned.
    fn read_aligned(&mut self, addr: u32, out: &mut [u8]) -> Result<(), EepromError> {
        if !addr.is_multiple_of(4) || !out.len().is_multiple_of(4) {
            return Err(EepromError::Unaligned);
        }

        for (index, chunk) in out.chunks_exact_mut(4).enumerate() {
            let mut word = 0u32;
            let word_addr = addr + (index * 4) as u32;
            let rc =
                unsafe { esp_rom_spiflash_read(word_addr, &mut word as *mut u32 as *const u32, 4) };
            check(rc)?;
            chunk.copy_from_slice(&word.to_le_bytes());
        }
        Ok(())
    }

    /// Programs a freshly erased, word-aligned range.
    fn write_aligned(&mut self, addr: u32, data: &[u8]) -> Result<(), EepromError> {
        if !addr.is_multiple_of(4) || !data.len().is_multiple_of(4) {
            return Err(EepromError::Unaligned);
        }

        for (index, chunk) in data.chunks_exact(4).enumerate() {
            let word = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
            let word_addr = addr + (index * 4) as u32;
            check(unsafe { esp_rom_spiflash_write(word_addr, &word as *const u32, 4) })?;
        }
        Ok(())
    }
}

impl ReadStorage for RomFlash {
    type Error = EepromError;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        // The partition table reader asks for whole, aligned chunks.
        self.read_aligned(offset, bytes)
    }

    fn capacity(&self) -> usize {
        DEFAULT_FLASH_CAPACITY_BYTES
    }
}

impl Storage for RomFlash {
    fn write(&mut self, _offset: u32, _bytes: &[u8]) -> Result<(), Self::Error> {
        Err(EepromError::Unaligned)
    }
}

/// Byte-addressable store mirrored in RAM and backed by one flash sector.
///
/// Writes only touch the RAM image; [`RawStore::commit`] rewrites the sector
/// when the image changed since the last commit.
#[derive(Debug)]
pub struct FlashEeprom {
    flash: RomFlash,
    sector_addr: u32,
    image: [u8; STORE_BYTES],
    dirty: bool,
}

impl FlashEeprom {
    pub fn new() -> Result<Self, EepromError> {
        let mut flash = RomFlash::unlock()?;
        let sector_addr = find_store_sector(&mut flash)?;

        let mut record = [0u8; RECORD_BYTES];
        flash.read_aligned(sector_addr, &mut record)?;

        // Zero-filled so every slot of a blank image reads empty.
        let mut image = [0u8; STORE_BYTES];
        let magic = u32::from_le_bytes([record[0], record[1], record[2], record[3]]);
        let expected = u32::from_le_bytes([record[4], record[5], record[6], record[7]]);
        let payload = &record[HEADER_BYTES..];
        if magic == IMAGE_MAGIC && checksum32(payload) == expected {
            image.copy_from_slice(payload);
            info!("eeprom: image loaded sector=0x{:x}", sector_addr);
        } else {
            info!("eeprom: no valid image; starting blank sector=0x{:x}", sector_addr);
        }

        Ok(Self {
            flash,
            sector_addr,
            image,
            dirty: false,
        })
    }

    fn write_sector(&mut self) -> Result<(), EepromError> {
        let mut record = [0xFFu8; RECORD_BYTES];
        record[0..4].copy_from_slice(&IMAGE_MAGIC.to_le_bytes());
        record[4..8].copy_from_slice(&checksum32(&self.image).to_le_bytes());
        record[HEADER_BYTES..].copy_from_slice(&self.image);

        self.flash.erase_sector(self.sector_addr)?;
        self.flash.write_aligned(self.sector_addr, &record)
    }
}

impl RawStore for FlashEeprom {
    fn capacity(&self) -> usize {
        STORE_BYTES
    }

    fn read_byte(&self, offset: usize) -> u8 {
        self.image.get(offset).copied().unwrap_or(0xFF)
    }

    fn write_byte(&mut self, offset: usize, value: u8) {
        if let Some(byte) = self.image.get_mut(offset)
            && *byte != value
        {
            *byte = value;
            self.dirty = true;
        }
    }

    fn commit(&mut self) -> bool {
        if !self.dirty {
            return true;
        }

        match self.write_sector() {
            Ok(()) => {
                self.dirty = false;
                true
            }
            Err(err) => {
                warn!("eeprom: sector write failed err={:?}", err);
                false
            }
        }
    }
}

/// Last sector of the first writable data partition.
fn find_store_sector(flash: &mut RomFlash) -> Result<u32, EepromError> {
    let mut table_buf = [0u8; PARTITION_TABLE_MAX_LEN];
    let table =
        read_partition_table(flash, &mut table_buf).map_err(|_| EepromError::PartitionTable)?;

    let mut undefined: Option<(u32, u32)> = None;
    let mut nvs: Option<(u32, u32)> = None;

    for entry in table.iter() {
        if entry.is_read_only() {
            continue;
        }

        match entry.partition_type() {
            PartitionType::Data(DataPartitionSubType::Undefined) if undefined.is_none() => {
                undefined = Some((entry.offset(), entry.len()));
            }
            PartitionType::Data(DataPartitionSubType::Nvs) if nvs.is_none() => {
                nvs = Some((entry.offset(), entry.len()));
            }
            _ => {}
        }
    }

    let (offset, len) = undefined.or(nvs).ok_or(EepromError::PartitionMissing)?;
    if len < FLASH_SECTOR_SIZE {
        return Err(EepromError::PartitionTooSmall);
    }
    Ok(offset + len - FLASH_SECTOR_SIZE)
}

fn check(rc: i32) -> Result<(), EepromError> {
    if rc == ESP_ROM_SPIFLASH_RESULT_OK {
        Ok(())
    } else {
        Err(EepromError::FlashOpFailed(rc))
    }
}

fn checksum32(bytes: &[u8]) -> u32 {
    bytes.iter().fold(0x811C_9DC5u32, |hash, byte| {
        (hash ^ *byte as u32).wrapping_mul(0x0100_0193)
    })
}
