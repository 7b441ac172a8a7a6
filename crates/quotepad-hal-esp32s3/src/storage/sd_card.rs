use core::fmt::Write as _;

use embedded_hal::{
    delay::DelayNs,
    digital::OutputPin,
    spi::{Error as SpiErrorTrait, ErrorKind, ErrorType, Operation, SpiBus, SpiDevice},
};
use embedded_sdmmc::{
    BlockDevice, Directory, Mode, SdCard, SdCardError, TimeSource, Timestamp, VolumeIdx,
    VolumeManager,
};
use heapless::String;
use log::debug;
use quotepad_core::pipeline::QuoteLibrary;

pub const CONFIG_FILE: &str = "CONFIG.TXT";
pub const WIFI_FILE: &str = "WIFI.TXT";
pub const QUOTES_DIR: &str = "QUOTES";

// SD SPI init requires >=74 clock cycles with CS deasserted.
const PRECLOCK_BYTES: usize = 10;

/// The card is only read, so file timestamps never matter.
#[derive(Clone, Copy, Debug, Default)]
pub struct FixedTimeSource;

impl TimeSource for FixedTimeSource {
    fn get_timestamp(&self) -> Timestamp {
        // 2024-01-01 00:00:00
        Timestamp {
            year_since_1970: 54,
            zero_indexed_month: 0,
            zero_indexed_day: 0,
            hours: 0,
            minutes: 0,
            seconds: 0,
        }
    }
}

#[derive(Debug)]
pub enum SdStorageError<BusErr, CsErr>
where
    BusErr: core::fmt::Debug,
    CsErr: core::fmt::Debug,
{
    ChipSelect(CsErr),
    Spi(BusErr),
    Card(SdCardError),
    Filesystem(embedded_sdmmc::Error<SdCardError>),
    FileName,
    Encoding,
}

#[derive(Debug)]
enum ExclusiveSpiError<BusErr, CsErr>
where
    BusErr: core::fmt::Debug,
    CsErr: core::fmt::Debug,
{
    Bus(BusErr),
    Cs(CsErr),
    DelayNotSupported,
}

impl<BusErr, CsErr> SpiErrorTrait for ExclusiveSpiError<BusErr, CsErr>
where
    BusErr: core::fmt::Debug,
    CsErr: core::fmt::Debug,
{
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

/// Borrows the shared bus and chip select for the lifetime of one mount.
struct ExclusiveSpiDevice<'a, BUS, CS>
where
    BUS: SpiBus<u8>,
    CS: OutputPin,
{
    bus: &'a mut BUS,
    cs: &'a mut CS,
}

impl<BUS, CS> ErrorType for ExclusiveSpiDevice<'_, BUS, CS>
where
    BUS: SpiBus<u8>,
    CS: OutputPin,
    BUS::Error: core::fmt::Debug,
    CS::Error: core::fmt::Debug,
{
    type Error = ExclusiveSpiError<BUS::Error, CS::Error>;
}

impl<BUS, CS> SpiDevice<u8> for ExclusiveSpiDevice<'_, BUS, CS>
where
    BUS: SpiBus<u8>,
    CS: OutputPin,
    BUS::Error: core::fmt::Debug,
    CS::Error: core::fmt::Debug,
{
    fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), Self::Error> {
        if operations
            .iter()
            .any(|op| matches!(op, Operation::DelayNs(_)))
        {
            return Err(ExclusiveSpiError::DelayNotSupported);
        }

        self.cs.set_low().map_err(ExclusiveSpiError::Cs)?;
        let op_result = self.run(operations).map_err(ExclusiveSpiError::Bus);
        let cs_result = self.cs.set_high().map_err(ExclusiveSpiError::Cs);
        op_result.and(cs_result)
    }
}

impl<BUS, CS> ExclusiveSpiDevice<'_, BUS, CS>
where
    BUS: SpiBus<u8>,
    CS: OutputPin,
{
    fn run(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), BUS::Error> {
        for operation in operations {
            match operation {
                Operation::Read(buf) => self.bus.read(buf)?,
                Operation::Write(buf) => self.bus.write(buf)?,
                Operation::Transfer(read, write) => self.bus.transfer(read, write)?,
                Operation::TransferInPlace(buf) => self.bus.transfer_in_place(buf)?,
                Operation::DelayNs(_) => {}
            }
        }
        self.bus.flush()
    }
}

struct DelayRef<'a, D>(&'a mut D);

impl<D> DelayNs for DelayRef<'_, D>
where
    D: DelayNs,
{
    fn delay_ns(&mut self, ns: u32) {
        self.0.delay_ns(ns);
    }
}

/// FAT volume on an SPI SD card, mounted afresh for every read.
#[derive(Debug)]
pub struct SdStorage<BUS, CS, DELAY> {
    bus: BUS,
    cs: CS,
    delay: DELAY,
}

impl<BUS, CS, DELAY> SdStorage<BUS, CS, DELAY>
where
    BUS: SpiBus<u8>,
    CS: OutputPin,
    DELAY: DelayNs,
    BUS::Error: core::fmt::Debug,
    CS::Error: core::fmt::Debug,
{
    pub fn new(bus: BUS, cs: CS, delay: DELAY) -> Self {
        Self { bus, cs, delay }
    }

    /// Releases the bus so it can be parked before deep sleep.
    pub fn bus_and_cs(&mut self) -> (&mut BUS, &mut CS) {
        (&mut self.bus, &mut self.cs)
    }

    /// Reads a root-directory text file into `out`.
    pub fn read_text<'b>(
        &mut self,
        name: &str,
        out: &'b mut [u8],
    ) -> Result<&'b str, SdStorageError<BUS::Error, CS::Error>> {
        let read = self.read_file(None, name, out)?;
        core::str::from_utf8(&out[..read]).map_err(|_| SdStorageError::Encoding)
    }

    pub fn read_file(
        &mut self,
        dir: Option<&str>,
        name: &str,
        out: &mut [u8],
    ) -> Result<usize, SdStorageError<BUS::Error, CS::Error>> {
        self.cs.set_high().map_err(SdStorageError::ChipSelect)?;
        self.bus
            .write(&[0xFFu8; PRECLOCK_BYTES])
            .map_err(SdStorageError::Spi)?;

        let spi_device = ExclusiveSpiDevice {
            bus: &mut self.bus,
            cs: &mut self.cs,
        };
        let mut delay_ref = DelayRef(&mut self.delay);
        let sd_card = SdCard::new(spi_device, &mut delay_ref);
        let card_size_bytes = sd_card.num_bytes().map_err(SdStorageError::Card)?;

        let volume_mgr = VolumeManager::new(sd_card, FixedTimeSource);
        let mut volume = volume_mgr
            .open_volume(VolumeIdx(0))
            .map_err(SdStorageError::Filesystem)?;
        let mut root_dir = volume.open_root_dir().map_err(SdStorageError::Filesystem)?;

        let read = match dir {
            Some(dir_name) => {
                let mut sub_dir = root_dir
                    .open_dir(dir_name)
                    .map_err(SdStorageError::Filesystem)?;
                let read = read_from_dir(&mut sub_dir, name, out);
                sub_dir.close().map_err(SdStorageError::Filesystem)?;
                read
            }
            None => read_from_dir(&mut root_dir, name, out),
        }
        .map_err(SdStorageError::Filesystem)?;

        root_dir.close().map_err(SdStorageError::Filesystem)?;
        volume.close().map_err(SdStorageError::Filesystem)?;

        debug!(
            "sd: read name={} bytes={} card_bytes={}",
            name, read, card_size_bytes
        );
        Ok(read)
    }
}

impl<BUS, CS, DELAY> QuoteLibrary for SdStorage<BUS, CS, DELAY>
where
    BUS: SpiBus<u8>,
    CS: OutputPin,
    DELAY: DelayNs,
    BUS::Error: core::fmt::Debug,
    CS::Error: core::fmt::Debug,
{
    type Error = SdStorageError<BUS::Error, CS::Error>;

    fn read_quote(&mut self, index: u16, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let mut name = String::<12>::new();
        write!(name, "{}.TXT", index).map_err(|_| SdStorageError::FileName)?;
        self.read_file(Some(QUOTES_DIR), &name, buf)
    }
}

fn read_from_dir<D, T, const MAX_DIRS: usize, const MAX_FILES: usize, const MAX_VOLUMES: usize>(
    dir: &mut Directory<'_, D, T, MAX_DIRS, MAX_FILES, MAX_VOLUMES>,
    name: &str,
    out: &mut [u8],
) -> Result<usize, embedded_sdmmc::Error<D::Error>>
where
    D: BlockDevice,
    T: TimeSource,
{
    let mut file = dir.open_file_in_dir(name, Mode::ReadOnly)?;

    let mut read_total = 0usize;
    while read_total < out.len() && !file.is_eof() {
        let read_now = file.read(&mut out[read_total..])?;
        if read_now == 0 {
            break;
        }
        read_total += read_now;
    }

    file.close()?;
    Ok(read_total)
}
