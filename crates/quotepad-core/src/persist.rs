//! Length-prefixed byte slots layered on a raw, commit-based byte store.
//!
//! Layout (512 bytes total):
//!
//! | slot        | offset | max payload |
//! |-------------|--------|-------------|
//! | quote cache | 0      | 255         |
//! | credential  | 400    | 97          |
//! | watermark   | 504    | 2           |
//!
//! Each slot is one length byte followed by up to `max_len` raw bytes. Blank
//! images are zero-filled so every slot starts empty. A length byte larger
//! than the slot allows (0xFF on erased flash) also reads as an empty slot;
//! the quote slot spans the full byte range and relies on the zero fill.

use heapless::String;
use log::warn;

use crate::error::QuoteError;

/// Size of the raw byte image backing all slots.
pub const STORE_BYTES: usize = 512;

/// Largest payload a one-byte length prefix can describe.
pub const MAX_SLOT_PAYLOAD: usize = u8::MAX as usize;

pub const QUOTE_SLOT: Slot = Slot::new(0, MAX_SLOT_PAYLOAD);
pub const CREDENTIAL_SLOT: Slot = Slot::new(400, 97);
pub const WATERMARK_SLOT: Slot = Slot::new(504, 2);

const _: () = {
    assert!(!QUOTE_SLOT.overlaps(CREDENTIAL_SLOT));
    assert!(!QUOTE_SLOT.overlaps(WATERMARK_SLOT));
    assert!(!CREDENTIAL_SLOT.overlaps(WATERMARK_SLOT));
    assert!(WATERMARK_SLOT.end() <= STORE_BYTES);
};

/// Byte-addressable backing store with an explicit durability point.
pub trait RawStore {
    fn capacity(&self) -> usize;
    fn read_byte(&self, offset: usize) -> u8;
    fn write_byte(&mut self, offset: usize, value: u8);
    /// Makes every write since the previous commit durable.
    fn commit(&mut self) -> bool;
}

/// A fixed byte range holding one length-prefixed value.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Slot {
    pub offset: usize,
    pub max_len: usize,
}

impl Slot {
    pub const fn new(offset: usize, max_len: usize) -> Self {
        let max_len = if max_len > MAX_SLOT_PAYLOAD {
            MAX_SLOT_PAYLOAD
        } else {
            max_len
        };
        Self { offset, max_len }
    }

    /// Bytes occupied including the length prefix.
    pub const fn span(self) -> usize {
        1 + self.max_len
    }

    pub const fn end(self) -> usize {
        self.offset + self.span()
    }

    pub const fn overlaps(self, other: Slot) -> bool {
        self.offset < other.end() && other.offset < self.end()
    }
}

/// RAM-only store. Used in tests and when no flash partition is available.
#[derive(Clone, Debug)]
pub struct MemoryStore<const N: usize> {
    bytes: [u8; N],
    commits: u32,
}

impl<const N: usize> MemoryStore<N> {
    /// A blank, zero-filled store with every slot empty.
    pub const fn new() -> Self {
        Self {
            bytes: [0; N],
            commits: 0,
        }
    }

    pub fn commits(&self) -> u32 {
        self.commits
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl<const N: usize> Default for MemoryStore<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> RawStore for MemoryStore<N> {
    fn capacity(&self) -> usize {
        N
    }

    fn read_byte(&self, offset: usize) -> u8 {
        self.bytes.get(offset).copied().unwrap_or(0xFF)
    }

    fn write_byte(&mut self, offset: usize, value: u8) {
        if let Some(byte) = self.bytes.get_mut(offset) {
            *byte = value;
        }
    }

    fn commit(&mut self) -> bool {
        self.commits = self.commits.saturating_add(1);
        true
    }
}

/// Slot-level access to a [`RawStore`].
#[derive(Debug)]
pub struct PersistentStore<R> {
    raw: R,
}

impl<R> PersistentStore<R>
where
    R: RawStore,
{
    pub const fn new(raw: R) -> Self {
        Self { raw }
    }

    pub fn raw(&self) -> &R {
        &self.raw
    }

    pub fn raw_mut(&mut self) -> &mut R {
        &mut self.raw
    }

    pub fn into_inner(self) -> R {
        self.raw
    }

    /// Writes `bytes` into `slot` without committing. Payloads longer than the
    /// slot are truncated; returns the stored length.
    pub fn stage_bytes(&mut self, slot: Slot, bytes: &[u8]) -> usize {
        if slot.end() > self.raw.capacity() {
            warn!(
                "store: slot at {} does not fit capacity {}",
                slot.offset,
                self.raw.capacity()
            );
            return 0;
        }

        let len = bytes.len().min(slot.max_len);
        self.raw.write_byte(slot.offset, len as u8);
        for (i, byte) in bytes[..len].iter().enumerate() {
            self.raw.write_byte(slot.offset + 1 + i, *byte);
        }
        len
    }

    /// Stages a string, truncating at a character boundary if needed.
    pub fn stage_str(&mut self, slot: Slot, text: &str) -> usize {
        let mut end = text.len().min(slot.max_len);
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        self.stage_bytes(slot, &text.as_bytes()[..end])
    }

    pub fn commit(&mut self) -> Result<(), QuoteError> {
        if self.raw.commit() {
            Ok(())
        } else {
            warn!("store: commit failed; cached values may be stale");
            Err(QuoteError::PersistentStoreCommitFailure)
        }
    }

    pub fn write_str(&mut self, slot: Slot, text: &str) -> Result<(), QuoteError> {
        self.stage_str(slot, text);
        self.commit()
    }

    /// Length stored in `slot`, or zero for an empty or erased slot.
    pub fn stored_len(&self, slot: Slot) -> usize {
        if slot.end() > self.raw.capacity() {
            return 0;
        }
        let len = self.raw.read_byte(slot.offset) as usize;
        if len > slot.max_len { 0 } else { len }
    }

    /// Copies the slot payload into `out`; returns the number of bytes copied.
    pub fn read_bytes(&self, slot: Slot, out: &mut [u8]) -> usize {
        let len = self.stored_len(slot).min(out.len());
        for (i, byte) in out[..len].iter_mut().enumerate() {
            *byte = self.raw.read_byte(slot.offset + 1 + i);
        }
        len
    }

    /// Reads the slot as UTF-8. Invalid content reads as an empty string.
    pub fn read_str<const N: usize>(&self, slot: Slot) -> String<N> {
        let mut buf = [0u8; MAX_SLOT_PAYLOAD];
        let len = self.read_bytes(slot, &mut buf);

        let mut out = String::new();
        if let Ok(text) = core::str::from_utf8(&buf[..len]) {
            for ch in text.chars() {
                if out.push(ch).is_err() {
                    break;
                }
            }
        }
        out
    }
}
