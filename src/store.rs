//! Persistent leaderboard storage on a block-erase, block-write device.
//!
//! The leaderboard is stored as one record at the start of the device:
//!
//! ```text
//! magic: u32 LE | version: u16 LE | len: u16 LE | crc32: u32 LE | postcard payload
//! ```
//!
//! The record is padded with `0xFF` (the erased state) up to the device's
//! write granularity. A record that fails any header or CRC check reads back
//! as an empty leaderboard, which is also what a freshly erased device holds.

use core::fmt;

use crc32fast::Hasher;
use embedded_storage::nor_flash::NorFlash;
use serde::Serialize;

use crate::score::Leaderboard;

const MAGIC: u32 = 0x4352_5331; // 'CRS1'
const VERSION: u16 = 1;
const HEADER_LEN: usize = 12;

/// Upper bound of the postcard-encoded leaderboard: three entries of a length
/// prefix, eleven name bytes and a varint value.
pub const PAYLOAD_MAX: usize = 48;
/// Largest region this store will ever read or write.
pub const REGION_MAX: usize = 256;

/// Region size for a device with the given write granularity.
pub const fn region_size(granularity: usize) -> usize {
    (HEADER_LEN + PAYLOAD_MAX).div_ceil(granularity) * granularity
}

/// A non-volatile region that can only be erased and rewritten as a whole.
pub trait BlockDevice {
    type Error: fmt::Debug;

    /// Smallest unit a write may cover.
    const WRITE_GRANULARITY: usize;

    /// Bytes available in the region.
    fn capacity(&self) -> usize;

    fn erase_block(&mut self) -> Result<(), Self::Error>;

    /// Program `bytes` at the start of the region. Only valid after an erase.
    fn write_block(&mut self, bytes: &[u8]) -> Result<(), Self::Error>;

    /// Fill `buf` from the start of the region.
    fn read_all(&mut self, buf: &mut [u8]) -> Result<(), Self::Error>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StoreError<E> {
    Device(E),
    /// The leaderboard did not fit the record payload.
    Encode,
    /// The device's region is smaller than one record.
    Geometry,
}

impl<E: fmt::Debug> fmt::Display for StoreError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Device(e) => write!(f, "storage device error: {e:?}"),
            Self::Encode => f.write_str("leaderboard does not fit the record"),
            Self::Geometry => f.write_str("storage region too small"),
        }
    }
}

fn calc_crc32(data: &[u8]) -> u32 {
    let mut h = Hasher::new();
    h.update(data);
    h.finalize()
}

fn encode<T: Serialize>(record: &T, out: &mut [u8]) -> Result<usize, postcard::Error> {
    let (header, payload) = out.split_at_mut(HEADER_LEN);
    let payload = &mut payload[..PAYLOAD_MAX];
    let len = postcard::to_slice(record, payload)?.len();
    let crc = calc_crc32(&payload[..len]);

    header[0..4].copy_from_slice(&MAGIC.to_le_bytes());
    header[4..6].copy_from_slice(&VERSION.to_le_bytes());
    header[6..8].copy_from_slice(&(len as u16).to_le_bytes());
    header[8..12].copy_from_slice(&crc.to_le_bytes());
    Ok(HEADER_LEN + len)
}

fn decode(raw: &[u8]) -> Option<Leaderboard> {
    let header = raw.get(..HEADER_LEN)?;
    let magic = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
    let version = u16::from_le_bytes([header[4], header[5]]);
    let len = usize::from(u16::from_le_bytes([header[6], header[7]]));
    let crc = u32::from_le_bytes([header[8], header[9], header[10], header[11]]);

    if magic != MAGIC || version != VERSION || len > PAYLOAD_MAX {
        return None;
    }
    let payload = raw.get(HEADER_LEN..HEADER_LEN + len)?;
    if calc_crc32(payload) != crc {
        return None;
    }
    let board: Leaderboard = postcard::from_bytes(payload).ok()?;
    // A record from an older build passes the CRC but not necessarily the
    // board's rules.
    Some(Leaderboard::from_entries(board.entries().clone()))
}

/// Loads and saves whole leaderboards on a [`BlockDevice`].
pub struct ScoreStore<B> {
    device: B,
}

impl<B: BlockDevice> ScoreStore<B> {
    pub const fn new(device: B) -> Self {
        Self { device }
    }

    /// Size of the region this store uses on `B`.
    pub const fn region_len() -> usize {
        region_size(B::WRITE_GRANULARITY)
    }

    fn check_geometry(&self) -> Result<usize, StoreError<B::Error>> {
        let len = Self::region_len();
        if len > REGION_MAX || len > self.device.capacity() {
            return Err(StoreError::Geometry);
        }
        Ok(len)
    }

    /// Read the leaderboard. Blank or corrupt content yields an empty board.
    pub fn load(&mut self) -> Result<Leaderboard, StoreError<B::Error>> {
        let len = self.check_geometry()?;
        let mut buf = [0xFF_u8; REGION_MAX];
        self.device
            .read_all(&mut buf[..len])
            .map_err(StoreError::Device)?;
        Ok(decode(&buf[..len]).unwrap_or_else(|| {
            debug!("score region blank or corrupt, starting empty");
            Leaderboard::new()
        }))
    }

    /// Erase the region and write `board` in full.
    pub fn save(&mut self, board: &Leaderboard) -> Result<(), StoreError<B::Error>> {
        let len = self.check_geometry()?;
        let mut buf = [0xFF_u8; REGION_MAX];
        encode(board, &mut buf).map_err(|_| StoreError::Encode)?;
        self.device.erase_block().map_err(StoreError::Device)?;
        self.device
            .write_block(&buf[..len])
            .map_err(StoreError::Device)?;
        Ok(())
    }

    pub fn device(&self) -> &B {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut B {
        &mut self.device
    }
}

// ── RAM-backed device ───────────────────────────────────────────────────────

/// Size of a [`RamBlock`] region.
pub const RAM_BLOCK_SIZE: usize = 256;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RamBlockError {
    /// Written without erasing first.
    NotErased,
    TooLarge,
}

/// A block device in RAM with flash semantics: writes require a prior erase.
///
/// Counts erases and writes so callers can tell whether an operation touched
/// the device at all.
#[derive(Clone, Debug)]
pub struct RamBlock {
    bytes: [u8; RAM_BLOCK_SIZE],
    erased: bool,
    erases: u32,
    writes: u32,
}

impl RamBlock {
    pub const fn new() -> Self {
        Self {
            bytes: [0xFF; RAM_BLOCK_SIZE],
            erased: true,
            erases: 0,
            writes: 0,
        }
    }

    pub const fn erase_count(&self) -> u32 {
        self.erases
    }

    pub const fn write_count(&self) -> u32 {
        self.writes
    }

    /// Raw contents, for tests that corrupt the stored record.
    pub fn bytes_mut(&mut self) -> &mut [u8; RAM_BLOCK_SIZE] {
        &mut self.bytes
    }
}

impl Default for RamBlock {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockDevice for RamBlock {
    type Error = RamBlockError;

    const WRITE_GRANULARITY: usize = 32;

    fn capacity(&self) -> usize {
        RAM_BLOCK_SIZE
    }

    fn erase_block(&mut self) -> Result<(), Self::Error> {
        self.bytes.fill(0xFF);
        self.erased = true;
        self.erases += 1;
        Ok(())
    }

    fn write_block(&mut self, bytes: &[u8]) -> Result<(), Self::Error> {
        if !self.erased {
            return Err(RamBlockError::NotErased);
        }
        let dst = self
            .bytes
            .get_mut(..bytes.len())
            .ok_or(RamBlockError::TooLarge)?;
        dst.copy_from_slice(bytes);
        self.erased = false;
        self.writes += 1;
        Ok(())
    }

    fn read_all(&mut self, buf: &mut [u8]) -> Result<(), Self::Error> {
        let src = self.bytes.get(..buf.len()).ok_or(RamBlockError::TooLarge)?;
        buf.copy_from_slice(src);
        Ok(())
    }
}

// ── NOR flash sector ────────────────────────────────────────────────────────

/// One erase sector of a NOR flash, used as a [`BlockDevice`].
pub struct NorBlock<F> {
    flash: F,
    offset: u32,
}

impl<F: NorFlash> NorBlock<F> {
    /// The sector starting at `offset`. `None` unless `offset` is sector
    /// aligned and the whole sector lies on the flash.
    pub fn at(flash: F, offset: u32) -> Option<Self> {
        let start = usize::try_from(offset).ok()?;
        let end = start.checked_add(F::ERASE_SIZE)?;
        if start % F::ERASE_SIZE != 0 || end > flash.capacity() {
            return None;
        }
        Some(Self { flash, offset })
    }

    /// The last sector of the flash, clear of the application image.
    pub fn last_sector(flash: F) -> Option<Self> {
        let start = flash.capacity().checked_sub(F::ERASE_SIZE)?;
        Self::at(flash, u32::try_from(start).ok()?)
    }

    pub const fn offset(&self) -> u32 {
        self.offset
    }

    pub fn flash(&self) -> &F {
        &self.flash
    }
}

impl<F: NorFlash> BlockDevice for NorBlock<F> {
    type Error = F::Error;

    const WRITE_GRANULARITY: usize = F::WRITE_SIZE;

    fn capacity(&self) -> usize {
        F::ERASE_SIZE
    }

    fn erase_block(&mut self) -> Result<(), Self::Error> {
        // `at` guarantees the sector fits in u32 offsets.
        let end = self.offset + F::ERASE_SIZE as u32;
        self.flash.erase(self.offset, end)
    }

    fn write_block(&mut self, bytes: &[u8]) -> Result<(), Self::Error> {
        self.flash.write(self.offset, bytes)
    }

    fn read_all(&mut self, buf: &mut [u8]) -> Result<(), Self::Error> {
        self.flash.read(self.offset, buf)
    }
}

#[cfg(test)]
mod tests {
    use embedded_storage::nor_flash::{
        ErrorType,
        NorFlashErrorKind,
        ReadNorFlash,
    };

    use super::*;
    use crate::score::{
        Name,
        ScoreEntry,
    };

    /// Four 64-byte sectors that only clear bits on write, like real NOR.
    struct SmallFlash([u8; 256]);

    impl ErrorType for SmallFlash {
        type Error = NorFlashErrorKind;
    }

    impl ReadNorFlash for SmallFlash {
        const READ_SIZE: usize = 1;

        fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
            let at = offset as usize;
            let src = self.0.get(at..at + bytes.len()).ok_or(NorFlashErrorKind::OutOfBounds)?;
            bytes.copy_from_slice(src);
            Ok(())
        }

        fn capacity(&self) -> usize {
            self.0.len()
        }
    }

    impl NorFlash for SmallFlash {
        const WRITE_SIZE: usize = 4;
        const ERASE_SIZE: usize = 64;

        fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
            let cells = self
                .0
                .get_mut(from as usize..to as usize)
                .ok_or(NorFlashErrorKind::OutOfBounds)?;
            cells.fill(0xFF);
            Ok(())
        }

        fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
            if offset as usize % Self::WRITE_SIZE != 0 || bytes.len() % Self::WRITE_SIZE != 0 {
                return Err(NorFlashErrorKind::NotAligned);
            }
            let at = offset as usize;
            let cells = self
                .0
                .get_mut(at..at + bytes.len())
                .ok_or(NorFlashErrorKind::OutOfBounds)?;
            for (cell, b) in cells.iter_mut().zip(bytes) {
                *cell &= *b;
            }
            Ok(())
        }
    }

    fn sample() -> Leaderboard {
        let mut board = Leaderboard::new();
        board.admit(&Name::new("amy").unwrap(), 100);
        board.admit(&Name::new("bob").unwrap(), 50);
        board
    }

    #[test]
    fn region_is_rounded_to_granularity() {
        assert_eq!(region_size(32), 64);
        assert_eq!(region_size(256), 256);
        assert_eq!(region_size(1), HEADER_LEN + PAYLOAD_MAX);
    }

    #[test]
    fn full_board_fits_the_payload() {
        let mut board = Leaderboard::new();
        for n in ["Aaaaaaaaaaa", "Bbbbbbbbbbb", "Ccccccccccc"] {
            board.admit(&Name::new(n).unwrap(), 999);
        }
        let mut buf = [0xFF; REGION_MAX];
        assert!(encode(&board, &mut buf).unwrap() <= HEADER_LEN + PAYLOAD_MAX);
    }

    #[test]
    fn blank_device_reads_empty() {
        let mut store = ScoreStore::new(RamBlock::new());
        assert_eq!(store.load().unwrap(), Leaderboard::new());
    }

    #[test]
    fn save_erases_then_writes() {
        let mut store = ScoreStore::new(RamBlock::new());
        store.save(&sample()).unwrap();
        assert_eq!(store.device().erase_count(), 1);
        assert_eq!(store.device().write_count(), 1);
        assert_eq!(store.load().unwrap(), sample());
    }

    #[test]
    fn corrupt_payload_reads_empty() {
        let mut store = ScoreStore::new(RamBlock::new());
        store.save(&sample()).unwrap();
        store.device_mut().bytes_mut()[HEADER_LEN + 2] ^= 0x55;
        assert_eq!(store.load().unwrap(), Leaderboard::new());
    }

    #[test]
    fn stored_entries_are_checked_on_load() {
        // CRC-valid, but over the cap, out of order and with a repeated name.
        let raw = [
            ScoreEntry {
                name: Name::new("bob").unwrap(),
                value: 40,
            },
            ScoreEntry {
                name: Name::new("amy").unwrap(),
                value: 4000,
            },
            ScoreEntry {
                name: Name::new("bob").unwrap(),
                value: 60,
            },
        ];
        let mut buf = [0xFF; REGION_MAX];
        encode(&raw, &mut buf).unwrap();
        let mut dev = RamBlock::new();
        dev.write_block(&buf[..ScoreStore::<RamBlock>::region_len()]).unwrap();

        let board = ScoreStore::new(dev).load().unwrap();
        let values: [u32; 3] = core::array::from_fn(|i| board.get(i).unwrap().value);
        assert_eq!(values, [999, 60, 0]);
        assert_eq!(board.get(1).unwrap().name.as_str(), "Bob");
    }

    #[test]
    fn flash_sector_keeps_the_board() {
        let mut flash = SmallFlash([0; 256]);
        flash.erase(0, 256).unwrap();
        let block = NorBlock::last_sector(flash).unwrap();
        assert_eq!(block.offset(), 192);

        let mut store = ScoreStore::new(block);
        let mut other = Leaderboard::new();
        other.admit(&Name::new("zed").unwrap(), 900);
        store.save(&other).unwrap();
        // Writes only clear bits, so this reads back intact only if the
        // sector was erased in between.
        store.save(&sample()).unwrap();
        assert_eq!(store.load().unwrap(), sample());
        // Nothing outside the sector was touched.
        assert!(store.device().flash().0[..192].iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn flash_sector_must_be_aligned_and_on_chip() {
        assert!(NorBlock::at(SmallFlash([0xFF; 256]), 32).is_none());
        assert!(NorBlock::at(SmallFlash([0xFF; 256]), 256).is_none());
        assert!(NorBlock::at(SmallFlash([0xFF; 256]), 128).is_some());
    }

    #[test]
    fn write_without_erase_fails() {
        let mut dev = RamBlock::new();
        dev.write_block(&[1, 2, 3]).unwrap();
        assert_eq!(dev.write_block(&[1]), Err(RamBlockError::NotErased));
    }
}
