//! Persistence of the last computed estimate.
//!
//! The record is a single IEEE-754 single written little endian across
//! four consecutive byte addresses, matching byte-addressed EEPROM and
//! FRAM parts. The value round-trips bit-exact: the packed 16-bit codec
//! is never applied here.

/// Byte-addressed persistent memory.
pub trait RecordStore {
    type Error;

    fn write_byte(&mut self, addr: usize, v: u8) -> Result<(), Self::Error>;

    fn read_byte(&mut self, addr: usize) -> Result<u8, Self::Error>;

    /// Write `bpm` across `addr .. addr + 4`.
    fn store_bpm(&mut self, addr: usize, bpm: f32) -> Result<(), Self::Error> {
        for (i, b) in bpm.to_le_bytes().iter().enumerate() {
            self.write_byte(addr + i, *b)?;
        }

        Ok(())
    }

    /// Read the last estimate back, bit-exact.
    fn load_bpm(&mut self, addr: usize) -> Result<f32, Self::Error> {
        let mut bytes = [0u8; 4];
        for (i, b) in bytes.iter_mut().enumerate() {
            *b = self.read_byte(addr + i)?;
        }

        Ok(f32::from_le_bytes(bytes))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, defmt::Format)]
pub enum StoreError {
    OutOfRange,
}

/// RAM-backed store for tests and host runs.
pub struct MemStore<const SZ: usize> {
    mem: [u8; SZ],
}

impl<const SZ: usize> MemStore<SZ> {
    pub fn new() -> MemStore<SZ> {
        MemStore { mem: [0u8; SZ] }
    }
}

impl<const SZ: usize> RecordStore for MemStore<SZ> {
    type Error = StoreError;

    fn write_byte(&mut self, addr: usize, v: u8) -> Result<(), StoreError> {
        *self.mem.get_mut(addr).ok_or(StoreError::OutOfRange)? = v;
        Ok(())
    }

    fn read_byte(&mut self, addr: usize) -> Result<u8, StoreError> {
        self.mem.get(addr).copied().ok_or(StoreError::OutOfRange)
    }
}
