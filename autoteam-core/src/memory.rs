use log::{debug, warn};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("could not attach to the emulator: {0}")]
    Attach(String),

    #[error("memory access while not attached to the emulator")]
    NotAttached,

    #[error("failed to read word at 0x{address:08X}: {reason}")]
    Read { address: u32, reason: String },

    #[error("failed to write at 0x{address:08X}: {reason}")]
    Write { address: u32, reason: String },

    #[error("failed to detach from the emulator: {0}")]
    Detach(String),
}

/// Absolute-address access to the emulated console's memory. Words are
/// big-endian, as the console stores them.
pub trait MemoryAccess {
    fn attach(&mut self) -> Result<(), MemoryError>;
    fn detach(&mut self) -> Result<(), MemoryError>;
    fn read_word(&mut self, address: u32) -> Result<u32, MemoryError>;
    fn write_word(&mut self, address: u32, value: u32) -> Result<(), MemoryError>;
    fn write_byte(&mut self, address: u32, value: u8) -> Result<(), MemoryError>;
}

impl<T: MemoryAccess + ?Sized> MemoryAccess for &mut T {
    fn attach(&mut self) -> Result<(), MemoryError> {
        (**self).attach()
    }

    fn detach(&mut self) -> Result<(), MemoryError> {
        (**self).detach()
    }

    fn read_word(&mut self, address: u32) -> Result<u32, MemoryError> {
        (**self).read_word(address)
    }

    fn write_word(&mut self, address: u32, value: u32) -> Result<(), MemoryError> {
        (**self).write_word(address, value)
    }

    fn write_byte(&mut self, address: u32, value: u8) -> Result<(), MemoryError> {
        (**self).write_byte(address, value)
    }
}

/// An attached memory handle. Detaches when dropped, so a failed write still
/// releases the emulator; use [`MemorySession::finish`] to see detach errors.
pub struct MemorySession<'a, M: MemoryAccess + ?Sized> {
    mem: &'a mut M,
    open: bool,
}

impl<'a, M: MemoryAccess + ?Sized> MemorySession<'a, M> {
    pub fn open(mem: &'a mut M) -> Result<Self, MemoryError> {
        mem.attach()?;
        Ok(Self { mem, open: true })
    }

    pub fn read_word(&mut self, address: u32) -> Result<u32, MemoryError> {
        self.mem.read_word(address)
    }

    pub fn write_word(&mut self, address: u32, value: u32) -> Result<(), MemoryError> {
        debug!("write_word 0x{:08X} = 0x{:08X}", address, value);
        self.mem.write_word(address, value)
    }

    pub fn write_byte(&mut self, address: u32, value: u8) -> Result<(), MemoryError> {
        debug!("write_byte 0x{:08X} = 0x{:02X}", address, value);
        self.mem.write_byte(address, value)
    }

    pub fn finish(mut self) -> Result<(), MemoryError> {
        self.open = false;
        self.mem.detach()
    }
}

impl<M: MemoryAccess + ?Sized> Drop for MemorySession<'_, M> {
    fn drop(&mut self) {
        if self.open {
            if let Err(e) = self.mem.detach() {
                warn!("{}", e);
            }
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MemoryWrite {
    Word { address: u32, value: u32 },
    Byte { address: u32, value: u8 },
}

/// In-process stand-in for the emulator's memory. Keeps a byte image and the
/// ordered list of writes.
#[derive(Debug, Default)]
pub struct RecordingMemory {
    bytes: BTreeMap<u32, u8>,
    pub writes: Vec<MemoryWrite>,
    pub attached: bool,
    pub attach_count: usize,
    /// Writes to this address fail, for exercising error paths.
    pub fail_at: Option<u32>,
}

impl RecordingMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// A memory whose writes to `address` fail.
    pub fn failing_at(address: u32) -> Self {
        Self {
            fail_at: Some(address),
            ..Self::default()
        }
    }

    pub fn byte(&self, address: u32) -> u8 {
        self.bytes.get(&address).copied().unwrap_or(0)
    }

    pub fn word(&self, address: u32) -> u32 {
        u32::from_be_bytes([
            self.byte(address),
            self.byte(address.wrapping_add(1)),
            self.byte(address.wrapping_add(2)),
            self.byte(address.wrapping_add(3)),
        ])
    }

    fn check(&self, address: u32) -> Result<(), MemoryError> {
        if !self.attached {
            return Err(MemoryError::NotAttached);
        }
        if self.fail_at == Some(address) {
            return Err(MemoryError::Write {
                address,
                reason: "injected failure".to_string(),
            });
        }
        Ok(())
    }
}

impl MemoryAccess for RecordingMemory {
    fn attach(&mut self) -> Result<(), MemoryError> {
        self.attached = true;
        self.attach_count += 1;
        Ok(())
    }

    fn detach(&mut self) -> Result<(), MemoryError> {
        self.attached = false;
        Ok(())
    }

    fn read_word(&mut self, address: u32) -> Result<u32, MemoryError> {
        if !self.attached {
            return Err(MemoryError::NotAttached);
        }
        Ok(self.word(address))
    }

    fn write_word(&mut self, address: u32, value: u32) -> Result<(), MemoryError> {
        self.check(address)?;
        for (i, b) in value.to_be_bytes().into_iter().enumerate() {
            self.bytes.insert(address.wrapping_add(i as u32), b);
        }
        self.writes.push(MemoryWrite::Word { address, value });
        Ok(())
    }

    fn write_byte(&mut self, address: u32, value: u8) -> Result<(), MemoryError> {
        self.check(address)?;
        self.bytes.insert(address, value);
        self.writes.push(MemoryWrite::Byte { address, value });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn words_are_big_endian() {
        let mut mem = RecordingMemory::new();
        let mut s = MemorySession::open(&mut mem).unwrap();
        s.write_word(0x8000_0000, 0x1234_5678).unwrap();
        assert_eq!(s.read_word(0x8000_0000).unwrap(), 0x1234_5678);
        s.finish().unwrap();
        assert_eq!(mem.byte(0x8000_0000), 0x12);
        assert_eq!(mem.byte(0x8000_0003), 0x78);
    }

    #[test]
    fn writes_require_attach() {
        let mut mem = RecordingMemory::new();
        assert!(matches!(
            mem.write_byte(0x8000_0000, 1),
            Err(MemoryError::NotAttached)
        ));
    }

    #[test]
    fn session_detaches_after_failed_write() {
        let mut mem = RecordingMemory::failing_at(0x8000_0004);
        {
            let mut s = MemorySession::open(&mut mem).unwrap();
            s.write_word(0x8000_0000, 1).unwrap();
            assert!(s.write_word(0x8000_0004, 2).is_err());
        }
        assert!(!mem.attached);
        assert_eq!(mem.writes.len(), 1);
    }
}
