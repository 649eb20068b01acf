//! Unbanked 2K and 4K cartridges. A 2K image is mirrored across the
//! window.

use crate::{CartridgeError, Scheme, check_size};

#[derive(Debug, Clone)]
pub struct Plain {
    rom: Box<[u8]>,
}

impl Plain {
    pub(crate) fn new(rom: &[u8]) -> Result<Self, CartridgeError> {
        check_size(Scheme::Rom2K4K, rom, matches!(rom.len(), 0x800 | 0x1000))?;
        Ok(Self { rom: rom.into() })
    }

    pub(crate) fn fetch(&self, offset: u16) -> u8 {
        self.rom[usize::from(offset) & (self.rom.len() - 1)]
    }
}
