//! Commavid CV: 1K RAM in the lower half of the window (read $000-$3FF,
//! write $400-$7FF) and a fixed 2K ROM in the upper half. A 4K image
//! contributes its last 2K.

use crate::{CartridgeError, Scheme, check_size};

const RAM_SIZE: usize = 0x400;
const ROM_WINDOW: usize = 0x800;

#[derive(Debug, Clone)]
pub struct Commavid {
    rom: Box<[u8]>,
    ram: Box<[u8]>,
}

impl Commavid {
    pub(crate) fn new(rom: &[u8]) -> Result<Self, CartridgeError> {
        check_size(Scheme::Cv, rom, matches!(rom.len(), 0x800 | 0x1000))?;
        Ok(Self {
            rom: rom[rom.len() - ROM_WINDOW..].into(),
            ram: vec![0; RAM_SIZE].into_boxed_slice(),
        })
    }

    /// Returns true if the byte went to RAM.
    pub(crate) fn write(&mut self, offset: u16, data: u8) -> bool {
        if (0x400..=0x7FF).contains(&offset) {
            self.ram[usize::from(offset & 0x3FF)] = data;
            return true;
        }
        false
    }

    pub(crate) fn fetch(&self, offset: u16) -> u8 {
        let index = usize::from(offset);
        match offset {
            0x000..=0x3FF => self.ram[index],
            0x800..=0xFFF => self.rom[index & 0x7FF],
            _ => 0,
        }
    }
}
