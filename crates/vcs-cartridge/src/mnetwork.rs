//! M-Network E7.
//!
//! | Window        | Contents                                          |
//! |---------------|---------------------------------------------------|
//! | $000-$7FF     | 2K ROM bank 0-6, or 1K RAM in bank 7              |
//! | $800-$9FF     | 256-byte RAM page (write $800, read $900)         |
//! | $A00-$FFF     | last 1.5K of the image                            |
//!
//! Hotspots $FE0-$FE7 select the lower bank, $FE8-$FEB the RAM page.

use crate::{CartridgeError, Scheme, check_size};

const BANK_SIZE: usize = 0x800;
const RAM_BANK: usize = 7;
const LARGE_RAM: usize = 0x400;
const PAGE_SIZE: usize = 0x100;

#[derive(Debug, Clone)]
pub struct MNetwork {
    rom: Box<[u8]>,
    bank: usize,
    page: usize,
    /// 1K lower RAM followed by four 256-byte pages.
    ram: Box<[u8]>,
}

impl MNetwork {
    pub(crate) fn new(rom: &[u8]) -> Result<Self, CartridgeError> {
        check_size(Scheme::E7, rom, rom.len() == 8 * BANK_SIZE)?;
        Ok(Self {
            rom: rom.into(),
            bank: 0,
            page: 0,
            ram: vec![0; LARGE_RAM + 4 * PAGE_SIZE].into_boxed_slice(),
        })
    }

    #[must_use]
    pub fn bank(&self) -> usize {
        self.bank
    }

    #[must_use]
    pub fn ram_page(&self) -> usize {
        self.page
    }

    pub(crate) fn reset(&mut self) {
        self.bank = 0;
        self.page = 0;
    }

    pub(crate) fn read(&mut self, offset: u16) -> u8 {
        self.hotspot(offset);
        self.fetch(offset)
    }

    /// Returns true if the byte went to RAM.
    pub(crate) fn write(&mut self, offset: u16, data: u8) -> bool {
        self.hotspot(offset);
        let index = usize::from(offset);
        match offset {
            0x000..=0x3FF if self.bank == RAM_BANK => self.ram[index] = data,
            0x800..=0x8FF => self.ram[self.page_base() + (index & 0xFF)] = data,
            _ => return false,
        }
        true
    }

    pub(crate) fn fetch(&self, offset: u16) -> u8 {
        let index = usize::from(offset);
        match offset {
            0x400..=0x7FF if self.bank == RAM_BANK => self.ram[index & 0x3FF],
            0x000..=0x7FF => self.rom[self.bank * BANK_SIZE + index],
            0x900..=0x9FF => self.ram[self.page_base() + (index & 0xFF)],
            0xA00..=0xFFF => self.rom[RAM_BANK * BANK_SIZE + (index & 0x7FF)],
            // RAM write port
            _ => 0,
        }
    }

    fn page_base(&self) -> usize {
        LARGE_RAM + self.page * PAGE_SIZE
    }

    fn hotspot(&mut self, offset: u16) {
        match offset {
            0xFE0..=0xFE7 => self.bank = usize::from(offset & 7),
            0xFE8..=0xFEB => self.page = usize::from(offset & 3),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cart() -> MNetwork {
        let rom: Vec<u8> = (0..8 * BANK_SIZE).map(|i| (i / BANK_SIZE) as u8).collect();
        MNetwork::new(&rom).unwrap()
    }

    #[test]
    fn lower_bank_and_fixed_top() {
        let mut cart = cart();
        assert_eq!(cart.read(0xFE3), 7, "hotspot reads the fixed area");
        assert_eq!(cart.fetch(0x123), 3);
        assert_eq!(cart.fetch(0xA00), 7);
    }

    #[test]
    fn bank_seven_is_ram() {
        let mut cart = cart();
        cart.read(0xFE7);
        assert!(cart.write(0x010, 0x5A));
        assert_eq!(cart.fetch(0x410), 0x5A);

        cart.read(0xFE0);
        assert!(!cart.write(0x010, 0x00), "ROM bank ignores writes");
        assert_eq!(cart.fetch(0x410), 0);
    }

    #[test]
    fn ram_pages() {
        let mut cart = cart();
        cart.write(0x805, 0x11);
        cart.read(0xFE9);
        assert_eq!(cart.ram_page(), 1);
        assert_eq!(cart.fetch(0x905), 0);
        cart.write(0x805, 0x22);
        cart.read(0xFE8);
        assert_eq!(cart.fetch(0x905), 0x11);
    }
}
