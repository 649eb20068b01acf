//! Tigervision 3F and its RAM-carrying extension 3E.
//!
//! The image is a run of 2K banks. The upper half of the window always
//! shows the last bank. Writes to $00-$3F (TIA space, seen by snooping)
//! select the bank in the lower half. On 3E boards a write to $3E
//! instead pages a 1K RAM bank into the lower half (read $000-$3FF,
//! write $400-$7FF) until the next $3F write.

use crate::{CartridgeError, Scheme, check_size};

const BANK_SIZE: usize = 0x800;
const RAM_BANK_SIZE: usize = 0x400;
const RAM_BANKS: usize = 32;
const MAX_ROM: usize = 256 * BANK_SIZE;

#[derive(Debug, Clone)]
pub struct Tigervision {
    rom: Box<[u8]>,
    bank: usize,
    bank_mask: usize,
    /// Empty on 3F boards.
    ram: Box<[u8]>,
    ram_bank: usize,
    ram_enabled: bool,
}

impl Tigervision {
    pub(crate) fn new(rom: &[u8], with_ram: bool) -> Result<Self, CartridgeError> {
        let scheme = if with_ram {
            Scheme::Tigervision3E
        } else {
            Scheme::Tigervision3F
        };
        let len = rom.len();
        check_size(scheme, rom, len >= BANK_SIZE && len <= MAX_ROM && len.is_power_of_two())?;
        let ram_size = if with_ram { RAM_BANKS * RAM_BANK_SIZE } else { 0 };
        Ok(Self {
            rom: rom.into(),
            bank: 0,
            bank_mask: len / BANK_SIZE - 1,
            ram: vec![0; ram_size].into_boxed_slice(),
            ram_bank: 0,
            ram_enabled: false,
        })
    }

    #[must_use]
    pub fn bank(&self) -> usize {
        self.bank
    }

    #[must_use]
    pub fn ram_enabled(&self) -> bool {
        self.ram_enabled
    }

    pub(crate) fn reset(&mut self) {
        self.bank = 0;
        self.ram_bank = 0;
        self.ram_enabled = false;
    }

    /// Returns true if the byte went to RAM.
    pub(crate) fn write(&mut self, offset: u16, data: u8) -> bool {
        if self.ram_enabled && (0x400..=0x7FF).contains(&offset) {
            self.ram[self.ram_base() + usize::from(offset & 0x3FF)] = data;
            return true;
        }
        false
    }

    pub(crate) fn fetch(&self, offset: u16) -> u8 {
        let index = usize::from(offset);
        if offset >= 0x800 {
            return self.rom[self.rom.len() - BANK_SIZE + (index & 0x7FF)];
        }
        if self.ram_enabled {
            // Write port reads back as the read port
            return self.ram[self.ram_base() + (index & 0x3FF)];
        }
        self.rom[self.bank * BANK_SIZE + index]
    }

    pub(crate) fn tap(&mut self, address: u16, data: u8) {
        match address & 0x1FFF {
            0x3E if !self.ram.is_empty() => {
                self.ram_bank = usize::from(data) % RAM_BANKS;
                self.ram_enabled = true;
            }
            0x00..=0x3F => {
                self.bank = usize::from(data) & self.bank_mask;
                self.ram_enabled = false;
            }
            _ => {}
        }
    }

    fn ram_base(&self) -> usize {
        self.ram_bank * RAM_BANK_SIZE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rom(banks: usize) -> Vec<u8> {
        (0..banks * BANK_SIZE).map(|i| (i / BANK_SIZE) as u8).collect()
    }

    #[test]
    fn tia_writes_select_lower_bank() {
        let mut cart = Tigervision::new(&rom(4), false).unwrap();
        assert_eq!(cart.fetch(0x800), 3, "upper half is the last bank");
        cart.tap(0x3F, 2);
        assert_eq!(cart.fetch(0x000), 2);
        cart.tap(0x3F, 6);
        assert_eq!(cart.bank(), 2, "bank number masked to the image");
        cart.tap(0x3E, 1);
        assert_eq!(cart.bank(), 1, "3F boards treat $3E like any TIA write");
    }

    #[test]
    fn three_e_pages_ram() {
        let mut cart = Tigervision::new(&rom(4), true).unwrap();
        cart.tap(0x3E, 5);
        assert!(cart.ram_enabled());
        assert!(cart.write(0x410, 0x77));
        assert_eq!(cart.fetch(0x010), 0x77);

        cart.tap(0x3F, 1);
        assert!(!cart.ram_enabled());
        assert_eq!(cart.fetch(0x010), 1);
        assert!(!cart.write(0x410, 0x00));

        cart.tap(0x3E, 5);
        assert_eq!(cart.fetch(0x010), 0x77, "RAM survives bank switches");
    }
}
