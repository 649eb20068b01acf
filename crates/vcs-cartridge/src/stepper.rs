//! Single-hotspot schemes: Dynacom Megaboy (DC) and FV.
//!
//! Neither selects a bank by address. Megaboy steps to the next of its
//! sixteen 4K banks on every touch of $FF0; FV flips to its other 4K bank
//! the first time $FD0 is read and then ignores the hotspot until reset.

use crate::{CartridgeError, Scheme, banked, check_size};

const BANK_SIZE: usize = 0x1000;
const MEGABOY_BANKS: usize = 16;
const MEGABOY_HOTSPOT: u16 = 0xFF0;
const FV_HOTSPOT: u16 = 0xFD0;

#[derive(Debug, Clone)]
pub struct Megaboy {
    rom: Box<[u8]>,
    bank: usize,
}

impl Megaboy {
    pub(crate) fn new(rom: &[u8]) -> Result<Self, CartridgeError> {
        check_size(Scheme::Dc, rom, rom.len() == MEGABOY_BANKS * BANK_SIZE)?;
        Ok(Self {
            rom: rom.into(),
            bank: 0,
        })
    }

    #[must_use]
    pub fn bank(&self) -> usize {
        self.bank
    }

    pub(crate) fn reset(&mut self) {
        self.bank = 0;
    }

    pub(crate) fn read(&mut self, offset: u16) -> u8 {
        self.write(offset);
        self.fetch(offset)
    }

    pub(crate) fn write(&mut self, offset: u16) {
        if offset == MEGABOY_HOTSPOT {
            self.bank = (self.bank + 1) % MEGABOY_BANKS;
        }
    }

    pub(crate) fn fetch(&self, offset: u16) -> u8 {
        banked(&self.rom, self.bank, BANK_SIZE, offset)
    }
}

#[derive(Debug, Clone)]
pub struct Fv {
    rom: Box<[u8]>,
    bank: usize,
    locked: bool,
}

impl Fv {
    pub(crate) fn new(rom: &[u8]) -> Result<Self, CartridgeError> {
        check_size(Scheme::Fv, rom, rom.len() == 2 * BANK_SIZE)?;
        Ok(Self {
            rom: rom.into(),
            bank: 0,
            locked: false,
        })
    }

    #[must_use]
    pub fn bank(&self) -> usize {
        self.bank
    }

    pub(crate) fn reset(&mut self) {
        self.bank = 0;
        self.locked = false;
    }

    pub(crate) fn read(&mut self, offset: u16) -> u8 {
        if offset == FV_HOTSPOT && !self.locked {
            self.locked = true;
            self.bank ^= 1;
        }
        self.fetch(offset)
    }

    pub(crate) fn fetch(&self, offset: u16) -> u8 {
        banked(&self.rom, self.bank, BANK_SIZE, offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rom(banks: usize) -> Vec<u8> {
        (0..banks * BANK_SIZE).map(|i| (i / BANK_SIZE) as u8).collect()
    }

    #[test]
    fn megaboy_steps_and_wraps() {
        let mut cart = Megaboy::new(&rom(16)).unwrap();
        assert_eq!(cart.read(0xFF0), 1, "data comes from the new bank");
        cart.write(0xFF0);
        assert_eq!(cart.bank(), 2, "writes step too");
        for _ in 0..14 {
            cart.read(0xFF0);
        }
        assert_eq!(cart.bank(), 0);
        cart.read(0xFF1);
        assert_eq!(cart.bank(), 0);
    }

    #[test]
    fn fv_switches_once() {
        let mut cart = Fv::new(&rom(2)).unwrap();
        assert_eq!(cart.fetch(0x000), 0);
        assert_eq!(cart.read(0xFD0), 1);
        cart.read(0xFD0);
        assert_eq!(cart.bank(), 1, "locked after the first switch");
        cart.reset();
        assert_eq!(cart.bank(), 0);
        cart.read(0xFD0);
        assert_eq!(cart.bank(), 1, "reset unlocks");
    }
}
