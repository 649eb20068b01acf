//! Atari's own hotspot schemes (F8, F6, F4) and CBS RAM+ (FA).
//!
//! Touching one of a run of hotspot addresses at the top of the window,
//! by read or write, selects the 4K bank with the same index. Superchip
//! carts add 128 bytes of RAM (write $000-$07F, read $080-$0FF); FA has
//! 256 (write $000-$0FF, read $100-$1FF).

use crate::{CartridgeError, Scheme, banked, check_size};

const BANK_SIZE: usize = 0x1000;
const SUPERCHIP_RAM: usize = 0x80;
const FA_RAM: usize = 0x100;

#[derive(Debug, Clone)]
pub struct Atari {
    rom: Box<[u8]>,
    bank: usize,
    start_bank: usize,
    bank_count: usize,
    first_hotspot: u16,
    ram: Box<[u8]>,
}

impl Atari {
    pub(crate) fn new(scheme: Scheme, rom: &[u8]) -> Result<Self, CartridgeError> {
        let (bank_count, first_hotspot, start_bank, ram_size) = match scheme {
            Scheme::F8 { superchip } => (2, 0xFF8, 0, superchip_ram(superchip)),
            Scheme::F8Swapped { superchip } => (2, 0xFF8, 1, superchip_ram(superchip)),
            Scheme::F6 { superchip } => (4, 0xFF6, 0, superchip_ram(superchip)),
            Scheme::F4 { superchip } => (8, 0xFF4, 7, superchip_ram(superchip)),
            _ => (3, 0xFF8, 0, FA_RAM),
        };
        check_size(scheme, rom, rom.len() == bank_count * BANK_SIZE)?;
        Ok(Self {
            rom: rom.into(),
            bank: start_bank,
            start_bank,
            bank_count,
            first_hotspot,
            ram: vec![0; ram_size].into_boxed_slice(),
        })
    }

    #[must_use]
    pub fn bank(&self) -> usize {
        self.bank
    }

    pub(crate) fn reset(&mut self) {
        self.bank = self.start_bank;
    }

    pub(crate) fn read(&mut self, offset: u16) -> u8 {
        self.hotspot(offset);
        self.fetch(offset)
    }

    /// Returns true if the byte went to RAM.
    pub(crate) fn write(&mut self, offset: u16, data: u8) -> bool {
        self.hotspot(offset);
        let offset = usize::from(offset);
        if offset < self.ram.len() {
            self.ram[offset] = data;
            true
        } else {
            false
        }
    }

    pub(crate) fn fetch(&self, offset: u16) -> u8 {
        let ram_size = self.ram.len();
        let index = usize::from(offset);
        if (ram_size..ram_size * 2).contains(&index) {
            return self.ram[index - ram_size];
        }
        banked(&self.rom, self.bank, BANK_SIZE, offset)
    }

    fn hotspot(&mut self, offset: u16) {
        if let Some(bank) = offset.checked_sub(self.first_hotspot) {
            let bank = usize::from(bank);
            if bank < self.bank_count {
                self.bank = bank;
            }
        }
    }
}

fn superchip_ram(present: bool) -> usize {
    if present { SUPERCHIP_RAM } else { 0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Image where every byte holds its bank number.
    fn rom(banks: usize) -> Vec<u8> {
        (0..banks * BANK_SIZE).map(|i| (i / BANK_SIZE) as u8).collect()
    }

    #[test]
    fn f6_hotspots_select_banks() {
        let mut cart = Atari::new(Scheme::F6 { superchip: false }, &rom(4)).unwrap();
        assert_eq!(cart.fetch(0x000), 0);
        for bank in 0..4u16 {
            assert_eq!(cart.read(0xFF6 + bank), bank as u8, "data comes from the new bank");
        }
        cart.write(0xFF7, 0);
        assert_eq!(cart.bank(), 1, "writes hit hotspots too");
        cart.read(0xFF5);
        assert_eq!(cart.bank(), 1, "below the hotspot run");
    }

    #[test]
    fn start_banks() {
        let f8 = Atari::new(Scheme::F8 { superchip: false }, &rom(2)).unwrap();
        let swapped = Atari::new(Scheme::F8Swapped { superchip: false }, &rom(2)).unwrap();
        let mut f4 = Atari::new(Scheme::F4 { superchip: false }, &rom(8)).unwrap();
        assert_eq!((f8.bank(), swapped.bank(), f4.bank()), (0, 1, 7));
        f4.read(0xFF4);
        f4.reset();
        assert_eq!(f4.bank(), 7);
    }

    #[test]
    fn superchip_ports() {
        let mut cart = Atari::new(Scheme::F8 { superchip: true }, &rom(2)).unwrap();
        assert!(cart.write(0x005, 0xAB));
        assert_eq!(cart.fetch(0x085), 0xAB);
        assert_eq!(cart.fetch(0x005), 0, "write port reads ROM");
        assert!(!cart.write(0x085, 0xCD), "read port is not writable");
        assert_eq!(cart.fetch(0x085), 0xAB);
    }

    #[test]
    fn fa_has_256_bytes() {
        let mut cart = Atari::new(Scheme::Fa, &rom(3)).unwrap();
        assert!(cart.write(0x0FF, 0x42));
        assert_eq!(cart.fetch(0x1FF), 0x42);
        assert_eq!(cart.read(0xFFA), 2);
        assert_eq!(cart.read(0xFFB), 2, "no fourth bank");
    }
}
