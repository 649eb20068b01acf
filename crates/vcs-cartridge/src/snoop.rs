//! Schemes that switch on bus cycles outside the cartridge window.

use crate::{CartridgeError, Scheme, banked, check_size};

const BANK_SIZE: usize = 0x1000;

/// Activision FE. A JSR or RTS touches $01FE and then $01FF; the byte
/// moved on that second cycle is the high byte of an address in $Fxxx
/// (bank 0) or $Dxxx (bank 1), so bit 5 of it picks the bank.
#[derive(Debug, Clone)]
pub struct Activision {
    rom: Box<[u8]>,
    bank: usize,
    pending: bool,
}

impl Activision {
    pub(crate) fn new(rom: &[u8]) -> Result<Self, CartridgeError> {
        check_size(Scheme::Fe, rom, rom.len() == 2 * BANK_SIZE)?;
        Ok(Self {
            rom: rom.into(),
            bank: 0,
            pending: false,
        })
    }

    #[must_use]
    pub fn bank(&self) -> usize {
        self.bank
    }

    pub(crate) fn reset(&mut self) {
        self.bank = 0;
        self.pending = false;
    }

    pub(crate) fn fetch(&self, offset: u16) -> u8 {
        banked(&self.rom, self.bank, BANK_SIZE, offset)
    }

    pub(crate) fn tap(&mut self, address: u16, data: u8) {
        if self.pending {
            self.pending = false;
            self.bank = if data & 0x20 != 0 { 0 } else { 1 };
        }
        if address & 0x1FFF == 0x01FE {
            self.pending = true;
        }
    }
}

/// UA Ltd. Any access to $0220 selects bank 0, $0240 bank 1.
#[derive(Debug, Clone)]
pub struct UaLtd {
    rom: Box<[u8]>,
    bank: usize,
}

impl UaLtd {
    pub(crate) fn new(rom: &[u8]) -> Result<Self, CartridgeError> {
        check_size(Scheme::Ua, rom, rom.len() == 2 * BANK_SIZE)?;
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

    pub(crate) fn fetch(&self, offset: u16) -> u8 {
        banked(&self.rom, self.bank, BANK_SIZE, offset)
    }

    pub(crate) fn tap(&mut self, address: u16) {
        match address & 0x1FFF {
            0x0220 => self.bank = 0,
            0x0240 => self.bank = 1,
            _ => {}
        }
    }
}

/// JVP. Any access to $0FA0 or $0FC0 flips between the two 4K banks.
#[derive(Debug, Clone)]
pub struct Jvp {
    rom: Box<[u8]>,
    bank: usize,
}

impl Jvp {
    pub(crate) fn new(rom: &[u8]) -> Result<Self, CartridgeError> {
        check_size(Scheme::Jvp, rom, rom.len() == 2 * BANK_SIZE)?;
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

    pub(crate) fn fetch(&self, offset: u16) -> u8 {
        banked(&self.rom, self.bank, BANK_SIZE, offset)
    }

    pub(crate) fn tap(&mut self, address: u16) {
        if matches!(address & 0x1FFF, 0x0FA0 | 0x0FC0) {
            self.bank ^= 1;
        }
    }
}

/// X07 (64K, sixteen 4K banks).
///
/// Any access to an address matching `0 1xxx BBBB 1101` (A12 low, A11
/// high, A3-A0 = 1101) selects bank BBBB. While bank 14 or 15
/// is selected, an access to a TIA address (A12, A11 and A7 low) selects
/// 14 or 15 by A6.
#[derive(Debug, Clone)]
pub struct X07 {
    rom: Box<[u8]>,
    bank: usize,
}

impl X07 {
    pub(crate) fn new(rom: &[u8]) -> Result<Self, CartridgeError> {
        check_size(Scheme::X07, rom, rom.len() == 16 * BANK_SIZE)?;
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

    pub(crate) fn fetch(&self, offset: u16) -> u8 {
        banked(&self.rom, self.bank, BANK_SIZE, offset)
    }

    pub(crate) fn tap(&mut self, address: u16) {
        if address & 0x180F == 0x080D {
            self.bank = usize::from(address >> 4 & 0x0F);
        } else if address & 0x1880 == 0 && self.bank & 0x0E == 0x0E {
            self.bank = 0x0E | usize::from(address >> 6 & 1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rom() -> Vec<u8> {
        (0..2 * BANK_SIZE).map(|i| (i / BANK_SIZE) as u8).collect()
    }

    #[test]
    fn fe_follows_stack_high_byte() {
        let mut cart = Activision::new(&rom()).unwrap();
        // JSR $D123 pushes; RTS pulls $D1 on the cycle after $01FE
        cart.tap(0x01FE, 0x23);
        cart.tap(0x01FF, 0xD1);
        assert_eq!(cart.bank(), 1);
        assert_eq!(cart.fetch(0x000), 1);

        cart.tap(0x01FE, 0x00);
        cart.tap(0x01FF, 0xF0);
        assert_eq!(cart.bank(), 0);

        cart.tap(0x01FF, 0xD0);
        assert_eq!(cart.bank(), 0, "only the cycle after $01FE counts");
    }

    #[test]
    fn jvp_toggles() {
        let mut cart = Jvp::new(&rom()).unwrap();
        cart.tap(0x0FA0);
        assert_eq!(cart.fetch(0x000), 1);
        cart.tap(0x0FB0);
        assert_eq!(cart.bank(), 1);
        cart.tap(0x0FC0);
        assert_eq!(cart.bank(), 0);
    }

    #[test]
    fn x07_selects_by_address_bits() {
        let image: Vec<u8> = (0..16 * BANK_SIZE).map(|i| (i / BANK_SIZE) as u8).collect();
        let mut cart = X07::new(&image).unwrap();
        cart.tap(0x08AD);
        assert_eq!(cart.bank(), 0x0A);
        cart.tap(0x0040);
        assert_eq!(cart.bank(), 0x0A, "TIA access ignored below bank 14");

        cart.tap(0x08ED);
        assert_eq!(cart.fetch(0x000), 14);
        cart.tap(0x0040); // A6 high
        assert_eq!(cart.bank(), 15);
        cart.tap(0x0002);
        assert_eq!(cart.bank(), 14);
        cart.tap(0x0082);
        assert_eq!(cart.bank(), 14, "A7 high is not a TIA access");
    }

    #[test]
    fn ua_hotspots() {
        let mut cart = UaLtd::new(&rom()).unwrap();
        cart.tap(0x0240);
        assert_eq!(cart.fetch(0x123), 1);
        cart.tap(0x0230);
        assert_eq!(cart.bank(), 1);
        cart.tap(0x0220);
        assert_eq!(cart.bank(), 0);
    }
}
