//! Parker Brothers E0: the window is four 1K segments. The last always
//! shows slice 7; hotspots $FE0-$FE7, $FE8-$FEF and $FF0-$FF7 pick the
//! slice shown in segments 0, 1 and 2.

use crate::{CartridgeError, Scheme, banked, check_size};

const SLICE_SIZE: usize = 0x400;
const POWER_ON_SLICES: [usize; 4] = [4, 5, 6, 7];

#[derive(Debug, Clone)]
pub struct Parker {
    rom: Box<[u8]>,
    slices: [usize; 4],
}

impl Parker {
    pub(crate) fn new(rom: &[u8]) -> Result<Self, CartridgeError> {
        check_size(Scheme::E0, rom, rom.len() == 8 * SLICE_SIZE)?;
        Ok(Self {
            rom: rom.into(),
            slices: POWER_ON_SLICES,
        })
    }

    /// Slice shown in each segment.
    #[must_use]
    pub fn slices(&self) -> [usize; 4] {
        self.slices
    }

    pub(crate) fn reset(&mut self) {
        self.slices = POWER_ON_SLICES;
    }

    pub(crate) fn read(&mut self, offset: u16) -> u8 {
        self.write(offset);
        self.fetch(offset)
    }

    pub(crate) fn write(&mut self, offset: u16) {
        if (0xFE0..=0xFF7).contains(&offset) {
            let segment = usize::from((offset - 0xFE0) >> 3);
            self.slices[segment] = usize::from(offset & 7);
        }
    }

    pub(crate) fn fetch(&self, offset: u16) -> u8 {
        let segment = usize::from(offset >> 10) & 3;
        banked(&self.rom, self.slices[segment], SLICE_SIZE, offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segments_switch_independently() {
        let rom: Vec<u8> = (0..8 * SLICE_SIZE).map(|i| (i / SLICE_SIZE) as u8).collect();
        let mut cart = Parker::new(&rom).unwrap();
        assert_eq!(cart.slices(), [4, 5, 6, 7]);

        cart.read(0xFE2);
        cart.write(0xFE9);
        cart.read(0xFF5);
        assert_eq!(cart.slices(), [2, 1, 5, 7]);
        assert_eq!(cart.fetch(0x000), 2);
        assert_eq!(cart.fetch(0x400), 1);
        assert_eq!(cart.fetch(0x800), 5);
        assert_eq!(cart.fetch(0xC00), 7);

        cart.read(0xFF8);
        assert_eq!(cart.slices()[3], 7, "last segment is fixed");
        cart.reset();
        assert_eq!(cart.slices(), POWER_ON_SLICES);
    }
}
