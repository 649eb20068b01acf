//! Pirate multicarts: several games on one board, the console's reset
//! button stepping to the next.
//!
//! The board powers up on game 0. Each [`reset`](Multicart::reset) after
//! that selects the following game, wrapping after the last. The 8-in-1
//! games are 8K F8 images and keep the F8 hotspots inside their game.

use crate::{CartridgeError, Scheme, banked, check_size};

const IMAGE_SIZE: usize = 0x10000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layout {
    /// Four 4K games.
    Four,
    /// Eight 8K F8 games.
    Eight,
    /// Thirty-two 2K games, mirrored in the window.
    ThirtyTwo,
}

impl Layout {
    fn game_size(self) -> usize {
        match self {
            Self::Four => 0x1000,
            Self::Eight => 0x2000,
            Self::ThirtyTwo => 0x800,
        }
    }

    fn games(self) -> usize {
        match self {
            Self::Four => 4,
            Self::Eight => 8,
            Self::ThirtyTwo => 32,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Multicart {
    rom: Box<[u8]>,
    layout: Layout,
    game: usize,
    /// F8 bank within an 8-in-1 game.
    half: usize,
}

impl Multicart {
    pub(crate) fn new(scheme: Scheme, rom: &[u8]) -> Result<Self, CartridgeError> {
        let (layout, len) = match scheme {
            Scheme::FourInOne => (Layout::Four, 4 * 0x1000),
            Scheme::EightInOne => (Layout::Eight, IMAGE_SIZE),
            _ => (Layout::ThirtyTwo, IMAGE_SIZE),
        };
        check_size(scheme, rom, rom.len() == len)?;
        Ok(Self {
            rom: rom.into(),
            layout,
            game: 0,
            half: 0,
        })
    }

    #[must_use]
    pub fn game(&self) -> usize {
        self.game
    }

    pub(crate) fn reset(&mut self) {
        self.game = (self.game + 1) % self.layout.games();
        self.half = 0;
        log::debug!("multicart: game {}", self.game);
    }

    pub(crate) fn read(&mut self, offset: u16) -> u8 {
        self.write(offset);
        self.fetch(offset)
    }

    pub(crate) fn write(&mut self, offset: u16) {
        if self.layout == Layout::Eight {
            match offset {
                0xFF8 => self.half = 0,
                0xFF9 => self.half = 1,
                _ => {}
            }
        }
    }

    pub(crate) fn fetch(&self, offset: u16) -> u8 {
        match self.layout {
            Layout::Eight => banked(&self.rom, self.game * 2 + self.half, 0x1000, offset),
            layout => banked(&self.rom, self.game, layout.game_size(), offset),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rom(chunks: usize, size: usize) -> Vec<u8> {
        (0..chunks * size).map(|i| (i / size) as u8).collect()
    }

    #[test]
    fn reset_steps_through_games() {
        let mut cart = Multicart::new(Scheme::FourInOne, &rom(4, 0x1000)).unwrap();
        assert_eq!(cart.fetch(0x000), 0);
        cart.reset();
        assert_eq!(cart.fetch(0xFFF), 1);
        cart.reset();
        cart.reset();
        cart.reset();
        assert_eq!(cart.game(), 0, "wraps after the fourth game");
    }

    #[test]
    fn eight_in_one_keeps_f8_hotspots() {
        let mut cart = Multicart::new(Scheme::EightInOne, &rom(16, 0x1000)).unwrap();
        cart.reset(); // game 1: 4K banks 2 and 3
        assert_eq!(cart.fetch(0x000), 2);
        assert_eq!(cart.read(0xFF9), 3);
        assert_eq!(cart.read(0xFF8), 2);
        cart.read(0xFF9);
        cart.reset();
        assert_eq!(cart.fetch(0x000), 4, "next game starts in its first bank");
    }

    #[test]
    fn thirty_two_in_one_mirrors_2k() {
        let mut cart = Multicart::new(Scheme::ThirtyTwoInOne, &rom(32, 0x800)).unwrap();
        for _ in 0..31 {
            cart.reset();
        }
        assert_eq!(cart.fetch(0x010), 31);
        assert_eq!(cart.fetch(0x810), 31);
    }
}
