//! Atari VCS cartridge bank switching.
//!
//! The VCS gives a cartridge 4 KB of address space ($1000-$1FFF, A12 as
//! chip select). Anything larger pages banks into that window, switched
//! by touching hotspot addresses inside the window or by snooping bus
//! cycles elsewhere (the stack, TIA writes, RIOT mirrors).
//!
//! [`Cartridge`] is a closed set of schemes. A host builds one from a
//! [`Scheme`] and a ROM image, asks [`Cartridge::install`] which address
//! windows to route to it, and then forwards:
//!
//! - cycles in a [`Route::Cartridge`] window to `read`/`write`
//! - cycles in a [`Route::Tap`] window to `tap`
//!
//! | Scheme | ROM     | Banking                                   | RAM          |
//! |--------|---------|-------------------------------------------|--------------|
//! | 2K/4K  | 2K, 4K  | none                                      |              |
//! | F8     | 8K      | 2 x 4K, hotspots $FF8-$FF9                | Superchip    |
//! | F6     | 16K     | 4 x 4K, hotspots $FF6-$FF9                | Superchip    |
//! | F4     | 32K     | 8 x 4K, hotspots $FF4-$FFB                | Superchip    |
//! | FA     | 12K     | 3 x 4K, hotspots $FF8-$FFA                | 256 bytes    |
//! | FE     | 8K      | 2 x 4K, stack snoop at $01FE              |              |
//! | E0     | 8K      | 3 switchable 1K slices + fixed last slice |              |
//! | E7     | 16K     | 2K lower bank + fixed upper 1.5K          | 1K + 4 x 256 |
//! | 3F     | 2K-512K | 2K lower bank by writes to $00-$3F        |              |
//! | 3E     | 2K-512K | as 3F, writes to $3E page in RAM          | 32 x 1K      |
//! | UA     | 8K      | 2 x 4K, snoop at $0220/$0240              |              |
//! | CV     | 2K, 4K  | none                                      | 1K           |
//! | DC     | 64K     | 16 x 4K, $FF0 steps to the next bank      |              |
//! | FV     | 8K      | 2 x 4K, first read of $FD0 flips once     |              |
//! | JVP    | 8K      | 2 x 4K, snoop at $0FA0/$0FC0 flips        |              |
//! | X07    | 64K     | 16 x 4K, snoop on address bits            |              |
//! | 4in1   | 16K     | 4 x 4K games, reset steps                 |              |
//! | 8in1   | 64K     | 8 x 8K F8 games, reset steps              |              |
//! | 32in1  | 64K     | 32 x 2K games, reset steps                |              |
//!
//! RAM always has separate write and read ports: the write port sits at
//! the low addresses and the read port directly above it.

mod atari;
mod commavid;
mod mnetwork;
mod multicart;
mod parker;
mod plain;
mod snoop;
mod stepper;
mod tigervision;

use emu_core::Bus;
use thiserror::Error;

pub use atari::Atari;
pub use commavid::Commavid;
pub use mnetwork::MNetwork;
pub use multicart::Multicart;
pub use parker::Parker;
pub use plain::Plain;
pub use snoop::{Activision, Jvp, UaLtd, X07};
pub use stepper::{Fv, Megaboy};
pub use tigervision::Tigervision;

/// Offset mask for the 4K cartridge window.
pub(crate) const WINDOW_MASK: u16 = 0x0FFF;

/// Bank-switching scheme of a ROM image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    /// Unbanked 2K or 4K.
    Rom2K4K,
    /// Atari 8K. Starts in bank 0.
    F8 { superchip: bool },
    /// Atari 8K with the banks swapped at power-on (starts in bank 1).
    F8Swapped { superchip: bool },
    /// Atari 16K.
    F6 { superchip: bool },
    /// Atari 32K.
    F4 { superchip: bool },
    /// CBS RAM+ 12K.
    Fa,
    /// Activision 8K.
    Fe,
    /// Parker Brothers 8K.
    E0,
    /// M-Network 16K.
    E7,
    /// Tigervision.
    Tigervision3F,
    /// Tigervision with RAM.
    Tigervision3E,
    /// UA Ltd 8K.
    Ua,
    /// Commavid.
    Cv,
    /// Dynacom Megaboy 64K.
    Dc,
    /// FV 8K.
    Fv,
    /// JVP 8K.
    Jvp,
    /// X07 64K.
    X07,
    /// 4-in-1 multicart.
    FourInOne,
    /// 8-in-1 multicart.
    EightInOne,
    /// 32-in-1 multicart.
    ThirtyTwoInOne,
}

impl Scheme {
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Rom2K4K => "2K/4K",
            Self::F8 { .. } => "F8",
            Self::F8Swapped { .. } => "F8 (swapped)",
            Self::F6 { .. } => "F6",
            Self::F4 { .. } => "F4",
            Self::Fa => "FA",
            Self::Fe => "FE",
            Self::E0 => "E0",
            Self::E7 => "E7",
            Self::Tigervision3F => "3F",
            Self::Tigervision3E => "3E",
            Self::Ua => "UA",
            Self::Cv => "CV",
            Self::Dc => "DC",
            Self::Fv => "FV",
            Self::Jvp => "JVP",
            Self::X07 => "X07",
            Self::FourInOne => "4in1",
            Self::EightInOne => "8in1",
            Self::ThirtyTwoInOne => "32in1",
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CartridgeError {
    #[error("{scheme} cartridge cannot hold a {len}-byte ROM")]
    InvalidSize { scheme: &'static str, len: usize },
}

pub(crate) fn check_size(scheme: Scheme, rom: &[u8], valid: bool) -> Result<(), CartridgeError> {
    if valid {
        Ok(())
    } else {
        Err(CartridgeError::InvalidSize {
            scheme: scheme.name(),
            len: rom.len(),
        })
    }
}

/// Which bus cycles a window covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
    ReadWrite,
}

/// Where the host forwards cycles that land in a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// The cartridge answers: call `read`/`write`.
    Cartridge,
    /// Another device answers; the cartridge only watches: call `tap`.
    Tap,
}

/// An address range the host must route to the cartridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Window {
    pub start: u16,
    pub end: u16,
    pub access: Access,
    pub route: Route,
}

impl Window {
    pub(crate) const CARTRIDGE: Self = Self {
        start: 0x1000,
        end: 0x1FFF,
        access: Access::ReadWrite,
        route: Route::Cartridge,
    };

    #[must_use]
    pub fn contains(&self, address: u16) -> bool {
        (self.start..=self.end).contains(&(address & 0x1FFF))
    }
}

/// A VCS cartridge.
#[derive(Debug, Clone)]
pub enum Cartridge {
    Plain(Plain),
    Atari(Atari),
    Activision(Activision),
    Parker(Parker),
    MNetwork(MNetwork),
    Tigervision(Tigervision),
    UaLtd(UaLtd),
    Commavid(Commavid),
    Megaboy(Megaboy),
    Fv(Fv),
    Jvp(Jvp),
    X07(X07),
    Multicart(Multicart),
}

impl Cartridge {
    /// Build a cartridge from a ROM image. Fails if the image size does
    /// not fit the scheme.
    pub fn new(scheme: Scheme, rom: &[u8]) -> Result<Self, CartridgeError> {
        let cart = match scheme {
            Scheme::Rom2K4K => Self::Plain(Plain::new(rom)?),
            Scheme::F8 { .. }
            | Scheme::F8Swapped { .. }
            | Scheme::F6 { .. }
            | Scheme::F4 { .. }
            | Scheme::Fa => Self::Atari(Atari::new(scheme, rom)?),
            Scheme::Fe => Self::Activision(Activision::new(rom)?),
            Scheme::E0 => Self::Parker(Parker::new(rom)?),
            Scheme::E7 => Self::MNetwork(MNetwork::new(rom)?),
            Scheme::Tigervision3F => Self::Tigervision(Tigervision::new(rom, false)?),
            Scheme::Tigervision3E => Self::Tigervision(Tigervision::new(rom, true)?),
            Scheme::Ua => Self::UaLtd(UaLtd::new(rom)?),
            Scheme::Cv => Self::Commavid(Commavid::new(rom)?),
            Scheme::Dc => Self::Megaboy(Megaboy::new(rom)?),
            Scheme::Fv => Self::Fv(Fv::new(rom)?),
            Scheme::Jvp => Self::Jvp(Jvp::new(rom)?),
            Scheme::X07 => Self::X07(X07::new(rom)?),
            Scheme::FourInOne | Scheme::EightInOne | Scheme::ThirtyTwoInOne => {
                Self::Multicart(Multicart::new(scheme, rom)?)
            }
        };
        log::debug!("{} cartridge, {} bytes", scheme.name(), rom.len());
        Ok(cart)
    }

    /// Cartridge-window read. Hotspots switch banks before the data is
    /// fetched.
    pub fn read(&mut self, address: u16) -> u8 {
        let offset = address & WINDOW_MASK;
        match self {
            Self::Plain(c) => c.fetch(offset),
            Self::Atari(c) => c.read(offset),
            Self::Activision(c) => c.fetch(offset),
            Self::Parker(c) => c.read(offset),
            Self::MNetwork(c) => c.read(offset),
            Self::Tigervision(c) => c.fetch(offset),
            Self::UaLtd(c) => c.fetch(offset),
            Self::Commavid(c) => c.fetch(offset),
            Self::Megaboy(c) => c.read(offset),
            Self::Fv(c) => c.read(offset),
            Self::Jvp(c) => c.fetch(offset),
            Self::X07(c) => c.fetch(offset),
            Self::Multicart(c) => c.read(offset),
        }
    }

    /// Cartridge-window write: RAM write ports and hotspots.
    pub fn write(&mut self, address: u16, data: u8) {
        let offset = address & WINDOW_MASK;
        let stored = match self {
            Self::Plain(_)
            | Self::Activision(_)
            | Self::UaLtd(_)
            | Self::Fv(_)
            | Self::Jvp(_)
            | Self::X07(_) => false,
            Self::Atari(c) => c.write(offset, data),
            Self::Parker(c) => {
                c.write(offset);
                false
            }
            Self::MNetwork(c) => c.write(offset, data),
            Self::Tigervision(c) => c.write(offset, data),
            Self::Commavid(c) => c.write(offset, data),
            Self::Megaboy(c) => {
                c.write(offset);
                false
            }
            Self::Multicart(c) => {
                c.write(offset);
                false
            }
        };
        if !stored {
            log::trace!("write to ROM ${address:04X} = ${data:02X}");
        }
    }

    /// Read without switching banks.
    #[must_use]
    pub fn peek(&self, address: u16) -> u8 {
        let offset = address & WINDOW_MASK;
        match self {
            Self::Plain(c) => c.fetch(offset),
            Self::Atari(c) => c.fetch(offset),
            Self::Activision(c) => c.fetch(offset),
            Self::Parker(c) => c.fetch(offset),
            Self::MNetwork(c) => c.fetch(offset),
            Self::Tigervision(c) => c.fetch(offset),
            Self::UaLtd(c) => c.fetch(offset),
            Self::Commavid(c) => c.fetch(offset),
            Self::Megaboy(c) => c.fetch(offset),
            Self::Fv(c) => c.fetch(offset),
            Self::Jvp(c) => c.fetch(offset),
            Self::X07(c) => c.fetch(offset),
            Self::Multicart(c) => c.fetch(offset),
        }
    }

    /// Bus cycle in a [`Route::Tap`] window: `data` is the byte on the
    /// bus, whoever drove it.
    pub fn tap(&mut self, address: u16, data: u8) {
        match self {
            Self::Activision(c) => c.tap(address, data),
            Self::Tigervision(c) => c.tap(address, data),
            Self::UaLtd(c) => c.tap(address),
            Self::Jvp(c) => c.tap(address),
            Self::X07(c) => c.tap(address),
            _ => {}
        }
    }

    /// Address windows the host must route to this cartridge.
    #[must_use]
    pub fn install(&self) -> Vec<Window> {
        let mut windows = vec![Window::CARTRIDGE];
        let tap = |start, end, access| Window {
            start,
            end,
            access,
            route: Route::Tap,
        };
        match self {
            Self::Activision(_) => windows.push(tap(0x01FE, 0x01FF, Access::ReadWrite)),
            Self::Tigervision(_) => windows.push(tap(0x0000, 0x003F, Access::Write)),
            Self::UaLtd(_) => windows.push(tap(0x0200, 0x027F, Access::ReadWrite)),
            Self::Jvp(_) => windows.push(tap(0x0FA0, 0x0FC0, Access::ReadWrite)),
            Self::X07(_) => windows.push(tap(0x0000, 0x0FFF, Access::ReadWrite)),
            _ => {}
        }
        windows
    }

    /// Console reset: power-on bank selection, or the next game on a
    /// multicart. RAM contents are kept.
    pub fn reset(&mut self) {
        match self {
            Self::Plain(_) | Self::Commavid(_) => {}
            Self::Atari(c) => c.reset(),
            Self::Activision(c) => c.reset(),
            Self::Parker(c) => c.reset(),
            Self::MNetwork(c) => c.reset(),
            Self::Tigervision(c) => c.reset(),
            Self::UaLtd(c) => c.reset(),
            Self::Megaboy(c) => c.reset(),
            Self::Fv(c) => c.reset(),
            Self::Jvp(c) => c.reset(),
            Self::X07(c) => c.reset(),
            Self::Multicart(c) => c.reset(),
        }
    }
}

impl Bus for Cartridge {
    fn read(&mut self, address: u16) -> u8 {
        Cartridge::read(self, address)
    }

    fn write(&mut self, address: u16, value: u8) {
        Cartridge::write(self, address, value);
    }

    fn peek(&self, address: u16) -> u8 {
        Cartridge::peek(self, address)
    }
}

/// Bank `bank` of `size` bytes, wrapped to the image.
pub(crate) fn banked(rom: &[u8], bank: usize, size: usize, offset: u16) -> u8 {
    rom[(bank * size + usize::from(offset) % size) % rom.len()]
}
