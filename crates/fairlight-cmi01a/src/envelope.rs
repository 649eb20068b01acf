//! Envelope generator: an 8-bit up/down counter clocked through a 7497
//! rate multiplier whose rate tracks the counter's own value.
//!
//! The divider rate is the envelope's top four bits (inverted when
//! counting up) shifted into rate bits 2-5, with bits 0-1 always set, so
//! the envelope slows as it approaches its target. Counting stops while
//! `tri` is asserted: at 0x00 going down or 0xFF going up.

use crate::rate_table::rate_output;

/// Envelope counting direction (PIA 0 port A bit 7, or bus offsets 3/4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum EnvelopeDirection {
    Down,
    Up,
}

impl EnvelopeDirection {
    /// Direction encoded by port A bit 7 (1 = up).
    #[must_use]
    pub fn from_bit(bit: bool) -> Self {
        if bit { Self::Up } else { Self::Down }
    }

    #[must_use]
    pub fn bit(self) -> bool {
        self == Self::Up
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Down => "down",
            Self::Up => "up",
        }
    }
}

/// Envelope counter plus its rate divider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Envelope {
    value: u8,
    direction: EnvelopeDirection,
    /// 7497 rate input (6 bits).
    divider: u8,
    /// 7497 output.
    divider_out: bool,
    /// 7497 internal counter (6 bits).
    divider_count: u8,
    tri: bool,
}

impl Envelope {
    #[must_use]
    pub fn new() -> Self {
        Self {
            value: 0,
            direction: EnvelopeDirection::Up,
            divider: 0,
            divider_out: false,
            divider_count: 0,
            tri: false,
        }
    }

    /// Card reset: value 0, divider rate 3, divider output high. The
    /// direction latch is not affected.
    pub fn reset(&mut self) {
        self.value = 0;
        self.divider = 3;
        self.divider_out = true;
        self.divider_count = 0;
        self.tri = false;
    }

    #[must_use]
    pub fn value(&self) -> u8 {
        self.value
    }

    #[must_use]
    pub fn direction(&self) -> EnvelopeDirection {
        self.direction
    }

    #[must_use]
    pub fn divider(&self) -> u8 {
        self.divider
    }

    #[must_use]
    pub fn divider_out(&self) -> bool {
        self.divider_out
    }

    #[must_use]
    pub fn divider_count(&self) -> u8 {
        self.divider_count
    }

    #[must_use]
    pub fn tri(&self) -> bool {
        self.tri
    }

    /// Load a new value. Returns false if unchanged.
    pub fn set_value(&mut self, value: u8) -> bool {
        if value == self.value {
            return false;
        }
        self.value = value;
        self.update();
        true
    }

    /// Change direction. Returns false if unchanged.
    pub fn set_direction(&mut self, direction: EnvelopeDirection) -> bool {
        if direction == self.direction {
            return false;
        }
        self.direction = direction;
        self.update();
        true
    }

    /// Count one step in the current direction. Returns false while held
    /// by `tri`.
    pub fn clock(&mut self) -> bool {
        if self.tri {
            return false;
        }
        self.value = match self.direction {
            EnvelopeDirection::Down => self.value.wrapping_sub(1),
            EnvelopeDirection::Up => self.value.wrapping_add(1),
        };
        self.update();
        true
    }

    /// Advance the 7497 by one input pulse.
    pub fn tick_divider(&mut self) {
        self.divider_out = rate_output(self.divider, self.divider_count);
        self.divider_count = (self.divider_count + 1) & 0x3F;
    }

    /// Restore from snapshot fields.
    pub(crate) fn restore(
        &mut self,
        value: u8,
        direction: EnvelopeDirection,
        divider: u8,
        divider_out: bool,
        divider_count: u8,
        tri: bool,
    ) {
        *self = Self {
            value,
            direction,
            divider: divider & 0x3F,
            divider_out,
            divider_count: divider_count & 0x3F,
            tri,
        };
    }

    fn update(&mut self) {
        let level = match self.direction {
            EnvelopeDirection::Up => !self.value,
            EnvelopeDirection::Down => self.value,
        };
        self.divider = ((level >> 2) & 0x3C) | 0x03;
        self.tri = match self.direction {
            EnvelopeDirection::Down => self.value == 0x00,
            EnvelopeDirection::Up => self.value == 0xFF,
        };
    }
}

impl Default for Envelope {
    fn default() -> Self {
        Self::new()
    }
}
