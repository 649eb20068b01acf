//! Wired-OR of the card's five interrupt sources.

/// IRQ sources in merger input order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IrqSource {
    Pia0A = 0,
    Pia0B = 1,
    Pia1A = 2,
    Pia1B = 3,
    Ptm = 4,
}

/// Any-high input merger. The output follows the OR of all inputs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputMerger {
    inputs: u8,
}

impl InputMerger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drive one input. Returns the new output if it changed.
    pub fn set(&mut self, source: IrqSource, state: bool) -> Option<bool> {
        let before = self.output();
        let bit = 1 << source as u8;
        if state {
            self.inputs |= bit;
        } else {
            self.inputs &= !bit;
        }
        let after = self.output();
        (after != before).then_some(after)
    }

    #[must_use]
    pub fn output(&self) -> bool {
        self.inputs != 0
    }

    /// Input levels, bit n = input n.
    #[must_use]
    pub fn inputs(&self) -> u8 {
        self.inputs
    }

    pub(crate) fn restore(&mut self, inputs: u8) {
        self.inputs = inputs & 0x1F;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_is_or_of_inputs() {
        let mut merger = InputMerger::new();
        assert_eq!(merger.set(IrqSource::Pia1B, true), Some(true));
        assert_eq!(merger.set(IrqSource::Ptm, true), None, "already high");
        assert_eq!(merger.set(IrqSource::Pia1B, false), None, "PTM still high");
        assert_eq!(merger.set(IrqSource::Ptm, false), Some(false));
        assert!(!merger.output());
    }

    #[test]
    fn inputs_map_to_bits() {
        let mut merger = InputMerger::new();
        merger.set(IrqSource::Pia0A, true);
        merger.set(IrqSource::Ptm, true);
        assert_eq!(merger.inputs(), 0b1_0001);
    }
}
