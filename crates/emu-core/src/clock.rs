//! Device input clock configuration.

/// The input clock driving a device.
///
/// A device's `tick()` corresponds to one period of this clock. Periodic
/// events specified in Hz are converted to (fractional) tick periods here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MasterClock {
    /// Clock frequency in Hz (e.g. `2_000_000` for a 2 MHz E clock).
    pub frequency_hz: u64,
}

impl MasterClock {
    #[must_use]
    pub const fn new(frequency_hz: u64) -> Self {
        Self { frequency_hz }
    }

    /// Period of an event at `hz`, in fractional ticks of this clock.
    ///
    /// Returns `None` for a frequency that never fires (zero, negative,
    /// or not finite).
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn period_ticks(&self, hz: f64) -> Option<f64> {
        if hz.is_finite() && hz > 0.0 {
            Some(self.frequency_hz as f64 / hz)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn period_ticks_rejects_silent_rates() {
        let clock = MasterClock::new(2_000_000);
        assert_eq!(clock.period_ticks(0.0), None);
        assert_eq!(clock.period_ticks(-5.0), None);
        assert_eq!(clock.period_ticks(f64::INFINITY), None);
        assert_eq!(clock.period_ticks(f64::NAN), None);
    }

    #[test]
    fn period_ticks_is_fractional() {
        let clock = MasterClock::new(2_000_000);
        let period = clock.period_ticks(48_000.0).unwrap();
        assert!((period - 41.666_666).abs() < 1e-3, "got {period}");
    }
}
