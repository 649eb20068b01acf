//! Wave address sequencing and sample scaling.
//!
//! The wave address is a 7-bit LSB counter and an 8-bit MSB latch. LSB
//! bit 6 is the zero-crossing signal `zx`; while /LOAD is low its falling
//! edge (the LSB wrapping from 127 to 0) steps the MSB, so a playing wave
//! walks through consecutive 128-byte pages.

use crate::cmi01a::Cmi01a;

/// Shortest sample timer period in card clocks: at most one fetch per tick.
pub(crate) const MIN_SAMPLE_PERIOD: f64 = 1.0;

/// Sample fetch rate in Hz for a pitch, octave and master oscillator.
///
/// Octave bit 3 set disables the octave divider.
#[must_use]
pub fn sample_frequency(pitch: u16, octave: u8, mosc: f64) -> f64 {
    let mut freq = f64::from(0x800 | (pitch & 0x3FF) << 1) * mosc / 4096.0;
    if octave & 0x08 == 0 {
        freq /= f64::from(2u32 << ((7 ^ octave) & 7));
    }
    freq / 16.0
}

/// Signed 16-bit output for an offset-binary wave byte scaled by the
/// envelope and volume.
#[must_use]
pub fn compute_sample(wave: u8, envelope: u8, volume: u8) -> i16 {
    let signed = i32::from((wave ^ 0x80) as i8);
    ((signed * i32::from(envelope) * i32::from(volume)) >> 8) as i16
}

impl Cmi01a {
    pub(crate) fn set_wave_addr_lsb(&mut self, lsb: u8) {
        if lsb == self.wave_addr_lsb {
            return;
        }
        self.wave_addr_lsb = lsb;
        self.set_zx(lsb & 0x40 != 0);
    }

    pub(crate) fn set_wave_addr_msb(&mut self, msb: u8) {
        if msb == self.wave_addr_msb {
            return;
        }
        self.wave_addr_msb = msb;
        // EOSI
        self.with_pia(1, |pia| pia.set_cb1(msb & 0x80 != 0));
    }

    fn set_wave_addr_msb_clock(&mut self, clock: bool) {
        if clock == self.wave_addr_msb_clock {
            return;
        }
        self.wave_addr_msb_clock = clock;
        if clock {
            self.set_wave_addr_msb(self.wave_addr_msb.wrapping_add(1));
        }
    }

    fn set_zx(&mut self, zx: bool) {
        if zx == self.zx {
            return;
        }
        self.zx = zx;
        self.set_wave_addr_msb_clock(!(!self.not_load && zx));
        self.with_pia(1, |pia| pia.set_ca1(zx));
        self.set_zx_flipflop_clock(!zx);
        self.update_ptm_c1();
    }

    /// Sample timer expiry: fetch the byte at the wave address, step the
    /// LSB and rescale the output.
    pub(crate) fn update_sample(&mut self) {
        self.current_sample = self.wave_ram[self.wave_addr()];
        self.set_wave_addr_lsb((self.wave_addr_lsb + 1) & 0x7F);
        self.update_sample16();
    }

    pub(crate) fn start_sample_timer(&mut self) {
        let freq = sample_frequency(self.pitch, self.octave, self.mosc);
        self.sample_period = self.clock.period_ticks(freq).map(|period| {
            if period < MIN_SAMPLE_PERIOD {
                log::debug!(
                    "CMI-01A channel {}: {freq:.0} Hz outruns the card clock, clamped",
                    self.channel
                );
            }
            period.max(MIN_SAMPLE_PERIOD)
        });
        self.sample_phase = 0.0;
        log::debug!(
            "CMI-01A channel {}: run, pitch ${:03X} octave {} -> {freq:.2} Hz",
            self.channel,
            self.pitch,
            self.octave
        );
    }
}

#[cfg(test)]
mod tests {
    use emu_core::{MasterClock, Tickable, Ticks};

    use super::*;

    #[test]
    fn sample_scaling() {
        assert_eq!(compute_sample(0x00, 0xFF, 0xFF), -32513);
        assert_eq!(compute_sample(0xFF, 0xFF, 0xFF), 32258);
        assert_eq!(compute_sample(0x80, 0xFF, 0xFF), 0);
        assert_eq!(compute_sample(0x00, 0x00, 0xFF), 0);
        assert_eq!(compute_sample(0x00, 0xFF, 0x00), 0);
    }

    #[test]
    fn frequency_follows_pitch_and_octave() {
        // Octave divider disabled
        assert!((sample_frequency(0, 8, 32_000.0) - 1000.0).abs() < 1e-9);
        assert!((sample_frequency(0, 0x0F, 32_000.0) - 1000.0).abs() < 1e-9);
        // Octave 7 halves, octave 0 divides by 256
        assert!((sample_frequency(0, 7, 32_000.0) - 500.0).abs() < 1e-9);
        assert!((sample_frequency(0, 0, 32_000.0) - 1000.0 / 256.0).abs() < 1e-9);
        // Top pitch nearly doubles the rate
        let top = sample_frequency(0x3FF, 8, 32_000.0);
        assert!((top - f64::from(0xFFE) * 32_000.0 / 4096.0 / 16.0).abs() < 1e-9);
        assert!(sample_frequency(0, 8, 0.0).abs() < 1e-12);
    }

    fn card() -> Cmi01a {
        Cmi01a::new(MasterClock::new(2_000_000), 48_000)
    }

    #[test]
    fn msb_steps_once_per_page_while_load_low() {
        let mut card = card();
        card.not_load = false;
        card.set_wave_addr_lsb(0);
        card.set_wave_addr_msb(0x80);
        for _ in 0..128 {
            card.update_sample();
        }
        assert_eq!(card.wave_address(), (0, 0x81));
        for _ in 0..128 {
            card.update_sample();
        }
        assert_eq!(card.wave_address(), (0, 0x82));
    }

    #[test]
    fn msb_holds_while_load_high() {
        let mut card = card();
        card.not_load = true;
        card.set_wave_addr_lsb(0);
        card.set_wave_addr_msb(0x80);
        for _ in 0..256 {
            card.update_sample();
        }
        assert_eq!(card.wave_address(), (0, 0x80));
    }

    #[test]
    fn zx_is_lsb_bit6() {
        let mut card = card();
        card.set_wave_addr_lsb(0x3F);
        assert!(!card.zx);
        card.set_wave_addr_lsb(0x40);
        assert!(card.zx);
        assert!(!card.ptm_c1);
        card.set_wave_addr_lsb(0x00);
        assert!(!card.zx);
        assert!(card.ptm_c1, "C1 = /LOAD low and zx low");
    }

    #[test]
    fn msb_bit7_drives_eosi() {
        let mut card = card();
        card.set_wave_addr_msb(0x7F);
        card.set_wave_addr_msb(0x80);
        assert!(card.pia[1].snapshot().b.c1);
    }

    #[test]
    fn runaway_oscillator_fetches_once_per_tick() {
        let mut card = card();
        card.set_master_osc(1e15);
        card.octave = 8;
        card.set_wave_addr_lsb(0);
        card.run = true;
        card.start_sample_timer();
        assert_eq!(card.sample_period, Some(MIN_SAMPLE_PERIOD));

        card.tick_n(Ticks::new(3));
        assert_eq!(card.wave_address().0, 3, "one fetch per card clock");
    }

    #[test]
    fn timer_fetches_samples() {
        let mut card = card();
        card.wave_ram_mut()[0] = 0x00;
        card.wave_ram_mut()[1] = 0xFF;
        card.vol_latch = 0xFF;
        card.envelope.set_value(0xFF);
        card.set_wave_addr_lsb(0);
        card.set_wave_addr_msb(0x80); // 0x80 << 7 wraps to address 0
        card.sample_period = Some(2000.0);
        card.sample_phase = 0.0;

        card.tick_n(Ticks::new(1999));
        assert_eq!(card.wave_address().0, 0);
        card.tick();
        assert_eq!(card.current_sample, 0x00);
        assert_eq!(card.sample16, -32513);
        assert_eq!(card.wave_address().0, 1);

        card.tick_n(Ticks::new(2000));
        assert_eq!(card.current_sample, 0xFF);
        assert_eq!(card.sample16, 32258);
    }
}
