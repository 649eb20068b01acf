//! Control network: the card's TTL glue between the PIAs, the PTM, the
//! envelope and the wave address.
//!
//! Each line has a single setter. A setter returns at once when the level
//! is unchanged; otherwise it stores the level and drives the dependent
//! lines in wiring order. Chip outputs reach the card only through
//! [`Cmi01a::with_pia`] and [`Cmi01a::with_ptm`], which run one chip
//! operation and then dispatch the output changes it queued.

use motorola_6821::{Pia6821, PiaEvent};
use motorola_6840::{Ptm6840, PtmEvent};

use crate::cmi01a::Cmi01a;
use crate::envelope::EnvelopeDirection;
use crate::irq::IrqSource;

/// PTM external clock dividers while BCAS Q1 is enabled.
const BCAS_TIMER1_DIVIDER: u32 = 8;
const BCAS_TIMER23_DIVIDER: u32 = 4;

impl Cmi01a {
    // --- Chip plumbing ---

    pub(crate) fn with_pia<R>(&mut self, idx: usize, op: impl FnOnce(&mut Pia6821) -> R) -> R {
        let result = op(&mut self.pia[idx]);
        for event in self.pia[idx].take_events() {
            if idx == 0 {
                self.pia0_event(event);
            } else {
                self.pia1_event(event);
            }
        }
        result
    }

    pub(crate) fn with_ptm<R>(&mut self, op: impl FnOnce(&mut Ptm6840) -> R) -> R {
        let result = op(&mut self.ptm);
        for event in self.ptm.take_events() {
            match event {
                PtmEvent::Output(0, state) => self.set_ptm_o1(state),
                PtmEvent::Output(1, state) => self.set_ptm_o2(state),
                PtmEvent::Output(_, state) => self.set_ptm_o3(state),
                PtmEvent::Irq(state) => self.set_irq(IrqSource::Ptm, state),
            }
        }
        result
    }

    fn pia0_event(&mut self, event: PiaEvent) {
        match event {
            PiaEvent::PortA(data) => self.ws_dir_w(data),
            PiaEvent::PortB(data) => self.rp = data,
            PiaEvent::Ca2(state) => self.set_not_load(state),
            PiaEvent::Cb2(state) => self.set_run(state),
            PiaEvent::IrqA(state) => self.set_irq(IrqSource::Pia0A, state),
            PiaEvent::IrqB(state) => self.set_irq(IrqSource::Pia0B, state),
        }
    }

    fn pia1_event(&mut self, event: PiaEvent) {
        match event {
            PiaEvent::PortA(data) => {
                let pitch = (self.pitch & 0x0FF) | u16::from(data & 0x03) << 8;
                self.set_pitch_octave(pitch, (data >> 2) & 0x0F);
            }
            PiaEvent::PortB(data) => {
                self.set_pitch_octave((self.pitch & 0xF00) | u16::from(data), self.octave);
            }
            PiaEvent::Ca2(state) => {
                self.permit_eload = state;
                self.update_not_eload();
            }
            PiaEvent::Cb2(state) => self.set_not_wpe(state),
            PiaEvent::IrqA(state) => self.set_irq(IrqSource::Pia1A, state),
            PiaEvent::IrqB(state) => self.set_irq(IrqSource::Pia1B, state),
        }
    }

    fn set_irq(&mut self, source: IrqSource, state: bool) {
        if let Some(level) = self.irq.set(source, state) {
            log::trace!("CMI-01A channel {}: IRQ {}", self.channel, u8::from(level));
        }
    }

    pub(crate) fn set_ptm_gates(&mut self, state: bool) {
        self.with_ptm(|ptm| {
            for timer in 0..3 {
                ptm.set_gate(timer, state);
            }
        });
    }

    fn set_ptm_ext_clocks(&mut self, dividers: [u32; 3]) {
        for (timer, divider) in dividers.into_iter().enumerate() {
            self.ptm.set_ext_clock(timer, divider);
        }
    }

    // --- Register latches ---

    fn ws_dir_w(&mut self, data: u8) {
        self.ws = data & 0x7F;
        self.dir = EnvelopeDirection::from_bit(data & 0x80 != 0);
        self.try_load_upper_wave_addr();
    }

    /// A running voice retunes at once.
    fn set_pitch_octave(&mut self, pitch: u16, octave: u8) {
        if pitch == self.pitch && octave == self.octave {
            return;
        }
        self.pitch = pitch;
        self.octave = octave;
        if self.run {
            self.start_sample_timer();
        }
    }

    // --- RUN, /LOAD and the reset strobe ---

    pub(crate) fn set_run(&mut self, run: bool) {
        let was_running = self.run;
        self.run = run;
        if was_running == run {
            return;
        }
        self.update_rstb_pulser();

        if run {
            self.start_sample_timer();
            self.set_ptm_gates(false);
        } else {
            self.sample_period = None;
            self.current_sample = 0x80;
            self.update_sample16();
            self.set_ptm_gates(true);
            self.set_zx_flipflop_state(false);
        }
    }

    pub(crate) fn set_not_load(&mut self, not_load: bool) {
        if not_load == self.not_load {
            return;
        }
        self.not_load = not_load;
        self.update_rstb_pulser();
        self.update_ptm_c1();
    }

    fn update_rstb_pulser(&mut self) {
        self.set_run_load_xor(self.run != !self.not_load);
    }

    /// Any change of RUN XOR LOAD fires the /RSTB one-shot, which
    /// reloads the wave address.
    fn set_run_load_xor(&mut self, run_load_xor: bool) {
        if run_load_xor == self.run_load_xor {
            return;
        }
        self.run_load_xor = run_load_xor;
        self.new_addr = true;

        self.not_rstb = false;
        self.set_gzx(true);
        self.set_wave_addr_lsb(0);
        self.set_wave_addr_msb(0x80 | self.ws);

        self.not_rstb = true;
        self.set_gzx(false);
    }

    // --- Zero crossing ---

    pub(crate) fn set_zx_flipflop_clock(&mut self, zx_ff_clk: bool) {
        if zx_ff_clk == self.zx_ff_clk {
            return;
        }
        self.zx_ff_clk = zx_ff_clk;
        if zx_ff_clk && self.run {
            self.set_zx_flipflop_state(self.ptm_o1);
        }
    }

    fn set_zx_flipflop_state(&mut self, zx_ff: bool) {
        if zx_ff == self.zx_ff {
            return;
        }
        self.zx_ff = zx_ff;
        self.update_bcas_q1_enable();
        self.pulse_zcint();
    }

    fn pulse_zcint(&mut self) {
        self.with_pia(0, |pia| pia.set_ca1(true));
        self.set_gzx(true);

        self.with_pia(0, |pia| pia.set_ca1(false));
        self.set_gzx(false);
    }

    fn set_gzx(&mut self, gzx: bool) {
        if gzx == self.gzx {
            return;
        }
        self.gzx = gzx;
        self.update_upper_wave_addr_load();
        self.update_not_eload();
        if gzx {
            self.set_envelope_direction(self.dir);
        }
    }

    /// BCAS Q1 gates the PTM's external clocks. It is enabled while the
    /// zero-crossing flip-flop agrees with O1.
    fn update_bcas_q1_enable(&mut self) {
        let was_enabled = self.bcas_q1_enabled;
        self.bcas_q1_enabled = self.zx_ff == self.ptm_o1;

        if !was_enabled && self.bcas_q1_enabled {
            let timer1 = if self.not_load { BCAS_TIMER1_DIVIDER } else { 0 };
            self.set_ptm_ext_clocks([timer1, BCAS_TIMER23_DIVIDER, BCAS_TIMER23_DIVIDER]);
        } else if was_enabled && !self.bcas_q1_enabled {
            self.set_ptm_ext_clocks([0; 3]);
        }
    }

    pub(crate) fn update_ptm_c1(&mut self) {
        let c1 = !self.not_load && !self.zx;
        if c1 == self.ptm_c1 {
            return;
        }
        self.ptm_c1 = c1;
        self.with_ptm(|ptm| ptm.set_clock(0, c1));
    }

    fn set_ptm_o1(&mut self, state: bool) {
        self.ptm_o1 = state;
        self.update_bcas_q1_enable();
    }

    fn set_ptm_o2(&mut self, state: bool) {
        self.ptm_o2 = state;
        self.update_envelope_clock();
    }

    fn set_ptm_o3(&mut self, state: bool) {
        self.ptm_o3 = state;
        self.update_envelope_clock();
    }

    // --- Envelope ---

    fn update_not_eload(&mut self) {
        self.set_not_eload(!(self.permit_eload && self.gzx));
    }

    fn set_not_eload(&mut self, not_eload: bool) {
        if not_eload == self.not_eload {
            return;
        }
        self.not_eload = not_eload;
        if !not_eload {
            self.set_envelope(self.rp);
        }
    }

    fn set_envelope(&mut self, value: u8) {
        if self.envelope.set_value(value) {
            self.update_tri();
        }
    }

    pub(crate) fn set_envelope_direction(&mut self, direction: EnvelopeDirection) {
        if self.envelope.set_direction(direction) {
            self.update_tri();
        }
    }

    fn update_tri(&mut self) {
        let tri = self.envelope.tri();
        self.with_pia(0, |pia| pia.set_cb1(tri));
    }

    /// ECLK selects O2 or O3 by the zero-crossing flip-flop. Each edge
    /// steps the 7497; the envelope counts on rising edges of ECLK itself
    /// (/LOAD high) or of the 7497 output (/LOAD low).
    fn update_envelope_clock(&mut self) {
        let eclk = (self.ptm_o2 && self.zx_ff) || (self.ptm_o3 && !self.zx_ff);
        if eclk == self.eclk {
            return;
        }
        self.eclk = eclk;
        self.envelope.tick_divider();

        let was_env_clk = self.env_clk;
        self.env_clk = (self.not_load && self.eclk) || (!self.not_load && self.envelope.divider_out());
        if !was_env_clk && self.env_clk && self.envelope.clock() {
            self.update_tri();
        }
    }

    // --- Upper wave address load ---

    fn set_not_wpe(&mut self, not_wpe: bool) {
        if not_wpe == self.not_wpe {
            return;
        }
        self.not_wpe = not_wpe;
        self.update_upper_wave_addr_load();
    }

    fn update_upper_wave_addr_load(&mut self) {
        let load = (!self.not_wpe && self.gzx) || !self.not_rstb;
        if load == self.upper_wave_addr_load {
            return;
        }
        self.upper_wave_addr_load = load;
        self.try_load_upper_wave_addr();
    }

    fn try_load_upper_wave_addr(&mut self) {
        if self.upper_wave_addr_load {
            self.set_wave_addr_msb(0x80 | self.ws);
        }
    }
}
