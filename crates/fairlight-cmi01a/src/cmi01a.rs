//! Card state, bus decode and clocking.

use emu_core::{Bus, MasterClock, Observable, Tickable, Value};
use motorola_6821::Pia6821;
use motorola_6840::Ptm6840;

use crate::envelope::{Envelope, EnvelopeDirection};
use crate::irq::InputMerger;
use crate::sequencer::compute_sample;

/// Wave RAM size in bytes (14-bit address).
pub const WAVE_RAM_SIZE: usize = 0x4000;

/// One CMI-01A channel card.
///
/// Control-line fields use the schematic's names; a `not_` prefix marks
/// an active-low signal.
pub struct Cmi01a {
    pub(crate) clock: MasterClock,
    pub(crate) channel: u8,

    pub(crate) pia: [Pia6821; 2],
    pub(crate) ptm: Ptm6840,
    pub(crate) irq: InputMerger,

    pub(crate) wave_ram: Box<[u8]>,
    /// Last byte fetched by the sample timer.
    pub(crate) current_sample: u8,
    /// Scaled output for `current_sample`.
    pub(crate) sample16: i16,

    /// Master oscillator frequency in Hz.
    pub(crate) mosc: f64,
    pub(crate) pitch: u16,
    pub(crate) octave: u8,

    pub(crate) envelope: Envelope,

    pub(crate) zx_ff_clk: bool,
    pub(crate) zx_ff: bool,
    pub(crate) zx: bool,
    pub(crate) gzx: bool,
    pub(crate) run: bool,
    pub(crate) not_rstb: bool,
    pub(crate) not_load: bool,
    pub(crate) not_wpe: bool,
    pub(crate) new_addr: bool,
    pub(crate) permit_eload: bool,
    pub(crate) not_eload: bool,
    pub(crate) bcas_q1_enabled: bool,
    pub(crate) eclk: bool,
    pub(crate) env_clk: bool,

    pub(crate) wave_addr_lsb: u8,
    pub(crate) wave_addr_msb: u8,
    pub(crate) upper_wave_addr_load: bool,
    pub(crate) wave_addr_msb_clock: bool,
    pub(crate) run_load_xor: bool,

    pub(crate) ptm_c1: bool,
    pub(crate) ptm_o1: bool,
    pub(crate) ptm_o2: bool,
    pub(crate) ptm_o3: bool,

    pub(crate) vol_latch: u8,
    pub(crate) flt_latch: u8,
    /// Envelope preset (PIA 0 port B).
    pub(crate) rp: u8,
    /// Wave select (PIA 0 port A bits 0-6).
    pub(crate) ws: u8,
    /// Envelope direction latch (PIA 0 port A bit 7).
    pub(crate) dir: EnvelopeDirection,

    /// Sample timer period in card clocks; `None` while stopped.
    pub(crate) sample_period: Option<f64>,
    pub(crate) sample_phase: f64,

    /// Card clocks per output sample.
    ticks_per_sample: f64,
    pub(crate) output_phase: f64,
    buffer: Vec<i16>,
}

impl Cmi01a {
    /// Create a card clocked by `clock`, producing audio at
    /// `output_sample_rate`. The card comes up in its reset state.
    #[must_use]
    pub fn new(clock: MasterClock, output_sample_rate: u32) -> Self {
        let ticks_per_sample = clock
            .period_ticks(f64::from(output_sample_rate))
            .unwrap_or(f64::INFINITY);
        let mut card = Self {
            clock,
            channel: 0,
            pia: [Pia6821::new(), Pia6821::new()],
            ptm: Ptm6840::new(),
            irq: InputMerger::new(),
            wave_ram: vec![0; WAVE_RAM_SIZE].into_boxed_slice(),
            current_sample: 0,
            sample16: 0,
            mosc: 0.0,
            pitch: 0,
            octave: 0,
            envelope: Envelope::new(),
            zx_ff_clk: false,
            zx_ff: false,
            zx: false,
            gzx: false,
            run: false,
            not_rstb: true,
            not_load: false,
            not_wpe: true,
            new_addr: false,
            permit_eload: false,
            not_eload: true,
            bcas_q1_enabled: true,
            eclk: false,
            env_clk: false,
            wave_addr_lsb: 0,
            wave_addr_msb: 0,
            upper_wave_addr_load: false,
            wave_addr_msb_clock: true,
            run_load_xor: true,
            ptm_c1: false,
            ptm_o1: false,
            ptm_o2: false,
            ptm_o3: false,
            vol_latch: 0,
            flt_latch: 0,
            rp: 0,
            ws: 0,
            dir: EnvelopeDirection::Up,
            sample_period: None,
            sample_phase: 0.0,
            ticks_per_sample,
            output_phase: 0.0,
            buffer: Vec::with_capacity(output_sample_rate as usize / 50 + 1),
        };
        card.reset();
        card
    }

    /// Card reset. Wave RAM, the wave address and the /LOAD line keep
    /// their values.
    pub fn reset(&mut self) {
        self.pia[0].reset();
        self.pia[1].reset();
        self.ptm.reset();
        self.irq = InputMerger::new();

        self.current_sample = 0x80;
        self.new_addr = false;
        self.vol_latch = 0;
        self.flt_latch = 0;
        self.rp = 0;
        self.ws = 0;
        self.dir = EnvelopeDirection::Down;
        self.bcas_q1_enabled = true;
        self.not_rstb = true;

        self.ptm_o1 = false;
        self.ptm_o2 = false;
        self.ptm_o3 = false;

        self.run = false;
        self.gzx = true;
        self.not_wpe = false;
        self.permit_eload = false;

        self.eclk = false;
        self.env_clk = false;
        self.envelope.reset();

        self.pitch = 0;
        self.octave = 0;

        self.update_sample16();
        self.sample_period = None;
        self.sample_phase = 0.0;
        self.output_phase = 0.0;
        self.buffer.clear();

        for timer in 0..3 {
            self.ptm.set_ext_clock(timer, 0);
        }
        self.set_ptm_gates(true);

        // Present current line levels to the freshly reset chips
        let tri = self.envelope.tri();
        let (zx, eosi) = (self.zx, self.wave_addr_msb & 0x80 != 0);
        self.with_pia(0, |pia| pia.set_cb1(tri));
        self.with_pia(1, |pia| {
            pia.set_ca1(zx);
            pia.set_cb1(eosi);
        });
        let c1 = self.ptm_c1;
        self.with_ptm(|ptm| ptm.set_clock(0, c1));
    }

    /// Set the master oscillator frequency (Hz) that the pitch divides.
    /// Takes effect the next time RUN is raised.
    pub fn set_master_osc(&mut self, hz: f64) {
        self.mosc = hz;
    }

    /// Channel number, used to tag log output.
    pub fn set_channel(&mut self, channel: u8) {
        self.channel = channel;
    }

    #[must_use]
    pub fn channel(&self) -> u8 {
        self.channel
    }

    /// Bus write at `offset` from the card base.
    pub fn write(&mut self, offset: u8, data: u8) {
        match offset {
            0x00 => {
                self.new_addr = false;
                let addr = self.wave_addr();
                self.wave_ram[addr] = data;
                self.set_wave_addr_lsb((self.wave_addr_lsb + 1) & 0x7F);
            }
            0x03 => self.set_envelope_direction(EnvelopeDirection::Down),
            0x04 => self.set_envelope_direction(EnvelopeDirection::Up),
            0x05 => self.vol_latch = data,
            0x06 => self.flt_latch = data,
            0x08..=0x0B => self.with_pia(0, |pia| pia.write(offset & 3, data)),
            0x0C..=0x0F => self.with_pia(1, |pia| pia.write(pia1_register(offset), data)),
            0x10..=0x17 => {
                let reg = self.ptm_register(offset);
                self.with_ptm(|ptm| ptm.write(reg, data));
            }
            _ => log::debug!(
                "CMI-01A channel {}: unknown write ${offset:02X} = ${data:02X}",
                self.channel
            ),
        }
    }

    /// Bus read at `offset` from the card base.
    pub fn read(&mut self, offset: u8) -> u8 {
        match offset {
            0x00 => {
                let data = self.wave_ram[self.wave_addr()];
                if !self.new_addr {
                    self.set_wave_addr_lsb((self.wave_addr_lsb + 1) & 0x7F);
                }
                self.new_addr = false;
                data
            }
            0x03 => {
                self.set_envelope_direction(EnvelopeDirection::Down);
                0
            }
            0x04 => {
                self.set_envelope_direction(EnvelopeDirection::Up);
                0
            }
            0x05 => 0xFF,
            0x06 => 0,
            0x08..=0x0B => {
                self.refresh_port_inputs();
                self.with_pia(0, |pia| pia.read(offset & 3))
            }
            0x0C..=0x0F => {
                self.refresh_port_inputs();
                self.with_pia(1, |pia| pia.read(pia1_register(offset)))
            }
            0x10..=0x17 => {
                let reg = self.ptm_register(offset);
                self.with_ptm(|ptm| ptm.read(reg))
            }
            _ => {
                log::debug!("CMI-01A channel {}: unknown read ${offset:02X}", self.channel);
                0
            }
        }
    }

    /// Debugger read. The card's registers all have read side effects, so
    /// this returns 0.
    #[must_use]
    pub fn peek(&self, _offset: u8) -> u8 {
        0
    }

    /// Current output frame value; silence while RUN is low.
    #[must_use]
    pub fn output_sample(&self) -> i16 {
        if self.run { self.sample16 } else { 0 }
    }

    /// Merged interrupt line (any PIA side or the PTM).
    #[must_use]
    pub fn irq_active(&self) -> bool {
        self.irq.output()
    }

    /// Take the audio output buffer (drains it).
    pub fn take_buffer(&mut self) -> Vec<i16> {
        std::mem::take(&mut self.buffer)
    }

    /// Number of samples in the output buffer.
    #[must_use]
    pub fn buffer_len(&self) -> usize {
        self.buffer.len()
    }

    #[must_use]
    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    /// Wave address as (LSB, MSB).
    #[must_use]
    pub fn wave_address(&self) -> (u8, u8) {
        (self.wave_addr_lsb, self.wave_addr_msb)
    }

    #[must_use]
    pub fn run(&self) -> bool {
        self.run
    }

    #[must_use]
    pub fn volume(&self) -> u8 {
        self.vol_latch
    }

    #[must_use]
    pub fn filter(&self) -> u8 {
        self.flt_latch
    }

    #[must_use]
    pub fn pitch(&self) -> u16 {
        self.pitch
    }

    #[must_use]
    pub fn octave(&self) -> u8 {
        self.octave
    }

    /// Direct wave RAM access for hosts that preload samples.
    #[must_use]
    pub fn wave_ram(&self) -> &[u8] {
        &self.wave_ram
    }

    pub fn wave_ram_mut(&mut self) -> &mut [u8] {
        &mut self.wave_ram
    }

    // --- Internal helpers ---

    pub(crate) fn wave_addr(&self) -> usize {
        ((usize::from(self.wave_addr_msb) << 7) | usize::from(self.wave_addr_lsb)) & (WAVE_RAM_SIZE - 1)
    }

    pub(crate) fn update_sample16(&mut self) {
        self.sample16 = compute_sample(self.current_sample, self.envelope.value(), self.vol_latch);
    }

    /// PTM register select. A1 is offset bit 2 when bit 3 is clear and
    /// O1 when it is set.
    fn ptm_register(&self, offset: u8) -> u8 {
        let bit = |n: u8| offset >> n & 1 != 0;
        let a0 = offset & 1;
        let a1 = u8::from((self.ptm_o1 && bit(3)) || (!bit(3) && bit(2)));
        let a2 = u8::from(bit(1));
        a2 << 2 | a1 << 1 | a0
    }

    fn refresh_port_inputs(&mut self) {
        let ws_dir = self.ws | u8::from(self.dir.bit()) << 7;
        let pitch_octave = ((self.pitch >> 8) as u8 & 0x03) | self.octave << 2;
        self.pia[0].set_port_a_input(ws_dir);
        self.pia[0].set_port_b_input(self.rp);
        self.pia[1].set_port_a_input(pitch_octave);
        self.pia[1].set_port_b_input(self.pitch as u8);
    }
}

/// PIA 1 has RS0/RS1 wired to A1/A0.
fn pia1_register(offset: u8) -> u8 {
    (offset & 1) << 1 | (offset >> 1 & 1)
}

impl Tickable for Cmi01a {
    fn tick(&mut self) {
        self.with_ptm(Ptm6840::tick);

        if let Some(period) = self.sample_period {
            self.sample_phase += 1.0;
            while self.sample_phase >= period {
                self.sample_phase -= period;
                self.update_sample();
            }
        }

        self.output_phase += 1.0;
        if self.output_phase >= self.ticks_per_sample {
            self.output_phase -= self.ticks_per_sample;
            self.buffer.push(self.output_sample());
        }
    }
}

impl Bus for Cmi01a {
    fn read(&mut self, address: u16) -> u8 {
        match u8::try_from(address) {
            Ok(offset) => Cmi01a::read(self, offset),
            Err(_) => {
                log::debug!("CMI-01A channel {}: unknown read ${address:04X}", self.channel);
                0
            }
        }
    }

    fn write(&mut self, address: u16, value: u8) {
        match u8::try_from(address) {
            Ok(offset) => Cmi01a::write(self, offset, value),
            Err(_) => log::debug!(
                "CMI-01A channel {}: unknown write ${address:04X} = ${value:02X}",
                self.channel
            ),
        }
    }

    fn peek(&self, address: u16) -> u8 {
        u8::try_from(address).map_or(0, |offset| Cmi01a::peek(self, offset))
    }
}

impl Observable for Cmi01a {
    fn query(&self, path: &str) -> Option<Value> {
        if let Some(rest) = path.strip_prefix("env.") {
            let env = &self.envelope;
            return match rest {
                "value" => Some(env.value().into()),
                "direction" => Some(env.direction().name().into()),
                "divider" => Some(env.divider().into()),
                "divider_out" => Some(env.divider_out().into()),
                "tri" => Some(env.tri().into()),
                _ => None,
            };
        }
        if let Some(rest) = path.strip_prefix("wave.") {
            return match rest {
                "lsb" => Some(self.wave_addr_lsb.into()),
                "msb" => Some(self.wave_addr_msb.into()),
                "address" => Some((self.wave_addr() as u16).into()),
                "current" => Some(self.current_sample.into()),
                "select" => Some(self.ws.into()),
                _ => None,
            };
        }
        if let Some(rest) = path.strip_prefix("ptm.") {
            return match rest {
                "counters" => Some([0, 1, 2].map(|i| self.ptm.counter(i)).into()),
                "latches" => Some([0, 1, 2].map(|i| self.ptm.latch(i)).into()),
                "outputs" => Some([self.ptm_o1, self.ptm_o2, self.ptm_o3].into()),
                "irq" => Some(self.ptm.irq().into()),
                _ => None,
            };
        }
        let value = match path {
            "pia0.cra" => self.pia[0].control_a().into(),
            "pia0.crb" => self.pia[0].control_b().into(),
            "pia1.cra" => self.pia[1].control_a().into(),
            "pia1.crb" => self.pia[1].control_b().into(),
            "channel" => self.channel.into(),
            "sample" => self.sample16.into(),
            "output" => self.output_sample().into(),
            "volume" => self.vol_latch.into(),
            "filter" => self.flt_latch.into(),
            "rp" => self.rp.into(),
            "pitch" => self.pitch.into(),
            "octave" => self.octave.into(),
            "mosc" => self.mosc.into(),
            "run" => self.run.into(),
            "not_load" => self.not_load.into(),
            "not_wpe" => self.not_wpe.into(),
            "not_rstb" => self.not_rstb.into(),
            "not_eload" => self.not_eload.into(),
            "permit_eload" => self.permit_eload.into(),
            "zx" => self.zx.into(),
            "zx_ff" => self.zx_ff.into(),
            "gzx" => self.gzx.into(),
            "eclk" => self.eclk.into(),
            "bcas_q1" => self.bcas_q1_enabled.into(),
            "irq" => self.irq.output().into(),
            "irq.inputs" => self.irq.inputs().into(),
            _ => return None,
        };
        Some(value)
    }

    fn query_paths(&self) -> &'static [&'static str] {
        &[
            "env.value",
            "env.direction",
            "env.divider",
            "env.divider_out",
            "env.tri",
            "wave.lsb",
            "wave.msb",
            "wave.address",
            "wave.current",
            "wave.select",
            "ptm.counters",
            "ptm.latches",
            "ptm.outputs",
            "ptm.irq",
            "pia0.cra",
            "pia0.crb",
            "pia1.cra",
            "pia1.crb",
            "channel",
            "sample",
            "output",
            "volume",
            "filter",
            "rp",
            "pitch",
            "octave",
            "mosc",
            "run",
            "not_load",
            "not_wpe",
            "not_rstb",
            "not_eload",
            "permit_eload",
            "zx",
            "zx_ff",
            "gzx",
            "eclk",
            "bcas_q1",
            "irq",
            "irq.inputs",
        ]
    }
}
