//! Save state support.
//!
//! A [`Snapshot`] holds everything needed to resume a card mid-note: wave
//! RAM, the control-line levels, both PIAs, the PTM and the sample timer
//! phase. It serializes either through serde or to a fixed little-endian
//! byte layout behind a `CMIS` header.

use motorola_6821::{PiaState, PortSide};
use motorola_6840::{PtmState, TimerState};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cmi01a::{Cmi01a, WAVE_RAM_SIZE};
use crate::envelope::EnvelopeDirection;
use crate::sequencer::MIN_SAMPLE_PERIOD;

/// Magic bytes for snapshot identification.
const SNAPSHOT_MAGIC: &[u8; 4] = b"CMIS";

/// Current snapshot format version.
const SNAPSHOT_VERSION: u8 = 1;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SnapshotError {
    #[error("snapshot too small ({0} bytes)")]
    TooShort(usize),
    #[error("invalid snapshot magic")]
    BadMagic,
    #[error("unsupported snapshot version {0}")]
    UnsupportedVersion(u8),
    #[error("snapshot truncated ({0})")]
    Truncated(&'static str),
    #[error("wave RAM is {0} bytes, expected 16384")]
    WaveRamSize(usize),
}

/// Envelope counter and 7497 state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvelopeState {
    pub value: u8,
    pub direction: EnvelopeDirection,
    pub divider: u8,
    pub divider_out: bool,
    pub divider_count: u8,
    pub tri: bool,
}

/// Control-line levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineState {
    pub zx_ff_clk: bool,
    pub zx_ff: bool,
    pub zx: bool,
    pub gzx: bool,
    pub run: bool,
    pub not_rstb: bool,
    pub not_load: bool,
    pub not_wpe: bool,
    pub new_addr: bool,
    pub permit_eload: bool,
    pub not_eload: bool,
    pub bcas_q1_enabled: bool,
    pub eclk: bool,
    pub env_clk: bool,
    pub upper_wave_addr_load: bool,
    pub wave_addr_msb_clock: bool,
    pub run_load_xor: bool,
    pub ptm_c1: bool,
    pub ptm_o1: bool,
    pub ptm_o2: bool,
    pub ptm_o3: bool,
}

/// Complete card state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub channel: u8,
    pub wave_ram: Vec<u8>,
    pub current_sample: u8,
    pub mosc: f64,
    pub pitch: u16,
    pub octave: u8,
    pub envelope: EnvelopeState,
    pub lines: LineState,
    pub wave_addr_lsb: u8,
    pub wave_addr_msb: u8,
    pub vol_latch: u8,
    pub flt_latch: u8,
    pub rp: u8,
    pub ws: u8,
    pub dir: EnvelopeDirection,
    /// Sample timer period in card clocks; `None` while stopped.
    pub sample_period: Option<f64>,
    pub sample_phase: f64,
    pub output_phase: f64,
    pub irq_inputs: u8,
    pub pia: [PiaState; 2],
    pub ptm: PtmState,
}

impl Snapshot {
    /// Capture the card's current state. The audio output buffer is not
    /// included.
    #[must_use]
    pub fn capture(card: &Cmi01a) -> Self {
        let env = &card.envelope;
        Self {
            channel: card.channel,
            wave_ram: card.wave_ram.to_vec(),
            current_sample: card.current_sample,
            mosc: card.mosc,
            pitch: card.pitch,
            octave: card.octave,
            envelope: EnvelopeState {
                value: env.value(),
                direction: env.direction(),
                divider: env.divider(),
                divider_out: env.divider_out(),
                divider_count: env.divider_count(),
                tri: env.tri(),
            },
            lines: LineState {
                zx_ff_clk: card.zx_ff_clk,
                zx_ff: card.zx_ff,
                zx: card.zx,
                gzx: card.gzx,
                run: card.run,
                not_rstb: card.not_rstb,
                not_load: card.not_load,
                not_wpe: card.not_wpe,
                new_addr: card.new_addr,
                permit_eload: card.permit_eload,
                not_eload: card.not_eload,
                bcas_q1_enabled: card.bcas_q1_enabled,
                eclk: card.eclk,
                env_clk: card.env_clk,
                upper_wave_addr_load: card.upper_wave_addr_load,
                wave_addr_msb_clock: card.wave_addr_msb_clock,
                run_load_xor: card.run_load_xor,
                ptm_c1: card.ptm_c1,
                ptm_o1: card.ptm_o1,
                ptm_o2: card.ptm_o2,
                ptm_o3: card.ptm_o3,
            },
            wave_addr_lsb: card.wave_addr_lsb,
            wave_addr_msb: card.wave_addr_msb,
            vol_latch: card.vol_latch,
            flt_latch: card.flt_latch,
            rp: card.rp,
            ws: card.ws,
            dir: card.dir,
            sample_period: card.sample_period,
            sample_phase: card.sample_phase,
            output_phase: card.output_phase,
            irq_inputs: card.irq.inputs(),
            pia: [card.pia[0].snapshot(), card.pia[1].snapshot()],
            ptm: card.ptm.snapshot(),
        }
    }

    /// Load this state into `card`. The card's clock and output rate are
    /// kept; its audio buffer is cleared.
    pub fn restore(&self, card: &mut Cmi01a) -> Result<(), SnapshotError> {
        if self.wave_ram.len() != WAVE_RAM_SIZE {
            return Err(SnapshotError::WaveRamSize(self.wave_ram.len()));
        }

        card.channel = self.channel;
        card.wave_ram.copy_from_slice(&self.wave_ram);
        card.current_sample = self.current_sample;
        card.mosc = self.mosc;
        card.pitch = self.pitch & 0x3FF;
        card.octave = self.octave & 0x0F;

        let env = &self.envelope;
        card.envelope.restore(
            env.value,
            env.direction,
            env.divider,
            env.divider_out,
            env.divider_count,
            env.tri,
        );

        let lines = &self.lines;
        card.zx_ff_clk = lines.zx_ff_clk;
        card.zx_ff = lines.zx_ff;
        card.zx = lines.zx;
        card.gzx = lines.gzx;
        card.run = lines.run;
        card.not_rstb = lines.not_rstb;
        card.not_load = lines.not_load;
        card.not_wpe = lines.not_wpe;
        card.new_addr = lines.new_addr;
        card.permit_eload = lines.permit_eload;
        card.not_eload = lines.not_eload;
        card.bcas_q1_enabled = lines.bcas_q1_enabled;
        card.eclk = lines.eclk;
        card.env_clk = lines.env_clk;
        card.upper_wave_addr_load = lines.upper_wave_addr_load;
        card.wave_addr_msb_clock = lines.wave_addr_msb_clock;
        card.run_load_xor = lines.run_load_xor;
        card.ptm_c1 = lines.ptm_c1;
        card.ptm_o1 = lines.ptm_o1;
        card.ptm_o2 = lines.ptm_o2;
        card.ptm_o3 = lines.ptm_o3;

        card.wave_addr_lsb = self.wave_addr_lsb & 0x7F;
        card.wave_addr_msb = self.wave_addr_msb;
        card.vol_latch = self.vol_latch;
        card.flt_latch = self.flt_latch;
        card.rp = self.rp;
        card.ws = self.ws & 0x7F;
        card.dir = self.dir;
        card.sample_period = self
            .sample_period
            .filter(|period| period.is_finite())
            .map(|period| period.max(MIN_SAMPLE_PERIOD));
        card.sample_phase = if self.sample_phase.is_finite() { self.sample_phase } else { 0.0 };
        card.output_phase = self.output_phase;

        card.irq.restore(self.irq_inputs);
        card.pia[0].restore(&self.pia[0]);
        card.pia[1].restore(&self.pia[1]);
        card.ptm.restore(&self.ptm);

        card.update_sample16();
        card.take_buffer();

        log::debug!(
            "CMI-01A channel {}: restored snapshot, wave address ${:02X}:{:02X}",
            card.channel,
            card.wave_addr_msb,
            card.wave_addr_lsb
        );
        Ok(())
    }

    /// Serialize to the byte layout.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut w = Writer(Vec::with_capacity(WAVE_RAM_SIZE + 256));

        // Header
        w.bytes(SNAPSHOT_MAGIC);
        w.u8(SNAPSHOT_VERSION);

        // Voice parameters
        w.u8(self.channel);
        w.f64(self.mosc);
        w.u16(self.pitch);
        w.u8(self.octave);
        w.u8(self.vol_latch);
        w.u8(self.flt_latch);
        w.u8(self.rp);
        w.u8(self.ws);
        w.bool(self.dir.bit());

        // Envelope
        let env = &self.envelope;
        w.u8(env.value);
        w.bool(env.direction.bit());
        w.u8(env.divider);
        w.bool(env.divider_out);
        w.u8(env.divider_count);
        w.bool(env.tri);

        // Lines
        for level in self.lines.to_array() {
            w.bool(level);
        }

        // Wave address and sample timer
        w.u8(self.wave_addr_lsb);
        w.u8(self.wave_addr_msb);
        w.u8(self.current_sample);
        w.bool(self.sample_period.is_some());
        w.f64(self.sample_period.unwrap_or(0.0));
        w.f64(self.sample_phase);
        w.f64(self.output_phase);

        // Chips
        w.u8(self.irq_inputs);
        for pia in &self.pia {
            w.port_side(&pia.a);
            w.port_side(&pia.b);
        }
        for timer in &self.ptm.timers {
            w.timer(timer);
        }
        w.u8(self.ptm.msb_buffer);
        w.u8(self.ptm.lsb_buffer);
        w.u8(self.ptm.status_seen);
        w.bool(self.ptm.irq_line);

        // Wave RAM
        w.bytes(&self.wave_ram);

        w.0
    }

    /// Deserialize from the byte layout.
    pub fn from_bytes(data: &[u8]) -> Result<Self, SnapshotError> {
        if data.len() < 5 {
            return Err(SnapshotError::TooShort(data.len()));
        }
        if &data[0..4] != SNAPSHOT_MAGIC {
            return Err(SnapshotError::BadMagic);
        }
        if data[4] != SNAPSHOT_VERSION {
            return Err(SnapshotError::UnsupportedVersion(data[4]));
        }

        let mut r = Reader { data, pos: 5 };

        let channel = r.u8("voice")?;
        let mosc = r.f64("voice")?;
        let pitch = r.u16("voice")?;
        let octave = r.u8("voice")?;
        let vol_latch = r.u8("voice")?;
        let flt_latch = r.u8("voice")?;
        let rp = r.u8("voice")?;
        let ws = r.u8("voice")?;
        let dir = EnvelopeDirection::from_bit(r.bool("voice")?);

        let envelope = EnvelopeState {
            value: r.u8("envelope")?,
            direction: EnvelopeDirection::from_bit(r.bool("envelope")?),
            divider: r.u8("envelope")?,
            divider_out: r.bool("envelope")?,
            divider_count: r.u8("envelope")?,
            tri: r.bool("envelope")?,
        };

        let mut levels = [false; LineState::COUNT];
        for level in &mut levels {
            *level = r.bool("lines")?;
        }
        let lines = LineState::from_array(levels);

        let wave_addr_lsb = r.u8("sequencer")?;
        let wave_addr_msb = r.u8("sequencer")?;
        let current_sample = r.u8("sequencer")?;
        let running = r.bool("sequencer")?;
        let period = r.f64("sequencer")?;
        let sample_period = running.then_some(period);
        let sample_phase = r.f64("sequencer")?;
        let output_phase = r.f64("sequencer")?;

        let irq_inputs = r.u8("chips")?;
        let mut pia = [PiaState::default(); 2];
        for state in &mut pia {
            state.a = r.port_side()?;
            state.b = r.port_side()?;
        }
        let timers = [r.timer()?, r.timer()?, r.timer()?];
        let ptm = PtmState {
            timers,
            msb_buffer: r.u8("ptm")?,
            lsb_buffer: r.u8("ptm")?,
            status_seen: r.u8("ptm")?,
            irq_line: r.bool("ptm")?,
        };

        let wave_ram = r.bytes(WAVE_RAM_SIZE, "wave RAM")?.to_vec();

        Ok(Self {
            channel,
            wave_ram,
            current_sample,
            mosc,
            pitch,
            octave,
            envelope,
            lines,
            wave_addr_lsb,
            wave_addr_msb,
            vol_latch,
            flt_latch,
            rp,
            ws,
            dir,
            sample_period,
            sample_phase,
            output_phase,
            irq_inputs,
            pia,
            ptm,
        })
    }
}

impl LineState {
    const COUNT: usize = 21;

    fn to_array(self) -> [bool; Self::COUNT] {
        [
            self.zx_ff_clk,
            self.zx_ff,
            self.zx,
            self.gzx,
            self.run,
            self.not_rstb,
            self.not_load,
            self.not_wpe,
            self.new_addr,
            self.permit_eload,
            self.not_eload,
            self.bcas_q1_enabled,
            self.eclk,
            self.env_clk,
            self.upper_wave_addr_load,
            self.wave_addr_msb_clock,
            self.run_load_xor,
            self.ptm_c1,
            self.ptm_o1,
            self.ptm_o2,
            self.ptm_o3,
        ]
    }

    fn from_array(l: [bool; Self::COUNT]) -> Self {
        Self {
            zx_ff_clk: l[0],
            zx_ff: l[1],
            zx: l[2],
            gzx: l[3],
            run: l[4],
            not_rstb: l[5],
            not_load: l[6],
            not_wpe: l[7],
            new_addr: l[8],
            permit_eload: l[9],
            not_eload: l[10],
            bcas_q1_enabled: l[11],
            eclk: l[12],
            env_clk: l[13],
            upper_wave_addr_load: l[14],
            wave_addr_msb_clock: l[15],
            run_load_xor: l[16],
            ptm_c1: l[17],
            ptm_o1: l[18],
            ptm_o2: l[19],
            ptm_o3: l[20],
        }
    }
}

struct Writer(Vec<u8>);

impl Writer {
    fn u8(&mut self, value: u8) {
        self.0.push(value);
    }

    fn bool(&mut self, value: bool) {
        self.0.push(u8::from(value));
    }

    fn u16(&mut self, value: u16) {
        self.0.extend_from_slice(&value.to_le_bytes());
    }

    fn u32(&mut self, value: u32) {
        self.0.extend_from_slice(&value.to_le_bytes());
    }

    fn f64(&mut self, value: f64) {
        self.0.extend_from_slice(&value.to_le_bytes());
    }

    fn bytes(&mut self, bytes: &[u8]) {
        self.0.extend_from_slice(bytes);
    }

    fn port_side(&mut self, side: &PortSide) {
        self.u8(side.output);
        self.u8(side.ddr);
        self.u8(side.control);
        self.u8(side.input);
        self.bool(side.c1);
        self.bool(side.c2_input);
        self.bool(side.c2_output);
        self.bool(side.irq1);
        self.bool(side.irq2);
        self.bool(side.irq_line);
    }

    fn timer(&mut self, timer: &TimerState) {
        self.u8(timer.control);
        self.u16(timer.latch);
        self.u16(timer.counter);
        self.bool(timer.output);
        self.bool(timer.pin);
        self.bool(timer.gate);
        self.bool(timer.clock_input);
        self.u32(timer.ext_divider);
        self.u32(timer.ext_phase);
        self.u8(timer.prescale_count);
        self.bool(timer.irq_flag);
        self.bool(timer.running);
        self.bool(timer.armed);
    }
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn bytes(&mut self, len: usize, section: &'static str) -> Result<&'a [u8], SnapshotError> {
        let end = self.pos + len;
        let bytes = self.data.get(self.pos..end).ok_or(SnapshotError::Truncated(section))?;
        self.pos = end;
        Ok(bytes)
    }

    fn array<const N: usize>(&mut self, section: &'static str) -> Result<[u8; N], SnapshotError> {
        let mut out = [0; N];
        out.copy_from_slice(self.bytes(N, section)?);
        Ok(out)
    }

    fn u8(&mut self, section: &'static str) -> Result<u8, SnapshotError> {
        Ok(self.bytes(1, section)?[0])
    }

    fn bool(&mut self, section: &'static str) -> Result<bool, SnapshotError> {
        Ok(self.u8(section)? != 0)
    }

    fn u16(&mut self, section: &'static str) -> Result<u16, SnapshotError> {
        Ok(u16::from_le_bytes(self.array(section)?))
    }

    fn u32(&mut self, section: &'static str) -> Result<u32, SnapshotError> {
        Ok(u32::from_le_bytes(self.array(section)?))
    }

    fn f64(&mut self, section: &'static str) -> Result<f64, SnapshotError> {
        Ok(f64::from_le_bytes(self.array(section)?))
    }

    fn port_side(&mut self) -> Result<PortSide, SnapshotError> {
        const SECTION: &str = "pia";
        Ok(PortSide {
            output: self.u8(SECTION)?,
            ddr: self.u8(SECTION)?,
            control: self.u8(SECTION)?,
            input: self.u8(SECTION)?,
            c1: self.bool(SECTION)?,
            c2_input: self.bool(SECTION)?,
            c2_output: self.bool(SECTION)?,
            irq1: self.bool(SECTION)?,
            irq2: self.bool(SECTION)?,
            irq_line: self.bool(SECTION)?,
        })
    }

    fn timer(&mut self) -> Result<TimerState, SnapshotError> {
        const SECTION: &str = "ptm";
        Ok(TimerState {
            control: self.u8(SECTION)?,
            latch: self.u16(SECTION)?,
            counter: self.u16(SECTION)?,
            output: self.bool(SECTION)?,
            pin: self.bool(SECTION)?,
            gate: self.bool(SECTION)?,
            clock_input: self.bool(SECTION)?,
            ext_divider: self.u32(SECTION)?,
            ext_phase: self.u32(SECTION)?,
            prescale_count: self.u8(SECTION)?,
            irq_flag: self.bool(SECTION)?,
            running: self.bool(SECTION)?,
            armed: self.bool(SECTION)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use emu_core::{MasterClock, Tickable, Ticks};

    use super::*;

    /// A card mid-note: RUN high, envelope and PTM running.
    fn playing_card() -> Cmi01a {
        let mut card = Cmi01a::new(MasterClock::new(2_000_000), 48_000);
        card.set_master_osc(32_000.0);
        for (i, byte) in card.wave_ram_mut().iter_mut().enumerate() {
            *byte = (i * 7) as u8;
        }
        card.write(0x05, 0xC0); // volume
        // PIA 0 and PIA 1: all outputs, C2 manual low
        for (cra, crb, pa, pb) in [(0x09, 0x0B, 0x08, 0x0A), (0x0E, 0x0F, 0x0C, 0x0D)] {
            card.write(cra, 0x30);
            card.write(crb, 0x30);
            card.write(pa, 0xFF);
            card.write(pb, 0xFF);
            card.write(cra, 0x34);
            card.write(crb, 0x34);
        }
        card.write(0x08, 0x81); // ws 1, direction up
        card.write(0x0C, 0x20); // octave 8
        card.write(0x0D, 0x40); // pitch
        // PTM timer 3 continuous on E, output enabled
        card.write(0x11, 0x01); // CR2: register 0 is CR1
        card.write(0x10, 0x00); // CR1: release reset
        card.write(0x11, 0x00); // CR2: register 0 is CR3
        card.write(0x10, 0x82); // CR3
        card.write(0x16, 0x00); // MSB buffer
        card.write(0x17, 0x20); // timer 3 latch
        card.write(0x0B, 0x3C); // RUN
        card.tick_n(Ticks::new(5_000));
        card
    }

    #[test]
    fn byte_round_trip() {
        let card = playing_card();
        let snap = Snapshot::capture(&card);
        let bytes = snap.to_bytes();
        assert_eq!(&bytes[0..4], b"CMIS");
        assert_eq!(Snapshot::from_bytes(&bytes), Ok(snap));
    }

    #[test]
    fn serde_round_trip() {
        let snap = Snapshot::capture(&playing_card());
        let encoded = rmp_serde::to_vec(&snap).expect("encode");
        let decoded: Snapshot = rmp_serde::from_slice(&encoded).expect("decode");
        assert_eq!(decoded, snap);
    }

    #[test]
    fn rejects_bad_headers() {
        assert_eq!(Snapshot::from_bytes(b"CMI"), Err(SnapshotError::TooShort(3)));
        assert_eq!(Snapshot::from_bytes(b"XXXX\x01rest"), Err(SnapshotError::BadMagic));
        assert_eq!(
            Snapshot::from_bytes(b"CMIS\x09rest"),
            Err(SnapshotError::UnsupportedVersion(9))
        );
    }

    #[test]
    fn rejects_truncation() {
        let bytes = Snapshot::capture(&playing_card()).to_bytes();
        assert_eq!(
            Snapshot::from_bytes(&bytes[..bytes.len() - 1]),
            Err(SnapshotError::Truncated("wave RAM"))
        );
        assert_eq!(Snapshot::from_bytes(&bytes[..8]), Err(SnapshotError::Truncated("voice")));
    }

    #[test]
    fn restore_clamps_sample_period() {
        let mut snap = Snapshot::capture(&playing_card());
        snap.sample_period = Some(1e-300);
        let mut card = Cmi01a::new(MasterClock::new(2_000_000), 48_000);
        snap.restore(&mut card).expect("restore");
        assert_eq!(card.sample_period, Some(1.0));

        snap.sample_period = Some(f64::NAN);
        snap.restore(&mut card).expect("restore");
        assert_eq!(card.sample_period, None, "a NaN period stops the timer");
    }

    #[test]
    fn rejects_wrong_wave_ram_size() {
        let mut snap = Snapshot::capture(&playing_card());
        snap.wave_ram.truncate(100);
        let mut card = Cmi01a::new(MasterClock::new(2_000_000), 48_000);
        assert_eq!(snap.restore(&mut card), Err(SnapshotError::WaveRamSize(100)));
    }

    #[test]
    fn restored_card_continues_identically() {
        let mut live = playing_card();
        let snap = Snapshot::from_bytes(&Snapshot::capture(&live).to_bytes()).expect("decode");

        let mut restored = Cmi01a::new(MasterClock::new(2_000_000), 48_000);
        snap.restore(&mut restored).expect("restore");
        live.take_buffer();

        live.tick_n(Ticks::new(20_000));
        restored.tick_n(Ticks::new(20_000));
        assert_eq!(live.take_buffer(), restored.take_buffer());
        assert_eq!(Snapshot::capture(&live), Snapshot::capture(&restored));
    }
}
