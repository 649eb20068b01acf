//! Motorola MC6840 Programmable Timer Module (PTM).
//!
//! Three 16-bit down-counters, each with a latch, a control register, a
//! gate input, a clock input and an output pin. Counters run from the E
//! clock or from their external clock input, as one 16-bit counter or as
//! two cascaded 8-bit counters.
//!
//! # Registers
//!
//! | Reg | Write                         | Read                 |
//! |-----|-------------------------------|----------------------|
//! | 0   | CR3 (CR2 bit 0 = 0) / CR1 (= 1) | -                  |
//! | 1   | CR2                           | Status               |
//! | 2   | MSB buffer                    | Timer 1 counter MSB  |
//! | 3   | Timer 1 latch (MSB buffer + data) | LSB buffer       |
//! | 4   | MSB buffer                    | Timer 2 counter MSB  |
//! | 5   | Timer 2 latch                 | LSB buffer           |
//! | 6   | MSB buffer                    | Timer 3 counter MSB  |
//! | 7   | Timer 3 latch                 | LSB buffer           |
//!
//! # Control register
//!
//! | Bit | Meaning |
//! |-----|---------|
//! | 7   | Output enable |
//! | 6   | Interrupt enable |
//! | 5-3 | Mode: `0x0` continuous, `1x0` single-shot (bit 4 = 1 disables initialize-on-latch-write); `0x1` frequency comparison, `1x1` pulse-width comparison (bit 4 selects the interrupt condition) |
//! | 2   | 1 = dual 8-bit counting |
//! | 1   | 1 = E clock, 0 = external clock |
//! | 0   | CR1: internal reset; CR2: CR1/CR3 select; CR3: timer 3 ÷8 prescaler |
//!
//! Output and IRQ pin changes are queued as [`PtmEvent`]s and drained by
//! the host with [`take_events`](Ptm6840::take_events).

const CR_SPECIAL: u8 = 0x01;
const CR_INTERNAL_CLOCK: u8 = 0x02;
const CR_DUAL_8BIT: u8 = 0x04;
const CR_COMPARISON: u8 = 0x08;
const CR_NO_WRITE_INIT: u8 = 0x10;
const CR_SINGLE_SHOT: u8 = 0x20;
const CR_IRQ_ENABLE: u8 = 0x40;
const CR_OUTPUT_ENABLE: u8 = 0x80;

/// Timer 3's optional prescaler divides its clock by this.
const PRESCALE: u8 = 8;

/// A change on one of the PTM's output pins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PtmEvent {
    /// Output pin O1-O3 (index 0-2) changed level.
    Output(usize, bool),
    /// /IRQ changed (true = asserted).
    Irq(bool),
}

/// State of one timer channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TimerState {
    pub control: u8,
    pub latch: u16,
    pub counter: u16,
    /// Internal output flip-flop, before the output-enable gate.
    pub output: bool,
    /// Level currently presented on the output pin.
    pub pin: bool,
    pub gate: bool,
    /// Last level seen on the external clock input.
    pub clock_input: bool,
    /// E clocks per external clock pulse; 0 = no external clock.
    pub ext_divider: u32,
    pub ext_phase: u32,
    pub prescale_count: u8,
    pub irq_flag: bool,
    /// Counter has been initialized and is counting.
    pub running: bool,
    /// Single-shot not yet timed out, or comparison window open.
    pub armed: bool,
}

impl TimerState {
    fn reset() -> Self {
        Self {
            control: 0,
            latch: 0xFFFF,
            counter: 0xFFFF,
            output: false,
            pin: false,
            gate: false,
            clock_input: false,
            ext_divider: 0,
            ext_phase: 0,
            prescale_count: 0,
            irq_flag: false,
            running: false,
            armed: false,
        }
    }

    fn comparison(&self) -> bool {
        self.control & CR_COMPARISON != 0
    }

    fn single_shot(&self) -> bool {
        self.control & CR_SINGLE_SHOT != 0
    }

    fn dual_8bit(&self) -> bool {
        self.control & CR_DUAL_8BIT != 0
    }

    fn internal_clock(&self) -> bool {
        self.control & CR_INTERNAL_CLOCK != 0
    }

    fn pin_level(&self) -> bool {
        self.output && self.control & CR_OUTPUT_ENABLE != 0
    }

    /// Dual 8-bit output: high while the MSB half has reached zero.
    fn dual_8bit_output(&self) -> bool {
        self.counter >> 8 == 0
    }
}

/// Complete PTM state, for snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PtmState {
    pub timers: [TimerState; 3],
    pub msb_buffer: u8,
    pub lsb_buffer: u8,
    /// IRQ flags visible at the last status register read.
    pub status_seen: u8,
    pub irq_line: bool,
}

/// Motorola MC6840 PTM.
#[derive(Debug, Clone)]
pub struct Ptm6840 {
    timers: [TimerState; 3],
    msb_buffer: u8,
    lsb_buffer: u8,
    status_seen: u8,
    irq_line: bool,
    events: Vec<PtmEvent>,
}

impl Ptm6840 {
    /// Create a PTM in its reset state (CR1 internal reset asserted).
    #[must_use]
    pub fn new() -> Self {
        let mut ptm = Self {
            timers: [TimerState::reset(); 3],
            msb_buffer: 0,
            lsb_buffer: 0,
            status_seen: 0,
            irq_line: false,
            events: Vec::new(),
        };
        ptm.timers[0].control = CR_SPECIAL;
        ptm
    }

    /// /RESET: registers return to power-on values. Gate, clock input
    /// and external clock settings are wiring, so they survive. No events
    /// are queued.
    pub fn reset(&mut self) {
        for timer in &mut self.timers {
            *timer = TimerState {
                gate: timer.gate,
                clock_input: timer.clock_input,
                ext_divider: timer.ext_divider,
                ..TimerState::reset()
            };
        }
        self.timers[0].control = CR_SPECIAL;
        self.msb_buffer = 0;
        self.lsb_buffer = 0;
        self.status_seen = 0;
        self.irq_line = false;
        self.events.clear();
    }

    /// Drain the output-pin changes queued since the last call.
    pub fn take_events(&mut self) -> Vec<PtmEvent> {
        std::mem::take(&mut self.events)
    }

    /// Advance one E clock.
    pub fn tick(&mut self) {
        for idx in 0..3 {
            let timer = &mut self.timers[idx];
            if timer.internal_clock() {
                self.clock_pulse(idx);
            } else if timer.ext_divider != 0 {
                timer.ext_phase += 1;
                if timer.ext_phase >= timer.ext_divider {
                    timer.ext_phase = 0;
                    self.clock_pulse(idx);
                }
            }
        }
        self.update_lines();
    }

    /// Read a register.
    pub fn read(&mut self, reg: u8) -> u8 {
        match reg & 0x07 {
            0 => 0,
            1 => {
                let status = self.status();
                self.status_seen = status & 0x07;
                status
            }
            reg @ (2 | 4 | 6) => {
                let idx = usize::from(reg / 2 - 1);
                let bit = 1 << idx;
                if self.status_seen & bit != 0 {
                    self.timers[idx].irq_flag = false;
                    self.status_seen &= !bit;
                    self.update_lines();
                }
                let counter = self.timers[idx].counter;
                self.lsb_buffer = counter as u8;
                (counter >> 8) as u8
            }
            _ => self.lsb_buffer,
        }
    }

    /// Read a register without side effects.
    #[must_use]
    pub fn peek(&self, reg: u8) -> u8 {
        match reg & 0x07 {
            0 => 0,
            1 => self.status(),
            reg @ (2 | 4 | 6) => (self.timers[usize::from(reg / 2 - 1)].counter >> 8) as u8,
            _ => self.lsb_buffer,
        }
    }

    /// Write a register.
    pub fn write(&mut self, reg: u8, value: u8) {
        match reg & 0x07 {
            0 => {
                if self.timers[1].control & CR_SPECIAL != 0 {
                    self.write_cr1(value);
                } else {
                    self.timers[2].control = value;
                }
            }
            1 => self.timers[1].control = value,
            2 | 4 | 6 => self.msb_buffer = value,
            reg => {
                let idx = usize::from(reg / 2 - 1);
                let timer = &mut self.timers[idx];
                timer.latch = u16::from(self.msb_buffer) << 8 | u16::from(value);
                if !timer.comparison() && timer.control & CR_NO_WRITE_INIT == 0 {
                    self.initialize(idx);
                }
            }
        }
        self.update_lines();
    }

    /// Drive gate input G1-G3 (index 0-2).
    pub fn set_gate(&mut self, idx: usize, state: bool) {
        let timer = &mut self.timers[idx];
        if timer.gate == state {
            return;
        }
        timer.gate = state;

        if !state {
            // Frequency comparison: period shorter than time-out
            let short_period = timer.comparison()
                && timer.armed
                && timer.control & (CR_SINGLE_SHOT | CR_NO_WRITE_INIT) == 0;
            self.initialize(idx);
            if short_period {
                self.timers[idx].irq_flag = true;
            }
        } else {
            let timer = &mut self.timers[idx];
            if timer.comparison() && timer.single_shot() && timer.armed {
                if timer.control & CR_NO_WRITE_INIT == 0 {
                    // Pulse-width comparison: pulse shorter than time-out
                    timer.irq_flag = true;
                }
                timer.armed = false;
            }
        }
        self.update_lines();
    }

    /// Drive external clock input C1-C3 (index 0-2). A rising edge counts
    /// one pulse when the timer is in external clock mode.
    pub fn set_clock(&mut self, idx: usize, state: bool) {
        let timer = &mut self.timers[idx];
        if timer.clock_input == state {
            return;
        }
        timer.clock_input = state;
        if state && !timer.internal_clock() {
            self.clock_pulse(idx);
            self.update_lines();
        }
    }

    /// Connect a periodic external clock of one pulse every `divider` E
    /// clocks to timer `idx`; 0 disconnects it.
    pub fn set_ext_clock(&mut self, idx: usize, divider: u32) {
        let timer = &mut self.timers[idx];
        if timer.ext_divider != divider {
            timer.ext_divider = divider;
            timer.ext_phase = 0;
        }
    }

    /// Output pin level of timer `idx`.
    #[must_use]
    pub fn output(&self, idx: usize) -> bool {
        self.timers[idx].pin
    }

    /// /IRQ asserted.
    #[must_use]
    pub fn irq(&self) -> bool {
        self.irq_line
    }

    #[must_use]
    pub fn counter(&self, idx: usize) -> u16 {
        self.timers[idx].counter
    }

    #[must_use]
    pub fn latch(&self, idx: usize) -> u16 {
        self.timers[idx].latch
    }

    #[must_use]
    pub fn control(&self, idx: usize) -> u8 {
        self.timers[idx].control
    }

    #[must_use]
    pub fn snapshot(&self) -> PtmState {
        PtmState {
            timers: self.timers,
            msb_buffer: self.msb_buffer,
            lsb_buffer: self.lsb_buffer,
            status_seen: self.status_seen,
            irq_line: self.irq_line,
        }
    }

    /// Restore register state. Queued events are discarded.
    pub fn restore(&mut self, state: &PtmState) {
        self.timers = state.timers;
        self.msb_buffer = state.msb_buffer;
        self.lsb_buffer = state.lsb_buffer;
        self.status_seen = state.status_seen;
        self.irq_line = state.irq_line;
        self.events.clear();
    }

    // --- Internal helpers ---

    fn internal_reset(&self) -> bool {
        self.timers[0].control & CR_SPECIAL != 0
    }

    fn status(&self) -> u8 {
        let mut status = 0;
        let mut any = false;
        for (idx, timer) in self.timers.iter().enumerate() {
            if timer.irq_flag {
                status |= 1 << idx;
                any |= timer.control & CR_IRQ_ENABLE != 0;
            }
        }
        if any {
            status |= 0x80;
        }
        status
    }

    fn write_cr1(&mut self, value: u8) {
        let was_reset = self.internal_reset();
        self.timers[0].control = value;
        let now_reset = value & CR_SPECIAL != 0;

        if !was_reset && now_reset {
            // Preset all counters and hold them
            for timer in &mut self.timers {
                timer.counter = timer.latch;
                timer.output = false;
                timer.irq_flag = false;
                timer.running = false;
                timer.armed = false;
            }
        } else if was_reset && !now_reset {
            for idx in 0..3 {
                self.initialize(idx);
            }
        }
    }

    /// Counter initialization: load from latch, output low, clear IRQ.
    fn initialize(&mut self, idx: usize) {
        let timer = &mut self.timers[idx];
        timer.counter = timer.latch;
        timer.irq_flag = false;
        timer.prescale_count = 0;
        timer.running = true;
        timer.armed = true;
        timer.output = !timer.comparison() && timer.dual_8bit() && !timer.single_shot() && timer.dual_8bit_output();
    }

    fn clock_pulse(&mut self, idx: usize) {
        if idx == 2 && self.timers[2].control & CR_SPECIAL != 0 {
            let timer = &mut self.timers[2];
            timer.prescale_count += 1;
            if timer.prescale_count < PRESCALE {
                return;
            }
            timer.prescale_count = 0;
        }
        self.count(idx);
    }

    fn count(&mut self, idx: usize) {
        if self.internal_reset() {
            return;
        }
        let timer = &mut self.timers[idx];
        if !timer.running {
            return;
        }
        // Timer modes only count while the gate is held low
        if !timer.comparison() && timer.gate {
            return;
        }

        let timed_out = if timer.dual_8bit() {
            let [lsb, msb] = timer.counter.to_le_bytes();
            if lsb != 0 {
                timer.counter = u16::from_le_bytes([lsb - 1, msb]);
                false
            } else if msb != 0 {
                timer.counter = u16::from_le_bytes([timer.latch as u8, msb - 1]);
                false
            } else {
                timer.counter = timer.latch;
                true
            }
        } else if timer.counter == 0 {
            timer.counter = timer.latch;
            true
        } else {
            timer.counter -= 1;
            false
        };

        if timed_out {
            self.time_out(idx);
        } else if !timer.comparison() && timer.dual_8bit() {
            if timer.single_shot() {
                timer.output = timer.armed && timer.dual_8bit_output();
            } else {
                timer.output = timer.dual_8bit_output();
            }
        }
    }

    fn time_out(&mut self, idx: usize) {
        let timer = &mut self.timers[idx];
        if timer.comparison() {
            if timer.armed && timer.control & CR_NO_WRITE_INIT != 0 {
                // Comparison mode: time-out came first
                timer.irq_flag = true;
            }
            timer.armed = false;
            return;
        }

        if timer.single_shot() {
            if timer.armed {
                timer.irq_flag = true;
                timer.armed = false;
                timer.output = !timer.dual_8bit();
            }
        } else {
            timer.irq_flag = true;
            timer.output = if timer.dual_8bit() {
                timer.dual_8bit_output()
            } else {
                !timer.output
            };
        }
    }

    /// Recompute output pins and the IRQ line, queueing changes.
    fn update_lines(&mut self) {
        for (idx, timer) in self.timers.iter_mut().enumerate() {
            let pin = timer.pin_level();
            if pin != timer.pin {
                timer.pin = pin;
                self.events.push(PtmEvent::Output(idx, pin));
            }
        }
        let irq = self.status() & 0x80 != 0;
        if irq != self.irq_line {
            self.irq_line = irq;
            self.events.push(PtmEvent::Irq(irq));
        }
    }
}

impl Default for Ptm6840 {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Release internal reset and program timer `idx` with `control`
    /// and a 16-bit latch. Gates are driven low so timer modes count.
    fn setup(idx: usize, control: u8, latch: u16) -> Ptm6840 {
        let mut ptm = Ptm6840::new();
        for g in 0..3 {
            ptm.set_gate(g, true);
            ptm.set_gate(g, false);
        }
        match idx {
            0 => {
                ptm.write(1, CR_SPECIAL); // CR2: select CR1
                ptm.write(0, control & !CR_SPECIAL);
            }
            1 => {
                ptm.write(1, control & !CR_SPECIAL);
                ptm.write(0, 0); // CR3 (CR2 bit 0 clear): leave reset asserted
                ptm.write(1, (control & !CR_SPECIAL) | CR_SPECIAL);
                ptm.write(0, 0); // CR1: release reset
                ptm.write(1, control & !CR_SPECIAL);
            }
            _ => {
                ptm.write(1, 0); // CR2: select CR3
                ptm.write(0, control);
                ptm.write(1, CR_SPECIAL);
                ptm.write(0, 0); // release reset
            }
        }
        let reg = (idx as u8 + 1) * 2;
        ptm.write(reg, (latch >> 8) as u8);
        ptm.write(reg + 1, latch as u8);
        if control & CR_COMPARISON == 0 {
            // G falling edge loads the latch even with write-init disabled
            ptm.set_gate(idx, true);
            ptm.set_gate(idx, false);
        }
        ptm.take_events();
        ptm
    }

    #[test]
    fn continuous_16bit_square_wave() {
        let mut ptm = setup(0, CR_INTERNAL_CLOCK | CR_OUTPUT_ENABLE, 2);
        assert!(!ptm.output(0), "output low after initialization");

        // N+1 clocks per half period
        ptm.tick();
        ptm.tick();
        assert!(!ptm.output(0));
        ptm.tick();
        assert!(ptm.output(0));
        ptm.tick();
        ptm.tick();
        ptm.tick();
        assert!(!ptm.output(0));
        assert_eq!(
            ptm.take_events(),
            vec![PtmEvent::Output(0, true), PtmEvent::Output(0, false)]
        );
    }

    #[test]
    fn output_enable_gates_pin() {
        let mut ptm = setup(0, CR_INTERNAL_CLOCK, 0);
        ptm.tick();
        assert!(!ptm.output(0), "output disabled by CR bit 7");
        assert!(ptm.timers[0].output, "flip-flop still toggles");
    }

    #[test]
    fn irq_status_and_clear_sequence() {
        let mut ptm = setup(1, CR_INTERNAL_CLOCK | CR_IRQ_ENABLE, 1);
        ptm.tick();
        ptm.tick();
        assert!(ptm.irq());
        assert_eq!(ptm.take_events(), vec![PtmEvent::Irq(true)]);

        // Counter read alone does not clear
        let _ = ptm.read(4);
        assert!(ptm.irq());

        // Status read then counter read clears
        assert_eq!(ptm.read(1), 0x82);
        let _ = ptm.read(4);
        assert!(!ptm.irq());
        assert_eq!(ptm.take_events(), vec![PtmEvent::Irq(false)]);
    }

    #[test]
    fn internal_reset_holds_counters() {
        let mut ptm = Ptm6840::new();
        ptm.write(1, CR_INTERNAL_CLOCK); // CR2, CR3 selected
        ptm.write(4, 0x00);
        ptm.write(5, 0x10);
        for _ in 0..5 {
            ptm.tick();
        }
        assert_eq!(ptm.counter(1), 0x10, "held while CR1 bit 0 is set");
    }

    #[test]
    fn gate_high_inhibits_timer_modes() {
        let mut ptm = setup(0, CR_INTERNAL_CLOCK, 0x100);
        ptm.tick();
        assert_eq!(ptm.counter(0), 0xFF);
        ptm.set_gate(0, true);
        ptm.tick();
        assert_eq!(ptm.counter(0), 0xFF);
        ptm.set_gate(0, false); // G falling edge re-initializes
        assert_eq!(ptm.counter(0), 0x100);
    }

    #[test]
    fn latch_write_initializes_unless_disabled() {
        let mut ptm = setup(0, CR_INTERNAL_CLOCK, 0x50);
        ptm.tick();
        ptm.write(2, 0x00);
        ptm.write(3, 0x20);
        assert_eq!(ptm.counter(0), 0x20);

        let mut ptm = setup(0, CR_INTERNAL_CLOCK | CR_NO_WRITE_INIT, 0x50);
        ptm.tick();
        ptm.write(2, 0x00);
        ptm.write(3, 0x20);
        assert_eq!(ptm.counter(0), 0x4F);
    }

    #[test]
    fn external_clock_divider() {
        let mut ptm = setup(0, CR_OUTPUT_ENABLE, 0x10);
        ptm.set_ext_clock(0, 4);
        for _ in 0..8 {
            ptm.tick();
        }
        assert_eq!(ptm.counter(0), 0x0E, "two external pulses in eight E clocks");
    }

    #[test]
    fn c_line_rising_edge_counts() {
        let mut ptm = setup(0, 0, 0x10);
        ptm.set_clock(0, true);
        ptm.set_clock(0, true);
        ptm.set_clock(0, false);
        assert_eq!(ptm.counter(0), 0x0F);
    }

    #[test]
    fn timer3_prescaler() {
        let mut ptm = setup(2, CR_INTERNAL_CLOCK | CR_SPECIAL, 0x10);
        for _ in 0..16 {
            ptm.tick();
        }
        assert_eq!(ptm.counter(2), 0x0E);
    }

    #[test]
    fn dual_8bit_output_high_in_final_lsb_span() {
        // MSB = 1, LSB = 2: low for three clocks, high for three
        let mut ptm = setup(0, CR_INTERNAL_CLOCK | CR_DUAL_8BIT | CR_OUTPUT_ENABLE, 0x0102);
        let levels: Vec<bool> = (0..6)
            .map(|_| {
                ptm.tick();
                ptm.output(0)
            })
            .collect();
        assert_eq!(levels, [false, false, true, true, true, false]);
    }

    #[test]
    fn single_shot_output_goes_high_once() {
        let mut ptm = setup(0, CR_INTERNAL_CLOCK | CR_SINGLE_SHOT | CR_OUTPUT_ENABLE | CR_IRQ_ENABLE, 1);
        ptm.tick();
        ptm.tick();
        assert!(ptm.output(0));
        assert!(ptm.irq());
        for _ in 0..10 {
            ptm.tick();
        }
        assert!(ptm.output(0), "single-shot output stays high");
    }

    #[test]
    fn frequency_comparison_interrupts_on_short_period() {
        let mut ptm = setup(0, CR_INTERNAL_CLOCK | CR_COMPARISON | CR_IRQ_ENABLE, 100);
        ptm.set_gate(0, true);
        ptm.set_gate(0, false); // start window
        ptm.tick();
        ptm.set_gate(0, true);
        ptm.set_gate(0, false); // second G↓ before time-out
        assert!(ptm.irq());
    }

    #[test]
    fn frequency_comparison_quiet_after_time_out() {
        let mut ptm = setup(0, CR_INTERNAL_CLOCK | CR_COMPARISON | CR_IRQ_ENABLE, 1);
        ptm.set_gate(0, true);
        ptm.set_gate(0, false); // window opened at reset release was short
        let _ = ptm.read(1);
        let _ = ptm.read(2);
        assert!(!ptm.irq());
        ptm.tick();
        ptm.tick();
        ptm.set_gate(0, true);
        ptm.set_gate(0, false);
        assert!(!ptm.irq(), "time-out came before the next G falling edge");
    }

    #[test]
    fn pulse_width_comparison_interrupts_on_time_out() {
        let control = CR_INTERNAL_CLOCK | CR_COMPARISON | CR_SINGLE_SHOT | CR_NO_WRITE_INIT | CR_IRQ_ENABLE;
        let mut ptm = setup(0, control, 1);
        ptm.set_gate(0, true);
        ptm.set_gate(0, false);
        ptm.tick();
        ptm.tick();
        assert!(ptm.irq(), "gate still low at time-out");
    }

    #[test]
    fn reset_keeps_wiring() {
        let mut ptm = setup(0, CR_INTERNAL_CLOCK, 5);
        ptm.set_ext_clock(1, 4);
        ptm.set_gate(2, true);
        ptm.reset();
        assert_eq!(ptm.timers[1].ext_divider, 4);
        assert!(ptm.timers[2].gate);
        assert_eq!(ptm.control(0), CR_SPECIAL);
        assert_eq!(ptm.latch(0), 0xFFFF);
    }
}
