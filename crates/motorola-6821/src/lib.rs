//! Motorola MC6821 Peripheral Interface Adapter (PIA).
//!
//! The 6821 provides two 8-bit I/O ports (A and B), each with a data
//! direction register, a control register, and two control lines: C1 is
//! an edge-sensitive input, C2 is either an edge-sensitive input or an
//! output (manual level, read/write handshake, or one-cycle pulse).
//!
//! # Registers (RS1, RS0)
//!
//! | Reg | CRx bit 2 = 0 | CRx bit 2 = 1 |
//! |-----|---------------|---------------|
//! | 0   | DDRA          | Port A data   |
//! | 1   | CRA           | CRA           |
//! | 2   | DDRB          | Port B data   |
//! | 3   | CRB           | CRB           |
//!
//! # Control register
//!
//! | Bit | Meaning                                             |
//! |-----|-----------------------------------------------------|
//! | 7   | IRQ1 flag (C1 active edge seen, read-only)          |
//! | 6   | IRQ2 flag (C2 active edge seen, read-only)          |
//! | 5   | C2 direction (0 = input, 1 = output)                |
//! | 4   | input: C2 active edge (1 = rising); output: 1 = manual level |
//! | 3   | input: C2 IRQ enable; output manual: C2 level; output strobe: 1 = pulse, 0 = handshake |
//! | 2   | 0 = DDR, 1 = data register                          |
//! | 1   | C1 active edge (1 = rising)                         |
//! | 0   | C1 IRQ enable                                       |
//!
//! The chip never calls into its host. Every change on an output line
//! (port pins, C2 in output mode, IRQ) is queued as a [`PiaEvent`] in the
//! order it happened; the host drains them with
//! [`take_events`](Pia6821::take_events) after each operation.

const CR_C1_IRQ_ENABLE: u8 = 0x01;
const CR_C1_RISING: u8 = 0x02;
const CR_DATA_SELECT: u8 = 0x04;
const CR_C2_BIT3: u8 = 0x08;
const CR_C2_BIT4: u8 = 0x10;
const CR_C2_OUTPUT: u8 = 0x20;
const CR_IRQ2_FLAG: u8 = 0x40;
const CR_IRQ1_FLAG: u8 = 0x80;

/// A change on one of the PIA's output lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PiaEvent {
    /// Port A data or DDR was written; carries the resulting pin levels.
    PortA(u8),
    /// Port B data or DDR was written; carries the resulting pin levels.
    PortB(u8),
    /// CA2 (output mode) changed level.
    Ca2(bool),
    /// CB2 (output mode) changed level.
    Cb2(bool),
    /// /IRQA changed (true = asserted).
    IrqA(bool),
    /// /IRQB changed (true = asserted).
    IrqB(bool),
}

/// Register and line state of one PIA side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PortSide {
    /// Output register.
    pub output: u8,
    /// Data direction register (1 = output).
    pub ddr: u8,
    /// Control register bits 0-5.
    pub control: u8,
    /// Levels driven onto the port by external hardware.
    pub input: u8,
    /// Last C1 input level.
    pub c1: bool,
    /// Last C2 input level.
    pub c2_input: bool,
    /// C2 output level (low after reset).
    pub c2_output: bool,
    /// C1 active edge flag.
    pub irq1: bool,
    /// C2 active edge flag.
    pub irq2: bool,
    /// Current level of this side's IRQ output.
    pub irq_line: bool,
}

impl PortSide {
    fn c2_is_output(&self) -> bool {
        self.control & CR_C2_OUTPUT != 0
    }

    /// C2 output in read/write strobe mode (handshake or pulse).
    fn c2_strobe_mode(&self) -> bool {
        self.c2_is_output() && self.control & CR_C2_BIT4 == 0
    }

    fn c2_handshake_mode(&self) -> bool {
        self.c2_strobe_mode() && self.control & CR_C2_BIT3 == 0
    }

    fn irq_level(&self) -> bool {
        (self.irq1 && self.control & CR_C1_IRQ_ENABLE != 0)
            || (self.irq2 && !self.c2_is_output() && self.control & CR_C2_BIT3 != 0)
    }

    fn data_selected(&self) -> bool {
        self.control & CR_DATA_SELECT != 0
    }

    fn read_pins(&self) -> u8 {
        (self.output & self.ddr) | (self.input & !self.ddr)
    }

    fn control_read(&self) -> u8 {
        let mut value = self.control;
        if self.irq1 {
            value |= CR_IRQ1_FLAG;
        }
        if self.irq2 && !self.c2_is_output() {
            value |= CR_IRQ2_FLAG;
        }
        value
    }
}

/// Complete PIA register state, for snapshots.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PiaState {
    pub a: PortSide,
    pub b: PortSide,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    A,
    B,
}

/// Motorola MC6821 PIA.
#[derive(Debug, Clone)]
pub struct Pia6821 {
    a: PortSide,
    b: PortSide,
    events: Vec<PiaEvent>,
}

impl Pia6821 {
    /// Create a PIA in its power-on reset state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            a: PortSide::default(),
            b: PortSide::default(),
            events: Vec::new(),
        }
    }

    /// /RESET: clear all registers. No events are queued; line levels
    /// return to their reset values silently.
    pub fn reset(&mut self) {
        let (in_a, in_b) = (self.a.input, self.b.input);
        self.a = PortSide::default();
        self.b = PortSide::default();
        self.a.input = in_a;
        self.b.input = in_b;
        self.events.clear();
    }

    /// Drain the output-line changes queued since the last call.
    pub fn take_events(&mut self) -> Vec<PiaEvent> {
        std::mem::take(&mut self.events)
    }

    /// Read a register (RS1/RS0 in bits 1-0).
    pub fn read(&mut self, reg: u8) -> u8 {
        match reg & 0x03 {
            0 if self.a.data_selected() => {
                let value = self.a.read_pins();
                self.a.irq1 = false;
                self.a.irq2 = false;
                self.update_irq(Side::A);
                if self.a.c2_strobe_mode() {
                    self.set_c2_output(Side::A, false);
                    if self.a.control & CR_C2_BIT3 != 0 {
                        // Pulse mode: restored on the next E cycle
                        self.set_c2_output(Side::A, true);
                    }
                }
                value
            }
            0 => self.a.ddr,
            1 => self.a.control_read(),
            2 if self.b.data_selected() => {
                let value = self.b.read_pins();
                self.b.irq1 = false;
                self.b.irq2 = false;
                self.update_irq(Side::B);
                value
            }
            2 => self.b.ddr,
            _ => self.b.control_read(),
        }
    }

    /// Read a register without clearing flags or strobing C2.
    #[must_use]
    pub fn peek(&self, reg: u8) -> u8 {
        match reg & 0x03 {
            0 if self.a.data_selected() => self.a.read_pins(),
            0 => self.a.ddr,
            1 => self.a.control_read(),
            2 if self.b.data_selected() => self.b.read_pins(),
            2 => self.b.ddr,
            _ => self.b.control_read(),
        }
    }

    /// Write a register (RS1/RS0 in bits 1-0).
    pub fn write(&mut self, reg: u8, value: u8) {
        match reg & 0x03 {
            0 => {
                if self.a.data_selected() {
                    self.a.output = value;
                } else {
                    self.a.ddr = value;
                }
                self.events.push(PiaEvent::PortA(self.port_a_output()));
            }
            1 => self.write_control(Side::A, value),
            2 => {
                if self.b.data_selected() {
                    self.b.output = value;
                    self.events.push(PiaEvent::PortB(self.port_b_output()));
                    if self.b.c2_strobe_mode() {
                        self.set_c2_output(Side::B, false);
                        if self.b.control & CR_C2_BIT3 != 0 {
                            self.set_c2_output(Side::B, true);
                        }
                    }
                } else {
                    self.b.ddr = value;
                    self.events.push(PiaEvent::PortB(self.port_b_output()));
                }
            }
            _ => self.write_control(Side::B, value),
        }
    }

    /// Levels external hardware drives onto port A input pins.
    pub fn set_port_a_input(&mut self, value: u8) {
        self.a.input = value;
    }

    /// Levels external hardware drives onto port B input pins.
    pub fn set_port_b_input(&mut self, value: u8) {
        self.b.input = value;
    }

    /// Drive the CA1 input.
    pub fn set_ca1(&mut self, state: bool) {
        self.set_c1(Side::A, state);
    }

    /// Drive the CB1 input.
    pub fn set_cb1(&mut self, state: bool) {
        self.set_c1(Side::B, state);
    }

    /// Drive the CA2 input (ignored while CA2 is an output).
    pub fn set_ca2(&mut self, state: bool) {
        self.set_c2_input(Side::A, state);
    }

    /// Drive the CB2 input (ignored while CB2 is an output).
    pub fn set_cb2(&mut self, state: bool) {
        self.set_c2_input(Side::B, state);
    }

    /// Port A pin levels. Port A has internal pull-ups, so input bits
    /// read high.
    #[must_use]
    pub fn port_a_output(&self) -> u8 {
        (self.a.output & self.a.ddr) | !self.a.ddr
    }

    /// Port B pin levels. Port B is three-state; input bits read low.
    #[must_use]
    pub fn port_b_output(&self) -> u8 {
        self.b.output & self.b.ddr
    }

    #[must_use]
    pub fn ca2_output(&self) -> bool {
        self.a.c2_output
    }

    #[must_use]
    pub fn cb2_output(&self) -> bool {
        self.b.c2_output
    }

    /// /IRQA asserted.
    #[must_use]
    pub fn irq_a(&self) -> bool {
        self.a.irq_line
    }

    /// /IRQB asserted.
    #[must_use]
    pub fn irq_b(&self) -> bool {
        self.b.irq_line
    }

    /// CRA as the CPU would read it.
    #[must_use]
    pub fn control_a(&self) -> u8 {
        self.a.control_read()
    }

    /// CRB as the CPU would read it.
    #[must_use]
    pub fn control_b(&self) -> u8 {
        self.b.control_read()
    }

    #[must_use]
    pub fn snapshot(&self) -> PiaState {
        PiaState {
            a: self.a,
            b: self.b,
        }
    }

    /// Restore register state. Queued events are discarded.
    pub fn restore(&mut self, state: &PiaState) {
        self.a = state.a;
        self.b = state.b;
        self.events.clear();
    }

    // --- Internal helpers ---

    fn side(&mut self, side: Side) -> &mut PortSide {
        match side {
            Side::A => &mut self.a,
            Side::B => &mut self.b,
        }
    }

    fn write_control(&mut self, side: Side, value: u8) {
        let port = self.side(side);
        port.control = value & 0x3F;
        if port.c2_is_output() {
            let level = if port.control & CR_C2_BIT4 != 0 {
                port.control & CR_C2_BIT3 != 0
            } else {
                // Strobe modes idle high
                true
            };
            self.set_c2_output(side, level);
        }
        self.update_irq(side);
    }

    fn set_c1(&mut self, side: Side, state: bool) {
        let port = self.side(side);
        if port.c1 == state {
            return;
        }
        port.c1 = state;

        let rising_active = port.control & CR_C1_RISING != 0;
        if state != rising_active {
            return;
        }
        port.irq1 = true;
        let restore_c2 = port.c2_handshake_mode();
        if restore_c2 {
            self.set_c2_output(side, true);
        }
        self.update_irq(side);
    }

    fn set_c2_input(&mut self, side: Side, state: bool) {
        let port = self.side(side);
        if port.c2_input == state {
            return;
        }
        port.c2_input = state;
        if port.c2_is_output() {
            return;
        }

        let rising_active = port.control & CR_C2_BIT4 != 0;
        if state == rising_active {
            port.irq2 = true;
            self.update_irq(side);
        }
    }

    fn set_c2_output(&mut self, side: Side, level: bool) {
        let port = self.side(side);
        if port.c2_output == level {
            return;
        }
        port.c2_output = level;
        self.events.push(match side {
            Side::A => PiaEvent::Ca2(level),
            Side::B => PiaEvent::Cb2(level),
        });
    }

    fn update_irq(&mut self, side: Side) {
        let port = self.side(side);
        let level = port.irq_level();
        if port.irq_line == level {
            return;
        }
        port.irq_line = level;
        self.events.push(match side {
            Side::A => PiaEvent::IrqA(level),
            Side::B => PiaEvent::IrqB(level),
        });
    }
}

impl Default for Pia6821 {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Select the data register on both sides with every pin an output.
    fn all_outputs() -> Pia6821 {
        let mut pia = Pia6821::new();
        pia.write(0, 0xFF); // DDRA
        pia.write(2, 0xFF); // DDRB
        pia.write(1, CR_DATA_SELECT);
        pia.write(3, CR_DATA_SELECT);
        pia.take_events();
        pia
    }

    #[test]
    fn ddr_and_data_share_register_zero() {
        let mut pia = Pia6821::new();
        pia.write(0, 0x0F); // CRA bit 2 clear: DDRA
        assert_eq!(pia.read(0), 0x0F);

        pia.write(1, CR_DATA_SELECT);
        pia.set_port_a_input(0xA0);
        pia.write(0, 0x05);
        assert_eq!(pia.read(0), 0xA5, "outputs from ORA, inputs from pins");
    }

    #[test]
    fn port_writes_queue_pin_levels() {
        let mut pia = Pia6821::new();
        pia.write(0, 0x0F); // DDRA
        pia.write(1, CR_DATA_SELECT);
        pia.take_events();

        pia.write(0, 0x03);
        assert_eq!(
            pia.take_events(),
            vec![PiaEvent::PortA(0xF3)],
            "port A input bits float high"
        );

        pia.write(2, 0x0F); // DDRB
        pia.write(3, CR_DATA_SELECT);
        pia.take_events();
        pia.write(2, 0xFF);
        assert_eq!(
            pia.take_events(),
            vec![PiaEvent::PortB(0x0F)],
            "port B input bits are high impedance"
        );
    }

    #[test]
    fn manual_c2_output_follows_bit3() {
        let mut pia = all_outputs();
        pia.write(1, CR_DATA_SELECT | CR_C2_OUTPUT | CR_C2_BIT4 | CR_C2_BIT3);
        assert_eq!(pia.take_events(), vec![PiaEvent::Ca2(true)]);

        pia.write(1, CR_DATA_SELECT | CR_C2_OUTPUT | CR_C2_BIT4); // CA2 low
        assert_eq!(pia.take_events(), vec![PiaEvent::Ca2(false)]);

        // Same level again: no event
        pia.write(1, CR_DATA_SELECT | CR_C2_OUTPUT | CR_C2_BIT4);
        assert!(pia.take_events().is_empty());
    }

    #[test]
    fn c1_edge_sets_flag_and_irq() {
        let mut pia = all_outputs();
        pia.write(1, CR_DATA_SELECT | CR_C1_RISING | CR_C1_IRQ_ENABLE);
        pia.take_events();

        pia.set_ca1(true);
        assert!(pia.irq_a());
        assert_eq!(pia.take_events(), vec![PiaEvent::IrqA(true)]);
        assert_ne!(pia.read(1) & CR_IRQ1_FLAG, 0);

        // Reading the data register clears the flag
        let _ = pia.read(0);
        assert!(!pia.irq_a());
        assert_eq!(pia.read(1) & CR_IRQ1_FLAG, 0);
    }

    #[test]
    fn c1_wrong_edge_ignored() {
        let mut pia = all_outputs();
        pia.write(3, CR_DATA_SELECT | CR_C1_IRQ_ENABLE); // CB1 falling edge
        pia.set_cb1(true);
        assert!(!pia.irq_b());
        pia.set_cb1(false);
        assert!(pia.irq_b());
    }

    #[test]
    fn flag_without_enable_does_not_interrupt() {
        let mut pia = all_outputs();
        pia.write(1, CR_DATA_SELECT | CR_C1_RISING);
        pia.set_ca1(true);
        assert!(!pia.irq_a());
        assert_ne!(pia.peek(1) & CR_IRQ1_FLAG, 0, "flag still latched");

        // Enabling afterwards raises IRQ immediately
        pia.write(1, CR_DATA_SELECT | CR_C1_RISING | CR_C1_IRQ_ENABLE);
        assert!(pia.irq_a());
    }

    #[test]
    fn c2_input_edge_sets_irq2() {
        let mut pia = all_outputs();
        pia.write(1, CR_DATA_SELECT | CR_C2_BIT4 | CR_C2_BIT3); // rising, enabled
        pia.set_ca2(true);
        assert!(pia.irq_a());
        assert_ne!(pia.read(1) & CR_IRQ2_FLAG, 0);
    }

    #[test]
    fn ca2_read_handshake() {
        let mut pia = all_outputs();
        // CA2 output, handshake on read, CA1 rising restores
        pia.write(1, CR_DATA_SELECT | CR_C2_OUTPUT | CR_C1_RISING);
        pia.take_events();
        assert!(pia.ca2_output());

        let _ = pia.read(0);
        assert!(!pia.ca2_output());
        pia.set_ca1(true);
        assert!(pia.ca2_output());
        assert_eq!(
            pia.take_events(),
            vec![PiaEvent::Ca2(false), PiaEvent::Ca2(true)]
        );
    }

    #[test]
    fn cb2_write_pulse() {
        let mut pia = all_outputs();
        pia.write(3, CR_DATA_SELECT | CR_C2_OUTPUT | CR_C2_BIT3);
        pia.take_events();

        pia.write(2, 0x55);
        assert_eq!(
            pia.take_events(),
            vec![PiaEvent::PortB(0x55), PiaEvent::Cb2(false), PiaEvent::Cb2(true)]
        );
    }

    #[test]
    fn peek_has_no_side_effects() {
        let mut pia = all_outputs();
        pia.write(1, CR_DATA_SELECT | CR_C1_RISING | CR_C1_IRQ_ENABLE);
        pia.set_ca1(true);
        let _ = pia.peek(0);
        assert!(pia.irq_a());
    }

    #[test]
    fn snapshot_restore() {
        let mut pia = all_outputs();
        pia.write(0, 0x42);
        pia.write(1, CR_DATA_SELECT | CR_C2_OUTPUT | CR_C2_BIT4 | CR_C2_BIT3);
        let state = pia.snapshot();

        let mut other = Pia6821::new();
        other.restore(&state);
        assert_eq!(other.snapshot(), state);
        assert_eq!(other.port_a_output(), 0x42);
        assert!(other.ca2_output());
        assert!(other.take_events().is_empty());
    }
}
