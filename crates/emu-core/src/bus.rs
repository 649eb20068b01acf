//! Memory-mapped device interface.

/// A device that answers bus cycles.
///
/// The host decodes its own address space and hands each device the
/// offset within the window the device occupies. Reads take `&mut self`
/// because real hardware often has read side effects (auto-increment
/// address counters, IRQ flag clears, bank-switch hotspots).
pub trait Bus {
    /// Read a byte at the given offset.
    fn read(&mut self, address: u16) -> u8;

    /// Write a byte at the given offset.
    fn write(&mut self, address: u16, value: u8);

    /// Read without side effects, for debuggers and state dumps.
    ///
    /// Devices whose every read has side effects return 0, matching what
    /// a debugger sees when side effects are disabled.
    fn peek(&self, _address: u16) -> u8 {
        0
    }
}
