//! Core traits and types for cycle-accurate chip emulation.
//!
//! Every device ticks at its own input clock. Hosts convert between wall
//! time and ticks through [`MasterClock`]; nothing inside a device looks
//! at wall time.

mod bus;
mod clock;
mod observable;
mod tickable;
mod ticks;

pub use bus::Bus;
pub use clock::MasterClock;
pub use observable::{Observable, Value};
pub use tickable::Tickable;
pub use ticks::Ticks;
