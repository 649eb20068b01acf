//! Fairlight CMI-01A channel controller card.
//!
//! One voice of the Fairlight CMI. The card plays 8-bit samples out of
//! 16 KB of wave RAM at a rate set by a 10-bit pitch and 4-bit octave,
//! scaled by an 8-bit envelope and an 8-bit volume. Two MC6821 PIAs hold
//! the voice parameters, an MC6840 PTM times the envelope, and a tangle
//! of TTL (zero-crossing flip-flop, reset strobe, 7497 rate multiplier)
//! ties them together. That TTL is modelled at signal-transition level:
//! every line has one setter that does nothing when the level is
//! unchanged and otherwise drives the lines wired to it.
//!
//! # Bus map (offsets from the card base)
//!
//! | Offset    | Write                     | Read                        |
//! |-----------|---------------------------|-----------------------------|
//! | $00       | Wave RAM at address, LSB+1 | Wave RAM at address, LSB+1 |
//! | $03       | Envelope direction down   | Envelope direction down, 0  |
//! | $04       | Envelope direction up     | Envelope direction up, 0    |
//! | $05       | Volume latch              | $FF                         |
//! | $06       | Filter latch              | 0                           |
//! | $08-$0B   | PIA 0 (RS = A1,A0)        | PIA 0                       |
//! | $0C-$0F   | PIA 1 (RS = A0,A1)        | PIA 1                       |
//! | $10-$17   | PTM (A1 gated by O1)      | PTM                         |
//!
//! # PIA wiring
//!
//! | Line | PIA 0                       | PIA 1                          |
//! |------|-----------------------------|--------------------------------|
//! | PA   | ws (0-6), direction (7)     | pitch 8-9 (0-1), octave (2-5)  |
//! | PB   | envelope preset (rp)        | pitch 0-7                      |
//! | CA1  | /ZCINT                      | zx                             |
//! | CB1  | tri                         | EOSI                           |
//! | CA2  | /LOAD                       | permit eload                   |
//! | CB2  | RUN                         | /WPE                           |

mod cmi01a;
mod control;
mod envelope;
mod irq;
mod rate_table;
mod sequencer;
mod snapshot;

pub use cmi01a::{Cmi01a, WAVE_RAM_SIZE};
pub use envelope::{Envelope, EnvelopeDirection};
pub use irq::{InputMerger, IrqSource};
pub use rate_table::{RATE_TABLE, rate_output};
pub use sequencer::{compute_sample, sample_frequency};
pub use snapshot::{Snapshot, SnapshotError};
