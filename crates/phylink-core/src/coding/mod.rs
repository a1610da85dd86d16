//! Forward error correction and bit-level framing
//!
//! ```text
//! TX: bits → Scrambler → Convolutional (K=7) → Puncture → Interleave → mapper
//! RX: soft bits → Deinterleave → Depuncture → Viterbi → Descramble → bits
//! ```

pub mod convolutional;
pub mod crc;
pub mod interleaver;
pub mod scrambler;
pub mod viterbi;

pub use convolutional::{depuncture, puncture, ConvolutionalEncoder};
pub use crc::{crc8, crc8_bits};
pub use interleaver::Interleaver;
pub use scrambler::{pilot_polarity, Scrambler};
pub use viterbi::ViterbiDecoder;
