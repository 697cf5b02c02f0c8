//! Chunk definitions for the header and track chunks of a Standard MIDI File
//!
//! A file is a header chunk followed by as many track chunks as the header announces. Both share
//! the 8 byte [`Chunk`](crate::Chunk) prefix: a 4 byte ASCII tag and a big-endian length.

pub mod chunk_types;
pub mod header;
pub mod track;

pub use header::{Format, Header, TimeDivision};
pub use track::{Event, Track};
