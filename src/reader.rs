//! MIDI byte sources, allows for in memory byte spans to be read or files

use std::{convert::Infallible, path::Path};

use crate::error::{Error, ErrorKind, Result};

/// Trait that allows for different types to be translated to a MIDI parseable format
pub trait MidiReadable {
    /// Error type that may be returned while opening the source
    type Error;
    /// Creates a byte iterator from the type
    fn get_midi_bytes(self) -> core::result::Result<impl Iterator<Item = u8>, Self::Error>;
}

/// Wrapper struct to allow passing `Vec<u8>` to the [`MidiReadable`] trait
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MidiData(pub Vec<u8>);

impl MidiReadable for MidiData {
    type Error = Infallible;
    fn get_midi_bytes(self) -> core::result::Result<impl Iterator<Item = u8>, Self::Error> {
        Ok(self.0.into_iter())
    }
}

impl<PATH> MidiReadable for PATH
where
    PATH: AsRef<Path>,
{
    type Error = std::io::Error;
    fn get_midi_bytes(self) -> core::result::Result<impl Iterator<Item = u8>, Self::Error> {
        Ok(std::fs::read(self.as_ref())?.into_iter())
    }
}

/// Largest buffer reserved up front for a length read from the input
const PREALLOCATE_LIMIT: usize = 1 << 16;

/// Sequential reader over a byte iterator that knows its absolute position.
///
/// Every read either returns exactly the requested bytes or fails with
/// [`ErrorKind::TruncatedInput`] at the offset the read started at.
#[derive(Debug)]
pub struct ByteSource<I> {
    /// Underlying bytes
    bytes: I,
    /// Offset of the next unread byte
    offset: usize,
}

impl<I> ByteSource<I>
where
    I: Iterator<Item = u8>,
{
    /// Wraps a byte iterator, starting at offset 0
    pub fn new(bytes: impl IntoIterator<IntoIter = I>) -> Self {
        Self {
            bytes: bytes.into_iter(),
            offset: 0,
        }
    }

    /// Offset of the next byte that will be read
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Pulls the next byte if the source has one
    pub fn next_byte(&mut self) -> Option<u8> {
        let byte = self.bytes.next()?;
        self.offset += 1;
        Some(byte)
    }

    /// Reads one byte
    pub fn read_u8(&mut self) -> Result<u8> {
        let start = self.offset;
        self.next_byte()
            .ok_or(Error::new(ErrorKind::TruncatedInput, start))
    }

    /// Reads exactly `n` bytes into an owned buffer
    pub fn read_exact(&mut self, n: usize) -> Result<Vec<u8>> {
        let start = self.offset;
        // A declared length is only trusted once the bytes actually arrive
        let mut buf = Vec::with_capacity(n.min(PREALLOCATE_LIMIT));
        for _ in 0..n {
            match self.next_byte() {
                Some(byte) => buf.push(byte),
                None => return Err(Error::new(ErrorKind::TruncatedInput, start)),
            }
        }
        Ok(buf)
    }

    /// Reads a fixed size array
    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let start = self.offset;
        let mut buf = [0u8; N];
        for slot in buf.iter_mut() {
            *slot = self
                .next_byte()
                .ok_or(Error::new(ErrorKind::TruncatedInput, start))?;
        }
        Ok(buf)
    }

    /// Reads a big-endian 16 bit integer
    pub fn read_u16_be(&mut self) -> Result<u16> {
        self.read_array().map(u16::from_be_bytes)
    }

    /// Reads a big-endian 32 bit integer
    pub fn read_u32_be(&mut self) -> Result<u32> {
        self.read_array().map(u32::from_be_bytes)
    }
}
