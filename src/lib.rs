//! # smfparse
//!
//! A strict decoder for Standard MIDI Files. A file is decoded in a single sequential pass into a
//! fully validated [`MidiDocument`]; consumers such as exporters or sequencers read it without
//! re-checking the binary grammar.
//!
//! ## Overview
//!
//! MIDI files are structured as a series of chunks. Each chunk contains a 4-character ASCII
//! type identifier and a 32-bit length that specifies how many bytes of data follow. The first
//! chunk is the `MThd` header, followed by one `MTrk` chunk per track announced in the header.
//!
//! - **Fail fast**: the first structural violation aborts the whole parse. The error carries
//!   its [`ErrorKind`](error::ErrorKind), the byte offset and the track index.
//! - **Exact byte accounting**: every track must consume exactly the number of bytes its chunk
//!   declares, no more and no less.
//! - **Streaming-friendly**: decoding pulls bytes from any `Iterator<Item = u8>` strictly in
//!   order, so files never need to be seekable.
//!
//! ## Example Usage
//!
//! ```rust
//! use smfparse::{chunk::track::event::EventBody, MidiDocument};
//!
//! let bytes = [
//!     b'M', b'T', b'h', b'd', 0, 0, 0, 6, 0, 0, 0, 1, 0, 0x60,
//!     b'M', b'T', b'r', b'k', 0, 0, 0, 8,
//!     0x00, 0x90, 0x3C, 0x40,
//!     0x60, 0xFF, 0x2F, 0x00,
//! ];
//!
//! let midi = MidiDocument::from_bytes(&bytes).expect("Decode MIDI bytes");
//! assert_eq!(midi.header().track_count(), 1);
//!
//! for event in midi.tracks()[0].events() {
//!     match event.body() {
//!         EventBody::Channel(channel) => println!("{:?}", channel.message()),
//!         EventBody::Meta(meta) => println!("meta {:#04X}", meta.meta_type()),
//!         EventBody::Sysex(sysex) => println!("sysex of {} bytes", sysex.payload().len()),
//!     }
//! }
//! ```
//!
//! ## Library Structure
//!
//! - **[`chunk`]**: header and track chunk types, the event decoder and the meta event rules.
//! - **[`vlq`]**: variable length quantity decoding.
//! - **[`reader`]**: byte sources. [`reader::MidiReadable`] turns paths or owned buffers into
//!   byte streams and [`reader::ByteSource`] tracks the read position.
//! - **[`query`]**: read-only views over a decoded document: notes, tempo changes, text and
//!   per-kind counts.
//! - **[`error`]**: the error taxonomy shared by every stage.

pub mod chunk;
pub mod error;
pub mod query;
pub mod reader;
pub mod vlq;

#[cfg(test)]
pub(crate) mod test_helpers;

use std::path::Path;

use log::debug;

use chunk::{
    header::Header,
    track::{Track, TrackParser},
};
use error::{LoadError, Result};
use reader::{ByteSource, MidiReadable};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Represents a raw MIDI Chunk prefix.
/// A MIDI Chunk consists of a 4-character ASCII type identifier and a 32-bit unsigned integer
/// specifying the length of its data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Chunk {
    /// 4 character ASCII chunk type
    pub chunk_type: [u8; 4],
    /// Length of the data that follows
    length: u32,
}

impl Chunk {
    /// Reads the 8 byte chunk prefix
    pub fn read<I>(source: &mut ByteSource<I>) -> Result<Self>
    where
        I: Iterator<Item = u8>,
    {
        source.read_array().map(u64::from_be_bytes).map(Self::from)
    }

    /// Gets the declared data length
    pub fn length(&self) -> u32 {
        self.length
    }

    /// Returns if the chunk has no attributed data
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }
}

impl From<u64> for Chunk {
    fn from(value: u64) -> Self {
        let [a, b, c, d, ..] = value.to_be_bytes();

        Self {
            chunk_type: [a, b, c, d],
            length: value as u32,
        }
    }
}

/// A fully decoded Standard MIDI File.
///
/// Only produced by a successful parse of the whole input and never modified afterwards. All
/// event payloads are owned by the document and released with it.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MidiDocument {
    /// The decoded `MThd` chunk
    header: Header,
    /// One entry per `MTrk` chunk, in file order
    tracks: Vec<Track>,
}

impl MidiDocument {
    /// Decodes a complete file from a byte stream.
    ///
    /// The header is read first, then exactly as many track chunks as it announces. Any bytes
    /// after the last announced track are left unread. On failure nothing decoded so far is
    /// returned.
    pub fn parse<B>(bytes: B) -> Result<Self>
    where
        B: IntoIterator<Item = u8>,
    {
        let mut source = ByteSource::new(bytes);
        let header = Header::parse(&mut source)?;

        let track_count = usize::from(header.track_count());
        let mut tracks = Vec::with_capacity(track_count);
        for index in 0..track_count {
            let track = TrackParser::new(&mut source, index)
                .parse()
                .inspect_err(|e| debug!("aborting parse: {e}"))?;
            tracks.push(track);
        }

        debug!(
            "decoded {} tracks from {} bytes",
            tracks.len(),
            source.offset()
        );

        Ok(Self { header, tracks })
    }

    /// Decodes a complete file held in memory
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::parse(bytes.iter().copied())
    }

    /// Reads and decodes the file at `path`
    pub fn open<PATH>(path: PATH) -> core::result::Result<Self, LoadError>
    where
        PATH: AsRef<Path>,
    {
        let bytes = path.get_midi_bytes()?;
        Ok(Self::parse(bytes)?)
    }

    /// The decoded header
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// All tracks in file order
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// Iterates over the tracks in file order
    pub fn iter(&self) -> core::slice::Iter<'_, Track> {
        self.tracks.iter()
    }

    /// Consumes the document, handing out its header and tracks
    pub fn into_parts(self) -> (Header, Vec<Track>) {
        (self.header, self.tracks)
    }
}

impl<'a> IntoIterator for &'a MidiDocument {
    type Item = &'a Track;
    type IntoIter = core::slice::Iter<'a, Track>;

    fn into_iter(self) -> Self::IntoIter {
        self.tracks.iter()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::{
        chunk::{
            chunk_types::TRACK_DATA_CHUNK,
            header::{Format, TimeDivision},
            track::{event::EventBody, meta::MetaEvent},
        },
        error::{ErrorKind, LoadError},
        test_helpers::{header_bytes, smf, track_chunk},
        Chunk, MidiDocument,
    };

    #[test]
    fn chunk_from_raw_u64_behaves_normally() {
        let message = 0x4D54726B_0000000au64;
        let expected = Chunk {
            chunk_type: TRACK_DATA_CHUNK,
            length: 10,
        };

        assert_eq!(expected, message.into())
    }

    #[test]
    fn document_decodes_header_and_tracks() {
        let bytes = smf(
            1,
            0x0060,
            &[
                &[0x00, 0xFF, 0x51, 0x03, 0x07, 0xA1, 0x20, 0x00, 0xFF, 0x2F, 0x00],
                &[0x00, 0xC0, 0x05, 0x10, 0x90, 0x3C, 0x40, 0x00, 0xFF, 0x2F, 0x00],
            ],
        );

        let midi = MidiDocument::from_bytes(&bytes).expect("Decode document");

        assert_eq!(midi.header().format(), Format::One);
        assert_eq!(midi.header().division(), TimeDivision::TicksPerBeat(96));
        assert_eq!(midi.tracks().len(), 2);
        assert_eq!(midi.tracks()[0].declared_length(), 11);
        assert_eq!(
            midi.tracks()[0].events()[0].body(),
            &EventBody::Meta(MetaEvent::Tempo(500_000))
        );
        assert_eq!(midi.iter().map(|track| track.len()).sum::<usize>(), 5);
    }

    #[test]
    fn zero_tracks_yields_empty_document() {
        let midi = MidiDocument::from_bytes(&header_bytes(0, 0, 0x0060)).expect("Decode header");
        assert!(midi.tracks().is_empty());
    }

    #[test]
    fn missing_track_chunk_is_truncated_input() {
        let mut bytes = header_bytes(1, 2, 0x0060);
        bytes.extend(track_chunk(&[0x00, 0xFF, 0x2F, 0x00]));

        let err = MidiDocument::from_bytes(&bytes).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TruncatedInput);
        assert_eq!(err.track(), Some(1));
        assert_eq!(err.offset(), 26);
    }

    #[test]
    fn second_track_failure_discards_document() {
        let bytes = smf(
            1,
            0x0060,
            &[&[0x00, 0xFF, 0x2F, 0x00], &[0x00, 0x3C, 0x40]],
        );

        let err = MidiDocument::from_bytes(&bytes).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRunningStatus(0x3C));
        assert_eq!(err.track(), Some(1));
    }

    #[test]
    fn opening_missing_file_is_io_error() {
        let result = MidiDocument::open("no/such/file.mid");
        assert!(matches!(result, Err(LoadError::Io(_))));
    }
}
