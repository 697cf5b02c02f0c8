//! Error types produced while decoding a Standard MIDI File
//!
//! Every error is fatal to the whole document. An [`Error`] carries the [`ErrorKind`] together
//! with the absolute byte offset the failing unit started at and, once track decoding has begun,
//! the index of the track being decoded.

use thiserror::Error;

use crate::{chunk::track::meta::MetaViolation, vlq::VlqError};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Result alias used by every decoding operation in this crate
pub type Result<T> = core::result::Result<T, Error>;

/// The kind of structural violation found in the input
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ErrorKind {
    /// The byte source ended before a required field was complete
    #[error("input ended before the required bytes were read")]
    TruncatedInput,
    /// The file does not start with an `MThd` chunk
    #[error("expected an MThd header chunk, found {0:?}")]
    InvalidHeader([u8; 4]),
    /// The header chunk declares a length other than 6
    #[error("header chunk length must be 6, found {0}")]
    InvalidHeaderLength(u32),
    /// The header format is not 0, 1 or 2
    #[error("unsupported SMF format {0}")]
    UnsupportedFormat(u16),
    /// A variable length quantity was too long or cut short
    #[error("malformed variable length quantity: {0}")]
    MalformedVlq(VlqError),
    /// A status byte names an undefined channel event kind
    #[error("invalid channel status byte {0:#04X}")]
    InvalidStatus(u8),
    /// A data byte appeared with no channel status to reuse
    #[error("data byte {0:#04X} found with no running status")]
    MissingRunningStatus(u8),
    /// A channel event data byte has its high bit set
    #[error("channel data byte {0:#04X} has its high bit set")]
    InvalidDataByte(u8),
    /// A meta event broke the rules of its type
    #[error("invalid meta event {meta_type:#04X}: {reason}")]
    InvalidMetaEvent {
        /// The meta type byte
        meta_type: u8,
        /// Which rule was broken
        reason: MetaViolation,
    },
    /// A sysex payload length runs past the end of the track
    #[error("sysex payload of {length} bytes exceeds the {remaining} bytes left in the track")]
    InvalidSysexEvent {
        /// Declared payload length
        length: u32,
        /// Bytes left in the track budget after the length field
        remaining: u32,
    },
    /// The events of a track did not end exactly on its declared length
    #[error("track declares {declared} bytes but its events need {required}")]
    TrackLengthMismatch {
        /// Length from the track chunk header
        declared: u32,
        /// Bytes the events consumed, or needed when the budget ran out
        required: u64,
    },
    /// A chunk other than `MTrk` was found where a track was expected
    #[error("expected an MTrk chunk, found {0:?}")]
    UnexpectedChunkId([u8; 4]),
}

impl From<VlqError> for ErrorKind {
    fn from(e: VlqError) -> Self {
        Self::MalformedVlq(e)
    }
}

/// A decoding failure with the position it happened at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Error {
    /// What went wrong
    kind: ErrorKind,
    /// Absolute byte offset of the unit that failed
    offset: usize,
    /// Index of the track being decoded, if any
    track: Option<usize>,
}

impl core::error::Error for Error {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        Some(&self.kind)
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self.track {
            Some(track) => write![f, "track {track}, byte {}: {}", self.offset, self.kind],
            None => write![f, "byte {}: {}", self.offset, self.kind],
        }
    }
}

impl Error {
    /// Creates an error at an absolute byte offset
    pub const fn new(kind: ErrorKind, offset: usize) -> Self {
        Self {
            kind,
            offset,
            track: None,
        }
    }

    /// Attaches the index of the track being decoded
    pub const fn in_track(mut self, track: usize) -> Self {
        self.track = Some(track);
        self
    }

    /// The kind of violation
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Absolute byte offset in the input where the failing unit started
    pub const fn offset(&self) -> usize {
        self.offset
    }

    /// Zero based index of the track that failed, `None` for header errors
    pub const fn track(&self) -> Option<usize> {
        self.track
    }
}

/// Error returned when loading a document from a file
#[derive(Error, Debug)]
pub enum LoadError {
    /// The file could not be read
    #[error("failed to read MIDI source")]
    Io(#[from] std::io::Error),
    /// The bytes are not a valid Standard MIDI File
    #[error("failed to decode MIDI file: {0}")]
    Parse(#[from] Error),
}
