//! Header Chunk Enum and Struct Definitions

use log::debug;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{
    chunk::chunk_types::HEADER_CHUNK,
    error::{Error, ErrorKind, Result},
    reader::ByteSource,
    Chunk,
};

/// Required length of the header chunk body
pub const HEADER_LENGTH: u32 = 6;

/// Header chunk data: format, track count and time division
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Header {
    /// The MIDI format
    format: Format,
    /// Number of track chunks that follow
    track_count: u16,
    /// Meaning of delta times
    division: TimeDivision,
}

impl Header {
    /// Creates a header from already decoded fields
    pub const fn new(format: Format, track_count: u16, division: TimeDivision) -> Self {
        Self {
            format,
            track_count,
            division,
        }
    }

    /// Reads and validates the `MThd` chunk at the start of a file.
    ///
    /// No track data is consumed; the source is left right after the 14 header bytes.
    pub fn parse<I>(source: &mut ByteSource<I>) -> Result<Self>
    where
        I: Iterator<Item = u8>,
    {
        let start = source.offset();
        let chunk = Chunk::read(source)?;

        if chunk.chunk_type != HEADER_CHUNK {
            return Err(Error::new(
                ErrorKind::InvalidHeader(chunk.chunk_type),
                start,
            ));
        }
        if chunk.length() != HEADER_LENGTH {
            return Err(Error::new(
                ErrorKind::InvalidHeaderLength(chunk.length()),
                start + 4,
            ));
        }

        let fields_start = source.offset();
        let format = source.read_u16_be()?;
        let track_count = source.read_u16_be()?;
        let division = source.read_u16_be()?;

        let format = Format::try_from(format)
            .map_err(|raw| Error::new(ErrorKind::UnsupportedFormat(raw), fields_start))?;
        let header = Self::new(format, track_count, division.into());

        debug!(
            "decoded header: format {}, {track_count} tracks, {:?}",
            format.code(),
            header.division
        );

        Ok(header)
    }

    /// The file format
    pub const fn format(&self) -> Format {
        self.format
    }

    /// Number of track chunks announced by the header
    pub const fn track_count(&self) -> u16 {
        self.track_count
    }

    /// How delta times are to be interpreted
    pub const fn division(&self) -> TimeDivision {
        self.division
    }
}

/// The overall organization of the MIDI file. Only three values are valid, making most of the 16
/// bits irrelevant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Format {
    /// The file contains a single multi-channel track
    Zero,
    /// The file contains one or more simultaneous tracks (or MIDI outputs) of a sequence
    One,
    /// The file contains one or more sequentially independent single-track patterns
    Two,
}

impl Format {
    /// The numeric format code as stored in the header
    pub const fn code(self) -> u16 {
        match self {
            Self::Zero => 0,
            Self::One => 1,
            Self::Two => 2,
        }
    }
}

impl TryFrom<u16> for Format {
    type Error = u16;
    fn try_from(value: u16) -> core::result::Result<Self, Self::Error> {
        match value {
            0 => Ok(Format::Zero),
            1 => Ok(Format::One),
            2 => Ok(Format::Two),
            other => Err(other),
        }
    }
}

/// The meaning of the delta-times in the MIDI sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TimeDivision {
    /// When bit 15 is a 0, bits 14-0 represent ticks per quarter note
    TicksPerBeat(u16),
    /// When bit 15 is 1, the high byte is a negative SMPTE frame rate code and the low byte is
    /// ticks per frame
    Smpte {
        /// Frame rate code, stored negated (-24, -25, -29 or -30 in practice)
        format: i8,
        /// Subdivisions of a frame
        ticks_per_frame: u8,
    },
}

impl TimeDivision {
    /// Ticks per quarter note, if the division is metrical
    pub const fn ticks_per_beat(self) -> Option<u16> {
        match self {
            Self::TicksPerBeat(tpb) => Some(tpb),
            Self::Smpte { .. } => None,
        }
    }
}

impl From<u16> for TimeDivision {
    fn from(value: u16) -> Self {
        const SMPTE_FLAG: u16 = 0x8000;
        const MASK: u16 = 0x7FFF;

        if value & SMPTE_FLAG == 0 {
            TimeDivision::TicksPerBeat(value & MASK)
        } else {
            let [format, ticks_per_frame] = value.to_be_bytes();
            TimeDivision::Smpte {
                format: format as i8,
                ticks_per_frame,
            }
        }
    }
}
