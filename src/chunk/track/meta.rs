//! Meta Event Structs and the per-type validation table

use std::borrow::Cow;

use thiserror::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Meta type byte of the End Of Track marker
pub const END_OF_TRACK: u8 = 0x2F;

/// Largest tempo, in microseconds per quarter note, a Set Tempo event may carry
pub const MAX_TEMPO: u32 = 0x7F_FFFF;

/// A meta level event
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum MetaEvent {
    /// Sequence Number, tag 0x00
    SequenceNumber(u16),
    /// Text metadata, tag 0x01
    Text(Vec<u8>),
    /// Copyright, tag 0x02
    Copyright(Vec<u8>),
    /// Track name, tag 0x03
    TrackName(Vec<u8>),
    /// Instrument name, tag 0x04
    InstrumentName(Vec<u8>),
    /// Lyric, tag 0x05
    Lyric(Vec<u8>),
    /// Marker, tag 0x06
    Marker(Vec<u8>),
    /// Cue Point, tag 0x07
    CuePoint(Vec<u8>),
    /// Midi Channel Prefix, tag 0x20
    MidiChannelPrefix(u8),
    /// Midi Port, tag 0x21
    MidiPort(u8),
    /// End of Track Identifier, tag 0x2F
    EndOfTrack,
    /// Tempo in microseconds per quarter note, tag 0x51
    Tempo(u32),
    /// Smpte Offset, tag 0x54
    SmpteOffset(SmpteOffset),
    /// Time signature, tag 0x58
    TimeSignature(TimeSignature),
    /// Key Signature, tag 0x59
    KeySignature(KeySignature),
    /// Sequencer Specific, tag 0x7f
    SequencerSpecific(Vec<u8>),
    /// A meta event with no rules attached, stored opaquely
    Unknown(u8, Vec<u8>),
}

/// The rule a meta event payload broke
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum MetaViolation {
    /// The type requires an exact payload length
    #[error("payload must be {expected} bytes, found {found}")]
    Length {
        /// Length the type requires
        expected: u8,
        /// Length declared in the event
        found: u32,
    },
    /// The type requires at least one payload byte
    #[error("payload must not be empty")]
    Empty,
    /// The declared payload runs past the end of the track
    #[error("payload of {length} bytes exceeds the {remaining} bytes left in the track")]
    PayloadExceedsTrack {
        /// Declared payload length
        length: u32,
        /// Bytes left in the track after the length field
        remaining: u32,
    },
    /// Channel prefix above 15
    #[error("channel prefix {0} is above 15")]
    ChannelOutOfRange(u8),
    /// Tempo above [`MAX_TEMPO`]
    #[error("tempo {0} exceeds {max}", max = MAX_TEMPO)]
    TempoOutOfRange(u32),
    /// More than 7 sharps or flats
    #[error("key signature of {0} sharps/flats is outside -7..=7")]
    KeyOutOfRange(i8),
    /// Mode byte other than major (0) or minor (1)
    #[error("key signature mode {0} is neither major nor minor")]
    InvalidMode(u8),
}

/// Fails unless `data` has exactly `expected` bytes
fn require_len(data: &[u8], expected: u8) -> Result<(), MetaViolation> {
    if data.len() == usize::from(expected) {
        Ok(())
    } else {
        Err(MetaViolation::Length {
            expected,
            found: data.len() as u32,
        })
    }
}

impl MetaEvent {
    /// Validates a payload against the rules of its meta type and decodes it.
    ///
    /// Types without rules are kept as [`MetaEvent::Unknown`] with the payload untouched.
    pub fn from_raw(meta_type: u8, data: Vec<u8>) -> Result<Self, MetaViolation> {
        let event = match meta_type {
            0x00 => {
                require_len(&data, 2)?;
                Self::SequenceNumber(u16::from_be_bytes([data[0], data[1]]))
            }
            0x01 => Self::Text(data),
            0x02 => Self::Copyright(data),
            0x03 => Self::TrackName(data),
            0x04 => Self::InstrumentName(data),
            0x05 => Self::Lyric(data),
            0x06 => Self::Marker(data),
            0x07 => Self::CuePoint(data),

            0x20 => {
                require_len(&data, 1)?;
                if data[0] > 0x0F {
                    return Err(MetaViolation::ChannelOutOfRange(data[0]));
                }
                Self::MidiChannelPrefix(data[0])
            }
            0x21 => {
                require_len(&data, 1)?;
                Self::MidiPort(data[0])
            }
            END_OF_TRACK => {
                require_len(&data, 0)?;
                Self::EndOfTrack
            }

            0x51 => {
                require_len(&data, 3)?;
                let tempo = u32::from_be_bytes([0, data[0], data[1], data[2]]);
                if tempo > MAX_TEMPO {
                    return Err(MetaViolation::TempoOutOfRange(tempo));
                }
                Self::Tempo(tempo)
            }
            0x54 => {
                require_len(&data, 5)?;
                Self::SmpteOffset(SmpteOffset {
                    hours: data[0],
                    minutes: data[1],
                    seconds: data[2],
                    frames: data[3],
                    subframes: data[4],
                })
            }
            0x58 => {
                require_len(&data, 4)?;
                Self::TimeSignature(TimeSignature {
                    numerator: data[0],
                    denominator_power: data[1],
                    clocks_per_click: data[2],
                    thirty_seconds_per_quarter: data[3],
                })
            }
            0x59 => {
                require_len(&data, 2)?;
                Self::KeySignature(KeySignature::new(data[0] as i8, data[1])?)
            }

            0x7F => {
                if data.is_empty() {
                    return Err(MetaViolation::Empty);
                }
                Self::SequencerSpecific(data)
            }

            other => Self::Unknown(other, data),
        };

        Ok(event)
    }

    /// Returns the specific event's type byte
    pub fn meta_type(&self) -> u8 {
        match self {
            Self::SequenceNumber(_) => 0x00,
            Self::Text(_) => 0x01,
            Self::Copyright(_) => 0x02,
            Self::TrackName(_) => 0x03,
            Self::InstrumentName(_) => 0x04,
            Self::Lyric(_) => 0x05,
            Self::Marker(_) => 0x06,
            Self::CuePoint(_) => 0x07,
            Self::MidiChannelPrefix(_) => 0x20,
            Self::MidiPort(_) => 0x21,
            Self::EndOfTrack => END_OF_TRACK,
            Self::Tempo(_) => 0x51,
            Self::SmpteOffset(_) => 0x54,
            Self::TimeSignature(_) => 0x58,
            Self::KeySignature(_) => 0x59,
            Self::SequencerSpecific(_) => 0x7F,
            Self::Unknown(tag, _) => *tag,
        }
    }

    /// The payload bytes exactly as they appeared in the file
    pub fn payload(&self) -> Cow<'_, [u8]> {
        match self {
            Self::Text(data)
            | Self::Copyright(data)
            | Self::TrackName(data)
            | Self::InstrumentName(data)
            | Self::Lyric(data)
            | Self::Marker(data)
            | Self::CuePoint(data)
            | Self::SequencerSpecific(data)
            | Self::Unknown(_, data) => Cow::Borrowed(data),
            Self::SequenceNumber(number) => Cow::Owned(number.to_be_bytes().to_vec()),
            Self::MidiChannelPrefix(value) | Self::MidiPort(value) => Cow::Owned(vec![*value]),
            Self::EndOfTrack => Cow::Borrowed(&[]),
            Self::Tempo(tempo) => Cow::Owned(tempo.to_be_bytes()[1..].to_vec()),
            Self::SmpteOffset(offset) => Cow::Owned(vec![
                offset.hours,
                offset.minutes,
                offset.seconds,
                offset.frames,
                offset.subframes,
            ]),
            Self::TimeSignature(sig) => Cow::Owned(vec![
                sig.numerator,
                sig.denominator_power,
                sig.clocks_per_click,
                sig.thirty_seconds_per_quarter,
            ]),
            Self::KeySignature(key) => {
                Cow::Owned(vec![key.sharps_flats as u8, u8::from(key.minor)])
            }
        }
    }

    /// Beats per minute of a [`MetaEvent::Tempo`], `None` for other events or a zero tempo
    pub fn bpm(&self) -> Option<f64> {
        match self {
            Self::Tempo(micros) if *micros > 0 => Some(60_000_000.0 / f64::from(*micros)),
            _ => None,
        }
    }

    /// Text of the 0x01-0x07 family, decoded lossily since files rarely agree on an encoding
    pub fn text(&self) -> Option<Cow<'_, str>> {
        match self {
            Self::Text(data)
            | Self::Copyright(data)
            | Self::TrackName(data)
            | Self::InstrumentName(data)
            | Self::Lyric(data)
            | Self::Marker(data)
            | Self::CuePoint(data) => Some(String::from_utf8_lossy(data)),
            _ => None,
        }
    }
}

/// A key signature
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct KeySignature {
    /// Negative for flats, positive for sharps
    sharps_flats: i8,
    /// True if minor, false if major
    minor: bool,
}

impl KeySignature {
    /// Builds a key signature from its sharps/flats count and mode byte
    pub fn new(sharps_flats: i8, mode: u8) -> Result<Self, MetaViolation> {
        if !(-7..=7).contains(&sharps_flats) {
            return Err(MetaViolation::KeyOutOfRange(sharps_flats));
        }
        let minor = match mode {
            0 => false,
            1 => true,
            other => return Err(MetaViolation::InvalidMode(other)),
        };

        Ok(Self {
            sharps_flats,
            minor,
        })
    }

    /// Sharps (positive) or flats (negative) in the key
    pub fn sharps_flats(&self) -> i8 {
        self.sharps_flats
    }

    /// True for a minor key
    pub fn is_minor(&self) -> bool {
        self.minor
    }
}

/// An SMPTE Offset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SmpteOffset {
    /// Hours of offset, frame rate code in bits 5-6
    pub hours: u8,
    /// Minutes of offset
    pub minutes: u8,
    /// Seconds of offset
    pub seconds: u8,
    /// Frames of offset
    pub frames: u8,
    /// Hundredths of a frame
    pub subframes: u8,
}

/// A Time Signature
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TimeSignature {
    /// The time signature's numerator
    pub numerator: u8,
    /// The denominator as a power of two
    pub denominator_power: u8,
    /// MIDI clocks per metronome click
    pub clocks_per_click: u8,
    /// Notated 32nd notes per MIDI quarter note
    pub thirty_seconds_per_quarter: u8,
}

impl TimeSignature {
    /// The denominator, `None` if the stored power does not fit in 32 bits
    pub fn denominator(&self) -> Option<u32> {
        1u32.checked_shl(u32::from(self.denominator_power))
    }
}
