//! Channel events, running status and the single event decoder

use log::trace;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::{
    meta::{MetaEvent, MetaViolation},
    sysex::{SysexEvent, SysexLeader},
    TrackReader,
};
use crate::error::{Error, ErrorKind, Result};

/// Status byte introducing a meta event
pub const META_STATUS: u8 = 0xFF;

/// Any event that may occur in a track
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum EventBody {
    /// A message addressed to one MIDI channel
    Channel(ChannelEvent),
    /// Specifies non-MIDI information useful to this format or to sequencers
    Meta(MetaEvent),
    /// A system exclusive event
    Sysex(SysexEvent),
}

impl EventBody {
    /// The channel event, if this is one
    pub fn as_channel(&self) -> Option<&ChannelEvent> {
        match self {
            Self::Channel(event) => Some(event),
            _ => None,
        }
    }

    /// The meta event, if this is one
    pub fn as_meta(&self) -> Option<&MetaEvent> {
        match self {
            Self::Meta(event) => Some(event),
            _ => None,
        }
    }

    /// The sysex event, if this is one
    pub fn as_sysex(&self) -> Option<&SysexEvent> {
        match self {
            Self::Sysex(event) => Some(event),
            _ => None,
        }
    }

    /// True for the End Of Track meta event
    pub fn is_end_of_track(&self) -> bool {
        matches!(self, Self::Meta(MetaEvent::EndOfTrack))
    }
}

/// The seven kinds of channel message, keyed by the high nibble of the status byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(u8)]
pub enum ChannelKind {
    /// Note released
    NoteOff = 0x8,
    /// Note pressed
    NoteOn = 0x9,
    /// Polyphonic key pressure
    Aftertouch = 0xA,
    /// Control change
    Controller = 0xB,
    /// Patch change
    ProgramChange = 0xC,
    /// Pressure applied to the whole channel
    ChannelAftertouch = 0xD,
    /// Pitch wheel position
    PitchBend = 0xE,
}

impl ChannelKind {
    /// The kind named by a status byte, `None` if it is not a channel status
    pub const fn from_status(status: u8) -> Option<Self> {
        match status >> 4 {
            0x8 => Some(Self::NoteOff),
            0x9 => Some(Self::NoteOn),
            0xA => Some(Self::Aftertouch),
            0xB => Some(Self::Controller),
            0xC => Some(Self::ProgramChange),
            0xD => Some(Self::ChannelAftertouch),
            0xE => Some(Self::PitchBend),
            _ => None,
        }
    }

    /// How many data bytes follow the status byte
    pub const fn param_count(self) -> usize {
        match self {
            Self::ProgramChange | Self::ChannelAftertouch => 1,
            _ => 2,
        }
    }
}

/// A channel voice event: status byte plus one or two data bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ChannelEvent {
    /// Message kind from the high nibble
    kind: ChannelKind,
    /// Channel 0-15 from the low nibble
    channel: u8,
    /// Data bytes; the second is always 0 for single parameter kinds
    params: [u8; 2],
}

impl ChannelEvent {
    /// Builds an event from a status byte and its data bytes.
    ///
    /// Fails if the status is not a channel status or a data byte has its high bit set. Only as
    /// many data bytes as the kind takes are read from `params`.
    pub fn new(status: u8, params: [u8; 2]) -> core::result::Result<Self, ErrorKind> {
        let kind = ChannelKind::from_status(status).ok_or(ErrorKind::InvalidStatus(status))?;
        let mut stored = [0u8; 2];
        for (slot, byte) in stored.iter_mut().zip(params).take(kind.param_count()) {
            if byte & 0x80 != 0 {
                return Err(ErrorKind::InvalidDataByte(byte));
            }
            *slot = byte;
        }

        Ok(Self {
            kind,
            channel: status & 0x0F,
            params: stored,
        })
    }

    /// The status byte, kind and channel combined
    pub fn status(&self) -> u8 {
        ((self.kind as u8) << 4) | self.channel
    }

    /// The message kind
    pub fn kind(&self) -> ChannelKind {
        self.kind
    }

    /// Zero based channel
    pub fn channel(&self) -> u8 {
        self.channel
    }

    /// The one or two data bytes that were stored in the file
    pub fn params(&self) -> &[u8] {
        &self.params[..self.kind.param_count()]
    }

    /// Typed view of the data bytes
    pub fn message(&self) -> ChannelMessage {
        let [first, second] = self.params;
        match self.kind {
            ChannelKind::NoteOff => ChannelMessage::NoteOff {
                key: first,
                velocity: second,
            },
            ChannelKind::NoteOn => ChannelMessage::NoteOn {
                key: first,
                velocity: second,
            },
            ChannelKind::Aftertouch => ChannelMessage::Aftertouch {
                key: first,
                pressure: second,
            },
            ChannelKind::Controller => ChannelMessage::Controller {
                controller: first,
                value: second,
            },
            ChannelKind::ProgramChange => ChannelMessage::ProgramChange { program: first },
            ChannelKind::ChannelAftertouch => ChannelMessage::ChannelAftertouch { pressure: first },
            ChannelKind::PitchBend => ChannelMessage::PitchBend {
                value: u16::from(first) | (u16::from(second) << 7),
            },
        }
    }
}

/// A channel event's data interpreted according to its kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ChannelMessage {
    /// Note released
    NoteOff {
        /// Note number
        key: u8,
        /// Release velocity
        velocity: u8,
    },
    /// Note pressed; a velocity of 0 is commonly used as a note off
    NoteOn {
        /// Note number
        key: u8,
        /// Strike velocity
        velocity: u8,
    },
    /// Polyphonic key pressure
    Aftertouch {
        /// Note number
        key: u8,
        /// Pressure amount
        pressure: u8,
    },
    /// Control change
    Controller {
        /// Controller number
        controller: u8,
        /// New value
        value: u8,
    },
    /// Patch change
    ProgramChange {
        /// New program number
        program: u8,
    },
    /// Channel pressure
    ChannelAftertouch {
        /// Pressure amount
        pressure: u8,
    },
    /// Pitch wheel, 14 bits with 0x2000 as center
    PitchBend {
        /// Wheel position
        value: u16,
    },
}

/// The channel status a data byte falls back to when its own status byte is omitted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RunningStatus {
    /// No channel status is available; set at the start of a track and after meta/sysex events
    #[default]
    Cleared,
    /// The last channel status byte seen
    Active(u8),
}

/// Result of decoding one event body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedEvent {
    /// The decoded body
    pub body: EventBody,
    /// Running status to use for the next event
    pub running_status: RunningStatus,
    /// Bytes the body occupied, not counting the delta time
    pub len: u32,
}

/// Reads one data byte, rejecting status bytes
fn read_data_byte<I>(reader: &mut TrackReader<'_, I>) -> Result<u8>
where
    I: Iterator<Item = u8>,
{
    let offset = reader.offset();
    let byte = reader.read_u8()?;
    if byte & 0x80 != 0 {
        return Err(Error::new(ErrorKind::InvalidDataByte(byte), offset));
    }
    Ok(byte)
}

/// Decodes the event body that starts right after a delta time.
///
/// `running_status` is the state left by the previous event of the same track. The returned
/// state must be passed to the next call.
pub fn decode_event_body<I>(
    reader: &mut TrackReader<'_, I>,
    running_status: RunningStatus,
) -> Result<DecodedEvent>
where
    I: Iterator<Item = u8>,
{
    let start = reader.offset();
    let consumed_before = reader.consumed();
    let lead = reader.read_u8()?;

    let (body, running_status) = match lead {
        META_STATUS => (
            EventBody::Meta(decode_meta(reader, start)?),
            RunningStatus::Cleared,
        ),
        status if SysexLeader::from_status(status).is_some() => (
            EventBody::Sysex(decode_sysex(reader, status, start)?),
            RunningStatus::Cleared,
        ),
        status if status & 0x80 != 0 => {
            let kind = ChannelKind::from_status(status)
                .ok_or(Error::new(ErrorKind::InvalidStatus(status), start))?;
            let mut params = [0u8; 2];
            for slot in params.iter_mut().take(kind.param_count()) {
                *slot = read_data_byte(reader)?;
            }
            (
                EventBody::Channel(new_channel_event(status, params, start)?),
                RunningStatus::Active(status),
            )
        }
        data => {
            let RunningStatus::Active(status) = running_status else {
                return Err(Error::new(ErrorKind::MissingRunningStatus(data), start));
            };
            let kind = ChannelKind::from_status(status)
                .ok_or(Error::new(ErrorKind::InvalidStatus(status), start))?;
            let mut params = [data, 0];
            for slot in params.iter_mut().take(kind.param_count()).skip(1) {
                *slot = read_data_byte(reader)?;
            }
            (
                EventBody::Channel(new_channel_event(status, params, start)?),
                running_status,
            )
        }
    };

    let len = reader.consumed() - consumed_before;
    trace!("decoded {len} byte event at {start}: {body:?}");

    Ok(DecodedEvent {
        body,
        running_status,
        len,
    })
}

/// Wraps [`ChannelEvent::new`] failures with the event offset
fn new_channel_event(status: u8, params: [u8; 2], start: usize) -> Result<ChannelEvent> {
    ChannelEvent::new(status, params).map_err(|kind| Error::new(kind, start))
}

/// Reads the type, length and payload of a meta event whose `0xFF` was already consumed
fn decode_meta<I>(reader: &mut TrackReader<'_, I>, start: usize) -> Result<MetaEvent>
where
    I: Iterator<Item = u8>,
{
    let meta_type = reader.read_u8()?;
    let length = reader.read_vlq()?;
    let invalid = |reason| {
        Error::new(
            ErrorKind::InvalidMetaEvent { meta_type, reason },
            start,
        )
    };

    let remaining = reader.remaining();
    if length > remaining {
        return Err(invalid(MetaViolation::PayloadExceedsTrack { length, remaining }));
    }

    let payload = reader.read_exact(length)?;
    MetaEvent::from_raw(meta_type, payload).map_err(invalid)
}

/// Reads the length and payload of a sysex event whose leader was already consumed
fn decode_sysex<I>(reader: &mut TrackReader<'_, I>, status: u8, start: usize) -> Result<SysexEvent>
where
    I: Iterator<Item = u8>,
{
    let leader = SysexLeader::from_status(status)
        .ok_or(Error::new(ErrorKind::InvalidStatus(status), start))?;
    let length = reader.read_vlq()?;

    let remaining = reader.remaining();
    if length > remaining {
        return Err(Error::new(
            ErrorKind::InvalidSysexEvent { length, remaining },
            start,
        ));
    }

    Ok(SysexEvent::new(leader, reader.read_exact(length)?))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::{
        decode_event_body, ChannelEvent, ChannelKind, ChannelMessage, DecodedEvent, EventBody,
        RunningStatus,
    };
    use crate::{
        chunk::track::{
            meta::{MetaEvent, MetaViolation},
            sysex::{SysexEvent, SysexLeader},
            TrackReader,
        },
        error::{Error, ErrorKind, Result},
        reader::ByteSource,
    };

    /// Decodes a body from `bytes`, using the whole slice as the track budget
    fn decode(bytes: &[u8], running_status: RunningStatus) -> Result<DecodedEvent> {
        let mut source = ByteSource::new(bytes.iter().copied());
        let mut reader = TrackReader::new(&mut source, bytes.len() as u32);
        decode_event_body(&mut reader, running_status)
    }

    #[test]
    fn new_status_sets_running_status() {
        let decoded = decode(&[0x91, 0x3C, 0x40], RunningStatus::Cleared).unwrap();

        assert_eq!(decoded.running_status, RunningStatus::Active(0x91));
        assert_eq!(decoded.len, 3);
        let channel = decoded.body.as_channel().expect("Channel event");
        assert_eq!(channel.channel(), 1);
        assert_eq!(
            channel.message(),
            ChannelMessage::NoteOn {
                key: 0x3C,
                velocity: 0x40
            }
        );
    }

    #[test]
    fn data_byte_reuses_running_status() {
        let decoded = decode(&[0x3C, 0x00], RunningStatus::Active(0x90)).unwrap();

        assert_eq!(decoded.running_status, RunningStatus::Active(0x90));
        assert_eq!(decoded.len, 2);
        assert_eq!(
            decoded.body,
            EventBody::Channel(ChannelEvent::new(0x90, [0x3C, 0x00]).unwrap())
        );
    }

    #[test]
    fn single_param_kinds_zero_the_unused_byte() {
        let decoded = decode(&[0xC5, 0x07], RunningStatus::Cleared).unwrap();
        let channel = decoded.body.as_channel().unwrap();

        assert_eq!(channel.kind(), ChannelKind::ProgramChange);
        assert_eq!(channel.params(), &[0x07]);
        assert_eq!(channel, &ChannelEvent::new(0xC5, [0x07, 0x55]).unwrap());

        let decoded = decode(&[0x08], RunningStatus::Active(0xD2)).unwrap();
        assert_eq!(
            decoded.body.as_channel().unwrap().message(),
            ChannelMessage::ChannelAftertouch { pressure: 0x08 }
        );
        assert_eq!(decoded.len, 1);
    }

    #[test]
    fn data_byte_without_running_status_fails() {
        assert_eq!(
            decode(&[0x3C, 0x40], RunningStatus::Cleared),
            Err(Error::new(ErrorKind::MissingRunningStatus(0x3C), 0))
        );
    }

    #[test]
    fn status_byte_in_data_position_fails() {
        assert_eq!(
            decode(&[0x90, 0x3C, 0x80], RunningStatus::Cleared),
            Err(Error::new(ErrorKind::InvalidDataByte(0x80), 2))
        );
    }

    #[test]
    fn running_status_data_bytes_must_clear_the_high_bit() {
        assert_eq!(
            decode(&[0x3C, 0x80], RunningStatus::Active(0x90)),
            Err(Error::new(ErrorKind::InvalidDataByte(0x80), 1))
        );
        assert_eq!(
            decode(&[0x40, 0xC1], RunningStatus::Active(0xE3)),
            Err(Error::new(ErrorKind::InvalidDataByte(0xC1), 1))
        );
    }

    #[test]
    fn system_common_status_is_invalid() {
        for status in [0xF1, 0xF2, 0xF3, 0xF6, 0xF8, 0xFE] {
            assert_eq!(
                decode(&[status, 0x00, 0x00], RunningStatus::Active(0x90)),
                Err(Error::new(ErrorKind::InvalidStatus(status), 0))
            );
        }
    }

    #[test]
    fn meta_event_clears_running_status() {
        let decoded = decode(&[0xFF, 0x51, 0x03, 0x07, 0xA1, 0x20], RunningStatus::Active(0x90))
            .unwrap();

        assert_eq!(decoded.running_status, RunningStatus::Cleared);
        assert_eq!(decoded.body, EventBody::Meta(MetaEvent::Tempo(500_000)));
        assert_eq!(decoded.len, 6);
    }

    #[test]
    fn tempo_above_limit_fails() {
        assert_eq!(
            decode(&[0xFF, 0x51, 0x03, 0x80, 0x00, 0x00], RunningStatus::Cleared),
            Err(Error::new(
                ErrorKind::InvalidMetaEvent {
                    meta_type: 0x51,
                    reason: MetaViolation::TempoOutOfRange(0x80_0000)
                },
                0
            ))
        );
    }

    #[test]
    fn meta_length_past_track_end_fails() {
        assert_eq!(
            decode(&[0xFF, 0x01, 0x05, b'a', b'b'], RunningStatus::Cleared)
                .unwrap_err()
                .kind(),
            ErrorKind::InvalidMetaEvent {
                meta_type: 0x01,
                reason: MetaViolation::PayloadExceedsTrack {
                    length: 5,
                    remaining: 2
                }
            }
        );
    }

    #[test]
    fn sysex_event_keeps_payload_and_clears_status() {
        let decoded = decode(&[0xF0, 0x03, 0x43, 0x12, 0xF7], RunningStatus::Active(0x80))
            .unwrap();

        assert_eq!(decoded.running_status, RunningStatus::Cleared);
        assert_eq!(
            decoded.body,
            EventBody::Sysex(SysexEvent::new(SysexLeader::Start, vec![0x43, 0x12, 0xF7]))
        );

        let escape = decode(&[0xF7, 0x01, 0xF8], RunningStatus::Cleared).unwrap();
        assert_eq!(escape.body.as_sysex().unwrap().leader(), SysexLeader::Escape);
    }

    #[test]
    fn sysex_length_past_track_end_fails() {
        assert_eq!(
            decode(&[0xF0, 0x81, 0x00, 0x01], RunningStatus::Cleared)
                .unwrap_err()
                .kind(),
            ErrorKind::InvalidSysexEvent {
                length: 0x80,
                remaining: 1
            }
        );
    }

    #[test]
    fn pitch_bend_combines_seven_bit_halves() {
        let decoded = decode(&[0xE0, 0x00, 0x40], RunningStatus::Cleared).unwrap();
        assert_eq!(
            decoded.body.as_channel().unwrap().message(),
            ChannelMessage::PitchBend { value: 0x2000 }
        );
    }

    #[test]
    fn channel_event_rejects_bad_input() {
        assert_eq!(
            ChannelEvent::new(0x70, [0, 0]),
            Err(ErrorKind::InvalidStatus(0x70))
        );
        assert_eq!(
            ChannelEvent::new(0xB0, [0x07, 0xFF]),
            Err(ErrorKind::InvalidDataByte(0xFF))
        );
    }
}
