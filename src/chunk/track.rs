//! Track chunks and the state machine that decodes them
//!
//! A track chunk declares how many bytes of delta-time/event pairs follow. [`TrackParser`] walks
//! those pairs with a [`TrackReader`], which charges every byte it hands out against the declared
//! budget before touching the source. A track is accepted only when the budget is used up
//! exactly at the end of an event.

use log::{debug, trace};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use event::{decode_event_body, EventBody, RunningStatus};

use crate::{
    chunk::chunk_types::TRACK_DATA_CHUNK,
    error::{Error, ErrorKind, Result},
    reader::ByteSource,
    vlq, Chunk,
};

pub mod event;
pub mod meta;
pub mod sysex;

/// A decoded track chunk
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Track {
    /// Length from the chunk header, which the events consumed exactly
    declared_length: u32,
    /// All events in file order
    events: Vec<Event>,
}

impl Track {
    /// Byte length declared by the track chunk
    pub fn declared_length(&self) -> u32 {
        self.declared_length
    }

    /// The events in file order
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Iterates over the events in file order
    pub fn iter(&self) -> core::slice::Iter<'_, Event> {
        self.events.iter()
    }

    /// Number of events
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Returns if the track holds no events
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Whether the track finishes with an End Of Track event
    pub fn has_end_of_track(&self) -> bool {
        self.events
            .last()
            .is_some_and(|event| event.body.is_end_of_track())
    }
}

impl<'a> IntoIterator for &'a Track {
    type Item = &'a Event;
    type IntoIter = core::slice::Iter<'a, Event>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}

/// A MIDI Event with a delta time and an attached body
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Event {
    /// Ticks to wait after the previous event of the same track
    delta_time: u32,
    /// The event that occurs after the delta time is waited for
    body: EventBody,
}

impl Event {
    /// Creates an event
    pub fn new(delta_time: u32, body: EventBody) -> Self {
        Self { delta_time, body }
    }

    /// Ticks since the previous event of the same track
    pub fn delta_time(&self) -> u32 {
        self.delta_time
    }

    /// The decoded event
    pub fn body(&self) -> &EventBody {
        &self.body
    }
}

/// Budgeted reads inside one track chunk.
///
/// Every read is checked against the bytes left in the declared length first, so decoding never
/// runs into the next chunk.
#[derive(Debug)]
pub struct TrackReader<'src, I> {
    /// Where the bytes come from
    source: &'src mut ByteSource<I>,
    /// Length declared by the chunk header
    declared: u32,
    /// Bytes handed out so far
    consumed: u32,
}

impl<'src, I> TrackReader<'src, I>
where
    I: Iterator<Item = u8>,
{
    /// Starts a budget of `declared` bytes at the current source position
    pub fn new(source: &'src mut ByteSource<I>, declared: u32) -> Self {
        Self {
            source,
            declared,
            consumed: 0,
        }
    }

    /// Absolute offset of the next byte
    pub fn offset(&self) -> usize {
        self.source.offset()
    }

    /// Bytes consumed from the budget
    pub fn consumed(&self) -> u32 {
        self.consumed
    }

    /// Bytes left in the budget
    pub fn remaining(&self) -> u32 {
        self.declared - self.consumed
    }

    /// Reserves `n` bytes of the budget or fails with a length mismatch
    fn charge(&mut self, n: u32) -> Result<()> {
        if n > self.remaining() {
            return Err(Error::new(
                ErrorKind::TrackLengthMismatch {
                    declared: self.declared,
                    required: u64::from(self.consumed) + u64::from(n),
                },
                self.offset(),
            ));
        }
        self.consumed += n;
        Ok(())
    }

    /// Reads one byte
    pub fn read_u8(&mut self) -> Result<u8> {
        self.charge(1)?;
        self.source.read_u8()
    }

    /// Reads `n` bytes into an owned buffer
    pub fn read_exact(&mut self, n: u32) -> Result<Vec<u8>> {
        self.charge(n)?;
        self.source.read_exact(n as usize)
    }

    /// Reads a variable length quantity that must end inside the budget.
    ///
    /// Running into the end of the budget is a length mismatch; running out of source bytes or
    /// a 4th continuation byte is a malformed quantity.
    pub fn read_vlq(&mut self) -> Result<u32> {
        let start = self.offset();
        let budget = self.remaining();
        let mut pulled = 0u32;
        let mut over_budget = false;
        let source = &mut *self.source;

        let result = vlq::read(|| {
            if pulled == budget {
                over_budget = true;
                return None;
            }
            pulled += 1;
            source.next_byte()
        });

        match result {
            Ok((value, len)) => {
                self.consumed += len as u32;
                Ok(value)
            }
            Err(_) if over_budget => Err(Error::new(
                ErrorKind::TrackLengthMismatch {
                    declared: self.declared,
                    required: u64::from(self.consumed) + u64::from(budget) + 1,
                },
                start,
            )),
            Err(e) => Err(Error::new(e.into(), start)),
        }
    }
}

/// Where a [`TrackParser`] is in a track chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackState {
    /// The `MTrk` tag and length have not been read
    AwaitingChunkHeader,
    /// The next byte starts a delta time
    AwaitingDeltaTime,
    /// A delta time was read and its event body comes next
    AwaitingEventBody {
        /// The delta time just read
        delta_time: u32,
    },
    /// The declared length was consumed exactly
    Complete,
    /// Decoding failed; nothing more will be read
    Invalid,
}

/// Decodes one track chunk from a byte source
#[derive(Debug)]
pub struct TrackParser<'src, I> {
    /// Budgeted view of the source, empty until the chunk header is read
    reader: TrackReader<'src, I>,
    /// Position of the track in the file, for error context
    index: usize,
    /// Current state
    state: TrackState,
    /// Status inherited by data bytes, per track
    running_status: RunningStatus,
    /// Events decoded so far
    events: Vec<Event>,
    /// The error that moved the parser to [`TrackState::Invalid`]
    failure: Option<Error>,
}

impl<'src, I> TrackParser<'src, I>
where
    I: Iterator<Item = u8>,
{
    /// Prepares to decode the track chunk starting at the current source position
    pub fn new(source: &'src mut ByteSource<I>, index: usize) -> Self {
        Self {
            reader: TrackReader::new(source, 0),
            index,
            state: TrackState::AwaitingChunkHeader,
            running_status: RunningStatus::Cleared,
            events: vec![],
            failure: None,
        }
    }

    /// The current state
    pub fn state(&self) -> TrackState {
        self.state
    }

    /// Runs the state machine until the track is complete.
    ///
    /// Any failure is returned with the track index attached and the partial track is dropped.
    /// A parser that already failed returns its recorded error.
    pub fn parse(mut self) -> Result<Track> {
        while self.state != TrackState::Complete {
            self.step()?;
        }

        debug!(
            "track {}: {} events in {} bytes",
            self.index,
            self.events.len(),
            self.reader.declared
        );

        Ok(Track {
            declared_length: self.reader.declared,
            events: self.events,
        })
    }

    /// Performs one transition.
    ///
    /// Stepping a complete parser does nothing. Stepping a failed one repeats its error.
    pub fn step(&mut self) -> Result<()> {
        let next = match self.state {
            TrackState::AwaitingChunkHeader => self.read_chunk_header(),
            TrackState::AwaitingDeltaTime => self
                .reader
                .read_vlq()
                .map(|delta_time| TrackState::AwaitingEventBody { delta_time }),
            TrackState::AwaitingEventBody { delta_time } => self.read_event_body(delta_time),
            TrackState::Complete => return Ok(()),
            TrackState::Invalid => return self.failure.map_or(Ok(()), Err),
        };

        match next {
            Ok(state) => {
                trace!("track {}: {:?} -> {state:?}", self.index, self.state);
                self.state = state;
                Ok(())
            }
            Err(e) => {
                let e = e.in_track(self.index);
                self.state = TrackState::Invalid;
                self.failure = Some(e);
                self.events.clear();
                Err(e)
            }
        }
    }

    /// Reads the `MTrk` tag and declared length
    fn read_chunk_header(&mut self) -> Result<TrackState> {
        let start = self.reader.offset();
        let chunk = Chunk::read(&mut *self.reader.source)?;

        if chunk.chunk_type != TRACK_DATA_CHUNK {
            return Err(Error::new(
                ErrorKind::UnexpectedChunkId(chunk.chunk_type),
                start,
            ));
        }

        self.reader.declared = chunk.length();
        self.reader.consumed = 0;

        Ok(if chunk.is_empty() {
            TrackState::Complete
        } else {
            TrackState::AwaitingDeltaTime
        })
    }

    /// Decodes one event body and decides whether the track is finished
    fn read_event_body(&mut self, delta_time: u32) -> Result<TrackState> {
        let decoded = decode_event_body(&mut self.reader, self.running_status)?;
        self.running_status = decoded.running_status;

        let end_of_track = decoded.body.is_end_of_track();
        self.events.push(Event::new(delta_time, decoded.body));

        if self.reader.remaining() == 0 {
            Ok(TrackState::Complete)
        } else if end_of_track {
            Err(Error::new(
                ErrorKind::TrackLengthMismatch {
                    declared: self.reader.declared,
                    required: u64::from(self.reader.consumed),
                },
                self.reader.offset(),
            ))
        } else {
            Ok(TrackState::AwaitingDeltaTime)
        }
    }
}
