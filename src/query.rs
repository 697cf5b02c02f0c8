//! Read-only queries over a decoded document.
//!
//! Every query borrows the [`MidiDocument`] and walks its tracks in file order. Results carry the
//! index of the track they came from and the event's delta time, which is relative to the previous
//! event of that same track.

use std::borrow::Cow;
use std::ops::RangeInclusive;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{
    chunk::track::{
        event::{ChannelEvent, ChannelKind, ChannelMessage, EventBody},
        meta::MetaEvent,
        Event, Track,
    },
    MidiDocument,
};

/// Meta types whose payload is text
const TEXT_TYPES: RangeInclusive<u8> = 0x01..=0x07;

/// Microseconds in a minute, for tempo conversion
const MICROS_PER_MINUTE: f64 = 60_000_000.0;

/// A note on or note off event pulled out of a track
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NoteEvent {
    /// Index of the track holding the event
    pub track: usize,
    /// Ticks since the previous event in the track
    pub delta_time: u32,
    /// Channel, 0 to 15
    pub channel: u8,
    /// Note number
    pub key: u8,
    /// Velocity as stored
    pub velocity: u8,
    /// True for note on, false for note off
    pub on: bool,
}

/// A Set Tempo event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TempoChange {
    /// Index of the track holding the event
    pub track: usize,
    /// Ticks since the previous event in the track
    pub delta_time: u32,
    /// Microseconds per quarter note
    pub micros_per_quarter: u32,
}

impl TempoChange {
    /// Beats per minute, `None` for a zero tempo
    pub fn bpm(&self) -> Option<f64> {
        (self.micros_per_quarter > 0)
            .then(|| MICROS_PER_MINUTE / f64::from(self.micros_per_quarter))
    }
}

/// A text meta event (types 0x01 through 0x07)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextEvent<'a> {
    /// Index of the track holding the event
    pub track: usize,
    /// Ticks since the previous event in the track
    pub delta_time: u32,
    /// Which text type, e.g. 0x03 for a track name
    pub meta_type: u8,
    /// The payload, with invalid UTF-8 replaced
    pub text: Cow<'a, str>,
}

/// Event counts for a whole document
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Summary {
    /// Number of tracks
    pub tracks: usize,
    /// Events of every kind
    pub events: usize,
    /// Channel voice events
    pub channel_events: usize,
    /// Meta events
    pub meta_events: usize,
    /// System exclusive events
    pub sysex_events: usize,
    /// Note on and note off events
    pub note_events: usize,
    /// Set Tempo events
    pub tempo_changes: usize,
    /// Text family meta events
    pub text_events: usize,
}

impl MidiDocument {
    /// The track at `index`
    pub fn track(&self, index: usize) -> Option<&Track> {
        self.tracks().get(index)
    }

    /// Every event with its track index, across all tracks or only the one given
    fn events_in(&self, track: Option<usize>) -> impl Iterator<Item = (usize, &Event)> + '_ {
        self.iter()
            .enumerate()
            .filter(move |(index, _)| track.is_none() || track == Some(*index))
            .flat_map(|(index, events)| events.iter().map(move |event| (index, event)))
    }

    /// Channel voice events, optionally limited to one track.
    ///
    /// An index past the last track yields nothing.
    pub fn channel_events(
        &self,
        track: Option<usize>,
    ) -> impl Iterator<Item = (usize, &Event, &ChannelEvent)> + '_ {
        self.events_in(track)
            .filter_map(|(index, event)| Some((index, event, event.body().as_channel()?)))
    }

    /// Note on and note off events, optionally limited to one track.
    ///
    /// A note on with velocity 0 is reported as stored.
    pub fn note_events(&self, track: Option<usize>) -> impl Iterator<Item = NoteEvent> + '_ {
        self.channel_events(track)
            .filter_map(|(index, event, channel)| {
                let (key, velocity, on) = match channel.message() {
                    ChannelMessage::NoteOn { key, velocity } => (key, velocity, true),
                    ChannelMessage::NoteOff { key, velocity } => (key, velocity, false),
                    _ => return None,
                };

                Some(NoteEvent {
                    track: index,
                    delta_time: event.delta_time(),
                    channel: channel.channel(),
                    key,
                    velocity,
                    on,
                })
            })
    }

    /// Meta events, optionally limited to one track and one meta type
    pub fn meta_events(
        &self,
        track: Option<usize>,
        meta_type: Option<u8>,
    ) -> impl Iterator<Item = (usize, &Event, &MetaEvent)> + '_ {
        self.events_in(track).filter_map(move |(index, event)| {
            let meta = event.body().as_meta()?;
            match meta_type {
                Some(wanted) if meta.meta_type() != wanted => None,
                _ => Some((index, event, meta)),
            }
        })
    }

    /// Every Set Tempo event in file order
    pub fn tempo_changes(&self) -> Vec<TempoChange> {
        self.meta_events(None, Some(0x51))
            .filter_map(|(index, event, meta)| match meta {
                MetaEvent::Tempo(micros) => Some(TempoChange {
                    track: index,
                    delta_time: event.delta_time(),
                    micros_per_quarter: *micros,
                }),
                _ => None,
            })
            .collect()
    }

    /// Text family meta events in file order
    pub fn text_events(&self) -> impl Iterator<Item = TextEvent<'_>> + '_ {
        self.meta_events(None, None)
            .filter_map(|(index, event, meta)| {
                Some(TextEvent {
                    track: index,
                    delta_time: event.delta_time(),
                    meta_type: meta.meta_type(),
                    text: meta.text()?,
                })
            })
    }

    /// Counts events by kind
    pub fn summary(&self) -> Summary {
        let mut summary = Summary {
            tracks: self.tracks().len(),
            ..Summary::default()
        };

        for (_, event) in self.events_in(None) {
            summary.events += 1;
            match event.body() {
                EventBody::Channel(channel) => {
                    summary.channel_events += 1;
                    if matches!(channel.kind(), ChannelKind::NoteOn | ChannelKind::NoteOff) {
                        summary.note_events += 1;
                    }
                }
                EventBody::Meta(meta) => {
                    summary.meta_events += 1;
                    if let MetaEvent::Tempo(_) = meta {
                        summary.tempo_changes += 1;
                    } else if TEXT_TYPES.contains(&meta.meta_type()) {
                        summary.text_events += 1;
                    }
                }
                EventBody::Sysex(_) => summary.sysex_events += 1,
            }
        }

        summary
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::{NoteEvent, Summary, TempoChange, TextEvent};
    use crate::{chunk::track::meta::MetaEvent, test_helpers::smf, MidiDocument};

    /// A conductor track with a name and two tempos, and a part with notes, a lyric and sysex
    fn document() -> MidiDocument {
        #[rustfmt::skip]
        let conductor: &[u8] = &[
            0x00, 0xFF, 0x03, 0x05, b'I', b'n', b't', b'r', b'o',
            0x00, 0xFF, 0x51, 0x03, 0x07, 0xA1, 0x20,
            0x60, 0xFF, 0x51, 0x03, 0x06, 0x1A, 0x80,
            0x00, 0xFF, 0x2F, 0x00,
        ];
        #[rustfmt::skip]
        let part: &[u8] = &[
            0x00, 0xFF, 0x05, 0x02, b'l', b'a',
            0x00, 0xC1, 0x05,
            0x00, 0x91, 0x3C, 0x40,
            0x60, 0x3C, 0x00,
            0x10, 0x81, 0x3E, 0x20,
            0x00, 0xF0, 0x02, 0x7E, 0xF7,
            0x00, 0xFF, 0x2F, 0x00,
        ];

        MidiDocument::from_bytes(&smf(1, 0x0060, &[conductor, part])).expect("Decode document")
    }

    #[test]
    fn tracks_are_looked_up_by_index() {
        let midi = document();
        assert_eq!(midi.track(0).map(|track| track.len()), Some(4));
        assert_eq!(midi.track(1).map(|track| track.len()), Some(7));
        assert!(midi.track(2).is_none());
    }

    #[test]
    fn channel_events_filter_by_track() {
        let midi = document();

        let statuses: Vec<u8> = midi
            .channel_events(None)
            .map(|(_, _, channel)| channel.status())
            .collect();
        assert_eq!(statuses, vec![0xC1, 0x91, 0x91, 0x81]);

        assert_eq!(midi.channel_events(Some(0)).count(), 0);
        assert_eq!(midi.channel_events(Some(1)).count(), 4);
        assert_eq!(midi.channel_events(Some(9)).count(), 0);
    }

    #[test]
    fn note_events_decode_key_and_velocity() {
        let notes: Vec<NoteEvent> = document().note_events(None).collect();

        assert_eq!(
            notes,
            vec![
                NoteEvent {
                    track: 1,
                    delta_time: 0,
                    channel: 1,
                    key: 0x3C,
                    velocity: 0x40,
                    on: true,
                },
                NoteEvent {
                    track: 1,
                    delta_time: 0x60,
                    channel: 1,
                    key: 0x3C,
                    velocity: 0,
                    on: true,
                },
                NoteEvent {
                    track: 1,
                    delta_time: 0x10,
                    channel: 1,
                    key: 0x3E,
                    velocity: 0x20,
                    on: false,
                },
            ]
        );
    }

    #[test]
    fn meta_events_filter_by_track_and_type() {
        let midi = document();

        assert_eq!(midi.meta_events(None, None).count(), 6);
        assert_eq!(midi.meta_events(None, Some(0x51)).count(), 2);
        assert_eq!(midi.meta_events(Some(0), Some(0x05)).count(), 0);

        let ends: Vec<(usize, &MetaEvent)> = midi
            .meta_events(Some(1), Some(0x2F))
            .map(|(index, _, meta)| (index, meta))
            .collect();
        assert_eq!(ends, vec![(1, &MetaEvent::EndOfTrack)]);
    }

    #[test]
    fn tempo_changes_report_bpm() {
        let tempos = document().tempo_changes();

        assert_eq!(
            tempos,
            vec![
                TempoChange {
                    track: 0,
                    delta_time: 0,
                    micros_per_quarter: 500_000,
                },
                TempoChange {
                    track: 0,
                    delta_time: 0x60,
                    micros_per_quarter: 400_000,
                },
            ]
        );
        assert_eq!(tempos[0].bpm(), Some(120.0));
        assert_eq!(tempos[1].bpm(), Some(150.0));

        let stopped = TempoChange {
            micros_per_quarter: 0,
            ..tempos[0]
        };
        assert_eq!(stopped.bpm(), None);
    }

    #[test]
    fn text_events_come_in_file_order() {
        let midi = document();
        let texts: Vec<TextEvent<'_>> = midi.text_events().collect();

        assert_eq!(
            texts,
            vec![
                TextEvent {
                    track: 0,
                    delta_time: 0,
                    meta_type: 0x03,
                    text: "Intro".into(),
                },
                TextEvent {
                    track: 1,
                    delta_time: 0,
                    meta_type: 0x05,
                    text: "la".into(),
                },
            ]
        );
    }

    #[test]
    fn summary_counts_each_kind() {
        assert_eq!(
            document().summary(),
            Summary {
                tracks: 2,
                events: 11,
                channel_events: 4,
                meta_events: 6,
                sysex_events: 1,
                note_events: 3,
                tempo_changes: 2,
                text_events: 2,
            }
        );
    }

    #[test]
    fn empty_document_has_nothing_to_report() {
        let midi = MidiDocument::from_bytes(&smf(0, 0x0060, &[])).expect("Decode header");

        assert_eq!(midi.note_events(None).count(), 0);
        assert!(midi.tempo_changes().is_empty());
        assert_eq!(midi.summary(), Summary::default());
    }
}
