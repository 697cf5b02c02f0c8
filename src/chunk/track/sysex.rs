//! System Exclusive Messages

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Status byte that opens a sysex message
pub const SYSEX_START: u8 = 0xF0;
/// Status byte for continuation packets and escaped raw bytes
pub const SYSEX_ESCAPE: u8 = 0xF7;

/// The byte that introduced a sysex event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SysexLeader {
    /// `0xF0`, the start of a system exclusive message
    Start,
    /// `0xF7`, a continuation packet or an escape for arbitrary bytes
    Escape,
}

impl SysexLeader {
    /// Maps a status byte to its leader, if it is one
    pub const fn from_status(status: u8) -> Option<Self> {
        match status {
            SYSEX_START => Some(Self::Start),
            SYSEX_ESCAPE => Some(Self::Escape),
            _ => None,
        }
    }

    /// The status byte as it appears in the file
    pub const fn status(self) -> u8 {
        match self {
            Self::Start => SYSEX_START,
            Self::Escape => SYSEX_ESCAPE,
        }
    }
}

/// A midi system exclusive event.
///
/// The payload is kept exactly as stored, including any trailing `0xF7` terminator.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SysexEvent {
    /// Which status byte introduced the event
    leader: SysexLeader,
    /// Data payload to be parsed on a per-system basis
    payload: Vec<u8>,
}

impl SysexEvent {
    /// Creates a sysex event owning its payload
    pub fn new(leader: SysexLeader, payload: Vec<u8>) -> Self {
        Self { leader, payload }
    }

    /// Which status byte introduced the event
    pub fn leader(&self) -> SysexLeader {
        self.leader
    }

    /// The raw payload bytes
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// True if the payload ends with the `0xF7` end-of-exclusive byte
    pub fn is_terminated(&self) -> bool {
        self.payload.last() == Some(&SYSEX_ESCAPE)
    }
}
