//! Byte builders shared by the unit tests

use crate::chunk::chunk_types::{HEADER_CHUNK, TRACK_DATA_CHUNK};

/// Encodes a value as a variable length quantity, most significant group first
pub fn encode_vlq(mut value: u32) -> Vec<u8> {
    let mut bytes = vec![(value & 0x7F) as u8];
    value >>= 7;

    while value != 0 {
        bytes.push((value & 0x7F) as u8 | 0x80);
        value >>= 7;
    }

    bytes.reverse();
    bytes
}

/// A complete `MThd` chunk
pub fn header_bytes(format: u16, track_count: u16, division: u16) -> Vec<u8> {
    let mut bytes = HEADER_CHUNK.to_vec();
    bytes.extend(6u32.to_be_bytes());
    bytes.extend(format.to_be_bytes());
    bytes.extend(track_count.to_be_bytes());
    bytes.extend(division.to_be_bytes());
    bytes
}

/// An `MTrk` chunk whose declared length matches `body`
pub fn track_chunk(body: &[u8]) -> Vec<u8> {
    track_chunk_with_length(body, body.len() as u32)
}

/// An `MTrk` chunk declaring `length` regardless of the body size
pub fn track_chunk_with_length(body: &[u8], length: u32) -> Vec<u8> {
    let mut bytes = TRACK_DATA_CHUNK.to_vec();
    bytes.extend(length.to_be_bytes());
    bytes.extend_from_slice(body);
    bytes
}

/// A whole file with one track chunk per body
pub fn smf(format: u16, division: u16, tracks: &[&[u8]]) -> Vec<u8> {
    let mut bytes = header_bytes(format, tracks.len() as u16, division);
    for body in tracks {
        bytes.extend(track_chunk(body));
    }
    bytes
}
