//! Variable length quantities
//!
//! Delta times and meta/sysex lengths are stored big-endian, 7 bits per byte, with the high bit of
//! every byte but the last set to signal that more bytes follow. Standard MIDI Files never use
//! more than [`MAX_VLQ_BYTES`] bytes for one quantity.

use thiserror::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Longest encoding allowed in a Standard MIDI File
pub const MAX_VLQ_BYTES: usize = 4;

/// High bit marking that another byte follows
const CONTINUATION: u8 = 0x80;

/// Reasons a quantity cannot be decoded
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum VlqError {
    /// The 4th byte still has its continuation bit set
    #[error("continuation bit still set after 4 bytes")]
    TooLong,
    /// The bytes ran out while the continuation bit was set
    #[error("bytes ended before the final byte of the quantity")]
    Incomplete,
}

/// Decodes the quantity at the start of `window`.
///
/// Returns the value and the number of bytes it occupied, which may be fewer than the window
/// holds. Bytes past the 4th are never inspected.
pub fn decode(window: &[u8]) -> Result<(u32, usize), VlqError> {
    let mut value = 0u32;

    for (idx, byte) in window.iter().take(MAX_VLQ_BYTES).enumerate() {
        value = (value << 7) | u32::from(byte & !CONTINUATION);

        if byte & CONTINUATION == 0 {
            return Ok((value, idx + 1));
        }
    }

    if window.len() >= MAX_VLQ_BYTES {
        Err(VlqError::TooLong)
    } else {
        Err(VlqError::Incomplete)
    }
}

/// Pulls bytes one at a time from `next_byte` until a quantity is complete.
///
/// Exactly as many bytes as the quantity occupies are pulled, so the caller's cursor ends up
/// right after it. `next_byte` returning `None` means no more bytes are available.
pub fn read<F>(mut next_byte: F) -> Result<(u32, usize), VlqError>
where
    F: FnMut() -> Option<u8>,
{
    let mut window = [0u8; MAX_VLQ_BYTES];
    let mut len = 0;

    while len < MAX_VLQ_BYTES {
        let byte = next_byte().ok_or(VlqError::Incomplete)?;
        window[len] = byte;
        len += 1;

        if byte & CONTINUATION == 0 {
            break;
        }
    }

    decode(&window[..len])
}
