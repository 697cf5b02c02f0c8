//! Chunk type constants

/// Creates a chunk type identifier
macro_rules! chunk_type {
    ($(#[$attr:meta])* $const_name:ident, $tag:literal) => {
        $(#[$attr])*
        pub const $const_name: [u8; 4] = *$tag;
    };
}

chunk_type!(
    /// Header chunk, always the first chunk of a file
    HEADER_CHUNK,
    b"MThd"
);
chunk_type!(
    /// Track chunk holding delta-time/event pairs
    TRACK_DATA_CHUNK,
    b"MTrk"
);
