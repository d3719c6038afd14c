use thiserror::Error;

#[derive(Error, Debug)]
#[non_exhaustive]
/// Possible `libmoc` errors
pub enum Error {
    /// Error returned when the underlying reader fails
    #[error("i/o error")]
    Io(#[from] std::io::Error),
    /// Error returned if a fragment header cannot be parsed
    #[error("malformed fragment header: {0}")]
    MalformedHeader(String),
    /// Error returned when a bit stream runs out of data
    #[error("bit stream underrun: wanted {requested} bits at byte {position} of {length}")]
    Underrun {
        /// number of bits requested
        requested: u32,
        /// byte position of the reader
        position: usize,
        /// total length of the backing buffer
        length: usize,
    },
    /// Error returned when a table-form Huffman tree points outside itself
    #[error("corrupt huffman table: node {node} out of {size}")]
    CorruptTable {
        /// offending node index
        node: usize,
        /// number of nodes in the table
        size: usize,
    },
    /// Error returned if a decode table file is malformed
    #[error("invalid decode table file: {0}")]
    TableFile(String),
    /// Error returned when a fragment asks for both predictive and transform compression
    #[error("both predictive and transform compression set in fragment {fragment}")]
    ConflictingCompression {
        /// fragment number
        fragment: u16,
    },
    /// Error returned for a transform type other than WHT or DCT
    #[error("unsupported transform type {0}")]
    UnsupportedTransform(u8),
    /// Error returned for a Huffman preset index outside of the built-in presets
    #[error("unsupported huffman table {0}")]
    UnsupportedTable(u8),
    /// Error returned when a transform block names a group that does not exist
    #[error("group index {group} out of range ({groups} groups)")]
    GroupOutOfRange {
        /// group index read from the stream
        group: u8,
        /// number of groups in the fragment
        groups: u8,
    },
    /// Error returned when the file ends inside a fragment payload
    #[error("short read of fragment payload: expected {expected}, got {got}")]
    ShortRead {
        /// payload length announced by the header
        expected: usize,
        /// bytes actually available
        got: usize,
    },
    /// Error returned when a buffer is too short to carry a checksum
    #[error("buffer of {len} bytes cannot hold a {width}-byte checksum")]
    BufferTooShort {
        /// buffer length
        len: usize,
        /// checksum width in bytes
        width: usize,
    },
    /// Error returned if the input holds no fragment at all
    #[error("no fragments found in input")]
    NoFragments,
}
