//! SDP fragments: header layout and the stream reader

pub mod header;
pub mod reader;

pub use header::{CommandKind, Compression, FragmentHeader, HEADER_LEN};
pub use reader::{Fragment, FragmentReader, DEFAULT_DATA_OFFSET};
