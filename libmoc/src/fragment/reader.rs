//! Sequential fragment reader

use std::io::{Read, Seek, SeekFrom};

use tracing::{debug, instrument, trace, warn};

use super::header::{FragmentHeader, HEADER_LEN};
use crate::{checksum, Error};

/// File offset of the first fragment; the bytes before it are padding
pub const DEFAULT_DATA_OFFSET: u64 = 2048;

/// A fragment read from an SDP file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    /// parsed header
    pub header: FragmentHeader,
    /// payload without the checksum byte
    pub payload: Vec<u8>,
    /// whether header, payload and checksum byte sum to the valid type-2 checksum
    pub checksum_ok: bool,
}

/// Reads fragments one after another from an SDP file
#[derive(Debug)]
pub struct FragmentReader<R> {
    inner: R,
    offset: u64,
    verify_checksum: bool,
}

fn read_full(r: &mut impl Read, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match r.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

impl<R: Read + Seek> FragmentReader<R> {
    /// Creates a reader whose first fragment starts at `data_offset`
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the reader cannot seek to `data_offset`.
    pub fn new(mut inner: R, data_offset: u64, verify_checksum: bool) -> Result<Self, Error> {
        inner.seek(SeekFrom::Start(data_offset))?;
        Ok(Self {
            inner,
            offset: data_offset,
            verify_checksum,
        })
    }

    /// File offset of the next fragment
    #[must_use]
    pub const fn offset(&self) -> u64 {
        self.offset
    }

    /// Reads the next fragment
    ///
    /// Returns `Ok(None)` at end of file, which includes an incomplete header and a header
    /// announcing an empty payload (files are often padded past their last fragment).
    ///
    /// # Errors
    ///
    /// * [`Error::ShortRead`] if the file ends inside the payload
    /// * [`Error::Io`] if the underlying reader fails
    #[instrument(skip(self), fields(offset = self.offset), level = "trace")]
    pub fn next_fragment(&mut self) -> Result<Option<Fragment>, Error> {
        let mut head = [0u8; HEADER_LEN];
        let read = read_full(&mut self.inner, &mut head)?;
        if read < HEADER_LEN {
            if read > 0 {
                debug!("{read} trailing bytes after the last fragment");
            }
            return Ok(None);
        }
        let header = FragmentHeader::parse(&head)?;
        if header.len == 0 {
            debug!("zero-length fragment header, treating as end of file");
            return Ok(None);
        }

        let expected = header.len as usize + 1;
        let mut body = vec![0u8; expected];
        let got = read_full(&mut self.inner, &mut body)?;
        if got < expected {
            warn!(
                "fragment {} truncated: {got} of {expected} bytes",
                header.fragment
            );
            return Err(Error::ShortRead { expected, got });
        }

        let checksum_ok = !self.verify_checksum || {
            let sum = checksum::compute8(&head);
            checksum::compute8(&[sum, checksum::compute8(&body)]) == checksum::CS8_VALID
        };
        self.offset += (HEADER_LEN + expected) as u64;
        body.truncate(header.len as usize);
        trace!(
            fragment = header.fragment,
            len = header.len,
            checksum_ok,
            "read fragment"
        );
        Ok(Some(Fragment {
            header,
            payload: body,
            checksum_ok,
        }))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn fragment_bytes(fragment: u16, payload: &[u8]) -> Vec<u8> {
        let header = FragmentHeader::builder()
            .fragment(fragment)
            .len(payload.len() as u32)
            .build();
        let mut bytes = header.to_bytes().to_vec();
        bytes.extend(payload);
        bytes.push(0);
        checksum::apply_type2_8(&mut bytes).unwrap();
        bytes
    }

    fn file(fragments: &[Vec<u8>]) -> Cursor<Vec<u8>> {
        let mut data = vec![0xaa; DEFAULT_DATA_OFFSET as usize];
        for f in fragments {
            data.extend(f);
        }
        Cursor::new(data)
    }

    #[test]
    fn reads_fragments_in_file_order() {
        let data = file(&[fragment_bytes(0, &[1, 2, 3]), fragment_bytes(1, &[4; 300])]);
        let mut r = FragmentReader::new(data, DEFAULT_DATA_OFFSET, true).unwrap();
        let first = r.next_fragment().unwrap().unwrap();
        assert_eq!(first.payload, vec![1, 2, 3]);
        assert!(first.checksum_ok);
        assert_eq!(r.offset(), DEFAULT_DATA_OFFSET + 66);
        let second = r.next_fragment().unwrap().unwrap();
        assert_eq!(second.header.fragment, 1);
        assert_eq!(second.payload.len(), 300);
        assert!(r.next_fragment().unwrap().is_none());
    }

    #[test]
    fn flags_bad_checksums_unless_disabled() {
        let mut bad = fragment_bytes(0, &[9; 10]);
        bad[HEADER_LEN + 4] ^= 0x12;
        let mut r = FragmentReader::new(file(&[bad.clone()]), DEFAULT_DATA_OFFSET, true).unwrap();
        assert!(!r.next_fragment().unwrap().unwrap().checksum_ok);
        let mut r = FragmentReader::new(file(&[bad]), DEFAULT_DATA_OFFSET, false).unwrap();
        assert!(r.next_fragment().unwrap().unwrap().checksum_ok);
    }

    #[test]
    fn zero_length_header_ends_the_file() {
        let padding = vec![0; HEADER_LEN + 10];
        let data = file(&[fragment_bytes(0, &[1]), padding]);
        let mut r = FragmentReader::new(data, DEFAULT_DATA_OFFSET, true).unwrap();
        assert!(r.next_fragment().unwrap().is_some());
        assert!(r.next_fragment().unwrap().is_none());
    }

    #[test]
    fn truncated_payload_is_a_short_read() {
        let mut f = fragment_bytes(0, &[1; 100]);
        f.truncate(HEADER_LEN + 40);
        let mut r = FragmentReader::new(file(&[f]), DEFAULT_DATA_OFFSET, true).unwrap();
        assert!(matches!(
            r.next_fragment(),
            Err(Error::ShortRead {
                expected: 101,
                got: 40
            })
        ));
    }
}
