#![allow(dead_code)]

use std::io::Cursor;

use libmoc::{
    checksum,
    fragment::{FragmentHeader, DEFAULT_DATA_OFFSET},
    huffman::{presets, CodeWord},
    predictive::DEFAULT_SYNC,
};

pub const LAST: u8 = 1 << 1;

/// LSB-first bit writer matching the decoder's bit order
#[derive(Default)]
pub struct BitWriter {
    pub bytes: Vec<u8>,
    used: u32,
}

impl BitWriter {
    pub fn put(&mut self, value: u32, n: u32) {
        for i in 0..n {
            if self.used == 0 {
                self.bytes.push(0);
            }
            let bit = ((value >> i) & 1) as u8;
            *self.bytes.last_mut().unwrap() |= bit << self.used;
            self.used = (self.used + 1) % 8;
        }
    }

    pub fn put_word(&mut self, word: CodeWord) {
        self.put(u32::from(word.code), u32::from(word.len));
    }

    pub fn put_residuals(&mut self, table: u8, residuals: &[i8]) {
        let codes = presets::predictive_codes(table).unwrap();
        for &r in residuals {
            self.put_word(codes.encode(r as u8));
        }
    }

    /// Word-aligned sync word followed by a literal line
    pub fn put_sync_line(&mut self, sync: [u8; 2], line: &[u8]) {
        self.used = 0;
        if self.bytes.len() % 2 == 1 {
            self.bytes.push(0);
        }
        self.bytes.extend(sync);
        self.bytes.extend(line);
    }

    /// One transform group with a single DC range and variance class
    pub fn put_group(&mut self, min_dc: u16, max_dc: u16, class: u8) {
        self.put(u32::from(min_dc), 16);
        self.put(u32::from(max_dc), 16);
        for _ in 0..255 {
            self.put(u32::from(class), 3);
        }
    }

    /// A transform block: DC code, then AC coefficients in scan order
    pub fn put_block(&mut self, class: u8, dc_code: u8, ac: &[i32]) {
        self.put(u32::from(dc_code), 8);
        self.put((255 - ac.len()) as u32, 8);
        let book = presets::coefficient_codes(class);
        for &value in ac {
            match book.code_for(value) {
                Some(word) => self.put_word(word),
                None => {
                    self.put_word(book.escape(value < 0));
                    self.put((value & 0x7fff) as u32, 15);
                }
            }
        }
    }
}

pub const SYNC: [u8; 2] = DEFAULT_SYNC.to_le_bytes();

/// Header for an image `width` samples wide with fragments of `lines` lines
pub fn header(fragment: u16, width: usize, lines: usize, total: usize) -> FragmentHeader {
    FragmentHeader::builder()
        .id(42)
        .fragment(fragment)
        .down_offset((usize::from(fragment) * lines / 16) as u16)
        .down_length((lines / 16) as u16)
        .down_total((total / 16) as u16)
        .edit_length((width / 16) as u8)
        .command([0x03; 17])
        .time([1, 0, 0, 1, 0])
        .build()
}

/// Serialises a fragment with a valid type-2 checksum
pub fn fragment(mut header: FragmentHeader, payload: &[u8]) -> Vec<u8> {
    header.len = payload.len() as u32;
    let mut bytes = header.to_bytes().to_vec();
    bytes.extend(payload);
    bytes.push(0);
    checksum::apply_type2_8(&mut bytes).unwrap();
    bytes
}

/// An SDP file: the leading padding, then the fragments
pub fn sdp(fragments: &[Vec<u8>]) -> Vec<u8> {
    let mut data = vec![0; DEFAULT_DATA_OFFSET as usize];
    for f in fragments {
        data.extend(f);
    }
    data
}

pub fn cursor(fragments: &[Vec<u8>]) -> Cursor<Vec<u8>> {
    Cursor::new(sdp(fragments))
}

pub fn path_of(temp: &mktemp::Temp) -> std::path::PathBuf {
    AsRef::<std::path::Path>::as_ref(temp).to_path_buf()
}
