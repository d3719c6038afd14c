//! # libmoc
//!
//!
//! This library decompresses the science data packets (SDP) written by the Mars Orbiter Camera
//! (MOC) of Mars Global Surveyor.
//!
//! An SDP file holds one image split into fragments. Every fragment carries a 62-byte header,
//! its payload and a one-byte end-around-carry checksum. The payload is either raw pixels,
//! Huffman-coded prediction residuals, or Huffman-coded coefficients of 16x16 Walsh-Hadamard or
//! cosine transform blocks. Fragments are checked, put back together (zero-padding missing ones
//! where the compression allows it) and decoded into an 8-bit raster.
//!
//! ### Usage
//!
//! #### Converting an SDP file to an image
//!
//! ```rust,no_run
//! use libmoc::{DecodeOptions, MocImage};
//!
//! fn main() -> anyhow::Result<()> {
//!     let options = DecodeOptions::builder().pad_cs(true).build();
//!     let image = MocImage::from_file("m0000017.sdp", &options)?;
//!     image.save("m0000017.png")?;
//!     image.write_label("m0000017.png.lbl")?;
//!     std::process::exit(i32::from(image.exit_code()));
//! }
//! ```
//!
//! #### Decoding fragments yourself
//!
//! The codec modules can be used on their own. [`fragment::FragmentReader`] walks a file,
//! [`predictive::PredictiveDecoder`] and [`transform::TransformDecoder`] turn payloads into
//! pixels, and [`image::session::DecodeSession`] ties them together the way
//! [`MocImage::from_reader`] does.
//!
//! ### Code tables
//!
//! The flight software selects one of sixteen predictive Huffman code tables per image and one of
//! eight coefficient tables per transform coefficient. The tables built into this crate
//! ([`huffman::presets`]) are generated deterministically; a table dumped from flight software can
//! be supplied with [`DecodeOptions::decode_table`].

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    missing_docs
)]

/// LSB-first bit reading
pub mod bits;
pub mod checksum;
mod error;
pub mod fragment;
pub mod huffman;
/// Decoded images, their labels and the decode driver
pub mod image;
pub mod predictive;
pub mod transform;

pub use error::Error;
pub use image::label::Label;
pub use image::raster::Raster;
pub use image::session::DecodeOptions;
pub use image::status::{CompressionMode, Status};
pub use image::MocImage;
