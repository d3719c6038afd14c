#![allow(clippy::module_name_repetitions)]

pub mod label;
pub mod raster;
pub mod session;
pub mod status;

use std::{
    fs::File,
    io::{BufReader, BufWriter, Read, Seek, Write},
    path::Path,
};

use anyhow::{Context, Result};
use image::{GrayImage, ImageFormat};
use tracing::{debug, instrument};

use crate::fragment::FragmentHeader;
use label::Label;
use raster::Raster;
use session::DecodeOptions;
use status::{exit_code, CompressionMode, Status};

/// Formats [`MocImage::save`] encodes; any other extension gets the raw raster
const IMAGE_FORMATS: [ImageFormat; 4] = [
    ImageFormat::Png,
    ImageFormat::Tiff,
    ImageFormat::Pnm,
    ImageFormat::Bmp,
];

/// A decoded MOC image together with the header of its first fragment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MocImage {
    header: FragmentHeader,
    raster: Raster,
    mode: CompressionMode,
    status: Status,
    errors: u32,
    source_name: Option<String>,
}

impl MocImage {
    /// Decodes an SDP stream
    ///
    /// # Errors
    ///
    /// This function will error if the stream cannot be read or contains no usable fragment.
    /// Damaged fragments do not fail the decode; they show up in [`Self::status`] and
    /// [`Self::errors`].
    pub fn from_reader(r: impl Read + Seek, options: &DecodeOptions) -> Result<Self> {
        session::decode(r, options).context("decode SDP stream")
    }

    /// Decodes the SDP file at `path`
    ///
    /// The label names the file unless `options` carries a source name.
    ///
    /// # Errors
    ///
    /// This function will error if the file cannot be opened.
    /// See [`Self::from_reader`] for other errors.
    #[instrument(skip(options))]
    pub fn from_file<P: AsRef<Path> + std::fmt::Debug>(
        path: P,
        options: &DecodeOptions,
    ) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
        let mut image = Self::from_reader(BufReader::new(file), options)?;
        if image.source_name.is_none() {
            image.source_name = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned());
        }
        Ok(image)
    }

    /// Header of the first fragment
    #[must_use]
    pub const fn header(&self) -> &FragmentHeader {
        &self.header
    }

    /// Decoded raster
    #[must_use]
    pub const fn raster(&self) -> &Raster {
        &self.raster
    }

    /// Returns the width of the image
    #[must_use]
    pub const fn width(&self) -> usize {
        self.raster.width()
    }

    /// Returns the number of lines decoded
    #[must_use]
    pub fn height(&self) -> usize {
        self.raster.height()
    }

    /// Returns the pixels, row-major
    #[must_use]
    pub fn pixels(&self) -> &[u8] {
        self.raster.pixels()
    }

    /// Compression mode of the first fragment
    #[must_use]
    pub const fn mode(&self) -> CompressionMode {
        self.mode
    }

    /// Status flags raised while decoding
    #[must_use]
    pub const fn status(&self) -> Status {
        self.status
    }

    /// Number of recoverable errors met while decoding
    #[must_use]
    pub const fn errors(&self) -> u32 {
        self.errors
    }

    /// Process exit code summarising the decode
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        exit_code(self.mode, self.status, self.errors)
    }

    /// Label describing the image
    #[must_use]
    pub fn label(&self) -> Label<'_> {
        Label::new(
            self.source_name.as_deref().unwrap_or("-"),
            &self.header,
            self.width(),
            self.height(),
        )
    }

    /// Converts the raster into an 8-bit grayscale image
    ///
    /// Returns `None` if the dimensions do not fit in `u32`.
    #[must_use]
    pub fn to_gray_image(&self) -> Option<GrayImage> {
        let width = u32::try_from(self.width()).ok()?;
        let height = u32::try_from(self.height()).ok()?;
        GrayImage::from_raw(width, height, self.pixels().to_vec())
    }

    /// Writes the image to `path`
    ///
    /// Extensions of PNG, TIFF, PNM and BMP files select that encoding. Anything else receives
    /// the raw raster.
    ///
    /// # Errors
    ///
    /// This will error if unable to open and/or write to the provided filename
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        match ImageFormat::from_path(path) {
            Ok(format) if IMAGE_FORMATS.contains(&format) => {
                debug!("encoding {} as {format:?}", path.display());
                let image = self.to_gray_image().context("image too large")?;
                image
                    .save_with_format(path, format)
                    .with_context(|| format!("encode {}", path.display()))
            }
            _ => {
                debug!("writing raw raster to {}", path.display());
                let f = File::create(path).with_context(|| format!("create {}", path.display()))?;
                let mut f = BufWriter::new(f);
                f.write_all(self.pixels()).context("write raster")?;
                f.flush().context("flush raster")
            }
        }
    }

    /// Writes the label to `path`
    ///
    /// # Errors
    ///
    /// This will error if unable to open and/or write to the provided filename
    pub fn write_label(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut f = File::create(path).with_context(|| format!("create {}", path.display()))?;
        write!(f, "{}", self.label()).context("write label")
    }
}
