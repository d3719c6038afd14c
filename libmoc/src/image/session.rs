//! Per-image decode driver

use std::io::{Read, Seek};

use bon::Builder;
use tracing::{debug, info, instrument, warn};

use super::{
    raster::Raster,
    status::{CompressionMode, Status},
    MocImage,
};
use crate::{
    fragment::{Compression, Fragment, FragmentHeader, FragmentReader, DEFAULT_DATA_OFFSET},
    huffman::{presets, DecodeTable},
    predictive::{Prediction, PredictiveDecoder, DEFAULT_SYNC},
    transform::{TransformDecoder, TransformTile, BLOCK_SIZE},
    Error,
};

/// Zero bytes inserted for every missing or rejected fragment
pub const PAD_BYTES: usize = 240 * 1024;

/// Options controlling how an SDP file is decoded
#[derive(Builder, Debug, Clone, PartialEq, Eq)]
pub struct DecodeOptions {
    /// verify the checksum of every fragment
    #[builder(default = true)]
    pub verify_checksum: bool,
    /// replace fragments with a bad checksum by zeros
    #[builder(default)]
    pub pad_cs: bool,
    /// expect a sync word every 128 predictive lines
    #[builder(default = true)]
    pub sync: bool,
    /// sync word expected when `sync` is set
    #[builder(default = DEFAULT_SYNC)]
    pub sync_word: u16,
    /// Huffman table to use instead of the built-in predictive presets
    pub decode_table: Option<DecodeTable>,
    /// decode every predictive fragment on its own
    #[builder(default)]
    pub per_fragment: bool,
    /// file offset of the first fragment
    #[builder(default = DEFAULT_DATA_OFFSET)]
    pub data_offset: u64,
    /// input name written to the label
    #[builder(into)]
    pub source_name: Option<String>,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl DecodeOptions {
    /// Sync word the predictive decoder looks for, if any
    #[must_use]
    pub const fn sync_word(&self) -> Option<u16> {
        if self.sync {
            Some(self.sync_word)
        } else {
            None
        }
    }
}

/// Per-image decoding state
///
/// Fragments are pushed in file order. Raw and transform fragments are decoded as they arrive;
/// predictive fragments are collected until the last one is seen (or the input ends).
#[derive(Debug)]
pub struct DecodeSession<'o> {
    options: &'o DecodeOptions,
    first: Option<FragmentHeader>,
    mode: CompressionMode,
    raster: Raster,
    status: Status,
    errors: u32,
    next_fragment: u32,
    pending: Vec<u8>,
    pending_mode: Option<(Prediction, u8, FragmentHeader)>,
    finished: bool,
}

impl<'o> DecodeSession<'o> {
    /// Creates an empty session
    #[must_use]
    pub const fn new(options: &'o DecodeOptions) -> Self {
        Self {
            options,
            first: None,
            mode: CompressionMode::Raw,
            raster: Raster::empty(0),
            status: Status::OK,
            errors: 0,
            next_fragment: 0,
            pending: Vec::new(),
            pending_mode: None,
            finished: false,
        }
    }

    /// Returns true once the last fragment of the image was seen or decoding had to stop
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.finished
    }

    /// Status flags recorded so far
    #[must_use]
    pub const fn status(&self) -> Status {
        self.status
    }

    /// Number of recoverable errors recorded so far
    #[must_use]
    pub const fn errors(&self) -> u32 {
        self.errors
    }

    /// Records a fragment that could not be read completely
    pub fn short_read(&mut self) {
        self.errors += 1;
        self.finished = true;
    }

    fn error(&mut self, status: Status) {
        self.status.insert(status);
        self.errors += 1;
    }

    /// Decodes or stores one fragment
    ///
    /// The first fragment fixes the image width and compression mode. A fragment that fails its
    /// checksum is zero-filled before its compression descriptor is looked at when `pad_cs` is
    /// set.
    ///
    /// # Errors
    ///
    /// Fails only for fragments that cannot be interpreted at all: conflicting or unsupported
    /// compression, an unknown Huffman preset or a zero image width. Everything else is
    /// recorded in the status flags and error count.
    #[instrument(
        skip_all,
        fields(fragment = fragment.header.fragment, len = fragment.payload.len())
    )]
    pub fn push(&mut self, fragment: Fragment) -> Result<(), Error> {
        let Fragment {
            header,
            payload,
            checksum_ok,
        } = fragment;
        let last = header.is_last();
        let compression = header.compression();

        if self.first.is_none() {
            let width = header.width();
            if width == 0 {
                return Err(Error::MalformedHeader(format!(
                    "fragment {} has zero width",
                    header.fragment
                )));
            }
            if let Ok(compression) = &compression {
                self.mode = compression.mode();
            }
            self.raster = Raster::empty(width);
            info!(
                id = header.id,
                width,
                height = ?header.total_height(),
                mode = self.mode.as_str(),
                command = header.command_kind().as_str(),
                "new image"
            );
            self.first = Some(header.clone());
        }
        let predictive = self.mode == CompressionMode::Predictive;

        self.check_sequence(header.fragment, predictive);

        if !checksum_ok {
            warn!("bad checksum in fragment {}", header.fragment);
            self.error(Status::BAD_CHECKSUM);
            if self.options.pad_cs && !predictive {
                debug!("zero-filling fragment {}", header.fragment);
                self.raster.pad_rows(self.pad_height());
                self.finished |= last;
                return Ok(());
            }
        }

        let compression = match compression {
            Ok(compression) => compression,
            Err(e) if !checksum_ok => {
                warn!("skipping fragment {}: {e}", header.fragment);
                self.finished |= last;
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        match compression {
            Compression::Raw => self.push_raw(&header, &payload),
            Compression::Transform {
                kind,
                groups,
                spacing,
            } => self.push_transform(
                &header,
                &payload,
                TransformDecoder::new(kind, spacing, groups),
            ),
            Compression::Predictive { prediction, table } => {
                self.pending.extend_from_slice(&payload);
                let height = header.height();
                self.pending_mode = Some((prediction, table, header));
                if self.options.per_fragment {
                    self.flush_predictive(height)?;
                } else if last {
                    let want = self.declared_height().unwrap_or(height);
                    self.flush_predictive(want)?;
                }
            }
        }
        self.finished |= last;
        Ok(())
    }

    fn declared_height(&self) -> Option<usize> {
        self.first.as_ref().and_then(FragmentHeader::total_height)
    }

    /// Lines of zeros standing in for one missing or rejected fragment
    fn pad_height(&self) -> usize {
        PAD_BYTES.div_ceil(self.raster.width())
    }

    fn check_sequence(&mut self, fragment: u16, predictive: bool) {
        let expected = self.next_fragment;
        self.next_fragment = u32::from(fragment) + 1;
        let Some(gap) = u32::from(fragment).checked_sub(expected).filter(|&g| g > 0) else {
            return;
        };
        warn!("missing {gap} fragment(s) before {fragment}");
        if predictive {
            warn!("predictive stream cannot be padded");
        } else {
            self.error(Status::BAD_SEQUENCE);
            self.raster.pad_rows(gap as usize * self.pad_height());
        }
    }

    fn push_raw(&mut self, header: &FragmentHeader, payload: &[u8]) {
        let width = self.raster.width();
        let size = header.height() * width;
        if payload.len() != size {
            debug!(
                "raw payload of {} bytes for {} lines of {width}",
                payload.len(),
                header.height()
            );
        }
        self.raster.push_rows(payload);
        if payload.len() < size {
            self.raster.pad_rows((size - payload.len()) / width);
        }
    }

    fn push_transform(
        &mut self,
        header: &FragmentHeader,
        payload: &[u8],
        decoder: TransformDecoder,
    ) {
        let mut tile = TransformTile::new(self.raster.width(), header.height());
        match decoder.decode_into(payload, &mut tile) {
            Ok(()) => {
                if tile.consumed < payload.len() {
                    warn!(
                        "transform fragment {} used {} of {} bytes",
                        header.fragment,
                        tile.consumed,
                        payload.len()
                    );
                }
                self.raster.push_rows(&tile.pixels);
            }
            Err(e @ Error::GroupOutOfRange { .. }) => {
                warn!("fragment {} is corrupt, zero-filling: {e}", header.fragment);
                self.errors += 1;
                self.raster.push_rows(&tile.pixels);
            }
            Err(e) => {
                let rows = tile.complete_rows() * BLOCK_SIZE;
                warn!(
                    "fragment {} stopped after {rows} lines: {e}",
                    header.fragment
                );
                self.error(Status::SHORT);
                self.raster.push_rows(&tile.pixels[..rows * tile.width]);
                self.finished = true;
            }
        }
    }

    /// Decodes the collected predictive data into `want` lines
    fn flush_predictive(&mut self, want: usize) -> Result<(), Error> {
        let Some((prediction, index, header)) = self.pending_mode.take() else {
            return Ok(());
        };
        let data = std::mem::take(&mut self.pending);
        let table = match &self.options.decode_table {
            Some(table) => table,
            None => presets::predictive_table(index)?,
        };
        debug!(
            "decoding {} predictive bytes with table {index} for fragment {}",
            data.len(),
            header.fragment
        );
        let decoder = PredictiveDecoder::new(
            table,
            self.raster.width(),
            prediction,
            self.options.sync_word(),
        );
        let image = decoder.decode(&data, want);
        self.errors += image.sync_losses;
        if image.height != want && !image.past_eof {
            // lost sync with data left over
            warn!("gave up at line {} of {want}", image.height);
            self.status.insert(Status::BAD_CHECKSUM);
        }
        self.raster.push_rows(&image.pixels);
        Ok(())
    }

    /// Flushes pending predictive data and checks the image height
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoFragments`] if no fragment was pushed.
    pub fn finish(mut self) -> Result<MocImage, Error> {
        let unflushed = self.pending_mode.as_ref().map(|(_, _, header)| {
            debug!(
                "no last-fragment flag after fragment {}, decoding what was read",
                header.fragment
            );
            header.total_height().unwrap_or(0)
        });
        if let Some(want) = unflushed {
            self.flush_predictive(want)?;
        }
        let header = self.first.take().ok_or(Error::NoFragments)?;

        let height = self.raster.height();
        if let Some(want) = header.total_height().filter(|&w| w > 0) {
            if height < want {
                warn!("image is short: {height} of {want} lines");
                self.error(Status::SHORT);
            } else if height > want {
                warn!("dropping {} lines past the declared height", height - want);
                self.error(Status::SHORT);
                self.raster.truncate(want);
            }
        }
        info!(
            "decoded {}x{} {} image, status {}, {} errors",
            self.raster.width(),
            self.raster.height(),
            self.mode.as_str(),
            self.status,
            self.errors
        );
        Ok(MocImage {
            header,
            raster: self.raster,
            mode: self.mode,
            status: self.status,
            errors: self.errors,
            source_name: self.options.source_name.clone(),
        })
    }
}

/// Decodes the first image of an SDP stream
///
/// # Errors
///
/// Fails if the stream cannot be read or holds no interpretable fragment.
/// See [`DecodeSession::push`].
#[instrument(skip_all, fields(offset = options.data_offset))]
pub fn decode(reader: impl Read + Seek, options: &DecodeOptions) -> Result<MocImage, Error> {
    let mut fragments = FragmentReader::new(reader, options.data_offset, options.verify_checksum)?;
    let mut session = DecodeSession::new(options);
    while !session.is_finished() {
        match fragments.next_fragment() {
            Ok(Some(fragment)) => session.push(fragment)?,
            Ok(None) => break,
            Err(e @ Error::ShortRead { .. }) => {
                warn!(offset = fragments.offset(), "{e}");
                session.short_read();
            }
            Err(e) => return Err(e),
        }
    }
    session.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_options() {
        let options = DecodeOptions::default();
        assert!(options.verify_checksum);
        assert!(!options.pad_cs);
        assert_eq!(options.sync_word(), Some(DEFAULT_SYNC));
        assert_eq!(options.data_offset, DEFAULT_DATA_OFFSET);
        assert!(options.decode_table.is_none());
        assert!(options.source_name.is_none());

        let options = DecodeOptions::builder()
            .sync(false)
            .source_name("a.sdp")
            .build();
        assert_eq!(options.sync_word(), None);
        assert_eq!(options.source_name.as_deref(), Some("a.sdp"));
    }

    #[test]
    fn empty_session_has_no_image() {
        let options = DecodeOptions::default();
        let session = DecodeSession::new(&options);
        assert!(!session.is_finished());
        assert!(matches!(session.finish(), Err(Error::NoFragments)));
    }

    #[test]
    fn zero_width_images_are_rejected() {
        let options = DecodeOptions::default();
        let mut session = DecodeSession::new(&options);
        let fragment = Fragment {
            header: FragmentHeader::builder().len(4).build(),
            payload: vec![0; 4],
            checksum_ok: true,
        };
        assert!(matches!(
            session.push(fragment),
            Err(Error::MalformedHeader(_))
        ));
    }

    #[test]
    fn sequence_gaps_pad_whole_rows() {
        let options = DecodeOptions::default();
        let mut session = DecodeSession::new(&options);
        for (n, fill) in [(0u16, 1u8), (3, 2)] {
            let header = FragmentHeader::builder()
                .fragment(n)
                .edit_length(2)
                .down_length(1)
                .len(512)
                .build();
            session
                .push(Fragment {
                    header,
                    payload: vec![fill; 512],
                    checksum_ok: true,
                })
                .unwrap();
        }
        assert_eq!(session.errors(), 1);
        assert!(session.status().contains(Status::BAD_SEQUENCE));
        let image = session.finish().unwrap();
        // two missing fragments of 240 KiB at 32 samples per line
        assert_eq!(image.height(), 16 + 2 * PAD_BYTES / 32 + 16);
        assert!(image.pixels()[512..512 + 2 * PAD_BYTES].iter().all(|&p| p == 0));
        assert_eq!(image.raster().row(0), Some(&[1u8; 32][..]));
    }

    #[test]
    fn rejected_fragments_pad_a_fixed_size() {
        let options = DecodeOptions::builder().pad_cs(true).build();
        let mut session = DecodeSession::new(&options);
        // down length damaged along with the checksum
        for (n, down_length, checksum_ok) in [(0u16, 1u16, true), (1, 0x4001, false)] {
            let header = FragmentHeader::builder()
                .fragment(n)
                .edit_length(7)
                .down_length(down_length)
                .len(112 * 16)
                .build();
            session
                .push(Fragment {
                    header,
                    payload: vec![1; 112 * 16],
                    checksum_ok,
                })
                .unwrap();
        }
        assert_eq!(session.raster.height(), 16 + PAD_BYTES.div_ceil(112));
        assert_eq!(session.errors(), 1);
        assert_eq!(session.status(), Status::BAD_CHECKSUM);
    }
}
