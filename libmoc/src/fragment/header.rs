//! Fragment header layout

use bon::Builder;
use nom::{
    bytes::complete::take,
    combinator::map_res,
    number::complete::{le_u16, le_u32, le_u8},
    IResult,
};
use strum::IntoStaticStr;
use tracing::trace;

use crate::{
    image::status::CompressionMode, predictive::Prediction, transform::TransformKind, Error,
};

/// Size of a fragment header on disk
pub const HEADER_LEN: usize = 62;

/// Width of MBR (memory buffer readout) fragments
pub const MBR_WIDTH: usize = 512;
/// Height of MBR fragments
pub const MBR_HEIGHT: usize = 480;

const LAST_FRAGMENT: u8 = 1 << 1;

/// Header preceding every fragment of an SDP file
///
/// All multi-byte fields are little-endian on disk. Lengths and offsets counted in units of 16
/// lines or samples are stored as they appear in the file.
#[derive(Builder, Default, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct FragmentHeader {
    /// image id
    #[builder(default)]
    pub id: u16,
    /// fragment number within the image
    #[builder(default)]
    pub fragment: u16,
    /// down-track offset of this fragment, in 16-line units
    #[builder(default)]
    pub down_offset: u16,
    /// down-track length of this fragment, in 16-line units
    #[builder(default)]
    pub down_length: u16,
    /// acquisition time: subseconds, then 32-bit seconds
    #[builder(default)]
    pub time: [u8; 5],
    /// status bits; bit 1 marks the last fragment
    #[builder(default)]
    pub status: u8,
    /// command that acquired the image
    #[builder(default)]
    pub command: [u8; 17],
    /// context
    #[builder(default)]
    pub context: [u8; 5],
    /// gain
    #[builder(default)]
    pub gain: u8,
    /// offset
    #[builder(default)]
    pub offset: u8,
    /// number of gain changes
    #[builder(default)]
    pub gain_changes: u16,
    /// total down-track length of the image, in 16-line units
    #[builder(default)]
    pub down_total: u16,
    /// first sample of the edit window, in 16-sample units
    #[builder(default)]
    pub edit_start: u8,
    /// width of the edit window, in 16-sample units
    #[builder(default)]
    pub edit_length: u8,
    /// compression descriptor
    #[builder(default)]
    pub compression: [u8; 8],
    /// sensor word
    #[builder(default)]
    pub sensors: u16,
    /// clocking and system id
    #[builder(default)]
    pub other: [u8; 4],
    /// payload length in bytes, not counting the checksum byte
    #[builder(default)]
    pub len: u32,
}

/// How a fragment's payload is compressed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    /// payload is the pixels themselves
    Raw,
    /// Huffman-coded prediction residuals
    Predictive {
        /// neighbours used for prediction
        prediction: Prediction,
        /// Huffman preset index
        table: u8,
    },
    /// Huffman-coded 16x16 block transform coefficients
    Transform {
        /// inverse transform
        kind: TransformKind,
        /// number of quantization groups (1..=8)
        groups: u8,
        /// coefficient spacing
        spacing: u16,
    },
}

impl Compression {
    /// Mode number used in the exit code
    #[must_use]
    pub const fn mode(self) -> CompressionMode {
        match self {
            Self::Raw => CompressionMode::Raw,
            Self::Predictive { .. } => CompressionMode::Predictive,
            Self::Transform { .. } => CompressionMode::Transform,
        }
    }
}

/// Kind of camera command, from the first command byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoStaticStr)]
pub enum CommandKind {
    /// narrow angle
    #[strum(serialize = "na")]
    NarrowAngle,
    /// wide angle
    #[strum(serialize = "wa")]
    WideAngle,
    /// global map swath
    #[strum(serialize = "global-map")]
    GlobalMap,
    /// memory buffer readout
    #[strum(serialize = "mbr")]
    MemoryBufferReadout,
    /// raw memory read
    #[strum(serialize = "read-memory")]
    ReadMemory,
    /// anything else
    #[strum(serialize = "unknown")]
    Unknown,
}

impl CommandKind {
    /// Label spelling of the command kind
    #[must_use]
    pub fn as_str(self) -> &'static str {
        self.into()
    }
}

impl From<u8> for CommandKind {
    fn from(value: u8) -> Self {
        match value {
            1 | 2 => Self::NarrowAngle,
            3 | 4 => Self::WideAngle,
            5 | 6 => Self::GlobalMap,
            0x15 | 0x16 => Self::MemoryBufferReadout,
            0x0d => Self::ReadMemory,
            _ => Self::Unknown,
        }
    }
}

fn array<const N: usize>(input: &[u8]) -> IResult<&[u8], [u8; N]> {
    map_res(take(N), |b: &[u8]| <[u8; N]>::try_from(b))(input)
}

fn parse_header(input: &[u8]) -> IResult<&[u8], FragmentHeader> {
    let (input, id) = le_u16(input)?;
    let (input, fragment) = le_u16(input)?;
    let (input, down_offset) = le_u16(input)?;
    let (input, down_length) = le_u16(input)?;
    let (input, time) = array::<5>(input)?;
    let (input, status) = le_u8(input)?;
    let (input, command) = array::<17>(input)?;
    let (input, context) = array::<5>(input)?;
    let (input, gain) = le_u8(input)?;
    let (input, offset) = le_u8(input)?;
    let (input, gain_changes) = le_u16(input)?;
    let (input, down_total) = le_u16(input)?;
    let (input, edit_start) = le_u8(input)?;
    let (input, edit_length) = le_u8(input)?;
    let (input, compression) = array::<8>(input)?;
    let (input, sensors) = le_u16(input)?;
    let (input, other) = array::<4>(input)?;
    let (input, len) = le_u32(input)?;
    Ok((
        input,
        FragmentHeader {
            id,
            fragment,
            down_offset,
            down_length,
            time,
            status,
            command,
            context,
            gain,
            offset,
            gain_changes,
            down_total,
            edit_start,
            edit_length,
            compression,
            sensors,
            other,
            len,
        },
    ))
}

impl FragmentHeader {
    /// Parses a header from the first [`HEADER_LEN`] bytes of `bytes`
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedHeader`] if fewer than [`HEADER_LEN`] bytes are given.
    pub fn parse(bytes: &[u8]) -> Result<Self, Error> {
        let (_, header) =
            parse_header(bytes).map_err(|e| Error::MalformedHeader(format!("{e:?}")))?;
        trace!(?header, "parsed fragment header");
        Ok(header)
    }

    /// Serialises the header to its on-disk layout
    #[must_use]
    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut out = Vec::with_capacity(HEADER_LEN);
        out.extend(self.id.to_le_bytes());
        out.extend(self.fragment.to_le_bytes());
        out.extend(self.down_offset.to_le_bytes());
        out.extend(self.down_length.to_le_bytes());
        out.extend(self.time);
        out.push(self.status);
        out.extend(self.command);
        out.extend(self.context);
        out.push(self.gain);
        out.push(self.offset);
        out.extend(self.gain_changes.to_le_bytes());
        out.extend(self.down_total.to_le_bytes());
        out.push(self.edit_start);
        out.push(self.edit_length);
        out.extend(self.compression);
        out.extend(self.sensors.to_le_bytes());
        out.extend(self.other);
        out.extend(self.len.to_le_bytes());
        let mut bytes = [0; HEADER_LEN];
        bytes.copy_from_slice(&out);
        bytes
    }

    /// Returns true if this is the last fragment of the image
    #[must_use]
    pub const fn is_last(&self) -> bool {
        self.status & LAST_FRAGMENT != 0
    }

    /// Decodes the compression descriptor
    ///
    /// # Errors
    ///
    /// * [`Error::ConflictingCompression`] if both predictive and transform bits are set
    /// * [`Error::UnsupportedTransform`] for transform type 3
    pub fn compression(&self) -> Result<Compression, Error> {
        if self.is_mbr() {
            return Ok(Compression::Raw);
        }
        let [mode, selector, _, _, spacing_lo, spacing_hi, _, _] = self.compression;
        let predictive = mode & 0x3;
        let transform = (mode >> 2) & 0x3;
        match (predictive, transform) {
            (0, 0) => Ok(Compression::Raw),
            (p, 0) => Ok(Compression::Predictive {
                prediction: Prediction::from_bits(p),
                table: selector & 0xf,
            }),
            (0, t) => Ok(Compression::Transform {
                kind: TransformKind::try_from(t)?,
                groups: (selector >> 5) + 1,
                spacing: u16::from_le_bytes([spacing_lo, spacing_hi]),
            }),
            _ => Err(Error::ConflictingCompression {
                fragment: self.fragment,
            }),
        }
    }

    /// Kind of command that acquired the image
    #[must_use]
    pub fn command_kind(&self) -> CommandKind {
        CommandKind::from(self.command[0])
    }

    /// Returns true for memory buffer readouts, which are always raw 512x480 fragments
    #[must_use]
    pub fn is_mbr(&self) -> bool {
        self.command_kind() == CommandKind::MemoryBufferReadout
    }

    /// Image width in pixels
    #[must_use]
    pub fn width(&self) -> usize {
        if self.is_mbr() {
            MBR_WIDTH
        } else {
            usize::from(self.edit_length) * 16
        }
    }

    /// Height of this fragment in lines
    #[must_use]
    pub fn height(&self) -> usize {
        if self.is_mbr() {
            MBR_HEIGHT
        } else {
            usize::from(self.down_length) * 16
        }
    }

    /// Declared height of the whole image in lines; `None` for MBR images
    #[must_use]
    pub fn total_height(&self) -> Option<usize> {
        (!self.is_mbr()).then_some(usize::from(self.down_total) * 16)
    }

    /// Acquisition time as (seconds, subseconds)
    #[must_use]
    pub const fn timestamp(&self) -> (u32, u8) {
        let [sub, a, b, c, d] = self.time;
        (u32::from_le_bytes([a, b, c, d]), sub)
    }

    /// Detector clocking word
    #[must_use]
    pub const fn clocking(&self) -> u16 {
        u16::from_le_bytes([self.other[1], self.other[2]])
    }

    /// System id byte
    #[must_use]
    pub const fn system_id(&self) -> u8 {
        self.other[3]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> FragmentHeader {
        FragmentHeader::builder()
            .id(0x1234)
            .fragment(3)
            .down_offset(6)
            .down_length(2)
            .time([7, 0x10, 0x20, 0x30, 0x40])
            .status(LAST_FRAGMENT)
            .command([3; 17])
            .context([1, 2, 3, 4, 5])
            .gain(0x9a)
            .offset(17)
            .gain_changes(1)
            .down_total(8)
            .edit_start(1)
            .edit_length(4)
            .compression([0x05, 0xe3, 0, 0, 0x10, 0x02, 0, 0])
            .sensors(0x00ff)
            .other([0, 0x34, 0x12, 0x2a])
            .len(1000)
            .build()
    }

    #[test]
    fn fields_sit_at_their_offsets() {
        let bytes = sample().to_bytes();
        assert_eq!(&bytes[0..2], &[0x34, 0x12]);
        assert_eq!(&bytes[2..4], &[3, 0]);
        assert_eq!(&bytes[8..13], &[7, 0x10, 0x20, 0x30, 0x40]);
        assert_eq!(bytes[13], LAST_FRAGMENT);
        assert_eq!(bytes[14], 3);
        assert_eq!(&bytes[31..36], &[1, 2, 3, 4, 5]);
        assert_eq!(bytes[36], 0x9a);
        assert_eq!(&bytes[40..42], &[8, 0]);
        assert_eq!(bytes[43], 4);
        assert_eq!(bytes[44], 0x05);
        assert_eq!(&bytes[52..54], &[0xff, 0]);
        assert_eq!(&bytes[58..62], &1000u32.to_le_bytes());
        assert_eq!(FragmentHeader::parse(&bytes).unwrap(), sample());
    }

    #[test]
    fn short_headers_are_malformed() {
        let bytes = sample().to_bytes();
        assert!(matches!(
            FragmentHeader::parse(&bytes[..HEADER_LEN - 1]),
            Err(Error::MalformedHeader(_))
        ));
    }

    #[test]
    fn geometry_and_metadata() {
        let h = sample();
        assert!(h.is_last());
        assert_eq!(h.width(), 64);
        assert_eq!(h.height(), 32);
        assert_eq!(h.total_height(), Some(128));
        assert_eq!(h.timestamp(), (0x4030_2010, 7));
        assert_eq!(h.clocking(), 0x1234);
        assert_eq!(h.system_id(), 0x2a);
        assert_eq!(h.command_kind().as_str(), "wa");
    }

    #[test]
    fn decodes_compression_descriptor() {
        let mut h = sample();
        // transform type 1 with predictive X flag: conflicting
        assert!(matches!(
            h.compression(),
            Err(Error::ConflictingCompression { fragment: 3 })
        ));

        h.compression[0] = 0x08;
        assert_eq!(
            h.compression().unwrap(),
            Compression::Transform {
                kind: TransformKind::Dct,
                groups: 8,
                spacing: 0x0210,
            }
        );

        h.compression[0] = 0x03;
        assert_eq!(
            h.compression().unwrap(),
            Compression::Predictive {
                prediction: Prediction::from_bits(3),
                table: 3,
            }
        );
        assert_eq!(h.compression().unwrap().mode(), CompressionMode::Predictive);

        h.compression[0] = 0x0c;
        assert!(matches!(h.compression(), Err(Error::UnsupportedTransform(3))));

        h.compression[0] = 0;
        assert_eq!(h.compression().unwrap(), Compression::Raw);
    }

    #[test]
    fn memory_readouts_are_fixed_size_raw() {
        let mut h = sample();
        h.command[0] = 0x15;
        assert!(h.is_mbr());
        assert_eq!(h.compression().unwrap(), Compression::Raw);
        assert_eq!((h.width(), h.height()), (MBR_WIDTH, MBR_HEIGHT));
        assert_eq!(h.total_height(), None);
        assert_eq!(CommandKind::from(0x0d).as_str(), "read-memory");
        assert_eq!(CommandKind::from(0x99), CommandKind::Unknown);
    }
}
