use std::{
    ffi::OsString,
    path::{Path, PathBuf},
};

use anyhow::Result;
use libmoc::{DecodeOptions, MocImage};
use tracing::{info, instrument, warn};

/// Label path used when none is given: the output name with `.lbl` appended
#[must_use]
pub fn default_label_path(output: &Path) -> PathBuf {
    let mut name = OsString::from(output.as_os_str());
    name.push(".lbl");
    PathBuf::from(name)
}

/// Parses a 16-bit sync word given in hex, with or without a `0x` prefix
///
/// # Errors
///
/// Returns a message if `s` is not a hex number that fits in 16 bits.
pub fn parse_sync_word(s: &str) -> Result<u16, String> {
    let digits = s
        .strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s);
    u16::from_str_radix(digits, 16).map_err(|e| format!("invalid sync word {s:?}: {e}"))
}

/// Decompresses `input` into `output` and writes its label
///
/// Returns the exit code describing the decode.
///
/// # Errors
///
/// Fails if the input cannot be decoded or the outputs cannot be written.
#[instrument(skip(options))]
pub fn decompress(
    input: &Path,
    output: &Path,
    label: Option<&Path>,
    options: &DecodeOptions,
) -> Result<u8> {
    let image = MocImage::from_file(input, options)?;
    if !image.status().is_ok() {
        warn!(
            "{} decoded with problems: {} ({} errors)",
            input.display(),
            image.status(),
            image.errors()
        );
    }
    image.save(output)?;
    info!(
        "wrote {}x{} image to {}",
        image.width(),
        image.height(),
        output.display()
    );

    let label = label.map_or_else(|| default_label_path(output), Path::to_path_buf);
    image.write_label(&label)?;
    info!("wrote label to {}", label.display());
    Ok(image.exit_code())
}
